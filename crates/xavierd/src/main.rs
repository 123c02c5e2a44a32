//! Xavier Daemon - voice commands for the browser
//!
//! Runs as a native messaging host: the browser extension launches it and
//! talks to it over stdin/stdout. Logs go to stderr.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use xavier_shared::{parse_command, Message, HOST_NAME, VERSION};
use xavierd::config::Config;
use xavierd::daemon::{new_id, Daemon};
use xavierd::speech;

#[derive(Parser)]
#[command(name = "xavierd")]
#[command(about = "Xavier voice browser daemon (native messaging host)", long_about = None)]
#[command(version = VERSION)]
struct Cli {
    /// Config file (default: /etc/xavier/config.toml, then user config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Parse one utterance, print the resulting command and exit
    #[arg(long, value_name = "TEXT")]
    parse: Option<String>,

    /// Confidence to attach when using --parse
    #[arg(long, default_value_t = 1.0)]
    confidence: f64,

    /// Log filter when RUST_LOG is unset (overrides config)
    #[arg(long)]
    log_level: Option<String>,

    /// Print the default config as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Arguments passed by the browser (manifest path, extension origin)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    browser_args: Vec<String>,
}

fn init_logging(level: &str) {
    // stdout carries frames; everything human-readable goes to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

fn print_parse(text: &str, confidence: f64) -> Result<()> {
    match parse_command(text, confidence) {
        Some(cmd) => {
            let message = Message::from(cmd.with_id(new_id()));
            println!("{}", serde_json::to_string_pretty(&message)?);
        }
        None => println!("No command matched: {:?}", text),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", Config::default_toml()?);
        return Ok(());
    }

    let config_path = cli.config.clone().or_else(Config::locate);
    let config = match &config_path {
        Some(path) => Config::load_from_path(path)?,
        None => Config::default(),
    };

    let level = cli.log_level.as_deref().unwrap_or(&config.daemon.log_level);
    init_logging(level);

    match &config_path {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => warn!("Config not found, using defaults"),
    }

    if let Some(text) = &cli.parse {
        return print_parse(text, cli.confidence);
    }

    info!("Xavier Voice Browser Daemon v{} starting...", VERSION);
    info!("Native messaging host {} active", HOST_NAME);
    if !cli.browser_args.is_empty() {
        info!("Launched by browser with {:?}", cli.browser_args);
    }
    if cli.confidence != 1.0 {
        warn!("--confidence only applies to --parse; ignoring");
    }

    let source = speech::create_source(&config.speech);
    let daemon = Daemon::new(config.daemon.clone());
    let summary = daemon.run_stdio(source).await.context("Fatal error")?;

    info!("Daemon stopped: {:?}", summary);
    Ok(())
}

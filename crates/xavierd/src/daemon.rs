//! Daemon loop - ties speech, grammar and transport together.
//!
//! The loop owns message ids and decides when to send `ready`, commands,
//! `error` and `ping`. The grammar only says what was meant; correlation on
//! the wire happens here.

use std::io::{self, Read, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use xavier_shared::{CommandGrammar, Message, XavierError};

use crate::config::DaemonConfig;
use crate::speech::{self, SpeechSource, Transcript};
use crate::state::{DaemonState, Resolved, RunSummary};
use crate::transport::{self, Outbox};

/// Text of the startup `ready` message.
pub const READY_MESSAGE: &str = "Daemon ready";

/// Fresh wire id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// `error` message telling the extension an utterance matched no command.
pub fn unknown_command_reply(text: impl Into<String>) -> Message {
    let err = XavierError::UnknownCommand(text.into());
    Message::error(new_id(), err.to_string())
}

pub struct Daemon {
    config: DaemonConfig,
    grammar: CommandGrammar,
}

impl Daemon {
    pub fn new(config: DaemonConfig) -> Self {
        Self {
            config,
            grammar: CommandGrammar::standard(),
        }
    }

    pub fn with_grammar(mut self, grammar: CommandGrammar) -> Self {
        self.grammar = grammar;
        self
    }

    /// Serve native messaging on the process's stdin/stdout.
    pub async fn run_stdio(&self, source: Box<dyn SpeechSource>) -> Result<RunSummary> {
        self.run(source, io::stdin(), io::stdout()).await
    }

    /// Run until the extension disconnects, the source is exhausted (when
    /// configured to stop then), or Ctrl-C.
    pub async fn run<R, W>(&self, source: Box<dyn SpeechSource>, input: R, output: W) -> Result<RunSummary>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let (outbox, writer) =
            transport::spawn_writer(output).context("Failed to start writer thread")?;
        let mut inbound = transport::spawn_reader(input).context("Failed to start reader thread")?;
        let source_name = source.name().to_string();
        let mut transcripts =
            speech::spawn_source(source).context("Failed to start speech source")?;
        let mut state = DaemonState::new();

        outbox
            .send(&Message::ready(new_id(), READY_MESSAGE))
            .context("Failed to send ready signal")?;
        info!("READY - listening for transcripts from '{}' source", source_name);

        let heartbeat_enabled = self.config.heartbeat_secs > 0;
        let period = Duration::from_secs(self.config.heartbeat_secs.max(1));
        let mut heartbeat = interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);
        let mut signals_enabled = true;
        let mut source_open = true;

        loop {
            tokio::select! {
                transcript = transcripts.recv(), if source_open => match transcript {
                    Some(transcript) => self.handle_transcript(transcript, &outbox, &mut state),
                    None => {
                        source_open = false;
                        if self.config.exit_when_source_exhausted {
                            info!("Speech source finished. Exiting...");
                            break;
                        }
                    }
                },
                value = inbound.recv() => match value {
                    Some(value) => self.handle_inbound(value, &mut state),
                    None => {
                        info!("Extension disconnected");
                        break;
                    }
                },
                _ = heartbeat.tick(), if heartbeat_enabled => {
                    let id = new_id();
                    match outbox.send(&Message::ping(id.as_str())) {
                        Ok(()) => state.ping_sent(&id),
                        Err(e) => warn!("Failed to send ping: {}", e),
                    }
                },
                signal = &mut shutdown, if signals_enabled => match signal {
                    Ok(()) => {
                        info!("Daemon shutting down...");
                        break;
                    }
                    Err(e) => {
                        warn!("Ctrl-C handler unavailable: {}", e);
                        signals_enabled = false;
                    }
                },
            }
        }

        drop(outbox);
        let frames = tokio::task::spawn_blocking(move || writer.finish())
            .await
            .context("Writer thread join failed")?;

        let summary = state.finish();
        info!(
            "Stopped: {} frames written, {} commands sent, {} unrecognized, {} unanswered",
            frames, summary.commands_sent, summary.unrecognized, summary.unanswered
        );
        Ok(summary)
    }

    fn handle_transcript(&self, transcript: Transcript, outbox: &Outbox, state: &mut DaemonState) {
        let Some(command) = self.grammar.parse(&transcript.text, transcript.confidence) else {
            state.unrecognized();
            let reply = unknown_command_reply(transcript.text);
            if let Err(e) = outbox.send(&reply) {
                error!("Failed to report unknown command: {} (code {:?})", e, e.code());
            }
            return;
        };

        let id = new_id();
        let command = command.with_id(id.as_str());
        info!("Parsed command: {} ({})", command.name, id);
        match outbox.send(&Message::from(command.clone())) {
            Ok(()) => state.command_sent(&id, &command),
            Err(e) => error!(
                "Failed to send command {}: {} (code {:?})",
                command.name,
                e,
                e.code()
            ),
        }
    }

    fn handle_inbound(&self, value: Value, state: &mut DaemonState) {
        let message: Message = match serde_json::from_value(value) {
            Ok(message) => message,
            Err(e) => {
                warn!("Unrecognized inbound message: {}", e);
                return;
            }
        };

        match message {
            Message::Ack { id, ok, message } => match state.ack(&id, ok) {
                Resolved::Command(cmd, latency) if ok => {
                    info!("Command {} ({}) acknowledged after {:?}", cmd.name, id, latency)
                }
                Resolved::Command(cmd, latency) => warn!(
                    "Command {} ({}) failed after {:?}: {}",
                    cmd.name, id, latency, message
                ),
                Resolved::Ping(rtt) => debug!("Pong {} after {:?}", id, rtt),
                Resolved::Unknown => debug!("Ack for unknown id {}", id),
            },
            Message::Error { id, message } => match state.error(&id) {
                Resolved::Command(cmd, _) => {
                    warn!("Extension rejected {} ({}): {}", cmd.name, id, message)
                }
                _ => warn!("Extension error ({}): {}", id, message),
            },
            other => debug!("Ignoring inbound {} message", other.kind()),
        }
    }
}

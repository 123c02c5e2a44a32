//! Xavier daemon library - exposes modules for testing.

pub mod config;
pub mod daemon;
pub mod speech;
pub mod state;
pub mod transport;

pub use config::Config;
pub use daemon::Daemon;
pub use state::RunSummary;

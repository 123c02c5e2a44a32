//! Shared types for the Xavier voice browser daemon.
//!
//! Holds the native messaging wire contract (framing + message schema) and
//! the grammar that turns transcripts into browser commands. Nothing here
//! touches a runtime or a process-wide stream.

pub mod error;
pub mod framing;
pub mod grammar;
pub mod message;

pub use error::{FrameError, SchemaError, XavierError};
pub use grammar::{normalize, parse_command, CommandGrammar, GrammarRule, Matcher};
pub use message::{Command, CommandArgs, CommandMeta, CommandName, Message, HINT_ARG};

/// Native messaging host name registered with the browser.
pub const HOST_NAME: &str = "com.xavier.voice_browser";

/// Crate version, shared by the daemon's ready banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

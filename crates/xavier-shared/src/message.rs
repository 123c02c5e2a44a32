//! Message schema exchanged with the browser extension.
//!
//! Every message is one JSON object tagged by `type`. The daemon sends
//! `ready`, `command`, `error` and `ping`; the extension answers with `ack`
//! and `error`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Argument key carried by `hint_click`.
pub const HINT_ARG: &str = "hint";

/// Closed set of commands the grammar can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandName {
    Back,
    Forward,
    Reload,
    ScrollUp,
    ScrollDown,
    PageUp,
    PageDown,
    JumpTop,
    JumpBottom,
    NewTab,
    CloseTab,
    NextTab,
    PreviousTab,
    ShowHints,
    HideHints,
    HintClick,
    FocusAddress,
}

impl CommandName {
    pub const ALL: [CommandName; 17] = [
        Self::Back,
        Self::Forward,
        Self::Reload,
        Self::ScrollUp,
        Self::ScrollDown,
        Self::PageUp,
        Self::PageDown,
        Self::JumpTop,
        Self::JumpBottom,
        Self::NewTab,
        Self::CloseTab,
        Self::NextTab,
        Self::PreviousTab,
        Self::ShowHints,
        Self::HideHints,
        Self::HintClick,
        Self::FocusAddress,
    ];

    /// Wire name, as the extension dispatches on it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Back => "back",
            Self::Forward => "forward",
            Self::Reload => "reload",
            Self::ScrollUp => "scroll_up",
            Self::ScrollDown => "scroll_down",
            Self::PageUp => "page_up",
            Self::PageDown => "page_down",
            Self::JumpTop => "jump_top",
            Self::JumpBottom => "jump_bottom",
            Self::NewTab => "new_tab",
            Self::CloseTab => "close_tab",
            Self::NextTab => "next_tab",
            Self::PreviousTab => "previous_tab",
            Self::ShowHints => "show_hints",
            Self::HideHints => "hide_hints",
            Self::HintClick => "hint_click",
            Self::FocusAddress => "focus_address",
        }
    }

    /// Whether the command carries arguments at all.
    pub fn takes_args(&self) -> bool {
        matches!(self, Self::HintClick)
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CommandName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| format!("unknown command name: {}", s))
    }
}

/// Command arguments. Empty for everything except `hint_click`.
pub type CommandArgs = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandMeta {
    /// Recognizer confidence in [0.0, 1.0], passed through untouched.
    pub confidence: f64,
    /// Utterance exactly as the speech source produced it.
    pub raw: String,
}

/// A recognized browser action.
///
/// The parser never sets `id`; the daemon assigns one just before sending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: CommandName,
    #[serde(default)]
    pub args: CommandArgs,
    pub meta: CommandMeta,
}

impl Command {
    pub fn new(name: CommandName, args: CommandArgs, confidence: f64, raw: impl Into<String>) -> Self {
        Self {
            id: None,
            name,
            args,
            meta: CommandMeta {
                confidence,
                raw: raw.into(),
            },
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Hint code for `hint_click`.
    pub fn hint(&self) -> Option<&str> {
        self.args.get(HINT_ARG).map(String::as_str)
    }

    /// Check the command's shape. Does not require an id.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let confidence = self.meta.confidence;
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(SchemaError::ConfidenceOutOfRange(confidence));
        }

        if let Some(arg) = self
            .args
            .keys()
            .find(|key| !(self.name.takes_args() && key.as_str() == HINT_ARG))
        {
            return Err(SchemaError::UnexpectedArg {
                command: self.name.to_string(),
                arg: arg.clone(),
            });
        }

        if self.name == CommandName::HintClick {
            let hint = self.hint().unwrap_or_default();
            if hint.is_empty() || !hint.chars().all(|c| c.is_ascii_uppercase()) {
                return Err(SchemaError::InvalidHint(hint.to_string()));
            }
        }

        Ok(())
    }
}

/// Wire-level envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Command(Command),
    Ack {
        id: String,
        ok: bool,
        #[serde(default)]
        message: String,
    },
    Error {
        id: String,
        message: String,
    },
    Ready {
        id: String,
        message: String,
    },
    /// Liveness probe; the extension replies with an `ack` for the same id.
    Ping {
        id: String,
    },
}

impl Message {
    pub fn ready(id: impl Into<String>, message: impl Into<String>) -> Self {
        Message::Ready {
            id: id.into(),
            message: message.into(),
        }
    }

    pub fn error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Message::Error {
            id: id.into(),
            message: message.into(),
        }
    }

    pub fn ack(id: impl Into<String>, ok: bool, message: impl Into<String>) -> Self {
        Message::Ack {
            id: id.into(),
            ok,
            message: message.into(),
        }
    }

    pub fn ping(id: impl Into<String>) -> Self {
        Message::Ping { id: id.into() }
    }

    /// Value of the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Command(_) => "command",
            Message::Ack { .. } => "ack",
            Message::Error { .. } => "error",
            Message::Ready { .. } => "ready",
            Message::Ping { .. } => "ping",
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Message::Command(cmd) => cmd.id.as_deref(),
            Message::Ack { id, .. }
            | Message::Error { id, .. }
            | Message::Ready { id, .. }
            | Message::Ping { id } => Some(id.as_str()),
        }
    }

    /// Check that the message is fit to put on the wire.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.id().map_or(true, str::is_empty) {
            return Err(SchemaError::MissingId { kind: self.kind() });
        }
        match self {
            Message::Command(cmd) => cmd.validate(),
            _ => Ok(()),
        }
    }
}

impl From<Command> for Message {
    fn from(cmd: Command) -> Self {
        Message::Command(cmd)
    }
}

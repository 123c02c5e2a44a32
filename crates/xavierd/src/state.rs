//! Daemon state: outstanding commands and run counters.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use xavier_shared::{Command, CommandName};

/// A command sent to the extension and not yet answered.
#[derive(Debug, Clone)]
pub struct PendingCommand {
    pub name: CommandName,
    pub raw: String,
    pub sent_at: Instant,
}

/// What an inbound ack or error referred to.
#[derive(Debug, Clone)]
pub enum Resolved {
    Command(PendingCommand, Duration),
    Ping(Duration),
    Unknown,
}

/// Counters reported when the daemon stops.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub commands_sent: usize,
    pub unrecognized: usize,
    pub acks_ok: usize,
    pub acks_failed: usize,
    pub extension_errors: usize,
    pub pings_sent: usize,
    pub pongs: usize,
    pub unanswered: usize,
}

/// Correlates outbound ids with inbound acks and errors.
#[derive(Debug, Default)]
pub struct DaemonState {
    pending: HashMap<String, PendingCommand>,
    pings: HashMap<String, Instant>,
    pub summary: RunSummary,
}

impl DaemonState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a command that has just been queued under `id`.
    pub fn command_sent(&mut self, id: &str, cmd: &Command) {
        self.pending.insert(
            id.to_string(),
            PendingCommand {
                name: cmd.name,
                raw: cmd.meta.raw.clone(),
                sent_at: Instant::now(),
            },
        );
        self.summary.commands_sent += 1;
    }

    pub fn ping_sent(&mut self, id: &str) {
        self.pings.insert(id.to_string(), Instant::now());
        self.summary.pings_sent += 1;
    }

    pub fn unrecognized(&mut self) {
        self.summary.unrecognized += 1;
    }

    /// Match an inbound ack against what we sent.
    pub fn ack(&mut self, id: &str, ok: bool) -> Resolved {
        let resolved = self.resolve(id);
        match &resolved {
            Resolved::Command(..) if ok => self.summary.acks_ok += 1,
            Resolved::Command(..) => self.summary.acks_failed += 1,
            Resolved::Ping(_) => self.summary.pongs += 1,
            Resolved::Unknown => {}
        }
        resolved
    }

    /// Match an inbound error against what we sent.
    pub fn error(&mut self, id: &str) -> Resolved {
        self.summary.extension_errors += 1;
        self.resolve(id)
    }

    fn resolve(&mut self, id: &str) -> Resolved {
        if let Some(cmd) = self.pending.remove(id) {
            let elapsed = cmd.sent_at.elapsed();
            return Resolved::Command(cmd, elapsed);
        }
        if let Some(sent_at) = self.pings.remove(id) {
            return Resolved::Ping(sent_at.elapsed());
        }
        Resolved::Unknown
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    /// Final counters, with whatever is still outstanding.
    pub fn finish(mut self) -> RunSummary {
        self.summary.unanswered = self.pending.len();
        self.summary
    }
}

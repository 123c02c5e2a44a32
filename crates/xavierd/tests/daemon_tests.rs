//! End-to-end daemon runs over in-memory streams.
//!
//! The extension side is simulated: inbound frames are fed through a
//! channel-backed reader, and outbound frames are captured (and optionally
//! acknowledged) by a test writer.

use std::collections::VecDeque;
use std::io::{self, Cursor, Read, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use xavier_shared::framing::{self, HEADER_LEN};
use xavier_shared::{CommandGrammar, CommandName, GrammarRule, Message};
use xavierd::config::DaemonConfig;
use xavierd::daemon::{Daemon, READY_MESSAGE};
use xavierd::speech::ScriptedSource;

// =============================================================================
// Simulated extension
// =============================================================================

/// Inbound stream fed by the test; EOF once every sender is dropped.
struct ChannelReader {
    rx: Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
}

impl ChannelReader {
    fn new() -> (Sender<Vec<u8>>, Self) {
        let (tx, rx) = mpsc::channel();
        (
            tx,
            Self {
                rx,
                pending: VecDeque::new(),
            },
        )
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            match self.rx.recv() {
                Ok(chunk) => self.pending.extend(chunk),
                Err(_) => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

/// How the simulated extension answers outbound frames.
#[derive(Clone, Copy)]
enum Responder {
    Silent,
    /// Ack commands (alternating ok/failed) and pings; hang up after `limit`.
    Ack { limit: usize },
}

/// Captures outbound frames and plays the extension's part.
#[derive(Clone)]
struct Extension {
    received: Arc<Mutex<Vec<Message>>>,
    state: Arc<Mutex<ExtensionState>>,
}

struct ExtensionState {
    buf: Vec<u8>,
    inbound: Option<Sender<Vec<u8>>>,
    responder: Responder,
    answered: usize,
}

impl Extension {
    fn new(inbound: Sender<Vec<u8>>, responder: Responder) -> Self {
        Self::with_inbound(Some(inbound), responder)
    }

    /// Never answers and holds no inbound sender.
    fn silent() -> Self {
        Self::with_inbound(None, Responder::Silent)
    }

    fn with_inbound(inbound: Option<Sender<Vec<u8>>>, responder: Responder) -> Self {
        Self {
            received: Arc::new(Mutex::new(Vec::new())),
            state: Arc::new(Mutex::new(ExtensionState {
                buf: Vec::new(),
                inbound,
                responder,
                answered: 0,
            })),
        }
    }

    fn messages(&self) -> Vec<Message> {
        self.received.lock().unwrap().clone()
    }

    fn answer(state: &mut ExtensionState, message: &Message) {
        let Responder::Ack { limit } = state.responder else {
            return;
        };
        let reply = match message {
            Message::Command(cmd) => Message::ack(
                cmd.id.clone().unwrap_or_default(),
                state.answered % 2 == 0,
                "",
            ),
            Message::Ping { id } => Message::ack(id.clone(), true, "pong"),
            _ => return,
        };
        if let Some(tx) = &state.inbound {
            let _ = tx.send(framing::encode_to_vec(&reply).unwrap());
        }
        state.answered += 1;
        if state.answered >= limit {
            state.inbound = None;
        }
    }
}

impl Write for Extension {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        state.buf.extend_from_slice(data);
        loop {
            if state.buf.len() < HEADER_LEN {
                break;
            }
            let len = u32::from_ne_bytes(state.buf[..HEADER_LEN].try_into().unwrap()) as usize;
            if state.buf.len() < HEADER_LEN + len {
                break;
            }
            let frame: Vec<u8> = state.buf.drain(..HEADER_LEN + len).collect();
            let message: Message = framing::decode(&mut Cursor::new(frame)).unwrap();
            Self::answer(&mut state, &message);
            self.received.lock().unwrap().push(message);
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn scripted(lines: &[&str]) -> Box<ScriptedSource> {
    Box::new(ScriptedSource::new(
        lines.iter().map(|s| s.to_string()).collect(),
        Duration::ZERO,
        1.0,
    ))
}

fn config(exit_when_source_exhausted: bool, heartbeat_secs: u64) -> DaemonConfig {
    DaemonConfig {
        heartbeat_secs,
        exit_when_source_exhausted,
        ..DaemonConfig::default()
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_ready_then_commands_and_errors_in_order() {
    // Inbound stays open; the run ends when the script is exhausted.
    let (_tx, reader) = ChannelReader::new();
    let extension = Extension::silent();

    let daemon = Daemon::new(config(true, 0));
    let summary = daemon
        .run(
            scripted(&["scroll down", "dance please", "Click A F!"]),
            reader,
            extension.clone(),
        )
        .await
        .unwrap();

    let messages = extension.messages();
    assert_eq!(messages.len(), 4);

    match &messages[0] {
        Message::Ready { id, message } => {
            assert!(!id.is_empty());
            assert_eq!(message, READY_MESSAGE);
        }
        other => panic!("expected ready, got {:?}", other),
    }
    match &messages[1] {
        Message::Command(cmd) => {
            assert_eq!(cmd.name, CommandName::ScrollDown);
            assert!(cmd.id.as_deref().map_or(false, |id| !id.is_empty()));
            assert_eq!(cmd.meta.raw, "scroll down");
        }
        other => panic!("expected command, got {:?}", other),
    }
    match &messages[2] {
        Message::Error { id, message } => {
            assert!(!id.is_empty());
            assert_eq!(message, "Unknown command: dance please");
        }
        other => panic!("expected error, got {:?}", other),
    }
    match &messages[3] {
        Message::Command(cmd) => {
            assert_eq!(cmd.name, CommandName::HintClick);
            assert_eq!(cmd.hint(), Some("AF"));
            assert_eq!(cmd.meta.raw, "Click A F!");
        }
        other => panic!("expected command, got {:?}", other),
    }

    assert_eq!(summary.commands_sent, 2);
    assert_eq!(summary.unrecognized, 1);
    assert_eq!(summary.unanswered, 2);
}

#[tokio::test]
async fn test_every_message_gets_a_fresh_id() {
    let (_tx, reader) = ChannelReader::new();
    let extension = Extension::silent();

    Daemon::new(config(true, 0))
        .run(scripted(&["up", "up", "nope"]), reader, extension.clone())
        .await
        .unwrap();

    let mut ids: Vec<String> = extension
        .messages()
        .iter()
        .map(|m| m.id().unwrap().to_string())
        .collect();
    let total = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(total, 4);
    assert_eq!(ids.len(), 4);
}

#[tokio::test]
async fn test_extension_disconnect_stops_daemon() {
    let daemon = Daemon::new(config(false, 0));
    let extension = Extension::silent();

    // Inbound stream is already at EOF.
    let summary = daemon
        .run(scripted(&[]), Cursor::new(Vec::new()), extension.clone())
        .await
        .unwrap();

    let messages = extension.messages();
    assert!(matches!(messages.first(), Some(Message::Ready { .. })));
    assert_eq!(summary.commands_sent, 0);
}

#[tokio::test]
async fn test_acks_are_correlated_with_sent_commands() {
    let (tx, reader) = ChannelReader::new();
    let extension = Extension::new(tx, Responder::Ack { limit: 2 });

    // Keeps running after the script so the acks can come back; the
    // extension hangs up after answering both commands.
    let summary = Daemon::new(config(false, 0))
        .run(scripted(&["go back", "reload"]), reader, extension.clone())
        .await
        .unwrap();

    assert_eq!(summary.commands_sent, 2);
    assert_eq!(summary.acks_ok, 1);
    assert_eq!(summary.acks_failed, 1);
    assert_eq!(summary.unanswered, 0);
}

#[tokio::test]
async fn test_garbage_inbound_frames_do_not_stop_the_daemon() {
    let (tx, reader) = ChannelReader::new();
    let extension = Extension::silent();

    // Zero-length frame, malformed JSON, unknown type, then hang up.
    tx.send(0u32.to_ne_bytes().to_vec()).unwrap();
    let mut bad = 5u32.to_ne_bytes().to_vec();
    bad.extend(b"{oops");
    tx.send(bad).unwrap();
    tx.send(framing::encode_to_vec(&serde_json::json!({"type": "telemetry"})).unwrap())
        .unwrap();
    tx.send(framing::encode_to_vec(&Message::error("nobody", "stray")).unwrap())
        .unwrap();
    drop(tx);

    let summary = Daemon::new(config(false, 0))
        .run(scripted(&[]), reader, extension.clone())
        .await
        .unwrap();

    assert_eq!(summary.extension_errors, 1);
    assert!(matches!(extension.messages().first(), Some(Message::Ready { .. })));
}

#[tokio::test]
async fn test_heartbeat_pings_are_answered() {
    let (tx, reader) = ChannelReader::new();
    let extension = Extension::new(tx, Responder::Ack { limit: 1 });

    let summary = Daemon::new(config(false, 1))
        .run(scripted(&[]), reader, extension.clone())
        .await
        .unwrap();

    assert_eq!(summary.pings_sent, 1);
    assert_eq!(summary.pongs, 1);
    let messages = extension.messages();
    assert!(matches!(messages.get(1), Some(Message::Ping { .. })));
}

#[tokio::test]
async fn test_custom_grammar_replaces_standard_rules() {
    let (_tx, reader) = ChannelReader::new();
    let extension = Extension::silent();

    let grammar = CommandGrammar::new(vec![GrammarRule::exact(
        CommandName::Reload,
        &["dance please"],
    )]);
    let summary = Daemon::new(config(true, 0))
        .with_grammar(grammar)
        .run(scripted(&["Dance, please!", "scroll down"]), reader, extension.clone())
        .await
        .unwrap();

    let messages = extension.messages();
    assert_eq!(messages.len(), 3);
    match &messages[1] {
        Message::Command(cmd) => {
            assert_eq!(cmd.name, CommandName::Reload);
            assert_eq!(cmd.meta.raw, "Dance, please!");
        }
        other => panic!("expected command, got {:?}", other),
    }
    match &messages[2] {
        Message::Error { message, .. } => assert_eq!(message, "Unknown command: scroll down"),
        other => panic!("expected error, got {:?}", other),
    }
    assert_eq!(summary.commands_sent, 1);
    assert_eq!(summary.unrecognized, 1);
}

//! Stdio transport for native messaging.
//!
//! The browser owns the other end of stdin/stdout. Exactly one thread reads
//! inbound frames and exactly one thread writes outbound frames; everything
//! else talks to the writer through an [`Outbox`], so frames never
//! interleave.

use std::io::{self, Read, Write};
use std::thread::{self, JoinHandle};

use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use xavier_shared::framing;
use xavier_shared::{Message, XavierError};

#[derive(Error, Debug)]
pub enum TransportError {
    /// The message failed validation or serialization.
    #[error("refusing to send message: {0}")]
    Protocol(#[from] XavierError),

    #[error("outbound stream closed")]
    Closed,
}

impl TransportError {
    /// Protocol error code, if the failure has one.
    pub fn code(&self) -> Option<i32> {
        match self {
            TransportError::Protocol(e) => Some(e.code()),
            TransportError::Closed => None,
        }
    }
}

/// Cloneable handle for queueing outbound messages.
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl Outbox {
    /// Validate and serialize on the caller's side, then queue the frame.
    /// Serialization faults surface here rather than on the writer thread.
    pub fn send(&self, message: &Message) -> Result<(), TransportError> {
        message.validate().map_err(XavierError::from)?;
        let frame = framing::encode_to_vec(message).map_err(XavierError::from)?;
        self.tx.send(frame).map_err(|_| TransportError::Closed)?;
        debug!("Queued {} message {}", message.kind(), message.id().unwrap_or("-"));
        Ok(())
    }
}

/// Owns the writer thread until shutdown.
pub struct WriterHandle {
    join: JoinHandle<usize>,
}

impl WriterHandle {
    /// Wait for every queued frame to be flushed. All [`Outbox`] clones must
    /// be dropped first. Returns the number of frames written.
    pub fn finish(self) -> usize {
        self.join.join().unwrap_or_else(|_| {
            error!("Writer thread panicked");
            0
        })
    }
}

/// Start the single writer for `output`.
pub fn spawn_writer<W: Write + Send + 'static>(mut output: W) -> io::Result<(Outbox, WriterHandle)> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let join = thread::Builder::new()
        .name("xavier-writer".to_string())
        .spawn(move || {
            let mut written = 0;
            while let Some(frame) = rx.blocking_recv() {
                if let Err(e) = output.write_all(&frame).and_then(|_| output.flush()) {
                    error!("Error sending message: {}", e);
                    break;
                }
                written += 1;
            }
            debug!("Writer stopped after {} frames", written);
            written
        })?;
    Ok((Outbox { tx }, WriterHandle { join }))
}

/// Start the single reader for `input`. The channel closes at end of
/// stream or when the stream becomes unusable; malformed frames are logged
/// and skipped.
pub fn spawn_reader<R: Read + Send + 'static>(
    mut input: R,
) -> io::Result<mpsc::UnboundedReceiver<Value>> {
    let (tx, rx) = mpsc::unbounded_channel();
    thread::Builder::new()
        .name("xavier-reader".to_string())
        .spawn(move || loop {
            match framing::try_decode::<_, Value>(&mut input) {
                Ok(value) => {
                    if tx.send(value).is_err() {
                        break;
                    }
                }
                Err(e) if e.is_recoverable() => framing::log_decode_failure(&e),
                Err(e) => {
                    framing::log_decode_failure(&e);
                    if !e.is_end_of_stream() {
                        info!("Inbound stream unusable, closing");
                    }
                    break;
                }
            }
        })?;
    Ok(rx)
}

//! Native messaging framing.
//!
//! A frame is a 4-byte unsigned length in native byte order followed by
//! exactly that many bytes of UTF-8 JSON. The browser uses the same layout
//! in both directions, so one codec serves the inbound and outbound streams.
//!
//! Frames are written and read whole. A caller must never interleave two
//! frames on the same stream.

use std::io::{ErrorKind, Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::FrameError;

/// Size of the length prefix.
pub const HEADER_LEN: usize = 4;

/// Serialize `message` into a complete frame (prefix + payload).
pub fn encode_to_vec<T: Serialize + ?Sized>(message: &T) -> Result<Vec<u8>, FrameError> {
    let payload = serde_json::to_vec(message).map_err(FrameError::Serialize)?;
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::TooLarge(payload.len()))?;

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&len.to_ne_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Write one frame and flush, so the peer sees it without buffering delay.
pub fn encode<W: Write, T: Serialize + ?Sized>(
    writer: &mut W,
    message: &T,
) -> Result<(), FrameError> {
    let frame = encode_to_vec(message)?;
    writer.write_all(&frame)?;
    writer.flush()?;
    debug!("Sent frame ({} payload bytes)", frame.len() - HEADER_LEN);
    Ok(())
}

/// Read one frame, reporting exactly why no message came out.
pub fn try_decode<R: Read, T: DeserializeOwned>(reader: &mut R) -> Result<T, FrameError> {
    let mut header = [0u8; HEADER_LEN];
    let received = read_full(reader, &mut header)?;
    if received < HEADER_LEN {
        return Err(FrameError::EndOfStream { received });
    }

    let expected = u32::from_ne_bytes(header) as usize;
    if expected == 0 {
        return Err(FrameError::ZeroLength);
    }

    // The declared length is untrusted; let the buffer grow with what arrives.
    let mut payload = Vec::with_capacity(expected.min(64 * 1024));
    let received = reader
        .by_ref()
        .take(expected as u64)
        .read_to_end(&mut payload)?;
    if received < expected {
        return Err(FrameError::Truncated { expected, received });
    }

    let message = serde_json::from_slice(&payload).map_err(FrameError::Payload)?;
    debug!("Received frame ({} payload bytes)", expected);
    Ok(message)
}

/// Read one frame. Any failure yields `None` and is logged; a bad frame
/// never takes the channel down.
pub fn decode<R: Read, T: DeserializeOwned>(reader: &mut R) -> Option<T> {
    match try_decode(reader) {
        Ok(message) => Some(message),
        Err(e) => {
            log_decode_failure(&e);
            None
        }
    }
}

/// Log a decode failure at a level matching its severity.
pub fn log_decode_failure(err: &FrameError) {
    match err {
        FrameError::EndOfStream { received: 0 } => debug!("Inbound stream closed"),
        FrameError::EndOfStream { received } => {
            debug!("EOF or incomplete length header ({} bytes)", received)
        }
        FrameError::ZeroLength => warn!("Received zero-length message"),
        FrameError::Truncated { expected, received } => {
            error!("Expected {} bytes, got {}", expected, received)
        }
        other => error!("Error reading message: {}", other),
    }
}

/// Fill `buf` as far as the stream allows; returns the bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, FrameError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(FrameError::Io(e)),
        }
    }
    Ok(filled)
}

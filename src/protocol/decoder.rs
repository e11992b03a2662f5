//! # Frame Decoder
//!
//! Reassembles newline-delimited frames from a byte stream and classifies
//! their contents.
//!
//! A TCP read may deliver zero, one or many complete frames plus at most one
//! incomplete trailing frame. [`FrameBuffer`] keeps the trailing bytes until
//! the rest of the frame arrives.

use bytes::{Bytes, BytesMut};
use serde_json::Value;

use super::encoder::FRAME_DELIMITER;
use super::messages::Acknowledgement;
use crate::error::Result;

/// Per-connection reassembly buffer
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: BytesMut,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes from one read
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Take the earliest complete frame, without its delimiter
    ///
    /// Returns `None` while no `\n` has been buffered; the partial frame
    /// stays in place for the next read.
    pub fn next_frame(&mut self) -> Option<Bytes> {
        let pos = self.buf.iter().position(|&b| b == FRAME_DELIMITER)?;
        let mut frame = self.buf.split_to(pos + 1);
        frame.truncate(pos);
        Some(frame.freeze())
    }

    /// Number of buffered bytes not yet forming a complete frame
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// What one frame turned out to contain
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Only whitespace; skipped without a reply
    Empty,
    /// A JSON document
    Parsed {
        value: Value,
        /// The frame exactly as received, surrounding whitespace removed
        text: String,
    },
    /// Bytes that are not JSON, carried as lossy UTF-8 for logging
    InvalidFrame(String),
}

/// Classify the contents of one frame
///
/// # Examples
///
/// ```
/// use thermolink::protocol::decoder::{parse_frame, FrameOutcome};
///
/// assert_eq!(parse_frame(b"  \r"), FrameOutcome::Empty);
/// assert!(matches!(parse_frame(b"{\"celsius\":1.0}"), FrameOutcome::Parsed { .. }));
/// assert!(matches!(parse_frame(b"hello"), FrameOutcome::InvalidFrame(_)));
/// ```
pub fn parse_frame(frame: &[u8]) -> FrameOutcome {
    let line = trim_ascii(frame);
    if line.is_empty() {
        return FrameOutcome::Empty;
    }

    match serde_json::from_slice::<Value>(line) {
        Ok(value) => FrameOutcome::Parsed {
            value,
            text: String::from_utf8_lossy(line).into_owned(),
        },
        Err(_) => FrameOutcome::InvalidFrame(String::from_utf8_lossy(line).into_owned()),
    }
}

/// Decode an acknowledgement frame received by the node
pub fn decode_acknowledgement(frame: &[u8]) -> Result<Acknowledgement> {
    Ok(serde_json::from_slice(trim_ascii(frame))?)
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}

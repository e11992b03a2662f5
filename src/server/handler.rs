//! # Connection Handler
//!
//! Owns one accepted connection: buffers incoming bytes, extracts frames and
//! answers each one with an acknowledgement.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::protocol::decoder::{parse_frame, FrameBuffer, FrameOutcome};
use crate::protocol::encoder::encode_frame;
use crate::protocol::messages::Acknowledgement;
use crate::telemetry::{LogEntry, TelemetrySink};

/// Bytes requested per read
const READ_CHUNK_SIZE: usize = 1024;

/// Result of one read from the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes were appended to the frame buffer
    Data(usize),
    /// Zero-length read: the peer closed its side
    PeerClosed,
}

/// Per-connection counters reported when the handler exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Frames answered with a success acknowledgement
    pub acknowledged: u64,
    /// Frames answered with an error acknowledgement
    pub rejected: u64,
    /// Whitespace-only frames skipped without a reply
    pub skipped: u64,
}

/// Server side of one client connection
pub struct ConnectionHandler<S> {
    stream: S,
    peer: SocketAddr,
    sink: Arc<dyn TelemetrySink>,
    buffer: FrameBuffer,
    summary: SessionSummary,
}

impl<S> std::fmt::Debug for ConnectionHandler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandler")
            .field("peer", &self.peer)
            .field("pending", &self.buffer.pending())
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> ConnectionHandler<S> {
    pub fn new(stream: S, peer: SocketAddr, sink: Arc<dyn TelemetrySink>) -> Self {
        Self {
            stream,
            peer,
            sink,
            buffer: FrameBuffer::new(),
            summary: SessionSummary::default(),
        }
    }

    /// Serve the connection until the peer closes it
    ///
    /// Every complete frame is answered in arrival order. A trailing partial
    /// frame is kept until its newline arrives, and is discarded if the peer
    /// closes first.
    ///
    /// # Errors
    ///
    /// Returns the first read or write error; no acknowledgements are sent
    /// after it.
    pub async fn run(mut self) -> Result<SessionSummary> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        loop {
            match self.read_some(&mut chunk).await? {
                ReadOutcome::PeerClosed => {
                    if !self.buffer.is_empty() {
                        debug!(
                            "{} closed with {} unterminated bytes",
                            self.peer,
                            self.buffer.pending()
                        );
                    }
                    return Ok(self.summary);
                }
                ReadOutcome::Data(_) => {
                    while let Some(frame) = self.buffer.next_frame() {
                        self.process_frame(&frame).await?;
                    }
                }
            }
        }
    }

    async fn read_some(&mut self, chunk: &mut [u8]) -> Result<ReadOutcome> {
        let n = self.stream.read(chunk).await?;
        if n == 0 {
            return Ok(ReadOutcome::PeerClosed);
        }
        self.buffer.extend(&chunk[..n]);
        Ok(ReadOutcome::Data(n))
    }

    async fn process_frame(&mut self, frame: &[u8]) -> Result<()> {
        match parse_frame(frame) {
            FrameOutcome::Empty => {
                self.summary.skipped += 1;
                Ok(())
            }
            FrameOutcome::InvalidFrame(text) => {
                warn!("{} - Non-JSON: {}", self.peer, text);
                self.summary.rejected += 1;
                self.reply(&Acknowledgement::invalid_json()).await
            }
            FrameOutcome::Parsed { value, text } => {
                info!("{} - {}", self.peer, text);
                let entry = LogEntry::now(self.peer, value, text);
                if let Err(e) = self.sink.append(&entry).await {
                    error!("Log write error: {}", e);
                }
                self.summary.acknowledged += 1;
                self.reply(&Acknowledgement::received_now()).await
            }
        }
    }

    async fn reply(&mut self, ack: &Acknowledgement) -> Result<()> {
        let frame = encode_frame(ack)?;
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        Ok(())
    }
}

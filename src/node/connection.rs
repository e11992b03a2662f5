//! # Connection Manager
//!
//! Owns the node's TCP connection to the telemetry server.
//!
//! ## States
//!
//! ```text
//! Disconnected --connect--> Connecting --ok--> Connected
//!      ^                        |                  |
//!      +-------- failure -------+---- failure -----+
//! ```
//!
//! Any socket-level failure (connect error, write error, peer close, ack
//! timeout) closes the socket and returns to `Disconnected`; the next send
//! cycle reconnects.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration, Instant};
use tracing::{debug, info, warn};

use super::reconnect::ReconnectPolicy;
use crate::config::NodeConfig;
use crate::error::{Result, TelemetryError};
use crate::protocol::decoder::{decode_acknowledgement, FrameBuffer};
use crate::protocol::encoder::encode_frame;
use crate::protocol::messages::{Acknowledgement, Payload};

/// Bytes requested per read while waiting for an acknowledgement
const ACK_READ_CHUNK: usize = 64;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Reply line received after a send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckReply {
    /// A well-formed acknowledgement
    Ack(Acknowledgement),
    /// A line that is not an acknowledgement, kept for logging
    Raw(String),
}

/// Client side connection lifecycle
pub struct ConnectionManager {
    addr: String,
    connect_timeout: Duration,
    ack_timeout: Duration,
    policy: ReconnectPolicy,
    state: ConnectionState,
    stream: Option<TcpStream>,
    buffer: FrameBuffer,
    consecutive_failures: u32,
    retry_at: Option<Instant>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("addr", &self.addr)
            .field("state", &self.state)
            .field("consecutive_failures", &self.consecutive_failures)
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Create a manager in the `Disconnected` state
    ///
    /// # Arguments
    ///
    /// * `addr` - Server address (`host:port`)
    /// * `connect_timeout` - Upper bound on one connect attempt
    /// * `ack_timeout` - Upper bound on the wait for an acknowledgement
    /// * `policy` - Pacing of connect attempts
    pub fn new(
        addr: impl Into<String>,
        connect_timeout: Duration,
        ack_timeout: Duration,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout,
            ack_timeout,
            policy,
            state: ConnectionState::Disconnected,
            stream: None,
            buffer: FrameBuffer::new(),
            consecutive_failures: 0,
            retry_at: None,
        }
    }

    pub fn from_config(config: &NodeConfig) -> Self {
        Self::new(
            config.server_addr(),
            config.connect_timeout(),
            config.ack_timeout(),
            ReconnectPolicy::fixed(config.reconnect_interval()),
        )
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Connect if currently disconnected
    ///
    /// Does nothing when already connected. When the reconnect policy says
    /// it is too early for another attempt, returns `NotConnected` without
    /// touching the network.
    ///
    /// # Errors
    ///
    /// - `Connect`: the connection was refused or failed
    /// - `ConnectTimeout`: no connection within the connect timeout
    /// - `NotConnected`: the next attempt is not due yet
    pub async fn ensure_connected(&mut self) -> Result<()> {
        if self.state == ConnectionState::Connected {
            return Ok(());
        }

        let now = Instant::now();
        if !self.policy.should_attempt(self.retry_at, now) {
            debug!("Reconnect to {} not due yet", self.addr);
            return Err(TelemetryError::NotConnected);
        }

        self.state = ConnectionState::Connecting;
        info!("Attempting TCP connect to {}", self.addr);

        let result = match timeout(self.connect_timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(TelemetryError::Connect {
                addr: self.addr.clone(),
                reason: e.to_string(),
            }),
            Err(_) => Err(TelemetryError::ConnectTimeout(self.addr.clone())),
        };

        match result {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("Failed to set TCP_NODELAY: {}", e);
                }
                self.stream = Some(stream);
                self.buffer = FrameBuffer::new();
                self.state = ConnectionState::Connected;
                self.consecutive_failures = 0;
                self.retry_at = None;
                info!("TCP: connected to {}", self.addr);
                Ok(())
            }
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.retry_at = Some(now + self.policy.delay_after(self.consecutive_failures));
                self.disconnect();
                Err(e)
            }
        }
    }

    /// Send one payload and wait for its acknowledgement
    ///
    /// # Errors
    ///
    /// Any transport error (write failure, peer close, ack timeout) closes
    /// the socket and leaves the manager `Disconnected`.
    pub async fn send(&mut self, payload: &Payload) -> Result<AckReply> {
        let result = self.exchange(payload).await;
        if let Err(e) = &result {
            if e.is_transport() {
                warn!("Dropping connection to {}: {}", self.addr, e);
                self.disconnect();
            }
        }
        result
    }

    /// Close the socket, if any, and return to `Disconnected`
    pub fn disconnect(&mut self) {
        if self.stream.take().is_some() {
            debug!("Closed connection to {}", self.addr);
        }
        self.buffer = FrameBuffer::new();
        self.state = ConnectionState::Disconnected;
    }

    async fn exchange(&mut self, payload: &Payload) -> Result<AckReply> {
        let frame = encode_frame(payload)?;
        let stream = self.stream.as_mut().ok_or(TelemetryError::NotConnected)?;

        stream.write_all(&frame).await?;
        debug!("Sent {} byte frame to {}", frame.len(), self.addr);

        let ack_timeout = self.ack_timeout;
        match timeout(ack_timeout, read_reply(stream, &mut self.buffer)).await {
            Ok(reply) => reply,
            Err(_) => Err(TelemetryError::AckTimeout(ack_timeout)),
        }
    }
}

async fn read_reply(stream: &mut TcpStream, buffer: &mut FrameBuffer) -> Result<AckReply> {
    let mut chunk = [0u8; ACK_READ_CHUNK];

    loop {
        while let Some(frame) = buffer.next_frame() {
            if frame.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Ok(match decode_acknowledgement(&frame) {
                Ok(ack) => AckReply::Ack(ack),
                Err(_) => AckReply::Raw(String::from_utf8_lossy(&frame).into_owned()),
            });
        }

        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(TelemetryError::PeerClosed);
        }
        buffer.extend(&chunk[..n]);
    }
}

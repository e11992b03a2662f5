//! # Error Types
//!
//! Custom error types for Thermolink using `thiserror`.

use std::time::Duration;
use thiserror::Error;

/// Main error type for Thermolink
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TCP connect was refused or failed
    #[error("Failed to connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    /// TCP connect did not complete in time
    #[error("Timed out connecting to {0}")]
    ConnectTimeout(String),

    /// No acknowledgement arrived within the ack window
    #[error("No acknowledgement within {0:?}")]
    AckTimeout(Duration),

    /// Peer closed the stream
    #[error("Connection closed by peer")]
    PeerClosed,

    /// Send attempted without an open connection
    #[error("Not connected")]
    NotConnected,

    /// Hardware sensor read failures
    #[error("Sensor error: {0}")]
    Sensor(String),
}

impl TelemetryError {
    /// Whether the error belongs to the socket layer.
    ///
    /// The node drops its connection on any of these and reconnects on a later cycle.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            TelemetryError::Io(_)
                | TelemetryError::Connect { .. }
                | TelemetryError::ConnectTimeout(_)
                | TelemetryError::AckTimeout(_)
                | TelemetryError::PeerClosed
                | TelemetryError::NotConnected
        )
    }
}

/// Result type alias for Thermolink
pub type Result<T> = std::result::Result<T, TelemetryError>;

//! # Protocol Messages
//!
//! Payload sent by the sensor node and acknowledgements sent back by the server.

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::sensor::Reading;

/// Timestamp format used in acknowledgements and log lines
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time as `YYYY-MM-DD HH:MM:SS`
pub fn timestamp_now() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Temperature payload (client → server)
///
/// Serializes as `{"celsius": 22.5, "fahrenheit": 72.5}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub celsius: f64,
    pub fahrenheit: f64,
}

impl Payload {
    /// Build a payload, rounding both values to two decimal places
    pub fn new(celsius: f64, fahrenheit: f64) -> Self {
        Self {
            celsius: round2(celsius),
            fahrenheit: round2(fahrenheit),
        }
    }
}

impl From<&Reading> for Payload {
    fn from(reading: &Reading) -> Self {
        Payload::new(reading.celsius, reading.fahrenheit)
    }
}

/// Reason carried by an error acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckErrorReason {
    /// Frame contents were not valid JSON
    InvalidJson,
}

/// Acknowledgement (server → client)
///
/// - `{"status": "ok", "received": "2024-01-01 00:00:00"}`
/// - `{"status": "error", "reason": "invalid_json"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Acknowledgement {
    Ok { received: String },
    Error { reason: AckErrorReason },
}

impl Acknowledgement {
    /// Success acknowledgement stamped with the current time
    pub fn received_now() -> Self {
        Acknowledgement::Ok {
            received: timestamp_now(),
        }
    }

    /// Error acknowledgement for a frame that failed to parse
    pub fn invalid_json() -> Self {
        Acknowledgement::Error {
            reason: AckErrorReason::InvalidJson,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Acknowledgement::Ok { .. })
    }
}

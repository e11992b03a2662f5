//! # Telemetry Module
//!
//! Append-only record of every reading the server accepted.
//!
//! This module handles:
//! - Formatting log entries as `<timestamp> - <peer> - <json>` lines
//! - Serializing appends from concurrent connection handlers
//! - Mirroring temperature columns to an optional CSV file
//!
//! The log grows without bound; there is no rotation.

use async_trait::async_trait;
use serde_json::Value;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::Result;
use crate::protocol::messages::timestamp_now;

/// Header of the CSV mirror
pub const CSV_HEADER: &str = "timestamp,client,celsius,fahrenheit\n";

/// One accepted reading
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub timestamp: String,
    pub peer: SocketAddr,
    pub value: Value,
    /// JSON text as received, written to the log unchanged
    pub raw: String,
}

impl LogEntry {
    /// Stamp a parsed frame with the current time
    pub fn now(peer: SocketAddr, value: Value, raw: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp_now(),
            peer,
            value,
            raw: raw.into(),
        }
    }

    /// Log file line, including the trailing newline
    pub fn to_line(&self) -> String {
        format!("{} - {} - {}\n", self.timestamp, self.peer, self.raw)
    }

    /// CSV mirror line; missing fields are left blank
    pub fn to_csv_line(&self) -> String {
        let column = |key: &str| match self.value.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        format!(
            "{},{},{},{}\n",
            self.timestamp,
            self.peer,
            column("celsius"),
            column("fahrenheit")
        )
    }
}

/// Destination shared by all connection handlers
///
/// Implementations must make each append atomic with respect to the others.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn append(&self, entry: &LogEntry) -> Result<()>;
}

struct LogFiles {
    log: File,
    csv: Option<File>,
}

/// File-backed telemetry log
///
/// Every append takes one lock, writes each line with a single `write_all`
/// and flushes, so lines from different connections never interleave.
pub struct TelemetryLog {
    path: PathBuf,
    files: Mutex<LogFiles>,
}

impl std::fmt::Debug for TelemetryLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryLog")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl TelemetryLog {
    /// Open (or create) the log, and the CSV mirror when a path is given
    ///
    /// # Errors
    ///
    /// Returns error if either file cannot be opened for appending
    pub async fn open<P: AsRef<Path>>(path: P, csv_path: Option<&Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let log = open_append(&path).await?;

        let csv = match csv_path {
            Some(csv_path) => {
                let mut csv = open_append(csv_path).await?;
                if csv.metadata().await?.len() == 0 {
                    csv.write_all(CSV_HEADER.as_bytes()).await?;
                    csv.flush().await?;
                }
                info!("Mirroring readings to CSV at {}", csv_path.display());
                Some(csv)
            }
            None => None,
        };

        info!("Telemetry log at {}", path.display());
        Ok(Self {
            path,
            files: Mutex::new(LogFiles { log, csv }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TelemetrySink for TelemetryLog {
    async fn append(&self, entry: &LogEntry) -> Result<()> {
        let line = entry.to_line();
        let mut files = self.files.lock().await;

        files.log.write_all(line.as_bytes()).await?;
        files.log.flush().await?;

        if let Some(csv) = files.csv.as_mut() {
            csv.write_all(entry.to_csv_line().as_bytes()).await?;
            csv.flush().await?;
        }

        Ok(())
    }
}

async fn open_append(path: &Path) -> Result<File> {
    Ok(OpenOptions::new().create(true).append(true).open(path).await?)
}

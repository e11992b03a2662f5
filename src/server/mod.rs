//! # Server Module
//!
//! TCP listener that terminates sensor node connections.
//!
//! This module handles:
//! - Binding the listen address with `SO_REUSEADDR`
//! - Accepting connections for the lifetime of the process
//! - Handing each connection to a [`Dispatcher`]
//! - Sharing one [`TelemetrySink`] across all handlers
//!
//! The default dispatcher spawns one task per connection with no upper
//! bound on concurrent connections. A bounded pool or admission control can
//! be plugged in through [`Dispatcher`] without touching the handler.

pub mod handler;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::{lookup_host, TcpListener, TcpSocket, TcpStream};
use tokio::time::Duration;
use tracing::{info, warn};

use crate::error::{Result, TelemetryError};
use crate::telemetry::TelemetrySink;
pub use handler::{ConnectionHandler, ReadOutcome, SessionSummary};

/// Pending connection queue length passed to `listen`
const LISTEN_BACKLOG: u32 = 128;

/// Pause after a failed `accept` (e.g. file descriptor exhaustion)
const ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(100);

/// IPv4 and IPv6 addresses of the host's network interfaces
///
/// Nodes need one of these as their `server_host`. An enumeration failure is
/// logged and yields an empty list.
pub fn local_interfaces() -> Vec<(String, IpAddr)> {
    match local_ip_address::list_afinet_netifas() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            warn!("Failed to list network interfaces: {}", e);
            Vec::new()
        }
    }
}

/// Schedules the handling of accepted connections
pub trait Dispatcher: Send + Sync + 'static {
    fn dispatch(&self, stream: TcpStream, peer: SocketAddr, sink: Arc<dyn TelemetrySink>);
}

/// One tokio task per connection, unbounded
#[derive(Debug, Clone, Copy, Default)]
pub struct SpawnPerConnection;

impl Dispatcher for SpawnPerConnection {
    fn dispatch(&self, stream: TcpStream, peer: SocketAddr, sink: Arc<dyn TelemetrySink>) {
        tokio::spawn(async move {
            info!("Connected from {}", peer);
            match ConnectionHandler::new(stream, peer, sink).run().await {
                Ok(summary) => info!(
                    "Connection closed {} ({} ok, {} invalid)",
                    peer, summary.acknowledged, summary.rejected
                ),
                Err(e) => warn!("Error with {}: {}", peer, e),
            }
        });
    }
}

/// Telemetry server listener
pub struct TelemetryServer<D = SpawnPerConnection> {
    listener: TcpListener,
    sink: Arc<dyn TelemetrySink>,
    dispatcher: D,
}

impl<D> std::fmt::Debug for TelemetryServer<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryServer")
            .field("local_addr", &self.listener.local_addr().ok())
            .finish_non_exhaustive()
    }
}

impl<D: Dispatcher> TelemetryServer<D> {
    /// Bind the listen address
    ///
    /// # Arguments
    ///
    /// * `addr` - `host:port`, e.g. `0.0.0.0:5005`
    /// * `sink` - Telemetry log shared by every connection
    /// * `dispatcher` - Scheduling policy for accepted connections
    ///
    /// # Errors
    ///
    /// Returns error if the address does not resolve or cannot be bound
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use thermolink::server::{SpawnPerConnection, TelemetryServer};
    /// use thermolink::telemetry::TelemetryLog;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let log = TelemetryLog::open("pico_temps.log", None).await?;
    ///     let server = TelemetryServer::bind("0.0.0.0:5005", Arc::new(log), SpawnPerConnection).await?;
    ///     server.run().await;
    ///     Ok(())
    /// }
    /// ```
    pub async fn bind(addr: &str, sink: Arc<dyn TelemetrySink>, dispatcher: D) -> Result<Self> {
        let socket_addr = lookup_host(addr).await?.next().ok_or_else(|| {
            TelemetryError::Io(std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                format!("{} did not resolve to any address", addr),
            ))
        })?;

        let socket = if socket_addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.bind(socket_addr)?;
        let listener = socket.listen(LISTEN_BACKLOG)?;

        info!("Listening on {} (TCP)", listener.local_addr()?);
        Ok(Self {
            listener,
            sink,
            dispatcher,
        })
    }

    /// Address actually bound (resolves port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever
    ///
    /// Never waits on client I/O. Accept errors are logged and the loop
    /// carries on; only dropping the future stops it.
    pub async fn run(&self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    self.dispatcher.dispatch(stream, peer, Arc::clone(&self.sink));
                }
                Err(e) => {
                    warn!("Accept error: {}", e);
                    tokio::time::sleep(ACCEPT_ERROR_PAUSE).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decoder::decode_acknowledgement;
    use crate::telemetry::mocks::MemorySink;
    use crate::telemetry::TelemetryLog;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::time::timeout;

    #[test]
    fn test_local_interfaces_include_loopback() {
        let interfaces = local_interfaces();
        assert!(
            interfaces.iter().any(|(_, ip)| ip.is_loopback()),
            "no loopback in {:?}",
            interfaces
        );
    }

    async fn start<D: Dispatcher>(sink: Arc<dyn TelemetrySink>, dispatcher: D) -> SocketAddr {
        let server = TelemetryServer::bind("127.0.0.1:0", sink, dispatcher).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move { server.run().await });
        addr
    }

    async fn send_and_read_ack(addr: SocketAddr, frame: &[u8]) -> String {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        write_half.write_all(frame).await.unwrap();

        let mut reader = BufReader::new(read_half);
        let mut line = String::new();
        timeout(Duration::from_secs(5), reader.read_line(&mut line))
            .await
            .unwrap()
            .unwrap();
        line
    }

    #[tokio::test]
    async fn test_single_client_round_trip() {
        let sink = MemorySink::new();
        let addr = start(Arc::new(sink.clone()), SpawnPerConnection).await;

        let line = send_and_read_ack(addr, b"{\"celsius\": 22.5, \"fahrenheit\": 72.5}\n").await;
        assert!(line.starts_with("{\"status\":\"ok\",\"received\":\""));
        assert!(line.ends_with("\"}\n"));
        assert_eq!(sink.get_entries().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_clients_each_get_ack_and_log_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pico_temps.log");
        let log = TelemetryLog::open(&path, None).await.unwrap();
        let addr = start(Arc::new(log), SpawnPerConnection).await;

        let clients = 32;
        let mut tasks = Vec::new();
        for i in 0..clients {
            tasks.push(tokio::spawn(async move {
                let frame = format!("{{\"celsius\":{}.5,\"fahrenheit\":{}.5}}\n", i, i + 32);
                let line = send_and_read_ack(addr, frame.as_bytes()).await;
                decode_acknowledgement(line.as_bytes()).unwrap()
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }

        // Every ack is sent after its line is flushed
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), clients);
        for line in lines {
            let parts: Vec<_> = line.splitn(3, " - ").collect();
            assert_eq!(parts.len(), 3);
            assert!(parts[1].starts_with("127.0.0.1:"));
            let value: serde_json::Value = serde_json::from_str(parts[2]).unwrap();
            assert!(value["celsius"].is_f64());
        }
    }

    #[tokio::test]
    async fn test_invalid_client_does_not_affect_others() {
        let sink = MemorySink::new();
        let addr = start(Arc::new(sink.clone()), SpawnPerConnection).await;

        let bad = send_and_read_ack(addr, b"}{\n").await;
        assert_eq!(bad, "{\"status\":\"error\",\"reason\":\"invalid_json\"}\n");

        let good = send_and_read_ack(addr, b"{\"celsius\":3.0}\n").await;
        assert!(decode_acknowledgement(good.as_bytes()).unwrap().is_ok());
        assert_eq!(sink.get_entries().len(), 1);
    }

    #[tokio::test]
    async fn test_custom_dispatcher_receives_connections() {
        struct Counting(Arc<AtomicUsize>);

        impl Dispatcher for Counting {
            fn dispatch(&self, stream: TcpStream, peer: SocketAddr, sink: Arc<dyn TelemetrySink>) {
                self.0.fetch_add(1, Ordering::SeqCst);
                SpawnPerConnection.dispatch(stream, peer, sink);
            }
        }

        let count = Arc::new(AtomicUsize::new(0));
        let addr = start(Arc::new(MemorySink::new()), Counting(Arc::clone(&count))).await;

        send_and_read_ack(addr, b"{\"n\":1}\n").await;
        send_and_read_ack(addr, b"{\"n\":2}\n").await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_bind_unresolvable_host_fails() {
        let result = TelemetryServer::bind(
            "no-such-host.invalid:5005",
            Arc::new(MemorySink::new()),
            SpawnPerConnection,
        )
        .await;
        assert!(result.is_err());
    }
}

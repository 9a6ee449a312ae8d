//! Monitor Connection Management
//!
//! This module handles the persistent TCP connection to the genmon monitor daemon.
//! It maintains a single long-lived connection that is reused for every command,
//! and serializes command traffic so a response is always paired with its command.
//!
//! # Wire Format
//!
//! ```text
//! client → monitor:  "generator: status_json"             (raw ASCII, no terminator)
//! monitor → client:  "{...json...}EndOfMessage"           (may arrive in many chunks)
//! ```
//!
//! Right after a connection is accepted the monitor writes a startup banner
//! (`OK`, `CRITICAL: ...` or `WARNING: ...`) that carries no terminator. A
//! monitor that stays silent until the first command is accepted as well.
//!
//! # Failure Handling
//!
//! - Connect failures are retried with a fixed delay up to a bounded count; when
//!   the budget is exhausted the error is fatal for the process.
//! - Any I/O error, EOF, timeout or framing problem during a command closes the
//!   socket and reconnects immediately. The command itself reports an error; the
//!   caller retries on its next poll tick.

use crate::config::MonitorConfig;
use crate::error::{ExporterError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

/// Sentinel that terminates every monitor response.
pub const END_OF_MESSAGE: &str = "EndOfMessage";

/// Prefixes of the unsolicited banner the monitor sends on connect.
pub const STARTUP_TOKENS: [&str; 3] = ["OK", "CRITICAL:", "WARNING:"];

/// Upper bound on a single framed response.
const MAX_RESPONSE_BYTES: usize = 8 * 1024 * 1024;

const READ_CHUNK: usize = 64 * 1024;

/// Returns true when `data` starts with one of the startup banner tokens.
pub fn is_startup_message(data: &str) -> bool {
    STARTUP_TOKENS.iter().any(|token| data.starts_with(token))
}

/// Manages a persistent TCP connection to the monitor daemon
pub struct ConnectionManager {
    config: Arc<MonitorConfig>,
    connection: Mutex<Option<TcpStream>>,
}

impl ConnectionManager {
    /// Create a new connection manager. No socket is opened until [`connect`](Self::connect)
    /// or the first command.
    pub fn new(config: Arc<MonitorConfig>) -> Self {
        Self {
            config,
            connection: Mutex::new(None),
        }
    }

    fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.config.io_timeout_seconds.max(1))
    }

    /// Open the connection, retrying with a fixed delay.
    ///
    /// Returns [`ExporterError::ConnectRetriesExhausted`] once the retry budget
    /// is spent; callers treat that as fatal.
    pub async fn connect(&self) -> Result<()> {
        let mut conn_guard = self.connection.lock().await;
        let stream = self.open_with_retries().await?;
        *conn_guard = Some(stream);
        Ok(())
    }

    async fn open_with_retries(&self) -> Result<TcpStream> {
        let addr = self.config.address();
        let max_attempts = self.config.connect_retries.max(1);
        let delay = Duration::from_millis(self.config.retry_delay_ms);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.open_once(&addr).await {
                Ok(stream) => return Ok(stream),
                Err(e) if attempt >= max_attempts => {
                    error!(
                        "Connect to {} failed after {} attempts: {}",
                        addr, max_attempts, e
                    );
                    return Err(ExporterError::ConnectRetriesExhausted {
                        addr,
                        attempts: max_attempts,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!(
                        "Connection attempt {}/{} to {} failed: {}. Retrying in {:?}",
                        attempt, max_attempts, addr, e, delay
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    async fn open_once(&self, addr: &str) -> Result<TcpStream> {
        debug!("Connecting to monitor at {}", addr);
        let mut stream = timeout(self.io_timeout(), TcpStream::connect(addr))
            .await
            .map_err(|_| ExporterError::Connection(format!("connect to {} timed out", addr)))??;

        // The banner has no terminator: a single read is the whole message.
        // Its absence is tolerated; only a hangup or a read error fails the attempt.
        let mut buf = vec![0u8; READ_CHUNK];
        match timeout(self.io_timeout(), stream.read(&mut buf)).await {
            Ok(Ok(0)) => Err(ExporterError::Connection(
                "connection closed before startup banner".to_string(),
            )),
            Ok(Ok(n)) => {
                let banner = String::from_utf8_lossy(&buf[..n]);
                info!("Monitor startup message: {}", banner.trim());
                Ok(stream)
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                debug!("No startup banner from {}", addr);
                Ok(stream)
            }
        }
    }

    /// Send one command and wait for its framed response.
    ///
    /// Only one command is in flight at a time. On any transport or framing
    /// failure the socket is replaced before the error is returned.
    pub async fn send_command(&self, cmd: &str) -> Result<String> {
        if cmd.is_empty() {
            return Err(ExporterError::InvalidCommand(cmd.to_string()));
        }

        let mut conn_guard = self.connection.lock().await;

        if conn_guard.is_none() {
            info!("Establishing connection to monitor...");
            *conn_guard = Some(self.open_with_retries().await?);
        }

        let exchange = match conn_guard.as_mut() {
            Some(stream) => self.exchange(stream, cmd).await,
            None => Err(ExporterError::Connection("no active connection".to_string())),
        };

        match exchange {
            Ok(response) => Ok(response),
            Err(ExporterError::StartupBanner(banner)) => {
                warn!("Startup message received in reply to '{}': {}", cmd, banner);
                Err(ExporterError::StartupBanner(banner))
            }
            Err(e) => {
                warn!("Command '{}' failed, reconnecting: {}", cmd, e);
                // Drop the broken socket before dialing again.
                *conn_guard = None;
                *conn_guard = Some(self.open_with_retries().await?);
                Err(e)
            }
        }
    }

    async fn exchange(&self, stream: &mut TcpStream, cmd: &str) -> Result<String> {
        debug!("Sending command: {}", cmd);
        timeout(self.io_timeout(), stream.write_all(cmd.as_bytes()))
            .await
            .map_err(|_| ExporterError::Connection(format!("timed out sending '{}'", cmd)))??;

        let raw = self.read_framed(stream).await?;
        let text = String::from_utf8(raw)
            .map_err(|e| ExporterError::Framing(format!("response is not UTF-8: {}", e)))?;

        if is_startup_message(&text) {
            return Err(ExporterError::StartupBanner(text.trim().to_string()));
        }
        Ok(text)
    }

    /// Read until the accumulated bytes contain the terminator and return the
    /// bytes before it. Any chunk that starts a banner ends the read early.
    async fn read_framed(&self, stream: &mut TcpStream) -> Result<Vec<u8>> {
        let terminator = END_OF_MESSAGE.as_bytes();
        let mut data: Vec<u8> = Vec::new();
        let mut chunk = vec![0u8; READ_CHUNK];

        loop {
            let n = timeout(self.io_timeout(), stream.read(&mut chunk))
                .await
                .map_err(|_| ExporterError::Connection("timed out waiting for response".into()))??;
            if n == 0 {
                return Err(ExporterError::Connection(
                    "connection closed by monitor".to_string(),
                ));
            }

            // A banner replaces anything accumulated so far: the monitor restarted.
            let received = &chunk[..n];
            if starts_with_token(received) && find(received, terminator).is_none() {
                if !data.is_empty() {
                    warn!(
                        "Startup message received during a multi-part response; dropping {} bytes",
                        data.len()
                    );
                }
                return Ok(received.to_vec());
            }

            data.extend_from_slice(received);

            if let Some(end) = find(&data, terminator) {
                if end + terminator.len() < data.len() {
                    debug!(
                        "Discarding {} bytes after terminator",
                        data.len() - end - terminator.len()
                    );
                }
                data.truncate(end);
                return Ok(data);
            }

            if data.len() > MAX_RESPONSE_BYTES {
                return Err(ExporterError::Framing(format!(
                    "no terminator within {} bytes",
                    MAX_RESPONSE_BYTES
                )));
            }
        }
    }

    /// Close the connection
    pub async fn close(&self) {
        let mut conn_guard = self.connection.lock().await;
        if let Some(mut stream) = conn_guard.take() {
            let _ = stream.shutdown().await;
            info!("Monitor connection closed");
        }
    }

    /// Whether a socket is currently held.
    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }
}

fn starts_with_token(bytes: &[u8]) -> bool {
    STARTUP_TOKENS
        .iter()
        .any(|token| bytes.starts_with(token.as_bytes()))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

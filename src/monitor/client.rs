//! Genmon Monitor Client
//!
//! This module provides a client for the genmon monitor daemon's command protocol.
//! Every call is one textual command answered by one `EndOfMessage`-framed response.
//!
//! # Example
//!
//! ```no_run
//! use genmon_exporter::config::MonitorConfig;
//! use genmon_exporter::monitor::MonitorClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = MonitorClient::new(MonitorConfig::default());
//! client.connect().await?;
//! let status = client.send_command("generator: status_json").await?;
//! # Ok(())
//! # }
//! ```

use crate::config::MonitorConfig;
use crate::error::{ExporterError, Result};
use crate::monitor::connection::ConnectionManager;
use crate::monitor::types::{DocumentKind, StartInfo};
use crate::status::StatusNode;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Client for the monitor command protocol
///
/// # Thread Safety
///
/// This client is `Send` and `Sync`. Concurrent callers are serialized by the
/// underlying [`ConnectionManager`]; commands are never pipelined.
pub struct MonitorClient {
    connection_manager: ConnectionManager,
}

impl MonitorClient {
    pub fn new(config: MonitorConfig) -> Self {
        let connection_manager = ConnectionManager::new(Arc::new(config));
        Self { connection_manager }
    }

    /// Open the connection eagerly (retrying up to the configured bound).
    pub async fn connect(&self) -> Result<()> {
        self.connection_manager.connect().await
    }

    /// Send a raw command and return the unframed response.
    pub async fn send_command(&self, cmd: &str) -> Result<String> {
        self.connection_manager.send_command(cmd).await
    }

    /// Query `generator: start_info_json`
    pub async fn query_start_info(&self) -> Result<StartInfo> {
        let data = self.send_command("generator: start_info_json").await?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Query one status document and return the value under its top-level key.
    pub async fn query_document(&self, kind: DocumentKind, numeric: bool) -> Result<Value> {
        let data = self.send_command(kind.command(numeric)).await?;
        let mut parsed: Value = serde_json::from_str(&data)?;
        debug!("{} response received", kind.key());

        parsed
            .as_object_mut()
            .and_then(|map| map.remove(kind.key()))
            .ok_or_else(|| {
                ExporterError::Framing(format!("response has no '{}' section", kind.key()))
            })
    }

    /// Fetch all status documents and merge them into one
    /// `{Status, Maintenance, Outage, Monitor}` tree.
    pub async fn fetch_status_document(&self, numeric: bool) -> Result<StatusNode> {
        let mut merged = Map::new();
        for kind in DocumentKind::ALL {
            let section = self.query_document(kind, numeric).await?;
            merged.insert(kind.key().to_string(), section);
        }
        Ok(StatusNode::from(Value::Object(merged)))
    }

    /// Close the connection
    pub async fn close(&self) {
        self.connection_manager.close().await
    }
}

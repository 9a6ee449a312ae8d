//! Genmon Generator Exporter
//!
//! Re-publishes the state of a genmon generator monitor over SNMP.
//!
//! # Overview
//!
//! The exporter polls the monitor's textual command protocol, reduces the
//! returned JSON status documents to a stream of changed leaf values and keeps
//! an SNMP MIB up to date with them. External SNMP managers query the MIB
//! through a small read-only SNMPv1/v2c agent.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐   TCP, EndOfMessage   ┌──────────────────────────┐
//! │   genmon    │ ◄───────────────────► │ MonitorClient            │
//! │   monitor   │   framed commands     │   │                      │
//! └─────────────┘                       │   ▼                      │
//!                                       │ StatusTreeDiffer ─► sinks│
//!                                       │   │                      │      UDP       ┌─────────┐
//!                                       │   ▼                      │ ◄────────────► │  SNMP   │
//!                                       │ MibRegistry ◄─ SnmpAgent │   GET/GETNEXT  │ manager │
//!                                       └──────────────────────────┘                └─────────┘
//! ```
//!
//! # Modules
//!
//! - [`monitor`] - framed, reconnecting client for the monitor protocol
//! - [`status`] - status tree model and change detection
//! - [`sinks`] - consumers of `(path, value)` changes
//! - [`mib`] - OIDs, the MIB registry and its JSON table loader
//! - [`snmp`] - the UDP agent answering SNMP v1/v2c requests
//! - [`collectors`] - one poll tick
//! - [`metrics`] - Prometheus self-metrics
//! - [`server`] - runtime wiring and HTTP endpoints
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//!
//! # Quick Start
//!
//! ```no_run
//! use genmon_exporter::{config::Config, server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/Default.toml")?;
//!     server::start(config).await?;
//!     Ok(())
//! }
//! ```

pub mod collectors;
pub mod config;
pub mod error;
pub mod metrics;
pub mod mib;
pub mod monitor;
pub mod server;
pub mod sinks;
pub mod snmp;
pub mod status;

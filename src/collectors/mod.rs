//! Status Collectors
//!
//! One poll tick: fetch the monitor's status documents, reduce them to leaf
//! changes and hand those to the sinks.
//!
//! # Architecture
//!
//! Collectors follow a consistent pattern:
//! - Accept a `CollectionContext` containing shared state
//! - Query the monitor
//! - Feed the result through the differ and the sinks
//! - Return `CollectionResult`
//!
//! # Error Handling
//!
//! A failed query is non-fatal: it is logged and reported as
//! `CollectionStatus::Failed` so the loop can back off. Errors the process
//! cannot recover from (exhausted reconnect budget) propagate as `Err`.

use crate::config::PollConfig;
use crate::metrics::MetricsCollector;
use crate::monitor::MonitorClient;
use crate::sinks::MibSink;

/// Shared context passed to all collectors
#[derive(Clone, Copy)]
pub struct CollectionContext<'a> {
    /// Monitor client for issuing commands
    pub client: &'a MonitorClient,
    /// Self-metrics
    pub metrics: &'a MetricsCollector,
    /// Poll configuration (numeric mode, path root)
    pub config: &'a PollConfig,
    /// MIB updater, when the SNMP agent is enabled
    pub mib: Option<&'a MibSink>,
}

/// Status of a collection operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStatus {
    /// Documents were fetched and differenced
    Success,
    /// Collection failed but is non-fatal (already logged as warning)
    Failed,
}

/// - `Ok(CollectionStatus::Success)` = Collection succeeded
/// - `Ok(CollectionStatus::Failed)` = Collection failed but non-fatal (logged as warning)
/// - `Err(_)` = Fatal error (should propagate)
pub type CollectionResult = Result<CollectionStatus, anyhow::Error>;

pub mod status;

pub use status::collect_status;

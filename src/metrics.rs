//! Prometheus Metrics Definitions
//!
//! Self-metrics of the exporter, served on `/metrics`.
//!
//! # Metric Categories
//!
//! ## Polling
//! - Monitor reachability (`up`)
//! - Poll ticks, failed ticks and emitted changes
//! - Status nodes skipped because of an unsupported shape
//!
//! ## SNMP
//! - Requests by PDU type
//! - Requests dropped for a wrong community
//! - MIB values updated from monitor data
//!
//! All metrics use the `genmon_` namespace prefix.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

const NAMESPACE: &str = "genmon";

/// Metrics collector for the exporter
#[derive(Clone)]
pub struct MetricsCollector {
    registry: Arc<Registry>,

    // Polling
    pub up: Arc<IntGauge>,
    pub polls_total: Arc<IntCounter>,
    pub poll_errors_total: Arc<IntCounter>,
    pub changes_emitted_total: Arc<IntCounter>,
    pub type_errors_total: Arc<IntCounter>,
    pub mib_entries: Arc<IntGauge>,

    // SNMP
    pub snmp_requests_total: Arc<IntCounterVec>,
    pub snmp_community_rejects_total: Arc<IntCounter>,
    pub snmp_decode_errors_total: Arc<IntCounter>,
    pub mib_updates_total: Arc<IntCounter>,
}

impl MetricsCollector {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let up = IntGauge::with_opts(
            Opts::new("up", "Whether the last poll of the monitor succeeded (1=up, 0=down)")
                .namespace(NAMESPACE),
        )?;

        let polls_total = IntCounter::with_opts(
            Opts::new("polls_total", "Poll ticks run against the monitor").namespace(NAMESPACE),
        )?;

        let poll_errors_total = IntCounter::with_opts(
            Opts::new("poll_errors_total", "Poll ticks that failed").namespace(NAMESPACE),
        )?;

        let changes_emitted_total = IntCounter::with_opts(
            Opts::new(
                "changes_emitted_total",
                "Status leaf changes emitted by the differ",
            )
            .namespace(NAMESPACE),
        )?;

        let type_errors_total = IntCounter::with_opts(
            Opts::new(
                "type_errors_total",
                "Status nodes skipped because of an unsupported shape",
            )
            .namespace(NAMESPACE),
        )?;

        let mib_entries = IntGauge::with_opts(
            Opts::new("mib_entries", "Number of OIDs served by the SNMP agent")
                .namespace(NAMESPACE),
        )?;

        let snmp_requests_total = IntCounterVec::new(
            Opts::new("snmp_requests_total", "SNMP requests received by PDU type")
                .namespace(NAMESPACE),
            &["pdu"],
        )?;

        let snmp_community_rejects_total = IntCounter::with_opts(
            Opts::new(
                "snmp_community_rejects_total",
                "SNMP requests dropped because of a wrong community",
            )
            .namespace(NAMESPACE),
        )?;

        let snmp_decode_errors_total = IntCounter::with_opts(
            Opts::new(
                "snmp_decode_errors_total",
                "Datagrams that could not be decoded as SNMP",
            )
            .namespace(NAMESPACE),
        )?;

        let mib_updates_total = IntCounter::with_opts(
            Opts::new("mib_updates_total", "MIB values updated from monitor data")
                .namespace(NAMESPACE),
        )?;

        registry.register(Box::new(up.clone()))?;
        registry.register(Box::new(polls_total.clone()))?;
        registry.register(Box::new(poll_errors_total.clone()))?;
        registry.register(Box::new(changes_emitted_total.clone()))?;
        registry.register(Box::new(type_errors_total.clone()))?;
        registry.register(Box::new(mib_entries.clone()))?;
        registry.register(Box::new(snmp_requests_total.clone()))?;
        registry.register(Box::new(snmp_community_rejects_total.clone()))?;
        registry.register(Box::new(snmp_decode_errors_total.clone()))?;
        registry.register(Box::new(mib_updates_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            up: Arc::new(up),
            polls_total: Arc::new(polls_total),
            poll_errors_total: Arc::new(poll_errors_total),
            changes_emitted_total: Arc::new(changes_emitted_total),
            type_errors_total: Arc::new(type_errors_total),
            mib_entries: Arc::new(mib_entries),
            snmp_requests_total: Arc::new(snmp_requests_total),
            snmp_community_rejects_total: Arc::new(snmp_community_rejects_total),
            snmp_decode_errors_total: Arc::new(snmp_decode_errors_total),
            mib_updates_total: Arc::new(mib_updates_total),
        })
    }

    /// Render metrics in Prometheus text format
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

//! Monitor Response Types
//!
//! Typed views over the JSON documents returned by the monitor daemon. Status
//! documents themselves stay untyped (see [`crate::status::StatusNode`]); only
//! the handful of fields the exporter acts on are modelled here.

use serde::Deserialize;

/// Response of `generator: start_info_json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartInfo {
    #[serde(rename = "Controller", default)]
    pub controller: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub fueltype: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub sitename: Option<String>,
}

/// The four status documents the exporter polls, in the order they are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Status,
    Maintenance,
    Outage,
    Monitor,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 4] = [
        DocumentKind::Status,
        DocumentKind::Maintenance,
        DocumentKind::Outage,
        DocumentKind::Monitor,
    ];

    /// Top-level key of the document, also its key in the merged document.
    pub fn key(self) -> &'static str {
        match self {
            DocumentKind::Status => "Status",
            DocumentKind::Maintenance => "Maintenance",
            DocumentKind::Outage => "Outage",
            DocumentKind::Monitor => "Monitor",
        }
    }

    /// Monitor command that returns this document.
    pub fn command(self, numeric: bool) -> &'static str {
        match (self, numeric) {
            (DocumentKind::Status, false) => "generator: status_json",
            (DocumentKind::Status, true) => "generator: status_num_json",
            (DocumentKind::Maintenance, false) => "generator: maint_json",
            (DocumentKind::Maintenance, true) => "generator: maint_num_json",
            (DocumentKind::Outage, false) => "generator: outage_json",
            (DocumentKind::Outage, true) => "generator: outage_num_json",
            (DocumentKind::Monitor, false) => "generator: monitor_json",
            (DocumentKind::Monitor, true) => "generator: monitor_num_json",
        }
    }
}

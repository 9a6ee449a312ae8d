use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub snmp: SnmpConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Connection to the genmon monitor daemon.
#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    #[serde(default = "default_monitor_host")]
    pub host: String,
    #[serde(default = "default_monitor_port")]
    pub port: u16,
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_io_timeout")]
    pub io_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollConfig {
    #[serde(default = "default_poll_interval")]
    pub interval_seconds: u64,
    /// Multiplier applied to the poll interval after a failed tick.
    #[serde(default = "default_error_backoff_factor")]
    pub error_backoff_factor: u32,
    #[serde(default)]
    pub use_numeric: bool,
    #[serde(default)]
    pub blacklist: Vec<String>,
    /// Re-emit unchanged values after this many seconds. Unset means never.
    #[serde(default)]
    pub flush_interval_seconds: Option<u64>,
    #[serde(default = "default_path_root")]
    pub path_root: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SnmpConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_community")]
    pub community: SecretString,
    #[serde(default = "default_snmp_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub ipv6: bool,
    #[serde(default = "default_enterprise_id")]
    pub enterprise_id: u32,
    #[serde(default = "default_external_data_id")]
    pub external_data_id: u32,
    #[serde(default)]
    pub use_integer: bool,
    #[serde(default = "default_mib_dir")]
    pub mib_dir: String,
    #[serde(default = "default_controller_type")]
    pub controller_type: String,
    #[serde(default)]
    pub custom_controller_file: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_addr")]
    pub addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_monitor_host() -> String {
    "127.0.0.1".to_string()
}

fn default_monitor_port() -> u16 {
    9082
}

fn default_connect_retries() -> u32 {
    10
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_io_timeout() -> u64 {
    10
}

fn default_poll_interval() -> u64 {
    1
}

fn default_error_backoff_factor() -> u32 {
    60
}

fn default_path_root() -> String {
    "home".to_string()
}

fn default_community() -> SecretString {
    SecretString::from("public")
}

fn default_snmp_port() -> u16 {
    161
}

fn default_enterprise_id() -> u32 {
    58399
}

fn default_external_data_id() -> u32 {
    99
}

fn default_mib_dir() -> String {
    "data/mib".to_string()
}

fn default_controller_type() -> String {
    "generac_evo_nexus".to_string()
}

fn default_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9183
}

fn default_true() -> bool {
    true
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            host: default_monitor_host(),
            port: default_monitor_port(),
            connect_retries: default_connect_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            io_timeout_seconds: default_io_timeout(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_poll_interval(),
            error_backoff_factor: default_error_backoff_factor(),
            use_numeric: false,
            blacklist: Vec::new(),
            flush_interval_seconds: None,
            path_root: default_path_root(),
        }
    }
}

impl Default for SnmpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            community: default_community(),
            port: default_snmp_port(),
            ipv6: true,
            enterprise_id: default_enterprise_id(),
            external_data_id: default_external_data_id(),
            use_integer: false,
            mib_dir: default_mib_dir(),
            controller_type: default_controller_type(),
            custom_controller_file: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: default_addr(),
            port: default_port(),
        }
    }
}

impl MonitorConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host.trim(), self.port)
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        // Load environment variables from .env if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("GENMON_EXPORTER").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

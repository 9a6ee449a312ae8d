use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Connect to {addr} failed after {attempts} attempts: {reason}")]
    ConnectRetriesExhausted {
        addr: String,
        attempts: u32,
        reason: String,
    },

    #[error("Framing error: {0}")]
    Framing(String),

    #[error("Startup banner received instead of a response: {0}")]
    StartupBanner(String),

    #[error("Invalid command: {0:?}")]
    InvalidCommand(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("SNMP transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExporterError {
    /// Errors the owning process cannot recover from; the supervisor is
    /// expected to restart us.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ExporterError::ConnectRetriesExhausted { .. } | ExporterError::Transport(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ExporterError>;

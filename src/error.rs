use thiserror::Error;

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON serialization error: {}", err))
    }
}

impl From<config::ConfigError> for AuditError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Anchor error: {0}")]
    Anchor(String),

    #[error("Audit store error: {0}")]
    AuditStore(String),

    #[error("Consistency check error: {0}")]
    ConsistencyCheck(String),

    #[error("Fetch error for {data_type}: {message}")]
    Fetch { data_type: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Task error: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, AuditError>;

impl AuditError {
    /// True for the flush failures that leave the batch restored in memory.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Anchor(_) | Self::AuditStore(_))
    }
}

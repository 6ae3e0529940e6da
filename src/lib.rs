pub mod audit;
pub mod canonical;
pub mod clients;
pub mod config;
pub mod error;
pub mod integrity;

pub use audit::{ChainedLogger, EventSink, LogEvent};
pub use config::AuditConfig;
pub use error::{AuditError, Result};
pub use integrity::IntegrityVerifier;

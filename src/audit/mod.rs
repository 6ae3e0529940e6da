//! Audit Log System
//!
//! Tamper-evident event logging with a sequential hash chain, batched
//! persistence to the audit store and anchoring of every batch.

pub mod batch;
pub mod chain;
pub mod event;
pub mod logger;

pub use batch::{batch_id, AnchorReceipt, PersistedBatch};
pub use chain::{find_tampered_events, verify_chain, ChainVerification};
pub use event::{event_types, LogEvent, GENESIS, SYSTEM_ACTOR};
pub use logger::{ChainedLogger, EventSink, FlushReport, LoggerOptions};

//! External Collaborators
//!
//! Trait seams for the anchor, the audit store and the consistency-check
//! endpoint, with HTTP implementations backed by `reqwest`.

pub mod anchor;
pub mod consistency;
pub mod http;
pub mod store;
pub mod token;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::audit::batch::AnchorReceipt;
use crate::audit::event::LogEvent;

pub use anchor::HttpAnchor;
pub use consistency::HttpConsistencyChecker;
pub use http::ApiClient;
pub use store::HttpAuditStore;
pub use token::{EnvToken, StaticToken, TokenProvider};

/// Issues a receipt witnessing a batch's existence
#[async_trait]
pub trait Anchor: Send + Sync {
    async fn register(&self, batch: &[LogEvent]) -> anyhow::Result<AnchorReceipt>;
}

/// Durable storage for flushed batches. A submission persists the whole
/// batch or fails as a whole.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn submit(
        &self,
        batch: &[LogEvent],
        chain_head: &str,
        receipt: &AnchorReceipt,
    ) -> anyhow::Result<()>;
}

/// Read-only external consistency check
#[async_trait]
pub trait ConsistencyChecker: Send + Sync {
    async fn check(&self) -> anyhow::Result<ConsistencyReport>;
}

/// Report returned by the consistency-check endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    #[serde(default)]
    pub inconsistencies: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.inconsistencies.is_empty()
    }
}

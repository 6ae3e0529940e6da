//! Persisted batch format submitted to the audit store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::event::LogEvent;
use crate::canonical::sha256_hex;

/// Opaque transaction identifier issued by the anchor for a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnchorReceipt(pub String);

impl AnchorReceipt {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AnchorReceipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A flushed batch together with the chain head and anchor receipt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedBatch {
    pub batch_id: Uuid,
    pub events: Vec<LogEvent>,
    pub chain_head: String,
    pub anchor_receipt: AnchorReceipt,
    pub submitted_at: DateTime<Utc>,
}

impl PersistedBatch {
    pub fn new(events: Vec<LogEvent>, chain_head: String, anchor_receipt: AnchorReceipt) -> Self {
        Self {
            batch_id: batch_id(&events, &chain_head),
            events,
            chain_head,
            anchor_receipt,
            submitted_at: Utc::now(),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Batch {}: {} events, head {}, receipt {}",
            self.batch_id,
            self.events.len(),
            self.chain_head,
            self.anchor_receipt
        )
    }
}

/// SHA-256 over the concatenated event digests, in batch order
pub fn batch_digest(events: &[LogEvent]) -> String {
    let joined: String = events.iter().map(|e| e.event_digest.as_str()).collect();
    sha256_hex(joined.as_bytes())
}

/// Stable identifier for a batch: a retried submission carries the same id
pub fn batch_id(events: &[LogEvent], chain_head: &str) -> Uuid {
    let name = format!("{}:{}", batch_digest(events), chain_head);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::event::GENESIS;
    use serde_json::json;

    fn event(n: u32) -> LogEvent {
        LogEvent::new(
            "PARCEL_UPDATED".to_string(),
            json!({"n": n}),
            "clerk".to_string(),
            Utc::now(),
            GENESIS.to_string(),
        )
    }

    #[test]
    fn test_batch_digest_is_order_sensitive() {
        let a = event(1);
        let b = event(2);
        assert_ne!(
            batch_digest(&[a.clone(), b.clone()]),
            batch_digest(&[b, a])
        );
    }

    #[test]
    fn test_resubmitted_batch_keeps_its_id() {
        let events = vec![event(1), event(2)];
        let persist = |events: &[LogEvent], tx: &str| {
            PersistedBatch::new(events.to_vec(), "head".to_string(), AnchorReceipt(tx.to_string()))
        };

        let first = persist(&events, "tx-1");
        let retry = persist(&events, "tx-2");
        assert_eq!(first.batch_id, retry.batch_id);
        assert_ne!(first.batch_id, persist(&events[..1], "tx-1").batch_id);
    }

    #[test]
    fn test_receipt_serializes_as_plain_string() {
        let receipt = AnchorReceipt("0xabc".to_string());
        assert_eq!(serde_json::to_string(&receipt).unwrap(), "\"0xabc\"");
    }
}

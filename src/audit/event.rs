//! Audit Log Event
//!
//! Defines the immutable record appended to the hash chain. The event digest
//! covers the type, payload, actor and timestamp; the chain link is carried
//! separately in `previous_chain_head`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::canonical::{canonical_string, sha256_hex};

/// Sentinel stored as `previous_chain_head` on the first event of a chain
pub const GENESIS: &str = "genesis";

/// Actor recorded for events the core emits on its own behalf
pub const SYSTEM_ACTOR: &str = "system";

/// Event types emitted by the integrity verifier
pub mod event_types {
    pub const DATA_CHANGE_DETECTED: &str = "DATA_CHANGE_DETECTED";
    pub const DATA_INTEGRITY_FAILURE: &str = "DATA_INTEGRITY_FAILURE";
    pub const BLOCKCHAIN_INCONSISTENCY: &str = "BLOCKCHAIN_INCONSISTENCY";
}

/// One chained audit event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub event_type: String,
    pub event_data: Value,
    pub actor_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_digest: String,
    pub previous_chain_head: String,
}

impl LogEvent {
    /// Build an event, computing its digest from the first four fields
    pub fn new(
        event_type: String,
        event_data: Value,
        actor_id: String,
        timestamp: DateTime<Utc>,
        previous_chain_head: String,
    ) -> Self {
        let event_digest = compute_event_digest(&event_type, &event_data, &actor_id, &timestamp);

        Self {
            event_type,
            event_data,
            actor_id,
            timestamp,
            event_digest,
            previous_chain_head,
        }
    }

    /// Recompute the digest and compare it to the stored one
    pub fn verify_digest(&self) -> bool {
        self.event_digest
            == compute_event_digest(
                &self.event_type,
                &self.event_data,
                &self.actor_id,
                &self.timestamp,
            )
    }

    pub fn is_genesis(&self) -> bool {
        self.previous_chain_head == GENESIS
    }

    pub fn summary(&self) -> String {
        format!("{} by {} ({})", self.event_type, self.actor_id, self.event_digest)
    }
}

/// Canonical form of the hashed fields
pub fn canonical_event_string(
    event_type: &str,
    event_data: &Value,
    actor_id: &str,
    timestamp: &DateTime<Utc>,
) -> String {
    canonical_string(&json!({
        "event_type": event_type,
        "event_data": event_data,
        "actor_id": actor_id,
        // Full stored precision
        "timestamp": timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
    }))
}

/// Hex SHA-256 over the canonical hashed fields
pub fn compute_event_digest(
    event_type: &str,
    event_data: &Value,
    actor_id: &str,
    timestamp: &DateTime<Utc>,
) -> String {
    sha256_hex(canonical_event_string(event_type, event_data, actor_id, timestamp).as_bytes())
}

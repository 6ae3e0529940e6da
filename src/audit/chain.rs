//! Hash Chain State and Verification
//!
//! The chain head folds each event digest into the previous head:
//! `head' = sha256(head + event_digest)`, or `sha256(event_digest)` for the
//! first event. This is a strict sequential chain, not a tree.

use tracing::{debug, info};

use crate::audit::batch::PersistedBatch;
use crate::audit::event::{LogEvent, GENESIS};
use crate::canonical::sha256_hex;

/// Derive the next chain head from the current one and a new event digest
pub fn next_chain_head(current: Option<&str>, event_digest: &str) -> String {
    match current {
        Some(head) => sha256_hex(format!("{}{}", head, event_digest).as_bytes()),
        None => sha256_hex(event_digest.as_bytes()),
    }
}

/// Rolling head plus the events awaiting persistence
#[derive(Debug, Default)]
pub struct ChainState {
    head: Option<String>,
    pending: Vec<LogEvent>,
    event_count: u64,
}

impl ChainState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn head(&self) -> Option<&str> {
        self.head.as_deref()
    }

    /// Value recorded as `previous_chain_head` for the next event
    pub fn link(&self) -> String {
        self.head.clone().unwrap_or_else(|| GENESIS.to_string())
    }

    pub fn pending(&self) -> &[LogEvent] {
        &self.pending
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    /// Advance the head over `event` and queue it. Returns the new head.
    pub fn push(&mut self, event: LogEvent) -> String {
        let head = next_chain_head(self.head.as_deref(), &event.event_digest);
        self.head = Some(head.clone());
        self.pending.push(event);
        self.event_count += 1;
        head
    }

    /// Take every pending event, leaving the batch empty
    pub fn take_pending(&mut self) -> Vec<LogEvent> {
        std::mem::take(&mut self.pending)
    }

    /// Put failed events back in front of anything appended since
    pub fn restore(&mut self, mut batch: Vec<LogEvent>) {
        batch.append(&mut self.pending);
        self.pending = batch;
    }
}

/// Outcome of replaying persisted batches
#[derive(Debug, Clone)]
pub struct ChainVerification {
    pub is_valid: bool,
    pub event_count: usize,
    pub batch_count: usize,
    pub final_head: Option<String>,
    pub error_message: Option<String>,
}

impl ChainVerification {
    fn broken(event_count: usize, batch_count: usize, message: String) -> Self {
        Self {
            is_valid: false,
            event_count,
            batch_count,
            final_head: None,
            error_message: Some(message),
        }
    }

    pub fn summary(&self) -> String {
        if self.is_valid {
            format!(
                "✅ Audit chain is valid ({} events in {} batches)",
                self.event_count, self.batch_count
            )
        } else {
            format!(
                "❌ Audit chain is invalid ({} events checked): {}",
                self.event_count,
                self.error_message.as_deref().unwrap_or("Unknown error")
            )
        }
    }
}

/// Replay batches in order and check every digest and link
pub fn verify_chain(batches: &[PersistedBatch]) -> ChainVerification {
    let mut head: Option<String> = None;
    let mut event_count = 0;

    for (batch_index, batch) in batches.iter().enumerate() {
        for event in &batch.events {
            if !event.verify_digest() {
                return ChainVerification::broken(
                    event_count,
                    batch_index,
                    format!("Invalid digest in event {}", event_count),
                );
            }

            let expected_link = head.clone().unwrap_or_else(|| GENESIS.to_string());
            if event.previous_chain_head != expected_link {
                return ChainVerification::broken(
                    event_count,
                    batch_index,
                    format!(
                        "Hash chain broken at event {}: expected {}, got {}",
                        event_count, expected_link, event.previous_chain_head
                    ),
                );
            }

            head = Some(next_chain_head(head.as_deref(), &event.event_digest));
            event_count += 1;
        }

        if head.as_deref() != Some(batch.chain_head.as_str()) {
            return ChainVerification::broken(
                event_count,
                batch_index,
                format!(
                    "Batch {} records head {} but replay gives {}",
                    batch.batch_id,
                    batch.chain_head,
                    head.as_deref().unwrap_or(GENESIS)
                ),
            );
        }
        debug!("Verified batch {}", batch.batch_id);
    }

    info!(
        "Audit chain verification successful: {} events in {} batches",
        event_count,
        batches.len()
    );

    ChainVerification {
        is_valid: true,
        event_count,
        batch_count: batches.len(),
        final_head: head,
        error_message: None,
    }
}

/// Indices of events whose stored digest no longer recomputes
pub fn find_tampered_events(events: &[LogEvent]) -> Vec<usize> {
    events
        .iter()
        .enumerate()
        .filter(|(_, event)| !event.verify_digest())
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::batch::AnchorReceipt;
    use chrono::Utc;
    use serde_json::json;

    fn append(state: &mut ChainState, n: u32) -> String {
        let event = LogEvent::new(
            "DISPUTE_FILED".to_string(),
            json!({"dispute": n}),
            "registrar".to_string(),
            Utc::now(),
            state.link(),
        );
        state.push(event)
    }

    fn persist(state: &mut ChainState) -> PersistedBatch {
        let head = state.head().unwrap().to_string();
        PersistedBatch::new(state.take_pending(), head, AnchorReceipt("tx".to_string()))
    }

    #[test]
    fn test_first_head_hashes_digest_alone() {
        let mut state = ChainState::new();
        assert_eq!(state.link(), GENESIS);
        let head = append(&mut state, 0);
        let digest = &state.pending()[0].event_digest;
        assert_eq!(head, sha256_hex(digest.as_bytes()));
    }

    fn pending_ids(state: &ChainState) -> Vec<u64> {
        state
            .pending()
            .iter()
            .map(|e| e.event_data["dispute"].as_u64().unwrap())
            .collect()
    }

    #[test]
    fn test_restore_keeps_order() {
        let mut state = ChainState::new();
        append(&mut state, 1);
        append(&mut state, 2);
        let taken = state.take_pending();
        append(&mut state, 3);
        state.restore(taken);

        assert_eq!(pending_ids(&state), vec![1, 2, 3]);
        assert_eq!(state.event_count(), 3);
    }

    #[test]
    fn test_verify_chain_across_batches() {
        let mut state = ChainState::new();
        append(&mut state, 1);
        append(&mut state, 2);
        let first = persist(&mut state);
        append(&mut state, 3);
        let second = persist(&mut state);

        let result = verify_chain(&[first, second]);
        assert!(result.is_valid, "{}", result.summary());
        assert_eq!(result.event_count, 3);
        assert_eq!(result.final_head.as_deref(), state.head());
    }

    #[test]
    fn test_verify_chain_detects_deleted_event() {
        let mut state = ChainState::new();
        for n in 0..3 {
            append(&mut state, n);
        }
        let mut batch = persist(&mut state);
        batch.events.remove(1);

        let result = verify_chain(&[batch]);
        assert!(!result.is_valid);
        assert!(result.error_message.unwrap().contains("Hash chain broken"));
    }

    #[test]
    fn test_find_tampered_events() {
        let mut state = ChainState::new();
        append(&mut state, 1);
        append(&mut state, 2);
        let mut events = state.take_pending();
        events[1].actor_id = "intruder".to_string();

        assert_eq!(find_tampered_events(&events), vec![1]);
    }
}

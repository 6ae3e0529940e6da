//! Integrity Verifier
//!
//! Detects silent changes and corruption in externally stored data and
//! escalates every anomaly into the audit chain as a new event. Anomalies
//! are returned as ordinary values; only operational failures are errors.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::audit::event::{event_types, SYSTEM_ACTOR};
use crate::audit::logger::EventSink;
use crate::clients::{ApiClient, ConsistencyChecker, ConsistencyReport, EnvToken, HttpConsistencyChecker};
use crate::config::AuditConfig;
use crate::error::{AuditError, Result};
use crate::integrity::cache::DigestCache;
use crate::integrity::digest::{self, digest_value, DigestCheck};

/// Field carrying a record's own integrity claim
pub const DIGEST_FIELD: &str = "_digest";

// Records handed to each blocking validation task
const RECORDS_PER_TASK: usize = 256;

/// Outcome of one `monitor_changes` observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeObservation {
    pub digest: String,
    pub previous_digest: Option<String>,
    pub changed: bool,
}

/// Serialized with the same text as `Display`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidReason {
    #[serde(rename = "missing digest")]
    MissingDigest,
    #[serde(rename = "digest mismatch")]
    DigestMismatch,
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidReason::MissingDigest => write!(f, "missing digest"),
            InvalidReason::DigestMismatch => write!(f, "digest mismatch"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidRecord {
    pub index: usize,
    /// Value of the caller's key field, when the record has one
    pub key: Option<Value>,
    pub reason: InvalidReason,
    pub stored_digest: Option<String>,
    pub computed_digest: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordValidationReport {
    pub total_records: usize,
    pub invalid_records_count: usize,
    pub invalid_records: Vec<InvalidRecord>,
}

impl RecordValidationReport {
    pub fn is_clean(&self) -> bool {
        self.invalid_records_count == 0
    }
}

pub struct IntegrityVerifier {
    sink: Arc<dyn EventSink>,
    checker: Arc<dyn ConsistencyChecker>,
    cache: DigestCache,
}

impl IntegrityVerifier {
    pub fn new(
        sink: Arc<dyn EventSink>,
        checker: Arc<dyn ConsistencyChecker>,
        cache_capacity: usize,
    ) -> Self {
        Self {
            sink,
            checker,
            cache: DigestCache::new(cache_capacity),
        }
    }

    /// Build a verifier using the configured HTTP consistency endpoint
    pub fn from_config(config: &AuditConfig, sink: Arc<dyn EventSink>) -> Result<Self> {
        config.validate()?;
        let api = ApiClient::new(
            config.consistency_url.clone(),
            config.request_timeout(),
            Arc::new(EnvToken::new(config.api_token_env.clone())),
        )?;

        Ok(Self::new(
            sink,
            Arc::new(HttpConsistencyChecker::new(api)),
            config.digest_cache_capacity,
        ))
    }

    pub fn digest<T: Serialize + ?Sized>(&self, data: &T) -> Result<String> {
        digest::digest(data)
    }

    pub fn verify<T: Serialize + ?Sized>(&self, data: &T, expected_digest: &str) -> Result<DigestCheck> {
        digest::verify(data, expected_digest)
    }

    pub fn cache(&self) -> &DigestCache {
        &self.cache
    }

    /// Fetch the current state of `data_type`, compare it with the last
    /// observation and log a change event when the digest moved.
    pub async fn monitor_changes<F, Fut, T>(&self, data_type: &str, fetch: F) -> Result<ChangeObservation>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
        T: Serialize,
    {
        let data = fetch().await.map_err(|e| AuditError::Fetch {
            data_type: data_type.to_string(),
            message: e.to_string(),
        })?;
        let current = digest::digest(&data)?;

        let previous_digest = self.cache.swap(data_type, current.clone()).await;
        let changed = matches!(&previous_digest, Some(previous) if *previous != current);

        if changed {
            info!("Change detected in {}", data_type);
            self.sink
                .append_event(
                    event_types::DATA_CHANGE_DETECTED,
                    json!({
                        "data_type": data_type,
                        "previous_digest": previous_digest,
                        "current_digest": current,
                    }),
                    SYSTEM_ACTOR,
                )
                .await?;
        } else {
            debug!("No change in {}", data_type);
        }

        Ok(ChangeObservation {
            digest: current,
            previous_digest,
            changed,
        })
    }

    /// Check each record's embedded `_digest` against a recomputation over
    /// its other fields. One summary event is logged if anything is invalid.
    ///
    /// Records are hashed in parallel on the blocking pool, in chunks of
    /// `RECORDS_PER_TASK`. Invalid records are reported in input order.
    pub async fn validate_records(
        &self,
        records: &[Value],
        key_field: &str,
    ) -> Result<RecordValidationReport> {
        let tasks = records
            .chunks(RECORDS_PER_TASK)
            .enumerate()
            .map(|(chunk, slice)| {
                let base = chunk * RECORDS_PER_TASK;
                let slice = slice.to_vec();
                let key_field = key_field.to_string();
                tokio::task::spawn_blocking(move || {
                    slice
                        .iter()
                        .enumerate()
                        .filter_map(|(offset, record)| {
                            check_record(base + offset, record, &key_field)
                        })
                        .collect::<Vec<_>>()
                })
            });

        let mut invalid_records = Vec::new();
        for joined in join_all(tasks).await {
            match joined {
                Ok(invalid) => invalid_records.extend(invalid),
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => {
                    return Err(AuditError::Task(format!(
                        "Record validation task failed: {}",
                        e
                    )))
                }
            }
        }

        let report = RecordValidationReport {
            total_records: records.len(),
            invalid_records_count: invalid_records.len(),
            invalid_records,
        };

        if !report.is_clean() {
            warn!(
                "{} of {} records failed integrity validation",
                report.invalid_records_count, report.total_records
            );
            self.sink
                .append_event(
                    event_types::DATA_INTEGRITY_FAILURE,
                    json!({
                        "key_field": key_field,
                        "total_records": report.total_records,
                        "invalid_records_count": report.invalid_records_count,
                    }),
                    SYSTEM_ACTOR,
                )
                .await?;
        }

        Ok(report)
    }

    /// Query the external consistency endpoint and log any inconsistencies it reports
    pub async fn check_external_consistency(&self) -> Result<ConsistencyReport> {
        let report = self
            .checker
            .check()
            .await
            .map_err(|e| AuditError::ConsistencyCheck(e.to_string()))?;

        if !report.is_consistent() {
            warn!(
                "External consistency check reported {} inconsistencies",
                report.inconsistencies.len()
            );
            self.sink
                .append_event(
                    event_types::BLOCKCHAIN_INCONSISTENCY,
                    serde_json::to_value(&report)?,
                    SYSTEM_ACTOR,
                )
                .await?;
        }

        Ok(report)
    }
}

fn check_record(index: usize, record: &Value, key_field: &str) -> Option<InvalidRecord> {
    let key = record.get(key_field).cloned();

    let (stored, rest) = match record {
        Value::Object(map) if map.contains_key(DIGEST_FIELD) => {
            let mut rest = map.clone();
            let stored = rest.remove(DIGEST_FIELD);
            (stored, rest)
        }
        _ => {
            return Some(InvalidRecord {
                index,
                key,
                reason: InvalidReason::MissingDigest,
                stored_digest: None,
                computed_digest: None,
            })
        }
    };

    let computed = digest_value(&Value::Object(rest));
    let stored = match stored {
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => String::new(),
    };

    if stored == computed {
        None
    } else {
        Some(InvalidRecord {
            index,
            key,
            reason: InvalidReason::DigestMismatch,
            stored_digest: Some(stored),
            computed_digest: Some(computed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_record_valid() {
        let digest = digest_value(&json!({"a": 1}));
        let record = json!({"a": 1, "_digest": digest});
        assert!(check_record(0, &record, "a").is_none());
    }

    #[test]
    fn test_check_record_missing_digest() {
        let invalid = check_record(3, &json!({"id": "lease-1"}), "id").unwrap();
        assert_eq!(invalid.reason, InvalidReason::MissingDigest);
        assert_eq!(invalid.index, 3);
        assert_eq!(invalid.key, Some(json!("lease-1")));
    }

    #[test]
    fn test_check_record_non_string_digest_is_mismatch() {
        let invalid = check_record(0, &json!({"id": 1, "_digest": 42}), "id").unwrap();
        assert_eq!(invalid.reason, InvalidReason::DigestMismatch);
        assert_eq!(invalid.stored_digest.as_deref(), Some("42"));
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(InvalidReason::MissingDigest.to_string(), "missing digest");
        assert_eq!(InvalidReason::DigestMismatch.to_string(), "digest mismatch");
    }

    #[test]
    fn test_reason_serializes_like_display() {
        for reason in [InvalidReason::MissingDigest, InvalidReason::DigestMismatch] {
            let encoded = serde_json::to_value(reason).unwrap();
            assert_eq!(encoded, json!(reason.to_string()));
            assert_eq!(serde_json::from_value::<InvalidReason>(encoded).unwrap(), reason);
        }

        let report = RecordValidationReport {
            total_records: 1,
            invalid_records_count: 1,
            invalid_records: vec![check_record(0, &json!({"id": "x"}), "id").unwrap()],
        };
        let encoded = serde_json::to_value(&report).unwrap();
        assert_eq!(encoded["invalid_records"][0]["reason"], "missing digest");
    }
}

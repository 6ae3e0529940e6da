#![allow(dead_code)]

use anyhow::anyhow;
use async_trait::async_trait;
use parcel_audit::audit::{AnchorReceipt, ChainedLogger, LogEvent, LoggerOptions, PersistedBatch};
use parcel_audit::clients::{Anchor, AuditStore, ConsistencyChecker, ConsistencyReport};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Anchor double issuing sequential receipts, optionally failing
#[derive(Default)]
pub struct MemoryAnchor {
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Anchor for MemoryAnchor {
    async fn register(&self, _batch: &[LogEvent]) -> anyhow::Result<AnchorReceipt> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("anchor network error"));
        }
        Ok(AnchorReceipt(format!("0x{:04x}", n)))
    }
}

/// Audit store double keeping every submitted batch in memory
#[derive(Default)]
pub struct MemoryStore {
    pub fail: AtomicBool,
    batches: Mutex<Vec<PersistedBatch>>,
}

impl MemoryStore {
    pub fn batches(&self) -> Vec<PersistedBatch> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn submit(
        &self,
        batch: &[LogEvent],
        chain_head: &str,
        receipt: &AnchorReceipt,
    ) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("audit store unavailable"));
        }
        self.batches.lock().unwrap().push(PersistedBatch::new(
            batch.to_vec(),
            chain_head.to_string(),
            receipt.clone(),
        ));
        Ok(())
    }
}

/// Consistency endpoint double returning a fixed report, or failing when empty
pub struct StubChecker {
    pub report: Option<ConsistencyReport>,
}

#[async_trait]
impl ConsistencyChecker for StubChecker {
    async fn check(&self) -> anyhow::Result<ConsistencyReport> {
        self.report
            .clone()
            .ok_or_else(|| anyhow!("consistency endpoint timed out"))
    }
}

pub struct Harness {
    pub logger: ChainedLogger,
    pub anchor: Arc<MemoryAnchor>,
    pub store: Arc<MemoryStore>,
}

pub fn harness(threshold: usize, timeout: Duration) -> Harness {
    let anchor = Arc::new(MemoryAnchor::default());
    let store = Arc::new(MemoryStore::default());
    let logger = ChainedLogger::new(
        anchor.clone(),
        store.clone(),
        LoggerOptions {
            batch_size_threshold: threshold,
            batch_timeout: timeout,
        },
    );
    Harness {
        logger,
        anchor,
        store,
    }
}

/// Poll until `condition` holds, failing the test after three seconds
pub async fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..300 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

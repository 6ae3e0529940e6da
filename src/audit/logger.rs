//! Chained Audit Logger
//!
//! Appends events to a sequential hash chain and accumulates them into a
//! pending batch. Batches are flushed to the anchor and then the audit store
//! once the size threshold is reached or the batch timer fires. Captured
//! batches reach the store strictly in capture order. A failed flush puts its
//! events, and those of any batch captured after it, back at the front of the
//! pending batch.

use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::audit::batch::AnchorReceipt;
use crate::audit::chain::ChainState;
use crate::audit::event::LogEvent;
use crate::canonical;
use crate::clients::{
    Anchor, ApiClient, AuditStore, EnvToken, HttpAnchor, HttpAuditStore, TokenProvider,
};
use crate::config::AuditConfig;
use crate::error::{AuditError, Result};

/// Destination for events raised by other components
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn append_event(&self, event_type: &str, event_data: Value, actor_id: &str)
        -> Result<String>;
}

/// Batching parameters
#[derive(Debug, Clone)]
pub struct LoggerOptions {
    pub batch_size_threshold: usize,
    pub batch_timeout: Duration,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            batch_size_threshold: 5,
            batch_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&AuditConfig> for LoggerOptions {
    fn from(config: &AuditConfig) -> Self {
        Self {
            batch_size_threshold: config.batch_size_threshold.max(1),
            batch_timeout: config.batch_timeout(),
        }
    }
}

/// What a successful flush persisted
#[derive(Debug, Clone)]
pub struct FlushReport {
    pub event_count: usize,
    pub chain_head: String,
    pub receipt: AnchorReceipt,
}

struct PendingTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

/// A batch cut from the pending list, waiting for its turn at the store
struct CapturedBatch {
    ticket: u64,
    events: Vec<LogEvent>,
    chain_head: String,
}

#[derive(Default)]
struct LoggerState {
    chain: ChainState,
    timer: Option<PendingTimer>,
    timer_generation: u64,
    // Captured but not yet persisted, oldest first
    captured: VecDeque<CapturedBatch>,
    next_ticket: u64,
}

impl LoggerState {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.handle.abort();
        }
    }

    /// Cut everything pending into a batch behind the ones already captured
    fn capture(&mut self) -> Option<u64> {
        if self.chain.pending_len() == 0 {
            return None;
        }
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        let chain_head = self.chain.link();
        let events = self.chain.take_pending();
        self.captured.push_back(CapturedBatch {
            ticket,
            events,
            chain_head,
        });
        Some(ticket)
    }

    /// Return a failed batch and every batch captured after it to pending
    fn requeue(&mut self, failed: Vec<LogEvent>) -> usize {
        let mut events = failed;
        for batch in self.captured.drain(..) {
            events.extend(batch.events);
        }
        let count = events.len();
        self.chain.restore(events);
        count
    }
}

struct LoggerInner {
    state: Mutex<LoggerState>,
    // Held while submitting so batches reach the store in capture order
    flush_gate: Mutex<()>,
    anchor: Arc<dyn Anchor>,
    store: Arc<dyn AuditStore>,
    options: LoggerOptions,
}

/// One logger per process owns the chain; clones share it
#[derive(Clone)]
pub struct ChainedLogger {
    inner: Arc<LoggerInner>,
}

impl ChainedLogger {
    pub fn new(anchor: Arc<dyn Anchor>, store: Arc<dyn AuditStore>, options: LoggerOptions) -> Self {
        Self {
            inner: Arc::new(LoggerInner {
                state: Mutex::new(LoggerState::default()),
                flush_gate: Mutex::new(()),
                anchor,
                store,
                options,
            }),
        }
    }

    /// Build a logger talking to the configured HTTP anchor and audit store
    pub fn from_config(config: &AuditConfig) -> Result<Self> {
        config.validate()?;
        let tokens: Arc<dyn TokenProvider> = Arc::new(EnvToken::new(config.api_token_env.clone()));

        let anchor = HttpAnchor::new(ApiClient::new(
            config.anchor_url.clone(),
            config.request_timeout(),
            tokens.clone(),
        )?);
        let store = HttpAuditStore::new(ApiClient::new(
            config.audit_store_url.clone(),
            config.request_timeout(),
            tokens,
        )?);

        Ok(Self::new(
            Arc::new(anchor),
            Arc::new(store),
            LoggerOptions::from(config),
        ))
    }

    /// Chain a new event and queue it for persistence. Returns its digest.
    ///
    /// Never waits on network I/O. Reaching the threshold cuts the batch
    /// right here and hands it to a spawned task for submission.
    pub async fn append<T: Serialize + ?Sized>(
        &self,
        event_type: &str,
        event_data: &T,
        actor_id: &str,
    ) -> Result<String> {
        // Serialize before touching any state so a failure leaves the chain untouched
        let event_data = canonical::to_value(event_data)?;

        let mut state = self.inner.state.lock().await;
        let event = LogEvent::new(
            event_type.to_string(),
            event_data,
            actor_id.to_string(),
            Utc::now().trunc_subsecs(3),
            state.chain.link(),
        );
        let digest = event.event_digest.clone();
        let head = state.chain.push(event);
        debug!("Appended {} event {} (head {})", event_type, digest, head);

        if state.chain.pending_len() >= self.inner.options.batch_size_threshold {
            state.cancel_timer();
            if let Some(ticket) = state.capture() {
                drop(state);
                self.spawn_submit(ticket);
            }
        } else if state.timer.is_none() {
            state.timer_generation += 1;
            let generation = state.timer_generation;
            let handle = self.spawn_timer(generation);
            state.timer = Some(PendingTimer { generation, handle });
        }

        Ok(digest)
    }

    /// Persist everything currently pending, after any batch already in flight.
    /// Returns `None` when this call had nothing of its own to flush.
    pub async fn flush(&self) -> Result<Option<FlushReport>> {
        let (ticket, through) = {
            let mut state = self.inner.state.lock().await;
            state.cancel_timer();
            let ticket = state.capture();
            (ticket, state.next_ticket)
        };

        // Submission runs in its own task so dropping this future cannot lose a batch
        let logger = self.clone();
        let submitted = tokio::spawn(async move { logger.submit_through(through).await })
            .await
            .map_err(|e| AuditError::Task(format!("Flush task failed: {}", e)))??;

        Ok(ticket.and_then(|ticket| {
            submitted
                .into_iter()
                .find(|(t, _)| *t == ticket)
                .map(|(_, report)| report)
        }))
    }

    /// Cancel the batch timer and flush whatever is still pending
    pub async fn close(&self) -> Result<()> {
        self.inner.state.lock().await.cancel_timer();
        self.flush().await.map(|_| ())
    }

    pub async fn chain_head(&self) -> Option<String> {
        self.inner.state.lock().await.chain.head().map(str::to_string)
    }

    pub async fn pending_len(&self) -> usize {
        self.inner.state.lock().await.chain.pending_len()
    }

    pub async fn pending_events(&self) -> Vec<LogEvent> {
        self.inner.state.lock().await.chain.pending().to_vec()
    }

    pub async fn event_count(&self) -> u64 {
        self.inner.state.lock().await.chain.event_count()
    }

    /// Submit captured batches, oldest first, up to but excluding ticket `through`
    async fn submit_through(&self, through: u64) -> Result<Vec<(u64, FlushReport)>> {
        let _gate = self.inner.flush_gate.lock().await;
        let mut submitted = Vec::new();

        loop {
            let batch = {
                let mut state = self.inner.state.lock().await;
                let due = state.captured.front().map_or(false, |b| b.ticket < through);
                if due {
                    state.captured.pop_front()
                } else {
                    None
                }
            };
            let Some(batch) = batch else {
                return Ok(submitted);
            };
            let ticket = batch.ticket;
            submitted.push((ticket, self.submit(batch).await?));
        }
    }

    async fn submit(&self, batch: CapturedBatch) -> Result<FlushReport> {
        let CapturedBatch {
            events, chain_head, ..
        } = batch;
        let event_count = events.len();

        let receipt = match self.inner.anchor.register(&events).await {
            Ok(receipt) => receipt,
            Err(e) => {
                let restored = self.inner.state.lock().await.requeue(events);
                warn!("Anchor registration failed, restored {} events: {}", restored, e);
                return Err(AuditError::Anchor(e.to_string()));
            }
        };

        if let Err(e) = self.inner.store.submit(&events, &chain_head, &receipt).await {
            let restored = self.inner.state.lock().await.requeue(events);
            warn!("Audit store submission failed, restored {} events: {}", restored, e);
            return Err(AuditError::AuditStore(e.to_string()));
        }

        info!(
            "Flushed {} events (head {}, receipt {})",
            event_count, chain_head, receipt
        );
        Ok(FlushReport {
            event_count,
            chain_head,
            receipt,
        })
    }

    fn spawn_submit(&self, ticket: u64) {
        let logger = self.clone();
        tokio::spawn(async move {
            if let Err(e) = logger.submit_through(ticket + 1).await {
                error!("Threshold flush failed: {}", e);
            }
        });
    }

    fn spawn_timer(&self, generation: u64) -> JoinHandle<()> {
        let logger = self.clone();
        let timeout = self.inner.options.batch_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            {
                // Deregister first so the flush below cannot abort this task
                let mut state = logger.inner.state.lock().await;
                if state.timer.as_ref().map(|t| t.generation) != Some(generation) {
                    return;
                }
                state.timer = None;
            }
            if let Err(e) = logger.flush().await {
                error!("Timed flush failed: {}", e);
            }
        })
    }
}

#[async_trait]
impl EventSink for ChainedLogger {
    async fn append_event(
        &self,
        event_type: &str,
        event_data: Value,
        actor_id: &str,
    ) -> Result<String> {
        self.append(event_type, &event_data, actor_id).await
    }
}

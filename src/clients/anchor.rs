//! Anchor Client
//!
//! Registers a batch with the anchoring service, which answers with an
//! opaque transaction identifier used as an independent witness.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::audit::batch::{batch_digest, AnchorReceipt};
use crate::audit::event::LogEvent;
use crate::clients::http::ApiClient;
use crate::clients::Anchor;

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    batch_digest: String,
    event_count: usize,
    event_digests: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    transaction_id: String,
}

pub struct HttpAnchor {
    api: ApiClient,
}

impl HttpAnchor {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Anchor for HttpAnchor {
    async fn register(&self, batch: &[LogEvent]) -> Result<AnchorReceipt> {
        let request = RegisterRequest {
            batch_digest: batch_digest(batch),
            event_count: batch.len(),
            event_digests: batch.iter().map(|e| e.event_digest.as_str()).collect(),
        };

        let response: RegisterResponse = self.api.post_json("anchor/register", &request).await?;
        if response.transaction_id.is_empty() {
            return Err(anyhow!("Anchor returned an empty transaction id"));
        }

        info!(
            "Anchored batch {} ({} events) as {}",
            request.batch_digest, request.event_count, response.transaction_id
        );
        Ok(AnchorReceipt(response.transaction_id))
    }
}

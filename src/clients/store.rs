//! Audit store client: persists flushed batches.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::audit::batch::{AnchorReceipt, PersistedBatch};
use crate::audit::event::LogEvent;
use crate::clients::http::ApiClient;
use crate::clients::AuditStore;

pub struct HttpAuditStore {
    api: ApiClient,
}

impl HttpAuditStore {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl AuditStore for HttpAuditStore {
    async fn submit(
        &self,
        batch: &[LogEvent],
        chain_head: &str,
        receipt: &AnchorReceipt,
    ) -> Result<()> {
        let persisted = PersistedBatch::new(batch.to_vec(), chain_head.to_string(), receipt.clone());
        self.api.post_ack("audit/batches", &persisted).await?;
        info!("Stored {}", persisted.summary());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::event::GENESIS;
    use crate::clients::token::StaticToken;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> HttpAuditStore {
        let api = ApiClient::new(
            server.uri(),
            Duration::from_secs(5),
            Arc::new(StaticToken("secret".to_string())),
        )
        .unwrap();
        HttpAuditStore::new(api)
    }

    fn batch() -> Vec<LogEvent> {
        vec![LogEvent::new(
            "PARCEL_SUBDIVIDED".to_string(),
            json!({"parcel": "P-3", "into": ["P-3a", "P-3b"]}),
            "surveyor".to_string(),
            Utc::now(),
            GENESIS.to_string(),
        )]
    }

    #[tokio::test]
    async fn test_submit_sends_head_and_receipt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audit/batches"))
            .and(body_partial_json(json!({"chain_head": "head-1", "anchor_receipt": "tx-9"})))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        store_for(&server)
            .submit(&batch(), "head-1", &AnchorReceipt("tx-9".to_string()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_submit_rejection_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audit/batches"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = store_for(&server)
            .submit(&batch(), "head-1", &AnchorReceipt("tx-9".to_string()))
            .await;
        assert!(result.is_err());
    }
}

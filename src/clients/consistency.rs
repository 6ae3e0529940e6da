//! Consistency-check endpoint client.

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::clients::http::ApiClient;
use crate::clients::{ConsistencyChecker, ConsistencyReport};

pub struct HttpConsistencyChecker {
    api: ApiClient,
}

impl HttpConsistencyChecker {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ConsistencyChecker for HttpConsistencyChecker {
    async fn check(&self) -> Result<ConsistencyReport> {
        let report: ConsistencyReport = self.api.get_json("blockchain/consistency").await?;
        debug!(
            "Consistency check returned {} inconsistencies",
            report.inconsistencies.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::token::StaticToken;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_check_decodes_report() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blockchain/consistency"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "inconsistencies": [{"record": "lease-4", "reason": "hash drift"}]
            })))
            .mount(&server)
            .await;

        let api = ApiClient::new(
            server.uri(),
            Duration::from_secs(5),
            Arc::new(StaticToken("secret".to_string())),
        )
        .unwrap();
        let report = HttpConsistencyChecker::new(api).check().await.unwrap();

        assert_eq!(report.inconsistencies.len(), 1);
        assert_eq!(report.inconsistencies[0]["record"], "lease-4");
    }
}

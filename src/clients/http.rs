//! Shared HTTP plumbing for the audit API clients.

use anyhow::{anyhow, Result};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::clients::token::TokenProvider;
use crate::error::AuditError;

/// Base URL, pooled client and credential source
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http_client: Client,
    tokens: Arc<dyn TokenProvider>,
}

impl ApiClient {
    pub fn new(
        base_url: String,
        timeout: Duration,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self, AuditError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuditError::Http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            http_client,
            tokens,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.tokens.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// POST a JSON body and decode the JSON response
    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.send_post(path, body).await?;
        response
            .json::<R>()
            .await
            .map_err(|e| anyhow!("Failed to decode response from {}: {}", path, e))
    }

    /// POST a JSON body, caring only that it was accepted
    pub async fn post_ack<B>(&self, path: &str, body: &B) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        self.send_post(path, body).await.map(|_| ())
    }

    /// GET and decode a JSON response
    pub async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        let url = self.url(path);
        debug!("GET {}", url);

        let response = self
            .authorize(self.http_client.get(&url))
            .send()
            .await
            .map_err(|e| anyhow!("Request to {} failed: {}", url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("{} returned {}", url, status));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| anyhow!("Failed to decode response from {}: {}", url, e))
    }

    async fn send_post<B>(&self, path: &str, body: &B) -> Result<reqwest::Response>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        debug!("POST {}", url);

        let response = self
            .authorize(self.http_client.post(&url))
            .json(body)
            .send()
            .await
            .map_err(|e| anyhow!("Request to {} failed: {}", url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("{} returned {}", url, status));
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::token::StaticToken;

    #[test]
    fn test_url_joining() {
        let client = ApiClient::new(
            "http://registry.local/api/".to_string(),
            Duration::from_secs(1),
            Arc::new(StaticToken("t".to_string())),
        )
        .unwrap();

        assert_eq!(client.url("/audit/batches"), "http://registry.local/api/audit/batches");
        assert_eq!(client.base_url(), "http://registry.local/api/");
    }
}

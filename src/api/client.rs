// src/api/client.rs
//! HTTP client for the Graph API batch endpoint.
//!
//! A thin wrapper around reqwest: it posts one batch, checks the status and
//! decodes the result envelope. Interpreting individual items is left to
//! `Batch::demux`.

use super::batch::BatchEntry;
use super::responses::RawItem;
use super::GraphTransport;
use crate::constants::{BATCH_TIMEOUT, GRAPH_API_HOST};
use crate::error::AppError;
use crate::types::AccessToken;
use reqwest::Client;

/// reqwest-backed `GraphTransport`.
#[derive(Clone)]
pub struct GraphHttpClient {
    client: Client,
    endpoint: String,
    access_token: AccessToken,
}

impl GraphHttpClient {
    /// Creates a client for the given API version (e.g. `v2.9`).
    pub fn new(access_token: AccessToken, api_version: &str) -> Result<Self, AppError> {
        let client = Client::builder().timeout(BATCH_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/{}/", GRAPH_API_HOST, api_version.trim_matches('/')),
            access_token,
        })
    }

    /// The versioned API root every relative path is resolved against.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl GraphTransport for GraphHttpClient {
    async fn execute_batch(&self, entries: &[BatchEntry]) -> Result<Vec<Option<RawItem>>, AppError> {
        let batch = serde_json::to_string(entries)?;
        log::debug!("POST {} ({} sub-requests)", self.endpoint, entries.len());

        let response = self
            .client
            .post(&self.endpoint)
            .form(&[
                ("batch", batch.as_str()),
                ("access_token", self.access_token.as_str()),
                ("include_headers", "false"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::BatchRejected { status, body });
        }

        let text = response.text().await?;
        let items: Vec<Option<RawItem>> = serde_json::from_str(&text)?;
        log::debug!("Batch answered with {} items (HTTP {})", items.len(), status);
        Ok(items)
    }
}

//! HTTP implementation of the connector seam.

use crate::config::EdcConfig;
use crate::edc::connector::Connector;
use crate::edc::error::{EdcError, EdcResult};
use async_trait::async_trait;
use dpp_protocol::{CatalogRequest, NegotiationRequest, TransferRequest};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Connector speaking to a real management plane over HTTP.
///
/// Every request carries `Content-Type: application/json` and the
/// `X-Api-Key` header sourced from configuration.
pub struct HttpConnector {
    client: reqwest::Client,
    api_key: String,
}

impl HttpConnector {
    pub fn new(config: &EdcConfig) -> EdcResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .timeout(Duration::from_secs(config.read_timeout))
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
        })
    }

    async fn parse_body(response: reqwest::Response, url: &str) -> EdcResult<Option<Value>> {
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|error| EdcError::Protocol(format!("unparseable body from [{url}]: {error}")))
    }

    async fn post_json<T: Serialize + Sync>(&self, url: &str, body: &T) -> EdcResult<Option<Value>> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header("X-Api-Key", &self.api_key)
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Self::parse_body(response, url).await
    }

    async fn get_json(&self, url: &str, accept: Option<&str>) -> EdcResult<Option<Value>> {
        let mut request = self
            .client
            .get(url)
            .header(CONTENT_TYPE, "application/json")
            .header("X-Api-Key", &self.api_key);
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }
        let response = request.send().await?.error_for_status()?;
        Self::parse_body(response, url).await
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn request_catalog(&self, url: &str, request: &CatalogRequest) -> EdcResult<Option<Value>> {
        self.post_json(url, request).await
    }

    async fn start_negotiation(
        &self,
        url: &str,
        request: &NegotiationRequest,
    ) -> EdcResult<Option<Value>> {
        self.post_json(url, request).await
    }

    async fn fetch_negotiation(&self, url: &str) -> EdcResult<Option<Value>> {
        self.get_json(url, None).await
    }

    async fn start_transfer(&self, url: &str, request: &TransferRequest) -> EdcResult<Option<Value>> {
        self.post_json(url, request).await
    }

    async fn fetch_transfer(&self, url: &str) -> EdcResult<Option<Value>> {
        self.get_json(url, None).await
    }

    async fn fetch_artifact(&self, url: &str) -> EdcResult<Option<Value>> {
        self.get_json(url, Some("application/octet-stream")).await
    }
}

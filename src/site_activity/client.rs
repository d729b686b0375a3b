//! HTTP client for the upstream site-activity endpoint.
//!
//! Uses reqwest with a static `api_key` header. All page requests target
//! `{base_url}/site-activity`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{PageError, PageRequest, PageResult, PageSource, Record};
use crate::types::FetcherConfig;

/// Upstream envelope: `{ code, status, data: { summary: { totalSites }, sites } }`.
#[derive(Debug, Deserialize)]
struct SiteActivityEnvelope {
    data: Option<SiteActivityData>,
}

#[derive(Debug, Deserialize)]
struct SiteActivityData {
    summary: Option<UpstreamSummary>,
    sites: Option<Vec<Record>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpstreamSummary {
    total_sites: Option<u64>,
}

pub struct SiteActivityClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout_secs: u64,
}

impl SiteActivityClient {
    pub fn new(config: &FetcherConfig) -> Result<Self, String> {
        let api_key = config
            .api_key
            .clone()
            .ok_or("API key not configured")?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            endpoint: format!("{}/site-activity", config.base_url.trim_end_matches('/')),
            api_key,
            timeout_secs: config.request_timeout_secs,
        })
    }

    fn classify_transport_error(&self, err: reqwest::Error) -> PageError {
        if err.is_timeout() {
            PageError::Timeout(self.timeout_secs)
        } else if err.is_decode() {
            PageError::Malformed(err.to_string())
        } else {
            PageError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl PageSource for SiteActivityClient {
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResult, PageError> {
        let resp = self
            .client
            .get(&self.endpoint)
            .header("api_key", self.api_key.as_str())
            .header("Content-Type", "application/json")
            .query(&request.query_pairs())
            .send()
            .await
            .map_err(|e| self.classify_transport_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error(status, text));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| self.classify_transport_error(e))?;
        parse_page(&body)
    }
}

fn status_error(status: reqwest::StatusCode, body: String) -> PageError {
    if status == reqwest::StatusCode::GATEWAY_TIMEOUT {
        return PageError::GatewayTimeout;
    }
    let message = if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_string()
    } else {
        body
    };
    PageError::Status {
        status: status.as_u16(),
        message,
    }
}

/// Decode one upstream page. Any missing piece is a malformed page.
fn parse_page(body: &str) -> Result<PageResult, PageError> {
    let envelope: SiteActivityEnvelope = serde_json::from_str(body)
        .map_err(|e| PageError::Malformed(format!("invalid JSON: {}", e)))?;
    let data = envelope
        .data
        .ok_or_else(|| PageError::Malformed("missing 'data'".to_string()))?;
    let total_count = data
        .summary
        .and_then(|s| s.total_sites)
        .ok_or_else(|| PageError::Malformed("missing 'data.summary.totalSites'".to_string()))?;
    let records = data
        .sites
        .ok_or_else(|| PageError::Malformed("missing 'data.sites'".to_string()))?;

    Ok(PageResult {
        records,
        total_count,
    })
}

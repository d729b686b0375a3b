//! Site-activity pipeline API: batched, retrying retrieval.
//!
//! The upstream endpoint is paginated, slow, and returns the occasional 504
//! under load. Page 0 discovers the total; remaining pages are fetched in
//! bounded waves and merged back in offset order.
//!
//! Modules:
//! - client: reqwest implementation of `PageSource`
//! - fetcher: `BatchFetcher::fetch_all`
//! - waves: bounded-concurrency wave scheduler

pub mod client;
pub mod fetcher;
pub mod waves;

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::SiteQuery;

pub use client::SiteActivityClient;
pub use fetcher::BatchFetcher;

/// One pipeline entry. Opaque to the fetcher; only concatenated.
pub type Record = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// Page types
// ============================================================================

/// A single page request. Immutable once issued; retries reuse it as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub offset: u64,
    pub page_size: u64,
    pub query: SiteQuery,
}

impl PageRequest {
    pub fn new(offset: u64, page_size: u64, query: SiteQuery) -> Self {
        Self {
            offset,
            page_size,
            query,
        }
    }

    /// Query-string pairs for the upstream GET: the filters plus limit/offset.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let q = &self.query;
        let mut pairs = vec![("utmSource", q.source.clone())];
        if let Some(from) = q.from {
            pairs.push(("from", from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = q.to {
            pairs.push(("to", to.format("%Y-%m-%d").to_string()));
        }
        pairs.push(("siteType", q.site_type.clone()));
        pairs.push(("includeDetails", q.include_details.to_string()));
        if let Some(email) = q.agent_email.as_deref().filter(|e| !e.is_empty()) {
            pairs.push(("agentEmail", email.to_string()));
        }
        pairs.push(("format", "json".to_string()));
        pairs.push(("limit", self.page_size.to_string()));
        pairs.push(("offset", self.offset.to_string()));
        pairs
    }
}

/// A successfully retrieved page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageResult {
    pub records: Vec<Record>,
    /// Upstream `summary.totalSites`. Only meaningful on page 0.
    pub total_count: u64,
}

/// Source of pages. The HTTP client implements this; tests script it.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResult, PageError>;
}

// ============================================================================
// Aggregate
// ============================================================================

/// Merged outcome of one `fetch_all` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateResult {
    /// Succeeded pages concatenated in ascending offset order.
    pub records: Vec<Record>,
    pub total_requested: u64,
    pub total_returned: u64,
    pub failed_offsets: BTreeSet<u64>,
}

impl AggregateResult {
    pub fn is_partial(&self) -> bool {
        !self.failed_offsets.is_empty()
    }

    /// Reduced-confidence notice for callers, present only when pages were lost.
    pub fn warning(&self) -> Option<String> {
        if !self.is_partial() {
            return None;
        }
        let failed = self.failed_offsets.len();
        Some(format!(
            "{} {} failed to load after retry; returned {} of {} sites",
            failed,
            if failed == 1 { "batch" } else { "batches" },
            self.total_returned,
            self.total_requested
        ))
    }
}

// ============================================================================
// Error types
// ============================================================================

/// Failure of a single page attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),
    #[error("Upstream gateway timeout (504)")]
    GatewayTimeout,
    #[error("Upstream error {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Malformed upstream response: {0}")]
    Malformed(String),
}

impl PageError {
    /// Only timeouts and 504s earn the single retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PageError::Timeout(_) | PageError::GatewayTimeout)
    }
}

/// Call-level failure of `fetch_all`. Page failures past page 0 never land here.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("First page failed after {attempts} attempt(s): {source}")]
    Foundational {
        attempts: u32,
        #[source]
        source: PageError,
    },
    #[error("Upstream reported no sites for this query")]
    NoRecords,
    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_query_pairs_include_filters_and_paging() {
        let mut query = SiteQuery::new("PROJECTSOLAR");
        query.from = NaiveDate::from_ymd_opt(2025, 3, 1);
        query.to = NaiveDate::from_ymd_opt(2025, 3, 31);
        query.include_details = true;
        query.agent_email = Some("agent@projectsolar.co.uk".to_string());

        let pairs = PageRequest::new(400, 200, query).query_pairs();
        let get = |k: &str| {
            pairs
                .iter()
                .find(|(key, _)| *key == k)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("utmSource"), Some("PROJECTSOLAR"));
        assert_eq!(get("from"), Some("2025-03-01"));
        assert_eq!(get("to"), Some("2025-03-31"));
        assert_eq!(get("siteType"), Some("domestic"));
        assert_eq!(get("includeDetails"), Some("true"));
        assert_eq!(get("agentEmail"), Some("agent@projectsolar.co.uk"));
        assert_eq!(get("limit"), Some("200"));
        assert_eq!(get("offset"), Some("400"));
    }

    #[test]
    fn test_query_pairs_omit_unset_optionals() {
        let mut query = SiteQuery::new("PROJECTSOLAR");
        query.agent_email = Some(String::new());
        let pairs = PageRequest::new(0, 200, query).query_pairs();
        let keys: Vec<&str> = pairs.iter().map(|(k, _)| *k).collect();
        assert!(!keys.contains(&"from"));
        assert!(!keys.contains(&"to"));
        assert!(!keys.contains(&"agentEmail"));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(PageError::Timeout(45).is_retryable());
        assert!(PageError::GatewayTimeout.is_retryable());
        assert!(!PageError::Network("dns".into()).is_retryable());
        assert!(!PageError::Malformed("no data".into()).is_retryable());
        assert!(!PageError::Status {
            status: 500,
            message: "boom".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_warning_only_when_pages_failed() {
        let complete = AggregateResult {
            total_requested: 450,
            total_returned: 450,
            ..AggregateResult::default()
        };
        assert!(complete.warning().is_none());

        let partial = AggregateResult {
            total_requested: 450,
            total_returned: 400,
            failed_offsets: [400].into_iter().collect(),
            ..AggregateResult::default()
        };
        let warning = partial.warning().unwrap();
        assert!(warning.starts_with("1 batch failed"));
        assert!(warning.contains("400 of 450"));

        let worse = AggregateResult {
            total_requested: 650,
            total_returned: 250,
            failed_offsets: [200, 400].into_iter().collect(),
            ..AggregateResult::default()
        };
        assert!(worse.warning().unwrap().starts_with("2 batches failed"));
    }
}

use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Top-level proxy configuration (~/.site-activity/config.json).
///
/// Every field has a default so an absent or partial file still yields a
/// usable config; the credential normally arrives through the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub upstream: FetcherConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Upstream site-activity API settings, injected into the batch fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetcherConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Static credential sent as the `api_key` header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Records per page. Must be identical for every page of one call.
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    /// Maximum page requests in flight at once (wave width).
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Per-attempt timeout for a single page request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Attempts per page, including the first. 2 means one retry.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_base_url() -> String {
    "https://api.thelabrador.co.uk/carbon/v3".to_string()
}

fn default_page_size() -> u64 {
    200
}

fn default_max_concurrent() -> usize {
    2
}

fn default_request_timeout_secs() -> u64 {
    45
}

fn default_max_attempts() -> u32 {
    2
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            page_size: default_page_size(),
            max_concurrent: default_max_concurrent(),
            request_timeout_secs: default_request_timeout_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl FetcherConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Reject settings the fetcher cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.page_size == 0 {
            return Err("pageSize must be greater than 0".to_string());
        }
        if self.max_concurrent == 0 {
            return Err("maxConcurrent must be at least 1".to_string());
        }
        if self.max_attempts == 0 {
            return Err("maxAttempts must be at least 1".to_string());
        }
        if self.request_timeout_secs == 0 {
            return Err("requestTimeoutSecs must be greater than 0".to_string());
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| format!("Invalid baseUrl '{}': {}", self.base_url, e))?;
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(()),
            _ => Err("API key not configured".to_string()),
        }
    }
}

/// HTTP listener settings for the proxy binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8787".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Dashboard filter object, forwarded verbatim to every page request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteQuery {
    /// Lead source identifier (`utmSource` upstream), e.g. "PROJECTSOLAR".
    #[serde(alias = "utmSource")]
    pub source: String,
    #[serde(default, alias = "fromDate", skip_serializing_if = "Option::is_none")]
    pub from: Option<NaiveDate>,
    #[serde(default, alias = "toDate", skip_serializing_if = "Option::is_none")]
    pub to: Option<NaiveDate>,
    #[serde(default = "default_site_type")]
    pub site_type: String,
    #[serde(default)]
    pub include_details: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_email: Option<String>,
}

fn default_site_type() -> String {
    "domestic".to_string()
}

impl SiteQuery {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            from: None,
            to: None,
            site_type: default_site_type(),
            include_details: false,
            agent_email: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> FetcherConfig {
        FetcherConfig {
            api_key: Some("test-key".to_string()),
            ..FetcherConfig::default()
        }
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let json = r#"{ "upstream": { "pageSize": 500, "maxConcurrent": 3 } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.upstream.page_size, 500);
        assert_eq!(config.upstream.max_concurrent, 3);
        assert_eq!(config.upstream.max_attempts, 2);
        assert_eq!(config.upstream.request_timeout_secs, 45);
        assert_eq!(config.server.bind_addr, "127.0.0.1:8787");
        assert!(config.upstream.api_key.is_none());
    }

    #[test]
    fn test_validate_accepts_defaults_with_key() {
        assert!(configured().validate().is_ok());
    }

    #[test]
    fn test_validate_requires_api_key() {
        let err = FetcherConfig::default().validate().unwrap_err();
        assert!(err.contains("API key"));

        let blank = FetcherConfig {
            api_key: Some("   ".to_string()),
            ..FetcherConfig::default()
        };
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let zero_page = FetcherConfig {
            page_size: 0,
            ..configured()
        };
        assert!(zero_page.validate().unwrap_err().contains("pageSize"));

        let zero_concurrency = FetcherConfig {
            max_concurrent: 0,
            ..configured()
        };
        assert!(zero_concurrency
            .validate()
            .unwrap_err()
            .contains("maxConcurrent"));

        let zero_attempts = FetcherConfig {
            max_attempts: 0,
            ..configured()
        };
        assert!(zero_attempts.validate().unwrap_err().contains("maxAttempts"));
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let config = FetcherConfig {
            base_url: "not a url".to_string(),
            ..configured()
        };
        assert!(config.validate().unwrap_err().contains("baseUrl"));
    }

    #[test]
    fn test_site_query_accepts_dashboard_field_names() {
        let json = r#"{
            "utmSource": "PROJECTSOLAR",
            "fromDate": "2025-01-01",
            "toDate": "2025-01-31",
            "siteType": "commercial",
            "includeDetails": true
        }"#;
        let query: SiteQuery = serde_json::from_str(json).unwrap();
        assert_eq!(query.source, "PROJECTSOLAR");
        assert_eq!(query.from, NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(query.to, NaiveDate::from_ymd_opt(2025, 1, 31));
        assert_eq!(query.site_type, "commercial");
        assert!(query.include_details);
        assert!(query.agent_email.is_none());
    }

    #[test]
    fn test_site_query_defaults_site_type() {
        let query: SiteQuery = serde_json::from_str(r#"{ "source": "X" }"#).unwrap();
        assert_eq!(query, SiteQuery::new("X"));
    }
}

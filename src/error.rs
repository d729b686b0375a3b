//! Caller-facing error representation for the proxy
//!
//! Errors are classified by recoverability:
//! - Retryable: the upstream could not serve the first page; try again later
//! - NonRetryable: the query matched nothing
//! - RequiresOperatorAction: the proxy itself is misconfigured

use axum::http::StatusCode;

use crate::site_activity::{FetchError, PageError};

impl FetchError {
    /// Returns true if re-invoking the whole fetch may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Foundational { .. })
    }

    /// Returns true if only the operator can fix this
    pub fn requires_operator_action(&self) -> bool {
        match self {
            FetchError::Config(_) => true,
            FetchError::Foundational { source, .. } => {
                matches!(source, PageError::Status { status: 401 | 403, .. })
            }
            FetchError::NoRecords => false,
        }
    }

    /// Get a user-friendly recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            FetchError::Foundational { source, .. } => match source {
                PageError::Timeout(_) | PageError::GatewayTimeout => {
                    "Site data is temporarily unavailable. Try again in a few minutes."
                }
                PageError::Status { status: 401 | 403, .. } => {
                    "The upstream API rejected the proxy credential. Check the configured API key."
                }
                PageError::Network(_) => "The upstream API could not be reached. Try again.",
                _ => "Site data is unavailable. Try again.",
            },
            FetchError::NoRecords => "No sites match these filters. Widen the date range or source.",
            FetchError::Config(_) => "Check the proxy configuration in ~/.site-activity/config.json",
        }
    }

    /// HTTP status used when this error is returned to the dashboard
    pub fn http_status(&self) -> StatusCode {
        match self {
            FetchError::Foundational { .. } => StatusCode::BAD_GATEWAY,
            FetchError::NoRecords => StatusCode::NOT_FOUND,
            FetchError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Serializable error body returned by the proxy routes
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub error_type: ErrorType,
    pub can_retry: bool,
    pub recovery_suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorType {
    Retryable,
    NonRetryable,
    RequiresOperatorAction,
}

impl From<&FetchError> for ErrorBody {
    fn from(err: &FetchError) -> Self {
        let error_type = if err.requires_operator_action() {
            ErrorType::RequiresOperatorAction
        } else if err.is_retryable() {
            ErrorType::Retryable
        } else {
            ErrorType::NonRetryable
        };

        ErrorBody {
            error: err.to_string(),
            error_type,
            can_retry: error_type == ErrorType::Retryable,
            recovery_suggestion: err.recovery_suggestion().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foundational_timeout_is_retryable() {
        let err = FetchError::Foundational {
            attempts: 2,
            source: PageError::GatewayTimeout,
        };
        let body = ErrorBody::from(&err);
        assert_eq!(body.error_type, ErrorType::Retryable);
        assert!(body.can_retry);
        assert!(body.error.contains("after 2 attempt(s)"));
        assert_eq!(err.http_status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_rejected_credential_needs_operator() {
        let err = FetchError::Foundational {
            attempts: 1,
            source: PageError::Status {
                status: 401,
                message: "invalid api_key".into(),
            },
        };
        let body = ErrorBody::from(&err);
        assert_eq!(body.error_type, ErrorType::RequiresOperatorAction);
        assert!(!body.can_retry);
        assert!(body.recovery_suggestion.contains("API key"));
    }

    #[test]
    fn test_no_records_is_not_retryable() {
        let body = ErrorBody::from(&FetchError::NoRecords);
        assert_eq!(body.error_type, ErrorType::NonRetryable);
        assert!(!body.can_retry);
        assert_eq!(FetchError::NoRecords.http_status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_error_body_serializes_camel_case() {
        let body = ErrorBody::from(&FetchError::Config("API key not configured".into()));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["errorType"], "requiresOperatorAction");
        assert_eq!(json["canRetry"], false);
        assert!(json["recoverySuggestion"].is_string());
        assert_eq!(json["error"], "Configuration error: API key not configured");
    }
}

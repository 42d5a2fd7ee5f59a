use std::time::Duration;

/// Typed error hierarchy for provider and pipeline operations.
/// Classifies errors as fatal (don't retry), retryable, or operational.
#[derive(Clone, Debug, thiserror::Error)]
pub enum SenseiError {
    // Fatal — don't retry
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("provider not configured")]
    NoProvider,

    // Retryable
    #[error("daily quota exhausted")]
    QuotaExhausted { retry_after: Option<Duration> },
    #[error("server error {status}: {body}")]
    ServerError { status: u16, body: String },
    #[error("network error: {0}")]
    NetworkError(String),

    // Operational
    #[error("malformed model output: {0}")]
    MalformedOutput(String),
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    #[error("cancelled")]
    Cancelled,
}

impl SenseiError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServerError { .. } | Self::NetworkError(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed(_) | Self::InvalidRequest(_) | Self::NoProvider
        )
    }

    /// Quota errors must route to the deterministic fallback without
    /// consuming further daily budget, so they get their own check.
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExhausted { .. })
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed(_) => "authentication_failed",
            Self::InvalidRequest(_) => "invalid_request",
            Self::NoProvider => "no_provider",
            Self::QuotaExhausted { .. } => "quota_exhausted",
            Self::ServerError { .. } => "server_error",
            Self::NetworkError(_) => "network_error",
            Self::MalformedOutput(_) => "malformed_output",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
        }
    }

    /// Classify an HTTP status code into the appropriate error variant.
    /// Some providers report quota exhaustion as a 400/500 with a telltale
    /// body, so the body text is inspected too.
    pub fn from_status(status: u16, body: String) -> Self {
        if status == 429 || body_signals_quota(&body) {
            return Self::QuotaExhausted { retry_after: None };
        }
        match status {
            401 | 403 => Self::AuthenticationFailed(body),
            400 => Self::InvalidRequest(body),
            500..=599 => Self::ServerError { status, body },
            _ => Self::InvalidRequest(format!("unexpected status {status}: {body}")),
        }
    }
}

fn body_signals_quota(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("resource_exhausted")
        || lower.contains("resource exhausted")
        || lower.contains("quota")
        || lower.contains("rate limit")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(SenseiError::ServerError { status: 500, body: "err".into() }.is_retryable());
        assert!(SenseiError::NetworkError("tcp".into()).is_retryable());
        // Quota is deliberately NOT retryable: it routes to fallback instead.
        assert!(!SenseiError::QuotaExhausted { retry_after: None }.is_retryable());
    }

    #[test]
    fn fatal_classification() {
        assert!(SenseiError::AuthenticationFailed("bad key".into()).is_fatal());
        assert!(SenseiError::InvalidRequest("bad".into()).is_fatal());
        assert!(SenseiError::NoProvider.is_fatal());
    }

    #[test]
    fn not_retryable_and_not_fatal() {
        let timeout = SenseiError::Timeout(Duration::from_secs(30));
        assert!(!timeout.is_retryable());
        assert!(!timeout.is_fatal());

        let parse = SenseiError::MalformedOutput("bad json".into());
        assert!(!parse.is_retryable());
        assert!(!parse.is_fatal());
    }

    #[test]
    fn from_status_mapping() {
        assert!(SenseiError::from_status(401, "unauthorized".into()).is_fatal());
        assert!(SenseiError::from_status(400, "bad request".into()).is_fatal());
        assert!(SenseiError::from_status(429, "too many requests".into()).is_quota());
        assert!(SenseiError::from_status(500, "internal".into()).is_retryable());
        assert!(SenseiError::from_status(502, "bad gateway".into()).is_retryable());
    }

    #[test]
    fn quota_signature_in_body() {
        assert!(SenseiError::from_status(400, "RESOURCE_EXHAUSTED: daily cap".into()).is_quota());
        assert!(SenseiError::from_status(503, "quota exceeded for model".into()).is_quota());
        assert!(!SenseiError::from_status(503, "backend unavailable".into()).is_quota());
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(SenseiError::Cancelled.error_kind(), "cancelled");
        assert_eq!(
            SenseiError::QuotaExhausted { retry_after: None }.error_kind(),
            "quota_exhausted"
        );
        assert_eq!(SenseiError::NoProvider.error_kind(), "no_provider");
    }
}

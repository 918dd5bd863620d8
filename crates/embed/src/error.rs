use thiserror::Error;

/// Sentinel status recorded when a backend's response could not be decoded
/// into the expected shape at all.
pub const STATUS_MALFORMED: i32 = -1;

/// A failed call to an embedding backend, classified for retry decisions.
#[derive(Debug, Clone, Error)]
#[error("{provider} embedding request failed (status {status}): {message}")]
pub struct EmbeddingServiceError {
    /// Backend that produced the failure (`"ollama"` / `"openai"`).
    pub provider: &'static str,
    /// HTTP status code, or [`STATUS_MALFORMED`] for an undecodable body.
    pub status: i32,
    pub message: String,
}

impl EmbeddingServiceError {
    pub fn new(provider: &'static str, status: i32, message: impl Into<String>) -> Self {
        Self {
            provider,
            status,
            message: message.into(),
        }
    }

    /// True when a retry without reconfiguration cannot be expected to
    /// succeed: server errors (status >= 500), auth/endpoint errors
    /// (401, 403, 404), and undecodable responses ([`STATUS_MALFORMED`]).
    /// Everything else — notably 429 rate limiting and 400 — stays
    /// recoverable.
    pub fn is_unrecoverable(&self) -> bool {
        self.status >= 500
            || matches!(self.status, 401 | 403 | 404)
            || self.status == STATUS_MALFORMED
    }
}

/// Errors producible by [`create_provider`](crate::create_provider) and the
/// provider calls themselves.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// The configured provider name matches no known backend.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// The backend answered, and the answer was a failure.
    #[error(transparent)]
    Service(#[from] EmbeddingServiceError),

    /// The request never produced a usable response: connect failure,
    /// timeout, or an interrupted body read.
    #[error("{provider} embedding request failed: {source}")]
    Network {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP client itself could not be constructed.
    #[error("failed to build embedding http client: {0}")]
    BuildClient(#[from] reqwest::Error),
}

impl EmbedError {
    /// [`EmbeddingServiceError::is_unrecoverable`] extended across every
    /// variant, so callers can classify uniformly: network trouble is worth
    /// retrying, a bad provider name or broken client never is.
    pub fn is_unrecoverable(&self) -> bool {
        match self {
            Self::Service(err) => err.is_unrecoverable(),
            Self::Network { .. } => false,
            Self::UnknownProvider(_) | Self::BuildClient(_) => true,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecoverable_statuses() {
        for status in [500, 502, 503, 599, 401, 403, 404, STATUS_MALFORMED] {
            let err = EmbeddingServiceError::new("ollama", status, "boom");
            assert!(
                err.is_unrecoverable(),
                "status {status} must classify as unrecoverable"
            );
        }
    }

    #[test]
    fn recoverable_statuses() {
        for status in [429, 400, 408, 499] {
            let err = EmbeddingServiceError::new("openai", status, "try later");
            assert!(
                !err.is_unrecoverable(),
                "status {status} must stay recoverable"
            );
        }
    }

    #[test]
    fn display_includes_provider_status_and_message() {
        let err = EmbeddingServiceError::new("openai", 401, "bad key");
        assert_eq!(
            err.to_string(),
            "openai embedding request failed (status 401): bad key"
        );
    }

    #[test]
    fn malformed_sentinel_display() {
        let err = EmbeddingServiceError::new("ollama", STATUS_MALFORMED, "not json");
        assert_eq!(
            err.to_string(),
            "ollama embedding request failed (status -1): not json"
        );
    }

    #[test]
    fn enum_classification_covers_non_service_variants() {
        assert!(EmbedError::UnknownProvider("cohere".to_string()).is_unrecoverable());

        let recoverable = EmbedError::from(EmbeddingServiceError::new("ollama", 429, "later"));
        assert!(!recoverable.is_unrecoverable());

        let fatal = EmbedError::from(EmbeddingServiceError::new("ollama", 503, "down"));
        assert!(fatal.is_unrecoverable());
    }
}

//! Pluggable embedding backends for the document index.
//!
//! Everything the indexing pipeline needs sits behind the
//! [`EmbeddingProvider`] trait: one text or a batch of texts in, fixed-width
//! vectors out.
//!
//! | Provider           | Style                                          |
//! |--------------------|------------------------------------------------|
//! | [`OllamaProvider`] | local inference server, one prompt per request |
//! | [`OpenAiProvider`] | hosted API, native batch endpoint              |
//!
//! Selection happens through [`create_provider`], keyed on the `provider`
//! field of [`EmbeddingConfig`].  Failures surface as [`EmbedError`]; the
//! caller drives its retry policy off [`EmbedError::is_unrecoverable`] —
//! providers themselves never retry.

use std::time::Duration;

use async_trait::async_trait;

use notevault_config::EmbeddingConfig;

mod error;
mod ollama;
mod openai;

pub use error::{EmbedError, EmbeddingServiceError, STATUS_MALFORMED};
pub use ollama::{DEFAULT_OLLAMA_BASE_URL, DEFAULT_OLLAMA_DIMENSION, OllamaProvider};
pub use openai::{DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_DIMENSION, OpenAiProvider};

/// Per-request timeout applied to every provider HTTP client.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Cap on the response-body text carried into error messages.
pub(crate) const ERROR_BODY_LIMIT: usize = 200;

/// Uniform contract over heterogeneous embedding backends.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text into one vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Embed a batch of texts, one vector per input, in input order.
    ///
    /// All-or-nothing: when any item fails the whole call returns an error
    /// and no partial vectors are handed back.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// Vector width produced by this provider+model combination.
    fn dimension(&self) -> usize;
}

/// Build the [`EmbeddingProvider`] selected by the configuration.
///
/// | `provider` value | Implementation     |
/// |------------------|--------------------|
/// | `"ollama"`       | [`OllamaProvider`] |
/// | `"openai"`       | [`OpenAiProvider`] |
///
/// Unrecognised names are an error; there is no implicit fallback.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>, EmbedError> {
    match config.provider.as_str() {
        "ollama" => Ok(Box::new(OllamaProvider::new(config)?)),
        "openai" => Ok(Box::new(OpenAiProvider::new(config)?)),
        other => Err(EmbedError::UnknownProvider(other.to_string())),
    }
}

/// Trim a response body down to something that can live inside an error
/// message without flooding the log.
pub(crate) fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= ERROR_BODY_LIMIT {
        return trimmed.to_string();
    }
    let mut end = ERROR_BODY_LIMIT;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &trimmed[..end])
}

// ── Tests ────────────────────────────────────────────────────────────────────

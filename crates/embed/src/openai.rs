use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use notevault_config::EmbeddingConfig;

use crate::error::{EmbedError, EmbeddingServiceError, STATUS_MALFORMED};
use crate::{EmbeddingProvider, REQUEST_TIMEOUT, truncate_body};

/// Endpoint of the hosted OpenAI API, used when the configured base URL is
/// empty.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Vector width assumed for OpenAI models missing from the lookup table.
pub const DEFAULT_OPENAI_DIMENSION: usize = 1536;

const PROVIDER: &str = "openai";

/// Embedding backend talking to an OpenAI-compatible hosted API.
///
/// The `/embeddings` endpoint accepts a whole batch per request, so
/// [`EmbeddingProvider::embed_batch`] is a single round trip and
/// [`EmbeddingProvider::embed`] is the one-element special case.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    dimension: usize,
}

impl OpenAiProvider {
    /// A missing `api_key` is not a construction error: the backend's own
    /// 401 is the single source of truth for bad credentials.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbedError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let base_url = if config.base_url.is_empty() {
            DEFAULT_OPENAI_BASE_URL.to_string()
        } else {
            config.base_url.trim_end_matches('/').to_string()
        };

        Ok(Self {
            client,
            base_url,
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            dimension: openai_dimension(&config.model),
        })
    }

    async fn request_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let endpoint = format!("{}/embeddings", self.base_url);
        let payload = json!({ "model": self.model, "input": texts });

        debug!(model = %self.model, items = texts.len(), "requesting embedding batch");
        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|source| EmbedError::Network {
                provider: PROVIDER,
                source,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| EmbedError::Network {
                provider: PROVIDER,
                source,
            })?;

        if !status.is_success() {
            return Err(EmbeddingServiceError::new(
                PROVIDER,
                i32::from(status.as_u16()),
                truncate_body(&body),
            )
            .into());
        }

        parse_batch_body(&body, texts.len()).map_err(Into::into)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut vectors = self.request_batch(&[text.to_string()]).await?;
        match vectors.pop() {
            Some(vector) => Ok(vector),
            None => Err(EmbeddingServiceError::new(
                PROVIDER,
                STATUS_MALFORMED,
                "response carried no embedding",
            )
            .into()),
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request_batch(texts).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Decode `{"data": [{"embedding": [..]}, ..]}` out of a 2xx response body.
///
/// Items arrive aligned with the request's input order.  A body that does
/// not decode, or whose item count differs from `expected`, classifies as
/// [`STATUS_MALFORMED`].
fn parse_batch_body(body: &str, expected: usize) -> Result<Vec<Vec<f32>>, EmbeddingServiceError> {
    #[derive(Deserialize)]
    struct BatchResponse {
        data: Vec<BatchItem>,
    }

    #[derive(Deserialize)]
    struct BatchItem {
        embedding: Vec<f32>,
    }

    let parsed: BatchResponse = serde_json::from_str(body).map_err(|_| {
        EmbeddingServiceError::new(
            PROVIDER,
            STATUS_MALFORMED,
            format!(
                "response is not an embedding payload: {}",
                truncate_body(body)
            ),
        )
    })?;

    if parsed.data.len() != expected {
        return Err(EmbeddingServiceError::new(
            PROVIDER,
            STATUS_MALFORMED,
            format!(
                "expected {expected} embeddings, response carried {}",
                parsed.data.len()
            ),
        ));
    }

    Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
}

/// Known vector widths per OpenAI embedding model.  Unknown models fall
/// back to [`DEFAULT_OPENAI_DIMENSION`].
pub fn openai_dimension(model: &str) -> usize {
    match model {
        "text-embedding-3-small" => 1536,
        "text-embedding-3-large" => 3072,
        "text-embedding-ada-002" => 1536,
        _ => DEFAULT_OPENAI_DIMENSION,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

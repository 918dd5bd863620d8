use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use notevault_config::EmbeddingConfig;

use crate::error::{EmbedError, EmbeddingServiceError, STATUS_MALFORMED};
use crate::{EmbeddingProvider, REQUEST_TIMEOUT, truncate_body};

/// Endpoint of a locally running Ollama server, used when the configured
/// base URL is empty.
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Vector width assumed for Ollama models missing from the lookup table.
pub const DEFAULT_OLLAMA_DIMENSION: usize = 768;

const PROVIDER: &str = "ollama";

/// Embedding backend talking to a local Ollama server.
///
/// Ollama has no batch endpoint, so [`EmbeddingProvider::embed_batch`]
/// issues one `POST /api/embeddings` per text, sequentially, and aborts on
/// the first failure.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimension: usize,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbedError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let base_url = if config.base_url.is_empty() {
            DEFAULT_OLLAMA_BASE_URL.to_string()
        } else {
            config.base_url.trim_end_matches('/').to_string()
        };

        Ok(Self {
            client,
            base_url,
            model: config.model.clone(),
            dimension: ollama_dimension(&config.model),
        })
    }

    async fn request_embedding(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let endpoint = format!("{}/api/embeddings", self.base_url);
        let payload = json!({ "model": self.model, "prompt": text });

        let response = self
            .client
            .post(&endpoint)
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

        parse_embedding_body(&body).map_err(Into::into)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.request_embedding(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        debug!(model = %self.model, items = texts.len(), "embedding batch sequentially");
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            // The first failure aborts the loop: no partial batches.
            vectors.push(self.request_embedding(text).await?);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Decode `{"embedding": [..]}` out of a 2xx response body.
///
/// Anything else — HTML from a mispointed base URL, a JSON object missing
/// the field, an empty vector — classifies as [`STATUS_MALFORMED`].
fn parse_embedding_body(body: &str) -> Result<Vec<f32>, EmbeddingServiceError> {
    #[derive(Deserialize)]
    struct EmbeddingResponse {
        embedding: Vec<f32>,
    }

    let parsed: EmbeddingResponse = serde_json::from_str(body).map_err(|_| {
        EmbeddingServiceError::new(
            PROVIDER,
            STATUS_MALFORMED,
            format!(
                "response is not an embedding payload: {}",
                truncate_body(body)
            ),
        )
    })?;

    if parsed.embedding.is_empty() {
        return Err(EmbeddingServiceError::new(
            PROVIDER,
            STATUS_MALFORMED,
            "response carried an empty embedding",
        ));
    }

    Ok(parsed.embedding)
}

/// Known vector widths per Ollama embedding model.  A `:tag` suffix is
/// ignored, so `nomic-embed-text:latest` resolves like `nomic-embed-text`.
/// Unknown models fall back to [`DEFAULT_OLLAMA_DIMENSION`].
pub fn ollama_dimension(model: &str) -> usize {
    let base = model.split_once(':').map_or(model, |(base, _)| base);
    match base {
        "mxbai-embed-large" => 1024,
        "snowflake-arctic-embed" => 1024,
        "nomic-embed-text" => 768,
        "all-minilm" => 384,
        _ => DEFAULT_OLLAMA_DIMENSION,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

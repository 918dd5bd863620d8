use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

// ── Vault config ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Root data directory owned by the application.  Documents live in the
    /// `documents` subdirectory; the search index file lives at the root.
    pub data_dir: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            data_dir: ".notevault".to_string(),
        }
    }
}

impl VaultConfig {
    pub fn root(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }
}

// ── Watcher config ────────────────────────────────────────────────────────────

/// Timing knobs for the filesystem change watcher.
///
/// `self_write_window_ms` should comfortably exceed `debounce_ms`: a single
/// save can produce several raw notifications spread across the debounce
/// interval, and every one of them must still find the self-write record
/// alive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Quiet period after the last raw event before pending changes flush.
    pub debounce_ms: u64,
    /// How long a path stays suppressed after the application writes it.
    pub self_write_window_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            self_write_window_ms: 3000,
        }
    }
}

impl WatcherConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn self_write_window(&self) -> Duration {
        Duration::from_millis(self.self_write_window_ms)
    }
}

// ── Embedding config ──────────────────────────────────────────────────────────

/// Settings for the embedding backend used to index document content.
///
/// | Provider | Endpoint style                       | Auth                |
/// |----------|--------------------------------------|---------------------|
/// | `ollama` | local inference, one prompt per call | none                |
/// | `openai` | hosted API, native batch requests    | bearer `api_key`    |
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Backend selector.  Recognised values: `ollama` (default), `openai`.
    pub provider: String,
    /// Base URL of the backend.  Empty means the provider's well-known
    /// default (`http://localhost:11434` for ollama,
    /// `https://api.openai.com/v1` for openai).  For ollama, the
    /// `OLLAMA_BASE_URL` environment variable overrides this at load time.
    pub base_url: String,
    pub model: String,
    /// API key for hosted providers.  The `OPENAI_API_KEY` environment
    /// variable takes precedence over the config file.
    pub api_key: String,
    /// Maximum characters per chunk handed to the embedding backend.
    /// Consumed by the chunking stage, not by the providers themselves.
    pub max_chunk_size: usize,
    /// Characters of overlap between consecutive chunks.
    pub overlap: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: String::new(),
            model: "nomic-embed-text".to_string(),
            api_key: String::new(),
            max_chunk_size: 500,
            overlap: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub vault: VaultConfig,
    pub watcher: WatcherConfig,
    pub embedding: EmbeddingConfig,
}

impl AppConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }

        // Ollama base URL env override.  Only applied when ollama is the
        // active provider, so a stray env var cannot break a hosted setup.
        if config.embedding.provider.eq_ignore_ascii_case("ollama") {
            if let Ok(value) = env::var("OLLAMA_BASE_URL") {
                if !value.is_empty() {
                    config.embedding.base_url = value;
                }
            }
        }

        // API key env override (takes precedence over config file).
        if let Ok(key) = env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                config.embedding.api_key = key;
            }
        }

        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

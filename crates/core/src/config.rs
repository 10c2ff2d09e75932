use crate::chunking::ChunkingConfig;
use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CHUNK_SIZE: usize = 1_000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
pub const DEFAULT_TOP_K: usize = 4;
pub const DEFAULT_MODEL_NAME: &str = "gpt-4o-mini";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub separators: Vec<String>,
    pub separator_lookback: usize,
    pub top_k: usize,
    pub model_name: String,
    pub embedding_model: String,
    pub embedding_batch_size: usize,
    pub retry: RetryPolicy,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: ChunkingConfig::default_separators(),
            separator_lookback: 200,
            top_k: DEFAULT_TOP_K,
            model_name: DEFAULT_MODEL_NAME.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_batch_size: 64,
            retry: RetryPolicy::default(),
        }
    }
}

impl RagConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chunking()?;
        if self.top_k == 0 {
            return Err(ConfigError::InvalidTopK);
        }
        if self.embedding_batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }
        if self.model_name.trim().is_empty() {
            return Err(ConfigError::MissingModelName);
        }
        Ok(())
    }

    pub fn chunking(&self) -> Result<ChunkingConfig, ConfigError> {
        Ok(ChunkingConfig::new(self.chunk_size, self.chunk_overlap)?
            .with_separators(self.separators.clone())
            .with_lookback(self.separator_lookback))
    }
}

use crate::error::ServiceError;
use async_trait::async_trait;

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    fn dimensions(&self) -> usize;

    /// Returns exactly one vector per input text, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError>;
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, ServiceError>;
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid chunking config: {0}")]
    InvalidChunking(String),

    #[error("top_k must be at least 1")]
    InvalidTopK,

    #[error("embedding batch size must be at least 1")]
    InvalidBatchSize,

    #[error("model name is empty")]
    MissingModelName,

    #[error("api key missing for {0}")]
    MissingApiKey(String),

    #[error("invalid service endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("http client setup failed: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unreadable document {document}: {reason}")]
    UnreadableDocument { document: String, reason: String },

    #[error("no text could be extracted from {document}")]
    EmptyExtraction { document: String },

    #[error("document name appears more than once in the batch: {0}")]
    DuplicateDocument(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{service} unavailable: {details}")]
    Unavailable { service: String, details: String },

    #[error("{service} rate limited: {details}")]
    RateLimited { service: String, details: String },

    #[error("{service} filtered the content: {details}")]
    ContentFiltered { service: String, details: String },

    #[error("invalid response from {service}: {details}")]
    InvalidResponse { service: String, details: String },
}

impl ServiceError {
    pub fn unavailable(service: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Unavailable {
            service: service.into(),
            details: details.into(),
        }
    }

    pub fn invalid_response(service: impl Into<String>, details: impl Into<String>) -> Self {
        Self::InvalidResponse {
            service: service.into(),
            details: details.into(),
        }
    }

    /// Whether a retry of the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::RateLimited { .. })
    }
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("no indexable content: the chunk list is empty")]
    NoIndexableContent,

    #[error("embedding dimension {actual} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding service error: {0}")]
    Service(#[from] ServiceError),
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("session not initialized: process documents before asking questions")]
    NotInitialized,

    #[error("session already has an index bound")]
    AlreadyInitialized,

    #[error("question is empty")]
    EmptyQuestion,

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] IndexError),

    #[error("completion failed: {0}")]
    Completion(#[from] ServiceError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("ingestion failed: {0}")]
    Ingest(#[from] IngestError),

    #[error("index build failed: {0}")]
    Index(#[from] IndexError),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::ServiceError;

    #[test]
    fn only_unavailable_and_rate_limited_are_transient() {
        let rate_limited = ServiceError::RateLimited {
            service: "embeddings".to_string(),
            details: "429".to_string(),
        };
        let filtered = ServiceError::ContentFiltered {
            service: "chat".to_string(),
            details: "policy".to_string(),
        };

        assert!(ServiceError::unavailable("chat", "503").is_transient());
        assert!(rate_limited.is_transient());
        assert!(!filtered.is_transient());
        assert!(!ServiceError::invalid_response("chat", "bad json").is_transient());
    }
}

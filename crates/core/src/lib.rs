pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod index;
pub mod ingest;
pub mod models;
pub mod prompt;
pub mod retriever;
pub mod retry;
pub mod services;
pub mod session;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use chunking::{split_page, split_text, ChunkingConfig, TextSpan};
pub use config::RagConfig;
pub use embeddings::{cosine_similarity, CharacterNgramEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{ChatError, ConfigError, IndexError, IngestError, ServiceError, SessionError};
pub use extractor::{LopdfExtractor, PageText, PdfExtractor};
pub use index::{IndexEntry, VectorIndex};
pub use ingest::{
    discover_pdf_files, ingest_documents, load_source_documents, IngestionReport, SkippedDocument,
};
pub use models::{Answer, Chunk, Citation, ConversationTurn, SearchHit, SourceDocument};
pub use prompt::PromptBuilder;
pub use retriever::{ChatHistory, ConversationalRetriever};
pub use retry::{RetryPolicy, RetryingEmbedder, RetryingModel};
pub use services::{OpenAiChatModel, OpenAiEmbedder, OpenAiSettings};
pub use session::{RagPipeline, Session, SessionBuild};
pub use traits::{EmbeddingService, LanguageModel};

use crate::chunking::ChunkingConfig;
use crate::config::RagConfig;
use crate::error::{ChatError, ConfigError, SessionError};
use crate::extractor::PdfExtractor;
use crate::index::VectorIndex;
use crate::ingest::{ingest_documents, SkippedDocument};
use crate::models::{Answer, ConversationTurn, SourceDocument};
use crate::prompt::PromptBuilder;
use crate::retriever::ConversationalRetriever;
use crate::retry::{RetryingEmbedder, RetryingModel};
use crate::traits::{EmbeddingService, LanguageModel};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    retriever: ConversationalRetriever,
}

impl Session {
    /// An empty session. Questions fail with `NotInitialized` until an index is bound.
    pub fn new(retriever: ConversationalRetriever) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            retriever,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_ready(&self) -> bool {
        self.retriever.is_ready()
    }

    pub fn bind_index(&mut self, index: VectorIndex) -> Result<(), ChatError> {
        self.retriever.bind(index)
    }

    pub fn indexed_chunks(&self) -> usize {
        self.retriever.index().map_or(0, VectorIndex::len)
    }

    pub fn history(&self) -> &[ConversationTurn] {
        self.retriever
            .history()
            .map(|history| history.turns())
            .unwrap_or_default()
    }

    pub async fn answer(&mut self, question: &str) -> Result<Answer, ChatError> {
        self.retriever.answer(question).await
    }
}

/// Outcome of processing a batch. `session` is `None` when no document
/// yielded any text; that is "nothing to index", not an error.
pub struct SessionBuild {
    pub session: Option<Session>,
    pub failed_documents: BTreeSet<String>,
    pub skipped: Vec<SkippedDocument>,
}

/// Wires the extractor, embedding service and language model together.
pub struct RagPipeline {
    config: RagConfig,
    chunking: ChunkingConfig,
    prompt: PromptBuilder,
    extractor: Arc<dyn PdfExtractor>,
    embedder: Arc<dyn EmbeddingService>,
    model: Arc<dyn LanguageModel>,
}

impl RagPipeline {
    /// Validates the configuration; an invalid one never reaches a batch.
    /// Embedding and completion calls are retried per `config.retry`.
    pub fn new(
        config: RagConfig,
        extractor: Arc<dyn PdfExtractor>,
        embedder: Arc<dyn EmbeddingService>,
        model: Arc<dyn LanguageModel>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let chunking = config.chunking()?;
        if model.model_name() != config.model_name {
            warn!(
                configured = %config.model_name,
                actual = model.model_name(),
                "language model differs from the configured model name"
            );
        }

        Ok(Self {
            embedder: Arc::new(RetryingEmbedder::new(embedder, config.retry)),
            model: Arc::new(RetryingModel::new(model, config.retry)),
            config,
            chunking,
            prompt: PromptBuilder::default(),
            extractor,
        })
    }

    pub fn with_prompt(mut self, prompt: PromptBuilder) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn empty_session(&self) -> Session {
        Session::new(
            ConversationalRetriever::new(self.model.clone(), self.config.top_k)
                .with_prompt(self.prompt.clone()),
        )
    }

    #[instrument(skip_all, fields(documents = documents.len()))]
    pub async fn build_session(
        &self,
        documents: &[SourceDocument],
    ) -> Result<SessionBuild, SessionError> {
        let report = ingest_documents(documents, self.extractor.as_ref(), &self.chunking)?;

        if !report.has_content() {
            warn!(
                failed = report.failed_documents.len(),
                "no document yielded text, nothing to index"
            );
            return Ok(SessionBuild {
                session: None,
                failed_documents: report.failed_documents,
                skipped: report.skipped,
            });
        }

        let index = VectorIndex::build(
            report.chunks,
            self.embedder.clone(),
            self.config.embedding_batch_size,
        )
        .await?;

        let session = Session::new(
            ConversationalRetriever::ready(self.model.clone(), self.config.top_k, index)
                .with_prompt(self.prompt.clone()),
        );

        info!(
            session = %session.id(),
            model = %self.config.model_name,
            embedding_model = %self.config.embedding_model,
            chunks = session.indexed_chunks(),
            failed = report.failed_documents.len(),
            "session ready"
        );

        Ok(SessionBuild {
            session: Some(session),
            failed_documents: report.failed_documents,
            skipped: report.skipped,
        })
    }
}

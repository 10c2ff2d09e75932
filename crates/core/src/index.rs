use crate::embeddings::cosine_similarity;
use crate::error::{IndexError, ServiceError};
use crate::models::{Chunk, SearchHit};
use crate::traits::EmbeddingService;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    dimensions: usize,
    embedder: Arc<dyn EmbeddingService>,
}

impl fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorIndex")
            .field("entries", &self.entries.len())
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl VectorIndex {
    #[instrument(skip_all, fields(chunks = chunks.len(), batch_size = batch_size))]
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: Arc<dyn EmbeddingService>,
        batch_size: usize,
    ) -> Result<Self, IndexError> {
        if chunks.is_empty() {
            return Err(IndexError::NoIndexableContent);
        }

        let dimensions = embedder.dimensions();
        let mut entries = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let vectors = embedder.embed(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(ServiceError::invalid_response(
                    "embeddings",
                    format!(
                        "embedding count {} doesn't match chunk count {}",
                        vectors.len(),
                        batch.len()
                    ),
                )
                .into());
            }

            for (chunk, vector) in batch.iter().zip(vectors) {
                check_dimensions(dimensions, &vector)?;
                entries.push(IndexEntry {
                    chunk: chunk.clone(),
                    vector,
                });
            }
        }

        info!(entries = entries.len(), dimensions, "vector index built");
        Ok(Self {
            entries,
            dimensions,
            embedder,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    // Ties keep ingestion order; k beyond len returns every entry.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<Chunk>, IndexError> {
        Ok(self
            .search_with_scores(query, k)
            .await?
            .into_iter()
            .map(|hit| hit.chunk)
            .collect())
    }

    pub async fn search_with_scores(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>, IndexError> {
        let mut vectors = self.embedder.embed(&[query.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(ServiceError::invalid_response(
                "embeddings",
                format!("expected one query vector, got {}", vectors.len()),
            )
            .into());
        }
        let query_vector = vectors.remove(0);
        self.search_vector(&query_vector, k)
    }

    pub fn search_vector(&self, query_vector: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        check_dimensions(self.dimensions, query_vector)?;

        let mut scored: Vec<(f32, &IndexEntry)> = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(query_vector, &entry.vector), entry))
            .collect();

        scored.sort_by(|(left_score, left), (right_score, right)| {
            match right_score.total_cmp(left_score) {
                Ordering::Equal => left.chunk.ordinal.cmp(&right.chunk.ordinal),
                other => other,
            }
        });

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, entry)| SearchHit {
                chunk: entry.chunk.clone(),
                score,
            })
            .collect())
    }
}

fn check_dimensions(expected: usize, vector: &[f32]) -> Result<(), IndexError> {
    if vector.len() != expected {
        return Err(IndexError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

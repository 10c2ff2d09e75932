use crate::error::IngestError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// An uploaded file awaiting ingestion. Names must be unique within a batch.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads a file from disk, naming the document after its file name.
    pub fn from_path(path: &Path) -> Result<Self, IngestError> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                IngestError::InvalidArgument(format!("path has no file name: {}", path.display()))
            })?;
        Self::from_path_named(path, name)
    }

    pub fn from_path_named(path: &Path, name: impl Into<String>) -> Result<Self, IngestError> {
        let bytes = std::fs::read(path)?;
        Ok(Self::new(name, bytes))
    }
}

/// A span of page text tagged with the document and page it came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_id: String,
    pub source: String,
    pub page: u32,
    /// Position in ingestion order across the whole batch.
    pub ordinal: u64,
    /// Character offset of the first character within the page text.
    pub start: usize,
    pub text: String,
}

impl Chunk {
    pub fn citation(&self) -> Citation {
        Citation {
            source: self.source.clone(),
            page: self.page,
        }
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Citation {
    pub source: String,
    pub page: u32,
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (page {})", self.source, self.page)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<Chunk>,
}

impl Answer {
    /// Distinct (document, page) pairs in retrieval order.
    pub fn citations(&self) -> Vec<Citation> {
        let mut citations: Vec<Citation> = Vec::new();
        for chunk in &self.sources {
            let citation = chunk.citation();
            if !citations.contains(&citation) {
                citations.push(citation);
            }
        }
        citations
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
    pub sources: Vec<Chunk>,
    pub asked_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(source: &str, page: u32, ordinal: u64) -> Chunk {
        Chunk {
            chunk_id: format!("{source}-{page}-{ordinal}"),
            source: source.to_string(),
            page,
            ordinal,
            start: 0,
            text: "text".to_string(),
        }
    }

    #[test]
    fn citations_are_deduplicated_in_retrieval_order() {
        let answer = Answer {
            text: "42".to_string(),
            sources: vec![chunk("b.pdf", 3, 7), chunk("a.pdf", 1, 0), chunk("b.pdf", 3, 8)],
        };

        let citations = answer.citations();
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].to_string(), "b.pdf (page 3)");
        assert_eq!(citations[1].to_string(), "a.pdf (page 1)");
    }

    #[test]
    fn source_document_from_path_uses_file_name() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("manual.pdf");
        std::fs::write(&path, b"%PDF-1.4")?;

        let document = SourceDocument::from_path(&path)?;
        assert_eq!(document.name, "manual.pdf");
        assert_eq!(document.bytes, b"%PDF-1.4");
        Ok(())
    }
}

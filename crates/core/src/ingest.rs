use crate::chunking::{split_page, ChunkingConfig};
use crate::error::IngestError;
use crate::extractor::PdfExtractor;
use crate::models::{Chunk, SourceDocument};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Folder entries are named by their path relative to the folder.
pub fn load_source_documents(paths: &[PathBuf]) -> Result<Vec<SourceDocument>, IngestError> {
    let mut documents = Vec::new();

    for path in paths {
        if path.is_dir() {
            let files = discover_pdf_files(path);
            if files.is_empty() {
                return Err(IngestError::InvalidArgument(format!(
                    "no pdf files found in {}",
                    path.display()
                )));
            }
            for file in files {
                let name = file
                    .strip_prefix(path)
                    .unwrap_or(&file)
                    .components()
                    .map(|part| part.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                documents.push(SourceDocument::from_path_named(&file, name)?);
            }
        } else {
            documents.push(SourceDocument::from_path(path)?);
        }
    }

    Ok(documents)
}

#[derive(Debug)]
pub struct SkippedDocument {
    pub name: String,
    pub error: IngestError,
}

#[derive(Debug, Default)]
pub struct IngestionReport {
    pub chunks: Vec<Chunk>,
    pub failed_documents: BTreeSet<String>,
    pub skipped: Vec<SkippedDocument>,
}

impl IngestionReport {
    pub fn has_content(&self) -> bool {
        !self.chunks.is_empty()
    }

    fn skip(&mut self, name: &str, error: IngestError) {
        warn!(document = name, %error, "skipping document");
        self.failed_documents.insert(name.to_string());
        self.skipped.push(SkippedDocument {
            name: name.to_string(),
            error,
        });
    }
}

// Per-document failures land in the report. Only a repeated name fails the batch.
pub fn ingest_documents(
    documents: &[SourceDocument],
    extractor: &dyn PdfExtractor,
    config: &ChunkingConfig,
) -> Result<IngestionReport, IngestError> {
    let mut seen = HashSet::new();
    for document in documents {
        if !seen.insert(document.name.as_str()) {
            return Err(IngestError::DuplicateDocument(document.name.clone()));
        }
    }

    let mut report = IngestionReport::default();
    let mut cursor = 0u64;

    for document in documents {
        let pages = match extractor.extract_pages(&document.name, &document.bytes) {
            Ok(pages) => pages,
            Err(error) => {
                report.skip(&document.name, error);
                continue;
            }
        };

        let mut has_text = false;
        for page in pages.iter().filter(|page| page.has_text()) {
            has_text = true;
            let (page_chunks, next_cursor) =
                split_page(&page.text, &document.name, page.number, config, cursor);
            debug!(
                document = %document.name,
                page = page.number,
                chunks = page_chunks.len(),
                "page chunked"
            );
            cursor = next_cursor;
            report.chunks.extend(page_chunks);
        }

        if !has_text {
            report.skip(
                &document.name,
                IngestError::EmptyExtraction {
                    document: document.name.clone(),
                },
            );
        }
    }

    info!(
        documents = documents.len(),
        failed = report.failed_documents.len(),
        chunks = report.chunks.len(),
        "ingestion finished"
    );

    Ok(report)
}

//! Plain-text ingestion: cleaning and word-bounded chunking
//!
//! Documents are split into line paragraphs, short lines are dropped, and
//! paragraphs longer than `max_words` are cut into consecutive word windows.

use crate::config::IngestionConfig;
use crate::corpus::SourceCatalog;
use crate::error::{Result, RerankError};
use crate::storage::{ChunkDatabase, NewChunk};
use regex::Regex;
use std::path::Path;
use tracing::{info, warn};

/// Splits cleaned document text into bounded chunks
pub struct TextChunker {
    max_words: usize,
    min_paragraph_chars: usize,
    whitespace: Regex,
}

/// Outcome of an ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub files_processed: usize,
    pub files_skipped: usize,
    pub chunks_written: usize,
}

impl TextChunker {
    pub fn new(config: &IngestionConfig) -> Result<Self> {
        let whitespace =
            Regex::new(r"\s+").map_err(|e| RerankError::Config(format!("Bad regex: {}", e)))?;
        Ok(Self {
            max_words: config.max_words.max(1),
            min_paragraph_chars: config.min_paragraph_chars,
            whitespace,
        })
    }

    /// Collapse whitespace runs to single spaces and trim
    pub fn clean_text(&self, text: &str) -> String {
        self.whitespace.replace_all(text, " ").trim().to_string()
    }

    /// Split a document into chunk texts in reading order
    pub fn chunk_document(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();

        for line in text.lines() {
            if line.trim().chars().count() <= self.min_paragraph_chars {
                continue;
            }

            let paragraph = self.clean_text(line);
            let words: Vec<&str> = paragraph.split_whitespace().collect();
            if words.len() > self.max_words {
                chunks.extend(words.chunks(self.max_words).map(|w| w.join(" ")));
            } else {
                chunks.push(paragraph);
            }
        }

        chunks
    }
}

/// Ingest every catalog source found under `input_dir` into a fresh chunk table
///
/// Missing or unreadable files are skipped with a warning. Chunk ordinals
/// restart at zero for every file. The table is replaced in a single
/// transaction, so a failed run leaves the previous chunks in place.
pub fn ingest_sources(
    input_dir: &Path,
    catalog: &SourceCatalog,
    chunker: &TextChunker,
    database: &ChunkDatabase,
) -> Result<IngestReport> {
    let mut report = IngestReport::default();
    let mut pending: Vec<NewChunk> = Vec::new();

    for source in catalog.iter() {
        let path = input_dir.join(&source.file);
        info!("Processing: {}", source.file);

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Skipping {} ({}): {}", source.file, path.display(), e);
                report.files_skipped += 1;
                continue;
            }
        };

        let before = pending.len();
        pending.extend(
            chunker
                .chunk_document(&content)
                .into_iter()
                .enumerate()
                .map(|(ordinal, text)| NewChunk {
                    source_id: source.id,
                    file: source.file.clone(),
                    ordinal,
                    text,
                }),
        );
        info!("Chunked {} into {} chunks", source.file, pending.len() - before);

        report.files_processed += 1;
    }

    report.chunks_written = database.replace_chunks(&pending)?;
    info!("Saved {} chunks", report.chunks_written);

    Ok(report)
}

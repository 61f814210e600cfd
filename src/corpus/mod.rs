//! Chunk records, the ordered corpus, and the source catalog
//!
//! A corpus row index is the position of a chunk in [`Corpus`]; it is the
//! only key used to correlate vector hits, lexical statistics and metadata.
//! Chunk ids are provenance and never used for lookups.

pub mod ingest;

use crate::error::{Result, RerankError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A bounded-length passage, the atomic unit of retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable id assigned at ingestion, never reused
    pub id: i64,
    /// Originating document
    pub source_id: i64,
    /// Originating filename
    pub file: String,
    /// Zero-based position within the file's chunk sequence
    pub ordinal: usize,
    /// Cleaned, whitespace-collapsed passage text
    pub text: String,
}

/// Ordered chunk sequence; position is the row index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Corpus {
    chunks: Vec<Chunk>,
}

impl Corpus {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        Self { chunks }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunk at a row index
    pub fn get(&self, row: usize) -> Option<&Chunk> {
        self.chunks.get(row)
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.chunks.iter().map(|c| c.text.as_str())
    }
}

impl FromIterator<Chunk> for Corpus {
    fn from_iter<I: IntoIterator<Item = Chunk>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Descriptive metadata for an originating document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    pub file: String,
}

/// Title and URL attached to results for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub title: String,
    pub url: String,
}

/// Read-only `source_id -> Source` lookup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceCatalog {
    sources: BTreeMap<i64, Source>,
}

impl SourceCatalog {
    pub fn new(sources: impl IntoIterator<Item = Source>) -> Self {
        Self {
            sources: sources.into_iter().map(|s| (s.id, s)).collect(),
        }
    }

    /// Load a `sources.json` list of `{id, title, url, file}` records
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RerankError::Io {
            source: e,
            context: format!("Failed to read source catalog: {}", path.display()),
        })?;
        let sources: Vec<Source> = serde_json::from_str(&content).map_err(|e| RerankError::Json {
            source: e,
            context: format!("Failed to parse source catalog: {}", path.display()),
        })?;
        Ok(Self::new(sources))
    }

    pub fn get(&self, source_id: i64) -> Option<&Source> {
        self.sources.get(&source_id)
    }

    pub fn info(&self, source_id: i64) -> Option<SourceInfo> {
        self.get(source_id).map(|s| SourceInfo {
            title: s.title.clone(),
            url: s.url.clone(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.sources.values()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn chunk(id: i64, text: &str) -> Chunk {
        Chunk {
            id,
            source_id: 1,
            file: "manual.txt".to_string(),
            ordinal: (id - 1) as usize,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_row_index_is_position_not_id() {
        // Ids start at 1 like the chunk database; row 0 is the first chunk
        let corpus: Corpus = vec![chunk(1, "first"), chunk(2, "second")]
            .into_iter()
            .collect();

        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.get(0).unwrap().id, 1);
        assert_eq!(corpus.get(1).unwrap().text, "second");
        assert!(corpus.get(2).is_none());
    }

    #[test]
    fn test_source_catalog_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sources.json");
        std::fs::write(
            &path,
            r#"[
                {"id": 1, "title": "Robot Safety", "url": "https://example.org/iso-10218", "file": "iso.txt"},
                {"id": 7, "file": "notes.txt"}
            ]"#,
        )
        .unwrap();

        let catalog = SourceCatalog::load(&path).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.info(1).unwrap().title, "Robot Safety");
        assert_eq!(catalog.get(7).unwrap().title, "");
        assert!(catalog.info(3).is_none());
    }

    #[test]
    fn test_source_catalog_bad_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("sources.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            SourceCatalog::load(&path),
            Err(RerankError::Json { .. })
        ));
    }
}

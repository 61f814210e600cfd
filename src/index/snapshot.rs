//! The aligned corpus / vector / lexical triple of one index generation

use crate::corpus::{Corpus, SourceCatalog};
use crate::error::{Result, RerankError};
use crate::index::{Bm25Index, EmbeddingMatrix, LexicalIndex};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of an index generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationInfo {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub model: String,
    pub dimension: usize,
}

impl GenerationInfo {
    pub fn new(model: impl Into<String>, dimension: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            model: model.into(),
            dimension,
        }
    }
}

/// Everything one generation needs to answer queries
///
/// Row `i` of `embeddings` and document `i` of `lexical` both describe
/// `corpus[i]`; the three are only ever built, saved and loaded together.
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    pub generation: GenerationInfo,
    pub corpus: Corpus,
    pub sources: SourceCatalog,
    pub embeddings: EmbeddingMatrix,
    pub lexical: Bm25Index,
}

impl IndexSnapshot {
    /// Assemble a snapshot, rejecting misaligned parts
    pub fn new(
        generation: GenerationInfo,
        corpus: Corpus,
        sources: SourceCatalog,
        embeddings: EmbeddingMatrix,
        lexical: Bm25Index,
    ) -> Result<Self> {
        let snapshot = Self {
            generation,
            corpus,
            sources,
            embeddings,
            lexical,
        };
        snapshot.check_alignment()?;
        Ok(snapshot)
    }

    pub fn len(&self) -> usize {
        self.corpus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corpus.is_empty()
    }

    /// Verify the three structures agree in length and dimension
    pub fn check_alignment(&self) -> Result<()> {
        let rows = self.corpus.len();

        if self.embeddings.rows() != rows {
            return Err(RerankError::inconsistent(
                "vectors",
                format!(
                    "{} embedding rows for {} corpus rows",
                    self.embeddings.rows(),
                    rows
                ),
            ));
        }

        if self.lexical.len() != rows || !self.lexical.is_consistent() {
            return Err(RerankError::inconsistent(
                "lexical",
                format!(
                    "{} lexical documents for {} corpus rows",
                    self.lexical.len(),
                    rows
                ),
            ));
        }

        if self.embeddings.dimension() != self.generation.dimension {
            return Err(RerankError::inconsistent(
                "vectors",
                format!(
                    "embedding dimension {} does not match generation dimension {}",
                    self.embeddings.dimension(),
                    self.generation.dimension
                ),
            ));
        }

        Ok(())
    }
}

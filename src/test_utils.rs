//! Deterministic stand-ins for the embedding model

use crate::corpus::{Chunk, Corpus};
use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::index::tokenize;
use std::collections::BTreeMap;

/// Bag-of-words embedder: one dimension per known token, counts as values
///
/// Texts sharing words end up close, unrelated texts orthogonal. Unknown
/// tokens are ignored.
pub struct VocabularyEmbedder {
    vocabulary: BTreeMap<String, usize>,
    dimension: usize,
}

impl VocabularyEmbedder {
    pub fn from_texts(texts: &[&str]) -> Self {
        let mut vocabulary = BTreeMap::new();
        for text in texts {
            for token in tokenize(text) {
                let next = vocabulary.len();
                vocabulary.entry(token).or_insert(next);
            }
        }
        let dimension = vocabulary.len().max(1);
        Self {
            vocabulary,
            dimension,
        }
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        for token in tokenize(text) {
            if let Some(&slot) = self.vocabulary.get(&token) {
                vector[slot] += 1.0;
            }
        }
        vector
    }
}

impl EmbeddingProvider for VocabularyEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }
        Ok(self.vector(text))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "vocabulary-test"
    }
}

/// Corpus with ids from 1 and one file per chunk
pub fn corpus_from_texts(texts: &[&str]) -> Corpus {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| Chunk {
            id: i as i64 + 1,
            source_id: 1,
            file: format!("file-{}.txt", i),
            ordinal: i,
            text: text.to_string(),
        })
        .collect()
}

//! BM25 term statistics and subset scoring
//!
//! Scores follow the Okapi BM25 variant: for each query term
//! `idf(t) * tf * (k1 + 1) / (tf + k1 * (1 - b + b * doclen / avgdl))`,
//! with `idf(t) = ln(N - n_t + 0.5) - ln(n_t + 0.5)`. Terms whose idf comes
//! out negative (present in more than half the documents) are floored to
//! `epsilon * mean_idf`. Only the caller's candidate rows are scored.

use crate::config::LexicalConfig;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lower-case, then split on whitespace
///
/// The same rule tokenizes documents at build time and queries at search time.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Keyword relevance scoring over an arbitrary subset of corpus rows
pub trait LexicalIndex: Send + Sync {
    /// One score per entry of `rows`, in the same order
    fn score(&self, query_terms: &[String], rows: &[usize]) -> Vec<f32>;

    /// Number of indexed documents
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// BM25 constants
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
    pub epsilon: f64,
}

impl From<&LexicalConfig> for Bm25Params {
    fn from(config: &LexicalConfig) -> Self {
        Self {
            k1: f64::from(config.k1),
            b: f64::from(config.b),
            epsilon: f64::from(config.epsilon),
        }
    }
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self::from(&LexicalConfig::default())
    }
}

/// Per-document term counts plus corpus-wide idf weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bm25Index {
    params: Bm25Params,
    term_freqs: Vec<AHashMap<String, u32>>,
    doc_lengths: Vec<u32>,
    avg_doc_len: f64,
    idf: AHashMap<String, f64>,
}

impl Bm25Index {
    /// Build statistics from document texts in row order
    pub fn build<'a>(documents: impl IntoIterator<Item = &'a str>, params: Bm25Params) -> Self {
        let mut term_freqs = Vec::new();
        let mut doc_lengths = Vec::new();
        // Sorted so idf summation order (and thus rounding) is reproducible
        let mut doc_freqs: BTreeMap<String, u32> = BTreeMap::new();
        let mut total_len: u64 = 0;

        for text in documents {
            let tokens = tokenize(text);
            total_len += tokens.len() as u64;
            doc_lengths.push(tokens.len() as u32);

            let mut freqs: AHashMap<String, u32> = AHashMap::new();
            for token in tokens {
                *freqs.entry(token).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }
            term_freqs.push(freqs);
        }

        let corpus_size = doc_lengths.len();
        let avg_doc_len = if corpus_size == 0 {
            0.0
        } else {
            total_len as f64 / corpus_size as f64
        };

        let idf = compute_idf(&doc_freqs, corpus_size, params.epsilon);

        Self {
            params,
            term_freqs,
            doc_lengths,
            avg_doc_len,
            idf,
        }
    }

    pub fn params(&self) -> Bm25Params {
        self.params
    }

    /// Inverse document frequency of a term, if it is in the vocabulary
    pub fn idf(&self, term: &str) -> Option<f64> {
        self.idf.get(term).copied()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.idf.len()
    }

    /// Check internal consistency after deserialization
    pub fn is_consistent(&self) -> bool {
        self.term_freqs.len() == self.doc_lengths.len()
    }

    fn score_row(&self, query_terms: &[String], row: usize) -> f64 {
        let (Some(freqs), Some(&doc_len)) = (self.term_freqs.get(row), self.doc_lengths.get(row))
        else {
            return 0.0;
        };

        let Bm25Params { k1, b, .. } = self.params;
        let length_ratio = if self.avg_doc_len > 0.0 {
            f64::from(doc_len) / self.avg_doc_len
        } else {
            0.0
        };
        let norm = k1 * (1.0 - b + b * length_ratio);

        // Repeated query terms count once per occurrence
        query_terms
            .iter()
            .map(|term| {
                let Some(idf) = self.idf.get(term) else {
                    return 0.0;
                };
                let tf = f64::from(freqs.get(term).copied().unwrap_or(0));
                idf * (tf * (k1 + 1.0)) / (tf + norm)
            })
            .sum()
    }
}

fn compute_idf(
    doc_freqs: &BTreeMap<String, u32>,
    corpus_size: usize,
    epsilon: f64,
) -> AHashMap<String, f64> {
    let mut idf = AHashMap::with_capacity(doc_freqs.len());
    let mut idf_sum = 0.0;
    let mut negative = Vec::new();
    let n = corpus_size as f64;

    for (term, &freq) in doc_freqs {
        let freq = f64::from(freq);
        let value = (n - freq + 0.5).ln() - (freq + 0.5).ln();
        idf_sum += value;
        if value < 0.0 {
            negative.push(term.clone());
        }
        idf.insert(term.clone(), value);
    }

    if !doc_freqs.is_empty() {
        let floor = epsilon * (idf_sum / doc_freqs.len() as f64);
        for term in negative {
            idf.insert(term, floor);
        }
    }

    idf
}

impl LexicalIndex for Bm25Index {
    fn score(&self, query_terms: &[String], rows: &[usize]) -> Vec<f32> {
        rows.iter()
            .map(|&row| self.score_row(query_terms, row) as f32)
            .collect()
    }

    fn len(&self) -> usize {
        self.doc_lengths.len()
    }
}

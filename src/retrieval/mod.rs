//! Hybrid retrieval
//!
//! Vector search proposes a candidate pool, BM25 rescores it, and the two
//! normalized signals are fused into the final ranking.

mod fusion;
mod handle;
mod hybrid;

pub use fusion::{fuse_scores, min_max_normalize, rank_descending};
pub use handle::EngineHandle;
pub use hybrid::HybridQueryEngine;

use crate::corpus::SourceInfo;
use serde::{Deserialize, Serialize};

/// One ranked passage with every signal that produced its rank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    /// Fused relevance in [0, 1], higher is better
    pub fused_score: f32,

    pub text: String,

    /// Originating filename
    pub file: String,

    /// Raw squared L2 distance to the query (lower is closer)
    pub vector_distance: f32,

    /// Raw BM25 score over the candidate pool
    pub lexical_score: f32,

    pub chunk_id: i64,

    /// Corpus row index
    pub row: usize,

    pub source_id: i64,

    /// Position within the originating file
    pub ordinal: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceInfo>,
}

impl RankedResult {
    /// First `max_chars` characters of the text, with an ellipsis if cut
    pub fn preview(&self, max_chars: usize) -> String {
        if self.text.chars().count() <= max_chars {
            self.text.clone()
        } else {
            let truncated: String = self.text.chars().take(max_chars).collect();
            format!("{}...", truncated)
        }
    }
}

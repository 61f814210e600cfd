//! Query-time pipeline over one loaded index generation

use crate::config::{RetrievalConfig, VectorConfig};
use crate::embedding::{l2_normalize, EmbeddingProvider};
use crate::error::{Result, RerankError};
use crate::index::{
    build_vector_index, tokenize, GenerationInfo, IndexSnapshot, LexicalIndex, VectorHit,
    VectorIndex,
};
use crate::retrieval::{fuse_scores, rank_descending, RankedResult};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Answers queries against a single immutable [`IndexSnapshot`]
///
/// Queries only read, so one engine can serve any number of concurrent
/// callers.
pub struct HybridQueryEngine {
    snapshot: IndexSnapshot,
    vector_index: Box<dyn VectorIndex>,
    provider: Arc<dyn EmbeddingProvider>,
    alpha: f32,
    candidate_pool: usize,
}

impl HybridQueryEngine {
    /// Build the configured vector backend over the snapshot's embeddings
    pub fn new(
        snapshot: IndexSnapshot,
        provider: Arc<dyn EmbeddingProvider>,
        retrieval: &RetrievalConfig,
        vector: &VectorConfig,
    ) -> Result<Self> {
        let vector_index = build_vector_index(&snapshot.embeddings, vector)?;
        Self::with_index(snapshot, vector_index, provider, retrieval)
    }

    /// Use an already built vector index
    pub fn with_index(
        snapshot: IndexSnapshot,
        vector_index: Box<dyn VectorIndex>,
        provider: Arc<dyn EmbeddingProvider>,
        retrieval: &RetrievalConfig,
    ) -> Result<Self> {
        snapshot.check_alignment()?;

        if vector_index.len() != snapshot.len() {
            return Err(RerankError::inconsistent(
                "vectors",
                format!(
                    "vector index holds {} rows for {} corpus rows",
                    vector_index.len(),
                    snapshot.len()
                ),
            ));
        }

        if provider.dimension() != vector_index.dimension() {
            return Err(RerankError::inconsistent(
                "vectors",
                format!(
                    "embedding model '{}' produces {}D vectors, index holds {}D",
                    provider.model_name(),
                    provider.dimension(),
                    vector_index.dimension()
                ),
            ));
        }

        if provider.model_name() != snapshot.generation.model {
            tracing::warn!(
                "Index was built with '{}' but queries use '{}'",
                snapshot.generation.model,
                provider.model_name()
            );
        }

        Ok(Self {
            snapshot,
            vector_index,
            provider,
            alpha: retrieval.alpha,
            candidate_pool: retrieval.candidate_pool,
        })
    }

    pub fn generation(&self) -> &GenerationInfo {
        &self.snapshot.generation
    }

    pub fn snapshot(&self) -> &IndexSnapshot {
        &self.snapshot
    }

    /// Number of indexed chunks
    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    /// Rank chunks for a free-text query
    ///
    /// Returns at most `top_k` results; fewer when the candidate pool holds
    /// fewer valid hits. An empty index yields an empty list.
    pub fn query(&self, text: &str, top_k: usize) -> Result<Vec<RankedResult>> {
        if top_k == 0 {
            return Err(RerankError::InvalidQuery(
                "top_k must be greater than 0".to_string(),
            ));
        }

        if self.snapshot.is_empty() {
            debug!("Query against empty index generation");
            return Ok(Vec::new());
        }

        let start = Instant::now();

        let mut query_vector = self.provider.embed(text)?;
        l2_normalize(&mut query_vector);

        let candidates = self.candidates(&query_vector)?;
        if candidates.is_empty() {
            debug!("No valid vector candidates for query");
            return Ok(Vec::new());
        }

        let rows: Vec<usize> = candidates.iter().map(|hit| hit.row).collect();
        let distances: Vec<f32> = candidates.iter().map(|hit| hit.distance).collect();
        let lexical = self.snapshot.lexical.score(&tokenize(text), &rows);

        let fused = fuse_scores(&distances, &lexical, self.alpha);

        let results: Vec<RankedResult> = rank_descending(&fused)
            .into_iter()
            .take(top_k)
            .filter_map(|pos| {
                let chunk = self.snapshot.corpus.get(rows[pos])?;
                Some(RankedResult {
                    fused_score: fused[pos],
                    text: chunk.text.clone(),
                    file: chunk.file.clone(),
                    vector_distance: distances[pos],
                    lexical_score: lexical[pos],
                    chunk_id: chunk.id,
                    row: rows[pos],
                    source_id: chunk.source_id,
                    ordinal: chunk.ordinal,
                    source: self.snapshot.sources.info(chunk.source_id),
                })
            })
            .collect();

        debug!(
            "Query ranked {} candidates, returning {} in {}ms",
            candidates.len(),
            results.len(),
            start.elapsed().as_millis()
        );

        Ok(results)
    }

    /// Vector candidates with sentinel and non-finite hits dropped
    fn candidates(&self, query_vector: &[f32]) -> Result<Vec<VectorHit>> {
        let corpus_len = self.snapshot.len();
        let hits = self.vector_index.search(query_vector, self.candidate_pool)?;
        let found = hits.len();

        let valid: Vec<VectorHit> = hits
            .into_iter()
            .filter(|hit| hit.row < corpus_len && hit.distance.is_finite())
            .collect();

        if valid.len() < found {
            debug!("Discarded {} invalid vector hits", found - valid.len());
        }

        Ok(valid)
    }
}

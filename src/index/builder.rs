/// Offline index construction: embeddings + BM25 statistics in corpus order
use crate::corpus::{Corpus, SourceCatalog};
use crate::embedding::{l2_normalize, EmbeddingProvider};
use crate::error::{Result, RerankError};
use crate::index::{Bm25Index, Bm25Params, EmbeddingMatrix, GenerationInfo, IndexSnapshot};
use std::time::Instant;
use tracing::{debug, info};

/// Builds a complete [`IndexSnapshot`] from a corpus
///
/// Embeddings are computed in batches; any batch failure aborts the whole
/// build so a partial generation is never produced.
pub struct IndexBuilder {
    batch_size: usize,
    bm25: Bm25Params,
}

impl IndexBuilder {
    pub fn new(batch_size: usize, bm25: Bm25Params) -> Self {
        Self {
            batch_size: batch_size.max(1),
            bm25,
        }
    }

    pub fn build(
        &self,
        corpus: Corpus,
        sources: SourceCatalog,
        provider: &dyn EmbeddingProvider,
    ) -> Result<IndexSnapshot> {
        let start = Instant::now();
        let total = corpus.len();
        let dimension = provider.dimension();

        info!(
            "Building index over {} chunks with {} ({}D)",
            total,
            provider.model_name(),
            dimension
        );

        let mut embeddings = EmbeddingMatrix::new(dimension);

        for (batch_no, batch) in corpus.chunks().chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();

            let vectors = provider.embed_batch(&texts).map_err(|e| {
                RerankError::Build(format!("Embedding batch {} failed: {}", batch_no, e))
            })?;

            if vectors.len() != batch.len() {
                return Err(RerankError::Build(format!(
                    "Embedding count mismatch in batch {}: expected {}, got {}",
                    batch_no,
                    batch.len(),
                    vectors.len()
                )));
            }

            for (chunk, mut vector) in batch.iter().zip(vectors) {
                l2_normalize(&mut vector);
                embeddings.push_row(&vector).map_err(|e| {
                    RerankError::Build(format!("Chunk {} embedding rejected: {}", chunk.id, e))
                })?;
            }

            debug!("Embedded {}/{} chunks", embeddings.rows(), total);
        }

        let lexical = Bm25Index::build(corpus.texts(), self.bm25);

        let snapshot = IndexSnapshot::new(
            GenerationInfo::new(provider.model_name(), dimension),
            corpus,
            sources,
            embeddings,
            lexical,
        )
        .map_err(|e| RerankError::Build(e.to_string()))?;

        info!(
            "Index generation {} built: {} rows, {} terms, {}ms",
            snapshot.generation.id,
            snapshot.len(),
            snapshot.lexical.vocabulary_size(),
            start.elapsed().as_millis()
        );

        Ok(snapshot)
    }
}

//! Load-then-swap holder for the serving engine

use crate::config::{RetrievalConfig, VectorConfig};
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, RerankError};
use crate::index::{GenerationInfo, IndexSnapshot};
use crate::retrieval::{HybridQueryEngine, RankedResult};
use crate::storage::ArtifactStore;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Shared entry point for queries
///
/// A new generation is fully built before it replaces the old one, so a
/// failed install leaves the previous engine serving. In-flight queries keep
/// the engine they started with.
pub struct EngineHandle {
    provider: Arc<dyn EmbeddingProvider>,
    retrieval: RetrievalConfig,
    vector: VectorConfig,
    engine: RwLock<Option<Arc<HybridQueryEngine>>>,
}

impl EngineHandle {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        retrieval: RetrievalConfig,
        vector: VectorConfig,
    ) -> Self {
        Self {
            provider,
            retrieval,
            vector,
            engine: RwLock::new(None),
        }
    }

    /// Build an engine for `snapshot` and make it the active one
    pub fn install(&self, snapshot: IndexSnapshot) -> Result<GenerationInfo> {
        let engine = HybridQueryEngine::new(
            snapshot,
            Arc::clone(&self.provider),
            &self.retrieval,
            &self.vector,
        )?;
        let generation = engine.generation().clone();
        let rows = engine.len();

        let previous = self
            .engine
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(Arc::new(engine));

        match previous {
            Some(old) => info!(
                "Swapped index generation {} -> {} ({} rows)",
                old.generation().id,
                generation.id,
                rows
            ),
            None => info!("Installed index generation {} ({} rows)", generation.id, rows),
        }

        Ok(generation)
    }

    /// Load the generation persisted in `store` and install it
    pub fn load(&self, store: &ArtifactStore) -> Result<GenerationInfo> {
        let snapshot = store.load()?;
        self.install(snapshot)
    }

    /// The active engine
    pub fn current(&self) -> Result<Arc<HybridQueryEngine>> {
        self.engine
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or(RerankError::EngineNotReady)
    }

    pub fn query(&self, text: &str, top_k: usize) -> Result<Vec<RankedResult>> {
        self.current()?.query(text, top_k)
    }

    pub fn generation(&self) -> Option<GenerationInfo> {
        self.current().ok().map(|engine| engine.generation().clone())
    }

    pub fn is_ready(&self) -> bool {
        self.current().is_ok()
    }
}

//! Integration test: build, persist, reload and query an index generation

mod common;

use common::{corpus_from_texts, VocabularyEmbedder, SAFETY_TEXTS};
use hybrid_rerank::config::{RetrievalConfig, VectorBackend, VectorConfig};
use hybrid_rerank::corpus::{Source, SourceCatalog};
use hybrid_rerank::index::{Bm25Params, IndexBuilder};
use hybrid_rerank::retrieval::EngineHandle;
use hybrid_rerank::storage::ArtifactStore;
use hybrid_rerank::RerankError;
use std::sync::Arc;
use tempfile::TempDir;

fn catalog() -> SourceCatalog {
    SourceCatalog::new(vec![Source {
        id: 1,
        title: "Plant Safety Manual".to_string(),
        url: "https://example.org/safety".to_string(),
        file: "safety.txt".to_string(),
    }])
}

fn retrieval(candidate_pool: usize) -> RetrievalConfig {
    RetrievalConfig {
        alpha: 0.6,
        candidate_pool,
        default_top_k: 2,
    }
}

#[test]
fn test_persisted_generation_answers_queries() {
    let temp = TempDir::new().unwrap();
    let store = ArtifactStore::new(temp.path().join("index"));
    let embedder = Arc::new(VocabularyEmbedder::from_texts(&SAFETY_TEXTS));

    let snapshot = IndexBuilder::new(2, Bm25Params::default())
        .build(corpus_from_texts(&SAFETY_TEXTS), catalog(), embedder.as_ref())
        .unwrap();
    let manifest = store.save(&snapshot).unwrap();
    println!("✓ Saved generation {} ({} rows)", manifest.generation.id, manifest.row_count);

    let handle = EngineHandle::new(embedder, retrieval(3), VectorConfig::default());
    handle.load(&store).unwrap();

    let results = handle.query("fire safety", 2).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].text, "fire safety procedure A");
    assert_eq!(results[1].text, "fire extinguisher maintenance");
    assert!(results[0].fused_score >= results[1].fused_score);

    let source = results[0].source.as_ref().unwrap();
    assert_eq!(source.title, "Plant Safety Manual");
    assert_eq!(results[0].file, "file-0.txt");

    for (rank, r) in results.iter().enumerate() {
        println!(
            "  {}. [{:.3}] dist={:.3} bm25={:.3} {}",
            rank + 1,
            r.fused_score,
            r.vector_distance,
            r.lexical_score,
            r.text
        );
    }
}

#[test]
fn test_hnsw_and_flat_agree_on_small_corpus() {
    let embedder = Arc::new(VocabularyEmbedder::from_texts(&SAFETY_TEXTS));
    let snapshot = IndexBuilder::new(8, Bm25Params::default())
        .build(corpus_from_texts(&SAFETY_TEXTS), catalog(), embedder.as_ref())
        .unwrap();

    let flat = EngineHandle::new(embedder.clone(), retrieval(3), VectorConfig::default());
    flat.install(snapshot.clone()).unwrap();

    let hnsw = EngineHandle::new(
        embedder,
        retrieval(3),
        VectorConfig {
            backend: VectorBackend::Hnsw,
            ..VectorConfig::default()
        },
    );
    hnsw.install(snapshot).unwrap();

    let flat_rows: Vec<usize> = flat
        .query("fire safety", 3)
        .unwrap()
        .iter()
        .map(|r| r.row)
        .collect();
    let hnsw_rows: Vec<usize> = hnsw
        .query("fire safety", 3)
        .unwrap()
        .iter()
        .map(|r| r.row)
        .collect();
    assert_eq!(flat_rows, hnsw_rows);
}

#[test]
fn test_empty_generation_roundtrip() {
    let temp = TempDir::new().unwrap();
    let store = ArtifactStore::new(temp.path().join("index"));
    let embedder = Arc::new(VocabularyEmbedder::from_texts(&SAFETY_TEXTS));

    let snapshot = IndexBuilder::new(8, Bm25Params::default())
        .build(corpus_from_texts(&[]), SourceCatalog::default(), embedder.as_ref())
        .unwrap();
    store.save(&snapshot).unwrap();

    let handle = EngineHandle::new(embedder, RetrievalConfig::default(), VectorConfig::default());
    handle.load(&store).unwrap();

    assert!(handle.is_ready());
    assert!(handle.query("fire safety", 5).unwrap().is_empty());
}

#[test]
fn test_tampered_generation_is_not_served() {
    let temp = TempDir::new().unwrap();
    let store = ArtifactStore::new(temp.path().join("index"));
    let embedder = Arc::new(VocabularyEmbedder::from_texts(&SAFETY_TEXTS));

    let snapshot = IndexBuilder::new(8, Bm25Params::default())
        .build(corpus_from_texts(&SAFETY_TEXTS), catalog(), embedder.as_ref())
        .unwrap();
    store.save(&snapshot).unwrap();
    std::fs::write(store.root().join("vectors.zst"), b"not an artifact").unwrap();

    let handle = EngineHandle::new(embedder, RetrievalConfig::default(), VectorConfig::default());
    assert!(matches!(
        handle.load(&store),
        Err(RerankError::InconsistentIndexGeneration { .. })
    ));
    assert!(matches!(
        handle.query("fire", 2),
        Err(RerankError::EngineNotReady)
    ));
}

#[test]
fn test_rebuild_swaps_generation() {
    let temp = TempDir::new().unwrap();
    let store = ArtifactStore::new(temp.path().join("index"));
    let embedder = Arc::new(VocabularyEmbedder::from_texts(&SAFETY_TEXTS));
    let builder = IndexBuilder::new(8, Bm25Params::default());

    let first = builder
        .build(corpus_from_texts(&SAFETY_TEXTS[..2]), catalog(), embedder.as_ref())
        .unwrap();
    store.save(&first).unwrap();

    let handle = EngineHandle::new(embedder.clone(), retrieval(3), VectorConfig::default());
    handle.load(&store).unwrap();
    assert_eq!(handle.query("fire", 5).unwrap().len(), 2);

    let second = builder
        .build(corpus_from_texts(&SAFETY_TEXTS), catalog(), embedder.as_ref())
        .unwrap();
    store.save(&second).unwrap();
    let generation = handle.load(&store).unwrap();

    assert_eq!(generation.id, second.generation.id);
    assert_eq!(handle.query("fire", 5).unwrap().len(), 3);
}

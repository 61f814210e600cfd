//! Shared fixtures for integration tests

#![allow(dead_code)]

pub use hybrid_rerank::test_utils::{corpus_from_texts, VocabularyEmbedder};

pub const SAFETY_TEXTS: [&str; 3] = [
    "fire safety procedure A",
    "electrical hazard checklist",
    "fire extinguisher maintenance",
];

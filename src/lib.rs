//! hybrid-rerank - Hybrid passage retrieval
//!
//! Ingests plain-text documents into bounded passages, builds an aligned
//! vector + BM25 index over them, and answers free-text queries by reranking
//! the nearest vector candidates with a weighted fusion of semantic and
//! lexical relevance.

pub mod cli;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod index;
pub mod retrieval;
pub mod server;
pub mod storage;

/// Deterministic fixtures shared by unit and integration tests
#[doc(hidden)]
pub mod test_utils;

pub use error::{Result, RerankError};

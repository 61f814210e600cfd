//! Storage layer
//!
//! The chunk database holds ingested passages; the artifact store holds
//! built index generations.

pub mod artifacts;
pub mod database;

pub use artifacts::{ArtifactEntry, ArtifactKind, ArtifactStore, Manifest, FORMAT_VERSION};
pub use database::{ChunkDatabase, DbPool, NewChunk};

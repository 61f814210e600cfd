//! Vector and lexical indexes, built together as one generation
//!
//! - [`VectorIndex`]: k-NN by squared L2 (exact [`FlatVectorIndex`] or HNSW)
//! - [`LexicalIndex`]: BM25 scoring over a caller-supplied row subset
//! - [`IndexBuilder`]: produces the aligned [`IndexSnapshot`]

mod builder;
mod lexical;
mod snapshot;
mod vector;

pub use builder::IndexBuilder;
pub use lexical::{tokenize, Bm25Index, Bm25Params, LexicalIndex};
pub use snapshot::{GenerationInfo, IndexSnapshot};
pub use vector::{
    build_vector_index, EmbeddingMatrix, FlatVectorIndex, HnswVectorIndex, VectorHit,
    VectorIndex, VectorIndexError,
};

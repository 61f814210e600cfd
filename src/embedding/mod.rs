//! Embedding generation
//!
//! The embedding model is an external collaborator behind
//! [`EmbeddingProvider`]; [`FastEmbedProvider`] runs all-MiniLM-L6-v2 locally.

mod provider;

pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};

/// Scale a vector to unit L2 length in place
///
/// Squared L2 distance between unit vectors is `2 - 2 * cosine`, so the
/// vector index ranks exactly like cosine similarity. Zero vectors are left
/// untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_untouched() {
        let mut v = vec![0.0; 4];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0; 4]);
    }
}

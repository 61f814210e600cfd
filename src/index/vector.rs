/// Nearest-neighbor indexes over chunk embeddings
use crate::config::{VectorBackend, VectorConfig};
use hnsw_rs::prelude::*;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Invalid embedding matrix: {0}")]
    InvalidMatrix(String),
}

/// One neighbor: corpus row and squared L2 distance (lower is closer)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorHit {
    pub row: usize,
    pub distance: f32,
}

/// k-nearest-neighbor search by squared Euclidean distance
///
/// Results are ascending by distance, at most `k` long, and contain every row
/// when the index holds fewer than `k`. Approximate backends may return fewer.
pub trait VectorIndex: Send + Sync {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<VectorHit>, VectorIndexError>;

    /// Number of indexed rows
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dimension(&self) -> usize;
}

/// Row-major embedding matrix; row `i` belongs to corpus row `i`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMatrix {
    dimension: usize,
    data: Vec<f32>,
}

impl EmbeddingMatrix {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    pub fn from_rows(dimension: usize, rows: &[Vec<f32>]) -> Result<Self, VectorIndexError> {
        let mut matrix = Self::new(dimension);
        for row in rows {
            matrix.push_row(row)?;
        }
        Ok(matrix)
    }

    pub fn push_row(&mut self, row: &[f32]) -> Result<(), VectorIndexError> {
        if row.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: row.len(),
            });
        }
        self.data.extend_from_slice(row);
        Ok(())
    }

    pub fn rows(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn row(&self, row: usize) -> Option<&[f32]> {
        let start = row.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Check the shape after deserialization
    pub fn validate(&self) -> Result<(), VectorIndexError> {
        if self.dimension == 0 {
            return Err(VectorIndexError::InvalidMatrix(
                "dimension must be greater than 0".to_string(),
            ));
        }
        if self.data.len() % self.dimension != 0 {
            return Err(VectorIndexError::InvalidMatrix(format!(
                "{} values is not a multiple of dimension {}",
                self.data.len(),
                self.dimension
            )));
        }
        Ok(())
    }

    fn to_array(&self) -> Result<Array2<f32>, VectorIndexError> {
        self.validate()?;
        Array2::from_shape_vec((self.rows(), self.dimension), self.data.clone())
            .map_err(|e| VectorIndexError::InvalidMatrix(e.to_string()))
    }
}

/// Build the configured backend over an embedding matrix
pub fn build_vector_index(
    matrix: &EmbeddingMatrix,
    config: &VectorConfig,
) -> Result<Box<dyn VectorIndex>, VectorIndexError> {
    match config.backend {
        VectorBackend::Flat => Ok(Box::new(FlatVectorIndex::new(matrix)?)),
        VectorBackend::Hnsw => Ok(Box::new(HnswVectorIndex::new(matrix, config)?)),
    }
}

fn check_query(query: &[f32], dimension: usize) -> Result<(), VectorIndexError> {
    if query.len() != dimension {
        return Err(VectorIndexError::InvalidDimension {
            expected: dimension,
            actual: query.len(),
        });
    }
    Ok(())
}

/// Exact brute-force index
pub struct FlatVectorIndex {
    matrix: Array2<f32>,
}

impl FlatVectorIndex {
    pub fn new(matrix: &EmbeddingMatrix) -> Result<Self, VectorIndexError> {
        Ok(Self {
            matrix: matrix.to_array()?,
        })
    }
}

impl VectorIndex for FlatVectorIndex {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<VectorHit>, VectorIndexError> {
        check_query(query, self.dimension())?;

        let mut hits: Vec<VectorHit> = self
            .matrix
            .outer_iter()
            .enumerate()
            .map(|(row, vector)| VectorHit {
                row,
                distance: vector
                    .iter()
                    .zip(query.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum(),
            })
            .collect();

        // Equal distances keep row order so results are reproducible
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.row.cmp(&b.row)));
        hits.truncate(k);

        Ok(hits)
    }

    fn len(&self) -> usize {
        self.matrix.nrows()
    }

    fn dimension(&self) -> usize {
        self.matrix.ncols()
    }
}

/// HNSW approximate index
///
/// The graph is rebuilt from the embedding matrix; only the matrix is persisted.
pub struct HnswVectorIndex {
    index: Option<Hnsw<'static, f32, DistL2>>,
    dimension: usize,
    count: usize,
    ef_search: usize,
}

impl HnswVectorIndex {
    pub fn new(matrix: &EmbeddingMatrix, config: &VectorConfig) -> Result<Self, VectorIndexError> {
        matrix.validate()?;
        let count = matrix.rows();

        // hnsw_rs cannot represent an empty graph usefully; search just returns nothing
        let index = if count == 0 {
            None
        } else {
            let max_layer = ((count as f32).ln().ceil() as usize).clamp(1, 16);
            let hnsw = Hnsw::<f32, DistL2>::new(
                config.hnsw_m,
                count,
                max_layer,
                config.hnsw_ef_construction,
                DistL2 {},
            );

            for row in 0..count {
                let data = matrix
                    .row(row)
                    .ok_or_else(|| VectorIndexError::InvalidMatrix(format!("missing row {}", row)))?
                    .to_vec();
                hnsw.insert((&data, row));
            }

            Some(hnsw)
        };

        tracing::debug!("Built HNSW graph over {} vectors", count);

        Ok(Self {
            index,
            dimension: matrix.dimension(),
            count,
            ef_search: config.hnsw_ef_search,
        })
    }
}

impl VectorIndex for HnswVectorIndex {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<VectorHit>, VectorIndexError> {
        check_query(query, self.dimension)?;

        let Some(index) = &self.index else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut hits: Vec<VectorHit> = index
            .search(query, k, self.ef_search.max(k))
            .into_iter()
            .map(|neighbor| VectorHit {
                row: neighbor.d_id,
                // DistL2 is the plain Euclidean norm
                distance: neighbor.distance * neighbor.distance,
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.row.cmp(&b.row)));
        hits.truncate(k);

        Ok(hits)
    }

    fn len(&self) -> usize {
        self.count
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(dimension: usize, axis: usize) -> Vec<f32> {
        let mut v = vec![0.0; dimension];
        v[axis] = 1.0;
        v
    }

    fn sample_matrix() -> EmbeddingMatrix {
        let mut near = vec![0.0; 8];
        near[0] = 0.9;
        near[1] = 0.1;
        EmbeddingMatrix::from_rows(8, &[unit(8, 0), unit(8, 1), near, unit(8, 2)]).unwrap()
    }

    #[test]
    fn test_matrix_rows() {
        let matrix = sample_matrix();
        assert_eq!(matrix.rows(), 4);
        assert_eq!(matrix.row(1).unwrap(), unit(8, 1).as_slice());
        assert!(matrix.row(4).is_none());
    }

    #[test]
    fn test_matrix_dimension_validation() {
        let mut matrix = EmbeddingMatrix::new(8);
        let result = matrix.push_row(&[1.0; 4]);
        assert!(matches!(
            result,
            Err(VectorIndexError::InvalidDimension {
                expected: 8,
                actual: 4
            })
        ));
    }

    #[test]
    fn test_flat_search_ascending() {
        let index = FlatVectorIndex::new(&sample_matrix()).unwrap();
        let hits = index.search(&unit(8, 0), 3).unwrap();

        let rows: Vec<usize> = hits.iter().map(|h| h.row).collect();
        assert_eq!(rows[0], 0);
        assert_eq!(rows[1], 2);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert_eq!(hits[0].distance, 0.0);
    }

    #[test]
    fn test_flat_squared_distance() {
        let index = FlatVectorIndex::new(&sample_matrix()).unwrap();
        let hits = index.search(&unit(8, 0), 4).unwrap();
        // Orthogonal unit vectors are at squared distance 2
        let far = hits.iter().find(|h| h.row == 1).unwrap();
        assert!((far.distance - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_flat_k_larger_than_rows() {
        let index = FlatVectorIndex::new(&sample_matrix()).unwrap();
        let hits = index.search(&unit(8, 3), 20).unwrap();
        assert_eq!(hits.len(), 4);
    }

    #[test]
    fn test_flat_ties_keep_row_order() {
        let index = FlatVectorIndex::new(&sample_matrix()).unwrap();
        // Rows 0, 1 and 3 are all orthogonal to axis 5
        let hits = index.search(&unit(8, 5), 4).unwrap();
        let tied: Vec<usize> = hits
            .iter()
            .filter(|h| (h.distance - 2.0).abs() < 1e-6)
            .map(|h| h.row)
            .collect();
        assert_eq!(tied, vec![0, 1, 3]);
    }

    #[test]
    fn test_empty_index() {
        let matrix = EmbeddingMatrix::new(8);
        let flat = FlatVectorIndex::new(&matrix).unwrap();
        assert!(flat.is_empty());
        assert!(flat.search(&unit(8, 0), 5).unwrap().is_empty());

        let hnsw = HnswVectorIndex::new(&matrix, &VectorConfig::default()).unwrap();
        assert!(hnsw.is_empty());
        assert!(hnsw.search(&unit(8, 0), 5).unwrap().is_empty());
    }

    #[test]
    fn test_query_dimension_validation() {
        let index = FlatVectorIndex::new(&sample_matrix()).unwrap();
        assert!(index.search(&[1.0; 3], 2).is_err());
    }

    #[test]
    fn test_hnsw_finds_nearest() {
        let config = VectorConfig {
            backend: VectorBackend::Hnsw,
            ..VectorConfig::default()
        };
        let index = build_vector_index(&sample_matrix(), &config).unwrap();
        assert_eq!(index.len(), 4);

        let hits = index.search(&unit(8, 0), 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].row, 0);
        assert!(hits[0].distance < 1e-6);
        assert_eq!(hits[1].row, 2);
        // 0.1^2 + 0.1^2
        assert!((hits[1].distance - 0.02).abs() < 1e-4);
    }
}

use anyhow::Result;

use crate::vector::{Matrix, squared_l2};

/// Exact nearest-neighbour search by squared L2 distance
#[derive(Debug, Clone, Default)]
pub struct FlatL2Index {
    vectors: Matrix,
}

impl FlatL2Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_matrix(vectors: Matrix) -> Self {
        Self { vectors }
    }

    pub fn dimension(&self) -> usize {
        self.vectors.cols()
    }

    pub fn len(&self) -> usize {
        self.vectors.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn vectors(&self) -> &Matrix {
        &self.vectors
    }

    pub fn add(&mut self, vector: &[f32]) -> Result<()> {
        self.vectors.push_row(vector)
    }

    /// Up to `k` (row, distance) pairs, closest first
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension() {
            anyhow::bail!(
                "Query has dimension {}, index has {}",
                query.len(),
                self.dimension()
            );
        }

        let mut hits: Vec<(usize, f32)> = self
            .vectors
            .iter_rows()
            .enumerate()
            .map(|(i, row)| (i, squared_l2(query, row)))
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        hits.truncate(k);
        Ok(hits)
    }
}

/// Fraction of queries whose ground-truth row appears in their top-k
pub fn recall_at_k(vectors: &Matrix, queries: &Matrix, ground_truth: &[usize], k: usize) -> Result<f32> {
    if queries.rows() != ground_truth.len() {
        anyhow::bail!(
            "{} queries but {} ground-truth entries",
            queries.rows(),
            ground_truth.len()
        );
    }
    if queries.is_empty() {
        return Ok(0.0);
    }

    let index = FlatL2Index::from_matrix(vectors.clone());
    let mut found = 0;
    for (query, truth) in queries.iter_rows().zip(ground_truth) {
        let hits = index.search(query, k)?;
        if hits.iter().any(|(row, _)| row == truth) {
            found += 1;
        }
    }

    Ok(found as f32 / queries.rows() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_orders_by_distance() {
        let mut index = FlatL2Index::new();
        index.add(&[0.0, 0.0]).unwrap();
        index.add(&[1.0, 1.0]).unwrap();
        index.add(&[0.1, 0.0]).unwrap();

        let hits = index.search(&[0.0, 0.0], 2).unwrap();
        assert_eq!(hits.iter().map(|h| h.0).collect::<Vec<_>>(), vec![0, 2]);
        assert!(index.search(&[0.0], 1).is_err());
        assert!(index.add(&[1.0]).is_err());
    }

    #[test]
    fn test_recall_at_k() {
        let vectors = Matrix::from_rows(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, 0.0]]).unwrap();
        let queries = Matrix::from_rows(&[vec![0.9, 0.1], vec![0.1, 0.9]]).unwrap();

        assert_eq!(recall_at_k(&vectors, &queries, &[0, 1], 1).unwrap(), 1.0);
        assert_eq!(recall_at_k(&vectors, &queries, &[2, 1], 1).unwrap(), 0.5);
        assert!(recall_at_k(&vectors, &queries, &[0], 1).is_err());
    }
}

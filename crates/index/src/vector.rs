use anyhow::Result;

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn norm(a: &[f32]) -> f32 {
    dot(a, a).sqrt()
}

/// Cosine similarity; 0.0 when either vector is all zeros or lengths differ
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let denom = norm(a) * norm(b);
    if denom <= f32::EPSILON {
        0.0
    } else {
        dot(a, b) / denom
    }
}

pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// In-place L2 normalization; zero vectors are left untouched
pub fn l2_normalize(v: &mut [f32]) {
    let n = norm(v);
    if n > f32::EPSILON {
        v.iter_mut().for_each(|x| *x /= n);
    }
}

/// Dense row-major f32 matrix
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    pub fn from_raw(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        if rows * cols != data.len() {
            anyhow::bail!(
                "Matrix shape ({}, {}) does not match {} values",
                rows,
                cols,
                data.len()
            );
        }
        Ok(Self { rows, cols, data })
    }

    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let mut matrix = Self::default();
        for row in rows {
            matrix.push_row(row)?;
        }
        Ok(matrix)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        (0..self.rows).map(move |i| self.row(i))
    }

    pub fn push_row(&mut self, row: &[f32]) -> Result<()> {
        if self.rows == 0 {
            self.cols = row.len();
        } else if row.len() != self.cols {
            anyhow::bail!("Row has dimension {}, expected {}", row.len(), self.cols);
        }
        self.data.extend_from_slice(row);
        self.rows += 1;
        Ok(())
    }

    /// Rows of `self` followed by rows of `other`
    pub fn vstack(&self, other: &Matrix) -> Result<Matrix> {
        if self.is_empty() {
            return Ok(other.clone());
        }
        if other.is_empty() {
            return Ok(self.clone());
        }
        if self.cols != other.cols {
            anyhow::bail!(
                "Embedding dimension mismatch: existing {} vs new {}",
                self.cols,
                other.cols
            );
        }
        let mut data = Vec::with_capacity(self.data.len() + other.data.len());
        data.extend_from_slice(&self.data);
        data.extend_from_slice(&other.data);
        Matrix::from_raw(self.rows + other.rows, self.cols, data)
    }

    /// x / (||x|| + eps) for every row
    pub fn normalize_rows(&mut self, eps: f32) {
        if self.cols == 0 {
            return;
        }
        for row in self.data.chunks_mut(self.cols) {
            let n = norm(row) + eps;
            row.iter_mut().for_each(|x| *x /= n);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cosine() {
        assert_relative_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_relative_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_vstack_and_mismatch() {
        let a = Matrix::from_rows(&[vec![1.0, 2.0]]).unwrap();
        let b = Matrix::from_rows(&[vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        let stacked = a.vstack(&b).unwrap();
        assert_eq!(stacked.rows(), 3);
        assert_eq!(stacked.row(2), &[5.0, 6.0]);

        let c = Matrix::from_rows(&[vec![1.0, 2.0, 3.0]]).unwrap();
        assert!(a.vstack(&c).is_err());
        assert!(Matrix::from_rows(&[vec![1.0], vec![1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_normalize_rows() {
        let mut m = Matrix::from_rows(&[vec![3.0, 4.0], vec![0.0, 0.0]]).unwrap();
        m.normalize_rows(1e-8);
        assert_relative_eq!(m.row(0)[0], 0.6, epsilon = 1e-6);
        assert_relative_eq!(m.row(0)[1], 0.8, epsilon = 1e-6);
        assert_eq!(m.row(1), &[0.0, 0.0]);
    }
}

use std::ops::{Index, IndexMut};

/// Dense square matrix stored row-major. Indexing by row yields a slice.
#[derive(Default, Debug, Clone)]
pub struct Matrix {
    dimension: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: vec![0.0; dimension * dimension],
        }
    }

    /// Builds a symmetric matrix from `value(i, j)` evaluated once per unordered pair `i < j`.
    /// The diagonal stays zero.
    pub fn symmetric<F: FnMut(usize, usize) -> f64>(dimension: usize, mut value: F) -> Self {
        let mut matrix = Self::new(dimension);
        for i in 0..dimension {
            for j in i + 1..dimension {
                let v = value(i, j);
                matrix[i][j] = v;
                matrix[j][i] = v;
            }
        }
        matrix
    }

    pub fn update<F: FnOnce(f64) -> f64>(&mut self, i: usize, j: usize, op: F) {
        self[i][j] = op(self[i][j])
    }

    /// Applies `op` to `(i, j)` and mirrors the result into `(j, i)`.
    pub fn update_symmetric<F: FnOnce(f64) -> f64>(&mut self, i: usize, j: usize, op: F) {
        self.update(i, j, op);
        self[j][i] = self[i][j];
    }

    /// Iterates over every unordered off-diagonal pair `(i, j)` with `i < j`.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> {
        let n = self.dimension;
        (0..n).flat_map(move |i| (i + 1..n).map(move |j| (i, j)))
    }
}

impl Index<usize> for Matrix {
    type Output = [f64];
    fn index(&self, index: usize) -> &Self::Output {
        &self.data[index * self.dimension..(index + 1) * self.dimension]
    }
}

impl IndexMut<usize> for Matrix {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.data[index * self.dimension..(index + 1) * self.dimension]
    }
}

//! Row-compressed sparse matrix with duplicate summation.

use std::collections::BTreeMap;
use std::fmt::Debug;

use num_complex::Complex64;
use num_traits::NumAssign;

use super::RowColVal;

/// Element type usable in a [`SparseMatrix`] and the LU solver.
pub trait Scalar: Copy + Debug + PartialEq + NumAssign {
    /// Magnitude used for pivot selection.
    fn magnitude(&self) -> f64;

    fn from_real(v: f64) -> Self;
}

impl Scalar for f64 {
    fn magnitude(&self) -> f64 {
        self.abs()
    }

    fn from_real(v: f64) -> Self {
        v
    }
}

impl Scalar for Complex64 {
    fn magnitude(&self) -> f64 {
        self.norm()
    }

    fn from_real(v: f64) -> Self {
        Complex64::new(v, 0.0)
    }
}

/// Square sparse matrix stored row by row.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix<T: Scalar> {
    size: usize,
    rows: Vec<BTreeMap<usize, T>>,
}

impl<T: Scalar> SparseMatrix<T> {
    /// Create an empty `size x size` matrix.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            rows: vec![BTreeMap::new(); size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Add to element at (row, col).
    pub fn add(&mut self, row: usize, col: usize, value: T) {
        debug_assert!(row < self.size && col < self.size, "entry ({row}, {col}) out of bounds");
        *self.rows[row].entry(col).or_insert_with(T::zero) += value;
    }

    /// Get element at (row, col); zero when not stored.
    pub fn get(&self, row: usize, col: usize) -> T {
        self.rows[row].get(&col).copied().unwrap_or_else(T::zero)
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(BTreeMap::len).sum()
    }

    /// Stored entries of one row, ordered by column.
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, T)> + '_ {
        self.rows[row].iter().map(|(c, v)| (*c, *v))
    }

    /// All stored entries as (row, col, value).
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        self.rows
            .iter()
            .enumerate()
            .flat_map(|(r, cols)| cols.iter().map(move |(c, v)| (r, *c, *v)))
    }

    pub fn transpose(&self) -> Self {
        let mut t = Self::new(self.size);
        for (r, c, v) in self.iter() {
            t.add(c, r, v);
        }
        t
    }

    /// Row-major dense copy.
    pub fn to_dense(&self) -> Vec<T> {
        let n = self.size;
        let mut dense = vec![T::zero(); n * n];
        for (r, c, v) in self.iter() {
            dense[r * n + c] = v;
        }
        dense
    }

    /// Matrix-vector product.
    pub fn mul_vec(&self, x: &[T]) -> Vec<T> {
        self.rows
            .iter()
            .map(|cols| {
                cols.iter().fold(T::zero(), |mut acc, (c, v)| {
                    acc += *v * x[*c];
                    acc
                })
            })
            .collect()
    }
}

impl SparseMatrix<f64> {
    /// Sum a list of triplets into a matrix.
    pub fn from_entries(size: usize, entries: &[RowColVal]) -> Self {
        let mut m = Self::new(size);
        for e in entries {
            m.add(e.row, e.col, e.val);
        }
        m
    }
}

impl SparseMatrix<Complex64> {
    /// Build `real + j * omega * imag`.
    pub fn from_parts(real: &SparseMatrix<f64>, imag: &SparseMatrix<f64>, omega: f64) -> Self {
        debug_assert_eq!(real.size, imag.size);
        let mut m = Self::new(real.size);
        for (r, c, v) in real.iter() {
            m.add(r, c, Complex64::new(v, 0.0));
        }
        for (r, c, v) in imag.iter() {
            m.add(r, c, Complex64::new(0.0, omega * v));
        }
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_sum() {
        let m = SparseMatrix::from_entries(
            2,
            &[
                RowColVal::new(0, 0, 1.0),
                RowColVal::new(0, 0, 2.0),
                RowColVal::new(1, 0, -1.0),
            ],
        );
        assert_eq!(m.get(0, 0), 3.0);
        assert_eq!(m.get(1, 0), -1.0);
        assert_eq!(m.get(1, 1), 0.0);
        assert_eq!(m.nnz(), 2);
    }

    #[test]
    fn test_transpose_and_mul() {
        let mut m = SparseMatrix::<f64>::new(2);
        m.add(0, 1, 2.0);
        m.add(1, 1, 3.0);
        let t = m.transpose();
        assert_eq!(t.get(1, 0), 2.0);
        assert_eq!(m.mul_vec(&[1.0, 1.0]), vec![2.0, 3.0]);
    }

    #[test]
    fn test_complex_from_parts() {
        let mut g = SparseMatrix::<f64>::new(1);
        g.add(0, 0, 1.0);
        let mut c = SparseMatrix::<f64>::new(1);
        c.add(0, 0, 2.0);
        let a = SparseMatrix::from_parts(&g, &c, 3.0);
        assert_eq!(a.get(0, 0), Complex64::new(1.0, 6.0));
    }
}

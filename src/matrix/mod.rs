//! Matrix entry accumulation, row permutation and linear solving.
//!
//! Assemblers never write into a matrix directly. They push
//! [`RowColVal`] and [`RhsEntry`] triplets into an [`Assembly`], duplicates
//! included; the global system builder sums them into a [`SparseMatrix`]
//! once all contributions of a pass have been collected.

mod lu;
mod permutation;
mod sparse;

pub use lu::{DirectSolver, LinearSolver};
pub use permutation::{PermutationEntry, PermutationMap};
pub use sparse::{Scalar, SparseMatrix};

/// A single matrix contribution. Duplicates at the same position add.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowColVal {
    pub row: usize,
    pub col: usize,
    pub val: f64,
}

impl RowColVal {
    pub fn new(row: usize, col: usize, val: f64) -> Self {
        Self { row, col, val }
    }
}

/// A single right-hand-side contribution. Duplicates at the same row add.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RhsEntry {
    pub row: usize,
    pub val: f64,
}

impl RhsEntry {
    pub fn new(row: usize, val: f64) -> Self {
        Self { row, val }
    }
}

/// Matrix and RHS contributions collected during one assembly pass.
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    pub matrix: Vec<RowColVal>,
    pub rhs: Vec<RhsEntry>,
}

impl Assembly {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a matrix contribution.
    pub fn add_matrix(&mut self, row: usize, col: usize, val: f64) {
        self.matrix.push(RowColVal::new(row, col, val));
    }

    /// Add a right-hand-side contribution.
    pub fn add_rhs(&mut self, row: usize, val: f64) {
        self.rhs.push(RhsEntry::new(row, val));
    }

    /// Append every entry of `other`, shifting rows and columns by `offset`.
    pub fn extend_offset(&mut self, other: &Assembly, offset: usize) {
        self.matrix.extend(
            other
                .matrix
                .iter()
                .map(|e| RowColVal::new(e.row + offset, e.col + offset, e.val)),
        );
        self.rhs.extend(
            other
                .rhs
                .iter()
                .map(|e| RhsEntry::new(e.row + offset, e.val)),
        );
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.is_empty() && self.rhs.is_empty()
    }

    pub fn clear(&mut self) {
        self.matrix.clear();
        self.rhs.clear();
    }

    /// Sum the RHS entries into a dense vector of length `size`.
    pub fn rhs_dense(&self, size: usize) -> Vec<f64> {
        let mut out = vec![0.0; size];
        for e in &self.rhs {
            out[e.row] += e.val;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rhs_accumulates_duplicates() {
        let mut a = Assembly::new();
        a.add_rhs(1, 2.0);
        a.add_rhs(0, 1.0);
        a.add_rhs(1, -0.5);
        assert_eq!(a.rhs_dense(3), vec![1.0, 1.5, 0.0]);
    }

    #[test]
    fn test_accumulation_is_order_independent() {
        let mut a = Assembly::new();
        let mut b = Assembly::new();
        let entries = [(0, 1, 0.25), (1, 1, 2.0), (0, 1, -1.0), (1, 0, 3.0)];
        for &(r, c, v) in &entries {
            a.add_matrix(r, c, v);
        }
        for &(r, c, v) in entries.iter().rev() {
            b.add_matrix(r, c, v);
        }
        let ma = SparseMatrix::<f64>::from_entries(2, &a.matrix);
        let mb = SparseMatrix::<f64>::from_entries(2, &b.matrix);
        assert_eq!(ma.to_dense(), mb.to_dense());
        assert_eq!(ma.get(0, 1), -0.75);
    }
}

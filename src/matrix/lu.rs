//! Linear solver interface and a dense LU implementation.

use num_complex::Complex64;

use crate::error::{Result, TcadError};

use super::sparse::{Scalar, SparseMatrix};

/// Pivots smaller than this are treated as zero.
const PIVOT_TOLERANCE: f64 = 1e-300;

/// Solves an assembled linear system.
pub trait LinearSolver {
    /// Solve `matrix * x = rhs`.
    fn solve(&self, matrix: &SparseMatrix<f64>, rhs: &[f64]) -> Result<Vec<f64>>;

    /// Solve the complex system used by AC and noise analysis.
    fn solve_complex(
        &self,
        matrix: &SparseMatrix<Complex64>,
        rhs: &[Complex64],
    ) -> Result<Vec<Complex64>>;
}

/// Dense LU factorization with partial pivoting.
///
/// Densifies the sparse matrix, so it is only meant for small systems and
/// tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectSolver;

impl DirectSolver {
    pub fn new() -> Self {
        Self
    }
}

impl LinearSolver for DirectSolver {
    fn solve(&self, matrix: &SparseMatrix<f64>, rhs: &[f64]) -> Result<Vec<f64>> {
        lu_solve(matrix, rhs)
    }

    fn solve_complex(
        &self,
        matrix: &SparseMatrix<Complex64>,
        rhs: &[Complex64],
    ) -> Result<Vec<Complex64>> {
        lu_solve(matrix, rhs)
    }
}

struct LuFactors<T: Scalar> {
    size: usize,
    lu: Vec<T>,
    pivots: Vec<usize>,
}

fn factor<T: Scalar>(matrix: &SparseMatrix<T>) -> Result<LuFactors<T>> {
    let n = matrix.size();
    let mut lu = matrix.to_dense();
    let mut pivots: Vec<usize> = (0..n).collect();

    for k in 0..n {
        // Find pivot
        let mut max_val = lu[k * n + k].magnitude();
        let mut max_row = k;
        for i in (k + 1)..n {
            let val = lu[i * n + k].magnitude();
            if val > max_val {
                max_val = val;
                max_row = i;
            }
        }

        if max_val.is_nan() || max_val <= PIVOT_TOLERANCE {
            return Err(TcadError::SingularMatrix);
        }

        if max_row != k {
            pivots.swap(k, max_row);
            for j in 0..n {
                lu.swap(k * n + j, max_row * n + j);
            }
        }

        // Eliminate
        let pivot = lu[k * n + k];
        for i in (k + 1)..n {
            let factor = lu[i * n + k] / pivot;
            lu[i * n + k] = factor;
            if factor == T::zero() {
                continue;
            }
            for j in (k + 1)..n {
                let ukj = lu[k * n + j];
                lu[i * n + j] -= factor * ukj;
            }
        }
    }

    Ok(LuFactors {
        size: n,
        lu,
        pivots,
    })
}

impl<T: Scalar> LuFactors<T> {
    fn solve(&self, rhs: &[T]) -> Vec<T> {
        let n = self.size;
        let lu = &self.lu;

        // Apply pivot permutation
        let mut x: Vec<T> = self.pivots.iter().map(|&p| rhs[p]).collect();

        // Forward substitution (L * y = Pb)
        for i in 0..n {
            for j in 0..i {
                let l = lu[i * n + j];
                let xj = x[j];
                x[i] -= l * xj;
            }
        }

        // Back substitution (U * x = y)
        for i in (0..n).rev() {
            for j in (i + 1)..n {
                let u = lu[i * n + j];
                let xj = x[j];
                x[i] -= u * xj;
            }
            x[i] /= lu[i * n + i];
        }

        x
    }
}

fn lu_solve<T: Scalar>(matrix: &SparseMatrix<T>, rhs: &[T]) -> Result<Vec<T>> {
    if rhs.len() != matrix.size() {
        return Err(TcadError::invalid_param(format!(
            "rhs has {} rows, matrix has {}",
            rhs.len(),
            matrix.size()
        )));
    }
    let factors = factor(matrix)?;
    let x = factors.solve(rhs);
    if x.iter().any(|v| !v.magnitude().is_finite()) {
        return Err(TcadError::SingularMatrix);
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_solve_needs_pivoting() {
        let mut m = SparseMatrix::<f64>::new(2);
        m.add(0, 1, 1.0);
        m.add(1, 0, 2.0);
        m.add(1, 1, 1.0);
        let x = DirectSolver.solve(&m, &[3.0, 5.0]).unwrap();
        assert_relative_eq!(x[0], 1.0);
        assert_relative_eq!(x[1], 3.0);
    }

    #[test]
    fn test_singular_matrix() {
        let mut m = SparseMatrix::<f64>::new(2);
        m.add(0, 0, 1.0);
        m.add(1, 0, 1.0);
        let err = DirectSolver.solve(&m, &[1.0, 1.0]).unwrap_err();
        assert!(matches!(err, TcadError::SingularMatrix));
    }

    #[test]
    fn test_complex_solve() {
        let mut m = SparseMatrix::<Complex64>::new(1);
        m.add(0, 0, Complex64::new(1.0, 1.0));
        let x = DirectSolver
            .solve_complex(&m, &[Complex64::new(2.0, 0.0)])
            .unwrap();
        assert_relative_eq!(x[0].re, 1.0);
        assert_relative_eq!(x[0].im, -1.0);
    }

    #[test]
    fn test_empty_system() {
        let m = SparseMatrix::<f64>::new(0);
        assert!(DirectSolver.solve(&m, &[]).unwrap().is_empty());
    }
}

//! Dense linear-algebra kernel: LU with partial pivoting.
//!
//! Per-step systems in this simulator are small (dimension < 200), so a dense
//! factorization is sufficient. The factorization is kept separate from the
//! solve so one decomposition can serve many right-hand sides — the Schur
//! reduction applies `A_xx^{-1}` to a full matrix column-by-column.

use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};

/// Default pivot-magnitude threshold below which a matrix is declared singular.
pub const DEFAULT_PIVOT_TOL: f64 = 1e-12;

/// LU decomposition with partial (row) pivoting.
///
/// Stores the combined `L - I + U` factor and the row permutation. The input
/// matrix is cloned; the caller's matrix is never modified.
#[derive(Debug, Clone)]
pub struct LuFactors {
    lu: DMatrix<f64>,
    perm: Vec<usize>,
    n: usize,
}

impl LuFactors {
    /// Factor a square matrix.
    ///
    /// Fails with [`Error::Singular`] when the largest available pivot in a
    /// column has magnitude below `pivot_tol` (or is not finite).
    pub fn factor(a: &DMatrix<f64>, pivot_tol: f64) -> Result<Self> {
        if a.nrows() != a.ncols() {
            return Err(Error::DimensionMismatch {
                expected: a.nrows(),
                actual: a.ncols(),
            });
        }

        let n = a.nrows();
        let mut lu = a.clone();
        let mut perm: Vec<usize> = (0..n).collect();

        for k in 0..n {
            // Partial pivoting: largest magnitude in column k at or below the diagonal.
            let mut p = k;
            let mut p_mag = lu[(k, k)].abs();
            for i in (k + 1)..n {
                let mag = lu[(i, k)].abs();
                if mag > p_mag {
                    p_mag = mag;
                    p = i;
                }
            }

            if !p_mag.is_finite() || p_mag < pivot_tol {
                return Err(Error::Singular { column: k });
            }

            if p != k {
                lu.swap_rows(p, k);
                perm.swap(p, k);
            }

            let pivot = lu[(k, k)];
            for i in (k + 1)..n {
                let m = lu[(i, k)] / pivot;
                lu[(i, k)] = m;
                for j in (k + 1)..n {
                    let delta = m * lu[(k, j)];
                    lu[(i, j)] -= delta;
                }
            }
        }

        Ok(Self { lu, perm, n })
    }

    /// Dimension of the factored matrix.
    pub fn size(&self) -> usize {
        self.n
    }

    /// Solve `A x = b` using the stored factors.
    pub fn solve(&self, b: &DVector<f64>) -> Result<DVector<f64>> {
        if b.len() != self.n {
            return Err(Error::DimensionMismatch {
                expected: self.n,
                actual: b.len(),
            });
        }

        let mut x = DVector::zeros(self.n);
        for i in 0..self.n {
            x[i] = b[self.perm[i]];
        }

        // Forward substitution (L has unit diagonal).
        for i in 0..self.n {
            for j in 0..i {
                let delta = self.lu[(i, j)] * x[j];
                x[i] -= delta;
            }
        }

        // Back substitution.
        for i in (0..self.n).rev() {
            for j in (i + 1)..self.n {
                let delta = self.lu[(i, j)] * x[j];
                x[i] -= delta;
            }
            x[i] /= self.lu[(i, i)];
        }

        Ok(x)
    }

    /// Solve `A X = B` for a matrix right-hand side, column by column.
    pub fn solve_matrix(&self, b: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        if b.nrows() != self.n {
            return Err(Error::DimensionMismatch {
                expected: self.n,
                actual: b.nrows(),
            });
        }

        let mut x = DMatrix::zeros(self.n, b.ncols());
        for j in 0..b.ncols() {
            let col = self.solve(&b.column(j).clone_owned())?;
            x.set_column(j, &col);
        }
        Ok(x)
    }

    /// Estimate `‖A^{-1}‖_∞` (maximum absolute row sum of the inverse) by
    /// solving against each unit vector. Exact for these small dimensions.
    pub fn inverse_inf_norm(&self) -> f64 {
        let mut row_sums = vec![0.0_f64; self.n];
        let mut e = DVector::zeros(self.n);
        for j in 0..self.n {
            e[j] = 1.0;
            if let Ok(col) = self.solve(&e) {
                for i in 0..self.n {
                    row_sums[i] += col[i].abs();
                }
            }
            e[j] = 0.0;
        }
        row_sums.into_iter().fold(0.0, f64::max)
    }
}

/// Maximum absolute row sum of a matrix.
pub fn inf_norm(a: &DMatrix<f64>) -> f64 {
    let mut norm = 0.0_f64;
    for i in 0..a.nrows() {
        let mut sum = 0.0;
        for j in 0..a.ncols() {
            sum += a[(i, j)].abs();
        }
        norm = norm.max(sum);
    }
    norm
}

/// ∞-norm condition estimate `‖A‖_∞ · ‖A^{-1}‖_∞`.
///
/// Returns `f64::INFINITY` when the matrix fails to factor.
pub fn condition_estimate(a: &DMatrix<f64>) -> f64 {
    match LuFactors::factor(a, DEFAULT_PIVOT_TOL) {
        Ok(lu) => inf_norm(a) * lu.inverse_inf_norm(),
        Err(_) => f64::INFINITY,
    }
}

/// Solve a linear system `A x = b` with a one-shot factorization.
pub fn solve_dense(a: &DMatrix<f64>, b: &DVector<f64>, pivot_tol: f64) -> Result<DVector<f64>> {
    LuFactors::factor(a, pivot_tol)?.solve(b)
}

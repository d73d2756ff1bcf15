//! Schur-complement reduction of the augmented system to a pure LCP.
//!
//! The unknown columns split into `J_z` (the LCP `z` variables, in pair
//! order) and `J_x` (everything else). Rows partition identically: a `z`
//! variable's defining row lives in the complementarity block, so its `A` row
//! is structurally empty and drops out. With
//!
//! ```text
//! A_xx x + A_xz z = b_x          w = -(C_x x + (C_z + D) z + q)
//! ```
//!
//! one LU factorization of `A_xx` yields `X_b = A_xx⁻¹ b_x` and
//! `X_B = A_xx⁻¹ A_xz`, and substituting `x = X_b - X_B z` gives the
//! standard-form LCP
//!
//! ```text
//! w = M z + q_lcp,    M = C_x X_B - (C_z + D),    q_lcp = -(C_x X_b + q)
//! ```
//!
//! With no complementarity pairs the problem is purely linear and `X_b` is
//! already the answer.

use nalgebra::{DMatrix, DVector};
use switchsim_core::{Error, LuFactors, McpSystem, Result, Solution};

/// The reduced problem plus everything needed to reconstruct a full solution.
#[derive(Debug, Clone)]
pub struct ReducedLcp {
    /// Reduced LCP matrix `M` (`K x K`).
    pub m: DMatrix<f64>,
    /// Reduced constant vector `q_lcp` (`K`).
    pub q: DVector<f64>,
    x_cols: Vec<usize>,
    z_cols: Vec<usize>,
    x_base: DVector<f64>,
    x_sens: DMatrix<f64>,
    size: usize,
    num_nodes: usize,
}

impl ReducedLcp {
    /// Reduce an assembled system. Fails with [`Error::Singular`] when
    /// `A_xx` cannot be factored at `pivot_tol`.
    pub fn reduce(sys: &McpSystem, pivot_tol: f64) -> Result<Self> {
        let size = sys.size();
        let z_cols = sys.lcp_cols().to_vec();
        let k = z_cols.len();

        let mut is_z = vec![false; size];
        for &col in &z_cols {
            is_z[col] = true;
        }
        let x_cols: Vec<usize> = (0..size).filter(|&col| !is_z[col]).collect();
        let nx = x_cols.len();

        let a = sys.a();
        let b = sys.rhs();
        let mut a_xx = DMatrix::zeros(nx, nx);
        let mut a_xz = DMatrix::zeros(nx, k);
        let mut b_x = DVector::zeros(nx);
        for (ri, &row) in x_cols.iter().enumerate() {
            b_x[ri] = b[row];
            for (ci, &col) in x_cols.iter().enumerate() {
                a_xx[(ri, ci)] = a[(row, col)];
            }
            for (ci, &col) in z_cols.iter().enumerate() {
                a_xz[(ri, ci)] = a[(row, col)];
            }
        }

        let lu = LuFactors::factor(&a_xx, pivot_tol)?;
        let x_base = lu.solve(&b_x)?;
        let x_sens = lu.solve_matrix(&a_xz)?;

        let (m, q) = if k == 0 {
            (DMatrix::zeros(0, 0), DVector::zeros(0))
        } else {
            let c = sys.c();
            let mut c_x = DMatrix::zeros(k, nx);
            let mut c_z = DMatrix::zeros(k, k);
            for row in 0..k {
                for (ci, &col) in x_cols.iter().enumerate() {
                    c_x[(row, ci)] = c[(row, col)];
                }
                for (ci, &col) in z_cols.iter().enumerate() {
                    c_z[(row, ci)] = c[(row, col)];
                }
            }
            let m = &c_x * &x_sens - (c_z + sys.d());
            let q = -(&c_x * &x_base + sys.q());
            (m, q)
        };

        Ok(Self {
            m,
            q,
            x_cols,
            z_cols,
            x_base,
            x_sens,
            size,
            num_nodes: sys.num_nodes,
        })
    }

    /// Number of complementarity pairs in the reduced problem.
    pub fn num_pairs(&self) -> usize {
        self.z_cols.len()
    }

    /// Full solution for the purely linear case (`K = 0`).
    pub fn direct_solution(&self) -> Solution {
        self.reconstruct(&DVector::zeros(0))
    }

    /// Splice `x = X_b - X_B z` and `z` back into a full `S`-vector.
    pub fn reconstruct(&self, z: &DVector<f64>) -> Solution {
        let x = if self.z_cols.is_empty() {
            self.x_base.clone()
        } else {
            &self.x_base - &self.x_sens * z
        };
        let mut full = DVector::zeros(self.size);
        for (i, &col) in self.x_cols.iter().enumerate() {
            full[col] = x[i];
        }
        for (i, &col) in self.z_cols.iter().enumerate() {
            full[col] = z[i];
        }
        Solution::new(full, self.num_nodes)
    }

    /// Slack vector `w = M z + q` for invariant checks.
    pub fn slack(&self, z: &DVector<f64>) -> DVector<f64> {
        &self.m * z + &self.q
    }
}

/// Residual `A u - b` restricted to the non-LCP rows; the node-row entries
/// are the KCL violations.
pub fn kcl_residual(sys: &McpSystem, solution: &Solution) -> f64 {
    let r = sys.a() * solution.values() - sys.rhs();
    let mut is_z = vec![false; sys.size()];
    for &col in sys.lcp_cols() {
        is_z[col] = true;
    }
    (0..sys.size())
        .filter(|&row| !is_z[row])
        .map(|row| r[row].abs())
        .fold(0.0, f64::max)
}

//! Linear complementarity solvers.
//!
//! Standard form: find `w, z >= 0` with `w = M z + q` and `w . z = 0`.
//! [`lemke`] is the primary solver (exact pivoting); [`qp`] is the
//! interior-point fallback on the equivalent quadratic program. The robust
//! outer loop in [`solve_lcp`] chains Lemke, QP, and progressively
//! regularized retries; it never mutates the caller's matrices and it never
//! returns `Err` — non-convergence is data.

pub mod lemke;
pub mod qp;

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

/// Failure kinds internal to the LCP layer. Only the terminal one of a
/// robust-loop run surfaces, wrapped in `SimError::NonConvergent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LcpFailure {
    /// Lemke pivot magnitude below `pivot_tol`.
    #[error("pivot magnitude below tolerance")]
    PivotDegenerate,

    /// Minimum-ratio test found no positive column entry.
    #[error("unbounded ray in minimum-ratio test")]
    UnboundedRay,

    /// Iteration cap exhausted without convergence.
    #[error("iteration cap exhausted")]
    IterationCap,

    /// A non-finite value appeared in an iterate.
    #[error("numerical breakdown (non-finite iterate)")]
    NumericalBreakdown,
}

/// Tolerances and limits for one LCP solve.
#[derive(Debug, Clone)]
pub struct LcpOptions {
    /// Iteration cap for Lemke pivots and QP iterations.
    pub max_iters: u32,
    /// Lemke pivot-magnitude threshold.
    pub pivot_tol: f64,
    /// Threshold below which extracted values are snapped to zero.
    pub zero_tol: f64,
    /// QP convergence tolerance (residual, gap, feasibility).
    pub qp_tol: f64,
    /// Enable the QP fallback and regularization ladder.
    pub use_robust: bool,
}

impl Default for LcpOptions {
    fn default() -> Self {
        Self {
            max_iters: 20_000,
            pivot_tol: 1e-10,
            zero_tol: 1e-12,
            qp_tol: 1e-8,
            use_robust: true,
        }
    }
}

/// Outcome of an LCP solve. `converged == false` carries the failure kind;
/// `z`/`w` then hold the last iterate and must not be trusted.
#[derive(Debug, Clone)]
pub struct LcpSolution {
    pub z: DVector<f64>,
    pub w: DVector<f64>,
    pub iterations: u32,
    pub converged: bool,
    pub failure: Option<LcpFailure>,
}

impl LcpSolution {
    pub(crate) fn empty() -> Self {
        Self {
            z: DVector::zeros(0),
            w: DVector::zeros(0),
            iterations: 0,
            converged: true,
            failure: None,
        }
    }

    pub(crate) fn failed(n: usize, iterations: u32, failure: LcpFailure) -> Self {
        Self {
            z: DVector::zeros(n),
            w: DVector::zeros(n),
            iterations,
            converged: false,
            failure: Some(failure),
        }
    }

    /// Largest `|z_i * w_i|` over all pairs.
    pub fn max_complementarity(&self) -> f64 {
        self.z
            .iter()
            .zip(self.w.iter())
            .map(|(z, w)| (z * w).abs())
            .fold(0.0, f64::max)
    }
}

/// Robust outer loop: Lemke, then QP, then progressive diagonal
/// regularization `10^(k-9)` for `k in 1..=3` with both solvers retried.
///
/// Inputs are cloned before any modification. Iteration counts accumulate
/// across attempts so statistics reflect the real work done.
pub fn solve_lcp(m: &DMatrix<f64>, q: &DVector<f64>, opts: &LcpOptions) -> LcpSolution {
    let n = q.len();
    if n == 0 {
        return LcpSolution::empty();
    }

    let mut total_iters = 0u32;
    let mut attempt = lemke::solve(m, q, opts);
    total_iters += attempt.iterations;
    if attempt.converged || !opts.use_robust {
        attempt.iterations = total_iters;
        return attempt;
    }

    let mut qp_attempt = qp::solve(m, q, opts);
    total_iters += qp_attempt.iterations;
    if qp_attempt.converged {
        qp_attempt.iterations = total_iters;
        return qp_attempt;
    }

    let mut last_failure = qp_attempt.failure.unwrap_or(LcpFailure::IterationCap);
    for k in 1..=3 {
        let reg = 10f64.powi(k - 9);
        let mut m_reg = m.clone();
        for i in 0..n {
            m_reg[(i, i)] += reg;
        }
        log::debug!("LCP retry with diagonal regularization {reg:.1e}");

        let mut r = lemke::solve(&m_reg, q, opts);
        total_iters += r.iterations;
        if r.converged {
            r.iterations = total_iters;
            return r;
        }
        last_failure = r.failure.unwrap_or(last_failure);

        let mut r = qp::solve(&m_reg, q, opts);
        total_iters += r.iterations;
        if r.converged {
            r.iterations = total_iters;
            return r;
        }
        last_failure = r.failure.unwrap_or(last_failure);
    }

    LcpSolution::failed(n, total_iters, last_failure)
}

//! Interior-point fallback on the QP form of the LCP.
//!
//! The LCP `w = M z + q, w ⊥ z, w,z >= 0` is the KKT system of
//! `min ½ zᵀM z + qᵀz  s.t.  M z + q >= 0, z >= 0`. A primal log-barrier
//! method walks the interior: both `z` and the slack `s = M z + q` carry a
//! barrier term, the Newton-like step uses a diagonal preconditioner, and a
//! backtracking line search keeps the iterate strictly positive. The slack is
//! shifted positive at the start; the shift decays with the barrier weight so
//! the relaxation vanishes as µ falls.
//!
//! Once the barrier weight is small the active set has settled, and an exact
//! polish solves the implied equality system directly. The polished point is
//! verified against both inequalities before it is accepted, so a wrong
//! active-set guess just sends the barrier loop onward.

use nalgebra::{DMatrix, DVector};
use switchsim_core::{DEFAULT_PIVOT_TOL, condition_estimate, solve_dense};

use super::{LcpFailure, LcpOptions, LcpSolution};

/// Initial barrier weight.
const MU_INIT: f64 = 0.1;
/// Barrier reduction factor, applied every [`MU_INTERVAL`] iterations.
const MU_SHRINK: f64 = 0.3;
const MU_INTERVAL: u32 = 10;
/// Barrier floor.
const MU_FLOOR: f64 = 1e-12;
/// Barrier weight below which the active-set polish is attempted.
const POLISH_THRESHOLD: f64 = 1e-3;
/// Diagonal regularization added when the condition estimate is poor.
const ILL_COND_REG: f64 = 1e-6;
const ILL_COND_THRESHOLD: f64 = 1e10;
/// Maximum halvings in the positivity line search.
const MAX_BACKTRACK: u32 = 40;

/// Solve the LCP through the barrier QP. Never returns `Err`; failure is a
/// tagged non-converged solution.
pub fn solve(m: &DMatrix<f64>, q: &DVector<f64>, opts: &LcpOptions) -> LcpSolution {
    let n = q.len();
    if n == 0 {
        return LcpSolution::empty();
    }

    let reg = if condition_estimate(m) > ILL_COND_THRESHOLD {
        ILL_COND_REG
    } else {
        0.0
    };

    let mut z = DVector::from_element(n, 1.0);
    let mut mu = MU_INIT;

    // Shift so the initial slack is strictly positive.
    let s0 = m * &z + q;
    let mut shift = (1.0 - s0.min()).max(0.0);

    let mut iterations = 0u32;
    while iterations < opts.max_iters {
        iterations += 1;

        let s_raw = m * &z + q;
        let s = s_raw.add_scalar(shift);
        if z.iter().any(|v| !v.is_finite()) || s.iter().any(|v| !v.is_finite()) {
            return LcpSolution::failed(n, iterations, LcpFailure::NumericalBreakdown);
        }

        // Barrier gradient: (Mz + q) - µ/z - µ Mᵀ(1/s).
        let inv_s = s.map(|v| 1.0 / v);
        let mut g = &s_raw - (m.transpose() * inv_s).scale(mu);
        for i in 0..n {
            g[i] -= mu / z[i];
        }

        // Diagonal preconditioner step.
        let mut dz = DVector::zeros(n);
        for i in 0..n {
            let h = m[(i, i)].abs() + mu / (z[i] * z[i]) + reg;
            dz[i] = -g[i] / h.max(1e-30);
        }

        // Backtracking: keep z and s strictly positive, require the merit to
        // not increase.
        let merit = barrier_merit(m, q, &z, shift, mu);
        let mut alpha = 1.0;
        let mut accepted = false;
        for _ in 0..MAX_BACKTRACK {
            let z_new = &z + dz.scale(alpha);
            if z_new.min() > 0.0 {
                let s_new = (m * &z_new + q).add_scalar(shift);
                if s_new.min() > 0.0 {
                    let merit_new = barrier_merit(m, q, &z_new, shift, mu);
                    if merit_new.is_finite() && merit_new <= merit {
                        z = z_new;
                        accepted = true;
                        break;
                    }
                }
            }
            alpha *= 0.5;
        }

        let schedule_hit = iterations % MU_INTERVAL == 0;
        if schedule_hit || !accepted {
            mu = (mu * MU_SHRINK).max(MU_FLOOR);
            shift *= MU_SHRINK;
        }

        // Exact finish once the active set has settled.
        if mu < POLISH_THRESHOLD {
            if let Some((z_p, w_p)) = polish(m, q, &z, opts) {
                return LcpSolution {
                    z: z_p,
                    w: w_p,
                    iterations,
                    converged: true,
                    failure: None,
                };
            }
        }

        // Plain barrier convergence: residual, complementarity gap,
        // feasibility, and the barrier weight all down.
        let s_raw = m * &z + q;
        let residual = z
            .iter()
            .zip(s_raw.iter())
            .map(|(zi, si)| zi.min(*si).abs())
            .fold(0.0, f64::max);
        let gap = z.dot(&s_raw).abs();
        let violation = (-z.min()).max(-s_raw.min()).max(0.0);

        if residual < opts.qp_tol
            && gap < opts.qp_tol
            && violation < opts.qp_tol
            && mu <= MU_FLOOR
        {
            let z_out = z.map(|v| if v < opts.zero_tol { 0.0 } else { v });
            let w_out = (m * &z_out + q).map(|v| v.max(0.0));
            return LcpSolution {
                z: z_out,
                w: w_out,
                iterations,
                converged: true,
                failure: None,
            };
        }
    }

    LcpSolution::failed(n, iterations, LcpFailure::IterationCap)
}

/// Guess the active set from the iterate (`z_i` dominating its slack means
/// the pair is conducting), solve the equality-constrained system exactly,
/// and verify both inequalities. Returns `None` when the guess is wrong or
/// the sub-matrix is singular.
fn polish(
    m: &DMatrix<f64>,
    q: &DVector<f64>,
    z: &DVector<f64>,
    opts: &LcpOptions,
) -> Option<(DVector<f64>, DVector<f64>)> {
    let n = q.len();
    let s_raw = m * z + q;
    let active: Vec<usize> = (0..n).filter(|&i| z[i] > s_raw[i]).collect();

    let mut z_p = DVector::zeros(n);
    if !active.is_empty() {
        let nb = active.len();
        let mut m_bb = DMatrix::zeros(nb, nb);
        let mut q_b = DVector::zeros(nb);
        for (ri, &i) in active.iter().enumerate() {
            q_b[ri] = -q[i];
            for (ci, &j) in active.iter().enumerate() {
                m_bb[(ri, ci)] = m[(i, j)];
            }
        }
        let z_b = solve_dense(&m_bb, &q_b, DEFAULT_PIVOT_TOL).ok()?;
        for (ri, &i) in active.iter().enumerate() {
            z_p[i] = z_b[ri];
        }
    }

    let tol = opts.qp_tol;
    if z_p.min() < -tol {
        return None;
    }
    let w_p = m * &z_p + q;
    if w_p.min() < -tol {
        return None;
    }

    let z_out = z_p.map(|v| if v < opts.zero_tol { 0.0 } else { v.max(0.0) });
    let w_out = w_p.map(|v| if v < opts.zero_tol { 0.0 } else { v.max(0.0) });
    Some((z_out, w_out))
}

/// Barrier merit `½zᵀMz + qᵀz - µ Σ ln z - µ Σ ln s`.
fn barrier_merit(m: &DMatrix<f64>, q: &DVector<f64>, z: &DVector<f64>, shift: f64, mu: f64) -> f64 {
    let mz = m * z;
    let objective = 0.5 * z.dot(&mz) + q.dot(z);
    let s = (mz + q).add_scalar(shift);
    let barrier: f64 =
        z.iter().map(|v| v.ln()).sum::<f64>() + s.iter().map(|v| v.ln()).sum::<f64>();
    objective - mu * barrier
}

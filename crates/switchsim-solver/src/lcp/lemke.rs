//! Lemke's complementary pivoting algorithm.
//!
//! Tableau layout, one row per pair: `[ w (n) | z (n) | z0 | rhs ]` over the
//! system `w - M z - e z0 = q`. The basis starts as all-`w`; the artificial
//! `z0` enters on the row of most-negative `q` and the walk follows the
//! complement rule until `z0` leaves (solution found) or a guard trips.
//!
//! When `q >= 0` the trivial solution `z = 0, w = q` already satisfies the
//! problem, but a non-zero switching state may still be the physical answer
//! at a complementarity boundary. The trivial solution is therefore recorded
//! as a fallback and pivoting is attempted anyway; extraction is verified,
//! and the fallback is returned only if the walk fails outright.

use nalgebra::{DMatrix, DVector};

use super::{LcpFailure, LcpOptions, LcpSolution};

/// Variable ids in the basis: `0..n` are `w_i`, `n..2n` are `z_i`, `2n` is
/// the artificial `z0`.
fn complement(var: usize, n: usize) -> usize {
    if var < n { var + n } else { var - n }
}

/// Normalize the pivot row and eliminate the pivot column elsewhere.
fn pivot(t: &mut DMatrix<f64>, row: usize, col: usize) {
    let p = t[(row, col)];
    let ncols = t.ncols();
    for j in 0..ncols {
        t[(row, j)] /= p;
    }
    for i in 0..t.nrows() {
        if i == row {
            continue;
        }
        let factor = t[(i, col)];
        if factor == 0.0 {
            continue;
        }
        for j in 0..ncols {
            let delta = factor * t[(row, j)];
            t[(i, j)] -= delta;
        }
    }
}

/// Solve `w = M z + q, w ⊥ z, w,z >= 0` by complementary pivoting.
pub fn solve(m: &DMatrix<f64>, q: &DVector<f64>, opts: &LcpOptions) -> LcpSolution {
    let n = q.len();
    if n == 0 {
        return LcpSolution::empty();
    }

    // Record the trivial solution when it exists.
    let q_min = q.min();
    let fallback = if q_min >= 0.0 {
        Some(LcpSolution {
            z: DVector::zeros(n),
            w: q.clone(),
            iterations: 0,
            converged: true,
            failure: None,
        })
    } else {
        None
    };

    // [ w | z | z0 | rhs ]
    let rhs_col = 2 * n + 1;
    let z0_col = 2 * n;
    let z0_var = 2 * n;
    let mut t = DMatrix::zeros(n, 2 * n + 2);
    for i in 0..n {
        t[(i, i)] = 1.0;
        for j in 0..n {
            t[(i, n + j)] = -m[(i, j)];
        }
        t[(i, z0_col)] = -1.0;
        t[(i, rhs_col)] = q[i];
    }
    let mut basis: Vec<usize> = (0..n).collect();

    // Entry pivot: z0 in on the row of most-negative q.
    let mut entry_row = 0;
    for i in 1..n {
        if q[i] < q[entry_row] {
            entry_row = i;
        }
    }
    pivot(&mut t, entry_row, z0_col);
    let mut entering = complement(basis[entry_row], n);
    basis[entry_row] = z0_var;

    let mut iterations = 1u32;
    loop {
        if iterations >= opts.max_iters {
            return fail(LcpFailure::IterationCap, iterations, n, fallback);
        }

        // Minimum-ratio test over positive pivot-column entries. On an exact
        // tie the artificial row is preferred so termination is taken when
        // it is available.
        let mut leave_row: Option<usize> = None;
        let mut best_ratio = f64::INFINITY;
        for i in 0..n {
            let a = t[(i, entering)];
            if a > opts.pivot_tol {
                let ratio = t[(i, rhs_col)] / a;
                let better = ratio < best_ratio
                    || (ratio == best_ratio && basis[i] == z0_var);
                if better {
                    best_ratio = ratio;
                    leave_row = Some(i);
                }
            }
        }

        let Some(row) = leave_row else {
            return fail(LcpFailure::UnboundedRay, iterations, n, fallback);
        };

        if !t[(row, entering)].is_finite() || t[(row, entering)].abs() <= opts.pivot_tol {
            return fail(LcpFailure::PivotDegenerate, iterations, n, fallback);
        }

        pivot(&mut t, row, entering);
        let leaving = basis[row];
        basis[row] = entering;
        iterations += 1;

        if leaving == z0_var {
            break;
        }
        entering = complement(leaving, n);
    }

    match extract(&t, &basis, m, q, opts, n, rhs_col) {
        Some((z, w)) => LcpSolution {
            z,
            w,
            iterations,
            converged: true,
            failure: None,
        },
        None => fail(LcpFailure::PivotDegenerate, iterations, n, fallback),
    }
}

fn fail(
    failure: LcpFailure,
    iterations: u32,
    n: usize,
    fallback: Option<LcpSolution>,
) -> LcpSolution {
    match fallback {
        Some(mut trivial) => {
            trivial.iterations = iterations;
            trivial
        }
        None => LcpSolution::failed(n, iterations, failure),
    }
}

/// Read `z` off the final basis, recompute `w = M z + q`, snap tiny
/// negatives to zero, and verify feasibility. Verification rejects the
/// garbage a forced entry pivot can produce from a strictly-positive `q`.
fn extract(
    t: &DMatrix<f64>,
    basis: &[usize],
    m: &DMatrix<f64>,
    q: &DVector<f64>,
    opts: &LcpOptions,
    n: usize,
    rhs_col: usize,
) -> Option<(DVector<f64>, DVector<f64>)> {
    let mut z = DVector::zeros(n);
    for (row, &var) in basis.iter().enumerate() {
        if (n..2 * n).contains(&var) {
            z[var - n] = t[(row, rhs_col)];
        }
    }

    let scale_q = 1.0 + q.amax();
    let feas_tol = 1e-7 * scale_q.max(1.0 + z.amax());
    for i in 0..n {
        if !z[i].is_finite() || z[i] < -feas_tol {
            return None;
        }
        if z[i] < opts.zero_tol {
            z[i] = 0.0;
        }
    }

    let mut w = m * &z + q;
    let scale_w = 1.0 + w.amax();
    for i in 0..n {
        if !w[i].is_finite() || w[i] < -1e-7 * scale_w {
            return None;
        }
        if w[i] < opts.zero_tol {
            w[i] = 0.0;
        }
    }

    Some((z, w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn test_single_pair_conducting() {
        // w = 2z - 4 => z = 2.
        let sol = solve(&dmatrix![2.0], &dvector![-4.0], &LcpOptions::default());
        assert!(sol.converged);
        assert!((sol.z[0] - 2.0).abs() < 1e-12, "z = {}", sol.z[0]);
    }

    #[test]
    fn test_single_pair_blocking_returns_trivial() {
        // q > 0: pivoting from an infeasible start must fall back to the
        // recorded trivial solution, not fabricate a negative z.
        let sol = solve(&dmatrix![2.0], &dvector![0.5], &LcpOptions::default());
        assert!(sol.converged);
        assert_eq!(sol.z[0], 0.0);
        assert!((sol.w[0] - 0.5).abs() < 1e-12, "w = {}", sol.w[0]);
    }

    #[test]
    fn test_boundary_q_zero() {
        // q = 0 sits exactly on the complementarity boundary; either branch
        // is valid but the result must satisfy both inequalities.
        let sol = solve(&dmatrix![1.0], &dvector![0.0], &LcpOptions::default());
        assert!(sol.converged);
        assert!(sol.z[0] >= 0.0 && sol.w[0] >= 0.0);
        assert!(sol.max_complementarity() < 1e-12);
    }

    #[test]
    fn test_unbounded_ray_detected() {
        // M = [[0]] with q < 0: w = -1 can never be lifted, no positive
        // column entry exists after the entry pivot.
        let sol = solve(&dmatrix![0.0], &dvector![-1.0], &LcpOptions::default());
        assert!(!sol.converged);
        assert_eq!(sol.failure, Some(LcpFailure::UnboundedRay));
    }

    #[test]
    fn test_iteration_cap() {
        let opts = LcpOptions {
            max_iters: 1,
            ..Default::default()
        };
        let m = dmatrix![1.0, 0.0; 2.0, 1.0];
        let sol = solve(&m, &dvector![-1.0, -1.0], &opts);
        assert!(!sol.converged);
        assert_eq!(sol.failure, Some(LcpFailure::IterationCap));
    }

    #[test]
    fn test_three_pairs() {
        // Diagonal M: pairs decouple; z_i = -q_i / m_ii where q_i < 0.
        let m = dmatrix![1.0, 0.0, 0.0; 0.0, 2.0, 0.0; 0.0, 0.0, 4.0];
        let q = dvector![-1.0, 3.0, -8.0];

        let sol = solve(&m, &q, &LcpOptions::default());

        assert!(sol.converged);
        assert!((sol.z[0] - 1.0).abs() < 1e-10, "z0 = {}", sol.z[0]);
        assert!(sol.z[1].abs() < 1e-12, "z1 = {}", sol.z[1]);
        assert!((sol.z[2] - 2.0).abs() < 1e-10, "z2 = {}", sol.z[2]);
        assert!((sol.w[1] - 3.0).abs() < 1e-10, "w1 = {}", sol.w[1]);
        assert!(sol.max_complementarity() < 1e-9);
    }

    #[test]
    fn test_mixed_sign_q() {
        // Off-diagonal coupling with mixed q, the shape a switching instant
        // produces.
        let m = dmatrix![3.0, -1.0; -1.0, 2.0];
        let q = dvector![-5.0, 4.0];

        let sol = solve(&m, &q, &LcpOptions::default());

        assert!(sol.converged);
        // z0 = 5/3, w1 = 4 - 5/3 > 0 => pair 1 stays inactive.
        assert!((sol.z[0] - 5.0 / 3.0).abs() < 1e-10, "z0 = {}", sol.z[0]);
        assert!(sol.z[1].abs() < 1e-12);
        assert!(sol.w[0].abs() < 1e-10);
        assert!((sol.w[1] - (4.0 - 5.0 / 3.0)).abs() < 1e-10);
    }
}

//! Shared assemble -> reduce -> solve pipeline used by both the DC and
//! transient engines, with the gmin escalation ladder.

use switchsim_core::{Assembler, Component, DEFAULT_PIVOT_TOL, Error as CoreError, Solution};

use crate::error::{Result, SimError};
use crate::lcp::{self, LcpFailure, LcpOptions};
use crate::schur::{ReducedLcp, kcl_residual};

/// One solved system: the full solution plus the LCP work it took.
pub(crate) struct StepSolution {
    pub solution: Solution,
    pub lcp_iterations: u32,
}

/// Escalation factors applied to the configured gmin when a solve attempt
/// fails (singular `A_xx` or a non-convergent LCP).
const GMIN_LADDER: [f64; 3] = [1.0, 1e3, 1e6];

pub(crate) fn solve_assembled(
    asm: &Assembler,
    components: &[Box<dyn Component>],
    t: f64,
    gmin: f64,
    opts: &LcpOptions,
    debug: bool,
) -> Result<StepSolution> {
    let mut last_err = SimError::AssemblerSingular;

    for (attempt, factor) in GMIN_LADDER.iter().enumerate() {
        let g = gmin * factor;
        if attempt > 0 {
            log::warn!("retrying solve at t = {t:.6e} s with gmin raised to {g:.1e}");
        }

        let sys = asm.build(components, t, g);
        let reduced = match ReducedLcp::reduce(&sys, DEFAULT_PIVOT_TOL) {
            Ok(r) => r,
            Err(CoreError::Singular { column }) => {
                log::debug!("A_xx singular in column {column} at gmin {g:.1e}");
                last_err = SimError::AssemblerSingular;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if reduced.num_pairs() == 0 {
            let solution = reduced.direct_solution();
            if debug {
                log::debug!(
                    "t = {t:.6e} s: linear step, kcl residual {:.3e}",
                    kcl_residual(&sys, &solution)
                );
            }
            return Ok(StepSolution {
                solution,
                lcp_iterations: 0,
            });
        }

        let lcp_sol = lcp::solve_lcp(&reduced.m, &reduced.q, opts);
        if !lcp_sol.converged {
            last_err =
                SimError::NonConvergent(lcp_sol.failure.unwrap_or(LcpFailure::IterationCap));
            continue;
        }

        let solution = reduced.reconstruct(&lcp_sol.z);
        if debug {
            let w = reduced.slack(&lcp_sol.z);
            log::debug!(
                "t = {t:.6e} s: {} pivots, kcl residual {:.3e}, min z {:.3e}, min w {:.3e}, max z*w {:.3e}",
                lcp_sol.iterations,
                kcl_residual(&sys, &solution),
                lcp_sol.z.min(),
                w.min(),
                lcp_sol.max_complementarity()
            );
        }
        return Ok(StepSolution {
            solution,
            lcp_iterations: lcp_sol.iterations,
        });
    }

    Err(last_err)
}

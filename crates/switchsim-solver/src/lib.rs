//! Solvers and analysis engines for switchsim.
//!
//! The pipeline per time step: the assembler (switchsim-core) produces the
//! augmented MNA+LCP system, [`schur`] eliminates the non-complementary block
//! to a pure LCP, [`lcp`] solves it by Lemke pivoting with a QP interior-point
//! fallback and progressive regularization, and the [`transient`] driver
//! advances companion-model history and records results. [`dc`] computes the
//! consistent operating point that seeds a transient run.

pub mod dc;
mod engine;
pub mod error;
pub mod lcp;
pub mod schur;
pub mod transient;

pub use dc::{DcResult, solve_dc};
pub use error::{Result, SimError};
pub use lcp::{LcpFailure, LcpOptions, LcpSolution, solve_lcp};
pub use schur::{ReducedLcp, kcl_residual};
pub use transient::{
    AnalysisInfo, IntegrationMethod, SimContext, SimParams, SimResult, SolverStats, StepResult,
    finalize, initialize_stepped, run, run_with_cancel, step_forward,
};

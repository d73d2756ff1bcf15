//! Error surface of the simulation engine.
//!
//! Policy: the LCP solvers never return `Err` — they report `converged: bool`
//! with a failure-kind tag, and the robust outer loop recovers from
//! `PivotDegenerate`, `UnboundedRay` and `IterationCap` internally. Only
//! terminal conditions cross this boundary.

use thiserror::Error;

use crate::lcp::LcpFailure;
use crate::transient::SimResult;

/// Errors returned by the public entry points.
#[derive(Debug, Error)]
pub enum SimError {
    /// The non-complementary block `A_xx` is singular even after gmin
    /// regularization and escalation.
    #[error("MNA block is singular even after gmin regularization")]
    AssemblerSingular,

    /// Every outer-loop attempt (Lemke, QP, progressive regularization)
    /// failed.
    #[error("LCP solver failed to converge: {0}")]
    NonConvergent(LcpFailure),

    /// The DC operating-point solve failed. The transient driver downgrades
    /// this to a warning and starts from zero initial conditions.
    #[error("DC operating point failed: {0}")]
    DcInit(String),

    /// A transient step failed; the run is aborted. `partial` carries the
    /// results accumulated before the failure when the batch driver owns
    /// them (stepped-mode callers still hold their context).
    #[error("transient step failed at t = {time:.6e} s")]
    StepFailure {
        time: f64,
        partial: Option<Box<SimResult>>,
    },

    /// Inconsistent nodes, duplicate component names, non-finite parameter.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Core(#[from] switchsim_core::Error),
}

impl SimError {
    /// Results accumulated before a step failure, if the driver owned them.
    pub fn partial_result(&self) -> Option<&SimResult> {
        match self {
            SimError::StepFailure { partial, .. } => partial.as_deref(),
            _ => None,
        }
    }
}

/// Result type for the simulation engine.
pub type Result<T> = std::result::Result<T, SimError>;

/// Lift a core error to the public surface, promoting input-validation
/// failures to the dedicated variant.
pub(crate) fn core_err(e: switchsim_core::Error) -> SimError {
    match e {
        switchsim_core::Error::InvalidInput(msg) => SimError::InvalidInput(msg),
        other => SimError::Core(other),
    }
}

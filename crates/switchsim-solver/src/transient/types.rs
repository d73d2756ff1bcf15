//! Configuration types for the transient engine.

use serde::{Deserialize, Serialize};
use switchsim_core::Solution;

use crate::error::{Result, SimError};
use crate::lcp::LcpOptions;

pub use switchsim_core::IntegrationMethod;

/// Simulation parameters. Every tolerance has the documented default; the
/// record is plain data and is threaded through calls — there is no global
/// configuration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    /// Simulation start time (s).
    pub start_time: f64,
    /// Simulation stop time (s).
    pub stop_time: f64,
    /// Fixed time step (s).
    pub time_step: f64,
    /// Implicit integration rule for companion models.
    #[serde(with = "method_serde")]
    pub method: IntegrationMethod,
    /// Conductance added from every node to ground (raised automatically when
    /// a solve attempt fails).
    pub gmin: f64,
    /// Iteration cap for the LCP solvers.
    pub lcp_max_iters: u32,
    /// Lemke pivot-magnitude threshold.
    pub lcp_pivot_tol: f64,
    /// Snap-to-zero threshold for extracted LCP values.
    pub lcp_zero_tol: f64,
    /// QP fallback convergence tolerance.
    pub qp_tol: f64,
    /// Enable the QP fallback and regularization ladder.
    pub use_robust_solver: bool,
    /// Emit per-step invariant diagnostics through `log::debug!`.
    pub debug: bool,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            stop_time: 1e-3,
            time_step: 1e-6,
            method: IntegrationMethod::BackwardEuler,
            gmin: 1e-9,
            lcp_max_iters: 20_000,
            lcp_pivot_tol: 1e-10,
            lcp_zero_tol: 1e-12,
            qp_tol: 1e-8,
            use_robust_solver: true,
            debug: false,
        }
    }
}

impl SimParams {
    pub fn new(start_time: f64, stop_time: f64, time_step: f64, method: IntegrationMethod) -> Self {
        Self {
            start_time,
            stop_time,
            time_step,
            method,
            ..Default::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("start_time", self.start_time),
            ("stop_time", self.stop_time),
            ("time_step", self.time_step),
            ("gmin", self.gmin),
        ] {
            if !value.is_finite() {
                return Err(SimError::InvalidInput(format!("{name} is not finite")));
            }
        }
        if self.time_step <= 0.0 {
            return Err(SimError::InvalidInput("time_step must be positive".into()));
        }
        if self.stop_time <= self.start_time {
            return Err(SimError::InvalidInput(
                "stop_time must be after start_time".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn lcp_options(&self) -> LcpOptions {
        LcpOptions {
            max_iters: self.lcp_max_iters,
            pivot_tol: self.lcp_pivot_tol,
            zero_tol: self.lcp_zero_tol,
            qp_tol: self.qp_tol,
            use_robust: self.use_robust_solver,
        }
    }

    /// Number of fixed steps to cover `[start_time, stop_time]`. A small
    /// relative guard keeps float noise in the division from adding a step.
    pub fn num_steps(&self) -> usize {
        let raw = (self.stop_time - self.start_time) / self.time_step;
        (raw - raw.abs() * 1e-12).ceil() as usize
    }

    pub fn method_name(&self) -> &'static str {
        match self.method {
            IntegrationMethod::BackwardEuler => "backward-euler",
            IntegrationMethod::Bdf2 => "bdf2",
        }
    }
}

mod method_serde {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use switchsim_core::IntegrationMethod;

    pub fn serialize<S: Serializer>(m: &IntegrationMethod, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(match m {
            IntegrationMethod::BackwardEuler => "backward-euler",
            IntegrationMethod::Bdf2 => "bdf2",
        })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<IntegrationMethod, D::Error> {
        let s = String::deserialize(d)?;
        match s.as_str() {
            "backward-euler" | "be" => Ok(IntegrationMethod::BackwardEuler),
            "bdf2" => Ok(IntegrationMethod::Bdf2),
            other => Err(D::Error::custom(format!(
                "unknown integration method: {other}"
            ))),
        }
    }
}

/// Outcome of one accepted step in stepped mode.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub time: f64,
    pub solution: Solution,
    pub lcp_iterations: u32,
}

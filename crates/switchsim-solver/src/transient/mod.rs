//! Transient analysis engine.
//!
//! Time is advanced with implicit integration (Backward Euler or BDF2) over
//! companion models; every step is assembled as an MNA+LCP system, reduced by
//! Schur complement, and solved exactly by complementary pivoting.
//!
//! # Module Structure
//!
//! - [`types`] - Parameters and per-step results
//! - [`result`] - The result sink and run statistics
//! - [`driver`] - Batch and stepped drivers

pub mod driver;
pub mod result;
pub mod types;

pub use driver::{
    SimContext, drive, finalize, initialize_stepped, run, run_with_cancel, step_forward,
};
pub use result::{AnalysisInfo, SimResult, SolverStats};
pub use types::{IntegrationMethod, SimParams, StepResult};

//! Core MNA+LCP representation for switchsim.
//!
//! This crate provides:
//! - A dense linear-algebra kernel (LU with partial pivoting, configurable
//!   pivot tolerance, condition estimation).
//! - The [`McpSystem`] container: the augmented per-step system
//!   `[A b; C D q]` with MNA stamp helpers and the complementarity pair
//!   table.
//! - The [`Component`] capability trait and the two-pass [`Assembler`] that
//!   turns a component list into a sized, stamped system.

pub mod assembler;
pub mod component;
pub mod error;
pub mod linalg;
pub mod nodes;
pub mod system;

pub use assembler::{AnalyzeContext, Assembler, LcpContext};
pub use component::{
    Component, ComponentKind, DcSeed, IntegrationMethod, LcpHandle, NodeRef, flatten,
};
pub use error::{Error, Result};
pub use linalg::{DEFAULT_PIVOT_TOL, LuFactors, condition_estimate, inf_norm, solve_dense};
pub use nodes::{NodeMap, is_ground};
pub use system::{McpSystem, Solution};

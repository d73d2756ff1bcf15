//! The component capability set.
//!
//! Every device implements the subset of [`Component`] operations that applies
//! to its kind. The assembler resolves the device↔solver index cycle with a
//! two-pass protocol: `analyze` interns nodes and claims MNA extras,
//! `register_lcp` claims complementarity rows and `z` extras, and only then do
//! the stamp passes run against final indices. Handles are plain indices, not
//! references, so components never hold pointers into the assembler.

use std::collections::HashMap;

use crate::assembler::{AnalyzeContext, LcpContext};
use crate::error::Result;
use crate::nodes::is_ground;
use crate::system::{McpSystem, Solution};

/// Broad classification of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    /// Purely resistive (R).
    Linear,
    /// Carries companion-model state (L, C, coupled windings).
    Reactive,
    /// Independent source, possibly time-varying.
    Source,
    /// Complementarity-described device (diode, MOSFET).
    Switch,
}

/// Implicit integration rule for companion models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationMethod {
    /// Backward Euler (first order, A-stable, one history sample).
    BackwardEuler,
    /// BDF2 (second order, two history samples; the driver falls back to
    /// Backward Euler on the first step).
    Bdf2,
}

/// A node terminal: the user-facing name plus the dense index bound during
/// the analyze pass (`None` for ground).
#[derive(Debug, Clone)]
pub struct NodeRef {
    pub name: String,
    pub index: Option<usize>,
}

impl NodeRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: None,
        }
    }

    /// Intern this terminal's name and remember the index.
    pub fn bind(&mut self, ctx: &mut AnalyzeContext) {
        self.index = ctx.bind_node(&self.name);
    }

    pub fn is_ground(&self) -> bool {
        is_ground(&self.name)
    }
}

/// Handle to one complementarity pair: the `w` row and the `z` extra.
#[derive(Debug, Clone, Copy)]
pub struct LcpHandle {
    /// Row in `C`/`D`/`q`.
    pub row: usize,
    /// Relative extra-variable index of the `z` variable.
    pub extra: usize,
}

/// DC operating-point values keyed by node and branch names, used to seed
/// transient history without leaking the DC clone's indices.
#[derive(Debug, Clone, Default)]
pub struct DcSeed {
    pub node_voltages: HashMap<String, f64>,
    pub branch_currents: HashMap<String, f64>,
}

impl DcSeed {
    /// Voltage of a node by name; ground and unknown nodes read as 0.
    pub fn voltage(&self, node: &str) -> f64 {
        if is_ground(node) {
            0.0
        } else {
            self.node_voltages.get(node).copied().unwrap_or(0.0)
        }
    }

    /// Branch current by name, if the DC solve produced one.
    pub fn current(&self, branch: &str) -> Option<f64> {
        self.branch_currents.get(branch).copied()
    }
}

/// Capability set implemented by every device.
///
/// Ownership: the circuit owns its components exclusively; the assembler takes
/// shared borrows during stamping and the driver takes exclusive borrows for
/// the `update_*` calls between steps.
pub trait Component: Send {
    /// Unique component name; also the key for its reported branch currents.
    fn name(&self) -> &str;

    fn kind(&self) -> ComponentKind;

    /// Pass 1: intern node names, claim MNA extra variables, validate
    /// parameters.
    fn analyze(&mut self, ctx: &mut AnalyzeContext) -> Result<()>;

    /// Pass 2: claim complementarity rows and `z` extras (switches only).
    fn register_lcp(&mut self, _ctx: &mut LcpContext) {}

    /// Stamp linear and companion contributions into `A` and `b`.
    fn stamp_linear(&self, _sys: &mut McpSystem, _t: f64) {}

    /// Stamp switch incidence/channel equations into `A` and the
    /// complementarity functional into `C`, `D`, `q`.
    fn stamp_lcp(&self, _sys: &mut McpSystem, _t: f64) {}

    /// Recompute companion coefficients for the step about to be solved.
    fn update_companion(&mut self, _h: f64, _method: IntegrationMethod, _step: usize) {}

    /// Recompute the instantaneous value of time-varying sources and drives.
    fn update_time_varying(&mut self, _t: f64) {}

    /// Latch state from an accepted step. Called exactly once per step.
    fn update_history(&mut self, _sol: &Solution) {}

    /// Seed history from the DC operating point. Devices with an explicit
    /// initial condition keep it in preference to the DC value.
    fn set_initial_state(&mut self, _dc: &DcSeed) {}

    /// Named currents this component contributes to the result sink.
    fn branch_currents(&self, _sol: &Solution) -> Vec<(String, f64)> {
        Vec::new()
    }

    /// Deep copy. Contract-level requirement: the DC solver clones the
    /// component list and must never disturb the transient instances.
    fn clone_component(&self) -> Box<dyn Component>;

    /// Operating-point rewrite: `None` drops the device (capacitor → open),
    /// `Some` supplies the DC stand-in (inductor → 0 V source under the same
    /// name). Default: an unchanged deep copy.
    fn dc_clone(&self) -> Option<Box<dyn Component>> {
        Some(self.clone_component())
    }

    /// Composite devices expose their primitive children; the driver replaces
    /// the composite with these before analysis. Primitives return `None`.
    fn get_components(&self) -> Option<Vec<Box<dyn Component>>> {
        None
    }

    /// Concrete-type access so stepped-mode callers can mutate device
    /// parameters (gate state, load values) between steps.
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

/// Replace every meta-component with its primitive children so the assembler
/// sees only primitives.
pub fn flatten(components: Vec<Box<dyn Component>>) -> Vec<Box<dyn Component>> {
    let mut flat = Vec::with_capacity(components.len());
    for component in components {
        match component.get_components() {
            Some(children) => flat.extend(flatten(children)),
            None => flat.push(component),
        }
    }
    flat
}

impl Clone for Box<dyn Component> {
    fn clone(&self) -> Self {
        self.clone_component()
    }
}

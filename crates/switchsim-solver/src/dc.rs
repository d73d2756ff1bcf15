//! DC-MCP operating point.
//!
//! The component list is deep-cloned and rewritten through `dc_clone`:
//! inductors become 0 V sources (their current extras and result keys
//! survive), capacitors drop out as opens, switches keep their full
//! complementarity structure, and sources are evaluated at the start time.
//! The rewritten list then goes through exactly the same assemble / reduce /
//! solve pipeline as a transient step. Results are keyed by node and branch
//! *names* so the clone's index assignment never leaks back.

use switchsim_core::{Assembler, Component, DcSeed, Solution, flatten};

use crate::engine;
use crate::error::{Result, SimError};
use crate::transient::SimParams;

/// Operating-point solution.
#[derive(Debug, Clone)]
pub struct DcResult {
    /// Node voltages and branch currents keyed by name; feeds
    /// `Component::set_initial_state`.
    pub seed: DcSeed,
    /// Raw solution over the DC system's unknowns.
    pub solution: Solution,
    /// LCP pivoting work the operating point took.
    pub lcp_iterations: u32,
}

impl DcResult {
    /// Node voltage by name (0 for ground and unknown nodes).
    pub fn voltage(&self, node: &str) -> f64 {
        self.seed.voltage(node)
    }

    /// Branch current by name.
    pub fn current(&self, branch: &str) -> Option<f64> {
        self.seed.current(branch)
    }
}

/// Compute the DC operating point of a circuit.
pub fn solve_dc(components: &[Box<dyn Component>], params: &SimParams) -> Result<DcResult> {
    params.validate()?;
    let cloned: Vec<Box<dyn Component>> =
        components.iter().map(|c| c.clone_component()).collect();
    let flat = flatten(cloned);
    solve_dc_flat(&flat, params)
}

/// Operating point over an already-flattened list (the transient driver's
/// entry; its list is flattened once at initialization).
pub(crate) fn solve_dc_flat(
    components: &[Box<dyn Component>],
    params: &SimParams,
) -> Result<DcResult> {
    let mut dc_comps: Vec<Box<dyn Component>> =
        components.iter().filter_map(|c| c.dc_clone()).collect();
    for component in dc_comps.iter_mut() {
        component.update_time_varying(params.start_time);
    }

    let mut run = || -> Result<(Assembler, engine::StepSolution)> {
        let asm = Assembler::analyze(&mut dc_comps).map_err(crate::error::core_err)?;
        let step = engine::solve_assembled(
            &asm,
            &dc_comps,
            params.start_time,
            params.gmin,
            &params.lcp_options(),
            params.debug,
        )?;
        Ok((asm, step))
    };
    let (asm, step) = run().map_err(|e| SimError::DcInit(e.to_string()))?;

    let mut seed = DcSeed::default();
    for (name, idx) in asm.node_map().iter() {
        seed.node_voltages
            .insert(name.to_string(), step.solution.voltage(Some(idx)));
    }
    for component in &dc_comps {
        for (name, current) in component.branch_currents(&step.solution) {
            seed.branch_currents.insert(name, current);
        }
    }

    Ok(DcResult {
        seed,
        solution: step.solution,
        lcp_iterations: step.lcp_iterations,
    })
}

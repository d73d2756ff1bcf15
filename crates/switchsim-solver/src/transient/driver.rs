//! Transient driver: batch and stepped modes.
//!
//! Batch mode is implemented on top of stepped mode, so the state evolution
//! of the two is identical by construction. Within a step the order is fixed:
//! update sources, update companion models, assemble, reduce, solve,
//! reconstruct, update history, record. The cancel flag is checked between
//! steps only.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use nalgebra::DVector;
use switchsim_core::{Assembler, Component, DcSeed, IntegrationMethod, Solution, flatten};

use crate::dc;
use crate::engine;
use crate::error::{Result, SimError, core_err};

use super::result::{SimResult, SolverStats};
use super::types::{SimParams, StepResult};

/// Live state of a stepped-mode simulation.
pub struct SimContext {
    components: Vec<Box<dyn Component>>,
    params: SimParams,
    assembler: Assembler,
    step: usize,
    total_steps: usize,
    time: f64,
    result: SimResult,
    stats: SolverStats,
    started: Instant,
    cancel: Option<Arc<AtomicBool>>,
    finished: bool,
}

impl SimContext {
    /// Install a cancellation flag, polled between steps.
    pub fn set_cancel_flag(&mut self, flag: Arc<AtomicBool>) {
        self.cancel = Some(flag);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// True once the stop time is reached or a step has failed.
    pub fn is_done(&self) -> bool {
        self.finished || self.step >= self.total_steps
    }

    /// Simulation time of the last accepted step.
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn steps_taken(&self) -> usize {
        self.step
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// Mutable access to the flattened component list for between-step
    /// parameter changes (gate toggling, load steps).
    pub fn components_mut(&mut self) -> &mut [Box<dyn Component>] {
        &mut self.components
    }

    /// Downcast a component by name for typed between-step mutation.
    pub fn component_mut<T: 'static>(&mut self, name: &str) -> Option<&mut T> {
        self.components
            .iter_mut()
            .find(|c| c.name() == name)
            .and_then(|c| c.as_any_mut().downcast_mut::<T>())
    }
}

/// Set up a stepped simulation: flatten, validate, size the system, seed
/// history from the DC operating point, and record the starting point.
pub fn initialize_stepped(
    components: Vec<Box<dyn Component>>,
    params: SimParams,
) -> Result<SimContext> {
    params.validate()?;

    let mut components = flatten(components);
    for component in components.iter_mut() {
        component.update_time_varying(params.start_time);
    }
    let assembler = Assembler::analyze(&mut components).map_err(core_err)?;

    // DC-MCP seed; failure is a warning, not an abort.
    let seed = match dc::solve_dc_flat(&components, &params) {
        Ok(dc_result) => dc_result.seed,
        Err(e) => {
            log::warn!("{e}; starting transient from zero initial conditions");
            DcSeed::default()
        }
    };
    for component in components.iter_mut() {
        component.set_initial_state(&seed);
    }

    // Result sink keys: node names in index order, branch names in component
    // order.
    let node_names: Vec<String> = assembler
        .node_map()
        .iter()
        .map(|(name, _)| name.to_string())
        .collect();
    let probe = Solution::new(DVector::zeros(assembler.size()), assembler.num_nodes());
    let current_names: Vec<String> = components
        .iter()
        .flat_map(|c| c.branch_currents(&probe))
        .map(|(name, _)| name)
        .collect();
    let mut result = SimResult::new(params.method_name(), node_names.clone(), current_names.clone());

    // Operating point at t_start.
    let v0: Vec<(String, f64)> = node_names
        .iter()
        .map(|name| (name.clone(), seed.voltage(name)))
        .collect();
    let i0: Vec<(String, f64)> = current_names
        .iter()
        .map(|name| (name.clone(), seed.current(name).unwrap_or(0.0)))
        .collect();
    result.add_time_point(params.start_time, &v0, &i0);

    let total_steps = params.num_steps();
    let time = params.start_time;
    Ok(SimContext {
        components,
        params,
        assembler,
        step: 0,
        total_steps,
        time,
        result,
        stats: SolverStats::default(),
        started: Instant::now(),
        cancel: None,
        finished: false,
    })
}

/// Advance one step. History is latched exactly once, after the solve is
/// accepted; a failed step freezes the context and surfaces `StepFailure`.
pub fn step_forward(ctx: &mut SimContext) -> Result<StepResult> {
    if ctx.is_done() {
        return Err(SimError::InvalidInput(
            "simulation already reached its stop time".into(),
        ));
    }

    let n = ctx.step + 1;
    let h = ctx.params.time_step;
    let t = ctx.params.start_time + n as f64 * h;

    for component in ctx.components.iter_mut() {
        component.update_time_varying(t);
    }

    // BDF2 consults two history samples; the first step has only one, so it
    // always runs Backward Euler.
    let method = if n == 1 {
        IntegrationMethod::BackwardEuler
    } else {
        ctx.params.method
    };
    for component in ctx.components.iter_mut() {
        component.update_companion(h, method, n);
    }

    let step = match engine::solve_assembled(
        &ctx.assembler,
        &ctx.components,
        t,
        ctx.params.gmin,
        &ctx.params.lcp_options(),
        ctx.params.debug,
    ) {
        Ok(step) => step,
        Err(e) => {
            ctx.stats.failed_steps += 1;
            ctx.finished = true;
            log::warn!("transient step at t = {t:.6e} s failed: {e}");
            return Err(SimError::StepFailure {
                time: t,
                partial: None,
            });
        }
    };
    if ctx.assembler.num_lcp() > 0 {
        ctx.stats.record_lcp(step.lcp_iterations);
    }

    for component in ctx.components.iter_mut() {
        component.update_history(&step.solution);
    }

    let voltages: Vec<(String, f64)> = ctx
        .assembler
        .node_map()
        .iter()
        .map(|(name, idx)| (name.to_string(), step.solution.voltage(Some(idx))))
        .collect();
    let currents: Vec<(String, f64)> = ctx
        .components
        .iter()
        .flat_map(|c| c.branch_currents(&step.solution))
        .collect();
    ctx.result.add_time_point(t, &voltages, &currents);

    ctx.stats.total_steps += 1;
    ctx.step = n;
    ctx.time = t;

    Ok(StepResult {
        time: t,
        solution: step.solution,
        lcp_iterations: step.lcp_iterations,
    })
}

/// Advance a context until completion or cancellation.
pub fn drive(ctx: &mut SimContext) -> Result<()> {
    while !ctx.is_done() {
        if ctx.is_cancelled() {
            ctx.result.truncated = true;
            break;
        }
        step_forward(ctx)?;
    }
    Ok(())
}

/// Close out a stepped simulation and take its results.
pub fn finalize(mut ctx: SimContext) -> SimResult {
    ctx.result.info.stats = ctx.stats.clone();
    ctx.result.info.execution_time = ctx.started.elapsed().as_secs_f64();
    ctx.result
}

/// Batch entry point: run the whole transient in one call. On a step failure
/// the accumulated results travel inside the error.
pub fn run(components: Vec<Box<dyn Component>>, params: SimParams) -> Result<SimResult> {
    let mut ctx = initialize_stepped(components, params)?;
    match drive(&mut ctx) {
        Ok(()) => Ok(finalize(ctx)),
        Err(SimError::StepFailure { time, .. }) => Err(SimError::StepFailure {
            time,
            partial: Some(Box::new(finalize(ctx))),
        }),
        Err(e) => Err(e),
    }
}

/// Batch entry point with a cancellation flag.
pub fn run_with_cancel(
    components: Vec<Box<dyn Component>>,
    params: SimParams,
    cancel: Arc<AtomicBool>,
) -> Result<SimResult> {
    let mut ctx = initialize_stepped(components, params)?;
    ctx.set_cancel_flag(cancel);
    match drive(&mut ctx) {
        Ok(()) => Ok(finalize(ctx)),
        Err(SimError::StepFailure { time, .. }) => Err(SimError::StepFailure {
            time,
            partial: Some(Box::new(finalize(ctx))),
        }),
        Err(e) => Err(e),
    }
}

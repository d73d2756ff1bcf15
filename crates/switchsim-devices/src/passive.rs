//! Passive elements: resistor, capacitor, inductor, coupled inductors.
//!
//! Reactive devices carry their companion model inline: `update_companion`
//! recomputes the equivalent-source coefficients for the step about to be
//! solved, `stamp_linear` stamps them, and `update_history` latches the
//! accepted solution. History is two samples deep, which is all BDF2 needs.

use switchsim_core::{
    AnalyzeContext, Component, ComponentKind, DcSeed, IntegrationMethod, McpSystem, NodeRef,
    Result, Solution,
};

use crate::sources::VoltageSource;
use crate::waveforms::Waveform;

/// BDF2 history weights for equal steps: `x' ≈ (3/2 x_n - 2 x_{n-1} + 1/2 x_{n-2}) / h`.
const BDF2_LEAD: f64 = 1.5;
const BDF2_H1: f64 = 2.0;
const BDF2_H2: f64 = -0.5;

/// Ideal resistor.
#[derive(Debug, Clone)]
pub struct Resistor {
    name: String,
    pos: NodeRef,
    neg: NodeRef,
    resistance: f64,
}

impl Resistor {
    pub fn new(name: impl Into<String>, pos: &str, neg: &str, resistance: f64) -> Self {
        Self {
            name: name.into(),
            pos: NodeRef::new(pos),
            neg: NodeRef::new(neg),
            resistance,
        }
    }
}

impl Component for Resistor {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Linear
    }

    fn analyze(&mut self, ctx: &mut AnalyzeContext) -> Result<()> {
        ctx.require_finite(&self.name, "resistance", self.resistance)?;
        if self.resistance == 0.0 {
            return Err(switchsim_core::Error::InvalidInput(format!(
                "{}: resistance must be non-zero",
                self.name
            )));
        }
        self.pos.bind(ctx);
        self.neg.bind(ctx);
        Ok(())
    }

    fn stamp_linear(&self, sys: &mut McpSystem, _t: f64) {
        sys.stamp_conductance(self.pos.index, self.neg.index, 1.0 / self.resistance);
    }

    fn branch_currents(&self, sol: &Solution) -> Vec<(String, f64)> {
        let v = sol.voltage(self.pos.index) - sol.voltage(self.neg.index);
        vec![(self.name.clone(), v / self.resistance)]
    }

    fn clone_component(&self) -> Box<dyn Component> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Capacitor with a Norton companion model `(G_eq, I_eq)`.
#[derive(Debug, Clone)]
pub struct Capacitor {
    name: String,
    pos: NodeRef,
    neg: NodeRef,
    capacitance: f64,
    /// Explicit initial voltage; overrides the DC operating point.
    ic: Option<f64>,
    v_prev: f64,
    v_prev2: f64,
    g_eq: f64,
    i_eq: f64,
}

impl Capacitor {
    pub fn new(name: impl Into<String>, pos: &str, neg: &str, capacitance: f64) -> Self {
        Self {
            name: name.into(),
            pos: NodeRef::new(pos),
            neg: NodeRef::new(neg),
            capacitance,
            ic: None,
            v_prev: 0.0,
            v_prev2: 0.0,
            g_eq: 0.0,
            i_eq: 0.0,
        }
    }

    pub fn with_ic(mut self, v0: f64) -> Self {
        self.ic = Some(v0);
        self
    }

    /// Voltage across the capacitor at the last accepted step.
    pub fn voltage(&self) -> f64 {
        self.v_prev
    }
}

impl Component for Capacitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Reactive
    }

    fn analyze(&mut self, ctx: &mut AnalyzeContext) -> Result<()> {
        ctx.require_finite(&self.name, "capacitance", self.capacitance)?;
        self.pos.bind(ctx);
        self.neg.bind(ctx);
        Ok(())
    }

    fn stamp_linear(&self, sys: &mut McpSystem, _t: f64) {
        sys.stamp_conductance(self.pos.index, self.neg.index, self.g_eq);
        // I_eq injects into the positive node.
        sys.stamp_current_source(self.neg.index, self.pos.index, self.i_eq);
    }

    fn update_companion(&mut self, h: f64, method: IntegrationMethod, _step: usize) {
        let c_h = self.capacitance / h;
        match method {
            IntegrationMethod::BackwardEuler => {
                self.g_eq = c_h;
                self.i_eq = c_h * self.v_prev;
            }
            IntegrationMethod::Bdf2 => {
                self.g_eq = BDF2_LEAD * c_h;
                self.i_eq = c_h * (BDF2_H1 * self.v_prev + BDF2_H2 * self.v_prev2);
            }
        }
    }

    fn update_history(&mut self, sol: &Solution) {
        let v = sol.voltage(self.pos.index) - sol.voltage(self.neg.index);
        self.v_prev2 = self.v_prev;
        self.v_prev = v;
    }

    fn set_initial_state(&mut self, dc: &DcSeed) {
        let v0 = self
            .ic
            .unwrap_or_else(|| dc.voltage(&self.pos.name) - dc.voltage(&self.neg.name));
        self.v_prev = v0;
        self.v_prev2 = v0;
    }

    fn branch_currents(&self, sol: &Solution) -> Vec<(String, f64)> {
        let v = sol.voltage(self.pos.index) - sol.voltage(self.neg.index);
        vec![(self.name.clone(), self.g_eq * v - self.i_eq)]
    }

    fn clone_component(&self) -> Box<dyn Component> {
        Box::new(self.clone())
    }

    fn dc_clone(&self) -> Option<Box<dyn Component>> {
        // Open circuit at DC.
        None
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Inductor with a Thevenin companion model `(R_eq, V_eq)`.
///
/// Keeps its own current extra variable and stamps the branch row
/// `V(pos) - V(neg) - R_eq * I_L = V_eq`, so the inductor current is a first-
/// class unknown (and the DC rewrite degenerates to a 0 V source by zeroing
/// the companion).
#[derive(Debug, Clone)]
pub struct Inductor {
    name: String,
    pos: NodeRef,
    neg: NodeRef,
    inductance: f64,
    /// Explicit initial current; overrides the DC operating point.
    ic: Option<f64>,
    extra: usize,
    i_prev: f64,
    i_prev2: f64,
    r_eq: f64,
    v_eq: f64,
}

impl Inductor {
    pub fn new(name: impl Into<String>, pos: &str, neg: &str, inductance: f64) -> Self {
        Self {
            name: name.into(),
            pos: NodeRef::new(pos),
            neg: NodeRef::new(neg),
            inductance,
            ic: None,
            extra: 0,
            i_prev: 0.0,
            i_prev2: 0.0,
            r_eq: 0.0,
            v_eq: 0.0,
        }
    }

    pub fn with_ic(mut self, i0: f64) -> Self {
        self.ic = Some(i0);
        self
    }

    /// Inductor current at the last accepted step.
    pub fn current(&self) -> f64 {
        self.i_prev
    }
}

impl Component for Inductor {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Reactive
    }

    fn analyze(&mut self, ctx: &mut AnalyzeContext) -> Result<()> {
        ctx.require_finite(&self.name, "inductance", self.inductance)?;
        self.pos.bind(ctx);
        self.neg.bind(ctx);
        self.extra = ctx.alloc_extra();
        Ok(())
    }

    fn stamp_linear(&self, sys: &mut McpSystem, _t: f64) {
        sys.stamp_voltage_branch(self.extra, self.pos.index, self.neg.index, self.v_eq);
        let col = sys.extra_col(self.extra);
        sys.add_extra_row(self.extra, col, -self.r_eq);
    }

    fn update_companion(&mut self, h: f64, method: IntegrationMethod, _step: usize) {
        let l_h = self.inductance / h;
        match method {
            IntegrationMethod::BackwardEuler => {
                self.r_eq = l_h;
                self.v_eq = -l_h * self.i_prev;
            }
            IntegrationMethod::Bdf2 => {
                self.r_eq = BDF2_LEAD * l_h;
                self.v_eq = -l_h * (BDF2_H1 * self.i_prev + BDF2_H2 * self.i_prev2);
            }
        }
    }

    fn update_history(&mut self, sol: &Solution) {
        self.i_prev2 = self.i_prev;
        self.i_prev = sol.extra(self.extra);
    }

    fn set_initial_state(&mut self, dc: &DcSeed) {
        let i0 = self
            .ic
            .or_else(|| dc.current(&self.name))
            .unwrap_or(0.0);
        self.i_prev = i0;
        self.i_prev2 = i0;
    }

    fn branch_currents(&self, sol: &Solution) -> Vec<(String, f64)> {
        vec![(self.name.clone(), sol.extra(self.extra))]
    }

    fn clone_component(&self) -> Box<dyn Component> {
        Box::new(self.clone())
    }

    fn dc_clone(&self) -> Option<Box<dyn Component>> {
        // Short circuit at DC: a 0 V source under the inductor's own name, so
        // the DC current lands under the same result key.
        Some(Box::new(VoltageSource::new(
            self.name.clone(),
            &self.pos.name,
            &self.neg.name,
            Waveform::dc(0.0),
        )))
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Two magnetically coupled windings with mutual inductance `M = k * sqrt(L1*L2)`.
///
/// Both winding currents are extra variables; the companion stamps the full
/// 2x2 inductance matrix so energy transfer between windings is implicit.
#[derive(Debug, Clone)]
pub struct CoupledInductors {
    name: String,
    pos1: NodeRef,
    neg1: NodeRef,
    pos2: NodeRef,
    neg2: NodeRef,
    l1: f64,
    l2: f64,
    mutual: f64,
    extra1: usize,
    extra2: usize,
    i1_prev: f64,
    i1_prev2: f64,
    i2_prev: f64,
    i2_prev2: f64,
    // Companion coefficients: [r11 r12; r12 r22] and the two history voltages.
    r11: f64,
    r12: f64,
    r22: f64,
    v_eq1: f64,
    v_eq2: f64,
}

impl CoupledInductors {
    pub fn new(
        name: impl Into<String>,
        primary: (&str, &str),
        secondary: (&str, &str),
        l1: f64,
        l2: f64,
        coupling: f64,
    ) -> Self {
        Self {
            name: name.into(),
            pos1: NodeRef::new(primary.0),
            neg1: NodeRef::new(primary.1),
            pos2: NodeRef::new(secondary.0),
            neg2: NodeRef::new(secondary.1),
            l1,
            l2,
            mutual: coupling * (l1 * l2).sqrt(),
            extra1: 0,
            extra2: 0,
            i1_prev: 0.0,
            i1_prev2: 0.0,
            i2_prev: 0.0,
            i2_prev2: 0.0,
            r11: 0.0,
            r12: 0.0,
            r22: 0.0,
            v_eq1: 0.0,
            v_eq2: 0.0,
        }
    }

    fn winding_key(&self, winding: usize) -> String {
        format!("{}:{}", self.name, winding)
    }
}

impl Component for CoupledInductors {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Reactive
    }

    fn analyze(&mut self, ctx: &mut AnalyzeContext) -> Result<()> {
        ctx.require_finite(&self.name, "l1", self.l1)?;
        ctx.require_finite(&self.name, "l2", self.l2)?;
        ctx.require_finite(&self.name, "mutual", self.mutual)?;
        if self.mutual * self.mutual >= self.l1 * self.l2 {
            return Err(switchsim_core::Error::InvalidInput(format!(
                "{}: coupling coefficient must be below 1",
                self.name
            )));
        }
        self.pos1.bind(ctx);
        self.neg1.bind(ctx);
        self.pos2.bind(ctx);
        self.neg2.bind(ctx);
        self.extra1 = ctx.alloc_extra();
        self.extra2 = ctx.alloc_extra();
        Ok(())
    }

    fn stamp_linear(&self, sys: &mut McpSystem, _t: f64) {
        sys.stamp_voltage_branch(self.extra1, self.pos1.index, self.neg1.index, self.v_eq1);
        sys.stamp_voltage_branch(self.extra2, self.pos2.index, self.neg2.index, self.v_eq2);

        let col1 = sys.extra_col(self.extra1);
        let col2 = sys.extra_col(self.extra2);
        sys.add_extra_row(self.extra1, col1, -self.r11);
        sys.add_extra_row(self.extra1, col2, -self.r12);
        sys.add_extra_row(self.extra2, col1, -self.r12);
        sys.add_extra_row(self.extra2, col2, -self.r22);
    }

    fn update_companion(&mut self, h: f64, method: IntegrationMethod, _step: usize) {
        let (lead, h1, h2) = match method {
            IntegrationMethod::BackwardEuler => (1.0, 1.0, 0.0),
            IntegrationMethod::Bdf2 => (BDF2_LEAD, BDF2_H1, BDF2_H2),
        };
        self.r11 = lead * self.l1 / h;
        self.r12 = lead * self.mutual / h;
        self.r22 = lead * self.l2 / h;

        let hist1 = h1 * self.i1_prev + h2 * self.i1_prev2;
        let hist2 = h1 * self.i2_prev + h2 * self.i2_prev2;
        self.v_eq1 = -(self.l1 * hist1 + self.mutual * hist2) / h;
        self.v_eq2 = -(self.mutual * hist1 + self.l2 * hist2) / h;
    }

    fn update_history(&mut self, sol: &Solution) {
        self.i1_prev2 = self.i1_prev;
        self.i2_prev2 = self.i2_prev;
        self.i1_prev = sol.extra(self.extra1);
        self.i2_prev = sol.extra(self.extra2);
    }

    fn set_initial_state(&mut self, dc: &DcSeed) {
        let i1 = dc.current(&self.winding_key(1)).unwrap_or(0.0);
        let i2 = dc.current(&self.winding_key(2)).unwrap_or(0.0);
        self.i1_prev = i1;
        self.i1_prev2 = i1;
        self.i2_prev = i2;
        self.i2_prev2 = i2;
    }

    fn branch_currents(&self, sol: &Solution) -> Vec<(String, f64)> {
        vec![
            (self.winding_key(1), sol.extra(self.extra1)),
            (self.winding_key(2), sol.extra(self.extra2)),
        ]
    }

    fn clone_component(&self) -> Box<dyn Component> {
        Box::new(self.clone())
    }

    fn dc_clone(&self) -> Option<Box<dyn Component>> {
        // Both windings short at DC: a fresh clone's companion is all zeros,
        // which degenerates each branch row to V(pos) - V(neg) = 0.
        let mut dc = self.clone();
        dc.r11 = 0.0;
        dc.r12 = 0.0;
        dc.r22 = 0.0;
        dc.v_eq1 = 0.0;
        dc.v_eq2 = 0.0;
        Some(Box::new(dc))
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

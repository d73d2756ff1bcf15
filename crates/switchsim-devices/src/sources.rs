//! Independent sources.

use switchsim_core::{
    AnalyzeContext, Component, ComponentKind, McpSystem, NodeRef, Result, Solution,
};

use crate::waveforms::Waveform;

/// Independent voltage source `V(pos) - V(neg) = value(t)`.
///
/// Owns one branch-current extra variable (classical MNA extension). The
/// branch current is positive flowing from `pos` through the source to `neg`,
/// so a source delivering power reports a negative current — the SPICE
/// convention.
#[derive(Debug, Clone)]
pub struct VoltageSource {
    name: String,
    pos: NodeRef,
    neg: NodeRef,
    waveform: Waveform,
    value: f64,
    extra: usize,
}

impl VoltageSource {
    pub fn new(name: impl Into<String>, pos: &str, neg: &str, waveform: Waveform) -> Self {
        let value = waveform.value_at(0.0);
        Self {
            name: name.into(),
            pos: NodeRef::new(pos),
            neg: NodeRef::new(neg),
            waveform,
            value,
            extra: 0,
        }
    }

    pub fn dc(name: impl Into<String>, pos: &str, neg: &str, volts: f64) -> Self {
        Self::new(name, pos, neg, Waveform::dc(volts))
    }
}

impl Component for VoltageSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Source
    }

    fn analyze(&mut self, ctx: &mut AnalyzeContext) -> Result<()> {
        for value in self.waveform.params() {
            ctx.require_finite(&self.name, "waveform", value)?;
        }
        self.pos.bind(ctx);
        self.neg.bind(ctx);
        self.extra = ctx.alloc_extra();
        Ok(())
    }

    fn stamp_linear(&self, sys: &mut McpSystem, _t: f64) {
        sys.stamp_voltage_branch(self.extra, self.pos.index, self.neg.index, self.value);
    }

    fn update_time_varying(&mut self, t: f64) {
        self.value = self.waveform.value_at(t);
    }

    fn branch_currents(&self, sol: &Solution) -> Vec<(String, f64)> {
        vec![(self.name.clone(), sol.extra(self.extra))]
    }

    fn clone_component(&self) -> Box<dyn Component> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Independent current source driving `value(t)` from `pos` to `neg` through
/// the source. Contributes to the right-hand side only.
#[derive(Debug, Clone)]
pub struct CurrentSource {
    name: String,
    pos: NodeRef,
    neg: NodeRef,
    waveform: Waveform,
    value: f64,
}

impl CurrentSource {
    pub fn new(name: impl Into<String>, pos: &str, neg: &str, waveform: Waveform) -> Self {
        let value = waveform.value_at(0.0);
        Self {
            name: name.into(),
            pos: NodeRef::new(pos),
            neg: NodeRef::new(neg),
            waveform,
            value,
        }
    }

    pub fn dc(name: impl Into<String>, pos: &str, neg: &str, amps: f64) -> Self {
        Self::new(name, pos, neg, Waveform::dc(amps))
    }
}

impl Component for CurrentSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Source
    }

    fn analyze(&mut self, ctx: &mut AnalyzeContext) -> Result<()> {
        for value in self.waveform.params() {
            ctx.require_finite(&self.name, "waveform", value)?;
        }
        self.pos.bind(ctx);
        self.neg.bind(ctx);
        Ok(())
    }

    fn stamp_linear(&self, sys: &mut McpSystem, _t: f64) {
        sys.stamp_current_source(self.pos.index, self.neg.index, self.value);
    }

    fn update_time_varying(&mut self, t: f64) {
        self.value = self.waveform.value_at(t);
    }

    fn branch_currents(&self, _sol: &Solution) -> Vec<(String, f64)> {
        vec![(self.name.clone(), self.value)]
    }

    fn clone_component(&self) -> Box<dyn Component> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

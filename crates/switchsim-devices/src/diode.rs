//! LCP-controlled ideal diode.
//!
//! The diode is either conducting with forward drop `v_f + r_on * i` or
//! blocking with zero current. Smoothing-free: the current is a non-negative
//! `z` variable and the reverse-voltage margin is its complementary slack
//! `w = v_f + r_on * i - (V(anode) - V(cathode))`, stamped through the
//! `w = -(C u + D z + q)` convention of the assembled system.

use switchsim_core::{
    AnalyzeContext, Component, ComponentKind, LcpContext, LcpHandle, McpSystem, NodeRef, Result,
    Solution,
};

/// Default forward threshold voltage (V).
pub const DEFAULT_VF: f64 = 0.7;
/// Default on-state series resistance (Ohm).
pub const DEFAULT_RON: f64 = 1e-3;

/// Ideal complementarity diode.
#[derive(Debug, Clone)]
pub struct Diode {
    name: String,
    anode: NodeRef,
    cathode: NodeRef,
    v_f: f64,
    r_on: f64,
    handle: Option<LcpHandle>,
}

impl Diode {
    pub fn new(name: impl Into<String>, anode: &str, cathode: &str) -> Self {
        Self {
            name: name.into(),
            anode: NodeRef::new(anode),
            cathode: NodeRef::new(cathode),
            v_f: DEFAULT_VF,
            r_on: DEFAULT_RON,
            handle: None,
        }
    }

    pub fn with_vf(mut self, v_f: f64) -> Self {
        self.v_f = v_f;
        self
    }

    pub fn with_ron(mut self, r_on: f64) -> Self {
        self.r_on = r_on;
        self
    }
}

impl Component for Diode {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Switch
    }

    fn analyze(&mut self, ctx: &mut AnalyzeContext) -> Result<()> {
        ctx.require_finite(&self.name, "v_f", self.v_f)?;
        ctx.require_finite(&self.name, "r_on", self.r_on)?;
        self.anode.bind(ctx);
        self.cathode.bind(ctx);
        Ok(())
    }

    fn register_lcp(&mut self, ctx: &mut LcpContext) {
        self.handle = Some(ctx.alloc_pair());
    }

    fn stamp_lcp(&self, sys: &mut McpSystem, _t: f64) {
        let h = self.handle.expect("register_lcp must run before stamping");

        // Diode current (anode -> cathode, non-negative) into the KCL rows.
        sys.stamp_incidence(h.extra, self.anode.index, self.cathode.index);

        // Complementarity functional: C has the bias voltage, D the series
        // drop, q the threshold.
        sys.add_c_node(h.row, self.anode.index, 1.0);
        sys.add_c_node(h.row, self.cathode.index, -1.0);
        sys.add_d(h.row, h.row, -self.r_on);
        sys.add_q(h.row, -self.v_f);
    }

    fn branch_currents(&self, sol: &Solution) -> Vec<(String, f64)> {
        let h = self.handle.expect("register_lcp must run before readout");
        vec![(self.name.clone(), sol.extra(h.extra))]
    }

    fn clone_component(&self) -> Box<dyn Component> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

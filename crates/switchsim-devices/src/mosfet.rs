//! Power MOSFET: gated ideal channel plus LCP body diode.
//!
//! The channel current is an MNA extra with the branch row
//! `V(drain) - V(source) - R * I_ch = 0`, where `R` switches between `r_on`
//! and `r_off` with the gate state. The body diode conducts source -> drain
//! and is mapped directly into its complementarity row — it owns no auxiliary
//! slack unknown in the MNA block.

use switchsim_core::{
    AnalyzeContext, Component, ComponentKind, LcpContext, LcpHandle, McpSystem, NodeRef, Result,
    Solution,
};

/// Default channel on-resistance (Ohm).
pub const DEFAULT_RON: f64 = 1e-3;
/// Default channel off-resistance (Ohm). The `r_off / r_on` ratio of 1e12 is
/// the dynamic range the LCP solver is required to tolerate.
pub const DEFAULT_ROFF: f64 = 1e9;

/// How the gate state is determined.
#[derive(Debug, Clone)]
pub enum GateDrive {
    /// Externally controlled, toggled between steps (stepped mode).
    Logic(bool),
    /// Free-running PWM clock evaluated against simulation time.
    Pwm { frequency: f64, duty: f64, delay: f64 },
    /// Derived from `V(gate) - V(source)` against a threshold, latched from
    /// the previous accepted step.
    Node { gate: NodeRef, threshold: f64 },
}

/// Body-diode parameters.
#[derive(Debug, Clone, Copy)]
pub struct BodyDiode {
    pub v_f: f64,
    pub r_on: f64,
}

impl Default for BodyDiode {
    fn default() -> Self {
        Self {
            v_f: crate::diode::DEFAULT_VF,
            r_on: crate::diode::DEFAULT_RON,
        }
    }
}

/// N-channel power MOSFET with body diode.
#[derive(Debug, Clone)]
pub struct Mosfet {
    name: String,
    drain: NodeRef,
    source: NodeRef,
    drive: GateDrive,
    r_on: f64,
    r_off: f64,
    body: BodyDiode,
    gate_on: bool,
    channel_extra: usize,
    body_handle: Option<LcpHandle>,
}

impl Mosfet {
    pub fn new(name: impl Into<String>, drain: &str, source: &str, drive: GateDrive) -> Self {
        let gate_on = matches!(drive, GateDrive::Logic(true));
        Self {
            name: name.into(),
            drain: NodeRef::new(drain),
            source: NodeRef::new(source),
            drive,
            r_on: DEFAULT_RON,
            r_off: DEFAULT_ROFF,
            body: BodyDiode::default(),
            gate_on,
            channel_extra: 0,
            body_handle: None,
        }
    }

    pub fn with_ron(mut self, r_on: f64) -> Self {
        self.r_on = r_on;
        self
    }

    pub fn with_roff(mut self, r_off: f64) -> Self {
        self.r_off = r_off;
        self
    }

    pub fn with_body_diode(mut self, body: BodyDiode) -> Self {
        self.body = body;
        self
    }

    /// Current gate state.
    pub fn gate_on(&self) -> bool {
        self.gate_on
    }

    /// Toggle an externally controlled gate. Only meaningful between steps.
    pub fn set_gate(&mut self, on: bool) {
        self.drive = GateDrive::Logic(on);
        self.gate_on = on;
    }

    fn channel_resistance(&self) -> f64 {
        if self.gate_on { self.r_on } else { self.r_off }
    }

    fn channel_key(&self) -> String {
        format!("{}:chan", self.name)
    }

    fn body_key(&self) -> String {
        format!("{}:body", self.name)
    }
}

impl Component for Mosfet {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Switch
    }

    fn analyze(&mut self, ctx: &mut AnalyzeContext) -> Result<()> {
        ctx.require_finite(&self.name, "r_on", self.r_on)?;
        ctx.require_finite(&self.name, "r_off", self.r_off)?;
        ctx.require_finite(&self.name, "body.v_f", self.body.v_f)?;
        ctx.require_finite(&self.name, "body.r_on", self.body.r_on)?;
        self.drain.bind(ctx);
        self.source.bind(ctx);
        if let GateDrive::Node { gate, .. } = &mut self.drive {
            gate.bind(ctx);
        }
        self.channel_extra = ctx.alloc_extra();
        Ok(())
    }

    fn register_lcp(&mut self, ctx: &mut LcpContext) {
        self.body_handle = Some(ctx.alloc_pair());
    }

    fn stamp_lcp(&self, sys: &mut McpSystem, _t: f64) {
        // Channel: incidence drain -> source plus the branch row
        // V(d) - V(s) - R * I_ch = 0.
        sys.stamp_incidence(self.channel_extra, self.drain.index, self.source.index);
        if let Some(i) = self.drain.index {
            sys.add_extra_row(self.channel_extra, i, 1.0);
        }
        if let Some(i) = self.source.index {
            sys.add_extra_row(self.channel_extra, i, -1.0);
        }
        let ch_col = sys.extra_col(self.channel_extra);
        sys.add_extra_row(self.channel_extra, ch_col, -self.channel_resistance());

        // Body diode: source -> drain, complementarity-mapped.
        let h = self.body_handle.expect("register_lcp must run before stamping");
        sys.stamp_incidence(h.extra, self.source.index, self.drain.index);
        sys.add_c_node(h.row, self.source.index, 1.0);
        sys.add_c_node(h.row, self.drain.index, -1.0);
        sys.add_d(h.row, h.row, -self.body.r_on);
        sys.add_q(h.row, -self.body.v_f);
    }

    fn update_time_varying(&mut self, t: f64) {
        if let GateDrive::Pwm {
            frequency,
            duty,
            delay,
        } = self.drive
        {
            let tau = t - delay;
            if tau < 0.0 || frequency <= 0.0 {
                self.gate_on = false;
            } else {
                let period = 1.0 / frequency;
                let phase = (tau % period) / period;
                self.gate_on = phase < duty;
            }
        }
    }

    fn update_history(&mut self, sol: &Solution) {
        if let GateDrive::Node { gate, threshold } = &self.drive {
            let v_gs = sol.voltage(gate.index) - sol.voltage(self.source.index);
            self.gate_on = v_gs > *threshold;
        }
    }

    fn branch_currents(&self, sol: &Solution) -> Vec<(String, f64)> {
        let h = self.body_handle.expect("register_lcp must run before readout");
        vec![
            (self.channel_key(), sol.extra(self.channel_extra)),
            (self.body_key(), sol.extra(h.extra)),
        ]
    }

    fn clone_component(&self) -> Box<dyn Component> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

//! Transformer meta-component.
//!
//! A transformer is not a primitive: before analysis the driver replaces it
//! with the coupled-inductor pair it decomposes into, so the assembler only
//! ever sees primitive elements.

use switchsim_core::{AnalyzeContext, Component, ComponentKind, Error, Result};

use crate::passive::CoupledInductors;

/// Ideal-core two-winding transformer described by magnetizing inductance and
/// turns ratio `n = N_secondary / N_primary`.
#[derive(Debug, Clone)]
pub struct Transformer {
    name: String,
    primary: (String, String),
    secondary: (String, String),
    /// Primary (magnetizing) inductance (H).
    l_primary: f64,
    /// Turns ratio secondary : primary.
    turns_ratio: f64,
    /// Coupling coefficient, strictly below 1.
    coupling: f64,
}

impl Transformer {
    pub fn new(
        name: impl Into<String>,
        primary: (&str, &str),
        secondary: (&str, &str),
        l_primary: f64,
        turns_ratio: f64,
    ) -> Self {
        Self {
            name: name.into(),
            primary: (primary.0.to_string(), primary.1.to_string()),
            secondary: (secondary.0.to_string(), secondary.1.to_string()),
            l_primary,
            turns_ratio,
            coupling: 0.999,
        }
    }

    pub fn with_coupling(mut self, coupling: f64) -> Self {
        self.coupling = coupling;
        self
    }
}

impl Component for Transformer {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ComponentKind {
        ComponentKind::Reactive
    }

    fn analyze(&mut self, _ctx: &mut AnalyzeContext) -> Result<()> {
        Err(Error::InvalidInput(format!(
            "{}: transformer must be flattened before analysis",
            self.name
        )))
    }

    fn get_components(&self) -> Option<Vec<Box<dyn Component>>> {
        let l2 = self.l_primary * self.turns_ratio * self.turns_ratio;
        Some(vec![Box::new(CoupledInductors::new(
            self.name.clone(),
            (self.primary.0.as_str(), self.primary.1.as_str()),
            (self.secondary.0.as_str(), self.secondary.1.as_str()),
            self.l_primary,
            l2,
            self.coupling,
        ))])
    }

    fn clone_component(&self) -> Box<dyn Component> {
        Box::new(self.clone())
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

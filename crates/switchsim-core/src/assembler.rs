//! Two-pass MNA+LCP assembly.
//!
//! Pass 1 (`analyze`) interns every non-ground node and hands out MNA extra
//! variables; pass 2 (`register_lcp`) hands out complementarity rows and their
//! `z` extras. After both passes the sizes `N`, `E`, `K` are final and
//! [`Assembler::build`] produces a freshly zeroed [`McpSystem`] for any time
//! point. Matrices are rebuilt from zero each step; components only ever see
//! index handles.

use std::collections::HashSet;

use crate::component::Component;
use crate::error::{Error, Result};
use crate::nodes::NodeMap;
use crate::system::McpSystem;

/// Context handed to components during the analyze pass.
#[derive(Debug, Default)]
pub struct AnalyzeContext {
    nodes: NodeMap,
    num_extras: usize,
}

impl AnalyzeContext {
    /// Intern a node name. Ground maps to `None`.
    pub fn bind_node(&mut self, name: &str) -> Option<usize> {
        self.nodes.intern(name)
    }

    /// Claim one MNA extra variable (a branch-current unknown) and return its
    /// relative index.
    pub fn alloc_extra(&mut self) -> usize {
        let extra = self.num_extras;
        self.num_extras += 1;
        extra
    }

    /// Reject a non-finite device parameter.
    pub fn require_finite(&self, component: &str, param: &str, value: f64) -> Result<()> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!(
                "{component}: parameter {param} is not finite"
            )))
        }
    }
}

/// Context handed to switches during the register-LCP pass.
#[derive(Debug)]
pub struct LcpContext {
    num_extras: usize,
    pair_extras: Vec<usize>,
}

impl LcpContext {
    /// Claim one complementarity pair: a `w` row and its `z` extra variable.
    pub fn alloc_pair(&mut self) -> crate::component::LcpHandle {
        let row = self.pair_extras.len();
        let extra = self.num_extras;
        self.num_extras += 1;
        self.pair_extras.push(extra);
        crate::component::LcpHandle { row, extra }
    }
}

/// Frozen sizing and index tables for one component list.
#[derive(Debug)]
pub struct Assembler {
    nodes: NodeMap,
    num_extras: usize,
    pair_extras: Vec<usize>,
}

impl Assembler {
    /// Run the analyze and register-LCP passes over a flattened component
    /// list. Fails with `InvalidInput` on duplicate component names or device
    /// parameter problems.
    pub fn analyze(components: &mut [Box<dyn Component>]) -> Result<Self> {
        let mut seen = HashSet::new();
        for component in components.iter() {
            if !seen.insert(component.name().to_string()) {
                return Err(Error::InvalidInput(format!(
                    "duplicate component name: {}",
                    component.name()
                )));
            }
        }

        let mut actx = AnalyzeContext::default();
        for component in components.iter_mut() {
            component.analyze(&mut actx)?;
        }

        let mut lctx = LcpContext {
            num_extras: actx.num_extras,
            pair_extras: Vec::new(),
        };
        for component in components.iter_mut() {
            component.register_lcp(&mut lctx);
        }

        Ok(Self {
            nodes: actx.nodes,
            num_extras: lctx.num_extras,
            pair_extras: lctx.pair_extras,
        })
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_extras(&self) -> usize {
        self.num_extras
    }

    pub fn num_lcp(&self) -> usize {
        self.pair_extras.len()
    }

    /// Total unknown count `S = N + E`.
    pub fn size(&self) -> usize {
        self.nodes.len() + self.num_extras
    }

    pub fn node_map(&self) -> &NodeMap {
        &self.nodes
    }

    /// Assemble the augmented system at time `t`. The system is zeroed, gmin
    /// is applied to the node rows, then components stamp in the fixed order:
    /// linear first, LCP second.
    pub fn build(&self, components: &[Box<dyn Component>], t: f64, gmin: f64) -> McpSystem {
        let lcp_cols = self
            .pair_extras
            .iter()
            .map(|&extra| self.nodes.len() + extra)
            .collect();
        let mut sys = McpSystem::new(self.nodes.len(), self.num_extras, lcp_cols);
        sys.apply_gmin(gmin);

        for component in components {
            component.stamp_linear(&mut sys, t);
        }
        for component in components {
            component.stamp_lcp(&mut sys, t);
        }
        sys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentKind, NodeRef};

    /// Minimal two-terminal conductance used to exercise the passes.
    struct TestConductance {
        name: String,
        pos: NodeRef,
        neg: NodeRef,
        g: f64,
    }

    impl Component for TestConductance {
        fn name(&self) -> &str {
            &self.name
        }

        fn kind(&self) -> ComponentKind {
            ComponentKind::Linear
        }

        fn analyze(&mut self, ctx: &mut AnalyzeContext) -> Result<()> {
            ctx.require_finite(&self.name, "g", self.g)?;
            self.pos.bind(ctx);
            self.neg.bind(ctx);
            Ok(())
        }

        fn stamp_linear(&self, sys: &mut McpSystem, _t: f64) {
            sys.stamp_conductance(self.pos.index, self.neg.index, self.g);
        }

        fn clone_component(&self) -> Box<dyn Component> {
            Box::new(TestConductance {
                name: self.name.clone(),
                pos: self.pos.clone(),
                neg: self.neg.clone(),
                g: self.g,
            })
        }

        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    }

    fn conductance(name: &str, pos: &str, neg: &str, g: f64) -> Box<dyn Component> {
        Box::new(TestConductance {
            name: name.to_string(),
            pos: NodeRef::new(pos),
            neg: NodeRef::new(neg),
            g,
        })
    }

    #[test]
    fn test_analyze_assigns_node_indices() {
        let mut comps = vec![
            conductance("R1", "in", "out", 1.0),
            conductance("R2", "out", "0", 1.0),
        ];
        let asm = Assembler::analyze(&mut comps).unwrap();

        assert_eq!(asm.num_nodes(), 2);
        assert_eq!(asm.node_map().get("in"), Some(0));
        assert_eq!(asm.node_map().get("out"), Some(1));
        assert_eq!(asm.num_extras(), 0);
        assert_eq!(asm.num_lcp(), 0);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut comps = vec![
            conductance("R1", "a", "0", 1.0),
            conductance("R1", "b", "0", 1.0),
        ];
        let result = Assembler::analyze(&mut comps);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_non_finite_parameter_rejected() {
        let mut comps = vec![conductance("R1", "a", "0", f64::NAN)];
        let result = Assembler::analyze(&mut comps);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_build_applies_gmin_and_stamps() {
        let mut comps = vec![conductance("R1", "a", "0", 0.5)];
        let asm = Assembler::analyze(&mut comps).unwrap();
        let sys = asm.build(&comps, 0.0, 1e-9);

        assert!(
            (sys.a()[(0, 0)] - (0.5 + 1e-9)).abs() < 1e-18,
            "diagonal = {} (expected conductance + gmin)",
            sys.a()[(0, 0)]
        );
    }
}

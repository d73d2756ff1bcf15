//! Result sink and run statistics.
//!
//! Append-only: one time stamp per accepted step, with a parallel sample
//! vector per node voltage and per named branch current.

use std::collections::HashMap;

use serde::Serialize;

/// Counters accumulated over a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SolverStats {
    /// Accepted transient steps.
    pub total_steps: u64,
    /// Steps that failed and aborted the run.
    pub failed_steps: u64,
    /// LCP solves performed (steps with at least one complementarity pair).
    pub lcp_solves: u64,
    /// Pivot/barrier iterations summed over all LCP solves.
    pub lcp_iterations_total: u64,
    /// Largest single-solve iteration count.
    pub lcp_iterations_max: u32,
}

impl SolverStats {
    pub(crate) fn record_lcp(&mut self, iterations: u32) {
        self.lcp_solves += 1;
        self.lcp_iterations_total += u64::from(iterations);
        self.lcp_iterations_max = self.lcp_iterations_max.max(iterations);
    }

    /// Mean LCP iterations per solve.
    pub fn avg_lcp_iterations(&self) -> f64 {
        if self.lcp_solves == 0 {
            0.0
        } else {
            self.lcp_iterations_total as f64 / self.lcp_solves as f64
        }
    }
}

/// Run metadata attached to a [`SimResult`].
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisInfo {
    /// Integration method name.
    pub method: String,
    /// Wall-clock duration of the run (s).
    pub execution_time: f64,
    pub stats: SolverStats,
}

/// Time-indexed simulation output.
#[derive(Debug, Clone, Serialize)]
pub struct SimResult {
    time: Vec<f64>,
    voltages: HashMap<String, Vec<f64>>,
    currents: HashMap<String, Vec<f64>>,
    /// Set when the run was cancelled before reaching the stop time.
    pub truncated: bool,
    pub info: AnalysisInfo,
}

impl SimResult {
    pub(crate) fn new(method: &str, node_names: Vec<String>, current_names: Vec<String>) -> Self {
        Self {
            time: Vec::new(),
            voltages: node_names.into_iter().map(|n| (n, Vec::new())).collect(),
            currents: current_names.into_iter().map(|n| (n, Vec::new())).collect(),
            truncated: false,
            info: AnalysisInfo {
                method: method.to_string(),
                execution_time: 0.0,
                stats: SolverStats::default(),
            },
        }
    }

    /// Append one sample set. Every registered key must be present so the
    /// sample vectors stay parallel to the time vector.
    pub(crate) fn add_time_point(
        &mut self,
        t: f64,
        node_voltages: &[(String, f64)],
        branch_currents: &[(String, f64)],
    ) {
        self.time.push(t);
        for (name, value) in node_voltages {
            self.voltages
                .entry(name.clone())
                .or_default()
                .push(*value);
        }
        for (name, value) in branch_currents {
            self.currents
                .entry(name.clone())
                .or_default()
                .push(*value);
        }
        debug_assert!(
            self.voltages.values().all(|v| v.len() == self.time.len()),
            "voltage vectors out of step with the time vector"
        );
    }

    /// Voltage samples for a node.
    pub fn get_voltage(&self, node: &str) -> Option<&[f64]> {
        self.voltages.get(node).map(Vec::as_slice)
    }

    /// Current samples for a named branch.
    pub fn get_current(&self, branch: &str) -> Option<&[f64]> {
        self.currents.get(branch).map(Vec::as_slice)
    }

    /// The time stamps, in strictly increasing order.
    pub fn get_time_vector(&self) -> &[f64] {
        &self.time
    }

    /// Number of stored time points.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Index of the stored point closest to `t`.
    pub fn index_at(&self, t: f64) -> Option<usize> {
        if self.time.is_empty() {
            return None;
        }
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (i, &ti) in self.time.iter().enumerate() {
            let dist = (ti - t).abs();
            if dist < best_dist {
                best_dist = dist;
                best = i;
            }
        }
        Some(best)
    }
}

//! The per-step augmented MNA+LCP system and its stamp helpers.
//!
//! Unknowns are ordered node voltages first (`0..N-1`), then extra variables
//! (`N..N+E-1`). Extra variables carry currents through voltage-defining
//! branches (sources, inductors, switch channels) and the LCP-controlled
//! diode currents. A subset of the extra columns — one per complementarity
//! pair, in pair order — forms the `z` vector of the embedded LCP.
//!
//! Slack convention, enforced everywhere: `w = -(C·u + D·z + q)` with `u` the
//! full unknown vector, subject to `w ⊥ z`, `w, z ≥ 0`.

use nalgebra::{DMatrix, DVector};

/// The augmented system assembled for one time step (or one DC solve).
#[derive(Debug, Clone)]
pub struct McpSystem {
    /// Number of non-ground nodes `N`.
    pub num_nodes: usize,
    /// Number of extra variables `E` (MNA currents plus LCP `z` variables).
    pub num_extras: usize,
    a: DMatrix<f64>,
    b: DVector<f64>,
    c: DMatrix<f64>,
    d: DMatrix<f64>,
    q: DVector<f64>,
    /// Absolute column of each pair's `z` variable, in pair order.
    lcp_cols: Vec<usize>,
}

impl McpSystem {
    /// Create a zeroed system of `num_nodes + num_extras` unknowns with
    /// `lcp_cols.len()` complementarity rows.
    pub fn new(num_nodes: usize, num_extras: usize, lcp_cols: Vec<usize>) -> Self {
        let size = num_nodes + num_extras;
        let k = lcp_cols.len();
        Self {
            num_nodes,
            num_extras,
            a: DMatrix::zeros(size, size),
            b: DVector::zeros(size),
            c: DMatrix::zeros(k, size),
            d: DMatrix::zeros(k, k),
            q: DVector::zeros(k),
            lcp_cols,
        }
    }

    /// Total unknown count `S = N + E`.
    pub fn size(&self) -> usize {
        self.num_nodes + self.num_extras
    }

    /// Number of complementarity pairs `K`.
    pub fn num_lcp(&self) -> usize {
        self.lcp_cols.len()
    }

    /// Absolute column index of an extra variable.
    pub fn extra_col(&self, extra: usize) -> usize {
        self.num_nodes + extra
    }

    /// Absolute `z` columns in pair order.
    pub fn lcp_cols(&self) -> &[usize] {
        &self.lcp_cols
    }

    /// Add `gmin` to the diagonal of every node-voltage row. Guarantees a
    /// conduction path to ground for floating subnets.
    pub fn apply_gmin(&mut self, gmin: f64) {
        for i in 0..self.num_nodes {
            self.a[(i, i)] += gmin;
        }
    }

    // ── A / b stamps ──────────────────────────────────────────────

    pub fn add_a(&mut self, row: usize, col: usize, value: f64) {
        self.a[(row, col)] += value;
    }

    pub fn add_b(&mut self, row: usize, value: f64) {
        self.b[row] += value;
    }

    /// Stamp a conductance between two nodes (`None` = ground).
    pub fn stamp_conductance(&mut self, n1: Option<usize>, n2: Option<usize>, g: f64) {
        if let Some(i) = n1 {
            self.a[(i, i)] += g;
        }
        if let Some(j) = n2 {
            self.a[(j, j)] += g;
        }
        if let (Some(i), Some(j)) = (n1, n2) {
            self.a[(i, j)] -= g;
            self.a[(j, i)] -= g;
        }
    }

    /// Stamp a current source driving `current` from `from` to `to` through
    /// the external circuit: the current leaves `from` and enters `to`.
    pub fn stamp_current_source(&mut self, from: Option<usize>, to: Option<usize>, current: f64) {
        if let Some(i) = from {
            self.b[i] -= current;
        }
        if let Some(j) = to {
            self.b[j] += current;
        }
    }

    /// Stamp the ±1 incidence of an extra current into the KCL rows of its two
    /// nodes. Positive current flows from `from` to `to` through the branch.
    pub fn stamp_incidence(&mut self, extra: usize, from: Option<usize>, to: Option<usize>) {
        let col = self.extra_col(extra);
        if let Some(i) = from {
            self.a[(i, col)] += 1.0;
        }
        if let Some(j) = to {
            self.a[(j, col)] -= 1.0;
        }
    }

    /// Coefficient in an extra variable's own defining row.
    pub fn add_extra_row(&mut self, extra: usize, col: usize, value: f64) {
        let row = self.extra_col(extra);
        self.a[(row, col)] += value;
    }

    /// Right-hand side of an extra variable's defining row.
    pub fn add_extra_rhs(&mut self, extra: usize, value: f64) {
        let row = self.extra_col(extra);
        self.b[row] += value;
    }

    /// Stamp a voltage-defining branch: incidence into the KCL rows plus the
    /// KVL row `V(pos) - V(neg) = value` in the extra's own row.
    pub fn stamp_voltage_branch(
        &mut self,
        extra: usize,
        pos: Option<usize>,
        neg: Option<usize>,
        value: f64,
    ) {
        self.stamp_incidence(extra, pos, neg);
        if let Some(i) = pos {
            self.add_extra_row(extra, i, 1.0);
        }
        if let Some(j) = neg {
            self.add_extra_row(extra, j, -1.0);
        }
        self.add_extra_rhs(extra, value);
    }

    // ── C / D / q stamps (complementarity rows) ───────────────────

    /// Coefficient of a node voltage in complementarity row `row`.
    pub fn add_c_node(&mut self, row: usize, node: Option<usize>, value: f64) {
        if let Some(i) = node {
            self.c[(row, i)] += value;
        }
    }

    /// Coefficient of an extra variable in complementarity row `row`.
    pub fn add_c_extra(&mut self, row: usize, extra: usize, value: f64) {
        let col = self.num_nodes + extra;
        self.c[(row, col)] += value;
    }

    /// Coefficient of pair `pair`'s `z` variable in complementarity row `row`.
    pub fn add_d(&mut self, row: usize, pair: usize, value: f64) {
        self.d[(row, pair)] += value;
    }

    /// Constant term of complementarity row `row`.
    pub fn add_q(&mut self, row: usize, value: f64) {
        self.q[row] += value;
    }

    // ── read access for the reducer ───────────────────────────────

    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    pub fn rhs(&self) -> &DVector<f64> {
        &self.b
    }

    pub fn c(&self) -> &DMatrix<f64> {
        &self.c
    }

    pub fn d(&self) -> &DMatrix<f64> {
        &self.d
    }

    pub fn q(&self) -> &DVector<f64> {
        &self.q
    }
}

/// View over a solved step: node voltages followed by extra-variable values.
#[derive(Debug, Clone)]
pub struct Solution {
    values: DVector<f64>,
    num_nodes: usize,
}

impl Solution {
    pub fn new(values: DVector<f64>, num_nodes: usize) -> Self {
        Self { values, num_nodes }
    }

    /// Voltage of a node by index; ground is 0.
    pub fn voltage(&self, node: Option<usize>) -> f64 {
        node.map(|i| self.values[i]).unwrap_or(0.0)
    }

    /// Value of an extra variable by its relative index.
    pub fn extra(&self, extra: usize) -> f64 {
        self.values[self.num_nodes + extra]
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn values(&self) -> &DVector<f64> {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conductance_stamp_corners() {
        let mut sys = McpSystem::new(2, 0, Vec::new());
        sys.stamp_conductance(Some(0), Some(1), 0.001);

        assert_eq!(sys.a()[(0, 0)], 0.001);
        assert_eq!(sys.a()[(1, 1)], 0.001);
        assert_eq!(sys.a()[(0, 1)], -0.001);
        assert_eq!(sys.a()[(1, 0)], -0.001);
    }

    #[test]
    fn test_conductance_to_ground() {
        let mut sys = McpSystem::new(1, 0, Vec::new());
        sys.stamp_conductance(Some(0), None, 2.0);

        assert_eq!(sys.a()[(0, 0)], 2.0);
    }

    #[test]
    fn test_voltage_branch_stamp() {
        // One node, one extra: ideal source node 0 to ground, 5 V.
        let mut sys = McpSystem::new(1, 1, Vec::new());
        sys.stamp_voltage_branch(0, Some(0), None, 5.0);

        assert_eq!(sys.a()[(0, 1)], 1.0, "incidence in KCL row");
        assert_eq!(sys.a()[(1, 0)], 1.0, "KVL row");
        assert_eq!(sys.rhs()[1], 5.0);
    }

    #[test]
    fn test_current_source_direction() {
        let mut sys = McpSystem::new(2, 0, Vec::new());
        sys.stamp_current_source(Some(0), Some(1), 1.5);

        assert_eq!(sys.rhs()[0], -1.5, "current leaves the from node");
        assert_eq!(sys.rhs()[1], 1.5, "current enters the to node");
    }

    #[test]
    fn test_gmin_applies_to_node_rows_only() {
        let mut sys = McpSystem::new(2, 1, Vec::new());
        sys.apply_gmin(1e-9);

        assert_eq!(sys.a()[(0, 0)], 1e-9);
        assert_eq!(sys.a()[(1, 1)], 1e-9);
        assert_eq!(sys.a()[(2, 2)], 0.0, "extra rows must not be leaked");
    }

    #[test]
    fn test_lcp_row_stamps() {
        // Pair 0's z variable is extra 0 (absolute column 2).
        let mut sys = McpSystem::new(2, 1, vec![2]);
        sys.add_c_node(0, Some(0), 1.0);
        sys.add_c_node(0, Some(1), -1.0);
        sys.add_d(0, 0, -0.01);
        sys.add_q(0, -0.7);

        assert_eq!(sys.c()[(0, 0)], 1.0);
        assert_eq!(sys.c()[(0, 1)], -1.0);
        assert_eq!(sys.d()[(0, 0)], -0.01);
        assert_eq!(sys.q()[0], -0.7);
        assert_eq!(sys.lcp_cols(), &[2]);
    }

    #[test]
    fn test_solution_views() {
        let sol = Solution::new(nalgebra::dvector![3.0, -1.0, 0.25], 2);
        assert_eq!(sol.voltage(Some(0)), 3.0);
        assert_eq!(sol.voltage(None), 0.0);
        assert_eq!(sol.extra(0), 0.25);
    }
}

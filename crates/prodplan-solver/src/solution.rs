use std::fmt;

/// The result of solving an LP problem
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct Solution {
    /// Solution status
    pub status: SolutionStatus,
    /// Values for each variable, only meaningful when optimal
    pub values: Vec<f64>,
    /// Objective value, only meaningful when optimal
    pub objective_value: f64,
    /// Constraints with zero slack at the optimum
    pub binding_constraints: Vec<String>,
    /// Branch-and-bound nodes explored (0 for a pure LP)
    pub nodes: usize,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolutionStatus {
    /// An optimal solution was found
    Optimal,
    /// The problem is infeasible (no solution exists)
    Infeasible,
    /// The problem is unbounded
    Unbounded,
    /// The problem was rejected before solving
    NotSolved,
    /// A solver limit was reached before optimality could be proven
    Undefined,
}

impl SolutionStatus {
    pub fn label(self) -> &'static str {
        match self {
            SolutionStatus::Optimal => "Optimal",
            SolutionStatus::Infeasible => "Infeasible",
            SolutionStatus::Unbounded => "Unbounded",
            SolutionStatus::NotSolved => "Not Solved",
            SolutionStatus::Undefined => "Undefined",
        }
    }
}

impl fmt::Display for SolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Solution {
    pub fn optimal(values: Vec<f64>, objective_value: f64, binding_constraints: Vec<String>) -> Self {
        Self {
            status: SolutionStatus::Optimal,
            values,
            objective_value,
            binding_constraints,
            nodes: 0,
        }
    }

    pub fn infeasible() -> Self {
        Self::without_values(SolutionStatus::Infeasible, f64::NAN)
    }

    pub fn unbounded() -> Self {
        Self::without_values(SolutionStatus::Unbounded, f64::NAN)
    }

    pub fn not_solved() -> Self {
        Self::without_values(SolutionStatus::NotSolved, f64::NAN)
    }

    pub fn undefined() -> Self {
        Self::without_values(SolutionStatus::Undefined, f64::NAN)
    }

    fn without_values(status: SolutionStatus, objective_value: f64) -> Self {
        Self {
            status,
            values: Vec::new(),
            objective_value,
            binding_constraints: Vec::new(),
            nodes: 0,
        }
    }

    pub fn with_nodes(mut self, nodes: usize) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolutionStatus::Optimal
    }

    /// Objective value, if an optimum was found
    pub fn objective(&self) -> Option<f64> {
        self.is_optimal().then_some(self.objective_value)
    }

    /// Variable values, if an optimum was found
    pub fn optimal_values(&self) -> Option<&[f64]> {
        self.is_optimal().then_some(self.values.as_slice())
    }
}

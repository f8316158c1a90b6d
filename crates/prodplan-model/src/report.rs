use std::fmt::{self, Write};

use prodplan_solver::Solution;

use crate::extract::AllocationReport;
use crate::scenario::Scenario;

/// Plain-text report of one solved problem: the input tables, the solver
/// outcome and, when optimal, the satisfied products and output table.
pub fn render_report(
    name: &str,
    scenario: &Scenario,
    solution: &Solution,
    allocation: Option<&AllocationReport>,
) -> String {
    let tables = scenario.to_tables();
    let mut out = String::new();

    let _ = writeln!(out, "Tables Used for problem: {}", name);
    out.push_str(&tables.time.to_text());
    out.push('\n');
    out.push_str(&tables.demand.to_text());
    out.push('\n');
    out.push_str(&tables.profit.to_text());
    out.push('\n');
    let _ = writeln!(out, "Time budget: {}", scenario.capacity());
    out.push('\n');

    out.push_str("Results:\n");
    let _ = writeln!(out, "Status: {}", solution.status);

    let (Some(objective), Some(allocation)) = (solution.objective(), allocation) else {
        out.push('\n');
        return out;
    };

    let _ = writeln!(out, "Objective: {}", objective);
    let _ = writeln!(out, "Satisfied Products: {}", list(&allocation.satisfied));
    let _ = writeln!(out, "Unsatisfied Products: {}", list(&allocation.unsatisfied));
    let _ = writeln!(out, "Time used: {} of {}", allocation.time_used, scenario.capacity());
    if !allocation.binding_constraints.is_empty() {
        let _ = writeln!(out, "Binding constraints: {}", list(&allocation.binding_constraints));
    }
    out.push('\n');

    out.push_str("Output Table:\n");
    out.push_str(&allocation.to_table().to_text());
    out.push('\n');
    out
}

fn list(items: &[String]) -> String {
    format!("[{}]", items.join(", "))
}

/// Difference between the solved initial and changed scenarios
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub initial_objective: f64,
    pub changed_objective: f64,
    /// Satisfied after the change but not before
    pub newly_satisfied: Vec<String>,
    /// Satisfied before the change but not after
    pub no_longer_satisfied: Vec<String>,
    /// Products only in the initial scenario
    pub removed: Vec<String>,
    /// Products only in the changed scenario
    pub added: Vec<String>,
}

impl Comparison {
    pub fn between(initial: &AllocationReport, changed: &AllocationReport) -> Self {
        let in_changed = |p: &String| changed.products.contains(p);
        let in_initial = |p: &String| initial.products.contains(p);

        Self {
            initial_objective: initial.objective_value,
            changed_objective: changed.objective_value,
            newly_satisfied: changed
                .satisfied
                .iter()
                .filter(|p| in_initial(*p) && !initial.is_satisfied(p))
                .cloned()
                .collect(),
            no_longer_satisfied: initial
                .satisfied
                .iter()
                .filter(|p| in_changed(*p) && !changed.is_satisfied(p))
                .cloned()
                .collect(),
            removed: initial.products.iter().filter(|p| !in_changed(*p)).cloned().collect(),
            added: changed.products.iter().filter(|p| !in_initial(*p)).cloned().collect(),
        }
    }

    pub fn objective_delta(&self) -> f64 {
        self.changed_objective - self.initial_objective
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Objective: {} -> {} ({:+})",
            self.initial_objective,
            self.changed_objective,
            self.objective_delta()
        )?;
        if !self.added.is_empty() {
            writeln!(f, "Added products: {}", list(&self.added))?;
        }
        if !self.removed.is_empty() {
            writeln!(f, "Removed products: {}", list(&self.removed))?;
        }
        writeln!(f, "Newly satisfied: {}", list(&self.newly_satisfied))?;
        writeln!(f, "No longer satisfied: {}", list(&self.no_longer_satisfied))
    }
}

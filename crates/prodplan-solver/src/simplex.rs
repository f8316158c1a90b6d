use log::{debug, warn};

use crate::problem::{ConstraintOp, LpProblem};
use crate::solution::Solution;

/// Degenerate pivots in a row before switching to Bland's rule
const DEGENERATE_PIVOTS_BEFORE_BLAND: usize = 50;

/// Simplex solver for linear programming problems, with branch-and-bound
/// for problems that declare integer variables
pub struct Solver {
    /// Maximum simplex pivots per relaxation before giving up
    pub(crate) max_iterations: usize,
    /// Tolerance for floating point comparisons
    pub(crate) tolerance: f64,
    /// Maximum branch-and-bound nodes before giving up
    pub(crate) max_nodes: usize,
    /// Distance from the nearest integer still accepted as integral
    pub(crate) integrality_tolerance: f64,
    /// Relative gap between an incumbent and a node's relaxation below
    /// which the node is not explored
    pub(crate) gap_tolerance: f64,
}

impl Default for Solver {
    fn default() -> Self {
        Self {
            max_iterations: 10000,
            tolerance: 1e-9,
            max_nodes: 10000,
            integrality_tolerance: 1e-6,
            gap_tolerance: 1e-4,
        }
    }
}

impl Solver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn with_max_nodes(mut self, max: usize) -> Self {
        self.max_nodes = max;
        self
    }

    pub fn with_integrality_tolerance(mut self, tol: f64) -> Self {
        self.integrality_tolerance = tol;
        self
    }

    /// Relative optimality gap for branch-and-bound. Zero asks for a
    /// proof of the exact optimum.
    pub fn with_gap_tolerance(mut self, gap: f64) -> Self {
        self.gap_tolerance = gap;
        self
    }

    /// Solve the problem. Integer variables are handled by branch-and-bound,
    /// everything else by the two-phase simplex method.
    pub fn solve(&self, problem: &LpProblem) -> Solution {
        if let Err(e) = problem.check() {
            warn!("problem rejected: {}", e);
            return Solution::not_solved();
        }

        debug!(
            "solving {} variables, {} constraints",
            problem.num_variables(),
            problem.num_constraints()
        );

        if problem.has_integer_variables() {
            self.branch_and_bound(problem)
        } else {
            self.solve_relaxation(problem)
        }
    }

    /// Solve ignoring integrality, using the two-phase simplex method
    pub(crate) fn solve_relaxation(&self, problem: &LpProblem) -> Solution {
        let mut tableau = self.build_tableau(problem);

        // Phase 1: Find initial basic feasible solution
        if tableau.n_artificial > 0 {
            match self.phase1(&mut tableau) {
                SimplexResult::Optimal => {}
                SimplexResult::Infeasible | SimplexResult::Unbounded => return Solution::infeasible(),
                SimplexResult::IterationLimit => return Solution::undefined(),
            }
        }

        // Phase 2: Optimize
        match self.phase2(&mut tableau) {
            SimplexResult::Optimal => self.extract_solution(&tableau, problem),
            SimplexResult::Unbounded => Solution::unbounded(),
            SimplexResult::Infeasible => Solution::infeasible(),
            SimplexResult::IterationLimit => {
                warn!("simplex stopped after {} iterations", self.max_iterations);
                Solution::undefined()
            }
        }
    }

    /// Names of the constraints that hold with equality at `values`
    pub(crate) fn binding_constraints(&self, problem: &LpProblem, values: &[f64]) -> Vec<String> {
        let tol = self.integrality_tolerance;
        problem
            .constraints
            .iter()
            .filter(|c| (c.lhs(values) - c.rhs).abs() <= tol * (1.0 + c.rhs.abs()))
            .map(|c| c.name.clone())
            .collect()
    }

    fn build_tableau(&self, problem: &LpProblem) -> Tableau {
        let n_vars = problem.num_variables();
        let n_constraints = problem.num_constraints();

        // Rows with a negative right-hand side are multiplied by -1 first
        let rows: Vec<(Vec<f64>, ConstraintOp, f64)> = problem
            .constraints
            .iter()
            .map(|c| {
                if c.rhs < 0.0 {
                    (c.coefficients.iter().map(|v| -v).collect(), c.op.flipped(), -c.rhs)
                } else {
                    (c.coefficients.clone(), c.op, c.rhs)
                }
            })
            .collect();

        // Count slack and artificial variables needed
        let mut n_slack = 0;
        let mut n_artificial = 0;

        for (_, op, _) in &rows {
            match op {
                ConstraintOp::Le => n_slack += 1,
                ConstraintOp::Ge => {
                    n_slack += 1; // surplus
                    n_artificial += 1;
                }
                ConstraintOp::Eq => n_artificial += 1,
            }
        }

        let total_cols = n_vars + n_slack + n_artificial + 1; // +1 for RHS
        let total_rows = n_constraints + 1; // +1 for objective

        let mut tableau = Tableau {
            data: vec![vec![0.0; total_cols]; total_rows],
            basic_vars: vec![0; n_constraints],
            n_vars,
            n_slack,
            n_artificial,
        };

        // Fill in constraint rows
        let mut slack_idx = n_vars;
        let mut artificial_idx = n_vars + n_slack;

        for (i, (coefficients, op, rhs)) in rows.iter().enumerate() {
            tableau.data[i][..n_vars].copy_from_slice(coefficients);
            tableau.data[i][total_cols - 1] = *rhs;

            match op {
                ConstraintOp::Le => {
                    tableau.data[i][slack_idx] = 1.0;
                    tableau.basic_vars[i] = slack_idx;
                    slack_idx += 1;
                }
                ConstraintOp::Ge => {
                    tableau.data[i][slack_idx] = -1.0; // surplus
                    slack_idx += 1;
                    tableau.data[i][artificial_idx] = 1.0;
                    tableau.basic_vars[i] = artificial_idx;
                    artificial_idx += 1;
                }
                ConstraintOp::Eq => {
                    tableau.data[i][artificial_idx] = 1.0;
                    tableau.basic_vars[i] = artificial_idx;
                    artificial_idx += 1;
                }
            }
        }

        // Objective row (last row). Simplex maximizes, so minimization negates.
        let obj_row = n_constraints;
        for (j, &coef) in problem.objective.coefficients.iter().enumerate() {
            tableau.data[obj_row][j] = if problem.objective.minimize { -coef } else { coef };
        }

        tableau
    }

    fn phase1(&self, tableau: &mut Tableau) -> SimplexResult {
        // Auxiliary objective: maximize -sum(artificials)
        let n_constraints = tableau.data.len() - 1;
        let n_cols = tableau.data[0].len();
        let art_start = tableau.n_vars + tableau.n_slack;

        let orig_obj = tableau.data[n_constraints].clone();

        tableau.data[n_constraints].fill(0.0);
        for j in art_start..(art_start + tableau.n_artificial) {
            tableau.data[n_constraints][j] = -1.0;
        }

        // Price out the basic artificials
        for i in 0..n_constraints {
            if tableau.basic_vars[i] >= art_start {
                for j in 0..n_cols {
                    tableau.data[n_constraints][j] += tableau.data[i][j];
                }
            }
        }

        match self.iterate(tableau, n_cols - 1) {
            SimplexResult::Optimal => {}
            // Phase 1 is bounded by construction
            SimplexResult::Unbounded | SimplexResult::Infeasible => return SimplexResult::Infeasible,
            SimplexResult::IterationLimit => return SimplexResult::IterationLimit,
        }

        // Every artificial must have left the basis at zero level
        let rhs_col = n_cols - 1;
        for i in 0..n_constraints {
            if tableau.basic_vars[i] >= art_start && tableau.data[i][rhs_col].abs() > self.tolerance.max(1e-7) {
                return SimplexResult::Infeasible;
            }
        }

        self.drive_out_artificials(tableau);

        // Restore original objective and price out the basis
        tableau.data[n_constraints] = orig_obj;
        for i in 0..n_constraints {
            let basic = tableau.basic_vars[i];
            let ratio = tableau.data[n_constraints][basic];
            if ratio.abs() > self.tolerance {
                for j in 0..n_cols {
                    tableau.data[n_constraints][j] -= ratio * tableau.data[i][j];
                }
            }
        }

        SimplexResult::Optimal
    }

    /// Pivot zero-level artificials out of the basis where a structural or
    /// slack column allows it. Rows where none does are redundant.
    fn drive_out_artificials(&self, tableau: &mut Tableau) {
        let n_constraints = tableau.data.len() - 1;
        let art_start = tableau.n_vars + tableau.n_slack;

        for i in 0..n_constraints {
            if tableau.basic_vars[i] < art_start {
                continue;
            }
            let replacement = (0..art_start).find(|&j| tableau.data[i][j].abs() > self.tolerance.max(1e-9));
            if let Some(col) = replacement {
                self.pivot(tableau, i, col);
            }
        }
    }

    fn phase2(&self, tableau: &mut Tableau) -> SimplexResult {
        // Artificial columns never re-enter the basis
        let exclude_from = tableau.n_vars + tableau.n_slack;
        self.iterate(tableau, exclude_from)
    }

    /// Pivot until no column among the first `n_cols` improves the objective.
    /// After a run of degenerate pivots the entering and leaving choices
    /// switch to Bland's rule so the method cannot cycle.
    fn iterate(&self, tableau: &mut Tableau, n_cols: usize) -> SimplexResult {
        let rhs_col = tableau.data[0].len() - 1;
        let obj_row = tableau.data.len() - 1;
        let mut degenerate = 0;

        for _ in 0..self.max_iterations {
            let bland = degenerate >= DEGENERATE_PIVOTS_BEFORE_BLAND;
            let Some(pivot_col) = self.find_pivot_column(tableau, n_cols, bland) else {
                return SimplexResult::Optimal;
            };
            let Some(pivot_row) = self.find_pivot_row(tableau, pivot_col, bland) else {
                return SimplexResult::Unbounded;
            };

            let before = tableau.data[obj_row][rhs_col];
            self.pivot(tableau, pivot_row, pivot_col);
            if (tableau.data[obj_row][rhs_col] - before).abs() <= self.tolerance {
                degenerate += 1;
            } else {
                degenerate = 0;
            }
        }
        SimplexResult::IterationLimit
    }

    /// Entering column among the first `n_cols`: the most positive reduced
    /// cost, or the lowest index with a positive one under Bland's rule
    fn find_pivot_column(&self, tableau: &Tableau, n_cols: usize, bland: bool) -> Option<usize> {
        let obj_row = &tableau.data[tableau.data.len() - 1];

        if bland {
            return (0..n_cols).find(|&j| obj_row[j] > self.tolerance);
        }

        let mut max_val = self.tolerance;
        let mut max_col = None;

        for (j, &value) in obj_row.iter().enumerate().take(n_cols) {
            if value > max_val {
                max_val = value;
                max_col = Some(j);
            }
        }

        max_col
    }

    /// Leaving row by the minimum ratio test. Ties go to the row whose basic
    /// variable has the lowest index under Bland's rule.
    fn find_pivot_row(&self, tableau: &Tableau, col: usize, bland: bool) -> Option<usize> {
        let n_constraints = tableau.data.len() - 1;
        let rhs_col = tableau.data[0].len() - 1;

        let mut min_ratio = f64::INFINITY;
        let mut min_row: Option<usize> = None;

        for i in 0..n_constraints {
            let val = tableau.data[i][col];
            if val > self.tolerance {
                let ratio = tableau.data[i][rhs_col] / val;
                let better = match min_row {
                    None => true,
                    Some(_) if ratio < min_ratio - self.tolerance => true,
                    Some(r) if bland && ratio <= min_ratio + self.tolerance => {
                        tableau.basic_vars[i] < tableau.basic_vars[r]
                    }
                    Some(_) => false,
                };
                if better {
                    min_ratio = ratio;
                    min_row = Some(i);
                }
            }
        }

        min_row
    }

    fn pivot(&self, tableau: &mut Tableau, row: usize, col: usize) {
        let n_rows = tableau.data.len();
        let n_cols = tableau.data[0].len();

        tableau.basic_vars[row] = col;

        // Scale pivot row
        let pivot_val = tableau.data[row][col];
        for j in 0..n_cols {
            tableau.data[row][j] /= pivot_val;
        }

        // Eliminate column in other rows
        let pivot_row = tableau.data[row].clone();
        for i in 0..n_rows {
            if i != row {
                let factor = tableau.data[i][col];
                if factor != 0.0 {
                    for j in 0..n_cols {
                        tableau.data[i][j] -= factor * pivot_row[j];
                    }
                }
            }
        }
    }

    fn extract_solution(&self, tableau: &Tableau, problem: &LpProblem) -> Solution {
        let n_vars = problem.num_variables();
        let n_constraints = problem.num_constraints();
        let rhs_col = tableau.data[0].len() - 1;

        let mut values = vec![0.0; n_vars];
        for i in 0..n_constraints {
            let basic = tableau.basic_vars[i];
            if basic < n_vars {
                // Clamp round-off below the non-negativity bound
                let value = tableau.data[i][rhs_col];
                values[basic] = if value > 0.0 { value } else { 0.0 };
            }
        }

        let objective_value = problem.evaluate(&values);
        let binding = self.binding_constraints(problem, &values);

        Solution::optimal(values, objective_value, binding)
    }
}

struct Tableau {
    data: Vec<Vec<f64>>,
    basic_vars: Vec<usize>,
    n_vars: usize,
    n_slack: usize,
    n_artificial: usize,
}

enum SimplexResult {
    Optimal,
    Unbounded,
    Infeasible,
    IterationLimit,
}

use log::{debug, warn};

use crate::problem::{ConstraintOp, LpProblem};
use crate::simplex::Solver;
use crate::solution::{Solution, SolutionStatus};

/// Node in the branch-and-bound tree: the bounds tightened on the way down
#[derive(Debug, Clone, Default)]
struct Node {
    /// (variable, lower bound)
    lower: Vec<(usize, f64)>,
    /// (variable, upper bound)
    upper: Vec<(usize, f64)>,
    /// Relaxation score of the parent, used to prune before solving
    parent_score: f64,
}

impl Node {
    fn child(&self, parent_score: f64) -> Self {
        Self {
            lower: self.lower.clone(),
            upper: self.upper.clone(),
            parent_score,
        }
    }

    /// The problem with this node's bounds added as constraints
    fn apply(&self, problem: &LpProblem) -> LpProblem {
        let mut bounded = problem.clone();
        let n = problem.num_variables();
        for &(var, bound) in &self.lower {
            let mut coeffs = vec![0.0; n];
            coeffs[var] = 1.0;
            bounded.add_constraint(format!("{}_branch_lo", problem.variables[var]), coeffs, ConstraintOp::Ge, bound);
        }
        for &(var, bound) in &self.upper {
            let mut coeffs = vec![0.0; n];
            coeffs[var] = 1.0;
            bounded.add_constraint(format!("{}_branch_up", problem.variables[var]), coeffs, ConstraintOp::Le, bound);
        }
        bounded
    }
}

impl Solver {
    /// Depth-first branch-and-bound over the integer variables, branching on
    /// the most fractional one. Every relaxation is also rounded down to seed
    /// an incumbent, and nodes whose relaxation cannot beat the incumbent by
    /// more than the gap tolerance are dropped.
    pub(crate) fn branch_and_bound(&self, problem: &LpProblem) -> Solution {
        // Scores are maximized regardless of the objective sense
        let sign = if problem.objective.minimize { -1.0 } else { 1.0 };
        // With integer coefficients on integer variables only, every
        // candidate's score is whole and bounds can be rounded down
        let integral_scores = problem.integer.iter().all(|&is_int| is_int)
            && problem.objective.coefficients.iter().all(|c| c.fract() == 0.0);
        let pruned = |score: f64, best: &Option<(Vec<f64>, f64)>| {
            let Some((_, best_score)) = best else {
                return false;
            };
            let bound = if integral_scores {
                (score + self.integrality_tolerance).floor()
            } else {
                score
            };
            let margin = self.integrality_tolerance.max(self.gap_tolerance * best_score.abs());
            bound <= best_score + margin
        };

        let mut stack = vec![Node {
            parent_score: f64::INFINITY,
            ..Node::default()
        }];
        let mut best: Option<(Vec<f64>, f64)> = None;
        let mut nodes = 0;
        let mut incomplete = false;

        while let Some(node) = stack.pop() {
            if nodes >= self.max_nodes {
                warn!("branch-and-bound stopped after {} nodes", nodes);
                incomplete = true;
                break;
            }
            nodes += 1;

            if pruned(node.parent_score, &best) {
                continue;
            }

            let relaxed = self.solve_relaxation(&node.apply(problem));
            match relaxed.status {
                SolutionStatus::Optimal => {}
                SolutionStatus::Infeasible => continue,
                // Only the root relaxation decides unboundedness
                SolutionStatus::Unbounded if nodes == 1 => return Solution::unbounded().with_nodes(nodes),
                SolutionStatus::Unbounded | SolutionStatus::NotSolved | SolutionStatus::Undefined => {
                    incomplete = true;
                    continue;
                }
            }

            let score = sign * relaxed.objective_value;
            if pruned(score, &best) {
                continue;
            }

            let Some(var) = self.most_fractional(problem, &relaxed.values) else {
                debug!("incumbent {} at node {}", relaxed.objective_value, nodes);
                best = Some((relaxed.values, score));
                continue;
            };

            if let Some(values) = self.round_down(problem, &relaxed.values) {
                let rounded = sign * problem.evaluate(&values);
                if best.as_ref().is_none_or(|(_, best_score)| rounded > *best_score) {
                    debug!("rounded incumbent {} at node {}", problem.evaluate(&values), nodes);
                    best = Some((values, rounded));
                }
                if pruned(score, &best) {
                    continue;
                }
            }

            let value = relaxed.values[var];
            let mut down = node.child(score);
            down.upper.push((var, value.floor()));
            let mut up = node.child(score);
            up.lower.push((var, value.ceil()));

            // Rounding up is explored first
            stack.push(down);
            stack.push(up);
        }

        if incomplete {
            return Solution::undefined().with_nodes(nodes);
        }

        match best {
            Some((values, _)) => {
                let values: Vec<f64> = values
                    .iter()
                    .zip(&problem.integer)
                    .map(|(&v, &is_int)| if is_int { v.round() } else { v })
                    .collect();
                let objective_value = problem.evaluate(&values);
                let binding = self.binding_constraints(problem, &values);
                debug!("branch-and-bound finished after {} nodes", nodes);
                Solution::optimal(values, objective_value, binding).with_nodes(nodes)
            }
            None => Solution::infeasible().with_nodes(nodes),
        }
    }

    /// The relaxation with integer variables rounded down, if that point
    /// still satisfies every constraint
    fn round_down(&self, problem: &LpProblem, values: &[f64]) -> Option<Vec<f64>> {
        let tol = self.integrality_tolerance;
        let rounded: Vec<f64> = values
            .iter()
            .zip(&problem.integer)
            .map(|(&v, &is_int)| if is_int { (v + tol).floor() } else { v })
            .collect();

        problem
            .constraints
            .iter()
            .all(|c| c.is_satisfied(&rounded, tol * (1.0 + c.rhs.abs())))
            .then_some(rounded)
    }

    fn most_fractional(&self, problem: &LpProblem, values: &[f64]) -> Option<usize> {
        let mut branch_var = None;
        let mut max_fractionality = self.integrality_tolerance;

        for (i, (&is_int, &v)) in problem.integer.iter().zip(values).enumerate() {
            if !is_int {
                continue;
            }
            let frac = v - v.floor();
            let fractionality = frac.min(1.0 - frac);
            if fractionality > max_fractionality {
                max_fractionality = fractionality;
                branch_var = Some(i);
            }
        }

        branch_var
    }
}

#[cfg(test)]
mod tests {
    use crate::problem::{ConstraintOp, LpProblem};
    use crate::simplex::Solver;
    use crate::solution::SolutionStatus;

    fn integer_problem(names: &[&str]) -> LpProblem {
        let mut problem = LpProblem::new(names.iter().map(|n| n.to_string()).collect());
        for i in 0..names.len() {
            problem.set_integer(i);
        }
        problem
    }

    #[test]
    fn test_integer_knapsack() {
        // Maximize 5x + 4y
        // Subject to:
        //   6x + 4y <= 24
        //   x + 2y <= 6
        // LP optimum is (3, 1.5) with 21; integer optimum is (4, 0) with 20
        let mut problem = integer_problem(&["x", "y"]);
        problem.set_objective(vec![5.0, 4.0], false);
        problem.add_constraint("c1", vec![6.0, 4.0], ConstraintOp::Le, 24.0);
        problem.add_constraint("c2", vec![1.0, 2.0], ConstraintOp::Le, 6.0);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.objective_value - 20.0).abs() < 1e-6, "obj = {}", solution.objective_value);
        for v in &solution.values {
            assert_eq!(v.fract(), 0.0, "value {} is not integral", v);
        }
        assert!(solution.nodes > 1);
    }

    #[test]
    fn test_fractional_capacity_rounds_down() {
        // Maximize x subject to 2x <= 7
        let mut problem = integer_problem(&["x"]);
        problem.set_objective(vec![1.0], false);
        problem.add_constraint("cap", vec![2.0], ConstraintOp::Le, 7.0);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert_eq!(solution.values, vec![3.0]);
    }

    #[test]
    fn test_integer_infeasible() {
        // 2x = 3 has no integer solution
        let mut problem = integer_problem(&["x"]);
        problem.set_objective(vec![1.0], false);
        problem.add_constraint("odd", vec![2.0], ConstraintOp::Eq, 3.0);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Infeasible);
        assert!(solution.optimal_values().is_none());
    }

    #[test]
    fn test_node_limit_is_undefined() {
        let mut problem = integer_problem(&["x", "y"]);
        problem.set_objective(vec![5.0, 4.0], false);
        problem.add_constraint("c1", vec![6.0, 4.0], ConstraintOp::Le, 24.0);
        problem.add_constraint("c2", vec![1.0, 2.0], ConstraintOp::Le, 6.0);

        let solution = Solver::new().with_max_nodes(1).solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Undefined);
    }

    #[test]
    fn test_exact_gap_still_finds_optimum() {
        let mut problem = integer_problem(&["x", "y"]);
        problem.set_objective(vec![5.0, 4.0], false);
        problem.add_constraint("c1", vec![6.0, 4.0], ConstraintOp::Le, 24.0);
        problem.add_constraint("c2", vec![1.0, 2.0], ConstraintOp::Le, 6.0);

        let solution = Solver::new().with_gap_tolerance(0.0).solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.objective_value - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_many_ceilings_with_fractional_coefficients() {
        // 30 ceilings in the thousands, one shared budget, fractional
        // weights and scores: the relaxation is one unit away from whole
        let weights = [1.25, 0.9, 0.75, 1.25, 0.62, 1.25];
        let n = 30;
        let names: Vec<String> = (0..n).map(|i| format!("x{}", i)).collect();
        let mut problem = integer_problem(&names.iter().map(String::as_str).collect::<Vec<_>>());

        let scores: Vec<f64> = (0..n).map(|i| 0.3 + 0.7 * ((i * 5) % 7) as f64 + 0.01 * i as f64).collect();
        problem.set_objective(scores, false);
        let mut budget = vec![0.0; n];
        for i in 0..n {
            let mut coeffs = vec![0.0; n];
            coeffs[i] = 1.0;
            let ceiling = 1000.0 + 1370.0 * ((i * 3) % 8) as f64;
            problem.add_constraint(format!("ceiling{}", i), coeffs, ConstraintOp::Le, ceiling);
            budget[i] = weights[i % weights.len()];
        }
        problem.add_constraint("budget", budget.clone(), ConstraintOp::Le, 50000.0);

        let mut relaxed = problem.clone();
        relaxed.integer.fill(false);
        let bound = Solver::new().solve(&relaxed).objective_value;

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!(solution.nodes < 100, "{} nodes", solution.nodes);
        assert!(solution.objective_value <= bound + 1e-6);
        assert!(solution.objective_value >= bound * (1.0 - 1e-3));
        let used: f64 = budget.iter().zip(&solution.values).map(|(w, v)| w * v).sum();
        assert!(used <= 50000.0 + 1e-6);
        for v in &solution.values {
            assert_eq!(v.fract(), 0.0);
        }
    }

    #[test]
    fn test_integer_unbounded() {
        let mut problem = integer_problem(&["x"]);
        problem.set_objective(vec![1.0], false);
        problem.add_constraint("lower", vec![1.0], ConstraintOp::Ge, 0.5);

        let solution = Solver::new().solve(&problem);

        assert_eq!(solution.status, SolutionStatus::Unbounded);
    }
}

use thiserror::Error;

/// Represents a (mixed-integer) linear programming problem
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct LpProblem {
    /// Variable names
    pub variables: Vec<String>,
    /// Integrality flag for each variable
    pub integer: Vec<bool>,
    /// Objective function coefficients
    pub objective: Objective,
    /// Constraints
    pub constraints: Vec<Constraint>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct Objective {
    /// Coefficients for each variable
    pub coefficients: Vec<f64>,
    /// Whether to minimize or maximize
    pub minimize: bool,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct Constraint {
    /// Name/label for the constraint (for diagnostics)
    pub name: String,
    /// Coefficients for each variable
    pub coefficients: Vec<f64>,
    /// Comparison operator
    pub op: ConstraintOp,
    /// Right-hand side value
    pub rhs: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    /// Less than or equal (<=)
    Le,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (=)
    Eq,
}

/// Structural problems that prevent a problem from being handed to the solver
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProblemError {
    #[error("Objective has {found} coefficients but the problem declares {expected} variables")]
    ObjectiveLength { expected: usize, found: usize },
    #[error("Constraint {name} has {found} coefficients but the problem declares {expected} variables")]
    ConstraintLength {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Non-finite coefficient in {0}")]
    NonFinite(String),
}

impl ConstraintOp {
    /// The operator obtained by multiplying both sides by -1
    pub fn flipped(self) -> Self {
        match self {
            ConstraintOp::Le => ConstraintOp::Ge,
            ConstraintOp::Ge => ConstraintOp::Le,
            ConstraintOp::Eq => ConstraintOp::Eq,
        }
    }
}

impl Constraint {
    /// Left-hand side value of the constraint at the given point
    pub fn lhs(&self, values: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(values)
            .map(|(coef, value)| coef * value)
            .sum()
    }

    /// Whether the point satisfies the constraint within `tolerance`
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.lhs(values);
        match self.op {
            ConstraintOp::Le => lhs <= self.rhs + tolerance,
            ConstraintOp::Ge => lhs >= self.rhs - tolerance,
            ConstraintOp::Eq => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

impl LpProblem {
    pub fn new(variables: Vec<String>) -> Self {
        let n = variables.len();
        Self {
            variables,
            integer: vec![false; n],
            objective: Objective {
                coefficients: vec![0.0; n],
                minimize: true,
            },
            constraints: Vec::new(),
        }
    }

    /// Restrict a variable to integral values
    pub fn set_integer(&mut self, index: usize) {
        if let Some(flag) = self.integer.get_mut(index) {
            *flag = true;
        }
    }

    pub fn set_objective(&mut self, coefficients: Vec<f64>, minimize: bool) {
        self.objective = Objective { coefficients, minimize };
    }

    pub fn add_constraint(&mut self, name: impl Into<String>, coefficients: Vec<f64>, op: ConstraintOp, rhs: f64) {
        self.constraints.push(Constraint {
            name: name.into(),
            coefficients,
            op,
            rhs,
        });
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn has_integer_variables(&self) -> bool {
        self.integer.iter().any(|&flag| flag)
    }

    /// Objective value at the given point
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.objective
            .coefficients
            .iter()
            .zip(values)
            .map(|(coef, value)| coef * value)
            .sum()
    }

    /// Check that every coefficient vector matches the declared variables
    pub fn check(&self) -> Result<(), ProblemError> {
        let n = self.num_variables();
        if self.objective.coefficients.len() != n {
            return Err(ProblemError::ObjectiveLength {
                expected: n,
                found: self.objective.coefficients.len(),
            });
        }
        if self.objective.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ProblemError::NonFinite("objective".to_string()));
        }
        for c in &self.constraints {
            if c.coefficients.len() != n {
                return Err(ProblemError::ConstraintLength {
                    name: c.name.clone(),
                    expected: n,
                    found: c.coefficients.len(),
                });
            }
            if !c.rhs.is_finite() || c.coefficients.iter().any(|v| !v.is_finite()) {
                return Err(ProblemError::NonFinite(c.name.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_rejects_short_constraint() {
        let mut problem = LpProblem::new(vec!["x".to_string(), "y".to_string()]);
        problem.set_objective(vec![1.0, 1.0], false);
        problem.add_constraint("short", vec![1.0], ConstraintOp::Le, 4.0);

        assert_eq!(
            problem.check(),
            Err(ProblemError::ConstraintLength {
                name: "short".to_string(),
                expected: 2,
                found: 1,
            })
        );
    }

    #[test]
    fn test_set_integer() {
        let mut problem = LpProblem::new(vec!["x".to_string(), "y".to_string()]);
        assert!(!problem.has_integer_variables());

        problem.set_integer(1);
        assert_eq!(problem.integer, vec![false, true]);
        assert!(problem.has_integer_variables());

        // Out of range indices are ignored
        problem.set_integer(5);
        assert_eq!(problem.integer.len(), 2);
    }

    #[test]
    fn test_constraint_satisfaction() {
        let c = Constraint {
            name: "cap".to_string(),
            coefficients: vec![2.0, 1.0],
            op: ConstraintOp::Le,
            rhs: 10.0,
        };
        assert!(c.is_satisfied(&[3.0, 4.0], 1e-9));
        assert!(c.is_satisfied(&[5.0, 0.0], 1e-9));
        assert!(!c.is_satisfied(&[5.0, 1.0], 1e-9));
        assert_eq!(ConstraintOp::Le.flipped(), ConstraintOp::Ge);
    }
}

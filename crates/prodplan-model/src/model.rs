use std::collections::HashMap;
use std::fmt;

use log::{debug, info};
use prodplan_solver::{ConstraintOp, LpProblem, Solution, Solver};

use crate::scenario::{Scenario, ValidationError};

/// Name of the shared production-time constraint
pub const TIME_CONSTRAINT: &str = "time_budget";

/// Identity of one decision variable: units of `product` allocated to `market`
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AllocationKey {
    pub market: String,
    pub product: String,
}

impl AllocationKey {
    pub fn new(market: impl Into<String>, product: impl Into<String>) -> Self {
        Self {
            market: market.into(),
            product: product.into(),
        }
    }

    /// Solver-facing variable name. Debug quoting keeps it unique for any
    /// pair of identifiers.
    pub fn variable_name(&self) -> String {
        format!("x[{:?},{:?}]", self.market, self.product)
    }
}

impl fmt::Display for AllocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.market, self.product)
    }
}

/// Maps structured (market, product) keys to solver variable indices and back
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableRegistry {
    keys: Vec<AllocationKey>,
    index: HashMap<AllocationKey, usize>,
}

impl VariableRegistry {
    fn register(&mut self, key: AllocationKey) -> usize {
        let idx = self.keys.len();
        self.index.insert(key.clone(), idx);
        self.keys.push(key);
        idx
    }

    pub fn index_of(&self, market: &str, product: &str) -> Option<usize> {
        self.index.get(&AllocationKey::new(market, product)).copied()
    }

    /// Keys in variable order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &AllocationKey)> {
        self.keys.iter().enumerate()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// An allocation problem ready for the solver
#[derive(Debug, Clone)]
pub struct ProductionModel {
    name: String,
    problem: LpProblem,
    registry: VariableRegistry,
    capacity: f64,
}

impl ProductionModel {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn problem(&self) -> &LpProblem {
        &self.problem
    }

    pub fn registry(&self) -> &VariableRegistry {
        &self.registry
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Hand the model to the solver. The solver status is returned as is;
    /// callers branch on it before reading values.
    pub fn solve(&self, solver: &Solver) -> Solution {
        let solution = solver.solve(&self.problem);
        match solution.objective() {
            Some(objective) => info!("{}: {} (objective {})", self.name, solution.status, objective),
            None => info!("{}: {}", self.name, solution.status),
        }
        solution
    }
}

/// Builds production models from scenarios
pub struct ModelBuilder {
    name: String,
}

impl ModelBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Translate a scenario into an integer program: one variable per
    /// (market, product) pair, profit-maximizing objective, one demand
    /// ceiling per pair and a single shared time budget.
    pub fn build(&self, scenario: &Scenario) -> Result<ProductionModel, ValidationError> {
        scenario.validate()?;

        let products = scenario.products();
        let markets = scenario.markets();

        // Variables, market-major like the output table
        let mut registry = VariableRegistry::default();
        for market in markets {
            for product in products {
                registry.register(AllocationKey::new(market.as_str(), product.as_str()));
            }
        }

        let names = registry.keys.iter().map(AllocationKey::variable_name).collect();
        let mut lp = LpProblem::new(names);
        let n = registry.len();
        for i in 0..n {
            lp.set_integer(i);
        }

        // Objective: maximize profit, zero-profit pairs included
        let mut objective = vec![0.0; n];
        for (m, market) in markets.iter().enumerate() {
            for (p, product) in products.iter().enumerate() {
                objective[Self::index(&registry, market, product)?] = scenario.profit(m, p);
            }
        }
        lp.set_objective(objective, false);

        // Demand ceilings; zero-demand pairs are pinned with `x <= 0`
        for (p, product) in products.iter().enumerate() {
            for (m, market) in markets.iter().enumerate() {
                let mut coeffs = vec![0.0; n];
                coeffs[Self::index(&registry, market, product)?] = 1.0;
                lp.add_constraint(
                    format!("demand[{},{}]", market, product),
                    coeffs,
                    ConstraintOp::Le,
                    scenario.demand(m, p),
                );
            }
        }

        // Shared time budget over every variable
        let mut time = vec![0.0; n];
        for (p, product) in products.iter().enumerate() {
            for (m, market) in markets.iter().enumerate() {
                if scenario.demand(m, p) > 0.0 {
                    time[Self::index(&registry, market, product)?] = scenario.time_per_unit(p);
                }
            }
        }
        lp.add_constraint(TIME_CONSTRAINT, time, ConstraintOp::Le, scenario.capacity());

        debug!(
            "{}: {} variables, {} constraints",
            self.name,
            lp.num_variables(),
            lp.num_constraints()
        );

        Ok(ProductionModel {
            name: self.name.clone(),
            problem: lp,
            registry,
            capacity: scenario.capacity(),
        })
    }

    fn index(registry: &VariableRegistry, market: &str, product: &str) -> Result<usize, ValidationError> {
        registry
            .index_of(market, product)
            .ok_or_else(|| ValidationError::MissingDemand {
                market: market.to_string(),
                product: product.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::tests::{names, split_scenario};
    use prodplan_solver::SolutionStatus;

    #[test]
    fn test_build_structure() {
        let scenario = split_scenario();
        let model = ModelBuilder::new("InitialProblem").build(&scenario).unwrap();

        assert_eq!(model.name(), "InitialProblem");
        assert_eq!(model.problem().num_variables(), 4);
        // Four demand ceilings plus the time budget
        assert_eq!(model.problem().num_constraints(), 5);
        assert!(model.problem().integer.iter().all(|&flag| flag));
        assert!(!model.problem().objective.minimize);
        assert_eq!(model.problem().objective.coefficients, vec![5.0, 0.0, 0.0, 5.0]);
    }

    #[test]
    fn test_registry_round_trip() {
        let scenario = split_scenario();
        let model = ModelBuilder::new("p").build(&scenario).unwrap();

        for (idx, key) in model.registry().iter() {
            assert_eq!(model.registry().index_of(&key.market, &key.product), Some(idx));
            assert_eq!(model.problem().variables[idx], key.variable_name());
        }
        assert_eq!(model.registry().index_of("Area-2", "A"), Some(2));
        assert_eq!(model.registry().index_of("Area-3", "A"), None);
    }

    #[test]
    fn test_zero_demand_is_pinned() {
        let scenario = split_scenario();
        let model = ModelBuilder::new("p").build(&scenario).unwrap();
        let idx = model.registry().index_of("Area-1", "B").unwrap();

        let pin = model
            .problem()
            .constraints
            .iter()
            .find(|c| c.name == "demand[Area-1,B]")
            .unwrap();
        assert_eq!(pin.rhs, 0.0);
        assert_eq!(pin.coefficients[idx], 1.0);

        let time = model
            .problem()
            .constraints
            .iter()
            .find(|c| c.name == TIME_CONSTRAINT)
            .unwrap();
        assert_eq!(time.coefficients[idx], 0.0);
        assert_eq!(time.rhs, scenario.capacity());
    }

    #[test]
    fn test_time_coefficients_use_product_time() {
        let scenario = Scenario::new(
            names(&["A", "B"]),
            names(&["Area-1"]),
            vec![1.5, 2.0],
            vec![vec![4.0, 6.0]],
            vec![vec![1.0, 1.0]],
        )
        .unwrap();
        let model = ModelBuilder::new("p").build(&scenario).unwrap();
        let time = model.problem().constraints.last().unwrap();

        assert_eq!(time.name, TIME_CONSTRAINT);
        assert_eq!(time.coefficients, vec![1.5, 2.0]);
    }

    #[test]
    fn test_identifiers_with_separators_stay_distinct() {
        let scenario = Scenario::new(
            names(&["1", "11"]),
            names(&["A1", "A"]),
            vec![1.0, 1.0],
            vec![vec![1.0, 1.0], vec![1.0, 1.0]],
            vec![vec![1.0, 1.0], vec![1.0, 1.0]],
        )
        .unwrap();
        let model = ModelBuilder::new("p").build(&scenario).unwrap();

        // "A1" + "1" and "A" + "11" collide when concatenated
        let a = model.registry().index_of("A1", "1").unwrap();
        let b = model.registry().index_of("A", "11").unwrap();
        assert_ne!(a, b);
        assert_ne!(model.problem().variables[a], model.problem().variables[b]);
    }

    #[test]
    fn test_solve_propagates_status() {
        let scenario = split_scenario().with_capacity(15.0).unwrap();
        let model = ModelBuilder::new("p").build(&scenario).unwrap();

        let solution = model.solve(&Solver::new());
        assert_eq!(solution.status, SolutionStatus::Optimal);
        assert!((solution.objective_value - 75.0).abs() < 1e-6);

        let solution = model.solve(&Solver::new().with_max_iterations(0));
        assert_eq!(solution.status, SolutionStatus::Undefined);
        assert_eq!(solution.objective(), None);
    }
}

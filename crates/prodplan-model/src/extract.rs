use prodplan_solver::{Solution, SolutionStatus};
use thiserror::Error;

use crate::model::{AllocationKey, ProductionModel, TIME_CONSTRAINT};
use crate::scenario::Scenario;

/// Allocated and demanded totals are compared with this tolerance, since the
/// solver works in floating point even for integer variables
pub const SATISFACTION_TOLERANCE: f64 = 1e-6;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    #[error("Solution is {0}, no allocation to extract")]
    NotOptimal(SolutionStatus),
    #[error("Solution has {found} values but the model declares {expected} variables")]
    ValueCount { expected: usize, found: usize },
    #[error("Variable {0} does not belong to the scenario")]
    UnknownKey(AllocationKey),
    #[error("Scenario pair {0} has no variable in the model")]
    MissingVariable(AllocationKey),
}

/// Allocation and demand totals for one product
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ProductTotal {
    pub product: String,
    pub allocated: f64,
    pub demand: f64,
}

impl ProductTotal {
    pub fn is_satisfied(&self) -> bool {
        (self.allocated - self.demand).abs() <= SATISFACTION_TOLERANCE
    }
}

/// The solved allocation of a model, in table form
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationReport {
    /// Name of the solved problem
    pub name: String,
    pub objective_value: f64,
    /// Row labels of `allocation`
    pub markets: Vec<String>,
    /// Column labels of `allocation`
    pub products: Vec<String>,
    /// Units per market (rows) and product (columns)
    pub allocation: Vec<Vec<f64>>,
    /// Per-product totals, in product order
    pub totals: Vec<ProductTotal>,
    /// Products whose whole demand is met
    pub satisfied: Vec<String>,
    /// Products with unmet demand
    pub unsatisfied: Vec<String>,
    /// Non-trivial constraints with zero slack
    pub binding_constraints: Vec<String>,
    /// Minutes of the time budget used
    pub time_used: f64,
}

impl AllocationReport {
    pub fn allocated(&self, market: &str, product: &str) -> Option<f64> {
        let m = self.markets.iter().position(|x| x == market)?;
        let p = self.products.iter().position(|x| x == product)?;
        Some(self.allocation[m][p])
    }

    pub fn total(&self, product: &str) -> Option<&ProductTotal> {
        self.totals.iter().find(|t| t.product == product)
    }

    pub fn is_satisfied(&self, product: &str) -> bool {
        self.satisfied.iter().any(|p| p == product)
    }
}

/// Rebuild the market-by-product allocation table from an optimal solution.
///
/// Variable identity comes from the model's registry; nothing is recovered
/// from variable names. The inputs are only read.
pub fn extract(
    model: &ProductionModel,
    solution: &Solution,
    scenario: &Scenario,
) -> Result<AllocationReport, ExtractError> {
    let values = solution
        .optimal_values()
        .ok_or(ExtractError::NotOptimal(solution.status))?;
    let objective_value = solution.objective().ok_or(ExtractError::NotOptimal(solution.status))?;

    let registry = model.registry();
    if values.len() != registry.len() {
        return Err(ExtractError::ValueCount {
            expected: registry.len(),
            found: values.len(),
        });
    }

    let products = scenario.products();
    let markets = scenario.markets();
    let mut allocation = vec![vec![0.0; products.len()]; markets.len()];
    let mut assigned = vec![vec![false; products.len()]; markets.len()];

    for (idx, key) in registry.iter() {
        let m = scenario
            .market_index(&key.market)
            .ok_or_else(|| ExtractError::UnknownKey(key.clone()))?;
        let p = scenario
            .product_index(&key.product)
            .ok_or_else(|| ExtractError::UnknownKey(key.clone()))?;
        allocation[m][p] = values[idx];
        assigned[m][p] = true;
    }

    for (m, market) in markets.iter().enumerate() {
        for (p, product) in products.iter().enumerate() {
            if !assigned[m][p] {
                return Err(ExtractError::MissingVariable(AllocationKey::new(
                    market.as_str(),
                    product.as_str(),
                )));
            }
        }
    }

    let totals: Vec<ProductTotal> = products
        .iter()
        .enumerate()
        .map(|(p, product)| ProductTotal {
            product: product.clone(),
            allocated: allocation.iter().map(|row| row[p]).sum(),
            demand: scenario.total_demand(p),
        })
        .collect();

    let satisfied = totals
        .iter()
        .filter(|t| t.is_satisfied())
        .map(|t| t.product.clone())
        .collect();
    let unsatisfied = totals
        .iter()
        .filter(|t| !t.is_satisfied())
        .map(|t| t.product.clone())
        .collect();

    let time_used = model
        .problem()
        .constraints
        .iter()
        .find(|c| c.name == TIME_CONSTRAINT)
        .map(|c| c.lhs(values))
        .unwrap_or(0.0);

    // Zero-demand pins are always tight and say nothing about the plan
    let binding_constraints = solution
        .binding_constraints
        .iter()
        .filter(|name| {
            model
                .problem()
                .constraints
                .iter()
                .any(|c| &c.name == *name && c.rhs > 0.0)
        })
        .cloned()
        .collect();

    Ok(AllocationReport {
        name: model.name().to_string(),
        objective_value,
        markets: markets.to_vec(),
        products: products.to_vec(),
        allocation,
        satisfied,
        unsatisfied,
        totals,
        binding_constraints,
        time_used,
    })
}

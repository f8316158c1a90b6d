use std::collections::HashSet;

use thiserror::Error;

/// Production minutes available to share across all products and markets
pub const DEFAULT_TIME_BUDGET: f64 = 50000.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Scenario has no products")]
    NoProducts,
    #[error("Scenario has no markets")]
    NoMarkets,
    #[error("Duplicate product: {0}")]
    DuplicateProduct(String),
    #[error("Duplicate market: {0}")]
    DuplicateMarket(String),
    #[error("Unknown product: {0}")]
    UnknownProduct(String),
    #[error("Unknown market: {0}")]
    UnknownMarket(String),
    #[error("Missing time per unit for product {0}")]
    MissingTime(String),
    #[error("Missing demand for product {product} in market {market}")]
    MissingDemand { market: String, product: String },
    #[error("Missing profit for product {product} in market {market}")]
    MissingProfit { market: String, product: String },
    #[error("{table} row {row} has {found} values, expected {expected}")]
    RowLength {
        table: String,
        row: String,
        expected: usize,
        found: usize,
    },
    #[error("Time per unit for product {product} must be positive, got {value}")]
    InvalidTime { product: String, value: f64 },
    #[error("Demand for product {product} in market {market} must be non-negative, got {value}")]
    InvalidDemand {
        market: String,
        product: String,
        value: f64,
    },
    #[error("Profit for product {product} in market {market} is not a finite number")]
    InvalidProfit { market: String, product: String },
    #[error("Time budget must be positive, got {0}")]
    InvalidCapacity(f64),
    #[error("Missing {field} for new product {product}")]
    MissingField { product: String, field: &'static str },
}

/// One complete planning instance: which products, which markets, and the
/// time, demand and profit data over them.
///
/// Demand and profit are stored market-major (`[market][product]`), matching
/// the layout of the input and output tables. A scenario is never mutated
/// once built; edits produce a new value (see [`crate::edit`]).
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "ScenarioFields"))]
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    products: Vec<String>,
    markets: Vec<String>,
    time_per_unit: Vec<f64>,
    demand: Vec<Vec<f64>>,
    profit: Vec<Vec<f64>>,
    capacity: f64,
}

/// Unchecked shape of a serialized scenario; deserializing goes through
/// [`Scenario::new`] so a scenario is never built without validation
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct ScenarioFields {
    products: Vec<String>,
    markets: Vec<String>,
    time_per_unit: Vec<f64>,
    demand: Vec<Vec<f64>>,
    profit: Vec<Vec<f64>>,
    capacity: f64,
}

#[cfg(feature = "serde")]
impl TryFrom<ScenarioFields> for Scenario {
    type Error = ValidationError;

    fn try_from(fields: ScenarioFields) -> Result<Self, Self::Error> {
        Scenario::new(
            fields.products,
            fields.markets,
            fields.time_per_unit,
            fields.demand,
            fields.profit,
        )?
        .with_capacity(fields.capacity)
    }
}

impl Scenario {
    /// Build a validated scenario with the default time budget.
    ///
    /// `time_per_unit` is indexed like `products`; `demand` and `profit` hold
    /// one row per market, each with one value per product.
    pub fn new(
        products: Vec<String>,
        markets: Vec<String>,
        time_per_unit: Vec<f64>,
        demand: Vec<Vec<f64>>,
        profit: Vec<Vec<f64>>,
    ) -> Result<Self, ValidationError> {
        let scenario = Self {
            products,
            markets,
            time_per_unit,
            demand,
            profit,
            capacity: DEFAULT_TIME_BUDGET,
        };
        scenario.validate()?;
        Ok(scenario)
    }

    /// The same scenario with a different time budget
    pub fn with_capacity(mut self, capacity: f64) -> Result<Self, ValidationError> {
        if !(capacity.is_finite() && capacity > 0.0) {
            return Err(ValidationError::InvalidCapacity(capacity));
        }
        self.capacity = capacity;
        Ok(self)
    }

    /// Check every shape and value invariant
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.products.is_empty() {
            return Err(ValidationError::NoProducts);
        }
        if self.markets.is_empty() {
            return Err(ValidationError::NoMarkets);
        }
        if !(self.capacity.is_finite() && self.capacity > 0.0) {
            return Err(ValidationError::InvalidCapacity(self.capacity));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = self.products.iter().find(|p| !seen.insert(p.as_str())) {
            return Err(ValidationError::DuplicateProduct(dup.clone()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.markets.iter().find(|m| !seen.insert(m.as_str())) {
            return Err(ValidationError::DuplicateMarket(dup.clone()));
        }

        if self.time_per_unit.len() > self.products.len() {
            return Err(ValidationError::RowLength {
                table: "time".to_string(),
                row: "Product".to_string(),
                expected: self.products.len(),
                found: self.time_per_unit.len(),
            });
        }
        for (p, product) in self.products.iter().enumerate() {
            let value = *self
                .time_per_unit
                .get(p)
                .ok_or_else(|| ValidationError::MissingTime(product.clone()))?;
            if !(value.is_finite() && value > 0.0) {
                return Err(ValidationError::InvalidTime {
                    product: product.clone(),
                    value,
                });
            }
        }

        self.validate_grid("demand", &self.demand)?;
        self.validate_grid("profit", &self.profit)?;

        for (m, market) in self.markets.iter().enumerate() {
            for (p, product) in self.products.iter().enumerate() {
                let demand = self.demand[m][p];
                if !(demand.is_finite() && demand >= 0.0) {
                    return Err(ValidationError::InvalidDemand {
                        market: market.clone(),
                        product: product.clone(),
                        value: demand,
                    });
                }
                if !self.profit[m][p].is_finite() {
                    return Err(ValidationError::InvalidProfit {
                        market: market.clone(),
                        product: product.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    fn validate_grid(&self, table: &str, grid: &[Vec<f64>]) -> Result<(), ValidationError> {
        let missing = |market: &str, product: &str| {
            let (market, product) = (market.to_string(), product.to_string());
            if table == "demand" {
                ValidationError::MissingDemand { market, product }
            } else {
                ValidationError::MissingProfit { market, product }
            }
        };

        if grid.len() > self.markets.len() {
            return Err(ValidationError::RowLength {
                table: table.to_string(),
                row: "Areas".to_string(),
                expected: self.markets.len(),
                found: grid.len(),
            });
        }
        for (m, market) in self.markets.iter().enumerate() {
            let row = grid.get(m).ok_or_else(|| missing(market, &self.products[0]))?;
            if row.len() < self.products.len() {
                return Err(missing(market, &self.products[row.len()]));
            }
            if row.len() > self.products.len() {
                return Err(ValidationError::RowLength {
                    table: table.to_string(),
                    row: market.clone(),
                    expected: self.products.len(),
                    found: row.len(),
                });
            }
        }
        Ok(())
    }

    pub fn products(&self) -> &[String] {
        &self.products
    }

    pub fn markets(&self) -> &[String] {
        &self.markets
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn product_index(&self, product: &str) -> Option<usize> {
        self.products.iter().position(|p| p == product)
    }

    pub fn market_index(&self, market: &str) -> Option<usize> {
        self.markets.iter().position(|m| m == market)
    }

    /// Minutes to produce one unit of the product at `product`
    pub fn time_per_unit(&self, product: usize) -> f64 {
        self.time_per_unit[product]
    }

    pub fn demand(&self, market: usize, product: usize) -> f64 {
        self.demand[market][product]
    }

    pub fn profit(&self, market: usize, product: usize) -> f64 {
        self.profit[market][product]
    }

    /// Demand for a product in every market, in market order
    pub fn demand_column(&self, product: usize) -> Vec<f64> {
        self.demand.iter().map(|row| row[product]).collect()
    }

    /// Profit for a product in every market, in market order
    pub fn profit_column(&self, product: usize) -> Vec<f64> {
        self.profit.iter().map(|row| row[product]).collect()
    }

    pub fn total_demand(&self, product: usize) -> f64 {
        self.demand.iter().map(|row| row[product]).sum()
    }

    /// Demand rows, one per market
    pub fn demand_rows(&self) -> &[Vec<f64>] {
        &self.demand
    }

    /// Profit rows, one per market
    pub fn profit_rows(&self) -> &[Vec<f64>] {
        &self.profit
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// Two products, two markets, each product sold in one market only
    pub(crate) fn split_scenario() -> Scenario {
        Scenario::new(
            names(&["A", "B"]),
            names(&["Area-1", "Area-2"]),
            vec![1.0, 1.0],
            vec![vec![10.0, 0.0], vec![0.0, 10.0]],
            vec![vec![5.0, 0.0], vec![0.0, 5.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_valid_scenario() {
        let scenario = split_scenario();
        assert_eq!(scenario.products(), &["A", "B"]);
        assert_eq!(scenario.markets(), &["Area-1", "Area-2"]);
        assert_eq!(scenario.capacity(), DEFAULT_TIME_BUDGET);
        assert_eq!(scenario.demand(1, 1), 10.0);
        assert_eq!(scenario.profit(0, 0), 5.0);
        assert_eq!(scenario.demand_column(0), vec![10.0, 0.0]);
        assert_eq!(scenario.total_demand(1), 10.0);
        assert_eq!(scenario.product_index("B"), Some(1));
        assert_eq!(scenario.market_index("Area-3"), None);
    }

    #[test]
    fn test_empty_products() {
        let result = Scenario::new(Vec::new(), names(&["Area-1"]), Vec::new(), vec![vec![]], vec![vec![]]);
        assert_eq!(result, Err(ValidationError::NoProducts));
    }

    #[test]
    fn test_empty_markets() {
        let result = Scenario::new(names(&["A"]), Vec::new(), vec![1.0], Vec::new(), Vec::new());
        assert_eq!(result, Err(ValidationError::NoMarkets));
    }

    #[test]
    fn test_missing_demand_entry() {
        let result = Scenario::new(
            names(&["A", "B"]),
            names(&["Area-1"]),
            vec![1.0, 2.0],
            vec![vec![3.0]],
            vec![vec![1.0, 1.0]],
        );
        assert_eq!(
            result,
            Err(ValidationError::MissingDemand {
                market: "Area-1".to_string(),
                product: "B".to_string(),
            })
        );
    }

    #[test]
    fn test_missing_profit_row() {
        let result = Scenario::new(
            names(&["A"]),
            names(&["Area-1", "Area-2"]),
            vec![1.0],
            vec![vec![3.0], vec![4.0]],
            vec![vec![1.0]],
        );
        assert_eq!(
            result,
            Err(ValidationError::MissingProfit {
                market: "Area-2".to_string(),
                product: "A".to_string(),
            })
        );
    }

    #[test]
    fn test_missing_time() {
        let result = Scenario::new(
            names(&["A", "B"]),
            names(&["Area-1"]),
            vec![1.0],
            vec![vec![3.0, 1.0]],
            vec![vec![1.0, 1.0]],
        );
        assert_eq!(result, Err(ValidationError::MissingTime("B".to_string())));
    }

    #[test]
    fn test_duplicate_product() {
        let result = Scenario::new(
            names(&["A", "A"]),
            names(&["Area-1"]),
            vec![1.0, 1.0],
            vec![vec![3.0, 1.0]],
            vec![vec![1.0, 1.0]],
        );
        assert_eq!(result, Err(ValidationError::DuplicateProduct("A".to_string())));
    }

    #[test]
    fn test_negative_demand_rejected() {
        let result = Scenario::new(
            names(&["A"]),
            names(&["Area-1"]),
            vec![1.0],
            vec![vec![-3.0]],
            vec![vec![1.0]],
        );
        assert!(matches!(result, Err(ValidationError::InvalidDemand { .. })));
    }

    #[test]
    fn test_non_positive_time_rejected() {
        let result = Scenario::new(names(&["A"]), names(&["Area-1"]), vec![0.0], vec![vec![3.0]], vec![vec![1.0]]);
        assert!(matches!(result, Err(ValidationError::InvalidTime { .. })));
    }

    #[test]
    fn test_with_capacity() {
        let scenario = split_scenario().with_capacity(15.0).unwrap();
        assert_eq!(scenario.capacity(), 15.0);

        assert_eq!(
            split_scenario().with_capacity(0.0),
            Err(ValidationError::InvalidCapacity(0.0))
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_validates() {
        let scenario = split_scenario().with_capacity(15.0).unwrap();
        let json = serde_json::to_string(&scenario).unwrap();
        assert_eq!(serde_json::from_str::<Scenario>(&json).unwrap(), scenario);

        // Second market row is one value short
        let ragged = r#"{"products": ["A", "B"], "markets": ["Area-1", "Area-2"],
            "time_per_unit": [1, 1], "demand": [[10, 0], [0]], "profit": [[5, 0], [0, 5]],
            "capacity": 50000}"#;
        assert!(serde_json::from_str::<Scenario>(ragged).is_err());

        let bad_capacity = json.replace("15.0", "-1.0");
        assert!(serde_json::from_str::<Scenario>(&bad_capacity).is_err());
    }
}

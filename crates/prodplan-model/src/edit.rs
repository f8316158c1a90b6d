//! Scenario edits for sensitivity analysis.
//!
//! Edits never touch the base scenario: each one validates and returns a new
//! [`Scenario`] so the original and the edited plan can be solved side by side.

use thiserror::Error;

use crate::scenario::{Scenario, ValidationError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditError {
    #[error("Invalid number: {0}")]
    InvalidNumber(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Rename a product and optionally replace its data. Fields left as `None`
/// keep the values of the original product.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductChange {
    pub product: String,
    pub new_name: String,
    /// Demand per market, in market order
    pub demand: Option<Vec<f64>>,
    /// Profit per market, in market order
    pub profit: Option<Vec<f64>>,
    pub time: Option<f64>,
}

impl ProductChange {
    pub fn new(product: impl Into<String>, new_name: impl Into<String>) -> Self {
        Self {
            product: product.into(),
            new_name: new_name.into(),
            demand: None,
            profit: None,
            time: None,
        }
    }

    pub fn demand(mut self, demand: Vec<f64>) -> Self {
        self.demand = Some(demand);
        self
    }

    pub fn profit(mut self, profit: Vec<f64>) -> Self {
        self.profit = Some(profit);
        self
    }

    pub fn time(mut self, time: f64) -> Self {
        self.time = Some(time);
        self
    }
}

/// A product to add. Demand, profit and time are all required; they are
/// optional here so incomplete input can be reported as a validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub demand: Option<Vec<f64>>,
    pub profit: Option<Vec<f64>>,
    pub time: Option<f64>,
}

impl NewProduct {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            demand: None,
            profit: None,
            time: None,
        }
    }

    pub fn demand(mut self, demand: Vec<f64>) -> Self {
        self.demand = Some(demand);
        self
    }

    pub fn profit(mut self, profit: Vec<f64>) -> Self {
        self.profit = Some(profit);
        self
    }

    pub fn time(mut self, time: f64) -> Self {
        self.time = Some(time);
        self
    }
}

impl Scenario {
    /// A copy of this scenario with one product renamed and, optionally,
    /// its demand, profit and time replaced
    pub fn change_product(&self, change: &ProductChange) -> Result<Scenario, ValidationError> {
        let p = self
            .product_index(&change.product)
            .ok_or_else(|| ValidationError::UnknownProduct(change.product.clone()))?;

        if let Some(row) = &change.demand {
            self.check_row_length("demand", &change.new_name, row)?;
        }
        if let Some(row) = &change.profit {
            self.check_row_length("profit", &change.new_name, row)?;
        }

        let mut products = self.products().to_vec();
        products[p] = change.new_name.clone();

        let mut time: Vec<f64> = (0..products.len()).map(|i| self.time_per_unit(i)).collect();
        if let Some(t) = change.time {
            time[p] = t;
        }

        let mut demand = self.demand_rows().to_vec();
        if let Some(row) = &change.demand {
            for (m, value) in row.iter().enumerate() {
                demand[m][p] = *value;
            }
        }

        let mut profit = self.profit_rows().to_vec();
        if let Some(row) = &change.profit {
            for (m, value) in row.iter().enumerate() {
                profit[m][p] = *value;
            }
        }

        Scenario::new(products, self.markets().to_vec(), time, demand, profit)?.with_capacity(self.capacity())
    }

    /// A copy of this scenario with one more product, appended after the
    /// existing ones
    pub fn introduce_product(&self, product: &NewProduct) -> Result<Scenario, ValidationError> {
        let missing = |field| ValidationError::MissingField {
            product: product.name.clone(),
            field,
        };
        let demand_row = product.demand.as_ref().ok_or_else(|| missing("demand"))?;
        let profit_row = product.profit.as_ref().ok_or_else(|| missing("profit"))?;
        let time = product.time.ok_or_else(|| missing("time"))?;

        if self.product_index(&product.name).is_some() {
            return Err(ValidationError::DuplicateProduct(product.name.clone()));
        }
        self.check_row_length("demand", &product.name, demand_row)?;
        self.check_row_length("profit", &product.name, profit_row)?;

        let mut products = self.products().to_vec();
        products.push(product.name.clone());

        let mut times: Vec<f64> = (0..self.products().len()).map(|i| self.time_per_unit(i)).collect();
        times.push(time);

        let demand: Vec<Vec<f64>> = self
            .demand_rows()
            .iter()
            .zip(demand_row)
            .map(|(row, value)| row.iter().copied().chain([*value]).collect::<Vec<f64>>())
            .collect();
        let profit: Vec<Vec<f64>> = self
            .profit_rows()
            .iter()
            .zip(profit_row)
            .map(|(row, value)| row.iter().copied().chain([*value]).collect::<Vec<f64>>())
            .collect();

        Scenario::new(products, self.markets().to_vec(), times, demand, profit)?.with_capacity(self.capacity())
    }

    fn check_row_length(&self, table: &str, product: &str, row: &[f64]) -> Result<(), ValidationError> {
        if row.len() != self.markets().len() {
            return Err(ValidationError::RowLength {
                table: table.to_string(),
                row: product.to_string(),
                expected: self.markets().len(),
                found: row.len(),
            });
        }
        Ok(())
    }
}

/// Parse whitespace-separated numbers. Blank input means "not given".
pub fn parse_row(input: &str) -> Result<Option<Vec<f64>>, EditError> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    input
        .split_whitespace()
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|_| EditError::InvalidNumber(token.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Parse a single number. Blank input means "not given".
pub fn parse_value(input: &str) -> Result<Option<f64>, EditError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<f64>()
        .map(Some)
        .map_err(|_| EditError::InvalidNumber(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::tests::split_scenario;

    #[test]
    fn test_rename_keeps_data() {
        let base = split_scenario();
        let changed = base.change_product(&ProductChange::new("A", "C")).unwrap();

        assert_eq!(changed.products(), &["C", "B"]);
        assert_eq!(changed.demand_column(0), base.demand_column(0));
        assert_eq!(changed.profit_column(0), base.profit_column(0));
        assert_eq!(changed.time_per_unit(0), base.time_per_unit(0));
        assert_eq!(changed.capacity(), base.capacity());
        // Base is untouched
        assert_eq!(base.products(), &["A", "B"]);
    }

    #[test]
    fn test_change_replaces_given_fields() {
        let base = split_scenario();
        let change = ProductChange::new("B", "B2").demand(vec![3.0, 4.0]).time(2.5);
        let changed = base.change_product(&change).unwrap();

        assert_eq!(changed.demand_column(1), vec![3.0, 4.0]);
        assert_eq!(changed.profit_column(1), base.profit_column(1));
        assert_eq!(changed.time_per_unit(1), 2.5);
        assert_eq!(base.demand_column(1), vec![0.0, 10.0]);
    }

    #[test]
    fn test_change_unknown_product() {
        let result = split_scenario().change_product(&ProductChange::new("Q", "R"));
        assert_eq!(result, Err(ValidationError::UnknownProduct("Q".to_string())));
    }

    #[test]
    fn test_change_to_existing_name_is_duplicate() {
        let result = split_scenario().change_product(&ProductChange::new("A", "B"));
        assert_eq!(result, Err(ValidationError::DuplicateProduct("B".to_string())));
    }

    #[test]
    fn test_change_with_short_row() {
        let result = split_scenario().change_product(&ProductChange::new("A", "A").profit(vec![1.0]));
        assert!(matches!(result, Err(ValidationError::RowLength { .. })));
    }

    #[test]
    fn test_introduce_product() {
        let base = split_scenario();
        let product = NewProduct::new("C").demand(vec![1.0, 2.0]).profit(vec![3.0, 4.0]).time(0.5);
        let changed = base.introduce_product(&product).unwrap();

        assert_eq!(changed.products(), &["A", "B", "C"]);
        assert_eq!(changed.demand_column(2), vec![1.0, 2.0]);
        assert_eq!(changed.profit_column(2), vec![3.0, 4.0]);
        assert_eq!(changed.time_per_unit(2), 0.5);
        assert_eq!(base.products().len(), 2);
    }

    #[test]
    fn test_introduce_requires_every_field() {
        let base = split_scenario();
        let product = NewProduct::new("C").demand(vec![1.0, 2.0]);

        assert_eq!(
            base.introduce_product(&product),
            Err(ValidationError::MissingField {
                product: "C".to_string(),
                field: "profit",
            })
        );
        assert_eq!(base, split_scenario());
    }

    #[test]
    fn test_parse_row() {
        assert_eq!(parse_row("1 2.5  3"), Ok(Some(vec![1.0, 2.5, 3.0])));
        assert_eq!(parse_row("   "), Ok(None));
        assert_eq!(parse_row("1 x"), Err(EditError::InvalidNumber("x".to_string())));
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value(" 1.25\n"), Ok(Some(1.25)));
        assert_eq!(parse_value(""), Ok(None));
        assert_eq!(parse_value("fast"), Err(EditError::InvalidNumber("fast".to_string())));
    }
}

//! Plain table shapes exchanged with the load/save boundary, and conversion
//! to and from validated scenarios.

use std::fmt::Write;

use crate::extract::AllocationReport;
use crate::scenario::{Scenario, ValidationError};

/// Heading of the market column in market tables
pub const AREA_LABEL: &str = "Areas";

/// Minutes per unit for each product
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeTable {
    pub rows: Vec<TimeRow>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct TimeRow {
    pub product: String,
    pub minutes: f64,
}

/// A market-by-product table: demand, profit or a solved allocation
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct MarketTable {
    /// Heading of the market column
    #[cfg_attr(feature = "serde", serde(default = "default_label"))]
    pub label: String,
    /// Column headings
    pub products: Vec<String>,
    pub rows: Vec<MarketRow>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct MarketRow {
    /// Market label as it appears in the source table
    pub area: String,
    /// One value per product column
    pub values: Vec<f64>,
}

#[cfg(feature = "serde")]
fn default_label() -> String {
    AREA_LABEL.to_string()
}

/// The three input tables of a scenario
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioTables {
    pub time: TimeTable,
    pub demand: MarketTable,
    pub profit: MarketTable,
}

/// Market identifier for a table row label: the first word is dropped and
/// the rest joined with hyphens, so "Sales Area 1" becomes "Area-1".
/// Single-word labels are kept as they are.
pub fn market_id(label: &str) -> String {
    let words: Vec<&str> = label.split_whitespace().collect();
    if words.len() < 2 {
        return label.trim().to_string();
    }
    words[1..].join("-")
}

impl MarketTable {
    pub fn new(products: Vec<String>) -> Self {
        Self {
            label: AREA_LABEL.to_string(),
            products,
            rows: Vec::new(),
        }
    }

    pub fn with_row(mut self, area: impl Into<String>, values: Vec<f64>) -> Self {
        self.rows.push(MarketRow {
            area: area.into(),
            values,
        });
        self
    }

    /// Space-separated text with a heading line
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = write!(out, "{}", self.label);
        for product in &self.products {
            let _ = write!(out, " {}", product);
        }
        out.push('\n');
        for row in &self.rows {
            out.push_str(&row.area);
            for value in &row.values {
                let _ = write!(out, " {}", value);
            }
            out.push('\n');
        }
        out
    }

    /// Reorder this table's values into `products` x `markets` order.
    /// `missing` builds the error for a pair without a value.
    fn to_grid(
        &self,
        products: &[String],
        markets: &[String],
        missing: impl Fn(&str, &str) -> ValidationError,
    ) -> Result<Vec<Vec<f64>>, ValidationError> {
        if let Some(unknown) = self.products.iter().find(|c| !products.contains(c)) {
            return Err(ValidationError::UnknownProduct(unknown.clone()));
        }
        for (i, column) in self.products.iter().enumerate() {
            if self.products[..i].contains(column) {
                return Err(ValidationError::DuplicateProduct(column.clone()));
            }
        }
        let columns: Vec<Option<usize>> = products
            .iter()
            .map(|p| self.products.iter().position(|c| c == p))
            .collect();

        let mut seen: Vec<String> = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            let market = market_id(&row.area);
            if seen.contains(&market) {
                return Err(ValidationError::DuplicateMarket(market));
            }
            seen.push(market);

            if row.values.len() != self.products.len() {
                return Err(ValidationError::RowLength {
                    table: self.label.clone(),
                    row: row.area.clone(),
                    expected: self.products.len(),
                    found: row.values.len(),
                });
            }
            if !markets.contains(&market_id(&row.area)) {
                return Err(ValidationError::UnknownMarket(market_id(&row.area)));
            }
        }

        let mut grid = Vec::with_capacity(markets.len());
        for market in markets {
            let row = self.rows.iter().find(|r| &market_id(&r.area) == market);
            let mut values = Vec::with_capacity(products.len());
            for (product, column) in products.iter().zip(&columns) {
                match (row, column) {
                    (Some(row), Some(c)) => values.push(row.values[*c]),
                    _ => return Err(missing(market, product)),
                }
            }
            grid.push(values);
        }
        Ok(grid)
    }
}

impl TimeTable {
    pub fn with_row(mut self, product: impl Into<String>, minutes: f64) -> Self {
        self.rows.push(TimeRow {
            product: product.into(),
            minutes,
        });
        self
    }

    /// Space-separated text with a heading line
    pub fn to_text(&self) -> String {
        let mut out = String::from("Product Time(Mins)\n");
        for row in &self.rows {
            let _ = writeln!(out, "{} {}", row.product, row.minutes);
        }
        out
    }
}

impl Scenario {
    /// Build a scenario from loaded tables.
    ///
    /// Products come from the time table, markets from the demand table rows
    /// (labels transformed with [`market_id`]). The profit table must cover
    /// the same markets and both market tables every product.
    pub fn from_tables(tables: &ScenarioTables) -> Result<Scenario, ValidationError> {
        let products: Vec<String> = tables.time.rows.iter().map(|r| r.product.clone()).collect();
        let markets: Vec<String> = tables.demand.rows.iter().map(|r| market_id(&r.area)).collect();
        let time = tables.time.rows.iter().map(|r| r.minutes).collect();

        if products.is_empty() {
            return Err(ValidationError::NoProducts);
        }
        if markets.is_empty() {
            return Err(ValidationError::NoMarkets);
        }

        let demand = tables.demand.to_grid(&products, &markets, |market, product| {
            ValidationError::MissingDemand {
                market: market.to_string(),
                product: product.to_string(),
            }
        })?;
        let profit = tables.profit.to_grid(&products, &markets, |market, product| {
            ValidationError::MissingProfit {
                market: market.to_string(),
                product: product.to_string(),
            }
        })?;

        Scenario::new(products, markets, time, demand, profit)
    }

    /// The scenario as tables, with market identifiers as row labels
    pub fn to_tables(&self) -> ScenarioTables {
        let time = self
            .products()
            .iter()
            .enumerate()
            .fold(TimeTable::default(), |table, (p, product)| {
                table.with_row(product.as_str(), self.time_per_unit(p))
            });

        let market_table = |rows: &[Vec<f64>]| {
            self.markets()
                .iter()
                .zip(rows)
                .fold(MarketTable::new(self.products().to_vec()), |table, (market, row)| {
                    table.with_row(market.as_str(), row.clone())
                })
        };

        ScenarioTables {
            time,
            demand: market_table(self.demand_rows()),
            profit: market_table(self.profit_rows()),
        }
    }
}

impl AllocationReport {
    /// The allocation as an output table, markets as rows
    pub fn to_table(&self) -> MarketTable {
        self.markets
            .iter()
            .zip(&self.allocation)
            .fold(MarketTable::new(self.products.clone()), |table, (market, row)| {
                table.with_row(market.as_str(), row.clone())
            })
    }
}

pub mod edit;
pub mod extract;
pub mod model;
pub mod report;
pub mod scenario;
pub mod tables;

pub use edit::{parse_row, parse_value, EditError, NewProduct, ProductChange};
pub use extract::{extract, AllocationReport, ExtractError, ProductTotal, SATISFACTION_TOLERANCE};
pub use model::{AllocationKey, ModelBuilder, ProductionModel, VariableRegistry, TIME_CONSTRAINT};
pub use report::{render_report, Comparison};
pub use scenario::{Scenario, ValidationError, DEFAULT_TIME_BUDGET};
pub use tables::{market_id, MarketRow, MarketTable, ScenarioTables, TimeRow, TimeTable, AREA_LABEL};

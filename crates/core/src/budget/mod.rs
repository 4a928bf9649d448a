//! Budget aggregation: category drill-down rows and the yearly summary.

pub mod aggregator;
pub mod types;

#[cfg(test)]
mod aggregator_props;

pub use aggregator::{category_rows, net_spend_by_category, summary, total_net_spend};
pub use types::{BudgetSummary, CategoryRow, CategoryStatus, UNKNOWN_CATEGORY};

//! Display shapes produced by the Aggregator.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use carebudget_shared::types::{CategoryId, Money};

/// Name shown for categories that have spend but no allocation record.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// How a category's net spend compares to its allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryStatus {
    /// Spent less than allocated.
    UnderBudget,
    /// Spent exactly the allocation.
    OnBudget,
    /// Spent more than allocated.
    Exceeded,
}

impl CategoryStatus {
    /// Compares unrounded spend to allocation.
    #[must_use]
    pub fn from_amounts(allocated: Money, spent: Money) -> Self {
        match spent.cmp(&allocated) {
            std::cmp::Ordering::Less => Self::UnderBudget,
            std::cmp::Ordering::Equal => Self::OnBudget,
            std::cmp::Ordering::Greater => Self::Exceeded,
        }
    }
}

/// Per-category drill-down row, amounts rounded to whole currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRow {
    /// Category identifier.
    pub category_id: CategoryId,
    /// Row label.
    pub item: String,
    /// Category name.
    pub category: String,
    /// Allocation in whole units.
    pub allocated: i64,
    /// Net spend in whole units.
    pub spent: i64,
    /// Spend compared to allocation.
    pub status: CategoryStatus,
}

/// Client/year budget summary, amounts rounded to whole currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetSummary {
    /// Annual allocation.
    pub annual_allocated: i64,
    /// Net spend recomputed from transactions.
    pub spent: i64,
    /// Allocation left, never negative.
    pub remaining: i64,
    /// Unallocated or overridden surplus, never negative.
    pub surplus: i64,
    /// Carryover from the prior year, unrounded.
    #[serde(with = "rust_decimal::serde::float")]
    pub opening_carryover: Decimal,
}

impl BudgetSummary {
    /// Summary for a client/year with no budget configured yet.
    pub const ZERO: Self = Self {
        annual_allocated: 0,
        spent: 0,
        remaining: 0,
        surplus: 0,
        opening_carryover: Decimal::ZERO,
    };
}

impl Default for BudgetSummary {
    fn default() -> Self {
        Self::ZERO
    }
}

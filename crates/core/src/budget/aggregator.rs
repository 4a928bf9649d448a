//! Aggregator: net spend per category and the client/year summary.
//!
//! Spend is always recomputed from transactions. The stored
//! `totals.spent` on a budget year is never read here.

use carebudget_shared::types::{CategoryId, Money};
use tracing::warn;

use super::types::{BudgetSummary, CategoryRow, CategoryStatus, UNKNOWN_CATEGORY};
use crate::ledger::{BudgetYear, Transaction};

/// Net spend per category over non-voided transactions.
///
/// Each line contributes `+amount` when its transaction is a purchase and
/// `-amount` when it is a refund. Categories appear in first-seen order.
#[must_use]
pub fn net_spend_by_category(transactions: &[Transaction]) -> Vec<(CategoryId, Money)> {
    let mut spend: Vec<(CategoryId, Money)> = Vec::new();

    for tx in transactions.iter().filter(|tx| !tx.is_voided()) {
        for line in &tx.lines {
            let signed = tx.transaction_type.signed(line.amount);
            match spend.iter_mut().find(|(id, _)| *id == line.category_id) {
                Some((_, total)) => *total += signed,
                None => spend.push((line.category_id.clone(), signed)),
            }
        }
    }

    spend
}

/// Net spend across all categories.
#[must_use]
pub fn total_net_spend(transactions: &[Transaction]) -> Money {
    transactions
        .iter()
        .filter(|tx| !tx.is_voided())
        .flat_map(|tx| tx.lines.iter().map(|l| tx.transaction_type.signed(l.amount)))
        .sum()
}

fn row(category_id: CategoryId, name: &str, allocated: Money, spent: Money) -> CategoryRow {
    CategoryRow {
        category_id,
        item: name.to_string(),
        category: name.to_string(),
        allocated: allocated.round_to_units(),
        spent: spent.round_to_units(),
        status: CategoryStatus::from_amounts(allocated, spent),
    }
}

/// Category rows for a client/year.
///
/// Empty without a budget year. Configured categories come first in their
/// stored order; categories with spend but no allocation follow as
/// "Unknown" rows with zero allocation.
#[must_use]
pub fn category_rows(budget: Option<&BudgetYear>, transactions: &[Transaction]) -> Vec<CategoryRow> {
    let Some(budget) = budget else {
        return Vec::new();
    };

    let spend = net_spend_by_category(transactions);
    let spent_for = |id: &CategoryId| {
        spend
            .iter()
            .find(|(category_id, _)| category_id == id)
            .map_or(Money::ZERO, |(_, amount)| *amount)
    };

    let mut rows: Vec<CategoryRow> = budget
        .categories
        .iter()
        .map(|c| {
            row(
                c.category_id.clone(),
                &c.category_name,
                c.allocated,
                spent_for(&c.category_id),
            )
        })
        .collect();

    for (category_id, spent) in spend {
        if budget.category(&category_id).is_none() {
            warn!(
                client_id = %budget.client_id,
                year = budget.year,
                category_id = %category_id,
                "spend recorded against a category with no allocation"
            );
            rows.push(row(category_id, UNKNOWN_CATEGORY, Money::ZERO, spent));
        }
    }

    rows
}

/// Summary for a client/year.
///
/// Without a budget year the zero summary is returned. Otherwise spend is
/// recomputed from transactions and `remaining` is clamped at zero; overspend
/// shows up in the category rows instead.
#[must_use]
pub fn summary(budget: Option<&BudgetYear>, transactions: &[Transaction]) -> BudgetSummary {
    let Some(budget) = budget else {
        return BudgetSummary::ZERO;
    };

    let annual_allocated = budget.annual_allocated.round_to_units();
    let spent = total_net_spend(transactions).round_to_units();

    BudgetSummary {
        annual_allocated,
        spent,
        remaining: annual_allocated.saturating_sub(spent).max(0),
        surplus: budget.surplus().round_to_units(),
        opening_carryover: budget.opening_carryover.to_decimal(),
    }
}

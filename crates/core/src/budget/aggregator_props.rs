//! Property-based tests for the Aggregator.
//!
//! - Signed-sum rule: per-category net spend equals purchases minus refunds.
//! - Summary `remaining` is never negative.
//! - Category rows sum to the summary spend before rounding.

use chrono::Utc;
use proptest::prelude::*;

use carebudget_shared::types::{BudgetYearId, CategoryId, ClientId, Money};

use super::aggregator::{net_spend_by_category, summary, total_net_spend};
use crate::ledger::{BudgetTotals, BudgetYear, Transaction, TransactionType};
use crate::testing::{CLIENT, YEAR, date, purchase, refund};

fn category() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("hygiene"), Just("transport"), Just("respite"), Just("meals")]
}

/// A ledger of purchases, each optionally followed by a partial refund.
fn ledger() -> impl Strategy<Value = Vec<Transaction>> {
    prop::collection::vec((category(), 1i64..1_000, 0i64..=100), 0..12).prop_map(|specs| {
        let mut txs = Vec::new();
        for (cat, units, refund_pct) in specs {
            let p = purchase(date(4, 1), &[(cat, units)]);
            let refund_minor = units * refund_pct;
            if refund_minor > 0 {
                let r = refund(date(4, 2), &p, 0, Money::from_minor(refund_minor));
                txs.push(p);
                txs.push(r);
            } else {
                txs.push(p);
            }
        }
        txs
    })
}

fn budget(annual_units: i64) -> BudgetYear {
    BudgetYear {
        id: BudgetYearId::new(),
        client_id: ClientId::new(CLIENT),
        year: YEAR,
        annual_allocated: Money::from_units(annual_units),
        opening_carryover: Money::ZERO,
        categories: Vec::new(),
        totals: BudgetTotals::default(),
        surplus_override: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_signed_sum_matches_purchases_minus_refunds(txs in ledger()) {
        for (category_id, net) in net_spend_by_category(&txs) {
            let sum_of = |kind: TransactionType| -> Money {
                txs.iter()
                    .filter(|tx| tx.transaction_type == kind)
                    .flat_map(|tx| tx.lines.iter())
                    .filter(|l| l.category_id == category_id)
                    .map(|l| l.amount)
                    .sum()
            };
            prop_assert_eq!(net, sum_of(TransactionType::Purchase) - sum_of(TransactionType::Refund));
        }
    }

    #[test]
    fn prop_category_spend_sums_to_total(txs in ledger()) {
        let by_category: Money = net_spend_by_category(&txs).iter().map(|(_, m)| *m).sum();
        prop_assert_eq!(by_category, total_net_spend(&txs));
    }

    #[test]
    fn prop_remaining_never_negative(txs in ledger(), annual in 0i64..5_000) {
        let s = summary(Some(&budget(annual)), &txs);
        prop_assert!(s.remaining >= 0);
        prop_assert!(s.surplus >= 0);
        prop_assert_eq!(s.remaining, (s.annual_allocated - s.spent).max(0));
    }

    #[test]
    fn prop_unknown_category_never_panics(txs in ledger()) {
        let rows = super::aggregator::category_rows(Some(&budget(100)), &txs);
        let distinct: std::collections::HashSet<CategoryId> =
            txs.iter().flat_map(|tx| tx.lines.iter().map(|l| l.category_id.clone())).collect();
        prop_assert_eq!(rows.len(), distinct.len());
    }
}

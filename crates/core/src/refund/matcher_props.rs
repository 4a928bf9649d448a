//! Property-based tests for the Refund Matcher.
//!
//! - No double refund: applying any sequence of refund attempts through
//!   `check_refund` never lets refunds exceed the purchase line.
//! - Remaining refundable is exactly original minus accepted refunds.
//! - A refund of the full amount removes the line from refundable lines.

use proptest::prelude::*;

use carebudget_shared::types::Money;

use super::matcher::{check_refund, refundable_lines, refunded_totals};
use crate::ledger::{LedgerError, RefundRef};
use crate::testing::{date, purchase, refund, voided};

/// Strategy to generate a refund attempt (0.01 to 300.00).
fn attempt_amount() -> impl Strategy<Value = Money> {
    (1i64..30_000i64).prop_map(Money::from_minor)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_no_double_refund(
        original_units in 1i64..500,
        attempts in prop::collection::vec((attempt_amount(), any::<bool>()), 1..20),
    ) {
        let p = purchase(date(5, 1), &[("hygiene", original_units)]);
        let target = RefundRef::new(p.id, p.lines[0].line_id);
        let original = Money::from_units(original_units);
        let mut ledger = vec![p.clone()];

        for (amount, void_afterwards) in attempts {
            let before = refunded_totals(&ledger).get(&target).copied().unwrap_or_default();
            match check_refund(&ledger, [(target, amount)]) {
                Ok(()) => {
                    prop_assert!(before + amount <= original);
                    let r = refund(date(5, 2), &p, 0, amount);
                    ledger.push(if void_afterwards { voided(r) } else { r });
                }
                Err(LedgerError::OverRefund { remaining_refundable, .. }) => {
                    prop_assert_eq!(remaining_refundable, original - before);
                    prop_assert!(amount > remaining_refundable);
                }
                Err(other) => prop_assert!(false, "unexpected error: {other:?}"),
            }

            let refunded = refunded_totals(&ledger).get(&target).copied().unwrap_or_default();
            prop_assert!(refunded <= original, "refunded {} exceeds {}", refunded, original);
        }
    }

    #[test]
    fn prop_remaining_matches_accepted_refunds(
        original_units in 1i64..500,
        amounts in prop::collection::vec(attempt_amount(), 0..10),
    ) {
        let p = purchase(date(5, 1), &[("hygiene", original_units)]);
        let target = RefundRef::new(p.id, p.lines[0].line_id);
        let original = Money::from_units(original_units);
        let mut ledger = vec![p.clone()];
        let mut accepted = Money::ZERO;

        for amount in amounts {
            if check_refund(&ledger, [(target, amount)]).is_ok() {
                ledger.push(refund(date(5, 3), &p, 0, amount));
                accepted += amount;
            }
        }

        let lines = refundable_lines(&ledger);
        if accepted == original {
            prop_assert!(lines.is_empty());
        } else {
            prop_assert_eq!(lines.len(), 1);
            prop_assert_eq!(lines[0].refunded_so_far, accepted);
            prop_assert_eq!(lines[0].remaining_refundable, original - accepted);
        }
    }

    #[test]
    fn prop_full_refund_round_trip(original_units in 1i64..10_000) {
        let p = purchase(date(5, 1), &[("hygiene", original_units)]);
        let r = refund(date(5, 2), &p, 0, Money::from_units(original_units));
        prop_assert!(refundable_lines(&[p, r]).is_empty());
    }
}

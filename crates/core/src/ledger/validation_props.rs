//! Property-based tests for ledger write validation.
//!
//! - Slug normalization is idempotent and never leaves surrounding whitespace.
//! - Non-positive amounts always reject the whole transaction.
//! - Valid transactions keep line order and amounts.

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;

use carebudget_shared::types::{ClientId, Money, UserId};

use super::error::LedgerError;
use super::types::{LineInput, NewTransaction, TransactionType};
use super::validation::{build_transaction, normalize_slug};

/// Strategy to generate a positive amount (0.01 to 100,000.00).
fn positive_amount() -> impl Strategy<Value = Money> {
    (1i64..10_000_000i64).prop_map(Money::from_minor)
}

/// Strategy to generate a zero or negative amount.
fn non_positive_amount() -> impl Strategy<Value = Money> {
    (-10_000_000i64..=0i64).prop_map(Money::from_minor)
}

/// Strategy to generate a slug with random casing and padding.
fn raw_slug() -> impl Strategy<Value = String> {
    ("[ \t]{0,3}", "[a-zA-Z][a-zA-Z0-9-]{0,15}", "[ \t]{0,3}")
        .prop_map(|(lead, body, trail)| format!("{lead}{body}{trail}"))
}

fn purchase(lines: Vec<LineInput>) -> NewTransaction {
    NewTransaction {
        client_id: ClientId::new("client-1"),
        year: 2025,
        date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        transaction_type: TransactionType::Purchase,
        created_by_user_id: UserId::new("user-1"),
        lines,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_normalize_slug_idempotent(slug in raw_slug()) {
        let once = normalize_slug(&slug);
        prop_assert_eq!(normalize_slug(&once), once.clone());
        prop_assert_eq!(once.trim(), once.as_str());
        prop_assert_eq!(once.to_lowercase(), once.clone());
    }

    #[test]
    fn prop_non_positive_amount_rejects_transaction(
        good in prop::collection::vec(positive_amount(), 0..4),
        bad in non_positive_amount(),
        position in 0usize..5,
    ) {
        let mut lines: Vec<LineInput> = good
            .into_iter()
            .map(|amount| LineInput::purchase("hygiene", "soap", amount))
            .collect();
        let position = position.min(lines.len());
        lines.insert(position, LineInput::purchase("hygiene", "soap", bad));

        let result = build_transaction(purchase(lines), Utc::now());
        prop_assert!(
            matches!(result, Err(LedgerError::Validation(_))),
            "non-positive amount should be rejected, got: {:?}",
            result
        );
    }

    #[test]
    fn prop_valid_transaction_preserves_lines(
        amounts in prop::collection::vec(positive_amount(), 1..8),
        slug in raw_slug(),
    ) {
        let lines: Vec<LineInput> = amounts
            .iter()
            .map(|amount| LineInput::purchase("hygiene", slug.clone(), *amount))
            .collect();

        let tx = build_transaction(purchase(lines), Utc::now()).unwrap();
        let stored: Vec<Money> = tx.lines.iter().map(|l| l.amount).collect();
        prop_assert_eq!(stored, amounts.clone());
        prop_assert_eq!(tx.total(), amounts.iter().sum::<Money>());
        prop_assert!(tx.lines.iter().all(|l| l.care_item_slug == normalize_slug(&slug)));
    }
}

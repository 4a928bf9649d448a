//! Input validation for ledger writes.
//!
//! Both store implementations run every write through these functions, so a
//! transaction that reaches storage is already normalized: slugs trimmed and
//! lowercased, labels trimmed, ids assigned.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use carebudget_shared::types::{ClientId, LineId, Money, TransactionId};

use super::error::LedgerError;
use super::types::{
    AllocationInput, BudgetKey, LedgerLine, LineInput, NewTransaction, Transaction,
    TransactionType,
};

/// Smallest accepted budget year.
pub const MIN_YEAR: i32 = 1;

/// Largest accepted budget year.
pub const MAX_YEAR: i32 = 9999;

fn check_limit(field: &str, amount: Money) -> Result<(), LedgerError> {
    if !amount.is_within_limit() {
        return Err(LedgerError::validation(format!(
            "{field} must not exceed {}",
            Money::MAX
        )));
    }
    Ok(())
}

/// Normalizes a care item slug: trimmed, lowercase.
#[must_use]
pub fn normalize_slug(slug: &str) -> String {
    slug.trim().to_lowercase()
}

/// Validates a client id.
///
/// # Errors
///
/// Returns `LedgerError::Validation` if the id is blank.
pub fn validate_client_id(client_id: &ClientId) -> Result<(), LedgerError> {
    if client_id.is_blank() {
        return Err(LedgerError::validation("clientId is required"));
    }
    Ok(())
}

/// Validates a budget year.
///
/// # Errors
///
/// Returns `LedgerError::Validation` if the year is outside `1..=9999`.
pub fn validate_year(year: i32) -> Result<(), LedgerError> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(LedgerError::validation(format!(
            "year must be between {MIN_YEAR} and {MAX_YEAR}, got {year}"
        )));
    }
    Ok(())
}

/// Validates a scope key.
///
/// # Errors
///
/// Returns `LedgerError::Validation` for a blank client or an invalid year.
pub fn validate_key(key: &BudgetKey) -> Result<(), LedgerError> {
    validate_client_id(&key.client_id)?;
    validate_year(key.year)
}

/// Validates an allocation write.
///
/// Over-allocation (categories summing past the annual budget) is accepted.
///
/// # Errors
///
/// Returns `LedgerError::Validation` for negative or oversized amounts,
/// blank or duplicate category ids.
pub fn validate_allocation(allocation: &AllocationInput) -> Result<(), LedgerError> {
    if allocation.annual_allocated.is_negative() {
        return Err(LedgerError::validation("annualAllocated must not be negative"));
    }
    if allocation.opening_carryover.is_negative() {
        return Err(LedgerError::validation("openingCarryover must not be negative"));
    }
    check_limit("annualAllocated", allocation.annual_allocated)?;
    check_limit("openingCarryover", allocation.opening_carryover)?;
    if let Some(surplus) = allocation.surplus_override {
        check_limit("surplusOverride", surplus)?;
    }

    let mut seen = HashSet::with_capacity(allocation.categories.len());
    for category in &allocation.categories {
        if category.category_id.is_blank() {
            return Err(LedgerError::validation("categoryId is required"));
        }
        if category.allocated.is_negative() {
            return Err(LedgerError::validation(format!(
                "allocation for category {} must not be negative",
                category.category_id
            )));
        }
        check_limit(
            &format!("allocation for category {}", category.category_id),
            category.allocated,
        )?;
        if !seen.insert(&category.category_id) {
            return Err(LedgerError::validation(format!(
                "category {} appears more than once",
                category.category_id
            )));
        }
    }

    Ok(())
}

fn build_line(
    index: usize,
    line: LineInput,
    transaction_type: TransactionType,
) -> Result<LedgerLine, LedgerError> {
    if line.category_id.is_blank() {
        return Err(LedgerError::validation(format!(
            "line {index}: categoryId is required"
        )));
    }

    let care_item_slug = normalize_slug(&line.care_item_slug);
    if care_item_slug.is_empty() {
        return Err(LedgerError::validation(format!(
            "line {index}: careItemSlug is required"
        )));
    }

    if !line.amount.is_positive() {
        return Err(LedgerError::validation(format!(
            "line {index}: amount must be greater than zero"
        )));
    }
    check_limit(&format!("line {index}: amount"), line.amount)?;

    match (transaction_type, line.refund_of) {
        (TransactionType::Purchase, Some(_)) => {
            return Err(LedgerError::validation(format!(
                "line {index}: purchase lines cannot reference a refunded line"
            )));
        }
        (TransactionType::Refund, None) => {
            return Err(LedgerError::validation(format!(
                "line {index}: refund lines must reference a purchase line"
            )));
        }
        _ => {}
    }

    let label = line
        .label
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty());

    Ok(LedgerLine {
        line_id: LineId::new(),
        category_id: line.category_id,
        care_item_slug,
        label,
        amount: line.amount,
        refund_of: line.refund_of,
    })
}

/// Validates a new transaction and turns it into a storable record.
///
/// All-or-nothing: the first invalid line rejects the whole transaction.
///
/// # Errors
///
/// Returns `LedgerError::Validation` for blank identities, an invalid year,
/// an empty line list, non-positive or oversized amounts, or a line whose refund reference
/// does not match the transaction type.
pub fn build_transaction(
    input: NewTransaction,
    created_at: DateTime<Utc>,
) -> Result<Transaction, LedgerError> {
    validate_client_id(&input.client_id)?;
    validate_year(input.year)?;

    if input.created_by_user_id.is_blank() {
        return Err(LedgerError::validation("userId is required"));
    }
    if input.lines.is_empty() {
        return Err(LedgerError::validation(
            "transaction must have at least one line",
        ));
    }

    let transaction_type = input.transaction_type;
    let lines = input
        .lines
        .into_iter()
        .enumerate()
        .map(|(index, line)| build_line(index, line, transaction_type))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Transaction {
        id: TransactionId::new(),
        client_id: input.client_id,
        year: input.year,
        date: input.date,
        transaction_type,
        created_by_user_id: input.created_by_user_id,
        created_at,
        voided_at: None,
        lines,
    })
}

/// Sum of line amounts, used for log fields.
#[must_use]
pub fn line_total(lines: &[LineInput]) -> Money {
    lines.iter().map(|l| l.amount).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::types::{CategoryAllocation, RefundRef};
    use carebudget_shared::types::UserId;
    use chrono::NaiveDate;
    use rstest::rstest;

    fn purchase(lines: Vec<LineInput>) -> NewTransaction {
        NewTransaction {
            client_id: ClientId::new("client-1"),
            year: 2025,
            date: NaiveDate::from_ymd_opt(2025, 4, 2).unwrap(),
            transaction_type: TransactionType::Purchase,
            created_by_user_id: UserId::new("user-1"),
            lines,
        }
    }

    #[test]
    fn test_build_transaction_normalizes_lines() {
        let tx = build_transaction(
            purchase(vec![
                LineInput::purchase("hygiene", "  Soap-Bar ", Money::from_units(12))
                    .with_label("  Weekly shop "),
                LineInput::purchase("transport", "Taxi", Money::from_minor(1950)).with_label("   "),
            ]),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(tx.lines.len(), 2);
        assert_eq!(tx.lines[0].care_item_slug, "soap-bar");
        assert_eq!(tx.lines[0].label.as_deref(), Some("Weekly shop"));
        assert_eq!(tx.lines[1].care_item_slug, "taxi");
        assert_eq!(tx.lines[1].label, None);
        assert_ne!(tx.lines[0].line_id, tx.lines[1].line_id);
        assert!(!tx.is_voided());
    }

    #[test]
    fn test_build_transaction_rejects_empty_lines() {
        let err = build_transaction(purchase(vec![]), Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[rstest]
    #[case(0)]
    #[case(-1)]
    #[case(10_000)]
    fn test_build_transaction_rejects_bad_year(#[case] year: i32) {
        let mut input = purchase(vec![LineInput::purchase("hygiene", "soap", Money::from_units(1))]);
        input.year = year;
        assert!(matches!(
            build_transaction(input, Utc::now()),
            Err(LedgerError::Validation(_))
        ));
    }

    #[rstest]
    #[case(LineInput::purchase("hygiene", "soap", Money::ZERO))]
    #[case(LineInput::purchase("hygiene", "soap", Money::from_minor(-1)))]
    #[case(LineInput::purchase("hygiene", "soap", Money::MAX + Money::from_minor(1)))]
    #[case(LineInput::purchase("hygiene", "soap", Money::from_minor(i64::MAX)))]
    #[case(LineInput::purchase(" ", "soap", Money::from_units(1)))]
    #[case(LineInput::purchase("hygiene", "  ", Money::from_units(1)))]
    #[case(LineInput::refund(
        "hygiene",
        "soap",
        Money::from_units(1),
        RefundRef::new(TransactionId::new(), LineId::new())
    ))]
    fn test_build_transaction_rejects_bad_purchase_line(#[case] line: LineInput) {
        assert!(matches!(
            build_transaction(purchase(vec![line]), Utc::now()),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_refund_line_requires_reference() {
        let mut input = purchase(vec![LineInput::purchase("hygiene", "soap", Money::from_units(1))]);
        input.transaction_type = TransactionType::Refund;
        assert!(matches!(
            build_transaction(input, Utc::now()),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_blank_identities_rejected() {
        let mut input = purchase(vec![LineInput::purchase("hygiene", "soap", Money::from_units(1))]);
        input.client_id = ClientId::new("");
        assert!(build_transaction(input, Utc::now()).is_err());

        let mut input = purchase(vec![LineInput::purchase("hygiene", "soap", Money::from_units(1))]);
        input.created_by_user_id = UserId::new("  ");
        assert!(build_transaction(input, Utc::now()).is_err());
    }

    #[test]
    fn test_validate_allocation() {
        let category = |id: &str, units: i64| CategoryAllocation {
            category_id: id.into(),
            category_name: id.to_string(),
            allocated: Money::from_units(units),
        };

        let ok = AllocationInput {
            annual_allocated: Money::from_units(100),
            categories: vec![category("a", 80), category("b", 70)],
            ..AllocationInput::default()
        };
        assert!(validate_allocation(&ok).is_ok(), "over-allocation is accepted");

        let negative = AllocationInput {
            categories: vec![category("a", -1)],
            ..ok.clone()
        };
        assert!(validate_allocation(&negative).is_err());

        let duplicate = AllocationInput {
            categories: vec![category("a", 1), category("a", 2)],
            ..ok.clone()
        };
        assert!(validate_allocation(&duplicate).is_err());

        let oversized_category = AllocationInput {
            categories: vec![CategoryAllocation {
                allocated: Money::MAX + Money::from_minor(1),
                ..category("a", 0)
            }],
            ..ok.clone()
        };
        assert!(validate_allocation(&oversized_category).is_err());

        let oversized_annual = AllocationInput {
            annual_allocated: Money::from_minor(i64::MAX),
            ..ok.clone()
        };
        assert!(validate_allocation(&oversized_annual).is_err());

        let negative_annual = AllocationInput {
            annual_allocated: Money::from_units(-1),
            ..ok
        };
        assert!(validate_allocation(&negative_annual).is_err());
    }

    #[test]
    fn test_line_total_saturates() {
        let half = Money::from_minor(i64::MAX / 2 + 1);
        let lines = vec![
            LineInput::purchase("hygiene", "soap", half),
            LineInput::purchase("hygiene", "soap", half),
        ];
        assert_eq!(line_total(&lines), Money::from_minor(i64::MAX));
        assert!(matches!(
            build_transaction(purchase(lines), Utc::now()),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key(&BudgetKey::new("c", 2025)).is_ok());
        assert!(validate_key(&BudgetKey::new("", 2025)).is_err());
        assert!(validate_key(&BudgetKey::new("c", 0)).is_err());
    }
}

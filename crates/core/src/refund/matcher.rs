//! Refund Matcher: pairs purchase lines with the refunds against them.
//!
//! All arithmetic is on integer minor units. The matcher only reads the
//! transactions it is handed; callers pass every transaction of one
//! (client, year) scope, voided ones included.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use carebudget_shared::types::{CategoryId, LineId, Money, TransactionId};

use crate::ledger::{LedgerError, LedgerLine, RefundRef, Transaction};

/// Refund position of one purchase line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundableLine {
    /// Purchase transaction.
    pub purchase_trans_id: TransactionId,
    /// Date of the purchase.
    pub purchase_date: NaiveDate,
    /// Purchase line.
    pub line_id: LineId,
    /// Category of the purchase line.
    pub category_id: CategoryId,
    /// Care item slug of the purchase line.
    pub care_item_slug: String,
    /// Label of the purchase line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Amount originally purchased.
    pub original_amount: Money,
    /// Sum of non-voided refunds against the line.
    pub refunded_so_far: Money,
    /// What is left to refund, never negative.
    pub remaining_refundable: Money,
}

impl RefundableLine {
    /// Reference usable as a refund line's `refund_of`.
    #[must_use]
    pub const fn refund_ref(&self) -> RefundRef {
        RefundRef::new(self.purchase_trans_id, self.line_id)
    }
}

/// Sums non-voided refund amounts per referenced purchase line.
#[must_use]
pub fn refunded_totals(transactions: &[Transaction]) -> HashMap<RefundRef, Money> {
    let mut totals: HashMap<RefundRef, Money> = HashMap::new();
    for line in transactions
        .iter()
        .filter(|tx| tx.is_active_refund())
        .flat_map(|tx| tx.lines.iter())
    {
        if let Some(target) = line.refund_of {
            *totals.entry(target).or_default() += line.amount;
        }
    }
    totals
}

/// Non-voided refund transactions pointing at any line of `purchase_id`.
#[must_use]
pub fn live_refunds_of(
    transactions: &[Transaction],
    purchase_id: TransactionId,
) -> Vec<TransactionId> {
    transactions
        .iter()
        .filter(|tx| tx.is_active_refund())
        .filter(|tx| tx.refund_refs().any(|target| target.transaction_id == purchase_id))
        .map(|tx| tx.id)
        .collect()
}

/// Refund position of every non-voided purchase line, fully refunded ones included.
///
/// Ordered newest purchase date first, then by transaction creation, then by
/// line order within the transaction.
#[must_use]
pub fn purchase_line_balances(transactions: &[Transaction]) -> Vec<RefundableLine> {
    let refunded = refunded_totals(transactions);

    let mut purchases: Vec<(usize, &Transaction)> = transactions
        .iter()
        .filter(|tx| tx.is_active_purchase())
        .enumerate()
        .collect();
    purchases.sort_by(|(a_pos, a), (b_pos, b)| {
        b.date
            .cmp(&a.date)
            .then(a.created_at.cmp(&b.created_at))
            .then(a_pos.cmp(b_pos))
    });

    purchases
        .into_iter()
        .flat_map(|(_, tx)| {
            tx.lines
                .iter()
                .map(|line| balance_for(tx, line, &refunded))
        })
        .collect()
}

fn balance_for(
    tx: &Transaction,
    line: &LedgerLine,
    refunded: &HashMap<RefundRef, Money>,
) -> RefundableLine {
    let refunded_so_far = refunded
        .get(&RefundRef::new(tx.id, line.line_id))
        .copied()
        .unwrap_or_default();

    RefundableLine {
        purchase_trans_id: tx.id,
        purchase_date: tx.date,
        line_id: line.line_id,
        category_id: line.category_id.clone(),
        care_item_slug: line.care_item_slug.clone(),
        label: line.label.clone(),
        original_amount: line.amount,
        refunded_so_far,
        remaining_refundable: (line.amount - refunded_so_far).non_negative(),
    }
}

/// Purchase lines that still have money left to refund.
#[must_use]
pub fn refundable_lines(transactions: &[Transaction]) -> Vec<RefundableLine> {
    purchase_line_balances(transactions)
        .into_iter()
        .filter(|line| line.remaining_refundable.is_positive())
        .collect()
}

/// Checks a prospective refund against the current ledger state.
///
/// `refund_lines` are the lines of the refund about to be written. Several
/// lines pointing at the same purchase line are summed before comparison.
///
/// # Errors
///
/// Returns `LedgerError::Reference` when a reference does not resolve to a
/// non-voided purchase line in `transactions`, and `LedgerError::OverRefund`
/// when the requested total exceeds the remaining refundable amount.
pub fn check_refund(
    transactions: &[Transaction],
    refund_lines: impl IntoIterator<Item = (RefundRef, Money)>,
) -> Result<(), LedgerError> {
    let mut requested: Vec<(RefundRef, Money)> = Vec::new();
    for (target, amount) in refund_lines {
        match requested.iter_mut().find(|(r, _)| *r == target) {
            Some((_, total)) => *total += amount,
            None => requested.push((target, amount)),
        }
    }

    let refunded = refunded_totals(transactions);

    for (target, amount) in requested {
        let original = resolve_purchase_line(transactions, target)?.amount;
        let refunded_so_far = refunded.get(&target).copied().unwrap_or_default();
        let remaining_refundable = (original - refunded_so_far).non_negative();

        if amount > remaining_refundable {
            return Err(LedgerError::OverRefund {
                transaction_id: target.transaction_id,
                line_id: target.line_id,
                requested: amount,
                remaining_refundable,
            });
        }
    }

    Ok(())
}

/// Finds the purchase line a refund reference points at.
///
/// # Errors
///
/// Returns `LedgerError::Reference` if the transaction is missing from the
/// scope, is voided, is not a purchase, or has no such line.
pub fn resolve_purchase_line(
    transactions: &[Transaction],
    target: RefundRef,
) -> Result<&LedgerLine, LedgerError> {
    let tx = transactions
        .iter()
        .find(|tx| tx.id == target.transaction_id)
        .ok_or_else(|| {
            LedgerError::reference(format!(
                "purchase transaction {} not found for this client and year",
                target.transaction_id
            ))
        })?;

    if tx.is_voided() {
        return Err(LedgerError::reference(format!(
            "purchase transaction {} is voided",
            tx.id
        )));
    }
    if !tx.is_active_purchase() {
        return Err(LedgerError::reference(format!(
            "transaction {} is not a purchase",
            tx.id
        )));
    }

    tx.lines
        .iter()
        .find(|line| line.line_id == target.line_id)
        .ok_or_else(|| {
            LedgerError::reference(format!(
                "line {} not found on purchase transaction {}",
                target.line_id, tx.id
            ))
        })
}

/// Extracts `(reference, amount)` pairs from refund lines.
pub fn refund_requests(lines: &[LedgerLine]) -> impl Iterator<Item = (RefundRef, Money)> + '_ {
    lines
        .iter()
        .filter_map(|line| line.refund_of.map(|target| (target, line.amount)))
}

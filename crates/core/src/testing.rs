//! Builders shared by the unit and property tests.

use chrono::{NaiveDate, Utc};

use carebudget_shared::types::{ClientId, Money, UserId};

use crate::ledger::{
    LineInput, NewTransaction, RefundRef, Transaction, TransactionType, build_transaction,
};

pub const CLIENT: &str = "client-c";
pub const YEAR: i32 = 2025;

pub fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(YEAR, month, day).unwrap()
}

pub fn new_tx(
    transaction_type: TransactionType,
    date: NaiveDate,
    lines: Vec<LineInput>,
) -> NewTransaction {
    NewTransaction {
        client_id: ClientId::new(CLIENT),
        year: YEAR,
        date,
        transaction_type,
        created_by_user_id: UserId::new("user-1"),
        lines,
    }
}

pub fn purchase(date: NaiveDate, lines: &[(&str, i64)]) -> Transaction {
    let lines = lines
        .iter()
        .map(|(category, units)| LineInput::purchase(*category, "item", Money::from_units(*units)))
        .collect();
    build_transaction(new_tx(TransactionType::Purchase, date, lines), Utc::now()).unwrap()
}

pub fn refund(date: NaiveDate, target: &Transaction, line: usize, amount: Money) -> Transaction {
    let purchase_line = &target.lines[line];
    let lines = vec![LineInput::refund(
        purchase_line.category_id.clone(),
        purchase_line.care_item_slug.clone(),
        amount,
        RefundRef::new(target.id, purchase_line.line_id),
    )];
    build_transaction(new_tx(TransactionType::Refund, date, lines), Utc::now()).unwrap()
}

pub fn voided(mut tx: Transaction) -> Transaction {
    tx.voided_at = Some(Utc::now());
    tx
}

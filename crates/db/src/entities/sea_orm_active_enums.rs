//! `SeaORM` active enums backed by PostgreSQL enum types.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Mirrors the `ledger_transaction_type` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(
    rs_type = "String",
    db_type = "Enum",
    enum_name = "ledger_transaction_type"
)]
pub enum LedgerTransactionType {
    /// Purchase.
    #[sea_orm(string_value = "purchase")]
    Purchase,
    /// Refund.
    #[sea_orm(string_value = "refund")]
    Refund,
}

//! Core care-budget logic for Carebudget.
//!
//! This crate contains the ledger rules with ZERO web or database dependencies.
//! All domain types, validation rules, and calculations live here, together
//! with the storage seam the db crate implements.
//!
//! # Modules
//!
//! - `ledger` - Budget years, transactions, validation and errors
//! - `refund` - Refund matching and per-line refund locks
//! - `budget` - Per-category net spend and yearly summaries
//! - `store` - The `LedgerStore` trait and the in-memory store
//! - `notify` - Change fan-out keyed by (client, year)
//! - `service` - The caller-facing `BudgetQueryService`

pub mod budget;
pub mod ledger;
pub mod notify;
pub mod refund;
pub mod service;
pub mod store;

#[cfg(test)]
mod testing;

pub use budget::{BudgetSummary, CategoryRow, CategoryStatus};
pub use ledger::{
    AllocationInput, BudgetKey, BudgetYear, CategoryAllocation, LedgerError, LineInput,
    NewTransaction, RefundRef, Transaction, TransactionType,
};
pub use notify::{ChangeEvent, ChangeKind, ChangeNotifier, Subscription, SubscriptionEvent};
pub use refund::RefundableLine;
pub use service::{BudgetQueryService, ServiceSettings};
pub use store::{InMemoryLedgerStore, LedgerStore};

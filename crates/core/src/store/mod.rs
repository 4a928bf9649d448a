//! Ledger Store: the single owner of budget years and transactions.
//!
//! The trait is the seam between the query service and persistence. The
//! in-memory store lives here; the PostgreSQL store lives in the db crate.

pub mod memory;


use async_trait::async_trait;

use carebudget_shared::types::{ClientId, TransactionId};

use crate::ledger::{
    AllocationInput, BudgetKey, BudgetYear, LedgerError, NewTransaction, Transaction, VoidOutcome,
};

pub use memory::InMemoryLedgerStore;

/// Persistent storage for the ledger.
///
/// Implementations must make the over-refund check and the refund insert
/// atomic with respect to other refunds against the same purchase line.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Fetches the budget year for a scope.
    async fn get_budget_year(&self, key: &BudgetKey) -> Result<Option<BudgetYear>, LedgerError>;

    /// Creates or replaces the allocation of a budget year.
    async fn upsert_budget_allocation(
        &self,
        key: &BudgetKey,
        allocation: AllocationInput,
    ) -> Result<BudgetYear, LedgerError>;

    /// Validates and appends a transaction.
    ///
    /// Refund lines must reference a non-voided purchase line of the same
    /// scope, and must not push it past its original amount.
    async fn record_transaction(&self, transaction: NewTransaction)
    -> Result<Transaction, LedgerError>;

    /// Marks a transaction voided. Voiding twice is a no-op.
    async fn void_transaction(&self, id: TransactionId) -> Result<VoidOutcome, LedgerError>;

    /// Years with a budget year or any transaction, newest first.
    async fn list_years_with_activity(&self, client_id: &ClientId) -> Result<Vec<i32>, LedgerError>;

    /// All transactions of a scope, voided included, by date then creation.
    async fn list_transactions(&self, key: &BudgetKey) -> Result<Vec<Transaction>, LedgerError>;

    /// Fetches one transaction.
    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerError>;
}

//! Ledger records and the rules every write must satisfy.
//!
//! This module implements:
//! - Domain types for budget years, transactions and lines
//! - Error types for ledger operations
//! - Validation and normalization of incoming writes

pub mod error;
pub mod types;
pub mod validation;

#[cfg(test)]
mod validation_props;

pub use error::LedgerError;
pub use types::{
    AllocationInput, BudgetKey, BudgetTotals, BudgetYear, CategoryAllocation, LedgerLine,
    LineInput, NewTransaction, RefundRef, Transaction, TransactionType, VoidOutcome,
};
pub use validation::{build_transaction, normalize_slug, validate_allocation, validate_key};

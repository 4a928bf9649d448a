//! Entity re-exports.

pub use super::budget_categories::Entity as BudgetCategories;
pub use super::budget_years::Entity as BudgetYears;
pub use super::ledger_lines::Entity as LedgerLines;
pub use super::ledger_transactions::Entity as LedgerTransactions;

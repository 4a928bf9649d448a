//! `SeaORM` entity definitions for the ledger tables.
//!
//! Generated column structs; the migration documents the columns.

#![allow(missing_docs)]

pub mod prelude;

pub mod budget_categories;
pub mod budget_years;
pub mod ledger_lines;
pub mod ledger_transactions;
pub mod sea_orm_active_enums;

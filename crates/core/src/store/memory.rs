//! In-memory ledger store (non-persistent).
//!
//! Backs development runs without a database and the service tests. The
//! refund check and insert happen under one write lock, which makes them
//! atomic against every other write.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use carebudget_shared::types::{BudgetYearId, ClientId, TransactionId};

use super::LedgerStore;
use crate::ledger::{
    AllocationInput, BudgetKey, BudgetTotals, BudgetYear, LedgerError, NewTransaction,
    Transaction, TransactionType, VoidOutcome, build_transaction, validate_allocation,
    validate_key,
};
use crate::ledger::validation::validate_client_id;
use crate::refund::{check_refund, refund_requests};

#[derive(Debug, Default)]
struct Ledger {
    budgets: HashMap<BudgetKey, BudgetYear>,
    /// Insertion order doubles as creation order.
    transactions: Vec<Transaction>,
    index: HashMap<TransactionId, usize>,
}

impl Ledger {
    fn scope(&self, key: &BudgetKey) -> Vec<Transaction> {
        let mut txs: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|tx| tx.client_id == key.client_id && tx.year == key.year)
            .cloned()
            .collect();
        // Stable sort keeps insertion order within a date.
        txs.sort_by_key(|tx| tx.date);
        txs
    }
}

/// Ledger store held entirely in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    ledger: Arc<RwLock<Ledger>>,
}

impl InMemoryLedgerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn get_budget_year(&self, key: &BudgetKey) -> Result<Option<BudgetYear>, LedgerError> {
        Ok(self.ledger.read().await.budgets.get(key).cloned())
    }

    async fn upsert_budget_allocation(
        &self,
        key: &BudgetKey,
        allocation: AllocationInput,
    ) -> Result<BudgetYear, LedgerError> {
        validate_key(key)?;
        validate_allocation(&allocation)?;

        let now = Utc::now();
        let totals_allocated = allocation.total_allocated();
        let mut ledger = self.ledger.write().await;

        let budget = ledger
            .budgets
            .entry(key.clone())
            .or_insert_with(|| BudgetYear {
                id: BudgetYearId::new(),
                client_id: key.client_id.clone(),
                year: key.year,
                annual_allocated: allocation.annual_allocated,
                opening_carryover: allocation.opening_carryover,
                categories: Vec::new(),
                totals: BudgetTotals::default(),
                surplus_override: None,
                created_at: now,
                updated_at: now,
            });

        budget.annual_allocated = allocation.annual_allocated;
        budget.opening_carryover = allocation.opening_carryover;
        budget.categories = allocation.categories;
        budget.totals.allocated = totals_allocated;
        budget.surplus_override = allocation.surplus_override;
        budget.updated_at = now;

        Ok(budget.clone())
    }

    async fn record_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<Transaction, LedgerError> {
        let tx = build_transaction(transaction, Utc::now())?;
        let mut ledger = self.ledger.write().await;

        if tx.transaction_type == TransactionType::Refund {
            let scope = ledger.scope(&tx.key());
            check_refund(&scope, refund_requests(&tx.lines))?;
        }

        let position = ledger.transactions.len();
        ledger.index.insert(tx.id, position);
        ledger.transactions.push(tx.clone());
        Ok(tx)
    }

    async fn void_transaction(&self, id: TransactionId) -> Result<VoidOutcome, LedgerError> {
        let mut ledger = self.ledger.write().await;
        let position = *ledger
            .index
            .get(&id)
            .ok_or_else(|| LedgerError::reference(format!("transaction {id} not found")))?;

        let tx = &mut ledger.transactions[position];
        let changed = tx.voided_at.is_none();
        if changed {
            tx.voided_at = Some(Utc::now());
        }

        Ok(VoidOutcome {
            transaction: tx.clone(),
            changed,
        })
    }

    async fn list_years_with_activity(&self, client_id: &ClientId) -> Result<Vec<i32>, LedgerError> {
        validate_client_id(client_id)?;
        let ledger = self.ledger.read().await;

        let years: BTreeSet<i32> = ledger
            .budgets
            .keys()
            .filter(|key| &key.client_id == client_id)
            .map(|key| key.year)
            .chain(
                ledger
                    .transactions
                    .iter()
                    .filter(|tx| &tx.client_id == client_id)
                    .map(|tx| tx.year),
            )
            .collect();

        Ok(years.into_iter().rev().collect())
    }

    async fn list_transactions(&self, key: &BudgetKey) -> Result<Vec<Transaction>, LedgerError> {
        Ok(self.ledger.read().await.scope(key))
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerError> {
        let ledger = self.ledger.read().await;
        Ok(ledger
            .index
            .get(&id)
            .map(|position| ledger.transactions[*position].clone()))
    }
}

//! PostgreSQL ledger store.
//!
//! Every write runs in its own database transaction. Refund writes lock the
//! referenced purchase lines with `SELECT ... FOR UPDATE` before re-checking
//! the remaining refundable amount, so two refunds against the same line
//! serialize on the row lock.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use tracing::{debug, warn};
use uuid::Uuid;

use carebudget_core::LedgerStore;
use carebudget_core::ledger::validation::validate_client_id;
use carebudget_core::ledger::{
    AllocationInput, BudgetKey, BudgetTotals, BudgetYear, CategoryAllocation, LedgerError,
    LedgerLine, NewTransaction, RefundRef, Transaction, TransactionType, VoidOutcome,
    build_transaction, validate_allocation, validate_key,
};
use carebudget_core::refund::{check_refund, refund_requests};
use carebudget_shared::types::{
    BudgetYearId, CategoryId, ClientId, LineId, Money, TransactionId, UserId,
};

use crate::entities::{
    budget_categories, budget_years, ledger_lines, ledger_transactions,
    sea_orm_active_enums::LedgerTransactionType,
};

/// Ledger store backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    db: DatabaseConnection,
}

impl PgLedgerStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// Maps a database error onto the ledger taxonomy.
///
/// Constraint violations become conflicts or reference errors, transient
/// serialization failures become retryable conflicts.
fn db_error(err: DbErr) -> LedgerError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(message)) => return LedgerError::Conflict(message),
        Some(SqlErr::ForeignKeyConstraintViolation(message)) => {
            return LedgerError::Reference(message);
        }
        _ => {}
    }

    let message = err.to_string();
    if message.contains("deadlock detected")
        || message.contains("could not serialize")
        || message.contains("40P01")
        || message.contains("40001")
    {
        warn!(error = %message, "transient database conflict");
        return LedgerError::Conflict(message);
    }

    LedgerError::Storage(message)
}

fn position(index: usize) -> Result<i32, LedgerError> {
    i32::try_from(index).map_err(|_| LedgerError::Validation("too many items".to_string()))
}

// ============================================================================
// Model conversions
// ============================================================================

impl From<TransactionType> for LedgerTransactionType {
    fn from(value: TransactionType) -> Self {
        match value {
            TransactionType::Purchase => Self::Purchase,
            TransactionType::Refund => Self::Refund,
        }
    }
}

impl From<LedgerTransactionType> for TransactionType {
    fn from(value: LedgerTransactionType) -> Self {
        match value {
            LedgerTransactionType::Purchase => Self::Purchase,
            LedgerTransactionType::Refund => Self::Refund,
        }
    }
}

fn budget_from_models(
    model: budget_years::Model,
    categories: Vec<budget_categories::Model>,
) -> BudgetYear {
    BudgetYear {
        id: BudgetYearId::from_uuid(model.id),
        client_id: ClientId::new(model.client_id),
        year: model.year,
        annual_allocated: Money::from_minor(model.annual_allocated),
        opening_carryover: Money::from_minor(model.opening_carryover),
        categories: categories
            .into_iter()
            .map(|c| CategoryAllocation {
                category_id: CategoryId::new(c.category_id),
                category_name: c.category_name,
                allocated: Money::from_minor(c.allocated),
            })
            .collect(),
        totals: BudgetTotals {
            allocated: Money::from_minor(model.total_allocated),
            spent: Money::from_minor(model.total_spent),
        },
        surplus_override: model.surplus_override.map(Money::from_minor),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn line_from_model(model: ledger_lines::Model) -> LedgerLine {
    let refund_of = match (model.refund_of_transaction_id, model.refund_of_line_id) {
        (Some(tx), Some(line)) => Some(RefundRef::new(
            TransactionId::from_uuid(tx),
            LineId::from_uuid(line),
        )),
        _ => None,
    };

    LedgerLine {
        line_id: LineId::from_uuid(model.id),
        category_id: CategoryId::new(model.category_id),
        care_item_slug: model.care_item_slug,
        label: model.label,
        amount: Money::from_minor(model.amount),
        refund_of,
    }
}

fn transaction_from_models(
    model: ledger_transactions::Model,
    lines: Vec<ledger_lines::Model>,
) -> Transaction {
    Transaction {
        id: TransactionId::from_uuid(model.id),
        client_id: ClientId::new(model.client_id),
        year: model.year,
        date: model.transaction_date,
        transaction_type: model.transaction_type.into(),
        created_by_user_id: UserId::new(model.created_by_user_id),
        created_at: model.created_at.with_timezone(&Utc),
        voided_at: model.voided_at.map(|at| at.with_timezone(&Utc)),
        lines: lines.into_iter().map(line_from_model).collect(),
    }
}

// ============================================================================
// Loading
// ============================================================================

async fn load_budget<C: ConnectionTrait>(
    conn: &C,
    key: &BudgetKey,
) -> Result<Option<BudgetYear>, DbErr> {
    let Some(model) = budget_years::Entity::find()
        .filter(budget_years::Column::ClientId.eq(key.client_id.as_str()))
        .filter(budget_years::Column::Year.eq(key.year))
        .one(conn)
        .await?
    else {
        return Ok(None);
    };

    let categories = budget_categories::Entity::find()
        .filter(budget_categories::Column::BudgetYearId.eq(model.id))
        .order_by_asc(budget_categories::Column::Position)
        .all(conn)
        .await?;

    Ok(Some(budget_from_models(model, categories)))
}

/// Attaches lines, in position order, to transaction headers.
async fn attach_lines<C: ConnectionTrait>(
    conn: &C,
    headers: Vec<ledger_transactions::Model>,
) -> Result<Vec<Transaction>, DbErr> {
    if headers.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = headers.iter().map(|h| h.id).collect();
    let mut lines_by_tx: HashMap<Uuid, Vec<ledger_lines::Model>> = HashMap::new();
    for line in ledger_lines::Entity::find()
        .filter(ledger_lines::Column::TransactionId.is_in(ids))
        .order_by_asc(ledger_lines::Column::TransactionId)
        .order_by_asc(ledger_lines::Column::Position)
        .all(conn)
        .await?
    {
        lines_by_tx.entry(line.transaction_id).or_default().push(line);
    }

    Ok(headers
        .into_iter()
        .map(|header| {
            let lines = lines_by_tx.remove(&header.id).unwrap_or_default();
            transaction_from_models(header, lines)
        })
        .collect())
}

async fn load_scope<C: ConnectionTrait>(
    conn: &C,
    key: &BudgetKey,
) -> Result<Vec<Transaction>, DbErr> {
    let headers = ledger_transactions::Entity::find()
        .filter(ledger_transactions::Column::ClientId.eq(key.client_id.as_str()))
        .filter(ledger_transactions::Column::Year.eq(key.year))
        .order_by_asc(ledger_transactions::Column::TransactionDate)
        .order_by_asc(ledger_transactions::Column::CreatedAt)
        .order_by_asc(ledger_transactions::Column::Id)
        .all(conn)
        .await?;

    attach_lines(conn, headers).await
}

async fn load_transaction<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> Result<Option<Transaction>, DbErr> {
    let Some(header) = ledger_transactions::Entity::find_by_id(id).one(conn).await? else {
        return Ok(None);
    };
    Ok(attach_lines(conn, vec![header]).await?.pop())
}

// ============================================================================
// Writes
// ============================================================================

async fn insert_transaction<C: ConnectionTrait>(conn: &C, tx: &Transaction) -> Result<(), LedgerError> {
    ledger_transactions::ActiveModel {
        id: Set(tx.id.into_inner()),
        client_id: Set(tx.client_id.as_str().to_string()),
        year: Set(tx.year),
        transaction_date: Set(tx.date),
        transaction_type: Set(tx.transaction_type.into()),
        created_by_user_id: Set(tx.created_by_user_id.as_str().to_string()),
        created_at: Set(tx.created_at.into()),
        voided_at: Set(None),
    }
    .insert(conn)
    .await
    .map_err(db_error)?;

    let mut lines = Vec::with_capacity(tx.lines.len());
    for (index, line) in tx.lines.iter().enumerate() {
        lines.push(ledger_lines::ActiveModel {
            id: Set(line.line_id.into_inner()),
            transaction_id: Set(tx.id.into_inner()),
            position: Set(position(index)?),
            category_id: Set(line.category_id.as_str().to_string()),
            care_item_slug: Set(line.care_item_slug.clone()),
            label: Set(line.label.clone()),
            amount: Set(line.amount.minor_units()),
            refund_of_transaction_id: Set(line.refund_of.map(|r| r.transaction_id.into_inner())),
            refund_of_line_id: Set(line.refund_of.map(|r| r.line_id.into_inner())),
        });
    }

    ledger_lines::Entity::insert_many(lines)
        .exec(conn)
        .await
        .map_err(db_error)?;
    Ok(())
}

/// Locks the purchase lines a refund points at, in id order.
async fn lock_purchase_lines<C: ConnectionTrait>(
    conn: &C,
    refs: &BTreeSet<RefundRef>,
) -> Result<usize, DbErr> {
    let ids: Vec<Uuid> = refs.iter().map(|r| r.line_id.into_inner()).collect();
    let locked = ledger_lines::Entity::find()
        .filter(ledger_lines::Column::Id.is_in(ids))
        .order_by_asc(ledger_lines::Column::Id)
        .lock_exclusive()
        .all(conn)
        .await?;
    Ok(locked.len())
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn get_budget_year(&self, key: &BudgetKey) -> Result<Option<BudgetYear>, LedgerError> {
        load_budget(&self.db, key).await.map_err(db_error)
    }

    async fn upsert_budget_allocation(
        &self,
        key: &BudgetKey,
        allocation: AllocationInput,
    ) -> Result<BudgetYear, LedgerError> {
        validate_key(key)?;
        validate_allocation(&allocation)?;

        let now = Utc::now().into();
        let total_allocated = allocation.total_allocated().minor_units();
        let txn = self.db.begin().await.map_err(db_error)?;

        let existing = budget_years::Entity::find()
            .filter(budget_years::Column::ClientId.eq(key.client_id.as_str()))
            .filter(budget_years::Column::Year.eq(key.year))
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(db_error)?;

        let budget_year_id = if let Some(model) = existing {
            let id = model.id;
            let mut active: budget_years::ActiveModel = model.into();
            active.annual_allocated = Set(allocation.annual_allocated.minor_units());
            active.opening_carryover = Set(allocation.opening_carryover.minor_units());
            active.total_allocated = Set(total_allocated);
            active.surplus_override = Set(allocation.surplus_override.map(Money::minor_units));
            active.updated_at = Set(now);
            active.update(&txn).await.map_err(db_error)?;

            budget_categories::Entity::delete_many()
                .filter(budget_categories::Column::BudgetYearId.eq(id))
                .exec(&txn)
                .await
                .map_err(db_error)?;
            id
        } else {
            let id = BudgetYearId::new().into_inner();
            budget_years::ActiveModel {
                id: Set(id),
                client_id: Set(key.client_id.as_str().to_string()),
                year: Set(key.year),
                annual_allocated: Set(allocation.annual_allocated.minor_units()),
                opening_carryover: Set(allocation.opening_carryover.minor_units()),
                total_allocated: Set(total_allocated),
                total_spent: Set(0),
                surplus_override: Set(allocation.surplus_override.map(Money::minor_units)),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await
            .map_err(db_error)?;
            id
        };

        if !allocation.categories.is_empty() {
            let mut rows = Vec::with_capacity(allocation.categories.len());
            for (index, category) in allocation.categories.iter().enumerate() {
                rows.push(budget_categories::ActiveModel {
                    id: Set(Uuid::now_v7()),
                    budget_year_id: Set(budget_year_id),
                    position: Set(position(index)?),
                    category_id: Set(category.category_id.as_str().to_string()),
                    category_name: Set(category.category_name.clone()),
                    allocated: Set(category.allocated.minor_units()),
                });
            }
            budget_categories::Entity::insert_many(rows)
                .exec(&txn)
                .await
                .map_err(db_error)?;
        }

        let budget = load_budget(&txn, key)
            .await
            .map_err(db_error)?
            .ok_or_else(|| LedgerError::Storage(format!("budget year {key} vanished")))?;
        txn.commit().await.map_err(db_error)?;

        Ok(budget)
    }

    async fn record_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<Transaction, LedgerError> {
        let tx = build_transaction(transaction, Utc::now())?;
        let txn = self.db.begin().await.map_err(db_error)?;

        if tx.transaction_type == TransactionType::Refund {
            let refs: BTreeSet<RefundRef> = tx.refund_refs().collect();
            let locked = lock_purchase_lines(&txn, &refs).await.map_err(db_error)?;
            debug!(transaction_id = %tx.id, targets = refs.len(), locked, "refund targets locked");

            let scope = load_scope(&txn, &tx.key()).await.map_err(db_error)?;
            check_refund(&scope, refund_requests(&tx.lines))?;
        }

        insert_transaction(&txn, &tx).await?;
        txn.commit().await.map_err(db_error)?;

        Ok(tx)
    }

    async fn void_transaction(&self, id: TransactionId) -> Result<VoidOutcome, LedgerError> {
        let txn = self.db.begin().await.map_err(db_error)?;

        let header = ledger_transactions::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(db_error)?
            .ok_or_else(|| LedgerError::Reference(format!("transaction {id} not found")))?;

        let changed = header.voided_at.is_none();
        if changed {
            let mut active: ledger_transactions::ActiveModel = header.into();
            active.voided_at = Set(Some(Utc::now().into()));
            active.update(&txn).await.map_err(db_error)?;
        }

        let transaction = load_transaction(&txn, id.into_inner())
            .await
            .map_err(db_error)?
            .ok_or_else(|| LedgerError::Storage(format!("transaction {id} vanished")))?;
        txn.commit().await.map_err(db_error)?;

        Ok(VoidOutcome {
            transaction,
            changed,
        })
    }

    async fn list_years_with_activity(&self, client_id: &ClientId) -> Result<Vec<i32>, LedgerError> {
        validate_client_id(client_id)?;

        let budget_years: Vec<i32> = budget_years::Entity::find()
            .select_only()
            .column(budget_years::Column::Year)
            .filter(budget_years::Column::ClientId.eq(client_id.as_str()))
            .distinct()
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(db_error)?;

        let transaction_years: Vec<i32> = ledger_transactions::Entity::find()
            .select_only()
            .column(ledger_transactions::Column::Year)
            .filter(ledger_transactions::Column::ClientId.eq(client_id.as_str()))
            .distinct()
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(db_error)?;

        let years: BTreeSet<i32> = budget_years.into_iter().chain(transaction_years).collect();
        Ok(years.into_iter().rev().collect())
    }

    async fn list_transactions(&self, key: &BudgetKey) -> Result<Vec<Transaction>, LedgerError> {
        load_scope(&self.db, key).await.map_err(db_error)
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerError> {
        load_transaction(&self.db, id.into_inner())
            .await
            .map_err(db_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_type_maps_both_ways() {
        for ty in [TransactionType::Purchase, TransactionType::Refund] {
            let stored: LedgerTransactionType = ty.into();
            assert_eq!(TransactionType::from(stored), ty);
        }
    }

    #[test]
    fn test_line_without_both_refund_columns_has_no_reference() {
        let line = line_from_model(ledger_lines::Model {
            id: Uuid::now_v7(),
            transaction_id: Uuid::now_v7(),
            position: 0,
            category_id: "hygiene".into(),
            care_item_slug: "soap".into(),
            label: None,
            amount: 500,
            refund_of_transaction_id: Some(Uuid::now_v7()),
            refund_of_line_id: None,
        });
        assert_eq!(line.refund_of, None);
        assert_eq!(line.amount, Money::from_units(5));
    }

    #[test]
    fn test_plain_db_error_maps_to_storage() {
        let err = db_error(DbErr::Custom("connection reset".into()));
        assert!(matches!(err, LedgerError::Storage(_)));
    }

    #[test]
    fn test_deadlock_maps_to_retryable_conflict() {
        let err = db_error(DbErr::Custom("deadlock detected".into()));
        assert!(matches!(err, LedgerError::Conflict(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_budget_conversion_keeps_category_order() {
        let now = Utc::now().into();
        let id = Uuid::now_v7();
        let budget = budget_from_models(
            budget_years::Model {
                id,
                client_id: "client-c".into(),
                year: 2025,
                annual_allocated: 100_000,
                opening_carryover: 0,
                total_allocated: 90_000,
                total_spent: 0,
                surplus_override: None,
                created_at: now,
                updated_at: now,
            },
            vec![
                budget_categories::Model {
                    id: Uuid::now_v7(),
                    budget_year_id: id,
                    position: 0,
                    category_id: "b".into(),
                    category_name: "B".into(),
                    allocated: 50_000,
                },
                budget_categories::Model {
                    id: Uuid::now_v7(),
                    budget_year_id: id,
                    position: 1,
                    category_id: "a".into(),
                    category_name: "A".into(),
                    allocated: 40_000,
                },
            ],
        );
        let ids: Vec<_> = budget.categories.iter().map(|c| c.category_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(budget.surplus(), Money::from_units(100));
    }
}

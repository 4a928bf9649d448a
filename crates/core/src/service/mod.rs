//! Budget Query Service: the caller-facing facade over the ledger.
//!
//! The service is the only writer of the store. It serializes refunds per
//! purchase line, publishes change events after commit, and bounds reads by
//! the configured query timeout.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use carebudget_shared::config::LedgerConfig;
use carebudget_shared::types::{ClientId, TransactionId, UserId};

use crate::budget::{self, BudgetSummary, CategoryRow};
use crate::ledger::validation::{line_total, validate_client_id};
use crate::ledger::{
    AllocationInput, BudgetKey, BudgetYear, LedgerError, LineInput, NewTransaction, Transaction,
    TransactionType, validate_key,
};
use crate::notify::{ChangeEvent, ChangeKind, ChangeNotifier, Subscription};
use crate::refund::{self, RefundLocks, RefundableLine};
use crate::store::LedgerStore;


/// Runtime knobs for the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Upper bound for a single store read.
    pub query_timeout: Duration,
    /// Buffered change events per key.
    pub notifier_capacity: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from(&LedgerConfig::default())
    }
}

impl From<&LedgerConfig> for ServiceSettings {
    fn from(config: &LedgerConfig) -> Self {
        Self {
            query_timeout: config.query_timeout(),
            notifier_capacity: config.notifier_capacity,
        }
    }
}

/// Caller-facing ledger facade.
pub struct BudgetQueryService {
    store: Arc<dyn LedgerStore>,
    notifier: ChangeNotifier,
    refund_locks: RefundLocks,
    query_timeout: Duration,
}

impl std::fmt::Debug for BudgetQueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BudgetQueryService")
            .field("notifier", &self.notifier)
            .field("refund_locks", &self.refund_locks)
            .field("query_timeout", &self.query_timeout)
            .finish_non_exhaustive()
    }
}

impl BudgetQueryService {
    /// Creates a service over a store.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, settings: ServiceSettings) -> Self {
        Self {
            store,
            notifier: ChangeNotifier::new(settings.notifier_capacity),
            refund_locks: RefundLocks::new(),
            query_timeout: settings.query_timeout,
        }
    }

    /// The change registry owned by this service.
    #[must_use]
    pub const fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Runs `operation` unless `token` is cancelled first.
    ///
    /// A cancelled read is dropped mid-flight and leaves nothing behind.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Cancelled` if the token fires first, otherwise
    /// whatever the operation returns.
    pub async fn with_cancellation<T, F>(
        token: &CancellationToken,
        operation: F,
    ) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        tokio::select! {
            biased;
            () = token.cancelled() => Err(LedgerError::Cancelled),
            result = operation => result,
        }
    }

    async fn read<T, F>(&self, operation: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        tokio::time::timeout(self.query_timeout, operation)
            .await
            .map_err(|_| {
                LedgerError::Storage(format!(
                    "query timed out after {}s",
                    self.query_timeout.as_secs()
                ))
            })?
    }

    async fn scope(
        &self,
        key: &BudgetKey,
    ) -> Result<(Option<BudgetYear>, Vec<Transaction>), LedgerError> {
        validate_key(key)?;
        self.read(async {
            let budget = self.store.get_budget_year(key).await?;
            let transactions = self.store.list_transactions(key).await?;
            Ok((budget, transactions))
        })
        .await
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Per-category rows for a client/year. Empty without a budget year.
    pub async fn category_rows(
        &self,
        client_id: &ClientId,
        year: i32,
    ) -> Result<Vec<CategoryRow>, LedgerError> {
        let key = BudgetKey::new(client_id.clone(), year);
        let (budget, transactions) = self.scope(&key).await?;
        Ok(budget::category_rows(budget.as_ref(), &transactions))
    }

    /// Summary for a client/year. Zero summary without a budget year.
    pub async fn summary(
        &self,
        client_id: &ClientId,
        year: i32,
    ) -> Result<BudgetSummary, LedgerError> {
        let key = BudgetKey::new(client_id.clone(), year);
        let (budget, transactions) = self.scope(&key).await?;
        Ok(budget::summary(budget.as_ref(), &transactions))
    }

    /// Purchase lines with money left to refund.
    pub async fn refundable_lines(
        &self,
        client_id: &ClientId,
        year: i32,
    ) -> Result<Vec<RefundableLine>, LedgerError> {
        let key = BudgetKey::new(client_id.clone(), year);
        validate_key(&key)?;
        let transactions = self.read(self.store.list_transactions(&key)).await?;
        Ok(refund::refundable_lines(&transactions))
    }

    /// Years with any ledger activity, newest first.
    pub async fn available_years(&self, client_id: &ClientId) -> Result<Vec<i32>, LedgerError> {
        validate_client_id(client_id)?;
        self.read(self.store.list_years_with_activity(client_id)).await
    }

    /// Ledger history of a client/year, voided transactions included.
    pub async fn transactions(
        &self,
        client_id: &ClientId,
        year: i32,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let key = BudgetKey::new(client_id.clone(), year);
        validate_key(&key)?;
        self.read(self.store.list_transactions(&key)).await
    }

    /// The stored budget year, if any.
    pub async fn budget_year(
        &self,
        client_id: &ClientId,
        year: i32,
    ) -> Result<Option<BudgetYear>, LedgerError> {
        let key = BudgetKey::new(client_id.clone(), year);
        validate_key(&key)?;
        self.read(self.store.get_budget_year(&key)).await
    }

    /// Subscribes to change events of a client/year.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Validation` for an invalid key.
    pub fn subscribe(&self, client_id: &ClientId, year: i32) -> Result<Subscription, LedgerError> {
        let key = BudgetKey::new(client_id.clone(), year);
        validate_key(&key)?;
        Ok(self.notifier.subscribe(key))
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Creates or replaces the allocation of a budget year.
    pub async fn set_allocation(
        &self,
        client_id: &ClientId,
        year: i32,
        allocation: AllocationInput,
    ) -> Result<BudgetYear, LedgerError> {
        let key = BudgetKey::new(client_id.clone(), year);
        let budget = self.store.upsert_budget_allocation(&key, allocation).await?;

        if budget.is_over_allocated() {
            warn!(
                client_id = %key.client_id,
                year,
                annual = %budget.annual_allocated,
                allocated = %budget.totals.allocated,
                "categories allocate more than the annual budget"
            );
        }
        info!(
            client_id = %key.client_id,
            year,
            annual = %budget.annual_allocated,
            "budget allocation saved"
        );

        self.notifier
            .publish(ChangeEvent::new(&key, ChangeKind::AllocationUpdated, None));
        Ok(budget)
    }

    /// Records a purchase.
    pub async fn record_purchase(
        &self,
        client_id: &ClientId,
        year: i32,
        date: NaiveDate,
        lines: Vec<LineInput>,
        user_id: &UserId,
    ) -> Result<Transaction, LedgerError> {
        let input = new_transaction(
            client_id,
            year,
            date,
            TransactionType::Purchase,
            lines,
            user_id,
        );
        let total = line_total(&input.lines);
        let tx = self.store.record_transaction(input).await?;

        info!(
            client_id = %tx.client_id,
            year = tx.year,
            transaction_id = %tx.id,
            lines = tx.lines.len(),
            total = %total,
            "purchase recorded"
        );
        self.publish_recorded(&tx);
        Ok(tx)
    }

    /// Records a refund against earlier purchase lines.
    ///
    /// Holds the lock of every referenced purchase line while the
    /// over-refund check runs and the store commits. The store repeats the
    /// check atomically with its insert.
    pub async fn record_refund(
        &self,
        client_id: &ClientId,
        year: i32,
        date: NaiveDate,
        lines: Vec<LineInput>,
        user_id: &UserId,
    ) -> Result<Transaction, LedgerError> {
        let input = new_transaction(
            client_id,
            year,
            date,
            TransactionType::Refund,
            lines,
            user_id,
        );
        let total = line_total(&input.lines);

        let tx = {
            let guard = self.refund_locks.acquire(input.refund_refs()).await;
            debug!(
                client_id = %client_id,
                year,
                lines = guard.keys().len(),
                "refund check started"
            );

            if input.lines.iter().all(|l| l.refund_of.is_some()) {
                let key = input.key();
                validate_key(&key)?;
                let transactions = self.store.list_transactions(&key).await?;
                refund::check_refund(
                    &transactions,
                    input
                        .lines
                        .iter()
                        .filter_map(|l| l.refund_of.map(|target| (target, l.amount))),
                )?;
            }

            self.store.record_transaction(input).await?
        };

        info!(
            client_id = %tx.client_id,
            year = tx.year,
            transaction_id = %tx.id,
            lines = tx.lines.len(),
            total = %total,
            "refund recorded"
        );
        self.publish_recorded(&tx);
        Ok(tx)
    }

    /// Voids a transaction. Voiding twice is a no-op and notifies once.
    pub async fn void_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Transaction, LedgerError> {
        let outcome = self.store.void_transaction(transaction_id).await?;
        let tx = outcome.transaction;

        if outcome.changed {
            info!(
                client_id = %tx.client_id,
                year = tx.year,
                transaction_id = %tx.id,
                "transaction voided"
            );
            self.notifier.publish(ChangeEvent::new(
                &tx.key(),
                ChangeKind::TransactionVoided,
                Some(tx.id),
            ));
            if tx.transaction_type == TransactionType::Purchase {
                self.warn_on_live_refunds(&tx).await;
            }
        } else {
            debug!(transaction_id = %tx.id, "transaction already voided");
        }
        Ok(tx)
    }

    /// Refunds of a voided purchase keep counting as negative spend until
    /// they are voided too.
    async fn warn_on_live_refunds(&self, purchase: &Transaction) {
        match self.store.list_transactions(&purchase.key()).await {
            Ok(transactions) => {
                let live = refund::live_refunds_of(&transactions, purchase.id);
                if !live.is_empty() {
                    warn!(
                        client_id = %purchase.client_id,
                        year = purchase.year,
                        transaction_id = %purchase.id,
                        live_refunds = live.len(),
                        "voided purchase still has non-voided refunds"
                    );
                }
            }
            Err(err) => debug!(error = %err, "skipped live refund check after void"),
        }
    }

    fn publish_recorded(&self, tx: &Transaction) {
        self.notifier.publish(ChangeEvent::new(
            &tx.key(),
            ChangeKind::TransactionRecorded,
            Some(tx.id),
        ));
    }
}

fn new_transaction(
    client_id: &ClientId,
    year: i32,
    date: NaiveDate,
    transaction_type: TransactionType,
    lines: Vec<LineInput>,
    user_id: &UserId,
) -> NewTransaction {
    NewTransaction {
        client_id: client_id.clone(),
        year,
        date,
        transaction_type,
        created_by_user_id: user_id.clone(),
        lines,
    }
}

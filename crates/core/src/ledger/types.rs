//! Ledger domain types.
//!
//! A client's care budget for one year is a [`BudgetYear`] plus an
//! append-only list of [`Transaction`]s scoped by the same [`BudgetKey`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use carebudget_shared::types::{
    BudgetYearId, CategoryId, ClientId, LineId, Money, TransactionId, UserId,
};

/// Scope of every ledger record: one client, one budget year.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetKey {
    /// Client the budget belongs to.
    pub client_id: ClientId,
    /// Budget year.
    pub year: i32,
}

impl BudgetKey {
    /// Creates a key.
    #[must_use]
    pub fn new(client_id: impl Into<ClientId>, year: i32) -> Self {
        Self {
            client_id: client_id.into(),
            year,
        }
    }
}

impl std::fmt::Display for BudgetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.client_id, self.year)
    }
}

/// Transaction type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money spent against the budget.
    Purchase,
    /// Money returned against an earlier purchase line.
    Refund,
}

impl TransactionType {
    /// Applies the transaction's sign to a line amount.
    ///
    /// Purchases add to net spend, refunds subtract from it.
    #[must_use]
    pub fn signed(self, amount: Money) -> Money {
        match self {
            Self::Purchase => amount,
            Self::Refund => -amount,
        }
    }

    /// Lowercase name used in storage and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Refund => "refund",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit pointer from a refund line to the purchase line it returns money against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRef {
    /// Purchase transaction.
    pub transaction_id: TransactionId,
    /// Line within the purchase transaction.
    pub line_id: LineId,
}

impl RefundRef {
    /// Creates a reference.
    #[must_use]
    pub const fn new(transaction_id: TransactionId, line_id: LineId) -> Self {
        Self {
            transaction_id,
            line_id,
        }
    }
}

impl std::fmt::Display for RefundRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.transaction_id, self.line_id)
    }
}

// ============================================================================
// Budget year
// ============================================================================

/// Allocation for one budget category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAllocation {
    /// Category identifier.
    pub category_id: CategoryId,
    /// Display name of the category.
    pub category_name: String,
    /// Amount allocated to the category.
    pub allocated: Money,
}

/// Denormalized totals stored with a budget year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetTotals {
    /// Sum of category allocations, recomputed on every allocation write.
    pub allocated: Money,
    /// Advisory spent figure. Reads never trust it.
    pub spent: Money,
}

/// A client's budget for one year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetYear {
    /// Record identifier.
    pub id: BudgetYearId,
    /// Client the budget belongs to.
    pub client_id: ClientId,
    /// Budget year.
    pub year: i32,
    /// Total allocated for the year.
    pub annual_allocated: Money,
    /// Surplus rolled over from the prior year.
    pub opening_carryover: Money,
    /// Ordered category allocations.
    pub categories: Vec<CategoryAllocation>,
    /// Denormalized totals.
    pub totals: BudgetTotals,
    /// Explicit surplus override, if one was stored.
    pub surplus_override: Option<Money>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
    /// When the allocation last changed.
    pub updated_at: DateTime<Utc>,
}

impl BudgetYear {
    /// Returns the scope key.
    #[must_use]
    pub fn key(&self) -> BudgetKey {
        BudgetKey::new(self.client_id.clone(), self.year)
    }

    /// Surplus: the stored override, or unallocated annual budget, floored at zero.
    #[must_use]
    pub fn surplus(&self) -> Money {
        self.surplus_override
            .unwrap_or(self.annual_allocated - self.totals.allocated)
            .non_negative()
    }

    /// Returns true if categories were allocated more than the annual budget.
    #[must_use]
    pub fn is_over_allocated(&self) -> bool {
        self.totals.allocated > self.annual_allocated
    }

    /// Looks up a category allocation.
    #[must_use]
    pub fn category(&self, category_id: &CategoryId) -> Option<&CategoryAllocation> {
        self.categories
            .iter()
            .find(|c| &c.category_id == category_id)
    }
}

/// Allocation write for a budget year.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationInput {
    /// Total allocated for the year.
    pub annual_allocated: Money,
    /// Surplus rolled over from the prior year.
    #[serde(default)]
    pub opening_carryover: Money,
    /// Ordered category allocations.
    #[serde(default)]
    pub categories: Vec<CategoryAllocation>,
    /// Explicit surplus override.
    #[serde(default)]
    pub surplus_override: Option<Money>,
}

impl AllocationInput {
    /// Sum of category allocations.
    #[must_use]
    pub fn total_allocated(&self) -> Money {
        self.categories.iter().map(|c| c.allocated).sum()
    }
}

// ============================================================================
// Transactions
// ============================================================================

/// A stored line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerLine {
    /// Line identifier, unique within the ledger.
    pub line_id: LineId,
    /// Category the amount is booked against.
    pub category_id: CategoryId,
    /// Care item slug, trimmed and lowercase.
    pub care_item_slug: String,
    /// Optional free-text label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Strictly positive amount.
    pub amount: Money,
    /// Purchase line this refund line returns money against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_of: Option<RefundRef>,
}

/// An append-only ledger transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Transaction identifier.
    pub id: TransactionId,
    /// Client the transaction belongs to.
    pub client_id: ClientId,
    /// Budget year the transaction is booked against.
    pub year: i32,
    /// Calendar date of the purchase or refund.
    pub date: NaiveDate,
    /// Purchase or refund.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// User who recorded the transaction.
    pub created_by_user_id: UserId,
    /// When the transaction was recorded.
    pub created_at: DateTime<Utc>,
    /// When the transaction was voided, if ever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voided_at: Option<DateTime<Utc>>,
    /// Ordered, non-empty line items.
    pub lines: Vec<LedgerLine>,
}

impl Transaction {
    /// Returns the scope key.
    #[must_use]
    pub fn key(&self) -> BudgetKey {
        BudgetKey::new(self.client_id.clone(), self.year)
    }

    /// Returns true if the transaction was voided.
    #[must_use]
    pub const fn is_voided(&self) -> bool {
        self.voided_at.is_some()
    }

    /// Returns true for non-voided purchases.
    #[must_use]
    pub const fn is_active_purchase(&self) -> bool {
        !self.is_voided() && matches!(self.transaction_type, TransactionType::Purchase)
    }

    /// Returns true for non-voided refunds.
    #[must_use]
    pub const fn is_active_refund(&self) -> bool {
        !self.is_voided() && matches!(self.transaction_type, TransactionType::Refund)
    }

    /// Sum of line amounts, unsigned.
    #[must_use]
    pub fn total(&self) -> Money {
        self.lines.iter().map(|l| l.amount).sum()
    }

    /// Purchase lines referenced by this transaction's refund lines.
    pub fn refund_refs(&self) -> impl Iterator<Item = RefundRef> + '_ {
        self.lines.iter().filter_map(|l| l.refund_of)
    }
}

/// Caller-supplied line item before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInput {
    /// Category the amount is booked against.
    pub category_id: CategoryId,
    /// Care item slug as entered.
    pub care_item_slug: String,
    /// Optional free-text label.
    pub label: Option<String>,
    /// Amount, must be positive.
    pub amount: Money,
    /// Required on refund lines, forbidden on purchase lines.
    pub refund_of: Option<RefundRef>,
}

impl LineInput {
    /// Creates a purchase line.
    #[must_use]
    pub fn purchase(
        category_id: impl Into<CategoryId>,
        care_item_slug: impl Into<String>,
        amount: Money,
    ) -> Self {
        Self {
            category_id: category_id.into(),
            care_item_slug: care_item_slug.into(),
            label: None,
            amount,
            refund_of: None,
        }
    }

    /// Creates a refund line against a purchase line.
    #[must_use]
    pub fn refund(
        category_id: impl Into<CategoryId>,
        care_item_slug: impl Into<String>,
        amount: Money,
        refund_of: RefundRef,
    ) -> Self {
        Self {
            category_id: category_id.into(),
            care_item_slug: care_item_slug.into(),
            label: None,
            amount,
            refund_of: Some(refund_of),
        }
    }

    /// Attaches a label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Caller-supplied transaction before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    /// Client the transaction belongs to.
    pub client_id: ClientId,
    /// Budget year the transaction is booked against.
    pub year: i32,
    /// Calendar date of the purchase or refund.
    pub date: NaiveDate,
    /// Purchase or refund.
    pub transaction_type: TransactionType,
    /// User recording the transaction.
    pub created_by_user_id: UserId,
    /// Line items.
    pub lines: Vec<LineInput>,
}

impl NewTransaction {
    /// Returns the scope key.
    #[must_use]
    pub fn key(&self) -> BudgetKey {
        BudgetKey::new(self.client_id.clone(), self.year)
    }

    /// Purchase lines referenced by refund lines, sorted and deduplicated.
    #[must_use]
    pub fn refund_refs(&self) -> Vec<RefundRef> {
        let mut refs: Vec<RefundRef> = self.lines.iter().filter_map(|l| l.refund_of).collect();
        refs.sort_unstable();
        refs.dedup();
        refs
    }
}

/// Result of a void request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoidOutcome {
    /// The transaction after the request.
    pub transaction: Transaction,
    /// False when the transaction was already voided.
    pub changed: bool,
}

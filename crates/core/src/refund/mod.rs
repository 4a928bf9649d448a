//! Refund matching and the serialization of concurrent refunds.

pub mod locks;
pub mod matcher;

#[cfg(test)]
mod matcher_props;

pub use locks::{RefundLockGuard, RefundLocks};
pub use matcher::{
    RefundableLine, check_refund, live_refunds_of, purchase_line_balances, refund_requests,
    refundable_lines, refunded_totals, resolve_purchase_line,
};

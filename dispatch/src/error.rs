//! Error taxonomy surfaced to callers of the dispatch core.
//!
//! All variants carry human-readable messages and none are retried
//! automatically. Store-layer transients propagate as-is; retry and backoff
//! are a store-client concern. Notification failures never appear here at
//! all - they are logged and discarded by the engines.

use crate::store::StoreError;
use crate::types::BookingId;
use thiserror::Error;

/// Errors returned by the dispatch service and engines.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Malformed intake rejected before any store write
    #[error("validation failed: {0}")]
    Validation(String),

    /// Operation on a booking that does not exist
    #[error("booking {0} not found")]
    NotFound(BookingId),

    /// Caller may not see or touch this booking
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Operation conflicts with waitlist or partner-approval policy
    #[error("{0}")]
    ConflictPolicy(String),

    /// Underlying store failure, propagated unchanged
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Shorthand result alias used across the dispatch crate.
pub type DispatchResult<T> = Result<T, DispatchError>;

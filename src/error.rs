//! Error types for store access.

use thiserror::Error;

/// Everything that can go wrong while talking to the task/calendar store.
///
/// None of these are fatal.  Fetch errors make the poller keep its previous
/// snapshot, action errors are logged and dropped.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached, attached to, or opened.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store was reachable but a query or parse failed mid-operation.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Opening or creating an item failed.
    #[error("action failed: {0}")]
    ActionFailed(String),
}

impl StoreError {
    /// Whether the cached store handle should be dropped and re-attached.
    pub fn invalidates_handle(&self) -> bool {
        matches!(self, StoreError::StoreUnavailable(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

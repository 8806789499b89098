//! Store abstraction layer.
//!
//! The task/calendar store is an external collaborator.  This module defines
//! what the rest of the application needs from it:
//!
//! * [`Store`] knows how to attach to the store and hands out a handle.
//! * [`StoreHandle`] answers queries and performs open/create actions.
//! * [`RecurrencePattern`] resolves a recurring entry to the occurrence on a
//!   given day, if any.
//! * [`StoreContext`] owns the lazily attached handle and shares it between
//!   the pollers.
//!
//! Concrete stores live in sub-modules (currently only [`ics`]).
//!
//! ## Adding a new store
//!
//! 1. Create a new file in this directory.
//! 2. Implement [`Store`] and [`StoreHandle`] for it.  Convert native items
//!    into [`TaskEntry`] / [`CalendarEntry`] values; do not filter or sort,
//!    the fetcher does that.
//! 3. Construct it in `main.rs`.

mod command;
mod ics;
#[cfg(test)]
pub(crate) mod memory;
mod recurrence;

pub use command::ActionCommands;
pub use ics::IcsStore;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::item::{AppointmentOccurrence, ItemKind, TaskRecord};
use crate::window::{Day, LookaheadWindow};

/// A task as the store reports it, before completed tasks are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskEntry {
    pub record: TaskRecord,
    pub complete: bool,
}

/// Resolves a recurring calendar entry to its occurrence on one day.
pub trait RecurrencePattern: fmt::Debug + Send + Sync {
    /// The occurrence starting within `day`, or `None` when the pattern does
    /// not fire that day (including when an exception removed it).
    fn occurrence_on(&self, day: &Day) -> Option<AppointmentOccurrence>;
}

/// A calendar item as the store reports it.
///
/// `base` holds the item's own fields.  For a recurring item `base.start`
/// and `base.end` belong to the first instance of the series and are not
/// themselves displayed; occurrences come from `recurrence`.
#[derive(Debug)]
pub struct CalendarEntry {
    pub base: AppointmentOccurrence,
    pub recurrence: Option<Box<dyn RecurrencePattern>>,
}

impl CalendarEntry {
    pub fn single(base: AppointmentOccurrence) -> Self {
        Self {
            base,
            recurrence: None,
        }
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }
}

/// Connects to a store.
pub trait Store: Send + Sync {
    /// Human-readable label for logs and the status bar.
    fn name(&self) -> &str;

    /// Attach to the store, opening it if necessary.
    fn attach(&self) -> StoreResult<Arc<dyn StoreHandle>>;
}

/// An attached store.
///
/// Handles are shared by the task and calendar pollers, which may query
/// concurrently, so implementations must be [`Sync`].
pub trait StoreHandle: Send + Sync {
    /// Every task in the store, completed ones included.
    fn tasks(&self) -> StoreResult<Vec<TaskEntry>>;

    /// Calendar items that may have occurrences inside `window`.
    ///
    /// Non-recurring items must intersect the window; recurring items are
    /// returned whenever their series may fire inside it.
    fn calendar_items(&self, window: &LookaheadWindow) -> StoreResult<Vec<CalendarEntry>>;

    /// Open the store's own editor for an existing item.
    fn open_item(&self, kind: ItemKind, entry_id: &str) -> StoreResult<()>;

    /// Open the store's own editor for a new item.
    fn create_item(&self, kind: ItemKind) -> StoreResult<()>;
}

/// Owns the store and its lazily attached handle.
pub struct StoreContext {
    store: Box<dyn Store>,
    handle: Mutex<Option<Arc<dyn StoreHandle>>>,
}

impl StoreContext {
    pub fn new(store: impl Store + 'static) -> Self {
        Self {
            store: Box::new(store),
            handle: Mutex::new(None),
        }
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    /// The cached handle, attaching on first use.
    ///
    /// Attaching happens under the lock so concurrent pollers never attach
    /// twice.
    pub fn handle(&self) -> StoreResult<Arc<dyn StoreHandle>> {
        let mut slot = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.as_ref() {
            return Ok(Arc::clone(handle));
        }
        let handle = self.store.attach()?;
        info!(store = self.store.name(), "attached to store");
        *slot = Some(Arc::clone(&handle));
        Ok(handle)
    }

    /// Drop the cached handle so the next call re-attaches.
    pub fn invalidate(&self) {
        let mut slot = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.take().is_some() {
            debug!(store = self.store.name(), "dropped store handle");
        }
    }

    /// Run `f` against the handle.  A [`StoreError::StoreUnavailable`]
    /// result drops the cached handle.
    pub fn with_handle<R>(
        &self,
        f: impl FnOnce(&dyn StoreHandle) -> StoreResult<R>,
    ) -> StoreResult<R> {
        let result = self.handle().and_then(|handle| f(handle.as_ref()));
        if let Err(e) = &result {
            if e.invalidates_handle() {
                self.invalidate();
            }
        }
        result
    }

    pub fn open_item(&self, kind: ItemKind, entry_id: &str) -> StoreResult<()> {
        self.with_handle(|handle| handle.open_item(kind, entry_id))
    }

    pub fn create_item(&self, kind: ItemKind) -> StoreResult<()> {
        self.with_handle(|handle| handle.create_item(kind))
    }
}

impl fmt::Debug for StoreContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreContext")
            .field("store", &self.store.name())
            .finish_non_exhaustive()
    }
}

/// Translate any displayable error into a query failure.
pub(crate) fn query_failed(e: impl fmt::Display) -> StoreError {
    StoreError::QueryFailed(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryStore;
    use super::*;

    #[test]
    fn handle_is_attached_once_and_cached() {
        let store = MemoryStore::default();
        let ctx = StoreContext::new(store.clone());

        ctx.handle().unwrap();
        ctx.handle().unwrap();
        assert_eq!(store.attach_count(), 1);
    }

    #[test]
    fn failed_attach_is_retried_next_time() {
        let store = MemoryStore::default();
        store.set_reachable(false);
        let ctx = StoreContext::new(store.clone());

        assert!(matches!(ctx.handle(), Err(StoreError::StoreUnavailable(_))));
        store.set_reachable(true);
        assert!(ctx.handle().is_ok());
        assert_eq!(store.attach_count(), 2);
    }

    #[test]
    fn unavailable_query_drops_the_handle() {
        let store = MemoryStore::default();
        let ctx = StoreContext::new(store.clone());

        let result: StoreResult<()> = ctx.with_handle(|_| {
            Err(StoreError::StoreUnavailable("closed".into()))
        });
        assert!(result.is_err());
        ctx.handle().unwrap();
        assert_eq!(store.attach_count(), 2);
    }

    #[test]
    fn query_failure_keeps_the_handle() {
        let store = MemoryStore::default();
        let ctx = StoreContext::new(store.clone());

        let result: StoreResult<()> =
            ctx.with_handle(|_| Err(StoreError::QueryFailed("bad filter".into())));
        assert!(result.is_err());
        ctx.handle().unwrap();
        assert_eq!(store.attach_count(), 1);
    }

    #[test]
    fn actions_reach_the_handle() {
        let store = MemoryStore::default();
        store.add_task(crate::item::test_support::task("t1", None), false);
        let ctx = StoreContext::new(store.clone());

        ctx.open_item(ItemKind::Task, "t1").unwrap();
        ctx.create_item(ItemKind::Appointment).unwrap();

        assert_eq!(store.opened(), vec![(ItemKind::Task, "t1".to_string())]);
        assert_eq!(store.created(), vec![ItemKind::Appointment]);
    }

    #[test]
    fn stale_identifier_is_an_action_failure() {
        let store = MemoryStore::default();
        let ctx = StoreContext::new(store);

        let err = ctx.open_item(ItemKind::Task, "missing").unwrap_err();
        assert!(matches!(err, StoreError::ActionFailed(_)));
    }
}

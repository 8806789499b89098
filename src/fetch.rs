//! Snapshot fetching and recurrence expansion.
//!
//! Turns what the store reports into display-ready snapshots: completed
//! tasks are dropped, recurring calendar entries are expanded day by day,
//! finished occurrences are dropped, and everything is sorted.
//!
//! Fetches return a plain `Result`.  Falling back to the previous snapshot
//! on error is the poller's decision, not the fetcher's.

use chrono::{DateTime, Local, Utc};
use tracing::trace;

use crate::error::StoreResult;
use crate::item::{AppointmentOccurrence, Item, TaskRecord};
use crate::snapshot::Snapshot;
use crate::store::{RecurrencePattern, StoreContext};
use crate::window::LookaheadWindow;

/// Default number of days shown in the calendar pane.
pub const DEFAULT_LOOKAHEAD_DAYS: u32 = 7;

/// All open tasks, ordered by due date.
pub fn fetch_tasks(ctx: &StoreContext) -> StoreResult<Snapshot<TaskRecord>> {
    let entries = ctx.with_handle(|handle| handle.tasks())?;
    let open = entries
        .into_iter()
        .filter(|entry| !entry.complete)
        .map(|entry| entry.record)
        .collect();
    Ok(Snapshot::new(open))
}

/// Every occurrence inside `window` that has not ended by `now`, ordered by
/// start time.
pub fn fetch_appointments(
    ctx: &StoreContext,
    window: &LookaheadWindow,
    now: DateTime<Utc>,
) -> StoreResult<Snapshot<AppointmentOccurrence>> {
    let entries = ctx.with_handle(|handle| handle.calendar_items(window))?;
    trace!(
        entries = entries.len(),
        recurring = entries.iter().filter(|e| e.is_recurring()).count(),
        "calendar items"
    );

    let mut occurrences = Vec::new();
    for entry in &entries {
        match &entry.recurrence {
            Some(pattern) => occurrences.extend(expand(pattern.as_ref(), window, now)),
            None if entry.base.is_pending(now) => occurrences.push(entry.base.clone()),
            None => {}
        }
    }
    Ok(Snapshot::new(occurrences))
}

/// Resolve a recurring entry for every day of `window`.
///
/// Days on which the pattern does not fire are skipped; that is the normal
/// case, not an error.  Yields at most one occurrence per day.
pub fn expand(
    pattern: &dyn RecurrencePattern,
    window: &LookaheadWindow,
    now: DateTime<Utc>,
) -> Vec<AppointmentOccurrence> {
    window
        .days()
        .iter()
        .filter_map(|day| {
            let occurrence = pattern.occurrence_on(day);
            if occurrence.is_none() {
                trace!(date = %day.date, "no occurrence");
            }
            occurrence
        })
        .filter(|occurrence| occurrence.is_pending(now))
        .collect()
}

/// One tracked collection: knows how to fetch its own snapshot.
pub trait Collection: Send + Sync + 'static {
    type Item: Item;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn fetch(&self, ctx: &StoreContext) -> StoreResult<Snapshot<Self::Item>>;
}

/// The task list.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tasks;

impl Collection for Tasks {
    type Item = TaskRecord;

    fn name(&self) -> &'static str {
        "tasks"
    }

    fn fetch(&self, ctx: &StoreContext) -> StoreResult<Snapshot<TaskRecord>> {
        fetch_tasks(ctx)
    }
}

/// Calendar occurrences from today's midnight through the lookahead.
#[derive(Debug, Clone, Copy)]
pub struct Appointments {
    pub lookahead_days: u32,
}

impl Default for Appointments {
    fn default() -> Self {
        Self {
            lookahead_days: DEFAULT_LOOKAHEAD_DAYS,
        }
    }
}

impl Collection for Appointments {
    type Item = AppointmentOccurrence;

    fn name(&self) -> &'static str {
        "calendar"
    }

    fn fetch(&self, ctx: &StoreContext) -> StoreResult<Snapshot<AppointmentOccurrence>> {
        let now = Local::now();
        let window = LookaheadWindow::starting_today(&now, self.lookahead_days);
        fetch_appointments(ctx, &window, now.with_timezone(&Utc))
    }
}

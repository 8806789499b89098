//! In-memory store for tests.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use super::{CalendarEntry, RecurrencePattern, Store, StoreHandle, TaskEntry};
use crate::error::{StoreError, StoreResult};
use crate::item::{AppointmentOccurrence, ItemKind, TaskRecord};
use crate::window::{Day, LookaheadWindow};

/// A pattern that fires on the days of a fixed list of occurrences.
#[derive(Debug, Clone, Default)]
pub struct FixedPattern {
    pub occurrences: Vec<AppointmentOccurrence>,
}

impl RecurrencePattern for FixedPattern {
    fn occurrence_on(&self, day: &Day) -> Option<AppointmentOccurrence> {
        self.occurrences
            .iter()
            .find(|o| o.start >= day.start && o.start < day.end)
            .cloned()
    }
}

struct State {
    tasks: Vec<TaskEntry>,
    events: Vec<(AppointmentOccurrence, Option<FixedPattern>)>,
    reachable: bool,
    failing_queries: usize,
    query_delay: Duration,
    attaches: usize,
    queries: usize,
    in_flight: usize,
    max_in_flight: usize,
    opened: Vec<(ItemKind, String)>,
    created: Vec<ItemKind>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            events: Vec::new(),
            reachable: true,
            failing_queries: 0,
            query_delay: Duration::ZERO,
            attaches: 0,
            queries: 0,
            in_flight: 0,
            max_in_flight: 0,
            opened: Vec::new(),
            created: Vec::new(),
        }
    }
}

/// Shared, mutable fake store.  Clones share state, so a test can keep one
/// clone to steer the store while another is owned by a `StoreContext`.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn add_task(&self, record: TaskRecord, complete: bool) {
        self.state().tasks.push(TaskEntry { record, complete });
    }

    pub fn set_tasks(&self, tasks: Vec<TaskRecord>) {
        self.state().tasks = tasks
            .into_iter()
            .map(|record| TaskEntry {
                record,
                complete: false,
            })
            .collect();
    }

    pub fn add_event(&self, occurrence: AppointmentOccurrence) {
        self.state().events.push((occurrence, None));
    }

    pub fn add_recurring(&self, base: AppointmentOccurrence, pattern: FixedPattern) {
        self.state().events.push((base, Some(pattern)));
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.state().reachable = reachable;
    }

    /// Make the next `n` queries fail with [`StoreError::QueryFailed`].
    pub fn fail_queries(&self, n: usize) {
        self.state().failing_queries = n;
    }

    pub fn set_query_delay(&self, delay: Duration) {
        self.state().query_delay = delay;
    }

    pub fn attach_count(&self) -> usize {
        self.state().attaches
    }

    pub fn query_count(&self) -> usize {
        self.state().queries
    }

    pub fn max_in_flight(&self) -> usize {
        self.state().max_in_flight
    }

    pub fn opened(&self) -> Vec<(ItemKind, String)> {
        self.state().opened.clone()
    }

    pub fn created(&self) -> Vec<ItemKind> {
        self.state().created.clone()
    }

    fn query<R>(&self, f: impl FnOnce(&State) -> R) -> StoreResult<R> {
        let delay = {
            let mut state = self.state();
            state.queries += 1;
            if !state.reachable {
                return Err(StoreError::StoreUnavailable("store closed".into()));
            }
            if state.failing_queries > 0 {
                state.failing_queries -= 1;
                return Err(StoreError::QueryFailed("injected failure".into()));
            }
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.query_delay
        };

        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let mut state = self.state();
        state.in_flight -= 1;
        Ok(f(&state))
    }
}

impl Store for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn attach(&self) -> StoreResult<Arc<dyn StoreHandle>> {
        let mut state = self.state();
        state.attaches += 1;
        if !state.reachable {
            return Err(StoreError::StoreUnavailable("store closed".into()));
        }
        Ok(Arc::new(self.clone()))
    }
}

impl StoreHandle for MemoryStore {
    fn tasks(&self) -> StoreResult<Vec<TaskEntry>> {
        self.query(|state| state.tasks.clone())
    }

    fn calendar_items(&self, window: &LookaheadWindow) -> StoreResult<Vec<CalendarEntry>> {
        self.query(|state| {
            state
                .events
                .iter()
                .filter(|(base, pattern)| {
                    pattern.is_some() || window.intersects(base.start, base.end)
                })
                .map(|(base, pattern)| CalendarEntry {
                    base: base.clone(),
                    recurrence: pattern
                        .clone()
                        .map(|p| Box::new(p) as Box<dyn RecurrencePattern>),
                })
                .collect()
        })
    }

    fn open_item(&self, kind: ItemKind, entry_id: &str) -> StoreResult<()> {
        let mut state = self.state();
        let known = match kind {
            ItemKind::Task => state.tasks.iter().any(|t| t.record.entry_id == entry_id),
            ItemKind::Appointment => state.events.iter().any(|(e, _)| e.entry_id == entry_id),
        };
        if !known {
            return Err(StoreError::ActionFailed(format!("no {kind} with id {entry_id}")));
        }
        state.opened.push((kind, entry_id.to_string()));
        Ok(())
    }

    fn create_item(&self, kind: ItemKind) -> StoreResult<()> {
        self.state().created.push(kind);
        Ok(())
    }
}

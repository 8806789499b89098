//! Application state for the terminal view.
//!
//! Holds the accepted snapshot of each collection, which pane has focus and
//! the selection inside each pane.  Snapshots are replaced wholesale when a
//! poller announces a change; nothing here edits them.

use chrono::{DateTime, Local};
use ratatui::widgets::ListState;

use crate::item::{AppointmentOccurrence, Item, ItemKind, TaskRecord};
use crate::snapshot::Snapshot;

/// The two panes of the view.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Pane {
    Tasks,
    Calendar,
}

impl Pane {
    pub fn kind(self) -> ItemKind {
        match self {
            Pane::Tasks => ItemKind::Task,
            Pane::Calendar => ItemKind::Appointment,
        }
    }
}

/// A user request that has to go through the store.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Action {
    Open { kind: ItemKind, entry_id: String },
    Create(ItemKind),
}

pub struct App {
    pub tasks: Snapshot<TaskRecord>,
    pub appointments: Snapshot<AppointmentOccurrence>,
    pub focus: Pane,
    pub task_list: ListState,
    pub calendar_list: ListState,
    /// When each collection last announced a change.
    pub tasks_updated: Option<DateTime<Local>>,
    pub calendar_updated: Option<DateTime<Local>>,
    /// Name of the store, shown in the status bar.
    pub source: String,
    /// Whether the user has requested to quit.
    pub quit: bool,
}

impl App {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            tasks: Snapshot::empty(),
            appointments: Snapshot::empty(),
            focus: Pane::Tasks,
            task_list: ListState::default(),
            calendar_list: ListState::default(),
            tasks_updated: None,
            calendar_updated: None,
            source: source.into(),
            quit: false,
        }
    }

    pub fn replace_tasks(&mut self, snapshot: Snapshot<TaskRecord>) {
        clamp(&mut self.task_list, snapshot.len());
        self.tasks = snapshot;
        self.tasks_updated = Some(Local::now());
    }

    pub fn replace_appointments(&mut self, snapshot: Snapshot<AppointmentOccurrence>) {
        clamp(&mut self.calendar_list, snapshot.len());
        self.appointments = snapshot;
        self.calendar_updated = Some(Local::now());
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Pane::Tasks => Pane::Calendar,
            Pane::Calendar => Pane::Tasks,
        };
    }

    fn focused(&mut self) -> (&mut ListState, usize) {
        match self.focus {
            Pane::Tasks => (&mut self.task_list, self.tasks.len()),
            Pane::Calendar => (&mut self.calendar_list, self.appointments.len()),
        }
    }

    // -- navigation ----------------------------------------------------------

    pub fn select_next(&mut self) {
        let (state, len) = self.focused();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(i) => (i + 1).min(len - 1),
            None => 0,
        };
        state.select(Some(i));
    }

    pub fn select_previous(&mut self) {
        let (state, len) = self.focused();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(i) => i.saturating_sub(1),
            None => 0,
        };
        state.select(Some(i));
    }

    pub fn select_first(&mut self) {
        let (state, len) = self.focused();
        if len > 0 {
            state.select(Some(0));
        }
    }

    pub fn select_last(&mut self) {
        let (state, len) = self.focused();
        if len > 0 {
            state.select(Some(len - 1));
        }
    }

    // -- actions -------------------------------------------------------------

    /// Open the selected item of the focused pane, if any.
    pub fn open_selected(&self) -> Option<Action> {
        let entry_id = match self.focus {
            Pane::Tasks => selected_id(&self.tasks, &self.task_list),
            Pane::Calendar => selected_id(&self.appointments, &self.calendar_list),
        }?;
        Some(Action::Open {
            kind: self.focus.kind(),
            entry_id,
        })
    }

    /// Create a new item of the focused pane's kind.
    pub fn create_in_focus(&self) -> Action {
        Action::Create(self.focus.kind())
    }
}

fn selected_id<T: Item>(snapshot: &Snapshot<T>, state: &ListState) -> Option<String> {
    state
        .selected()
        .and_then(|i| snapshot.get(i))
        .map(|item| item.entry_id().to_string())
}

/// Keep a selection inside a list that now has `len` entries.
fn clamp(state: &mut ListState, len: usize) {
    match state.selected() {
        Some(_) if len == 0 => state.select(None),
        Some(i) if i >= len => state.select(Some(len - 1)),
        _ => {}
    }
}

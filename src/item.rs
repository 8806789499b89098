//! The item types mirrored from the store.
//!
//! Both tasks and appointment occurrences carry the store's opaque
//! identifier and a time to order by; the [`Item`] trait captures that shared
//! shape so the snapshot and change-detection code can stay generic.
//!
//! Occurrence identifiers are *not* unique: every occurrence of a recurring
//! series carries the series identifier.  Value equality is what matters for
//! change detection, never identity.

use std::fmt;

use chrono::{DateTime, Utc};

/// Which kind of store item an action targets.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ItemKind {
    Task,
    Appointment,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Task => "task",
            ItemKind::Appointment => "appointment",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared capabilities of everything that can appear in a snapshot.
pub trait Item: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// The store's identifier, used to open the item again.
    fn entry_id(&self) -> &str;

    /// Key used to order a snapshot.  `None` sorts after every dated item.
    fn sort_time(&self) -> Option<DateTime<Utc>>;
}

/// An open (not completed) task.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TaskRecord {
    pub subject: String,
    pub entry_id: String,
    /// `None` means the task has no deadline.
    pub due: Option<DateTime<Utc>>,
}

impl Item for TaskRecord {
    fn entry_id(&self) -> &str {
        &self.entry_id
    }

    fn sort_time(&self) -> Option<DateTime<Utc>> {
        self.due
    }
}

/// One concrete occurrence of an appointment.
///
/// A standalone appointment produces exactly one of these; a recurring one
/// produces one per day the pattern fires inside the lookahead window.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AppointmentOccurrence {
    pub subject: String,
    pub entry_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: Option<String>,
}

impl AppointmentOccurrence {
    /// An occurrence is still relevant while its end lies in the future.
    pub fn is_pending(&self, now: DateTime<Utc>) -> bool {
        self.end > now
    }
}

impl Item for AppointmentOccurrence {
    fn entry_id(&self) -> &str {
        &self.entry_id
    }

    fn sort_time(&self) -> Option<DateTime<Utc>> {
        Some(self.start)
    }
}

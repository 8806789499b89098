//! iCalendar-backed store.
//!
//! Reads a single `.ics` document from a local path or an HTTP(S)/webcal
//! URL.  `VTODO` components become tasks and `VEVENT` components become
//! appointments.  The document is re-read on every query, so edits made by
//! whatever program owns the file show up on the next poll.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use icalendar::parser::{read_calendar, unfold, Component};
use icalendar::{CalendarDateTime, DatePerhapsTime};
use tracing::{debug, warn};

use super::command::ActionCommands;
use super::recurrence::RRulePattern;
use super::{query_failed, CalendarEntry, RecurrencePattern, Store, StoreHandle, TaskEntry};
use crate::error::{StoreError, StoreResult};
use crate::item::{AppointmentOccurrence, ItemKind, TaskRecord};
use crate::window::LookaheadWindow;

/// Where the document lives.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Source {
    File(PathBuf),
    Url(String),
}

impl Source {
    /// Anything with an `http`, `https` or `webcal` scheme is a URL;
    /// everything else is a path.
    pub fn parse(source: &str) -> Self {
        if let Some(rest) = source.strip_prefix("webcal://") {
            Source::Url(format!("https://{rest}"))
        } else if source.starts_with("http://") || source.starts_with("https://") {
            Source::Url(source.to_string())
        } else {
            Source::File(PathBuf::from(source))
        }
    }

    fn display(&self) -> String {
        match self {
            Source::File(path) => path.display().to_string(),
            Source::Url(url) => url.clone(),
        }
    }
}

/// An `.ics` file or feed.
#[derive(Debug, Clone)]
pub struct IcsStore {
    source: Source,
    label: String,
    commands: ActionCommands,
}

impl IcsStore {
    pub fn new(source: &str, commands: ActionCommands) -> Self {
        let source = Source::parse(source);
        Self {
            label: source.display(),
            source,
            commands,
        }
    }
}

impl Store for IcsStore {
    fn name(&self) -> &str {
        &self.label
    }

    fn attach(&self) -> StoreResult<Arc<dyn StoreHandle>> {
        let client = match &self.source {
            Source::File(path) => {
                if !path.is_file() {
                    return Err(StoreError::StoreUnavailable(format!(
                        "{} does not exist",
                        path.display()
                    )));
                }
                None
            }
            Source::Url(_) => Some(
                reqwest::blocking::Client::builder()
                    .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
                    .build()
                    .map_err(|e| StoreError::StoreUnavailable(e.to_string()))?,
            ),
        };

        Ok(Arc::new(IcsHandle {
            source: self.source.clone(),
            label: self.label.clone(),
            client,
            commands: self.commands.clone(),
        }))
    }
}

struct IcsHandle {
    source: Source,
    label: String,
    client: Option<reqwest::blocking::Client>,
    commands: ActionCommands,
}

impl IcsHandle {
    fn read(&self) -> StoreResult<String> {
        match (&self.source, &self.client) {
            (Source::File(path), _) => fs::read_to_string(path).map_err(|e| match e.kind() {
                io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                    StoreError::StoreUnavailable(format!("{}: {e}", path.display()))
                }
                _ => query_failed(format!("{}: {e}", path.display())),
            }),
            (Source::Url(url), Some(client)) => {
                let response = client.get(url).send().map_err(|e| {
                    if e.is_connect() || e.is_timeout() {
                        StoreError::StoreUnavailable(e.to_string())
                    } else {
                        query_failed(e)
                    }
                })?;
                response
                    .error_for_status()
                    .and_then(|r| r.text())
                    .map_err(query_failed)
            }
            (Source::Url(url), None) => {
                Err(StoreError::StoreUnavailable(format!("no client for {url}")))
            }
        }
    }
}

impl StoreHandle for IcsHandle {
    fn tasks(&self) -> StoreResult<Vec<TaskEntry>> {
        let text = self.read()?;
        parse_tasks(&text)
    }

    fn calendar_items(&self, window: &LookaheadWindow) -> StoreResult<Vec<CalendarEntry>> {
        let text = self.read()?;
        parse_calendar(&text, window)
    }

    fn open_item(&self, kind: ItemKind, entry_id: &str) -> StoreResult<()> {
        self.commands.open(kind, entry_id, &self.label)
    }

    fn create_item(&self, kind: ItemKind) -> StoreResult<()> {
        self.commands.create(kind, &self.label)
    }
}

// ---------------------------------------------------------------------------
// Time values
// ---------------------------------------------------------------------------

/// A `DTSTART`/`DTEND`/`DUE`/`RECURRENCE-ID` value, with its zone semantics
/// kept so recurrences repeat on the right wall-clock time.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(super) enum IcsTime {
    /// All-day value; starts at local midnight.
    Date(NaiveDate),
    Utc(DateTime<Utc>),
    /// No zone given; interpreted in the local zone.
    Floating(NaiveDateTime),
    Zoned { datetime: NaiveDateTime, tzid: String },
}

impl IcsTime {
    pub(super) fn to_utc(&self) -> DateTime<Utc> {
        match self {
            IcsTime::Date(date) => local_to_utc(&Local, date.and_time(NaiveTime::MIN)),
            IcsTime::Utc(dt) => *dt,
            IcsTime::Floating(naive) => local_to_utc(&Local, *naive),
            IcsTime::Zoned { datetime, tzid } => match tzid.parse::<chrono_tz::Tz>() {
                Ok(tz) => local_to_utc(&tz, *datetime),
                Err(_) => {
                    debug!(%tzid, "unknown TZID, using local time");
                    local_to_utc(&Local, *datetime)
                }
            },
        }
    }

    pub(super) fn is_date(&self) -> bool {
        matches!(self, IcsTime::Date(_))
    }
}

impl From<DatePerhapsTime> for IcsTime {
    fn from(value: DatePerhapsTime) -> Self {
        match value {
            DatePerhapsTime::Date(date) => IcsTime::Date(date),
            DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => IcsTime::Utc(dt),
            DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => {
                IcsTime::Floating(naive)
            }
            DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
                IcsTime::Zoned {
                    datetime: date_time,
                    tzid,
                }
            }
        }
    }
}

/// Resolve a wall-clock time in `tz`.  Times skipped by a DST jump are
/// read as UTC wall-clock rather than dropped.
pub(super) fn local_to_utc<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| naive.and_utc())
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn prop_text(component: &Component, name: &str) -> Option<String> {
    component
        .find_prop(name)
        .map(|p| unescape(p.val.as_ref()))
        .filter(|s| !s.is_empty())
}

fn prop_time(component: &Component, name: &str) -> Option<IcsTime> {
    let prop = component.find_prop(name)?;
    DatePerhapsTime::try_from(prop).ok().map(IcsTime::from)
}

fn status_is(component: &Component, status: &str) -> bool {
    component
        .find_prop("STATUS")
        .is_some_and(|p| p.val.as_ref().eq_ignore_ascii_case(status))
}

/// Undo RFC 5545 TEXT escaping.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Every `VTODO` in the document, with its completion state.
pub(super) fn parse_tasks(text: &str) -> StoreResult<Vec<TaskEntry>> {
    let unfolded = unfold(text);
    let calendar = read_calendar(&unfolded).map_err(query_failed)?;
    let tasks = calendar
        .components
        .iter()
        .filter(|c| c.name == "VTODO")
        .filter_map(|todo| {
            let Some(uid) = prop_text(todo, "UID") else {
                warn!("skipping VTODO without UID");
                return None;
            };
            let complete = status_is(todo, "COMPLETED")
                || status_is(todo, "CANCELLED")
                || todo.find_prop("COMPLETED").is_some()
                || todo
                    .find_prop("PERCENT-COMPLETE")
                    .and_then(|p| p.val.as_ref().trim().parse::<u8>().ok())
                    == Some(100);
            Some(TaskEntry {
                record: TaskRecord {
                    subject: prop_text(todo, "SUMMARY").unwrap_or_else(|| "(untitled)".into()),
                    entry_id: uid,
                    due: prop_time(todo, "DUE").map(|t| t.to_utc()),
                },
                complete,
            })
        })
        .collect();
    Ok(tasks)
}

/// A parsed `VEVENT`, before recurrence handling.
struct EventComponent {
    base: AppointmentOccurrence,
    start: IcsTime,
    rrule: Option<String>,
    exdates: Vec<IcsTime>,
    recurrence_id: Option<IcsTime>,
    cancelled: bool,
}

fn parse_event(event: &Component) -> Option<EventComponent> {
    let uid = prop_text(event, "UID")?;
    let start = prop_time(event, "DTSTART")?;
    let end = prop_time(event, "DTEND");

    let start_utc = start.to_utc();
    let end_utc = match &end {
        Some(end) => end.to_utc(),
        None if start.is_date() => start_utc + Duration::days(1),
        None => start_utc,
    };

    let exdates = event
        .properties
        .iter()
        .filter(|p| p.name == "EXDATE")
        .flat_map(|p| {
            let tzid = p
                .params
                .iter()
                .find(|param| param.key == "TZID")
                .and_then(|param| param.val.as_ref().map(|v| v.to_string()));
            let is_date = p.params.iter().any(|param| {
                param.key == "VALUE" && param.val.as_ref().map(|v| v.as_ref()) == Some("DATE")
            });
            parse_exdates(p.val.as_ref(), tzid.as_deref(), is_date)
        })
        .collect();

    Some(EventComponent {
        base: AppointmentOccurrence {
            subject: prop_text(event, "SUMMARY").unwrap_or_else(|| "(untitled)".into()),
            entry_id: uid,
            start: start_utc,
            end: end_utc,
            location: prop_text(event, "LOCATION"),
        },
        start,
        rrule: event.find_prop("RRULE").map(|p| p.val.to_string()),
        exdates,
        recurrence_id: prop_time(event, "RECURRENCE-ID"),
        cancelled: status_is(event, "CANCELLED"),
    })
}

/// Parse a (possibly comma separated) `EXDATE` value.
fn parse_exdates(value: &str, tzid: Option<&str>, is_date: bool) -> Vec<IcsTime> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            if is_date || (s.len() == 8 && s.chars().all(|c| c.is_ascii_digit())) {
                return NaiveDate::parse_from_str(s, "%Y%m%d").ok().map(IcsTime::Date);
            }
            let utc = s.ends_with('Z');
            let naive =
                NaiveDateTime::parse_from_str(s.trim_end_matches('Z'), "%Y%m%dT%H%M%S").ok()?;
            Some(match (utc, tzid) {
                (true, _) => IcsTime::Utc(naive.and_utc()),
                (false, Some(tzid)) => IcsTime::Zoned {
                    datetime: naive,
                    tzid: tzid.to_string(),
                },
                (false, None) => IcsTime::Floating(naive),
            })
        })
        .collect()
}

/// Calendar entries that may occur inside `window`.
pub(super) fn parse_calendar(
    text: &str,
    window: &LookaheadWindow,
) -> StoreResult<Vec<CalendarEntry>> {
    let unfolded = unfold(text);
    let calendar = read_calendar(&unfolded).map_err(query_failed)?;
    let events: Vec<EventComponent> = calendar
        .components
        .iter()
        .filter(|c| c.name == "VEVENT")
        .filter_map(|c| {
            let parsed = parse_event(c);
            if parsed.is_none() {
                warn!("skipping VEVENT without UID or DTSTART");
            }
            parsed
        })
        .collect();

    // Instance overrides, keyed by series UID.  A cancelled override removes
    // its instance; any other replaces it.
    let mut overrides: HashMap<String, Vec<(DateTime<Utc>, Option<AppointmentOccurrence>)>> =
        HashMap::new();
    let recurring_uids: Vec<&str> = events
        .iter()
        .filter(|e| e.rrule.is_some() && e.recurrence_id.is_none())
        .map(|e| e.base.entry_id.as_str())
        .collect();
    for event in &events {
        if let Some(rid) = &event.recurrence_id {
            if recurring_uids.contains(&event.base.entry_id.as_str()) {
                let replacement = (!event.cancelled).then(|| event.base.clone());
                overrides
                    .entry(event.base.entry_id.clone())
                    .or_default()
                    .push((rid.to_utc(), replacement));
            }
        }
    }

    let mut entries = Vec::new();
    for event in &events {
        match (&event.rrule, &event.recurrence_id) {
            (Some(rrule), None) => {
                let series_overrides = overrides.remove(&event.base.entry_id).unwrap_or_default();
                match RRulePattern::new(
                    event.base.clone(),
                    event.start.clone(),
                    rrule,
                    &event.exdates,
                    series_overrides,
                ) {
                    Ok(pattern) => entries.push(CalendarEntry {
                        base: event.base.clone(),
                        recurrence: Some(Box::new(pattern) as Box<dyn RecurrencePattern>),
                    }),
                    Err(e) => warn!(uid = %event.base.entry_id, error = %e, "skipping unreadable recurrence"),
                }
            }
            (_, Some(_)) if recurring_uids.contains(&event.base.entry_id.as_str()) => {
                // Handled by the series it belongs to.
            }
            _ => {
                if !event.cancelled && window.intersects(event.base.start, event.base.end) {
                    entries.push(CalendarEntry::single(event.base.clone()));
                }
            }
        }
    }
    Ok(entries)
}

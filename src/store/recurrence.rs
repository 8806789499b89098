//! RRULE resolution for recurring `VEVENT`s.
//!
//! A series is resolved one day at a time: [`RRulePattern::occurrence_on`]
//! returns the instance that starts within the given day, honouring
//! `EXDATE`s and `RECURRENCE-ID` overrides.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rrule::RRuleSet;

use super::ics::IcsTime;
use super::RecurrencePattern;
use crate::error::{StoreError, StoreResult};
use crate::item::AppointmentOccurrence;
use crate::window::Day;

/// Upper bound on instances looked at per resolved day.
const MAX_INSTANCES_PER_QUERY: u16 = 64;

/// How rrule's datetimes map back to real instants.
///
/// rrule only understands UTC and named zones, so all-day and floating
/// series are expanded with their wall-clock values posing as UTC and
/// converted to the local zone afterwards.  That keeps the time of day
/// stable across DST changes.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Frame {
    Real,
    WallClockDate,
    WallClockTime,
}

impl Frame {
    fn to_utc(self, occurrence: &DateTime<rrule::Tz>) -> DateTime<Utc> {
        match self {
            Frame::Real => occurrence.with_timezone(&Utc),
            Frame::WallClockDate => IcsTime::Date(occurrence.date_naive()).to_utc(),
            Frame::WallClockTime => IcsTime::Floating(occurrence.naive_utc()).to_utc(),
        }
    }
}

#[derive(Debug)]
pub(super) struct RRulePattern {
    rules: RRuleSet,
    frame: Frame,
    template: AppointmentOccurrence,
    duration: Duration,
    excluded: Vec<DateTime<Utc>>,
    excluded_dates: Vec<NaiveDate>,
    overrides: Vec<(DateTime<Utc>, Option<AppointmentOccurrence>)>,
}

impl RRulePattern {
    /// `template` supplies subject, identifier, location and (via its start
    /// and end) the duration of every instance.
    pub(super) fn new(
        template: AppointmentOccurrence,
        start: IcsTime,
        rrule: &str,
        exdates: &[IcsTime],
        overrides: Vec<(DateTime<Utc>, Option<AppointmentOccurrence>)>,
    ) -> StoreResult<Self> {
        let (dtstart, frame) = dtstart_line(&start);
        let rule = normalize_until(rrule, frame != Frame::Real);
        let rules: RRuleSet = format!("{dtstart}\nRRULE:{rule}").parse().map_err(|e| {
            StoreError::QueryFailed(format!("bad RRULE for '{}': {e}", template.entry_id))
        })?;

        let mut excluded = Vec::new();
        let mut excluded_dates = Vec::new();
        for exdate in exdates {
            match exdate {
                IcsTime::Date(date) => excluded_dates.push(*date),
                other => excluded.push(other.to_utc()),
            }
        }

        Ok(Self {
            rules,
            frame,
            duration: template.end - template.start,
            template,
            excluded,
            excluded_dates,
            overrides,
        })
    }

    fn is_excluded(&self, start: DateTime<Utc>, day: &Day) -> bool {
        self.excluded.contains(&start) || self.excluded_dates.contains(&day.date)
    }
}

impl RecurrencePattern for RRulePattern {
    fn occurrence_on(&self, day: &Day) -> Option<AppointmentOccurrence> {
        // Widen the query by a day each side; wall-clock frames can be off by
        // up to the local UTC offset.
        let tz = rrule::Tz::UTC;
        let after = (day.start - Duration::days(1)).with_timezone(&tz);
        let before = (day.end + Duration::days(1)).with_timezone(&tz);
        let result = self
            .rules
            .clone()
            .after(after)
            .before(before)
            .all(MAX_INSTANCES_PER_QUERY);

        let start = result
            .dates
            .iter()
            .map(|occurrence| self.frame.to_utc(occurrence))
            .find(|start| *start >= day.start && *start < day.end)?;

        if self.is_excluded(start, day) {
            return None;
        }

        if let Some((_, replacement)) = self.overrides.iter().find(|(rid, _)| *rid == start) {
            return replacement.clone();
        }

        Some(AppointmentOccurrence {
            start,
            end: start + self.duration,
            ..self.template.clone()
        })
    }
}

/// The `DTSTART` line for rrule and the frame its results live in.
fn dtstart_line(start: &IcsTime) -> (String, Frame) {
    match start {
        IcsTime::Date(date) => (
            format!("DTSTART:{}T000000Z", date.format("%Y%m%d")),
            Frame::WallClockDate,
        ),
        IcsTime::Utc(dt) => (
            format!("DTSTART:{}", dt.format("%Y%m%dT%H%M%SZ")),
            Frame::Real,
        ),
        IcsTime::Zoned { datetime, tzid } if tzid.parse::<chrono_tz::Tz>().is_ok() => (
            format!("DTSTART;TZID={}:{}", tzid, datetime.format("%Y%m%dT%H%M%S")),
            Frame::Real,
        ),
        IcsTime::Zoned { datetime, .. } | IcsTime::Floating(datetime) => (
            format!("DTSTART:{}Z", datetime.format("%Y%m%dT%H%M%S")),
            Frame::WallClockTime,
        ),
    }
}

/// Bring `UNTIL` in line with the `DTSTART` we hand to rrule: date-only
/// values become end-of-day, and wall-clock series get a `Z` suffix.
fn normalize_until(rrule: &str, wall_clock: bool) -> String {
    rrule
        .split(';')
        .map(|part| match part.split_once('=') {
            Some((key, value)) if key.eq_ignore_ascii_case("UNTIL") => {
                if value.len() == 8 && value.chars().all(|c| c.is_ascii_digit()) {
                    format!("UNTIL={value}T235959Z")
                } else if wall_clock && !value.ends_with('Z') {
                    format!("UNTIL={value}Z")
                } else {
                    part.to_string()
                }
            }
            _ => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join(";")
}

//! The lookahead window that bounds calendar fetches.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

/// One calendar day of the window, as UTC bounds `[start, end)`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Day {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// `[today's midnight, today's midnight + N days)` in the user's time zone.
///
/// Days are computed in the local zone, so a day may be 23 or 25 hours long
/// around a DST switch.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LookaheadWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    days: Vec<Day>,
}

impl LookaheadWindow {
    /// Window starting at the midnight that begins `now`'s day, in `now`'s zone.
    pub fn starting_today<Tz: TimeZone>(now: &DateTime<Tz>, days: u32) -> Self {
        let tz = now.timezone();
        let first = now.date_naive();

        let days: Vec<Day> = (0..days)
            .filter_map(|offset| {
                let date = first.checked_add_days(chrono::Days::new(u64::from(offset)))?;
                let next = date.succ_opt()?;
                Some(Day {
                    date,
                    start: midnight(&tz, date),
                    end: midnight(&tz, next),
                })
            })
            .collect();

        let start = midnight(&tz, first);
        let end = days.last().map(|d| d.end).unwrap_or(start);
        Self { start, end, days }
    }

    pub fn days(&self) -> &[Day] {
        &self.days
    }

    /// Whether an item spanning `[start, end]` touches the window.
    ///
    /// The window end is exclusive, matching [`Day::end`]: an item starting
    /// at the midnight after the last day belongs to the next window.
    pub fn intersects(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end && end >= self.start
    }
}

/// First instant of `date` in `tz`, falling back to treating the wall clock
/// as UTC when midnight does not exist in that zone.
fn midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| naive.and_utc())
}

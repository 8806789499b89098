//! Terminal UI rendering.
//!
//! All drawing logic lives here, separated from application state ([`App`])
//! and input handling ([`crate::input`]).
//!
//! The layout is a vertical stack: tasks on top, the calendar below, and a
//! one-line status bar.  The focused pane gets a highlighted border.

use chrono::{DateTime, Local, NaiveDate, Utc};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::app::{App, Pane};
use crate::item::AppointmentOccurrence;

/// Where a task's due date falls relative to today.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Due {
    None,
    Overdue,
    Today,
    Upcoming,
}

impl Due {
    pub fn classify(due: Option<DateTime<Utc>>, today: NaiveDate) -> Self {
        match due.map(|d| d.with_timezone(&Local).date_naive()) {
            None => Due::None,
            Some(date) if date < today => Due::Overdue,
            Some(date) if date == today => Due::Today,
            Some(_) => Due::Upcoming,
        }
    }

    fn color(self) -> Color {
        match self {
            Due::None => Color::DarkGray,
            Due::Overdue => Color::LightRed,
            Due::Today => Color::White,
            Due::Upcoming => Color::LightGreen,
        }
    }
}

/// Draw the complete UI for one frame.
pub fn draw(app: &mut App, frame: &mut Frame) {
    let [tasks_area, calendar_area, status_area] = Layout::vertical([
        Constraint::Percentage(50),
        Constraint::Min(3),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    draw_tasks(app, frame, tasks_area);
    draw_calendar(app, frame, calendar_area);
    draw_status_bar(app, frame, status_area);
}

fn draw_tasks(app: &mut App, frame: &mut Frame, area: Rect) {
    let today = Local::now().date_naive();
    let items: Vec<ListItem> = app
        .tasks
        .items()
        .iter()
        .map(|task| {
            let due = Due::classify(task.due, today);
            let due_str = task
                .due
                .map(|d| d.with_timezone(&Local).format("%a %d %b").to_string())
                .unwrap_or_else(|| "no due date".into());

            ListItem::new(Line::from(vec![
                Span::styled(format!("{due_str:<12}"), Style::default().fg(due.color())),
                Span::raw(" "),
                Span::styled(task.subject.as_str(), Style::default().fg(due.color())),
            ]))
        })
        .collect();

    let title = format!(" Tasks ({}) ", app.tasks.len());
    render_pane(frame, area, items, title, app.focus == Pane::Tasks, &mut app.task_list);
}

fn draw_calendar(app: &mut App, frame: &mut Frame, area: Rect) {
    let occurrences = app.appointments.items();
    let items: Vec<ListItem> = occurrences
        .iter()
        .enumerate()
        .map(|(i, occ)| {
            let previous = i.checked_sub(1).map(|p| &occurrences[p]);
            let when = when_label(occ, previous);

            let mut spans = vec![
                Span::styled(format!("{when:<20}"), Style::default().fg(Color::DarkGray)),
                Span::raw(" "),
                Span::styled(occ.subject.as_str(), Style::default().fg(Color::White)),
            ];
            if let Some(location) = &occ.location {
                spans.push(Span::styled(
                    format!("  @ {location}"),
                    Style::default().fg(Color::Cyan),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let title = format!(" Calendar ({}) ", app.appointments.len());
    render_pane(
        frame,
        area,
        items,
        title,
        app.focus == Pane::Calendar,
        &mut app.calendar_list,
    );
}

/// Time range of an occurrence.  The day is only spelled out on the first
/// occurrence of each local day, so the list reads as grouped by day.
fn when_label(occ: &AppointmentOccurrence, previous: Option<&AppointmentOccurrence>) -> String {
    let start = occ.start.with_timezone(&Local);
    let end = occ.end.with_timezone(&Local);
    let same_day_as_previous =
        previous.is_some_and(|p| p.start.with_timezone(&Local).date_naive() == start.date_naive());

    let day = if same_day_as_previous {
        " ".repeat(6)
    } else {
        start.format("%a %d").to_string()
    };
    if start.date_naive() == end.date_naive() {
        format!("{day} {}–{}", start.format("%H:%M"), end.format("%H:%M"))
    } else {
        format!("{day} {}–{}", start.format("%H:%M"), end.format("%a %d %H:%M"))
    }
}

fn render_pane(
    frame: &mut Frame,
    area: Rect,
    items: Vec<ListItem>,
    title: String,
    focused: bool,
    state: &mut ListState,
) {
    let border = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let list = List::new(items)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(border),
        )
        .highlight_style(
            Style::default()
                .add_modifier(Modifier::BOLD)
                .bg(Color::DarkGray),
        )
        .highlight_symbol("▸ ");

    frame.render_stateful_widget(list, area, state);
}

/// Render the bottom status bar.
fn draw_status_bar(app: &App, frame: &mut Frame, area: Rect) {
    let stamp = |t: Option<DateTime<Local>>| {
        t.map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "–".into())
    };

    let status = Paragraph::new(Line::from(vec![
        Span::raw(" "),
        Span::styled(app.source.as_str(), Style::default().fg(Color::Yellow)),
        Span::raw("  "),
        Span::styled(
            format!(
                "tasks {}  calendar {}",
                stamp(app.tasks_updated),
                stamp(app.calendar_updated)
            ),
            Style::default().fg(Color::Green),
        ),
        Span::raw("  q: quit  tab: switch  ↵: open  n: new"),
    ]));
    frame.render_widget(status, area);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    use crate::item::test_support::*;
    use crate::snapshot::Snapshot;

    fn render(app: &mut App) -> String {
        let backend = TestBackend::new(100, 24);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| draw(app, f)).unwrap();
        let buf = terminal.backend().buffer().clone();
        buf.content()
            .iter()
            .map(|c| c.symbol().chars().next().unwrap_or(' '))
            .collect()
    }

    #[test]
    fn due_classification() {
        let noon = Local
            .from_local_datetime(
                &NaiveDate::from_ymd_opt(2025, 3, 4)
                    .unwrap()
                    .and_hms_opt(12, 0, 0)
                    .unwrap(),
            )
            .earliest()
            .unwrap()
            .with_timezone(&Utc);
        let today = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();

        assert_eq!(Due::classify(None, today), Due::None);
        assert_eq!(Due::classify(Some(noon), today), Due::Today);
        assert_eq!(Due::classify(Some(noon - Duration::days(1)), today), Due::Overdue);
        assert_eq!(Due::classify(Some(noon + Duration::days(1)), today), Due::Upcoming);
    }

    #[test]
    fn draw_does_not_panic_with_no_items() {
        let mut app = App::new("test.ics");
        let text = render(&mut app);
        assert!(text.contains("Tasks (0)"));
        assert!(text.contains("Calendar (0)"));
    }

    #[test]
    fn draw_shows_items_and_location() {
        let mut app = App::new("test.ics");
        app.replace_tasks(Snapshot::new(vec![task("a", Some(day(1))), task("b", None)]));
        let mut meeting = appointment("m", day(2), 1);
        meeting.location = Some("Room 4".into());
        app.replace_appointments(Snapshot::new(vec![meeting]));
        app.select_first();

        let text = render(&mut app);
        assert!(text.contains("Tasks (2)"));
        assert!(text.contains("Task a"));
        assert!(text.contains("no due date"));
        assert!(text.contains("Meeting m"));
        assert!(text.contains("@ Room 4"));
    }

    #[test]
    fn day_is_shown_once_per_group() {
        let first = appointment("a", day(2) + Duration::hours(9), 1);
        let same_day = appointment("b", day(2) + Duration::hours(9), 2);
        let later = appointment("c", day(4) + Duration::hours(9), 1);

        let day_of = |occ: &AppointmentOccurrence| {
            occ.start.with_timezone(&Local).format("%a %d").to_string()
        };

        let head = when_label(&first, None);
        assert!(head.starts_with(&day_of(&first)));

        let grouped = when_label(&same_day, Some(&first));
        assert!(grouped.starts_with("      "));
        assert!(!grouped.contains(&day_of(&same_day)));

        let next = when_label(&later, Some(&same_day));
        assert!(next.starts_with(&day_of(&later)));
    }

    #[test]
    fn status_bar_shows_source() {
        let mut app = App::new("personal.ics");
        let text = render(&mut app);
        assert!(text.contains("personal.ics"));
    }
}

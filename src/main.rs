//! deskpim — a live view of your tasks and upcoming appointments.
//!
//! ## Architecture overview
//!
//! ```text
//!                 ┌──────────────┐
//!                 │ StoreContext │  attach once, re-attach after outages
//!                 └──────┬───────┘
//!            fetch (spawn_blocking, one per cycle)
//!             ┌──────────┴──────────┐
//!      ┌──────────────┐      ┌──────────────┐
//!      │ poll (tasks) │      │ poll (cal.)  │   tokio tasks
//!      └──────┬───────┘      └──────┬───────┘
//!             │ Snapshot            │ Snapshot       (mpsc)
//!             └──────────┬──────────┘
//!                   ┌──────────┐  draw()  ┌──────────┐
//!                   │  app.rs  │ ───────► │  ui.rs   │
//!                   │ (state)  │          │ (render) │
//!                   └──────────┘          └──────────┘
//!                        ▲
//!                        │ handle_key_event()
//!                   ┌──────────┐
//!                   │ input.rs │
//!                   └──────────┘
//! ```
//!
//! * **`store/`** — the `Store` / `StoreHandle` traits and the iCalendar
//!   backend, including recurrence expansion.
//! * **`fetch`** — turns store queries into sorted snapshots.
//! * **`poll`** — one timer-driven poller per collection.
//! * **`app`** — owns the accepted snapshots and selection state.
//! * **`ui`** — pure rendering: reads `App` state and draws widgets.
//! * **`input`** — maps key events to `App` mutations and store actions.
//! * **`main`** — wires everything together: parse args, load config, set up
//!   logging and the terminal, and run the event loop.

mod app;
mod config;
mod error;
mod fetch;
mod input;
mod item;
mod poll;
mod snapshot;
mod store;
mod ui;
mod window;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use app::{Action, App};
use config::Config;
use fetch::{Appointments, Tasks};
use snapshot::ChangePolicy;
use store::{IcsStore, StoreContext};

#[derive(Parser, Debug)]
#[command(name = "deskpim", version, about = "Live view of tasks and upcoming appointments")]
struct Cli {
    /// Config file (default: ~/.config/deskpim/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path or URL of the .ics document; overrides the config file
    #[arg(short, long)]
    source: Option<String>,

    /// Days of calendar to show, starting today
    #[arg(short = 'd', long)]
    lookahead_days: Option<u32>,

    /// Seconds between polls of each collection
    #[arg(short, long)]
    interval: Option<u64>,

    /// When a fetched snapshot counts as a change
    #[arg(long, value_enum)]
    change_policy: Option<ChangePolicy>,
}

impl Cli {
    fn into_config(self) -> Result<Config> {
        let mut config = match self.config.or_else(Config::default_path) {
            Some(path) => Config::load(&path)?,
            None => Config::default(),
        };

        if let Some(source) = self.source {
            config.source = Some(source);
        }
        if let Some(days) = self.lookahead_days {
            config.lookahead_days = days;
        }
        if let Some(secs) = self.interval {
            config.task_interval_secs = secs;
            config.calendar_interval_secs = secs;
        }
        if let Some(policy) = self.change_policy {
            config.change_policy = policy;
        }

        config.validate()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Route `tracing` output to a file; the terminal belongs to the UI.
///
/// The returned guard flushes pending lines when dropped.
fn init_logging(path: &Path) -> Result<WorkerGuard> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("could not create log directory {}", dir.display()))?;
    let file_name = path.file_name().unwrap_or_else(|| "deskpim.log".as_ref());

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(guard)
}

// ---------------------------------------------------------------------------
// RAII terminal guard
// ---------------------------------------------------------------------------

/// Enters raw mode and the alternate screen; [`Drop`] restores both, also
/// during unwinding.
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl TerminalGuard {
    fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Restore the terminal before the default hook prints the panic message.
fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(info);
    }));
}

/// Run a user action against the store.  Failures are logged, never fatal.
fn perform(ctx: &StoreContext, action: Action) {
    let result = match &action {
        Action::Open { kind, entry_id } => ctx.open_item(*kind, entry_id),
        Action::Create(kind) => ctx.create_item(*kind),
    };
    if let Err(e) = result {
        warn!(?action, error = %e, "action failed");
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let config = Cli::parse().into_config()?;
    let _log_guard = init_logging(&config.log_path())?;

    let source = config.source().context("no source configured")?;
    info!(%source, lookahead_days = config.lookahead_days, "starting");

    // Created outside the runtime: the cached handle may own a blocking HTTP
    // client, which must not be dropped on an async worker.
    let ctx = Arc::new(StoreContext::new(IcsStore::new(&source, config.commands.clone())));

    let rt = tokio::runtime::Runtime::new().context("could not start the async runtime")?;

    let (mut task_rx, mut calendar_rx) = {
        let _enter = rt.enter();
        let (task_rx, _) = poll::spawn(Tasks, Arc::clone(&ctx), config.task_polling());
        let appointments = Appointments {
            lookahead_days: config.lookahead_days,
        };
        let (calendar_rx, _) =
            poll::spawn(appointments, Arc::clone(&ctx), config.calendar_polling());
        (task_rx, calendar_rx)
    };

    install_panic_hook();
    let mut guard = TerminalGuard::new()?;
    let mut app = App::new(ctx.store_name());

    // -- main event loop -----------------------------------------------------
    // Runs at ~10 fps (100 ms tick).  Each iteration:
    //   1. Take any snapshots the pollers announced.
    //   2. Render the UI.
    //   3. Poll for keyboard input (non-blocking, up to tick_rate).
    let tick_rate = Duration::from_millis(100);

    loop {
        while let Ok(snapshot) = task_rx.try_recv() {
            app.replace_tasks(snapshot);
        }
        while let Ok(snapshot) = calendar_rx.try_recv() {
            app.replace_appointments(snapshot);
        }

        guard.terminal.draw(|f| ui::draw(&mut app, f))?;

        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                if let Some(action) = input::handle_key_event(&mut app, key) {
                    let ctx = Arc::clone(&ctx);
                    rt.spawn_blocking(move || perform(&ctx, action));
                }
            }
        }

        if app.quit {
            break;
        }
    }

    drop(guard);
    drop((task_rx, calendar_rx));
    rt.shutdown_timeout(Duration::from_secs(1));
    info!("stopped");
    drop(ctx);
    Ok(())
}

//! Terminal dashboard for butterfly.
//!
//! Shows incoming audience questions and their suggested answers while a
//! background thread polls the question source. Each question is answered on
//! its own worker thread; results are delivered to the UI over a channel.

use std::io;
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::{
    event::{self as crossterm_event, Event},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{error, warn};

use crate::answerer::AnswerEngine;
use crate::livestorm::{LivestormError, Question};
use crate::poller::{ErrorAction, Poller, PollerBuilder, StopHandle};
use crate::qa::AnswerState;

mod app;
pub mod event;
mod ui;

pub use app::{App, DashboardEvent, Focus};

/// Initializes the terminal for TUI rendering.
///
/// Enables raw mode and enters the alternate screen.
fn init_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("failed to create terminal")?;
    Ok(terminal)
}

/// Restores the terminal to its original state.
///
/// This should always be called before exiting the TUI, even in error cases,
/// to prevent terminal corruption.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

/// Minimal terminal restoration for the panic handler.
fn restore_terminal_panic() {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen);
}

/// Installs a panic hook that restores the terminal before the original hook
/// runs.
fn init_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        restore_terminal_panic();
        original_hook(panic_info);
    }));
}

/// Answers `question` on a new thread and reports the result to `tx`.
fn spawn_answer(
    engine: Arc<AnswerEngine>,
    document: PathBuf,
    question: Question,
    tx: Sender<DashboardEvent>,
) {
    thread::spawn(move || {
        let result = engine.answer_question(&document, &question.text);
        if let Err(err) = &result {
            warn!(id = %question.id, error = %err, "failed to answer question");
        }
        // The receiver is gone only when the dashboard is shutting down.
        let _ = tx.send(DashboardEvent::Answered {
            id: question.id,
            answer: AnswerState::from_result(&result),
        });
    });
}

/// Starts the polling thread.
///
/// Fetch failures are reported to the UI as `PollFailed`; the thread keeps
/// polling unless `stop_on_error` is set. The thread ends when `stop` is
/// triggered, when the policy stops it, or when the UI has gone away.
pub fn spawn_poller(
    builder: PollerBuilder,
    stop_on_error: bool,
    engine: Arc<AnswerEngine>,
    document: PathBuf,
    tx: Sender<DashboardEvent>,
) -> (StopHandle, JoinHandle<()>) {
    let policy_tx = tx.clone();
    let mut poller: Poller = builder
        .policy(move |err: &LivestormError| {
            let _ = policy_tx.send(DashboardEvent::PollFailed(err.to_string()));
            if stop_on_error {
                ErrorAction::Stop
            } else {
                ErrorAction::Continue
            }
        })
        .build();
    let stop = poller.stop_handle();

    let handle = thread::spawn(move || {
        let result = poller.run(
            |question: &Question| -> Result<(), mpsc::SendError<DashboardEvent>> {
                tx.send(DashboardEvent::NewQuestion(question.clone()))?;
                spawn_answer(engine.clone(), document.clone(), question.clone(), tx.clone());
                Ok(())
            },
        );

        let reason = result.err().map(|err| {
            error!(error = %err, "polling stopped");
            err.to_string()
        });
        let _ = tx.send(DashboardEvent::PollerStopped(reason));
    });

    (stop, handle)
}

/// Drains all pending updates into the app.
fn drain_events(app: &mut App, rx: &Receiver<DashboardEvent>) {
    while let Ok(event) = rx.try_recv() {
        app.apply(event);
    }
}

/// Runs the main event loop for the TUI.
///
/// Terminal state is always restored, even on error.
pub fn run_event_loop(app: &mut App, rx: &Receiver<DashboardEvent>) -> Result<()> {
    let mut terminal = init_terminal()?;

    let result = run_event_loop_internal(app, rx, &mut terminal);

    if let Err(e) = restore_terminal(&mut terminal) {
        eprintln!("Error restoring terminal: {e}");
    }

    result
}

fn run_event_loop_internal(
    app: &mut App,
    rx: &Receiver<DashboardEvent>,
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
) -> Result<()> {
    loop {
        drain_events(app, rx);

        terminal.draw(|frame| {
            ui::draw(frame, app);
        })?;

        if crossterm_event::poll(Duration::from_millis(100))?
            && let Event::Key(key) = crossterm_event::read()?
            && event::handle_key_event(app, key)
        {
            break;
        }
    }

    Ok(())
}

/// Entry point for the dashboard.
///
/// Starts polling with `builder`, answers questions against `document` with
/// `engine`, and renders until the user quits.
///
/// # Errors
///
/// Returns an error if the terminal cannot be initialized or drawn.
pub fn run(
    builder: PollerBuilder,
    stop_on_error: bool,
    engine: Arc<AnswerEngine>,
    document: &Path,
) -> Result<()> {
    init_panic_hook();

    let (tx, rx) = mpsc::channel();
    let (stop, poller_thread) =
        spawn_poller(builder, stop_on_error, engine, document.to_path_buf(), tx);

    let document_name = document
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| document.display().to_string());
    let mut app = App::new(document_name);

    let result = run_event_loop(&mut app, &rx).context("TUI event loop failed");

    stop.stop();
    drop(rx);
    finish_poller(poller_thread, SHUTDOWN_GRACE);

    result
}

/// How long quitting waits for the polling thread before leaving it behind.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Joins the stopped polling thread if it exits within `grace`.
///
/// A thread still blocked in a fetch is detached rather than joined; it ends
/// on its own once the request returns. Returns true if the thread was joined.
fn finish_poller(handle: JoinHandle<()>, grace: Duration) -> bool {
    let deadline = Instant::now() + grace;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            warn!("polling thread still busy, exiting without it");
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
    if handle.join().is_err() {
        error!("polling thread panicked");
    }
    true
}

//! Library entry point for the Callboard TUI.
//!
//! Provides a reusable [`run`] function that launches the Ratatui dashboard
//! against a pre-configured [`SyncController`].

mod app;
mod bridge;
mod event;
mod ui;

use anyhow::anyhow;
use app::{App, KeyAction};
use bridge::{ChannelObserver, spawn_status_forwarder};
use callboard_rs_core::{Route, SyncController};
use crossterm::event::Event as CrosstermEvent;
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use event::AppEvent;
use log::{debug, info, warn};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Configuration for a dashboard session.
#[derive(Debug, Clone)]
pub struct TuiConfig {
    /// Route shown on startup.
    pub initial_route: Route,
    /// Redraw tick interval.
    pub tick: Duration,
}

impl Default for TuiConfig {
    fn default() -> Self {
        Self {
            initial_route: Route::Home,
            tick: Duration::from_millis(250),
        }
    }
}

/// Launch the dashboard against a controller.
///
/// Starts the change subscription and the initial load in the background,
/// so the first frames show the loading state. The subscription is released
/// on exit.
///
/// # Errors
/// Returns an error if terminal setup or the event loop fails.
pub async fn run(controller: Arc<SyncController>, config: TuiConfig) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    controller.add_observer(Arc::new(ChannelObserver::new(tx.clone())));
    spawn_status_forwarder(controller.watch_status(), tx.clone());
    spawn_sync_startup(controller.clone());

    let mut app = App::new(config.initial_route);
    app.set_records(controller.snapshot());

    let mut terminal = setup_terminal()?;
    spawn_input_handler(tx.clone());
    spawn_tick(tx, config.tick);
    info!("dashboard started (route={})", config.initial_route);

    let result = event_loop(&mut terminal, &mut app, &controller, &mut rx).await;

    controller.stop_listening();
    restore_terminal(&mut terminal)?;
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    controller: &SyncController,
    rx: &mut mpsc::UnboundedReceiver<AppEvent>,
) -> anyhow::Result<()> {
    loop {
        terminal.draw(|frame| ui::draw(frame, app))?;
        let event = rx
            .recv()
            .await
            .ok_or_else(|| anyhow!("event channel closed unexpectedly"))?;
        if handle_app_event(event, app, controller).await {
            return Ok(());
        }
    }
}

/// Dispatch a UI event and return true when the app should exit.
async fn handle_app_event(event: AppEvent, app: &mut App, controller: &SyncController) -> bool {
    match event {
        AppEvent::Input(key) => match app.handle_key(key) {
            KeyAction::Quit => {
                info!("quit requested");
                return true;
            }
            KeyAction::Refresh => {
                debug!("manual refresh requested");
                if let Err(err) = controller.refresh().await {
                    warn!("refresh failed (error={})", err);
                }
            }
            KeyAction::None => {}
        },
        AppEvent::Records(records) => app.set_records(records),
        AppEvent::Status(status) => app.set_status(status),
        AppEvent::Tick => {}
    }
    false
}

/// Load the collection while the subscription opens in parallel.
fn spawn_sync_startup(controller: Arc<SyncController>) {
    tokio::spawn(async move {
        let status = controller.start().await;
        debug!(
            "initial load finished (error={})",
            status
                .last_error
                .as_ref()
                .map(|failure| failure.message.as_str())
                .unwrap_or("none")
        );
    });
}

/// Spawn a task to poll for key events.
fn spawn_input_handler(sender: mpsc::UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        loop {
            if matches!(crossterm::event::poll(Duration::from_millis(30)), Ok(true)) {
                while matches!(crossterm::event::poll(Duration::from_millis(0)), Ok(true)) {
                    let event = match crossterm::event::read() {
                        Ok(event) => event,
                        Err(_) => break,
                    };
                    if let CrosstermEvent::Key(key) = event
                        && sender.send(AppEvent::Input(key)).is_err()
                    {
                        return;
                    }
                }
            } else {
                tokio::task::yield_now().await;
            }
        }
    });
}

/// Spawn a periodic tick event generator.
fn spawn_tick(sender: mpsc::UnboundedSender<AppEvent>, tick: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        loop {
            interval.tick().await;
            if sender.send(AppEvent::Tick).is_err() {
                return;
            }
        }
    });
}

/// Configure terminal in raw mode with alternate screen.
fn setup_terminal() -> anyhow::Result<Terminal<CrosstermBackend<Stdout>>> {
    debug!("setting up terminal");
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore terminal state on exit.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    debug!("restoring terminal");
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

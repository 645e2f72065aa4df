//! Application state for the Callboard dashboard.

use callboard_rs_core::{DashboardView, FailureKind, Route, SyncStatus, filter_for};
use callboard_rs_protocol::{CallRecord, RecordId};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use log::debug;

/// Side effect requested by a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    None,
    Refresh,
    Quit,
}

/// Top-level application state for the TUI.
pub struct App {
    /// Active navigation route.
    pub route: Route,
    /// Latest full store snapshot, newest first.
    pub records: Vec<CallRecord>,
    /// Latest controller status.
    pub status: SyncStatus,
    /// Index of the highlighted call in the visible list.
    pub selected: usize,
    /// Record shown in the detail overlay.
    pub detail: Option<RecordId>,
}

impl App {
    pub fn new(route: Route) -> Self {
        Self {
            route,
            records: Vec::new(),
            status: SyncStatus::default(),
            selected: 0,
            detail: None,
        }
    }

    /// Replace the snapshot, keeping the selection in range and dropping a
    /// detail overlay whose record disappeared.
    pub fn set_records(&mut self, records: Vec<CallRecord>) {
        self.records = records;
        if let Some(id) = &self.detail
            && !self.records.iter().any(|record| &record.id == id)
        {
            debug!("closing detail for removed record (id={})", id);
            self.detail = None;
        }
        self.clamp_selection();
    }

    pub fn set_status(&mut self, status: SyncStatus) {
        self.status = status;
    }

    /// Projection rendered for the current frame.
    pub fn view(&self) -> DashboardView {
        DashboardView::project(self.route, &self.records, self.status.loading)
    }

    pub fn visible(&self) -> Vec<&CallRecord> {
        filter_for(self.route, &self.records)
    }

    pub fn selected_record(&self) -> Option<&CallRecord> {
        self.visible().get(self.selected).copied()
    }

    pub fn detail_record(&self) -> Option<&CallRecord> {
        let id = self.detail.as_ref()?;
        self.records.iter().find(|record| &record.id == id)
    }

    pub fn switch_route(&mut self, route: Route) {
        if self.route != route {
            debug!("switching route (from={}, to={})", self.route, route);
        }
        self.route = route;
        self.selected = 0;
        self.detail = None;
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.visible().len() {
            self.selected += 1;
        }
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn open_detail(&mut self) {
        self.detail = self.selected_record().map(|record| record.id.clone());
    }

    pub fn close_detail(&mut self) {
        self.detail = None;
    }

    /// Short sync state for the status bar.
    pub fn status_text(&self) -> String {
        if self.status.loading {
            return "loading".to_string();
        }
        let mut text = if self.status.listening {
            "live".to_string()
        } else {
            "offline".to_string()
        };
        if let Some(failure) = &self.status.last_error {
            let label = match failure.kind {
                FailureKind::Load => "load failed",
                FailureKind::Subscription => "updates unavailable",
            };
            text = format!("{text} | {label}: {}", failure.message);
        }
        if let Some(at) = self.status.last_synced_at {
            text = format!("{text} | synced {}", at.format("%H:%M:%S"));
        }
        text
    }

    /// Apply a key press to local state and report the follow-up action.
    pub fn handle_key(&mut self, key: KeyEvent) -> KeyAction {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return KeyAction::Quit;
        }
        if self.detail.is_some() {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Backspace) {
                self.close_detail();
            } else if key.code == KeyCode::Char('q') {
                return KeyAction::Quit;
            }
            return KeyAction::None;
        }
        match key.code {
            KeyCode::Char('q') => return KeyAction::Quit,
            KeyCode::Char('r') => return KeyAction::Refresh,
            KeyCode::Char(ch @ '1'..='4') => {
                let idx = ch as usize - '1' as usize;
                self.switch_route(Route::ALL[idx]);
            }
            KeyCode::Tab => self.switch_route(self.route.next()),
            KeyCode::Up | KeyCode::Char('k') => self.select_previous(),
            KeyCode::Down | KeyCode::Char('j') => self.select_next(),
            KeyCode::Home => self.selected = 0,
            KeyCode::End => self.selected = self.visible().len().saturating_sub(1),
            KeyCode::Enter => self.open_detail(),
            _ => {}
        }
        KeyAction::None
    }

    fn clamp_selection(&mut self) {
        let len = self.visible().len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }
}

/// `42s` or `3m 07s`.
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{seconds}s")
    } else {
        format!("{}m {:02}s", seconds / 60, seconds % 60)
    }
}

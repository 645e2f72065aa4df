//! Route-keyed projections of the store.

use crate::stats::{Stats, compute_stats};
use callboard_rs_protocol::CallRecord;
use std::fmt;

/// Number of records shown on the home route.
pub const HOME_LIMIT: usize = 5;

/// Navigation context selecting which subset of records is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Route {
    /// Most recent calls.
    #[default]
    Home,
    /// Calls where a meeting was requested.
    Meetings,
    /// Positive calls or meeting requests.
    Leads,
    /// Every call.
    Calls,
}

impl Route {
    /// Routes in sidebar order.
    pub const ALL: [Route; 4] = [Route::Home, Route::Meetings, Route::Leads, Route::Calls];

    /// Resolve a route key or path (`leads`, `/leads`). Unknown keys map to
    /// [`Route::Home`].
    pub fn parse(key: &str) -> Self {
        match key.trim().trim_matches('/').to_ascii_lowercase().as_str() {
            "meetings" => Self::Meetings,
            "leads" => Self::Leads,
            "calls" => Self::Calls,
            _ => Self::Home,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Meetings => "meetings",
            Self::Leads => "leads",
            Self::Calls => "calls",
        }
    }

    /// Page title shown above the list.
    pub fn title(self) -> &'static str {
        match self {
            Self::Home => "Dashboard",
            Self::Meetings => "Meeting requests",
            Self::Leads => "Leads",
            Self::Calls => "Call log",
        }
    }

    /// Route after this one in sidebar order, wrapping around.
    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|route| *route == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Records visible on `route`, in store order.
pub fn filter_for(route: Route, records: &[CallRecord]) -> Vec<&CallRecord> {
    match route {
        Route::Home => records.iter().take(HOME_LIMIT).collect(),
        Route::Meetings => records.iter().filter(|r| r.meeting_requested).collect(),
        Route::Leads => records.iter().filter(|r| r.is_lead()).collect(),
        Route::Calls => records.iter().collect(),
    }
}

/// Everything the presentation layer renders for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub route: Route,
    pub stats: Stats,
    pub records: Vec<CallRecord>,
    pub loading: bool,
}

impl DashboardView {
    /// Project a snapshot onto `route`.
    pub fn project(route: Route, snapshot: &[CallRecord], loading: bool) -> Self {
        Self {
            route,
            stats: compute_stats(snapshot),
            records: filter_for(route, snapshot).into_iter().cloned().collect(),
            loading,
        }
    }
}

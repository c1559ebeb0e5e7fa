//! Application state and its controller.
//!
//! [`AppState`] is owned by one [`Dashboard`] controller and changes only
//! through its actions. Readers take a [`DashboardSnapshot`], a consistent
//! copy for one point in time.

use std::sync::Arc;

use chrono::{DateTime, Local};
use oraclex_relay::Instrument;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use super::{
    config::DashboardConfig,
    debug_log::{DebugLog, LogEntry},
    presentation::{derive_panel, Panel, Tab, Theme},
    view::{ViewModel, ViewRecord},
};

pub const STARTING_MESSAGE: &str = "Starting fetch...";
pub const UPDATED_MESSAGE: &str = "Display updated";

/// Result of one completed fetch cycle, applied in a single write
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub view: ViewModel,
    /// Success entries, in order
    pub progress: Vec<String>,
    /// Every source error of the cycle, already summarised into one line
    pub failure: Option<String>,
    /// At least one source returned fresh data
    pub refreshed: bool,
}

#[derive(Debug, Clone)]
pub struct AppState {
    view: Arc<ViewModel>,
    selected: Instrument,
    tab: Tab,
    loading: bool,
    last_update: Option<DateTime<Local>>,
    log: DebugLog,
    revision: u64,
}

impl AppState {
    pub fn new(selected: Instrument, log_size: usize) -> Self {
        Self {
            view: Arc::new(ViewModel::empty()),
            selected,
            tab: Tab::default(),
            loading: false,
            last_update: None,
            log: DebugLog::new(log_size),
            revision: 0,
        }
    }

    pub fn view(&self) -> &Arc<ViewModel> {
        &self.view
    }

    pub fn selected(&self) -> Instrument {
        self.selected
    }

    pub fn selected_record(&self) -> &ViewRecord {
        self.view.get(self.selected)
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_update(&self) -> Option<DateTime<Local>> {
        self.last_update
    }

    pub fn debug_log(&self) -> &DebugLog {
        &self.log
    }

    /// Number of view models published so far
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Unknown symbols leave the selection unchanged
    pub fn select_symbol(&mut self, symbol: &str) -> Option<Instrument> {
        let instrument = Instrument::from_symbol(symbol)?;
        self.select_instrument(instrument);
        Some(instrument)
    }

    pub fn select_instrument(&mut self, instrument: Instrument) {
        self.selected = instrument;
    }

    pub fn select_tab(&mut self, tab: Tab) {
        self.tab = tab;
    }

    pub fn next_tab(&mut self) {
        self.tab = self.tab.next();
    }

    pub fn previous_tab(&mut self) {
        self.tab = self.tab.previous();
    }

    pub fn cycle_started(&mut self, progress: impl IntoIterator<Item = String>) {
        self.loading = true;
        self.log.success(STARTING_MESSAGE);
        for message in progress {
            self.log.success(message);
        }
    }

    /// Replace the whole view model and close the cycle
    pub fn cycle_completed(&mut self, report: CycleReport) {
        for message in report.progress {
            self.log.success(message);
        }
        if let Some(failure) = report.failure {
            self.log.failure(failure);
        }

        self.view = Arc::new(report.view);
        self.revision += 1;
        if report.refreshed {
            self.last_update = Some(Local::now());
        }
        self.loading = false;
        self.log.success(UPDATED_MESSAGE);
    }
}

/// Read-only copy of the state handed to presentation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub view: ViewModel,
    pub selected: Instrument,
    pub tab: Tab,
    pub loading: bool,
    pub last_update: Option<DateTime<Local>>,
    pub debug_log: Vec<LogEntry>,
    pub revision: u64,
}

impl DashboardSnapshot {
    pub fn selected_record(&self) -> &ViewRecord {
        self.view.get(self.selected)
    }

    pub fn panel(&self, theme: &Theme) -> Panel {
        derive_panel(self.selected_record(), self.tab, theme)
    }

    pub fn debug_lines(&self) -> Vec<String> {
        self.debug_log.iter().map(LogEntry::to_string).collect()
    }
}

/// Controller owning the application state
#[derive(Debug, Clone)]
pub struct Dashboard {
    state: Arc<RwLock<AppState>>,
    theme: Theme,
    revision_tx: Arc<watch::Sender<u64>>,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new(&DashboardConfig::default())
    }
}

impl Dashboard {
    pub fn new(config: &DashboardConfig) -> Self {
        let (revision_tx, _) = watch::channel(0);
        Self {
            state: Arc::new(RwLock::new(AppState::new(
                config.initial_symbol,
                config.debug_log_size,
            ))),
            theme: config.theme,
            revision_tx: Arc::new(revision_tx),
        }
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let state = self.state.read();
        DashboardSnapshot {
            view: ViewModel::clone(&state.view),
            selected: state.selected,
            tab: state.tab,
            loading: state.loading,
            last_update: state.last_update,
            debug_log: state.log.entries().cloned().collect(),
            revision: state.revision,
        }
    }

    /// Current view model; the `Arc` is never mutated after publication
    pub fn view(&self) -> Arc<ViewModel> {
        Arc::clone(&self.state.read().view)
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().loading
    }

    pub fn last_update(&self) -> Option<DateTime<Local>> {
        self.state.read().last_update
    }

    pub fn debug_lines(&self) -> Vec<String> {
        self.state.read().log.lines()
    }

    pub fn revision(&self) -> u64 {
        self.state.read().revision
    }

    /// Panel for the selected instrument and tab
    pub fn panel(&self) -> Panel {
        let state = self.state.read();
        derive_panel(state.selected_record(), state.tab, &self.theme)
    }

    /// Notified with the revision number after every publication
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision_tx.subscribe()
    }

    pub fn select_symbol(&self, symbol: &str) -> Option<Instrument> {
        let selected = self.state.write().select_symbol(symbol);
        if selected.is_none() {
            debug!(%symbol, "ignoring selection outside the catalogue");
        }
        selected
    }

    pub fn select_instrument(&self, instrument: Instrument) {
        self.state.write().select_instrument(instrument);
    }

    pub fn select_tab(&self, tab: Tab) {
        self.state.write().select_tab(tab);
    }

    pub fn next_tab(&self) {
        self.state.write().next_tab();
    }

    pub fn previous_tab(&self) {
        self.state.write().previous_tab();
    }

    pub fn cycle_started(&self, progress: impl IntoIterator<Item = String>) {
        self.state.write().cycle_started(progress);
    }

    pub fn cycle_completed(&self, report: CycleReport) {
        let revision = {
            let mut state = self.state.write();
            state.cycle_completed(report);
            state.revision
        };
        self.revision_tx.send_replace(revision);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::debug_log::Marker;

    fn report(view: ViewModel, refreshed: bool, failure: Option<&str>) -> CycleReport {
        CycleReport {
            view,
            progress: vec!["Relay returned: 1 symbols".to_string()],
            failure: failure.map(str::to_string),
            refreshed,
        }
    }

    #[test]
    fn test_initial_state() {
        let dashboard = Dashboard::default();
        let snapshot = dashboard.snapshot();

        assert_eq!(snapshot.selected, Instrument::Xauusd);
        assert_eq!(snapshot.tab, Tab::Overview);
        assert!(!snapshot.loading);
        assert!(snapshot.last_update.is_none());
        assert_eq!(snapshot.view, ViewModel::empty());
        assert!(snapshot.panel(dashboard.theme()).is_waiting());
    }

    #[test]
    fn test_selection_actions() {
        let dashboard = Dashboard::default();

        assert_eq!(dashboard.select_symbol("btcusd"), Some(Instrument::Btcusd));
        assert_eq!(dashboard.select_symbol("DOGEUSD"), None);
        assert_eq!(dashboard.snapshot().selected, Instrument::Btcusd);

        dashboard.select_tab(Tab::Session);
        dashboard.next_tab();
        assert_eq!(dashboard.snapshot().tab, Tab::Overview);
        dashboard.previous_tab();
        assert_eq!(dashboard.snapshot().tab, Tab::Session);
    }

    #[test]
    fn test_cycle_lifecycle() {
        let dashboard = Dashboard::default();
        let mut revisions = dashboard.subscribe();

        dashboard.cycle_started(["Fetching from Relay: http://relay/get-market-state".to_string()]);
        assert!(dashboard.is_loading());

        let mut gold = ViewRecord::empty(Instrument::Xauusd);
        gold.has_market = true;
        gold.price = 2400.5;
        dashboard.cycle_completed(report(ViewModel::from_records([gold]), true, None));

        let snapshot = dashboard.snapshot();
        assert!(!snapshot.loading);
        assert!(snapshot.last_update.is_some());
        assert_eq!(snapshot.revision, 1);
        assert_eq!(snapshot.selected_record().price, 2400.5);
        assert!(revisions.has_changed().unwrap());
        assert_eq!(*revisions.borrow_and_update(), 1);

        let texts: Vec<&str> = snapshot.debug_log.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                STARTING_MESSAGE,
                "Fetching from Relay: http://relay/get-market-state",
                "Relay returned: 1 symbols",
                UPDATED_MESSAGE,
            ]
        );
    }

    #[test]
    fn test_failed_cycle_keeps_last_update() {
        let dashboard = Dashboard::default();

        dashboard.cycle_started(Vec::new());
        dashboard.cycle_completed(report(ViewModel::empty(), false, Some("Error: relay down")));

        let snapshot = dashboard.snapshot();
        assert!(!snapshot.loading);
        assert!(snapshot.last_update.is_none());
        let failures: Vec<&LogEntry> = snapshot
            .debug_log
            .iter()
            .filter(|entry| entry.marker == Marker::Failure)
            .collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].text, "Error: relay down");
    }

    #[test]
    fn test_snapshot_json_is_keyed_by_symbol() {
        let dashboard = Dashboard::default();
        dashboard.select_instrument(Instrument::Eurusd);

        let json = serde_json::to_value(dashboard.snapshot()).unwrap();
        let records = json["view"]["records"].as_object().unwrap();
        let mut keys: Vec<&str> = records.keys().map(String::as_str).collect();
        let mut expected: Vec<&str> = Instrument::ALL.iter().map(|i| i.symbol()).collect();
        keys.sort_unstable();
        expected.sort_unstable();

        assert_eq!(keys, expected);
        assert_eq!(records["XAUUSD"]["instrument"], "XAUUSD");
        assert_eq!(json["selected"], "EURUSD");
    }

    #[test]
    fn test_published_view_is_not_mutated_by_later_cycles() {
        let dashboard = Dashboard::default();
        let before = dashboard.view();

        let mut gold = ViewRecord::empty(Instrument::Xauusd);
        gold.has_market = true;
        gold.price = 1.0;
        dashboard.cycle_completed(report(ViewModel::from_records([gold]), true, None));

        assert_eq!(*before, ViewModel::empty());
        assert_eq!(dashboard.view()[Instrument::Xauusd].price, 1.0);
    }
}

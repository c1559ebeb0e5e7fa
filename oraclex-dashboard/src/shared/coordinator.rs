//! Fetch coordinator
//!
//! Drives the refresh cycle: acquire market state and analysis from a
//! [`RelaySource`], merge, and publish through the [`Dashboard`] controller.
//!
//! - Cycles never overlap: a tick arriving while a cycle is running is skipped.
//! - Every source call is bounded by the relay request timeout.
//! - After teardown, results of a cycle still in flight are dropped unpublished.
//! - Source errors never escape a cycle; they are summarised into one debug
//!   log entry and the affected source degrades per [`FailurePolicy`].

use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use futures::future::join_all;
use oraclex_relay::{
    client::{ANALYSIS_PATH, LATEST_ANALYSIS_PATH, MARKET_STATE_PATH},
    AnalysisMap, Instrument, MarketQuote, MarketState, RelayError, RelaySource,
};
use parking_lot::Mutex;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{timeout, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use super::{
    config::{Acquisition, DashboardConfig, FailurePolicy},
    merge::merge,
    state::{CycleReport, Dashboard},
    view::Source,
};

/// What a call to [`FetchCoordinator::run_cycle`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A new view model was published
    Published { symbols: usize, failures: usize },
    /// Another cycle was still in flight
    Skipped,
    /// Torn down before the cycle could publish
    Cancelled,
}

/// Teardown signal shared by the coordinator and its cycles
pub fn shutdown_channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Payload of one source for one cycle; the error is already summarised
type Fetched<T> = Result<T, String>;

/// Last good payload per source
#[derive(Debug, Default)]
struct Retained {
    quotes: Option<Vec<MarketQuote>>,
    analyses: Option<AnalysisMap>,
}

/// Clears the in-flight flag when the cycle ends, however it ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct FetchCoordinator {
    source: Arc<dyn RelaySource>,
    config: DashboardConfig,
    dashboard: Dashboard,
    in_flight: AtomicBool,
    retained: Mutex<Retained>,
    shutdown: watch::Receiver<bool>,
}

impl FetchCoordinator {
    pub fn new(
        source: Arc<dyn RelaySource>,
        config: DashboardConfig,
        dashboard: Dashboard,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            config,
            dashboard,
            in_flight: AtomicBool::new(false),
            retained: Mutex::new(Retained::default()),
            shutdown,
        }
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Teardown requested, or the signal's owner is gone
    pub fn is_shut_down(&self) -> bool {
        *self.shutdown.borrow() || self.shutdown.has_changed().is_err()
    }

    /// Run one fetch-merge-publish cycle.
    pub async fn run_cycle(&self) -> CycleOutcome {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!("previous cycle still in flight, skipping tick");
            return CycleOutcome::Skipped;
        }
        let _in_flight = InFlight(&self.in_flight);

        if self.is_shut_down() {
            return CycleOutcome::Cancelled;
        }

        let started = Instant::now();
        self.dashboard.cycle_started(self.fetch_messages());

        let mut shutdown = self.shutdown.clone();
        let (market, analyses) = tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown) => {
                info!("coordinator torn down mid-cycle, discarding results");
                return CycleOutcome::Cancelled;
            }
            fetched = self.acquire() => fetched,
        };

        if self.is_shut_down() {
            info!("coordinator torn down mid-cycle, discarding results");
            return CycleOutcome::Cancelled;
        }

        let symbols = market.as_ref().map(|state| state.quotes.len()).unwrap_or(0);
        let report = self.resolve(market, analyses);
        let failures = usize::from(report.failure.is_some());

        info!(
            symbols,
            failed = report.failure.is_some(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetch cycle published"
        );
        self.dashboard.cycle_completed(report);

        CycleOutcome::Published { symbols, failures }
    }

    /// Timer loop: one cycle immediately, then one per refresh interval until teardown
    pub async fn run(self: Arc<Self>) {
        let mut shutdown = self.shutdown.clone();
        let period = self.config.effective_refresh_interval();
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            relay = %self.source.describe(),
            acquisition = %self.config.acquisition,
            failure_policy = %self.config.failure_policy,
            refresh_secs = period.as_secs(),
            "fetch coordinator started"
        );

        loop {
            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break,
                _ = interval.tick() => {
                    let coordinator = Arc::clone(&self);
                    tokio::spawn(async move {
                        coordinator.run_cycle().await;
                    });
                }
            }
        }

        info!("fetch coordinator stopped");
    }

    fn fetch_messages(&self) -> Vec<String> {
        let relay = self.source.describe();
        let mut messages = vec![format!("Fetching from Relay: {relay}/{MARKET_STATE_PATH}")];
        match self.config.acquisition {
            Acquisition::PerSymbol => messages.push(format!(
                "Fetching analysis: {relay}/{ANALYSIS_PATH}/{{symbol}} x{}",
                Instrument::ALL.len()
            )),
            Acquisition::Batched => {
                messages.push(format!("Fetching analysis: {relay}/{LATEST_ANALYSIS_PATH}"))
            }
            Acquisition::Embedded => {}
        }
        messages
    }

    /// Bound a source call by the request timeout
    async fn bounded<T>(
        &self,
        endpoint: String,
        call: impl Future<Output = Result<T, RelayError>>,
    ) -> Result<T, RelayError> {
        let budget = self.config.relay.request_timeout;
        match timeout(budget, call).await {
            Ok(result) => result,
            Err(_) => Err(RelayError::Timeout {
                endpoint,
                millis: duration_millis(budget),
            }),
        }
    }

    /// Issue every call of the configured strategy; all are awaited before returning
    async fn acquire(&self) -> (Fetched<MarketState>, Fetched<AnalysisMap>) {
        let market = self.bounded(format!("/{MARKET_STATE_PATH}"), self.source.market_state());

        match self.config.acquisition {
            Acquisition::Embedded => {
                let market = market.await.map_err(source_failed);
                let analyses = market
                    .as_ref()
                    .map(|state| state.embedded.clone())
                    .map_err(String::clone);
                (market, analyses)
            }
            Acquisition::Batched => {
                let analyses = self.bounded(
                    format!("/{LATEST_ANALYSIS_PATH}"),
                    self.source.latest_analyses(),
                );
                let (market, analyses) = futures::join!(market, analyses);
                (
                    market.map_err(source_failed),
                    analyses.map_err(source_failed),
                )
            }
            Acquisition::PerSymbol => {
                let (market, analyses) = futures::join!(market, self.acquire_per_symbol());
                (market.map_err(source_failed), analyses)
            }
        }
    }

    /// Fails only when every per-symbol call failed
    async fn acquire_per_symbol(&self) -> Fetched<AnalysisMap> {
        let calls = Instrument::ALL.into_iter().map(|instrument| async move {
            let symbol = instrument.symbol();
            let result = self
                .bounded(
                    format!("/{ANALYSIS_PATH}/{symbol}"),
                    self.source.analysis(symbol),
                )
                .await;
            (instrument, result)
        });

        let mut analyses = AnalysisMap::new();
        let mut errors = Vec::new();
        for (instrument, result) in join_all(calls).await {
            match result {
                Ok(record) => {
                    analyses.insert(instrument.symbol().to_string(), record);
                }
                Err(error) => {
                    debug!(symbol = %instrument, %error, "analysis call failed");
                    errors.push(error);
                }
            }
        }

        match (analyses.is_empty(), errors.first()) {
            (true, Some(first)) => Err(format!(
                "all {} analysis calls failed ({})",
                errors.len(),
                failure_text(first)
            )),
            _ => {
                if !errors.is_empty() {
                    warn!(
                        failed = errors.len(),
                        total = Instrument::ALL.len(),
                        "some analysis calls failed"
                    );
                }
                Ok(analyses)
            }
        }
    }

    /// Apply the failure policy, merge, and build the report for publication
    fn resolve(&self, market: Fetched<MarketState>, analyses: Fetched<AnalysisMap>) -> CycleReport {
        let policy = self.config.failure_policy;
        let refreshed = market.is_ok() || analyses.is_ok();
        let mut retained = self.retained.lock();
        let mut progress = Vec::new();
        let mut errors: Vec<String> = Vec::new();
        let mut stale = Vec::new();

        let quotes = match market {
            Ok(state) => {
                progress.push(format!("Relay returned: {} symbols", state.quotes.len()));
                retained.quotes = Some(state.quotes.clone());
                state.quotes
            }
            Err(error) => {
                errors.push(error);
                fallback(policy, &retained.quotes, Source::Market, &mut stale)
            }
        };

        let analyses = match analyses {
            Ok(map) => {
                if self.config.acquisition != Acquisition::Embedded || !map.is_empty() {
                    progress.push(format!("Analysis returned: {} symbols", map.len()));
                }
                retained.analyses = Some(map.clone());
                map
            }
            Err(error) => {
                // Embedded analysis fails together with the market call, report it once
                if !errors.contains(&error) {
                    errors.push(error);
                }
                fallback(policy, &retained.analyses, Source::Analysis, &mut stale)
            }
        };

        let mut view = merge(&quotes, &analyses);
        for source in stale.iter().copied() {
            view.mark_stale(source);
        }

        let failure = (!errors.is_empty()).then(|| {
            let mut text = format!("Error: {}", errors.join("; "));
            if !stale.is_empty() {
                text.push_str(" (showing last good data)");
            }
            text
        });

        CycleReport {
            view,
            progress,
            failure,
            refreshed,
        }
    }
}

/// Debug log text for a source error; errors a retry cannot clear are tagged
fn failure_text(error: &RelayError) -> String {
    if error.is_transient() {
        error.summary()
    } else {
        format!("{} [permanent]", error.summary())
    }
}

fn source_failed(error: RelayError) -> String {
    warn!(
        endpoint = error.endpoint().unwrap_or_default(),
        transient = error.is_transient(),
        %error,
        "relay call failed"
    );
    failure_text(&error)
}

/// Last good payload under [`FailurePolicy::Retain`], defaults otherwise
fn fallback<T: Clone + Default>(
    policy: FailurePolicy,
    retained: &Option<T>,
    source: Source,
    stale: &mut Vec<Source>,
) -> T {
    match (policy, retained) {
        (FailurePolicy::Retain, Some(last_good)) => {
            stale.push(source);
            last_good.clone()
        }
        _ => T::default(),
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Resolves once teardown is requested or the signal's owner is dropped
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Running coordinator; tear it down with [`CoordinatorHandle::shutdown`]
pub struct CoordinatorHandle {
    coordinator: Arc<FetchCoordinator>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl CoordinatorHandle {
    pub fn coordinator(&self) -> &Arc<FetchCoordinator> {
        &self.coordinator
    }

    pub fn dashboard(&self) -> &Dashboard {
        self.coordinator.dashboard()
    }

    /// Stop issuing cycles and drop results of any cycle in flight
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Shut down and wait for the timer loop to exit
    pub async fn stop(self) {
        self.shutdown();
        if let Err(error) = self.task.await {
            warn!(%error, "fetch coordinator task failed");
        }
    }
}

/// Start the timer loop on the current runtime
pub fn spawn(
    source: Arc<dyn RelaySource>,
    config: DashboardConfig,
    dashboard: Dashboard,
) -> CoordinatorHandle {
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let coordinator = Arc::new(FetchCoordinator::new(source, config, dashboard, shutdown_rx));
    let task = tokio::spawn(Arc::clone(&coordinator).run());

    CoordinatorHandle {
        coordinator,
        shutdown_tx,
        task,
    }
}

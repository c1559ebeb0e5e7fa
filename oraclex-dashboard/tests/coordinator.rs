use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use oraclex_dashboard::{
    shutdown_channel, spawn, Acquisition, Bias, CycleOutcome, Dashboard, DashboardConfig,
    FailurePolicy, FetchCoordinator, Marker, ViewRecord,
};
use oraclex_relay::{
    AnalysisMap, AnalysisRecord, Instrument, MarketState, RelayConfig, RelayError, RelaySource,
};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::{watch, Notify};

/// In-memory relay; unset payloads behave like an unreachable service
#[derive(Default)]
struct FakeRelay {
    market: Mutex<Option<Result<MarketState, RelayError>>>,
    latest: Mutex<Option<Result<AnalysisMap, RelayError>>>,
    per_symbol: Mutex<HashMap<String, AnalysisRecord>>,
    market_delay: Option<Duration>,
    gate: Option<Arc<Notify>>,
    entered: Notify,
    analysis_calls: AtomicUsize,
}

fn unreachable(endpoint: &str) -> RelayError {
    RelayError::Request {
        endpoint: endpoint.to_string(),
        reason: "connection refused".to_string(),
    }
}

#[async_trait]
impl RelaySource for FakeRelay {
    async fn market_state(&self) -> Result<MarketState, RelayError> {
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(delay) = self.market_delay {
            tokio::time::sleep(delay).await;
        }
        let market = self.market.lock().clone();
        market.unwrap_or_else(|| Err(unreachable("/get-market-state")))
    }

    async fn analysis(&self, symbol: &str) -> Result<AnalysisRecord, RelayError> {
        self.analysis_calls.fetch_add(1, Ordering::SeqCst);
        let record = self.per_symbol.lock().get(symbol).cloned();
        record.ok_or_else(|| RelayError::Status {
            endpoint: format!("/analysis/{symbol}"),
            status: 404,
        })
    }

    async fn latest_analyses(&self) -> Result<AnalysisMap, RelayError> {
        let latest = self.latest.lock().clone();
        latest.unwrap_or_else(|| Err(unreachable("/latest-analysis")))
    }

    fn describe(&self) -> String {
        "http://relay.test".to_string()
    }
}

fn market(payload: serde_json::Value) -> Result<MarketState, RelayError> {
    MarketState::from_value("/get-market-state", payload)
}

fn coordinator(
    fake: &Arc<FakeRelay>,
    config: DashboardConfig,
) -> (Arc<FetchCoordinator>, Dashboard, watch::Sender<bool>) {
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let dashboard = Dashboard::new(&config);
    let coordinator = Arc::new(FetchCoordinator::new(
        fake.clone(),
        config,
        dashboard.clone(),
        shutdown_rx,
    ));
    (coordinator, dashboard, shutdown_tx)
}

fn failure_entries(dashboard: &Dashboard) -> Vec<String> {
    dashboard
        .snapshot()
        .debug_log
        .into_iter()
        .filter(|entry| entry.marker == Marker::Failure)
        .map(|entry| entry.text)
        .collect()
}

#[tokio::test]
async fn test_market_only_payload() {
    let fake = Arc::new(FakeRelay::default());
    *fake.market.lock() = Some(market(json!({
        "market_data": [{ "symbol": "XAUUSD", "price": 2400.5 }]
    })));
    let (coordinator, dashboard, _shutdown) = coordinator(&fake, DashboardConfig::default());

    let outcome = coordinator.run_cycle().await;
    assert_eq!(
        outcome,
        CycleOutcome::Published {
            symbols: 1,
            failures: 0
        }
    );

    let snapshot = dashboard.snapshot();
    assert!(!snapshot.loading);
    assert!(snapshot.last_update.is_some());
    assert_eq!(snapshot.view.len(), Instrument::ALL.len());

    let gold = &snapshot.view[Instrument::Xauusd];
    assert_eq!(gold.price, 2400.5);
    assert_eq!(gold.bias, Bias::Neutral);
    assert_eq!(gold.confluence, 0.0);
    assert_eq!(
        snapshot.view[Instrument::Btcusd],
        ViewRecord::empty(Instrument::Btcusd)
    );
    assert!(failure_entries(&dashboard).is_empty());
}

#[tokio::test]
async fn test_both_sources_fail() {
    let fake = Arc::new(FakeRelay::default());
    let config = DashboardConfig::default().with_acquisition(Acquisition::Batched);
    let (coordinator, dashboard, _shutdown) = coordinator(&fake, config);

    let outcome = coordinator.run_cycle().await;
    assert_eq!(
        outcome,
        CycleOutcome::Published {
            symbols: 0,
            failures: 1
        }
    );

    let snapshot = dashboard.snapshot();
    assert!(!snapshot.loading);
    assert!(snapshot.last_update.is_none());
    assert_eq!(snapshot.view.len(), Instrument::ALL.len());
    for record in snapshot.view.iter() {
        assert_eq!(*record, ViewRecord::empty(record.instrument));
    }

    let failures = failure_entries(&dashboard);
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("/get-market-state unreachable"));
    assert!(failures[0].contains("/latest-analysis unreachable"));
}

#[tokio::test]
async fn test_retain_policy_marks_last_good_data_stale() {
    let fake = Arc::new(FakeRelay::default());
    *fake.market.lock() = Some(market(json!({
        "market_data": [{
            "symbol": "XAUUSD",
            "price": 2400.5,
            "bias": "BULLISH",
            "confluence": 70
        }]
    })));
    let config = DashboardConfig::default().with_failure_policy(FailurePolicy::Retain);
    let (coordinator, dashboard, _shutdown) = coordinator(&fake, config);

    coordinator.run_cycle().await;
    let first_update = dashboard.last_update();
    assert!(first_update.is_some());

    *fake.market.lock() = Some(Err(RelayError::Status {
        endpoint: "http://relay.test/get-market-state".to_string(),
        status: 502,
    }));
    let outcome = coordinator.run_cycle().await;
    assert_eq!(
        outcome,
        CycleOutcome::Published {
            symbols: 0,
            failures: 1
        }
    );

    let view = dashboard.view();
    let gold = &view[Instrument::Xauusd];
    assert_eq!(gold.price, 2400.5);
    assert_eq!(gold.bias, Bias::Bullish);
    assert!(gold.market_stale);
    assert!(gold.analysis_stale);
    assert!(!view[Instrument::Btcusd].is_stale());
    assert_eq!(dashboard.last_update(), first_update);

    let failures = failure_entries(&dashboard);
    assert_eq!(failures.len(), 1);
    assert!(failures[0].contains("/get-market-state HTTP 502"));
    assert!(failures[0].ends_with("(showing last good data)"));
}

#[tokio::test]
async fn test_blank_policy_resets_to_defaults() {
    let fake = Arc::new(FakeRelay::default());
    *fake.market.lock() = Some(market(json!({
        "market_data": [{ "symbol": "XAUUSD", "price": 2400.5 }]
    })));
    let config = DashboardConfig::default().with_failure_policy(FailurePolicy::Blank);
    let (coordinator, dashboard, _shutdown) = coordinator(&fake, config);

    coordinator.run_cycle().await;
    assert_eq!(dashboard.view()[Instrument::Xauusd].price, 2400.5);

    *fake.market.lock() = None;
    coordinator.run_cycle().await;

    let view = dashboard.view();
    assert_eq!(view[Instrument::Xauusd], ViewRecord::empty(Instrument::Xauusd));
    assert_eq!(failure_entries(&dashboard).len(), 1);
}

#[tokio::test]
async fn test_teardown_mid_cycle_discards_results() {
    let gate = Arc::new(Notify::new());
    let fake = Arc::new(FakeRelay {
        gate: Some(gate.clone()),
        ..Default::default()
    });
    *fake.market.lock() = Some(market(json!({
        "market_data": [{ "symbol": "XAUUSD", "price": 2400.5 }]
    })));
    let (coordinator, dashboard, shutdown) = coordinator(&fake, DashboardConfig::default());

    let cycle = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.run_cycle().await }
    });

    fake.entered.notified().await;
    assert!(dashboard.is_loading());

    shutdown.send_replace(true);
    gate.notify_one();

    assert_eq!(cycle.await.unwrap(), CycleOutcome::Cancelled);
    assert_eq!(dashboard.revision(), 0);
    assert_eq!(dashboard.view()[Instrument::Xauusd], ViewRecord::empty(Instrument::Xauusd));
    assert!(dashboard.last_update().is_none());

    // No new cycles after teardown
    assert_eq!(coordinator.run_cycle().await, CycleOutcome::Cancelled);
}

#[tokio::test]
async fn test_overlapping_cycle_is_skipped() {
    let gate = Arc::new(Notify::new());
    let fake = Arc::new(FakeRelay {
        gate: Some(gate.clone()),
        ..Default::default()
    });
    *fake.market.lock() = Some(market(json!({ "market_data": [] })));
    let (coordinator, dashboard, _shutdown) = coordinator(&fake, DashboardConfig::default());

    let first = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.run_cycle().await }
    });
    fake.entered.notified().await;
    assert!(coordinator.is_in_flight());

    assert_eq!(coordinator.run_cycle().await, CycleOutcome::Skipped);

    gate.notify_one();
    assert_eq!(
        first.await.unwrap(),
        CycleOutcome::Published {
            symbols: 0,
            failures: 0
        }
    );
    assert!(!coordinator.is_in_flight());
    assert_eq!(dashboard.revision(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hung_request_is_bounded() {
    let fake = Arc::new(FakeRelay {
        market_delay: Some(Duration::from_secs(600)),
        ..Default::default()
    });
    *fake.market.lock() = Some(market(json!({ "market_data": [] })));
    let config = DashboardConfig::new(
        RelayConfig::new("http://relay.test").with_request_timeout(Duration::from_secs(5)),
    );
    let (coordinator, dashboard, _shutdown) = coordinator(&fake, config);

    let outcome = coordinator.run_cycle().await;
    assert_eq!(
        outcome,
        CycleOutcome::Published {
            symbols: 0,
            failures: 1
        }
    );
    assert!(!dashboard.is_loading());

    let failures = failure_entries(&dashboard);
    assert_eq!(failures, vec!["Error: /get-market-state timeout 5000ms".to_string()]);
}

#[tokio::test]
async fn test_per_symbol_acquisition_merges_analysis_over_quotes() {
    let fake = Arc::new(FakeRelay::default());
    *fake.market.lock() = Some(market(json!({
        "market_data": [
            { "symbol": "XAUUSD", "price": 10.0 },
            { "symbol": "BTCUSD", "price": 64000.0 }
        ]
    })));
    fake.per_symbol.lock().insert(
        "XAUUSD".to_string(),
        AnalysisRecord::from_value(json!({ "price": 20.0, "bias": "BULLISH" })).unwrap(),
    );
    let config = DashboardConfig::default().with_acquisition(Acquisition::PerSymbol);
    let (coordinator, dashboard, _shutdown) = coordinator(&fake, config);

    let outcome = coordinator.run_cycle().await;
    assert_eq!(
        outcome,
        CycleOutcome::Published {
            symbols: 2,
            failures: 0
        }
    );
    assert_eq!(fake.analysis_calls.load(Ordering::SeqCst), Instrument::ALL.len());

    let view = dashboard.view();
    assert_eq!(view[Instrument::Xauusd].price, 20.0);
    assert_eq!(view[Instrument::Xauusd].bias, Bias::Bullish);
    assert!(view[Instrument::Xauusd].has_analysis);
    assert_eq!(view[Instrument::Btcusd].price, 64000.0);
    assert!(!view[Instrument::Btcusd].has_analysis);
}

#[tokio::test]
async fn test_per_symbol_acquisition_fails_when_every_call_fails() {
    let fake = Arc::new(FakeRelay::default());
    *fake.market.lock() = Some(market(json!({ "market_data": [] })));
    let config = DashboardConfig::default().with_acquisition(Acquisition::PerSymbol);
    let (coordinator, dashboard, _shutdown) = coordinator(&fake, config);

    coordinator.run_cycle().await;

    let failures = failure_entries(&dashboard);
    assert_eq!(failures.len(), 1);
    assert!(failures[0].starts_with("Error: all 10 analysis calls failed"));
    // Market data still arrived
    assert!(dashboard.last_update().is_some());
}

#[tokio::test]
async fn test_batched_acquisition() {
    let fake = Arc::new(FakeRelay::default());
    *fake.market.lock() = Some(market(json!({
        "market_data": [{ "symbol": "EURUSD", "price": 1.08542 }]
    })));
    let mut analyses = AnalysisMap::new();
    analyses.insert(
        "EURUSD".to_string(),
        AnalysisRecord::from_value(json!({ "bias": "BEARISH", "confluence": 62 })).unwrap(),
    );
    *fake.latest.lock() = Some(Ok(analyses));
    let config = DashboardConfig::default().with_acquisition(Acquisition::Batched);
    let (coordinator, dashboard, _shutdown) = coordinator(&fake, config);

    coordinator.run_cycle().await;

    let eur = dashboard.view()[Instrument::Eurusd].clone();
    assert_eq!(eur.price, 1.08542);
    assert_eq!(eur.bias, Bias::Bearish);
    assert_eq!(eur.confluence, 62.0);
    assert_eq!(fake.analysis_calls.load(Ordering::SeqCst), 0);

    let lines = dashboard.debug_lines();
    assert!(lines.iter().any(|line| line.ends_with("Relay returned: 1 symbols")));
    assert!(lines.iter().any(|line| line.ends_with("Analysis returned: 1 symbols")));
}

#[tokio::test(start_paused = true)]
async fn test_spawned_coordinator_refreshes_until_shutdown() {
    let fake = Arc::new(FakeRelay::default());
    *fake.market.lock() = Some(market(json!({ "market_data": [] })));
    let config = DashboardConfig::default().with_refresh_interval(Duration::from_secs(30));
    let dashboard = Dashboard::new(&config);
    let mut revisions = dashboard.subscribe();

    let handle = spawn(fake.clone(), config, dashboard.clone());

    // First cycle runs immediately
    revisions.changed().await.unwrap();
    assert_eq!(*revisions.borrow_and_update(), 1);

    // Next one after the refresh interval
    revisions.changed().await.unwrap();
    assert_eq!(*revisions.borrow_and_update(), 2);

    handle.stop().await;
    let revision = dashboard.revision();

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(dashboard.revision(), revision);
}

#[tokio::test(start_paused = true)]
async fn test_zero_refresh_interval_is_clamped() {
    let fake = Arc::new(FakeRelay::default());
    *fake.market.lock() = Some(market(json!({ "market_data": [] })));
    let config = DashboardConfig {
        refresh_interval: Duration::ZERO,
        ..DashboardConfig::default()
    };
    let dashboard = Dashboard::new(&config);
    let mut revisions = dashboard.subscribe();

    let handle = spawn(fake.clone(), config, dashboard.clone());

    revisions.changed().await.unwrap();
    assert_eq!(*revisions.borrow_and_update(), 1);
    revisions.changed().await.unwrap();
    assert_eq!(*revisions.borrow_and_update(), 2);

    handle.stop().await;
}

#[tokio::test]
async fn test_permanent_failure_is_tagged() {
    let fake = Arc::new(FakeRelay::default());
    *fake.market.lock() = Some(Err(RelayError::Malformed {
        endpoint: "http://relay.test/get-market-state".to_string(),
        reason: "expected value at line 1 column 1".to_string(),
    }));
    let (coordinator, dashboard, _shutdown) = coordinator(&fake, DashboardConfig::default());

    coordinator.run_cycle().await;

    let failures = failure_entries(&dashboard);
    assert_eq!(
        failures,
        vec!["Error: /get-market-state malformed JSON [permanent]".to_string()]
    );
}

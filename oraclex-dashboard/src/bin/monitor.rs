//! Headless OracleX monitor
//!
//! Polls the relay like the dashboard does and logs what the dashboard would
//! show: one line per instrument plus the selected instrument's panel.
//! Set `MONITOR_JSON=1` to print each snapshot as JSON on stdout instead.

use std::{error::Error, sync::Arc};

use oraclex_dashboard::{
    shared::{
        presentation::{format_price, ScoreKind},
        state::STARTING_MESSAGE,
    },
    spawn, trader_read, Dashboard, DashboardConfig, DashboardSnapshot, Marker, Panel, Theme,
};
use oraclex_relay::{config::env_string, RelayClient};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging();

    let config = DashboardConfig::from_env();
    let json = env_string("MONITOR_JSON").is_some_and(|value| value != "0");
    let client = RelayClient::new(&config.relay)?;
    info!(relay = %client.base(), "Starting OracleX monitor");

    let dashboard = Dashboard::new(&config);
    let mut revisions = dashboard.subscribe();
    let theme = *dashboard.theme();
    let handle = spawn(Arc::new(client), config, dashboard.clone());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, shutting down");
                break;
            }
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = dashboard.snapshot();
                if json {
                    println!("{}", serde_json::to_string(&snapshot)?);
                } else {
                    log_snapshot(&snapshot, &theme);
                }
            }
        }
    }

    handle.stop().await;
    Ok(())
}

fn log_snapshot(snapshot: &DashboardSnapshot, theme: &Theme) {
    for record in snapshot.view.iter() {
        if record.is_waiting() {
            info!(symbol = record.symbol(), "waiting for data");
            continue;
        }

        let confluence = theme.score(ScoreKind::Confluence, record.confluence);
        info!(
            symbol = record.symbol(),
            price = %format_price(record.instrument, record.price),
            bias = record.bias.label(),
            confluence = %confluence.value,
            band = confluence.label,
            stale = record.is_stale(),
            read = trader_read(&record.regime),
            "instrument"
        );
    }

    match snapshot.panel(theme) {
        Panel::Waiting { symbol, message } => info!(%symbol, "{}", message),
        Panel::Ready { symbol, tab, rows, .. } => {
            info!(%symbol, %tab, "selected panel");
            for row in rows {
                info!("  {:<18} {}", row.label, row.value);
            }
        }
    }

    // Failures of the cycle just published
    for entry in snapshot
        .debug_log
        .iter()
        .rev()
        .take_while(|entry| entry.text != STARTING_MESSAGE)
        .filter(|entry| entry.marker == Marker::Failure)
    {
        warn!("{}", entry);
    }
}

/// Initialize logging
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

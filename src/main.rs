//! Ingress reload orchestrator.
//!
//! # Architecture Overview
//!
//! ```text
//!   snapshot file ──▶ config::watcher ──▶ reconcile loop ──▶ Reconciler
//!   SIGHUP ─────────────────────────────▶      │                 │
//!                                               │     ┌───────────┴───────────┐
//!                                               │     ▼                       ▼
//!                                               │  full reload           dynamic push
//!                                               │  (render, dry run,     (control surface,
//!                                               │   write, reload)        retry + backoff)
//!                                               ▼
//!                                    metrics / events / status endpoint
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use ingress_reconciler::config::watcher::{coalesce, load_snapshot, SnapshotWatcher};
use ingress_reconciler::config::{load_config, ControllerConfig};
use ingress_reconciler::lifecycle::{SignalEvent, Signals, Shutdown};
use ingress_reconciler::observability::{logging, metrics, LogEventSink, PrometheusMetrics};
use ingress_reconciler::proxy::{HttpConfigurator, NginxProcess};
use ingress_reconciler::{admin, Reconciler, Snapshot};

#[derive(Debug, Parser)]
#[command(name = "ingress-reconciler", version, about = "Applies desired ingress configuration to a running proxy")]
struct Cli {
    /// Path to the controller settings file (TOML). Defaults are used when omitted.
    #[arg(short, long, env = "INGRESS_RECONCILER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ControllerConfig::default(),
    };

    logging::init_logging(&config.observability)?;

    tracing::info!("ingress-reconciler v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        config_file = ?config.paths.config_file,
        ssl_dir = ?config.paths.ssl_dir,
        snapshot_file = ?config.source.snapshot_file,
        control_endpoint = %config.proxy.control_endpoint,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(
            addr,
            Duration::from_secs(config.observability.metrics_idle_timeout_secs),
        )?;
    }

    let proxy = Arc::new(NginxProcess::from_config(&config.proxy));
    let configurator = Arc::new(HttpConfigurator::from_config(&config.proxy)?);
    let reconciler = Arc::new(
        Reconciler::from_config(&config, proxy, configurator)
            .with_metrics(Arc::new(PrometheusMetrics))
            .with_events(Arc::new(LogEventSink)),
    );

    let shutdown = Shutdown::new();
    let mut signals = Signals::new()?;

    let admin_task = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let reconciler = reconciler.clone();
        let rx = shutdown.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = admin::serve(listener, reconciler, rx).await {
                tracing::error!(error = %e, "Status endpoint failed");
            }
        }))
    } else {
        None
    };

    let snapshot_file = config.source.snapshot_file.clone();
    let (watcher, mut snapshots) = SnapshotWatcher::new(&snapshot_file);
    // The watcher handle must outlive the loop.
    let _watcher = match watcher.run() {
        Ok(w) => Some(w),
        Err(e) => {
            tracing::warn!(path = ?snapshot_file, error = %e, "Snapshot watcher unavailable, relying on SIGHUP");
            None
        }
    };

    if let Some(snapshot) = read_snapshot(&snapshot_file) {
        apply(&reconciler, snapshot).await;
    }

    loop {
        tokio::select! {
            Some(first) = snapshots.recv() => {
                let snapshot = coalesce(first, &mut snapshots);
                apply(&reconciler, snapshot).await;
            }
            event = signals.recv() => match event {
                SignalEvent::Reload => {
                    if let Some(snapshot) = read_snapshot(&snapshot_file) {
                        apply(&reconciler, snapshot).await;
                    }
                }
                SignalEvent::Shutdown => break,
            },
        }
    }

    tracing::info!("Shutting down");
    shutdown.trigger();
    if let Some(task) = admin_task {
        let _ = task.await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn read_snapshot(path: &Path) -> Option<Snapshot> {
    match load_snapshot(path) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            tracing::warn!(path = ?path, error = %e, "Could not read snapshot");
            None
        }
    }
}

async fn apply(reconciler: &Reconciler, snapshot: Snapshot) {
    let outcome = reconciler.reconcile(snapshot).await;
    match &outcome.error {
        None => tracing::info!(
            generation = outcome.generation,
            outcome = ?outcome.kind,
            reloaded = outcome.reloaded,
            "Reconciliation finished"
        ),
        Some(e) => tracing::warn!(
            generation = outcome.generation,
            outcome = ?outcome.kind,
            error = %e,
            "Reconciliation finished with an error"
        ),
    }
}

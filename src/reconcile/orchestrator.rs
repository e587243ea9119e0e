//! Reload orchestrator: applies snapshots to the running proxy.
//!
//! # Responsibilities
//! - Serialize reconciliations behind one lock that owns the last-applied snapshot
//! - Reject stale generations without side effects
//! - Keep TLS material on disk in sync before touching the proxy
//! - Choose between a full reload and a dynamic-only update
//! - Report every outcome to metrics and the event sink
//!
//! # Design Decisions
//! - A failed reload leaves the last-applied snapshot untouched, so the next
//!   snapshot is compared against what the proxy actually runs
//! - A failed dynamic push does not roll back: the static layer is authoritative.
//!   The next push is diffed against what the control surface last accepted,
//!   not against the last-applied snapshot
//! - No failure here aborts the process; everything is an outcome value

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use arc_swap::ArcSwap;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::schema::{ControllerConfig, ListenConfig};
use crate::model::material::content_identity;
use crate::model::{Configuration, Snapshot};
use crate::observability::{Event, EventSink, LogEventSink, MetricsCollector, NoopMetrics};
use crate::proxy::{
    ConfigRenderer, DynamicConfigurator, DynamicPusher, NginxRenderer, ProxyProcess, RenderContext,
};
use crate::reconcile::differ::{is_dynamic_eligible, RemovedResources};
use crate::reconcile::fingerprint::Fingerprint;
use crate::reconcile::outcome::{OutcomeKind, OutcomeSummary, ReconcileError, ReconcileOutcome};
use crate::resilience::Backoff;
use crate::tls::fs::write_atomic;
use crate::tls::CertificateStore;

/// Orchestrator settings derived from the controller configuration.
#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    /// Live configuration artifact.
    pub config_file: PathBuf,
    /// Pause before the first dynamic push, while the proxy starts listening.
    pub first_sync_delay: Duration,
    pub listen: ListenConfig,
}

impl ReconcileSettings {
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            config_file: config.paths.config_file.clone(),
            first_sync_delay: Duration::from_millis(config.reconcile.first_sync_delay_ms),
            listen: config.listen.clone(),
        }
    }
}

/// Lock-free view of the orchestrator state for status reporting.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcilerStatus {
    pub generation: Option<i64>,
    pub fingerprint: Option<Fingerprint>,
    pub last_outcome: Option<OutcomeSummary>,
}

/// Identity of the TLS material a snapshot references: (name, content identity).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct MaterialKey {
    default_certificate: Option<(String, String)>,
    dh_param: Option<(String, String)>,
}

impl MaterialKey {
    fn of(snapshot: Option<&Snapshot>) -> Self {
        let Some(snapshot) = snapshot else {
            return Self::default();
        };
        Self {
            default_certificate: snapshot
                .default_certificate
                .as_ref()
                .map(|c| (c.name.clone(), c.identity())),
            dh_param: snapshot
                .dh_param
                .as_ref()
                .map(|d| (d.name.clone(), content_identity(d.content.as_bytes()))),
        }
    }
}

/// State owned by the reconcile lock.
#[derive(Debug, Default)]
struct AppliedState {
    /// Last-applied snapshot.
    snapshot: Option<Snapshot>,
    /// Configuration the control surface last accepted; empty after a failed push.
    dynamic: Configuration,
}

/// Top-level coordinator of reconciliations.
pub struct Reconciler {
    /// Holding the guard is holding the reconcile lock.
    state: Mutex<AppliedState>,
    status: ArcSwap<ReconcilerStatus>,
    settings: ReconcileSettings,
    certs: CertificateStore,
    renderer: Arc<dyn ConfigRenderer>,
    proxy: Arc<dyn ProxyProcess>,
    pusher: DynamicPusher,
    metrics: Arc<dyn MetricsCollector>,
    events: Arc<dyn EventSink>,
}

impl Reconciler {
    /// Create a reconciler with the nginx renderer, no metrics and log-only events.
    pub fn new(
        settings: ReconcileSettings,
        certs: CertificateStore,
        proxy: Arc<dyn ProxyProcess>,
        pusher: DynamicPusher,
    ) -> Self {
        Self {
            state: Mutex::new(AppliedState::default()),
            status: ArcSwap::from_pointee(ReconcilerStatus::default()),
            settings,
            certs,
            renderer: Arc::new(NginxRenderer),
            proxy,
            pusher,
            metrics: Arc::new(NoopMetrics),
            events: Arc::new(LogEventSink),
        }
    }

    /// Build a reconciler from validated controller settings.
    pub fn from_config(
        config: &ControllerConfig,
        proxy: Arc<dyn ProxyProcess>,
        configurator: Arc<dyn DynamicConfigurator>,
    ) -> Self {
        let pusher = DynamicPusher::new(configurator, Backoff::from_config(&config.reconcile));
        Self::new(
            ReconcileSettings::from_config(config),
            CertificateStore::new(&config.paths.ssl_dir),
            proxy,
            pusher,
        )
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn ConfigRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Latest published status; never waits on a running reconciliation.
    pub fn status(&self) -> Arc<ReconcilerStatus> {
        self.status.load_full()
    }

    /// Generation of the last-applied snapshot (waits for the lock).
    pub async fn applied_generation(&self) -> Option<i64> {
        self.state.lock().await.snapshot.as_ref().map(|s| s.generation)
    }

    /// Apply `snapshot` to the proxy.
    ///
    /// Only one reconciliation runs at a time; concurrent callers wait for the
    /// lock. Every exit path returns an outcome, never panics or aborts.
    pub async fn reconcile(&self, snapshot: Snapshot) -> ReconcileOutcome {
        let mut guard = self.state.lock().await;
        let AppliedState {
            snapshot: last_applied,
            dynamic: dynamic_applied,
        } = &mut *guard;

        let generation = snapshot.generation;
        let new_config = snapshot.structural();
        let fingerprint = Fingerprint::of(&new_config);

        if let Some(previous) = last_applied.as_ref() {
            if generation <= previous.generation {
                tracing::debug!(
                    applied_generation = previous.generation,
                    generation,
                    "Snapshot is not newer than the applied one, skipping"
                );
                return self.publish(
                    ReconcileOutcome::new(OutcomeKind::StaleSnapshot, generation, fingerprint),
                    Some(previous),
                );
            }
        }

        tracing::debug!(
            applied_generation = ?last_applied.as_ref().map(|s| s.generation),
            generation,
            "New reconfiguration requested"
        );
        self.metrics.set_ssl_expire_time(&snapshot.servers);
        self.metrics.set_ssl_info(&snapshot.servers);

        let old_config = last_applied
            .as_ref()
            .map(Snapshot::structural)
            .unwrap_or_default();
        let is_first_sync = old_config.is_empty();

        let material_changed = match self.sync_tls_material(&snapshot, last_applied.as_ref()) {
            Ok(changed) => changed,
            Err(e) => {
                tracing::error!(error = %e, "Failed to persist TLS material, proxy left untouched");
                self.events.send(Event::warning(e.to_string()));
                return self.publish(
                    ReconcileOutcome::failed(e, generation, fingerprint),
                    last_applied.as_ref(),
                );
            }
        };

        let source_changed = last_applied
            .as_ref()
            .is_some_and(|previous| previous.source_checksum != snapshot.source_checksum);
        if source_changed {
            tracing::info!(
                old_checksum = ?last_applied.as_ref().map(|s| s.source_checksum.as_str()),
                new_checksum = %snapshot.source_checksum,
                "Source settings changed, reload required"
            );
        }

        let dynamic_eligible = is_dynamic_eligible(&old_config, &new_config);
        let reload_required = source_changed || material_changed || !dynamic_eligible;

        let dynamic_in_sync = *dynamic_applied == old_config;
        if !reload_required && dynamic_in_sync && fingerprint == Fingerprint::of(&old_config) {
            tracing::info!(generation, fingerprint = %fingerprint, "No structural change, nothing to apply");
            *last_applied = Some(snapshot);
            return self.publish(
                ReconcileOutcome::new(OutcomeKind::NoChange, generation, fingerprint),
                last_applied.as_ref(),
            );
        }

        let mut reloaded = false;
        if reload_required {
            tracing::info!(
                source_changed,
                material_changed,
                dynamic_eligible,
                fingerprint = %fingerprint,
                "Configuration changes detected, backend reload required"
            );

            if let Err(e) = self.full_reload(&snapshot, fingerprint).await {
                self.metrics.inc_reload_error_count();
                self.metrics.config_success(fingerprint, false);
                tracing::error!(error = %e, "Unexpected failure reloading the backend");
                self.events.send(Event::warning(format!("Error reloading proxy: {}", e)));
                return self.publish(
                    ReconcileOutcome::failed(e, generation, fingerprint),
                    last_applied.as_ref(),
                );
            }

            tracing::info!(fingerprint = %fingerprint, "Backend successfully reloaded");
            self.metrics.config_success(fingerprint, true);
            self.metrics.inc_reload_count();
            self.events.send(Event::normal(
                "Proxy reload triggered due to a change in configuration",
            ));
            reloaded = true;
        }

        if is_first_sync && !self.settings.first_sync_delay.is_zero() {
            tracing::info!(delay = ?self.settings.first_sync_delay, "Initial sync, waiting for the proxy to listen");
            tokio::time::sleep(self.settings.first_sync_delay).await;
        }

        if !dynamic_in_sync {
            tracing::info!("Previous dynamic reconfiguration was not accepted, pushing full state");
        }
        let push_result = self.pusher.push(&new_config, dynamic_applied).await;
        *dynamic_applied = if push_result.is_ok() {
            new_config.clone()
        } else {
            Configuration::default()
        };

        let removed = RemovedResources::between(&old_config, &new_config);
        self.metrics.remove_metrics(&removed);
        self.metrics.set_backend_endpoints(&snapshot.backends);
        *last_applied = Some(snapshot);

        let mut outcome = match push_result {
            Ok(()) => ReconcileOutcome::new(OutcomeKind::Success, generation, fingerprint),
            Err(e) => {
                let e = ReconcileError::DynamicPush(e);
                tracing::error!(error = %e, "Unexpected failure reconfiguring the proxy dynamically");
                self.events.send(Event::warning(format!(
                    "Unexpected failure reconfiguring proxy: {}",
                    e
                )));
                ReconcileOutcome::failed(e, generation, fingerprint)
            }
        };
        outcome.reloaded = reloaded;
        outcome.removed = removed;
        self.publish(outcome, last_applied.as_ref())
    }

    /// Write default certificate and DH parameters when they differ from the
    /// last-applied snapshot. Returns whether the referenced material changed.
    fn sync_tls_material(
        &self,
        snapshot: &Snapshot,
        previous: Option<&Snapshot>,
    ) -> Result<bool, ReconcileError> {
        let old = MaterialKey::of(previous);
        let new = MaterialKey::of(Some(snapshot));

        if let Some(cert) = &snapshot.default_certificate {
            if old.default_certificate != new.default_certificate {
                self.certs
                    .store_if_changed(&cert.name, cert.pem.as_bytes())
                    .map_err(ReconcileError::CertificateWrite)?;
            }
        }

        if let Some(dh) = &snapshot.dh_param {
            if old.dh_param != new.dh_param {
                self.certs
                    .store_dh_param_if_changed(&dh.name, dh.content.as_bytes())
                    .map_err(ReconcileError::DhParamWrite)?;
            }
        }

        Ok(old != new)
    }

    /// Render, dry-run, replace the live artifact and signal a graceful reload.
    async fn full_reload(&self, snapshot: &Snapshot, fingerprint: Fingerprint) -> Result<(), ReconcileError> {
        let default_certificate = snapshot
            .default_certificate
            .as_ref()
            .map(|c| self.certs.certificate_path(&c.name));
        let dh_param = snapshot
            .dh_param
            .as_ref()
            .map(|d| self.certs.dh_param_path(&d.name));

        let ctx = RenderContext {
            fingerprint,
            default_certificate: default_certificate.as_deref(),
            dh_param: dh_param.as_deref(),
            listen: &self.settings.listen,
        };
        let content = self
            .renderer
            .render(snapshot, &ctx)
            .map_err(ReconcileError::Render)?;

        self.proxy
            .test(&content)
            .await
            .map_err(ReconcileError::Validation)?;

        let path = &self.settings.config_file;
        log_artifact_change(path, &content);
        write_atomic(path, content.as_bytes()).map_err(|source| ReconcileError::ArtifactWrite {
            path: path.clone(),
            source,
        })?;

        self.proxy
            .reload()
            .await
            .map_err(ReconcileError::ReloadSignal)
    }

    fn publish(&self, outcome: ReconcileOutcome, applied: Option<&Snapshot>) -> ReconcileOutcome {
        self.status.store(Arc::new(ReconcilerStatus {
            generation: applied.map(|s| s.generation),
            fingerprint: applied.map(|s| Fingerprint::of(&s.structural())),
            last_outcome: Some(outcome.summary()),
        }));
        outcome
    }
}

fn log_artifact_change(path: &Path, content: &str) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }
    match std::fs::read_to_string(path) {
        Ok(current) if current == content => {
            tracing::debug!(path = ?path, "Rendered configuration identical to the live one")
        }
        Ok(current) => {
            let changed = count_changed_lines(&current, content);
            tracing::debug!(path = ?path, changed_lines = changed, "Proxy configuration change");
        }
        Err(_) => tracing::debug!(path = ?path, "No live configuration yet"),
    }
}

fn count_changed_lines(old: &str, new: &str) -> usize {
    let mut old_lines = old.lines();
    let mut new_lines = new.lines();
    let mut changed = 0;
    loop {
        match (old_lines.next(), new_lines.next()) {
            (None, None) => return changed,
            (a, b) if a != b => changed += 1,
            _ => {}
        }
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("settings", &self.settings)
            .field("certs", &self.certs)
            .field("status", &self.status.load_full())
            .finish_non_exhaustive()
    }
}

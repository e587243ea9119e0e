//! Shared fakes and builders for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::mpsc;

use ingress_reconciler::config::schema::ListenConfig;
use ingress_reconciler::model::{Backend, Configuration, Endpoint, Location, Server, Snapshot, SslCert};
use ingress_reconciler::observability::{ChannelEventSink, Event, MetricsCollector};
use ingress_reconciler::proxy::{DynamicConfigurator, DynamicError, DynamicPusher, ProxyError, ProxyProcess};
use ingress_reconciler::reconcile::{Fingerprint, ReconcileSettings, Reconciler, RemovedResources};
use ingress_reconciler::resilience::Backoff;
use ingress_reconciler::tls::CertificateStore;

/// Proxy process double: counts calls and fails on demand.
#[derive(Default)]
pub struct FakeProxy {
    pub fail_test: AtomicBool,
    pub fail_reload: AtomicBool,
    pub tests: AtomicU32,
    pub reloads: AtomicU32,
    /// Artificial duration of a dry run.
    pub test_delay_ms: AtomicU32,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub last_tested: Mutex<Option<String>>,
}

#[async_trait]
impl ProxyProcess for FakeProxy {
    async fn test(&self, content: &str) -> Result<(), ProxyError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        self.tests.fetch_add(1, Ordering::SeqCst);
        *self.last_tested.lock().unwrap() = Some(content.to_string());

        let delay = self.test_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.fail_test.load(Ordering::SeqCst) {
            return Err(ProxyError::Failed {
                command: "nginx -t".into(),
                status: "exit status: 1".into(),
                output: "unknown directive".into(),
            });
        }
        Ok(())
    }

    async fn reload(&self) -> Result<(), ProxyError> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reload.load(Ordering::SeqCst) {
            return Err(ProxyError::Failed {
                command: "nginx -s reload".into(),
                status: "exit status: 1".into(),
                output: "no master process".into(),
            });
        }
        Ok(())
    }
}

/// Control surface double: refuses the first `failures` calls.
#[derive(Default)]
pub struct FakeSurface {
    pub failures: AtomicU32,
    pub calls: AtomicU32,
    pub accepted: Mutex<Vec<Configuration>>,
    /// `old` argument of every call.
    pub bases: Mutex<Vec<Configuration>>,
}

impl FakeSurface {
    /// Surface that refuses the first `failures` calls.
    pub fn failing_first(failures: u32) -> Self {
        let surface = Self::default();
        surface.failures.store(failures, Ordering::SeqCst);
        surface
    }

    pub fn always_failing() -> Self {
        let surface = Self::default();
        surface.failures.store(u32::MAX, Ordering::SeqCst);
        surface
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_base(&self) -> Option<Configuration> {
        self.bases.lock().unwrap().last().cloned()
    }

    pub fn last_accepted(&self) -> Option<Configuration> {
        self.accepted.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl DynamicConfigurator for FakeSurface {
    async fn configure(&self, new: &Configuration, old: &Configuration) -> Result<(), DynamicError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.bases.lock().unwrap().push(old.clone());
        if call < self.failures.load(Ordering::SeqCst) {
            return Err(DynamicError::Other("connection refused".into()));
        }
        self.accepted.lock().unwrap().push(new.clone());
        Ok(())
    }
}

/// Metrics double recording every call.
#[derive(Default)]
pub struct RecordingMetrics {
    pub reloads: AtomicU32,
    pub reload_errors: AtomicU32,
    pub config_results: Mutex<Vec<(Fingerprint, bool)>>,
    pub removed: Mutex<Vec<RemovedResources>>,
    /// Hosts reported by each `set_ssl_info` call.
    pub ssl_info: Mutex<Vec<Vec<String>>>,
}

impl MetricsCollector for RecordingMetrics {
    fn inc_reload_count(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }

    fn inc_reload_error_count(&self) {
        self.reload_errors.fetch_add(1, Ordering::SeqCst);
    }

    fn config_success(&self, fingerprint: Fingerprint, success: bool) {
        self.config_results.lock().unwrap().push((fingerprint, success));
    }

    fn set_ssl_expire_time(&self, _servers: &[Server]) {}

    fn set_ssl_info(&self, servers: &[Server]) {
        let hosts = servers
            .iter()
            .filter(|s| s.tls.is_some())
            .map(|s| s.hostname.clone())
            .collect();
        self.ssl_info.lock().unwrap().push(hosts);
    }

    fn set_backend_endpoints(&self, _backends: &[Backend]) {}

    fn remove_metrics(&self, removed: &RemovedResources) {
        self.removed.lock().unwrap().push(removed.clone());
    }
}

/// A reconciler wired to fakes inside a temp directory.
pub struct Harness {
    pub dir: TempDir,
    pub proxy: Arc<FakeProxy>,
    pub surface: Arc<FakeSurface>,
    pub metrics: Arc<RecordingMetrics>,
    pub events: mpsc::UnboundedReceiver<Event>,
    pub reconciler: Arc<Reconciler>,
}

/// Retry schedule used by tests: 3 attempts, 1ms apart.
pub fn fast_backoff() -> Backoff {
    Backoff::with_retries(2, Duration::from_millis(1), 1.0, 0.0)
}

impl Harness {
    pub fn new() -> Self {
        Self::with_surface(FakeSurface::default())
    }

    pub fn with_surface(surface: FakeSurface) -> Self {
        let dir = tempfile::tempdir().unwrap();
        Self::build(dir, "ssl", surface, Duration::ZERO)
    }

    /// Harness that pauses `delay` before the first dynamic push.
    pub fn with_first_sync_delay(delay: Duration) -> Self {
        let dir = tempfile::tempdir().unwrap();
        Self::build(dir, "ssl", FakeSurface::default(), delay)
    }

    /// Harness whose SSL directory cannot be created.
    pub fn with_broken_ssl_dir() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("not-a-dir"), b"file").unwrap();
        Self::build(dir, "not-a-dir/ssl", FakeSurface::default(), Duration::ZERO)
    }

    fn build(dir: TempDir, ssl: &str, surface: FakeSurface, first_sync_delay: Duration) -> Self {
        let settings = ReconcileSettings {
            config_file: dir.path().join("nginx.conf"),
            first_sync_delay,
            listen: ListenConfig::default(),
        };
        let certs = CertificateStore::new(dir.path().join(ssl));
        let proxy = Arc::new(FakeProxy::default());
        let surface = Arc::new(surface);
        let metrics = Arc::new(RecordingMetrics::default());
        let (sink, events) = ChannelEventSink::new();

        let reconciler = Reconciler::new(
            settings,
            certs,
            proxy.clone(),
            DynamicPusher::new(surface.clone(), fast_backoff()),
        )
        .with_metrics(metrics.clone())
        .with_events(Arc::new(sink));

        Self {
            dir,
            proxy,
            surface,
            metrics,
            events,
            reconciler: Arc::new(reconciler),
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.dir.path().join("nginx.conf")
    }

    pub fn ssl_dir(&self) -> PathBuf {
        self.dir.path().join("ssl")
    }

    pub fn live_config(&self) -> Option<String> {
        std::fs::read_to_string(self.config_file()).ok()
    }

    pub fn reloads(&self) -> u32 {
        self.proxy.reloads.load(Ordering::SeqCst)
    }

    pub fn dry_runs(&self) -> u32 {
        self.proxy.tests.load(Ordering::SeqCst)
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn backend(name: &str, endpoints: &[(&str, u16)]) -> Backend {
    Backend {
        name: name.to_string(),
        endpoints: endpoints
            .iter()
            .map(|(address, port)| Endpoint::new(*address, *port))
            .collect(),
        load_balance: None,
    }
}

pub fn server(hostname: &str, port: u16, tls: Option<SslCert>, backend: Option<&str>) -> Server {
    Server {
        hostname: hostname.to_string(),
        port,
        tls,
        locations: backend
            .map(|b| {
                vec![Location {
                    path: "/".into(),
                    backend: b.to_string(),
                }]
            })
            .unwrap_or_default(),
    }
}

pub fn snapshot(generation: i64, backends: Vec<Backend>, servers: Vec<Server>) -> Snapshot {
    Snapshot {
        generation,
        backends,
        servers,
        ..Snapshot::empty(generation)
    }
}

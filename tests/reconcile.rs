//! End-to-end reconciliation against fake proxy and control surface.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use ingress_reconciler::model::{Configuration, DhParam, Location, SslCert};
use ingress_reconciler::observability::EventKind;
use ingress_reconciler::reconcile::OutcomeKind;

mod common;
use common::{backend, server, snapshot, FakeSurface, Harness};

#[tokio::test]
async fn test_empty_first_snapshot_is_no_change() {
    let h = Harness::new();

    let outcome = h.reconciler.reconcile(snapshot(1, vec![], vec![])).await;

    assert_eq!(outcome.kind, OutcomeKind::NoChange);
    assert!(outcome.is_applied());
    assert_eq!(h.reconciler.applied_generation().await, Some(1));
    assert_eq!(h.dry_runs(), 0);
    assert_eq!(h.surface.calls(), 0);
    assert!(h.live_config().is_none());
}

#[tokio::test]
async fn test_new_tls_server_reloads_then_pushes() {
    let mut h = Harness::new();
    h.reconciler.reconcile(snapshot(1, vec![], vec![])).await;

    let cert = SslCert::new("cert-A", "PEM-A");
    let outcome = h
        .reconciler
        .reconcile(snapshot(2, vec![], vec![server("a.example.com", 443, Some(cert), None)]))
        .await;

    assert_eq!(outcome.kind, OutcomeKind::Success);
    assert!(outcome.reloaded);
    assert_eq!(h.reloads(), 1);
    assert_eq!(h.surface.calls(), 1);
    assert!(h.live_config().unwrap().contains("a.example.com"));
    assert_eq!(h.metrics.reloads.load(Ordering::SeqCst), 1);
    assert_eq!(
        *h.metrics.config_results.lock().unwrap(),
        vec![(outcome.fingerprint, true)]
    );

    let events = h.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::Normal);
    assert_eq!(events[0].reason, "RELOAD");
    assert_eq!(
        events[0].message,
        "Proxy reload triggered due to a change in configuration"
    );

    let status = h.reconciler.status();
    assert_eq!(status.generation, Some(2));
    assert_eq!(status.fingerprint, Some(outcome.fingerprint));
}

#[tokio::test]
async fn test_endpoint_change_is_dynamic_only() {
    let h = Harness::new();
    let servers = vec![server("a.example.com", 80, None, Some("web"))];

    h.reconciler
        .reconcile(snapshot(1, vec![backend("web", &[("10.0.0.1", 8080)])], servers.clone()))
        .await;
    let before = h.live_config().unwrap();
    assert_eq!(h.reloads(), 1);

    let outcome = h
        .reconciler
        .reconcile(snapshot(
            2,
            vec![backend("web", &[("10.0.0.1", 8080), ("10.0.0.2", 8080)])],
            servers,
        ))
        .await;

    assert_eq!(outcome.kind, OutcomeKind::Success);
    assert!(!outcome.reloaded);
    assert_eq!(h.reloads(), 1);
    assert_eq!(h.dry_runs(), 1);
    assert_eq!(h.live_config().unwrap(), before);

    let pushed = h.surface.last_accepted().unwrap();
    assert_eq!(pushed.backends[0].endpoints.len(), 2);
    assert_eq!(h.surface.calls(), 2);
}

#[tokio::test]
async fn test_identical_snapshot_is_no_change() {
    let h = Harness::new();
    let backends = vec![backend("web", &[("10.0.0.1", 8080)])];
    let servers = vec![server("a.example.com", 80, None, Some("web"))];

    h.reconciler.reconcile(snapshot(1, backends.clone(), servers.clone())).await;
    let outcome = h.reconciler.reconcile(snapshot(2, backends, servers)).await;

    assert_eq!(outcome.kind, OutcomeKind::NoChange);
    assert_eq!(h.reloads(), 1);
    assert_eq!(h.surface.calls(), 1);
    assert_eq!(h.reconciler.applied_generation().await, Some(2));
}

#[tokio::test]
async fn test_stale_snapshot_touches_nothing() {
    let h = Harness::new();
    h.reconciler
        .reconcile(snapshot(5, vec![], vec![server("a.example.com", 80, None, None)]))
        .await;
    let before = h.live_config().unwrap();

    for generation in [3, 5] {
        let outcome = h
            .reconciler
            .reconcile(snapshot(generation, vec![], vec![server("b.example.com", 8080, None, None)]))
            .await;
        assert_eq!(outcome.kind, OutcomeKind::StaleSnapshot);
        assert!(!outcome.is_applied());
    }

    assert_eq!(h.dry_runs(), 1);
    assert_eq!(h.surface.calls(), 1);
    assert_eq!(h.live_config().unwrap(), before);
    assert_eq!(h.reconciler.applied_generation().await, Some(5));
    assert_eq!(
        h.reconciler.status().last_outcome.as_ref().unwrap().kind,
        OutcomeKind::StaleSnapshot
    );
}

#[tokio::test]
async fn test_validation_failure_keeps_live_artifact() {
    let mut h = Harness::new();
    let first = snapshot(1, vec![], vec![server("a.example.com", 80, None, None)]);
    h.reconciler.reconcile(first.clone()).await;
    h.drain_events();
    let before = h.live_config().unwrap();

    h.proxy.fail_test.store(true, Ordering::SeqCst);
    let mut second = first.clone();
    second.generation = 2;
    second.servers.push(server("b.example.com", 8080, None, None));
    let outcome = h.reconciler.reconcile(second.clone()).await;

    assert_eq!(outcome.kind, OutcomeKind::ValidationFailed);
    assert!(outcome.error.is_some());
    assert_eq!(h.live_config().unwrap(), before);
    assert_eq!(h.reloads(), 1);
    assert_eq!(h.surface.calls(), 1);
    assert_eq!(h.reconciler.applied_generation().await, Some(1));
    assert_eq!(h.metrics.reload_errors.load(Ordering::SeqCst), 1);

    let events = h.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::Warning);
    assert!(events[0].message.starts_with("Error reloading proxy: "));

    // The next snapshot is still compared against generation 1.
    h.proxy.fail_test.store(false, Ordering::SeqCst);
    second.generation = 3;
    let outcome = h.reconciler.reconcile(second).await;
    assert_eq!(outcome.kind, OutcomeKind::Success);
    assert!(outcome.reloaded);
    assert!(h.live_config().unwrap().contains("b.example.com"));
}

#[tokio::test]
async fn test_reload_signal_failure_is_reported() {
    let h = Harness::new();
    h.proxy.fail_reload.store(true, Ordering::SeqCst);

    let outcome = h
        .reconciler
        .reconcile(snapshot(1, vec![], vec![server("a.example.com", 80, None, None)]))
        .await;

    assert_eq!(outcome.kind, OutcomeKind::ReloadSignalFailed);
    assert!(!outcome.is_applied());
    assert_eq!(h.reconciler.applied_generation().await, None);
    assert_eq!(h.surface.calls(), 0);
}

#[tokio::test]
async fn test_dynamic_push_failure_still_applies() {
    let mut h = Harness::with_surface(FakeSurface::always_failing());

    let outcome = h
        .reconciler
        .reconcile(snapshot(1, vec![backend("web", &[("10.0.0.1", 8080)])], vec![]))
        .await;

    assert_eq!(outcome.kind, OutcomeKind::DynamicPushFailed);
    assert!(outcome.is_applied());
    assert_eq!(h.surface.calls(), 3);
    assert_eq!(h.reconciler.applied_generation().await, Some(1));

    let events = h.drain_events();
    let last = events.last().unwrap();
    assert_eq!(last.kind, EventKind::Warning);
    assert!(last.message.starts_with("Unexpected failure reconfiguring proxy: "));
}

#[tokio::test]
async fn test_certificate_rotation_forces_reload() {
    let h = Harness::new();
    h.reconciler
        .reconcile(snapshot(
            1,
            vec![],
            vec![server("a.example.com", 443, Some(SslCert::new("cert-A", "PEM-1")), None)],
        ))
        .await;

    let outcome = h
        .reconciler
        .reconcile(snapshot(
            2,
            vec![],
            vec![server("a.example.com", 443, Some(SslCert::new("cert-A", "PEM-2")), None)],
        ))
        .await;

    assert_eq!(outcome.kind, OutcomeKind::Success);
    assert!(outcome.reloaded);
    assert_eq!(h.reloads(), 2);
    assert_eq!(outcome.removed.hosts, Vec::<String>::new());
    assert_eq!(outcome.removed.certificates.len(), 1);
}

#[tokio::test]
async fn test_removed_resources_reach_metrics() {
    let h = Harness::new();
    h.reconciler
        .reconcile(snapshot(
            1,
            vec![backend("web", &[("10.0.0.1", 80)]), backend("api", &[("10.0.0.2", 80)])],
            vec![
                server("a.example.com", 80, None, Some("web")),
                server("b.example.com", 80, None, Some("api")),
            ],
        ))
        .await;

    let outcome = h
        .reconciler
        .reconcile(snapshot(
            2,
            vec![backend("web", &[("10.0.0.1", 80)])],
            vec![server("a.example.com", 80, None, Some("web"))],
        ))
        .await;

    assert!(outcome.is_applied());
    assert_eq!(outcome.removed.backends, vec!["api".to_string()]);
    assert_eq!(outcome.removed.hosts, vec!["b.example.com".to_string()]);
    let removed = h.metrics.removed.lock().unwrap();
    assert_eq!(removed.last().unwrap(), &outcome.removed);
}

#[tokio::test]
async fn test_source_checksum_change_forces_reload() {
    let h = Harness::new();
    let mut first = snapshot(1, vec![backend("web", &[("10.0.0.1", 80)])], vec![]);
    first.source_checksum = "a".into();
    h.reconciler.reconcile(first.clone()).await;
    assert_eq!(h.reloads(), 0);

    let mut second = first;
    second.generation = 2;
    second.source_checksum = "b".into();
    let outcome = h.reconciler.reconcile(second).await;

    assert_eq!(outcome.kind, OutcomeKind::Success);
    assert!(outcome.reloaded);
    assert_eq!(h.reloads(), 1);
}

#[tokio::test]
async fn test_default_certificate_written_once() {
    let h = Harness::new();
    let mut first = snapshot(1, vec![], vec![]);
    first.default_certificate = Some(SslCert::new("", "FAKE-PEM"));
    first.dh_param = Some(DhParam {
        name: "dhparam".into(),
        content: "DH".into(),
    });

    let outcome = h.reconciler.reconcile(first.clone()).await;
    assert_eq!(outcome.kind, OutcomeKind::Success);
    assert!(outcome.reloaded);

    let cert_path = h.ssl_dir().join("default-fake-certificate.pem");
    assert_eq!(std::fs::read_to_string(&cert_path).unwrap(), "FAKE-PEM");
    assert_eq!(std::fs::read_to_string(h.ssl_dir().join("dhparam.pem")).unwrap(), "DH");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&cert_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
    assert!(h.live_config().unwrap().contains("default-fake-certificate.pem"));

    let mut second = first;
    second.generation = 2;
    let outcome = h.reconciler.reconcile(second).await;
    assert_eq!(outcome.kind, OutcomeKind::NoChange);
    assert_eq!(h.reloads(), 1);
}

#[tokio::test]
async fn test_certificate_write_failure_leaves_proxy_alone() {
    let mut h = Harness::with_broken_ssl_dir();
    let mut first = snapshot(1, vec![], vec![server("a.example.com", 80, None, None)]);
    first.default_certificate = Some(SslCert::new("default", "PEM"));

    let outcome = h.reconciler.reconcile(first).await;

    assert_eq!(outcome.kind, OutcomeKind::CertificateWriteFailed);
    assert_eq!(h.dry_runs(), 0);
    assert_eq!(h.reloads(), 0);
    assert!(h.live_config().is_none());
    assert_eq!(h.reconciler.applied_generation().await, None);
    assert_eq!(h.drain_events()[0].kind, EventKind::Warning);
}

#[tokio::test]
async fn test_concurrent_reconciles_are_serialized() {
    let h = Harness::new();
    h.proxy.test_delay_ms.store(20, Ordering::SeqCst);

    let mut tasks = Vec::new();
    for generation in 1..=4 {
        let reconciler = Arc::clone(&h.reconciler);
        let port = 8000 + generation as u16;
        tasks.push(tokio::spawn(async move {
            reconciler
                .reconcile(snapshot(generation, vec![], vec![server("a.example.com", port, None, None)]))
                .await
        }));
    }
    for task in tasks {
        let outcome = task.await.unwrap();
        assert!(matches!(
            outcome.kind,
            OutcomeKind::Success | OutcomeKind::StaleSnapshot
        ));
    }

    assert_eq!(h.proxy.max_active.load(Ordering::SeqCst), 1);
    let applied = h.reconciler.applied_generation().await.unwrap();
    assert!((1..=4).contains(&applied));
    let live = h.live_config().unwrap();
    assert!(live.contains(&format!("listen {}", 8000 + applied)));
}

#[tokio::test]
async fn test_failed_push_is_resent_in_full() {
    let h = Harness::with_surface(FakeSurface::failing_first(3));
    let backends = vec![backend("web", &[("10.0.0.1", 8080)])];
    let first = snapshot(1, backends.clone(), vec![server("a.example.com", 80, None, Some("web"))]);

    let outcome = h.reconciler.reconcile(first.clone()).await;
    assert_eq!(outcome.kind, OutcomeKind::DynamicPushFailed);
    assert_eq!(h.surface.calls(), 3);

    // Only the route table changes; the endpoints were never accepted.
    let mut second = first;
    second.generation = 2;
    second.servers[0].locations.push(Location {
        path: "/api".into(),
        backend: "web".into(),
    });
    let outcome = h.reconciler.reconcile(second.clone()).await;

    assert_eq!(outcome.kind, OutcomeKind::Success);
    assert!(!outcome.reloaded);
    assert_eq!(h.surface.calls(), 4);
    let base = h.surface.last_base().unwrap();
    assert_eq!(base, Configuration::default());
    assert_ne!(base.backends, backends);
    assert_eq!(h.surface.last_accepted().unwrap().backends, backends);

    // Accepted now, so an identical snapshot needs nothing.
    second.generation = 3;
    let outcome = h.reconciler.reconcile(second).await;
    assert_eq!(outcome.kind, OutcomeKind::NoChange);
    assert_eq!(h.surface.calls(), 4);
}

#[tokio::test]
async fn test_identical_snapshot_after_failed_push_is_pushed() {
    let h = Harness::with_surface(FakeSurface::failing_first(3));
    let first = snapshot(1, vec![backend("web", &[("10.0.0.1", 8080)])], vec![]);

    assert_eq!(
        h.reconciler.reconcile(first.clone()).await.kind,
        OutcomeKind::DynamicPushFailed
    );

    let mut second = first;
    second.generation = 2;
    let outcome = h.reconciler.reconcile(second).await;

    assert_eq!(outcome.kind, OutcomeKind::Success);
    assert_eq!(h.surface.calls(), 4);
    assert_eq!(h.surface.last_base().unwrap(), Configuration::default());
}

#[tokio::test(start_paused = true)]
async fn test_settle_delay_precedes_first_real_push_only() {
    let delay = Duration::from_secs(1);
    let h = Harness::with_first_sync_delay(delay);

    let start = Instant::now();
    let outcome = h.reconciler.reconcile(snapshot(1, vec![], vec![])).await;
    assert_eq!(outcome.kind, OutcomeKind::NoChange);
    assert!(start.elapsed() < delay);

    let servers = vec![server("a.example.com", 80, None, Some("web"))];
    let start = Instant::now();
    let outcome = h
        .reconciler
        .reconcile(snapshot(2, vec![backend("web", &[("10.0.0.1", 80)])], servers.clone()))
        .await;
    assert_eq!(outcome.kind, OutcomeKind::Success);
    assert!(start.elapsed() >= delay);
    assert_eq!(h.surface.calls(), 1);

    let start = Instant::now();
    let outcome = h
        .reconciler
        .reconcile(snapshot(3, vec![backend("web", &[("10.0.0.2", 80)])], servers))
        .await;
    assert_eq!(outcome.kind, OutcomeKind::Success);
    assert!(start.elapsed() < delay);
    assert_eq!(h.surface.calls(), 2);
}

#[tokio::test]
async fn test_dh_param_write_failure_leaves_proxy_alone() {
    let mut h = Harness::with_broken_ssl_dir();
    let mut first = snapshot(1, vec![], vec![server("a.example.com", 80, None, None)]);
    first.dh_param = Some(DhParam {
        name: "dhparam".into(),
        content: "DH".into(),
    });

    let outcome = h.reconciler.reconcile(first).await;

    assert_eq!(outcome.kind, OutcomeKind::DhParamWriteFailed);
    assert!(!outcome.is_applied());
    assert_eq!(h.dry_runs(), 0);
    assert_eq!(h.reloads(), 0);
    assert_eq!(h.surface.calls(), 0);
    assert!(h.live_config().is_none());
    assert_eq!(h.reconciler.applied_generation().await, None);
    assert_eq!(h.drain_events()[0].kind, EventKind::Warning);
}

#[tokio::test]
async fn test_certificate_info_published_for_tls_hosts() {
    let h = Harness::new();
    let servers = vec![
        server("a.example.com", 443, Some(SslCert::new("cert-A", "PEM-A")), None),
        server("b.example.com", 80, None, None),
    ];

    h.reconciler.reconcile(snapshot(2, vec![], servers.clone())).await;
    h.reconciler.reconcile(snapshot(1, vec![], servers)).await;

    let reported = h.metrics.ssl_info.lock().unwrap();
    assert_eq!(*reported, vec![vec!["a.example.com".to_string()]]);
}

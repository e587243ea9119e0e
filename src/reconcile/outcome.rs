//! Reconciliation outcomes and errors.

use std::path::PathBuf;
use serde::Serialize;

use crate::proxy::{DynamicError, ProxyError, RenderError};
use crate::reconcile::differ::RemovedResources;
use crate::reconcile::fingerprint::Fingerprint;
use crate::tls::StoreError;

/// Classification of one reconciliation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutcomeKind {
    /// Applied; a reload happened if required and the dynamic push was accepted.
    Success,
    /// Nothing structural changed; no file written, no signal, no push.
    NoChange,
    /// Generation not newer than the last-applied one; ignored.
    StaleSnapshot,
    CertificateWriteFailed,
    DhParamWriteFailed,
    RenderFailed,
    /// The candidate artifact was rejected by the dry run; nothing touched.
    ValidationFailed,
    ArtifactWriteFailed,
    ReloadSignalFailed,
    /// Static layer applied, dynamic push exhausted its retries.
    DynamicPushFailed,
}

impl OutcomeKind {
    /// True when the snapshot became the last-applied one.
    pub fn is_applied(&self) -> bool {
        matches!(
            self,
            OutcomeKind::Success | OutcomeKind::NoChange | OutcomeKind::DynamicPushFailed
        )
    }
}

/// Failure detail carried by an outcome.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("failed to write default certificate: {0}")]
    CertificateWrite(#[source] StoreError),

    #[error("failed to write DH parameters: {0}")]
    DhParamWrite(#[source] StoreError),

    #[error("failed to render configuration: {0}")]
    Render(#[source] RenderError),

    #[error("configuration rejected by dry run: {0}")]
    Validation(#[source] ProxyError),

    #[error("failed to write {}: {source}", path.display())]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("reload command failed: {0}")]
    ReloadSignal(#[source] ProxyError),

    #[error("dynamic reconfiguration failed: {0}")]
    DynamicPush(#[source] DynamicError),
}

impl ReconcileError {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            ReconcileError::CertificateWrite(_) => OutcomeKind::CertificateWriteFailed,
            ReconcileError::DhParamWrite(_) => OutcomeKind::DhParamWriteFailed,
            ReconcileError::Render(_) => OutcomeKind::RenderFailed,
            ReconcileError::Validation(_) => OutcomeKind::ValidationFailed,
            ReconcileError::ArtifactWrite { .. } => OutcomeKind::ArtifactWriteFailed,
            ReconcileError::ReloadSignal(_) => OutcomeKind::ReloadSignalFailed,
            ReconcileError::DynamicPush(_) => OutcomeKind::DynamicPushFailed,
        }
    }
}

/// Result of one `reconcile` call.
#[derive(Debug)]
pub struct ReconcileOutcome {
    pub kind: OutcomeKind,
    pub generation: i64,
    pub fingerprint: Fingerprint,
    /// True when the artifact was replaced and the proxy reloaded.
    pub reloaded: bool,
    /// Resources dropped relative to the previous snapshot (applied outcomes only).
    pub removed: RemovedResources,
    pub error: Option<ReconcileError>,
}

impl ReconcileOutcome {
    pub(crate) fn new(kind: OutcomeKind, generation: i64, fingerprint: Fingerprint) -> Self {
        Self {
            kind,
            generation,
            fingerprint,
            reloaded: false,
            removed: RemovedResources::default(),
            error: None,
        }
    }

    pub(crate) fn failed(error: ReconcileError, generation: i64, fingerprint: Fingerprint) -> Self {
        let mut outcome = Self::new(error.kind(), generation, fingerprint);
        outcome.error = Some(error);
        outcome
    }

    pub fn is_applied(&self) -> bool {
        self.kind.is_applied()
    }

    pub fn summary(&self) -> OutcomeSummary {
        OutcomeSummary {
            kind: self.kind,
            generation: self.generation,
            fingerprint: self.fingerprint,
            reloaded: self.reloaded,
            error: self.error.as_ref().map(ToString::to_string),
        }
    }
}

/// Serializable view of an outcome for the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeSummary {
    pub kind: OutcomeKind,
    pub generation: i64,
    pub fingerprint: Fingerprint,
    pub reloaded: bool,
    pub error: Option<String>,
}

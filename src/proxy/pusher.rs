//! Dynamic configuration pusher with bounded retries.

use std::sync::Arc;

use crate::model::Configuration;
use crate::proxy::dynamic::{DynamicConfigurator, DynamicError};
use crate::resilience::Backoff;

/// Pushes routing updates to the control surface, retrying with backoff.
#[derive(Clone)]
pub struct DynamicPusher {
    configurator: Arc<dyn DynamicConfigurator>,
    backoff: Backoff,
}

impl DynamicPusher {
    pub fn new(configurator: Arc<dyn DynamicConfigurator>, backoff: Backoff) -> Self {
        Self {
            configurator,
            backoff,
        }
    }

    /// Push `new` (relative to `old`) until accepted or attempts run out.
    ///
    /// Blocks the caller for the whole retry schedule. Returns the last error
    /// when every attempt fails.
    pub async fn push(&self, new: &Configuration, old: &Configuration) -> Result<(), DynamicError> {
        let steps = self.backoff.steps.max(1);
        let mut attempt = 0;
        loop {
            match self.configurator.configure(new, old).await {
                Ok(()) => {
                    tracing::debug!(attempt = attempt + 1, "Dynamic reconfiguration succeeded");
                    return Ok(());
                }
                Err(e) => {
                    attempt += 1;
                    let remaining = steps - attempt;
                    if remaining == 0 {
                        tracing::warn!(attempts = attempt, error = %e, "Dynamic reconfiguration failed");
                        return Err(e);
                    }
                    let delay = self.backoff.delay(attempt - 1);
                    tracing::warn!(
                        retries_left = remaining,
                        delay = ?delay,
                        error = %e,
                        "Dynamic reconfiguration failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

//! Bounded wait for read-after-write visibility.

use crate::metrics::EXISTENCE_WAIT_GIVE_UPS;
use encore_storage::ObjectStore;
use std::sync::Arc;
use std::time::Duration;

/// Result of waiting for an object to become readable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    Visible { attempts: u32 },
    GaveUp { attempts: u32 },
}

impl Visibility {
    pub fn is_visible(&self) -> bool {
        matches!(self, Visibility::Visible { .. })
    }
}

/// Polls object metadata with linearly increasing sleeps between attempts.
#[derive(Clone)]
pub struct ExistenceWaiter {
    store: Arc<dyn ObjectStore>,
    attempts: u32,
    step: Duration,
}

impl ExistenceWaiter {
    pub fn new(store: Arc<dyn ObjectStore>, attempts: u32, step: Duration) -> Self {
        Self {
            store,
            attempts: attempts.max(1),
            step,
        }
    }

    /// Attempt `n` sleeps `n * step` before attempt `n + 1`. Giving up is
    /// logged and reported, not an error.
    pub async fn wait_until_exists(&self, key: &str) -> Visibility {
        for attempt in 1..=self.attempts {
            match self.store.head(key).await {
                Ok(_) => return Visibility::Visible { attempts: attempt },
                Err(e) if e.is_not_found() => {
                    tracing::debug!(key, attempt, "object not visible yet");
                }
                Err(e) => {
                    tracing::debug!(key, attempt, error = %e, "existence check failed");
                }
            }
            if attempt < self.attempts {
                tokio::time::sleep(self.step * attempt).await;
            }
        }

        EXISTENCE_WAIT_GIVE_UPS.inc();
        tracing::error!(
            key,
            attempts = self.attempts,
            "object still not visible after waiting"
        );
        Visibility::GaveUp {
            attempts: self.attempts,
        }
    }
}

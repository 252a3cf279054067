//! Bounded, idempotent login attempts.
//!
//! The initiator owns the retry counter and the settle delay: after the
//! surface loads, the external origin needs a moment to finish setting
//! cookies before a re-check is worth anything.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use super::surface::{LoadOutcome, LoginSurface};

/// Result of a single [`LoginInitiator::begin`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginOutcome {
    /// The surface loaded and the settle delay elapsed; cookies should be
    /// re-checked now.
    Settled,
    /// A login attempt was already in flight; this call was a no-op.
    AlreadyInProgress,
    /// The retry ceiling was reached before attempting.
    RetriesExhausted {
        /// The configured ceiling.
        max_retries: u32,
    },
    /// The surface failed to load.
    LoadFailed {
        /// Human-readable description of the load failure.
        reason: String,
    },
}

/// Drives the login surface with a retry ceiling and a settle delay.
pub struct LoginInitiator {
    surface: Arc<dyn LoginSurface>,
    max_retries: u32,
    settle: Duration,
    retry_count: AtomicU32,
    in_flight: AtomicBool,
}

impl LoginInitiator {
    /// Creates an initiator over `surface` with the given ceiling and
    /// post-load settle delay.
    #[must_use]
    pub fn new(surface: Arc<dyn LoginSurface>, max_retries: u32, settle: Duration) -> Self {
        Self {
            surface,
            max_retries,
            settle,
            retry_count: AtomicU32::new(0),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Number of login attempts made since the last reset.
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count.load(Ordering::SeqCst)
    }

    /// Whether another attempt is still allowed.
    #[must_use]
    pub fn can_attempt(&self) -> bool {
        self.retry_count() < self.max_retries
    }

    /// Resets the retry counter (on entering an authenticated state, or on
    /// a manual retry).
    pub fn reset(&self) {
        self.retry_count.store(0, Ordering::SeqCst);
    }

    /// Performs one bounded login attempt.
    ///
    /// Re-entrant calls while an attempt is in flight return
    /// [`BeginOutcome::AlreadyInProgress`] without side effects. At the
    /// retry ceiling no attempt is made. Otherwise the counter is
    /// incremented, the surface is driven, and on load the settle delay
    /// elapses before returning [`BeginOutcome::Settled`].
    pub async fn begin(&self) -> BeginOutcome {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("login attempt already in flight; ignoring");
            return BeginOutcome::AlreadyInProgress;
        }
        let outcome = self.begin_inner().await;
        self.in_flight.store(false, Ordering::SeqCst);
        outcome
    }

    async fn begin_inner(&self) -> BeginOutcome {
        let attempts = self.retry_count.load(Ordering::SeqCst);
        if attempts >= self.max_retries {
            warn!(
                attempts,
                max_retries = self.max_retries,
                "retry ceiling reached; not attempting login"
            );
            return BeginOutcome::RetriesExhausted {
                max_retries: self.max_retries,
            };
        }

        let attempt = self.retry_count.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(attempt, max_retries = self.max_retries, "starting login attempt");

        match self.surface.begin_login().await {
            LoadOutcome::Loaded => {
                // Let the external origin finish setting cookies
                tokio::time::sleep(self.settle).await;
                BeginOutcome::Settled
            }
            LoadOutcome::Failed { reason } => {
                warn!(attempt, reason = %reason, "login surface load failed");
                BeginOutcome::LoadFailed { reason }
            }
        }
    }
}

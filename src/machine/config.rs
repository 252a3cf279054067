//! Detector timing and retry configuration.

use std::time::Duration;

use crate::cache::SESSION_TTL;

/// Default maximum login attempts before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default interval for the repeating re-check timer.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// Default faster polling interval used while a login attempt is in flight.
pub const DEFAULT_AGGRESSIVE_POLL_INTERVAL: Duration = Duration::from_millis(750);

/// Default wait before triggering a login attempt from the not-logged-in
/// state.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(3000);

/// Default wait after the login surface loads, before re-checking cookies.
pub const DEFAULT_LOGIN_SETTLE: Duration = Duration::from_millis(2000);

/// Default hard ceiling on the overall login wait (5 minutes).
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_millis(300_000);

/// Timing and retry parameters for a [`super::SessionDetector`].
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Maximum login attempts before the `Error` status (minimum 1).
    pub max_retries: u32,
    /// Re-check interval while waiting or monitoring.
    pub poll_interval: Duration,
    /// Faster polling interval while login is in flight.
    pub aggressive_poll_interval: Duration,
    /// Wait before each login attempt.
    pub settle_delay: Duration,
    /// Wait after the login surface loads, before re-checking cookies.
    pub login_settle: Duration,
    /// Hard ceiling on the overall login wait.
    pub login_timeout: Duration,
    /// Maximum age of a stored session record.
    pub ttl: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            poll_interval: DEFAULT_POLL_INTERVAL,
            aggressive_poll_interval: DEFAULT_AGGRESSIVE_POLL_INTERVAL,
            settle_delay: DEFAULT_SETTLE_DELAY,
            login_settle: DEFAULT_LOGIN_SETTLE,
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
            ttl: SESSION_TTL,
        }
    }
}

impl DetectorConfig {
    /// Creates a config with a custom retry ceiling and defaults elsewhere.
    #[must_use]
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries: max_retries.max(1),
            ..Self::default()
        }
    }
}

//! The authentication status lifecycle.
//!
//! [`SessionDetector`] owns every status transition; everything else only
//! observes through its watch channel or the returned outcome.

mod config;
mod detector;
mod status;

pub use config::{
    DEFAULT_AGGRESSIVE_POLL_INTERVAL, DEFAULT_LOGIN_SETTLE, DEFAULT_LOGIN_TIMEOUT,
    DEFAULT_MAX_RETRIES, DEFAULT_POLL_INTERVAL, DEFAULT_SETTLE_DELAY, DetectorConfig,
};
pub use detector::{DetectOutcome, Provenance, SessionDetector, SessionSnapshot};
pub use status::{AuthErrorKind, AuthStatus};

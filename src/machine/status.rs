//! Authentication status and the error taxonomy behind the `Error` state.

use serde::Serialize;

/// Why a check cycle or login flow ended in the `Error` status, or why a
/// fallback step was taken along the way.
///
/// Only `LoadFailure`, `LoginTimeout`, and `RetriesExhausted` surface to
/// consumers as the `Error` status; the remaining kinds are absorbed into
/// the fallback chain and logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum AuthErrorKind {
    /// Cookies present but incomplete; recovered locally by cache fallback.
    #[error("cookies present but session evidence incomplete")]
    MissingEvidence,

    /// Stored record past its TTL; recovered locally by eviction.
    #[error("stored session past its time-to-live")]
    StaleCache,

    /// The login surface failed to load.
    #[error("login surface failed to load: {reason}")]
    LoadFailure {
        /// Description of the load failure.
        reason: String,
    },

    /// The overall login wait exceeded the hard timeout.
    #[error("login wait exceeded {timeout_ms}ms")]
    LoginTimeout {
        /// The configured timeout in milliseconds.
        timeout_ms: u64,
    },

    /// Login attempts reached the retry ceiling without cookies appearing.
    #[error("login retry limit of {max_retries} reached")]
    RetriesExhausted {
        /// The configured ceiling.
        max_retries: u32,
    },

    /// Cache persistence failed; non-fatal, detection continues uncached.
    #[error("session cache write failed: {reason}")]
    StorageWriteFailure {
        /// Description of the storage failure.
        reason: String,
    },

    /// Any other failure during a check cycle.
    #[error("unexpected failure during check cycle: {reason}")]
    Unexpected {
        /// Description of the failure.
        reason: String,
    },
}

/// Authentication status as observed by consumers.
///
/// The lifecycle is owned exclusively by
/// [`SessionDetector`](super::SessionDetector); observers never transition
/// it themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AuthStatus {
    /// Initial state: evidence is being gathered.
    Checking,
    /// Fresh cookies carry a complete session.
    LoggedIn,
    /// No live evidence, but a fresh stored record is in use.
    UsingStored,
    /// Neither live nor stored evidence exists.
    NotLoggedIn,
    /// A silent login attempt is in flight.
    LoginInProgress,
    /// Detection failed; a manual retry is the only way forward.
    Error(AuthErrorKind),
}

impl AuthStatus {
    /// Whether this status carries a usable session.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::LoggedIn | Self::UsingStored)
    }

    /// Whether the machine has stopped making progress on its own.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl std::fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Checking => write!(f, "checking"),
            Self::LoggedIn => write!(f, "logged-in"),
            Self::UsingStored => write!(f, "using-stored"),
            Self::NotLoggedIn => write!(f, "not-logged-in"),
            Self::LoginInProgress => write!(f, "login-in-progress"),
            Self::Error(kind) => write!(f, "error: {kind}"),
        }
    }
}

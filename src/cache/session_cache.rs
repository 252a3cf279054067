//! TTL-bounded persistence of validated session evidence.
//!
//! The cache exclusively owns the persisted representation; every other
//! component reads through it. Write failures are non-fatal — detection
//! continues without caching — but stale or corrupt data is never silently
//! served: `load` evicts eagerly and returns nothing.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::machine::AuthErrorKind;
use crate::session::{CookieSessionRecord, StoredSessionRecord, unix_now};

use super::store::SessionStore;

/// Storage key for the serialized [`StoredSessionRecord`].
pub const COOKIE_DATA_KEY: &str = "erpCookieData";
/// Storage key for the serialized [`crate::session::UserInfo`] view.
pub const USER_INFO_KEY: &str = "erpUserInfo";
/// Storage key for the ISO-8601 timestamp of the last successful login.
pub const LOGIN_TIME_KEY: &str = "erpLoginTime";

/// Maximum age before a stored record is treated as absent (24 hours).
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Session cache over an injected [`SessionStore`].
#[derive(Clone)]
pub struct SessionCache {
    store: Arc<dyn SessionStore>,
    ttl: Duration,
}

impl SessionCache {
    /// Creates a cache with the default 24-hour TTL.
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self::with_ttl(store, SESSION_TTL)
    }

    /// Creates a cache with a custom TTL.
    #[must_use]
    pub fn with_ttl(store: Arc<dyn SessionStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Persists a validated record, refreshing its TTL.
    ///
    /// Callers only pass records that satisfy
    /// [`CookieSessionRecord::is_valid`]; an invalid record is dropped with
    /// a warning rather than persisted. Storage failures are logged and
    /// swallowed — caching is best-effort.
    pub fn save(&self, record: &CookieSessionRecord) {
        self.save_at(record, unix_now());
    }

    pub(crate) fn save_at(&self, record: &CookieSessionRecord, now: u64) {
        if !record.is_valid() {
            warn!("refusing to cache an incomplete session record");
            return;
        }

        let stored = StoredSessionRecord {
            record: record.clone(),
            stored_at: now,
        };

        match serde_json::to_string(&stored) {
            Ok(json) => {
                if let Err(error) = self.store.write(COOKIE_DATA_KEY, &json) {
                    let kind = AuthErrorKind::StorageWriteFailure {
                        reason: error.to_string(),
                    };
                    warn!(error = %kind, "continuing without cache");
                    return;
                }
            }
            Err(error) => {
                let kind = AuthErrorKind::StorageWriteFailure {
                    reason: error.to_string(),
                };
                warn!(error = %kind, "continuing without cache");
                return;
            }
        }

        // Companion keys are best-effort as well
        if let Some(info) = record.to_user_info()
            && let Ok(json) = serde_json::to_string(&info)
            && let Err(error) = self.store.write(USER_INFO_KEY, &json)
        {
            warn!(error = %error, "user info write failed");
        }

        let login_time = chrono::DateTime::from_timestamp(i64::try_from(now).unwrap_or(0), 0)
            .map(|time| time.to_rfc3339())
            .unwrap_or_default();
        if let Err(error) = self.store.write(LOGIN_TIME_KEY, &login_time) {
            warn!(error = %error, "login time write failed");
        }

        debug!(user_id = %record.user_id, "session record cached");
    }

    /// Loads the stored record, subject to the TTL policy.
    ///
    /// Returns `None` (and clears the stored state) when the record is
    /// missing, unparseable, past its TTL, or fails required-field
    /// validation.
    #[must_use]
    pub fn load(&self) -> Option<StoredSessionRecord> {
        self.load_at(unix_now())
    }

    pub(crate) fn load_at(&self, now: u64) -> Option<StoredSessionRecord> {
        let raw = self.store.read(COOKIE_DATA_KEY)?;

        let stored: StoredSessionRecord = match serde_json::from_str(&raw) {
            Ok(stored) => stored,
            Err(error) => {
                let kind = AuthErrorKind::Unexpected {
                    reason: error.to_string(),
                };
                self.evict(&kind);
                return None;
            }
        };

        if !stored.is_fresh(now, self.ttl) {
            debug!(
                age_secs = now.saturating_sub(stored.stored_at),
                "stored session record past its time-to-live"
            );
            self.evict(&AuthErrorKind::StaleCache);
            return None;
        }

        if !stored.record.is_valid() {
            self.evict(&AuthErrorKind::MissingEvidence);
            return None;
        }

        Some(stored)
    }

    fn evict(&self, reason: &AuthErrorKind) {
        warn!(reason = %reason, "evicting stored session state");
        self.clear();
    }

    /// Removes all persisted session state unconditionally.
    pub fn clear(&self) {
        self.store.remove(COOKIE_DATA_KEY);
        self.store.remove(USER_INFO_KEY);
        self.store.remove(LOGIN_TIME_KEY);
    }
}

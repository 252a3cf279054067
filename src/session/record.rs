//! Value types for authentication evidence.
//!
//! A [`CookieSessionRecord`] is one read of the cookie jar; a
//! [`StoredSessionRecord`] is the same evidence persisted with a storage
//! timestamp; a [`UserInfo`] is the decoded, read-only view handed to
//! consumers. Records are never mutated in place — every extraction
//! produces a fresh record.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::extract::decode_once;

/// Cookie name carrying the email-like user identifier.
pub const COOKIE_USER_ID: &str = "user_id";
/// Cookie name carrying the display name.
pub const COOKIE_FULL_NAME: &str = "full_name";
/// Cookie name carrying the session identifier.
pub const COOKIE_SESSION_ID: &str = "sid";
/// Cookie name carrying the "yes"/"no" system-user flag.
pub const COOKIE_SYSTEM_USER: &str = "system_user";
/// Cookie name carrying the avatar URL.
pub const COOKIE_USER_IMAGE: &str = "user_image";

/// Current wall-clock time as unix seconds.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

/// Evidence extracted from cookies on one read.
///
/// Absent cookies become empty strings; validity is re-checked on every use
/// via [`CookieSessionRecord::is_valid`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieSessionRecord {
    /// Email-like user identifier, verbatim from the `user_id` cookie.
    pub user_id: String,
    /// Display name, verbatim from the `full_name` cookie.
    pub full_name: String,
    /// "yes"/"no" style flag from the `system_user` cookie.
    pub system_user: String,
    /// Session identifier (sensitive, never log).
    session_id: String,
    /// Avatar URL from the `user_image` cookie.
    pub user_image: String,
    /// When this record was extracted, unix seconds.
    pub observed_at: u64,
}

impl CookieSessionRecord {
    /// Builds a record from its raw fields.
    #[must_use]
    pub fn new(
        user_id: String,
        full_name: String,
        system_user: String,
        session_id: String,
        user_image: String,
        observed_at: u64,
    ) -> Self {
        Self {
            user_id,
            full_name,
            system_user,
            session_id,
            user_image,
            observed_at,
        }
    }

    /// Returns the session identifier.
    ///
    /// Session ids are sensitive; avoid logging the return value.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// A record is valid iff `user_id`, `full_name`, and the session id are
    /// all non-empty.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.user_id.is_empty() && !self.full_name.is_empty() && !self.session_id.is_empty()
    }

    /// Derives the consumer-facing [`UserInfo`] view.
    ///
    /// Returns `None` for an invalid record. Percent-escapes in `full_name`
    /// and `user_id` are decoded exactly once, falling back to the raw
    /// string when decoding fails.
    #[must_use]
    pub fn to_user_info(&self) -> Option<UserInfo> {
        if !self.is_valid() {
            return None;
        }
        let user_id = decode_once(&self.user_id);
        Some(UserInfo {
            full_name: decode_once(&self.full_name),
            email: user_id.clone(),
            user_id,
            system_user: self.system_user == "yes",
            session_id: self.session_id.clone(),
            user_image: self.user_image.clone(),
        })
    }
}

// Custom Debug impl that redacts the session id.
impl fmt::Debug for CookieSessionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieSessionRecord")
            .field("user_id", &self.user_id)
            .field("full_name", &self.full_name)
            .field("system_user", &self.system_user)
            .field("session_id", &"[REDACTED]")
            .field("user_image", &self.user_image)
            .field("observed_at", &self.observed_at)
            .finish()
    }
}

/// A [`CookieSessionRecord`] plus its persistence timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSessionRecord {
    /// The persisted evidence.
    #[serde(flatten)]
    pub record: CookieSessionRecord,
    /// When the record was written, unix seconds.
    #[serde(rename = "storedAt")]
    pub stored_at: u64,
}

impl StoredSessionRecord {
    /// A stored record is fresh iff less than `ttl` has elapsed since it
    /// was written. Stale records are treated as absent.
    #[must_use]
    pub fn is_fresh(&self, now: u64, ttl: Duration) -> bool {
        now.saturating_sub(self.stored_at) < ttl.as_secs()
    }
}

/// Derived, read-only identity view created only from a valid record.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Decoded display name.
    pub full_name: String,
    /// Decoded user identifier.
    pub user_id: String,
    /// Email address (identical to `user_id`).
    pub email: String,
    /// Whether the `system_user` cookie said "yes".
    pub system_user: bool,
    /// Session identifier (sensitive, never log).
    pub session_id: String,
    /// Avatar URL.
    pub user_image: String,
}

impl fmt::Debug for UserInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserInfo")
            .field("full_name", &self.full_name)
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("system_user", &self.system_user)
            .field("session_id", &"[REDACTED]")
            .field("user_image", &self.user_image)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user_id: &str, full_name: &str, session_id: &str) -> CookieSessionRecord {
        CookieSessionRecord::new(
            user_id.to_string(),
            full_name.to_string(),
            String::new(),
            session_id.to_string(),
            String::new(),
            1_700_000_000,
        )
    }

    #[test]
    fn test_is_valid_requires_all_three_fields() {
        assert!(record("a@b.com", "A B", "xyz").is_valid());
        assert!(!record("", "A B", "xyz").is_valid());
        assert!(!record("a@b.com", "", "xyz").is_valid());
        assert!(!record("a@b.com", "A B", "").is_valid());
    }

    #[test]
    fn test_to_user_info_none_for_invalid_record() {
        assert!(record("", "", "").to_user_info().is_none());
    }

    #[test]
    fn test_to_user_info_decodes_percent_escapes_once() {
        let info = record("a%40b.com", "A%20B", "xyz").to_user_info().unwrap();
        assert_eq!(info.email, "a@b.com");
        assert_eq!(info.user_id, "a@b.com");
        assert_eq!(info.full_name, "A B");
    }

    #[test]
    fn test_to_user_info_double_encoded_decodes_exactly_once() {
        // %2540 is "%40" encoded again; one decode pass must yield "%40"
        let info = record("a%2540b.com", "A B", "xyz").to_user_info().unwrap();
        assert_eq!(info.email, "a%40b.com");
    }

    #[test]
    fn test_to_user_info_system_user_mapping() {
        let mut rec = record("a@b.com", "A B", "xyz");
        rec.system_user = "yes".to_string();
        assert!(rec.to_user_info().unwrap().system_user);

        rec.system_user = "no".to_string();
        assert!(!rec.to_user_info().unwrap().system_user);

        rec.system_user = String::new();
        assert!(!rec.to_user_info().unwrap().system_user);
    }

    #[test]
    fn test_stored_record_freshness_window() {
        let ttl = Duration::from_secs(24 * 60 * 60);
        let stored = StoredSessionRecord {
            record: record("a@b.com", "A B", "xyz"),
            stored_at: 1_700_000_000,
        };
        assert!(stored.is_fresh(1_700_000_000 + 60 * 60, ttl), "1h old");
        assert!(!stored.is_fresh(1_700_000_000 + 25 * 60 * 60, ttl), "25h old");
        // Exactly at the boundary counts as stale
        assert!(!stored.is_fresh(1_700_000_000 + 24 * 60 * 60, ttl));
    }

    #[test]
    fn test_stored_record_serializes_flat_with_stored_at() {
        let stored = StoredSessionRecord {
            record: record("a@b.com", "A B", "xyz"),
            stored_at: 42,
        };
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["user_id"], "a@b.com");
        assert_eq!(json["storedAt"], 42);
        let back: StoredSessionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, stored);
    }

    #[test]
    fn test_debug_output_redacts_session_id() {
        let rec = record("a@b.com", "A B", "topsecret");
        let debug_str = format!("{rec:?}");
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("topsecret"));

        let info_str = format!("{:?}", rec.to_user_info().unwrap());
        assert!(info_str.contains("[REDACTED]"));
        assert!(!info_str.contains("topsecret"));
    }
}

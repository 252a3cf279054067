//! Extraction of session evidence from a raw cookie map.
//!
//! The cookie map is open-ended, duck-typed state; this is the one boundary
//! where it becomes a closed [`CookieSessionRecord`].

use std::borrow::Cow;
use std::collections::HashMap;

use tracing::debug;

use super::record::{
    COOKIE_FULL_NAME, COOKIE_SESSION_ID, COOKIE_SYSTEM_USER, COOKIE_USER_ID, COOKIE_USER_IMAGE,
    CookieSessionRecord,
};

/// Extracts a fresh [`CookieSessionRecord`] from a cookie map.
///
/// The five named cookies are copied verbatim (empty if absent) and the
/// record is stamped with `observed_at`. No validation happens here;
/// callers check [`CookieSessionRecord::is_valid`] on every use.
#[must_use]
pub fn extract(cookies: &HashMap<String, String>, observed_at: u64) -> CookieSessionRecord {
    let field = |name: &str| cookies.get(name).cloned().unwrap_or_default();

    let record = CookieSessionRecord::new(
        field(COOKIE_USER_ID),
        field(COOKIE_FULL_NAME),
        field(COOKIE_SYSTEM_USER),
        field(COOKIE_SESSION_ID),
        field(COOKIE_USER_IMAGE),
        observed_at,
    );

    if !cookies.is_empty() && !record.is_valid() {
        debug!(
            cookies = cookies.len(),
            has_user_id = !record.user_id.is_empty(),
            has_full_name = !record.full_name.is_empty(),
            "cookies present but session evidence incomplete"
        );
    }

    record
}

/// Percent-decodes a value exactly once.
///
/// Values may arrive encoded twice (browser plus application); callers get
/// one decode pass, and a value that fails to decode comes back unchanged.
#[must_use]
pub fn decode_once(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| raw.to_string())
}

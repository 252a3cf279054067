//! The derived handoff artifact carried into the embedded consumer.
//!
//! Two renderings of the same contract: query parameters appended to the
//! embed URL, or cookies mirroring the same fields. The parameter names
//! below are a versioned contract with the embedded consumer — change them
//! in lockstep.

use std::time::{Duration, SystemTime};

use tracing::warn;
use url::Url;

use crate::cookie::CookieSource;
use crate::session::{COOKIE_FULL_NAME, COOKIE_SYSTEM_USER, COOKIE_USER_ID, UserInfo};

/// Query parameter carrying the user identifier.
pub const HANDOFF_USER_ID_PARAM: &str = "erp_user_id";
/// Query parameter carrying the display name.
pub const HANDOFF_FULL_NAME_PARAM: &str = "erp_full_name";
/// Query parameter carrying the session identifier.
pub const HANDOFF_SESSION_ID_PARAM: &str = "erp_session_id";
/// Query parameter signalling the consumer to skip its own login prompt.
pub const HANDOFF_AUTO_LOGIN_PARAM: &str = "auto_login";

/// Length of the truncated session identifier written by the degraded
/// cookie-synthesis fallback.
pub const SYNTHESIZED_SID_LEN: usize = 8;

/// A handoff artifact in one of its two renderings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoffArtifact {
    /// The embed URL with identity parameters appended.
    Url(Url),
    /// `Set-Cookie` header strings mirroring the same fields.
    Cookies(Vec<String>),
}

/// Builds the embed URL with the identity parameters appended.
#[must_use]
pub fn handoff_url(embed_url: &Url, info: &UserInfo) -> Url {
    let mut url = embed_url.clone();
    url.query_pairs_mut()
        .append_pair(HANDOFF_USER_ID_PARAM, &info.user_id)
        .append_pair(HANDOFF_FULL_NAME_PARAM, &info.full_name)
        .append_pair(HANDOFF_SESSION_ID_PARAM, &info.session_id)
        .append_pair(HANDOFF_AUTO_LOGIN_PARAM, "true");
    url
}

/// Builds `Set-Cookie` header strings mirroring the handoff fields, expiring
/// after `ttl`.
#[must_use]
pub fn handoff_cookies(info: &UserInfo, ttl: Duration) -> Vec<String> {
    let expires = httpdate::fmt_http_date(SystemTime::now() + ttl);
    let cookie = |name: &str, value: &str| {
        format!(
            "{name}={}; Path=/; Expires={expires}",
            urlencoding::encode(value)
        )
    };
    vec![
        cookie(HANDOFF_USER_ID_PARAM, &info.user_id),
        cookie(HANDOFF_FULL_NAME_PARAM, &info.full_name),
        cookie(HANDOFF_SESSION_ID_PARAM, &info.session_id),
        cookie(HANDOFF_AUTO_LOGIN_PARAM, "true"),
    ]
}

/// Best-effort compatibility shim: mirrors minimal identity cookies onto the
/// local source when the live session-sync path is unavailable.
///
/// The session identifier is truncated — the consumer gets enough to
/// correlate, not enough to replay. This is degraded-confidence behavior
/// and is logged as such.
pub fn synthesize_local_cookies(source: &dyn CookieSource, info: &UserInfo) {
    warn!(
        user_id = %info.user_id,
        "synthesizing local identity cookies (degraded-confidence fallback)"
    );
    let truncated_sid: String = info.session_id.chars().take(SYNTHESIZED_SID_LEN).collect();
    source.write(COOKIE_FULL_NAME, &info.full_name);
    source.write(COOKIE_USER_ID, &info.user_id);
    source.write(
        COOKIE_SYSTEM_USER,
        if info.system_user { "yes" } else { "no" },
    );
    source.write("sid", &truncated_sid);
}

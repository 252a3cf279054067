//! Session evidence types and the cookie → record extraction boundary.

mod extract;
mod record;

pub use extract::{decode_once, extract};
pub use record::{
    COOKIE_FULL_NAME, COOKIE_SESSION_ID, COOKIE_SYSTEM_USER, COOKIE_USER_ID, COOKIE_USER_IMAGE,
    CookieSessionRecord, StoredSessionRecord, UserInfo, unix_now,
};

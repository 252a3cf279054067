//! Durable session caching with a time-to-live policy.

mod session_cache;
mod store;

pub use session_cache::{
    COOKIE_DATA_KEY, LOGIN_TIME_KEY, SESSION_TTL, SessionCache, USER_INFO_KEY,
};
pub use store::{FileStore, MemoryStore, SessionStore, StoreError};

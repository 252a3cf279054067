//! ERP Session Bridge Core Library
//!
//! Detects whether a user is already authenticated against an external ERP
//! system, by reading session evidence from shared-domain cookies, and
//! bridges that authentication into an embedded consumer without prompting
//! the user again.
//!
//! # Architecture
//!
//! - [`cookie`] - Cookie sources (in-memory jar, header strings, Netscape files)
//! - [`session`] - Session record types and the extraction boundary
//! - [`cache`] - TTL-bounded durable session caching
//! - [`machine`] - The authentication status state machine
//! - [`login`] - Silent login surface and bounded initiator
//! - [`bridge`] - Composition root, handoff artifact, identity lookup

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bridge;
pub mod cache;
pub mod cookie;
pub mod login;
pub mod machine;
pub mod session;

// Re-export commonly used types
pub use bridge::{
    BridgeAction, BridgeConfig, BridgeOutcome, HandoffArtifact, HandoffMode, IdentityClient,
    IdentityRecord, SessionBridge,
};
pub use cache::{FileStore, MemoryStore, SESSION_TTL, SessionCache, SessionStore};
pub use cookie::{CookieSource, FileCookieSource, MemoryCookieSource, parse_cookie_header};
pub use login::{HttpLoginSurface, LoadOutcome, LoginSurface, ScriptedLoginSurface};
pub use machine::{
    AuthErrorKind, AuthStatus, DEFAULT_MAX_RETRIES, DetectOutcome, DetectorConfig, Provenance,
    SessionDetector, SessionSnapshot,
};
pub use session::{CookieSessionRecord, StoredSessionRecord, UserInfo};

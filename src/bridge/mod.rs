//! Composition root: turns a detected session into something the embedded
//! consumer can use.

mod handoff;
mod identity;
mod session_bridge;

pub use handoff::{
    HANDOFF_AUTO_LOGIN_PARAM, HANDOFF_FULL_NAME_PARAM, HANDOFF_SESSION_ID_PARAM,
    HANDOFF_USER_ID_PARAM, HandoffArtifact, SYNTHESIZED_SID_LEN, handoff_cookies, handoff_url,
    synthesize_local_cookies,
};
pub use identity::{IdentityClient, IdentityRecord, LookupError};
pub use session_bridge::{BridgeAction, BridgeConfig, BridgeOutcome, HandoffMode, SessionBridge};

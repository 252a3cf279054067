//! Silent login: the external login surface and the bounded initiator.

mod initiator;
mod surface;

pub use initiator::{BeginOutcome, LoginInitiator};
pub use surface::{HttpLoginSurface, LoadOutcome, LoginSurface, ScriptedLoginSurface};

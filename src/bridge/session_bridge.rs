//! The composition root tying detector, cache, handoff, and identity lookup
//! together.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use crate::cache::SessionCache;
use crate::cookie::CookieSource;
use crate::machine::{
    AuthErrorKind, AuthStatus, DetectOutcome, Provenance, SessionDetector, SessionSnapshot,
};

use super::handoff::{HandoffArtifact, handoff_cookies, handoff_url, synthesize_local_cookies};
use super::identity::{IdentityClient, IdentityRecord};

/// How the handoff artifact is rendered for the embedded consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffMode {
    /// Append identity parameters to the embed URL.
    UrlParams,
    /// Mirror identity fields as cookies on the local domain.
    LocalCookies,
}

/// Bridge policy configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// The embedded consumer's URL.
    pub embed_url: Url,
    /// The external login surface URL, used for redirects and prompts.
    pub login_url: Url,
    /// Rendering of the handoff artifact.
    pub handoff_mode: HandoffMode,
    /// Whether a miss with no stored fallback redirects the whole page.
    pub redirect_on_miss: bool,
    /// Grace period before such a redirect.
    pub redirect_grace: Duration,
}

impl BridgeConfig {
    /// Creates a config with the default policy: URL-parameter handoff and
    /// redirect after a short grace period.
    #[must_use]
    pub fn new(embed_url: Url, login_url: Url) -> Self {
        Self {
            embed_url,
            login_url,
            handoff_mode: HandoffMode::UrlParams,
            redirect_on_miss: true,
            redirect_grace: Duration::from_secs(2),
        }
    }
}

/// What the hosting surface should do in response to a status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeAction {
    /// Detection is still running; nothing to do yet.
    AwaitDetection,
    /// A session is available; complete the handoff.
    CompleteHandoff,
    /// No session and no fallback; redirect the page to the login surface
    /// after the grace period.
    RedirectToLogin {
        /// The external login URL.
        url: Url,
        /// Grace period before navigating.
        after: Duration,
    },
    /// No session; show an explicit "please log in" affordance.
    PromptLogin {
        /// The external login URL.
        url: Url,
    },
    /// Detection failed; surface the error with a retry affordance.
    SurfaceError {
        /// Why detection failed.
        kind: AuthErrorKind,
    },
}

/// Result of one full bridge pass.
#[derive(Debug, Clone)]
pub enum BridgeOutcome {
    /// A session was found and a handoff artifact built.
    Ready {
        /// The detected session.
        snapshot: SessionSnapshot,
        /// The artifact for the embedded consumer.
        artifact: HandoffArtifact,
        /// Organizational identity, when the lookup service answered.
        identity: Option<IdentityRecord>,
        /// True when the session came from the stored fallback.
        stored: bool,
    },
    /// Detection failed; `SessionBridge::retry` resets for another pass.
    Failed {
        /// Why detection failed.
        kind: AuthErrorKind,
    },
}

/// Composition root: drives detection and renders its outcome for the
/// embedded consumer.
pub struct SessionBridge {
    detector: Arc<SessionDetector>,
    cookies: Arc<dyn CookieSource>,
    cache: SessionCache,
    identity: Option<IdentityClient>,
    config: BridgeConfig,
}

impl SessionBridge {
    /// Creates a bridge over an existing detector.
    ///
    /// The cache handle must be the same one the detector reads from; the
    /// bridge is the only writer.
    #[must_use]
    pub fn new(
        detector: Arc<SessionDetector>,
        cookies: Arc<dyn CookieSource>,
        cache: SessionCache,
        identity: Option<IdentityClient>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            detector,
            cookies,
            cache,
            identity,
            config,
        }
    }

    /// The detector driven by this bridge.
    #[must_use]
    pub fn detector(&self) -> &Arc<SessionDetector> {
        &self.detector
    }

    /// Runs one full detection pass and renders the outcome.
    ///
    /// On a live session the record is persisted (refreshing its TTL); a
    /// stored session is used as-is without re-persisting. When the
    /// identity lookup service is configured but unavailable, minimal
    /// cookies are synthesized on the local domain as a degraded
    /// compatibility shim.
    pub async fn run_once(&self) -> BridgeOutcome {
        match self.detector.detect().await {
            DetectOutcome::Authenticated(snapshot) => self.complete(snapshot).await,
            DetectOutcome::Failed(kind) => {
                warn!(kind = %kind, "session detection failed");
                BridgeOutcome::Failed { kind }
            }
        }
    }

    async fn complete(&self, snapshot: SessionSnapshot) -> BridgeOutcome {
        let stored = snapshot.provenance == Provenance::Stored;
        if !stored {
            // Fresh evidence refreshes the TTL; stored evidence never does
            self.cache.save(&snapshot.record);
        }

        let identity = match &self.identity {
            Some(client) => match client.lookup_email(&snapshot.user_info.email).await {
                Ok(record) => Some(record),
                Err(error) => {
                    warn!(error = %error, "identity lookup unavailable");
                    synthesize_local_cookies(self.cookies.as_ref(), &snapshot.user_info);
                    None
                }
            },
            None => None,
        };

        let artifact = self.build_artifact(&snapshot);
        info!(
            user_id = %snapshot.user_info.user_id,
            stored,
            "session bridged to embedded consumer"
        );
        BridgeOutcome::Ready {
            snapshot,
            artifact,
            identity,
            stored,
        }
    }

    fn build_artifact(&self, snapshot: &SessionSnapshot) -> HandoffArtifact {
        match self.config.handoff_mode {
            HandoffMode::UrlParams => {
                HandoffArtifact::Url(handoff_url(&self.config.embed_url, &snapshot.user_info))
            }
            HandoffMode::LocalCookies => {
                HandoffArtifact::Cookies(handoff_cookies(&snapshot.user_info, self.detector.config().ttl))
            }
        }
    }

    /// Maps a status to the action the hosting surface should take.
    ///
    /// Evaluated on every status change by observers of
    /// [`SessionDetector::status`].
    #[must_use]
    pub fn plan(&self, status: &AuthStatus) -> BridgeAction {
        match status {
            AuthStatus::Checking | AuthStatus::LoginInProgress => BridgeAction::AwaitDetection,
            AuthStatus::LoggedIn | AuthStatus::UsingStored => BridgeAction::CompleteHandoff,
            AuthStatus::NotLoggedIn => {
                if self.cache.load().is_some() {
                    // A fallback exists; the next cycle will pick it up
                    debug!("miss with stored fallback available; awaiting detection");
                    BridgeAction::AwaitDetection
                } else if self.config.redirect_on_miss {
                    BridgeAction::RedirectToLogin {
                        url: self.config.login_url.clone(),
                        after: self.config.redirect_grace,
                    }
                } else {
                    BridgeAction::PromptLogin {
                        url: self.config.login_url.clone(),
                    }
                }
            }
            AuthStatus::Error(kind) => BridgeAction::SurfaceError { kind: kind.clone() },
        }
    }

    /// Manual retry affordance: clears the retry counter and re-enters the
    /// checking state.
    pub fn retry(&self) {
        info!("manual retry requested");
        self.detector.reset();
    }
}

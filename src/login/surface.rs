//! The external login surface as an interchangeable async strategy.
//!
//! Hidden iframe, visible popup, or a plain HTTP probe are all the same
//! operation from the detector's point of view: point something at the
//! external login URL and learn whether it loaded. Success is never read
//! from the response itself — it is inferred solely from cookies appearing
//! afterwards.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::cookie::Jar;
use tracing::{debug, instrument, warn};
use url::Url;

/// Outcome of driving the login surface once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The surface loaded; cookies may have been set by the external origin.
    Loaded,
    /// The surface failed to load.
    Failed {
        /// Human-readable description of the load failure.
        reason: String,
    },
}

/// An opaque asynchronous "go log in" side effect.
#[async_trait]
pub trait LoginSurface: Send + Sync {
    /// Directs the surface at the external login URL and waits for it to
    /// load (or fail to load).
    async fn begin_login(&self) -> LoadOutcome;
}

/// Login surface that issues a GET against the external login URL through a
/// cookie-jar-enabled HTTP client.
///
/// Any 2xx/3xx response counts as "loaded"; no response body is consumed.
pub struct HttpLoginSurface {
    client: reqwest::Client,
    login_url: Url,
}

impl HttpLoginSurface {
    /// Creates a surface with its own cookie jar.
    ///
    /// # Errors
    ///
    /// Returns the underlying client build error when TLS initialization
    /// fails.
    pub fn new(login_url: Url) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self { client, login_url })
    }

    /// Creates a surface sharing a cookie jar with other HTTP components,
    /// so cookies set during login become visible to them.
    ///
    /// # Errors
    ///
    /// Returns the underlying client build error when TLS initialization
    /// fails.
    pub fn with_cookie_jar(login_url: Url, jar: Arc<Jar>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().cookie_provider(jar).build()?;
        Ok(Self { client, login_url })
    }
}

#[async_trait]
impl LoginSurface for HttpLoginSurface {
    #[instrument(level = "debug", skip(self), fields(login_url = %self.login_url))]
    async fn begin_login(&self) -> LoadOutcome {
        match self.client.get(self.login_url.clone()).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() || status.is_redirection() {
                    debug!(status = status.as_u16(), "login surface loaded");
                    LoadOutcome::Loaded
                } else {
                    warn!(status = status.as_u16(), "login surface returned error status");
                    LoadOutcome::Failed {
                        reason: format!("login surface returned HTTP {}", status.as_u16()),
                    }
                }
            }
            Err(error) => {
                warn!(error = %error, "login surface failed to load");
                LoadOutcome::Failed {
                    reason: error.to_string(),
                }
            }
        }
    }
}

type LoadEffect = Box<dyn Fn() + Send + Sync>;

/// Scripted login surface for tests and deterministic embedding.
///
/// Pops outcomes off a queue (repeating the last one once exhausted) and
/// runs an optional side effect on every `Loaded` outcome — typically
/// injecting cookies into a shared [`crate::cookie::MemoryCookieSource`]
/// the way the external origin would.
pub struct ScriptedLoginSurface {
    outcomes: Mutex<VecDeque<LoadOutcome>>,
    last: LoadOutcome,
    on_loaded: Option<LoadEffect>,
    calls: Mutex<u32>,
}

impl ScriptedLoginSurface {
    /// Creates a surface replaying `outcomes` in order.
    ///
    /// Once the queue is exhausted the final outcome repeats forever; an
    /// empty queue behaves as endlessly `Loaded`.
    #[must_use]
    pub fn new(outcomes: Vec<LoadOutcome>) -> Self {
        let last = outcomes.last().cloned().unwrap_or(LoadOutcome::Loaded);
        Self {
            outcomes: Mutex::new(outcomes.into()),
            last,
            on_loaded: None,
            calls: Mutex::new(0),
        }
    }

    /// Attaches a side effect run on every `Loaded` outcome.
    #[must_use]
    pub fn with_effect(mut self, effect: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_loaded = Some(Box::new(effect));
        self
    }

    /// Number of times `begin_login` has been driven.
    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.calls.lock().map(|calls| *calls).unwrap_or(0)
    }
}

#[async_trait]
impl LoginSurface for ScriptedLoginSurface {
    async fn begin_login(&self) -> LoadOutcome {
        if let Ok(mut calls) = self.calls.lock() {
            *calls += 1;
        }
        let outcome = self
            .outcomes
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or_else(|| self.last.clone());
        if outcome == LoadOutcome::Loaded
            && let Some(effect) = &self.on_loaded
        {
            effect();
        }
        outcome
    }
}

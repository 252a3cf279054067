//! The session detection state machine.
//!
//! One [`SessionDetector`] instance serializes its own transitions: a check
//! cycle runs to completion before the next may begin, and an in-flight
//! login attempt suppresses re-entrant triggers. The cookie jar is re-read
//! and re-validated on every cycle; a previously observed snapshot is never
//! trusted.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::cache::SessionCache;
use crate::cookie::CookieSource;
use crate::login::{BeginOutcome, LoginInitiator, LoginSurface};
use crate::session::{CookieSessionRecord, UserInfo, extract, unix_now};

use super::config::DetectorConfig;
use super::status::{AuthErrorKind, AuthStatus};

/// Where a detected session came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Fresh cookies observed on this cycle.
    Live,
    /// The stored fallback record.
    Stored,
}

/// A detected session: the evidence plus its derived view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// The evidence backing this session.
    pub record: CookieSessionRecord,
    /// The decoded consumer view.
    pub user_info: UserInfo,
    /// Whether the evidence is live or stored.
    pub provenance: Provenance,
}

/// Final outcome of one detection run.
#[derive(Debug, Clone)]
pub enum DetectOutcome {
    /// A session was found (live or stored).
    Authenticated(SessionSnapshot),
    /// Detection gave up; the kind says why.
    Failed(AuthErrorKind),
}

enum CheckResult {
    Live(SessionSnapshot),
    Stored(SessionSnapshot),
    Miss,
}

/// Owns the authentication status lifecycle.
pub struct SessionDetector {
    cookies: Arc<dyn CookieSource>,
    cache: SessionCache,
    initiator: LoginInitiator,
    config: DetectorConfig,
    status_tx: watch::Sender<AuthStatus>,
    cycle_lock: tokio::sync::Mutex<()>,
}

impl SessionDetector {
    /// Creates a detector over the given cookie source, cache, and login
    /// surface.
    #[must_use]
    pub fn new(
        cookies: Arc<dyn CookieSource>,
        cache: SessionCache,
        surface: Arc<dyn LoginSurface>,
        config: DetectorConfig,
    ) -> Self {
        let (status_tx, _) = watch::channel(AuthStatus::Checking);
        let initiator = LoginInitiator::new(surface, config.max_retries, config.login_settle);
        Self {
            cookies,
            cache,
            initiator,
            config,
            status_tx,
            cycle_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Subscribes to status transitions.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<AuthStatus> {
        self.status_tx.subscribe()
    }

    /// The current status.
    #[must_use]
    pub fn current_status(&self) -> AuthStatus {
        self.status_tx.borrow().clone()
    }

    /// The cache this detector reads its fallback from.
    #[must_use]
    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    /// The detector's timing configuration.
    #[must_use]
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Number of login attempts made since the last reset.
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.initiator.retry_count()
    }

    /// Manual retry affordance: resets the retry counter and re-enters the
    /// checking state so a new [`detect`](Self::detect) run can proceed.
    pub fn reset(&self) {
        self.initiator.reset();
        self.publish(AuthStatus::Checking);
    }

    /// Runs a single check cycle without ever triggering a login attempt.
    ///
    /// Publishes the resulting status and returns the snapshot on a hit.
    pub fn check_once(&self) -> Option<SessionSnapshot> {
        match self.check_cycle() {
            CheckResult::Live(snapshot) | CheckResult::Stored(snapshot) => {
                self.authenticated(&snapshot);
                Some(snapshot)
            }
            CheckResult::Miss => {
                self.publish(AuthStatus::NotLoggedIn);
                None
            }
        }
    }

    /// Runs the full detection flow once.
    ///
    /// Checks live cookies, then the stored fallback, then drives bounded
    /// silent login attempts until cookies appear, the retry ceiling is
    /// reached, or the overall timeout elapses. Transitions are strictly
    /// serialized per instance; concurrent calls queue behind each other.
    pub async fn detect(&self) -> DetectOutcome {
        let _cycle = self.cycle_lock.lock().await;

        self.publish(AuthStatus::Checking);
        match self.check_cycle() {
            CheckResult::Live(snapshot) | CheckResult::Stored(snapshot) => {
                self.authenticated(&snapshot);
                return DetectOutcome::Authenticated(snapshot);
            }
            CheckResult::Miss => {}
        }

        self.publish(AuthStatus::NotLoggedIn);

        let timeout_ms = u64::try_from(self.config.login_timeout.as_millis()).unwrap_or(u64::MAX);
        match tokio::time::timeout(self.config.login_timeout, self.login_loop()).await {
            Ok(outcome) => outcome,
            Err(_elapsed) => {
                let kind = AuthErrorKind::LoginTimeout { timeout_ms };
                self.publish(AuthStatus::Error(kind.clone()));
                DetectOutcome::Failed(kind)
            }
        }
    }

    /// Runs detection, then keeps re-checking at the poll interval while
    /// authenticated, re-entering detection when the session disappears.
    ///
    /// Returns when the machine reaches the `Error` status or `shutdown`
    /// fires. All timers are dropped with the future; nothing leaks.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            let outcome = tokio::select! {
                outcome = self.detect() => outcome,
                _ = shutdown.changed() => return,
            };

            let snapshot = match outcome {
                DetectOutcome::Authenticated(snapshot) => snapshot,
                // Error is terminal until a manual retry
                DetectOutcome::Failed(_) => return,
            };

            let mut provenance = snapshot.provenance;
            loop {
                tokio::select! {
                    () = tokio::time::sleep(self.config.poll_interval) => {}
                    _ = shutdown.changed() => return,
                }
                match self.check_cycle() {
                    CheckResult::Live(snapshot) => {
                        // Live evidence always wins over a stored identity
                        if provenance != Provenance::Live {
                            provenance = Provenance::Live;
                            self.authenticated(&snapshot);
                        }
                    }
                    CheckResult::Stored(snapshot) => {
                        if provenance != Provenance::Stored {
                            provenance = Provenance::Stored;
                            self.authenticated(&snapshot);
                        }
                    }
                    CheckResult::Miss => {
                        debug!("session evidence disappeared; re-entering detection");
                        self.publish(AuthStatus::NotLoggedIn);
                        break;
                    }
                }
            }
        }
    }

    async fn login_loop(&self) -> DetectOutcome {
        loop {
            // Settle before each attempt so an out-of-band login (another
            // tab, the ERP origin itself) gets a chance to land first
            tokio::time::sleep(self.config.settle_delay).await;

            if let Some(snapshot) = self.read_live() {
                self.authenticated(&snapshot);
                return DetectOutcome::Authenticated(snapshot);
            }

            if !self.initiator.can_attempt() {
                let kind = AuthErrorKind::RetriesExhausted {
                    max_retries: self.config.max_retries,
                };
                self.publish(AuthStatus::Error(kind.clone()));
                return DetectOutcome::Failed(kind);
            }

            self.publish(AuthStatus::LoginInProgress);
            match self.initiator.begin().await {
                BeginOutcome::Settled => {
                    if let Some(snapshot) = self.poll_for_live().await {
                        self.authenticated(&snapshot);
                        return DetectOutcome::Authenticated(snapshot);
                    }
                    debug!("no session cookies appeared after login attempt");
                    self.publish(AuthStatus::NotLoggedIn);
                }
                BeginOutcome::AlreadyInProgress => {
                    // Another cycle owns the attempt; wait out a poll tick
                    tokio::time::sleep(self.config.poll_interval).await;
                }
                BeginOutcome::RetriesExhausted { max_retries } => {
                    let kind = AuthErrorKind::RetriesExhausted { max_retries };
                    self.publish(AuthStatus::Error(kind.clone()));
                    return DetectOutcome::Failed(kind);
                }
                BeginOutcome::LoadFailed { reason } => {
                    if self.initiator.can_attempt() {
                        self.publish(AuthStatus::NotLoggedIn);
                    } else {
                        let kind = AuthErrorKind::LoadFailure { reason };
                        self.publish(AuthStatus::Error(kind.clone()));
                        return DetectOutcome::Failed(kind);
                    }
                }
            }
        }
    }

    /// Polls for live cookies at the aggressive interval for one poll
    /// window after a login attempt settles.
    async fn poll_for_live(&self) -> Option<SessionSnapshot> {
        let deadline = tokio::time::Instant::now() + self.config.poll_interval;
        loop {
            if let Some(snapshot) = self.read_live() {
                return Some(snapshot);
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(self.config.aggressive_poll_interval).await;
        }
    }

    fn check_cycle(&self) -> CheckResult {
        if let Some(snapshot) = self.read_live() {
            return CheckResult::Live(snapshot);
        }
        if let Some(stored) = self.cache.load()
            && let Some(user_info) = stored.record.to_user_info()
        {
            return CheckResult::Stored(SessionSnapshot {
                record: stored.record,
                user_info,
                provenance: Provenance::Stored,
            });
        }
        CheckResult::Miss
    }

    fn read_live(&self) -> Option<SessionSnapshot> {
        let cookies = self.cookies.read_all();
        let record = extract(&cookies, unix_now());
        let user_info = record.to_user_info()?;
        Some(SessionSnapshot {
            record,
            user_info,
            provenance: Provenance::Live,
        })
    }

    fn authenticated(&self, snapshot: &SessionSnapshot) {
        self.initiator.reset();
        match snapshot.provenance {
            Provenance::Live => self.publish(AuthStatus::LoggedIn),
            Provenance::Stored => self.publish(AuthStatus::UsingStored),
        }
        info!(
            user_id = %snapshot.user_info.user_id,
            provenance = ?snapshot.provenance,
            "session detected"
        );
    }

    fn publish(&self, status: AuthStatus) {
        let previous = self.status_tx.send_replace(status.clone());
        if previous != status {
            debug!(from = %previous, to = %status, "status transition");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryStore, SessionCache};
    use crate::cookie::MemoryCookieSource;
    use crate::login::{LoadOutcome, ScriptedLoginSurface};
    use crate::session::unix_now;
    use std::time::Duration;

    const LIVE_COOKIES: &str = "user_id=a@b.com; full_name=A B; sid=xyz";

    fn fast_config(max_retries: u32) -> DetectorConfig {
        DetectorConfig {
            max_retries,
            poll_interval: Duration::from_millis(50),
            aggressive_poll_interval: Duration::from_millis(10),
            settle_delay: Duration::from_millis(30),
            login_settle: Duration::from_millis(20),
            login_timeout: Duration::from_secs(300),
            ..DetectorConfig::default()
        }
    }

    fn detector(
        cookies: &MemoryCookieSource,
        surface: ScriptedLoginSurface,
        config: DetectorConfig,
    ) -> SessionDetector {
        let cache = SessionCache::new(Arc::new(MemoryStore::new()));
        SessionDetector::new(
            Arc::new(cookies.clone()),
            cache,
            Arc::new(surface),
            config,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_cookies_transition_checking_to_logged_in() {
        let cookies = MemoryCookieSource::from_header(LIVE_COOKIES);
        let detector = detector(
            &cookies,
            ScriptedLoginSurface::new(vec![]),
            fast_config(3),
        );

        let outcome = detector.detect().await;
        let DetectOutcome::Authenticated(snapshot) = outcome else {
            panic!("expected authentication, got {outcome:?}");
        };
        assert_eq!(snapshot.provenance, Provenance::Live);
        assert_eq!(snapshot.user_info.email, "a@b.com");
        assert_eq!(detector.current_status(), AuthStatus::LoggedIn);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stored_fallback_transitions_to_using_stored() {
        let cookies = MemoryCookieSource::new();
        let surface = ScriptedLoginSurface::new(vec![]);
        let store = MemoryStore::new();
        let cache = SessionCache::new(Arc::new(store));
        // Stored two hours ago with all required fields
        let record = crate::session::CookieSessionRecord::new(
            "a@b.com".into(),
            "A B".into(),
            "no".into(),
            "xyz".into(),
            String::new(),
            unix_now(),
        );
        cache.save_at(&record, unix_now() - 2 * 60 * 60);

        let surface = Arc::new(surface);
        let detector = SessionDetector::new(
            Arc::new(cookies),
            cache,
            Arc::clone(&surface) as _,
            fast_config(3),
        );

        let outcome = detector.detect().await;
        let DetectOutcome::Authenticated(snapshot) = outcome else {
            panic!("expected stored fallback, got {outcome:?}");
        };
        assert_eq!(snapshot.provenance, Provenance::Stored);
        assert_eq!(detector.current_status(), AuthStatus::UsingStored);
        assert_eq!(surface.call_count(), 0, "no login attempt on cache hit");
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_evidence_single_retry_ends_in_error() {
        let cookies = MemoryCookieSource::new();
        let cache = SessionCache::new(Arc::new(MemoryStore::new()));
        let detector = Arc::new(SessionDetector::new(
            Arc::new(cookies),
            cache,
            Arc::new(ScriptedLoginSurface::new(vec![LoadOutcome::Loaded])),
            fast_config(1),
        ));

        // Observe the stream concurrently: the watch channel coalesces, so
        // intermediate states are only visible while detect() is running
        let mut statuses = detector.status();
        let handle = {
            let detector = Arc::clone(&detector);
            tokio::spawn(async move { detector.detect().await })
        };

        let mut observed = Vec::new();
        while statuses.changed().await.is_ok() {
            let status = statuses.borrow_and_update().clone();
            let terminal = status.is_terminal();
            observed.push(status);
            if terminal {
                break;
            }
        }
        let outcome = handle.await.unwrap();

        assert!(matches!(
            outcome,
            DetectOutcome::Failed(AuthErrorKind::RetriesExhausted { max_retries: 1 })
        ));
        assert!(detector.current_status().is_terminal());
        assert!(
            observed.contains(&AuthStatus::LoginInProgress),
            "machine must pass through LoginInProgress: {observed:?}"
        );
        assert!(
            observed.contains(&AuthStatus::NotLoggedIn),
            "machine must pass through NotLoggedIn: {observed:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_retries_stop_at_ceiling() {
        let cookies = MemoryCookieSource::new();
        let surface = Arc::new(ScriptedLoginSurface::new(vec![LoadOutcome::Loaded]));
        let cache = SessionCache::new(Arc::new(MemoryStore::new()));
        let detector = SessionDetector::new(
            Arc::new(cookies),
            cache,
            Arc::clone(&surface) as _,
            fast_config(3),
        );

        let outcome = detector.detect().await;
        assert!(matches!(
            outcome,
            DetectOutcome::Failed(AuthErrorKind::RetriesExhausted { max_retries: 3 })
        ));
        assert_eq!(surface.call_count(), 3, "exactly max_retries attempts");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cookies_appearing_during_login_yield_logged_in() {
        let cookies = MemoryCookieSource::new();
        let jar = cookies.clone();
        let surface =
            ScriptedLoginSurface::new(vec![LoadOutcome::Loaded]).with_effect(move || {
                jar.write("user_id", "a@b.com");
                jar.write("full_name", "A B");
                jar.write("sid", "fresh-after-login");
            });
        let detector = detector(&cookies, surface, fast_config(3));

        let outcome = detector.detect().await;
        let DetectOutcome::Authenticated(snapshot) = outcome else {
            panic!("expected login to succeed, got {outcome:?}");
        };
        assert_eq!(snapshot.record.session_id(), "fresh-after-login");
        assert_eq!(detector.current_status(), AuthStatus::LoggedIn);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idempotent_recheck_keeps_counter_and_status() {
        let cookies = MemoryCookieSource::from_header(LIVE_COOKIES);
        let detector = detector(
            &cookies,
            ScriptedLoginSurface::new(vec![]),
            fast_config(3),
        );

        detector.detect().await;
        assert_eq!(detector.retry_count(), 0);
        detector.detect().await;
        assert_eq!(detector.retry_count(), 0, "re-check must not count retries");
        assert_eq!(detector.current_status(), AuthStatus::LoggedIn);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_failures_retried_then_surfaced() {
        let cookies = MemoryCookieSource::new();
        let surface = Arc::new(ScriptedLoginSurface::new(vec![LoadOutcome::Failed {
            reason: "connection refused".to_string(),
        }]));
        let cache = SessionCache::new(Arc::new(MemoryStore::new()));
        let detector = SessionDetector::new(
            Arc::new(cookies),
            cache,
            Arc::clone(&surface) as _,
            fast_config(2),
        );

        let outcome = detector.detect().await;
        let DetectOutcome::Failed(AuthErrorKind::LoadFailure { reason }) = outcome else {
            panic!("expected load failure, got {outcome:?}");
        };
        assert_eq!(reason, "connection refused");
        assert_eq!(surface.call_count(), 2, "all retries consumed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_overall_timeout_produces_login_timeout() {
        let cookies = MemoryCookieSource::new();
        let surface = ScriptedLoginSurface::new(vec![LoadOutcome::Loaded]);
        let mut config = fast_config(u32::MAX);
        // Timeout shorter than a single settle delay
        config.login_timeout = Duration::from_millis(10);
        config.settle_delay = Duration::from_millis(50);
        let detector = detector(&cookies, surface, config);

        let outcome = detector.detect().await;
        assert!(matches!(
            outcome,
            DetectOutcome::Failed(AuthErrorKind::LoginTimeout { timeout_ms: 10 })
        ));
        assert_eq!(
            detector.current_status(),
            AuthStatus::Error(AuthErrorKind::LoginTimeout { timeout_ms: 10 })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_reset_reenters_checking_and_clears_counter() {
        let cookies = MemoryCookieSource::new();
        let surface = ScriptedLoginSurface::new(vec![LoadOutcome::Loaded]);
        let detector = detector(&cookies, surface, fast_config(1));

        detector.detect().await;
        assert!(detector.current_status().is_terminal());

        detector.reset();
        assert_eq!(detector.current_status(), AuthStatus::Checking);
        assert_eq!(detector.retry_count(), 0);

        // With cookies now present, a fresh run succeeds
        cookies.write("user_id", "a@b.com");
        cookies.write("full_name", "A B");
        cookies.write("sid", "xyz");
        let outcome = detector.detect().await;
        assert!(matches!(outcome, DetectOutcome::Authenticated(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_reenters_detection_when_cookies_disappear() {
        let cookies = MemoryCookieSource::from_header(LIVE_COOKIES);
        let surface = ScriptedLoginSurface::new(vec![LoadOutcome::Loaded]);
        let cache = SessionCache::new(Arc::new(MemoryStore::new()));
        let detector = Arc::new(SessionDetector::new(
            Arc::new(cookies.clone()),
            cache,
            Arc::new(surface),
            fast_config(1),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let runner = {
            let detector = Arc::clone(&detector);
            tokio::spawn(async move { detector.run(shutdown_rx).await })
        };

        let mut statuses = detector.status();
        // Wait for the first authenticated state
        while !statuses.borrow_and_update().is_authenticated() {
            statuses.changed().await.unwrap();
        }

        // Evidence disappears; the run loop must fall back to detection,
        // exhaust its single retry, and end in Error
        cookies.clear();
        while !statuses.borrow_and_update().is_terminal() {
            statuses.changed().await.unwrap();
        }

        let _ = shutdown_tx.send(true);
        runner.await.unwrap();
    }
}

//! Session lifecycle manager.
//!
//! Owns the authenticated user and the credential, and runs the monitor that
//! refreshes or invalidates the credential:
//!
//! - `login`: persist credential, fetch profile, start monitoring
//! - `logout`: drop credential and user, stop monitoring
//! - `check_session`: one monitor tick (expiry, idle gate, refresh window)
//! - `initialize`: startup re-validation of a persisted credential

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::policy::{decide, ActivityClock, TickDecision};
use crate::auth::{decode_claims, AuthenticatedUser, UnauthorizedNotice};
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::header::AuthHeader;
use crate::store::CredentialStore;

/// Buffered session events per subscriber
const EVENT_CAPACITY: usize = 64;

/// Floor for the monitor period; `interval_at` rejects zero
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Backend calls the session manager depends on
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Fetch the profile for the currently attached credential
    async fn fetch_profile(&self) -> Result<AuthenticatedUser>;

    /// Exchange the currently attached credential for a fresh one
    async fn refresh(&self) -> Result<String>;
}

/// Externally visible session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    /// Startup re-validation of a persisted credential is in flight
    Initializing,
    Authenticated,
    /// Refresh RPC in flight; the user is still authenticated
    RefreshPending,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated | Self::RefreshPending)
    }
}

/// Views the host should move to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    Requested,
    Expired,
    InvalidCredential,
    RefreshFailed,
    Unauthorized,
}

/// Notifications published by the manager
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    Navigate(Route),
    LoggedIn(AuthenticatedUser),
    LoggedOut(LogoutReason),
    Refreshed,
}

/// Result of one monitor tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    NoCredential,
    Hold,
    Idle,
    Refreshed,
    /// Another refresh is already in flight
    RefreshInFlight,
    /// The session changed while the refresh was in flight; result dropped
    Superseded,
    LoggedOut(LogoutReason),
}

#[derive(Debug)]
struct Snapshot {
    state: SessionState,
    user: Option<AuthenticatedUser>,
}

struct Inner {
    backend: Arc<dyn SessionBackend>,
    store: Arc<dyn CredentialStore>,
    header: AuthHeader,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    snapshot: RwLock<Snapshot>,
    activity: ActivityClock,
    /// Bumped on every login and logout; stale completions compare against it
    epoch: AtomicU64,
    refresh_in_flight: AtomicBool,
    loading: AtomicBool,
    monitor: Mutex<Option<AbortHandle>>,
    events: broadcast::Sender<SessionEvent>,
}

/// Clears the refresh flag even when the refresh future is dropped
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Client-side session lifecycle manager.
///
/// Cloning is cheap and shares the same session.
#[derive(Clone)]
pub struct SessionLifecycleManager {
    inner: Arc<Inner>,
}

impl SessionLifecycleManager {
    /// Create a manager.
    pub fn new(
        backend: Arc<dyn SessionBackend>,
        store: Arc<dyn CredentialStore>,
        header: AuthHeader,
        config: SessionConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let activity = ActivityClock::new(clock.now_millis());

        Self {
            inner: Arc::new(Inner {
                backend,
                store,
                header,
                clock,
                config,
                snapshot: RwLock::new(Snapshot {
                    state: SessionState::Unauthenticated,
                    user: None,
                }),
                activity,
                epoch: AtomicU64::new(0),
                refresh_in_flight: AtomicBool::new(false),
                loading: AtomicBool::new(true),
                monitor: Mutex::new(None),
                events,
            }),
        }
    }

    /// Create with the system clock and default configuration.
    pub fn with_defaults(
        backend: Arc<dyn SessionBackend>,
        store: Arc<dyn CredentialStore>,
        header: AuthHeader,
    ) -> Self {
        Self::new(backend, store, header, SessionConfig::default(), Arc::new(SystemClock))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// The logged-in user, if the session is authenticated
    pub fn user(&self) -> Option<AuthenticatedUser> {
        self.read_snapshot(|s| if s.state.is_authenticated() { s.user.clone() } else { None })
    }

    pub fn state(&self) -> SessionState {
        self.read_snapshot(|s| s.state)
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    /// True until startup re-validation, a login, or a logout has settled
    pub fn is_loading(&self) -> bool {
        self.inner.loading.load(Ordering::SeqCst)
    }

    /// Whether the periodic monitor is running
    pub fn is_monitoring(&self) -> bool {
        self.inner
            .monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Check a permission against the current user.
    ///
    /// Returns false when nobody is logged in.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.user().is_some_and(|u| u.has_permission(permission))
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Record a user interaction (pointer, key, click, scroll).
    pub fn record_activity(&self) {
        self.inner.activity.touch(self.inner.clock.now_millis());
    }

    /// Log in with a freshly issued credential.
    ///
    /// The credential is persisted and attached before the profile fetch. On
    /// failure it is rolled back and the error is returned; the session is
    /// never marked authenticated without a fetched profile.
    pub async fn login(&self, credential: &str) -> Result<AuthenticatedUser> {
        // A failed write leaves the current session untouched
        self.inner.store.set(credential)?;

        let epoch = self.bump_epoch();
        self.stop_monitor();
        self.inner.header.attach(credential);

        match self.inner.backend.fetch_profile().await {
            Ok(user) => {
                if self.current_epoch() != epoch {
                    debug!("Discarding login result for a superseded session");
                    return Err(Error::Superseded);
                }

                self.record_activity();
                self.write_snapshot(SessionState::Authenticated, Some(user.clone()));
                self.inner.loading.store(false, Ordering::SeqCst);
                self.start_monitor();

                info!(username = %user.username, role = %user.role, "Logged in");
                self.emit(SessionEvent::StateChanged(SessionState::Authenticated));
                self.emit(SessionEvent::LoggedIn(user.clone()));
                self.emit(SessionEvent::Navigate(Route::Home));
                Ok(user)
            }
            Err(e) => {
                warn!(error = %e, "Login failed: could not fetch profile");
                if self.current_epoch() == epoch {
                    self.clear_credential();
                    let previous = self.write_snapshot(SessionState::Unauthenticated, None);
                    self.inner.loading.store(false, Ordering::SeqCst);
                    if previous != SessionState::Unauthenticated {
                        self.emit(SessionEvent::StateChanged(SessionState::Unauthenticated));
                    }
                }
                Err(e)
            }
        }
    }

    /// Log out. Safe to call when already logged out.
    pub fn logout(&self) {
        self.end_session(LogoutReason::Requested);
    }

    /// Replace the user record after a profile change, keeping the credential.
    pub fn set_user(&self, user: AuthenticatedUser) -> Result<()> {
        let mut snapshot = self.inner.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        if !snapshot.state.is_authenticated() {
            return Err(Error::MissingAuth);
        }
        debug!(
            session_duration_minutes = ?user.session_duration_minutes,
            "Updated user record"
        );
        snapshot.user = Some(user);
        Ok(())
    }

    /// Re-validate a persisted credential at startup.
    ///
    /// An undecodable or already expired credential is discarded without a
    /// profile fetch. Otherwise the profile is fetched; a 401 discards the
    /// credential at once, other failures are retried with exponential
    /// backoff before the credential is discarded.
    ///
    /// Only runs from `Unauthenticated`; a live or initializing session is
    /// left as is.
    pub async fn initialize(&self) -> SessionState {
        let state = self.state();
        if state != SessionState::Unauthenticated {
            debug!(state = ?state, "Session already established, skipping startup validation");
            return state;
        }
        let epoch = self.current_epoch();

        let credential = match self.inner.store.get() {
            Ok(Some(credential)) => credential,
            Ok(None) => {
                self.inner.loading.store(false, Ordering::SeqCst);
                return self.state();
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored credential");
                self.inner.loading.store(false, Ordering::SeqCst);
                return self.state();
            }
        };

        self.write_snapshot(SessionState::Initializing, None);
        self.emit(SessionEvent::StateChanged(SessionState::Initializing));

        match decode_claims(&credential) {
            Err(_) => {
                info!("Discarding undecodable stored credential");
                self.discard_startup(epoch);
                return self.state();
            }
            Ok(claims) if claims.is_expired_at(self.inner.clock.now_secs()) => {
                info!(exp = claims.exp, "Discarding expired stored credential");
                self.discard_startup(epoch);
                return self.state();
            }
            Ok(_) => {}
        }

        self.inner.header.attach(&credential);

        let mut delay = self.inner.config.startup_backoff;
        let mut attempt = 0;
        loop {
            let result = self.inner.backend.fetch_profile().await;
            if self.current_epoch() != epoch {
                debug!("Session changed during startup validation");
                return self.state();
            }

            match result {
                Ok(user) => {
                    info!(username = %user.username, "Restored session");
                    self.write_snapshot(SessionState::Authenticated, Some(user));
                    self.inner.loading.store(false, Ordering::SeqCst);
                    self.start_monitor();
                    self.emit(SessionEvent::StateChanged(SessionState::Authenticated));
                    return SessionState::Authenticated;
                }
                Err(e) if e.is_unauthorized() => {
                    warn!("Stored credential rejected by backend");
                    self.discard_startup(epoch);
                    return self.state();
                }
                Err(e) if attempt < self.inner.config.startup_retries => {
                    attempt += 1;
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Failed to fetch user, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    if self.current_epoch() != epoch {
                        return self.state();
                    }
                }
                Err(e) => {
                    error!(error = %e, attempts = attempt + 1, "Failed to fetch user after retries");
                    self.discard_startup(epoch);
                    return self.state();
                }
            }
        }
    }

    /// Run one monitor tick.
    pub async fn check_session(&self) -> TickOutcome {
        let credential = match self.inner.store.get() {
            Ok(Some(credential)) => credential,
            Ok(None) => return TickOutcome::NoCredential,
            Err(e) => {
                warn!(error = %e, "Failed to read stored credential");
                return TickOutcome::NoCredential;
            }
        };

        let claims = match decode_claims(&credential) {
            Ok(claims) => claims,
            Err(_) => {
                warn!("Stored credential could not be decoded");
                self.end_session(LogoutReason::InvalidCredential);
                return TickOutcome::LoggedOut(LogoutReason::InvalidCredential);
            }
        };

        let minutes = self.read_snapshot(|s| s.user.as_ref().and_then(|u| u.session_duration_minutes));
        let window = self.inner.config.window_for(minutes);
        let now = self.inner.clock.now_secs();

        match decide(&claims, now, self.inner.activity.last_secs(), &window) {
            TickDecision::Expired => {
                info!("Session expired");
                self.end_session(LogoutReason::Expired);
                TickOutcome::LoggedOut(LogoutReason::Expired)
            }
            TickDecision::Idle => TickOutcome::Idle,
            TickDecision::Hold => TickOutcome::Hold,
            TickDecision::Refresh => self.refresh_session().await,
        }
    }

    /// Follow the transport's unauthorized signal until it closes.
    pub fn watch_unauthorized(
        &self,
        mut notices: broadcast::Receiver<UnauthorizedNotice>,
    ) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            loop {
                match notices.recv().await {
                    Ok(UnauthorizedNotice) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        let Some(manager) = Self::upgrade(&weak) else { break };
                        manager.end_session(LogoutReason::Unauthorized);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    async fn refresh_session(&self) -> TickOutcome {
        if self
            .inner
            .refresh_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Refresh already in flight");
            return TickOutcome::RefreshInFlight;
        }
        let _in_flight = InFlight(&self.inner.refresh_in_flight);

        let epoch = self.current_epoch();
        self.transition(SessionState::Authenticated, SessionState::RefreshPending);

        let result = self.inner.backend.refresh().await;
        if self.current_epoch() != epoch {
            debug!("Discarding refresh result for a superseded session");
            return TickOutcome::Superseded;
        }

        let persisted = result.and_then(|credential| {
            self.inner.store.set(&credential)?;
            Ok(credential)
        });

        match persisted {
            Ok(credential) => {
                self.inner.header.attach(&credential);
                self.transition(SessionState::RefreshPending, SessionState::Authenticated);
                info!("Session refreshed");
                self.emit(SessionEvent::Refreshed);
                TickOutcome::Refreshed
            }
            Err(e) => {
                error!(error = %e, "Failed to refresh session");
                self.end_session(LogoutReason::RefreshFailed);
                TickOutcome::LoggedOut(LogoutReason::RefreshFailed)
            }
        }
    }

    fn end_session(&self, reason: LogoutReason) {
        self.bump_epoch();
        self.stop_monitor();
        self.clear_credential();

        let previous = self.write_snapshot(SessionState::Unauthenticated, None);
        self.inner.loading.store(false, Ordering::SeqCst);

        if previous != SessionState::Unauthenticated {
            info!(reason = ?reason, "Session ended");
            self.emit(SessionEvent::StateChanged(SessionState::Unauthenticated));
            self.emit(SessionEvent::LoggedOut(reason));
        }
        self.emit(SessionEvent::Navigate(Route::Login));
    }

    fn discard_startup(&self, epoch: u64) {
        if self.current_epoch() != epoch {
            return;
        }
        self.stop_monitor();
        self.clear_credential();
        self.write_snapshot(SessionState::Unauthenticated, None);
        self.inner.loading.store(false, Ordering::SeqCst);
        self.emit(SessionEvent::StateChanged(SessionState::Unauthenticated));
    }

    fn clear_credential(&self) {
        if let Err(e) = self.inner.store.remove() {
            warn!(error = %e, "Failed to remove stored credential");
        }
        self.inner.header.detach();
    }

    fn start_monitor(&self) {
        let mut slot = self.inner.monitor.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.take() {
            handle.abort();
        }

        let weak = Arc::downgrade(&self.inner);
        let period = self.inner.config.tick_interval.max(MIN_TICK_INTERVAL);
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(manager) = Self::upgrade(&weak) else { break };
                let outcome = manager.check_session().await;
                debug!(outcome = ?outcome, "Session check");
            }
        });

        *slot = Some(handle.abort_handle());
        debug!(interval_ms = period.as_millis() as u64, "Session monitor started");
    }

    fn stop_monitor(&self) {
        let handle = self
            .inner
            .monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            debug!("Session monitor stopped");
        }
    }

    fn upgrade(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    fn current_epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::SeqCst)
    }

    fn bump_epoch(&self) -> u64 {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn read_snapshot<T>(&self, f: impl FnOnce(&Snapshot) -> T) -> T {
        f(&self.inner.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replace state and user, returning the previous state
    fn write_snapshot(&self, state: SessionState, user: Option<AuthenticatedUser>) -> SessionState {
        let mut snapshot = self.inner.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        let previous = snapshot.state;
        snapshot.state = state;
        snapshot.user = user;
        previous
    }

    /// Move `from` to `to`, leaving any other state untouched
    fn transition(&self, from: SessionState, to: SessionState) {
        let mut snapshot = self.inner.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        if snapshot.state == from {
            snapshot.state = to;
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }
}

//! Refresh and idle thresholds derived from the user's session duration.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::auth::CredentialClaims;

/// Session length used when the user has none configured
pub const DEFAULT_SESSION_MINUTES: u32 = 15;

/// Upper bound on how early before expiry a refresh may fire
pub const MAX_REFRESH_WINDOW_SECS: f64 = 300.0;

/// Share of the session duration used as the refresh window
pub const REFRESH_WINDOW_RATIO: f64 = 0.3;

/// Thresholds for one monitor tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionWindow {
    /// Allowed session length; also the idle limit
    pub duration_secs: f64,
    /// Refresh once fewer than this many seconds remain before expiry
    pub refresh_window_secs: f64,
}

impl SessionWindow {
    /// Window for a configured duration using the standard limits.
    pub fn for_duration(minutes: Option<u32>) -> Self {
        Self::with_limits(
            minutes,
            DEFAULT_SESSION_MINUTES,
            MAX_REFRESH_WINDOW_SECS,
            REFRESH_WINDOW_RATIO,
        )
    }

    /// Window with explicit limits. A duration of `None` or `0` falls back
    /// to `default_minutes`.
    pub fn with_limits(
        minutes: Option<u32>,
        default_minutes: u32,
        max_window_secs: f64,
        ratio: f64,
    ) -> Self {
        let minutes = minutes.filter(|m| *m > 0).unwrap_or(default_minutes);
        let duration_secs = f64::from(minutes) * 60.0;

        Self {
            duration_secs,
            refresh_window_secs: max_window_secs.min(duration_secs * ratio),
        }
    }
}

/// What a monitor tick should do with a decoded credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    /// Credential expired; end the session
    Expired,
    /// User inactive longer than the session duration; let the credential lapse
    Idle,
    /// Inside the refresh window with recent activity
    Refresh,
    /// Nothing to do yet
    Hold,
}

/// Decide the action for one tick.
///
/// `now` and `last_activity` are seconds since the epoch. Expiry is checked
/// before the idle gate, so an expired credential always ends the session.
pub fn decide(
    claims: &CredentialClaims,
    now: f64,
    last_activity: f64,
    window: &SessionWindow,
) -> TickDecision {
    if claims.is_expired_at(now) {
        return TickDecision::Expired;
    }

    if now - last_activity > window.duration_secs {
        return TickDecision::Idle;
    }

    if claims.remaining_secs(now) < window.refresh_window_secs {
        TickDecision::Refresh
    } else {
        TickDecision::Hold
    }
}

/// Timestamp of the last observed user interaction
#[derive(Debug)]
pub struct ActivityClock {
    last_millis: AtomicI64,
}

impl ActivityClock {
    pub fn new(now_millis: i64) -> Self {
        Self {
            last_millis: AtomicI64::new(now_millis),
        }
    }

    /// Record an interaction at `now_millis`
    pub fn touch(&self, now_millis: i64) {
        self.last_millis.store(now_millis, Ordering::SeqCst);
    }

    pub fn last_millis(&self) -> i64 {
        self.last_millis.load(Ordering::SeqCst)
    }

    /// Last interaction in fractional seconds since the epoch
    pub fn last_secs(&self) -> f64 {
        self.last_millis() as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(exp: f64) -> CredentialClaims {
        CredentialClaims {
            exp,
            sub: None,
            v: None,
            sid: None,
        }
    }

    #[test]
    fn test_window_scales_with_short_durations() {
        let window = SessionWindow::for_duration(Some(1));
        assert_eq!(window.duration_secs, 60.0);
        assert!((window.refresh_window_secs - 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_window_defaults_to_fifteen_minutes() {
        let window = SessionWindow::for_duration(None);
        assert_eq!(window.duration_secs, 900.0);
        assert!((window.refresh_window_secs - 270.0).abs() < 1e-9);

        assert_eq!(SessionWindow::for_duration(Some(0)), window);
    }

    #[test]
    fn test_window_is_capped() {
        let window = SessionWindow::for_duration(Some(60));
        assert_eq!(window.duration_secs, 3600.0);
        assert_eq!(window.refresh_window_secs, 300.0);
    }

    #[test]
    fn test_expired_wins_over_everything() {
        let window = SessionWindow::for_duration(Some(1));
        let c = claims(1_000.0);

        assert_eq!(decide(&c, 1_000.0, 1_000.0, &window), TickDecision::Expired);
        assert_eq!(decide(&c, 5_000.0, 0.0, &window), TickDecision::Expired);
    }

    #[test]
    fn test_idle_gate_blocks_refresh() {
        let window = SessionWindow::for_duration(Some(1));
        let c = claims(1_010.0);

        // 61s since activity, 10s remaining: inside the window but idle
        assert_eq!(decide(&c, 1_000.0, 939.0, &window), TickDecision::Idle);
        // exactly at the limit is still active
        assert_eq!(decide(&c, 1_000.0, 940.0, &window), TickDecision::Refresh);
    }

    #[test]
    fn test_refresh_window_boundary_one_minute() {
        let window = SessionWindow::for_duration(Some(1));

        assert_eq!(decide(&claims(1_018.0), 1_000.0, 1_000.0, &window), TickDecision::Hold);
        assert_eq!(decide(&claims(1_017.0), 1_000.0, 1_000.0, &window), TickDecision::Refresh);
    }

    #[test]
    fn test_refresh_window_boundary_default() {
        let window = SessionWindow::for_duration(None);

        assert_eq!(decide(&claims(1_280.0), 1_000.0, 500.0, &window), TickDecision::Hold);
        assert_eq!(decide(&claims(1_269.0), 1_000.0, 500.0, &window), TickDecision::Refresh);
    }

    #[test]
    fn test_activity_clock() {
        let activity = ActivityClock::new(10_000);
        assert_eq!(activity.last_secs(), 10.0);

        activity.touch(12_500);
        assert_eq!(activity.last_millis(), 12_500);
        assert_eq!(activity.last_secs(), 12.5);
    }
}

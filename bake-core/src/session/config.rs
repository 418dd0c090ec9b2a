//! Runtime knobs for the session lifecycle manager.

use std::time::Duration;

use super::policy::{
    SessionWindow, DEFAULT_SESSION_MINUTES, MAX_REFRESH_WINDOW_SECS, REFRESH_WINDOW_RATIO,
};

/// Session manager configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How often the monitor checks the credential
    pub tick_interval: Duration,
    /// Session length used when the user has none configured
    pub default_duration_minutes: u32,
    /// Cap on the refresh window, in seconds
    pub max_refresh_window_secs: f64,
    /// Share of the session duration used as the refresh window
    pub refresh_window_ratio: f64,
    /// Profile fetch retries during startup re-validation
    pub startup_retries: u32,
    /// First retry delay; doubles after each failure
    pub startup_backoff: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(5),
            default_duration_minutes: DEFAULT_SESSION_MINUTES,
            max_refresh_window_secs: MAX_REFRESH_WINDOW_SECS,
            refresh_window_ratio: REFRESH_WINDOW_RATIO,
            startup_retries: 5,
            startup_backoff: Duration::from_millis(1000),
        }
    }
}

impl SessionConfig {
    /// Window for a user's configured duration under this config
    pub fn window_for(&self, minutes: Option<u32>) -> SessionWindow {
        SessionWindow::with_limits(
            minutes,
            self.default_duration_minutes,
            self.max_refresh_window_secs,
            self.refresh_window_ratio,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.tick_interval, Duration::from_secs(5));
        assert_eq!(config.default_duration_minutes, 15);
        assert_eq!(config.startup_retries, 5);
        assert_eq!(config.startup_backoff, Duration::from_millis(1000));
        assert_eq!(config.window_for(None), SessionWindow::for_duration(None));
    }

    #[test]
    fn test_custom_default_duration() {
        let config = SessionConfig {
            default_duration_minutes: 60,
            ..SessionConfig::default()
        };
        let window = config.window_for(None);
        assert_eq!(window.duration_secs, 3600.0);
        assert_eq!(window.refresh_window_secs, 300.0);
    }
}

//! Foreground session watcher.
//!
//! Restores the stored session and keeps the monitor running until the
//! session ends or the user interrupts. Each line read from stdin counts as
//! user activity, so an unattended watcher lets the session lapse.

use anyhow::Result;
use bake_core::auth::decode_claims;
use bake_core::session::{LogoutReason, Route, SessionEvent, SessionState};
use bake_core::store::CredentialStore;
use chrono::Local;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use super::Context;
use crate::config::Config;

/// Watch the session until it ends or Ctrl+C is pressed
pub async fn execute(config: &Config) -> Result<()> {
    let ctx = Context::new(config)?;
    let mut events = ctx.manager.subscribe();

    ctx.require_session().await?;

    if let Some(user) = ctx.manager.user() {
        println!("{} Watching session for {}", "✓".green(), user.username.cyan());
    }
    print_expiry(&ctx);
    println!(
        "  Press {} to register activity, {} to stop.",
        "Enter".cyan(),
        "Ctrl+C".cyan()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("{} Stopped watching. The session is still active.", "→".cyan());
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(_)) => {
                    ctx.manager.record_activity();
                    debug!("Activity recorded");
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin, activity tracking disabled");
                    stdin_open = false;
                }
            },
            event = events.recv() => match event {
                Ok(event) => {
                    if report(&event, &ctx) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Missed session events"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    Ok(())
}

/// Print one lifecycle event. Returns true once the session has ended.
fn report(event: &SessionEvent, ctx: &Context) -> bool {
    match event {
        SessionEvent::Refreshed => {
            println!("{} Session refreshed", "↻".green());
            print_expiry(ctx);
            false
        }
        SessionEvent::LoggedOut(reason) => {
            println!("{} Session ended: {}", "✗".red(), describe(*reason));
            println!("  Run {} to log in again.", "bake auth login".cyan());
            true
        }
        SessionEvent::StateChanged(SessionState::RefreshPending) => {
            debug!("Refreshing credential");
            false
        }
        SessionEvent::Navigate(Route::Login) => {
            debug!("Session requires login");
            false
        }
        other => {
            debug!(event = ?other, "Session event");
            false
        }
    }
}

fn print_expiry(ctx: &Context) {
    let Ok(Some(credential)) = ctx.store.get() else {
        return;
    };
    if let Some(expires_at) = decode_claims(&credential).ok().and_then(|c| c.expires_at()) {
        println!(
            "  Credential valid until {}",
            expires_at.with_timezone(&Local).format("%H:%M:%S")
        );
    }
}

fn describe(reason: LogoutReason) -> &'static str {
    match reason {
        LogoutReason::Requested => "logged out",
        LogoutReason::Expired => "credential expired",
        LogoutReason::InvalidCredential => "stored credential is invalid",
        LogoutReason::RefreshFailed => "credential refresh failed",
        LogoutReason::Unauthorized => "rejected by the server",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_reasons() {
        assert_eq!(describe(LogoutReason::Expired), "credential expired");
        assert_eq!(describe(LogoutReason::Unauthorized), "rejected by the server");
        assert_eq!(describe(LogoutReason::RefreshFailed), "credential refresh failed");
    }
}

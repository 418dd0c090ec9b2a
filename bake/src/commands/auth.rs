//! Authentication commands.
//!
//! Exchanges username and password for a credential and hands it to the
//! session manager, which persists it next to the config.

use std::time::Duration;

use anyhow::{Context as _, Result};
use bake_core::auth::decode_claims;
use bake_core::clock::{Clock, SystemClock};
use bake_core::store::CredentialStore;
use chrono::Local;
use colored::Colorize;
use dialoguer::{Input, Password};
use indicatif::{ProgressBar, ProgressStyle};

use super::Context;
use crate::cli::AuthAction;
use crate::config::Config;

/// Handle auth commands
pub async fn handle(action: AuthAction, config: &Config) -> Result<()> {
    match action {
        AuthAction::Login { username } => login(username, config).await,
        AuthAction::Logout => logout(config).await,
        AuthAction::Status => status(config).await,
    }
}

/// Log in with username and password
async fn login(username: Option<String>, config: &Config) -> Result<()> {
    let ctx = Context::new(config)?;

    let username = match username {
        Some(username) => username,
        None => Input::<String>::new()
            .with_prompt("Username")
            .interact_text()
            .context("Failed to read username")?,
    };
    let password = Password::new()
        .with_prompt("Password")
        .interact()
        .context("Failed to read password")?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("Logging in to {}...", ctx.client.base_url()));

    let token = match ctx.client.login_with_password(&username, &password).await {
        Ok(token) => token,
        Err(e) => {
            spinner.finish_and_clear();
            println!("{} Login failed: {}", "✗".red(), login_error_message(&e));
            return Err(e.into());
        }
    };

    spinner.set_message("Loading profile...");
    let result = ctx.manager.login(&token.access_token).await;
    spinner.finish_and_clear();

    match result {
        Ok(user) => {
            println!("{} Logged in as {}", "✓".green(), user.username.cyan());
            println!("  Role: {}", user.role);
            println!(
                "  Credential saved to {}",
                ctx.store.path().display().to_string().cyan()
            );
            Ok(())
        }
        Err(e) => {
            println!("{} Login failed: {}", "✗".red(), e);
            Err(e.into())
        }
    }
}

/// Log out and forget the stored credential
async fn logout(config: &Config) -> Result<()> {
    let ctx = Context::new(config)?;

    if !ctx.has_credential() {
        println!("{} Not logged in.", "✗".red());
        return Ok(());
    }

    ctx.manager.logout();
    println!("{} Logged out successfully!", "✓".green());
    Ok(())
}

/// Show auth status
async fn status(config: &Config) -> Result<()> {
    let ctx = Context::new(config)?;

    println!("{}", "BakeAssist Authentication Status".bold());
    println!("{}", "─".repeat(40));
    println!("  Server: {}", ctx.client.base_url().cyan());
    println!("  Credential file: {}", ctx.store.path().display());

    let credential = match ctx.store.get()? {
        Some(credential) => credential,
        None => {
            println!("  Status: {}", "Not logged in".yellow());
            println!();
            println!("  Run {} to authenticate.", "bake auth login".cyan());
            return Ok(());
        }
    };

    match decode_claims(&credential) {
        Ok(claims) => {
            let remaining = claims.remaining_secs(SystemClock.now_secs());
            if let Some(expires_at) = claims.expires_at() {
                println!(
                    "  Expires: {} ({})",
                    expires_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
                    format_remaining(remaining)
                );
            }
        }
        Err(_) => println!("  Credential: {}", "unreadable".red()),
    }

    ctx.manager.initialize().await;
    match ctx.manager.user() {
        Some(user) => {
            println!("  Status: {}", "Authenticated".green());
            match &user.email {
                Some(email) => println!("  User: {} <{}>", user.username.cyan(), email),
                None => println!("  User: {}", user.username.cyan()),
            }
            println!("  Role: {}", user.role);
            match user.session_duration_minutes {
                Some(minutes) => println!("  Session duration: {} min", minutes),
                None => println!("  Session duration: default"),
            }
            if user.is_admin() {
                println!("  Permissions: all (admin)");
            } else if let Some(role) = &user.role_rel {
                println!("  Permissions: {}", role.permissions.join(", "));
            }
        }
        None => {
            println!("  Status: {}", "Session no longer valid".red());
            println!();
            println!("  Run {} to authenticate.", "bake auth login".cyan());
        }
    }

    Ok(())
}

fn login_error_message(error: &bake_core::Error) -> String {
    if error.is_unauthorized() {
        "incorrect username or password".to_string()
    } else {
        error.to_string()
    }
}

fn format_remaining(secs: f64) -> String {
    if secs <= 0.0 {
        return "expired".to_string();
    }
    let secs = secs as u64;
    match secs {
        s if s < 60 => format!("in {}s", s),
        s if s < 3600 => format!("in {}m {}s", s / 60, s % 60),
        s => format!("in {}h {}m", s / 3600, (s % 3600) / 60),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(-5.0), "expired");
        assert_eq!(format_remaining(0.0), "expired");
        assert_eq!(format_remaining(42.7), "in 42s");
        assert_eq!(format_remaining(125.0), "in 2m 5s");
        assert_eq!(format_remaining(7260.0), "in 2h 1m");
    }

    #[test]
    fn test_login_error_message() {
        let rejected = bake_core::Error::Status {
            status: 401,
            message: "Incorrect username or password".into(),
        };
        assert_eq!(login_error_message(&rejected), "incorrect username or password");
        assert_eq!(
            login_error_message(&bake_core::Error::Timeout),
            bake_core::Error::Timeout.to_string()
        );
    }
}

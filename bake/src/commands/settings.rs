//! Account settings commands.

use anyhow::Result;
use bake_core::client::validate_session_minutes;
use colored::Colorize;
use tracing::info;

use super::Context;
use crate::cli::SettingsAction;
use crate::config::Config;

/// Handle settings commands
pub async fn handle(action: SettingsAction, config: &Config) -> Result<()> {
    match action {
        SettingsAction::Duration { minutes } => set_duration(minutes, config).await,
    }
}

/// Change the session duration of the current account
async fn set_duration(minutes: u32, config: &Config) -> Result<()> {
    if let Err(e) = validate_session_minutes(minutes) {
        println!("{} {}", "✗".red(), e);
        return Err(e.into());
    }

    let ctx = Context::new(config)?;
    ctx.require_session().await?;

    let user = match ctx.client.update_session_duration(minutes).await {
        Ok(user) => user,
        Err(e) => {
            println!("{} Failed to update settings: {}", "✗".red(), e);
            return Err(e.into());
        }
    };

    ctx.manager.set_user(user)?;
    info!(minutes, "Session duration updated");

    let window = config.session_config().window_for(Some(minutes));
    println!("{} Session duration set to {} min", "✓".green(), minutes);
    println!(
        "  Credentials are refreshed in the last {:.0}s before expiry.",
        window.refresh_window_secs
    );
    Ok(())
}

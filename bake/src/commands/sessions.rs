//! Server-side session management.

use anyhow::{Context as _, Result};
use bake_core::auth::decode_claims;
use bake_core::client::UserSessionRecord;
use bake_core::store::CredentialStore;
use colored::Colorize;
use dialoguer::Confirm;

use super::Context;
use crate::cli::SessionsAction;
use crate::config::Config;

/// Handle sessions commands
pub async fn handle(action: SessionsAction, config: &Config) -> Result<()> {
    let ctx = Context::new(config)?;
    ctx.require_session().await?;

    match action {
        SessionsAction::List => list(&ctx).await,
        SessionsAction::Revoke { id } => revoke(&ctx, &id).await,
        SessionsAction::RevokeAll { yes } => revoke_all(&ctx, yes).await,
    }
}

async fn list(ctx: &Context) -> Result<()> {
    let sessions = ctx.client.list_sessions().await?;
    let current = current_session_id(ctx);

    if sessions.is_empty() {
        println!("No active sessions.");
        return Ok(());
    }

    println!("{}", "Active Sessions".bold());
    println!("{}", "─".repeat(60));
    for session in &sessions {
        print_session(session, current.as_deref() == Some(session.id.as_str()));
    }
    Ok(())
}

async fn revoke(ctx: &Context, id: &str) -> Result<()> {
    ctx.client.revoke_session(id).await?;
    println!("{} Session {} revoked", "✓".green(), id.yellow());

    if current_session_id(ctx).as_deref() == Some(id) {
        ctx.manager.logout();
        println!("  That was this session; you are now logged out.");
    }
    Ok(())
}

async fn revoke_all(ctx: &Context, yes: bool) -> Result<()> {
    if !yes {
        let confirmed = Confirm::new()
            .with_prompt("Revoke every session, including this one?")
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    ctx.client.revoke_all_sessions().await?;
    ctx.manager.logout();
    println!("{} All sessions revoked. You are now logged out.", "✓".green());
    Ok(())
}

/// Session ID carried by the stored credential
fn current_session_id(ctx: &Context) -> Option<String> {
    let credential = ctx.store.get().ok().flatten()?;
    decode_claims(&credential).ok()?.sid
}

fn print_session(session: &UserSessionRecord, current: bool) {
    let marker = if current { "*".green() } else { " ".normal() };
    println!("{} {}", marker, session.id.yellow());
    println!(
        "    Client: {}",
        session.user_agent.as_deref().unwrap_or("unknown")
    );
    println!(
        "    Address: {}",
        session.ip_address.as_deref().unwrap_or("unknown")
    );
    println!(
        "    Created: {}  Last used: {}",
        session.created_at.format("%Y-%m-%d %H:%M"),
        session.last_used_at.format("%Y-%m-%d %H:%M")
    );
}

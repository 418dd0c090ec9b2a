//! CLI argument definitions using clap derive macros.

use clap::{Args, Parser, Subcommand};

/// BakeAssist command-line client
///
/// Log in, keep a session alive and manage session settings.
#[derive(Parser, Debug)]
#[command(name = "bake")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authentication (login, logout, status)
    Auth(AuthCommand),

    /// Keep the session alive in the foreground and report lifecycle events
    Watch,

    /// Account settings
    Settings(SettingsCommand),

    /// Server-side login sessions
    Sessions(SessionsCommand),

    /// Show version information
    Version,
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct AuthCommand {
    #[command(subcommand)]
    pub action: AuthAction,
}

#[derive(Subcommand, Debug)]
pub enum AuthAction {
    /// Log in with username and password
    Login {
        /// Username (prompted when omitted)
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Log out and forget the stored credential
    Logout,

    /// Show authentication status
    Status,
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct SettingsCommand {
    #[command(subcommand)]
    pub action: SettingsAction,
}

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Set the session duration in minutes (1 to 43200)
    Duration {
        /// Session duration in minutes
        minutes: u32,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Sessions Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct SessionsCommand {
    #[command(subcommand)]
    pub action: SessionsAction,
}

#[derive(Subcommand, Debug)]
pub enum SessionsAction {
    /// List active sessions
    List,

    /// Revoke one session
    Revoke {
        /// Session ID
        id: String,
    },

    /// Revoke every session, including this one
    RevokeAll {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

//! Command implementations for the bake CLI.
//!
//! Each submodule implements the logic for a command group.

pub mod auth;
pub mod sessions;
pub mod settings;
pub mod watch;

use std::sync::Arc;

use anyhow::{bail, Result};
use bake_core::client::ApiClient;
use bake_core::clock::SystemClock;
use bake_core::header::AuthHeader;
use bake_core::session::{SessionLifecycleManager, SessionState};
use bake_core::store::{CredentialStore, FileCredentialStore};
use colored::Colorize;

use crate::config::Config;

/// Transport, store and session manager wired to the same credential
pub struct Context {
    pub client: Arc<ApiClient>,
    pub store: Arc<FileCredentialStore>,
    pub manager: SessionLifecycleManager,
}

impl Context {
    pub fn new(config: &Config) -> Result<Self> {
        let store = Arc::new(FileCredentialStore::with_path(config.paths.credential_path()));
        let header = AuthHeader::new();

        let mut client = ApiClient::new(&config.api.url, header.clone(), store.clone())?
            .with_profile_timeout(config.profile_timeout());
        if config.api.upgrade_insecure {
            client = client.upgrade_insecure();
        }
        let client = Arc::new(client);

        let manager = SessionLifecycleManager::new(
            client.clone(),
            store.clone(),
            header,
            config.session_config(),
            Arc::new(SystemClock),
        );
        // The watcher task ends when the client drops its sender
        manager.watch_unauthorized(client.subscribe_unauthorized());

        Ok(Self {
            client,
            store,
            manager,
        })
    }

    pub fn has_credential(&self) -> bool {
        matches!(self.store.get(), Ok(Some(_)))
    }

    /// Restore the persisted session, failing when there is none.
    pub async fn require_session(&self) -> Result<()> {
        if !self.has_credential() {
            println!("{} Not logged in.", "✗".red());
            println!("  Run: {}", "bake auth login".cyan());
            bail!("not logged in");
        }

        match self.manager.initialize().await {
            SessionState::Authenticated | SessionState::RefreshPending => Ok(()),
            _ => {
                println!("{} Stored session is no longer valid.", "✗".red());
                println!("  Run: {}", "bake auth login".cyan());
                bail!("session expired");
            }
        }
    }
}

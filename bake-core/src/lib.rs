//! bake-core - Core library for BakeAssist clients
//!
//! This crate provides the client-side session machinery shared by BakeAssist
//! front-ends:
//!
//! - **session**: Session lifecycle manager (login, logout, refresh monitor)
//! - **auth**: User record, permissions and credential decoding
//! - **client**: REST transport with the global unauthorized signal
//! - **store**: Persisted credential storage
//! - **header**: Shared `Authorization` slot for outgoing requests
//! - **clock**: Wall-clock source

pub mod auth;
#[cfg(feature = "client")]
pub mod client;
pub mod clock;
pub mod error;
pub mod header;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use auth::AuthenticatedUser;
pub use error::{Error, Result};
pub use session::{SessionEvent, SessionLifecycleManager, SessionState};

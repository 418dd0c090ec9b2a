//! Client-side session lifecycle.
//!
//! ## Lifecycle
//!
//! ```text
//! Startup
//!   │
//!   ├─► Persisted credential? ── no ──► Unauthenticated
//!   │
//!   ├─► Decode + expiry pre-check ── fails ──► discard, Unauthenticated
//!   │
//!   └─► Fetch profile (retry with backoff, 401 discards) ──► Authenticated
//!
//! Every tick while authenticated
//!   │
//!   ├─► Expired or undecodable ──► logout
//!   │
//!   ├─► Idle longer than the session duration ──► let it lapse
//!   │
//!   └─► Inside the refresh window ──► refresh (failure ──► logout)
//!
//! Any 401 from the transport ──► Unauthenticated
//! ```

mod config;
mod lifecycle;
mod policy;

pub use config::SessionConfig;
pub use lifecycle::*;
pub use policy::{
    decide, ActivityClock, SessionWindow, TickDecision, DEFAULT_SESSION_MINUTES,
    MAX_REFRESH_WINDOW_SECS, REFRESH_WINDOW_RATIO,
};

//! Shared `Authorization` default for outgoing requests.

use std::sync::{Arc, PoisonError, RwLock};

/// Process-wide slot holding the bearer credential attached to every request.
///
/// Cloning shares the slot. The session manager attaches and detaches the
/// credential; the transport reads it when building requests and detaches it
/// on a 401.
#[derive(Debug, Clone, Default)]
pub struct AuthHeader {
    slot: Arc<RwLock<Option<String>>>,
}

impl AuthHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a credential to all subsequent requests
    pub fn attach(&self, credential: &str) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(credential.to_string());
    }

    /// Stop sending a credential
    pub fn detach(&self) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }

    /// The attached credential, if any
    pub fn credential(&self) -> Option<String> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_attached(&self) -> bool {
        self.slot.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

//! Authentication types for bake-core.
//!
//! Provides:
//! - The authenticated user record returned by `GET /users/me`
//! - Role based permission checks
//! - Non-cryptographic decoding of bearer credentials

mod credential;

pub use credential::{decode_claims, CredentialClaims};
#[cfg(test)]
pub(crate) use credential::encode_unsigned;

use serde::{Deserialize, Serialize};

/// Role tag that bypasses permission checks
pub const ADMIN_ROLE: &str = "admin";

/// Structured role attached to a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// The currently logged-in identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: String,
    #[serde(default)]
    pub role_rel: Option<RoleRecord>,
    /// Configured session length; `None` (or 0) means the client default
    #[serde(default)]
    pub session_duration_minutes: Option<u32>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_verified: bool,
}

fn default_true() -> bool {
    true
}

impl AuthenticatedUser {
    /// Check whether this user holds a permission.
    ///
    /// Admins hold every permission. Everyone else needs the name in their
    /// role's permission set.
    pub fn has_permission(&self, permission: &str) -> bool {
        if self.role == ADMIN_ROLE {
            return true;
        }

        self.role_rel
            .as_ref()
            .is_some_and(|role| role.permissions.iter().any(|p| p == permission))
    }

    /// Whether this user has the administrative role
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

/// Credential pair returned by `POST /token` and `POST /auth/refresh`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Broadcast by the transport when any response carries a 401
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnauthorizedNotice;

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: &str, permissions: Option<Vec<&str>>) -> AuthenticatedUser {
        AuthenticatedUser {
            id: "u-1".to_string(),
            username: "baker".to_string(),
            email: None,
            role: role.to_string(),
            role_rel: permissions.map(|perms| RoleRecord {
                name: "custom".to_string(),
                permissions: perms.into_iter().map(String::from).collect(),
            }),
            session_duration_minutes: None,
            is_active: true,
            is_verified: false,
        }
    }

    #[test]
    fn test_admin_has_every_permission() {
        let admin = user(ADMIN_ROLE, Some(vec![]));
        assert!(admin.is_admin());
        assert!(admin.has_permission("anything"));
        assert!(admin.has_permission("edit_recipe"));
    }

    #[test]
    fn test_role_permissions() {
        let editor = user("user", Some(vec!["edit_recipe"]));
        assert!(editor.has_permission("edit_recipe"));
        assert!(!editor.has_permission("delete_recipe"));

        let plain = user("user", None);
        assert!(!plain.has_permission("edit_recipe"));
    }

    #[test]
    fn test_user_deserializes_backend_shape() {
        let body = r#"{
            "id": "7f1c",
            "username": "baker",
            "email": "baker@example.com",
            "role": "user",
            "is_active": true,
            "is_verified": true,
            "role_id": "r1",
            "role_rel": {"id": "r1", "name": "Editors", "permissions": ["edit_recipe"], "user_count": 4},
            "session_duration_minutes": 60,
            "api_key": null
        }"#;

        let parsed: AuthenticatedUser = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.username, "baker");
        assert_eq!(parsed.session_duration_minutes, Some(60));
        assert!(parsed.has_permission("edit_recipe"));
        assert!(parsed.is_verified);
    }

    #[test]
    fn test_user_minimal_shape() {
        let parsed: AuthenticatedUser =
            serde_json::from_str(r#"{"id": "1", "username": "x", "role": "user"}"#).unwrap();
        assert!(parsed.email.is_none());
        assert!(parsed.role_rel.is_none());
        assert!(parsed.session_duration_minutes.is_none());
        assert!(parsed.is_active);
    }

    #[test]
    fn test_token_response_default_type() {
        let token: TokenResponse = serde_json::from_str(r#"{"access_token": "abc"}"#).unwrap();
        assert_eq!(token.access_token, "abc");
        assert_eq!(token.token_type, "bearer");
    }
}

//! Bearer credential decoding.
//!
//! The access token is a JWT issued by the BakeAssist backend. The client only
//! looks at the payload segment to learn when the token expires; the signature
//! is never checked here. The backend stays the authority on whether a token
//! is valid, so nothing decoded by this module may be used to grant access.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Claims read from the payload segment of a credential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialClaims {
    /// Absolute expiry, seconds since the Unix epoch
    pub exp: f64,
    /// Subject (username)
    #[serde(default)]
    pub sub: Option<String>,
    /// Token version, bumped server-side when all sessions are revoked
    #[serde(default)]
    pub v: Option<i64>,
    /// Server-side session id
    #[serde(default)]
    pub sid: Option<String>,
}

impl CredentialClaims {
    /// Whether the credential is expired at `now` (seconds since epoch).
    pub fn is_expired_at(&self, now: f64) -> bool {
        now >= self.exp
    }

    /// Seconds left before expiry. Negative once expired.
    pub fn remaining_secs(&self, now: f64) -> f64 {
        self.exp - now
    }

    /// Expiry as a timestamp, if it is representable.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis((self.exp * 1000.0) as i64)
    }
}

/// Decode the claims of a bearer credential.
///
/// Any structural problem (wrong segment count, bad base64, bad JSON, no
/// `exp`) is reported as [`Error::InvalidToken`].
pub fn decode_claims(token: &str) -> Result<CredentialClaims> {
    let mut segments = token.trim().split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Err(Error::InvalidToken),
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| Error::InvalidToken)?;

    serde_json::from_slice(&bytes).map_err(|_| Error::InvalidToken)
}

/// Build an unsigned token carrying the given claims. Test helper.
#[cfg(test)]
pub(crate) fn encode_unsigned(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.signature", header, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_claims() {
        let token = encode_unsigned(&json!({
            "sub": "baker",
            "v": 3,
            "sid": "abc-123",
            "exp": 1_700_000_000
        }));

        let claims = decode_claims(&token).expect("token should decode");
        assert_eq!(claims.exp, 1_700_000_000.0);
        assert_eq!(claims.sub.as_deref(), Some("baker"));
        assert_eq!(claims.v, Some(3));
        assert_eq!(claims.sid.as_deref(), Some("abc-123"));
    }

    #[test]
    fn test_decode_accepts_padded_payload() {
        let header = URL_SAFE_NO_PAD.encode(b"{}");
        let payload = base64::engine::general_purpose::URL_SAFE.encode(br#"{"exp":12}"#);
        let token = format!("{}.{}.sig", header, payload);

        assert_eq!(decode_claims(&token).unwrap().exp, 12.0);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(matches!(decode_claims(""), Err(Error::InvalidToken)));
        assert!(matches!(decode_claims("not-a-jwt"), Err(Error::InvalidToken)));
        assert!(matches!(decode_claims("a.b"), Err(Error::InvalidToken)));
        assert!(matches!(decode_claims("a.b.c.d"), Err(Error::InvalidToken)));
        assert!(matches!(decode_claims("a.%%%.c"), Err(Error::InvalidToken)));

        let no_json = format!("h.{}.s", URL_SAFE_NO_PAD.encode(b"plain text"));
        assert!(matches!(decode_claims(&no_json), Err(Error::InvalidToken)));
    }

    #[test]
    fn test_decode_requires_exp() {
        let token = encode_unsigned(&json!({ "sub": "baker" }));
        assert!(matches!(decode_claims(&token), Err(Error::InvalidToken)));
    }

    #[test]
    fn test_expiry_helpers() {
        let claims = CredentialClaims {
            exp: 1_000.0,
            sub: None,
            v: None,
            sid: None,
        };

        assert!(!claims.is_expired_at(999.5));
        assert!(claims.is_expired_at(1_000.0));
        assert_eq!(claims.remaining_secs(970.0), 30.0);
        assert_eq!(claims.expires_at().unwrap().timestamp(), 1_000);
    }
}

//! Anti-forgery tokens bound to a session
//!
//! Token layout: `base64url(nonce || expiry_be) "." base64url(mac)` where
//! `mac = HMAC-SHA256(csrf_key, session_id || 0x00 || nonce || expiry_be)`. The key is derived
//! from the session secret and never leaves the server, so a token is only valid for the
//! session it was issued to and cannot be extended by the client.

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::error::AuthError;
use crate::utils::crypto::{derive_key, hmac_sha256, random_bytes, verify_hmac_sha256};

const NONCE_LEN: usize = 24;
const PAYLOAD_LEN: usize = NONCE_LEN + 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsrfToken {
    #[serde(rename = "token")]
    pub value: String,
    #[serde(skip)]
    pub session_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct CsrfTokens {
    key: [u8; 32],
    ttl: chrono::Duration,
}

impl CsrfTokens {
    #[must_use]
    pub fn new(secret: &[u8], ttl: chrono::Duration) -> Self {
        Self {
            key: derive_key(secret, "csrf"),
            ttl,
        }
    }

    /// Issue a fresh token for `session_id`
    ///
    /// The token never outlives the session it is bound to.
    #[must_use]
    pub fn issue(&self, session_id: &str, session_expires_at: DateTime<Utc>) -> CsrfToken {
        self.issue_at(session_id, session_expires_at, Utc::now())
    }

    fn issue_at(
        &self,
        session_id: &str,
        session_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> CsrfToken {
        let expires_at = std::cmp::min(now + self.ttl, session_expires_at);

        let mut payload = random_bytes(NONCE_LEN);
        payload.extend_from_slice(&expires_at.timestamp().to_be_bytes());
        let mac = hmac_sha256(&self.key, &[session_id.as_bytes(), &[0], &payload]);

        CsrfToken {
            value: format!(
                "{}.{}",
                general_purpose::URL_SAFE_NO_PAD.encode(&payload),
                general_purpose::URL_SAFE_NO_PAD.encode(mac)
            ),
            session_id: session_id.to_string(),
            expires_at,
        }
    }

    /// Check that `token` was issued for `session_id` and has not expired
    ///
    /// # Errors
    ///
    /// Returns `AuthError::CsrfMismatch` when the token is missing, malformed, expired or bound
    /// to another session
    pub fn validate(&self, session_id: &str, token: Option<&str>) -> Result<(), AuthError> {
        self.validate_at(session_id, token, Utc::now())
    }

    fn validate_at(
        &self,
        session_id: &str,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let token = token.filter(|t| !t.is_empty()).ok_or(AuthError::CsrfMismatch)?;
        let (payload_b64, mac_b64) = token.split_once('.').ok_or(AuthError::CsrfMismatch)?;

        let payload = general_purpose::URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| AuthError::CsrfMismatch)?;
        let mac = general_purpose::URL_SAFE_NO_PAD
            .decode(mac_b64)
            .map_err(|_| AuthError::CsrfMismatch)?;
        if payload.len() != PAYLOAD_LEN {
            return Err(AuthError::CsrfMismatch);
        }

        if !verify_hmac_sha256(&self.key, &[session_id.as_bytes(), &[0], &payload], &mac) {
            log::debug!("CSRF token MAC mismatch for session {session_id}");
            return Err(AuthError::CsrfMismatch);
        }

        let mut expiry = [0u8; 8];
        expiry.copy_from_slice(&payload[NONCE_LEN..]);
        let expires_at = Utc
            .timestamp_opt(i64::from_be_bytes(expiry), 0)
            .single()
            .ok_or(AuthError::CsrfMismatch)?;
        if now >= expires_at {
            log::debug!("CSRF token expired for session {session_id}");
            return Err(AuthError::CsrfMismatch);
        }

        Ok(())
    }
}

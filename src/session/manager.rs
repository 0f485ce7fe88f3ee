//! Session Manager - Stateless Encrypted Session Handling
//!
//! `SessionManager` is the single source of truth for session tokens. A token is the
//! AES-256-GCM encryption of `SessionClaims`, so verification needs no server-side lookup.
//! It delegates to:
//! - **Cookie scoping**: `CookieManager` computes the `Domain` attribute per serving host
//! - **Anti-forgery**: `CsrfTokens` issues and checks tokens bound to the session id
//! - **Collaborators**: an optional `UserDirectory` (refresh re-checks the user) and an
//!   optional `DeviceHistory` (durable record used for PWA reinstall detection)

use crate::error::AuthError;
use crate::models::{Session, SessionClaims, UserIdentity};
use crate::pwa::DeviceHistory;
use crate::session::cookie::{CookieManager, CookieOptions};
use crate::session::csrf::{CsrfToken, CsrfTokens};
use crate::settings::AppSettings;
use crate::store::UserDirectory;
use crate::utils::crypto::{decrypt_data, derive_key, encrypt_data};
use actix_web::{cookie::Cookie, HttpRequest};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Session Manager for stateless encrypted session handling
#[derive(Clone)]
pub struct SessionManager {
    encryption_key: [u8; 32],
    session_duration: Duration,
    cookie_name: String,
    cookies: CookieManager,
    csrf: CsrfTokens,
    // Collaborators (optional - sessions still work without them)
    users: Option<Arc<dyn UserDirectory>>,
    device_history: Option<Arc<dyn DeviceHistory>>,
}

// =============================================================================
// Construction
// =============================================================================

impl SessionManager {
    #[must_use]
    pub fn new(
        secret: &[u8],
        session_duration: Duration,
        cookie_name: &str,
        cookies: CookieManager,
        csrf_ttl: Duration,
    ) -> Self {
        Self {
            encryption_key: derive_key(secret, "session"),
            session_duration,
            cookie_name: cookie_name.to_string(),
            cookies,
            csrf: CsrfTokens::new(secret, csrf_ttl),
            users: None,
            device_history: None,
        }
    }

    #[must_use]
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self::new(
            settings.session.session_secret.as_bytes(),
            i64::try_from(settings.session.session_duration_hours)
                .ok()
                .and_then(Duration::try_hours)
                .unwrap_or_else(|| Duration::hours(24)),
            &settings.cookies.name,
            CookieManager::from_settings(&settings.cookies),
            i64::try_from(settings.csrf.token_ttl_minutes)
                .ok()
                .and_then(Duration::try_minutes)
                .unwrap_or_else(|| Duration::minutes(60)),
        )
    }

    /// Re-check the user against the directory on every refresh
    #[must_use]
    pub fn with_user_directory(mut self, users: Arc<dyn UserDirectory>) -> Self {
        self.users = Some(users);
        self
    }

    /// Record every issued session in the durable device history
    #[must_use]
    pub fn with_device_history(mut self, history: Arc<dyn DeviceHistory>) -> Self {
        self.device_history = Some(history);
        self
    }
}

// =============================================================================
// Issue / Verify / Refresh
// =============================================================================

impl SessionManager {
    /// Issue a new session for `user_id`
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Internal` if the token cannot be sealed
    pub async fn issue(&self, user_id: &str) -> Result<Session, AuthError> {
        let now = Utc::now();
        let session = self.seal(SessionClaims {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            issued_at: now,
            expires_at: now + self.session_duration,
        })?;

        if let Some(history) = &self.device_history {
            // The session is valid regardless; the history only feeds UX hints
            if let Err(e) = history
                .record_session(user_id, session.session_id(), session.issued_at())
                .await
            {
                log::warn!("Failed to record device history for user {user_id}: {e}");
            }
        }

        log::info!(
            "Issued session {} for user {user_id}",
            session.session_id()
        );
        Ok(session)
    }

    /// Verify a session token
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Unauthenticated` when the token cannot be authenticated or is expired
    pub fn verify(&self, token: &str) -> Result<SessionClaims, AuthError> {
        self.verify_at(token, Utc::now())
    }

    fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, AuthError> {
        let claims: SessionClaims = decrypt_data(token, &self.encryption_key).map_err(|e| {
            log::debug!("Rejected session token: {e}");
            AuthError::Unauthenticated
        })?;

        if claims.is_expired_at(now) {
            log::debug!("Session {} expired at {}", claims.session_id, claims.expires_at);
            return Err(AuthError::Unauthenticated);
        }
        Ok(claims)
    }

    /// Reissue a valid session with a new validity window, keeping its session id
    ///
    /// # Errors
    ///
    /// - `AuthError::Unauthenticated` if the token is invalid or the user no longer exists
    /// - `AuthError::SessionExpiredTransient` if the user directory cannot be reached
    pub async fn refresh(&self, token: &str) -> Result<Session, AuthError> {
        let claims = self.verify(token)?;

        if let Some(users) = &self.users {
            match users.get_user_by_id(&claims.user_id).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    log::info!(
                        "Refusing refresh of session {}: user {} no longer exists",
                        claims.session_id,
                        claims.user_id
                    );
                    return Err(AuthError::Unauthenticated);
                }
                Err(e) => return Err(AuthError::SessionExpiredTransient(e.to_string())),
            }
        }

        let now = Utc::now();
        let session = self.seal(SessionClaims {
            issued_at: now,
            expires_at: now + self.session_duration,
            ..claims
        })?;
        log::debug!("Refreshed session {}", session.session_id());
        Ok(session)
    }

    fn seal(&self, claims: SessionClaims) -> Result<Session, AuthError> {
        let token = encrypt_data(&claims, &self.encryption_key)?;
        Ok(Session { token, claims })
    }
}

// =============================================================================
// Request Extraction
// =============================================================================

impl SessionManager {
    /// Session token carried by the request, if any
    #[must_use]
    pub fn session_token(&self, req: &HttpRequest) -> Option<String> {
        req.cookie(&self.cookie_name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Verify the request's session cookie
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Unauthenticated` if there is no valid session
    pub fn extract_session(&self, req: &HttpRequest) -> Result<SessionClaims, AuthError> {
        let token = self.session_token(req).ok_or(AuthError::Unauthenticated)?;
        self.verify(&token)
    }

    /// Identity of the caller, for downstream consumers
    #[must_use]
    pub fn resolve_identity(&self, req: &HttpRequest) -> Option<UserIdentity> {
        self.extract_session(req).ok().map(|c| UserIdentity::from(&c))
    }

    /// Like `resolve_identity`, for handlers that require a session
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Unauthenticated` if there is no valid session
    pub fn require_identity(&self, req: &HttpRequest) -> Result<UserIdentity, AuthError> {
        self.extract_session(req).map(|c| UserIdentity::from(&c))
    }
}

// =============================================================================
// Cookies & CSRF
// =============================================================================

impl SessionManager {
    /// Auth cookie carrying `session`, scoped for `host`
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnsupportedHost` if the host cannot be classified
    pub fn session_cookie(&self, session: &Session, host: &str) -> Result<Cookie<'static>, AuthError> {
        let remaining = (session.expires_at() - Utc::now()).num_seconds().max(0);
        self.cookies.build_set_cookie(
            &self.cookie_name,
            &session.token,
            host,
            &CookieOptions::auth(actix_web::cookie::time::Duration::seconds(remaining)),
        )
    }

    /// Cookie that removes the auth cookie for `host`
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnsupportedHost` if the host cannot be classified
    pub fn clear_session_cookie(&self, host: &str) -> Result<Cookie<'static>, AuthError> {
        self.cookies.build_clear_cookie(&self.cookie_name, host)
    }

    #[must_use]
    pub fn issue_csrf(&self, identity: &UserIdentity) -> CsrfToken {
        self.csrf
            .issue(&identity.session_id, identity.session_expires_at)
    }

    /// # Errors
    ///
    /// Returns `AuthError::CsrfMismatch` if the token is not valid for this session
    pub fn validate_csrf(&self, identity: &UserIdentity, token: Option<&str>) -> Result<(), AuthError> {
        self.csrf.validate(&identity.session_id, token)
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    #[must_use]
    pub const fn cookie_manager(&self) -> &CookieManager {
        &self.cookies
    }
}

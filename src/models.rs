use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

/// Payload sealed inside the session token
///
/// The token is the AES-256-GCM encryption of these claims, so it is tamper-evident and carries
/// its own validity window.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SessionClaims {
    /// Stable across refreshes; CSRF tokens and OAuth flows bind to it
    pub session_id: String,
    pub user_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionClaims {
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// An issued session: the sealed token plus the claims it carries
#[derive(Clone, Debug)]
pub struct Session {
    pub token: String,
    pub claims: SessionClaims,
}

impl Session {
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.claims.user_id
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.claims.session_id
    }

    #[must_use]
    pub const fn issued_at(&self) -> DateTime<Utc> {
        self.claims.issued_at
    }

    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.claims.expires_at
    }
}

/// Identity resolved from a verified session, handed to downstream consumers
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserIdentity {
    pub user_id: String,
    pub session_id: String,
    pub session_expires_at: DateTime<Utc>,
}

impl From<&SessionClaims> for UserIdentity {
    fn from(claims: &SessionClaims) -> Self {
        Self {
            user_id: claims.user_id.clone(),
            session_id: claims.session_id.clone(),
            session_expires_at: claims.expires_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Third-party account linked to a user, keyed by (`user_id`, `provider`)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedAccount {
    pub user_id: String,
    pub provider: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl LinkedAccount {
    /// Merge an incoming link over the stored one
    ///
    /// Providers often omit the refresh token on re-consent; the stored token stays valid then,
    /// so it is kept. Scope is kept the same way.
    #[must_use]
    pub fn merged_with(self, existing: Option<&Self>) -> Self {
        let Some(existing) = existing else {
            return self;
        };

        let refresh_token = match self.refresh_token {
            Some(token) if !token.is_empty() => Some(token),
            _ => existing.refresh_token.clone(),
        };
        let scope = match self.scope {
            Some(scope) if !scope.is_empty() => Some(scope),
            _ => existing.scope.clone(),
        };

        Self {
            refresh_token,
            scope,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(refresh_token: Option<&str>) -> LinkedAccount {
        LinkedAccount {
            user_id: "user-1".into(),
            provider: "google".into(),
            access_token: "access".into(),
            refresh_token: refresh_token.map(str::to_string),
            scope: Some("calendar.readonly".into()),
            expires_at: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_merge_preserves_existing_refresh_token() {
        let existing = account(Some("stored-refresh"));
        let incoming = LinkedAccount {
            access_token: "new-access".into(),
            scope: None,
            ..account(None)
        };

        let merged = incoming.merged_with(Some(&existing));
        assert_eq!(merged.access_token, "new-access");
        assert_eq!(merged.refresh_token.as_deref(), Some("stored-refresh"));
        assert_eq!(merged.scope.as_deref(), Some("calendar.readonly"));
    }

    #[test]
    fn test_merge_replaces_refresh_token_when_present() {
        let existing = account(Some("old"));
        let merged = account(Some("new")).merged_with(Some(&existing));
        assert_eq!(merged.refresh_token.as_deref(), Some("new"));
    }

    #[test]
    fn test_merge_without_existing() {
        let merged = account(None).merged_with(None);
        assert_eq!(merged.refresh_token, None);
    }

    #[test]
    fn test_claims_expiry() {
        let now = Utc::now();
        let claims = SessionClaims {
            session_id: "s".into(),
            user_id: "u".into(),
            issued_at: now,
            expires_at: now + chrono::Duration::hours(1),
        };
        assert!(!claims.is_expired_at(now));
        assert!(claims.is_expired_at(now + chrono::Duration::hours(1)));
    }
}

//! OAuth account linking
//!
//! Links a third-party account (e.g. a calendar) to an already signed-in user. The flow is
//! independent of how the user signed in: it only needs a resolved identity.
//!
//! - [`providers`] - provider registry and authorization URLs
//! - [`state_store`] - single-use `state` nonces
//! - [`token_exchange`] - authorization code exchange
//! - [`service`] - the connect flow controller

pub mod providers;
pub mod service;
pub mod state_store;
pub mod token_exchange;

pub use providers::{OAuthProvider, ProviderRegistry};
pub use service::{ConnectFlow, ConnectPhase, LinkResult};
pub use state_store::{InMemoryStateStore, StateStore};
pub use token_exchange::TokenResponse;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Query parameters of the provider redirect back to `/callback`
#[derive(Deserialize, Debug, Default)]
pub struct OAuthCallback {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Server-side record of one authorization request, keyed by `nonce`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OAuthState {
    pub nonce: String,
    pub user_id: String,
    pub session_id: String,
    pub provider: String,
    /// PKCE verifier; never leaves the server
    pub code_verifier: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl OAuthState {
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

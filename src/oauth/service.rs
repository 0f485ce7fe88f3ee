//! Connect flow controller
//!
//! Drives one account-linking attempt through
//! `Idle -> AuthorizationRequested -> AwaitingCallback -> Exchanging -> (Linked | Failed)`.
//! The flow is split across two requests, so the phase is not stored; each transition is
//! logged instead and the pending request lives in the [`StateStore`].

use chrono::{Duration, Utc};
use std::fmt;
use std::sync::Arc;

use super::providers::ProviderRegistry;
use super::state_store::StateStore;
use super::token_exchange::exchange_code;
use super::{OAuthCallback, OAuthState};
use crate::error::AuthError;
use crate::models::{LinkedAccount, UserIdentity};
use crate::settings::AppSettings;
use crate::store::{LinkedAccountStore, UserDirectory};
use crate::utils::crypto::{generate_code_verifier, generate_random_token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectPhase {
    Idle,
    AuthorizationRequested,
    AwaitingCallback,
    Exchanging,
    Linked,
    Failed,
}

impl fmt::Display for ConnectPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::AuthorizationRequested => "authorization_requested",
            Self::AwaitingCallback => "awaiting_callback",
            Self::Exchanging => "exchanging",
            Self::Linked => "linked",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of a completed callback
#[derive(Debug, Clone)]
pub struct LinkResult {
    pub provider: String,
    pub account: LinkedAccount,
}

pub struct ConnectFlow {
    registry: Arc<ProviderRegistry>,
    states: Arc<dyn StateStore>,
    accounts: Arc<dyn LinkedAccountStore>,
    users: Arc<dyn UserDirectory>,
    state_ttl: Duration,
    http_client: reqwest::Client,
}

impl ConnectFlow {
    #[must_use]
    pub fn new(
        registry: Arc<ProviderRegistry>,
        states: Arc<dyn StateStore>,
        accounts: Arc<dyn LinkedAccountStore>,
        users: Arc<dyn UserDirectory>,
        state_ttl: Duration,
    ) -> Self {
        Self {
            registry,
            states,
            accounts,
            users,
            state_ttl,
            http_client: reqwest::Client::new(),
        }
    }

    #[must_use]
    pub fn from_settings(
        settings: &AppSettings,
        states: Arc<dyn StateStore>,
        accounts: Arc<dyn LinkedAccountStore>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self::new(
            Arc::new(ProviderRegistry::from_settings(settings)),
            states,
            accounts,
            users,
            i64::try_from(settings.oauth.state_ttl_minutes)
                .ok()
                .and_then(Duration::try_minutes)
                .unwrap_or_else(|| Duration::minutes(10)),
        )
    }

    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Start linking `provider` for the signed-in user
    ///
    /// Returns the provider authorization URL the browser should be redirected to.
    ///
    /// # Errors
    ///
    /// - `AuthError::Unauthenticated` without a session, or when the user no longer exists
    /// - `AuthError::UnsupportedProvider` for unknown or unconfigured providers
    pub async fn initiate(
        &self,
        identity: Option<&UserIdentity>,
        provider: &str,
    ) -> Result<String, AuthError> {
        let identity = identity.ok_or(AuthError::Unauthenticated)?;
        if self.users.get_user_by_id(&identity.user_id).await?.is_none() {
            log::info!(
                "Refusing to link {provider}: user {} no longer exists",
                identity.user_id
            );
            return Err(AuthError::Unauthenticated);
        }

        let config = self.registry.get(provider)?;
        let now = Utc::now();
        let state = OAuthState {
            nonce: generate_random_token(),
            user_id: identity.user_id.clone(),
            session_id: identity.session_id.clone(),
            provider: config.name.clone(),
            code_verifier: config.use_pkce.then(generate_code_verifier),
            created_at: now,
            expires_at: now + self.state_ttl,
        };

        let url = self.registry.authorization_url(
            provider,
            &state.nonce,
            state.code_verifier.as_deref(),
        )?;
        self.states.put(state).await?;

        log_phase(provider, &identity.user_id, ConnectPhase::AuthorizationRequested);
        Ok(url)
    }

    /// Complete the flow from the provider redirect
    ///
    /// The state nonce is consumed before anything else, so it cannot be replayed even when
    /// the callback fails.
    ///
    /// # Errors
    ///
    /// - `AuthError::StateValidationFailed` for unknown, expired or consumed state, or a
    ///   callback from a different session than the one that started the flow
    /// - `AuthError::Unauthenticated` when no session is presented
    /// - `AuthError::ProviderError` when the provider reports an error or the exchange fails
    /// - `AuthError::InvalidGrant` when the code is rejected
    pub async fn callback(
        &self,
        identity: Option<&UserIdentity>,
        params: &OAuthCallback,
    ) -> Result<LinkResult, AuthError> {
        let state = self.consume_state(params.state.as_deref()).await?;
        let provider = state.provider.clone();
        log_phase(&provider, &state.user_id, ConnectPhase::AwaitingCallback);

        match self.complete(identity, &state, params).await {
            Ok(account) => {
                log_phase(&provider, &account.user_id, ConnectPhase::Linked);
                Ok(LinkResult { provider, account })
            }
            Err(e) => {
                log::warn!(
                    "OAuth link for {provider} (user {}) entered {}: {}",
                    state.user_id,
                    ConnectPhase::Failed,
                    e.code()
                );
                Err(e)
            }
        }
    }

    /// Remove a linked account; returns whether one existed
    ///
    /// # Errors
    ///
    /// - `AuthError::Unauthenticated` without a session
    /// - `AuthError::UnsupportedProvider` for unknown providers
    pub async fn disconnect(
        &self,
        identity: Option<&UserIdentity>,
        provider: &str,
    ) -> Result<bool, AuthError> {
        let identity = identity.ok_or(AuthError::Unauthenticated)?;
        let provider = &self.registry.get(provider)?.name;

        let removed = self.accounts.remove(&identity.user_id, provider).await?;
        log::info!(
            "Disconnect {provider} for user {}: {}",
            identity.user_id,
            if removed { "removed" } else { "not linked" }
        );
        Ok(removed)
    }

    async fn consume_state(&self, nonce: Option<&str>) -> Result<OAuthState, AuthError> {
        let nonce = nonce
            .filter(|n| !n.is_empty())
            .ok_or(AuthError::StateValidationFailed)?;

        let Some(state) = self.states.take(nonce).await? else {
            log::warn!("OAuth callback with unknown or already used state");
            return Err(AuthError::StateValidationFailed);
        };
        if state.is_expired_at(Utc::now()) {
            log::warn!("OAuth callback with expired state for {}", state.provider);
            return Err(AuthError::StateValidationFailed);
        }
        Ok(state)
    }

    async fn complete(
        &self,
        identity: Option<&UserIdentity>,
        state: &OAuthState,
        params: &OAuthCallback,
    ) -> Result<LinkedAccount, AuthError> {
        let identity = identity.ok_or(AuthError::Unauthenticated)?;
        if identity.session_id != state.session_id || identity.user_id != state.user_id {
            log::warn!(
                "OAuth callback session does not match the session that started the flow"
            );
            return Err(AuthError::StateValidationFailed);
        }

        if let Some(error) = &params.error {
            return Err(AuthError::ProviderError(match &params.error_description {
                Some(description) => format!("{error}: {description}"),
                None => error.clone(),
            }));
        }
        let code = params
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AuthError::ProviderError("missing authorization code".into()))?;

        log_phase(&state.provider, &state.user_id, ConnectPhase::Exchanging);
        let config = self.registry.get(&state.provider)?;
        let tokens = exchange_code(
            &self.http_client,
            config,
            code,
            self.registry.redirect_uri(),
            state.code_verifier.as_deref(),
        )
        .await?;

        let now = Utc::now();
        self.accounts
            .upsert(LinkedAccount {
                user_id: state.user_id.clone(),
                provider: state.provider.clone(),
                expires_at: tokens.expires_at(now),
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
                scope: tokens.scope,
                updated_at: now,
            })
            .await
    }
}

fn log_phase(provider: &str, user_id: &str, phase: ConnectPhase) {
    log::debug!("OAuth link for {provider} (user {user_id}) entered {phase}");
}

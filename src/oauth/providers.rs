//! Provider registry
//!
//! Built once from settings. Only enabled, fully configured providers are registered; anything
//! else is reported as `UnsupportedProvider` at request time.

use crate::error::AuthError;
use crate::settings::{AppSettings, ProviderSettings};
use crate::utils::crypto::code_challenge_s256;
use std::collections::{BTreeMap, HashMap};

/// Runtime provider configuration with resolved credentials
#[derive(Debug, Clone)]
pub struct OAuthProvider {
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub scopes: Vec<String>,
    pub use_pkce: bool,
    /// Sorted so generated URLs are stable
    pub extra_auth_params: BTreeMap<String, String>,
}

impl OAuthProvider {
    /// Resolve a provider from settings; `None` if disabled or incomplete
    #[must_use]
    pub fn from_settings(settings: &ProviderSettings) -> Option<Self> {
        if !settings.enabled {
            log::info!("OAuth provider {} is disabled", settings.name);
            return None;
        }

        let resolved = (
            settings.get_client_id().filter(|v| !v.is_empty()),
            settings.get_client_secret().filter(|v| !v.is_empty()),
            settings.authorization_endpoint.clone(),
            settings.token_endpoint.clone(),
        );
        let (Some(client_id), Some(client_secret), Some(authorization_endpoint), Some(token_endpoint)) =
            resolved
        else {
            log::warn!(
                "OAuth provider {} is not fully configured; skipping",
                settings.name
            );
            return None;
        };

        Some(Self {
            name: settings.name.clone(),
            client_id,
            client_secret,
            authorization_endpoint,
            token_endpoint,
            scopes: settings.scopes.clone(),
            use_pkce: settings.use_pkce,
            extra_auth_params: settings
                .extra_auth_params
                .clone()
                .unwrap_or_default()
                .into_iter()
                .collect(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<String, OAuthProvider>,
    redirect_uri: String,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new(providers: Vec<OAuthProvider>, redirect_uri: &str) -> Self {
        Self {
            providers: providers
                .into_iter()
                .map(|p| (p.name.clone(), p))
                .collect(),
            redirect_uri: redirect_uri.to_string(),
        }
    }

    #[must_use]
    pub fn from_settings(settings: &AppSettings) -> Self {
        let providers: Vec<OAuthProvider> = settings
            .providers
            .iter()
            .filter_map(OAuthProvider::from_settings)
            .collect();

        let mut names: Vec<&str> = providers.iter().map(|p| p.name.as_str()).collect();
        names.sort_unstable();
        log::info!("OAuth providers available for linking: {names:?}");

        Self::new(providers, &settings.redirect_uri())
    }

    /// # Errors
    ///
    /// Returns `AuthError::UnsupportedProvider` for unknown or unconfigured providers
    pub fn get(&self, name: &str) -> Result<&OAuthProvider, AuthError> {
        self.providers
            .get(name)
            .ok_or_else(|| AuthError::UnsupportedProvider(name.to_string()))
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Build the provider authorization URL for a stored state
    ///
    /// # Errors
    ///
    /// - `AuthError::UnsupportedProvider` for unknown providers
    /// - `AuthError::Internal` if the configured endpoint is not a URL
    pub fn authorization_url(
        &self,
        provider: &str,
        state: &str,
        code_verifier: Option<&str>,
    ) -> Result<String, AuthError> {
        let provider = self.get(provider)?;
        let scopes = provider.scopes.join(" ");

        let mut url = url::Url::parse(&provider.authorization_endpoint)
            .map_err(|e| AuthError::Internal(format!("invalid authorization endpoint: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &provider.client_id)
                .append_pair("redirect_uri", &self.redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("scope", &scopes)
                .append_pair("state", state);

            if let Some(verifier) = code_verifier {
                query
                    .append_pair("code_challenge", &code_challenge_s256(verifier))
                    .append_pair("code_challenge_method", "S256");
            }

            // Provider-specific extras (e.g. access_type=offline, prompt=consent)
            for (key, value) in &provider.extra_auth_params {
                query.append_pair(key, value);
            }
        }

        log::debug!(
            "Built authorization URL for {} with scopes [{scopes}]",
            provider.name
        );
        Ok(url.to_string())
    }
}

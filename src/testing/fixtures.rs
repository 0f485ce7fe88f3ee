//! Test fixtures providing pre-built test objects

use actix_web::cookie::Cookie;
use actix_web::web;
use chrono::{Duration, Utc};
use std::sync::Arc;

use super::constants::{
    TEST_HOST_ONLY_SUFFIX, TEST_PROVIDER, TEST_REGISTRABLE_DOMAIN, TEST_SESSION_SECRET, TEST_USERS,
};
use crate::handlers::configure_services;
use crate::models::{LinkedAccount, Session, User, UserIdentity};
use crate::oauth::{ConnectFlow, InMemoryStateStore};
use crate::pwa::{InMemoryDeviceHistory, PwaDetector};
use crate::session::SessionManager;
use crate::settings::{AppSettings, ProviderSettings};
use crate::store::{InMemoryLinkedAccountStore, InMemoryUserDirectory};

/// Central fixture provider for all test data
pub struct TestFixtures;

impl TestFixtures {
    /// Standard settings: base URL `https://app.example.com`, cookies scoped to `example.com`,
    /// host-only cookies under `vercel.app`, no providers
    #[must_use]
    pub fn settings() -> AppSettings {
        let mut settings = AppSettings::default();
        settings.application.base_url = "https://app.example.com".to_string();
        settings.application.cors_origins = "https://app.example.com".to_string();
        settings.session.session_secret = TEST_SESSION_SECRET.to_string();
        settings.cookies.registrable_domains = vec![TEST_REGISTRABLE_DOMAIN.to_string()];
        settings.cookies.host_only_suffixes = vec![TEST_HOST_ONLY_SUFFIX.to_string()];
        settings
    }

    /// Session manager built from [`Self::settings`] (24h sessions, 60 minute CSRF tokens)
    #[must_use]
    pub fn session_manager() -> SessionManager {
        SessionManager::from_settings(&Self::settings())
    }

    /// Fully configured provider whose endpoints live under `base_url`
    #[must_use]
    pub fn provider_settings(name: &str, base_url: &str) -> ProviderSettings {
        let base = base_url.trim_end_matches('/');
        ProviderSettings {
            name: name.to_string(),
            authorization_endpoint: Some(format!("{base}/authorize")),
            token_endpoint: Some(format!("{base}/token")),
            scopes: vec!["https://www.googleapis.com/auth/calendar.readonly".to_string()],
            client_id: Some("test-client-id".to_string()),
            client_secret: Some("test-client-secret".to_string()),
            ..ProviderSettings::default()
        }
    }

    #[must_use]
    pub fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            email: Some(format!("{id}@example.com")),
            name: None,
        }
    }

    /// Identity of a live session; each user gets its own session id
    #[must_use]
    pub fn identity(user_id: &str) -> UserIdentity {
        UserIdentity {
            user_id: user_id.to_string(),
            session_id: format!("session-{user_id}"),
            session_expires_at: Utc::now() + Duration::hours(24),
        }
    }

    #[must_use]
    pub fn linked_account(
        user_id: &str,
        provider: &str,
        refresh_token: Option<&str>,
    ) -> LinkedAccount {
        LinkedAccount {
            user_id: user_id.to_string(),
            provider: provider.to_string(),
            access_token: "access-1".to_string(),
            refresh_token: refresh_token.map(str::to_string),
            scope: Some("https://www.googleapis.com/auth/calendar.readonly".to_string()),
            expires_at: Some(Utc::now() + Duration::hours(1)),
            updated_at: Utc::now(),
        }
    }

    /// Directory containing every user in `TEST_USERS`
    #[must_use]
    pub fn user_directory() -> InMemoryUserDirectory {
        let users = InMemoryUserDirectory::default();
        for id in TEST_USERS {
            users.insert(Self::user(id));
        }
        users
    }

    /// Connect flow with one provider whose endpoints live under `provider_base`
    #[must_use]
    pub fn connect_harness(provider_base: &str) -> ConnectHarness {
        ConnectHarness::new(
            &Self::settings_with_provider(provider_base),
            Arc::new(Self::user_directory()),
        )
    }

    #[must_use]
    pub fn settings_with_provider(provider_base: &str) -> AppSettings {
        let mut settings = Self::settings();
        settings.providers = vec![Self::provider_settings(TEST_PROVIDER, provider_base)];
        settings
    }
}

/// Connect flow plus direct handles on the stores behind it
pub struct ConnectHarness {
    pub flow: Arc<ConnectFlow>,
    pub states: Arc<InMemoryStateStore>,
    pub accounts: Arc<InMemoryLinkedAccountStore>,
    pub users: Arc<InMemoryUserDirectory>,
}

impl ConnectHarness {
    #[must_use]
    pub fn new(settings: &AppSettings, users: Arc<InMemoryUserDirectory>) -> Self {
        let states = Arc::new(InMemoryStateStore::default());
        let accounts = Arc::new(InMemoryLinkedAccountStore::default());
        let flow = ConnectFlow::from_settings(
            settings,
            states.clone(),
            accounts.clone(),
            users.clone(),
        );
        Self {
            flow: Arc::new(flow),
            states,
            accounts,
            users,
        }
    }
}

/// Every service the HTTP layer needs, wired the way `main` wires them
pub struct TestServices {
    pub settings: AppSettings,
    pub sessions: SessionManager,
    pub connect: ConnectHarness,
    pub device_history: Arc<InMemoryDeviceHistory>,
    pub pwa: PwaDetector,
}

impl TestServices {
    #[must_use]
    pub fn new(provider_base: &str) -> Self {
        Self::from_settings(TestFixtures::settings_with_provider(provider_base))
    }

    #[must_use]
    pub fn from_settings(settings: AppSettings) -> Self {
        let users = Arc::new(TestFixtures::user_directory());
        let device_history = Arc::new(InMemoryDeviceHistory::default());
        let sessions = SessionManager::from_settings(&settings)
            .with_user_directory(users.clone())
            .with_device_history(device_history.clone());
        let pwa = PwaDetector::new(device_history.clone(), &settings.pwa);
        let connect = ConnectHarness::new(&settings, users);

        Self {
            settings,
            sessions,
            connect,
            device_history,
            pwa,
        }
    }

    /// Register app data and routes; use with `App::new().configure(..)`
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.settings.clone()))
            .app_data(web::Data::new(self.sessions.clone()))
            .app_data(web::Data::from(self.connect.flow.clone()))
            .app_data(web::Data::new(self.pwa.clone()))
            .configure(configure_services);
    }

    /// Issue a session for `user_id`
    ///
    /// # Panics
    ///
    /// Panics if the session cannot be sealed
    pub async fn sign_in(&self, user_id: &str) -> Session {
        self.sessions
            .issue(user_id)
            .await
            .expect("test session should be issued")
    }

    /// Plain request cookie carrying `session`
    #[must_use]
    pub fn cookie_for(&self, session: &Session) -> Cookie<'static> {
        Cookie::new(self.sessions.cookie_name().to_string(), session.token.clone())
    }
}

// Installed-app (PWA) context detection and reinstall inference
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::AuthError;
use crate::models::UserIdentity;
use crate::settings::PwaSettings;
use crate::store::lock;

/// Display modes that only occur inside an installed app window
const INSTALLED_DISPLAY_MODES: [&str; 3] = ["standalone", "fullscreen", "minimal-ui"];

/// Signals reported by the client, as sent on `GET /pwa/install-state`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstallSignals {
    /// Matched `display-mode` media query
    pub display_mode: Option<String>,
    /// `navigator.standalone` (iOS home-screen apps)
    pub standalone: Option<bool>,
    /// `document.referrer`
    pub referrer: Option<String>,
    /// `source` query parameter carried by the manifest `start_url`
    pub source: Option<String>,
    /// Whether the app's local install marker is present in client storage
    pub install_marker: Option<bool>,
}

/// Reduced, per-request view of the install signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwaSignal {
    pub is_standalone: bool,
    pub has_prior_session_marker: bool,
}

impl InstallSignals {
    #[must_use]
    pub fn is_pwa(&self) -> bool {
        let display_mode = self
            .display_mode
            .as_deref()
            .map(|m| m.trim().to_ascii_lowercase())
            .is_some_and(|m| INSTALLED_DISPLAY_MODES.contains(&m.as_str()));
        let android_origin = self
            .referrer
            .as_deref()
            .is_some_and(|r| r.starts_with("android-app://"));
        let start_url_marker = self.source.as_deref() == Some("pwa");

        display_mode || self.standalone == Some(true) || android_origin || start_url_marker
    }

    #[must_use]
    pub fn signal(&self) -> PwaSignal {
        PwaSignal {
            is_standalone: self.is_pwa(),
            has_prior_session_marker: self.install_marker.unwrap_or(false),
        }
    }
}

/// Reinstallation needs an installed context with no local marker, plus a server that
/// remembers an earlier session for this user
#[must_use]
pub const fn is_pwa_reinstallation(is_pwa: bool, has_marker: bool, server_recognizes: bool) -> bool {
    is_pwa && !has_marker && server_recognizes
}

/// Durable server-side record of the sessions issued to each user
#[async_trait]
pub trait DeviceHistory: Send + Sync {
    /// Whether `user_id` held any session other than `current_session_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read
    async fn has_prior_session(
        &self,
        user_id: &str,
        current_session_id: &str,
    ) -> Result<bool, AuthError>;

    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written
    async fn record_session(
        &self,
        user_id: &str,
        session_id: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<(), AuthError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SessionRecord {
    session_id: String,
    issued_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct InMemoryDeviceHistory {
    sessions: Mutex<HashMap<String, Vec<SessionRecord>>>,
}

#[async_trait]
impl DeviceHistory for InMemoryDeviceHistory {
    async fn has_prior_session(
        &self,
        user_id: &str,
        current_session_id: &str,
    ) -> Result<bool, AuthError> {
        Ok(lock(&self.sessions)
            .get(user_id)
            .is_some_and(|records| records.iter().any(|r| r.session_id != current_session_id)))
    }

    async fn record_session(
        &self,
        user_id: &str,
        session_id: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let mut sessions = lock(&self.sessions);
        let records = sessions.entry(user_id.to_string()).or_default();
        if !records.iter().any(|r| r.session_id == session_id) {
            records.push(SessionRecord {
                session_id: session_id.to_string(),
                issued_at,
            });
            records.sort_by_key(|r| r.issued_at);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReinstallNotice {
    pub message: String,
    pub dismissible: bool,
    pub auto_hide_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallState {
    pub is_pwa: bool,
    pub is_pwa_reinstallation: bool,
    pub notice: Option<ReinstallNotice>,
    /// Policy hint for the client; access control is not decided here
    pub requires_reauthentication: bool,
}

#[derive(Clone)]
pub struct PwaDetector {
    history: Arc<dyn DeviceHistory>,
    notice_auto_hide: Duration,
    reinstall_requires_reauth: bool,
}

impl PwaDetector {
    #[must_use]
    pub fn new(history: Arc<dyn DeviceHistory>, settings: &PwaSettings) -> Self {
        Self {
            history,
            notice_auto_hide: Duration::from_secs(settings.notice_auto_hide_seconds),
            reinstall_requires_reauth: settings.reinstall_requires_reauth,
        }
    }

    pub async fn detect(
        &self,
        signals: &InstallSignals,
        identity: Option<&UserIdentity>,
    ) -> InstallState {
        let signal = signals.signal();

        let server_recognizes = match identity {
            // Only consulted when it could change the outcome
            Some(identity) if signal.is_standalone && !signal.has_prior_session_marker => self
                .history
                .has_prior_session(&identity.user_id, &identity.session_id)
                .await
                .unwrap_or_else(|e| {
                    log::warn!("Device history lookup failed: {e}");
                    false
                }),
            _ => false,
        };

        let reinstalled = is_pwa_reinstallation(
            signal.is_standalone,
            signal.has_prior_session_marker,
            server_recognizes,
        );
        if reinstalled {
            log::info!(
                "Detected app reinstallation for user {}",
                identity.map_or("-", |i| i.user_id.as_str())
            );
        }

        InstallState {
            is_pwa: signal.is_standalone,
            is_pwa_reinstallation: reinstalled,
            notice: reinstalled.then(|| ReinstallNotice {
                message: "Welcome back! Your session was restored after reinstalling the app."
                    .to_string(),
                dismissible: true,
                auto_hide_ms: u64::try_from(self.notice_auto_hide.as_millis()).unwrap_or(u64::MAX),
            }),
            requires_reauthentication: reinstalled && self.reinstall_requires_reauth,
        }
    }
}

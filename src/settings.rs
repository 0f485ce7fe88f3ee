use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Minimum accepted session secret length in bytes
pub const MIN_SESSION_SECRET_LEN: usize = 32;

/// Upper bound for every configured duration: one (leap) year
pub const MAX_DURATION_HOURS: u64 = 366 * 24;
const MAX_DURATION_MINUTES: u64 = MAX_DURATION_HOURS * 60;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: basic_toml::Error,
    },

    #[error("logger initialization failed: {0}")]
    Logger(String),

    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: String, reason: String },
}

impl SettingsError {
    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppSettings {
    pub application: ApplicationSettings,
    pub session: SessionSettings,
    pub cookies: CookieSettings,
    pub csrf: CsrfSettings,
    pub refresh: RefreshSettings,
    pub pwa: PwaSettings,
    pub oauth: OAuthSettings,
    pub logging: LoggingSettings,
    pub providers: Vec<ProviderSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    /// Public base URL of this service; the OAuth redirect URI is `{base_url}/callback`
    pub base_url: String,
    pub cors_origins: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub session_secret: String,
    pub session_duration_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieSettings {
    /// Auth cookie name
    pub name: String,
    /// Registrable domains owned by the application (e.g. `example.com`)
    pub registrable_domains: Vec<String>,
    /// Public suffixes hosting preview deployments, which only ever get host-only cookies
    pub host_only_suffixes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CsrfSettings {
    pub token_ttl_minutes: u64,
    pub header_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    pub periodic_interval_hours: u64,
    pub idle_quiet_minutes: u64,
    pub min_refresh_interval_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PwaSettings {
    pub notice_auto_hide_seconds: u64,
    pub reinstall_requires_reauth: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthSettings {
    pub state_ttl_minutes: u64,
    /// Application view the browser lands on after a successful link
    pub success_path: String,
    /// Application view the browser lands on when linking fails
    pub error_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub name: String,
    pub authorization_endpoint: Option<String>,
    pub token_endpoint: Option<String>,
    pub scopes: Vec<String>,

    // Direct values (can be overridden by environment variables)
    pub client_id: Option<String>,
    pub client_secret: Option<String>,

    // Environment variable names for overrides
    pub client_id_env: Option<String>,
    pub client_secret_env: Option<String>,

    pub enabled: bool,
    pub use_pkce: bool,
    pub extra_auth_params: Option<HashMap<String, String>>,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            base_url: "http://localhost:8080".to_string(),
            cors_origins: "http://localhost:3000,http://localhost:8080".to_string(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            session_secret: String::new(), // Will be generated if empty
            session_duration_hours: 24,
        }
    }
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            name: "continuity_session".to_string(),
            registrable_domains: Vec::new(),
            host_only_suffixes: Vec::new(),
        }
    }
}

impl Default for CsrfSettings {
    fn default() -> Self {
        Self {
            token_ttl_minutes: 60,
            header_name: "X-CSRF-Token".to_string(),
        }
    }
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            periodic_interval_hours: 12,
            idle_quiet_minutes: 10,
            min_refresh_interval_minutes: 60,
        }
    }
}

impl Default for PwaSettings {
    fn default() -> Self {
        Self {
            notice_auto_hide_seconds: 5,
            reinstall_requires_reauth: false,
        }
    }
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            state_ttl_minutes: 10,
            success_path: "/settings/integrations".to_string(),
            error_path: "/settings/integrations".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            authorization_endpoint: None,
            token_endpoint: None,
            scopes: Vec::new(),
            client_id: None,
            client_secret: None,
            client_id_env: None,
            client_secret_env: None,
            enabled: true,
            use_pkce: true,
            extra_auth_params: None,
        }
    }
}

impl AppSettings {
    /// Load settings from configuration files and environment variables, then validate them
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Logger initialization fails
    /// - A settings file cannot be read or parsed
    /// - The resulting settings fail validation
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_env_file();

        let (mut settings, sources) = Self::load_base_settings()?;

        // Logging first, so the remaining overrides can log
        Self::apply_logging_env_overrides(&mut settings.logging);
        Self::init_logger(&settings.logging)?;
        for source in &sources {
            log::info!("Loaded settings from {}", source.display());
        }

        Self::apply_env_overrides(&mut settings);
        settings.validate()?;

        Ok(settings)
    }

    /// Install the global logger with `logging.level` as its filter
    ///
    /// The level uses `RUST_LOG` syntax, e.g. `info` or `continuity=debug,actix_web=info`.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Logger` if a logger is already installed
    pub fn init_logger(logging: &LoggingSettings) -> Result<(), SettingsError> {
        Self::logger_builder(logging)
            .try_init()
            .map_err(|e| SettingsError::Logger(e.to_string()))
    }

    fn logger_builder(logging: &LoggingSettings) -> env_logger::Builder {
        let mut builder = env_logger::Builder::new();
        builder.parse_filters(&logging.level);
        builder
    }

    /// Load base settings from TOML file(s) or use defaults
    /// Settings are loaded with the following priority (highest to lowest):
    /// 1. Environment variables (applied separately after loading base settings)
    /// 2. Settings.toml in `CONTINUITY_CONFIG_DIR` (if specified and exists)
    /// 3. Settings.toml in current directory (if exists)
    /// 4. Default settings
    ///
    /// Runs before the logger exists, so the files read are returned for logging.
    fn load_base_settings() -> Result<(Self, Vec<PathBuf>), SettingsError> {
        let mut settings = Self::default();
        let mut sources = Vec::new();

        let default_config_path = PathBuf::from("Settings.toml");
        if default_config_path.exists() {
            settings = Self::from_file(&default_config_path)?;
            sources.push(default_config_path);
        }

        if let Ok(config_dir) = std::env::var("CONTINUITY_CONFIG_DIR") {
            let config_path = Path::new(&config_dir).join("Settings.toml");
            if config_path.exists() {
                settings = Self::from_file(&config_path)?;
                sources.push(config_path);
            }
        }

        Ok((settings, sources))
    }

    /// Parse a single TOML settings file
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Io` or `SettingsError::Parse`
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        basic_toml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply environment variable overrides to settings
    fn apply_env_overrides(settings: &mut Self) {
        Self::apply_application_env_overrides(&mut settings.application);
        Self::apply_session_env_overrides(&mut settings.session);
        Self::apply_cookie_env_overrides(&mut settings.cookies);
        Self::apply_logging_env_overrides(&mut settings.logging);
    }

    fn apply_application_env_overrides(app_settings: &mut ApplicationSettings) {
        if let Ok(host) = std::env::var("HOST") {
            app_settings.host = host;
        }
        if let Ok(port_str) = std::env::var("PORT") {
            if let Ok(port) = port_str.parse::<u16>() {
                app_settings.port = port;
            }
        }
        if let Ok(base_url) = std::env::var("BASE_URL") {
            app_settings.base_url = base_url;
        }
        if let Ok(cors_origins) = std::env::var("CORS_ORIGINS") {
            app_settings.cors_origins = cors_origins;
        }
    }

    /// Apply environment overrides for session settings
    pub fn apply_session_env_overrides(session_settings: &mut SessionSettings) {
        if let Ok(value_str) = std::env::var("SESSION_DURATION_HOURS") {
            if let Ok(value) = value_str.parse::<u64>() {
                session_settings.session_duration_hours = value;
            }
        }

        Self::handle_session_secret_override(session_settings);
    }

    /// Helper function to handle session secret environment override and generation
    fn handle_session_secret_override(session_settings: &mut SessionSettings) {
        let env_secret_set = std::env::var("SESSION_SECRET").is_ok_and(|secret| {
            if secret.is_empty() {
                false
            } else {
                session_settings.session_secret = secret;
                true
            }
        });

        if !env_secret_set && session_settings.session_secret.is_empty() {
            session_settings.session_secret = Self::generate_random_session_secret();
            log::warn!(
                "Using auto-generated session secret; sessions will not survive a restart. \
                 Set SESSION_SECRET or session.session_secret in Settings.toml"
            );
        }
    }

    /// 32 bytes (256 bits) of entropy, base64 encoded
    fn generate_random_session_secret() -> String {
        use rand::RngCore;
        let mut secret = [0u8; 32];
        rand::rng().fill_bytes(&mut secret);
        general_purpose::STANDARD.encode(secret)
    }

    /// Apply environment overrides for cookie settings
    pub fn apply_cookie_env_overrides(cookie_settings: &mut CookieSettings) {
        if let Ok(name) = std::env::var("COOKIE_NAME") {
            if !name.is_empty() {
                cookie_settings.name = name;
            }
        }
        if let Ok(domains) = std::env::var("COOKIE_DOMAINS") {
            cookie_settings.registrable_domains = split_list(&domains);
        }
        if let Ok(suffixes) = std::env::var("COOKIE_HOST_ONLY_SUFFIXES") {
            cookie_settings.host_only_suffixes = split_list(&suffixes);
        }
    }

    fn apply_logging_env_overrides(logging_settings: &mut LoggingSettings) {
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            logging_settings.level = log_level;
        }
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                let line = line.trim();
                if line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }

    /// Check the loaded settings once at startup
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Invalid` naming the first offending field
    pub fn validate(&self) -> Result<(), SettingsError> {
        url::Url::parse(&self.application.base_url)
            .map_err(|e| SettingsError::invalid("application.base_url", e.to_string()))?;

        if self.session.session_secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(SettingsError::invalid(
                "session.session_secret",
                format!("must be at least {MIN_SESSION_SECRET_LEN} bytes"),
            ));
        }

        for (field, value, max) in [
            (
                "session.session_duration_hours",
                self.session.session_duration_hours,
                MAX_DURATION_HOURS,
            ),
            (
                "csrf.token_ttl_minutes",
                self.csrf.token_ttl_minutes,
                MAX_DURATION_MINUTES,
            ),
            (
                "refresh.periodic_interval_hours",
                self.refresh.periodic_interval_hours,
                MAX_DURATION_HOURS,
            ),
            (
                "refresh.idle_quiet_minutes",
                self.refresh.idle_quiet_minutes,
                MAX_DURATION_MINUTES,
            ),
            (
                "oauth.state_ttl_minutes",
                self.oauth.state_ttl_minutes,
                MAX_DURATION_MINUTES,
            ),
        ] {
            if value == 0 {
                return Err(SettingsError::invalid(field, "must be greater than zero"));
            }
            if value > max {
                return Err(SettingsError::invalid(field, format!("must be at most {max}")));
            }
        }

        if self.refresh.min_refresh_interval_minutes > MAX_DURATION_MINUTES {
            return Err(SettingsError::invalid(
                "refresh.min_refresh_interval_minutes",
                format!("must be at most {MAX_DURATION_MINUTES}"),
            ));
        }
        if self.pwa.notice_auto_hide_seconds > MAX_DURATION_MINUTES * 60 {
            return Err(SettingsError::invalid(
                "pwa.notice_auto_hide_seconds",
                format!("must be at most {}", MAX_DURATION_MINUTES * 60),
            ));
        }

        if self.cookies.name.is_empty() {
            return Err(SettingsError::invalid("cookies.name", "must not be empty"));
        }
        for domain in self
            .cookies
            .registrable_domains
            .iter()
            .chain(&self.cookies.host_only_suffixes)
        {
            if !is_valid_domain_entry(domain) {
                return Err(SettingsError::invalid(
                    "cookies",
                    format!("malformed domain entry `{domain}`"),
                ));
            }
        }

        for provider in self.get_enabled_providers() {
            provider.validate()?;
        }

        Ok(())
    }

    /// Get the bind address for the server
    #[must_use]
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.application.host, self.application.port)
    }

    /// Get CORS origins as a vector of strings
    #[must_use]
    pub fn get_cors_origins(&self) -> Vec<String> {
        split_list(&self.application.cors_origins)
    }

    /// OAuth redirect URI registered with every provider
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!(
            "{}/callback",
            self.application.base_url.trim_end_matches('/')
        )
    }

    /// Get enabled providers
    #[must_use]
    pub fn get_enabled_providers(&self) -> Vec<&ProviderSettings> {
        self.providers.iter().filter(|p| p.enabled).collect()
    }
}

impl ProviderSettings {
    /// Get the client ID, checking environment variable first, then falling back to direct value
    #[must_use]
    pub fn get_client_id(&self) -> Option<String> {
        if let Some(env_var) = &self.client_id_env {
            if let Ok(value) = std::env::var(env_var) {
                return Some(value);
            }
        }
        self.client_id.clone()
    }

    /// Get the client secret, checking environment variable first, then falling back to direct value
    #[must_use]
    pub fn get_client_secret(&self) -> Option<String> {
        if let Some(env_var) = &self.client_secret_env {
            if let Ok(value) = std::env::var(env_var) {
                return Some(value);
            }
        }
        self.client_secret.clone()
    }

    fn validate(&self) -> Result<(), SettingsError> {
        let field = |name: &str| format!("providers.{}.{name}", self.name);

        if self.name.is_empty() {
            return Err(SettingsError::invalid("providers.name", "must not be empty"));
        }
        if self.get_client_id().filter(|id| !id.is_empty()).is_none() {
            return Err(SettingsError::invalid(field("client_id"), "missing"));
        }
        if self.get_client_secret().filter(|s| !s.is_empty()).is_none() {
            return Err(SettingsError::invalid(field("client_secret"), "missing"));
        }
        if self.scopes.is_empty() {
            return Err(SettingsError::invalid(field("scopes"), "at least one scope required"));
        }
        for (name, endpoint) in [
            ("authorization_endpoint", &self.authorization_endpoint),
            ("token_endpoint", &self.token_endpoint),
        ] {
            let Some(endpoint) = endpoint else {
                return Err(SettingsError::invalid(field(name), "missing"));
            };
            url::Url::parse(endpoint)
                .map_err(|e| SettingsError::invalid(field(name), e.to_string()))?;
        }
        Ok(())
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// A bare domain name: at least two labels, no scheme, port, path or wildcard
fn is_valid_domain_entry(domain: &str) -> bool {
    let domain = domain.trim_start_matches('.');
    domain.contains('.')
        && domain.split('.').all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn clean_env_vars() {
        for var in [
            "SESSION_SECRET",
            "SESSION_DURATION_HOURS",
            "COOKIE_NAME",
            "COOKIE_DOMAINS",
            "COOKIE_HOST_ONLY_SUFFIXES",
            "CONTINUITY_CONFIG_DIR",
            "RUST_LOG",
        ] {
            std::env::remove_var(var);
        }
    }

    fn valid_settings() -> AppSettings {
        let mut settings = AppSettings::default();
        settings.session.session_secret = "a".repeat(MIN_SESSION_SECRET_LEN);
        settings.cookies.registrable_domains = vec!["example.com".to_string()];
        settings
    }

    fn calendar_provider() -> ProviderSettings {
        ProviderSettings {
            name: "google".to_string(),
            authorization_endpoint: Some("https://accounts.google.com/o/oauth2/v2/auth".into()),
            token_endpoint: Some("https://oauth2.googleapis.com/token".into()),
            scopes: vec!["https://www.googleapis.com/auth/calendar.readonly".into()],
            client_id: Some("client".into()),
            client_secret: Some("secret".into()),
            ..ProviderSettings::default()
        }
    }

    #[test]
    fn test_defaults() {
        let settings = AppSettings::default();
        assert_eq!(settings.session.session_duration_hours, 24);
        assert_eq!(settings.csrf.token_ttl_minutes, 60);
        assert_eq!(settings.refresh.periodic_interval_hours, 12);
        assert_eq!(settings.refresh.idle_quiet_minutes, 10);
        assert_eq!(settings.refresh.min_refresh_interval_minutes, 60);
        assert_eq!(settings.pwa.notice_auto_hide_seconds, 5);
        assert!(!settings.pwa.reinstall_requires_reauth);
        assert_eq!(settings.oauth.state_ttl_minutes, 10);
    }

    #[test]
    #[serial]
    fn test_session_secret_env_override() {
        clean_env_vars();

        let mut session_settings = SessionSettings {
            session_secret: "default-secret".to_string(),
            session_duration_hours: 24,
        };
        std::env::set_var("SESSION_SECRET", "env-override-secret");
        std::env::set_var("SESSION_DURATION_HOURS", "48");

        AppSettings::apply_session_env_overrides(&mut session_settings);

        assert_eq!(session_settings.session_secret, "env-override-secret");
        assert_eq!(session_settings.session_duration_hours, 48);

        clean_env_vars();
    }

    #[test]
    #[serial]
    fn test_session_secret_auto_generation() {
        clean_env_vars();

        let mut session_settings = SessionSettings::default();
        AppSettings::apply_session_env_overrides(&mut session_settings);

        // Base64 encoded 32 bytes is 44 characters
        assert_eq!(session_settings.session_secret.len(), 44);
    }

    #[test]
    #[serial]
    fn test_cookie_env_overrides() {
        clean_env_vars();

        let mut cookie_settings = CookieSettings::default();
        std::env::set_var("COOKIE_NAME", "sid");
        std::env::set_var("COOKIE_DOMAINS", "Example.com, example.org");
        std::env::set_var("COOKIE_HOST_ONLY_SUFFIXES", "vercel.app");

        AppSettings::apply_cookie_env_overrides(&mut cookie_settings);

        assert_eq!(cookie_settings.name, "sid");
        assert_eq!(
            cookie_settings.registrable_domains,
            vec!["example.com".to_string(), "example.org".to_string()]
        );
        assert_eq!(cookie_settings.host_only_suffixes, vec!["vercel.app"]);

        clean_env_vars();
    }

    #[test]
    #[serial]
    fn test_logging_level_drives_logger_filter() {
        clean_env_vars();

        let mut logging = LoggingSettings {
            level: "debug".to_string(),
        };
        AppSettings::apply_logging_env_overrides(&mut logging);
        assert_eq!(
            AppSettings::logger_builder(&logging).build().filter(),
            log::LevelFilter::Debug
        );

        std::env::set_var("RUST_LOG", "warn");
        AppSettings::apply_logging_env_overrides(&mut logging);
        assert_eq!(logging.level, "warn");
        assert_eq!(
            AppSettings::logger_builder(&logging).build().filter(),
            log::LevelFilter::Warn
        );

        clean_env_vars();
    }

    #[test]
    fn test_from_file_partial_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[application]
base_url = "https://app.example.com"

[cookies]
registrable_domains = ["example.com"]

[[providers]]
name = "google"
authorization_endpoint = "https://accounts.google.com/o/oauth2/v2/auth"
token_endpoint = "https://oauth2.googleapis.com/token"
scopes = ["calendar.readonly"]
client_id = "id"
client_secret = "secret"
"#
        )
        .unwrap();

        let settings = AppSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.application.base_url, "https://app.example.com");
        assert_eq!(settings.application.port, 8080);
        assert_eq!(settings.cookies.name, "continuity_session");
        assert_eq!(settings.providers.len(), 1);
        assert!(settings.providers[0].enabled);
        assert!(settings.providers[0].use_pkce);
        assert_eq!(settings.redirect_uri(), "https://app.example.com/callback");
    }

    #[test]
    fn test_from_file_rejects_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[application\nport = ").unwrap();
        assert!(matches!(
            AppSettings::from_file(file.path()),
            Err(SettingsError::Parse { .. })
        ));
    }

    #[test]
    fn test_validate_accepts_valid_settings() {
        let mut settings = valid_settings();
        settings.providers.push(calendar_provider());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_short_secret() {
        let mut settings = valid_settings();
        settings.session.session_secret = "short".to_string();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("session.session_secret"));
    }

    #[test]
    fn test_validate_zero_duration() {
        let mut settings = valid_settings();
        settings.refresh.idle_quiet_minutes = 0;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("refresh.idle_quiet_minutes"));
    }

    #[test]
    fn test_validate_caps_durations() {
        let mut settings = valid_settings();
        settings.session.session_duration_hours = MAX_DURATION_HOURS;
        assert!(settings.validate().is_ok());

        settings.session.session_duration_hours = u64::MAX;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("session.session_duration_hours"));

        let mut settings = valid_settings();
        settings.refresh.periodic_interval_hours = u64::MAX / 60;
        assert!(settings.validate().is_err());

        let mut settings = valid_settings();
        settings.refresh.min_refresh_interval_minutes = u64::MAX;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("refresh.min_refresh_interval_minutes"));
    }

    #[test]
    fn test_validate_malformed_domain() {
        let mut settings = valid_settings();
        settings.cookies.registrable_domains = vec!["https://example.com".to_string()];
        assert!(settings.validate().is_err());

        settings.cookies.registrable_domains = vec!["localhost".to_string()];
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_incomplete_provider() {
        let mut settings = valid_settings();
        settings.providers.push(ProviderSettings {
            token_endpoint: None,
            ..calendar_provider()
        });
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("providers.google.token_endpoint"));

        // Disabled providers are not checked
        settings.providers[0].enabled = false;
        assert!(settings.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_provider_credentials_from_env() {
        std::env::set_var("TEST_CALENDAR_CLIENT_ID", "from-env");
        let provider = ProviderSettings {
            client_id_env: Some("TEST_CALENDAR_CLIENT_ID".into()),
            ..calendar_provider()
        };
        assert_eq!(provider.get_client_id().as_deref(), Some("from-env"));
        assert_eq!(provider.get_client_secret().as_deref(), Some("secret"));
        std::env::remove_var("TEST_CALENDAR_CLIENT_ID");
    }
}

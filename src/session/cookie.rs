use actix_web::cookie::{
    time::{Duration, OffsetDateTime},
    Cookie, SameSite,
};
use std::net::IpAddr;

use crate::error::AuthError;
use crate::settings::CookieSettings;

/// Options for cookie creation
#[derive(Debug, Clone)]
pub struct CookieOptions {
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    pub path: String,
    pub max_age: Duration,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            http_only: true,
            secure: true,
            same_site: SameSite::Lax,
            path: "/".to_string(),
            max_age: Duration::hours(24),
        }
    }
}

impl CookieOptions {
    /// Auth cookie options with the given lifetime
    #[must_use]
    pub fn auth(max_age: Duration) -> Self {
        Self {
            max_age,
            ..Self::default()
        }
    }
}

/// How a serving host relates to the configured domain families
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostClass {
    /// The host is a registrable domain itself
    Apex { domain: String },
    /// The host sits under a registrable domain (e.g. `www.`)
    Subdomain { domain: String },
    /// Preview host on a public suffix; the cookie must not leave it
    HostOnly,
    /// Development host (`localhost`, `*.localhost`, loopback IP)
    Loopback,
}

impl HostClass {
    /// The `Domain` attribute for this class, if any
    #[must_use]
    pub fn cookie_domain(&self) -> Option<&str> {
        match self {
            Self::Apex { domain } | Self::Subdomain { domain } => Some(domain),
            Self::HostOnly | Self::Loopback => None,
        }
    }
}

/// Cookie attributes computed for one serving host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSpec {
    pub domain: Option<String>,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    pub max_age: Duration,
}

/// Computes cookie scope from the request host
///
/// Cookies for an apex or any of its subdomains are scoped to the registrable domain so one
/// login covers `example.com`, `www.example.com` and `app.example.com`. Loopback and preview
/// hosts get host-only cookies.
#[derive(Debug, Clone)]
pub struct CookieManager {
    registrable_domains: Vec<String>,
    host_only_suffixes: Vec<String>,
}

impl CookieManager {
    #[must_use]
    pub fn new(registrable_domains: Vec<String>, host_only_suffixes: Vec<String>) -> Self {
        let clean = |list: Vec<String>| {
            list.into_iter()
                .map(|d| d.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect()
        };
        Self {
            registrable_domains: clean(registrable_domains),
            host_only_suffixes: clean(host_only_suffixes),
        }
    }

    #[must_use]
    pub fn from_settings(settings: &CookieSettings) -> Self {
        Self::new(
            settings.registrable_domains.clone(),
            settings.host_only_suffixes.clone(),
        )
    }

    /// Classify a `Host` header value
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnsupportedHost` for empty hosts, non-loopback IP literals and hosts
    /// outside every configured family
    pub fn classify_host(&self, host: &str) -> Result<HostClass, AuthError> {
        let normalized = normalize_host(host)?;

        if normalized == "localhost" || normalized.ends_with(".localhost") {
            return Ok(HostClass::Loopback);
        }
        if let Ok(ip) = normalized.parse::<IpAddr>() {
            return if ip.is_loopback() {
                Ok(HostClass::Loopback)
            } else {
                Err(AuthError::UnsupportedHost(host.to_string()))
            };
        }

        // Longest match wins across both lists
        let registrable = self
            .registrable_domains
            .iter()
            .filter(|d| is_within(&normalized, d))
            .max_by_key(|d| d.len());
        let host_only = self
            .host_only_suffixes
            .iter()
            .filter(|s| normalized.len() > s.len() && is_within(&normalized, s))
            .max_by_key(|s| s.len());

        match (registrable, host_only) {
            (Some(domain), Some(suffix)) if suffix.len() > domain.len() => Ok(HostClass::HostOnly),
            (Some(domain), _) if *domain == normalized => Ok(HostClass::Apex {
                domain: domain.clone(),
            }),
            (Some(domain), _) => Ok(HostClass::Subdomain {
                domain: domain.clone(),
            }),
            (None, Some(_)) => Ok(HostClass::HostOnly),
            (None, None) => Err(AuthError::UnsupportedHost(host.to_string())),
        }
    }

    /// Cookie attributes for `host`
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnsupportedHost` if the host cannot be classified
    pub fn cookie_spec(&self, host: &str, options: &CookieOptions) -> Result<CookieSpec, AuthError> {
        let class = self.classify_host(host)?;
        Ok(CookieSpec {
            domain: class.cookie_domain().map(str::to_string),
            path: options.path.clone(),
            secure: options.secure,
            http_only: options.http_only,
            same_site: options.same_site,
            max_age: options.max_age,
        })
    }

    /// Build a `Set-Cookie` scoped for `host`
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnsupportedHost` if the host cannot be classified
    pub fn build_set_cookie(
        &self,
        name: &str,
        value: &str,
        host: &str,
        options: &CookieOptions,
    ) -> Result<Cookie<'static>, AuthError> {
        let spec = self.cookie_spec(host, options)?;
        log::debug!(
            "Scoping cookie {name} for host {host} to domain {:?}",
            spec.domain
        );
        Ok(build_cookie(name, value.to_owned(), spec))
    }

    /// Build a cookie that removes one previously set with default options for `host`
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnsupportedHost` if the host cannot be classified
    pub fn build_clear_cookie(&self, name: &str, host: &str) -> Result<Cookie<'static>, AuthError> {
        self.build_clear_cookie_with(name, host, &CookieOptions::default())
    }

    /// Build a clearing cookie matching a cookie set with `options`
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UnsupportedHost` if the host cannot be classified
    pub fn build_clear_cookie_with(
        &self,
        name: &str,
        host: &str,
        options: &CookieOptions,
    ) -> Result<Cookie<'static>, AuthError> {
        let spec = CookieSpec {
            max_age: Duration::ZERO,
            ..self.cookie_spec(host, options)?
        };
        let mut cookie = build_cookie(name, String::new(), spec);
        cookie.set_expires(OffsetDateTime::UNIX_EPOCH);
        Ok(cookie)
    }
}

fn build_cookie(name: &str, value: String, spec: CookieSpec) -> Cookie<'static> {
    let mut cookie = Cookie::build(name.to_owned(), value)
        .http_only(spec.http_only)
        .secure(spec.secure)
        .same_site(spec.same_site)
        .path(spec.path)
        .max_age(spec.max_age)
        .finish();
    if let Some(domain) = spec.domain {
        cookie.set_domain(domain);
    }
    cookie
}

/// `host` equals `domain` or is a subdomain of it
fn is_within(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Lowercase, strip port and trailing dot, unwrap IPv6 brackets
///
/// # Errors
///
/// Returns `AuthError::UnsupportedHost` when nothing is left
pub fn normalize_host(host: &str) -> Result<String, AuthError> {
    let trimmed = host.trim().to_ascii_lowercase();

    let without_port = if let Some(rest) = trimmed.strip_prefix('[') {
        rest.split(']').next().unwrap_or_default().to_string()
    } else if trimmed.matches(':').count() == 1 {
        trimmed.split(':').next().unwrap_or_default().to_string()
    } else {
        // Either no port or a bare IPv6 literal
        trimmed
    };

    let normalized = without_port.trim_end_matches('.').to_string();
    if normalized.is_empty() {
        return Err(AuthError::UnsupportedHost(host.to_string()));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> CookieManager {
        CookieManager::new(
            vec!["example.com".into(), "eu.example.com".into()],
            vec!["vercel.app".into()],
        )
    }

    #[test]
    fn test_apex_and_subdomains_share_domain() {
        let manager = manager();
        for host in ["example.com", "www.example.com", "app.example.com:443"] {
            let cookie = manager
                .build_set_cookie("sid", "token", host, &CookieOptions::default())
                .unwrap();
            assert_eq!(cookie.domain(), Some("example.com"), "host {host}");
            assert_eq!(cookie.http_only(), Some(true));
            assert_eq!(cookie.secure(), Some(true));
            assert_eq!(cookie.same_site(), Some(SameSite::Lax));
            assert_eq!(cookie.path(), Some("/"));
        }
    }

    #[test]
    fn test_classify_host() {
        let manager = manager();
        assert_eq!(
            manager.classify_host("Example.COM.").unwrap(),
            HostClass::Apex {
                domain: "example.com".into()
            }
        );
        assert_eq!(
            manager.classify_host("www.example.com").unwrap(),
            HostClass::Subdomain {
                domain: "example.com".into()
            }
        );
        // Longest registrable domain wins
        assert_eq!(
            manager.classify_host("app.eu.example.com").unwrap(),
            HostClass::Subdomain {
                domain: "eu.example.com".into()
            }
        );
        assert_eq!(
            manager.classify_host("my-branch.vercel.app").unwrap(),
            HostClass::HostOnly
        );
        assert_eq!(
            manager.classify_host("localhost:3000").unwrap(),
            HostClass::Loopback
        );
        assert_eq!(
            manager.classify_host("web.localhost").unwrap(),
            HostClass::Loopback
        );
        assert_eq!(
            manager.classify_host("127.0.0.1:8080").unwrap(),
            HostClass::Loopback
        );
        assert_eq!(manager.classify_host("[::1]:8080").unwrap(), HostClass::Loopback);
    }

    #[test]
    fn test_unsupported_hosts() {
        let manager = manager();
        for host in ["", "  ", "10.0.0.7", "evil.com", "notexample.com", "vercel.app"] {
            assert!(
                matches!(
                    manager.classify_host(host),
                    Err(AuthError::UnsupportedHost(_))
                ),
                "host {host:?}"
            );
        }
    }

    #[test]
    fn test_loopback_never_gets_domain() {
        let manager = manager();
        for host in ["localhost", "localhost:3000", "127.0.0.1", "[::1]:3000"] {
            let cookie = manager
                .build_set_cookie("sid", "token", host, &CookieOptions::default())
                .unwrap();
            assert_eq!(cookie.domain(), None, "host {host}");
        }
    }

    #[test]
    fn test_preview_host_is_host_only() {
        let cookie = manager()
            .build_set_cookie("sid", "t", "pr-42.vercel.app", &CookieOptions::default())
            .unwrap();
        assert_eq!(cookie.domain(), None);
    }

    #[test]
    fn test_clear_cookie_mirrors_set_cookie() {
        let manager = manager();
        for host in ["example.com", "www.example.com", "localhost:3000"] {
            let set = manager
                .build_set_cookie("sid", "token", host, &CookieOptions::default())
                .unwrap();
            let clear = manager.build_clear_cookie("sid", host).unwrap();

            assert_eq!(clear.name(), set.name());
            assert_eq!(clear.domain(), set.domain());
            assert_eq!(clear.path(), set.path());
            assert_eq!(clear.secure(), set.secure());
            assert_eq!(clear.http_only(), set.http_only());
            assert_eq!(clear.value(), "");
            assert_eq!(clear.max_age(), Some(Duration::ZERO));
            assert!(clear
                .expires_datetime()
                .is_some_and(|at| at < OffsetDateTime::now_utc()));
        }
    }

    #[test]
    fn test_wire_format() {
        let cookie = manager()
            .build_set_cookie(
                "sid",
                "abc",
                "app.example.com",
                &CookieOptions::auth(Duration::hours(1)),
            )
            .unwrap();
        let header = cookie.to_string();
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("Secure"));
        assert!(header.contains("SameSite=Lax"));
        assert!(header.contains("Domain=example.com"));
        assert!(header.contains("Max-Age=3600"));
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("WWW.Example.com:8443").unwrap(), "www.example.com");
        assert_eq!(normalize_host("example.com.").unwrap(), "example.com");
        assert_eq!(normalize_host("[::1]:443").unwrap(), "::1");
        assert_eq!(normalize_host("::1").unwrap(), "::1");
        assert!(normalize_host(":80").is_err());
    }
}

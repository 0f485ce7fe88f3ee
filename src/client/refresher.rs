// HTTP-backed session refresher used by native companion clients
use actix_web::cookie::Cookie;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::StatusCode;
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

use crate::client::error::RefreshError;
use crate::client::scheduler::SessionRefresher;
use crate::store::lock;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Calls `POST {base_url}/refresh` with the session cookie
///
/// Holds exactly one session token. Each successful refresh replaces it with the token the
/// server sets, whatever `Domain` the server scopes that cookie to.
pub struct HttpSessionRefresher {
    client: reqwest::Client,
    refresh_url: Url,
    cookie_name: String,
    token: Mutex<String>,
}

impl HttpSessionRefresher {
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a valid URL or the HTTP client cannot be built
    pub fn new(base_url: &str, cookie_name: &str, session_token: &str) -> Result<Self> {
        let mut base =
            Url::parse(base_url).with_context(|| format!("Invalid base URL: {base_url}"))?;
        // Keep any path prefix (e.g. https://host/api) when joining
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let refresh_url = base.join("refresh").context("Failed to build refresh URL")?;

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            refresh_url,
            cookie_name: cookie_name.to_string(),
            token: Mutex::new(session_token.to_string()),
        })
    }

    /// Token presented on the next refresh
    #[must_use]
    pub fn session_token(&self) -> String {
        lock(&self.token).clone()
    }

    #[must_use]
    pub fn refresh_url(&self) -> &Url {
        &self.refresh_url
    }

    /// Adopt the session token from the response's `Set-Cookie` headers, if any
    fn store_rotated_token(&self, response: &reqwest::Response) {
        let rotated = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| Cookie::parse(value).ok())
            .filter(|cookie| cookie.name() == self.cookie_name && !cookie.value().is_empty())
            // The last matching Set-Cookie wins
            .next_back();

        if let Some(cookie) = rotated {
            *lock(&self.token) = cookie.value().to_string();
            log::debug!("Stored rotated session token");
        }
    }
}

#[async_trait]
impl SessionRefresher for HttpSessionRefresher {
    async fn refresh_session(&self) -> Result<(), RefreshError> {
        let cookie = format!("{}={}", self.cookie_name, self.session_token());
        let response = self
            .client
            .post(self.refresh_url.clone())
            .header(COOKIE, cookie)
            .send()
            .await
            .map_err(|e| RefreshError::Transient(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                self.store_rotated_token(&response);
                Ok(())
            }
            StatusCode::UNAUTHORIZED => Err(RefreshError::SessionInvalid),
            status => Err(RefreshError::Transient(format!(
                "unexpected refresh status {status}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn refresher_for(server: &MockServer) -> HttpSessionRefresher {
        HttpSessionRefresher::new(&server.uri(), "continuity_session", "token-1").unwrap()
    }

    #[tokio::test]
    async fn test_successful_refresh_sends_cookie() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/refresh"))
            .and(header("cookie", "continuity_session=token-1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(refresher_for(&server).await.refresh_session().await, Ok(()));
    }

    #[tokio::test]
    async fn test_unauthorized_is_definitive() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/refresh"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(
            refresher_for(&server).await.refresh_session().await,
            Err(RefreshError::SessionInvalid)
        );
    }

    #[tokio::test]
    async fn test_server_errors_are_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/refresh"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        assert!(matches!(
            refresher_for(&server).await.refresh_session().await,
            Err(RefreshError::Transient(_))
        ));
    }

    #[tokio::test]
    async fn test_network_failure_is_transient() {
        let refresher =
            HttpSessionRefresher::new("http://127.0.0.1:1", "continuity_session", "t").unwrap();
        assert!(matches!(
            refresher.refresh_session().await,
            Err(RefreshError::Transient(_))
        ));
    }

    #[tokio::test]
    async fn test_rotated_domain_cookie_replaces_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/refresh"))
            .and(header("cookie", "continuity_session=token-1"))
            .respond_with(ResponseTemplate::new(200).insert_header(
                "set-cookie",
                "continuity_session=token-2; Domain=example.com; Path=/; HttpOnly; Secure",
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/refresh"))
            .and(header("cookie", "continuity_session=token-2"))
            .respond_with(ResponseTemplate::new(200).insert_header(
                "set-cookie",
                "continuity_session=token-3; Domain=example.com; Path=/",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let refresher = refresher_for(&server).await;
        assert_eq!(refresher.refresh_session().await, Ok(()));
        assert_eq!(refresher.session_token(), "token-2");
        assert_eq!(refresher.refresh_session().await, Ok(()));
        assert_eq!(refresher.session_token(), "token-3");
    }

    #[tokio::test]
    async fn test_unrelated_cookies_keep_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/refresh"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("set-cookie", "theme=dark; Path=/"),
            )
            .mount(&server)
            .await;

        let refresher = refresher_for(&server).await;
        assert_eq!(refresher.refresh_session().await, Ok(()));
        assert_eq!(refresher.session_token(), "token-1");
    }

    #[tokio::test]
    async fn test_base_path_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/refresh"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let refresher = HttpSessionRefresher::new(
            &format!("{}/api", server.uri()),
            "continuity_session",
            "token-1",
        )
        .unwrap();
        assert_eq!(refresher.refresh_url().path(), "/api/refresh");
        assert_eq!(refresher.refresh_session().await, Ok(()));

        let trailing =
            HttpSessionRefresher::new("https://app.example.com/", "continuity_session", "t")
                .unwrap();
        assert_eq!(trailing.refresh_url().as_str(), "https://app.example.com/refresh");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(HttpSessionRefresher::new("not a url", "sid", "t").is_err());
    }
}

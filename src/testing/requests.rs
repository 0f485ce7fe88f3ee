//! HTTP request builders for testing handlers

use actix_web::cookie::Cookie;
use actix_web::http::Method;
use actix_web::test;

use super::constants::TEST_HOST;
use crate::models::{Session, UserIdentity};
use crate::session::SessionManager;

/// Builder for requests addressed to the test host
pub struct RequestBuilder {
    method: Method,
    uri: String,
    host: String,
    headers: Vec<(String, String)>,
    cookies: Vec<Cookie<'static>>,
}

impl RequestBuilder {
    #[must_use]
    pub fn new(method: Method, uri: &str) -> Self {
        Self {
            method,
            uri: uri.to_string(),
            host: TEST_HOST.to_string(),
            headers: Vec::new(),
            cookies: Vec::new(),
        }
    }

    #[must_use]
    pub fn get(uri: &str) -> Self {
        Self::new(Method::GET, uri)
    }

    #[must_use]
    pub fn post(uri: &str) -> Self {
        Self::new(Method::POST, uri)
    }

    #[must_use]
    pub fn delete(uri: &str) -> Self {
        Self::new(Method::DELETE, uri)
    }

    /// Address the request to another host (e.g. `localhost:3000`)
    #[must_use]
    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn with_cookie(mut self, cookie: Cookie<'static>) -> Self {
        self.cookies.push(cookie);
        self
    }

    /// Add the session cookie the manager would read
    #[must_use]
    pub fn with_session(self, sessions: &SessionManager, session: &Session) -> Self {
        self.with_cookie(Cookie::new(
            sessions.cookie_name().to_string(),
            session.token.clone(),
        ))
    }

    /// Add a freshly issued CSRF token for `identity` in the default header
    #[must_use]
    pub fn with_csrf(self, sessions: &SessionManager, identity: &UserIdentity) -> Self {
        let token = sessions.issue_csrf(identity);
        self.header("X-CSRF-Token", &token.value)
    }

    /// Finish into an `actix_web::test::TestRequest`
    #[must_use]
    pub fn build(self) -> test::TestRequest {
        let mut req = test::TestRequest::default()
            .method(self.method)
            .uri(&self.uri)
            .insert_header(("Host", self.host));
        for (name, value) in self.headers {
            req = req.insert_header((name, value));
        }
        for cookie in self.cookies {
            req = req.cookie(cookie);
        }
        req
    }
}

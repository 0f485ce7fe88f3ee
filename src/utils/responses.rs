//! HTTP response handling
//!
//! A unified interface for creating HTTP responses across the service: JSON error bodies,
//! redirects carrying cookies or error flags, and JSON success payloads.

use actix_web::{cookie::Cookie, http::header, http::StatusCode, HttpResponse};
use serde_json::json;

/// Pre-serialized bodies for the errors handlers return most often
static CACHED_RESPONSES: std::sync::LazyLock<CachedResponses> =
    std::sync::LazyLock::new(CachedResponses::new);

struct CachedResponses {
    unauthorized: String,
    invalid_request: String,
    server_error: String,
}

impl CachedResponses {
    fn new() -> Self {
        Self {
            unauthorized: Self::create_json(
                "unauthenticated",
                "Authentication is required to access this resource",
            ),
            invalid_request: Self::create_json(
                "invalid_request",
                "The request is malformed or invalid",
            ),
            server_error: Self::create_json("server_error", "An internal server error occurred"),
        }
    }

    fn create_json(error: &str, message: &str) -> String {
        json!({ "error": error, "message": message }).to_string()
    }

    fn respond(status: StatusCode, body: &str) -> HttpResponse {
        HttpResponse::build(status)
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .body(body.to_owned())
    }
}

/// Unified response builder
pub struct ResponseBuilder;

impl ResponseBuilder {
    /// Error response with an arbitrary status code
    #[must_use]
    pub fn error(status: StatusCode) -> ErrorResponseBuilder {
        ErrorResponseBuilder::new(status)
    }

    /// `Unauthorized` (401) error response
    #[must_use]
    pub fn unauthorized() -> ErrorResponseBuilder {
        ErrorResponseBuilder::new(StatusCode::UNAUTHORIZED)
    }

    /// Redirect response (302 Found)
    #[must_use]
    pub fn redirect(location: &str) -> RedirectBuilder {
        RedirectBuilder::new(location)
    }

    /// OK (200) JSON response
    #[must_use]
    pub fn ok() -> JsonResponseBuilder {
        JsonResponseBuilder::new()
    }
}

/// Builder for error responses with fluent interface
pub struct ErrorResponseBuilder {
    status: StatusCode,
    error_code: Option<String>,
    message: Option<String>,
    cookies: Vec<Cookie<'static>>,
}

impl ErrorResponseBuilder {
    fn new(status: StatusCode) -> Self {
        Self {
            status,
            error_code: None,
            message: None,
            cookies: Vec::new(),
        }
    }

    /// Set a custom error code (e.g. `csrf_mismatch`)
    #[must_use]
    pub fn with_error_code(mut self, code: &str) -> Self {
        self.error_code = Some(code.to_string());
        self
    }

    /// Set a custom error message
    #[must_use]
    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }

    /// Attach a cookie, e.g. a clearing cookie on a hard logout
    #[must_use]
    pub fn with_cookie(mut self, cookie: Cookie<'static>) -> Self {
        self.cookies.push(cookie);
        self
    }

    /// Build the final `HttpResponse`
    #[must_use]
    pub fn build(self) -> HttpResponse {
        if self.error_code.is_none() && self.message.is_none() && self.cookies.is_empty() {
            if let Some(response) = self.cached_response() {
                return response;
            }
        }

        let body = json!({
            "error": self.error_code.unwrap_or_else(|| default_error_code(self.status).to_string()),
            "message": self.message.unwrap_or_else(|| {
                self.status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            }),
        });

        let mut builder = HttpResponse::build(self.status);
        for cookie in self.cookies {
            builder.cookie(cookie);
        }
        builder.json(body)
    }

    fn cached_response(&self) -> Option<HttpResponse> {
        let body = match self.status {
            StatusCode::UNAUTHORIZED => &CACHED_RESPONSES.unauthorized,
            StatusCode::BAD_REQUEST => &CACHED_RESPONSES.invalid_request,
            StatusCode::INTERNAL_SERVER_ERROR => &CACHED_RESPONSES.server_error,
            _ => return None,
        };
        Some(CachedResponses::respond(self.status, body))
    }
}

fn default_error_code(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "invalid_request",
        StatusCode::UNAUTHORIZED => "unauthenticated",
        StatusCode::FORBIDDEN => "forbidden",
        StatusCode::NOT_FOUND => "not_found",
        StatusCode::BAD_GATEWAY => "bad_gateway",
        StatusCode::SERVICE_UNAVAILABLE => "service_unavailable",
        _ => "server_error",
    }
}

/// Builder for redirect responses
pub struct RedirectBuilder {
    location: String,
    cookies: Vec<Cookie<'static>>,
}

impl RedirectBuilder {
    fn new(location: &str) -> Self {
        Self {
            location: location.to_string(),
            cookies: Vec::new(),
        }
    }

    /// Add a cookie to the redirect response
    #[must_use]
    pub fn with_cookie(mut self, cookie: Cookie<'static>) -> Self {
        self.cookies.push(cookie);
        self
    }

    /// Append a URL-encoded query parameter to the redirect location
    #[must_use]
    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        let separator = if self.location.contains('?') { '&' } else { '?' };
        self.location = format!(
            "{}{separator}{key}={}",
            self.location,
            urlencoding::encode(value)
        );
        self
    }

    /// Add an error flag to the redirect URL
    #[must_use]
    pub fn with_error(self, error_code: &str) -> Self {
        self.with_query("error", error_code)
    }

    /// Build the final redirect response
    #[must_use]
    pub fn build(self) -> HttpResponse {
        let mut builder = HttpResponse::Found();
        for cookie in self.cookies {
            builder.cookie(cookie);
        }
        builder
            .insert_header((header::LOCATION, self.location))
            .finish()
    }
}

/// Builder for JSON success responses
pub struct JsonResponseBuilder {
    cookies: Vec<Cookie<'static>>,
}

impl JsonResponseBuilder {
    fn new() -> Self {
        Self {
            cookies: Vec::new(),
        }
    }

    /// Attach a cookie to the response
    #[must_use]
    pub fn with_cookie(mut self, cookie: Cookie<'static>) -> Self {
        self.cookies.push(cookie);
        self
    }

    /// Build the response with JSON content
    #[must_use]
    pub fn json<T: serde::Serialize>(self, data: &T) -> HttpResponse {
        let mut builder = HttpResponse::Ok();
        for cookie in self.cookies {
            builder.cookie(cookie);
        }
        builder.json(data)
    }
}

//! HTTP transport to the gateway.
//!
//! The [`Transport`] trait is the seam everything above talks through:
//! the real [`HttpTransport`] in production, an in-memory fake in tests.
//! A transport returns the raw body text; interpreting it is the caller's
//! job (see [`crate::extract`]).

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::TransportError;
use crate::types::Session;

/// Local cap on any single request. The gateway holds a long-poll open for
/// up to 30 s server-side; this leaves slack on top of that.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(40);

// ─── Trait ────────────────────────────────────────────────────────────────────

/// Issues GET/POST requests against the gateway, attaching the session
/// headers when a session is supplied.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// GET `path`, returning the response body on a success status.
    async fn get(&self, path: &str, session: Option<&Session>)
        -> Result<String, TransportError>;

    /// POST a JSON `body` to `path`, returning the response body.
    async fn post(&self, path: &str, body: String, session: Option<&Session>)
        -> Result<String, TransportError>;
}

// ─── HttpTransport ────────────────────────────────────────────────────────────

/// The production transport, backed by a pooled [`reqwest::Client`].
///
/// Connections and body streams are released on every exit path — success,
/// HTTP error, or cancellation — by the client's RAII handles.
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// `base_url` is the gateway origin, e.g. `http://localhost:8080`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self { http, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_session(
        req: reqwest::RequestBuilder,
        session: Option<&Session>,
    ) -> reqwest::RequestBuilder {
        match session {
            Some(s) => req
                .header("X-Phone", &s.phone)
                .header("X-Session-Data", &s.token),
            None => req,
        }
    }

    async fn read_body(resp: reqwest::Response) -> Result<String, TransportError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str, session: Option<&Session>)
        -> Result<String, TransportError>
    {
        let req = Self::apply_session(self.http.get(self.url(path)), session);
        let resp = req.send().await?;
        Self::read_body(resp).await
    }

    async fn post(&self, path: &str, body: String, session: Option<&Session>)
        -> Result<String, TransportError>
    {
        let req = Self::apply_session(self.http.post(self.url(path)), session)
            .header("Content-Type", "application/json")
            .body(body);
        let resp = req.send().await?;
        Self::read_body(resp).await
    }
}

//! One page load under one outbound identity.
//!
//! The orchestrator owns retries and identity rotation; a [`PageLoader`] only
//! performs a single navigation and classifies its failure.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, COOKIE};
use reqwest::StatusCode;
use thiserror::Error;
use tokio::time::{timeout_at, Instant};
use url::Url;

use crate::config::MAX_PAGE_BYTES;
use crate::identity::ProxyDescriptor;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGES: &str = "it-IT,it;q=0.9,en-US;q=0.8,en;q=0.7";

#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub url: Url,
    pub user_agent: String,
    pub proxy: Option<ProxyDescriptor>,
    /// Value of the session-scoped `session_id` cookie.
    pub session_cookie: String,
    /// Navigation deadline measured from the start of the request.
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct LoadedPage {
    pub final_url: Url,
    pub status: u16,
    pub html: String,
    /// The deadline hit while the body was still streaming.
    pub partial: bool,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("navigation timed out after {0:?}")]
    Timeout(Duration),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("{0}")]
    Fatal(String),
}

impl LoadError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, LoadError::Fatal(_))
    }
}

#[async_trait]
pub trait PageLoader: Send + Sync {
    async fn load(&self, request: &LoadRequest) -> Result<LoadedPage, LoadError>;
}

/// Random hex value for the per-attempt session cookie.
pub fn session_cookie() -> String {
    let mut rng = rand::thread_rng();
    (0..16).map(|_| format!("{:02x}", rng.gen::<u8>())).collect()
}

// ---------------------------------------------------------------------------
// HTTP loader
// ---------------------------------------------------------------------------

/// Plain HTTP navigation. Only the document is requested, never its images,
/// stylesheets, fonts or media.
#[derive(Debug, Default, Clone)]
pub struct HttpPageLoader;

impl HttpPageLoader {
    pub fn new() -> Self {
        Self
    }

    fn client_for(&self, request: &LoadRequest) -> Result<reqwest::Client, LoadError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(request.user_agent.as_str())
            .gzip(true)
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(proxy) = &request.proxy {
            let mut p = reqwest::Proxy::all(proxy.server.as_str())
                .map_err(|e| LoadError::Fatal(format!("invalid proxy {}: {e}", proxy.server)))?;
            if let (Some(user), Some(pass)) = (&proxy.username, &proxy.password) {
                p = p.basic_auth(user, pass);
            }
            builder = builder.proxy(p);
        }

        builder
            .build()
            .map_err(|e| LoadError::Fatal(format!("HTTP client setup failed: {e}")))
    }
}

#[async_trait]
impl PageLoader for HttpPageLoader {
    async fn load(&self, request: &LoadRequest) -> Result<LoadedPage, LoadError> {
        let client = self.client_for(request)?;
        let deadline = Instant::now() + request.timeout;

        let send = client
            .get(request.url.clone())
            .header(ACCEPT, ACCEPT_HTML)
            .header(ACCEPT_LANGUAGE, ACCEPT_LANGUAGES)
            .header(COOKIE, format!("session_id={}", request.session_cookie))
            .send();

        let mut response = match timeout_at(deadline, send).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(map_transport_error(e, request.timeout)),
            Err(_) => return Err(LoadError::Timeout(request.timeout)),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(LoadError::Status(status.as_u16()));
        }
        let final_url = response.url().clone();

        let mut body = Vec::new();
        let mut partial = false;
        loop {
            match timeout_at(deadline, response.chunk()).await {
                Ok(Ok(Some(chunk))) => {
                    body.extend_from_slice(&chunk);
                    if body.len() >= MAX_PAGE_BYTES {
                        body.truncate(MAX_PAGE_BYTES);
                        partial = true;
                        break;
                    }
                }
                Ok(Ok(None)) => break,
                Ok(Err(e)) if body.is_empty() => return Err(map_transport_error(e, request.timeout)),
                Ok(Err(_)) => {
                    partial = true;
                    break;
                }
                // Headers arrived in time; whatever streamed so far is used.
                Err(_) => {
                    partial = true;
                    break;
                }
            }
        }

        Ok(LoadedPage {
            final_url,
            status: status.as_u16(),
            html: String::from_utf8_lossy(&body).into_owned(),
            partial,
        })
    }
}

fn map_transport_error(error: reqwest::Error, timeout: Duration) -> LoadError {
    if error.is_timeout() {
        LoadError::Timeout(timeout)
    } else if error.is_builder() {
        LoadError::Fatal(error.to_string())
    } else if error.is_decode() || error.is_body() || error.is_redirect() {
        LoadError::Protocol(error.to_string())
    } else {
        LoadError::Navigation(error.to_string())
    }
}

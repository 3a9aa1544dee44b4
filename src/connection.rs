// Session cookies, CSRF token and client settings.
use crate::credentials::{AssessmentCredentials, ClientConfig};
use crate::error::{GradingError, Result};

// Lazily initialized global semaphore capping concurrent requests.
use lazy_static::lazy_static;
use std_semaphore::Semaphore;

// Blocking HTTP transport. Multipart forms carry rubric file uploads.
use reqwest::blocking::multipart::Form;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{COOKIE, REFERER};

use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The maximum number of simultaneous HTTP requests allowed.
///
/// Shared by every client in the process, so a page firing many loads at once cannot
/// flood the grading API.
const SIMULTANEOUS_REQUESTS_LIMIT: isize = 20;

/// Header carrying the double-submit CSRF token.
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// HTTP methods used by the grading API, with their request bodies.
pub enum HttpMethod {
    Get,
    Post(serde_json::Value),
    Put(serde_json::Value),
    Delete,
    Multipart(Form),
}

impl HttpMethod {
    fn name(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post(_) | HttpMethod::Multipart(_) => "POST",
            HttpMethod::Put(_) => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Everything but GET changes server state and must carry the CSRF token.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, HttpMethod::Get)
    }
}

// Global semaphore for managing simultaneous HTTP requests, sized by
// `SIMULTANEOUS_REQUESTS_LIMIT`.
lazy_static! {
    static ref SEMAPHORE: Semaphore = Semaphore::new(SIMULTANEOUS_REQUESTS_LIMIT);
}

/// Lets a caller abandon requests it no longer cares about.
///
/// Once cancelled, requests that have not been dispatched fail immediately and responses
/// of requests already in flight are dropped instead of being decoded. The blocking
/// transport cannot interrupt a socket read; the configured timeout bounds that wait.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(GradingError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Builds the blocking HTTP client with the configured timeout and user agent.
///
/// Returns:
/// - `Err(GradingError::Network)` if the TLS backend cannot be initialized.
pub fn build_client(config: &ClientConfig) -> Result<Client> {
    let mut builder = Client::builder().user_agent(config.user_agent.clone());
    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(GradingError::from)
}

fn build_request(
    client: &Client,
    method: HttpMethod,
    url: &str,
    credentials: &AssessmentCredentials,
    params: &[(String, String)],
) -> RequestBuilder {
    let mutating = method.is_mutating();
    let mut request = match method {
        HttpMethod::Get => client.get(url).query(params),
        HttpMethod::Post(body) => client.post(url).json(&body),
        HttpMethod::Put(body) => client.put(url).json(&body),
        HttpMethod::Delete => client.delete(url).query(params),
        HttpMethod::Multipart(form) => client.post(url).multipart(form),
    };
    if let Some(cookies) = credentials.cookie_header() {
        request = request.header(COOKIE, cookies);
    }
    if mutating {
        if let Some(token) = &credentials.csrf_token {
            request = request
                .header(CSRF_HEADER, token.as_str())
                .header(REFERER, credentials.url_grading.as_str());
        }
    }
    request
}

/// Turns a non-2xx response body into the message shown to the user.
///
/// The server reports failures as a JSON object with an `error` or `detail` string.
/// Anything else falls back to the status line.
pub fn error_message(status: u16, reason: &str, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["error", "detail"]
                .iter()
                .find_map(|key| value.get(*key).and_then(|v| v.as_str()).map(String::from))
        })
        .unwrap_or_else(|| format!("HTTP {}: {}", status, reason))
}

/// Sends a single HTTP request and returns the response if its status is 2xx.
///
/// The session cookie is attached to every request. POST, PUT and DELETE also carry the
/// CSRF token and a `Referer`. Failures are never retried here; the caller decides whether
/// to try again.
///
/// Arguments:
/// - `client`: Blocking client built by [`build_client`].
/// - `method`: HTTP method together with its body.
/// - `url`: Full endpoint URL.
/// - `credentials`: Session cookie and CSRF token.
/// - `params`: Query parameters, used by GET and DELETE.
/// - `cancel`: Token checked before dispatch and again when the response arrives.
///
/// Returns:
/// - `Ok(Response)` for 2xx statuses.
/// - `Err(GradingError::Api)` with the decoded `error`/`detail` message otherwise,
///   `Err(GradingError::Network)` on transport failures and `Err(GradingError::Cancelled)`
///   once `cancel` fires.
pub fn send_http_request(
    client: &Client,
    method: HttpMethod,
    url: &str,
    credentials: &AssessmentCredentials,
    params: Vec<(String, String)>,
    cancel: &CancelToken,
) -> Result<Response> {
    cancel.check()?;
    let _guard = SEMAPHORE.access();
    let method_name = method.name();
    log::debug!("{} {}", method_name, url);

    let response = build_request(client, method, url, credentials, &params).send()?;

    if cancel.is_cancelled() {
        log::warn!("{} {} finished after cancellation, dropping response", method_name, url);
        return Err(GradingError::Cancelled);
    }

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let reason = status.canonical_reason().unwrap_or("Unknown").to_string();
    let body = response.text().unwrap_or_default();
    let message = error_message(status.as_u16(), &reason, &body);
    log::warn!("{} {} failed with {}: {}", method_name, url, status, message);
    Err(GradingError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Decodes a successful response body into `T`.
pub fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let text = response.text()?;
    Ok(serde_json::from_str(&text)?)
}

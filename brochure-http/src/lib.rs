//! Minimal HTTP client with safe logging, optional retries, and flexible auth.
//!
//! - Request options: headers, `Auth`, query params, timeout, retries
//! - JSON, plain-text, and streaming-body helpers over one request core
//! - Redacts sensitive query params and never logs secret values
//! - Retries 429/5xx only when a retry budget is configured (default: none)
//! - Optional *raw* request/response logging via `BROCHURE_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```rust
//! # async fn demo() -> Result<(), brochure_http::HttpError> {
//! let client = brochure_http::HttpClient::new("https://api.example.com")?;
//! let body = client
//!     .get_text("about", brochure_http::RequestOpts::default())
//!     .await?;
//! assert!(!body.is_empty());
//! # Ok(()) }
//! ```
//!
//! Security: `Auth::Bearer` values are sanitized before use, and logs only
//! ever include the auth kind (bearer/header/none), not the secret.

use bytes::Bytes;
use encoding_rs::{Encoding, UTF_8};
use futures::{Stream, TryStreamExt};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::env;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;

pub use reqwest::StatusCode;
pub use reqwest::header;

// ==============================
// Raw logging toggles
// ==============================

const RAW_ENV: &str = "BROCHURE_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;
const SNIPPET_MAX: usize = 500;

static REQUEST_SEQ: AtomicU64 = AtomicU64::new(1);

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

fn next_request_id() -> String {
    format!("r{:06}", REQUEST_SEQ.fetch_add(1, Ordering::Relaxed))
}

/// Render a best-effort curl command for repro/debug. Secret query values and
/// auth headers are redacted.
fn make_curl(method: &Method, url: &Url, headers: &HeaderMap, body: Option<&[u8]>) -> String {
    let mut parts = vec!["curl".to_string(), format!("-X{}", method)];
    for (name, val) in redact_headers(headers) {
        parts.push(format!("-H '{}: {}'", name, val.replace('\'', r"'\''")));
    }
    if let Some(bytes) = body {
        match std::str::from_utf8(bytes) {
            Ok(s) => {
                let s = truncate_on_char_boundary(s, RAW_MAX_BODY);
                parts.push(format!("-d '{}'", s.replace('\'', r"'\''")));
            }
            Err(_) => parts.push(format!("--data-binary @- # ({} bytes)", bytes.len())),
        }
    }
    let mut shown = url.clone();
    let pairs = redact_query_pairs(url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())));
    if pairs.is_empty() {
        shown.set_query(None);
    } else {
        shown.query_pairs_mut().clear().extend_pairs(pairs);
    }
    parts.push(format!("'{}'", shown.as_str()));
    parts.join(" ")
}

fn is_secret_header(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "authorization" | "x-api-key" | "api-key" | "cookie"
    )
}

fn is_secret_param(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "access_token"
            | "authorization"
            | "auth"
            | "key"
            | "api_key"
            | "token"
            | "secret"
            | "client_secret"
            | "bearer"
    )
}

fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let val = if is_secret_header(&key) {
                "<redacted>".to_string()
            } else {
                v.to_str().unwrap_or("").to_string()
            };
            (key, val)
        })
        .collect()
}

fn redact_query_pairs(pairs: impl Iterator<Item = (String, String)>) -> Vec<(String, String)> {
    pairs
        .map(|(k, v)| {
            if is_secret_param(&k) {
                (k, "<redacted>".to_string())
            } else {
                (k, v)
            }
        })
        .collect()
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}, request_id={request_id}")]
    Api {
        status: StatusCode,
        message: String,
        request_id: String,
    },
}

// ==============================
// Auth & Request Options
// ==============================

/// Authentication strategies supported by the HTTP client helpers.
///
/// ```
/// use brochure_http::Auth;
///
/// let bearer = Auth::Bearer("token");
/// match bearer {
///     Auth::Bearer(value) => assert_eq!(value, "token"),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Clone, Debug)]
pub enum Auth<'a> {
    /// Authorization: Bearer <token>
    Bearer(&'a str),
    /// Custom header (e.g., Anthropic: x-api-key)
    Header {
        name: HeaderName,
        value: HeaderValue,
    },
    None,
}

/// Per-request tuning knobs for the HTTP client.
///
/// ```
/// use brochure_http::RequestOpts;
/// use std::borrow::Cow;
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(10)),
///     retries: Some(0),
///     query: Some(vec![("lang", Cow::Borrowed("en"))]),
///     ..Default::default()
/// };
///
/// assert_eq!(opts.timeout.unwrap().as_secs(), 10);
/// assert!(!opts.allow_absolute);
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    pub auth: Option<Auth<'a>>,
    pub headers: Option<HeaderMap>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>,
    /// If true and `path` is an absolute URL, use it as-is (ignore base).
    pub allow_absolute: bool,
}

/// Response body delivered chunk by chunk, in arrival order.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, HttpError>> + Send>>;

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct HttpClient {
    base: Option<Url>,
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

/// A request with URL, body and auth resolved, ready to be (re)sent.
struct Prepared<'a> {
    method: Method,
    url: Url,
    body: Option<Vec<u8>>,
    query: Vec<(&'a str, Cow<'a, str>)>,
    headers: HeaderMap,
    bearer: Option<String>,
    auth_kind: &'static str,
    timeout: Option<Duration>,
    retries: usize,
}

impl Prepared<'_> {
    fn builder(&self, client: &Client) -> RequestBuilder {
        let mut rb = client.request(self.method.clone(), self.url.clone());
        if let Some(timeout) = self.timeout {
            rb = rb.timeout(timeout);
        }
        if !self.query.is_empty() {
            let pairs: Vec<(&str, &str)> =
                self.query.iter().map(|(k, v)| (*k, v.as_ref())).collect();
            rb = rb.query(&pairs);
        }
        rb = rb.headers(self.headers.clone());
        if let Some(tok) = &self.bearer {
            rb = rb.bearer_auth(tok);
        }
        if let Some(bytes) = &self.body {
            rb = rb
                .header(CONTENT_TYPE, "application/json")
                .body(bytes.clone());
        }
        rb
    }

    fn log_start(&self, req_id: &str, attempt: usize) {
        let redacted_q = redact_query_pairs(
            self.query
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.as_ref().to_string())),
        );
        tracing::debug!(
            req_id=%req_id,
            attempt,
            max_retries=self.retries,
            method=%self.method,
            host_path=%format!("{}{}", self.url.host_str().unwrap_or("-"), self.url.path()),
            query=?redacted_q,
            timeout_ms=?self.timeout.map(|t| t.as_millis() as u64),
            auth_kind=self.auth_kind,
            has_body=%self.body.is_some(),
            "http.request.start"
        );

        if raw_enabled() {
            let curl = make_curl(&self.method, &self.url, &self.headers, self.body.as_deref());
            tracing::debug!(target: "http.raw", %req_id, %curl, "request");
        }
    }
}

/// Fully buffered response.
struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    bytes: Bytes,
    req_id: String,
}

impl HttpClient {
    /// Construct a client anchored to a base URL.
    ///
    /// ```no_run
    /// use brochure_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://api.example.com")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// assert_eq!(client.max_retries, 0);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        let mut client = Self::detached()?;
        client.base = Some(base);
        Ok(client)
    }

    /// Construct a client with no base URL; every path must be absolute.
    ///
    /// ```no_run
    /// use brochure_http::{HttpClient, HttpError};
    ///
    /// let client = HttpClient::detached()?;
    /// assert!(client.base().is_none());
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn detached() -> Result<Self, HttpError> {
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base: None,
            inner,
            default_timeout: Duration::from_secs(15),
            max_retries: 0,
        })
    }

    pub fn base(&self) -> Option<&Url> {
        self.base.as_ref()
    }

    /// Override the default timeout for buffered requests.
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    /// Override the default retry budget (429/5xx and transport errors).
    ///
    /// ```no_run
    /// use brochure_http::{HttpClient, HttpError};
    ///
    /// let client = HttpClient::new("https://api.example.com")?.with_retries(3);
    /// assert_eq!(client.max_retries, 3);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    /// POST JSON using optional Bearer auth.
    pub async fn post_json<B, T>(
        &self,
        path: &str,
        bearer: Option<&str>,
        body: &B,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let opts = RequestOpts {
            auth: bearer.map(Auth::Bearer),
            ..Default::default()
        };
        self.post_json_opts(path, body, opts).await
    }

    /// POST JSON with per-request options.
    pub async fn post_json_opts<B, T>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let prepared =
            self.prepare(Method::POST, path, Some(body), opts, Some(self.default_timeout))?;
        let raw = self.execute(&prepared).await?;
        decode_json(&raw)
    }

    /// GET a document and return its body as text, decoded with the
    /// `Content-Type` charset (UTF-8 when absent or unknown). A byte-order
    /// mark overrides the declared charset.
    pub async fn get_text(&self, path: &str, opts: RequestOpts<'_>) -> Result<String, HttpError> {
        let prepared =
            self.prepare::<()>(Method::GET, path, None, opts, Some(self.default_timeout))?;
        let raw = self.execute(&prepared).await?;
        Ok(decode_text(&raw.bytes, &raw.headers))
    }

    /// POST JSON and hand back the response body as a chunk stream.
    ///
    /// The request is sent once (no retries) and has no overall timeout
    /// unless `opts.timeout` sets one. Non-2xx statuses are buffered and
    /// returned as [`HttpError::Api`] before any chunk is yielded.
    pub async fn post_json_stream<B>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<ByteStream, HttpError>
    where
        B: Serialize + ?Sized,
    {
        let prepared = self.prepare(Method::POST, path, Some(body), opts, None)?;
        let req_id = next_request_id();
        prepared.log_start(&req_id, 1);

        let resp = prepared.builder(&self.inner).send().await.map_err(|err| {
            tracing::warn!(req_id=%req_id, message=%err, "http.network_error.stream_send");
            HttpError::Network(err.to_string())
        })?;

        let status = resp.status();
        let request_id = response_request_id(resp.headers());
        tracing::debug!(req_id=%req_id, %status, x_request_id=%request_id, "http.stream.open");

        if !status.is_success() {
            let bytes = resp
                .bytes()
                .await
                .map_err(|e| HttpError::Network(e.to_string()))?;
            let message = extract_error_message(&bytes);
            tracing::warn!(req_id=%req_id, %status, message=%message, "http.stream.error");
            return Err(HttpError::Api {
                status,
                message,
                request_id,
            });
        }

        Ok(Box::pin(
            resp.bytes_stream()
                .map_err(|e| HttpError::Network(e.to_string())),
        ))
    }

    // ==============================
    // Core request implementation
    // ==============================

    fn resolve(&self, path: &str, allow_absolute: bool) -> Result<Url, HttpError> {
        match &self.base {
            Some(base) => {
                if allow_absolute {
                    if let Ok(abs) = Url::parse(path) {
                        return Ok(abs);
                    }
                }
                base.join(path).map_err(|e| HttpError::Url(e.to_string()))
            }
            None => Url::parse(path).map_err(|e| HttpError::Url(format!("{path}: {e}"))),
        }
    }

    fn prepare<'a, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        opts: RequestOpts<'a>,
        default_timeout: Option<Duration>,
    ) -> Result<Prepared<'a>, HttpError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.resolve(path, opts.allow_absolute)?;
        let body = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| HttpError::Build(format!("body serialization failed: {e}")))?;

        let query = opts.query.unwrap_or_default();
        let mut headers = opts.headers.unwrap_or_default();
        let mut bearer = None;
        let auth_kind = match opts.auth {
            Some(Auth::Bearer(tok)) => {
                bearer = Some(sanitize_api_key(tok)?);
                "bearer"
            }
            Some(Auth::Header { name, value }) => {
                headers.insert(name, value);
                "header"
            }
            Some(Auth::None) | None => "none",
        };

        Ok(Prepared {
            method,
            url,
            body,
            query,
            headers,
            bearer,
            auth_kind,
            timeout: opts.timeout.or(default_timeout),
            retries: opts.retries.unwrap_or(self.max_retries),
        })
    }

    async fn execute(&self, prepared: &Prepared<'_>) -> Result<RawResponse, HttpError> {
        let req_id = next_request_id();
        let mut attempt = 0usize;

        loop {
            prepared.log_start(&req_id, attempt + 1);

            let t0 = Instant::now();
            let sent = prepared.builder(&self.inner).send().await;
            let resp = match sent {
                Ok(resp) => resp,
                Err(err) => {
                    if attempt < prepared.retries {
                        attempt += 1;
                        let delay = backoff(attempt);
                        tracing::warn!(
                            req_id=%req_id,
                            attempt,
                            backoff_ms=delay.as_millis() as u64,
                            message=%err,
                            "http.retrying.network_send"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(req_id=%req_id, attempt, message=%err, "http.network_error.send");
                    return Err(HttpError::Network(err.to_string()));
                }
            };

            let status = resp.status();
            let headers = resp.headers().clone();
            let bytes = match resp.bytes().await {
                Ok(bytes) => bytes,
                Err(err) => {
                    if attempt < prepared.retries {
                        attempt += 1;
                        let delay = backoff(attempt);
                        tracing::warn!(
                            req_id=%req_id,
                            attempt,
                            backoff_ms=delay.as_millis() as u64,
                            message=%err,
                            "http.retrying.network_body"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(req_id=%req_id, attempt, message=%err, "http.network_error.body");
                    return Err(HttpError::Network(err.to_string()));
                }
            };
            let dur_ms = t0.elapsed().as_millis() as u64;
            let request_id = response_request_id(&headers);

            tracing::debug!(
                req_id=%req_id,
                %status,
                duration_ms=dur_ms,
                body_len=bytes.len(),
                x_request_id=%request_id,
                "http.response.headers"
            );

            if raw_enabled() {
                let text = String::from_utf8_lossy(&bytes);
                let truncated = bytes.len() > RAW_MAX_BODY;
                tracing::info!(
                    target: "http.raw",
                    %req_id,
                    status=%status,
                    duration_ms=dur_ms,
                    headers=?redact_headers(&headers),
                    body=%truncate_on_char_boundary(&text, RAW_MAX_BODY),
                    truncated
                );
            }

            if status.is_success() {
                return Ok(RawResponse {
                    status,
                    headers,
                    bytes,
                    req_id,
                });
            }

            let message = extract_error_message(&bytes);
            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if retryable && attempt < prepared.retries {
                attempt += 1;
                let delay = retry_after(&headers).unwrap_or_else(|| backoff(attempt));
                tracing::warn!(
                    req_id=%req_id,
                    %status,
                    attempt,
                    backoff_ms=delay.as_millis() as u64,
                    message=%message,
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            tracing::warn!(
                req_id=%req_id,
                %status,
                message=%message,
                x_request_id=%request_id,
                body_snippet=%snip_body(&bytes),
                "http.error"
            );
            return Err(HttpError::Api {
                status,
                message,
                request_id,
            });
        }
    }
}

// ==============================
// Helpers
// ==============================

fn decode_text(bytes: &[u8], headers: &HeaderMap) -> String {
    let encoding = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(charset_param)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::debug!(encoding = used.name(), "http.text.replacement_chars");
    }
    text.into_owned()
}

fn charset_param(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"'))
    })
}

fn decode_json<T: DeserializeOwned>(raw: &RawResponse) -> Result<T, HttpError> {
    serde_json::from_slice::<T>(&raw.bytes).map_err(|e| {
        let snippet = snip_body(&raw.bytes);
        tracing::warn!(
            req_id=%raw.req_id,
            status=%raw.status,
            serde_line=%e.line(),
            serde_col=%e.column(),
            serde_err=%e,
            body_snippet=%snippet,
            "http.response.decode_error"
        );
        HttpError::Decode(e.to_string(), snippet)
    })
}

fn backoff(attempt: usize) -> Duration {
    Duration::from_millis(200u64.saturating_mul(1 << (attempt.saturating_sub(1)).min(10)))
}

fn retry_after(h: &HeaderMap) -> Option<Duration> {
    h.get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?
        .trim()
        .parse()
        .ok()
        .map(Duration::from_secs)
}

fn response_request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .or_else(|| headers.get("request-id"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string()
}

/// Pull a human-readable message out of common provider error envelopes.
fn extract_error_message(body: &[u8]) -> String {
    // OpenAI and Anthropic: {"error":{"message":"..."}}
    #[derive(Deserialize)]
    struct Nested {
        error: NestedDetail,
    }
    #[derive(Deserialize)]
    struct NestedDetail {
        message: String,
    }

    // Ollama and generic: {"error":"..."} or {"message":"..."} or {"detail":"..."}
    #[derive(Deserialize)]
    struct Flat {
        #[serde(default)]
        error: String,
        #[serde(default)]
        message: String,
        #[serde(default)]
        detail: String,
    }

    if let Ok(env) = serde_json::from_slice::<Nested>(body) {
        return env.error.message;
    }
    if let Ok(m) = serde_json::from_slice::<Flat>(body) {
        for candidate in [m.error, m.message, m.detail] {
            if !candidate.is_empty() {
                return candidate;
            }
        }
    }
    snip_body(body)
}

fn truncate_on_char_boundary(s: &str, max: usize) -> Cow<'_, str> {
    if s.len() <= max {
        return Cow::Borrowed(s);
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    Cow::Owned(format!("{}...", &s[..end]))
}

fn snip_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    truncate_on_char_boundary(&text, SNIPPET_MAX).into_owned()
}

fn sanitize_api_key(raw: &str) -> Result<String, HttpError> {
    let mut s = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();

    s.retain(|ch| !ch.is_ascii_whitespace());

    if !s.is_ascii() {
        return Err(HttpError::Build("API key contains non-ASCII bytes".into()));
    }
    if s.bytes().any(|b| b < 0x20 || b == 0x7F) {
        return Err(HttpError::Build(
            "API key contains control characters".into(),
        ));
    }

    HeaderValue::from_str(&format!("Bearer {}", s))
        .map_err(|e| HttpError::Build(format!("invalid Authorization header: {e}")))?;
    Ok(s)
}

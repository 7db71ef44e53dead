//! Dropbox HTTP API client
//!
//! Provides a typed HTTP client for the two Dropbox endpoint families:
//!
//! - **RPC endpoints** (`<api>/2/<route>`): JSON argument in the body, JSON
//!   result in the body.
//! - **Content endpoints** (`<content>/2/<route>`): JSON argument in the
//!   `Dropbox-API-Arg` header, file bytes in the request body (upload) or
//!   the response body with the JSON result in `Dropbox-API-Result`
//!   (download).
//!
//! Every failure is reported as a [`ProviderError`]; nothing is retried.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use skiff_dropbox::client::DropboxClient;
//! use skiff_core::ports::RemoteStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = DropboxClient::new("access-token-here");
//! let account = client.current_account().await?;
//! println!("Hello, {}", account.display_name);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::{header, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use skiff_core::domain::{AuthErrorReason, ProviderError, Route, RouteReason};
use tracing::{debug, warn};

/// Base URL of the RPC endpoints
pub const API_BASE_URL: &str = "https://api.dropboxapi.com";

/// Base URL of the content endpoints
pub const CONTENT_BASE_URL: &str = "https://content.dropboxapi.com";

const API_ARG_HEADER: &str = "Dropbox-API-Arg";
const API_RESULT_HEADER: &str = "Dropbox-API-Result";

// ============================================================================
// Error body
// ============================================================================

/// Body of a 4xx response carrying a structured API error
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error_summary: Option<String>,
    error: Option<serde_json::Value>,
}

impl ApiErrorBody {
    fn parse(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }

    /// `.tag` of the top level error union, if present
    fn tag(&self) -> Option<&str> {
        self.error.as_ref()?.get(".tag")?.as_str()
    }
}

/// Summary of an error body, falling back to the raw text
fn summarize(body: &str) -> String {
    ApiErrorBody::parse(body)
        .and_then(|parsed| parsed.error_summary)
        .unwrap_or_else(|| body.trim().to_string())
}

fn auth_reason(body: &str) -> AuthErrorReason {
    let parsed = ApiErrorBody::parse(body);
    let tag = parsed
        .as_ref()
        .and_then(|p| p.tag().map(str::to_string))
        .or_else(|| parsed.and_then(|p| p.error_summary))
        .unwrap_or_default();

    if tag.starts_with("invalid_access_token") {
        AuthErrorReason::InvalidAccessToken
    } else if tag.starts_with("expired_access_token") {
        AuthErrorReason::ExpiredAccessToken
    } else {
        AuthErrorReason::Other(tag)
    }
}

/// Classifies a 409 error by its summary, e.g. `path/not_found/..`
fn route_reason(body: &str) -> RouteReason {
    let summary = summarize(body);
    let segments: Vec<&str> = summary.split('/').map(str::trim).collect();
    let has = |needle: &str| segments.iter().any(|segment| segment.ends_with(needle));

    if has("not_found") {
        RouteReason::NotFound
    } else if has("restricted_content") {
        RouteReason::RestrictedContent
    } else if has("conflict") {
        RouteReason::Conflict
    } else {
        RouteReason::Other(summary)
    }
}

/// Parses a `Retry-After` header value
///
/// Accepts integer seconds or an HTTP date in the future.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value.trim()) {
        let remaining = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
        return remaining.to_std().ok();
    }

    warn!(value, "Could not parse Retry-After header");
    None
}

/// Maps a non-success HTTP response to the raw provider failure shape
pub fn map_status(route: Route, status: u16, retry_after: Option<&str>, body: &str) -> ProviderError {
    match status {
        401 => ProviderError::Auth(auth_reason(body)),
        409 => ProviderError::Route {
            route,
            reason: route_reason(body),
        },
        429 => ProviderError::RateLimit {
            retry_after: retry_after.and_then(parse_retry_after),
        },
        500..=599 => ProviderError::Server {
            status,
            message: summarize(body),
        },
        _ => ProviderError::Http {
            status,
            message: summarize(body),
        },
    }
}

/// JSON for the `Dropbox-API-Arg` header
///
/// Header values must be ASCII, so every other character is written as a
/// JSON `\u` escape.
fn header_safe_json<A: Serialize + ?Sized>(arg: &A) -> Result<String, ProviderError> {
    let json = serde_json::to_string(arg).map_err(|e| ProviderError::Decode(e.to_string()))?;
    let mut escaped = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() {
            escaped.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                escaped.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    Ok(escaped)
}

fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProviderError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ProviderError::EmptyResponse);
    }
    serde_json::from_slice(bytes).map_err(|e| ProviderError::Decode(e.to_string()))
}

// ============================================================================
// DropboxClient
// ============================================================================

/// HTTP client for Dropbox API calls
///
/// Wraps `reqwest::Client` with bearer authentication and endpoint
/// construction for both endpoint families.
#[derive(Debug, Clone)]
pub struct DropboxClient {
    client: Client,
    api_base_url: String,
    content_base_url: String,
    access_token: String,
}

impl DropboxClient {
    /// Creates a client for the production endpoints
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_urls(access_token, API_BASE_URL, CONTENT_BASE_URL)
    }

    /// Creates a client with custom base URLs (useful for testing)
    pub fn with_base_urls(
        access_token: impl Into<String>,
        api_base_url: impl Into<String>,
        content_base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            content_base_url: content_base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Creates an authenticated POST request for `route` under `base_url`
    fn request(&self, base_url: &str, route: Route) -> RequestBuilder {
        let url = format!("{base_url}/2/{}", route.as_str());
        self.client.post(url).bearer_auth(&self.access_token)
    }

    async fn send(&self, route: Route, request: RequestBuilder) -> Result<Response, ProviderError> {
        let response = request.send().await.map_err(|e| {
            warn!(%route, error = %e, "Request failed before a response was received");
            ProviderError::Transport(e.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            debug!(%route, status = status.as_u16(), "Request succeeded");
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();
        let error = map_status(route, status.as_u16(), retry_after.as_deref(), &body);
        warn!(%route, status = status.as_u16(), %error, "Request rejected");
        Err(error)
    }

    async fn read_body(response: Response) -> Result<Vec<u8>, ProviderError> {
        response
            .bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(|e| ProviderError::Transport(e.to_string()))
    }

    /// Calls an RPC endpoint and decodes its JSON result
    pub async fn rpc<A, T>(&self, route: Route, arg: &A) -> Result<T, ProviderError>
    where
        A: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(&self.api_base_url, route).json(arg);
        let response = self.send(route, request).await?;
        decode_json(&Self::read_body(response).await?)
    }

    /// Calls an RPC endpoint whose result is not needed
    pub async fn rpc_unit<A>(&self, route: Route, arg: &A) -> Result<(), ProviderError>
    where
        A: Serialize + ?Sized,
    {
        let request = self.request(&self.api_base_url, route).json(arg);
        self.send(route, request).await.map(|_| ())
    }

    /// Uploads `data` to a content endpoint
    pub async fn upload_content<A, T>(
        &self,
        route: Route,
        arg: &A,
        data: Vec<u8>,
    ) -> Result<T, ProviderError>
    where
        A: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .request(&self.content_base_url, route)
            .header(API_ARG_HEADER, header_safe_json(arg)?)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(data);
        let response = self.send(route, request).await?;
        decode_json(&Self::read_body(response).await?)
    }

    /// Downloads from a content endpoint
    ///
    /// # Returns
    /// The result decoded from the `Dropbox-API-Result` header and the body
    pub async fn download_content<A, T>(&self, route: Route, arg: &A) -> Result<(T, Vec<u8>), ProviderError>
    where
        A: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self
            .request(&self.content_base_url, route)
            .header(API_ARG_HEADER, header_safe_json(arg)?);
        let response = self.send(route, request).await?;

        let result = response
            .headers()
            .get(API_RESULT_HEADER)
            .ok_or(ProviderError::EmptyResponse)?
            .to_str()
            .map_err(|e| ProviderError::Decode(e.to_string()))?
            .to_string();
        let result = decode_json(result.as_bytes())?;

        let data = Self::read_body(response).await?;
        debug!(%route, bytes = data.len(), "Downloaded content");
        Ok((result, data))
    }
}

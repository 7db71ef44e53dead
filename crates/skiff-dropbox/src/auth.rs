//! OAuth2 PKCE authorization for the Dropbox API
//!
//! Implements the Authorization Code flow with PKCE (RFC 7636) for a native
//! application without a client secret, redirecting to a loopback address.
//!
//! ## Components
//!
//! - [`OAuth2Config`] - App key, redirect URI and endpoint URLs
//! - [`Tokens`] / [`TokenStore`] - Access and refresh tokens keyed by account id
//! - [`KeyringTokenStorage`] - Token storage in the system keyring
//! - [`PKCEFlow`] - Authorization URL generation, code exchange and refresh
//! - [`LocalCallbackServer`] - Minimal HTTP server for the OAuth redirect
//! - [`DropboxAuthorizer`] - The [`Authorizer`] port built from the above

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use oauth2::{
    basic::BasicClient, AuthUrl, AuthorizationCode, ClientId, CsrfToken, EndpointNotSet,
    EndpointSet, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken, TokenResponse,
    TokenUrl,
};
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use skiff_core::config::Config;
use skiff_core::ports::{AuthorizationOutcome, Authorizer, RemoteStore};

use crate::client::DropboxClient;

/// Dropbox OAuth2 authorization endpoint
const AUTH_URL: &str = "https://www.dropbox.com/oauth2/authorize";

/// Dropbox OAuth2 token endpoint
const TOKEN_URL: &str = "https://api.dropboxapi.com/oauth2/token";

/// Access tokens this close to expiry are refreshed before use
const EXPIRY_MARGIN_SECS: i64 = 60;

// ============================================================================
// OAuth2Config
// ============================================================================

/// Configuration for the OAuth2 PKCE flow and the clients it produces
#[derive(Debug, Clone)]
pub struct OAuth2Config {
    /// App key of the registered Dropbox application
    pub app_key: String,
    /// Loopback URI the provider redirects to
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    /// Base URL of the RPC endpoints for authorized clients
    pub api_base_url: String,
    /// Base URL of the content endpoints for authorized clients
    pub content_base_url: String,
}

impl OAuth2Config {
    /// Reads the `auth` and `remote` sections of `config`
    ///
    /// # Errors
    /// Fails if no app key is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let app_key = config
            .auth
            .app_key
            .clone()
            .filter(|key| !key.is_empty())
            .context("auth.app_key is not configured")?;

        Ok(Self {
            app_key,
            redirect_uri: config.auth.redirect_uri.clone(),
            auth_url: AUTH_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            api_base_url: config.remote.api_base_url.clone(),
            content_base_url: config.remote.content_base_url.clone(),
        })
    }

    /// Overrides the OAuth2 endpoints (useful for testing)
    pub fn with_endpoints(mut self, auth_url: impl Into<String>, token_url: impl Into<String>) -> Self {
        self.auth_url = auth_url.into();
        self.token_url = token_url.into();
        self
    }

    /// `host:port` the callback server listens on, taken from the redirect URI
    pub fn callback_address(&self) -> Result<String> {
        let url = url::Url::parse(&self.redirect_uri).context("Invalid redirect URI")?;
        let host = url.host_str().context("Redirect URI has no host")?;
        let port = url
            .port_or_known_default()
            .context("Redirect URI has no port")?;
        Ok(format!("{host}:{port}"))
    }

    fn client_for(&self, tokens: &Tokens) -> DropboxClient {
        DropboxClient::with_base_urls(
            tokens.access_token.clone(),
            self.api_base_url.clone(),
            self.content_base_url.clone(),
        )
    }
}

// ============================================================================
// Tokens and storage
// ============================================================================

/// OAuth tokens of one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Tokens {
    /// Returns true if the access token has expired or is about to
    pub fn is_expired(&self) -> bool {
        Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS) >= self.expires_at
    }
}

/// Durable storage for [`Tokens`], keyed by account id
pub trait TokenStore: Send + Sync {
    fn load(&self, account_id: &str) -> Result<Option<Tokens>>;
    fn store(&self, account_id: &str, tokens: &Tokens) -> Result<()>;
    fn clear(&self, account_id: &str) -> Result<()>;
}

/// Stores tokens in the system keyring
///
/// Tokens are serialized as JSON under the configured keyring service, with
/// the account id as the keyring username.
#[derive(Debug, Clone)]
pub struct KeyringTokenStorage {
    service: String,
}

impl KeyringTokenStorage {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, account_id: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, account_id).context("Failed to create keyring entry")
    }
}

impl TokenStore for KeyringTokenStorage {
    fn load(&self, account_id: &str) -> Result<Option<Tokens>> {
        match self.entry(account_id)?.get_password() {
            Ok(json) => {
                let tokens: Tokens = serde_json::from_str(&json)
                    .context("Failed to deserialize tokens from keyring")?;
                debug!(account_id, "Loaded tokens from keyring");
                Ok(Some(tokens))
            }
            Err(keyring::Error::NoEntry) => {
                debug!(account_id, "No tokens found in keyring");
                Ok(None)
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read from keyring")),
        }
    }

    fn store(&self, account_id: &str, tokens: &Tokens) -> Result<()> {
        let json = serde_json::to_string(tokens).context("Failed to serialize tokens")?;
        self.entry(account_id)?
            .set_password(&json)
            .context("Failed to store tokens in keyring")?;
        debug!(account_id, "Stored tokens in keyring");
        Ok(())
    }

    fn clear(&self, account_id: &str) -> Result<()> {
        match self.entry(account_id)?.delete_credential() {
            Ok(()) => {
                info!(account_id, "Cleared tokens from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => {
                debug!(account_id, "No tokens to clear");
                Ok(())
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to delete from keyring")),
        }
    }
}

/// Process-local [`TokenStore`] for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<HashMap<String, Tokens>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Tokens>> {
        self.tokens.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self, account_id: &str) -> Result<Option<Tokens>> {
        Ok(self.lock().get(account_id).cloned())
    }

    fn store(&self, account_id: &str, tokens: &Tokens) -> Result<()> {
        self.lock().insert(account_id.to_string(), tokens.clone());
        Ok(())
    }

    fn clear(&self, account_id: &str) -> Result<()> {
        self.lock().remove(account_id);
        Ok(())
    }
}

// ============================================================================
// PKCEFlow
// ============================================================================

/// OAuth2 PKCE flow implementation using the `oauth2` crate
///
/// Handles generating authorization URLs with PKCE challenges, exchanging
/// authorization codes for tokens, and refreshing tokens.
pub struct PKCEFlow {
    client: BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>,
    http_client: reqwest::Client,
}

impl PKCEFlow {
    pub fn new(config: &OAuth2Config) -> Result<Self> {
        let client = BasicClient::new(ClientId::new(config.app_key.clone()))
            .set_auth_uri(AuthUrl::new(config.auth_url.clone()).context("Invalid authorization URL")?)
            .set_token_uri(TokenUrl::new(config.token_url.clone()).context("Invalid token URL")?)
            .set_redirect_uri(
                RedirectUrl::new(config.redirect_uri.clone()).context("Invalid redirect URI")?,
            );

        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build HTTP client for token requests")?;

        Ok(Self {
            client,
            http_client,
        })
    }

    /// Generates an authorization URL with a PKCE challenge
    ///
    /// Requests offline access so the token response carries a refresh
    /// token.
    ///
    /// # Returns
    /// A tuple of `(authorization_url, csrf_token, pkce_verifier)`.
    /// The `pkce_verifier` must be kept until the code exchange step.
    pub fn generate_auth_url(&self) -> (String, CsrfToken, PkceCodeVerifier) {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (auth_url, csrf_token) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_extra_param("token_access_type", "offline")
            .set_pkce_challenge(pkce_challenge)
            .url();

        debug!("Generated authorization URL");
        (auth_url.to_string(), csrf_token, pkce_verifier)
    }

    /// Exchanges an authorization code for OAuth tokens
    pub async fn exchange_code(&self, code: String, pkce_verifier: PkceCodeVerifier) -> Result<Tokens> {
        info!("Exchanging authorization code for tokens");

        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(&self.http_client)
            .await
            .context("Failed to exchange authorization code")?;

        Ok(Tokens {
            access_token: token_result.access_token().secret().to_string(),
            refresh_token: token_result.refresh_token().map(|t| t.secret().to_string()),
            expires_at: expiry(token_result.expires_in()),
        })
    }

    /// Refreshes an expired access token
    ///
    /// Dropbox does not rotate refresh tokens, so the one passed in is kept
    /// unless the response carries a new one.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<Tokens> {
        info!("Refreshing access token");

        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http_client)
            .await
            .context("Failed to refresh token")?;

        Ok(Tokens {
            access_token: token_result.access_token().secret().to_string(),
            refresh_token: token_result
                .refresh_token()
                .map(|t| t.secret().to_string())
                .or_else(|| Some(refresh_token.to_string())),
            expires_at: expiry(token_result.expires_in()),
        })
    }
}

fn expiry(expires_in: Option<std::time::Duration>) -> DateTime<Utc> {
    expires_in
        .and_then(|d| Duration::from_std(d).ok())
        .map(|d| Utc::now() + d)
        .unwrap_or_else(|| Utc::now() + Duration::hours(4))
}

// ============================================================================
// LocalCallbackServer
// ============================================================================

/// What the provider sent back to the redirect URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackResult {
    /// The user granted access
    Code { code: String, state: String },
    /// The user declined (`error=access_denied`)
    Denied,
    /// Any other OAuth error
    Error { error: String, description: String },
}

/// Minimal HTTP server that waits for the OAuth2 redirect on a loopback address
///
/// Requests that do not carry callback parameters (a browser asking for a
/// favicon, for instance) get a 400 and the server keeps listening.
pub struct LocalCallbackServer {
    listener: TcpListener,
}

impl LocalCallbackServer {
    /// Binds to `address` (`host:port`)
    pub async fn bind(address: &str) -> Result<Self> {
        let listener = TcpListener::bind(address)
            .await
            .with_context(|| format!("Failed to bind callback server to {address}"))?;
        info!(address, "OAuth callback server listening");
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        self.listener
            .local_addr()
            .context("Callback server has no local address")
    }

    /// Serves connections until one carries callback parameters
    pub async fn wait(self) -> Result<CallbackResult> {
        let (tx, mut rx) = mpsc::channel::<CallbackResult>(1);

        loop {
            tokio::select! {
                Some(result) = rx.recv() => {
                    info!("Received OAuth callback");
                    return Ok(result);
                }
                accepted = self.listener.accept() => {
                    let (stream, _addr) =
                        accepted.context("Failed to accept connection on callback server")?;
                    tokio::spawn(serve_callback(stream, tx.clone()));
                }
            }
        }
    }
}

async fn serve_callback(stream: TcpStream, tx: mpsc::Sender<CallbackResult>) {
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::header::{HeaderValue, CONTENT_TYPE};
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Request, Response, StatusCode};
    use hyper_util::rt::TokioIo;

    let service = service_fn(move |req: Request<hyper::body::Incoming>| {
        let tx = tx.clone();
        async move {
            let uri = req.uri().to_string();
            debug!(%uri, "Callback server received request");

            let (status, html) = match parse_callback_params(&uri) {
                Some(result) => {
                    let html = match &result {
                        CallbackResult::Code { .. } => success_html(),
                        CallbackResult::Denied => error_html("Access was not granted."),
                        CallbackResult::Error { description, .. } => error_html(description),
                    };
                    let _ = tx.send(result).await;
                    (StatusCode::OK, html)
                }
                None => (
                    StatusCode::BAD_REQUEST,
                    error_html("Missing authorization code in callback"),
                ),
            };

            let mut response = Response::new(Full::new(Bytes::from(html)));
            *response.status_mut() = status;
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/html; charset=utf-8"),
            );
            Ok::<_, hyper::Error>(response)
        }
    });

    if let Err(e) = http1::Builder::new()
        .serve_connection(TokioIo::new(stream), service)
        .await
    {
        warn!(error = %e, "Callback server connection error");
    }
}

/// Parses the redirect query of a callback request URI
fn parse_callback_params(uri: &str) -> Option<CallbackResult> {
    let url = url::Url::parse(&format!("http://localhost{uri}")).ok()?;
    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

    if let Some(error) = params.get("error") {
        if error == "access_denied" {
            return Some(CallbackResult::Denied);
        }
        return Some(CallbackResult::Error {
            error: error.clone(),
            description: params
                .get("error_description")
                .cloned()
                .unwrap_or_else(|| error.clone()),
        });
    }

    Some(CallbackResult::Code {
        code: params.get("code")?.clone(),
        state: params.get("state").cloned().unwrap_or_default(),
    })
}

fn success_html() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>Skiff - Authorization Complete</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Authorization Complete</h1>
    <p>You can close this window and return to the application.</p>
</body>
</html>"#
        .to_string()
}

/// Escapes text for inclusion in an HTML element body
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn error_html(message: &str) -> String {
    let message = escape_html(message);
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Skiff - Authorization Error</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Authorization Error</h1>
    <p>{message}</p>
    <p>Please close this window and try again.</p>
</body>
</html>"#
    )
}

// ============================================================================
// DropboxAuthorizer
// ============================================================================

/// Opens the authorization URL for the user
pub type BrowserLauncher = Arc<dyn Fn(&str) -> std::io::Result<()> + Send + Sync>;

struct AuthorizedAccount {
    account_id: String,
    client: Arc<DropboxClient>,
}

/// [`Authorizer`] for Dropbox accounts
///
/// The interactive flow:
///
/// 1. Generates a PKCE authorization URL
/// 2. Starts the loopback callback server
/// 3. Opens the user's browser at the authorization URL
/// 4. Exchanges the returned code for tokens
/// 5. Looks up the account id and stores the tokens under it
pub struct DropboxAuthorizer {
    config: OAuth2Config,
    tokens: Arc<dyn TokenStore>,
    open_browser: BrowserLauncher,
    current: Mutex<Option<AuthorizedAccount>>,
}

impl DropboxAuthorizer {
    pub fn new(config: OAuth2Config, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            config,
            tokens,
            open_browser: Arc::new(|url: &str| webbrowser::open(url)),
            current: Mutex::new(None),
        }
    }

    /// Replaces the browser launcher
    pub fn with_browser(mut self, open_browser: BrowserLauncher) -> Self {
        self.open_browser = open_browser;
        self
    }

    pub fn config(&self) -> &OAuth2Config {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Option<AuthorizedAccount>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn install(&self, account_id: String, client: DropboxClient) {
        info!(%account_id, "Account authorized");
        *self.lock() = Some(AuthorizedAccount {
            account_id,
            client: Arc::new(client),
        });
    }

    async fn run_interactive(&self) -> Result<AuthorizationOutcome> {
        let flow = PKCEFlow::new(&self.config)?;
        let (auth_url, csrf_token, pkce_verifier) = flow.generate_auth_url();

        let server = LocalCallbackServer::bind(&self.config.callback_address()?).await?;
        info!("Opening browser for authorization");
        (self.open_browser)(&auth_url).context("Failed to open browser for authorization")?;

        let code = match server.wait().await? {
            CallbackResult::Denied => return Ok(AuthorizationOutcome::Cancelled),
            CallbackResult::Error { error, description } => {
                return Ok(AuthorizationOutcome::Failed { error, description })
            }
            CallbackResult::Code { state, .. } if state != *csrf_token.secret() => {
                warn!("OAuth callback state does not match the request");
                return Ok(AuthorizationOutcome::Failed {
                    error: "invalid_state".into(),
                    description: "the authorization response did not match the request".into(),
                });
            }
            CallbackResult::Code { code, .. } => code,
        };

        let tokens = flow.exchange_code(code, pkce_verifier).await?;
        let client = self.config.client_for(&tokens);
        let account = client
            .current_account()
            .await
            .context("Failed to look up the authorized account")?;

        self.tokens.store(&account.account_id, &tokens)?;
        self.install(account.account_id, client);
        Ok(AuthorizationOutcome::Authorized)
    }

    async fn restore(&self, account_id: &str) -> Result<AuthorizationOutcome> {
        let Some(mut tokens) = self.tokens.load(account_id)? else {
            return Ok(AuthorizationOutcome::Failed {
                error: "no_saved_credentials".into(),
                description: format!("no stored tokens for account {account_id}"),
            });
        };

        if tokens.is_expired() {
            let Some(refresh_token) = tokens.refresh_token.clone() else {
                return Ok(AuthorizationOutcome::Failed {
                    error: "expired_access_token".into(),
                    description: "the stored access token expired and cannot be refreshed".into(),
                });
            };
            tokens = PKCEFlow::new(&self.config)?
                .refresh_token(&refresh_token)
                .await?;
            self.tokens.store(account_id, &tokens)?;
        }

        self.install(account_id.to_string(), self.config.client_for(&tokens));
        Ok(AuthorizationOutcome::Authorized)
    }
}

fn failed(error: anyhow::Error) -> AuthorizationOutcome {
    warn!(error = %format!("{error:#}"), "Authorization failed");
    AuthorizationOutcome::Failed {
        error: "authorization_error".into(),
        description: format!("{error:#}"),
    }
}

#[async_trait]
impl Authorizer for DropboxAuthorizer {
    async fn authorize(&self) -> AuthorizationOutcome {
        self.run_interactive().await.unwrap_or_else(failed)
    }

    async fn reauthorize(&self, account_id: &str) -> AuthorizationOutcome {
        self.restore(account_id).await.unwrap_or_else(failed)
    }

    fn authorized_client(&self) -> Option<Arc<dyn RemoteStore>> {
        self.lock()
            .as_ref()
            .map(|account| Arc::clone(&account.client) as Arc<dyn RemoteStore>)
    }

    async fn revoke(&self) -> anyhow::Result<()> {
        let Some(account) = self.lock().take() else {
            debug!("No authorized account to revoke");
            return Ok(());
        };

        let revoked = account
            .client
            .revoke_token()
            .await
            .context("Failed to revoke access token");
        self.tokens.clear(&account.account_id)?;
        info!(account_id = %account.account_id, "Account deauthorized");
        revoked
    }
}

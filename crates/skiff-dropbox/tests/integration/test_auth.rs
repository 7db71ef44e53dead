//! Integration tests for the Dropbox authorizer
//!
//! The browser is replaced by a launcher that immediately requests the
//! loopback callback, so the whole PKCE flow runs against the mock token
//! endpoint:
//! - Code exchange and token storage keyed by account id
//! - Denied and forged callbacks
//! - Refresh of expired tokens on re-authorization
//! - Revocation
//! - Session bootstrap through `RemoteService`

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use skiff_core::config::{Config, ConfigBuilder};
use skiff_core::ports::{AccountStore, AuthorizationOutcome, Authorizer, MemoryAccountStore};
use skiff_core::usecases::SessionState;
use skiff_core::RemoteService;
use skiff_dropbox::auth::{BrowserLauncher, TokenStore};
use skiff_dropbox::{DropboxAuthorizer, MemoryTokenStore, OAuth2Config, Tokens};

use crate::common::{self, NotesContext};

const ACCOUNT_ID: &str = "dbid:AAH4f99T0taONIb-OurWxbNQ6ywGRopQngc";

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn config(server: &MockServer, port: u16) -> Config {
    ConfigBuilder::new()
        .app_key("test-app-key")
        .redirect_uri(format!("http://127.0.0.1:{port}/callback"))
        .base_url(server.uri())
        .build()
}

fn authorizer(server: &MockServer, port: u16, tokens: Arc<MemoryTokenStore>) -> DropboxAuthorizer {
    let oauth = OAuth2Config::from_config(&config(server, port))
        .unwrap()
        .with_endpoints(
            format!("{}/oauth2/authorize", server.uri()),
            format!("{}/oauth2/token", server.uri()),
        );
    DropboxAuthorizer::new(oauth, tokens)
}

/// A launcher that "approves" by hitting the callback with `query(state)`
fn browser(port: u16, query: fn(&str) -> String) -> BrowserLauncher {
    Arc::new(move |auth_url: &str| {
        let state = url::Url::parse(auth_url)
            .ok()
            .and_then(|url| {
                url.query_pairs()
                    .find(|(key, _)| key == "state")
                    .map(|(_, value)| value.into_owned())
            })
            .unwrap_or_default();
        let callback = format!("http://127.0.0.1:{port}/callback?{}", query(&state));
        tokio::spawn(async move {
            let _ = reqwest::get(callback).await;
        });
        Ok::<(), std::io::Error>(())
    })
}

async fn mount_token_endpoint(server: &MockServer, grant: &str, response: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains(format!("grant_type={grant}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(response))
        .expect(1)
        .mount(server)
        .await;
}

fn expired_tokens() -> Tokens {
    Tokens {
        access_token: "sl.expired".into(),
        refresh_token: Some("refresh-1".into()),
        expires_at: Utc::now() - Duration::hours(1),
    }
}

#[tokio::test]
async fn test_interactive_flow_stores_tokens_for_account() {
    let (server, _client) = common::setup_dropbox_mock().await;
    mount_token_endpoint(
        &server,
        "authorization_code",
        json!({
            "access_token": "sl.new",
            "token_type": "bearer",
            "expires_in": 14400,
            "refresh_token": "refresh-1",
            "account_id": ACCOUNT_ID,
            "uid": "12345"
        }),
    )
    .await;

    let port = free_port();
    let tokens = Arc::new(MemoryTokenStore::new());
    let authorizer = authorizer(&server, port, Arc::clone(&tokens))
        .with_browser(browser(port, |state| format!("code=auth-code&state={state}")));

    let outcome = authorizer.authorize().await;

    assert_eq!(outcome, AuthorizationOutcome::Authorized);
    let stored = tokens.load(ACCOUNT_ID).unwrap().expect("tokens not stored");
    assert_eq!(stored.access_token, "sl.new");
    assert_eq!(stored.refresh_token.as_deref(), Some("refresh-1"));
    assert!(!stored.is_expired());
    assert!(authorizer.authorized_client().is_some());
}

#[tokio::test]
async fn test_denied_callback_is_cancellation() {
    let (server, _client) = common::setup_dropbox_mock().await;
    let port = free_port();
    let authorizer = authorizer(&server, port, Arc::new(MemoryTokenStore::new())).with_browser(
        browser(port, |state| format!("error=access_denied&error_description=The+user+chose+not+to+give+your+app+access&state={state}")),
    );

    assert_eq!(authorizer.authorize().await, AuthorizationOutcome::Cancelled);
    assert!(authorizer.authorized_client().is_none());
}

#[tokio::test]
async fn test_forged_state_fails() {
    let (server, _client) = common::setup_dropbox_mock().await;
    let port = free_port();
    let authorizer = authorizer(&server, port, Arc::new(MemoryTokenStore::new()))
        .with_browser(browser(port, |_| "code=auth-code&state=forged".to_string()));

    let outcome = authorizer.authorize().await;

    assert!(matches!(outcome, AuthorizationOutcome::Failed { ref error, .. } if error == "invalid_state"));
}

#[tokio::test]
async fn test_provider_error_callback_fails_with_description() {
    let (server, _client) = common::setup_dropbox_mock().await;
    let port = free_port();
    let authorizer = authorizer(&server, port, Arc::new(MemoryTokenStore::new())).with_browser(
        browser(port, |state| format!("error=server_error&error_description=Try+again&state={state}")),
    );

    assert_eq!(
        authorizer.authorize().await,
        AuthorizationOutcome::Failed {
            error: "server_error".into(),
            description: "Try again".into()
        }
    );
}

#[tokio::test]
async fn test_reauthorize_refreshes_expired_tokens() {
    let (server, _client) = common::setup_dropbox_mock().await;
    mount_token_endpoint(
        &server,
        "refresh_token",
        json!({"access_token": "sl.refreshed", "token_type": "bearer", "expires_in": 14400}),
    )
    .await;

    let tokens = Arc::new(MemoryTokenStore::new());
    tokens.store(ACCOUNT_ID, &expired_tokens()).unwrap();
    let authorizer = authorizer(&server, free_port(), Arc::clone(&tokens));

    assert_eq!(
        authorizer.reauthorize(ACCOUNT_ID).await,
        AuthorizationOutcome::Authorized
    );
    let stored = tokens.load(ACCOUNT_ID).unwrap().unwrap();
    assert_eq!(stored.access_token, "sl.refreshed");
    assert_eq!(stored.refresh_token.as_deref(), Some("refresh-1"));
}

#[tokio::test]
async fn test_reauthorize_with_rejected_refresh_fails() {
    let (server, _client) = common::setup_dropbox_mock().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "refresh token is invalid or revoked"
        })))
        .mount(&server)
        .await;

    let tokens = Arc::new(MemoryTokenStore::new());
    tokens.store(ACCOUNT_ID, &expired_tokens()).unwrap();
    let authorizer = authorizer(&server, free_port(), tokens);

    let outcome = authorizer.reauthorize(ACCOUNT_ID).await;

    assert!(matches!(outcome, AuthorizationOutcome::Failed { .. }));
    assert!(authorizer.authorized_client().is_none());
}

#[tokio::test]
async fn test_revoke_clears_tokens_even_when_revocation_fails() {
    let (server, _client) = common::setup_dropbox_mock().await;
    Mock::given(method("POST"))
        .and(path("/2/auth/token/revoke"))
        .and(header("authorization", "Bearer sl.valid"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = Arc::new(MemoryTokenStore::new());
    tokens
        .store(
            ACCOUNT_ID,
            &Tokens {
                access_token: "sl.valid".into(),
                refresh_token: None,
                expires_at: Utc::now() + Duration::hours(1),
            },
        )
        .unwrap();
    let authorizer = authorizer(&server, free_port(), Arc::clone(&tokens));
    authorizer.reauthorize(ACCOUNT_ID).await;

    assert!(authorizer.revoke().await.is_err());
    assert!(tokens.load(ACCOUNT_ID).unwrap().is_none());
    assert!(authorizer.authorized_client().is_none());
}

#[tokio::test]
async fn test_background_session_bootstraps_directory_and_schema() {
    let (server, _client) = common::setup_dropbox_mock().await;
    common::mount_template(&server).await;
    common::mount_error(&server, "files/get_metadata", 409, "path/not_found/..").await;
    Mock::given(method("POST"))
        .and(path("/2/files/create_folder_v2"))
        .and(header("authorization", "Bearer sl.valid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metadata": {"name": "Skiff", "path_lower": "/skiff", "id": "id:dir"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let port = free_port();
    let tokens = Arc::new(MemoryTokenStore::new());
    tokens
        .store(
            ACCOUNT_ID,
            &Tokens {
                access_token: "sl.valid".into(),
                refresh_token: None,
                expires_at: Utc::now() + Duration::hours(1),
            },
        )
        .unwrap();
    let accounts = Arc::new(MemoryAccountStore::new());
    let config = config(&server, port);
    accounts
        .save(&config.remote.account_key(), Some(ACCOUNT_ID))
        .unwrap();

    let service = RemoteService::new(
        &config,
        Arc::new(authorizer(&server, port, tokens)),
        accounts,
        Arc::new(NotesContext::default()),
    );

    let account = service
        .authenticate_in_background()
        .await
        .expect("background authentication failed");

    assert_eq!(account.name, "Franz Ferdinand (Personal)");
    assert_eq!(account.email_address, "franz@example.com");
    assert_eq!(service.session().state(), SessionState::Ready);
}

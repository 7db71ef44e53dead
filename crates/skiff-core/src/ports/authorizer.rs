//! Authorizer port
//!
//! Drives the provider's authorization flow and hands out an authenticated
//! [`RemoteStore`] once it succeeds. Presentation of the flow (browser,
//! loopback redirect, token storage) is entirely up to the adapter.

use std::sync::Arc;

use async_trait::async_trait;

use super::remote_store::RemoteStore;

/// Result of an interactive authorization attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    /// The user granted access; [`Authorizer::authorized_client`] is usable
    Authorized,
    /// The user dismissed or denied the request
    Cancelled,
    /// The provider reported an error
    Failed {
        /// Provider error tag
        error: String,
        /// Human readable description
        description: String,
    },
}

/// Port trait for provider authorization
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Runs the interactive flow until the provider redirects back
    async fn authorize(&self) -> AuthorizationOutcome;

    /// Restores credentials previously stored for `account_id`
    ///
    /// Refreshes the access token if it has expired.
    async fn reauthorize(&self, account_id: &str) -> AuthorizationOutcome;

    /// Returns a client for the most recently authorized account
    fn authorized_client(&self) -> Option<Arc<dyn RemoteStore>>;

    /// Revokes the current session and forgets stored credentials
    async fn revoke(&self) -> anyhow::Result<()>;
}

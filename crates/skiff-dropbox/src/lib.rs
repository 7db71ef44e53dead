//! Skiff Dropbox - Dropbox HTTP API adapter
//!
//! Provides:
//! - OAuth2 authorization (Authorization Code with PKCE, loopback redirect)
//! - A [`RemoteStore`](skiff_core::ports::RemoteStore) over the Dropbox
//!   files and file properties APIs
//! - Keyring storage for tokens and the persisted account id
//!
//! ## Modules
//!
//! - [`auth`] - OAuth2 PKCE flow and the [`DropboxAuthorizer`]
//! - [`client`] - HTTP client and status mapping
//! - [`store`] - `RemoteStore` implementation
//! - [`account_store`] - Keyring-backed account id storage
//!
//! ## Wiring
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use skiff_core::config::Config;
//! use skiff_dropbox::{DropboxAuthorizer, KeyringAccountStore, KeyringTokenStorage, OAuth2Config};
//!
//! # fn example(config: &Config) -> anyhow::Result<()> {
//! let authorizer = DropboxAuthorizer::new(
//!     OAuth2Config::from_config(config)?,
//!     Arc::new(KeyringTokenStorage::new(&config.auth.keyring_service)),
//! );
//! let accounts = KeyringAccountStore::new(&config.auth.keyring_service);
//! # let _ = (authorizer, accounts);
//! # Ok(())
//! # }
//! ```

pub mod account_store;
pub mod auth;
pub mod client;
pub mod store;
mod wire;

pub use account_store::KeyringAccountStore;
pub use auth::{DropboxAuthorizer, KeyringTokenStorage, MemoryTokenStore, OAuth2Config, Tokens};
pub use client::DropboxClient;

//! Error types
//!
//! [`SyncError`] is the single canonical surface every public operation
//! fails with. [`ProviderError`] is the flattened shape of a raw backend
//! failure as reported by an adapter; only [`crate::domain::translate`]
//! turns one into the other.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use thiserror::Error;

// ============================================================================
// Raw provider failures
// ============================================================================

/// Reason attached to an authentication failure reported by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthErrorReason {
    /// The access token is malformed, revoked or unknown
    InvalidAccessToken,
    /// The access token was valid but has expired
    ExpiredAccessToken,
    /// Any other authentication failure tag
    Other(String),
}

/// Backend endpoint a failure originated from
///
/// "Not found" only carries domain meaning for some routes, so the
/// translator needs to know where a route error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    CurrentAccount,
    GetMetadata,
    CreateFolder,
    ListFolder,
    ListFolderContinue,
    Upload,
    Download,
    Delete,
    ListRevisions,
    ListTemplates,
    GetTemplate,
    AddTemplate,
    UpdateTemplate,
    UpdateProperties,
    RevokeToken,
}

impl Route {
    /// Returns the wire name of the route
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::CurrentAccount => "users/get_current_account",
            Route::GetMetadata => "files/get_metadata",
            Route::CreateFolder => "files/create_folder_v2",
            Route::ListFolder => "files/list_folder",
            Route::ListFolderContinue => "files/list_folder/continue",
            Route::Upload => "files/upload",
            Route::Download => "files/download",
            Route::Delete => "files/delete_v2",
            Route::ListRevisions => "files/list_revisions",
            Route::ListTemplates => "file_properties/templates/list_for_user",
            Route::GetTemplate => "file_properties/templates/get_for_user",
            Route::AddTemplate => "file_properties/templates/add_for_user",
            Route::UpdateTemplate => "file_properties/templates/update_for_user",
            Route::UpdateProperties => "file_properties/properties/update",
            Route::RevokeToken => "auth/token/revoke",
        }
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoint-specific reason carried by a route error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteReason {
    /// The path, revision or template does not exist
    NotFound,
    /// The object is blocked by a content policy
    RestrictedContent,
    /// The write conflicts with the current remote state
    Conflict,
    /// Any other route error summary
    Other(String),
}

impl Display for RouteReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RouteReason::NotFound => f.write_str("not found"),
            RouteReason::RestrictedContent => f.write_str("restricted content"),
            RouteReason::Conflict => f.write_str("conflict"),
            RouteReason::Other(summary) => f.write_str(summary),
        }
    }
}

/// A backend failure before translation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The request was rejected by the authentication layer
    #[error("authentication error: {0:?}")]
    Auth(AuthErrorReason),

    /// The backend throttled the request
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimit {
        /// Hint supplied by the backend, if any
        retry_after: Option<Duration>,
    },

    /// The request never produced an HTTP response
    #[error("transport error: {0}")]
    Transport(String),

    /// The endpoint rejected the request with a structured error
    #[error("{route} failed: {reason}")]
    Route {
        /// Endpoint that failed
        route: Route,
        /// Parsed reason
        reason: RouteReason,
    },

    /// A 5xx response
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Response body or summary
        message: String,
    },

    /// Any other unexpected HTTP status
    #[error("unexpected status ({status}): {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body or summary
        message: String,
    },

    /// The backend produced neither a value nor an error
    #[error("empty response")]
    EmptyResponse,

    /// The response body could not be decoded
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Returns true if this is a route error with the given reason
    pub fn has_reason(&self, expected: &RouteReason) -> bool {
        matches!(self, ProviderError::Route { reason, .. } if reason == expected)
    }
}

// ============================================================================
// Local failures
// ============================================================================

/// Precondition failures detected before any network call
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The operation needs a remote counterpart but the record has none
    #[error("record {0} has no remote counterpart")]
    MissingRemoteRecord(String),

    /// The record has no local representation to upload
    #[error("record {0} has no local record")]
    MissingLocalRecord(String),

    /// The local record could not be serialized
    #[error("failed to encode local record: {0}")]
    Encoding(String),

    /// Downloaded bytes could not be decoded into a local record
    #[error("failed to decode local record: {0}")]
    Decoding(String),
}

/// Adapter misconfiguration or a backend that refuses to converge
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// No working directory name was configured
    #[error("no remote directory name is configured")]
    MissingDirectoryName,

    /// A configured or derived remote path is unusable
    #[error("invalid remote path: {0}")]
    InvalidPath(String),

    /// The metadata template still lacks fields after an additive update
    #[error("metadata template {template_id} did not converge")]
    SchemaDidNotConverge {
        /// Template that was being extended
        template_id: String,
    },
}

// ============================================================================
// Canonical taxonomy
// ============================================================================

/// Canonical error kind surfaced by every public operation
#[derive(Debug, Error, Clone)]
pub enum SyncError {
    /// No usable credentials
    #[error("not authenticated")]
    NotAuthenticated,

    /// The access token expired; the caller must re-authenticate
    #[error("access token expired")]
    TokenExpired,

    /// The backend throttled the request
    #[error("rate limit exceeded")]
    RateLimitExceeded {
        /// Hint supplied by the backend, if any
        retry_after: Option<Duration>,
    },

    /// The transport failed before a response arrived
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The addressed object or revision does not exist
    #[error("item does not exist")]
    ItemDoesNotExist,

    /// The addressed object is blocked by a content policy
    #[error("restricted content")]
    RestrictedContent,

    /// The backend response was empty or malformed
    #[error("invalid response")]
    InvalidResponse,

    /// A change token did not decode back into a cursor
    #[error("invalid change token ({} bytes)", .0.len())]
    InvalidChangeToken(Vec<u8>),

    /// The operation was cancelled by the caller
    #[error("operation cancelled")]
    Cancelled,

    /// Background authentication was requested without a persisted account
    #[error("no saved credentials")]
    NoSavedCredentials,

    /// The provider rejected the authorization flow
    #[error("authorization failed: {0}")]
    Authorization(String),

    /// A local precondition failed
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The adapter is misconfigured
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A backend failure with no canonical counterpart
    #[error("backend error: {0}")]
    BackendError(ProviderError),
}

impl SyncError {
    /// Returns true if a caller may retry the same operation later
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::RateLimitExceeded { .. } | SyncError::ConnectionFailed(_) => true,
            SyncError::BackendError(ProviderError::Server { .. }) => true,
            _ => false,
        }
    }

    /// Returns true if an optimistic-concurrency write was rejected
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            SyncError::BackendError(ProviderError::Route {
                reason: RouteReason::Conflict,
                ..
            })
        )
    }

    /// Returns true if the caller has to authenticate again
    pub fn requires_authentication(&self) -> bool {
        matches!(self, SyncError::NotAuthenticated | SyncError::TokenExpired)
    }
}

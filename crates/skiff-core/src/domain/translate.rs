//! Translation of raw provider failures into the canonical taxonomy
//!
//! Every backend result passes through [`process`] (or [`from_parts`] for
//! callback-shaped results) at the point of first contact. Downstream code
//! only ever sees [`SyncError`].

use super::errors::{AuthErrorReason, ProviderError, Route, RouteReason, SyncError};

/// Maps a single provider failure to its canonical kind
///
/// Kinds without a canonical counterpart are wrapped in
/// [`SyncError::BackendError`] so the original cause stays available.
pub fn translate(error: ProviderError) -> SyncError {
    match error {
        ProviderError::Auth(AuthErrorReason::InvalidAccessToken) => SyncError::NotAuthenticated,
        ProviderError::Auth(AuthErrorReason::ExpiredAccessToken) => SyncError::TokenExpired,
        ProviderError::RateLimit { retry_after } => SyncError::RateLimitExceeded { retry_after },
        ProviderError::Transport(message) => SyncError::ConnectionFailed(message),
        ProviderError::Route {
            route,
            reason: RouteReason::NotFound,
        } if reports_missing_item(route) => SyncError::ItemDoesNotExist,
        ProviderError::Route {
            route: Route::Download,
            reason: RouteReason::RestrictedContent,
        } => SyncError::RestrictedContent,
        ProviderError::EmptyResponse | ProviderError::Decode(_) => SyncError::InvalidResponse,
        other => SyncError::BackendError(other),
    }
}

/// Routes whose "not found" answer means the addressed item is gone
fn reports_missing_item(route: Route) -> bool {
    matches!(
        route,
        Route::Download | Route::GetMetadata | Route::Delete | Route::ListRevisions
    )
}

/// Translates a provider result, passing successes through untouched
pub fn process<T>(result: Result<T, ProviderError>) -> Result<T, SyncError> {
    result.map_err(translate)
}

/// Translates a callback-shaped `(value, error)` pair
///
/// An error always wins over a value. When neither is present the result
/// is [`SyncError::InvalidResponse`], never a success.
pub fn from_parts<T>(value: Option<T>, error: Option<ProviderError>) -> Result<T, SyncError> {
    match (value, error) {
        (_, Some(error)) => Err(translate(error)),
        (Some(value), None) => Ok(value),
        (None, None) => Err(SyncError::InvalidResponse),
    }
}

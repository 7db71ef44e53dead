//! Opaque change tokens
//!
//! A [`ChangeToken`] is what the caller persists between sync passes. It
//! wraps the provider cursor behind a fixed prefix so that foreign bytes
//! are rejected instead of being sent to the backend as a cursor.

use serde::{Deserialize, Serialize};

use super::errors::SyncError;

/// Prefix written in front of every encoded cursor
const TOKEN_PREFIX: &[u8] = b"skiff.cursor.v1:";

/// Opaque encoding of a provider listing cursor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeToken(Vec<u8>);

impl ChangeToken {
    /// Encodes a provider cursor
    pub fn encode(cursor: &str) -> Self {
        let mut bytes = Vec::with_capacity(TOKEN_PREFIX.len() + cursor.len());
        bytes.extend_from_slice(TOKEN_PREFIX);
        bytes.extend_from_slice(cursor.as_bytes());
        Self(bytes)
    }

    /// Wraps bytes previously obtained from [`ChangeToken::as_bytes`]
    ///
    /// No validation happens here; [`ChangeToken::decode`] rejects bytes
    /// that were not produced by [`ChangeToken::encode`].
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Decodes the token back into the exact cursor it was built from
    ///
    /// # Errors
    /// [`SyncError::InvalidChangeToken`] if the prefix is missing, the
    /// cursor is empty, or the remainder is not valid UTF-8.
    pub fn decode(&self) -> Result<String, SyncError> {
        let invalid = || SyncError::InvalidChangeToken(self.0.clone());

        let cursor = self.0.strip_prefix(TOKEN_PREFIX).ok_or_else(invalid)?;
        if cursor.is_empty() {
            return Err(invalid());
        }

        String::from_utf8(cursor.to_vec()).map_err(|_| invalid())
    }

    /// Returns the raw bytes for persistence
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the token, returning the raw bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

//! Authenticated account profile

use serde::{Deserialize, Serialize};

/// The account a session is authenticated as
///
/// Delivered to every caller waiting on authentication once the session
/// becomes ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Display name of the account owner
    pub name: String,
    /// Primary email address
    pub email_address: String,
}

impl Account {
    pub fn new(name: impl Into<String>, email_address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email_address: email_address.into(),
        }
    }
}

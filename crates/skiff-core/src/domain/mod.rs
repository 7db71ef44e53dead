//! Domain entities and business rules
//!
//! This module contains the core domain types for Skiff:
//! - Remote records, versions and remote files
//! - Opaque change tokens wrapping provider cursors
//! - Metadata keys, values and the negotiated metadata schema
//! - The canonical error taxonomy and its translator

pub mod account;
pub mod change_token;
pub mod errors;
pub mod metadata;
pub mod record;
pub mod schema;
pub mod translate;

// Re-export commonly used types
pub use account::Account;
pub use change_token::ChangeToken;
pub use errors::{
    AuthErrorReason, ConfigurationError, ProviderError, Route, RouteReason, SyncError,
    ValidationError,
};
pub use metadata::{Metadata, MetadataKey, MetadataUpdate, MetadataValue};
pub use record::{FileBlob, RecordId, RecordStatus, RemoteFile, RemoteRecord, RemoteRef, Version};
pub use schema::MetadataSchema;

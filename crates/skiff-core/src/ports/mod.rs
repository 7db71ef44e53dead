//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the use cases depend on. Their implementations
//! live in adapter crates or are supplied by the consuming sync engine.
//!
//! ## Ports Overview
//!
//! - [`RemoteStore`] - Object store operations against the remote backend
//! - [`Authorizer`] - Provider authorization and authenticated client access
//! - [`AccountStore`] - Durable storage of the authenticated account id
//! - [`DataContext`] / [`SyncRecord`] - The caller's local records and queue

pub mod account_store;
pub mod authorizer;
pub mod data_context;
pub mod remote_store;

pub use account_store::{AccountStore, MemoryAccountStore};
pub use authorizer::{AuthorizationOutcome, Authorizer};
pub use data_context::{DataContext, ManagedRecord, SerialQueue, SharedRecord, SyncRecord};
pub use remote_store::{
    AccountProfile, FileEntry, ListEntry, ListFolderPage, ListFolderRequest, PropertyGroup,
    PropertyGroupUpdate, RemoteStore, RevisionEntry, TemplateDescriptor, WriteMode, WriteRequest,
};

//! Use cases for Skiff
//!
//! This module contains the provider-agnostic algorithms that drive a
//! [`RemoteStore`](crate::ports::RemoteStore). Every backend result passes
//! through the error translator before it is surfaced.
//!
//! ## Use Cases
//!
//! - [`SessionManager`] - authorization, directory bootstrap, deauthentication
//! - [`SchemaNegotiator`] - metadata template creation and extension
//! - [`RecordFetcher`] - full and delta fetches over paginated listings
//! - [`RecordTransfer`] - record upload, download, delete and metadata updates
//! - [`FileTransfer`] - file blob upload, download and delete
//! - [`fetch_versions`] - revision history of a record

pub mod fetch_records;
pub mod fetch_versions;
pub mod negotiate_schema;
pub mod session;
pub mod transfer_files;
pub mod transfer_records;

pub use fetch_records::{FetchedChanges, FetchedRecords, RecordFetcher};
pub use fetch_versions::fetch_versions;
pub use negotiate_schema::{SchemaNegotiator, TemplateSettings};
pub use session::{PendingAuthentication, SessionManager, SessionState};
pub use transfer_files::FileTransfer;
pub use transfer_records::RecordTransfer;

//! Remote object store port (driven/secondary port)
//!
//! This module defines the interface to an object-storage backend that
//! offers folder listing with continuation cursors, revisioned objects and
//! per-object custom metadata scoped by a template.
//!
//! ## Design Notes
//!
//! - Every method returns the raw [`ProviderError`] shape. Use cases pass
//!   results through [`crate::domain::translate::process`] before surfacing
//!   anything, so adapters never decide the canonical error kind.
//! - The structs here are port-level DTOs. Use cases map them to domain
//!   entities such as [`RemoteRecord`] and [`RemoteFile`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::domain::errors::ProviderError;
use crate::domain::metadata::{Metadata, MetadataKey};
use crate::domain::record::{RecordStatus, RemoteFile, RemoteRecord, Version};

// ============================================================================
// Listing
// ============================================================================

/// A set of custom metadata fields attached to an object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyGroup {
    pub template_id: String,
    pub fields: Metadata,
}

/// Metadata of a stored file as returned by listing, upload or download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// File name
    pub name: String,
    /// Lower-cased full path; missing for objects outside the user's view
    pub path_lower: Option<String>,
    /// Revision tag of this version of the file
    pub rev: String,
    /// Time the file was last written on the server
    pub server_modified: DateTime<Utc>,
    /// Size in bytes
    pub size: u64,
    /// Attached custom metadata, in the order the backend returned it
    pub property_groups: Vec<PropertyGroup>,
}

impl FileEntry {
    /// Metadata from the first property group, or the fallback if there is none
    fn metadata_or(&self, fallback: Option<&Metadata>) -> Metadata {
        self.property_groups
            .first()
            .map(|group| group.fields.clone())
            .or_else(|| fallback.cloned())
            .unwrap_or_default()
    }

    /// Builds a [`RemoteRecord`] tagged with `status`
    ///
    /// Returns `None` when the entry carries no path to identify it by.
    pub fn to_remote_record(
        &self,
        status: RecordStatus,
        fallback: Option<&Metadata>,
    ) -> Option<RemoteRecord> {
        let identifier = self.path_lower.clone()?;
        Some(RemoteRecord::new(
            identifier,
            Version::new(&self.rev, self.server_modified),
            self.metadata_or(fallback),
            status,
        ))
    }

    /// Builds a [`RemoteFile`], or `None` when the entry has no path
    pub fn to_remote_file(&self, fallback: Option<&Metadata>) -> Option<RemoteFile> {
        Some(RemoteFile {
            identifier: self.path_lower.clone()?,
            version_identifier: self.rev.clone(),
            size: self.size,
            metadata: self.metadata_or(fallback),
        })
    }
}

/// One entry of a folder listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListEntry {
    /// A live file
    File(FileEntry),
    /// A folder
    Folder { path_lower: Option<String> },
    /// A deletion marker for an object that used to exist
    Deleted { path_lower: Option<String> },
}

/// Parameters of the first page of a folder listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFolderRequest {
    pub path: String,
    /// Report deletion markers for removed objects
    pub include_deleted: bool,
    /// Templates whose property groups should be attached to each file
    pub template_ids: Vec<String>,
}

/// One page of a folder listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFolderPage {
    pub entries: Vec<ListEntry>,
    /// Cursor to continue from, or to store once `has_more` is false
    pub cursor: String,
    pub has_more: bool,
}

// ============================================================================
// Writes
// ============================================================================

/// How an upload treats an existing object at the same path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteMode {
    /// Create a new object; fails if one already exists
    Add,
    /// Replace whatever is stored at the path
    Overwrite,
    /// Replace the object only if its current revision is the given one
    Update(String),
}

/// A single-request upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub path: String,
    pub mode: WriteMode,
    pub property_groups: Vec<PropertyGroup>,
    pub data: Vec<u8>,
}

/// Changes to one property group of an existing object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyGroupUpdate {
    pub template_id: String,
    pub add_or_update: Metadata,
    pub remove: Vec<MetadataKey>,
}

// ============================================================================
// Revisions, templates, account
// ============================================================================

/// An entry of a revision listing
///
/// Fields are optional because the backend may return entries the adapter
/// cannot interpret; those are skipped rather than failing the listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RevisionEntry {
    pub rev: Option<String>,
    pub server_modified: Option<DateTime<Utc>>,
}

impl RevisionEntry {
    /// Converts to a [`Version`] if both fields are present
    pub fn to_version(&self) -> Option<Version> {
        Some(Version::new(self.rev.clone()?, self.server_modified?))
    }
}

/// A custom metadata template definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDescriptor {
    pub name: String,
    pub description: String,
    /// Field names; every field holds a string
    pub fields: Vec<String>,
}

/// Profile of the authenticated account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountProfile {
    pub account_id: String,
    pub display_name: String,
    pub email: String,
}

// ============================================================================
// RemoteStore trait
// ============================================================================

/// Port trait for remote object store operations
///
/// Implementations perform exactly one backend request per call and never
/// retry. All paths are absolute (`/<directory>/<name>`).
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetches the profile of the authenticated account
    async fn current_account(&self) -> Result<AccountProfile, ProviderError>;

    /// Fetches metadata of the object at `path`
    async fn get_metadata(&self, path: &str) -> Result<ListEntry, ProviderError>;

    /// Creates a folder at `path`
    async fn create_folder(&self, path: &str) -> Result<(), ProviderError>;

    /// Requests the first page of a folder listing
    async fn list_folder(&self, request: &ListFolderRequest)
        -> Result<ListFolderPage, ProviderError>;

    /// Requests the page following `cursor`
    async fn list_folder_continue(&self, cursor: &str) -> Result<ListFolderPage, ProviderError>;

    /// Uploads an object in one request
    async fn upload(&self, request: WriteRequest) -> Result<FileEntry, ProviderError>;

    /// Downloads an object, optionally at a specific revision
    async fn download(
        &self,
        path: &str,
        rev: Option<&str>,
    ) -> Result<(FileEntry, Vec<u8>), ProviderError>;

    /// Deletes the object at `path`
    async fn delete(&self, path: &str) -> Result<(), ProviderError>;

    /// Lists up to `limit` revisions of the object at `path`
    async fn list_revisions(
        &self,
        path: &str,
        limit: u32,
    ) -> Result<Vec<RevisionEntry>, ProviderError>;

    /// Lists the identifiers of every template owned by the account
    async fn list_templates(&self) -> Result<Vec<String>, ProviderError>;

    /// Fetches a template definition
    async fn get_template(&self, template_id: &str) -> Result<TemplateDescriptor, ProviderError>;

    /// Creates a template and returns its identifier
    async fn add_template(&self, template: &TemplateDescriptor) -> Result<String, ProviderError>;

    /// Adds fields to an existing template
    async fn update_template(
        &self,
        template_id: &str,
        add_fields: &[String],
    ) -> Result<(), ProviderError>;

    /// Adds, updates and removes property fields on an existing object
    async fn update_properties(
        &self,
        path: &str,
        updates: &[PropertyGroupUpdate],
    ) -> Result<(), ProviderError>;
}

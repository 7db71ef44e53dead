//! Remote record and file representations

use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metadata::Metadata;

/// How a record was observed during a sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// Seen during a full fetch
    Normal,
    /// Created or modified since the last change token
    Updated,
    /// Removed since the last change token
    Deleted,
}

/// One point in a record's revision history
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    /// Opaque revision tag assigned by the backend
    pub identifier: String,
    /// Time the revision was written on the server
    pub date: DateTime<Utc>,
}

impl Version {
    pub fn new(identifier: impl Into<String>, date: DateTime<Utc>) -> Self {
        Self {
            identifier: identifier.into(),
            date,
        }
    }
}

/// A record as it exists on the backend
///
/// Built only from a successful provider response. Two records are equal
/// when they share an identifier, regardless of version or metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Provider-assigned path of the object
    pub identifier: String,
    pub version: Version,
    pub metadata: Metadata,
    pub status: RecordStatus,
}

impl RemoteRecord {
    pub fn new(
        identifier: impl Into<String>,
        version: Version,
        metadata: Metadata,
        status: RecordStatus,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            version,
            metadata,
            status,
        }
    }

    /// The reference a caller stores to address this record later
    pub fn remote_ref(&self) -> RemoteRef {
        RemoteRef::new(&self.identifier, &self.version.identifier)
    }
}

impl PartialEq for RemoteRecord {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier
    }
}

impl Eq for RemoteRecord {}

impl Hash for RemoteRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identifier.hash(state);
    }
}

/// Last known remote counterpart of a local record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteRef {
    pub identifier: String,
    pub version_identifier: String,
}

impl RemoteRef {
    pub fn new(identifier: impl Into<String>, version_identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            version_identifier: version_identifier.into(),
        }
    }
}

/// Stable identity of a local record: its type and identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId {
    pub recorded_object_type: String,
    pub recorded_object_identifier: String,
}

impl RecordId {
    pub fn new(
        recorded_object_type: impl Into<String>,
        recorded_object_identifier: impl Into<String>,
    ) -> Self {
        Self {
            recorded_object_type: recorded_object_type.into(),
            recorded_object_identifier: recorded_object_identifier.into(),
        }
    }
}

impl Display for RecordId {
    /// Formats as `<type>-<identifier>`, the file name used on the backend
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.recorded_object_type, self.recorded_object_identifier
        )
    }
}

/// A binary file stored next to the records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Provider-assigned path of the file
    pub identifier: String,
    pub version_identifier: String,
    /// Size in bytes
    pub size: u64,
    pub metadata: Metadata,
}

/// File contents together with the name it is stored under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBlob {
    /// File name inside the working directory
    pub identifier: String,
    pub data: Vec<u8>,
}

impl FileBlob {
    pub fn new(identifier: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            identifier: identifier.into(),
            data: data.into(),
        }
    }
}

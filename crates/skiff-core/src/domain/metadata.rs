//! Custom metadata attached to remote objects
//!
//! Metadata is a flat string-to-string mapping scoped by a template. Writes
//! distinguish "set this value" from "remove this field" with
//! [`MetadataValue`] instead of a nullable string.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Name of a custom metadata field
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataKey(String);

impl MetadataKey {
    pub const RECORDED_OBJECT_TYPE: &'static str = "recordedObjectType";
    pub const RECORDED_OBJECT_IDENTIFIER: &'static str = "recordedObjectIdentifier";
    pub const AUTHOR: &'static str = "author";
    pub const LOCALIZED_NAME: &'static str = "localizedName";
    pub const PREVIOUS_VERSION_IDENTIFIER: &'static str = "previousVersionIdentifier";
    pub const PREVIOUS_VERSION_DATE: &'static str = "previousVersionDate";
    pub const SHA1_HASH: &'static str = "sha1Hash";
    pub const RELATIONSHIP_IDENTIFIER: &'static str = "relationshipIdentifier";
    pub const IS_LOCKED: &'static str = "isLocked";

    /// Creates a key from any field name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns every key the adapter writes
    ///
    /// Used to negotiate the full schema once during authentication, so
    /// later writes only extend it when a caller introduces a new key.
    pub fn all() -> Vec<MetadataKey> {
        [
            Self::RECORDED_OBJECT_TYPE,
            Self::RECORDED_OBJECT_IDENTIFIER,
            Self::AUTHOR,
            Self::LOCALIZED_NAME,
            Self::PREVIOUS_VERSION_IDENTIFIER,
            Self::PREVIOUS_VERSION_DATE,
            Self::SHA1_HASH,
            Self::RELATIONSHIP_IDENTIFIER,
            Self::IS_LOCKED,
        ]
        .into_iter()
        .map(MetadataKey::new)
        .collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for MetadataKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MetadataKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for MetadataKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Metadata as read back from the backend
pub type Metadata = HashMap<MetadataKey, String>;

/// One entry of a metadata update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    /// Add the field or overwrite its value
    Set(String),
    /// Remove the field from the object
    Remove,
}

/// A metadata update mixing additions and removals
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataUpdate {
    entries: HashMap<MetadataKey, MetadataValue>,
}

impl MetadataUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, replacing any previous entry for the same key
    pub fn set(mut self, key: impl Into<MetadataKey>, value: impl Into<String>) -> Self {
        self.entries
            .insert(key.into(), MetadataValue::Set(value.into()));
        self
    }

    /// Marks a field for removal
    pub fn remove(mut self, key: impl Into<MetadataKey>) -> Self {
        self.entries.insert(key.into(), MetadataValue::Remove);
        self
    }

    pub fn insert(&mut self, key: impl Into<MetadataKey>, value: MetadataValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Splits the update into fields to add or update and fields to remove
    ///
    /// Removed keys are sorted so requests are stable.
    pub fn partition(&self) -> (Metadata, Vec<MetadataKey>) {
        let mut add_or_update = Metadata::new();
        let mut remove = Vec::new();

        for (key, value) in &self.entries {
            match value {
                MetadataValue::Set(value) => {
                    add_or_update.insert(key.clone(), value.clone());
                }
                MetadataValue::Remove => remove.push(key.clone()),
            }
        }

        remove.sort();
        (add_or_update, remove)
    }
}

impl FromIterator<(MetadataKey, MetadataValue)> for MetadataUpdate {
    fn from_iter<I: IntoIterator<Item = (MetadataKey, MetadataValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

//! Dropbox wire types
//!
//! Request arguments and response bodies as they appear on the wire, plus
//! their conversions to and from the port DTOs of `skiff-core`. Dropbox
//! unions are serialized with a `.tag` field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skiff_core::domain::Metadata;
use skiff_core::ports::{
    AccountProfile, FileEntry, ListEntry, ListFolderPage, PropertyGroup, PropertyGroupUpdate,
    RevisionEntry, TemplateDescriptor, WriteMode,
};

// ============================================================================
// Property groups
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PropertyField {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct WirePropertyGroup {
    pub template_id: String,
    pub fields: Vec<PropertyField>,
}

fn to_fields(metadata: &Metadata) -> Vec<PropertyField> {
    let mut fields: Vec<PropertyField> = metadata
        .iter()
        .map(|(key, value)| PropertyField {
            name: key.as_str().to_string(),
            value: value.clone(),
        })
        .collect();
    fields.sort_by(|a, b| a.name.cmp(&b.name));
    fields
}

impl From<&PropertyGroup> for WirePropertyGroup {
    fn from(group: &PropertyGroup) -> Self {
        Self {
            template_id: group.template_id.clone(),
            fields: to_fields(&group.fields),
        }
    }
}

impl From<WirePropertyGroup> for PropertyGroup {
    fn from(group: WirePropertyGroup) -> Self {
        Self {
            template_id: group.template_id,
            fields: group
                .fields
                .into_iter()
                .map(|field| (field.name.into(), field.value))
                .collect(),
        }
    }
}

// ============================================================================
// Metadata entries
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireFile {
    pub name: String,
    pub path_lower: Option<String>,
    pub rev: String,
    pub server_modified: DateTime<Utc>,
    pub size: u64,
    #[serde(default)]
    pub property_groups: Vec<WirePropertyGroup>,
}

impl From<WireFile> for FileEntry {
    fn from(file: WireFile) -> Self {
        Self {
            name: file.name,
            path_lower: file.path_lower,
            rev: file.rev,
            server_modified: file.server_modified,
            size: file.size,
            property_groups: file.property_groups.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WirePathOnly {
    pub path_lower: Option<String>,
}

/// `files/Metadata` union
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = ".tag", rename_all = "lowercase")]
pub(crate) enum WireMetadata {
    File(WireFile),
    Folder(WirePathOnly),
    Deleted(WirePathOnly),
}

impl From<WireMetadata> for ListEntry {
    fn from(metadata: WireMetadata) -> Self {
        match metadata {
            WireMetadata::File(file) => ListEntry::File(file.into()),
            WireMetadata::Folder(folder) => ListEntry::Folder {
                path_lower: folder.path_lower,
            },
            WireMetadata::Deleted(deleted) => ListEntry::Deleted {
                path_lower: deleted.path_lower,
            },
        }
    }
}

// ============================================================================
// Listing
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(tag = ".tag", rename_all = "snake_case")]
pub(crate) enum TemplateFilter {
    FilterSome { filter_some: Vec<String> },
}

#[derive(Debug, Serialize)]
pub(crate) struct ListFolderArg<'a> {
    pub path: &'a str,
    pub recursive: bool,
    pub include_deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_property_groups: Option<TemplateFilter>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CursorArg<'a> {
    pub cursor: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListFolderResult {
    pub entries: Vec<WireMetadata>,
    pub cursor: String,
    pub has_more: bool,
}

impl From<ListFolderResult> for ListFolderPage {
    fn from(result: ListFolderResult) -> Self {
        Self {
            entries: result.entries.into_iter().map(Into::into).collect(),
            cursor: result.cursor,
            has_more: result.has_more,
        }
    }
}

// ============================================================================
// Files
// ============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct PathArg<'a> {
    pub path: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateFolderArg<'a> {
    pub path: &'a str,
    pub autorename: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = ".tag", rename_all = "lowercase")]
pub(crate) enum WireWriteMode {
    Add,
    Overwrite,
    Update { update: String },
}

impl From<&WriteMode> for WireWriteMode {
    fn from(mode: &WriteMode) -> Self {
        match mode {
            WriteMode::Add => WireWriteMode::Add,
            WriteMode::Overwrite => WireWriteMode::Overwrite,
            WriteMode::Update(rev) => WireWriteMode::Update {
                update: rev.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct UploadArg<'a> {
    pub path: &'a str,
    pub mode: WireWriteMode,
    pub autorename: bool,
    pub mute: bool,
    pub strict_conflict: bool,
    pub property_groups: Vec<WirePropertyGroup>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DownloadArg<'a> {
    pub path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rev: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ListRevisionsArg<'a> {
    pub path: &'a str,
    pub limit: u32,
}

/// Revisions are decoded one by one so a single bad entry is skipped
#[derive(Debug, Deserialize)]
pub(crate) struct ListRevisionsResult {
    #[serde(default)]
    pub entries: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct WireRevision {
    rev: Option<String>,
    server_modified: Option<DateTime<Utc>>,
}

impl ListRevisionsResult {
    pub fn into_revisions(self) -> Vec<RevisionEntry> {
        self.entries
            .into_iter()
            .map(|entry| match serde_json::from_value::<WireRevision>(entry) {
                Ok(revision) => RevisionEntry {
                    rev: revision.rev,
                    server_modified: revision.server_modified,
                },
                Err(_) => RevisionEntry::default(),
            })
            .collect()
    }
}

// ============================================================================
// Templates and properties
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct FieldType {
    #[serde(rename = ".tag")]
    pub tag: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct FieldTemplate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl FieldTemplate {
    /// Every field the adapter declares holds a string
    pub fn string(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: name.to_string(),
            field_type: FieldType {
                tag: "string".into(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListTemplatesResult {
    pub template_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TemplateIdArg<'a> {
    pub template_id: &'a str,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct TemplateBody {
    pub name: String,
    pub description: String,
    pub fields: Vec<FieldTemplate>,
}

impl From<TemplateBody> for TemplateDescriptor {
    fn from(body: TemplateBody) -> Self {
        Self {
            name: body.name,
            description: body.description,
            fields: body.fields.into_iter().map(|field| field.name).collect(),
        }
    }
}

impl From<&TemplateDescriptor> for TemplateBody {
    fn from(template: &TemplateDescriptor) -> Self {
        Self {
            name: template.name.clone(),
            description: template.description.clone(),
            fields: template
                .fields
                .iter()
                .map(|name| FieldTemplate::string(name))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AddTemplateResult {
    pub template_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateTemplateArg<'a> {
    pub template_id: &'a str,
    pub add_fields: Vec<FieldTemplate>,
}

#[derive(Debug, Serialize)]
pub(crate) struct WirePropertyGroupUpdate {
    pub template_id: String,
    pub add_or_update_fields: Vec<PropertyField>,
    pub remove_fields: Vec<String>,
}

impl From<&PropertyGroupUpdate> for WirePropertyGroupUpdate {
    fn from(update: &PropertyGroupUpdate) -> Self {
        Self {
            template_id: update.template_id.clone(),
            add_or_update_fields: to_fields(&update.add_or_update),
            remove_fields: update
                .remove
                .iter()
                .map(|key| key.as_str().to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdatePropertiesArg<'a> {
    pub path: &'a str,
    pub update_property_groups: Vec<WirePropertyGroupUpdate>,
}

// ============================================================================
// Account
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct WireName {
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FullAccount {
    pub account_id: String,
    pub name: WireName,
    pub email: String,
}

impl From<FullAccount> for AccountProfile {
    fn from(account: FullAccount) -> Self {
        Self {
            account_id: account.account_id,
            display_name: account.name.display_name,
            email: account.email,
        }
    }
}

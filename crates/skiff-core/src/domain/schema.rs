//! Negotiated metadata schema

use std::collections::BTreeSet;

/// A remote metadata template and the field names it declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataSchema {
    pub template_id: String,
    pub fields: BTreeSet<String>,
}

impl MetadataSchema {
    pub fn new(template_id: impl Into<String>, fields: impl IntoIterator<Item = String>) -> Self {
        Self {
            template_id: template_id.into(),
            fields: fields.into_iter().collect(),
        }
    }

    /// Returns the required fields the schema does not declare yet
    pub fn missing_fields<'a, I>(&self, required: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        required
            .into_iter()
            .filter(|field| !self.fields.contains(*field))
            .map(str::to_string)
            .collect()
    }

    /// Returns true if every required field is declared
    pub fn covers<'a, I>(&self, required: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.missing_fields(required).is_empty()
    }
}

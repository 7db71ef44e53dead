//! Metadata schema negotiation
//!
//! Makes sure a metadata template declaring every field a write is about to
//! reference exists on the backend, creating or extending it as needed.
//! The negotiated template is cached for the lifetime of the session.

use std::collections::BTreeSet;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    domain::{
        translate::{process, translate},
        ConfigurationError, MetadataKey, MetadataSchema, RouteReason, SyncError,
    },
    ports::{RemoteStore, TemplateDescriptor},
};

/// Name and description given to a template created on first use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSettings {
    pub name: String,
    pub description: String,
}

/// Negotiates and caches the account's metadata schema
///
/// The cache lock is held for a whole negotiation, so concurrent callers in
/// this process never race each other into creating two templates.
pub struct SchemaNegotiator {
    settings: TemplateSettings,
    cache: Mutex<Option<MetadataSchema>>,
}

impl SchemaNegotiator {
    pub fn new(settings: TemplateSettings) -> Self {
        Self {
            settings,
            cache: Mutex::new(None),
        }
    }

    /// Returns the cached schema, if one has been negotiated
    pub async fn cached(&self) -> Option<MetadataSchema> {
        self.cache.lock().await.clone()
    }

    /// Forgets the cached schema (e.g. after signing out)
    pub async fn reset(&self) {
        *self.cache.lock().await = None;
    }

    /// Ensures a template declaring every key in `required` exists
    ///
    /// # Returns
    /// The template identifier to attach metadata with
    ///
    /// # Errors
    /// Translated backend errors, or
    /// [`ConfigurationError::SchemaDidNotConverge`] if an additive update was
    /// accepted but the template still lacks fields afterwards.
    pub async fn ensure_schema(
        &self,
        client: &dyn RemoteStore,
        required: &[MetadataKey],
    ) -> Result<String, SyncError> {
        let required: BTreeSet<&str> = required.iter().map(MetadataKey::as_str).collect();
        let mut cache = self.cache.lock().await;

        let schema = match cache.as_ref() {
            Some(schema) => schema.clone(),
            None => match self.adopt_existing(client).await? {
                Some(schema) => {
                    *cache = Some(schema.clone());
                    schema
                }
                None => {
                    let schema = self.create(client, &required).await?;
                    *cache = Some(schema.clone());
                    return Ok(schema.template_id);
                }
            },
        };

        if schema.covers(required.iter().copied()) {
            debug!(template_id = %schema.template_id, "Metadata schema already covers fields");
            return Ok(schema.template_id);
        }

        let extended = self.extend(client, &schema, &required).await?;
        let template_id = extended.template_id.clone();
        *cache = Some(extended);
        Ok(template_id)
    }

    /// Lists templates and fetches the first one, if any exists
    async fn adopt_existing(
        &self,
        client: &dyn RemoteStore,
    ) -> Result<Option<MetadataSchema>, SyncError> {
        let template_ids = process(client.list_templates().await)?;
        let Some(template_id) = template_ids.into_iter().next() else {
            return Ok(None);
        };

        let schema = self.fetch(client, &template_id).await?;
        info!(template_id = %schema.template_id, fields = schema.fields.len(), "Adopted existing metadata template");
        Ok(Some(schema))
    }

    async fn fetch(
        &self,
        client: &dyn RemoteStore,
        template_id: &str,
    ) -> Result<MetadataSchema, SyncError> {
        let template = process(client.get_template(template_id).await)?;
        Ok(MetadataSchema::new(template_id, template.fields))
    }

    /// Creates a template with exactly the required fields
    ///
    /// A conflict means another client created one between our listing and
    /// this request; that template is adopted instead.
    async fn create(
        &self,
        client: &dyn RemoteStore,
        required: &BTreeSet<&str>,
    ) -> Result<MetadataSchema, SyncError> {
        let descriptor = TemplateDescriptor {
            name: self.settings.name.clone(),
            description: self.settings.description.clone(),
            fields: required.iter().map(|f| f.to_string()).collect(),
        };

        match client.add_template(&descriptor).await {
            Ok(template_id) => {
                info!(%template_id, fields = descriptor.fields.len(), "Created metadata template");
                self.fetch(client, &template_id).await
            }
            Err(error) if error.has_reason(&RouteReason::Conflict) => {
                warn!("Metadata template was created concurrently, adopting it");
                let schema = self
                    .adopt_existing(client)
                    .await?
                    .ok_or_else(|| translate(error))?;
                self.extend(client, &schema, required).await
            }
            Err(error) => Err(translate(error)),
        }
    }

    /// Submits the missing fields as one additive update and refetches
    async fn extend(
        &self,
        client: &dyn RemoteStore,
        schema: &MetadataSchema,
        required: &BTreeSet<&str>,
    ) -> Result<MetadataSchema, SyncError> {
        let missing: Vec<String> = schema
            .missing_fields(required.iter().copied())
            .into_iter()
            .collect();
        if missing.is_empty() {
            return Ok(schema.clone());
        }

        info!(template_id = %schema.template_id, added = ?missing, "Extending metadata template");
        process(client.update_template(&schema.template_id, &missing).await)?;

        let refreshed = self.fetch(client, &schema.template_id).await?;
        if !refreshed.covers(required.iter().copied()) {
            warn!(template_id = %schema.template_id, "Metadata template did not converge after update");
            return Err(ConfigurationError::SchemaDidNotConverge {
                template_id: schema.template_id.clone(),
            }
            .into());
        }
        Ok(refreshed)
    }
}

//! Record transfer: upload, download, delete and metadata updates
//!
//! Every operation addresses a single remote object derived from a
//! [`SyncRecord`]. Local validation (missing counterpart, missing local
//! record, bad working directory) happens before any request is sent.

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    config::RemoteConfig,
    domain::{
        translate::process, Metadata, MetadataKey, MetadataUpdate, RecordId, RecordStatus,
        RemoteRecord, RemoteRef, SyncError, ValidationError, Version,
    },
    ports::{
        DataContext, PropertyGroup, PropertyGroupUpdate, RemoteStore, SyncRecord, WriteMode,
        WriteRequest,
    },
    usecases::negotiate_schema::SchemaNegotiator,
};

/// Returns the record's remote counterpart or fails locally
pub(crate) fn require_counterpart<R: SyncRecord>(record: &R) -> Result<RemoteRef, SyncError> {
    record.perform(|managed| {
        managed
            .remote_record
            .clone()
            .ok_or_else(|| ValidationError::MissingRemoteRecord(managed.record_id.to_string()).into())
    })
}

/// Transfers records between the data context and the remote store
pub struct RecordTransfer {
    remote: RemoteConfig,
    negotiator: Arc<SchemaNegotiator>,
}

impl RecordTransfer {
    pub fn new(remote: RemoteConfig, negotiator: Arc<SchemaNegotiator>) -> Self {
        Self { remote, negotiator }
    }

    /// Uploads the record's local representation with `metadata` attached
    ///
    /// A record without a remote counterpart is created at
    /// `/<directory>/<type>-<identifier>` and fails if something already
    /// exists there. A record with a counterpart is only written if the
    /// remote object is still at the counterpart's version; otherwise the
    /// backend conflict is returned (see [`SyncError::is_conflict`]).
    pub async fn upload<R: SyncRecord>(
        &self,
        client: &dyn RemoteStore,
        record: &R,
        metadata: &Metadata,
    ) -> Result<RemoteRecord, SyncError> {
        let (record_id, counterpart, data) = record.perform(|managed| {
            managed.encode_local_record().map(|data| {
                (
                    managed.record_id.clone(),
                    managed.remote_record.clone(),
                    data,
                )
            })
        })?;

        let (path, mode) = match counterpart {
            Some(remote) => (remote.identifier, WriteMode::Update(remote.version_identifier)),
            None => (self.new_record_path(&record_id)?, WriteMode::Add),
        };

        let keys: Vec<MetadataKey> = metadata.keys().cloned().collect();
        let template_id = self.negotiator.ensure_schema(client, &keys).await?;

        debug!(record = %record_id, %path, ?mode, bytes = data.len(), "Uploading record");
        let request = WriteRequest {
            path,
            mode,
            property_groups: vec![PropertyGroup {
                template_id,
                fields: metadata.clone(),
            }],
            data,
        };
        let entry = process(client.upload(request).await)?;

        let remote_record = entry
            .to_remote_record(RecordStatus::Normal, Some(metadata))
            .ok_or(SyncError::InvalidResponse)?;
        info!(record = %record_id, version = %remote_record.version.identifier, "Uploaded record");
        Ok(remote_record)
    }

    fn new_record_path(&self, record_id: &RecordId) -> Result<String, SyncError> {
        Ok(self.remote.remote_path(Some(&record_id.to_string()))?)
    }

    /// Downloads `version` of the record and decodes it in `context`
    ///
    /// # Errors
    /// [`SyncError::ItemDoesNotExist`] if that version cannot be found.
    pub async fn download<C: DataContext, R: SyncRecord>(
        &self,
        client: &dyn RemoteStore,
        context: &C,
        record: &R,
        version: &Version,
    ) -> Result<C::LocalRecord, SyncError> {
        let remote = require_counterpart(record)?;

        debug!(path = %remote.identifier, version = %version.identifier, "Downloading record");
        let (_, bytes) = process(
            client
                .download(&remote.identifier, Some(&version.identifier))
                .await,
        )?;

        let local_record = context
            .queue()
            .perform(|| context.decode_local_record(&bytes))
            .await?;
        info!(path = %remote.identifier, bytes = bytes.len(), "Downloaded record");
        Ok(local_record)
    }

    /// Deletes the record's remote counterpart
    ///
    /// A missing object is reported as [`SyncError::ItemDoesNotExist`];
    /// callers decide whether that counts as success.
    pub async fn delete<R: SyncRecord>(
        &self,
        client: &dyn RemoteStore,
        record: &R,
    ) -> Result<(), SyncError> {
        let remote = require_counterpart(record)?;

        process(client.delete(&remote.identifier).await)?;
        info!(path = %remote.identifier, "Deleted record");
        Ok(())
    }

    /// Applies `update` to the metadata of the record's remote counterpart
    ///
    /// Set entries are added or overwritten and removed entries are cleared,
    /// all in one request.
    pub async fn update_metadata<R: SyncRecord>(
        &self,
        client: &dyn RemoteStore,
        update: &MetadataUpdate,
        record: &R,
    ) -> Result<(), SyncError> {
        let remote = require_counterpart(record)?;
        let (add_or_update, remove) = update.partition();

        let keys: Vec<MetadataKey> = add_or_update.keys().cloned().collect();
        let template_id = self.negotiator.ensure_schema(client, &keys).await?;

        debug!(
            path = %remote.identifier,
            updated = add_or_update.len(),
            removed = remove.len(),
            "Updating record metadata"
        );
        let group = PropertyGroupUpdate {
            template_id,
            add_or_update,
            remove,
        };
        process(client.update_properties(&remote.identifier, &[group]).await)?;
        Ok(())
    }
}

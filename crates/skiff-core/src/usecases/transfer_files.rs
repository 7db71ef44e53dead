//! File blob transfer
//!
//! Files are stored next to records in the working directory under their
//! own identifier. Unlike records they are not version-guarded: uploading a
//! blob with an existing identifier replaces it.

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    config::RemoteConfig,
    domain::{
        translate::process, FileBlob, Metadata, MetadataKey, RemoteFile, SyncError,
    },
    ports::{PropertyGroup, RemoteStore, SyncRecord, WriteMode, WriteRequest},
    usecases::negotiate_schema::SchemaNegotiator,
};

pub struct FileTransfer {
    remote: RemoteConfig,
    negotiator: Arc<SchemaNegotiator>,
}

impl FileTransfer {
    pub fn new(remote: RemoteConfig, negotiator: Arc<SchemaNegotiator>) -> Self {
        Self { remote, negotiator }
    }

    /// Uploads a blob belonging to `record`
    pub async fn upload_file<R: SyncRecord>(
        &self,
        client: &dyn RemoteStore,
        file: &FileBlob,
        record: &R,
        metadata: &Metadata,
    ) -> Result<RemoteFile, SyncError> {
        let path = self.remote.remote_path(Some(&file.identifier))?;
        let keys: Vec<MetadataKey> = metadata.keys().cloned().collect();
        let template_id = self.negotiator.ensure_schema(client, &keys).await?;

        debug!(record = %record.record_id(), %path, bytes = file.data.len(), "Uploading file");
        let request = WriteRequest {
            path,
            mode: WriteMode::Overwrite,
            property_groups: vec![PropertyGroup {
                template_id,
                fields: metadata.clone(),
            }],
            data: file.data.clone(),
        };
        let entry = process(client.upload(request).await)?;

        let remote_file = entry
            .to_remote_file(Some(metadata))
            .ok_or(SyncError::InvalidResponse)?;
        info!(file = %file.identifier, version = %remote_file.version_identifier, "Uploaded file");
        Ok(remote_file)
    }

    /// Downloads the version of the blob `remote_file` refers to
    pub async fn download_file(
        &self,
        client: &dyn RemoteStore,
        remote_file: &RemoteFile,
    ) -> Result<FileBlob, SyncError> {
        let (entry, data) = process(
            client
                .download(
                    &remote_file.identifier,
                    Some(&remote_file.version_identifier),
                )
                .await,
        )?;

        debug!(file = %remote_file.identifier, bytes = data.len(), "Downloaded file");
        Ok(FileBlob::new(entry.name, data))
    }

    pub async fn delete_file(
        &self,
        client: &dyn RemoteStore,
        remote_file: &RemoteFile,
    ) -> Result<(), SyncError> {
        process(client.delete(&remote_file.identifier).await)?;
        info!(file = %remote_file.identifier, "Deleted file");
        Ok(())
    }
}

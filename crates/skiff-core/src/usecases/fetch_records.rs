//! Incremental record fetching
//!
//! Walks the working directory listing page by page. A full fetch starts
//! without a cursor; a delta fetch resumes from the cursor encoded in a
//! [`ChangeToken`]. Either way the last page's cursor becomes the next
//! change token.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    config::RemoteConfig,
    domain::{
        translate::process, ChangeToken, MetadataKey, RecordStatus, RemoteRecord, SyncError,
    },
    ports::{DataContext, ListEntry, ListFolderPage, ListFolderRequest, RemoteStore},
    usecases::negotiate_schema::SchemaNegotiator,
};

/// Result of a full fetch
#[derive(Debug, Clone)]
pub struct FetchedRecords {
    pub records: HashSet<RemoteRecord>,
    pub change_token: ChangeToken,
}

/// Result of a delta fetch
#[derive(Debug, Clone)]
pub struct FetchedChanges {
    pub updated: HashSet<RemoteRecord>,
    /// Identifiers of records removed since the previous token
    pub deleted: HashSet<String>,
    pub change_token: ChangeToken,
}

/// Accumulates one listing pass
///
/// An identifier lives in at most one of the two sets; whichever entry for
/// it was listed last wins.
#[derive(Debug, Default)]
struct Accumulator {
    updated: HashMap<String, RemoteRecord>,
    deleted: HashSet<String>,
}

impl Accumulator {
    fn absorb(&mut self, entries: Vec<ListEntry>, status: RecordStatus) {
        for entry in entries {
            match entry {
                ListEntry::File(file) => {
                    let Some(record) = file.to_remote_record(status, None) else {
                        debug!(name = %file.name, "Skipping file without a path");
                        continue;
                    };
                    self.deleted.remove(&record.identifier);
                    self.updated.insert(record.identifier.clone(), record);
                }
                ListEntry::Deleted {
                    path_lower: Some(identifier),
                } => {
                    self.updated.remove(&identifier);
                    self.deleted.insert(identifier);
                }
                ListEntry::Deleted { path_lower: None } | ListEntry::Folder { .. } => {}
            }
        }
    }
}

/// Runs full and delta fetches against the working directory
pub struct RecordFetcher {
    remote: RemoteConfig,
    negotiator: Arc<SchemaNegotiator>,
}

impl RecordFetcher {
    pub fn new(remote: RemoteConfig, negotiator: Arc<SchemaNegotiator>) -> Self {
        Self { remote, negotiator }
    }

    /// Lists every record in the working directory
    pub async fn fetch_all<C: DataContext>(
        &self,
        client: &dyn RemoteStore,
        context: &C,
    ) -> Result<FetchedRecords, SyncError> {
        let (accumulator, change_token) =
            self.paginate(client, context, None, RecordStatus::Normal).await?;

        info!(records = accumulator.updated.len(), "Fetched all remote records");
        Ok(FetchedRecords {
            records: accumulator.updated.into_values().collect(),
            change_token,
        })
    }

    /// Lists the records changed since `change_token` was issued
    ///
    /// # Errors
    /// [`SyncError::InvalidChangeToken`] before any request if the token
    /// does not decode to a cursor.
    pub async fn fetch_changes<C: DataContext>(
        &self,
        client: &dyn RemoteStore,
        context: &C,
        change_token: &ChangeToken,
    ) -> Result<FetchedChanges, SyncError> {
        let cursor = change_token.decode()?;
        let (accumulator, change_token) = self
            .paginate(client, context, Some(cursor), RecordStatus::Updated)
            .await?;

        info!(
            updated = accumulator.updated.len(),
            deleted = accumulator.deleted.len(),
            "Fetched changed remote records"
        );
        Ok(FetchedChanges {
            updated: accumulator.updated.into_values().collect(),
            deleted: accumulator.deleted,
            change_token,
        })
    }

    async fn paginate<C: DataContext>(
        &self,
        client: &dyn RemoteStore,
        context: &C,
        mut cursor: Option<String>,
        status: RecordStatus,
    ) -> Result<(Accumulator, ChangeToken), SyncError> {
        let path = self.remote.remote_path(None)?;
        let template_id = self
            .negotiator
            .ensure_schema(client, &MetadataKey::all())
            .await?;

        let mut accumulator = Accumulator::default();
        let mut page_number = 0u32;

        loop {
            page_number += 1;
            debug!(page = page_number, resuming = cursor.is_some(), "Requesting listing page");

            let page = match cursor.as_deref() {
                Some(cursor) => client.list_folder_continue(cursor).await,
                None => {
                    let request = ListFolderRequest {
                        path: path.clone(),
                        include_deleted: true,
                        template_ids: vec![template_id.clone()],
                    };
                    client.list_folder(&request).await
                }
            };
            let ListFolderPage {
                entries,
                cursor: next_cursor,
                has_more,
            } = process(page)?;
            if next_cursor.is_empty() {
                warn!(page = page_number, "Listing page carried no cursor");
                return Err(SyncError::InvalidResponse);
            }

            debug!(page = page_number, entries = entries.len(), has_more, "Received listing page");
            context
                .queue()
                .perform(|| accumulator.absorb(entries, status))
                .await;

            if !has_more {
                return Ok((accumulator, ChangeToken::encode(&next_cursor)));
            }
            cursor = Some(next_cursor);
        }
    }
}

//! Revision history of a record

use tracing::debug;

use crate::{
    domain::{translate::process, SyncError, Version},
    ports::{RemoteStore, SyncRecord},
    usecases::transfer_records::require_counterpart,
};

/// Lists the versions of the record's remote counterpart
///
/// A single page of at most `limit` entries is requested. Entries missing a
/// revision tag or timestamp are skipped.
pub async fn fetch_versions<R: SyncRecord>(
    client: &dyn RemoteStore,
    record: &R,
    limit: u32,
) -> Result<Vec<Version>, SyncError> {
    let remote = require_counterpart(record)?;

    let entries = process(client.list_revisions(&remote.identifier, limit).await)?;
    let total = entries.len();
    let versions: Vec<Version> = entries.iter().filter_map(|entry| entry.to_version()).collect();

    debug!(
        path = %remote.identifier,
        versions = versions.len(),
        skipped = total - versions.len(),
        "Fetched record versions"
    );
    Ok(versions)
}

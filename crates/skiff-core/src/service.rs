//! Service facade exposed to the consuming sync engine
//!
//! [`RemoteService`] wires the use cases together around one session and one
//! data context. Every remote operation runs on its own task and returns a
//! [`Progress`] handle that can be awaited or cancelled.

use std::sync::Arc;

use crate::{
    config::Config,
    domain::{
        ChangeToken, FileBlob, Metadata, MetadataUpdate, RemoteFile, RemoteRecord, SyncError,
        Version,
    },
    ports::{AccountStore, Authorizer, DataContext, RemoteStore, SyncRecord},
    progress::Progress,
    usecases::{
        fetch_versions, FetchedChanges, FetchedRecords, FileTransfer, PendingAuthentication,
        RecordFetcher, RecordTransfer, SchemaNegotiator, SessionManager, TemplateSettings,
    },
};

/// Entry point for everything the sync engine asks of the backend
///
/// Operations spawn onto the current Tokio runtime and panic if there is
/// none.
pub struct RemoteService<C: DataContext> {
    session: Arc<SessionManager>,
    context: Arc<C>,
    fetcher: Arc<RecordFetcher>,
    records: Arc<RecordTransfer>,
    files: Arc<FileTransfer>,
    revision_limit: u32,
}

impl<C: DataContext> RemoteService<C> {
    /// Creates a service for `context`
    ///
    /// # Arguments
    ///
    /// * `config` - Working directory, template and revision settings
    /// * `authorizer` - Provider authorization flow
    /// * `account_store` - Durable storage for the account identifier
    /// * `context` - The caller's data context
    pub fn new(
        config: &Config,
        authorizer: Arc<dyn Authorizer>,
        account_store: Arc<dyn AccountStore>,
        context: Arc<C>,
    ) -> Self {
        let remote = config.remote.clone();
        let negotiator = Arc::new(SchemaNegotiator::new(TemplateSettings {
            name: remote.template_name.clone(),
            description: remote.template_description.clone(),
        }));

        Self {
            session: Arc::new(SessionManager::new(
                authorizer,
                account_store,
                Arc::clone(&negotiator),
                remote.clone(),
            )),
            context,
            fetcher: Arc::new(RecordFetcher::new(remote.clone(), Arc::clone(&negotiator))),
            records: Arc::new(RecordTransfer::new(remote.clone(), Arc::clone(&negotiator))),
            files: Arc::new(FileTransfer::new(remote.clone(), negotiator)),
            revision_limit: remote.revision_limit,
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    /// Starts interactive authorization
    pub fn authenticate(&self) -> PendingAuthentication {
        self.session.begin_interactive_auth()
    }

    /// Restores the persisted session without user interaction
    pub fn authenticate_in_background(&self) -> PendingAuthentication {
        self.session.resume_from_persisted_session()
    }

    pub async fn deauthenticate(&self) {
        self.session.deauthenticate().await;
    }

    /// Spawns `operation` with the authenticated client
    fn run<T, F, Fut>(&self, operation: F) -> Progress<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn RemoteStore>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<T, SyncError>> + Send + 'static,
    {
        let session = Arc::clone(&self.session);
        Progress::spawn(async move {
            let client = session.client()?;
            operation(client).await
        })
    }

    // ========================================================================
    // Records
    // ========================================================================

    pub fn fetch_all_remote_records(&self) -> Progress<FetchedRecords> {
        let fetcher = Arc::clone(&self.fetcher);
        let context = Arc::clone(&self.context);
        self.run(move |client| async move { fetcher.fetch_all(client.as_ref(), context.as_ref()).await })
    }

    pub fn fetch_changed_remote_records(&self, change_token: ChangeToken) -> Progress<FetchedChanges> {
        let fetcher = Arc::clone(&self.fetcher);
        let context = Arc::clone(&self.context);
        self.run(move |client| async move {
            fetcher
                .fetch_changes(client.as_ref(), context.as_ref(), &change_token)
                .await
        })
    }

    pub fn upload<R>(&self, record: Arc<R>, metadata: Metadata) -> Progress<RemoteRecord>
    where
        R: SyncRecord + 'static,
    {
        let records = Arc::clone(&self.records);
        self.run(move |client| async move {
            records
                .upload(client.as_ref(), record.as_ref(), &metadata)
                .await
        })
    }

    pub fn download<R>(&self, record: Arc<R>, version: Version) -> Progress<C::LocalRecord>
    where
        R: SyncRecord + 'static,
    {
        let records = Arc::clone(&self.records);
        let context = Arc::clone(&self.context);
        self.run(move |client| async move {
            records
                .download(client.as_ref(), context.as_ref(), record.as_ref(), &version)
                .await
        })
    }

    pub fn delete<R>(&self, record: Arc<R>) -> Progress<()>
    where
        R: SyncRecord + 'static,
    {
        let records = Arc::clone(&self.records);
        self.run(move |client| async move { records.delete(client.as_ref(), record.as_ref()).await })
    }

    pub fn update_metadata<R>(&self, update: MetadataUpdate, record: Arc<R>) -> Progress<()>
    where
        R: SyncRecord + 'static,
    {
        let records = Arc::clone(&self.records);
        self.run(move |client| async move {
            records
                .update_metadata(client.as_ref(), &update, record.as_ref())
                .await
        })
    }

    pub fn fetch_versions<R>(&self, record: Arc<R>) -> Progress<Vec<Version>>
    where
        R: SyncRecord + 'static,
    {
        let limit = self.revision_limit;
        self.run(move |client| async move {
            fetch_versions(client.as_ref(), record.as_ref(), limit).await
        })
    }

    // ========================================================================
    // Files
    // ========================================================================

    pub fn upload_file<R>(&self, file: FileBlob, record: Arc<R>, metadata: Metadata) -> Progress<RemoteFile>
    where
        R: SyncRecord + 'static,
    {
        let files = Arc::clone(&self.files);
        self.run(move |client| async move {
            files
                .upload_file(client.as_ref(), &file, record.as_ref(), &metadata)
                .await
        })
    }

    pub fn download_file(&self, remote_file: RemoteFile) -> Progress<FileBlob> {
        let files = Arc::clone(&self.files);
        self.run(move |client| async move { files.download_file(client.as_ref(), &remote_file).await })
    }

    pub fn delete_file(&self, remote_file: RemoteFile) -> Progress<()> {
        let files = Arc::clone(&self.files);
        self.run(move |client| async move { files.delete_file(client.as_ref(), &remote_file).await })
    }
}

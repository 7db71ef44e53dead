//! In-memory [`RemoteStore`] used by the unit tests
//!
//! Behaves like a small object store: uploads honour write modes, templates
//! can be listed, created and extended, and listing pages are served from a
//! script. Every call is recorded so tests can assert on request counts.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::{AuthErrorReason, ProviderError, Route, RouteReason};
use crate::ports::authorizer::{AuthorizationOutcome, Authorizer};
use crate::ports::data_context::{DataContext, SerialQueue};
use crate::ports::remote_store::{
    AccountProfile, FileEntry, ListEntry, ListFolderPage, ListFolderRequest, PropertyGroup,
    PropertyGroupUpdate, RemoteStore, RevisionEntry, TemplateDescriptor, WriteMode, WriteRequest,
};

pub fn timestamp(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 10, minute, 0).unwrap()
}

pub fn file_entry(path: &str, rev: &str) -> FileEntry {
    FileEntry {
        name: path.rsplit('/').next().unwrap_or(path).to_string(),
        path_lower: Some(path.to_lowercase()),
        rev: rev.to_string(),
        server_modified: timestamp(0),
        size: 0,
        property_groups: Vec::new(),
    }
}

pub fn page(entries: Vec<ListEntry>, cursor: &str, has_more: bool) -> ListFolderPage {
    ListFolderPage {
        entries,
        cursor: cursor.to_string(),
        has_more,
    }
}

pub fn not_found(route: Route) -> ProviderError {
    ProviderError::Route {
        route,
        reason: RouteReason::NotFound,
    }
}

#[derive(Debug, Clone)]
struct StoredObject {
    entry: FileEntry,
    data: Vec<u8>,
}

#[derive(Default)]
struct State {
    calls: Vec<String>,
    pages: VecDeque<Result<ListFolderPage, ProviderError>>,
    folders: Vec<String>,
    objects: HashMap<String, StoredObject>,
    revisions: Vec<RevisionEntry>,
    templates: Vec<(String, TemplateDescriptor)>,
    failures: HashMap<&'static str, ProviderError>,
    next_rev: u32,
    race_on_add: bool,
    ignore_template_updates: bool,
    delay: Option<Duration>,
}

/// Scriptable in-memory object store
#[derive(Clone, Default)]
pub struct FakeStore {
    state: Arc<Mutex<State>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    // --- scripting ---

    pub fn with_folder(self, path: &str) -> Self {
        self.state().folders.push(path.to_lowercase());
        self
    }

    pub fn with_pages(self, pages: Vec<ListFolderPage>) -> Self {
        self.state().pages.extend(pages.into_iter().map(Ok));
        self
    }

    pub fn with_page_error(self, error: ProviderError) -> Self {
        self.state().pages.push_back(Err(error));
        self
    }

    pub fn with_template(self, id: &str, fields: &[&str]) -> Self {
        self.state().templates.push((
            id.to_string(),
            TemplateDescriptor {
                name: "Skiff".into(),
                description: "Skiff syncing metadata.".into(),
                fields: fields.iter().map(|f| f.to_string()).collect(),
            },
        ));
        self
    }

    pub fn with_object(self, path: &str, rev: &str, data: &[u8]) -> Self {
        let entry = file_entry(path, rev);
        self.state().objects.insert(
            path.to_lowercase(),
            StoredObject {
                entry,
                data: data.to_vec(),
            },
        );
        self
    }

    pub fn with_revisions(self, revisions: Vec<RevisionEntry>) -> Self {
        self.state().revisions = revisions;
        self
    }

    /// Fails every call of `op` with `error`
    pub fn failing(self, op: &'static str, error: ProviderError) -> Self {
        self.state().failures.insert(op, error);
        self
    }

    /// Simulates another client creating a template between list and add
    pub fn racing_template_creation(self) -> Self {
        self.state().race_on_add = true;
        self
    }

    /// Accepts template updates without applying them
    pub fn ignoring_template_updates(self) -> Self {
        self.state().ignore_template_updates = true;
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.set_delay(delay);
        self
    }

    /// Delays every subsequent call by `delay`
    pub fn set_delay(&self, delay: Duration) {
        self.state().delay = Some(delay);
    }

    // --- inspection ---

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.split(' ').next() == Some(op))
            .count()
    }

    pub fn template_fields(&self, id: &str) -> Option<Vec<String>> {
        self.state()
            .templates
            .iter()
            .find(|(template_id, _)| template_id == id)
            .map(|(_, template)| template.fields.clone())
    }

    pub fn template_count(&self) -> usize {
        self.state().templates.len()
    }

    pub fn has_folder(&self, path: &str) -> bool {
        self.state().folders.contains(&path.to_lowercase())
    }

    pub fn object(&self, path: &str) -> Option<(FileEntry, Vec<u8>)> {
        self.state()
            .objects
            .get(&path.to_lowercase())
            .map(|object| (object.entry.clone(), object.data.clone()))
    }

    // --- internals ---

    async fn enter(&self, op: &'static str, detail: &str) -> Result<(), ProviderError> {
        let delay = {
            let mut state = self.state();
            state.calls.push(format!("{op} {detail}").trim_end().to_string());
            state.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.state().failures.get(op) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn next_page(&self) -> Result<ListFolderPage, ProviderError> {
        self.state()
            .pages
            .pop_front()
            .unwrap_or(Err(ProviderError::EmptyResponse))
    }
}

#[async_trait]
impl RemoteStore for FakeStore {
    async fn current_account(&self) -> Result<AccountProfile, ProviderError> {
        self.enter("current_account", "").await?;
        Ok(AccountProfile {
            account_id: "dbid:alice".into(),
            display_name: "Alice Liddell".into(),
            email: "alice@example.com".into(),
        })
    }

    async fn get_metadata(&self, path: &str) -> Result<ListEntry, ProviderError> {
        self.enter("get_metadata", path).await?;
        let state = self.state();
        let path = path.to_lowercase();
        if state.folders.contains(&path) {
            return Ok(ListEntry::Folder {
                path_lower: Some(path),
            });
        }
        match state.objects.get(&path) {
            Some(object) => Ok(ListEntry::File(object.entry.clone())),
            None => Err(not_found(Route::GetMetadata)),
        }
    }

    async fn create_folder(&self, path: &str) -> Result<(), ProviderError> {
        self.enter("create_folder", path).await?;
        self.state().folders.push(path.to_lowercase());
        Ok(())
    }

    async fn list_folder(
        &self,
        request: &ListFolderRequest,
    ) -> Result<ListFolderPage, ProviderError> {
        let detail = format!("{} {}", request.path, request.template_ids.join(","));
        self.enter("list_folder", &detail).await?;
        self.next_page()
    }

    async fn list_folder_continue(&self, cursor: &str) -> Result<ListFolderPage, ProviderError> {
        self.enter("list_folder_continue", cursor).await?;
        self.next_page()
    }

    async fn upload(&self, request: WriteRequest) -> Result<FileEntry, ProviderError> {
        self.enter("upload", &request.path).await?;
        let conflict = ProviderError::Route {
            route: Route::Upload,
            reason: RouteReason::Conflict,
        };

        let mut state = self.state();
        let key = request.path.to_lowercase();
        let existing = state.objects.get(&key).map(|o| o.entry.rev.clone());
        match (&request.mode, existing) {
            (WriteMode::Add, Some(_)) => return Err(conflict),
            (WriteMode::Update(expected), Some(current)) if *expected != current => {
                return Err(conflict)
            }
            (WriteMode::Update(_), None) => return Err(conflict),
            _ => {}
        }

        state.next_rev += 1;
        let mut entry = file_entry(&request.path, &format!("rev{:03}", state.next_rev));
        entry.size = request.data.len() as u64;
        entry.server_modified = timestamp(state.next_rev);
        entry.property_groups = request.property_groups.clone();
        state.objects.insert(
            key,
            StoredObject {
                entry: entry.clone(),
                data: request.data,
            },
        );
        Ok(entry)
    }

    async fn download(
        &self,
        path: &str,
        rev: Option<&str>,
    ) -> Result<(FileEntry, Vec<u8>), ProviderError> {
        self.enter("download", &format!("{path} {}", rev.unwrap_or("")))
            .await?;
        let state = self.state();
        match state.objects.get(&path.to_lowercase()) {
            Some(object) if rev.map_or(true, |rev| rev == object.entry.rev) => {
                Ok((object.entry.clone(), object.data.clone()))
            }
            _ => Err(not_found(Route::Download)),
        }
    }

    async fn delete(&self, path: &str) -> Result<(), ProviderError> {
        self.enter("delete", path).await?;
        match self.state().objects.remove(&path.to_lowercase()) {
            Some(_) => Ok(()),
            None => Err(not_found(Route::Delete)),
        }
    }

    async fn list_revisions(
        &self,
        path: &str,
        limit: u32,
    ) -> Result<Vec<RevisionEntry>, ProviderError> {
        self.enter("list_revisions", &format!("{path} {limit}")).await?;
        let state = self.state();
        if !state.objects.contains_key(&path.to_lowercase()) {
            return Err(not_found(Route::ListRevisions));
        }
        Ok(state.revisions.iter().take(limit as usize).cloned().collect())
    }

    async fn list_templates(&self) -> Result<Vec<String>, ProviderError> {
        self.enter("list_templates", "").await?;
        Ok(self
            .state()
            .templates
            .iter()
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn get_template(&self, template_id: &str) -> Result<TemplateDescriptor, ProviderError> {
        self.enter("get_template", template_id).await?;
        self.state()
            .templates
            .iter()
            .find(|(id, _)| id == template_id)
            .map(|(_, template)| template.clone())
            .ok_or(not_found(Route::GetTemplate))
    }

    async fn add_template(&self, template: &TemplateDescriptor) -> Result<String, ProviderError> {
        self.enter("add_template", &template.fields.join(",")).await?;
        let mut state = self.state();
        if state.race_on_add {
            state.race_on_add = false;
            state
                .templates
                .push(("ptid:racer".into(), template.clone()));
            return Err(ProviderError::Route {
                route: Route::AddTemplate,
                reason: RouteReason::Conflict,
            });
        }
        let id = format!("ptid:{}", state.templates.len() + 1);
        state.templates.push((id.clone(), template.clone()));
        Ok(id)
    }

    async fn update_template(
        &self,
        template_id: &str,
        add_fields: &[String],
    ) -> Result<(), ProviderError> {
        self.enter(
            "update_template",
            &format!("{template_id} {}", add_fields.join(",")),
        )
        .await?;
        let mut state = self.state();
        if state.ignore_template_updates {
            return Ok(());
        }
        match state.templates.iter_mut().find(|(id, _)| id == template_id) {
            Some((_, template)) => {
                template.fields.extend(add_fields.iter().cloned());
                Ok(())
            }
            None => Err(not_found(Route::UpdateTemplate)),
        }
    }

    async fn update_properties(
        &self,
        path: &str,
        updates: &[PropertyGroupUpdate],
    ) -> Result<(), ProviderError> {
        self.enter("update_properties", path).await?;
        let mut state = self.state();
        let object = state
            .objects
            .get_mut(&path.to_lowercase())
            .ok_or(not_found(Route::UpdateProperties))?;

        for update in updates {
            let group = match object
                .entry
                .property_groups
                .iter_mut()
                .position(|group| group.template_id == update.template_id)
            {
                Some(index) => &mut object.entry.property_groups[index],
                None => {
                    object.entry.property_groups.push(PropertyGroup {
                        template_id: update.template_id.clone(),
                        fields: Default::default(),
                    });
                    object.entry.property_groups.last_mut().unwrap()
                }
            };
            for (key, value) in &update.add_or_update {
                group.fields.insert(key.clone(), value.clone());
            }
            for key in &update.remove {
                group.fields.remove(key);
            }
        }
        Ok(())
    }
}

/// [`Authorizer`] returning a fixed outcome and a shared [`FakeStore`]
pub struct FakeAuthorizer {
    store: FakeStore,
    outcome: Mutex<AuthorizationOutcome>,
    pub authorize_calls: Mutex<usize>,
    pub reauthorized: Mutex<Vec<String>>,
    pub revoked: Mutex<bool>,
    revoke_fails: bool,
    gate: Option<Arc<tokio::sync::Notify>>,
}

impl FakeAuthorizer {
    pub fn new(store: FakeStore, outcome: AuthorizationOutcome) -> Self {
        Self {
            store,
            outcome: Mutex::new(outcome),
            authorize_calls: Mutex::new(0),
            reauthorized: Mutex::new(Vec::new()),
            revoked: Mutex::new(false),
            revoke_fails: false,
            gate: None,
        }
    }

    pub fn authorized(store: FakeStore) -> Self {
        Self::new(store, AuthorizationOutcome::Authorized)
    }

    pub fn with_failing_revoke(mut self) -> Self {
        self.revoke_fails = true;
        self
    }

    /// Holds `authorize` until the returned notify is signalled
    pub fn gated(mut self) -> (Self, Arc<tokio::sync::Notify>) {
        let gate = Arc::new(tokio::sync::Notify::new());
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    pub fn set_outcome(&self, outcome: AuthorizationOutcome) {
        *self.outcome.lock().unwrap() = outcome;
    }
}

#[async_trait]
impl Authorizer for FakeAuthorizer {
    async fn authorize(&self) -> AuthorizationOutcome {
        *self.authorize_calls.lock().unwrap() += 1;
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.outcome.lock().unwrap().clone()
    }

    async fn reauthorize(&self, account_id: &str) -> AuthorizationOutcome {
        self.reauthorized.lock().unwrap().push(account_id.to_string());
        self.outcome.lock().unwrap().clone()
    }

    fn authorized_client(&self) -> Option<Arc<dyn RemoteStore>> {
        Some(Arc::new(self.store.clone()))
    }

    async fn revoke(&self) -> anyhow::Result<()> {
        *self.revoked.lock().unwrap() = true;
        if self.revoke_fails {
            anyhow::bail!("revocation endpoint unreachable");
        }
        Ok(())
    }
}

/// Error returned by a store whose token has been revoked
pub fn expired_token() -> ProviderError {
    ProviderError::Auth(AuthErrorReason::ExpiredAccessToken)
}

/// Local record type used by [`TestContext`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub title: String,
}

impl Note {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
        }
    }
}

/// Data context decoding downloads into [`Note`]s
#[derive(Debug, Default)]
pub struct TestContext {
    queue: SerialQueue,
}

impl TestContext {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DataContext for TestContext {
    type LocalRecord = Note;

    fn queue(&self) -> &SerialQueue {
        &self.queue
    }
}

//! RemoteStore implementation for the Dropbox HTTP API
//!
//! Each port method maps to exactly one Dropbox route. Wire types from
//! [`crate::wire`] are converted to port DTOs here, so nothing outside this
//! crate sees Dropbox's JSON shapes.

use async_trait::async_trait;
use tracing::debug;

use skiff_core::domain::{ProviderError, Route};
use skiff_core::ports::{
    AccountProfile, FileEntry, ListEntry, ListFolderPage, ListFolderRequest, PropertyGroupUpdate,
    RemoteStore, RevisionEntry, TemplateDescriptor, WriteRequest,
};

use crate::client::DropboxClient;
use crate::wire::{
    AddTemplateResult, CreateFolderArg, CursorArg, DownloadArg, FieldTemplate, FullAccount,
    ListFolderArg, ListFolderResult, ListRevisionsArg, ListRevisionsResult, ListTemplatesResult,
    PathArg, TemplateBody, TemplateFilter, TemplateIdArg, UpdatePropertiesArg, UpdateTemplateArg,
    UploadArg, WireFile, WireMetadata, WirePropertyGroupUpdate,
};

impl DropboxClient {
    /// Revokes the access token this client was created with
    pub async fn revoke_token(&self) -> Result<(), ProviderError> {
        self.rpc_unit(Route::RevokeToken, &()).await
    }
}

#[async_trait]
impl RemoteStore for DropboxClient {
    async fn current_account(&self) -> Result<AccountProfile, ProviderError> {
        let account: FullAccount = self.rpc(Route::CurrentAccount, &()).await?;
        Ok(account.into())
    }

    async fn get_metadata(&self, path: &str) -> Result<ListEntry, ProviderError> {
        let metadata: WireMetadata = self.rpc(Route::GetMetadata, &PathArg { path }).await?;
        Ok(metadata.into())
    }

    async fn create_folder(&self, path: &str) -> Result<(), ProviderError> {
        debug!(path, "Creating folder");
        self.rpc_unit(
            Route::CreateFolder,
            &CreateFolderArg {
                path,
                autorename: false,
            },
        )
        .await
    }

    async fn list_folder(
        &self,
        request: &ListFolderRequest,
    ) -> Result<ListFolderPage, ProviderError> {
        let include_property_groups = (!request.template_ids.is_empty()).then(|| {
            TemplateFilter::FilterSome {
                filter_some: request.template_ids.clone(),
            }
        });
        let arg = ListFolderArg {
            path: &request.path,
            recursive: false,
            include_deleted: request.include_deleted,
            include_property_groups,
        };

        let result: ListFolderResult = self.rpc(Route::ListFolder, &arg).await?;
        debug!(
            entries = result.entries.len(),
            has_more = result.has_more,
            "Listed folder page"
        );
        Ok(result.into())
    }

    async fn list_folder_continue(&self, cursor: &str) -> Result<ListFolderPage, ProviderError> {
        let result: ListFolderResult = self
            .rpc(Route::ListFolderContinue, &CursorArg { cursor })
            .await?;
        debug!(
            entries = result.entries.len(),
            has_more = result.has_more,
            "Listed continuation page"
        );
        Ok(result.into())
    }

    async fn upload(&self, request: WriteRequest) -> Result<FileEntry, ProviderError> {
        let WriteRequest {
            path,
            mode,
            property_groups,
            data,
        } = request;

        let arg = UploadArg {
            path: &path,
            mode: (&mode).into(),
            autorename: false,
            mute: true,
            strict_conflict: true,
            property_groups: property_groups.iter().map(Into::into).collect(),
        };

        debug!(path = %path, bytes = data.len(), ?mode, "Uploading");
        let file: WireFile = self.upload_content(Route::Upload, &arg, data).await?;
        Ok(file.into())
    }

    async fn download(
        &self,
        path: &str,
        rev: Option<&str>,
    ) -> Result<(FileEntry, Vec<u8>), ProviderError> {
        let (file, data): (WireFile, Vec<u8>) = self
            .download_content(Route::Download, &DownloadArg { path, rev })
            .await?;
        Ok((file.into(), data))
    }

    async fn delete(&self, path: &str) -> Result<(), ProviderError> {
        self.rpc_unit(Route::Delete, &PathArg { path }).await
    }

    async fn list_revisions(
        &self,
        path: &str,
        limit: u32,
    ) -> Result<Vec<RevisionEntry>, ProviderError> {
        let result: ListRevisionsResult = self
            .rpc(Route::ListRevisions, &ListRevisionsArg { path, limit })
            .await?;
        Ok(result.into_revisions())
    }

    async fn list_templates(&self) -> Result<Vec<String>, ProviderError> {
        let result: ListTemplatesResult = self.rpc(Route::ListTemplates, &()).await?;
        Ok(result.template_ids)
    }

    async fn get_template(&self, template_id: &str) -> Result<TemplateDescriptor, ProviderError> {
        let body: TemplateBody = self
            .rpc(Route::GetTemplate, &TemplateIdArg { template_id })
            .await?;
        Ok(body.into())
    }

    async fn add_template(&self, template: &TemplateDescriptor) -> Result<String, ProviderError> {
        let result: AddTemplateResult = self
            .rpc(Route::AddTemplate, &TemplateBody::from(template))
            .await?;
        Ok(result.template_id)
    }

    async fn update_template(
        &self,
        template_id: &str,
        add_fields: &[String],
    ) -> Result<(), ProviderError> {
        let arg = UpdateTemplateArg {
            template_id,
            add_fields: add_fields
                .iter()
                .map(|name| FieldTemplate::string(name))
                .collect(),
        };
        self.rpc_unit(Route::UpdateTemplate, &arg).await
    }

    async fn update_properties(
        &self,
        path: &str,
        updates: &[PropertyGroupUpdate],
    ) -> Result<(), ProviderError> {
        let arg = UpdatePropertiesArg {
            path,
            update_property_groups: updates.iter().map(WirePropertyGroupUpdate::from).collect(),
        };
        self.rpc_unit(Route::UpdateProperties, &arg).await
    }
}

//! Shared test helpers for Dropbox API integration tests
//!
//! Provides wiremock-based mock server setup for the Dropbox endpoints the
//! adapter uses. RPC and content endpoints are served by the same mock
//! server.

#![allow(dead_code)]

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use skiff_core::config::{ConfigBuilder, RemoteConfig};
use skiff_core::domain::MetadataKey;
use skiff_core::ports::{DataContext, SerialQueue};
use skiff_core::usecases::{SchemaNegotiator, TemplateSettings};
use skiff_dropbox::DropboxClient;

pub const TEMPLATE_ID: &str = "ptid:1a5n2i6d3OYEAAAAAAAAAYa";

/// Starts a mock server with the account endpoint mounted and returns a
/// client pointing at it
pub async fn setup_dropbox_mock() -> (MockServer, DropboxClient) {
    let server = MockServer::start().await;

    mount_rpc(
        &server,
        "users/get_current_account",
        json!({
            "account_id": "dbid:AAH4f99T0taONIb-OurWxbNQ6ywGRopQngc",
            "name": {
                "given_name": "Franz",
                "surname": "Ferdinand",
                "familiar_name": "Franz",
                "display_name": "Franz Ferdinand (Personal)",
                "abbreviated_name": "FF"
            },
            "email": "franz@example.com",
            "email_verified": true,
            "disabled": false
        }),
    )
    .await;

    let client = DropboxClient::with_base_urls("test-access-token", server.uri(), server.uri());
    (server, client)
}

/// Mounts an RPC route answering 200 with `body`
pub async fn mount_rpc(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("POST"))
        .and(path(format!("/2/{route}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mounts a route answering `status` with a structured error body
pub async fn mount_error(server: &MockServer, route: &str, status: u16, summary: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/2/{route}")))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({
            "error_summary": summary,
            "error": {".tag": summary.split('/').next().unwrap_or_default()}
        })))
        .mount(server)
        .await;
}

/// Mounts template listing and lookup for a template holding every key
pub async fn mount_template(server: &MockServer) {
    mount_rpc(
        server,
        "file_properties/templates/list_for_user",
        json!({"template_ids": [TEMPLATE_ID]}),
    )
    .await;

    let fields: Vec<Value> = MetadataKey::all()
        .iter()
        .map(|key| {
            json!({
                "name": key.as_str(),
                "description": key.as_str(),
                "type": {".tag": "string"}
            })
        })
        .collect();
    mount_rpc(
        server,
        "file_properties/templates/get_for_user",
        json!({
            "name": "Skiff",
            "description": "Skiff syncing metadata.",
            "fields": fields
        }),
    )
    .await;
}

/// File metadata as returned by listing, upload and download
pub fn file_json(name: &str, rev: &str) -> Value {
    json!({
        ".tag": "file",
        "name": name,
        "path_lower": format!("/skiff/{}", name.to_lowercase()),
        "path_display": format!("/Skiff/{name}"),
        "id": format!("id:{name}"),
        "client_modified": "2024-06-01T10:00:00Z",
        "server_modified": "2024-06-01T10:00:00Z",
        "rev": rev,
        "size": 17,
        "property_groups": [{
            "template_id": TEMPLATE_ID,
            "fields": [{"name": "author", "value": "alice"}]
        }]
    })
}

pub fn deleted_json(name: &str) -> Value {
    json!({
        ".tag": "deleted",
        "name": name,
        "path_lower": format!("/skiff/{}", name.to_lowercase()),
        "path_display": format!("/Skiff/{name}")
    })
}

pub fn remote_config() -> RemoteConfig {
    ConfigBuilder::new().build().remote
}

pub fn negotiator() -> Arc<SchemaNegotiator> {
    Arc::new(SchemaNegotiator::new(TemplateSettings {
        name: "Skiff".into(),
        description: "Skiff syncing metadata.".into(),
    }))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub title: String,
}

#[derive(Debug, Default)]
pub struct NotesContext {
    queue: SerialQueue,
}

impl DataContext for NotesContext {
    type LocalRecord = Note;

    fn queue(&self) -> &SerialQueue {
        &self.queue
    }
}

//! Integration tests for listing and incremental fetch
//!
//! Verifies the listing request shape and runs the core fetcher against
//! the mock server:
//! - Full fetch over several pages
//! - Delta fetch from a change token
//! - Invalid change tokens rejected before any request

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use skiff_core::domain::{ChangeToken, MetadataKey, RecordStatus, SyncError};
use skiff_core::ports::{ListEntry, ListFolderRequest, RemoteStore};
use skiff_core::usecases::RecordFetcher;

use crate::common::{self, NotesContext, TEMPLATE_ID};

async fn mount_first_page(server: &MockServer, entries: serde_json::Value, cursor: &str, has_more: bool) {
    Mock::given(method("POST"))
        .and(path("/2/files/list_folder"))
        .and(body_partial_json(json!({"path": "/Skiff", "include_deleted": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": entries,
            "cursor": cursor,
            "has_more": has_more
        })))
        .mount(server)
        .await;
}

async fn mount_continue(
    server: &MockServer,
    from: &str,
    entries: serde_json::Value,
    cursor: &str,
    has_more: bool,
) {
    Mock::given(method("POST"))
        .and(path("/2/files/list_folder/continue"))
        .and(body_partial_json(json!({"cursor": from})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": entries,
            "cursor": cursor,
            "has_more": has_more
        })))
        .expect(1)
        .mount(server)
        .await;
}

fn fetcher() -> RecordFetcher {
    RecordFetcher::new(common::remote_config(), common::negotiator())
}

#[tokio::test]
async fn test_list_folder_request_shape() {
    let (server, client) = common::setup_dropbox_mock().await;
    Mock::given(method("POST"))
        .and(path("/2/files/list_folder"))
        .and(header("authorization", "Bearer test-access-token"))
        .and(body_partial_json(json!({
            "path": "/Skiff",
            "recursive": false,
            "include_deleted": true,
            "include_property_groups": {".tag": "filter_some", "filter_some": [TEMPLATE_ID]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": [common::file_json("Note-1", "015f"), {".tag": "folder", "name": "Sub", "path_lower": "/skiff/sub", "id": "id:sub"}],
            "cursor": "AAE",
            "has_more": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = client
        .list_folder(&ListFolderRequest {
            path: "/Skiff".into(),
            include_deleted: true,
            template_ids: vec![TEMPLATE_ID.into()],
        })
        .await
        .expect("list_folder failed");

    assert_eq!(page.cursor, "AAE");
    assert_eq!(page.entries.len(), 2);
    let ListEntry::File(file) = &page.entries[0] else {
        panic!("expected a file entry");
    };
    assert_eq!(file.path_lower.as_deref(), Some("/skiff/note-1"));
    assert_eq!(file.property_groups[0].template_id, TEMPLATE_ID);
    assert!(matches!(page.entries[1], ListEntry::Folder { .. }));
}

#[tokio::test]
async fn test_full_fetch_across_pages() {
    let (server, client) = common::setup_dropbox_mock().await;
    common::mount_template(&server).await;
    mount_first_page(
        &server,
        json!([common::file_json("Note-1", "a1")]),
        "c1",
        true,
    )
    .await;
    mount_continue(
        &server,
        "c1",
        json!([common::file_json("Note-2", "b1"), common::deleted_json("Note-3")]),
        "c2",
        false,
    )
    .await;

    let fetched = fetcher()
        .fetch_all(&client, &NotesContext::default())
        .await
        .expect("full fetch failed");

    assert_eq!(fetched.records.len(), 2);
    assert!(fetched
        .records
        .iter()
        .all(|record| record.status == RecordStatus::Normal));
    assert!(fetched.records.iter().all(|record| {
        record.metadata.get(&MetadataKey::new(MetadataKey::AUTHOR)) == Some(&"alice".to_string())
    }));
    assert_eq!(fetched.change_token, ChangeToken::encode("c2"));
}

#[tokio::test]
async fn test_delta_fetch_over_two_pages() {
    let (server, client) = common::setup_dropbox_mock().await;
    common::mount_template(&server).await;
    mount_continue(
        &server,
        "c0",
        json!([common::file_json("Note-1", "a2")]),
        "c1",
        true,
    )
    .await;
    mount_continue(
        &server,
        "c1",
        json!([common::file_json("Note-2", "b2"), common::deleted_json("Note-3")]),
        "c2",
        false,
    )
    .await;

    let changes = fetcher()
        .fetch_changes(&client, &NotesContext::default(), &ChangeToken::encode("c0"))
        .await
        .expect("delta fetch failed");

    assert_eq!(changes.updated.len(), 2);
    assert!(changes
        .updated
        .iter()
        .all(|record| record.status == RecordStatus::Updated));
    assert_eq!(changes.deleted.len(), 1);
    assert!(changes.deleted.contains("/skiff/note-3"));
    assert_eq!(changes.change_token.decode().unwrap(), "c2");
}

#[tokio::test]
async fn test_delta_fetch_single_page() {
    let (server, client) = common::setup_dropbox_mock().await;
    common::mount_template(&server).await;
    mount_continue(
        &server,
        "c1",
        json!([common::file_json("Note-1", "a3")]),
        "c9",
        false,
    )
    .await;

    let changes = fetcher()
        .fetch_changes(&client, &NotesContext::default(), &ChangeToken::encode("c1"))
        .await
        .expect("delta fetch failed");

    assert_eq!(changes.updated.len(), 1);
    assert!(changes.deleted.is_empty());
    assert_eq!(changes.change_token.decode().unwrap(), "c9");
}

#[tokio::test]
async fn test_invalid_change_token_sends_nothing() {
    let (server, client) = common::setup_dropbox_mock().await;

    let result = fetcher()
        .fetch_changes(
            &client,
            &NotesContext::default(),
            &ChangeToken::from_bytes(b"not a token".to_vec()),
        )
        .await;

    assert!(matches!(result, Err(SyncError::InvalidChangeToken(_))));
    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.is_empty());
}

#[tokio::test]
async fn test_expired_cursor_surfaces_backend_error() {
    let (server, client) = common::setup_dropbox_mock().await;
    common::mount_template(&server).await;
    common::mount_error(&server, "files/list_folder/continue", 409, "reset/..").await;

    let result = fetcher()
        .fetch_changes(&client, &NotesContext::default(), &ChangeToken::encode("old"))
        .await;

    assert!(matches!(result, Err(SyncError::BackendError(_))));
}

#![allow(clippy::unwrap_used)]
// Integration tests for dataset selection and pull against a mock platform.

use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pennsync_core::pull::LOCAL_MANIFEST;
use pennsync_core::{
    AgentCli, CoreError, DataLayout, PullEvent, RetryPolicy, SyncService,
};
use pennsync_api::{Credentials, PennsieveClient, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, SyncService) {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/authentication/cognito-config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "region": "us-east-1",
            "tokenPool": { "appClientId": "client-123" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/idp/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "AuthenticationResult": { "AccessToken": "token-1" }
        })))
        .mount(&server)
        .await;

    let credentials = Credentials::new(
        Url::parse(&server.uri()).unwrap(),
        "api-key",
        SecretString::from("api-secret".to_string()),
    );
    let client = PennsieveClient::new(
        credentials,
        &TransportConfig::default(),
        Some(Url::parse(&format!("{}/idp/", server.uri())).unwrap()),
    )
    .unwrap();
    let service = SyncService::with_runner(client, AgentCli::new("pennsieve"), DataLayout::new("data"));
    (server, service)
}

async fn mount_datasets(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/datasets/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "content": { "id": "N:dataset:3", "name": "PennEPI00143" } },
            { "content": { "id": "N:dataset:1", "name": "EPS0000001" } },
            { "content": { "id": "N:dataset:2", "name": "PennEPI00049" } }
        ])))
        .mount(server)
        .await;
}

fn write(path: &Path, content: &[u8]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn fast_retries() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 4,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

// ── Dataset selection ───────────────────────────────────────────────

#[tokio::test]
async fn test_datasets_filtered_and_sorted() {
    let (server, service) = setup().await;
    mount_datasets(&server).await;

    let names: Vec<String> = service
        .datasets(Some("PENNEPI"))
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.name)
        .collect();

    assert_eq!(names, ["PennEPI00049", "PennEPI00143"]);
}

#[tokio::test]
async fn test_select_reports_missing() {
    let (server, service) = setup().await;
    mount_datasets(&server).await;

    let selection = service
        .select(&["EPS0000001".into(), "EPS9999999".into()])
        .await
        .unwrap();

    assert_eq!(selection.found.len(), 1);
    assert_eq!(selection.found[0].id, "N:dataset:1");
    assert_eq!(selection.missing, ["EPS9999999"]);
}

#[tokio::test]
async fn test_listing_failure_is_api_error() {
    let (server, service) = setup().await;
    Mock::given(method("GET"))
        .and(path("/datasets/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = service.datasets(None).await;
    assert!(
        matches!(result, Err(CoreError::Api { status: Some(500), .. })),
        "got: {result:?}"
    );
}

// ── Pull ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_pull_replaces_placeholders_and_skips_others() {
    let (server, service) = setup().await;
    let object_url = format!("{}/bucket/F8.mef?X-Amz-Signature=abc", server.uri());

    Mock::given(method("POST"))
        .and(path("/packages/download-manifest"))
        .and(body_partial_json(json!({ "nodeIds": ["N:package:aaa-111"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "url": object_url }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bucket/F8.mef"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"MEF3 binary".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("EPS0000001");
    write(
        &root.join(LOCAL_MANIFEST),
        br#"{"files": [{"packageId": "N:package:aaa-111"}]}"#,
    );
    let placeholder = root.join("primary/sub-1/ieeg/F8.mef");
    write(&placeholder, b"N:package:aaa-111");
    let downloaded = root.join("primary/sub-1/ieeg/F7.mef");
    write(&downloaded, b"already real data");

    let mut events = Vec::new();
    let report = service
        .puller()
        .with_policy(fast_retries())
        .pull(&root.join("primary"), |e| events.push(e.clone()))
        .await
        .unwrap();

    assert_eq!(report.downloaded, [placeholder.clone()]);
    assert_eq!(report.skipped, 1);
    assert!(report.failed.is_empty());
    assert_eq!(std::fs::read(&placeholder).unwrap(), b"MEF3 binary");
    assert_eq!(std::fs::read(&downloaded).unwrap(), b"already real data");
    assert!(matches!(events[0], PullEvent::Started { total: 2 }));
}

#[tokio::test]
async fn test_pull_retries_download_then_records_failure() {
    let (server, service) = setup().await;
    let object_url = format!("{}/bucket/broken.mef", server.uri());

    Mock::given(method("POST"))
        .and(path("/packages/download-manifest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "url": object_url }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bucket/broken.mef"))
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    write(
        &dir.path().join(LOCAL_MANIFEST),
        br#"{"files": [{"packageId": "bbb-222"}]}"#,
    );
    let placeholder = dir.path().join("broken.mef");
    write(&placeholder, b"bbb-222\n");

    let report = service
        .puller()
        .with_policy(fast_retries())
        .pull(&placeholder, |_| {})
        .await
        .unwrap();

    assert!(report.downloaded.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].path, placeholder);
    assert_eq!(std::fs::read_to_string(&placeholder).unwrap(), "bbb-222\n");
}

#[tokio::test]
async fn test_pull_without_local_manifest_fails() {
    let (_server, service) = setup().await;
    let dir = tempfile::tempdir().unwrap();
    write(&dir.path().join("file.mef"), b"x");

    let result = service.puller().pull(dir.path(), |_| {}).await;
    assert!(matches!(result, Err(CoreError::LocalManifestNotFound { .. })));
}

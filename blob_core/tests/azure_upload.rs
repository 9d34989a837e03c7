//! Azure uploads against a mock storage endpoint

use std::time::Duration;

use blob_core::{AzureBlobStore, AzureBlobStoreConfig, BlobStore, ConnectionString};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store(endpoint: &str) -> AzureBlobStore {
    let connection: ConnectionString = format!(
        "AccountName=devstoreaccount1;AccountKey=a2V5a2V5a2V5;BlobEndpoint={endpoint}/devstoreaccount1"
    )
    .parse()
    .unwrap();
    AzureBlobStore::new(AzureBlobStoreConfig {
        connection,
        container: "tts-output".to_string(),
        read_expiry: Duration::from_secs(3600),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

#[tokio::test]
async fn test_upload_puts_block_blob_and_returns_read_url() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/devstoreaccount1/tts-output/job-7_1.wav"))
        .and(header("x-ms-blob-type", "BlockBlob"))
        .and(header("content-type", "audio/wav"))
        .and(query_param("sp", "cw"))
        .and(query_param("sr", "b"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let store = store(&server.uri());
    let url = store
        .upload("job-7_1.wav", b"RIFF....".to_vec(), "audio/wav")
        .await
        .unwrap();

    assert!(url.starts_with(&format!("{}/devstoreaccount1/tts-output/job-7_1.wav?", server.uri())));
    assert!(url.contains("sp=r&"));
    assert!(url.contains("sig="));
    assert!(url.contains("spr=https%2Chttp"));
}

#[tokio::test]
async fn test_rejected_upload_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(403).set_body_string("AuthenticationFailed"))
        .mount(&server)
        .await;

    let err = store(&server.uri())
        .upload("a.wav", vec![1, 2, 3], "audio/wav")
        .await
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("403"));
    assert!(msg.contains("AuthenticationFailed"));
}

#[tokio::test]
async fn test_unreachable_store_is_an_error() {
    let store = store("http://127.0.0.1:9");
    assert!(store.upload("a.wav", vec![0], "audio/wav").await.is_err());
}

#[test]
fn test_empty_container_is_rejected() {
    let connection: ConnectionString = "AccountName=a;AccountKey=a2V5".parse().unwrap();
    let result = AzureBlobStore::new(AzureBlobStoreConfig {
        connection,
        container: "  ".to_string(),
        read_expiry: Duration::from_secs(60),
        timeout: Duration::from_secs(5),
    });
    assert!(result.is_err());
}

#[test]
fn test_read_url_uses_https_only_for_https_endpoints() {
    let connection: ConnectionString = "AccountName=ttsout;AccountKey=a2V5".parse().unwrap();
    let store = AzureBlobStore::new(AzureBlobStoreConfig {
        connection,
        container: "tts-output".to_string(),
        read_expiry: Duration::from_secs(60),
        timeout: Duration::from_secs(5),
    })
    .unwrap();
    assert_eq!(store.container(), "tts-output");

    let url = store.read_url("x.wav", chrono::Utc::now()).unwrap();
    assert!(url.starts_with("https://ttsout.blob.core.windows.net/tts-output/x.wav?"));
    assert!(url.contains("spr=https&"));
}

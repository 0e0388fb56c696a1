//! Firebase REST adapter against a local mock server.

use std::sync::Arc;
use std::time::Duration;

use fastpay_backend::domain::ports::{FirebaseTreeSource, FirebaseTreeSourceError};
use fastpay_backend::domain::{DeviceId, ExternalDataFetcher, FetchOutcome, ResourceKind};
use fastpay_backend::outbound::firebase::FirebaseRestSource;
use mockito::{Matcher, Server, ServerGuard};
use rstest::rstest;
use serde_json::json;
use url::Url;

fn auth() -> Matcher {
    Matcher::UrlEncoded("auth".into(), "secret".into())
}

fn source(server: &ServerGuard) -> FirebaseRestSource {
    let base = Url::parse(&format!("{}/", server.url())).expect("mock url parses");
    FirebaseRestSource::new(base, Some("secret".to_owned()), Duration::from_secs(5))
        .expect("client builds")
}

#[rstest]
#[tokio::test]
async fn read_returns_the_stored_value() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/device/d1.json")
        .match_query(auth())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"name":"Pixel 8","isActive":"Opened"}"#)
        .create_async()
        .await;

    let value = source(&server).read("device/d1").await.expect("read succeeds");

    mock.assert_async().await;
    assert_eq!(value, Some(json!({ "name": "Pixel 8", "isActive": "Opened" })));
}

#[rstest]
#[tokio::test]
async fn null_body_reads_as_absent() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/message/d1.json")
        .match_query(auth())
        .with_status(200)
        .with_body("null")
        .create_async()
        .await;

    let value = source(&server).read("message/d1").await.expect("read succeeds");

    assert_eq!(value, None);
}

#[rstest]
#[tokio::test]
async fn child_keys_uses_a_shallow_read() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/device.json")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("shallow".into(), "true".into()),
            auth(),
        ]))
        .with_status(200)
        .with_body(r#"{"d1":true,"d2":true}"#)
        .create_async()
        .await;

    let mut keys = source(&server)
        .child_keys("device")
        .await
        .expect("listing succeeds");
    keys.sort();

    mock.assert_async().await;
    assert_eq!(keys, vec!["d1".to_owned(), "d2".to_owned()]);
}

#[rstest]
#[tokio::test]
async fn delete_targets_the_child_resource() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("DELETE", "/fastpay/d1/messages/100.json")
        .match_query(auth())
        .with_status(200)
        .with_body("null")
        .create_async()
        .await;

    source(&server)
        .delete("fastpay/d1/messages/100")
        .await
        .expect("delete succeeds");

    mock.assert_async().await;
}

#[rstest]
#[case::unauthorised(401, r#"{"error":"Permission denied"}"#, "status")]
#[case::server_error(503, "unavailable", "transport")]
#[case::gateway_timeout(504, "", "timeout")]
#[case::bad_json(200, "{not json", "decode")]
#[tokio::test]
async fn failures_map_to_port_errors(
    #[case] status: usize,
    #[case] body: &str,
    #[case] expected: &str,
) {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/device/d1.json")
        .match_query(auth())
        .with_status(status)
        .with_body(body)
        .create_async()
        .await;

    let error = source(&server)
        .read("device/d1")
        .await
        .expect_err("read fails");

    let kind = match error {
        FirebaseTreeSourceError::Status { .. } => "status",
        FirebaseTreeSourceError::Transport { .. } => "transport",
        FirebaseTreeSourceError::Timeout { .. } => "timeout",
        FirebaseTreeSourceError::Decode { .. } => "decode",
        FirebaseTreeSourceError::Unavailable { .. } => "unavailable",
    };
    assert_eq!(kind, expected);
}

#[rstest]
#[tokio::test]
async fn fetcher_falls_through_to_the_legacy_message_path() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/fastpay/d1/messages.json")
        .match_query(auth())
        .with_status(200)
        .with_body("null")
        .create_async()
        .await;
    server
        .mock("GET", "/message/d1.json")
        .match_query(auth())
        .with_status(200)
        .with_body(r#"{"100":"received~+1~a","200":"sent~+2~b"}"#)
        .create_async()
        .await;

    let fetcher = ExternalDataFetcher::new(Arc::new(source(&server)));
    let device_id = DeviceId::new("d1").expect("valid id");
    let outcome = fetcher.fetch(&device_id, ResourceKind::Messages).await;

    match outcome {
        FetchOutcome::Found(entries) => assert_eq!(entries.len(), 2),
        other => panic!("expected messages, got {other:?}"),
    }
}

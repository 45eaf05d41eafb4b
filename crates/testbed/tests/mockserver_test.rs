//! Integration tests for the mock server client over a stub HTTP server.

use serde_json::{Value, json};
use std::time::Duration;
use testbed::MockServer;
use testbed::test_utils::StubHttpServer;

async fn mock_server() -> (StubHttpServer, MockServer) {
    let server = StubHttpServer::start().await.expect("Failed to start stub");
    server.respond("PUT", "/reset", 200, "");
    server.respond("PUT", "/expectation", 201, "[]");
    server.respond("PUT", "/verify", 202, "");
    let mockserver = MockServer::new(server.ip(), server.port(), Duration::from_secs(5))
        .expect("Failed to create client");
    (server, mockserver)
}

fn nic_update() -> Value {
    json!({
        "httpRequest": {
            "method": "GET",
            "path": "/nic/update",
            "queryStringParameters": {"hostname": ["pi1.testbed"]},
        },
        "httpResponse": {"statusCode": 200, "body": "OK"},
    })
}

#[tokio::test]
async fn clear_resets_and_installs_catch_all() {
    let (server, mut mockserver) = mock_server().await;

    mockserver.clear().await.unwrap();

    let requests = server.requests();
    let paths: Vec<&str> = requests.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["/reset", "/expectation"]);
    let catch_all = requests[1].json();
    assert_eq!(catch_all["priority"], -10);
    assert_eq!(catch_all["httpResponse"]["statusCode"], 404);
    assert!(mockserver.expectations().is_empty());
}

#[tokio::test]
async fn expect_registers_one_shot_and_records_request() {
    let (server, mut mockserver) = mock_server().await;
    let created = json!([{"id": "e1", "httpRequest": nic_update()["httpRequest"]}]);
    server.respond("PUT", "/expectation", 201, created.to_string());

    mockserver.expect(nic_update()).await.unwrap();

    let sent = server.requests()[0].json();
    assert_eq!(sent["times"], json!({"remainingTimes": 1}));
    assert_eq!(sent["httpRequest"]["path"], "/nic/update");
    assert_eq!(mockserver.expectations(), &[nic_update()["httpRequest"].clone()]);
}

#[tokio::test]
async fn assert_called_verifies_each_expectation() {
    let (server, mut mockserver) = mock_server().await;
    let created = json!([{"httpRequest": {"path": "/a"}}]);
    server.respond("PUT", "/expectation", 201, created.to_string());
    mockserver.expect(json!({"httpRequest": {"path": "/a"}})).await.unwrap();

    mockserver.assert_called(1).await.unwrap();

    let verify: Vec<Value> = server
        .requests()
        .iter()
        .filter(|r| r.path == "/verify")
        .map(|r| r.json())
        .collect();
    assert_eq!(
        verify,
        vec![json!({
            "httpRequest": {"path": "/a"},
            "times": {"atLeast": 1, "atMost": 1},
        })]
    );
}

#[tokio::test]
#[should_panic(expected = "mock server verification failed")]
async fn failed_verification_fails_the_test() {
    let (server, mut mockserver) = mock_server().await;
    server.respond("PUT", "/expectation", 201, r#"[{"httpRequest": {"path": "/a"}}]"#);
    server.respond("PUT", "/verify", 406, r#"Request not found exactly once"#);
    mockserver.expect(json!({"httpRequest": {"path": "/a"}})).await.unwrap();

    mockserver.assert_called(1).await.unwrap();
}

#[tokio::test]
async fn assert_not_called_pins_zero() {
    let (server, mut mockserver) = mock_server().await;
    server.respond("PUT", "/expectation", 201, r#"[{"httpRequest": {"path": "/a"}}]"#);
    mockserver.expect(json!({"httpRequest": {"path": "/a"}})).await.unwrap();

    mockserver.assert_not_called().await.unwrap();

    let verify = server
        .requests()
        .into_iter()
        .find(|r| r.path == "/verify")
        .expect("no verify request");
    assert_eq!(verify.json()["times"], json!({"atLeast": 0, "atMost": 0}));
}

#[tokio::test]
async fn reply_without_request_is_a_parse_error() {
    let (_server, mut mockserver) = mock_server().await;

    assert!(matches!(
        mockserver.expect(nic_update()).await,
        Err(testbed::Error::Parse(_))
    ));
    assert!(mockserver.expectations().is_empty());
}

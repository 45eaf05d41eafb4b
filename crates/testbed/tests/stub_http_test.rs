//! Integration tests for the stub HTTP server used by the client tests.

use testbed::test_utils::StubHttpServer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn send_raw(server: &StubHttpServer, request: &str) -> String {
    let mut stream = TcpStream::connect((server.ip(), server.port()))
        .await
        .expect("Failed to connect to stub");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

#[tokio::test]
async fn records_chunked_request_body() {
    let server = StubHttpServer::start().await.unwrap();
    server.respond("PUT", "/expectation", 201, "[]");

    let response = send_raw(
        &server,
        "PUT /expectation HTTP/1.1\r\n\
         Host: localhost\r\n\
         Transfer-Encoding: chunked\r\n\
         Connection: close\r\n\
         \r\n\
         7\r\n{\"a\": 1\r\n\
         1\r\n}\r\n\
         0\r\n\r\n",
    )
    .await;

    assert!(response.starts_with("HTTP/1.1 201 Created"), "{response}");
    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body, r#"{"a": 1}"#);
    assert_eq!(requests[0].json()["a"], 1);
}

#[tokio::test]
async fn answers_any_status_with_its_reason() {
    let server = StubHttpServer::start().await.unwrap();
    server.respond("GET", "/api/emails", 409, "");

    let response = send_raw(
        &server,
        "GET /api/emails HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert!(response.starts_with("HTTP/1.1 409 Conflict"), "{response}");
}

#[tokio::test]
async fn unrouted_request_is_recorded_and_not_found() {
    let server = StubHttpServer::start().await.unwrap();

    let response = reqwest::Client::new()
        .delete(format!("http://{}:{}/api/emails", server.ip(), server.port()))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    let requests = server.requests();
    assert_eq!(requests[0].method, "DELETE");
    assert_eq!(requests[0].path, "/api/emails");
    assert_eq!(requests[0].body, "");
}

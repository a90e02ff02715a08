//! RestClient against a mock hub.

use mockito::Server;
use rest_client::{Credentials, HubEndpoint, RestClient, RestError};
use std::time::Duration;

fn client_for(server: &Server) -> RestClient {
    let endpoint = HubEndpoint::parse(&server.url()).unwrap();
    RestClient::new(endpoint, Credentials::new("admin", "admin")).unwrap()
}

#[tokio::test]
async fn test_get_sends_basic_auth() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/rest/config")
        .match_header("authorization", "Basic YWRtaW46YWRtaW4=")
        .with_status(200)
        .with_header("content-type", "text/xml")
        .with_body("<configuration><root><id>00:21:b9:00:00:01</id></root></configuration>")
        .create_async()
        .await;

    let body = client_for(&server).get("/rest/config").await.unwrap();
    assert!(body.contains("00:21:b9:00:00:01"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unauthorized() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/rest/config")
        .with_status(401)
        .create_async()
        .await;

    let result = client_for(&server).get("/rest/config").await;
    assert_eq!(result, Err(RestError::Unauthorized));
}

#[tokio::test]
async fn test_not_found_and_server_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/rest/nodes/missing")
        .with_status(404)
        .create_async()
        .await;
    server
        .mock("GET", "/rest/query")
        .with_status(503)
        .create_async()
        .await;

    let client = client_for(&server);
    assert!(matches!(
        client.get("/rest/nodes/missing").await,
        Err(RestError::NotFound(_))
    ));
    assert_eq!(client.get("/rest/query").await, Err(RestError::Rejected(503)));
}

#[tokio::test]
async fn test_command_rejected_by_hub() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/rest/nodes/12%2034%2056%201/cmd/DON")
        .with_status(200)
        .with_body(r#"<RestResponse succeeded="false"><status>404</status></RestResponse>"#)
        .create_async()
        .await;

    let result = client_for(&server)
        .command("/rest/nodes/12%2034%2056%201/cmd/DON")
        .await;
    assert_eq!(result, Err(RestError::Rejected(404)));
}

#[tokio::test]
async fn test_command_ack() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/rest/programs/0004/runThen")
        .with_status(200)
        .with_body(r#"<RestResponse succeeded="true"><status>200</status></RestResponse>"#)
        .create_async()
        .await;

    let ack = client_for(&server)
        .command("/rest/programs/0004/runThen")
        .await
        .unwrap();
    assert_eq!(ack.status, 200);
}

#[tokio::test]
async fn test_webroot_prefix_is_used() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/isy/rest/query")
        .with_status(200)
        .with_body(r#"<RestResponse succeeded="true"><status>200</status></RestResponse>"#)
        .create_async()
        .await;

    let endpoint = HubEndpoint::parse(&format!("{}/isy", server.url())).unwrap();
    let client = RestClient::with_timeout(
        endpoint,
        Credentials::new("admin", "admin"),
        Duration::from_secs(2),
    )
    .unwrap();
    client.command("/rest/query").await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    let endpoint = HubEndpoint::parse("http://127.0.0.1:1").unwrap();
    let client = RestClient::with_timeout(
        endpoint,
        Credentials::new("admin", "admin"),
        Duration::from_secs(2),
    )
    .unwrap();
    let result = client.get("/rest/config").await;
    assert!(matches!(
        result,
        Err(RestError::Network(_)) | Err(RestError::Timeout)
    ));
}

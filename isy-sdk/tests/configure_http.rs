//! Setup over HTTP against a mock hub.

use isy_sdk::{Credentials, HubEndpoint, HubOptions, IsySystem, SdkError};
use mockito::{Server, ServerGuard};

const CONFIG: &str = r#"<configuration><deviceSpecs><model>ISY 994i</model></deviceSpecs><app_version>5.3.4</app_version><root><id>00:21:b9:02:1a:2b</id><name>Home</name></root></configuration>"#;

fn endpoint(server: &ServerGuard) -> HubEndpoint {
    HubEndpoint::parse(&server.url()).unwrap()
}

#[tokio::test]
async fn test_rejected_credentials_fail_setup() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/rest/config")
        .with_status(401)
        .create_async()
        .await;

    let system = IsySystem::new().unwrap();
    let result = system
        .configure(
            endpoint(&server),
            Credentials::new("admin", "wrong"),
            HubOptions::default(),
        )
        .await;

    assert!(matches!(result, Err(SdkError::Auth)));
    assert!(system.hubs().is_empty());
    system.shutdown().await;
}

#[tokio::test]
async fn test_unreadable_configuration_is_unreachable() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/rest/config")
        .with_body("<configuration><app_version>5.3.4</app_version></configuration>")
        .create_async()
        .await;

    let system = IsySystem::new().unwrap();
    let result = system
        .configure(
            endpoint(&server),
            Credentials::new("admin", "admin"),
            HubOptions::default(),
        )
        .await;

    assert!(matches!(result, Err(SdkError::Unreachable(_))));
    system.shutdown().await;
}

#[tokio::test]
async fn test_configuration_names_the_hub() {
    let mut server = Server::new_async().await;
    let config = server
        .mock("GET", "/rest/config")
        .match_header("authorization", "Basic YWRtaW46YWRtaW4=")
        .with_body(CONFIG)
        .expect_at_least(1)
        .create_async()
        .await;

    let system = IsySystem::new().unwrap();
    let handle = system
        .configure(
            endpoint(&server),
            Credentials::new("admin", "admin"),
            HubOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(handle.id.as_str(), "0021b9021a2b");
    assert_eq!(handle.info.name, "Home");
    assert_eq!(handle.info.model.as_deref(), Some("ISY 994i"));
    assert!(handle.variables_enabled);
    assert_eq!(system.variables_hub(), Some(handle.id.clone()));
    config.assert_async().await;

    system.shutdown().await;
    assert!(system.hubs().is_empty());
}

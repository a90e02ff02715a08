//! Private REST client for ISY hub communication
//!
//! Every query and command the hub supports is an authenticated GET against
//! a path under `/rest`. This crate owns the HTTP session, maps HTTP and
//! `RestResponse` failures onto [`RestError`], and hands back either the raw
//! body or a parsed element.

mod endpoint;
mod error;

pub use endpoint::{Credentials, HubEndpoint, Scheme};
pub use error::RestError;

use std::time::Duration;
use tracing::debug;
use xmltree::Element;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Acknowledgement of a command that the hub accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestAck {
    /// Status code the hub reported; 200 when the body carried none
    pub status: u16,
    /// The raw response element, for commands that return data
    pub body: Option<Element>,
}

/// An authenticated REST session against one hub
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    endpoint: HubEndpoint,
    credentials: Credentials,
}

impl RestClient {
    pub fn new(endpoint: HubEndpoint, credentials: Credentials) -> Result<Self, RestError> {
        Self::with_timeout(endpoint, credentials, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        endpoint: HubEndpoint,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, RestError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            // Hubs ship self-signed certificates
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| RestError::Network(e.to_string()))?;

        Ok(Self {
            http,
            endpoint,
            credentials,
        })
    }

    pub fn endpoint(&self) -> &HubEndpoint {
        &self.endpoint
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// GET a REST path and return the body text
    pub async fn get(&self, path: &str) -> Result<String, RestError> {
        let url = self.endpoint.url_for(path);
        debug!(url = %url, "GET");

        let response = self
            .http
            .get(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(RestError::Unauthorized);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RestError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            return Err(RestError::Rejected(status.as_u16()));
        }

        Ok(response.text().await?)
    }

    /// GET a REST path and parse the body as XML
    pub async fn get_element(&self, path: &str) -> Result<Element, RestError> {
        let body = self.get(path).await?;
        Element::parse(body.as_bytes()).map_err(|e| RestError::Parse(e.to_string()))
    }

    /// Issue a command path and check the hub's verdict
    pub async fn command(&self, path: &str) -> Result<RestAck, RestError> {
        let body = self.get(path).await?;
        check_rest_response(&body)
    }
}

/// Interpret a command response body.
///
/// The hub answers commands with `<RestResponse succeeded="true|false">` and
/// a `<status>` code. Commands that return data (parameter queries) answer
/// with some other element, which counts as success.
pub fn check_rest_response(body: &str) -> Result<RestAck, RestError> {
    if body.trim().is_empty() {
        return Ok(RestAck {
            status: 200,
            body: None,
        });
    }

    let xml = Element::parse(body.as_bytes()).map_err(|e| RestError::Parse(e.to_string()))?;

    if xml.name != "RestResponse" {
        return Ok(RestAck {
            status: 200,
            body: Some(xml),
        });
    }

    let status = xml
        .get_child("status")
        .and_then(|s| s.get_text())
        .and_then(|t| t.trim().parse::<u16>().ok());
    let succeeded = xml
        .attributes
        .get("succeeded")
        .map(|s| s.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(true);

    if succeeded {
        Ok(RestAck {
            status: status.unwrap_or(200),
            body: Some(xml),
        })
    } else {
        Err(RestError::Rejected(status.unwrap_or(500)))
    }
}

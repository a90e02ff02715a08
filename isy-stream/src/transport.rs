//! Transport seam between a [`HubConnection`](crate::HubConnection) and the hub.
//!
//! [`IsyTransport`] is the production implementation: REST queries through
//! [`HubClient`] plus the `/rest/subscribe` websocket. Tests substitute a
//! scripted transport.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use isy_api::{Ack, HubClient, HubSnapshot, ZWaveParameterValue};
use isy_parser::{CommandFrame, HubInfo};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace};

use crate::error::TransportError;

/// Websocket subprotocol the hub requires on `/rest/subscribe`
pub const SUBSCRIBE_PROTOCOL: &str = "ISYSUB";

/// Origin header the hub expects from subscribers
pub const SUBSCRIBE_ORIGIN: &str = "com.universal-devices.websockets.isy";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A stream of raw event frames from one hub session
#[async_trait]
pub trait EventSource: Send {
    /// Next frame, or `Ok(None)` once the hub closed the session.
    ///
    /// Must be cancel-safe: it is polled inside `select!`.
    async fn next_frame(&mut self) -> Result<Option<Bytes>, TransportError>;

    async fn close(&mut self);
}

/// Everything a connection needs from one hub
#[async_trait]
pub trait HubTransport: Send + Sync + 'static {
    /// Configuration query. Also the credential check.
    async fn fetch_config(&self) -> Result<HubInfo, TransportError>;

    async fn fetch_snapshot(&self) -> Result<HubSnapshot, TransportError>;

    async fn open_stream(&self) -> Result<Box<dyn EventSource>, TransportError>;

    async fn send(&self, frame: &CommandFrame) -> Result<Ack, TransportError>;

    async fn query_parameter(
        &self,
        address: &str,
        parameter: u16,
    ) -> Result<ZWaveParameterValue, TransportError>;
}

/// REST plus websocket transport for a real hub
pub struct IsyTransport {
    client: HubClient,
    include_variables: bool,
}

impl IsyTransport {
    pub fn new(client: HubClient, include_variables: bool) -> Self {
        Self {
            client,
            include_variables,
        }
    }

    pub fn client(&self) -> &HubClient {
        &self.client
    }
}

#[async_trait]
impl HubTransport for IsyTransport {
    async fn fetch_config(&self) -> Result<HubInfo, TransportError> {
        Ok(self.client.fetch_config().await?)
    }

    async fn fetch_snapshot(&self) -> Result<HubSnapshot, TransportError> {
        Ok(self.client.fetch_snapshot(self.include_variables).await?)
    }

    async fn open_stream(&self) -> Result<Box<dyn EventSource>, TransportError> {
        let url = self.client.endpoint().websocket_url();
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Invalid(e.to_string()))?;

        let auth = HeaderValue::from_str(&self.client.credentials().basic_auth_header())
            .map_err(|e| TransportError::Invalid(e.to_string()))?;
        let headers = request.headers_mut();
        headers.insert("Authorization", auth);
        headers.insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static(SUBSCRIBE_PROTOCOL),
        );
        headers.insert("Origin", HeaderValue::from_static(SUBSCRIBE_ORIGIN));

        debug!(url = %url, "Opening event stream");
        let (stream, response) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(request))
            .await
            .map_err(|_| TransportError::Timeout)??;
        info!(url = %url, status = %response.status(), "Event stream open");

        Ok(Box::new(WebSocketSource { stream }))
    }

    async fn send(&self, frame: &CommandFrame) -> Result<Ack, TransportError> {
        Ok(self.client.execute(frame).await?)
    }

    async fn query_parameter(
        &self,
        address: &str,
        parameter: u16,
    ) -> Result<ZWaveParameterValue, TransportError> {
        Ok(self.client.query_zwave_parameter(address, parameter).await?)
    }
}

/// Event frames read off the subscription websocket
pub struct WebSocketSource {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl EventSource for WebSocketSource {
    async fn next_frame(&mut self) -> Result<Option<Bytes>, TransportError> {
        loop {
            match self.stream.next().await {
                None => return Ok(None),
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(Message::Text(text))) => return Ok(Some(Bytes::from(text))),
                Some(Ok(Message::Binary(data))) => return Ok(Some(Bytes::from(data))),
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map(|f| f.reason.to_string());
                    info!(reason = ?reason, "Hub closed event stream");
                    return Ok(None);
                }
                // tungstenite answers pings itself
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                    trace!("Websocket keepalive");
                }
                Some(Ok(Message::Frame(_))) => {}
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "Error closing event stream");
        }
    }
}

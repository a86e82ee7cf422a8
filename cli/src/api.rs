// HTTP client side of the overlay
//
// Nodes talk to each other over plain HTTP with JSON bodies. This module
// implements the core's `NodeDirectory` and `Transport` seams on top of a
// hyper client, plus the request/response bodies shared with `server`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hyper::client::HttpConnector;
use hyper::{Body, Method, Request, StatusCode};
use onionrelay_core::{
    Address, NodeDirectory, NodeRecord, Packet, RegistryError, Transport, TransportError, UserId,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// WIRE BODIES
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ResultBody<T> {
    pub result: T,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodesBody {
    pub nodes: Vec<NodeRecord>,
}

/// Body of `POST /message` on relays and users
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageBody {
    pub message: String,
    pub destination_user_id: UserId,
}

// ============================================================================
// CLIENT
// ============================================================================

#[derive(Clone)]
pub struct HttpClient {
    host: String,
    timeout: Duration,
    client: hyper::Client<HttpConnector>,
}

impl HttpClient {
    pub fn new(host: impl Into<String>, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            timeout,
            client: hyper::Client::new(),
        }
    }

    fn url(&self, port: u16, path: &str) -> String {
        format!("http://{}:{}{}", self.host, port, path)
    }

    async fn send(&self, req: Request<Body>) -> Result<(StatusCode, hyper::body::Bytes)> {
        let exchange = async {
            let resp = self.client.request(req).await?;
            let status = resp.status();
            let body = hyper::body::to_bytes(resp.into_body()).await?;
            Ok::<_, hyper::Error>((status, body))
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .context("Request timed out")?
            .context("Request failed")
    }

    pub async fn post_json<B: Serialize>(
        &self,
        port: u16,
        path: &str,
        body: &B,
    ) -> Result<(StatusCode, hyper::body::Bytes)> {
        let json = serde_json::to_string(body)?;
        let req = Request::builder()
            .method(Method::POST)
            .uri(self.url(port, path))
            .header("content-type", "application/json")
            .body(Body::from(json))?;
        self.send(req).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, port: u16, path: &str) -> Result<T> {
        let req = Request::builder()
            .method(Method::GET)
            .uri(self.url(port, path))
            .body(Body::empty())?;
        let (status, body) = self.send(req).await?;
        if !status.is_success() {
            anyhow::bail!("{} returned {}: {}", path, status, error_text(&body));
        }
        serde_json::from_slice(&body).context("Failed to parse response body")
    }
}

/// Pull the `error` field out of a failure body, or fall back to the raw text
fn error_text(body: &[u8]) -> String {
    serde_json::from_slice::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).into_owned())
}

// ============================================================================
// NODE DIRECTORY OVER HTTP
// ============================================================================

/// Registry reached over HTTP
pub struct HttpDirectory {
    client: HttpClient,
    registry_port: u16,
}

impl HttpDirectory {
    pub fn new(client: HttpClient, registry_port: u16) -> Self {
        Self {
            client,
            registry_port,
        }
    }
}

#[async_trait]
impl NodeDirectory for HttpDirectory {
    async fn register(&self, record: NodeRecord) -> Result<(), RegistryError> {
        let (status, body) = self
            .client
            .post_json(self.registry_port, "/registerNode", &record)
            .await
            .map_err(|e| RegistryError::Unavailable(format!("{:#}", e)))?;

        if status.is_success() {
            Ok(())
        } else {
            Err(RegistryError::Unavailable(format!(
                "registry answered {}: {}",
                status,
                error_text(&body)
            )))
        }
    }

    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, RegistryError> {
        let body: NodesBody = self
            .client
            .get_json(self.registry_port, "/getNodeRegistry")
            .await
            .map_err(|e| RegistryError::Unavailable(format!("{:#}", e)))?;
        Ok(body.nodes)
    }
}

// ============================================================================
// TRANSPORT OVER HTTP
// ============================================================================

/// Delivers packets with `POST /message` to the port an address names
pub struct HttpTransport {
    client: HttpClient,
}

impl HttpTransport {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

/// Onion packets travel as base64 text, final payloads as-is
pub fn message_body(packet: Packet) -> MessageBody {
    let message = match packet {
        Packet::Onion(bytes) => STANDARD.encode(bytes),
        Packet::Plaintext(text) => text,
    };
    MessageBody { message }
}

pub fn port_for(address: Address) -> Result<u16, TransportError> {
    u16::try_from(address.value()).map_err(|_| TransportError::Unroutable(address))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn deliver(&self, to: Address, packet: Packet) -> Result<(), TransportError> {
        let port = port_for(to)?;
        let (status, body) = self
            .client
            .post_json(port, "/message", &message_body(packet))
            .await
            .map_err(|e| TransportError::Unreachable(to, format!("{:#}", e)))?;

        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::Rejected(to, error_text(&body)))
        }
    }
}

// ============================================================================
// USER CONTROL
// ============================================================================

/// Ask a running user endpoint to send `message` to `destination`
pub async fn send_via_user(
    client: &HttpClient,
    user_port: u16,
    message: &str,
    destination: UserId,
) -> Result<String> {
    let body = SendMessageBody {
        message: message.to_string(),
        destination_user_id: destination,
    };
    let (status, bytes) = client.post_json(user_port, "/sendMessage", &body).await?;

    if status.is_success() {
        let response: ResultBody<String> =
            serde_json::from_slice(&bytes).context("Failed to parse response body")?;
        Ok(response.result)
    } else {
        anyhow::bail!("Failed to send message: {}", error_text(&bytes))
    }
}

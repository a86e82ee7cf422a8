// HTTP servers for the registry, relays and user endpoints
//
// Every node is a small warp app bound to its own port. Bodies are JSON;
// liveness and acknowledgements are plain text, as the overlay's clients
// expect.

use crate::api::{ErrorBody, MessageBody, NodesBody, ResultBody, SendMessageBody};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use onionrelay_core::{NodeDirectory, NodeId, NodeRecord, Registry, RelayNode, Transport, UserNode};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

// ============================================================================
// SHARED FILTERS AND REPLIES
// ============================================================================

fn with_state<T: Clone + Send + Sync>(state: T) -> impl Filter<Extract = (T,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn status_route() -> impl Filter<Extract = (&'static str,), Error = Rejection> + Clone {
    warp::path!("status").and(warp::get()).map(|| "live")
}

fn json_result<T: Serialize>(result: T) -> Response {
    warp::reply::json(&ResultBody { result }).into_response()
}

fn json_error(status: StatusCode, error: impl Into<String>) -> Response {
    let body = ErrorBody {
        error: error.into(),
    };
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

fn acknowledged() -> Response {
    "success".into_response()
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Fields are optional so that a missing one is a 400 with a reason
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterNodeBody {
    node_id: Option<NodeId>,
    pub_key: Option<String>,
}

pub fn registry_routes(
    registry: Arc<Registry>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let register = warp::path!("registerNode")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(registry.clone()))
        .and_then(handle_register_node);

    let list = warp::path!("getNodeRegistry")
        .and(warp::get())
        .and(with_state(registry))
        .map(|registry: Arc<Registry>| {
            warp::reply::json(&NodesBody {
                nodes: registry.snapshot(),
            })
        });

    status_route().or(register).or(list)
}

async fn handle_register_node(
    body: RegisterNodeBody,
    registry: Arc<Registry>,
) -> Result<Response, Infallible> {
    let (Some(node_id), Some(pub_key)) = (body.node_id, body.pub_key) else {
        return Ok(json_error(StatusCode::BAD_REQUEST, "Missing nodeId or pubKey"));
    };

    match registry.upsert(NodeRecord::new(node_id, pub_key)) {
        Ok(()) => {
            tracing::info!("Registered relay {} ({} known)", node_id, registry.len());
            Ok(json_result("Node registered successfully"))
        }
        Err(e) => Ok(json_error(StatusCode::BAD_REQUEST, e.to_string())),
    }
}

pub async fn serve_registry(registry: Arc<Registry>, port: u16) {
    tracing::info!("Registry listening on port {}", port);
    warp::serve(registry_routes(registry))
        .run(([0, 0, 0, 0], port))
        .await;
}

// ============================================================================
// RELAY
// ============================================================================

pub fn relay_routes(
    relay: Arc<RelayNode>,
    transport: Arc<dyn Transport>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let message = warp::path!("message")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(relay.clone()))
        .and(with_state(transport))
        .and_then(handle_relay_message);

    let last_encrypted = warp::path!("getLastReceivedEncryptedMessage")
        .and(warp::get())
        .and(with_state(relay.clone()))
        .map(|relay: Arc<RelayNode>| json_result(relay.last_received_encrypted()));

    let last_decrypted = warp::path!("getLastReceivedDecryptedMessage")
        .and(warp::get())
        .and(with_state(relay.clone()))
        .map(|relay: Arc<RelayNode>| json_result(relay.last_decrypted()));

    let last_destination = warp::path!("getLastMessageDestination")
        .and(warp::get())
        .and(with_state(relay.clone()))
        .map(|relay: Arc<RelayNode>| json_result(relay.last_destination()));

    let private_key = warp::path!("getPrivateKey")
        .and(warp::get())
        .and(with_state(relay))
        .map(|relay: Arc<RelayNode>| match relay.export_private_key() {
            Ok(key) => json_result(key),
            Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        });

    status_route()
        .or(message)
        .or(last_encrypted)
        .or(last_decrypted)
        .or(last_destination)
        .or(private_key)
}

/// Peel, acknowledge, then forward in the background. The sender only
/// learns whether this relay accepted the packet.
async fn handle_relay_message(
    body: MessageBody,
    relay: Arc<RelayNode>,
    transport: Arc<dyn Transport>,
) -> Result<Response, Infallible> {
    let packet = match STANDARD.decode(body.message.trim()) {
        Ok(packet) => packet,
        Err(e) => {
            tracing::warn!("Relay {} got a non-base64 packet: {}", relay.node_id(), e);
            return Ok(json_error(
                StatusCode::BAD_REQUEST,
                format!("Packet is not base64: {}", e),
            ));
        }
    };

    match relay.peel(&packet) {
        Ok(peeled) => {
            tokio::spawn(async move {
                // Outcome and failures are logged by the relay itself
                let _ = relay.forward(peeled, transport.as_ref()).await;
            });
            Ok(acknowledged())
        }
        Err(e) => Ok(json_error(StatusCode::BAD_REQUEST, e.to_string())),
    }
}

pub async fn serve_relay(relay: Arc<RelayNode>, transport: Arc<dyn Transport>, port: u16) {
    tracing::info!("Relay {} listening on port {}", relay.node_id(), port);
    warp::serve(relay_routes(relay, transport))
        .run(([0, 0, 0, 0], port))
        .await;
}

// ============================================================================
// USER
// ============================================================================

#[derive(Clone)]
pub struct UserContext {
    pub user: Arc<UserNode>,
    pub directory: Arc<dyn NodeDirectory>,
    pub transport: Arc<dyn Transport>,
}

pub fn user_routes(ctx: UserContext) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let message = warp::path!("message")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(ctx.user.clone()))
        .map(|body: MessageBody, user: Arc<UserNode>| {
            user.receive(&body.message);
            acknowledged()
        });

    let send = warp::path!("sendMessage")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(ctx.clone()))
        .and_then(handle_send_message);

    let last_received = warp::path!("getLastReceivedMessage")
        .and(warp::get())
        .and(with_state(ctx.user.clone()))
        .map(|user: Arc<UserNode>| json_result(user.last_received()));

    let last_sent = warp::path!("getLastSentMessage")
        .and(warp::get())
        .and(with_state(ctx.user.clone()))
        .map(|user: Arc<UserNode>| json_result(user.last_sent()));

    let last_circuit = warp::path!("getLastCircuit")
        .and(warp::get())
        .and(with_state(ctx.user))
        .map(|user: Arc<UserNode>| json_result(user.last_circuit()));

    status_route()
        .or(message)
        .or(send)
        .or(last_received)
        .or(last_sent)
        .or(last_circuit)
}

async fn handle_send_message(
    body: SendMessageBody,
    ctx: UserContext,
) -> Result<Response, Infallible> {
    let result = ctx
        .user
        .send_message(
            &body.message,
            body.destination_user_id,
            ctx.directory.as_ref(),
            ctx.transport.as_ref(),
        )
        .await;

    match result {
        Ok(_) => Ok(json_result("Message sent")),
        Err(e) => {
            tracing::error!("User {} failed to send: {}", ctx.user.user_id(), e);
            Ok(json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

pub async fn serve_user(ctx: UserContext, port: u16) {
    tracing::info!("User {} listening on port {}", ctx.user.user_id(), port);
    warp::serve(user_routes(ctx))
        .run(([0, 0, 0, 0], port))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use onionrelay_core::{Address, NodeRecord, Packet, RegistryError, Topology, TransportError};
    use std::sync::Mutex;

    /// Records hand-offs instead of sending them
    #[derive(Default)]
    struct RecordingTransport {
        delivered: Mutex<Vec<(Address, Packet)>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn deliver(&self, to: Address, packet: Packet) -> Result<(), TransportError> {
            self.delivered.lock().unwrap().push((to, packet));
            Ok(())
        }
    }

    struct EmptyDirectory;

    #[async_trait]
    impl NodeDirectory for EmptyDirectory {
        async fn register(&self, _record: NodeRecord) -> Result<(), RegistryError> {
            Ok(())
        }

        async fn list_nodes(&self) -> Result<Vec<NodeRecord>, RegistryError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_register_node_requires_both_fields() {
        let registry = Arc::new(Registry::new());

        let missing_key = RegisterNodeBody {
            node_id: Some(1),
            pub_key: None,
        };
        let resp = handle_register_node(missing_key, registry.clone()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let empty_key = RegisterNodeBody {
            node_id: Some(1),
            pub_key: Some(String::new()),
        };
        let resp = handle_register_node(empty_key, registry.clone()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(registry.is_empty());

        let ok = RegisterNodeBody {
            node_id: Some(1),
            pub_key: Some("a2V5".into()),
        };
        let resp = handle_register_node(ok, registry.clone()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_relay_rejects_garbage() {
        let relay = Arc::new(RelayNode::generate(1).unwrap());
        let transport = Arc::new(RecordingTransport::default());

        let not_base64 = MessageBody {
            message: "%%%".into(),
        };
        let resp = handle_relay_message(not_base64, relay.clone(), transport.clone())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let not_an_envelope = MessageBody {
            message: STANDARD.encode(b"definitely not an onion"),
        };
        let resp = handle_relay_message(not_an_envelope, relay.clone(), transport.clone())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(transport.delivered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_with_empty_registry_is_server_error() {
        let transport = Arc::new(RecordingTransport::default());
        let ctx = UserContext {
            user: Arc::new(UserNode::new(1, Topology::default())),
            directory: Arc::new(EmptyDirectory),
            transport: transport.clone(),
        };

        let body = SendMessageBody {
            message: "hello".into(),
            destination_user_id: 2,
        };
        let resp = handle_send_message(body, ctx.clone()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(transport.delivered.lock().unwrap().is_empty());
        assert_eq!(ctx.user.last_sent().as_deref(), Some("hello"));
    }
}

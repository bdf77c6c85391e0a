//! HTTP API of a shoplist node.
//!
//! Client routes (`/list`) go through the quorum coordinator; every other
//! route serves a peer against the local replica. Bodies are decoded by
//! hand so a malformed payload is always a 400 with a `{message}` body.

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
};
use serde::de::DeserializeOwned;
use shoplist_cluster::{
    ANTI_ENTROPY_PATH, ClusterError, ClusterNode, DigestMessage, GOSSIP_PATH, JOIN_PATH, LIST_PATH,
    ListsMessage, MembersMessage, MessageBody, OPERATION_PATH, PING_PATH, PeerReply, PeerRequest,
    ReadRequest, WriteAck, WriteRequest,
};
use shoplist_crdt::ShoppingList;
use shoplist_storage::StorageError;
use shoplist_types::{ListId, NodeAddr};
use std::sync::Arc;
use tracing::{debug, warn};

type AppState = Arc<ClusterNode>;

/// An error answered as `{message}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn not_found(id: &ListId) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("list {id} not found"))
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ClusterError> for ApiError {
    fn from(e: ClusterError) -> Self {
        let status = match &e {
            ClusterError::Unavailable(_) | ClusterError::Timeout | ClusterError::Network(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ClusterError::Protocol(_)
            | ClusterError::Serialization(_)
            | ClusterError::Storage(StorageError::ReservedKey(_)) => StatusCode::BAD_REQUEST,
            ClusterError::Rejected(_) => StatusCode::FORBIDDEN,
            ClusterError::Storage(_) | ClusterError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(status = %self.status, message = %self.message, "request failed");
        } else {
            debug!(status = %self.status, message = %self.message, "request refused");
        }
        (self.status, Json(MessageBody::new(self.message))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn decode<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("invalid payload: {e}")))
}

fn check_id(id: &ListId) -> ApiResult<()> {
    ListId::parse(id.as_str())
        .map(|_| ())
        .map_err(|e| ApiError::bad_request(e.to_string()))
}

/// Builds the router serving every route of a node.
pub fn build_router(node: Arc<ClusterNode>) -> Router {
    Router::new()
        .route(OPERATION_PATH, post(replica_read).put(replica_write))
        .route(LIST_PATH, post(client_read).put(client_write))
        .route(GOSSIP_PATH, post(gossip))
        .route(ANTI_ENTROPY_PATH, post(digest_pull).put(merged_push))
        .route(JOIN_PATH, put(join))
        .route(PING_PATH, get(ping))
        .with_state(node)
}

// ── Client routes ────────────────────────────────────────────────

async fn client_read(State(node): State<AppState>, body: Bytes) -> ApiResult<Json<ShoppingList>> {
    let ReadRequest { list_id } = decode(&body)?;
    check_id(&list_id)?;
    match node.coordinate_read(&list_id).await? {
        Some(list) => Ok(Json(list)),
        None => Err(ApiError::not_found(&list_id)),
    }
}

async fn client_write(State(node): State<AppState>, body: Bytes) -> ApiResult<Json<WriteAck>> {
    let WriteRequest { list_id, content } = decode(&body)?;
    check_id(&list_id)?;
    Ok(Json(node.coordinate_write(&list_id, content).await?))
}

// ── Peer routes ──────────────────────────────────────────────────

async fn replica_read(State(node): State<AppState>, body: Bytes) -> ApiResult<Json<ShoppingList>> {
    let ReadRequest { list_id } = decode(&body)?;
    check_id(&list_id)?;
    match node.local_read(&list_id).await? {
        Some(list) => Ok(Json(list)),
        None => Err(ApiError::not_found(&list_id)),
    }
}

async fn replica_write(State(node): State<AppState>, body: Bytes) -> ApiResult<Json<MessageBody>> {
    let WriteRequest { list_id, content } = decode(&body)?;
    check_id(&list_id)?;
    node.local_write(&list_id, content).await?;
    Ok(Json(MessageBody::new("stored")))
}

async fn gossip(State(node): State<AppState>, body: Bytes) -> ApiResult<Json<MembersMessage>> {
    let members: MembersMessage = decode(&body)?;
    Ok(Json(node.handle_gossip(&members)))
}

async fn digest_pull(State(node): State<AppState>, body: Bytes) -> ApiResult<Json<ListsMessage>> {
    let digest: DigestMessage = decode(&body)?;
    Ok(Json(node.handle_digest_pull(digest).await?))
}

async fn merged_push(State(node): State<AppState>, body: Bytes) -> ApiResult<Json<MessageBody>> {
    let lists: ListsMessage = decode(&body)?;
    let count = node.handle_merged_push(lists).await?;
    Ok(Json(MessageBody::new(format!("merged {count} lists"))))
}

async fn join(State(node): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let addr: NodeAddr = decode(&body)?;
    match node.handle(PeerRequest::Join(addr)).await? {
        PeerReply::Members(members) => Ok((StatusCode::ACCEPTED, Json(members)).into_response()),
        PeerReply::Rejected(reason) => Err(ApiError::new(StatusCode::FORBIDDEN, reason)),
        other => Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("unexpected join reply {}", other.kind()),
        )),
    }
}

async fn ping() -> Json<MessageBody> {
    Json(MessageBody::new("pong"))
}

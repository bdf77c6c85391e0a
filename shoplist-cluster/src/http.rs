//! HTTP implementation of [`PeerTransport`].
//!
//! Each request kind maps to one route of a node's HTTP surface:
//!
//! | Request | Route |
//! |---|---|
//! | Read | `POST /operation` |
//! | Write | `PUT /operation` |
//! | Gossip | `POST /gossip` |
//! | DigestPull | `POST /gossip/antiEntropy/request` |
//! | MergedPush | `PUT /gossip/antiEntropy/request` |
//! | Join | `PUT /node/add` |
//! | Ping | `GET /ping` |

use crate::error::{ClusterError, ClusterResult};
use crate::protocol::{ListsMessage, MembersMessage, MessageBody, PeerReply, PeerRequest};
use crate::transport::PeerTransport;
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use shoplist_crdt::ShoppingList;
use shoplist_types::NodeAddr;
use std::time::Duration;
use tracing::debug;

pub const OPERATION_PATH: &str = "/operation";
pub const LIST_PATH: &str = "/list";
pub const GOSSIP_PATH: &str = "/gossip";
pub const ANTI_ENTROPY_PATH: &str = "/gossip/antiEntropy/request";
pub const JOIN_PATH: &str = "/node/add";
pub const PING_PATH: &str = "/ping";

/// JSON-over-HTTP peer transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Builds a transport whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> ClusterResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClusterError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn builder(&self, method: Method, peer: &NodeAddr, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", peer.base_url(), path))
    }
}

fn map_send_error(e: reqwest::Error) -> ClusterError {
    if e.is_timeout() {
        ClusterError::Timeout
    } else {
        ClusterError::Network(e.to_string())
    }
}

async fn send(builder: RequestBuilder) -> ClusterResult<Response> {
    builder.send().await.map_err(map_send_error)
}

async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> ClusterResult<T> {
    let bytes = response.bytes().await.map_err(map_send_error)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn unexpected(status: StatusCode, kind: &str) -> ClusterError {
    if status == StatusCode::SERVICE_UNAVAILABLE {
        ClusterError::Unavailable(format!("{kind}: peer answered 503"))
    } else {
        ClusterError::Protocol(format!("{kind}: unexpected status {status}"))
    }
}

#[async_trait]
impl PeerTransport for HttpTransport {
    async fn request(&self, peer: &NodeAddr, request: PeerRequest) -> ClusterResult<PeerReply> {
        let kind = request.kind();
        debug!(peer = %peer, kind, "sending peer request");

        match request {
            PeerRequest::Read(body) => {
                let resp = send(self.builder(Method::POST, peer, OPERATION_PATH).json(&body)).await?;
                match resp.status() {
                    StatusCode::OK => Ok(PeerReply::List(json_body::<ShoppingList>(resp).await?)),
                    StatusCode::NOT_FOUND => Ok(PeerReply::NotFound),
                    s => Err(unexpected(s, kind)),
                }
            }
            PeerRequest::Write(body) => {
                let resp = send(self.builder(Method::PUT, peer, OPERATION_PATH).json(&body)).await?;
                match resp.status() {
                    StatusCode::OK => Ok(PeerReply::Ack),
                    s => Err(unexpected(s, kind)),
                }
            }
            PeerRequest::Gossip(body) => {
                let resp = send(self.builder(Method::POST, peer, GOSSIP_PATH).json(&body)).await?;
                match resp.status() {
                    StatusCode::OK => Ok(PeerReply::Members(json_body::<MembersMessage>(resp).await?)),
                    s => Err(unexpected(s, kind)),
                }
            }
            PeerRequest::DigestPull(body) => {
                let resp =
                    send(self.builder(Method::POST, peer, ANTI_ENTROPY_PATH).json(&body)).await?;
                match resp.status() {
                    StatusCode::OK => Ok(PeerReply::Lists(json_body::<ListsMessage>(resp).await?)),
                    s => Err(unexpected(s, kind)),
                }
            }
            PeerRequest::MergedPush(body) => {
                let resp =
                    send(self.builder(Method::PUT, peer, ANTI_ENTROPY_PATH).json(&body)).await?;
                match resp.status() {
                    StatusCode::OK => Ok(PeerReply::Ack),
                    s => Err(unexpected(s, kind)),
                }
            }
            PeerRequest::Join(addr) => {
                let resp = send(self.builder(Method::PUT, peer, JOIN_PATH).json(&addr)).await?;
                match resp.status() {
                    StatusCode::ACCEPTED => {
                        Ok(PeerReply::Members(json_body::<MembersMessage>(resp).await?))
                    }
                    StatusCode::FORBIDDEN => {
                        let reason = json_body::<MessageBody>(resp)
                            .await
                            .map(|b| b.message)
                            .unwrap_or_else(|_| "duplicate node".to_string());
                        Ok(PeerReply::Rejected(reason))
                    }
                    s => Err(unexpected(s, kind)),
                }
            }
            PeerRequest::Ping => {
                let resp = send(self.builder(Method::GET, peer, PING_PATH)).await?;
                match resp.status() {
                    StatusCode::OK => Ok(PeerReply::Pong),
                    s => Err(unexpected(s, kind)),
                }
            }
        }
    }
}

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use shoplist_cluster::{
    ClusterConfig, ClusterNode, HttpTransport, MembersMessage, PeerReply, PeerRequest,
    PeerTransport, ReadRequest, WriteAck,
};
use shoplist_crdt::ShoppingList;
use shoplist_node::build_router;
use shoplist_ring::{HashRing, NodeStatus};
use shoplist_storage::{ListStore, MemoryStore, SqliteStore};
use shoplist_types::{ListId, NodeAddr};
use std::sync::Arc;
use std::time::Duration;

fn test_config() -> ClusterConfig {
    ClusterConfig {
        request_timeout: Duration::from_secs(2),
        gossip_timeout: Duration::from_secs(1),
        ..ClusterConfig::default()
    }
}

/// Spin up a node on an OS-assigned port; returns it and its base URL.
async fn spawn_node(store: Arc<ListStore>) -> (Arc<ClusterNode>, String) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = test_config();
    let transport = Arc::new(HttpTransport::new(config.request_timeout).unwrap());
    let node = ClusterNode::new(
        NodeAddr::new("127.0.0.1", port.to_string()),
        Arc::new(HashRing::new()),
        store,
        transport,
        config,
    );
    let app = build_router(node.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (node, format!("http://127.0.0.1:{port}"))
}

async fn spawn_memory_node() -> (Arc<ClusterNode>, String) {
    spawn_node(Arc::new(ListStore::new(Arc::new(MemoryStore::new())))).await
}

fn list_with(node: &str, items: &[(&str, i64)]) -> ShoppingList {
    let mut list = ShoppingList::new(node);
    for (name, qty) in items {
        list.add_or_update_item(name, *qty);
    }
    list
}

// ── Basic routes ─────────────────────────────────────────────────

#[tokio::test]
async fn ping_returns_pong() {
    let (_node, base) = spawn_memory_node().await;
    let resp = reqwest::get(format!("{base}/ping")).await.unwrap();

    assert_eq!(resp.status(), 200);
    let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.contains("application/json"));
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"message": "pong"}));
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let (_node, base) = spawn_memory_node().await;
    let resp = reqwest::get(format!("{base}/nonexistent")).await.unwrap();
    assert_eq!(resp.status(), 404);
}

// ── Replica routes ───────────────────────────────────────────────

#[tokio::test]
async fn replica_write_then_read() {
    let (_node, base) = spawn_memory_node().await;
    let client = reqwest::Client::new();
    let content = list_with("a", &[("milk", 3)]);

    let resp = client
        .put(format!("{base}/operation"))
        .json(&json!({"list_id": "weekly", "content": content}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .post(format!("{base}/operation"))
        .json(&json!({"list_id": "weekly"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["node_id"], "a");
    assert_eq!(body["items"]["milk"]["positive_count"]["a"], 3);
    assert_eq!(body["awset"]["state"], json!([["milk", "a", 1]]));
    assert_eq!(body["awset"]["context"], json!([["a", 1]]));
}

#[tokio::test]
async fn replica_read_of_missing_list_is_404() {
    let (_node, base) = spawn_memory_node().await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/operation"))
        .json(&json!({"list_id": "nope"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn malformed_payload_is_400() {
    let (node, base) = spawn_memory_node().await;
    let client = reqwest::Client::new();

    for (method, path) in [
        (reqwest::Method::PUT, "/operation"),
        (reqwest::Method::PUT, "/list"),
        (reqwest::Method::POST, "/gossip"),
        (reqwest::Method::PUT, "/node/add"),
    ] {
        let resp = client
            .request(method, format!("{base}{path}"))
            .body("not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "{path}");
    }
    assert!(node.store().list_ids().unwrap().is_empty());
}

#[tokio::test]
async fn invalid_counters_are_rejected_without_mutation() {
    let (node, base) = spawn_memory_node().await;
    let resp = reqwest::Client::new()
        .put(format!("{base}/operation"))
        .json(&json!({
            "list_id": "weekly",
            "content": {
                "node_id": "a",
                "items": {"milk": {"positive_count": {"a": 1}, "negative_count": {"a": 5}}},
                "awset": {"state": [["milk", "a", 1]], "context": [["a", 1]]}
            }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert!(node.store().get(&ListId::new("weekly")).unwrap().is_none());
}

#[tokio::test]
async fn reserved_and_empty_ids_are_rejected() {
    let (_node, base) = spawn_memory_node().await;
    let client = reqwest::Client::new();
    for id in ["lists_id_dot_contents", ""] {
        let resp = client
            .put(format!("{base}/operation"))
            .json(&json!({"list_id": id, "content": list_with("a", &[("x", 1)])}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "{id:?}");
    }
}

#[tokio::test]
async fn digest_pull_with_identical_context_is_empty() {
    let (node, base) = spawn_memory_node().await;
    let id = ListId::new("weekly");
    let list = list_with("a", &[("milk", 1)]);
    node.local_write(&id, list.clone()).await.unwrap();

    let resp = reqwest::Client::new()
        .post(format!("{base}/gossip/antiEntropy/request"))
        .json(&json!({"digests": {"weekly": list.context_digest()}}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"lists": {}}));
}

#[tokio::test]
async fn merged_push_is_stored() {
    let (node, base) = spawn_memory_node().await;
    let resp = reqwest::Client::new()
        .put(format!("{base}/gossip/antiEntropy/request"))
        .json(&json!({"lists": {"weekly": list_with("b", &[("tea", 2)])}}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let stored = node.store().get(&ListId::new("weekly")).unwrap().unwrap();
    assert_eq!(stored.quantity("tea"), Some(2));
}

// ── Join ─────────────────────────────────────────────────────────

#[tokio::test]
async fn join_route_status_codes() {
    let (node, base) = spawn_memory_node().await;
    let client = reqwest::Client::new();
    let joiner = json!({"address": "127.0.0.1", "port": "1"});

    let resp = client.put(format!("{base}/node/add")).json(&joiner).send().await.unwrap();
    assert_eq!(resp.status(), 202);
    let members: MembersMessage = resp.json().await.unwrap();
    assert_eq!(members.nodes.len(), 2);
    assert_eq!(node.ring().status("127.0.0.1:1"), Some(NodeStatus::Unknown));

    let resp = client.put(format!("{base}/node/add")).json(&joiner).send().await.unwrap();
    assert_eq!(resp.status(), 403);

    let resp = client
        .put(format!("{base}/node/add"))
        .json(&json!({"address": "", "port": "1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn http_transport_maps_replies() {
    let (server, _base) = spawn_memory_node().await;
    let transport = HttpTransport::new(Duration::from_secs(2)).unwrap();
    let peer = server.addr().clone();

    assert_eq!(transport.request(&peer, PeerRequest::Ping).await.unwrap(), PeerReply::Pong);
    let read = PeerRequest::Read(ReadRequest {
        list_id: ListId::new("missing"),
    });
    assert_eq!(transport.request(&peer, read).await.unwrap(), PeerReply::NotFound);

    let join = PeerRequest::Join(NodeAddr::new("127.0.0.1", "2"));
    assert!(matches!(
        transport.request(&peer, join.clone()).await.unwrap(),
        PeerReply::Members(_)
    ));
    assert!(matches!(
        transport.request(&peer, join).await.unwrap(),
        PeerReply::Rejected(_)
    ));
}

#[tokio::test]
async fn http_transport_reports_unreachable_peer() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let transport = HttpTransport::new(Duration::from_secs(1)).unwrap();
    let err = transport
        .request(&NodeAddr::new("127.0.0.1", port.to_string()), PeerRequest::Ping)
        .await
        .unwrap_err();
    assert!(err.is_transient());
}

// ── Multi-node ───────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn three_node_cluster_over_http() {
    let (a, base_a) = spawn_memory_node().await;
    let (b, _) = spawn_memory_node().await;
    let (c, base_c) = spawn_memory_node().await;

    b.join(a.addr()).await.unwrap();
    c.join(a.addr()).await.unwrap();
    for _ in 0..2 {
        for node in [&a, &b, &c] {
            node.gossip_round().await;
        }
    }
    for node in [&a, &b, &c] {
        assert_eq!(node.ring().len(), 3);
        assert!(node.ring().nodes().iter().all(|n| n.is_ok()));
    }

    let client = reqwest::Client::new();
    let resp = client
        .put(format!("{base_a}/list"))
        .json(&json!({"list_id": "party", "content": list_with("alice", &[("chips", 2)])}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let ack: WriteAck = resp.json().await.unwrap();
    assert_eq!(ack.required, 2);

    let resp = client
        .put(format!("{base_c}/list"))
        .json(&json!({"list_id": "party", "content": list_with("bob", &[("chips", 3)])}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .post(format!("{base_c}/list"))
        .json(&json!({"list_id": "party"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let list: ShoppingList = resp.json().await.unwrap();
    assert_eq!(list.quantity("chips"), Some(5));

    let resp = client
        .post(format!("{base_a}/list"))
        .json(&json!({"list_id": "absent"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn sqlite_backed_node_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("node.db");
    let id = ListId::new("weekly");

    {
        let store = Arc::new(ListStore::new(Arc::new(SqliteStore::open(&path).unwrap())));
        let (node, _base) = spawn_node(store).await;
        node.local_write(&id, list_with("a", &[("bread", 2)])).await.unwrap();
    }

    let store = Arc::new(ListStore::new(Arc::new(SqliteStore::open(&path).unwrap())));
    assert_eq!(store.rebuild_index().unwrap(), 1);
    let (_node, base) = spawn_node(store).await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/operation"))
        .json(&json!({"list_id": "weekly"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let list: ShoppingList = resp.json().await.unwrap();
    assert_eq!(list.quantity("bread"), Some(2));
}

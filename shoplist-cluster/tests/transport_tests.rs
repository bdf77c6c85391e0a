mod common;

use common::{addr, cluster, list_with};
use pretty_assertions::assert_eq;
use shoplist_cluster::{
    ClusterError, PeerReply, PeerRequest, PeerTransport, ReadRequest, WriteRequest,
    mock::MemoryNetwork,
};
use shoplist_types::ListId;

#[tokio::test]
async fn memory_network_routes_to_registered_node() {
    let c = cluster(2);
    let id = ListId::new("weekly");
    let write = PeerRequest::Write(WriteRequest {
        list_id: id.clone(),
        content: list_with("a", &[("milk", 2)]),
    });

    assert_eq!(c.network.request(&c.addr(1), write).await.unwrap(), PeerReply::Ack);
    let read = c
        .network
        .request(&c.addr(1), PeerRequest::Read(ReadRequest { list_id: id }))
        .await
        .unwrap();
    match read {
        PeerReply::List(list) => assert_eq!(list.quantity("milk"), Some(2)),
        other => panic!("expected list, got {other:?}"),
    }
    assert_eq!(
        c.network.requests(),
        vec![(c.nodes[1].id(), "write"), (c.nodes[1].id(), "read")]
    );
}

#[tokio::test]
async fn down_node_refuses_connections() {
    let c = cluster(2);
    c.take_down(1);
    let err = c
        .network
        .request(&c.addr(1), PeerRequest::Ping)
        .await
        .unwrap_err();
    assert!(matches!(err, ClusterError::Network(_)));

    c.bring_up(1);
    assert_eq!(
        c.network.request(&c.addr(1), PeerRequest::Ping).await.unwrap(),
        PeerReply::Pong
    );
}

#[tokio::test]
async fn unregistered_address_has_no_route() {
    let network = MemoryNetwork::new();
    let err = network.request(&addr(5), PeerRequest::Ping).await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn dropped_node_is_unreachable() {
    let c = cluster(2);
    let network = c.network.clone();
    let gone = c.addr(1);
    drop(c);
    assert!(network.request(&gone, PeerRequest::Ping).await.is_err());
}

#[tokio::test]
async fn calls_to_self_bypass_the_transport() {
    let c = cluster(2);
    c.nodes[0]
        .call(&c.addr(0), PeerRequest::Ping, std::time::Duration::from_secs(1))
        .await
        .unwrap();
    assert!(c.network.requests().is_empty());
}

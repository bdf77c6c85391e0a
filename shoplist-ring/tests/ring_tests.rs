use pretty_assertions::assert_eq;
use proptest::prelude::*;
use shoplist_ring::{HashRing, MemberEntry, NodeStatus, token_for};
use shoplist_types::NodeAddr;
use std::collections::HashSet;

fn addr(port: usize) -> NodeAddr {
    NodeAddr::new("127.0.0.1", (9000 + port).to_string())
}

fn ring_with(statuses: &[NodeStatus]) -> HashRing {
    let ring = HashRing::new();
    for (i, &status) in statuses.iter().enumerate() {
        assert!(ring.add_node_with_status(&addr(i), status));
    }
    ring
}

// ── Membership ────────────────────────────────────────────────────

#[test]
fn add_node_rejects_empty_and_duplicates() {
    let ring = HashRing::new();
    assert!(!ring.add_node("", "9000", false));
    assert!(!ring.add_node("127.0.0.1", "", false));
    assert!(ring.add_node("127.0.0.1", "9000", true));
    assert!(!ring.add_node("127.0.0.1", "9000", false));
    assert_eq!(ring.len(), 1);
}

#[test]
fn self_starts_ok_others_unknown() {
    let ring = HashRing::new();
    ring.add_node("127.0.0.1", "9000", true);
    ring.add_node("127.0.0.1", "9001", false);
    assert_eq!(ring.status("127.0.0.1:9000"), Some(NodeStatus::Ok));
    assert_eq!(ring.status("127.0.0.1:9001"), Some(NodeStatus::Unknown));
}

#[test]
fn version_bumps_on_changes_only() {
    let ring = ring_with(&[NodeStatus::Ok, NodeStatus::Ok]);
    let v = ring.version();
    assert!(!ring.set_status("127.0.0.1:9000", NodeStatus::Ok));
    assert_eq!(ring.version(), v);
    assert!(ring.set_status("127.0.0.1:9000", NodeStatus::Unresponsive));
    assert!(ring.version() > v);
}

#[test]
fn failures_flip_status_at_threshold() {
    let ring = ring_with(&[NodeStatus::Ok, NodeStatus::Ok]);
    let id = "127.0.0.1:9001";
    assert!(!ring.record_failure(id, 3));
    assert!(!ring.record_failure(id, 3));
    assert_eq!(ring.status(id), Some(NodeStatus::Ok));
    assert!(ring.record_failure(id, 3));
    assert_eq!(ring.status(id), Some(NodeStatus::Unresponsive));
    assert_eq!(ring.node(id).unwrap().dead_counter, 3);

    assert!(ring.record_success(id));
    assert_eq!(ring.status(id), Some(NodeStatus::Ok));
    assert_eq!(ring.node(id).unwrap().dead_counter, 0);
    assert!(!ring.record_success(id));
}

#[test]
fn merge_members_adds_unknown_as_unresponsive() {
    let ring = ring_with(&[NodeStatus::Ok]);
    let entries = vec![
        MemberEntry {
            address: "127.0.0.1".into(),
            port: "9000".into(),
            status: NodeStatus::Ok,
        },
        MemberEntry {
            address: "127.0.0.1".into(),
            port: "9005".into(),
            status: NodeStatus::Ok,
        },
        MemberEntry {
            address: "127.0.0.1".into(),
            port: "9006".into(),
            status: NodeStatus::Ok,
        },
        MemberEntry {
            address: "".into(),
            port: "1".into(),
            status: NodeStatus::Ok,
        },
    ];
    assert_eq!(ring.merge_members(&entries, "127.0.0.1:9006"), 1);
    assert_eq!(ring.status("127.0.0.1:9005"), Some(NodeStatus::Unresponsive));
    assert!(!ring.contains("127.0.0.1:9006"));
    assert_eq!(ring.merge_members(&entries, "127.0.0.1:9006"), 0);
}

#[test]
fn members_wire_shape() {
    let ring = ring_with(&[NodeStatus::Ok]);
    let json = serde_json::to_value(ring.members()).unwrap();
    assert_eq!(
        json,
        serde_json::json!([{"address": "127.0.0.1", "port": "9000", "status": "OK"}])
    );
}

#[test]
fn peers_exclude_self() {
    let ring = ring_with(&[NodeStatus::Ok, NodeStatus::Unknown, NodeStatus::Unresponsive]);
    let peers = ring.peers("127.0.0.1:9000");
    assert_eq!(peers, vec![addr(1), addr(2)]);
}

// ── Lookups ───────────────────────────────────────────────────────

#[test]
fn empty_ring_lookups_are_empty() {
    let ring = HashRing::new();
    assert!(ring.healthy_nodes_for_id("k").is_empty());
    assert!(ring.preference_list("k").is_empty());
    assert!(ring.next_healthy_virtual_node("k").is_none());
    assert!(ring.partition_for("k").is_empty());
}

#[test]
fn all_unhealthy_terminates_with_empty_list() {
    let ring = ring_with(&[NodeStatus::Unresponsive, NodeStatus::Unknown, NodeStatus::Unresponsive]);
    assert!(ring.healthy_nodes_for_id("groceries").is_empty());
    assert!(ring.next_healthy_virtual_node("groceries").is_none());
    assert!(ring.partitions().is_empty());
}

#[test]
fn lookup_wraps_past_last_token() {
    let ring = ring_with(&[NodeStatus::Ok, NodeStatus::Ok, NodeStatus::Ok]);
    let tokens: Vec<u128> = ring.partitions().keys().copied().collect();
    let last = *tokens.last().unwrap();

    // Find a key hashing past the last token
    let key = (0..10_000)
        .map(|i| format!("key-{i}"))
        .find(|k| token_for(k) > last)
        .expect("some key hashes past the last token");
    assert_eq!(ring.next_healthy_virtual_node(&key), Some(tokens[0]));
    assert_eq!(ring.partition_for(&key), ring.partition(tokens[0]));
}

#[test]
fn partition_for_matches_healthy_nodes() {
    let ring = ring_with(&[NodeStatus::Ok; 6]);
    for i in 0..50 {
        let key = format!("list-{i}");
        assert_eq!(ring.partition_for(&key), ring.healthy_nodes_for_id(&key));
    }
}

#[test]
fn preference_list_extends_healthy_nodes() {
    let ring = ring_with(&[NodeStatus::Ok; 5]);
    let prefs = ring.preference_list("weekly");
    let healthy = ring.healthy_nodes_for_id("weekly");
    assert_eq!(prefs.len(), 5);
    assert_eq!(&prefs[..healthy.len()], healthy.as_slice());
}

fn status_strategy() -> impl Strategy<Value = NodeStatus> {
    prop_oneof![
        3 => Just(NodeStatus::Ok),
        1 => Just(NodeStatus::Unresponsive),
        1 => Just(NodeStatus::Unknown),
    ]
}

proptest! {
    /// Replica lists have `min(rf, #ok)` distinct OK nodes.
    #[test]
    fn coverage(statuses in prop::collection::vec(status_strategy(), 0..12), key in "[a-z0-9]{1,16}") {
        let ring = ring_with(&statuses);
        let ok = statuses.iter().filter(|s| **s == NodeStatus::Ok).count();
        let nodes = ring.healthy_nodes_for_id(&key);

        prop_assert_eq!(nodes.len(), ring.replication_factor().min(ok));
        let unique: HashSet<_> = nodes.iter().map(NodeAddr::id).collect();
        prop_assert_eq!(unique.len(), nodes.len());
        for n in &nodes {
            prop_assert_eq!(ring.status(&n.id()), Some(NodeStatus::Ok));
        }
    }

    #[test]
    fn replication_factor_formula(n in 0usize..20) {
        let ring = ring_with(&vec![NodeStatus::Ok; n]);
        let expected = n.saturating_sub(1).clamp(1, 8);
        prop_assert_eq!(ring.replication_factor(), expected);
        for node in ring.nodes() {
            prop_assert_eq!(node.vnodes.len(), expected);
        }
    }
}

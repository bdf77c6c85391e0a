use pretty_assertions::assert_eq;
use shoplist_crdt::{Crdt, ShoppingList};
use std::collections::BTreeMap;

#[test]
fn concurrent_increments_sum() {
    // milk +3 on A, +2 on B
    let mut a = ShoppingList::new("A");
    a.add_or_update_item("milk", 3);
    let mut b = ShoppingList::new("B");
    b.add_or_update_item("milk", 2);

    let merged = a.merged(&b);
    assert_eq!(merged.quantity("milk"), Some(5));
    assert_eq!(b.merged(&a).quantity("milk"), Some(5));
}

#[test]
fn merge_propagates_new_item() {
    let mut a = ShoppingList::new("A");
    a.add_or_update_item("eggs", 1);
    let b = ShoppingList::new("B");

    let b = b.merged(&a);
    assert!(b.item_names().contains(&"eggs".to_string()));
    assert_eq!(b.quantity("eggs"), Some(1));
}

#[test]
fn concurrent_update_beats_remove() {
    let mut base = ShoppingList::new("A");
    base.add_or_update_item("bread", 2);

    let mut a = base.clone();
    a.add_or_update_item("bread", 1);
    let mut b = base.clone().with_node_id("B");
    b.remove_item("bread");

    let merged = a.merged(&b);
    assert_eq!(merged.quantity("bread"), Some(3));
}

#[test]
fn observed_remove_hides_item() {
    let mut a = ShoppingList::new("A");
    a.add_or_update_item("bread", 2);
    let mut b = a.clone().with_node_id("B");
    b.remove_item("bread");

    assert_eq!(a.merged(&b).quantity("bread"), None);
    assert_eq!(b.merged(&a).quantity("bread"), None);
}

#[test]
fn decrements_from_other_writers_are_bounded_separately() {
    let mut a = ShoppingList::new("A");
    a.add_or_update_item("apples", 5);
    let mut b = a.clone().with_node_id("B");
    // B never incremented, so its decrement is clamped to zero
    b.add_or_update_item("apples", -3);

    let merged = a.merged(&b);
    assert_eq!(merged.quantity("apples"), Some(5));
    assert!(merged.quantity("apples").unwrap() >= 0);
}

#[test]
fn items_lists_visible_quantities() {
    let mut list = ShoppingList::new("A");
    list.add_or_update_item("milk", 2);
    list.add_or_update_item("eggs", 12);
    list.add_or_update_item("soap", 1);
    list.remove_item("soap");

    let expected: BTreeMap<String, i64> =
        [("eggs".to_string(), 12), ("milk".to_string(), 2)].into();
    assert_eq!(list.items(), expected);
    assert_eq!(list.item_names(), vec!["eggs", "milk"]);
}

#[test]
fn dominance_follows_merge() {
    let mut a = ShoppingList::new("A");
    a.add_or_update_item("milk", 1);
    let mut b = a.clone().with_node_id("B");
    b.add_or_update_item("tea", 1);

    assert!(a.is_dominated_by(&b));
    assert!(!b.is_dominated_by(&a));
    assert_eq!(a.merged(&b), b);
}

#[test]
fn json_roundtrip() {
    let mut list = ShoppingList::new("A");
    list.add_or_update_item("milk", 3);
    list.add_or_update_item("milk", -1);
    list.add_or_update_item("eggs", 6);
    list.remove_item("eggs");

    let json = serde_json::to_string(&list).unwrap();
    let parsed: ShoppingList = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, list);
    assert_eq!(parsed.node_id, list.node_id);
    assert_eq!(parsed.quantity("milk"), Some(2));
}

#[test]
fn decode_rejects_inconsistent_awset() {
    let json = r#"{"node_id":"A","items":{},"awset":{"state":[["milk","A",5]],"context":[["A",1]]}}"#;
    assert!(serde_json::from_str::<ShoppingList>(json).is_err());
}

#[test]
fn decode_rejects_malformed_counter() {
    let json = r#"{"node_id":"A","items":{"milk":{"positive_count":{"A":1},"negative_count":{"A":4}}},"awset":{"state":[],"context":[]}}"#;
    assert!(serde_json::from_str::<ShoppingList>(json).is_err());
}

#[test]
fn re_add_after_remove_continues_from_retained_quantity() {
    let mut list = ShoppingList::new("A");
    list.add_or_update_item("milk", 3);
    list.remove_item("milk");
    assert_eq!(list.quantity("milk"), None);
    assert_eq!(list.counter("milk").map(|c| c.value()), Some(3));

    list.add_or_update_item("milk", 1);
    assert_eq!(list.quantity("milk"), Some(4));
}

#[test]
fn remove_on_one_replica_re_add_on_another_is_associative() {
    let mut a = ShoppingList::new("a");
    a.add_or_update_item("x", 5);
    let mut b = a.clone().with_node_id("b");
    b.remove_item("x");
    let mut c = ShoppingList::new("c");
    c.add_or_update_item("x", 1);

    let left = a.merged(&b).merged(&c);
    let right = a.merged(&b.merged(&c));
    assert_eq!(left, right);
    assert_eq!(left.quantity("x"), right.quantity("x"));
}

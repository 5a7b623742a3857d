use super::*;
use proptest::prelude::*;
use std::collections::BTreeMap;

fn tree_with(order: usize, keys: impl IntoIterator<Item = i64>) -> BPlusTree<i64, String> {
    let mut tree = BPlusTree::new(order).unwrap();
    for k in keys {
        tree.insert(k, format!("v{k}"));
    }
    tree
}

#[test]
fn test_new_tree() {
    let tree = BPlusTree::<i64, String>::new(4).unwrap();
    assert!(tree.is_empty());
    assert_eq!(tree.len(), 0);
    assert_eq!(tree.height(), 1);
    assert_eq!(tree.order(), 4);
    assert_eq!(tree.node_count(), 1);
    assert!(tree.is_valid());
}

#[test]
fn test_invalid_order() {
    assert!(matches!(
        BPlusTree::<i64, i64>::new(2),
        Err(BPlusTreeError::InvalidOrder(2))
    ));
    assert!(BPlusTree::<i64, i64>::new(1).is_err());
    assert!(BPlusTree::<i64, i64>::new(0).is_err());
    assert!(BPlusTree::<i64, i64>::new(3).is_ok());
}

#[test]
fn test_default_order() {
    let tree: BPlusTree<i64, i64> = BPlusTree::default();
    assert_eq!(tree.order(), DEFAULT_ORDER);
    assert!(tree.is_empty());
}

#[test]
fn test_single_insert_and_search() {
    let mut tree = BPlusTree::new(4).unwrap();

    assert_eq!(tree.insert(42, "answer"), None);

    assert!(!tree.is_empty());
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.height(), 1);
    assert_eq!(tree.search(&42), Some(&"answer"));
    assert_eq!(tree.search(&41), None);
}

#[test]
fn test_multiple_inserts_no_split() {
    // Order 4 means max 3 keys per leaf
    let tree = tree_with(4, [10, 20, 30]);

    assert_eq!(tree.len(), 3);
    assert_eq!(tree.height(), 1);
    assert_eq!(tree.all_keys(), vec![10, 20, 30]);
}

#[test]
fn test_leaf_split() {
    // The fourth key fills the leaf to the order and splits it
    let tree = tree_with(4, [10, 20, 30, 40]);

    assert_eq!(tree.len(), 4);
    assert_eq!(tree.height(), 2);
    assert_eq!(tree.node_count(), 3);
    assert!(tree.is_valid());

    for k in [10, 20, 30, 40] {
        assert_eq!(tree.search(&k), Some(&format!("v{k}")));
    }
}

#[test]
fn test_upsert() {
    let mut tree = tree_with(4, 0..10);

    assert_eq!(tree.insert(5, "first".to_string()), Some("v5".to_string()));
    assert_eq!(tree.insert(5, "second".to_string()), Some("first".to_string()));

    assert_eq!(tree.len(), 10);
    assert_eq!(tree.search(&5).map(String::as_str), Some("second"));
    assert!(tree.is_valid());
}

#[test]
fn test_get_mut() {
    let mut tree = tree_with(4, 0..20);

    if let Some(value) = tree.get_mut(&13) {
        value.push_str("-edited");
    }

    assert_eq!(tree.search(&13).map(String::as_str), Some("v13-edited"));
    assert!(tree.get_mut(&99).is_none());
}

#[test]
fn test_small_tree_basic() {
    let mut tree = BPlusTree::new(5).unwrap();
    tree.insert(10, "Ten");
    tree.insert(20, "Twenty");
    tree.insert(5, "Five");
    tree.insert(15, "Fifteen");
    tree.insert(30, "Thirty");

    assert_eq!(tree.all_keys(), vec![5, 10, 15, 20, 30]);
    assert_eq!(tree.search(&15), Some(&"Fifteen"));
    assert_eq!(tree.search(&25), None);
    assert!(tree.is_valid());
}

#[test]
fn test_sequential_inserts_stay_shallow() {
    let tree = tree_with(4, 1..=20);

    assert!(tree.height() <= 5);
    assert_eq!(tree.all_keys(), (1..=20).collect::<Vec<_>>());
    assert!(tree.is_valid());
}

#[test]
fn test_height_bound_large_order() {
    let tree = tree_with(16, 0..1000);

    assert_eq!(tree.len(), 1000);
    assert!(tree.height() <= 5);
    assert!(tree.is_valid());
}

#[test]
fn test_delete_then_drain() {
    let mut tree = tree_with(4, (1..=10).map(|i| i * 10));

    assert!(tree.delete(&20));
    assert!(tree.delete(&50));
    assert!(tree.delete(&80));

    assert_eq!(tree.len(), 7);
    assert_eq!(tree.search(&20), None);
    assert_eq!(tree.all_keys(), vec![10, 30, 40, 60, 70, 90, 100]);
    assert!(tree.is_valid());

    for k in [10, 30, 40, 60, 70, 90, 100] {
        assert!(tree.delete(&k), "key {k} should be deletable");
        assert!(tree.is_valid(), "invalid after deleting {k}");
    }

    assert!(tree.is_empty());
    assert_eq!(tree.height(), 1);
}

#[test]
fn test_range_query() {
    let tree = tree_with(5, (1..=10).map(|i| i * 10));

    let results = tree.range_query(&25, &75);
    let keys: Vec<i64> = results.iter().map(|(k, _)| *k).collect();
    assert_eq!(keys, vec![30, 40, 50, 60, 70]);
    assert_eq!(results[0].1, "v30");

    assert!(tree.range_query(&101, &200).is_empty());
}

#[test]
fn test_range_query_bounds_inclusive() {
    let tree = tree_with(4, 0..50);

    let keys: Vec<i64> = tree.range(&10, &20).map(|(k, _)| *k).collect();
    assert_eq!(keys, (10..=20).collect::<Vec<_>>());

    let keys: Vec<i64> = tree.range(&-5, &2).map(|(k, _)| *k).collect();
    assert_eq!(keys, vec![0, 1, 2]);

    // Reversed range
    assert!(tree.range_query(&30, &20).is_empty());
    assert_eq!(tree.range_query(&7, &7), vec![(7, "v7".to_string())]);
}

#[test]
fn test_range_matches_linear_filter() {
    let tree = tree_with(6, (0..300).map(|i| (i * 37) % 1000));
    let all = tree.all_keys();

    for (lower, upper) in [(0, 999), (100, 200), (555, 556), (990, 2000), (-10, 5)] {
        let expected: Vec<i64> = all
            .iter()
            .copied()
            .filter(|k| (lower..=upper).contains(k))
            .collect();
        let actual: Vec<i64> = tree.range_query(&lower, &upper).into_iter().map(|(k, _)| k).collect();
        assert_eq!(actual, expected, "range [{lower}, {upper}]");
    }
}

#[test]
fn test_delete_single() {
    let mut tree = tree_with(4, [10, 20, 30]);

    assert_eq!(tree.remove(&20), Some("v20".to_string()));
    assert_eq!(tree.len(), 2);
    assert_eq!(tree.search(&20), None);
    assert!(tree.contains_key(&10));
    assert!(tree.contains_key(&30));
}

#[test]
fn test_delete_not_found() {
    let mut tree = tree_with(4, 0..20);
    let height = tree.height();
    let nodes = tree.node_count();

    assert!(!tree.delete(&100));
    assert!(!tree.delete(&-1));
    assert_eq!(tree.len(), 20);
    assert_eq!(tree.height(), height);
    assert_eq!(tree.node_count(), nodes);
}

#[test]
fn test_delete_with_redistribution() {
    let mut tree = tree_with(4, (0..8).map(|i| i * 10));

    for i in 0..4 {
        assert!(tree.delete(&(i * 10)));
        assert!(tree.is_valid());
    }

    assert_eq!(tree.len(), 4);
    for i in 4..8 {
        assert_eq!(tree.search(&(i * 10)), Some(&format!("v{}", i * 10)));
    }
}

#[test]
fn test_delete_with_merge() {
    let mut tree = tree_with(4, (0..10).map(|i| i * 10));
    let initial_height = tree.height();

    for i in 0..7 {
        tree.delete(&(i * 10));
    }

    assert_eq!(tree.len(), 3);
    assert!(tree.height() <= initial_height);
    assert!(tree.is_valid());
    assert_eq!(tree.all_keys(), vec![70, 80, 90]);
}

#[test]
fn test_iterator() {
    let tree = tree_with(4, [5, 2, 8, 1, 9, 3, 7, 4, 6, 0]);

    // Iterator should return in sorted order
    let entries: Vec<_> = tree.iter().collect();
    assert_eq!(entries.len(), 10);

    for (i, (k, v)) in entries.into_iter().enumerate() {
        assert_eq!(*k, i as i64);
        assert_eq!(v, &format!("v{i}"));
    }

    let via_into_iter: Vec<i64> = (&tree).into_iter().map(|(k, _)| *k).collect();
    assert_eq!(via_into_iter, tree.all_keys());
    assert_eq!(tree.keys().copied().collect::<Vec<_>>(), tree.all_keys());
}

#[test]
fn test_first_and_last() {
    let mut tree = tree_with(4, [50, 30, 70, 20, 40, 60, 80, 10]);

    assert_eq!(tree.first_key_value().map(|(k, _)| *k), Some(10));
    assert_eq!(tree.last_key_value().map(|(k, _)| *k), Some(80));

    tree.delete(&10);
    tree.delete(&80);
    assert_eq!(tree.first_key_value().map(|(k, _)| *k), Some(20));
    assert_eq!(tree.last_key_value().map(|(k, _)| *k), Some(70));

    let empty = BPlusTree::<i64, String>::new(4).unwrap();
    assert_eq!(empty.first_key_value(), None);
    assert_eq!(empty.last_key_value(), None);
}

#[test]
fn test_negative_keys() {
    let tree = tree_with(4, [-10, 0, 10]);

    assert!(tree.contains_key(&-10));
    assert!(tree.contains_key(&0));
    assert!(tree.contains_key(&10));
    assert_eq!(tree.range_query(&-15, &5).len(), 2);
}

#[test]
fn test_string_keys() {
    let mut tree = BPlusTree::new(3).unwrap();
    for word in ["pear", "apple", "fig", "kiwi", "banana", "cherry", "date"] {
        tree.insert(word.to_string(), word.len());
    }

    assert_eq!(
        tree.all_keys(),
        vec!["apple", "banana", "cherry", "date", "fig", "kiwi", "pear"]
    );
    assert_eq!(tree.search(&"kiwi".to_string()), Some(&4));
    assert!(tree.is_valid());
}

#[test]
fn test_stress_insert_delete() {
    let mut tree = tree_with(4, 0..100);
    assert_eq!(tree.len(), 100);

    // Delete every other entry
    for i in (0..100).step_by(2) {
        assert!(tree.delete(&i));
    }

    assert_eq!(tree.len(), 50);
    assert!(tree.is_valid());

    for i in 0..100 {
        assert_eq!(tree.contains_key(&i), i % 2 == 1, "key {i}");
    }
}

#[test]
fn test_delete_stress_debug() {
    // Search must keep working while deletions rebalance the tree
    let mut tree = tree_with(4, 0..20);
    assert!(tree.height() >= 2);

    for i in (0..20).step_by(2) {
        tree.delete(&i);
        tree.validate().unwrap();

        for j in 0..20 {
            let should_exist = j % 2 != 0 || j > i;
            assert_eq!(
                tree.contains_key(&j),
                should_exist,
                "After delete({}): Key {} should_exist={}",
                i,
                j,
                should_exist
            );
        }
    }

    assert_eq!(tree.len(), 10);
}

#[test]
fn test_reverse_delete_collapses_height() {
    let mut tree = tree_with(3, 0..200);
    assert!(tree.height() >= 4);

    for i in (0..200).rev() {
        assert!(tree.delete(&i));
        tree.validate().unwrap();
    }

    assert!(tree.is_empty());
    assert_eq!(tree.height(), 1);
    assert_eq!(tree.node_count(), 1);
}

#[test]
fn test_node_recycling() {
    let mut tree = tree_with(4, 0..100);
    for i in 0..100 {
        tree.delete(&i);
    }
    assert_eq!(tree.node_count(), 1);

    for i in 0..100 {
        tree.insert(i, format!("again{i}"));
    }
    assert!(tree.is_valid());
    assert_eq!(tree.len(), 100);
    assert_eq!(tree.search(&99).map(String::as_str), Some("again99"));
}

#[test]
fn test_large_tree() {
    let mut tree = tree_with(4, 0..1000);

    assert_eq!(tree.len(), 1000);
    assert!(tree.height() >= 3);
    assert!(tree.is_valid());

    assert_eq!(tree.range_query(&500, &510).len(), 11);

    for i in (0..1000).filter(|i| i % 3 == 0) {
        tree.delete(&i);
    }
    assert_eq!(tree.len(), 666);
    assert!(tree.is_valid());
}

#[test]
fn test_clear() {
    let mut tree = tree_with(4, 0..50);
    tree.clear();

    assert!(tree.is_empty());
    assert_eq!(tree.height(), 1);
    assert_eq!(tree.order(), 4);
    assert_eq!(tree.node_count(), 1);

    tree.insert(1, "one".to_string());
    assert_eq!(tree.len(), 1);
}

#[test]
fn test_stats() {
    let tree = tree_with(4, [1, 2, 3]);
    let stats = tree.stats();

    assert_eq!(stats.order, 4);
    assert_eq!(stats.height, 1);
    assert_eq!(stats.entries, 3);
    assert_eq!(stats.leaf_nodes, 1);
    assert_eq!(stats.internal_nodes, 0);
    assert!((stats.leaf_fill - 1.0).abs() < f64::EPSILON);

    let large = tree_with(8, 0..500).stats();
    assert_eq!(large.entries, 500);
    assert!(large.internal_nodes >= 1);

    let json = serde_json::to_value(&large).unwrap();
    assert_eq!(json["entries"], 500);
}

// ============================================================================
//  Differential tests against BTreeMap
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Insert(i64, u32),
    Delete(i64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0i64..200, any::<u32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        2 => (0i64..200).prop_map(Op::Delete),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Every mutation leaves a valid tree that agrees with the oracle.
    #[test]
    fn prop_matches_btreemap(order in 3usize..10, ops in prop::collection::vec(op(), 1..400)) {
        let mut tree = BPlusTree::new(order).unwrap();
        let mut oracle = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(k, v) => {
                    prop_assert_eq!(tree.insert(k, v), oracle.insert(k, v));
                }
                Op::Delete(k) => {
                    let expected = oracle.remove(&k);
                    prop_assert_eq!(tree.delete(&k), expected.is_some());
                }
            }
            if let Err(err) = tree.validate() {
                return Err(TestCaseError::fail(format!("{err} after {op:?}")));
            }
        }

        prop_assert_eq!(tree.len(), oracle.len());
        prop_assert_eq!(tree.is_empty(), oracle.is_empty());
        prop_assert_eq!(tree.all_keys(), oracle.keys().copied().collect::<Vec<_>>());
        for (k, v) in &oracle {
            prop_assert_eq!(tree.search(k), Some(v));
        }
    }

    /// Range scans return exactly the oracle's inclusive range.
    #[test]
    fn prop_range_matches_btreemap(
        order in 3usize..12,
        keys in prop::collection::btree_set(-500i64..500, 0..300),
        lower in -600i64..600,
        span in 0i64..400,
    ) {
        let tree = tree_with(order, keys.iter().copied());
        let upper = lower + span;

        let expected: Vec<i64> = keys.range(lower..=upper).copied().collect();
        let actual: Vec<i64> = tree.range_query(&lower, &upper).into_iter().map(|(k, _)| k).collect();
        prop_assert_eq!(actual, expected);
    }

    /// Deleting every key in arbitrary order always rebalances fully.
    #[test]
    fn prop_drain_in_any_order(
        order in 3usize..8,
        keys in prop::collection::vec(0i64..1000, 1..300).prop_shuffle(),
    ) {
        let mut tree = tree_with(order, keys.iter().copied());

        for k in &keys {
            let before = tree.len();
            let removed = tree.delete(k);
            prop_assert_eq!(tree.len(), if removed { before - 1 } else { before });
            prop_assert!(!tree.contains_key(k));
            prop_assert!(tree.is_valid());
        }

        prop_assert!(tree.is_empty());
        prop_assert_eq!(tree.height(), 1);
    }
}

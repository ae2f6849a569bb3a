//! Integration suite covering the scenarios and invariants.
//!
//! Ported from the reference's `test_basic_operations`, `test_sequential_insertion`,
//! `test_random_insertion`, `test_duplicate_keys`, and `validate_tree_structure`.

use bptree_storage::{BTree, BTreeConfig, Config, Db, Pager, PagerConfig, TreeNode};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn small_tree() -> BTree {
    let pager = Pager::new(PagerConfig::new(100));
    BTree::open(pager, BTreeConfig::new(13, 3)).unwrap()
}

/// P1, P3, P4, P5: recursively walk an exported tree, checking every
/// non-root node's parent pointer, every internal node's routing keys
/// against its children's bounds, strictly ascending keys, and uniform
/// leaf depth. Returns `(min_key, max_key, leaf_depth)`.
fn validate(node: &TreeNode, expected_parent: Option<u32>, depth: usize) -> (u32, u32, usize) {
    if let Some(parent) = expected_parent {
        assert_eq!(
            node.parent, parent,
            "page {} parent field should be {parent}, got {}",
            node.page_num, node.parent
        );
    }

    if node.is_leaf {
        assert!(!node.keys.is_empty(), "leaf {} has no cells", node.page_num);
        for w in node.keys.windows(2) {
            assert!(w[0] < w[1], "leaf {} keys not strictly ascending: {:?}", node.page_num, node.keys);
        }
        let min = *node.keys.first().unwrap();
        let max = *node.keys.last().unwrap();
        (min, max, depth)
    } else {
        assert!(!node.children.is_empty(), "internal {} has no children", node.page_num);
        assert_eq!(node.keys.len() + 1, node.children.len());
        for w in node.keys.windows(2) {
            assert!(w[0] < w[1], "internal {} keys not strictly ascending: {:?}", node.page_num, node.keys);
        }

        let mut leaf_depth = None;
        let mut overall_min = None;
        let mut overall_max = 0u32;

        for (i, child) in node.children.iter().enumerate() {
            let (child_min, child_max, child_depth) = validate(child, Some(node.page_num), depth + 1);

            if overall_min.is_none() {
                overall_min = Some(child_min);
            }
            overall_max = child_max;

            if i < node.keys.len() {
                let k_i = node.keys[i];
                assert_eq!(
                    child_max, k_i,
                    "P3 violated at internal {}: max_key(children[{i}]) = {child_max}, routing key = {k_i}",
                    node.page_num
                );
            }
            if i > 0 {
                let k_prev = node.keys[i - 1];
                assert!(
                    child_min > k_prev,
                    "P3 violated at internal {}: min_key(children[{i}]) = {child_min} <= {k_prev}",
                    node.page_num
                );
            }

            match leaf_depth {
                None => leaf_depth = Some(child_depth),
                Some(d) => assert_eq!(d, child_depth, "P5 violated: unequal leaf depth under {}", node.page_num),
            }
        }

        (overall_min.unwrap(), overall_max, leaf_depth.unwrap())
    }
}

fn assert_tree_valid(db: &Db) {
    let root = db.export_tree().unwrap();
    validate(&root, None, 0);
}

#[test]
fn scenario_1_empty_tree() {
    let mut tree = small_tree();
    let cursor = tree.start().unwrap();
    assert!(cursor.end_of_table());
}

#[test]
fn scenario_2_single_insert_and_find() {
    let mut tree = small_tree();
    assert!(tree.insert(42, b"v").unwrap());

    let mut cursor = tree.find(42).unwrap();
    assert!(!cursor.end_of_table());
    assert_eq!(cursor.value().unwrap(), b"v");

    let root_leaf = cursor.page_num();

    let cursor = tree.find(41).unwrap();
    assert_eq!(cursor.page_num(), root_leaf);
    assert_eq!(cursor.cell_num(), 0);

    let cursor = tree.find(43).unwrap();
    assert_eq!(cursor.page_num(), root_leaf);
    assert_eq!(cursor.cell_num(), 1);
}

#[test]
fn scenario_3_sequential_100() {
    let db = Db::with_default_config();
    for i in 0..100u32 {
        assert!(db.insert(i, format!("val{i}").as_bytes()).unwrap());
    }
    let all = db.iter().unwrap();
    assert_eq!(all.len(), 100);
    for (i, (key, value)) in all.into_iter().enumerate() {
        assert_eq!(key, i as u32);
        assert_eq!(value, format!("val{i}").into_bytes());
    }
    assert_tree_valid(&db);
}

#[test]
fn scenario_4_random_25_seed_42() {
    let db = Db::with_default_config();
    let num_inserts = 25u32;
    let mut keys: Vec<u32> = (0..num_inserts).collect();

    let mut rng = StdRng::seed_from_u64(42);
    for i in (1..keys.len()).rev() {
        let j = rng.gen_range(0..=i);
        keys.swap(i, j);
    }

    for &key in &keys {
        let value = format!("random_value_{key}");
        assert!(db.insert(key, value.as_bytes()).unwrap());
    }

    let all = db.iter().unwrap();
    assert_eq!(all.len(), num_inserts as usize);
    for (i, (key, value)) in all.into_iter().enumerate() {
        assert_eq!(key, i as u32);
        assert_eq!(value, format!("random_value_{i}").into_bytes());
    }
    assert_tree_valid(&db);
}

#[test]
fn scenario_5_duplicate() {
    let db = Db::with_default_config();
    assert!(db.insert(1, b"a").unwrap());
    assert!(!db.insert(1, b"b").unwrap());
    assert_eq!(db.get(1).unwrap(), Some(b"a".to_vec()));
}

#[test]
fn scenario_6_force_splits_checked_every_ten() {
    let db = Db::with_default_config();
    // DEFAULT_MAX_LEAF_CELLS=13, DEFAULT_MAX_INTERNAL_CELLS=510: 13*510 sequential
    // inserts would force an internal split well past a root split, but that's an
    // expensive test run. A smaller config drives the same code paths in far fewer
    // inserts, so use one sized to force leaf, internal, and root splits quickly.
    let pager = Pager::new(PagerConfig::new(200));
    let mut tree = BTree::open(pager, BTreeConfig::new(4, 4)).unwrap();

    for batch in 0..6 {
        for i in 0..10u32 {
            let key = batch * 10 + i;
            assert!(tree.insert(key, format!("v{key}").as_bytes()).unwrap());
        }
        // P1-P5 hold after every batch of 10 inserts.
        let total = (batch + 1) * 10;
        let mut cursor = tree.start().unwrap();
        for expected in 0..total {
            assert!(!cursor.end_of_table());
            assert_eq!(cursor.key().unwrap(), expected);
            cursor.advance().unwrap();
        }
        assert!(cursor.end_of_table());
    }
}

#[test]
fn p6_duplicate_insert_leaves_tree_byte_identical() {
    let db = Db::with_default_config();
    for key in [10u32, 5, 20, 1, 15] {
        db.insert(key, format!("v{key}").as_bytes()).unwrap();
    }
    let before = db.export_tree().unwrap();
    assert!(!db.insert(10, b"different").unwrap());
    let after = db.export_tree().unwrap();
    assert_eq!(format!("{before:?}"), format!("{after:?}"));
}

#[test]
fn invariants_hold_after_many_out_of_order_inserts() {
    let db = Db::with_default_config();
    let mut keys: Vec<u32> = (0..300).collect();
    let mut rng = StdRng::seed_from_u64(7);
    for i in (1..keys.len()).rev() {
        let j = rng.gen_range(0..=i);
        keys.swap(i, j);
    }
    for &key in &keys {
        assert!(db.insert(key, format!("v{key}").as_bytes()).unwrap());
    }
    let all = db.iter().unwrap();
    let got_keys: Vec<u32> = all.iter().map(|(k, _)| *k).collect();
    let mut expected: Vec<u32> = (0..300).collect();
    expected.sort_unstable();
    assert_eq!(got_keys, expected);
    assert_tree_valid(&db);
}

#[test]
fn invariants_hold_past_two_levels_with_tight_node_capacity() {
    // max_internal_cells=3 (4 children per internal node) and 50 keys force at
    // least one internal split on top of the leaf splits, so P3 gets checked
    // against a routing key whose child is itself an internal node — not just
    // a leaf, the only case the other tests above happen to exercise.
    let db = Db::open(Config::new().btree_config(BTreeConfig::new(3, 3))).unwrap();

    let mut keys: Vec<u32> = (0..50).collect();
    let mut rng = StdRng::seed_from_u64(99);
    for i in (1..keys.len()).rev() {
        let j = rng.gen_range(0..=i);
        keys.swap(i, j);
    }
    for &key in &keys {
        assert!(db.insert(key, format!("v{key}").as_bytes()).unwrap());
    }

    let root = db.export_tree().unwrap();
    assert!(!root.is_leaf, "50 keys at max_internal_cells=3 should outgrow a single internal level");
    assert!(
        root.children.iter().any(|c| !c.is_leaf),
        "expected at least one internal grandchild, tree only reached two levels"
    );

    let all = db.iter().unwrap();
    let got_keys: Vec<u32> = all.iter().map(|(k, _)| *k).collect();
    assert_eq!(got_keys, (0..50).collect::<Vec<u32>>());

    assert_tree_valid(&db);
}

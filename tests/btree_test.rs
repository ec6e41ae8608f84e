//! Integration tests for the B+ tree index

use std::sync::Arc;

use quarry::buffer::BufferPoolManager;
use quarry::common::{PageId, RecordId, SlotId};
use quarry::index::{BPlusTree, BTreePageRef, InternalPageRef, LeafPageRef};
use quarry::storage::disk::DiskManager;

use tempfile::NamedTempFile;

fn create_bpm(pool_size: usize) -> (Arc<BufferPoolManager>, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let disk_manager = Arc::new(DiskManager::new(temp_file.path()).unwrap());
    let bpm = Arc::new(BufferPoolManager::new(pool_size, 2, disk_manager));
    (bpm, temp_file)
}

fn rid(key: u32) -> RecordId {
    RecordId::new(PageId::new(key as i32), SlotId::new((key % 97) as u16))
}

/// Walks the whole tree checking separator bounds, per-node occupancy, and
/// that every leaf sits at the same depth.
fn check_structure(bpm: &Arc<BufferPoolManager>, tree: &BPlusTree, leaf_max: usize, internal_max: usize) {
    let root = tree.root_page_id().unwrap();
    if !root.is_valid() {
        return;
    }
    let mut depths = Vec::new();
    walk(bpm, root, true, 0, None, None, &mut depths, leaf_max, internal_max);
    assert!(
        depths.windows(2).all(|w| w[0] == w[1]),
        "leaves at unequal depths: {:?}",
        depths
    );
}

#[allow(clippy::too_many_arguments)]
fn walk(
    bpm: &Arc<BufferPoolManager>,
    page_id: PageId,
    is_root: bool,
    depth: usize,
    lower: Option<u32>,
    upper: Option<u32>,
    depths: &mut Vec<usize>,
    leaf_max: usize,
    internal_max: usize,
) {
    let guard = bpm.fetch_page_basic(page_id).unwrap();
    let children = {
        let data = guard.data();
        if BTreePageRef::new(&data[..]).is_leaf() {
            let leaf = LeafPageRef::new(&data[..]);
            if !is_root {
                assert!(
                    leaf.size() >= leaf_max / 2,
                    "leaf {} below min occupancy: {}",
                    page_id,
                    leaf.size()
                );
            }
            for i in 0..leaf.size() {
                let k = leaf.key_at(i);
                if i > 0 {
                    assert!(leaf.key_at(i - 1) < k, "leaf keys out of order");
                }
                if let Some(lo) = lower {
                    assert!(k >= lo, "leaf key {} below separator bound {}", k, lo);
                }
                if let Some(hi) = upper {
                    assert!(k < hi, "leaf key {} above separator bound {}", k, hi);
                }
            }
            depths.push(depth);
            Vec::new()
        } else {
            let node = InternalPageRef::new(&data[..]);
            if is_root {
                assert!(node.size() >= 2, "internal root with a single child");
            } else {
                assert!(
                    node.size() >= internal_max / 2,
                    "internal {} below min occupancy: {}",
                    page_id,
                    node.size()
                );
            }
            for i in 2..node.size() {
                assert!(node.key_at(i - 1) < node.key_at(i), "separators out of order");
            }
            (0..node.size())
                .map(|i| {
                    let lo = if i == 0 { lower } else { Some(node.key_at(i)) };
                    let hi = if i + 1 < node.size() { Some(node.key_at(i + 1)) } else { upper };
                    (node.child_at(i), lo, hi)
                })
                .collect()
        }
    };
    drop(guard);

    for (child, lo, hi) in children {
        walk(bpm, child, false, depth + 1, lo, hi, depths, leaf_max, internal_max);
    }
}

fn collect_keys(tree: &BPlusTree) -> Vec<u32> {
    let mut keys = Vec::new();
    let mut iter = tree.iter().unwrap();
    while let Some((key, _)) = iter.next().unwrap() {
        keys.push(key);
    }
    keys
}

#[test]
fn test_btree_starts_empty() {
    let (bpm, _temp) = create_bpm(10);
    let tree = BPlusTree::new(bpm.clone(), 4, 4).unwrap();

    assert!(tree.is_empty().unwrap());
    assert_eq!(tree.get(1).unwrap(), None);
    assert!(tree.iter().unwrap().is_end());
    tree.remove(1).unwrap(); // no-op
}

// Insert 3, 1, 4, then 1 again (rejected): one root leaf holding [1, 3, 4].
#[test]
fn test_insert_without_split() {
    let (bpm, _temp) = create_bpm(10);
    let tree = BPlusTree::new(bpm.clone(), 4, 4).unwrap();

    assert!(tree.insert(3, rid(3)).unwrap());
    assert!(tree.insert(1, rid(1)).unwrap());
    assert!(tree.insert(4, rid(4)).unwrap());
    assert!(!tree.insert(1, rid(99)).unwrap());

    let root_id = tree.root_page_id().unwrap();
    let guard = bpm.fetch_page_basic(root_id).unwrap();
    {
        let data = guard.data();
        assert!(BTreePageRef::new(&data[..]).is_leaf());
        let leaf = LeafPageRef::new(&data[..]);
        assert_eq!(leaf.size(), 3);
        assert_eq!(leaf.key_at(0), 1);
        assert_eq!(leaf.key_at(1), 3);
        assert_eq!(leaf.key_at(2), 4);
    }
    drop(guard);

    assert_eq!(tree.get(1).unwrap(), Some(rid(1)));
    assert_eq!(tree.get(2).unwrap(), None);
    assert_eq!(tree.get(4).unwrap(), Some(rid(4)));
}

// Inserting 1..=5 with leaf_max_size 4 splits the root leaf: left [1, 2],
// right [3, 4, 5], and a new internal root with separator 3.
#[test]
fn test_leaf_split_promotes_root() {
    let (bpm, _temp) = create_bpm(10);
    let tree = BPlusTree::new(bpm.clone(), 4, 4).unwrap();

    for key in 1..=5 {
        assert!(tree.insert(key, rid(key)).unwrap());
    }

    let root_id = tree.root_page_id().unwrap();
    let guard = bpm.fetch_page_basic(root_id).unwrap();
    let (left_id, right_id) = {
        let data = guard.data();
        assert!(!BTreePageRef::new(&data[..]).is_leaf());
        let root = InternalPageRef::new(&data[..]);
        assert_eq!(root.size(), 2);
        assert_eq!(root.key_at(1), 3);
        (root.child_at(0), root.child_at(1))
    };
    drop(guard);

    let left_guard = bpm.fetch_page_basic(left_id).unwrap();
    {
        let data = left_guard.data();
        let leaf = LeafPageRef::new(&data[..]);
        assert_eq!(leaf.size(), 2);
        assert_eq!(leaf.key_at(0), 1);
        assert_eq!(leaf.key_at(1), 2);
        assert_eq!(leaf.next_page_id(), right_id);
    }
    drop(left_guard);

    let right_guard = bpm.fetch_page_basic(right_id).unwrap();
    {
        let data = right_guard.data();
        let leaf = LeafPageRef::new(&data[..]);
        assert_eq!(leaf.size(), 3);
        assert_eq!(leaf.key_at(0), 3);
        assert_eq!(leaf.key_at(2), 5);
        assert!(!leaf.next_page_id().is_valid());
    }
    drop(right_guard);

    for key in 1..=5 {
        assert_eq!(tree.get(key).unwrap(), Some(rid(key)), "missing key {}", key);
    }
    check_structure(&bpm, &tree, 4, 4);
}

// Forward iteration over the split tree: 1 first, five entries total;
// starting from key 3 lands on 3.
#[test]
fn test_iterator_over_split_tree() {
    let (bpm, _temp) = create_bpm(10);
    let tree = BPlusTree::new(bpm.clone(), 4, 4).unwrap();

    for key in 1..=5 {
        tree.insert(key, rid(key)).unwrap();
    }

    let mut iter = tree.iter().unwrap();
    let mut seen = Vec::new();
    while let Some((key, value)) = iter.next().unwrap() {
        assert_eq!(value, rid(key));
        seen.push(key);
    }
    assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    assert!(iter.is_end());

    let mut from_three = tree.iter_from(3).unwrap();
    assert_eq!(from_three.next().unwrap().map(|(k, _)| k), Some(3));
    assert_eq!(from_three.next().unwrap().map(|(k, _)| k), Some(4));

    // Probing past the largest key yields the end iterator
    let mut past = tree.iter_from(1000).unwrap();
    assert_eq!(past.next().unwrap(), None);
    assert!(past.is_end());
}

// Continuing from [1..5]: deleting 5 then 4 underflows the right leaf; the
// left sibling cannot lend, so the leaves merge and the root collapses back
// to a single leaf [1, 2, 3].
#[test]
fn test_delete_merges_and_collapses_root() {
    let (bpm, _temp) = create_bpm(10);
    let tree = BPlusTree::new(bpm.clone(), 4, 4).unwrap();

    for key in 1..=5 {
        tree.insert(key, rid(key)).unwrap();
    }

    tree.remove(5).unwrap();
    tree.remove(4).unwrap();

    let root_id = tree.root_page_id().unwrap();
    let guard = bpm.fetch_page_basic(root_id).unwrap();
    {
        let data = guard.data();
        assert!(BTreePageRef::new(&data[..]).is_leaf());
        let leaf = LeafPageRef::new(&data[..]);
        assert_eq!(leaf.size(), 3);
        assert_eq!(leaf.key_at(0), 1);
        assert_eq!(leaf.key_at(1), 2);
        assert_eq!(leaf.key_at(2), 3);
        assert!(!leaf.next_page_id().is_valid());
    }
    drop(guard);

    assert_eq!(tree.get(4).unwrap(), None);
    assert_eq!(tree.get(5).unwrap(), None);
    for key in 1..=3 {
        assert_eq!(tree.get(key).unwrap(), Some(rid(key)));
    }
    check_structure(&bpm, &tree, 4, 4);
}

#[test]
fn test_delete_borrows_from_right_sibling() {
    let (bpm, _temp) = create_bpm(10);
    let tree = BPlusTree::new(bpm.clone(), 4, 4).unwrap();

    for key in 1..=5 {
        tree.insert(key, rid(key)).unwrap();
    }
    // Leaves: [1, 2] | [3, 4, 5]. Deleting 1 underflows the left leaf;
    // the right sibling can lend its 3.
    tree.remove(1).unwrap();

    assert_eq!(collect_keys(&tree), vec![2, 3, 4, 5]);
    check_structure(&bpm, &tree, 4, 4);
}

#[test]
fn test_delete_borrows_from_left_sibling() {
    let (bpm, _temp) = create_bpm(10);
    let tree = BPlusTree::new(bpm.clone(), 4, 4).unwrap();

    for key in 1..=5 {
        tree.insert(key, rid(key)).unwrap();
    }
    tree.insert(0, rid(0)).unwrap();
    // Leaves: [0, 1, 2] | [3, 4, 5]. Shrink the right to [3], forcing a
    // borrow of the left sibling's 2.
    tree.remove(5).unwrap();
    tree.remove(4).unwrap();

    assert_eq!(collect_keys(&tree), vec![0, 1, 2, 3]);
    check_structure(&bpm, &tree, 4, 4);
}

#[test]
fn test_delete_until_empty_and_reuse() {
    let (bpm, _temp) = create_bpm(10);
    let tree = BPlusTree::new(bpm.clone(), 4, 4).unwrap();

    tree.insert(1, rid(1)).unwrap();
    tree.insert(2, rid(2)).unwrap();
    tree.remove(1).unwrap();
    tree.remove(2).unwrap();

    assert!(tree.is_empty().unwrap());
    assert!(tree.iter().unwrap().is_end());

    // The tree grows a fresh root on the next insert
    tree.insert(10, rid(10)).unwrap();
    assert_eq!(tree.get(10).unwrap(), Some(rid(10)));
    assert!(!tree.is_empty().unwrap());
}

#[test]
fn test_sequential_inserts_multi_level() {
    let (bpm, _temp) = create_bpm(64);
    let tree = BPlusTree::new(bpm.clone(), 4, 4).unwrap();

    for key in 0..200 {
        assert!(tree.insert(key, rid(key)).unwrap(), "failed at key {}", key);
    }

    for key in 0..200 {
        assert_eq!(tree.get(key).unwrap(), Some(rid(key)), "missing key {}", key);
    }
    assert_eq!(tree.get(200).unwrap(), None);

    let keys = collect_keys(&tree);
    assert_eq!(keys, (0..200).collect::<Vec<_>>());
    check_structure(&bpm, &tree, 4, 4);
}

#[test]
fn test_reverse_inserts() {
    let (bpm, _temp) = create_bpm(64);
    let tree = BPlusTree::new(bpm.clone(), 4, 4).unwrap();

    for key in (0..100).rev() {
        tree.insert(key, rid(key)).unwrap();
    }

    for key in 0..100 {
        assert_eq!(tree.get(key).unwrap(), Some(rid(key)));
    }
    assert_eq!(collect_keys(&tree), (0..100).collect::<Vec<_>>());
    check_structure(&bpm, &tree, 4, 4);
}

#[test]
fn test_random_inserts() {
    use rand::seq::SliceRandom;
    use rand::thread_rng;

    let (bpm, _temp) = create_bpm(64);
    let tree = BPlusTree::new(bpm.clone(), 8, 8).unwrap();

    let mut keys: Vec<u32> = (0..500).collect();
    keys.shuffle(&mut thread_rng());

    for &key in &keys {
        assert!(tree.insert(key, rid(key)).unwrap(), "failed at key {}", key);
    }

    for &key in &keys {
        assert_eq!(tree.get(key).unwrap(), Some(rid(key)), "missing key {}", key);
    }
    assert_eq!(collect_keys(&tree), (0..500).collect::<Vec<_>>());
    check_structure(&bpm, &tree, 8, 8);
}

#[test]
fn test_random_deletes_to_empty() {
    use rand::seq::SliceRandom;
    use rand::thread_rng;

    let (bpm, _temp) = create_bpm(64);
    let tree = BPlusTree::new(bpm.clone(), 4, 4).unwrap();

    let mut keys: Vec<u32> = (0..150).collect();
    keys.shuffle(&mut thread_rng());
    for &key in &keys {
        tree.insert(key, rid(key)).unwrap();
    }

    keys.shuffle(&mut thread_rng());
    for (i, &key) in keys.iter().enumerate() {
        tree.remove(key).unwrap();
        assert_eq!(tree.get(key).unwrap(), None, "key {} survived removal", key);
        if i % 10 == 0 {
            check_structure(&bpm, &tree, 4, 4);
        }
    }

    assert!(tree.is_empty().unwrap());
    assert!(tree.iter().unwrap().is_end());
}

#[test]
fn test_mixed_workload_against_reference_model() {
    use rand::prelude::*;

    let (bpm, _temp) = create_bpm(64);
    let tree = BPlusTree::new(bpm.clone(), 8, 8).unwrap();
    let mut model = std::collections::BTreeMap::new();
    let mut rng = thread_rng();

    for _ in 0..2000 {
        let key = rng.gen_range(0..300u32);
        if rng.gen_bool(0.6) {
            let inserted = tree.insert(key, rid(key)).unwrap();
            assert_eq!(inserted, model.insert(key, rid(key)).is_none());
        } else {
            tree.remove(key).unwrap();
            model.remove(&key);
        }
    }

    for key in 0..300u32 {
        assert_eq!(tree.get(key).unwrap(), model.get(&key).copied(), "mismatch at {}", key);
    }
    assert_eq!(collect_keys(&tree), model.keys().copied().collect::<Vec<_>>());
    check_structure(&bpm, &tree, 8, 8);
}

#[test]
fn test_iterator_positions_compare_equal() {
    let (bpm, _temp) = create_bpm(10);
    let tree = BPlusTree::new(bpm.clone(), 4, 4).unwrap();

    for key in 1..=5 {
        tree.insert(key, rid(key)).unwrap();
    }

    let a = tree.iter().unwrap();
    let b = tree.iter().unwrap();
    assert!(a == b, "fresh begin iterators must compare equal");
    assert_eq!(a.position(), b.position());

    let c = tree.iter_from(3).unwrap();
    assert!(a != c);

    let mut d = tree.iter().unwrap();
    for _ in 0..5 {
        d.next().unwrap();
    }
    assert_eq!(d.next().unwrap(), None);
    let mut e = tree.iter_from(1000).unwrap();
    assert_eq!(e.next().unwrap(), None);
    assert!(d == e, "exhausted iterators share the end position");
}

#[test]
fn test_btree_persistence() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    let header_page_id = {
        let disk_manager = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(16, 2, disk_manager));
        let tree = BPlusTree::new(bpm.clone(), 4, 4).unwrap();

        for key in 0..50 {
            tree.insert(key, rid(key)).unwrap();
        }

        bpm.flush_all_pages().unwrap();
        tree.header_page_id()
    };

    {
        let disk_manager = Arc::new(DiskManager::new(&path).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(16, 2, disk_manager));
        let tree = BPlusTree::open(header_page_id, bpm.clone(), 4, 4);

        for key in 0..50 {
            assert_eq!(
                tree.get(key).unwrap(),
                Some(rid(key)),
                "missing key {} after reload",
                key
            );
        }
        assert_eq!(collect_keys(&tree), (0..50).collect::<Vec<_>>());
        check_structure(&bpm, &tree, 4, 4);
    }
}

#[test]
fn test_small_pool_forces_node_eviction() {
    // Pool barely larger than one root-to-leaf path: tree pages constantly
    // spill to disk and come back.
    let (bpm, _temp) = create_bpm(10);
    let tree = BPlusTree::new(bpm.clone(), 4, 4).unwrap();

    for key in 0..120 {
        assert!(tree.insert(key, rid(key)).unwrap(), "failed at key {}", key);
    }
    for key in 0..120 {
        assert_eq!(tree.get(key).unwrap(), Some(rid(key)), "missing key {}", key);
    }
    check_structure(&bpm, &tree, 4, 4);
}

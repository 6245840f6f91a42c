//! Test the first root split across degrees.

use crate::e2e_tests::helpers::*;
use crate::kmer;
use crate::storage::TreeFile;
use crate::storage::btree::BTree;

#[test]
fn test_2t_ascending_keys_split_root_once() {
    for t in 2..=6u32 {
        let dir = TestDir::new();
        let path = dir.path("split.btree");
        let t_usize = t as usize;

        {
            let file = TreeFile::create(&path).expect("create");
            let mut tree = BTree::create(file, i64::from(t), 0).expect("tree");
            for key in 0..u64::from(2 * t) {
                tree.insert(key).expect("insert");
            }
            tree.save_metadata().expect("save");
        }

        let file = TreeFile::open_read_only(&path).expect("open");
        let mut tree = BTree::load_metadata(file, 0).expect("load");
        assert_eq!(tree.node_count(), 3, "degree {t}");

        let root = tree.root().expect("root");
        assert!(!root.is_leaf);
        assert_eq!(root.key_count, 1);

        let left = tree.read_node(root.children[0]).expect("left");
        let right = tree.read_node(root.children[1]).expect("right");
        assert!(left.is_leaf && right.is_leaf);
        assert_eq!(left.key_count, t_usize - 1);
        // The split leaves t - 1 on each side; the triggering key then lands right.
        assert_eq!(right.key_count, t_usize);

        let record = u64::from(tree.degree().record_length());
        let len = std::fs::metadata(&path).expect("metadata").len();
        assert_eq!(len, 12 + 3 * record);
    }
}

#[test]
fn test_new_root_is_allocated_after_children() {
    let mut tree = memory_tree(2, 0);
    for kmer in ["AAA", "AAC", "AAG"] {
        tree.insert(kmer::encode(kmer).expect("encode")).expect("insert");
    }
    assert_eq!(tree.root_location(), 12);

    tree.insert(kmer::encode("AAT").expect("encode")).expect("insert");

    // Old root stays at 12, new root takes the next slot, sibling after it
    let root = tree.root().expect("root");
    assert_eq!(tree.root_location(), 12 + 77);
    assert_eq!(root.children[0], 12);
    assert_eq!(root.children[1], 12 + 2 * 77);
    assert_eq!(frequency(&mut tree, "AAC"), Some(1));
}

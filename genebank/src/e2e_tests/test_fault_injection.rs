//! Test that storage faults surface as errors from every tree operation.

use crate::e2e_tests::helpers::*;
use crate::simulation::{FaultConfig, SimulatedStorage, Simulator, SimulatorConfig};
use crate::storage::StorageError;
use crate::storage::btree::{BTree, BTreeError};

fn write_faults() -> FaultConfig {
    FaultConfig {
        write_error_rate: 1.0,
        ..FaultConfig::default()
    }
}

const fn is_injected<T>(result: &Result<T, BTreeError>) -> bool {
    matches!(
        result,
        Err(BTreeError::Storage(StorageError::InjectedFault(_)))
    )
}

#[test]
fn test_uncached_create_fails_on_root_write() {
    let storage = SimulatedStorage::with_config(1, write_faults());
    let result = BTree::create(storage, 2, 0);
    assert!(is_injected(&result));
}

#[test]
fn test_insert_write_failure() {
    let mut tree = memory_tree(2, 0);
    insert_kmers(&mut tree, &["ACGT"]);
    tree.storage_mut().set_fault_config(write_faults());

    assert!(is_injected(&tree.insert(key("TTTT"))));
}

#[test]
fn test_cached_writes_fail_at_save() {
    let storage = SimulatedStorage::with_config(1, write_faults());
    let mut tree = BTree::create(storage, 2, 16).expect("create defers the root write");
    insert_kmers(&mut tree, &["ACGT", "CCCC", "ACGT"]);
    assert_eq!(frequency(&mut tree, "ACGT"), Some(2));

    assert!(is_injected(&tree.save_metadata()));
}

#[test]
fn test_eviction_write_failure() {
    let mut tree = memory_tree(2, 2);
    tree.storage_mut().set_fault_config(write_faults());

    // Growing past two nodes forces an eviction, which must write
    let mut result = Ok(());
    for k in 0..20 {
        result = tree.insert(k);
        if result.is_err() {
            break;
        }
    }
    assert!(is_injected(&result));
}

#[test]
fn test_search_read_failure() {
    let mut tree = memory_tree(2, 0);
    insert_kmers(&mut tree, &["AAAA", "CCCC", "GGGG", "TTTT", "ACGT"]);
    tree.storage_mut().set_fault_config(FaultConfig {
        read_error_rate: 1.0,
        ..FaultConfig::default()
    });

    assert!(is_injected(&tree.search(key("GGGG"))));
    assert!(is_injected(&tree.entries()));
}

#[test]
fn test_load_read_failure() {
    let mut tree = memory_tree(3, 4);
    insert_kmers(&mut tree, &["AAAA", "CCCC"]);
    let mut storage = tree.save_metadata().expect("save");
    storage.set_fault_config(FaultConfig {
        read_error_rate: 1.0,
        ..FaultConfig::default()
    });

    assert!(is_injected(&BTree::load_metadata(storage, 0)));
}

#[test]
fn test_sync_failure_at_save() {
    let mut tree = memory_tree(2, 0);
    insert_kmers(&mut tree, &["AAAA"]);
    tree.storage_mut().set_fault_config(FaultConfig {
        sync_error_rate: 1.0,
        ..FaultConfig::default()
    });

    assert!(is_injected(&tree.save_metadata()));
}

#[test]
fn test_corrupted_read_is_detected_or_harmless() {
    let mut tree = memory_tree(2, 0);
    insert_kmers(&mut tree, &["AAAA", "CCCC", "GGGG", "TTTT"]);
    tree.storage_mut().set_fault_config(FaultConfig {
        corruption_rate: 1.0,
        ..FaultConfig::default()
    });

    // A flipped bit either fails validation or yields a well-formed node;
    // neither may panic.
    for _ in 0..50 {
        let _ = tree.root();
    }
    assert!(tree.storage_mut().stats().corrupted_reads >= 50);
}

#[test]
fn test_random_faults_fail_stop() {
    let mut stopped = 0;
    for seed in 100..120 {
        let config = SimulatorConfig::new(seed)
            .with_cache_capacity(3)
            .with_fault_config(FaultConfig::high_faults());
        let result = Simulator::new(config).run(1_000);

        assert!(result.invariant_violations.is_empty(), "seed {seed}");
        if let Some(error) = result.error {
            assert!(error.contains("injected fault"), "seed {seed}: {error}");
            stopped += 1;
        }
    }
    assert!(stopped > 0, "no run hit a fault");
}

//! Exclusive claim of stack names across concurrent builds

use clustermaker::error::StackError;
use clustermaker::identity::{IdentityAllocator, StackKind, StateLayout};
use std::sync::Barrier;
use std::thread;
use tempfile::TempDir;

#[test]
fn test_concurrent_claims_have_one_winner() {
    let temp = TempDir::new().unwrap();
    let allocator = IdentityAllocator::new(StateLayout::new(temp.path()));
    let contenders = 8;
    let barrier = Barrier::new(contenders);

    let results: Vec<Result<_, StackError>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..contenders)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    allocator.allocate(StackKind::Cluster, "alice", "dev01")
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, StackError::DuplicateStack { .. })));

    let stored = allocator
        .lookup(StackKind::Cluster, "alice", "dev01")
        .unwrap();
    assert_eq!(&stored.serial, &winners[0].serial);
}

#[test]
fn test_release_then_reclaim_mints_new_serial() {
    let temp = TempDir::new().unwrap();
    let allocator = IdentityAllocator::new(StateLayout::new(temp.path()));

    let first = allocator.allocate(StackKind::Jumphost, "bob", "jh").unwrap();
    allocator.release(&first).unwrap();
    assert!(!allocator.is_claimed(StackKind::Jumphost, "bob-jh"));

    thread::sleep(std::time::Duration::from_millis(2));
    let second = allocator.allocate(StackKind::Jumphost, "bob", "jh").unwrap();
    assert_ne!(first.serial, second.serial);
    assert_eq!(second.serial.stack_name(), "bob-jh");
}

#[test]
fn test_list_reports_claims_per_kind() {
    let temp = TempDir::new().unwrap();
    let allocator = IdentityAllocator::new(StateLayout::new(temp.path()));

    allocator.allocate(StackKind::Cluster, "alice", "dev01").unwrap();
    allocator.allocate(StackKind::Cluster, "alice", "dev02").unwrap();
    allocator.allocate(StackKind::Jumphost, "bob", "jh").unwrap();

    let clusters: Vec<String> = allocator
        .list(StackKind::Cluster)
        .unwrap()
        .into_iter()
        .map(|identity| identity.stack_name)
        .collect();
    assert_eq!(clusters, vec!["alice-dev01", "alice-dev02"]);
    assert_eq!(allocator.list(StackKind::Jumphost).unwrap().len(), 1);
}

#[test]
fn test_invalid_owner_is_rejected_before_claiming() {
    let temp = TempDir::new().unwrap();
    let allocator = IdentityAllocator::new(StateLayout::new(temp.path()));

    let err = allocator
        .allocate(StackKind::Cluster, "alice smith", "dev01")
        .unwrap_err();
    assert!(matches!(err, StackError::Validation(_)));
    assert!(allocator.list(StackKind::Cluster).unwrap().is_empty());
}

//! End-to-end scenarios over the in-memory cloud and a recording engine

use crate::integration::test_utils::{
    cloud, cluster_input, elapsing_window, files_under, interrupted_window, workflow,
    RecordingEngine,
};
use clustermaker::compose::{compose, FragmentId, PackageRoot};
use clustermaker::error::StackError;
use clustermaker::identity::{IdentityAllocator, StackKind, StateLayout};
use clustermaker::validate::validate;
use tempfile::TempDir;

#[test]
fn test_default_cluster_document_uses_shared_ebs() {
    let temp = TempDir::new().unwrap();
    let cloud = cloud();
    let allocator = IdentityAllocator::new(StateLayout::new(temp.path()));
    let identity = allocator.allocate(StackKind::Cluster, "alice", "dev01").unwrap();

    let params = validate(&cluster_input(), &cloud).unwrap();
    let document = compose(&identity, &params).unwrap();

    assert!(document.contains(FragmentId::EbsPerformance));
    assert!(document.contains(FragmentId::PackageRoot(PackageRoot::Ebs)));
    assert!(document.contains(FragmentId::QueueSpotPricing));
    assert!(document.contains(FragmentId::SgeParallelEnv));
    assert!(!document.contains(FragmentId::Efs));
    assert!(!document.contains(FragmentId::Fsx));
    assert!(!document.contains(FragmentId::ExternalNfs));
    assert_eq!(document.get("pkg_dir"), Some("{{ ebs_shared_dir }}/pkg"));
    assert_eq!(document.get("cluster_owner"), Some("alice"));
    assert_eq!(
        document.get("cluster_serial_number"),
        Some(identity.serial.as_str())
    );
}

#[test]
fn test_lustre_takes_the_package_root() {
    let temp = TempDir::new().unwrap();
    let cloud = cloud();
    let allocator = IdentityAllocator::new(StateLayout::new(temp.path()));
    let identity = allocator.allocate(StackKind::Cluster, "alice", "dev01").unwrap();

    let mut input = cluster_input();
    input.enable_efs = true;
    input.enable_fsx = true;
    input.fsx_size = 7200;
    let document = compose(&identity, &validate(&input, &cloud).unwrap()).unwrap();

    let ids = document.fragment_ids();
    let efs = ids.iter().position(|id| *id == FragmentId::Efs).unwrap();
    let fsx = ids.iter().position(|id| *id == FragmentId::Fsx).unwrap();
    assert!(efs < fsx);
    assert_eq!(ids.last(), Some(&FragmentId::PackageRoot(PackageRoot::Fsx)));
    assert_eq!(document.get("fsx_size"), Some("7200"));
}

#[test]
fn test_cancelled_default_build_leaves_no_trace() {
    let temp = TempDir::new().unwrap();
    let cloud = cloud();
    let engine = RecordingEngine::default();
    let flow = workflow(temp.path(), &cloud, &engine, interrupted_window());

    let err = flow
        .build_cluster("alice", "dev01", &cluster_input(), "clustermaker cluster build")
        .unwrap_err();

    assert!(matches!(err, StackError::Cancelled { .. }));
    assert_eq!(cloud.resource_count(), 0);
    assert!(files_under(temp.path()).is_empty());
    assert!(engine.calls().is_empty());
}

#[test]
fn test_bad_lustre_size_touches_nothing() {
    let temp = TempDir::new().unwrap();
    let cloud = cloud();
    let engine = RecordingEngine::default();
    let flow = workflow(temp.path(), &cloud, &engine, elapsing_window());

    let mut input = cluster_input();
    input.enable_fsx = true;
    input.fsx_size = 3700;
    let err = flow.build_cluster("alice", "dev01", &input, "").unwrap_err();

    match err {
        StackError::Validation(errors) => {
            assert!(errors.iter().any(|e| e.field() == Some("fsx_size")));
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
    assert_eq!(cloud.create_calls(), 0);
    assert!(files_under(temp.path()).is_empty());
    assert!(engine.calls().is_empty());
}

#[test]
fn test_second_build_of_same_name_is_refused() {
    let temp = TempDir::new().unwrap();
    let cloud = cloud();
    let engine = RecordingEngine::default();
    let flow = workflow(temp.path(), &cloud, &engine, elapsing_window());

    let first = flow
        .build_cluster("alice", "dev01", &cluster_input(), "")
        .unwrap();
    let creates = cloud.create_calls();

    let err = flow
        .build_cluster("alice", "dev01", &cluster_input(), "")
        .unwrap_err();
    match err {
        StackError::DuplicateStack { stack, remediation, .. } => {
            assert_eq!(stack, "alice-dev01");
            assert!(remediation.contains("destroy"));
        }
        other => panic!("expected duplicate stack, got {other:?}"),
    }
    assert_eq!(cloud.create_calls(), creates);
    assert_eq!(engine.calls().len(), 1);

    let still = flow
        .allocator()
        .lookup(StackKind::Cluster, "alice", "dev01")
        .unwrap();
    assert_eq!(still.serial, first.identity.serial);
}

#[test]
fn test_build_then_destroy_returns_to_empty() {
    let temp = TempDir::new().unwrap();
    let cloud = cloud();
    let engine = RecordingEngine::default();
    let flow = workflow(temp.path(), &cloud, &engine, elapsing_window());

    flow.build_cluster("alice", "dev01", &cluster_input(), "clustermaker cluster build -N dev01")
        .unwrap();
    assert!(!files_under(temp.path()).is_empty());

    flow.destroy_cluster("alice", "dev01", "us-east-1", Default::default())
        .unwrap();
    assert_eq!(cloud.resource_count(), 0);
    assert!(files_under(temp.path()).is_empty());

    // The name is free again
    flow.build_cluster("alice", "dev01", &cluster_input(), "").unwrap();
}

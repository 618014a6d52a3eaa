//! Rollback of partially built stacks

use crate::integration::test_utils::{
    cloud, cluster_input, elapsing_window, files_under, interrupted_window, workflow,
    RecordingEngine,
};
use clustermaker::error::{ProviderError, StackError};
use clustermaker::identity::{IdentityAllocator, StackKind, StateLayout};
use clustermaker::naming::{resource_name, ManagedResource, ResourceSlot};
use clustermaker::provision::{cluster_plan, Provisioner};
use clustermaker::validate::validate;
use clustermaker::window;
use tempfile::TempDir;

#[test]
fn test_rollback_unwinds_everything_created() {
    let temp = TempDir::new().unwrap();
    let cloud = cloud();
    let allocator = IdentityAllocator::new(StateLayout::new(temp.path()));
    let identity = allocator.allocate(StackKind::Cluster, "alice", "dev01").unwrap();
    let params = validate(&cluster_input(), &cloud).unwrap();

    let mut provisioner = Provisioner::new(&cloud);
    provisioner
        .apply(&identity.serial, &cluster_plan(&identity.serial, &params))
        .unwrap();
    assert_eq!(provisioner.created().len(), 4);

    let record = allocator.record_path(&identity);
    let report = window::rollback(&[record.clone()], provisioner.into_undo(), &cloud);

    assert!(report.is_clean());
    assert_eq!(report.removed.len(), 5);
    assert_eq!(cloud.resource_count(), 0);
    assert!(!record.exists());
}

#[test]
fn test_cancelled_build_frees_the_name() {
    let temp = TempDir::new().unwrap();
    let cloud = cloud();
    let engine = RecordingEngine::default();

    let cancelled = workflow(temp.path(), &cloud, &engine, interrupted_window());
    let err = cancelled
        .build_cluster("alice", "dev01", &cluster_input(), "")
        .unwrap_err();
    let StackError::Cancelled { removed, failures } = err else {
        panic!("expected cancellation");
    };
    assert_eq!(removed, 6);
    assert!(failures.is_empty());
    assert!(files_under(temp.path()).is_empty());

    let flow = workflow(temp.path(), &cloud, &engine, elapsing_window());
    let report = flow
        .build_cluster("alice", "dev01", &cluster_input(), "")
        .unwrap();
    assert_eq!(report.created.len(), 4);
    assert!(report.found.is_empty());
}

#[test]
fn test_failed_delete_during_provisioning_rollback_is_reported() {
    let temp = TempDir::new().unwrap();
    let cloud = cloud();
    let allocator = IdentityAllocator::new(StateLayout::new(temp.path()));
    let identity = allocator.allocate(StackKind::Cluster, "alice", "dev01").unwrap();
    let params = validate(&cluster_input(), &cloud).unwrap();

    // Pre-existing resources are never removed by a rollback
    let existing = ManagedResource::new(ResourceSlot::ClusterInstanceRole, &identity.serial, None);
    cloud.insert_existing(&existing);

    let mut provisioner = Provisioner::new(&cloud);
    let policy = resource_name(ResourceSlot::TeardownPolicy, &identity.serial);
    let role = resource_name(ResourceSlot::TeardownRole, &identity.serial);
    cloud.fail_create_of(&policy, ProviderError::AccessDenied("iam:PutRolePolicy".to_string()));
    cloud.fail_delete_of(&role, ProviderError::Throttled("DeleteRole".to_string()));

    let err = provisioner
        .apply(&identity.serial, &cluster_plan(&identity.serial, &params))
        .unwrap_err();
    assert!(matches!(err, StackError::Provision { .. }));
    assert_eq!(provisioner.found(), &[existing.clone()]);

    let report = window::rollback(&[], provisioner.into_undo(), &cloud);
    assert!(!report.is_clean());
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].contains(&role));
    assert!(cloud.contains(&existing));
}

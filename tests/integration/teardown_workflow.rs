//! Teardown workflow integration tests

use crate::integration::test_utils::{
    cloud, cluster_input, elapsing_window, interrupted_window, jumphost_input, workflow,
    RecordingEngine,
};
use clustermaker::error::{ProviderError, StackError};
use clustermaker::identity::StackKind;
use clustermaker::invoke::TeardownOptions;
use clustermaker::naming::{resource_name, ResourceSlot};
use tempfile::TempDir;

#[test]
fn test_destroy_passes_retention_flags_to_engine() {
    let temp = TempDir::new().unwrap();
    let cloud = cloud();
    let engine = RecordingEngine::default();
    let flow = workflow(temp.path(), &cloud, &engine, elapsing_window());
    flow.build_cluster("alice", "dev01", &cluster_input(), "")
        .unwrap();

    let options = TeardownOptions {
        delete_bucket: false,
        delete_efs: false,
        delete_fsx: true,
    };
    flow.destroy_cluster("alice", "dev01", "us-east-1", options)
        .unwrap();

    let calls = engine.calls();
    let teardown = calls.last().unwrap();
    assert!(teardown.contains("delete_s3_bucketname=false"));
    assert!(teardown.contains("delete_efs=false"));
    assert!(teardown.contains("delete_fsx=true"));
    assert!(teardown.ends_with("delete_pcluster.yml"));
}

#[test]
fn test_destroy_reports_removed_resources_and_files() {
    let temp = TempDir::new().unwrap();
    let cloud = cloud();
    let engine = RecordingEngine::default();
    let flow = workflow(temp.path(), &cloud, &engine, elapsing_window());
    let built = flow
        .build_cluster("alice", "dev01", &cluster_input(), "")
        .unwrap();

    let report = flow
        .destroy_cluster("alice", "dev01", "us-east-1", TeardownOptions::default())
        .unwrap();

    let teardown_role = resource_name(ResourceSlot::TeardownRole, &built.identity.serial);
    assert!(report.removed.iter().any(|line| line.contains(&teardown_role)));
    assert!(report
        .removed
        .iter()
        .any(|line| line.starts_with("file ") && line.ends_with(".yml")));
}

#[test]
fn test_destroy_tolerates_already_deleted_resources() {
    let temp = TempDir::new().unwrap();
    let cloud = cloud();
    let engine = RecordingEngine::default();
    let flow = workflow(temp.path(), &cloud, &engine, elapsing_window());
    let built = flow
        .build_cluster("alice", "dev01", &cluster_input(), "")
        .unwrap();

    let gone = resource_name(ResourceSlot::ClusterInstancePolicy, &built.identity.serial);
    cloud.fail_delete_of(&gone, ProviderError::NotFound(gone.clone()));

    flow.destroy_cluster("alice", "dev01", "us-east-1", TeardownOptions::default())
        .unwrap();
    assert!(!flow.allocator().is_claimed(StackKind::Cluster, "alice-dev01"));
    let serial = built.identity.serial.to_string();
    assert!(cloud
        .resource_names()
        .iter()
        .all(|name| !name.ends_with(&serial)));
}

#[test]
fn test_partial_failure_can_be_retried() {
    let temp = TempDir::new().unwrap();
    let cloud = cloud();
    let engine = RecordingEngine::default();
    let flow = workflow(temp.path(), &cloud, &engine, elapsing_window());
    let built = flow
        .build_cluster("alice", "dev01", &cluster_input(), "")
        .unwrap();

    let stuck = resource_name(ResourceSlot::ClusterInstanceRole, &built.identity.serial);
    cloud.fail_delete_of(
        &stuck,
        ProviderError::Other(format!("{stuck} still has attached instance profiles")),
    );
    let err = flow
        .destroy_cluster("alice", "dev01", "us-east-1", TeardownOptions::default())
        .unwrap_err();
    assert!(matches!(err, StackError::TeardownPartialFailure { .. }));
    assert!(built.vars_file.exists());

    let retry = workflow(temp.path(), &cloud, &engine, elapsing_window());
    let identity = retry
        .allocator()
        .lookup(StackKind::Cluster, "alice", "dev01")
        .unwrap();
    assert_eq!(identity.serial, built.identity.serial);
}

#[test]
fn test_engine_teardown_failure_keeps_record() {
    let temp = TempDir::new().unwrap();
    let cloud = cloud();
    let builder_engine = RecordingEngine::default();
    let builder = workflow(temp.path(), &cloud, &builder_engine, elapsing_window());
    builder
        .build_cluster("alice", "dev01", &cluster_input(), "")
        .unwrap();

    let engine = RecordingEngine::failing_on("delete_pcluster.yml");
    let flow = workflow(temp.path(), &cloud, &engine, elapsing_window());
    let err = flow
        .destroy_cluster("alice", "dev01", "us-east-1", TeardownOptions::default())
        .unwrap_err();

    assert!(matches!(err, StackError::Invoke { .. }));
    assert!(flow.allocator().is_claimed(StackKind::Cluster, "alice-dev01"));
}

#[test]
fn test_window_disabled_for_teardown() {
    let temp = TempDir::new().unwrap();
    let cloud = cloud();
    let engine = RecordingEngine::default();
    let builder = workflow(temp.path(), &cloud, &engine, elapsing_window());
    builder
        .build_cluster("alice", "dev01", &cluster_input(), "")
        .unwrap();

    // An interrupting window is never consulted when confirmation is off
    let flow = workflow(temp.path(), &cloud, &engine, interrupted_window()).confirm_teardown(false);
    flow.destroy_cluster("alice", "dev01", "us-east-1", TeardownOptions::default())
        .unwrap();
    assert_eq!(cloud.resource_count(), 0);
}

#[test]
fn test_destroy_jumphost_missing_is_not_found() {
    let temp = TempDir::new().unwrap();
    let cloud = cloud();
    let engine = RecordingEngine::default();
    let flow = workflow(temp.path(), &cloud, &engine, elapsing_window());

    let err = flow.destroy_jumphost("bob", "jh").unwrap_err();
    assert!(matches!(err, StackError::NotFound { .. }));
    assert!(engine.calls().is_empty());
}

#[test]
fn test_destroy_jumphost_without_data_dir_skips_terraform() {
    let temp = TempDir::new().unwrap();
    let cloud = cloud();
    let engine = RecordingEngine::default();
    let flow = workflow(temp.path(), &cloud, &engine, elapsing_window());
    let built = flow
        .build_jumphost("bob", "jh", &jumphost_input(), "")
        .unwrap();

    let data_dir = flow
        .allocator()
        .layout()
        .data_dir(StackKind::Jumphost, &built.identity.stack_name);
    std::fs::remove_dir_all(&data_dir).unwrap();
    let before = engine.calls().len();

    let report = flow.destroy_jumphost("bob", "jh").unwrap();
    assert!(!report.deployed);
    assert_eq!(engine.calls().len(), before);
    assert_eq!(cloud.resource_count(), 0);
}

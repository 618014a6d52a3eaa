//! Build workflow integration tests

use crate::integration::test_utils::{
    cloud, cluster_input, elapsing_window, jumphost_input, workflow, RecordingEngine,
};
use clustermaker::error::StackError;
use clustermaker::identity::StackKind;
use clustermaker::naming::{bucket_name, resource_name, ResourceSlot};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_serial_record_holds_serial_then_commands() {
    let temp = TempDir::new().unwrap();
    let cloud = cloud();
    let engine = RecordingEngine::default();
    let flow = workflow(temp.path(), &cloud, &engine, elapsing_window());

    let report = flow
        .build_cluster(
            "alice",
            "dev01",
            &cluster_input(),
            "clustermaker cluster build -N dev01 -O alice -E alice@example.com -A us-east-1a",
        )
        .unwrap();

    let record = fs::read_to_string(flow.allocator().record_path(&report.identity)).unwrap();
    let lines: Vec<&str> = record.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], report.identity.serial.as_str());
    assert!(lines[1].contains("cluster_serial_number="));
    assert!(lines[1].ends_with("create_pcluster.yml"));
    assert!(lines[2].starts_with("clustermaker cluster build -N dev01"));
    assert_eq!(report.commands, vec![lines[1].to_string()]);

    let bucket = bucket_name(&report.identity);
    assert_eq!(
        cloud.object(&bucket, "cluster_serial_number/alice-dev01.serial"),
        Some(record.clone())
    );
}

#[test]
fn test_vars_file_is_the_composed_document() {
    let temp = TempDir::new().unwrap();
    let cloud = cloud();
    let engine = RecordingEngine::default();
    let flow = workflow(temp.path(), &cloud, &engine, elapsing_window());

    let report = flow
        .build_cluster("alice", "dev01", &cluster_input(), "")
        .unwrap();
    let text = fs::read_to_string(&report.vars_file).unwrap();

    assert!(text.starts_with("####"));
    assert!(text.contains("cluster_owner: alice\n"));
    assert!(text.contains(&format!(
        "cluster_serial_number: {}\n",
        report.identity.serial
    )));
    assert!(!text.contains("${"));
    assert!(!text.contains("fsx_root"));
}

#[test]
fn test_build_creates_named_identity_resources() {
    let temp = TempDir::new().unwrap();
    let cloud = cloud();
    let engine = RecordingEngine::default();
    let flow = workflow(temp.path(), &cloud, &engine, elapsing_window());

    let report = flow
        .build_cluster("alice", "dev01", &cluster_input(), "")
        .unwrap();
    let names = cloud.resource_names();
    for slot in [
        ResourceSlot::ClusterInstanceRole,
        ResourceSlot::ClusterInstancePolicy,
        ResourceSlot::TeardownRole,
        ResourceSlot::TeardownPolicy,
    ] {
        let name = resource_name(slot, &report.identity.serial);
        assert!(names.contains(&name), "missing {name}");
    }
    assert!(report.found.is_empty());
}

#[test]
fn test_data_staging_adds_bucket_policy() {
    let temp = TempDir::new().unwrap();
    let cloud = cloud();
    let engine = RecordingEngine::default();
    let flow = workflow(temp.path(), &cloud, &engine, elapsing_window());

    let mut input = cluster_input();
    input.enable_fsx = true;
    input.enable_data_staging = true;
    input.staging_bucket = Some("alice-staging".to_string());
    let report = flow.build_cluster("alice", "dev01", &input, "").unwrap();

    let staging = resource_name(ResourceSlot::DataStagingPolicy, &report.identity.serial);
    assert!(report.created.iter().any(|name| name.contains(&staging)));
    assert!(report.created.len() > 4);
    assert!(engine.calls()[0].contains("enable_fsx=true"));
}

#[test]
fn test_unknown_staging_bucket_is_unresolved() {
    let temp = TempDir::new().unwrap();
    let cloud = cloud();
    let engine = RecordingEngine::default();
    let flow = workflow(temp.path(), &cloud, &engine, elapsing_window());

    let mut input = cluster_input();
    input.enable_fsx = true;
    input.enable_data_staging = true;
    input.staging_bucket = Some("nobody-owns-this".to_string());
    let err = flow.build_cluster("alice", "dev01", &input, "").unwrap_err();

    assert!(matches!(err, StackError::UnresolvedReference { .. }));
    assert_eq!(cloud.create_calls(), 0);
    assert!(!flow.allocator().is_claimed(StackKind::Cluster, "alice-dev01"));
}

#[test]
fn test_jumphost_build_runs_templates_then_terraform() {
    let temp = TempDir::new().unwrap();
    let cloud = cloud();
    let engine = RecordingEngine::default();
    let flow = workflow(temp.path(), &cloud, &engine, elapsing_window());

    let report = flow
        .build_jumphost("bob", "jh", &jumphost_input(), "clustermaker jumphost build -N jh -O bob")
        .unwrap();
    assert_eq!(report.identity.kind, StackKind::Jumphost);
    assert_eq!(report.identity.stack_name, "bob-jh");

    let calls = engine.calls();
    assert_eq!(calls.len(), 4);
    assert!(calls[0].starts_with("ansible-playbook"));
    assert!(calls[1].starts_with("terraform init"));
    assert!(calls[2].starts_with("terraform plan"));
    assert!(calls[3].starts_with("terraform apply"));

    let commands = flow.allocator().commands(&report.identity).unwrap();
    assert_eq!(commands.len(), 5);
    assert_eq!(commands[4], "clustermaker jumphost build -N jh -O bob");

    let text = fs::read_to_string(&report.vars_file).unwrap();
    assert!(text.contains("terraform_version: 0.12.24\n"));
    assert!(text.contains("ansible_version: 2.9.6\n"));
}

#[test]
fn test_cluster_and_jumphost_names_do_not_collide() {
    let temp = TempDir::new().unwrap();
    let cloud = cloud();
    let engine = RecordingEngine::default();
    let flow = workflow(temp.path(), &cloud, &engine, elapsing_window());

    let mut jumphost = jumphost_input();
    jumphost.owner_email = "alice@example.com".to_string();
    flow.build_cluster("alice", "dev01", &cluster_input(), "")
        .unwrap();
    flow.build_jumphost("alice", "dev01", &jumphost, "").unwrap();

    assert!(flow.allocator().is_claimed(StackKind::Cluster, "alice-dev01"));
    assert!(flow.allocator().is_claimed(StackKind::Jumphost, "alice-dev01"));
}

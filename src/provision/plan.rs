//! Creation plans and teardown order for each stack kind.

use super::policies::{
    cluster_instance_policy, data_staging_policy, jumphost_instance_policy, teardown_policy,
    trust_policy, CLUSTER_TRUSTED_SERVICES, JUMPHOST_TRUSTED_SERVICES, TEARDOWN_TRUSTED_SERVICES,
};
use crate::identity::{Serial, StackKind};
use crate::naming::{resource_name, ManagedResource, ResourceSlot};
use crate::params::{ValidatedJumphost, ValidatedParams};
use crate::provider::ResourceSpec;
use std::path::PathBuf;

/// One provisioning step
#[derive(Debug, Clone, PartialEq)]
pub enum PlanStep {
    Ensure {
        slot: ResourceSlot,
        spec: ResourceSpec,
    },
    /// Extra inline policy on a role created earlier in the plan
    Augment {
        role_slot: ResourceSlot,
        slot: ResourceSlot,
        document: serde_json::Value,
    },
}

/// Cluster resources in creation order.
pub fn cluster_plan(serial: &Serial, params: &ValidatedParams) -> Vec<PlanStep> {
    let region = params.zone.region.as_str();
    let account = params.network.account_id.as_str();
    let instance_role = resource_name(ResourceSlot::ClusterInstanceRole, serial);
    let teardown_role = resource_name(ResourceSlot::TeardownRole, serial);

    let mut steps = vec![
        PlanStep::Ensure {
            slot: ResourceSlot::ClusterInstanceRole,
            spec: ResourceSpec::Role {
                trust_policy: trust_policy(CLUSTER_TRUSTED_SERVICES),
                description: "ParallelClusterMaker cluster instance role".to_string(),
            },
        },
        PlanStep::Ensure {
            slot: ResourceSlot::ClusterInstancePolicy,
            spec: ResourceSpec::InlinePolicy {
                role: instance_role,
                document: cluster_instance_policy(region, account),
            },
        },
        PlanStep::Ensure {
            slot: ResourceSlot::TeardownRole,
            spec: ResourceSpec::Role {
                trust_policy: trust_policy(TEARDOWN_TRUSTED_SERVICES),
                description: "ParallelClusterMaker scheduled teardown role".to_string(),
            },
        },
        PlanStep::Ensure {
            slot: ResourceSlot::TeardownPolicy,
            spec: ResourceSpec::InlinePolicy {
                role: teardown_role,
                document: teardown_policy(region, account),
            },
        },
    ];

    if let Some(bucket) = &params.staging_bucket {
        for role_slot in [ResourceSlot::ClusterInstanceRole, ResourceSlot::TeardownRole] {
            steps.push(PlanStep::Augment {
                role_slot,
                slot: ResourceSlot::DataStagingPolicy,
                document: data_staging_policy(bucket),
            });
        }
    }
    steps
}

/// Jump host resources in creation order. The key pair secret lands in
/// `secret_file`.
pub fn jumphost_plan(
    serial: &Serial,
    params: &ValidatedJumphost,
    secret_file: PathBuf,
) -> Vec<PlanStep> {
    let role = resource_name(ResourceSlot::JumphostRole, serial);
    vec![
        PlanStep::Ensure {
            slot: ResourceSlot::JumphostTopic,
            spec: ResourceSpec::Topic {
                subscriber: params.owner_email.clone(),
            },
        },
        PlanStep::Ensure {
            slot: ResourceSlot::JumphostKeyPair,
            spec: ResourceSpec::KeyPair { secret_file },
        },
        PlanStep::Ensure {
            slot: ResourceSlot::JumphostRole,
            spec: ResourceSpec::Role {
                trust_policy: trust_policy(JUMPHOST_TRUSTED_SERVICES),
                description: "ParallelClusterMaker EC2 instance role".to_string(),
            },
        },
        PlanStep::Ensure {
            slot: ResourceSlot::JumphostPolicy,
            spec: ResourceSpec::InlinePolicy {
                role: role.clone(),
                document: jumphost_instance_policy(),
            },
        },
        PlanStep::Ensure {
            slot: ResourceSlot::JumphostProfile,
            spec: ResourceSpec::InstanceProfile { role },
        },
    ]
}

/// Every resource a stack of `kind` may own, in deletion order.
///
/// Names are reconstructed from the serial, so teardown works without any
/// record of what the build actually created.
pub fn teardown_targets(kind: StackKind, serial: &Serial) -> Vec<ManagedResource> {
    let attached = |slot, role_slot| {
        ManagedResource::new(slot, serial, Some(resource_name(role_slot, serial)))
    };
    let bare = |slot| ManagedResource::new(slot, serial, None);
    match kind {
        StackKind::Cluster => vec![
            attached(ResourceSlot::DataStagingPolicy, ResourceSlot::TeardownRole),
            attached(ResourceSlot::DataStagingPolicy, ResourceSlot::ClusterInstanceRole),
            attached(ResourceSlot::TeardownPolicy, ResourceSlot::TeardownRole),
            bare(ResourceSlot::TeardownRole),
            attached(ResourceSlot::ClusterInstancePolicy, ResourceSlot::ClusterInstanceRole),
            bare(ResourceSlot::ClusterInstanceRole),
        ],
        StackKind::Jumphost => vec![
            attached(ResourceSlot::JumphostProfile, ResourceSlot::JumphostRole),
            attached(ResourceSlot::JumphostPolicy, ResourceSlot::JumphostRole),
            bare(ResourceSlot::JumphostRole),
            bare(ResourceSlot::JumphostKeyPair),
            bare(ResourceSlot::JumphostTopic),
        ],
    }
}

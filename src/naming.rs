//! Managed resource model and naming convention.
//!
//! Every identity/permission resource name is `<prefix><serial>`. The prefix
//! table is prefix-free (no prefix is a prefix of another), so a name parses
//! back into exactly one `(slot, serial)` pair. Rollback and teardown rely on
//! this: they reconstruct names rather than looking them up.

use crate::identity::{Serial, StackIdentity, StackKind, DATESTAMP_LEN};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provider-side resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Role,
    Policy,
    InstanceProfile,
    KeyPair,
    Topic,
}

impl ResourceKind {
    /// Longest name the cloud accepts for this kind
    pub fn max_name_len(&self) -> usize {
        match self {
            ResourceKind::Role => 64,
            ResourceKind::Policy | ResourceKind::InstanceProfile => 128,
            ResourceKind::KeyPair => 255,
            ResourceKind::Topic => 256,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Role => "role",
            ResourceKind::Policy => "policy",
            ResourceKind::InstanceProfile => "instance_profile",
            ResourceKind::KeyPair => "key_pair",
            ResourceKind::Topic => "topic",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named position in a stack's resource set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceSlot {
    ClusterInstanceRole,
    ClusterInstancePolicy,
    TeardownRole,
    TeardownPolicy,
    DataStagingPolicy,
    JumphostRole,
    JumphostPolicy,
    JumphostProfile,
    JumphostKeyPair,
    JumphostTopic,
}

impl ResourceSlot {
    pub const ALL: [ResourceSlot; 10] = [
        ResourceSlot::ClusterInstanceRole,
        ResourceSlot::ClusterInstancePolicy,
        ResourceSlot::TeardownRole,
        ResourceSlot::TeardownPolicy,
        ResourceSlot::DataStagingPolicy,
        ResourceSlot::JumphostRole,
        ResourceSlot::JumphostPolicy,
        ResourceSlot::JumphostProfile,
        ResourceSlot::JumphostKeyPair,
        ResourceSlot::JumphostTopic,
    ];

    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSlot::ClusterInstanceRole
            | ResourceSlot::TeardownRole
            | ResourceSlot::JumphostRole => ResourceKind::Role,
            ResourceSlot::ClusterInstancePolicy
            | ResourceSlot::TeardownPolicy
            | ResourceSlot::DataStagingPolicy
            | ResourceSlot::JumphostPolicy => ResourceKind::Policy,
            ResourceSlot::JumphostProfile => ResourceKind::InstanceProfile,
            ResourceSlot::JumphostKeyPair => ResourceKind::KeyPair,
            ResourceSlot::JumphostTopic => ResourceKind::Topic,
        }
    }

    /// Stack kind that owns resources in this slot
    pub fn stack_kind(&self) -> StackKind {
        match self {
            ResourceSlot::ClusterInstanceRole
            | ResourceSlot::ClusterInstancePolicy
            | ResourceSlot::TeardownRole
            | ResourceSlot::TeardownPolicy
            | ResourceSlot::DataStagingPolicy => StackKind::Cluster,
            _ => StackKind::Jumphost,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            ResourceSlot::ClusterInstanceRole => "pclustermaker-role-",
            ResourceSlot::ClusterInstancePolicy => "pclustermaker-policy-",
            ResourceSlot::TeardownRole => "kill-pclustermaker-role-",
            ResourceSlot::TeardownPolicy => "kill-pclustermaker-policy-",
            ResourceSlot::DataStagingPolicy => "pclustermaker-fsx-s3-policy-",
            ResourceSlot::JumphostRole => "parallelclustermaker-role-",
            ResourceSlot::JumphostPolicy => "parallelclustermaker-policy-",
            ResourceSlot::JumphostProfile => "parallelclustermaker-profile-",
            ResourceSlot::JumphostKeyPair => "pcluster-jumphost-keypair-",
            ResourceSlot::JumphostTopic => "ParallelClusterMaker_Jumphost_SNS_Alerts_",
        }
    }
}

/// Length of `resource_name(slot, serial)` for any serial of `stack_name`.
pub fn resource_name_len(slot: ResourceSlot, stack_name: &str) -> usize {
    slot.prefix().len() + stack_name.len() + 1 + DATESTAMP_LEN
}

/// Deterministic name of the resource in `slot` for `serial`.
pub fn resource_name(slot: ResourceSlot, serial: &Serial) -> String {
    format!("{}{}", slot.prefix(), serial)
}

/// Recover `(slot, serial)` from a resource name.
pub fn parse_resource_name(name: &str) -> Option<(ResourceSlot, Serial)> {
    ResourceSlot::ALL.iter().find_map(|slot| {
        let rest = name.strip_prefix(slot.prefix())?;
        Serial::parse(rest).map(|serial| (*slot, serial))
    })
}

/// Bucket that carries a cluster's scripts and serial record
pub fn bucket_name(identity: &StackIdentity) -> String {
    format!(
        "parallelclustermaker-{}-{}",
        identity.stack_name,
        identity.serial.datestamp()
    )
}

/// A resource created (or found) on behalf of a stack
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManagedResource {
    pub kind: ResourceKind,
    pub slot: ResourceSlot,
    pub name: String,
    pub owning_serial: Serial,
    /// Role the resource is attached to (inline policies, instance profiles)
    pub parent: Option<String>,
}

impl ManagedResource {
    pub fn new(slot: ResourceSlot, serial: &Serial, parent: Option<String>) -> Self {
        Self {
            kind: slot.kind(),
            slot,
            name: resource_name(slot, serial),
            owning_serial: serial.clone(),
            parent,
        }
    }
}

impl fmt::Display for ManagedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parent {
            Some(parent) => write!(f, "{} {} (on {})", self.kind, self.name, parent),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

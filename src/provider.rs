//! Cloud provider seams.
//!
//! `CloudProvider` covers the identity/permission resources the engine
//! creates and deletes. `ReferenceResolver` covers the read-only probes the
//! validator runs against resources the operator names. Both report
//! "does not exist" as `ProviderError::NotFound`.

use crate::error::ProviderError;
use crate::naming::{ManagedResource, ResourceKind};
use crate::params::{NetworkContext, Zone};
use std::path::{Path, PathBuf};

pub mod aws_cli;
pub mod memory;

pub use aws_cli::AwsCli;
pub use memory::InMemoryCloud;

/// What to create for a resource
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceSpec {
    Role {
        trust_policy: serde_json::Value,
        description: String,
    },
    /// Inline policy attached to `role`
    InlinePolicy {
        role: String,
        document: serde_json::Value,
    },
    /// Instance profile wrapping `role`
    InstanceProfile { role: String },
    /// Key pair whose secret material is written to `secret_file`
    KeyPair { secret_file: PathBuf },
    /// Notification topic with one e-mail subscriber
    Topic { subscriber: String },
}

impl ResourceSpec {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSpec::Role { .. } => ResourceKind::Role,
            ResourceSpec::InlinePolicy { .. } => ResourceKind::Policy,
            ResourceSpec::InstanceProfile { .. } => ResourceKind::InstanceProfile,
            ResourceSpec::KeyPair { .. } => ResourceKind::KeyPair,
            ResourceSpec::Topic { .. } => ResourceKind::Topic,
        }
    }

    /// Role the resource attaches to
    pub fn parent(&self) -> Option<&str> {
        match self {
            ResourceSpec::InlinePolicy { role, .. } | ResourceSpec::InstanceProfile { role } => {
                Some(role)
            }
            _ => None,
        }
    }
}

/// Output of a successful create call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateOutput {
    /// Secret key material returned once at key pair creation
    pub key_material: Option<String>,
}

/// Identity/permission resource operations.
///
/// Calls are blocking with no client-side timeout or retry.
pub trait CloudProvider {
    /// `Ok(())` when the resource exists, `Err(NotFound)` when it does not.
    fn describe(&self, resource: &ManagedResource) -> Result<(), ProviderError>;

    fn create(
        &self,
        resource: &ManagedResource,
        spec: &ResourceSpec,
    ) -> Result<CreateOutput, ProviderError>;

    /// Delete the resource. Instance profiles are detached from their role first.
    fn delete(&self, resource: &ManagedResource) -> Result<(), ProviderError>;

    /// Copy a local file to `key` in `bucket`.
    fn upload(&self, bucket: &str, key: &str, file: &Path) -> Result<(), ProviderError>;
}

/// Read-only probes for externally named resources.
pub trait ReferenceResolver {
    fn zone(&self, zone: &Zone) -> Result<(), ProviderError>;

    fn image(&self, zone: &Zone, image_id: &str) -> Result<(), ProviderError>;

    fn bucket(&self, bucket: &str) -> Result<(), ProviderError>;

    fn network(&self, zone: &Zone) -> Result<NetworkContext, ProviderError>;

    /// Latest market price of `instance_type` in the zone
    fn spot_price(&self, zone: &Zone, instance_type: &str) -> Result<f64, ProviderError>;

    /// Current stock image id for `base_os` in the zone's region
    fn base_image(&self, zone: &Zone, base_os: &str) -> Result<String, ProviderError>;

    /// Id of the security group named `group`
    fn security_group(&self, zone: &Zone, group: &str) -> Result<String, ProviderError>;
}

//! Resource provisioning.
//!
//! The provisioner looks resources up by their deterministic name and creates
//! them only on a provider "not found" answer. Every resource it creates is
//! recorded on an undo log so a failed or cancelled build can remove exactly
//! what this run made, newest first. Resources that already existed are
//! reported but never recorded.

use crate::error::{ProviderError, StackError};
use crate::identity::Serial;
use crate::naming::{ManagedResource, ResourceSlot};
use crate::provider::{CloudProvider, ResourceSpec};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

pub mod plan;
pub mod policies;
pub mod undo;

pub use plan::{cluster_plan, jumphost_plan, teardown_targets, PlanStep};
pub use undo::{RollbackReport, UndoLog};

/// Whether `ensure` created the resource or found it in place
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Found,
}

/// Creates a stack's identity/permission resources and records undo entries.
pub struct Provisioner<'a> {
    provider: &'a dyn CloudProvider,
    undo: UndoLog,
    created: Vec<ManagedResource>,
    found: Vec<ManagedResource>,
}

impl<'a> Provisioner<'a> {
    pub fn new(provider: &'a dyn CloudProvider) -> Self {
        Self {
            provider,
            undo: UndoLog::new(),
            created: Vec::new(),
            found: Vec::new(),
        }
    }

    /// Make sure the resource in `slot` exists for `serial`.
    pub fn ensure(
        &mut self,
        slot: ResourceSlot,
        serial: &Serial,
        spec: &ResourceSpec,
    ) -> Result<(ManagedResource, Outcome), StackError> {
        let resource = ManagedResource::new(slot, serial, spec.parent().map(str::to_string));
        if slot.kind() != spec.kind() {
            return Err(StackError::Provision {
                resource: resource.to_string(),
                source: ProviderError::Malformed(format!(
                    "slot {:?} holds a {}, not a {}",
                    slot,
                    slot.kind(),
                    spec.kind()
                )),
            });
        }

        match self.provider.describe(&resource) {
            Ok(()) => {
                info!(resource = %resource, "Found existing resource");
                self.found.push(resource.clone());
                return Ok((resource, Outcome::Found));
            }
            Err(e) if e.is_not_found() => {
                debug!(resource = %resource, "Resource not found, creating");
            }
            Err(source) => {
                return Err(StackError::Provision {
                    resource: resource.to_string(),
                    source,
                })
            }
        }

        let output = self
            .provider
            .create(&resource, spec)
            .map_err(|source| StackError::Provision {
                resource: resource.to_string(),
                source,
            })?;
        info!(resource = %resource, "Created resource");
        self.created.push(resource.clone());

        match spec {
            ResourceSpec::KeyPair { secret_file } => {
                self.undo.push_key_pair(resource.clone(), secret_file.clone());
                let material = output.key_material.ok_or_else(|| StackError::Provision {
                    resource: resource.to_string(),
                    source: ProviderError::Malformed("no key material returned".to_string()),
                })?;
                write_secret(secret_file, &material)?;
                info!(path = %secret_file.display(), "Wrote key pair secret");
            }
            _ => self.undo.push_resource(resource.clone()),
        }

        Ok((resource, Outcome::Created))
    }

    /// Attach an extra inline policy to an existing role.
    pub fn augment(
        &mut self,
        role: &ManagedResource,
        slot: ResourceSlot,
        document: serde_json::Value,
    ) -> Result<(ManagedResource, Outcome), StackError> {
        let spec = ResourceSpec::InlinePolicy {
            role: role.name.clone(),
            document,
        };
        let serial = role.owning_serial.clone();
        self.ensure(slot, &serial, &spec)
    }

    /// Run every step of a plan in order, stopping at the first failure.
    pub fn apply(&mut self, serial: &Serial, steps: &[PlanStep]) -> Result<(), StackError> {
        for step in steps {
            match step {
                PlanStep::Ensure { slot, spec } => {
                    self.ensure(*slot, serial, spec)?;
                }
                PlanStep::Augment {
                    role_slot,
                    slot,
                    document,
                } => {
                    let role = ManagedResource::new(*role_slot, serial, None);
                    self.augment(&role, *slot, document.clone())?;
                }
            }
        }
        Ok(())
    }

    /// Resources created during this run, oldest first
    pub fn created(&self) -> &[ManagedResource] {
        &self.created
    }

    /// Resources that already existed
    pub fn found(&self) -> &[ManagedResource] {
        &self.found
    }

    /// Hand over the undo log, e.g. to the cancellation window.
    pub fn into_undo(self) -> UndoLog {
        self.undo
    }
}

/// Delete one resource. A resource that is already gone counts as removed.
pub fn remove(provider: &dyn CloudProvider, resource: &ManagedResource) -> Result<(), ProviderError> {
    match provider.delete(resource) {
        Ok(()) => {
            info!(resource = %resource, "Deleted resource");
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            debug!(resource = %resource, "Resource already gone");
            Ok(())
        }
        Err(e) => {
            warn!(resource = %resource, error = %e, "Failed to delete resource");
            Err(e)
        }
    }
}

/// Write key material readable by the owner only.
fn write_secret(path: &Path, material: &str) -> Result<(), StackError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(material.as_bytes())?;
    file.write_all(b"\n")?;
    file.sync_all()?;
    Ok(())
}

//! Build and teardown pipelines.
//!
//! Build: derive the stack name, validate, claim the identity, write the
//! document, provision, hold the cancellation window, run the engine.
//! Any failure between the claim and the window unwinds this run's files and
//! resources. Teardown mirrors it: look the identity up, remove the
//! identity resources by reconstructed name, run the engine teardown, and
//! only then release the serial record.

use crate::compose::{compose, compose_jumphost, ToolVersions};
use crate::config::InvokerConfig;
use crate::error::StackError;
use crate::identity::{duplicate_stack, stack_name, IdentityAllocator, StackIdentity, StackKind};
use crate::invoke::{self, Invocation, Orchestrator, TeardownOptions};
use crate::naming::{bucket_name, resource_name, ResourceSlot};
use crate::params::{ConfigurationInput, JumphostInput};
use crate::provider::{CloudProvider, ReferenceResolver};
use crate::provision::{self, teardown_targets, PlanStep, Provisioner, UndoLog};
use crate::validate::{check_resource_names, validate, validate_jumphost};
use crate::window::{self, CancellationWindow, WindowState};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// What a successful build produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub identity: StackIdentity,
    pub vars_file: PathBuf,
    /// Resources created by this run, oldest first
    pub created: Vec<String>,
    /// Resources that already existed and were reused
    pub found: Vec<String>,
    /// Engine command lines, in the order they ran
    pub commands: Vec<String>,
    /// Remote copy of the serial record, when one was made
    pub archived: Option<String>,
}

/// What a successful teardown removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownReport {
    pub identity: StackIdentity,
    pub removed: Vec<String>,
    /// Whether the engine reported the stack as deployed before teardown
    pub deployed: bool,
}

/// Wires the allocator, provider, engine and window together.
pub struct Workflow<'a> {
    allocator: IdentityAllocator,
    provider: &'a dyn CloudProvider,
    resolver: &'a dyn ReferenceResolver,
    orchestrator: &'a dyn Orchestrator,
    window: CancellationWindow,
    invoker: InvokerConfig,
    verbose: bool,
    confirm_teardown: bool,
}

impl<'a> Workflow<'a> {
    pub fn new(
        allocator: IdentityAllocator,
        provider: &'a dyn CloudProvider,
        resolver: &'a dyn ReferenceResolver,
        orchestrator: &'a dyn Orchestrator,
        window: CancellationWindow,
        invoker: InvokerConfig,
    ) -> Self {
        Self {
            allocator,
            provider,
            resolver,
            orchestrator,
            window,
            invoker,
            verbose: false,
            confirm_teardown: true,
        }
    }

    /// Add `-vvv` to engine runs.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Hold the window before teardown starts deleting.
    pub fn confirm_teardown(mut self, confirm: bool) -> Self {
        self.confirm_teardown = confirm;
        self
    }

    pub fn allocator(&self) -> &IdentityAllocator {
        &self.allocator
    }

    /// Build a cluster stack. `command_line` is recorded once the engine
    /// succeeds so the stack can be rebuilt.
    pub fn build_cluster(
        &self,
        owner: &str,
        logical_name: &str,
        input: &ConfigurationInput,
        command_line: &str,
    ) -> Result<BuildReport, StackError> {
        let kind = StackKind::Cluster;
        let stack = self.precheck(kind, owner, logical_name)?;

        let params = validate(input, self.resolver)?;
        info!(stack = %stack, region = %params.zone.region, "Parameters validated");

        if self.orchestrator.stack_exists(&params.zone.region, &stack)? {
            return Err(duplicate_stack(
                kind,
                owner,
                logical_name,
                format!("stack deployed in {}", params.zone.region),
            ));
        }

        let identity = self.allocator.allocate(kind, owner, logical_name)?;
        let vars_file = self.allocator.layout().vars_file(kind, &stack);

        let staged = self.stage(&identity, &vars_file, |identity| {
            let document = compose(identity, &params)?;
            document.write_new(&vars_file)?;
            Ok(provision::cluster_plan(&identity.serial, &params))
        })?;

        let engine = invoke::cluster_build(&identity, &params, &self.invoker, self.verbose);
        eprintln!("Preparing to build cluster \"{}\" using this command:", stack);
        eprintln!("$ {}", engine);
        self.hold(&vars_file, &identity, staged.undo)?;

        invoke::run_all(self.orchestrator, std::slice::from_ref(&engine))?;
        self.record(&identity, &[&engine], command_line)?;
        info!(stack = %stack, serial = %identity.serial, "Cluster stack built");
        let archived = self.archive_record(&identity);

        Ok(BuildReport {
            identity,
            vars_file,
            created: staged.created,
            found: staged.found,
            commands: vec![engine.command_line()],
            archived,
        })
    }

    /// Build a jump host stack.
    pub fn build_jumphost(
        &self,
        owner: &str,
        name: &str,
        input: &JumphostInput,
        command_line: &str,
    ) -> Result<BuildReport, StackError> {
        let kind = StackKind::Jumphost;
        let stack = self.precheck(kind, owner, name)?;

        let params = validate_jumphost(input, self.resolver)?;
        info!(stack = %stack, region = %params.zone.region, "Parameters validated");

        let tools = ToolVersions {
            ansible: self.orchestrator.tool_version(&self.invoker.ansible)?,
            terraform: self.orchestrator.tool_version(&self.invoker.terraform)?,
        };
        debug!(ansible = %tools.ansible, terraform = %tools.terraform, "Tool versions");

        let identity = self.allocator.allocate(kind, owner, name)?;
        let vars_file = self.allocator.layout().vars_file(kind, &stack);
        let data_dir = self.allocator.layout().data_dir(kind, &stack);

        let staged = self.stage(&identity, &vars_file, |identity| {
            let document = compose_jumphost(identity, &params, &tools)?;
            document.write_new(&vars_file)?;
            let secret_file = data_dir.join(format!(
                "{}.pem",
                resource_name(ResourceSlot::JumphostKeyPair, &identity.serial)
            ));
            Ok(provision::jumphost_plan(&identity.serial, &params, secret_file))
        });
        let staged = match staged {
            Ok(staged) => staged,
            Err(e) => {
                remove_empty_dir(&data_dir);
                return Err(e);
            }
        };

        let engine = invoke::jumphost_build(&identity, &data_dir, &self.invoker, self.verbose);
        eprintln!("Preparing to build jump host \"{}\" using these commands:", stack);
        for step in &engine {
            eprintln!("$ {}", step);
        }
        if let Err(e) = self.hold(&vars_file, &identity, staged.undo) {
            remove_empty_dir(&data_dir);
            return Err(e);
        }

        invoke::run_all(self.orchestrator, &engine)?;
        let steps: Vec<&Invocation> = engine.iter().collect();
        self.record(&identity, &steps, command_line)?;
        info!(stack = %stack, serial = %identity.serial, "Jump host built");

        Ok(BuildReport {
            identity,
            vars_file,
            created: staged.created,
            found: staged.found,
            commands: engine.iter().map(Invocation::command_line).collect(),
            archived: None,
        })
    }

    /// Tear a cluster stack down.
    pub fn destroy_cluster(
        &self,
        owner: &str,
        logical_name: &str,
        region: &str,
        options: TeardownOptions,
    ) -> Result<TeardownReport, StackError> {
        let identity = self.allocator.lookup(StackKind::Cluster, owner, logical_name)?;
        let deployed = self.orchestrator.stack_exists(region, &identity.stack_name)?;
        if !deployed {
            warn!(
                stack = %identity.stack_name,
                region,
                "Cluster stack not found; continuing with artifact destruction"
            );
        }

        let engine = invoke::cluster_teardown(&identity, options, &self.invoker, self.verbose);
        eprintln!("Preparing to delete cluster \"{}\" using this command:", identity.stack_name);
        eprintln!("$ {}", engine);
        self.teardown(identity, deployed, &[engine], None)
    }

    /// Tear a jump host stack down.
    pub fn destroy_jumphost(&self, owner: &str, name: &str) -> Result<TeardownReport, StackError> {
        let identity = self.allocator.lookup(StackKind::Jumphost, owner, name)?;
        let data_dir = self
            .allocator
            .layout()
            .data_dir(StackKind::Jumphost, &identity.stack_name);
        let deployed = data_dir.is_dir();
        if !deployed {
            warn!(
                stack = %identity.stack_name,
                data_dir = %data_dir.display(),
                "No terraform state for jump host; continuing with artifact destruction"
            );
        }

        let engine = if deployed {
            vec![invoke::jumphost_teardown(&data_dir, &self.invoker)]
        } else {
            Vec::new()
        };
        for step in &engine {
            eprintln!("$ {}", step);
        }
        self.teardown(identity, deployed, &engine, Some(&data_dir))
    }

    /// Refuse a stack whose record or document is already on disk.
    fn precheck(&self, kind: StackKind, owner: &str, logical_name: &str) -> Result<String, StackError> {
        let stack = stack_name(owner, logical_name)?;
        check_resource_names(kind, &stack)?;
        let layout = self.allocator.layout();
        let evidence = [layout.serial_record(kind, &stack), layout.vars_file(kind, &stack)];
        if let Some(existing) = evidence.iter().find(|path| path.exists()) {
            return Err(duplicate_stack(kind, owner, logical_name, existing.display()));
        }
        Ok(stack)
    }

    /// Write the document and create the plan's resources. On failure
    /// everything created so far, the record included, is removed again.
    fn stage<F>(
        &self,
        identity: &StackIdentity,
        vars_file: &Path,
        prepare: F,
    ) -> Result<Staged, StackError>
    where
        F: FnOnce(&StackIdentity) -> Result<Vec<PlanStep>, StackError>,
    {
        let mut provisioner = Provisioner::new(self.provider);
        let outcome = match prepare(identity) {
            Ok(plan) => provisioner.apply(&identity.serial, &plan),
            Err(e) => Err(e),
        };
        let created = names(provisioner.created());
        let found = names(provisioner.found());
        let undo = provisioner.into_undo();

        match outcome {
            Ok(()) => Ok(Staged {
                created,
                found,
                undo,
            }),
            Err(cause) => {
                error!(stack = %identity.stack_name, error = %cause, "Build failed, rolling back");
                let files = self.build_files(identity, vars_file);
                let report = window::rollback(&files, undo, self.provider);
                if report.is_clean() {
                    Err(cause)
                } else {
                    Err(StackError::TeardownPartialFailure {
                        failures: report.failures,
                    })
                }
            }
        }
    }

    /// Hold the window; on interrupt unwind the run.
    fn hold(&self, vars_file: &Path, identity: &StackIdentity, undo: UndoLog) -> Result<(), StackError> {
        match self.window.hold()? {
            WindowState::RolledBack => {
                let files = self.build_files(identity, vars_file);
                let report = window::rollback(&files, undo, self.provider);
                Err(StackError::Cancelled {
                    removed: report.removed.len(),
                    failures: report.failures,
                })
            }
            _ => Ok(()),
        }
    }

    fn build_files(&self, identity: &StackIdentity, vars_file: &Path) -> Vec<PathBuf> {
        vec![vars_file.to_path_buf(), self.allocator.record_path(identity)]
    }

    /// Copy the finished serial record into the stack's bucket. The stack is
    /// already built, so a failed copy is only logged.
    fn archive_record(&self, identity: &StackIdentity) -> Option<String> {
        let bucket = bucket_name(identity);
        let key = format!("cluster_serial_number/{}.serial", identity.stack_name);
        let record = self.allocator.record_path(identity);
        match self.provider.upload(&bucket, &key, &record) {
            Ok(()) => {
                let uri = format!("s3://{}/{}", bucket, key);
                info!(stack = %identity.stack_name, uri = %uri, "Archived serial record");
                Some(uri)
            }
            Err(e) => {
                warn!(stack = %identity.stack_name, bucket = %bucket, error = %e, "Failed to archive serial record");
                None
            }
        }
    }

    /// Append the engine command lines, then the operator's own.
    fn record(
        &self,
        identity: &StackIdentity,
        engine: &[&Invocation],
        command_line: &str,
    ) -> Result<(), StackError> {
        for step in engine {
            self.allocator.append_command(identity, &step.command_line())?;
        }
        if !command_line.trim().is_empty() {
            self.allocator.append_command(identity, command_line)?;
        }
        Ok(())
    }

    fn teardown(
        &self,
        identity: StackIdentity,
        deployed: bool,
        engine: &[Invocation],
        data_dir: Option<&Path>,
    ) -> Result<TeardownReport, StackError> {
        if self.confirm_teardown && self.window.hold()? == WindowState::RolledBack {
            return Err(StackError::Cancelled {
                removed: 0,
                failures: Vec::new(),
            });
        }

        let mut removed = Vec::new();
        let mut failures = Vec::new();
        for resource in teardown_targets(identity.kind, &identity.serial) {
            match provision::remove(self.provider, &resource) {
                Ok(()) => removed.push(resource.to_string()),
                Err(e) => failures.push(format!("{}: {}", resource, e)),
            }
        }

        invoke::run_all(self.orchestrator, engine)?;

        if !failures.is_empty() {
            error!(
                stack = %identity.stack_name,
                failures = failures.len(),
                "Teardown left resources behind; serial record kept"
            );
            return Err(StackError::TeardownPartialFailure { failures });
        }

        let vars_file = self
            .allocator
            .layout()
            .vars_file(identity.kind, &identity.stack_name);
        match fs::remove_file(&vars_file) {
            Ok(()) => removed.push(format!("file {}", vars_file.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %vars_file.display(), "Document already removed")
            }
            Err(e) => return Err(e.into()),
        }
        if let Some(dir) = data_dir {
            match fs::remove_dir_all(dir) {
                Ok(()) => removed.push(format!("directory {}", dir.display())),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.allocator.release(&identity)?;
        info!(stack = %identity.stack_name, "Stack destroyed");

        Ok(TeardownReport {
            identity,
            removed,
            deployed,
        })
    }
}

/// Result of a successful staging pass
struct Staged {
    created: Vec<String>,
    found: Vec<String>,
    undo: UndoLog,
}

fn names(resources: &[crate::naming::ManagedResource]) -> Vec<String> {
    resources.iter().map(ToString::to_string).collect()
}

fn remove_empty_dir(dir: &Path) {
    if let Err(e) = fs::remove_dir(dir) {
        debug!(dir = %dir.display(), error = %e, "Data directory left in place");
    }
}

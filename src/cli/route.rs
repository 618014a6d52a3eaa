//! CLI route: single route table and run context. Dispatches to the workflows
//! and presentation.

use crate::access;
use crate::config::{ClusterMakerConfig, ConfigLoader};
use crate::error::{StackError, ValidationErrors};
use crate::identity::{IdentityAllocator, StackKind, StateLayout};
use crate::invoke::{ProcessOrchestrator, TeardownOptions};
use crate::params::{Choice, ConfigurationInput, JumphostInput, ProdLevel, Zone};
use crate::provider::AwsCli;
use crate::window::CancellationWindow;
use crate::workflow::Workflow;
use std::path::PathBuf;
use tracing::{debug, info};

use super::parse::{
    ClusterAccessArgs, ClusterBuildArgs, ClusterCommands, ClusterDestroyArgs, Commands,
    JumphostAccessArgs, JumphostBuildArgs, JumphostCommands, JumphostDestroyArgs, StackArgs,
};
use super::presentation::{
    format_build_report, format_stack_list_text, format_stack_show_text, format_teardown_report,
    to_json, StackSummary,
};

/// Runtime context for CLI execution: workspace, effective config, and the
/// literal command line recorded with each build.
pub struct RunContext {
    workspace_root: PathBuf,
    config: ClusterMakerConfig,
    verbose: bool,
    command_line: String,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(
        workspace_root: PathBuf,
        config_path: Option<PathBuf>,
        verbose: bool,
    ) -> Result<Self, StackError> {
        let config = match &config_path {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        if let Err(errors) = config.validate() {
            let lines: Vec<String> = errors.iter().map(ToString::to_string).collect();
            return Err(StackError::ConfigError(lines.join("; ")));
        }
        Ok(Self::with_config(workspace_root, config, verbose))
    }

    pub fn with_config(workspace_root: PathBuf, config: ClusterMakerConfig, verbose: bool) -> Self {
        Self {
            workspace_root,
            config,
            verbose,
            command_line: String::new(),
        }
    }

    /// The command line appended to serial records after a successful build.
    pub fn with_command_line(mut self, command_line: impl Into<String>) -> Self {
        self.command_line = command_line.into();
        self
    }

    pub fn config(&self) -> &ClusterMakerConfig {
        &self.config
    }

    fn allocator(&self) -> IdentityAllocator {
        let root = self.config.state.resolve(&self.workspace_root);
        debug!(state_root = %root.display(), "State root");
        IdentityAllocator::new(StateLayout::new(root))
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, StackError> {
        match command {
            Commands::Cluster { command } => match command {
                ClusterCommands::Build(args) => self.handle_cluster_build(args),
                ClusterCommands::Destroy(args) => self.handle_cluster_destroy(args),
                ClusterCommands::Access(args) => self.handle_cluster_access(args),
            },
            Commands::Jumphost { command } => match command {
                JumphostCommands::Build(args) => self.handle_jumphost_build(args),
                JumphostCommands::Destroy(args) => self.handle_jumphost_destroy(args),
                JumphostCommands::Access(args) => self.handle_jumphost_access(args),
            },
            Commands::List { kind, format } => self.handle_list(kind.as_deref(), format),
            Commands::Show {
                stack,
                kind,
                format,
            } => self.handle_show(stack, kind, format),
            Commands::Config { format } => self.handle_config(format),
        }
    }

    fn handle_cluster_build(&self, args: &ClusterBuildArgs) -> Result<String, StackError> {
        let zone = parse_zone(&args.az)?;
        let (provider, orchestrator) = self.backends(&zone.region);
        let flow = self.workflow(&provider, &orchestrator, true);
        let report = flow.build_cluster(
            &args.stack.owner,
            &args.stack.name,
            &cluster_input(args),
            &self.command_line,
        )?;
        Ok(format_build_report(&report))
    }

    fn handle_cluster_destroy(&self, args: &ClusterDestroyArgs) -> Result<String, StackError> {
        let zone = parse_zone(&args.az)?;
        if !args.yes && !confirm(&args.stack, StackKind::Cluster)? {
            return Ok("Teardown cancelled".to_string());
        }
        let options = TeardownOptions {
            delete_bucket: args.delete_s3_bucketname,
            delete_efs: args.delete_efs,
            delete_fsx: args.delete_fsx,
        };
        let (provider, orchestrator) = self.backends(&zone.region);
        let flow = self.workflow(&provider, &orchestrator, !args.yes);
        let report =
            flow.destroy_cluster(&args.stack.owner, &args.stack.name, &zone.region, options)?;
        Ok(format_teardown_report(&report))
    }

    fn handle_jumphost_build(&self, args: &JumphostBuildArgs) -> Result<String, StackError> {
        let zone = parse_zone(&args.az)?;
        let input = JumphostInput {
            az: args.az.clone(),
            owner_email: args.owner_email.clone(),
            department: args.department.clone(),
            project_id: args.project_id.clone(),
            security_group: args.security_group.clone(),
        };
        let (provider, orchestrator) = self.backends(&zone.region);
        let flow = self.workflow(&provider, &orchestrator, true);
        let report =
            flow.build_jumphost(&args.stack.owner, &args.stack.name, &input, &self.command_line)?;
        Ok(format_build_report(&report))
    }

    fn handle_jumphost_destroy(&self, args: &JumphostDestroyArgs) -> Result<String, StackError> {
        let zone = parse_zone(&args.az)?;
        if !args.yes && !confirm(&args.stack, StackKind::Jumphost)? {
            return Ok("Teardown cancelled".to_string());
        }
        let (provider, orchestrator) = self.backends(&zone.region);
        let flow = self.workflow(&provider, &orchestrator, !args.yes);
        let report = flow.destroy_jumphost(&args.stack.owner, &args.stack.name)?;
        Ok(format_teardown_report(&report))
    }

    fn handle_cluster_access(&self, args: &ClusterAccessArgs) -> Result<String, StackError> {
        let prod_level = ProdLevel::parse_for("prod_level", &args.prod_level)
            .map_err(|e| StackError::Validation(ValidationErrors::single(e)))?;
        self.access(StackKind::Cluster, &args.stack, prod_level, args.print)
    }

    fn handle_jumphost_access(&self, args: &JumphostAccessArgs) -> Result<String, StackError> {
        self.access(StackKind::Jumphost, &args.stack, ProdLevel::Dev, args.print)
    }

    fn access(
        &self,
        kind: StackKind,
        stack: &StackArgs,
        prod_level: ProdLevel,
        print: bool,
    ) -> Result<String, StackError> {
        let script = access::locate(&self.allocator(), kind, &stack.owner, &stack.name, prod_level)?;
        if print {
            return Ok(script.shell_line());
        }
        access::connect(&ProcessOrchestrator::new(&self.config.invoker), &script)?;
        Ok(String::new())
    }

    fn handle_list(&self, kind: Option<&str>, format: &str) -> Result<String, StackError> {
        let kinds = match kind {
            Some(kind) => vec![parse_kind(kind)?],
            None => StackKind::ALL.to_vec(),
        };
        let allocator = self.allocator();
        let mut stacks = Vec::new();
        for kind in kinds {
            for identity in allocator.list(kind)? {
                stacks.push(StackSummary::new(&identity, Vec::new()));
            }
        }
        if format == "json" {
            to_json(&stacks)
        } else {
            Ok(format_stack_list_text(&stacks))
        }
    }

    fn handle_show(&self, stack: &StackArgs, kind: &str, format: &str) -> Result<String, StackError> {
        let allocator = self.allocator();
        let identity = allocator.lookup(parse_kind(kind)?, &stack.owner, &stack.name)?;
        let summary = StackSummary::new(&identity, allocator.commands(&identity)?);
        if format == "json" {
            to_json(&summary)
        } else {
            Ok(format_stack_show_text(&summary))
        }
    }

    fn handle_config(&self, format: &str) -> Result<String, StackError> {
        if format == "json" {
            return to_json(&self.config);
        }
        toml::to_string_pretty(&self.config)
            .map_err(|e| StackError::ConfigError(format!("Failed to serialize config: {}", e)))
    }

    fn backends(&self, region: &str) -> (AwsCli, ProcessOrchestrator) {
        let cloud = &self.config.cloud;
        info!(region, binary = %cloud.binary, "Using cloud CLI");
        (
            AwsCli::new(cloud.binary.clone(), region, cloud.profile.clone()),
            ProcessOrchestrator::new(&self.config.invoker),
        )
    }

    fn workflow<'a>(
        &self,
        provider: &'a AwsCli,
        orchestrator: &'a ProcessOrchestrator,
        confirm_teardown: bool,
    ) -> Workflow<'a> {
        Workflow::new(
            self.allocator(),
            provider,
            provider,
            orchestrator,
            CancellationWindow::from_config(&self.config.window, self.verbose),
            self.config.invoker.clone(),
        )
        .verbose(self.verbose)
        .confirm_teardown(confirm_teardown && self.config.window.before_teardown)
    }
}

fn parse_zone(az: &str) -> Result<Zone, StackError> {
    Zone::parse(az).map_err(|e| StackError::Validation(ValidationErrors::single(e)))
}

fn parse_kind(kind: &str) -> Result<StackKind, StackError> {
    kind.parse()
        .map_err(|e| StackError::Validation(ValidationErrors::single(e)))
}

fn confirm(stack: &StackArgs, kind: StackKind) -> Result<bool, StackError> {
    use dialoguer::Confirm;
    Confirm::new()
        .with_prompt(format!("Destroy {} {}-{}?", kind, stack.owner, stack.name))
        .default(false)
        .interact()
        .map_err(|e| StackError::ConfigError(format!("Failed to get user input: {}", e)))
}

fn cluster_input(args: &ClusterBuildArgs) -> ConfigurationInput {
    ConfigurationInput {
        az: args.az.clone(),
        owner_email: args.owner_email.clone(),
        department: args.department.clone(),
        project_id: args.project_id.clone(),
        prod_level: args.prod_level.clone(),
        cluster_lifetime: args.cluster_lifetime.clone(),
        base_os: args.base_os.clone(),
        custom_ami: args.custom_ami.clone().filter(|ami| ami != "NONE"),
        master_instance_type: args.master_instance_type.clone(),
        compute_instance_type: args.compute_instance_type.clone(),
        master_root_volume_size: args.master_root_volume_size,
        compute_root_volume_size: args.compute_root_volume_size,
        pricing: args.pricing.clone(),
        placement_group: args.placement_group.clone(),
        hyperthreading: args.hyperthreading,
        scheduler: args.scheduler.clone(),
        enable_sge_pe: args.enable_sge_pe,
        sge_pe_type: args.sge_pe_type.clone(),
        initial_queue_size: args.initial_queue_size,
        max_queue_size: args.max_queue_size,
        maintain_initial_size: args.maintain_initial_size,
        scaledown_idletime: args.scaledown_idletime,
        min_vcpus: args.min_vcpus,
        desired_vcpus: args.desired_vcpus,
        max_vcpus: args.max_vcpus,
        ebs_shared_dir: args.ebs_shared_dir.clone(),
        ebs_shared_volume_size: args.ebs_shared_volume_size,
        ebs_shared_volume_type: args.ebs_shared_volume_type.clone(),
        ebs_encryption: args.ebs_encryption,
        enable_external_nfs: args.enable_external_nfs,
        external_nfs_server: args.external_nfs_server.clone(),
        enable_efs: args.enable_efs,
        efs_encryption: args.efs_encryption,
        efs_performance_mode: args.efs_performance_mode.clone(),
        enable_fsx: args.enable_fsx,
        fsx_size: args.fsx_size,
        enable_data_staging: args.enable_data_staging,
        staging_bucket: args.staging_bucket.clone(),
        enable_hpc_performance_tests: args.enable_hpc_performance_tests,
        perftest_start: args.perftest_start,
        perftest_step: args.perftest_step,
        perftest_total: args.perftest_total,
        enable_ganglia: args.enable_ganglia,
    }
}

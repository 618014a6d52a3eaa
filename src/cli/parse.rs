//! CLI parse: clap types for clustermaker. No behavior; definitions only.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// ClusterMaker CLI - build and tear down HPC cluster stacks and jump hosts
#[derive(Parser, Debug)]
#[command(name = "clustermaker")]
#[command(about = "Build and tear down named HPC cluster stacks and their jump hosts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (state root is resolved against it)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Verbose engine runs, longer cancellation window, debug logging
    #[arg(long, short = 'D')]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Cluster stacks
    Cluster {
        #[command(subcommand)]
        command: ClusterCommands,
    },
    /// Jump host instances
    Jumphost {
        #[command(subcommand)]
        command: JumphostCommands,
    },
    /// List active stacks
    List {
        /// Only this kind (cluster or jumphost)
        #[arg(long)]
        kind: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show one stack's serial record
    Show {
        #[command(flatten)]
        stack: StackArgs,
        /// Stack kind (cluster or jumphost)
        #[arg(long, default_value = "cluster")]
        kind: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print the effective configuration
    Config {
        /// Output format (toml or json)
        #[arg(long, default_value = "toml")]
        format: String,
    },
}

/// Stack name and owner, shared by every per-stack command
#[derive(Args, Debug, Clone)]
pub struct StackArgs {
    /// Logical name of the stack
    #[arg(long = "name", short = 'N')]
    pub name: String,

    /// Username of the stack owner
    #[arg(long = "owner", short = 'O')]
    pub owner: String,
}

#[derive(Subcommand, Debug)]
pub enum ClusterCommands {
    /// Build a new cluster stack
    Build(Box<ClusterBuildArgs>),
    /// Destroy a cluster stack and everything created for it
    Destroy(ClusterDestroyArgs),
    /// Open an SSH session on the cluster's head node
    Access(ClusterAccessArgs),
}

#[derive(Subcommand, Debug)]
pub enum JumphostCommands {
    /// Build a new jump host
    Build(JumphostBuildArgs),
    /// Destroy a jump host
    Destroy(JumphostDestroyArgs),
    /// Open an SSH session on the jump host
    Access(JumphostAccessArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ClusterBuildArgs {
    #[command(flatten)]
    pub stack: StackArgs,

    /// Email address of the cluster owner
    #[arg(long = "owner-email", short = 'E')]
    pub owner_email: String,

    /// Availability zone, e.g. us-east-1a
    #[arg(long, short = 'A')]
    pub az: String,

    /// Department of the cluster owner
    #[arg(long, default_value = "hpc")]
    pub department: String,

    /// Project name or ID number
    #[arg(long, default_value = "UNDEFINED")]
    pub project_id: String,

    /// Operating level (dev, test, stage, prod)
    #[arg(long, default_value = "dev")]
    pub prod_level: String,

    /// Terminate after days:hours:minutes
    #[arg(long, default_value = "30:0:0")]
    pub cluster_lifetime: String,

    /// Operating system (alinux, centos6, centos7, ubuntu1604)
    #[arg(long, default_value = "alinux")]
    pub base_os: String,

    /// Custom image to use instead of the published images
    #[arg(long)]
    pub custom_ami: Option<String>,

    #[arg(long, default_value = "c5.xlarge")]
    pub master_instance_type: String,

    #[arg(long, default_value_t = 250)]
    pub master_root_volume_size: i64,

    #[arg(long, default_value = "c5.xlarge")]
    pub compute_instance_type: String,

    #[arg(long, default_value_t = 250)]
    pub compute_root_volume_size: i64,

    /// Pricing model (ondemand or spot)
    #[arg(long = "cluster-type", default_value = "spot")]
    pub pricing: String,

    /// Placement group (NONE or DYNAMIC)
    #[arg(long, default_value = "NONE")]
    pub placement_group: String,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub hyperthreading: bool,

    /// Scheduler (sge, torque, slurm, awsbatch)
    #[arg(long, short = 'S', default_value = "sge")]
    pub scheduler: String,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub enable_sge_pe: bool,

    /// Grid Engine parallel environment (make, mpi, smp)
    #[arg(long, default_value = "smp")]
    pub sge_pe_type: String,

    #[arg(long, default_value_t = 2)]
    pub initial_queue_size: i64,

    #[arg(long, default_value_t = 10)]
    pub max_queue_size: i64,

    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub maintain_initial_size: bool,

    /// Idle minutes before a compute node terminates
    #[arg(long, default_value_t = 5)]
    pub scaledown_idletime: i64,

    #[arg(long, default_value_t = 0)]
    pub min_vcpus: i64,

    #[arg(long, default_value_t = 4)]
    pub desired_vcpus: i64,

    #[arg(long, default_value_t = 20)]
    pub max_vcpus: i64,

    #[arg(long, default_value = "/shared")]
    pub ebs_shared_dir: String,

    #[arg(long, default_value_t = 250)]
    pub ebs_shared_volume_size: i64,

    /// Shared volume type (gp2, io1, st1)
    #[arg(long, default_value = "gp2")]
    pub ebs_shared_volume_type: String,

    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub ebs_encryption: bool,

    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub enable_external_nfs: bool,

    #[arg(long)]
    pub external_nfs_server: Option<String>,

    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub enable_efs: bool,

    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub efs_encryption: bool,

    /// EFS performance mode (general_purpose or max_io)
    #[arg(long, default_value = "general_purpose")]
    pub efs_performance_mode: String,

    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub enable_fsx: bool,

    /// Lustre size in GB, a multiple of 3600
    #[arg(long, default_value_t = 3600)]
    pub fsx_size: i64,

    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub enable_data_staging: bool,

    /// Bucket staged into the Lustre file system
    #[arg(long)]
    pub staging_bucket: Option<String>,

    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub enable_hpc_performance_tests: bool,

    #[arg(long, default_value_t = 10)]
    pub perftest_start: i64,

    #[arg(long, default_value_t = 10)]
    pub perftest_step: i64,

    #[arg(long, default_value_t = 10)]
    pub perftest_total: i64,

    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub enable_ganglia: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ClusterDestroyArgs {
    #[command(flatten)]
    pub stack: StackArgs,

    /// Availability zone the cluster runs in
    #[arg(long, short = 'A')]
    pub az: String,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub delete_s3_bucketname: bool,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub delete_efs: bool,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub delete_fsx: bool,

    /// Skip the confirmation prompt and the pre-teardown window
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct JumphostBuildArgs {
    #[command(flatten)]
    pub stack: StackArgs,

    /// Email address of the jump host owner
    #[arg(long = "owner-email", short = 'E')]
    pub owner_email: String,

    /// Availability zone, e.g. us-east-1a
    #[arg(long, short = 'A')]
    pub az: String,

    #[arg(long, default_value = "hpc")]
    pub department: String,

    #[arg(long, default_value = "UNDEFINED")]
    pub project_id: String,

    /// Security group the instance joins
    #[arg(long, default_value = "pcluster_jumphost")]
    pub security_group: String,
}

#[derive(Args, Debug, Clone)]
pub struct JumphostDestroyArgs {
    #[command(flatten)]
    pub stack: StackArgs,

    /// Availability zone the jump host runs in
    #[arg(long, short = 'A')]
    pub az: String,

    /// Skip the confirmation prompt and the pre-teardown window
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ClusterAccessArgs {
    #[command(flatten)]
    pub stack: StackArgs,

    /// Operating level the cluster was built at (dev, test, stage, prod)
    #[arg(long, short = 'P', default_value = "dev")]
    pub prod_level: String,

    /// Print the access command instead of running it
    #[arg(long)]
    pub print: bool,
}

#[derive(Args, Debug, Clone)]
pub struct JumphostAccessArgs {
    #[command(flatten)]
    pub stack: StackArgs,

    /// Print the access command instead of running it
    #[arg(long)]
    pub print: bool,
}

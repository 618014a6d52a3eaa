//! Parameter types: the raw operator input and the strongly typed, validated
//! value object that flows through composition and provisioning.

use crate::catalog::DEFAULT_INSTANCE_TYPE;
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel written for a companion value whose feature is disabled
pub const FEATURE_DISABLED: &str = "FEATURE_DISABLED";

/// Sentinel for values the document carries but that have no meaning here
pub const UNDEFINED: &str = "UNDEFINED";

/// A closed set of string choices accepted on the command line.
pub trait Choice: Sized + Copy + 'static {
    const ALL: &'static [Self];

    fn as_str(&self) -> &'static str;

    /// Parse `value` for `field`, listing the supported values on failure.
    fn parse_for(field: &'static str, value: &str) -> Result<Self, ValidationError> {
        Self::ALL
            .iter()
            .copied()
            .find(|choice| choice.as_str() == value)
            .ok_or_else(|| ValidationError::NotInCatalog {
                field,
                value: value.to_string(),
                supported: Self::ALL
                    .iter()
                    .map(|c| c.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

macro_rules! choice_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl Choice for $name {
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

choice_enum!(
    /// Cluster operating system
    BaseOs {
        Alinux => "alinux",
        Centos6 => "centos6",
        Centos7 => "centos7",
        Ubuntu1604 => "ubuntu1604",
    }
);

impl BaseOs {
    /// Default login account for images of this operating system
    pub fn ec2_user(&self) -> &'static str {
        match self {
            BaseOs::Alinux => "ec2-user",
            BaseOs::Centos6 | BaseOs::Centos7 => "centos",
            BaseOs::Ubuntu1604 => "ubuntu",
        }
    }
}

choice_enum!(
    /// Deployment tier
    ProdLevel {
        Dev => "dev",
        Test => "test",
        Stage => "stage",
        Prod => "prod",
    }
);

choice_enum!(
    /// Pricing model for compute instances
    PricingModel {
        OnDemand => "ondemand",
        Spot => "spot",
    }
);

choice_enum!(
    PlacementGroup {
        Disabled => "NONE",
        Dynamic => "DYNAMIC",
    }
);

choice_enum!(
    /// Workload scheduler run by the cluster
    SchedulerKind {
        Sge => "sge",
        Slurm => "slurm",
        Torque => "torque",
        AwsBatch => "awsbatch",
    }
);

choice_enum!(
    /// SGE parallel environment type
    SgePeType {
        Make => "make",
        Mpi => "mpi",
        Smp => "smp",
    }
);

choice_enum!(
    VolumeType {
        Gp2 => "gp2",
        Io1 => "io1",
        St1 => "st1",
    }
);

choice_enum!(
    EfsPerformanceMode {
        GeneralPurpose => "general_purpose",
        MaxIo => "max_io",
    }
);

/// Raw cluster build parameters as supplied by the operator.
///
/// Defaults mirror the command line defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigurationInput {
    pub az: String,
    pub owner_email: String,
    pub department: String,
    pub project_id: String,
    pub prod_level: String,
    /// `days:hours:minutes`
    pub cluster_lifetime: String,
    pub base_os: String,
    pub custom_ami: Option<String>,
    pub master_instance_type: String,
    pub compute_instance_type: String,
    pub master_root_volume_size: i64,
    pub compute_root_volume_size: i64,
    pub pricing: String,
    pub placement_group: String,
    pub hyperthreading: bool,
    pub scheduler: String,
    pub enable_sge_pe: bool,
    pub sge_pe_type: String,
    pub initial_queue_size: i64,
    pub max_queue_size: i64,
    pub maintain_initial_size: bool,
    pub scaledown_idletime: i64,
    pub min_vcpus: i64,
    pub desired_vcpus: i64,
    pub max_vcpus: i64,
    pub ebs_shared_dir: String,
    pub ebs_shared_volume_size: i64,
    pub ebs_shared_volume_type: String,
    pub ebs_encryption: bool,
    pub enable_external_nfs: bool,
    pub external_nfs_server: Option<String>,
    pub enable_efs: bool,
    pub efs_encryption: bool,
    pub efs_performance_mode: String,
    pub enable_fsx: bool,
    pub fsx_size: i64,
    pub enable_data_staging: bool,
    pub staging_bucket: Option<String>,
    pub enable_hpc_performance_tests: bool,
    pub perftest_start: i64,
    pub perftest_step: i64,
    pub perftest_total: i64,
    pub enable_ganglia: bool,
}

impl Default for ConfigurationInput {
    fn default() -> Self {
        Self {
            az: String::new(),
            owner_email: String::new(),
            department: "hpc".to_string(),
            project_id: UNDEFINED.to_string(),
            prod_level: "dev".to_string(),
            cluster_lifetime: "30:0:0".to_string(),
            base_os: "alinux".to_string(),
            custom_ami: None,
            master_instance_type: DEFAULT_INSTANCE_TYPE.to_string(),
            compute_instance_type: DEFAULT_INSTANCE_TYPE.to_string(),
            master_root_volume_size: 250,
            compute_root_volume_size: 250,
            pricing: "spot".to_string(),
            placement_group: "NONE".to_string(),
            hyperthreading: true,
            scheduler: "sge".to_string(),
            enable_sge_pe: true,
            sge_pe_type: "smp".to_string(),
            initial_queue_size: 2,
            max_queue_size: 10,
            maintain_initial_size: false,
            scaledown_idletime: 5,
            min_vcpus: 0,
            desired_vcpus: 4,
            max_vcpus: 20,
            ebs_shared_dir: "/shared".to_string(),
            ebs_shared_volume_size: 250,
            ebs_shared_volume_type: "gp2".to_string(),
            ebs_encryption: false,
            enable_external_nfs: false,
            external_nfs_server: None,
            enable_efs: false,
            efs_encryption: false,
            efs_performance_mode: "general_purpose".to_string(),
            enable_fsx: false,
            fsx_size: 3600,
            enable_data_staging: false,
            staging_bucket: None,
            enable_hpc_performance_tests: false,
            perftest_start: 10,
            perftest_step: 10,
            perftest_total: 10,
            enable_ganglia: false,
        }
    }
}

/// Raw jump-host build parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JumphostInput {
    pub az: String,
    pub owner_email: String,
    pub department: String,
    pub project_id: String,
    pub security_group: String,
}

impl Default for JumphostInput {
    fn default() -> Self {
        Self {
            az: String::new(),
            owner_email: String::new(),
            department: "hpc".to_string(),
            project_id: UNDEFINED.to_string(),
            security_group: "pcluster_jumphost".to_string(),
        }
    }
}

/// Availability zone and the region that contains it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub az: String,
    pub region: String,
}

impl Zone {
    /// Split `us-east-1a` into zone and region `us-east-1`.
    pub fn parse(az: &str) -> Result<Self, ValidationError> {
        let malformed = |reason: &str| ValidationError::Malformed {
            field: "az",
            value: az.to_string(),
            reason: reason.to_string(),
        };
        let last = az.chars().last().ok_or_else(|| malformed("must not be empty"))?;
        if !last.is_ascii_lowercase() {
            return Err(malformed("must end with a zone letter, e.g. us-east-1a"));
        }
        let region = &az[..az.len() - 1];
        if !region.ends_with(|c: char| c.is_ascii_digit()) {
            return Err(malformed("must be a region followed by a zone letter"));
        }
        Ok(Self {
            az: az.to_string(),
            region: region.to_string(),
        })
    }
}

/// Account and network placement resolved for a zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkContext {
    pub account_id: String,
    pub vpc_id: String,
    pub vpc_name: String,
    pub subnet_id: String,
}

/// Cluster lifetime before automatic termination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifetime {
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.days, self.hours, self.minutes)
    }
}

/// Scheduler-specific sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerConfig {
    Batch {
        min_vcpus: u32,
        desired_vcpus: u32,
        max_vcpus: u32,
    },
    Queue {
        kind: SchedulerKind,
        initial_queue_size: u32,
        max_queue_size: u32,
        maintain_initial_size: bool,
        /// SGE only: (enabled, type)
        sge_pe: Option<(bool, SgePeType)>,
    },
}

impl SchedulerConfig {
    pub fn kind(&self) -> SchedulerKind {
        match self {
            SchedulerConfig::Batch { .. } => SchedulerKind::AwsBatch,
            SchedulerConfig::Queue { kind, .. } => *kind,
        }
    }
}

/// Instance pricing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pricing {
    OnDemand,
    /// Market priced; `raw_price` is `None` when the compute type has no
    /// single market (the batch scheduler picks instances itself).
    Spot { raw_price: Option<f64> },
}

impl Pricing {
    pub fn model(&self) -> PricingModel {
        match self {
            Pricing::OnDemand => PricingModel::OnDemand,
            Pricing::Spot { .. } => PricingModel::Spot,
        }
    }

    /// Raw price rendered the way the document carries it
    pub fn raw_price_text(&self) -> String {
        match self {
            Pricing::Spot {
                raw_price: Some(price),
            } => format!("{}", price),
            _ => UNDEFINED.to_string(),
        }
    }

    /// Bid price: raw price plus one third, rounded to 8 decimal places
    pub fn bid_price_text(&self) -> String {
        match self {
            Pricing::Spot {
                raw_price: Some(price),
            } => {
                let bid = ((price + price / 3.0) * 1e8).round() / 1e8;
                format!("{}", bid)
            }
            _ => UNDEFINED.to_string(),
        }
    }
}

/// Which shared file systems are enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageFeatures {
    pub external_nfs: bool,
    pub efs: bool,
    pub fsx: bool,
}

/// Shared block storage settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EbsSettings {
    pub shared_dir: String,
    pub volume_size: u32,
    pub volume_type: VolumeType,
    pub encryption: bool,
}

/// Shared file system settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedStorage {
    pub features: StorageFeatures,
    /// Server address, or `FEATURE_DISABLED`
    pub external_nfs_server: String,
    pub efs_encryption: bool,
    pub efs_performance_mode: EfsPerformanceMode,
    pub fsx_size: u32,
}

/// Performance test settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerfTests {
    pub enabled: bool,
    pub start: u32,
    pub step: u32,
    pub total: u32,
}

/// Instance type and root volume size for one node role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub instance_type: String,
    pub root_volume_size: u32,
}

/// Validated cluster parameters.
///
/// Only the validator constructs this; everything downstream reads it by
/// reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedParams {
    pub zone: Zone,
    pub network: NetworkContext,
    pub owner_email: String,
    pub department: String,
    pub project_id: String,
    pub prod_level: ProdLevel,
    pub lifetime: Lifetime,
    pub base_os: BaseOs,
    pub custom_ami: Option<String>,
    pub master: NodeSpec,
    pub compute: NodeSpec,
    pub hyperthreading: bool,
    pub placement_group: PlacementGroup,
    pub scheduler: SchedulerConfig,
    pub scaledown_idletime: u32,
    pub pricing: Pricing,
    pub ebs: EbsSettings,
    pub storage: SharedStorage,
    /// Bucket staged into the Lustre file system, when data staging is on
    pub staging_bucket: Option<String>,
    pub perftests: PerfTests,
    pub ganglia: bool,
}

impl ValidatedParams {
    pub fn is_batch(&self) -> bool {
        matches!(self.scheduler, SchedulerConfig::Batch { .. })
    }
}

/// Validated jump-host parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedJumphost {
    pub zone: Zone,
    pub network: NetworkContext,
    pub owner_email: String,
    pub department: String,
    pub project_id: String,
    pub security_group: String,
    pub security_group_id: String,
    pub image_id: String,
    pub base_os: String,
    pub instance_type: String,
    pub root_volume_size: u32,
    pub volume_type: VolumeType,
}

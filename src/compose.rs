//! Fragment Composer
//!
//! Builds the configuration document the orchestration engine consumes. A
//! document is an ordered list of fragments; each fragment is a template
//! rendered in one `${name}` substitution pass over a sorted variable map, so
//! identical input always yields byte-identical output.
//!
//! Shared storage is chosen from an explicit decision table indexed by the
//! three storage features. Every row lists its fragments and its package
//! root; nothing is decided by chained conditionals.

use crate::error::StackError;
use crate::identity::{StackIdentity, StackKind};
use crate::naming::{bucket_name, resource_name, ResourceSlot};
use crate::params::{
    Choice, Pricing, SchedulerConfig, StorageFeatures, ValidatedParams, FEATURE_DISABLED,
};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

pub mod jumphost;
mod templates;

pub use jumphost::{compose_jumphost, ToolVersions};

/// Placeholder values, sorted by name
pub type Vars = BTreeMap<&'static str, String>;

/// Substitute every `${name}` in `template`.
///
/// Substituted values are not scanned again. `{{ ... }}` is left alone.
pub fn render(template: &str, vars: &Vars) -> Result<String, StackError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| {
            StackError::Template(format!(
                "unclosed placeholder: ${{{}",
                after.lines().next().unwrap_or("")
            ))
        })?;
        let name = &after[..end];
        let value = vars
            .get(name)
            .ok_or_else(|| StackError::Template(format!("unknown placeholder ${{{}}}", name)))?;
        out.push_str(value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Where shared software packages are installed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageRoot {
    Fsx,
    Efs,
    ExternalNfs,
    Ebs,
}

impl PackageRoot {
    /// Lustre, then EFS, then external NFS, then the shared EBS volume.
    pub fn select(features: StorageFeatures) -> Self {
        if features.fsx {
            PackageRoot::Fsx
        } else if features.efs {
            PackageRoot::Efs
        } else if features.external_nfs {
            PackageRoot::ExternalNfs
        } else {
            PackageRoot::Ebs
        }
    }
}

/// Every fragment a document can contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentId {
    Header,
    Instances,
    Networking,
    BatchScheduler,
    QueueScheduler,
    SgeParallelEnv,
    BatchSpotPricing,
    QueueSpotPricing,
    Paths,
    IdentityResources,
    Services,
    BlockStorage,
    Efs,
    ExternalNfs,
    Fsx,
    EbsPerformance,
    PackageRoot(PackageRoot),
    JumphostHeader,
    JumphostTools,
    JumphostTopic,
    JumphostIdentity,
    JumphostKeyPair,
    JumphostInstance,
    JumphostBlockStorage,
    JumphostNetworking,
    JumphostPaths,
}

impl FragmentId {
    pub fn template(&self) -> &'static str {
        use templates::*;
        match self {
            FragmentId::Header => CLUSTER_HEADER,
            FragmentId::Instances => INSTANCES,
            FragmentId::Networking => NETWORKING,
            FragmentId::BatchScheduler => BATCH_SCHEDULER,
            FragmentId::QueueScheduler => QUEUE_SCHEDULER,
            FragmentId::SgeParallelEnv => SGE_PARALLEL_ENV,
            FragmentId::BatchSpotPricing => BATCH_SPOT_PRICING,
            FragmentId::QueueSpotPricing => QUEUE_SPOT_PRICING,
            FragmentId::Paths => PATHS,
            FragmentId::IdentityResources => IDENTITY_RESOURCES,
            FragmentId::Services => SERVICES,
            FragmentId::BlockStorage => BLOCK_STORAGE,
            FragmentId::Efs => EFS,
            FragmentId::ExternalNfs => EXTERNAL_NFS,
            FragmentId::Fsx => FSX,
            FragmentId::EbsPerformance => EBS_PERFORMANCE,
            FragmentId::PackageRoot(PackageRoot::Fsx) => PACKAGE_ROOT_FSX,
            FragmentId::PackageRoot(PackageRoot::Efs) => PACKAGE_ROOT_EFS,
            FragmentId::PackageRoot(PackageRoot::ExternalNfs) => PACKAGE_ROOT_NFS,
            FragmentId::PackageRoot(PackageRoot::Ebs) => PACKAGE_ROOT_EBS,
            FragmentId::JumphostHeader => JUMPHOST_HEADER,
            FragmentId::JumphostTools => JUMPHOST_TOOLS,
            FragmentId::JumphostTopic => JUMPHOST_TOPIC,
            FragmentId::JumphostIdentity => JUMPHOST_IDENTITY,
            FragmentId::JumphostKeyPair => JUMPHOST_KEY_PAIR,
            FragmentId::JumphostInstance => JUMPHOST_INSTANCE,
            FragmentId::JumphostBlockStorage => JUMPHOST_BLOCK_STORAGE,
            FragmentId::JumphostNetworking => JUMPHOST_NETWORKING,
            FragmentId::JumphostPaths => JUMPHOST_PATHS,
        }
    }
}

/// One row of the shared-storage decision table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageRow {
    pub features: StorageFeatures,
    pub fragments: &'static [FragmentId],
    pub package_root: PackageRoot,
}

const fn features(external_nfs: bool, efs: bool, fsx: bool) -> StorageFeatures {
    StorageFeatures {
        external_nfs,
        efs,
        fsx,
    }
}

/// Indexed by `external_nfs << 2 | efs << 1 | fsx`.
pub static STORAGE_TABLE: [StorageRow; 8] = [
    StorageRow {
        features: features(false, false, false),
        fragments: &[FragmentId::EbsPerformance],
        package_root: PackageRoot::Ebs,
    },
    StorageRow {
        features: features(false, false, true),
        fragments: &[FragmentId::Fsx, FragmentId::EbsPerformance],
        package_root: PackageRoot::Fsx,
    },
    StorageRow {
        features: features(false, true, false),
        fragments: &[FragmentId::Efs, FragmentId::EbsPerformance],
        package_root: PackageRoot::Efs,
    },
    StorageRow {
        features: features(false, true, true),
        fragments: &[FragmentId::Efs, FragmentId::Fsx, FragmentId::EbsPerformance],
        package_root: PackageRoot::Fsx,
    },
    StorageRow {
        features: features(true, false, false),
        fragments: &[FragmentId::ExternalNfs, FragmentId::EbsPerformance],
        package_root: PackageRoot::ExternalNfs,
    },
    StorageRow {
        features: features(true, false, true),
        fragments: &[FragmentId::ExternalNfs, FragmentId::Fsx, FragmentId::EbsPerformance],
        package_root: PackageRoot::Fsx,
    },
    StorageRow {
        features: features(true, true, false),
        fragments: &[FragmentId::Efs, FragmentId::ExternalNfs, FragmentId::EbsPerformance],
        package_root: PackageRoot::Efs,
    },
    StorageRow {
        features: features(true, true, true),
        fragments: &[
            FragmentId::Efs,
            FragmentId::ExternalNfs,
            FragmentId::Fsx,
            FragmentId::EbsPerformance,
        ],
        package_root: PackageRoot::Fsx,
    },
];

/// The one table row matching `features`.
pub fn storage_row(features: StorageFeatures) -> &'static StorageRow {
    let index = (usize::from(features.external_nfs) << 2)
        | (usize::from(features.efs) << 1)
        | usize::from(features.fsx);
    &STORAGE_TABLE[index]
}

/// Fragment order for a cluster document
pub fn cluster_fragments(params: &ValidatedParams) -> Vec<FragmentId> {
    let mut ids = vec![
        FragmentId::Header,
        FragmentId::Instances,
        FragmentId::Networking,
    ];

    match &params.scheduler {
        SchedulerConfig::Batch { .. } => ids.push(FragmentId::BatchScheduler),
        SchedulerConfig::Queue { sge_pe, .. } => {
            ids.push(FragmentId::QueueScheduler);
            if sge_pe.is_some() {
                ids.push(FragmentId::SgeParallelEnv);
            }
        }
    }

    if let Pricing::Spot { .. } = params.pricing {
        ids.push(if params.is_batch() {
            FragmentId::BatchSpotPricing
        } else {
            FragmentId::QueueSpotPricing
        });
    }

    ids.extend([
        FragmentId::Paths,
        FragmentId::IdentityResources,
        FragmentId::Services,
        FragmentId::BlockStorage,
    ]);

    let row = storage_row(params.storage.features);
    ids.extend_from_slice(row.fragments);
    ids.push(FragmentId::PackageRoot(row.package_root));
    ids
}

/// A rendered fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub id: FragmentId,
    pub text: String,
}

/// The composed configuration document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationDocument {
    fragments: Vec<Fragment>,
}

impl ConfigurationDocument {
    /// Render `ids` in order against `vars`.
    pub fn render(ids: &[FragmentId], vars: &Vars) -> Result<Self, StackError> {
        let fragments = ids
            .iter()
            .map(|id| {
                render(id.template(), vars)
                    .map(|text| Fragment { id: *id, text })
                    .map_err(|e| match e {
                        StackError::Template(msg) => {
                            StackError::Template(format!("{:?} fragment: {}", id, msg))
                        }
                        other => other,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { fragments })
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn fragment_ids(&self) -> Vec<FragmentId> {
        self.fragments.iter().map(|f| f.id).collect()
    }

    pub fn contains(&self, id: FragmentId) -> bool {
        self.fragments.iter().any(|f| f.id == id)
    }

    pub fn to_text(&self) -> String {
        self.fragments.iter().map(|f| f.text.as_str()).collect()
    }

    fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fragments
            .iter()
            .flat_map(|f| f.text.lines())
            .filter(|line| !line.starts_with('#') && !line.starts_with(' '))
            .filter_map(|line| line.split_once(": "))
    }

    /// Value of the first `key: value` entry, without surrounding quotes.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.trim().trim_matches('"'))
    }

    /// Keys in document order
    pub fn keys(&self) -> Vec<&str> {
        self.entries().map(|(k, _)| k).collect()
    }

    /// Persist the document. Fails if `path` already exists.
    pub fn write_new(&self, path: &Path) -> Result<(), StackError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(self.to_text().as_bytes())?;
        file.sync_all()?;
        info!(path = %path.display(), fragments = self.fragments.len(), "Wrote configuration document");
        Ok(())
    }
}

fn flag(value: bool) -> String {
    value.to_string()
}

fn cluster_vars(identity: &StackIdentity, params: &ValidatedParams) -> Vars {
    let serial = &identity.serial;
    let ec2_user = params.base_os.ec2_user();
    let features = params.storage.features;
    let mut vars = Vars::new();

    vars.insert("cluster_name", identity.stack_name.clone());
    vars.insert("deployed_on", identity.deployed_on());
    vars.insert("deployment_date", identity.deployment_date());
    vars.insert("cluster_owner", identity.owner.clone());
    vars.insert("cluster_owner_department", params.department.clone());
    vars.insert("cluster_owner_email", params.owner_email.clone());
    vars.insert("project_id", params.project_id.clone());
    vars.insert("prod_level", params.prod_level.as_str().to_string());
    vars.insert("serial_datestamp", serial.datestamp().to_string());
    vars.insert("cluster_serial_number", serial.to_string());
    vars.insert(
        "cluster_serial_number_file",
        format!("{}/{}.serial", StackKind::Cluster.serial_dir(), identity.stack_name),
    );

    vars.insert("base_os", params.base_os.as_str().to_string());
    vars.insert(
        "custom_ami",
        params.custom_ami.clone().unwrap_or_else(|| "NONE".to_string()),
    );
    vars.insert("master_instance_type", params.master.instance_type.clone());
    vars.insert("master_root_volume_size", params.master.root_volume_size.to_string());
    vars.insert("compute_instance_type", params.compute.instance_type.clone());
    vars.insert("compute_root_volume_size", params.compute.root_volume_size.to_string());
    vars.insert("hyperthreading", flag(params.hyperthreading));

    vars.insert("aws_account_id", params.network.account_id.clone());
    vars.insert("region", params.zone.region.clone());
    vars.insert("az", params.zone.az.clone());
    vars.insert("vpc_id", params.network.vpc_id.clone());
    vars.insert("vpc_name", params.network.vpc_name.clone());
    vars.insert("subnet_id", params.network.subnet_id.clone());
    vars.insert("ec2_user", ec2_user.to_string());
    vars.insert("ec2_user_home", format!("/home/{}", ec2_user));

    vars.insert("scheduler", params.scheduler.kind().as_str().to_string());
    match &params.scheduler {
        SchedulerConfig::Batch {
            min_vcpus,
            desired_vcpus,
            max_vcpus,
        } => {
            vars.insert("min_vcpus", min_vcpus.to_string());
            vars.insert("desired_vcpus", desired_vcpus.to_string());
            vars.insert("max_vcpus", max_vcpus.to_string());
        }
        SchedulerConfig::Queue {
            initial_queue_size,
            max_queue_size,
            maintain_initial_size,
            sge_pe,
            ..
        } => {
            vars.insert("initial_queue_size", initial_queue_size.to_string());
            vars.insert("max_queue_size", max_queue_size.to_string());
            vars.insert("maintain_initial_size", flag(*maintain_initial_size));
            if let Some((enabled, pe_type)) = sge_pe {
                vars.insert("enable_sge_pe", flag(*enabled));
                vars.insert("sge_pe_type", pe_type.as_str().to_string());
            }
        }
    }

    vars.insert("raw_spot_price", params.pricing.raw_price_text());
    vars.insert("spot_price", params.pricing.bid_price_text());
    vars.insert("cluster_lifetime", params.lifetime.to_string());
    vars.insert("cluster_type", params.pricing.model().as_str().to_string());
    vars.insert("placement_group", params.placement_group.as_str().to_string());
    vars.insert("scaledown_idletime", params.scaledown_idletime.to_string());

    vars.insert("ec2_iam_role", resource_name(ResourceSlot::ClusterInstanceRole, serial));
    vars.insert("ec2_iam_policy", resource_name(ResourceSlot::ClusterInstancePolicy, serial));
    vars.insert("serverless_ec2_iam_role", resource_name(ResourceSlot::TeardownRole, serial));
    vars.insert("serverless_ec2_iam_policy", resource_name(ResourceSlot::TeardownPolicy, serial));
    vars.insert("enable_fsx_hydration", flag(params.staging_bucket.is_some()));
    match &params.staging_bucket {
        Some(bucket) => {
            vars.insert(
                "fsx_hydration_iam_policy",
                resource_name(ResourceSlot::DataStagingPolicy, serial),
            );
            vars.insert("fsx_s3_bucketname", bucket.clone());
        }
        None => {
            vars.insert("fsx_hydration_iam_policy", FEATURE_DISABLED.to_string());
            vars.insert("fsx_s3_bucketname", FEATURE_DISABLED.to_string());
        }
    }

    vars.insert("s3_bucketname", bucket_name(identity));
    vars.insert("enable_hpc_performance_tests", flag(params.perftests.enabled));
    vars.insert("perftest_custom_start_number", params.perftests.start.to_string());
    vars.insert("perftest_custom_step_size", params.perftests.step.to_string());
    vars.insert("perftest_custom_total_tests", params.perftests.total.to_string());
    vars.insert("enable_ganglia", flag(params.ganglia));

    vars.insert("ebs_encryption", flag(params.ebs.encryption));
    vars.insert("ebs_shared_dir", params.ebs.shared_dir.clone());
    vars.insert("ebs_shared_volume_size", params.ebs.volume_size.to_string());
    vars.insert("ebs_shared_volume_type", params.ebs.volume_type.as_str().to_string());
    vars.insert("enable_efs", flag(features.efs));
    vars.insert("enable_external_nfs", flag(features.external_nfs));
    vars.insert("enable_fsx", flag(features.fsx));

    vars.insert("efs_encryption", flag(params.storage.efs_encryption));
    vars.insert(
        "efs_performance_mode",
        params.storage.efs_performance_mode.as_str().to_string(),
    );
    vars.insert("external_nfs_server", params.storage.external_nfs_server.clone());
    vars.insert("fsx_size", params.storage.fsx_size.to_string());

    vars
}

/// Compose the cluster configuration document.
pub fn compose(
    identity: &StackIdentity,
    params: &ValidatedParams,
) -> Result<ConfigurationDocument, StackError> {
    let ids = cluster_fragments(params);
    debug!(stack = %identity.stack_name, fragments = ?ids, "Composing cluster document");
    ConfigurationDocument::render(&ids, &cluster_vars(identity, params))
}

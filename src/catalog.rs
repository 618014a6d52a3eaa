//! Static catalogs: supported instance types by capability class, operating
//! system support table, and owner departments.

use serde::{Deserialize, Serialize};

/// Default master and compute instance type
pub const DEFAULT_INSTANCE_TYPE: &str = "c5.xlarge";

/// Placeholder instance type for the batch scheduler
pub const BATCH_INSTANCE_TYPE: &str = "optimal";

/// Capability class of an instance type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceClass {
    GeneralPurpose,
    ComputeOptimized,
    MemoryOptimized,
    StorageOptimized,
    Accelerated,
    Batch,
}

impl InstanceClass {
    pub const ALL: [InstanceClass; 6] = [
        InstanceClass::GeneralPurpose,
        InstanceClass::ComputeOptimized,
        InstanceClass::MemoryOptimized,
        InstanceClass::StorageOptimized,
        InstanceClass::Accelerated,
        InstanceClass::Batch,
    ];

    pub fn instance_types(&self) -> &'static [&'static str] {
        match self {
            InstanceClass::GeneralPurpose => GENERAL_PURPOSE,
            InstanceClass::ComputeOptimized => COMPUTE_OPTIMIZED,
            InstanceClass::MemoryOptimized => MEMORY_OPTIMIZED,
            InstanceClass::StorageOptimized => STORAGE_OPTIMIZED,
            InstanceClass::Accelerated => ACCELERATED,
            InstanceClass::Batch => &[BATCH_INSTANCE_TYPE],
        }
    }
}

const GENERAL_PURPOSE: &[&str] = &[
    "a1.medium", "a1.large", "a1.xlarge", "a1.2xlarge", "a1.4xlarge",
    "t2.nano", "t2.micro", "t2.small", "t2.medium", "t2.large", "t2.xlarge", "t2.2xlarge",
    "t3.nano", "t3.micro", "t3.small", "t3.medium", "t3.large", "t3.xlarge", "t3.2xlarge",
    "t3a.nano", "t3a.micro", "t3a.small", "t3a.medium", "t3a.large", "t3a.xlarge", "t3a.2xlarge",
    "m4.large", "m4.xlarge", "m4.2xlarge", "m4.4xlarge", "m4.10xlarge", "m4.16xlarge",
    "m5.large", "m5.xlarge", "m5.2xlarge", "m5.4xlarge", "m5.12xlarge", "m5.24xlarge",
    "m5d.large", "m5d.xlarge", "m5d.2xlarge", "m5d.4xlarge", "m5d.12xlarge", "m5d.24xlarge",
    "m5a.large", "m5a.xlarge", "m5a.2xlarge", "m5a.4xlarge", "m5a.12xlarge", "m5a.24xlarge",
    "m5ad.large", "m5ad.xlarge", "m5ad.2xlarge", "m5ad.4xlarge", "m5ad.12xlarge", "m5ad.24xlarge",
];

const COMPUTE_OPTIMIZED: &[&str] = &[
    "c4.large", "c4.xlarge", "c4.2xlarge", "c4.4xlarge", "c4.8xlarge",
    "c5.large", "c5.xlarge", "c5.2xlarge", "c5.4xlarge", "c5.9xlarge", "c5.18xlarge",
    "c5d.large", "c5d.xlarge", "c5d.2xlarge", "c5d.4xlarge", "c5d.9xlarge", "c5d.18xlarge",
    "c5n.large", "c5n.xlarge", "c5n.2xlarge", "c5n.4xlarge", "c5n.9xlarge", "c5n.18xlarge",
];

const MEMORY_OPTIMIZED: &[&str] = &[
    "r4.large", "r4.xlarge", "r4.2xlarge", "r4.4xlarge", "r4.8xlarge", "r4.16xlarge",
    "r5.large", "r5.xlarge", "r5.2xlarge", "r5.4xlarge", "r5.12xlarge", "r5.24xlarge",
    "r5d.large", "r5d.xlarge", "r5d.2xlarge", "r5d.4xlarge", "r5d.12xlarge", "r5d.24xlarge",
    "r5a.large", "r5a.xlarge", "r5a.2xlarge", "r5a.4xlarge", "r5a.12xlarge", "r5a.24xlarge",
    "r5ad.large", "r5ad.xlarge", "r5ad.2xlarge", "r5ad.4xlarge", "r5ad.12xlarge", "r5ad.24xlarge",
    "x1.16xlarge", "x1.32xlarge",
    "x1e.xlarge", "x1e.2xlarge", "x1e.4xlarge", "x1e.8xlarge", "x1e.16xlarge", "x1e.32xlarge",
    "u-6tb1.metal", "u-9tb1.metal", "u-12tb1.metal",
    "z1d.large", "z1d.xlarge", "z1d.2xlarge", "z1d.3xlarge", "z1d.6xlarge", "z1d.12xlarge",
];

const STORAGE_OPTIMIZED: &[&str] = &[
    "h1.2xlarge", "h1.4xlarge", "h1.8xlarge", "h1.16xlarge",
    "d2.xlarge", "d2.2xlarge", "d2.4xlarge", "d2.8xlarge",
    "i3.large", "i3.xlarge", "i3.2xlarge", "i3.4xlarge", "i3.8xlarge", "i3.16xlarge", "i3.metal",
    "i3en.large", "i3en.xlarge", "i3en.2xlarge", "i3en.3xlarge", "i3en.6xlarge", "i3en.12xlarge",
    "i3en.24xlarge",
];

const ACCELERATED: &[&str] = &[
    "f1.2xlarge", "f1.4xlarge", "f1.16xlarge",
    "g3s.xlarge", "g3.4xlarge", "g3.8xlarge", "g3.16xlarge",
    "p2.xlarge", "p2.8xlarge", "p2.16xlarge",
    "p3.2xlarge", "p3.8xlarge", "p3.16xlarge", "p3dn.24xlarge",
];

/// Capability class of a catalogued instance type
pub fn instance_class(instance_type: &str) -> Option<InstanceClass> {
    InstanceClass::ALL
        .into_iter()
        .find(|class| class.instance_types().contains(&instance_type))
}

/// Instance type prefixes each operating system cannot boot
pub fn unsupported_instance_prefixes(base_os: &str) -> &'static [&'static str] {
    match base_os {
        "centos6" => &[
            "t3", "m5", "a1.", "c5.", "f1.4xlarge", "g3s.xlarge", "p3", "r5", "x1e.", "z1d.",
            "h1.", "i3.metal", "i3en.",
        ],
        "centos7" => &[
            "m5.metal", "a1.", "p3dn.24xlarge", "r5d.24xlarge", "r5d.metal", "r5.metal", "x1e.",
            "h1.", "i3en.",
        ],
        "ubuntu1604" => &[
            "t1.", "t3a.", "m5a", "m5d.metal", "m5.metal", "m1.", "a1.", "c1.", "r5ad.",
            "r5d.24xlarge", "r5d.metal", "r5.metal", "m2.", "z1d.metal", "i3en.",
        ],
        _ => &[],
    }
}

/// Whether `base_os` can run `instance_type`
pub fn os_supports_instance(base_os: &str, instance_type: &str) -> bool {
    !unsupported_instance_prefixes(base_os)
        .iter()
        .any(|prefix| instance_type.starts_with(prefix))
}

/// Departments an owner may belong to
pub const DEPARTMENTS: &[&str] = &[
    "analytics",
    "clinical",
    "commercial",
    "compbio",
    "compchem",
    "datasci",
    "design",
    "development",
    "hpc",
    "imaging",
    "manufacturing",
    "medical",
    "modeling",
    "operations",
    "proteomics",
    "robotics",
    "qa",
    "research",
    "scicomp",
];

/// Largest EBS volume the provider accepts, in GB
pub const MAX_VOLUME_GB: i64 = 16_000;

/// Capacity quantum of the Lustre file system, in GB
pub const FSX_QUANTUM_GB: i64 = 3_600;

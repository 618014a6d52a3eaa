//! Parameter validation.
//!
//! Validation runs in five stages: numeric ranges, enumerated membership,
//! cross-field dependencies, mutually exclusive combinations, and external
//! references. Each stage reports every violation it finds; the first stage
//! with a violation stops the pipeline. Nothing here mutates state, and no
//! provider probe runs until the local stages have passed.

use crate::catalog::{
    instance_class, os_supports_instance, InstanceClass, BATCH_INSTANCE_TYPE, DEPARTMENTS,
    FSX_QUANTUM_GB, MAX_VOLUME_GB,
};
use crate::error::{ProviderError, StackError, ValidationError, ValidationErrors};
use crate::identity::StackKind;
use crate::naming::{resource_name_len, ResourceSlot};
use crate::params::{
    BaseOs, Choice, ConfigurationInput, EbsSettings, EfsPerformanceMode, JumphostInput, Lifetime,
    NodeSpec, PerfTests, PlacementGroup, Pricing, PricingModel, ProdLevel, SchedulerConfig,
    SchedulerKind, SgePeType, SharedStorage, StorageFeatures, ValidatedJumphost, ValidatedParams,
    VolumeType, Zone, FEATURE_DISABLED,
};
use crate::provider::ReferenceResolver;
use tracing::{debug, info};

/// Operating system of the jump host image
pub const JUMPHOST_BASE_OS: &str = "alinux2";
pub const JUMPHOST_INSTANCE_TYPE: &str = "t2.micro";
pub const JUMPHOST_ROOT_VOLUME_GB: u32 = 8;

/// Numeric fields after stage 1
#[derive(Debug, Clone, Copy)]
struct Sizes {
    master_root: u32,
    compute_root: u32,
    shared: u32,
    fsx: u32,
    initial_queue: u32,
    max_queue: u32,
    min_vcpus: u32,
    desired_vcpus: u32,
    max_vcpus: u32,
    scaledown: u32,
    perftests: (u32, u32, u32),
    lifetime: Lifetime,
}

/// Enumerated fields after stage 2
#[derive(Debug, Clone, Copy)]
struct Choices {
    base_os: BaseOs,
    prod_level: ProdLevel,
    pricing: PricingModel,
    placement_group: PlacementGroup,
    scheduler: SchedulerKind,
    sge_pe_type: SgePeType,
    volume_type: VolumeType,
    efs_mode: EfsPerformanceMode,
}

/// Cross-field results after stage 3
#[derive(Debug, Clone)]
struct Links {
    zone: Zone,
    compute_type: String,
    external_nfs_server: String,
    staging_bucket: Option<String>,
}

/// Validate cluster build parameters, resolving external references through
/// `resolver`.
pub fn validate(
    input: &ConfigurationInput,
    resolver: &dyn ReferenceResolver,
) -> Result<ValidatedParams, StackError> {
    let sizes = check_ranges(input)?;
    let choices = check_enumerations(input)?;
    let links = check_dependencies(input, &choices)?;
    check_combinations(input, &choices)?;

    resolve(resolver.zone(&links.zone), "availability zone", &links.zone.az)?;
    if let Some(ami) = &input.custom_ami {
        resolve(resolver.image(&links.zone, ami), "custom image", ami)?;
    }
    if let Some(bucket) = &links.staging_bucket {
        resolve(resolver.bucket(bucket), "staging bucket", bucket)?;
    }
    let network = resolve(resolver.network(&links.zone), "network context", &links.zone.az)?;

    let pricing = match choices.pricing {
        PricingModel::OnDemand => Pricing::OnDemand,
        PricingModel::Spot if choices.scheduler == SchedulerKind::AwsBatch => {
            Pricing::Spot { raw_price: None }
        }
        PricingModel::Spot => {
            let price = resolve(
                resolver.spot_price(&links.zone, &links.compute_type),
                "spot price",
                &links.compute_type,
            )?;
            debug!(instance_type = %links.compute_type, price, "Resolved spot price");
            Pricing::Spot {
                raw_price: Some(price),
            }
        }
    };

    let scheduler = match choices.scheduler {
        SchedulerKind::AwsBatch => SchedulerConfig::Batch {
            min_vcpus: sizes.min_vcpus,
            desired_vcpus: sizes.desired_vcpus,
            max_vcpus: sizes.max_vcpus,
        },
        kind => SchedulerConfig::Queue {
            kind,
            initial_queue_size: sizes.initial_queue,
            max_queue_size: sizes.max_queue,
            maintain_initial_size: input.maintain_initial_size,
            sge_pe: (kind == SchedulerKind::Sge).then_some((input.enable_sge_pe, choices.sge_pe_type)),
        },
    };

    info!(az = %links.zone.az, scheduler = %choices.scheduler, "Parameters validated");

    Ok(ValidatedParams {
        zone: links.zone,
        network,
        owner_email: input.owner_email.clone(),
        department: input.department.clone(),
        project_id: input.project_id.clone(),
        prod_level: choices.prod_level,
        lifetime: sizes.lifetime,
        base_os: choices.base_os,
        custom_ami: input.custom_ami.clone(),
        master: NodeSpec {
            instance_type: input.master_instance_type.clone(),
            root_volume_size: sizes.master_root,
        },
        compute: NodeSpec {
            instance_type: links.compute_type,
            root_volume_size: sizes.compute_root,
        },
        hyperthreading: input.hyperthreading,
        placement_group: choices.placement_group,
        scheduler,
        scaledown_idletime: sizes.scaledown,
        pricing,
        ebs: EbsSettings {
            shared_dir: input.ebs_shared_dir.clone(),
            volume_size: sizes.shared,
            volume_type: choices.volume_type,
            encryption: input.ebs_encryption,
        },
        storage: SharedStorage {
            features: StorageFeatures {
                external_nfs: input.enable_external_nfs,
                efs: input.enable_efs,
                fsx: input.enable_fsx,
            },
            external_nfs_server: links.external_nfs_server,
            efs_encryption: input.efs_encryption,
            efs_performance_mode: choices.efs_mode,
            fsx_size: sizes.fsx,
        },
        staging_bucket: links.staging_bucket,
        perftests: PerfTests {
            enabled: input.enable_hpc_performance_tests,
            start: sizes.perftests.0,
            step: sizes.perftests.1,
            total: sizes.perftests.2,
        },
        ganglia: input.enable_ganglia,
    })
}

/// Every resource name derived from `stack_name` must fit the cloud's limit
/// for its kind.
pub fn check_resource_names(kind: StackKind, stack_name: &str) -> Result<(), ValidationErrors> {
    let errors: Vec<ValidationError> = ResourceSlot::ALL
        .iter()
        .filter(|slot| slot.stack_kind() == kind)
        .filter_map(|slot| {
            let len = resource_name_len(*slot, stack_name);
            let max = slot.kind().max_name_len();
            (len > max).then(|| ValidationError::OutOfRange {
                field: "stack_name",
                value: stack_name.to_string(),
                constraint: format!(
                    "{} name would be {} characters, limit is {}",
                    slot.prefix().trim_end_matches('-'),
                    len,
                    max
                ),
            })
        })
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(errors))
    }
}

/// Validate jump host parameters and resolve its image and security group.
pub fn validate_jumphost(
    input: &JumphostInput,
    resolver: &dyn ReferenceResolver,
) -> Result<ValidatedJumphost, StackError> {
    let mut errors = Vec::new();
    if let Err(e) = check_email(&input.owner_email) {
        errors.push(e);
    }
    if let Err(e) = check_department(&input.department) {
        errors.push(e);
    }
    if input.security_group.trim().is_empty() {
        errors.push(ValidationError::Malformed {
            field: "security_group",
            value: input.security_group.clone(),
            reason: "must not be empty".to_string(),
        });
    }
    let zone = match Zone::parse(&input.az) {
        Ok(zone) => Some(zone),
        Err(e) => {
            errors.push(e);
            None
        }
    };
    let zone = match zone {
        Some(zone) if errors.is_empty() => zone,
        _ => return Err(ValidationErrors(errors).into()),
    };

    resolve(resolver.zone(&zone), "availability zone", &zone.az)?;
    let network = resolve(resolver.network(&zone), "network context", &zone.az)?;
    let image_id = resolve(
        resolver.base_image(&zone, JUMPHOST_BASE_OS),
        "base image",
        JUMPHOST_BASE_OS,
    )?;
    let security_group_id = resolve(
        resolver.security_group(&zone, &input.security_group),
        "security group",
        &input.security_group,
    )?;

    info!(az = %zone.az, image = %image_id, "Jump host parameters validated");

    Ok(ValidatedJumphost {
        zone,
        network,
        owner_email: input.owner_email.clone(),
        department: input.department.clone(),
        project_id: input.project_id.clone(),
        security_group: input.security_group.clone(),
        security_group_id,
        image_id,
        base_os: JUMPHOST_BASE_OS.to_string(),
        instance_type: JUMPHOST_INSTANCE_TYPE.to_string(),
        root_volume_size: JUMPHOST_ROOT_VOLUME_GB,
        volume_type: VolumeType::Gp2,
    })
}

fn resolve<T>(
    result: Result<T, ProviderError>,
    kind: &'static str,
    name: &str,
) -> Result<T, StackError> {
    result.map_err(|err| StackError::UnresolvedReference {
        kind,
        name: name.to_string(),
        reason: match err {
            ProviderError::NotFound(_) => "not found".to_string(),
            other => other.to_string(),
        },
    })
}

/// Collects range violations for one stage.
#[derive(Default)]
struct RangeCheck {
    errors: Vec<ValidationError>,
}

impl RangeCheck {
    /// Check `min <= value <= max`. The returned value is only meaningful
    /// when the stage passes.
    fn within(&mut self, field: &'static str, value: i64, min: i64, max: i64) -> u32 {
        debug!(field, value, "Checking range");
        if value < min || value > max {
            let constraint = if max == i64::from(u32::MAX) {
                format!("must be at least {}", min)
            } else {
                format!("must be between {} and {}", min, max)
            };
            self.errors.push(ValidationError::OutOfRange {
                field,
                value: value.to_string(),
                constraint,
            });
            return 0;
        }
        u32::try_from(value).unwrap_or(0)
    }

    fn order(&mut self, low: (&'static str, u32), high: (&'static str, u32)) {
        if low.1 > high.1 {
            self.errors.push(ValidationError::OutOfRange {
                field: low.0,
                value: low.1.to_string(),
                constraint: format!("must not exceed {} ({})", high.0, high.1),
            });
        }
    }

    fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    fn finish<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(ValidationErrors(self.errors))
        }
    }
}

const UNBOUNDED: i64 = u32::MAX as i64;

fn check_ranges(input: &ConfigurationInput) -> Result<Sizes, ValidationErrors> {
    let mut check = RangeCheck::default();

    let master_root = check.within("master_root_volume_size", input.master_root_volume_size, 1, MAX_VOLUME_GB);
    let compute_root = check.within("compute_root_volume_size", input.compute_root_volume_size, 1, MAX_VOLUME_GB);
    let shared = check.within("ebs_shared_volume_size", input.ebs_shared_volume_size, 1, MAX_VOLUME_GB);

    debug!(field = "fsx_size", value = input.fsx_size, "Checking range");
    let fsx = if input.fsx_size <= 0 || input.fsx_size % FSX_QUANTUM_GB != 0 || input.fsx_size > UNBOUNDED {
        check.push(ValidationError::OutOfRange {
            field: "fsx_size",
            value: input.fsx_size.to_string(),
            constraint: format!("must be a positive multiple of {}", FSX_QUANTUM_GB),
        });
        0
    } else {
        input.fsx_size as u32
    };

    let initial_queue = check.within("initial_queue_size", input.initial_queue_size, 0, UNBOUNDED);
    let max_queue = check.within("max_queue_size", input.max_queue_size, 1, UNBOUNDED);
    check.order(("initial_queue_size", initial_queue), ("max_queue_size", max_queue));

    let min_vcpus = check.within("min_vcpus", input.min_vcpus, 0, UNBOUNDED);
    let desired_vcpus = check.within("desired_vcpus", input.desired_vcpus, 0, UNBOUNDED);
    let max_vcpus = check.within("max_vcpus", input.max_vcpus, 0, UNBOUNDED);
    check.order(("min_vcpus", min_vcpus), ("desired_vcpus", desired_vcpus));
    check.order(("desired_vcpus", desired_vcpus), ("max_vcpus", max_vcpus));

    let scaledown = check.within("scaledown_idletime", input.scaledown_idletime, 1, UNBOUNDED);
    let perftests = (
        check.within("perftest_start", input.perftest_start, 1, UNBOUNDED),
        check.within("perftest_step", input.perftest_step, 1, UNBOUNDED),
        check.within("perftest_total", input.perftest_total, 1, UNBOUNDED),
    );

    let lifetime = match parse_lifetime(&input.cluster_lifetime) {
        Ok(lifetime) => lifetime,
        Err(e) => {
            check.push(e);
            Lifetime {
                days: 0,
                hours: 0,
                minutes: 0,
            }
        }
    };

    check.finish(Sizes {
        master_root,
        compute_root,
        shared,
        fsx,
        initial_queue,
        max_queue,
        min_vcpus,
        desired_vcpus,
        max_vcpus,
        scaledown,
        perftests,
        lifetime,
    })
}

/// Parse `days:hours:minutes`.
pub fn parse_lifetime(text: &str) -> Result<Lifetime, ValidationError> {
    let out_of_range = |constraint: &str| ValidationError::OutOfRange {
        field: "cluster_lifetime",
        value: text.to_string(),
        constraint: constraint.to_string(),
    };
    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() != 3 {
        return Err(out_of_range("must be days:hours:minutes"));
    }
    let mut numbers = [0u32; 3];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        *slot = part
            .trim()
            .parse()
            .map_err(|_| out_of_range("must be days:hours:minutes"))?;
    }
    let [days, hours, minutes] = numbers;
    if hours >= 24 || minutes >= 60 {
        return Err(out_of_range("hours must be below 24 and minutes below 60"));
    }
    if days == 0 && hours == 0 && minutes == 0 {
        return Err(out_of_range("must not be zero"));
    }
    Ok(Lifetime {
        days,
        hours,
        minutes,
    })
}

fn choice<T: Choice>(
    field: &'static str,
    value: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<T> {
    debug!(field, value, "Checking option");
    T::parse_for(field, value).map_err(|e| errors.push(e)).ok()
}

fn check_department(department: &str) -> Result<(), ValidationError> {
    if DEPARTMENTS.contains(&department) {
        Ok(())
    } else {
        Err(ValidationError::NotInCatalog {
            field: "department",
            value: department.to_string(),
            supported: DEPARTMENTS.join(", "),
        })
    }
}

fn check_instance_type(field: &'static str, value: &str) -> Result<(), ValidationError> {
    debug!(field, value, "Checking instance type");
    match instance_class(value) {
        Some(class) if class != InstanceClass::Batch => Ok(()),
        _ => Err(ValidationError::NotInCatalog {
            field,
            value: value.to_string(),
            supported: "see the instance type catalog".to_string(),
        }),
    }
}

fn check_enumerations(input: &ConfigurationInput) -> Result<Choices, ValidationErrors> {
    let mut errors = Vec::new();

    let base_os = choice::<BaseOs>("base_os", &input.base_os, &mut errors);
    let prod_level = choice::<ProdLevel>("prod_level", &input.prod_level, &mut errors);
    let pricing = choice::<PricingModel>("pricing", &input.pricing, &mut errors);
    let placement_group = choice::<PlacementGroup>("placement_group", &input.placement_group, &mut errors);
    let scheduler = choice::<SchedulerKind>("scheduler", &input.scheduler, &mut errors);
    let sge_pe_type = choice::<SgePeType>("sge_pe_type", &input.sge_pe_type, &mut errors);
    let volume_type = choice::<VolumeType>("ebs_shared_volume_type", &input.ebs_shared_volume_type, &mut errors);
    let efs_mode = choice::<EfsPerformanceMode>("efs_performance_mode", &input.efs_performance_mode, &mut errors);

    if let Err(e) = check_department(&input.department) {
        errors.push(e);
    }

    if let Err(e) = check_instance_type("master_instance_type", &input.master_instance_type) {
        errors.push(e);
    }
    let batch = scheduler == Some(SchedulerKind::AwsBatch);
    if !batch {
        if let Err(e) = check_instance_type("compute_instance_type", &input.compute_instance_type) {
            errors.push(e);
        }
    }

    if let Some(os) = base_os {
        let mut types = vec![input.master_instance_type.as_str()];
        if !batch {
            types.push(input.compute_instance_type.as_str());
        }
        for instance_type in types {
            if instance_class(instance_type).is_some() && !os_supports_instance(os.as_str(), instance_type) {
                errors.push(ValidationError::UnsupportedCombination(format!(
                    "base_os {} does not support instance type {}",
                    os, instance_type
                )));
            }
        }
    }

    match (
        base_os,
        prod_level,
        pricing,
        placement_group,
        scheduler,
        sge_pe_type,
        volume_type,
        efs_mode,
    ) {
        (
            Some(base_os),
            Some(prod_level),
            Some(pricing),
            Some(placement_group),
            Some(scheduler),
            Some(sge_pe_type),
            Some(volume_type),
            Some(efs_mode),
        ) if errors.is_empty() => Ok(Choices {
            base_os,
            prod_level,
            pricing,
            placement_group,
            scheduler,
            sge_pe_type,
            volume_type,
            efs_mode,
        }),
        _ => Err(ValidationErrors(errors)),
    }
}

fn check_email(email: &str) -> Result<(), ValidationError> {
    let malformed = |reason: &str| ValidationError::Malformed {
        field: "owner_email",
        value: email.to_string(),
        reason: reason.to_string(),
    };
    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| malformed("must be an e-mail address"))?;
    if local.is_empty() || domain.contains('@') || email.contains(char::is_whitespace) {
        return Err(malformed("must be an e-mail address"));
    }
    match domain.split_once('.') {
        Some((host, rest)) if !host.is_empty() && !rest.is_empty() && !domain.ends_with('.') => {
            Ok(())
        }
        _ => Err(malformed("e-mail domain must contain a dot")),
    }
}

fn check_dependencies(
    input: &ConfigurationInput,
    choices: &Choices,
) -> Result<Links, ValidationErrors> {
    let mut errors = Vec::new();

    let zone = Zone::parse(&input.az).map_err(|e| errors.push(e)).ok();

    let external_nfs_server = if input.enable_external_nfs {
        match input.external_nfs_server.as_deref().map(str::trim) {
            Some(server) if !server.is_empty() => server.to_string(),
            _ => {
                errors.push(ValidationError::MissingDependency {
                    field: "external_nfs_server",
                    required_by: "enable_external_nfs",
                });
                String::new()
            }
        }
    } else {
        if input.external_nfs_server.is_some() {
            debug!("External NFS disabled, ignoring the supplied server");
        }
        FEATURE_DISABLED.to_string()
    };

    let staging_bucket = if input.enable_data_staging {
        if !input.enable_fsx {
            errors.push(ValidationError::MissingDependency {
                field: "enable_fsx",
                required_by: "enable_data_staging",
            });
        }
        match input.staging_bucket.as_deref().map(str::trim) {
            Some(bucket) if !bucket.is_empty() => Some(bucket.to_string()),
            _ => {
                errors.push(ValidationError::MissingDependency {
                    field: "staging_bucket",
                    required_by: "enable_data_staging",
                });
                None
            }
        }
    } else {
        None
    };

    if !input.ebs_shared_dir.starts_with('/') {
        errors.push(ValidationError::Malformed {
            field: "ebs_shared_dir",
            value: input.ebs_shared_dir.clone(),
            reason: "must be an absolute path".to_string(),
        });
    }

    if let Err(e) = check_email(&input.owner_email) {
        errors.push(e);
    }

    let compute_type = if choices.scheduler == SchedulerKind::AwsBatch {
        if input.compute_instance_type != BATCH_INSTANCE_TYPE {
            debug!(
                requested = %input.compute_instance_type,
                "Batch scheduler selects compute instances itself"
            );
        }
        BATCH_INSTANCE_TYPE.to_string()
    } else {
        input.compute_instance_type.clone()
    };

    match zone {
        Some(zone) if errors.is_empty() => Ok(Links {
            zone,
            compute_type,
            external_nfs_server,
            staging_bucket,
        }),
        _ => Err(ValidationErrors(errors)),
    }
}

fn check_combinations(
    input: &ConfigurationInput,
    choices: &Choices,
) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();
    let batch = choices.scheduler == SchedulerKind::AwsBatch;

    if input.enable_fsx && choices.base_os == BaseOs::Ubuntu1604 && input.custom_ami.is_none() {
        errors.push(ValidationError::UnsupportedCombination(
            "Lustre on ubuntu1604 requires a custom image".to_string(),
        ));
    }
    if input.enable_fsx && batch {
        errors.push(ValidationError::UnsupportedCombination(
            "Lustre is not supported with the awsbatch scheduler".to_string(),
        ));
    }
    if choices.placement_group == PlacementGroup::Dynamic && batch {
        errors.push(ValidationError::UnsupportedCombination(
            "a DYNAMIC placement group is not supported with the awsbatch scheduler".to_string(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(errors))
    }
}

//! Provider backed by the `aws` command line client.
//!
//! Each call runs one `aws ... --output json` subprocess and decodes the
//! response with serde. Error codes in stderr are classified into
//! `ProviderError` variants so the provisioner can tell "not found" apart
//! from real failures.

use super::{CloudProvider, CreateOutput, ReferenceResolver, ResourceSpec};
use crate::error::ProviderError;
use crate::naming::{ManagedResource, ResourceKind};
use crate::params::{NetworkContext, Zone};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

/// `aws` CLI provider for one region
#[derive(Debug)]
pub struct AwsCli {
    binary: String,
    region: String,
    profile: Option<String>,
    account: Mutex<Option<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CallerIdentity {
    account: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KeyPairCreated {
    key_material: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TopicCreated {
    topic_arn: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AvailabilityZones {
    availability_zones: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Images {
    images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Image {
    image_id: String,
    #[serde(default)]
    creation_date: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Subnets {
    subnets: Vec<Subnet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Subnet {
    subnet_id: String,
    vpc_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Vpcs {
    vpcs: Vec<Vpc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Vpc {
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Tag {
    key: String,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SpotPriceHistory {
    spot_price_history: Vec<SpotPrice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SpotPrice {
    spot_price: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SecurityGroups {
    security_groups: Vec<SecurityGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SecurityGroup {
    group_id: String,
}

/// Map an `aws` CLI error message to a provider error.
pub fn classify(stderr: &str) -> ProviderError {
    let message = stderr.trim().to_string();
    let codes = |needles: &[&str]| needles.iter().any(|n| message.contains(n));
    if codes(&["NoSuchEntity", "NotFound", "Not Found", "(404)", "does not exist"]) {
        ProviderError::NotFound(message)
    } else if codes(&["EntityAlreadyExists", "AlreadyExists", "Duplicate"]) {
        ProviderError::AlreadyExists(message)
    } else if codes(&["AccessDenied", "UnauthorizedOperation", "AuthorizationError"]) {
        ProviderError::AccessDenied(message)
    } else if codes(&["Throttling", "RequestLimitExceeded", "TooManyRequests"]) {
        ProviderError::Throttled(message)
    } else if codes(&["MalformedPolicyDocument", "ValidationError", "InvalidParameter"]) {
        ProviderError::Malformed(message)
    } else {
        ProviderError::Other(message)
    }
}

impl AwsCli {
    pub fn new(binary: impl Into<String>, region: impl Into<String>, profile: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            region: region.into(),
            profile,
            account: Mutex::new(None),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .args(["--region", self.region.as_str(), "--output", "json"]);
        if let Some(profile) = &self.profile {
            command.args(["--profile", profile.as_str()]);
        }
        command
    }

    /// Run one call and return its raw stdout.
    fn call(&self, args: &[&str]) -> Result<String, ProviderError> {
        debug!(binary = %self.binary, args = ?args, "aws call");
        let output = self
            .command(args)
            .output()
            .map_err(|e| ProviderError::Other(format!("failed to run {}: {}", self.binary, e)))?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(classify(&String::from_utf8_lossy(&output.stderr)))
        }
    }

    fn call_json<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T, ProviderError> {
        let stdout = self.call(args)?;
        serde_json::from_str(&stdout)
            .map_err(|e| ProviderError::Other(format!("unexpected aws response: {}", e)))
    }

    fn account_id(&self) -> Result<String, ProviderError> {
        let mut cached = self.account.lock();
        if let Some(account) = cached.as_ref() {
            return Ok(account.clone());
        }
        let identity: CallerIdentity = self.call_json(&["sts", "get-caller-identity"])?;
        *cached = Some(identity.account.clone());
        Ok(identity.account)
    }

    fn topic_arn(&self, name: &str) -> Result<String, ProviderError> {
        Ok(format!(
            "arn:aws:sns:{}:{}:{}",
            self.region,
            self.account_id()?,
            name
        ))
    }

    /// Undo the first half of a two-step create after the second step failed.
    /// The second step's error is what the caller sees.
    fn compensate(&self, name: &str, undo: &[&str], cause: ProviderError) -> ProviderError {
        warn!(resource = name, error = %cause, "Create failed halfway, removing partial resource");
        if let Err(e) = self.call(undo) {
            warn!(resource = name, error = %e, "Failed to remove partial resource");
        }
        cause
    }

    fn parent<'a>(&self, resource: &'a ManagedResource) -> Result<&'a str, ProviderError> {
        resource
            .parent
            .as_deref()
            .ok_or_else(|| ProviderError::Malformed(format!("{} has no parent role", resource.name)))
    }
}

impl CloudProvider for AwsCli {
    fn describe(&self, resource: &ManagedResource) -> Result<(), ProviderError> {
        let name = resource.name.as_str();
        let outcome = match resource.kind {
            ResourceKind::Role => self.call(&["iam", "get-role", "--role-name", name]),
            ResourceKind::Policy => self.call(&[
                "iam",
                "get-role-policy",
                "--role-name",
                self.parent(resource)?,
                "--policy-name",
                name,
            ]),
            ResourceKind::InstanceProfile => self.call(&[
                "iam",
                "get-instance-profile",
                "--instance-profile-name",
                name,
            ]),
            ResourceKind::KeyPair => {
                self.call(&["ec2", "describe-key-pairs", "--key-names", name])
            }
            ResourceKind::Topic => {
                let arn = self.topic_arn(name)?;
                self.call(&["sns", "get-topic-attributes", "--topic-arn", &arn])
            }
        };
        outcome.map(|_| ())
    }

    fn create(
        &self,
        resource: &ManagedResource,
        spec: &ResourceSpec,
    ) -> Result<CreateOutput, ProviderError> {
        let name = resource.name.as_str();
        match spec {
            ResourceSpec::Role {
                trust_policy,
                description,
            } => {
                let document = trust_policy.to_string();
                self.call(&[
                    "iam",
                    "create-role",
                    "--role-name",
                    name,
                    "--assume-role-policy-document",
                    &document,
                    "--description",
                    description,
                ])?;
            }
            ResourceSpec::InlinePolicy { role, document } => {
                let document = document.to_string();
                self.call(&[
                    "iam",
                    "put-role-policy",
                    "--role-name",
                    role,
                    "--policy-name",
                    name,
                    "--policy-document",
                    &document,
                ])?;
            }
            ResourceSpec::InstanceProfile { role } => {
                self.call(&[
                    "iam",
                    "create-instance-profile",
                    "--instance-profile-name",
                    name,
                ])?;
                if let Err(e) = self.call(&[
                    "iam",
                    "add-role-to-instance-profile",
                    "--instance-profile-name",
                    name,
                    "--role-name",
                    role,
                ]) {
                    return Err(self.compensate(
                        name,
                        &["iam", "delete-instance-profile", "--instance-profile-name", name],
                        e,
                    ));
                }
            }
            ResourceSpec::KeyPair { .. } => {
                let created: KeyPairCreated =
                    self.call_json(&["ec2", "create-key-pair", "--key-name", name])?;
                return Ok(CreateOutput {
                    key_material: Some(created.key_material),
                });
            }
            ResourceSpec::Topic { subscriber } => {
                let created: TopicCreated = self.call_json(&["sns", "create-topic", "--name", name])?;
                if let Err(e) = self.call(&[
                    "sns",
                    "subscribe",
                    "--topic-arn",
                    &created.topic_arn,
                    "--protocol",
                    "email",
                    "--notification-endpoint",
                    subscriber,
                ]) {
                    return Err(self.compensate(
                        name,
                        &["sns", "delete-topic", "--topic-arn", &created.topic_arn],
                        e,
                    ));
                }
            }
        }
        Ok(CreateOutput::default())
    }

    fn delete(&self, resource: &ManagedResource) -> Result<(), ProviderError> {
        let name = resource.name.as_str();
        let outcome = match resource.kind {
            ResourceKind::Role => self.call(&["iam", "delete-role", "--role-name", name]),
            ResourceKind::Policy => self.call(&[
                "iam",
                "delete-role-policy",
                "--role-name",
                self.parent(resource)?,
                "--policy-name",
                name,
            ]),
            ResourceKind::InstanceProfile => {
                if let Some(role) = resource.parent.as_deref() {
                    match self.call(&[
                        "iam",
                        "remove-role-from-instance-profile",
                        "--instance-profile-name",
                        name,
                        "--role-name",
                        role,
                    ]) {
                        Err(e) if !e.is_not_found() => return Err(e),
                        _ => {}
                    }
                }
                self.call(&[
                    "iam",
                    "delete-instance-profile",
                    "--instance-profile-name",
                    name,
                ])
            }
            ResourceKind::KeyPair => self.call(&["ec2", "delete-key-pair", "--key-name", name]),
            ResourceKind::Topic => {
                let arn = self.topic_arn(name)?;
                self.call(&["sns", "delete-topic", "--topic-arn", &arn])
            }
        };
        outcome.map(|_| ())
    }

    fn upload(&self, bucket: &str, key: &str, file: &Path) -> Result<(), ProviderError> {
        let source = file.display().to_string();
        let target = format!("s3://{}/{}", bucket, key);
        self.call(&["s3", "cp", &source, &target]).map(|_| ())
    }
}

impl ReferenceResolver for AwsCli {
    fn zone(&self, zone: &Zone) -> Result<(), ProviderError> {
        let zones: AvailabilityZones = self.call_json(&[
            "ec2",
            "describe-availability-zones",
            "--zone-names",
            &zone.az,
        ])?;
        if zones.availability_zones.is_empty() {
            return Err(ProviderError::NotFound(zone.az.clone()));
        }
        Ok(())
    }

    fn image(&self, _zone: &Zone, image_id: &str) -> Result<(), ProviderError> {
        let images: Images = self.call_json(&["ec2", "describe-images", "--image-ids", image_id])?;
        if images.images.is_empty() {
            return Err(ProviderError::NotFound(image_id.to_string()));
        }
        Ok(())
    }

    fn bucket(&self, bucket: &str) -> Result<(), ProviderError> {
        self.call(&["s3api", "head-bucket", "--bucket", bucket])
            .map(|_| ())
    }

    fn network(&self, zone: &Zone) -> Result<NetworkContext, ProviderError> {
        let filter = format!("Name=availabilityZone,Values={}", zone.az);
        let subnets: Subnets =
            self.call_json(&["ec2", "describe-subnets", "--filters", &filter])?;
        let subnet = subnets
            .subnets
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::NotFound(format!("subnet in {}", zone.az)))?;

        let vpcs: Vpcs = self.call_json(&["ec2", "describe-vpcs", "--vpc-ids", &subnet.vpc_id])?;
        let vpc_name = vpcs
            .vpcs
            .iter()
            .flat_map(|vpc| vpc.tags.iter())
            .find(|tag| tag.key == "Name")
            .map(|tag| tag.value.clone())
            .unwrap_or_else(|| subnet.vpc_id.clone());

        Ok(NetworkContext {
            account_id: self.account_id()?,
            vpc_id: subnet.vpc_id,
            vpc_name,
            subnet_id: subnet.subnet_id,
        })
    }

    fn spot_price(&self, zone: &Zone, instance_type: &str) -> Result<f64, ProviderError> {
        let history: SpotPriceHistory = self.call_json(&[
            "ec2",
            "describe-spot-price-history",
            "--instance-types",
            instance_type,
            "--max-items",
            "1",
            "--product-descriptions",
            "Linux/UNIX (Amazon VPC)",
            "--availability-zone",
            &zone.az,
        ])?;
        let latest = history
            .spot_price_history
            .first()
            .ok_or_else(|| ProviderError::NotFound(format!("spot price for {}", instance_type)))?;
        latest
            .spot_price
            .parse()
            .map_err(|_| ProviderError::Other(format!("bad spot price {:?}", latest.spot_price)))
    }

    fn base_image(&self, _zone: &Zone, base_os: &str) -> Result<String, ProviderError> {
        let pattern = match base_os {
            "alinux2" => "amzn2-ami-hvm-*-x86_64-gp2",
            other => other,
        };
        let filter = format!("Name=name,Values={}", pattern);
        let images: Images = self.call_json(&[
            "ec2",
            "describe-images",
            "--owners",
            "amazon",
            "--filters",
            &filter,
        ])?;
        images
            .images
            .into_iter()
            .max_by(|a, b| a.creation_date.cmp(&b.creation_date))
            .map(|image| image.image_id)
            .ok_or_else(|| ProviderError::NotFound(format!("image for {}", base_os)))
    }

    fn security_group(&self, _zone: &Zone, group: &str) -> Result<String, ProviderError> {
        let filter = format!("Name=group-name,Values={}", group);
        let groups: SecurityGroups =
            self.call_json(&["ec2", "describe-security-groups", "--filters", &filter])?;
        groups
            .security_groups
            .into_iter()
            .next()
            .map(|g| g.group_id)
            .ok_or_else(|| ProviderError::NotFound(group.to_string()))
    }
}

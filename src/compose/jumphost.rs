//! Jump host document composition.

use super::{ConfigurationDocument, FragmentId, Vars};
use crate::error::StackError;
use crate::identity::{StackIdentity, StackKind};
use crate::naming::{resource_name, ResourceSlot};
use crate::params::{Choice, ValidatedJumphost};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Login account on the jump host image
const JUMPHOST_EC2_USER: &str = "ec2-user";

/// Versions of the local build tools, recorded in the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolVersions {
    pub ansible: String,
    pub terraform: String,
}

pub const JUMPHOST_FRAGMENTS: [FragmentId; 9] = [
    FragmentId::JumphostHeader,
    FragmentId::JumphostTools,
    FragmentId::JumphostTopic,
    FragmentId::JumphostIdentity,
    FragmentId::JumphostKeyPair,
    FragmentId::JumphostInstance,
    FragmentId::JumphostBlockStorage,
    FragmentId::JumphostNetworking,
    FragmentId::JumphostPaths,
];

/// ARN of the jump host alert topic, known before the topic exists.
pub fn topic_arn(identity: &StackIdentity, params: &ValidatedJumphost) -> String {
    format!(
        "arn:aws:sns:{}:{}:{}",
        params.zone.region,
        params.network.account_id,
        resource_name(ResourceSlot::JumphostTopic, &identity.serial)
    )
}

fn jumphost_vars(
    identity: &StackIdentity,
    params: &ValidatedJumphost,
    tools: &ToolVersions,
) -> Vars {
    let serial = &identity.serial;
    let stack = identity.stack_name.as_str();
    let mut vars = Vars::new();

    vars.insert("instance_name", stack.to_string());
    vars.insert("deployed_on", identity.deployed_on());
    vars.insert("deployment_date", identity.deployment_date());

    vars.insert("ansible_version", tools.ansible.clone());
    vars.insert("terraform_version", tools.terraform.clone());
    vars.insert("vars_file_path", format!("vars_files/{}.jumphost.yml", stack));
    vars.insert("sns_topic_arn", topic_arn(identity, params));

    vars.insert("iam_instance_policy", resource_name(ResourceSlot::JumphostPolicy, serial));
    vars.insert("iam_instance_profile", resource_name(ResourceSlot::JumphostProfile, serial));
    vars.insert("iam_instance_role", resource_name(ResourceSlot::JumphostRole, serial));
    vars.insert("ec2_keypair", resource_name(ResourceSlot::JumphostKeyPair, serial));

    vars.insert("aws_ami", params.image_id.clone());
    vars.insert("base_os", params.base_os.clone());
    vars.insert("ec2_instance_type", params.instance_type.clone());
    vars.insert("ec2_user", JUMPHOST_EC2_USER.to_string());
    vars.insert("instance_owner", identity.owner.clone());
    vars.insert("instance_owner_email", params.owner_email.clone());
    vars.insert("instance_owner_department", params.department.clone());
    vars.insert("project_id", params.project_id.clone());
    vars.insert("instance_serial_number", serial.to_string());
    vars.insert(
        "instance_serial_number_file",
        format!("{}/{}.serial", StackKind::Jumphost.serial_dir(), stack),
    );

    vars.insert("instance_root_volume_size", params.root_volume_size.to_string());
    vars.insert("ebs_volume_type", params.volume_type.as_str().to_string());

    vars.insert("az", params.zone.az.clone());
    vars.insert("region", params.zone.region.clone());
    vars.insert("security_group", params.security_group.clone());
    vars.insert("vpc_security_group_ids", params.security_group_id.clone());
    vars.insert("subnet_id", params.network.subnet_id.clone());
    vars.insert("vpc_id", params.network.vpc_id.clone());
    vars.insert("vpc_name", params.network.vpc_name.clone());
    vars
}

/// Compose the jump host document.
pub fn compose_jumphost(
    identity: &StackIdentity,
    params: &ValidatedJumphost,
    tools: &ToolVersions,
) -> Result<ConfigurationDocument, StackError> {
    debug!(stack = %identity.stack_name, "Composing jump host document");
    ConfigurationDocument::render(&JUMPHOST_FRAGMENTS, &jumphost_vars(identity, params, tools))
}

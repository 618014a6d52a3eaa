//! Fragment templates.
//!
//! `${name}` placeholders are filled by the renderer. `{{ name }}` expressions
//! belong to the playbooks and are copied through verbatim.

pub const CLUSTER_HEADER: &str = r#"################################################################################
# Name:         ${cluster_name}.yml
# Deployed On:  ${deployed_on}
# Purpose:      ParallelCluster configuration for cluster "${cluster_name}"
# Notes:        Automatically generated by clustermaker
################################################################################

# Metadata tags for cluster identification

cluster_owner: ${cluster_owner}
cluster_owner_department: ${cluster_owner_department}
cluster_owner_email: ${cluster_owner_email}
project_id: ${project_id}
prod_level: ${prod_level}
serial_datestamp: ${serial_datestamp}
cluster_serial_number: ${cluster_serial_number}
cluster_serial_number_file: ${cluster_serial_number_file}
DEPLOYMENT_DATE: ${deployment_date}
"#;

pub const INSTANCES: &str = r#"
# Master and Compute instance definitions

base_os: ${base_os}
custom_ami: ${custom_ami}
master_instance_type: ${master_instance_type}
master_root_volume_size: ${master_root_volume_size}
compute_instance_type: ${compute_instance_type}
compute_root_volume_size: ${compute_root_volume_size}
hyperthreading: ${hyperthreading}
"#;

pub const NETWORKING: &str = r#"
# AWS networking parameters

aws_account_id: ${aws_account_id}
region: ${region}
az: ${az}
vpc_id: ${vpc_id}
vpc_name: ${vpc_name}
subnet_id: ${subnet_id}

# EC2 instance parameters

ec2_keypair: "{{ cluster_name }}"
ec2_user: ${ec2_user}
ec2_user_home: ${ec2_user_home}
ec2_user_src: "{{ ec2_user_home }}/src"
"#;

pub const BATCH_SCHEDULER: &str = r#"
# Scheduler parameters for AWS Batch

scheduler: ${scheduler}
min_vcpus: ${min_vcpus}
desired_vcpus: ${desired_vcpus}
max_vcpus: ${max_vcpus}
"#;

pub const QUEUE_SCHEDULER: &str = r#"
# Scheduler parameters for SGE, Slurm, and Torque

scheduler: ${scheduler}
initial_queue_size: ${initial_queue_size}
maintain_initial_size: ${maintain_initial_size}
max_queue_size: ${max_queue_size}
"#;

pub const SGE_PARALLEL_ENV: &str = r#"
# SGE parallel environment parameters

enable_sge_pe: ${enable_sge_pe}
sge_pe_type: ${sge_pe_type}
"#;

pub const BATCH_SPOT_PRICING: &str = r#"
# Spot instance definitions

raw_spot_price: ${raw_spot_price}
spot_bid_percentage: 80
"#;

pub const QUEUE_SPOT_PRICING: &str = r#"
# Spot instance definitions

raw_spot_price: ${raw_spot_price}
spot_price: ${spot_price}
"#;

pub const PATHS: &str = r#"
# Critical directory paths

cluster_rootdir: "{{ local_workingdir }}"
cluster_data_dir: "{{ cluster_rootdir }}/cluster_data/{{ prod_level }}/{{ cluster_name }}"
cluster_template_dir: "{{ cluster_rootdir }}/templates"
stage_dir_parent: /tmp/_stagedir_clustermaker
stage_dir: "{{ stage_dir_parent }}/{{ cluster_name }}"
performance_rootdir: "{{ local_workingdir }}/performance"
performance_stage_dir: "{{ stage_dir_parent }}/{{ cluster_name }}/performance"
performance_template_dir: "{{ local_workingdir }}/performance/jinja2"
serverless_stage_dir: "{{ cluster_data_dir }}/serverless"
serverless_template_dir: "{{ local_workingdir }}/serverless/kill_pcluster"

# SNS templates

sns_build_summary_report_src: "{{ cluster_template_dir }}/sns_build_summary_report.j2"
sns_build_summary_report_dest: "{{ cluster_data_dir }}/sns_build_summary.{{ cluster_name }}.txt"
sns_efs_build_summary_report_src: "{{ cluster_template_dir }}/sns_efs_build_summary_report.j2"
sns_efs_build_summary_report_dest: "{{ cluster_data_dir }}/sns_efs_build_summary.{{ cluster_name }}.txt"
sns_fsx_build_summary_report_src: "{{ cluster_template_dir }}/sns_fsx_build_summary_report.j2"
sns_fsx_build_summary_report_dest: "{{ cluster_data_dir }}/sns_fsx_build_summary.{{ cluster_name }}.txt"
sns_destruction_summary_report_src: "{{ cluster_template_dir }}/sns_destruction_summary_report.j2"
sns_destruction_summary_report_dest: "{{ cluster_data_dir }}/sns_destruction_summary.{{ cluster_name }}.txt"

# User and environment configuration

spack_user: spack
spack_group: spack
ssh_keypair: "{{ cluster_data_dir }}/{{ ec2_keypair }}.pem"
ssh_known_hosts: ~/.ssh/known_hosts

# Cluster stack and autoscaling configuration

cluster_config_template: "{{ cluster_data_dir }}/config.{{ cluster_name }}"
cluster_config_dest: config.{{ cluster_name }}
cluster_config_template_orig: "{{ cluster_template_dir }}/config.pcluster.j2"
cluster_lifetime: "${cluster_lifetime}"
cluster_type: ${cluster_type}
placement_group: ${placement_group}
scaling_settings: custom
scaledown_idletime: ${scaledown_idletime}
"#;

pub const IDENTITY_RESOURCES: &str = r#"
# Identity and permission resources

ec2_iam_role: ${ec2_iam_role}
ec2_iam_policy: ${ec2_iam_policy}
serverless_ec2_iam_role: ${serverless_ec2_iam_role}
serverless_ec2_iam_policy: ${serverless_ec2_iam_policy}
enable_fsx_hydration: ${enable_fsx_hydration}
fsx_hydration_iam_policy: ${fsx_hydration_iam_policy}
fsx_s3_bucketname: ${fsx_s3_bucketname}
"#;

pub const SERVICES: &str = r#"
# S3 bucket-related configuration

s3_bucketname: ${s3_bucketname}
s3_script_path: cluster_scripts/{{ prod_level }}
s3_object_path: s3://{{ s3_bucketname }}/{{ s3_script_path }}
s3_cluster_data_dir: "cluster_data/{{ prod_level }}"
s3_url: https://s3.amazonaws.com/{{ s3_bucketname }}/cluster_scripts/{{ prod_level }}
s3_read_write_resource: arn:aws:s3:::{{ s3_bucketname }}

# Lambda stack termination function configuration

generate_cron_lifetime_string_src: "{{ cluster_template_dir }}/generate_cron_lifetime_string.j2"
generate_cron_lifetime_string_dest: "{{ cluster_data_dir }}/generate_cron_lifetime_string.{{ cluster_name }}.py"

# ParallelCluster preinstall and postinstall script configuration

preinstall_template_orig: "{{ cluster_template_dir }}/preinstall.j2"
preinstall_src: "{{ cluster_data_dir }}/preinstall.{{ cluster_name }}.sh"
preinstall_s3_dest: "{{ cluster_name }}-preinstall.sh"
postinstall_template_orig: "{{ cluster_template_dir }}/postinstall.j2"
postinstall_src: "{{ cluster_data_dir }}/postinstall.{{ cluster_name }}.sh"
postinstall_s3_dest: "{{ cluster_name }}-postinstall.sh"

# HPC performance test configuration

enable_hpc_performance_tests: ${enable_hpc_performance_tests}
perftest_custom_start_number: ${perftest_custom_start_number}
perftest_custom_step_size: ${perftest_custom_step_size}
perftest_custom_total_tests: ${perftest_custom_total_tests}
Axb_random_src: "{{ performance_rootdir }}"
Axb_random_dest: "{{ ec2_user_home }}/performance/{{ cluster_owner }}/{{ cluster_name }}"

# Ganglia support

enable_ganglia: ${enable_ganglia}
"#;

pub const BLOCK_STORAGE: &str = r#"
# EBS mount definitions

ebs_root: /shared
ebs_settings: custom
ebs_encryption: ${ebs_encryption}
ebs_shared_dir: ${ebs_shared_dir}
ebs_shared_volume_size: ${ebs_shared_volume_size}
ebs_shared_volume_type: ${ebs_shared_volume_type}
ebs_performance_dir: "{{ ebs_root }}/performance/{{ cluster_owner }}/{{ cluster_name }}"

# Supported shared storage options:
#   enable_efs ==> Elastic File System
#   enable_external_nfs ==> on-premises NFS server
#   enable_fsx ==> FSx for Lustre

enable_efs: ${enable_efs}
enable_external_nfs: ${enable_external_nfs}
enable_fsx: ${enable_fsx}
"#;

pub const EFS: &str = r#"
# EFS definitions

efs_root: /efs
efs_fs_pcluster: efs_pcluster_{{ cluster_name }}
efs_temp_dir: /tmp/efs/{{ cluster_name }}
efs_temp_file: "{{ efs_temp_dir }}/{{ efs_fs_pcluster }}.fsid"
efs_pkg_dir: "{{ efs_root }}/pkg"
efs_encryption: ${efs_encryption}
efs_performance_mode: ${efs_performance_mode}
efs_settings: customfs
efs_fs_performance: efs_performance_{{ cluster_name }}
efs_hpc_performance_dir: "{{ efs_root }}/performance/{{ cluster_owner }}/{{ cluster_name }}"
"#;

pub const EXTERNAL_NFS: &str = r#"
# External NFS definitions

external_nfs_server_root: /nfshpc
external_nfs_server: ${external_nfs_server}
external_nfs_pkg_dir: "{{ external_nfs_server_root }}/pkg"
external_nfs_hpc_performance_dir: "{{ external_nfs_server_root }}/performance/{{ cluster_owner }}/{{ cluster_name }}"
"#;

pub const FSX: &str = r#"
# FSx for Lustre definitions

fsx_size: ${fsx_size}
fsx_root: /fsx
fsx_pkg_dir: "{{ fsx_root }}/pkg"
fsx_temp_dir: /tmp/fsx/{{ cluster_name }}
fsx_dns_name_file: fsx_dns_name_{{ cluster_name }}.file
fsx_dns_name_object: fsx_dns_name_{{ cluster_name }}.s3
fsx_fsid_file: fsx_fsid_{{ cluster_name }}.file
fsx_fsid_object: fsx_fsid_{{ cluster_name }}.s3
fsx_create_fs_src: "{{ cluster_template_dir }}/create_fsx_fs.sh.j2"
fsx_create_fs_script: "{{ cluster_data_dir }}/create_fsx_fs.{{ cluster_name }}.sh"
fsx_create_fs_object: create_fsx_fs.{{ cluster_name }}.sh
fsx_delete_fs_src: "{{ cluster_template_dir }}/delete_fsx_fs.sh.j2"
fsx_delete_fs_script: "{{ cluster_data_dir }}/delete_fsx_fs.{{ cluster_name }}.sh"
fsx_delete_fs_object: delete_fsx_fs.{{ cluster_name }}.sh
fsx_hpc_performance_dir: "{{ fsx_root }}/performance/{{ cluster_owner }}/{{ cluster_name }}"
"#;

pub const EBS_PERFORMANCE: &str = r#"
# Shared EBS HPC performance definitions

ebs_hpc_performance_dir: "{{ ebs_shared_dir }}/performance/{{ cluster_owner }}/{{ cluster_name }}"
"#;

pub const PACKAGE_ROOT_FSX: &str = r#"
# Spack configuration for FSx for Lustre

pkg_dir: "{{ fsx_pkg_dir }}"
spack_root: "{{ fsx_pkg_dir }}/spack"
"#;

pub const PACKAGE_ROOT_EFS: &str = r#"
# Spack configuration for EFS

pkg_dir: "{{ efs_pkg_dir }}"
spack_root: "{{ efs_pkg_dir }}/spack"
"#;

pub const PACKAGE_ROOT_NFS: &str = r#"
# Spack configuration for external NFS

pkg_dir: /nfshpc/pkg
spack_root: /nfshpc/pkg/spack
"#;

pub const PACKAGE_ROOT_EBS: &str = r#"
# Spack configuration for shared EBS

pkg_dir: "{{ ebs_shared_dir }}/pkg"
spack_root: "{{ ebs_shared_dir }}/pkg/spack"
"#;

pub const JUMPHOST_HEADER: &str = r#"################################################################################
# Name:         ${instance_name}.yml
# Deployed On:  ${deployed_on}
# Purpose:      Build template for pcluster-jumphost
# Notes:        Automatically generated by clustermaker
################################################################################
"#;

pub const JUMPHOST_TOOLS: &str = r#"
# Build tool information

ansible_version: ${ansible_version}
terraform_version: ${terraform_version}
vars_file_path: ${vars_file_path}
"#;

pub const JUMPHOST_TOPIC: &str = r#"
# SNS topic

sns_arn: ${sns_topic_arn}
"#;

pub const JUMPHOST_IDENTITY: &str = r#"
# IAM parameters

iam_instance_policy: ${iam_instance_policy}
iam_instance_profile: ${iam_instance_profile}
iam_instance_role: ${iam_instance_role}
"#;

pub const JUMPHOST_KEY_PAIR: &str = r#"
# EC2 keypair management

ec2_keypair: ${ec2_keypair}
ssh_keypair_file: "{{ ec2_keypair }}.pem"
remove_pcluster_jumphost_data_dir: true
ssh_known_hosts: ~/.ssh/known_hosts
"#;

pub const JUMPHOST_INSTANCE: &str = r#"
# EC2 instance parameters

aws_ami: ${aws_ami}
base_os: ${base_os}
ec2_instance_type: ${ec2_instance_type}
ec2_user: ${ec2_user}
ec2_user_home: /home/${ec2_user}
ec2_user_src: "{{ ec2_user_home }}/src"
instance_owner: ${instance_owner}
instance_owner_email: ${instance_owner_email}
instance_owner_department: ${instance_owner_department}
project_id: ${project_id}
instance_serial_number: ${instance_serial_number}
instance_serial_number_file: ${instance_serial_number_file}
DEPLOYMENT_DATE: ${deployment_date}
"#;

pub const JUMPHOST_BLOCK_STORAGE: &str = r#"
# EBS

ebs_optimized: false
instance_root_volume_size: ${instance_root_volume_size}
ebs_volume_type: ${ebs_volume_type}
"#;

pub const JUMPHOST_NETWORKING: &str = r#"
# AWS networking

az: ${az}
region: ${region}
security_group: ${security_group}
vpc_security_group_ids: ${vpc_security_group_ids}
subnet_id: ${subnet_id}
vpc_id: ${vpc_id}
vpc_name: ${vpc_name}
provider: aws.{{ vpc_name }}
provider_tf_src: "{{ local_workingdir }}/templates/provider_aws.j2"
provider_tf_dest: provider_aws.tf
"#;

pub const JUMPHOST_PATHS: &str = r#"
# Template paths

access_pcluster_jumphost_src: "{{ local_workingdir }}/templates/access_jumphost.j2"
access_pcluster_jumphost_dest: access_jumphost.{{ instance_name }}.sh
build_pcluster_jumphost_src: "{{ local_workingdir }}/templates/build_pcluster_jumphost.j2"
build_pcluster_jumphost_script: build_pcluster_jumphost.{{ instance_name }}.sh
instance_data_dir: "{{ local_workingdir }}/pcluster_jumphost_data/{{ instance_name }}"
instance_userdata_src: "{{ local_workingdir }}/templates/instance_userdata.j2"
instance_userdata_script: instance_userdata.{{ instance_name }}.sh
kill_pcluster_jumphost_src: "{{ local_workingdir }}/templates/kill_pcluster_jumphost.j2"
kill_pcluster_jumphost_script: kill_pcluster_jumphost.{{ instance_name }}.sh
remove_pcluster_jumphost_data_dir_src: "{{ local_workingdir }}/templates/remove_pcluster_jumphost_data_dir.j2"
remove_pcluster_jumphost_data_dir_dest: remove_pcluster_jumphost_data_dir.{{ instance_name }}.sh
stage_dir_parent: /tmp/_stagedir_clustermaker_jumphost
stage_dir: "{{ stage_dir_parent }}/{{ instance_name }}"
tf_ec2_instance_src: "{{ local_workingdir }}/templates/DEFAULT_EC2_TEMPLATE.j2"
tf_ec2_instance_dest: "{{ instance_name }}.tf"
"#;

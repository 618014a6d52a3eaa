//! Trust and permission documents for the roles the engine creates.

use serde_json::{json, Value};

const POLICY_VERSION: &str = "2012-10-17";

/// Services allowed to assume a cluster instance role
pub const CLUSTER_TRUSTED_SERVICES: &[&str] = &["ec2.amazonaws.com"];

/// Services allowed to assume the scheduled teardown role
pub const TEARDOWN_TRUSTED_SERVICES: &[&str] = &["lambda.amazonaws.com"];

/// Services allowed to assume the jump host role
pub const JUMPHOST_TRUSTED_SERVICES: &[&str] = &[
    "batch.amazonaws.com",
    "ec2.amazonaws.com",
    "ecs-tasks.amazonaws.com",
    "spotfleet.amazonaws.com",
];

pub fn trust_policy(services: &[&str]) -> Value {
    json!({
        "Version": POLICY_VERSION,
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": services },
            "Action": "sts:AssumeRole"
        }]
    })
}

/// Permissions the cluster nodes need to run the scheduler and autoscaling.
pub fn cluster_instance_policy(region: &str, account_id: &str) -> Value {
    json!({
        "Version": POLICY_VERSION,
        "Statement": [
            {
                "Sid": "EC2",
                "Effect": "Allow",
                "Action": [
                    "ec2:DescribeVolumes",
                    "ec2:AttachVolume",
                    "ec2:DescribeInstanceAttribute",
                    "ec2:DescribeInstanceStatus",
                    "ec2:DescribeInstances",
                    "ec2:DescribeRegions"
                ],
                "Resource": "*"
            },
            {
                "Sid": "DynamoDBTable",
                "Effect": "Allow",
                "Action": ["dynamodb:PutItem", "dynamodb:Query", "dynamodb:GetItem", "dynamodb:DeleteItem", "dynamodb:DescribeTable"],
                "Resource": format!("arn:aws:dynamodb:{}:{}:table/parallelcluster-*", region, account_id)
            },
            {
                "Sid": "SQSQueue",
                "Effect": "Allow",
                "Action": ["sqs:ReceiveMessage", "sqs:ChangeMessageVisibility", "sqs:DeleteMessage", "sqs:GetQueueUrl"],
                "Resource": format!("arn:aws:sqs:{}:{}:parallelcluster-*", region, account_id)
            },
            {
                "Sid": "Autoscaling",
                "Effect": "Allow",
                "Action": [
                    "autoscaling:DescribeAutoScalingGroups",
                    "autoscaling:TerminateInstanceInAutoScalingGroup",
                    "autoscaling:SetDesiredCapacity",
                    "autoscaling:UpdateAutoScalingGroup",
                    "autoscaling:DescribeTags",
                    "autoscaling:SetInstanceHealth"
                ],
                "Resource": "*"
            },
            {
                "Sid": "CloudFormation",
                "Effect": "Allow",
                "Action": ["cloudformation:DescribeStacks", "cloudformation:DescribeStackResource"],
                "Resource": format!("arn:aws:cloudformation:{}:{}:stack/parallelcluster-*/*", region, account_id)
            },
            {
                "Sid": "S3GetObj",
                "Effect": "Allow",
                "Action": ["s3:GetObject", "s3:ListBucket", "s3:PutObject"],
                "Resource": ["arn:aws:s3:::parallelclustermaker-*", "arn:aws:s3:::parallelclustermaker-*/*"]
            },
            {
                "Sid": "SNSPublish",
                "Effect": "Allow",
                "Action": ["sns:Publish"],
                "Resource": format!("arn:aws:sns:{}:{}:*", region, account_id)
            }
        ]
    })
}

/// Permissions the scheduled teardown function needs to delete the stack.
pub fn teardown_policy(region: &str, account_id: &str) -> Value {
    json!({
        "Version": POLICY_VERSION,
        "Statement": [
            {
                "Sid": "Logs",
                "Effect": "Allow",
                "Action": ["logs:CreateLogGroup", "logs:CreateLogStream", "logs:PutLogEvents"],
                "Resource": format!("arn:aws:logs:{}:{}:*", region, account_id)
            },
            {
                "Sid": "DeleteStack",
                "Effect": "Allow",
                "Action": [
                    "cloudformation:DeleteStack",
                    "cloudformation:DescribeStacks",
                    "ec2:TerminateInstances",
                    "ec2:DescribeInstances",
                    "ec2:DeleteVolume",
                    "autoscaling:*",
                    "events:DeleteRule",
                    "events:RemoveTargets",
                    "lambda:DeleteFunction",
                    "lambda:RemovePermission",
                    "s3:DeleteBucket",
                    "s3:DeleteObject",
                    "s3:ListBucket"
                ],
                "Resource": "*"
            },
            {
                "Sid": "DeleteIdentity",
                "Effect": "Allow",
                "Action": ["iam:DeleteRole", "iam:DeleteRolePolicy", "iam:GetRole"],
                "Resource": format!("arn:aws:iam::{}:role/*pclustermaker-*", account_id)
            }
        ]
    })
}

/// Cross-account read/write access to the bucket staged into Lustre.
pub fn data_staging_policy(bucket: &str) -> Value {
    json!({
        "Version": POLICY_VERSION,
        "Statement": [{
            "Sid": "DataStaging",
            "Effect": "Allow",
            "Action": ["s3:GetObject", "s3:PutObject", "s3:ListBucket", "s3:GetBucketLocation"],
            "Resource": [format!("arn:aws:s3:::{}", bucket), format!("arn:aws:s3:::{}/*", bucket)]
        }]
    })
}

/// Permissions the jump host needs to build and destroy clusters.
pub fn jumphost_instance_policy() -> Value {
    json!({
        "Version": POLICY_VERSION,
        "Statement": [{
            "Sid": "ClusterMaker",
            "Effect": "Allow",
            "Action": [
                "cloudformation:*",
                "ec2:*",
                "autoscaling:*",
                "dynamodb:*",
                "sqs:*",
                "sns:*",
                "s3:*",
                "lambda:*",
                "events:*",
                "fsx:*",
                "elasticfilesystem:*",
                "batch:*",
                "logs:*",
                "iam:GetRole",
                "iam:CreateRole",
                "iam:DeleteRole",
                "iam:PutRolePolicy",
                "iam:DeleteRolePolicy",
                "iam:GetRolePolicy",
                "iam:PassRole",
                "iam:CreateInstanceProfile",
                "iam:DeleteInstanceProfile",
                "iam:AddRoleToInstanceProfile",
                "iam:RemoveRoleFromInstanceProfile",
                "iam:GetInstanceProfile",
                "sts:GetCallerIdentity"
            ],
            "Resource": "*"
        }]
    })
}

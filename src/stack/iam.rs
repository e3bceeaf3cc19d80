//! Execution and task identities for the Fargate task

use serde_json::{json, Value};

use super::template::{get_att, managed_policy_arn, reference, Resource, Template};

pub const EXECUTION_ROLE_ID: &str = "TaskExecutionRole";
pub const EXECUTION_POLICY_ID: &str = "TaskExecutionRoleDefaultPolicy";
pub const TASK_ROLE_ID: &str = "TaskRole";

const ECS_TASKS_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";
const POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone)]
pub struct Roles {
    /// Used by the platform: image pulls and log delivery
    pub execution: String,
    pub execution_policy: String,
    /// Assumed by the running container
    pub task: String,
}

fn assume_role_policy() -> Value {
    json!({
        "Statement": [{
            "Action": "sts:AssumeRole",
            "Effect": "Allow",
            "Principal": { "Service": ECS_TASKS_PRINCIPAL },
        }],
        "Version": POLICY_VERSION,
    })
}

pub fn declare(template: &mut Template, log_group: &str) -> Roles {
    let execution = template.add(
        EXECUTION_ROLE_ID,
        Resource::new("AWS::IAM::Role")
            .property("AssumeRolePolicyDocument", assume_role_policy())
            .property(
                "ManagedPolicyArns",
                vec![managed_policy_arn("service-role/AmazonECSTaskExecutionRolePolicy")],
            ),
    );

    // Log delivery into the stack's own log group
    let execution_policy = template.add(
        EXECUTION_POLICY_ID,
        Resource::new("AWS::IAM::Policy")
            .property("PolicyName", EXECUTION_POLICY_ID)
            .property("Roles", vec![reference(&execution)])
            .property(
                "PolicyDocument",
                json!({
                    "Statement": [{
                        "Action": ["logs:CreateLogStream", "logs:PutLogEvents"],
                        "Effect": "Allow",
                        "Resource": get_att(log_group, "Arn"),
                    }],
                    "Version": POLICY_VERSION,
                }),
            ),
    );

    let task = template.add(
        TASK_ROLE_ID,
        Resource::new("AWS::IAM::Role")
            .property("AssumeRolePolicyDocument", assume_role_policy())
            .property(
                "ManagedPolicyArns",
                vec![managed_policy_arn("CloudWatchLogsFullAccess")],
            ),
    );

    Roles {
        execution,
        execution_policy,
        task,
    }
}

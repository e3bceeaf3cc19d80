//! ECS cluster, Fargate task definition and service

use serde_json::{json, Value};

use super::iam::Roles;
use super::load_balancer::LoadBalancer;
use super::network::Network;
use super::security::{group_id, SecurityGroups};
use super::settings::StackSettings;
use super::template::{get_att, pseudo, reference, Resource, Template};

pub const CLUSTER_ID: &str = "Cluster";
pub const TASK_DEFINITION_ID: &str = "TaskDefinition";
pub const SERVICE_ID: &str = "Service";
pub const CONTAINER_NAME: &str = "DemoAppContainer";

/// Grace period before load balancer health checks count against a new task
const HEALTH_CHECK_GRACE_SECS: u32 = 60;

/// Wiring the compute resources need from the rest of the stack
pub struct ComputeInputs<'a> {
    pub network: &'a Network,
    pub security: &'a SecurityGroups,
    pub roles: &'a Roles,
    pub log_group: &'a str,
    pub load_balancer: &'a LoadBalancer,
}

fn container_definition(settings: &StackSettings, log_group: &str) -> Value {
    json!({
        "Essential": true,
        "Image": settings.container_image,
        "LogConfiguration": {
            "LogDriver": "awslogs",
            "Options": {
                "awslogs-group": reference(log_group),
                "awslogs-region": reference(pseudo::REGION),
                "awslogs-stream-prefix": settings.log_stream_prefix,
            },
        },
        "Name": CONTAINER_NAME,
        "PortMappings": [{ "ContainerPort": settings.container_port, "Protocol": "tcp" }],
    })
}

pub fn declare(
    template: &mut Template,
    stack_name: &str,
    inputs: &ComputeInputs<'_>,
    settings: &StackSettings,
) {
    let cluster = template.add(CLUSTER_ID, Resource::new("AWS::ECS::Cluster"));

    let task_definition = template.add(
        TASK_DEFINITION_ID,
        Resource::new("AWS::ECS::TaskDefinition")
            .property("Family", format!("{stack_name}TaskDefinition"))
            .property("Cpu", settings.cpu.to_string())
            .property("Memory", settings.memory_mib.to_string())
            .property("NetworkMode", "awsvpc")
            .property("RequiresCompatibilities", vec!["FARGATE"])
            .property("ExecutionRoleArn", get_att(&inputs.roles.execution, "Arn"))
            .property("TaskRoleArn", get_att(&inputs.roles.task, "Arn"))
            .property(
                "ContainerDefinitions",
                vec![container_definition(settings, inputs.log_group)],
            ),
    );

    template.add(
        SERVICE_ID,
        Resource::new("AWS::ECS::Service")
            .property("Cluster", reference(&cluster))
            .property("TaskDefinition", reference(&task_definition))
            .property("LaunchType", "FARGATE")
            .property("DesiredCount", settings.desired_count)
            .property(
                "DeploymentConfiguration",
                json!({ "MaximumPercent": 200, "MinimumHealthyPercent": 50 }),
            )
            .property("EnableECSManagedTags", false)
            .property("HealthCheckGracePeriodSeconds", HEALTH_CHECK_GRACE_SECS)
            .property(
                "NetworkConfiguration",
                json!({
                    "AwsvpcConfiguration": {
                        "AssignPublicIp": "ENABLED",
                        "SecurityGroups": [group_id(&inputs.security.service)],
                        "Subnets": inputs.network.subnet_refs(),
                    },
                }),
            )
            .property(
                "LoadBalancers",
                json!([{
                    "ContainerName": CONTAINER_NAME,
                    "ContainerPort": settings.container_port,
                    "TargetGroupArn": reference(&inputs.load_balancer.target_group),
                }]),
            )
            // Target group must be attached to a listener before registration
            .depends_on(&inputs.load_balancer.listener)
            .depends_on(&inputs.roles.task)
            .depends_on(&inputs.roles.execution_policy),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::template::RemovalPolicy;
    use crate::stack::{iam, load_balancer, logs, network, security};

    fn declared(settings: &StackSettings) -> Template {
        let mut template = Template::new(None);
        let network = network::declare(&mut template, "Demo", settings).unwrap();
        let security = security::declare(&mut template, &network, settings);
        let log_group = logs::declare(&mut template, settings);
        let roles = iam::declare(&mut template, &log_group);
        let load_balancer = load_balancer::declare(&mut template, &network, &security, settings);
        declare(
            &mut template,
            "Demo",
            &ComputeInputs {
                network: &network,
                security: &security,
                roles: &roles,
                log_group: &log_group,
                load_balancer: &load_balancer,
            },
            settings,
        );
        template
    }

    #[test]
    fn test_task_definition_shape() {
        let template = declared(&StackSettings::default());
        let task = &template.resource(TASK_DEFINITION_ID).unwrap().properties;
        assert_eq!(task["Family"], "DemoTaskDefinition");
        assert_eq!(task["Cpu"], "256");
        assert_eq!(task["Memory"], "512");
        assert_eq!(task["NetworkMode"], "awsvpc");
        assert_eq!(task["RequiresCompatibilities"][0], "FARGATE");
        assert_eq!(task["ExecutionRoleArn"], get_att(iam::EXECUTION_ROLE_ID, "Arn"));
        assert_eq!(task["TaskRoleArn"], get_att(iam::TASK_ROLE_ID, "Arn"));

        let container = &task["ContainerDefinitions"][0];
        assert_eq!(container["Name"], CONTAINER_NAME);
        assert_eq!(container["Essential"], true);
        assert_eq!(container["Image"], "nginx:latest");
        assert_eq!(container["PortMappings"][0]["ContainerPort"], 80);
        let log_options = &container["LogConfiguration"]["Options"];
        assert_eq!(log_options["awslogs-group"], reference(logs::LOG_GROUP_ID));
        assert_eq!(log_options["awslogs-stream-prefix"], "cdk-demo-app");

        let log_group = template.resource(logs::LOG_GROUP_ID).unwrap();
        assert_eq!(log_group.properties["LogGroupName"], "/ecs/cdk-demo-app");
        assert_eq!(log_group.properties["RetentionInDays"], 7);
        assert_eq!(log_group.deletion_policy, Some(RemovalPolicy::Retain));
    }

    #[test]
    fn test_service_wiring() {
        let template = declared(&StackSettings::default());
        let service = template.resource(SERVICE_ID).unwrap();
        for dependency in [
            load_balancer::LISTENER_ID,
            iam::TASK_ROLE_ID,
            iam::EXECUTION_POLICY_ID,
        ] {
            assert!(service.depends_on.contains(&dependency.to_string()));
        }

        let props = &service.properties;
        assert_eq!(props["Cluster"], reference(CLUSTER_ID));
        assert_eq!(props["LaunchType"], "FARGATE");
        assert_eq!(props["DesiredCount"], 1);
        let awsvpc = &props["NetworkConfiguration"]["AwsvpcConfiguration"];
        assert_eq!(awsvpc["AssignPublicIp"], "ENABLED");
        assert_eq!(awsvpc["SecurityGroups"][0], group_id(security::SERVICE_GROUP_ID));
        assert_eq!(awsvpc["Subnets"].as_array().unwrap().len(), 2);
        assert_eq!(
            props["LoadBalancers"][0]["TargetGroupArn"],
            reference(load_balancer::TARGET_GROUP_ID)
        );
        assert_eq!(props["LoadBalancers"][0]["ContainerName"], CONTAINER_NAME);
    }

    #[test]
    fn test_settings_flow_into_task() {
        let settings = StackSettings {
            container_image: "demo/service:1.0".to_string(),
            container_port: 3000,
            desired_count: 3,
            cpu: 512,
            memory_mib: 1024,
            ..StackSettings::default()
        };
        let template = declared(&settings);

        let task = &template.resource(TASK_DEFINITION_ID).unwrap().properties;
        assert_eq!(task["Cpu"], "512");
        assert_eq!(task["Memory"], "1024");
        let container = &task["ContainerDefinitions"][0];
        assert_eq!(container["Image"], "demo/service:1.0");
        assert_eq!(container["PortMappings"][0]["ContainerPort"], 3000);

        let service = &template.resource(SERVICE_ID).unwrap().properties;
        assert_eq!(service["DesiredCount"], 3);
        assert_eq!(service["LoadBalancers"][0]["ContainerPort"], 3000);
    }
}

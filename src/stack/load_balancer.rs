//! Internet-facing application load balancer, listener and IP target group

use serde_json::json;

use super::network::Network;
use super::security::{group_id, SecurityGroups};
use super::settings::StackSettings;
use super::template::{reference, Resource, Template};

pub const LOAD_BALANCER_ID: &str = "ALB";
pub const LISTENER_ID: &str = "ALBListener";
pub const TARGET_GROUP_ID: &str = "ALBListenerECSTargetGroup";

#[derive(Debug, Clone)]
pub struct LoadBalancer {
    pub load_balancer: String,
    pub listener: String,
    pub target_group: String,
}

pub fn declare(
    template: &mut Template,
    network: &Network,
    security: &SecurityGroups,
    settings: &StackSettings,
) -> LoadBalancer {
    let mut alb = Resource::new("AWS::ElasticLoadBalancingV2::LoadBalancer")
        .property("Type", "application")
        .property("Scheme", "internet-facing")
        .property("SecurityGroups", vec![group_id(&security.load_balancer)])
        .property("Subnets", network.subnet_refs())
        .property(
            "LoadBalancerAttributes",
            json!([{ "Key": "deletion_protection.enabled", "Value": "false" }]),
        );
    // Internet-facing: the subnets must already route to the gateway
    for route in &network.default_routes {
        alb = alb.depends_on(route);
    }
    let load_balancer = template.add(LOAD_BALANCER_ID, alb);

    let health = &settings.health_check;
    let target_group = template.add(
        TARGET_GROUP_ID,
        Resource::new("AWS::ElasticLoadBalancingV2::TargetGroup")
            .property("Port", settings.container_port)
            .property("Protocol", "HTTP")
            .property("TargetType", "ip")
            .property("VpcId", reference(&network.vpc))
            .property("HealthCheckPath", health.path.as_str())
            .property("HealthCheckIntervalSeconds", health.interval_secs)
            .property("HealthCheckTimeoutSeconds", health.timeout_secs)
            .property("HealthyThresholdCount", health.healthy_threshold)
            .property("UnhealthyThresholdCount", health.unhealthy_threshold)
            .property(
                "TargetGroupAttributes",
                json!([
                    {
                        "Key": "deregistration_delay.timeout_seconds",
                        "Value": health.deregistration_delay_secs.to_string(),
                    },
                    { "Key": "stickiness.enabled", "Value": "false" },
                ]),
            ),
    );

    let listener = template.add(
        LISTENER_ID,
        Resource::new("AWS::ElasticLoadBalancingV2::Listener")
            .property("LoadBalancerArn", reference(&load_balancer))
            .property("Port", settings.listener_port)
            .property("Protocol", "HTTP")
            .property(
                "DefaultActions",
                json!([{ "TargetGroupArn": reference(&target_group), "Type": "forward" }]),
            ),
    );

    LoadBalancer {
        load_balancer,
        listener,
        target_group,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::{network, security};

    #[test]
    fn test_health_check_policy() {
        let mut template = Template::new(None);
        let settings = StackSettings::default();
        let network = network::declare(&mut template, "Demo", &settings).unwrap();
        let groups = security::declare(&mut template, &network, &settings);
        let lb = declare(&mut template, &network, &groups, &settings);

        let tg = &template.resource(&lb.target_group).unwrap().properties;
        assert_eq!(tg["TargetType"], "ip");
        assert_eq!(tg["HealthCheckPath"], "/");
        assert_eq!(tg["HealthCheckIntervalSeconds"], 60);
        assert_eq!(tg["HealthCheckTimeoutSeconds"], 30);
        assert_eq!(tg["HealthyThresholdCount"], 2);
        assert_eq!(tg["UnhealthyThresholdCount"], 5);
        assert_eq!(tg["TargetGroupAttributes"][0]["Value"], "60");

        let alb = template.resource(&lb.load_balancer).unwrap();
        assert_eq!(alb.properties["Scheme"], "internet-facing");
        assert_eq!(alb.depends_on, network.default_routes);

        let listener = &template.resource(&lb.listener).unwrap().properties;
        assert_eq!(listener["Port"], 80);
        assert_eq!(
            listener["DefaultActions"][0]["TargetGroupArn"],
            reference(&lb.target_group)
        );
    }
}

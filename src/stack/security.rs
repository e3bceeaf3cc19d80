//! Security groups forming the allow-list chain
//! internet -> load balancer -> service.

use serde_json::{json, Value};

use super::network::Network;
use super::settings::StackSettings;
use super::template::{get_att, reference, Resource, Template};

pub const LOAD_BALANCER_GROUP_ID: &str = "LBSecurityGroup";
pub const SERVICE_GROUP_ID: &str = "ServiceSecurityGroup";
pub const SERVICE_INGRESS_ID: &str = "ServiceSecurityGroupFromLBSecurityGroup";

const ANY_IPV4: &str = "0.0.0.0/0";

#[derive(Debug, Clone)]
pub struct SecurityGroups {
    pub load_balancer: String,
    pub service: String,
}

/// `GroupId` of a security group, the form VPC resources expect
pub fn group_id(security_group: &str) -> Value {
    get_att(security_group, "GroupId")
}

fn allow_all_outbound() -> Value {
    json!([{
        "CidrIp": ANY_IPV4,
        "Description": "Allow all outbound traffic by default",
        "IpProtocol": "-1",
    }])
}

pub fn declare(
    template: &mut Template,
    network: &Network,
    settings: &StackSettings,
) -> SecurityGroups {
    let listener_port = settings.listener_port;
    let load_balancer = template.add(
        LOAD_BALANCER_GROUP_ID,
        Resource::new("AWS::EC2::SecurityGroup")
            .property("GroupDescription", "Security group for the load balancer")
            .property("VpcId", reference(&network.vpc))
            .property(
                "SecurityGroupIngress",
                json!([{
                    "CidrIp": ANY_IPV4,
                    "Description": "Allow HTTP traffic from the internet",
                    "FromPort": listener_port,
                    "IpProtocol": "tcp",
                    "ToPort": listener_port,
                }]),
            )
            .property("SecurityGroupEgress", allow_all_outbound()),
    );

    let service = template.add(
        SERVICE_GROUP_ID,
        Resource::new("AWS::EC2::SecurityGroup")
            .property("GroupDescription", "Security group for Fargate service")
            .property("VpcId", reference(&network.vpc))
            .property("SecurityGroupEgress", allow_all_outbound()),
    );

    // Separate resource so the two groups can reference each other
    let container_port = settings.container_port;
    template.add(
        SERVICE_INGRESS_ID,
        Resource::new("AWS::EC2::SecurityGroupIngress")
            .property("GroupId", group_id(&service))
            .property("SourceSecurityGroupId", group_id(&load_balancer))
            .property("IpProtocol", "tcp")
            .property("FromPort", container_port)
            .property("ToPort", container_port)
            .property("Description", "Allow traffic from the load balancer"),
    );

    SecurityGroups {
        load_balancer,
        service,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::network;

    fn declared() -> (Template, SecurityGroups) {
        let mut template = Template::new(None);
        let settings = StackSettings::default();
        let network = network::declare(&mut template, "Demo", &settings).unwrap();
        let groups = declare(&mut template, &network, &settings);
        (template, groups)
    }

    #[test]
    fn test_service_only_reachable_from_load_balancer() {
        let (template, groups) = declared();

        let service = template.resource(&groups.service).unwrap();
        assert!(service.properties.get("SecurityGroupIngress").is_none());

        let ingress: Vec<_> = template
            .resources
            .values()
            .filter(|r| r.resource_type == "AWS::EC2::SecurityGroupIngress")
            .collect();
        assert_eq!(ingress.len(), 1);
        let rule = &ingress[0].properties;
        assert_eq!(rule["GroupId"], group_id(&groups.service));
        assert_eq!(rule["SourceSecurityGroupId"], group_id(&groups.load_balancer));
        assert!(rule.get("CidrIp").is_none());
        assert_eq!(rule["FromPort"], 80);
        assert_eq!(rule["ToPort"], 80);
    }

    #[test]
    fn test_load_balancer_open_on_port_80() {
        let (template, groups) = declared();
        let lb = &template.resource(&groups.load_balancer).unwrap().properties;
        let rules = lb["SecurityGroupIngress"].as_array().unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0]["CidrIp"], ANY_IPV4);
        assert_eq!(rules[0]["FromPort"], 80);
    }
}

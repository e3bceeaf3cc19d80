//! VPC with public subnets only.
//!
//! No NAT gateway is declared; tasks reach the internet through public
//! addressing and the internet gateway.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use super::error::StackError;
use super::settings::StackSettings;
use super::template::{reference, select_az, tag, Resource, Template};

pub const VPC_ID: &str = "Vpc";
const INTERNET_GATEWAY_ID: &str = "VpcInternetGateway";
const GATEWAY_ATTACHMENT_ID: &str = "VpcGatewayAttachment";

/// Logical ids of the network resources other constructs wire to
#[derive(Debug, Clone)]
pub struct Network {
    pub vpc: String,
    pub public_subnets: Vec<String>,
    /// Default routes; internet-facing load balancers wait on these
    pub default_routes: Vec<String>,
}

impl Network {
    pub fn subnet_refs(&self) -> Vec<serde_json::Value> {
        self.public_subnets.iter().map(|id| reference(id)).collect()
    }
}

/// IPv4 network in CIDR notation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Cidr {
    network: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    /// The `index`-th block of size `/new_prefix` inside this network
    pub fn subnet(&self, new_prefix: u8, index: u32) -> Option<Self> {
        if new_prefix < self.prefix || new_prefix > 32 {
            return None;
        }
        let count = 1_u64 << (new_prefix - self.prefix);
        if u64::from(index) >= count {
            return None;
        }
        let offset = u64::from(index) << (32 - u32::from(new_prefix));
        let base = u64::from(u32::from(self.network)) + offset;
        Some(Self {
            network: Ipv4Addr::from(u32::try_from(base).ok()?),
            prefix: new_prefix,
        })
    }
}

impl FromStr for Ipv4Cidr {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| StackError::InvalidCidr {
            cidr: s.to_string(),
            reason: reason.to_string(),
        };
        let (addr, prefix) = s.split_once('/').ok_or_else(|| invalid("missing '/'"))?;
        let network: Ipv4Addr = addr.parse().map_err(|_| invalid("bad address"))?;
        let prefix: u8 = prefix.parse().map_err(|_| invalid("bad prefix length"))?;
        if prefix > 32 {
            return Err(invalid("prefix length above 32"));
        }
        let mask = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
        if u32::from(network) & !mask != 0 {
            return Err(invalid("host bits set"));
        }
        Ok(Self { network, prefix })
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

pub fn declare(
    template: &mut Template,
    stack_name: &str,
    settings: &StackSettings,
) -> Result<Network, StackError> {
    let cidr: Ipv4Cidr = settings.vpc_cidr.parse()?;

    let vpc = template.add(
        VPC_ID,
        Resource::new("AWS::EC2::VPC")
            .property("CidrBlock", cidr.to_string())
            .property("EnableDnsHostnames", true)
            .property("EnableDnsSupport", true)
            .property("InstanceTenancy", "default")
            .property("Tags", vec![tag("Name", &format!("{stack_name}/Vpc"))]),
    );

    let igw = template.add(
        INTERNET_GATEWAY_ID,
        Resource::new("AWS::EC2::InternetGateway")
            .property("Tags", vec![tag("Name", &format!("{stack_name}/Vpc"))]),
    );
    let attachment = template.add(
        GATEWAY_ATTACHMENT_ID,
        Resource::new("AWS::EC2::VPCGatewayAttachment")
            .property("VpcId", reference(&vpc))
            .property("InternetGatewayId", reference(&igw)),
    );

    let mut network = Network {
        vpc,
        public_subnets: Vec::with_capacity(settings.max_azs),
        default_routes: Vec::with_capacity(settings.max_azs),
    };

    for az in 0..settings.max_azs {
        let n = az + 1;
        let block = u32::try_from(az)
            .ok()
            .and_then(|index| cidr.subnet(settings.subnet_prefix, index))
            .ok_or_else(|| StackError::InvalidCidr {
                cidr: cidr.to_string(),
                reason: format!(
                    "no room for {} /{} subnets",
                    settings.max_azs, settings.subnet_prefix
                ),
            })?;
        let name = format!("{stack_name}/Vpc/PublicSubnet{n}");

        let subnet = template.add(
            format!("VpcPublicSubnet{n}Subnet"),
            Resource::new("AWS::EC2::Subnet")
                .property("VpcId", reference(&network.vpc))
                .property("AvailabilityZone", select_az(az))
                .property("CidrBlock", block.to_string())
                .property("MapPublicIpOnLaunch", true)
                .property(
                    "Tags",
                    vec![
                        tag("Name", &name),
                        tag("aws-cdk:subnet-name", "Public"),
                        tag("aws-cdk:subnet-type", "Public"),
                    ],
                ),
        );
        let route_table = template.add(
            format!("VpcPublicSubnet{n}RouteTable"),
            Resource::new("AWS::EC2::RouteTable")
                .property("VpcId", reference(&network.vpc))
                .property("Tags", vec![tag("Name", &name)]),
        );
        template.add(
            format!("VpcPublicSubnet{n}RouteTableAssociation"),
            Resource::new("AWS::EC2::SubnetRouteTableAssociation")
                .property("RouteTableId", reference(&route_table))
                .property("SubnetId", reference(&subnet)),
        );
        let route = template.add(
            format!("VpcPublicSubnet{n}DefaultRoute"),
            Resource::new("AWS::EC2::Route")
                .property("RouteTableId", reference(&route_table))
                .property("DestinationCidrBlock", "0.0.0.0/0")
                .property("GatewayId", reference(INTERNET_GATEWAY_ID))
                .depends_on(&attachment),
        );

        network.public_subnets.push(subnet);
        network.default_routes.push(route);
    }

    Ok(network)
}

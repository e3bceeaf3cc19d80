//! Infrastructure declaration for the demo service.
//!
//! `synthesize` turns [`StackProps`] into a CloudFormation [`Template`]:
//! a VPC with public subnets only, an ECS cluster running one Fargate task
//! behind an internet-facing application load balancer, the two IAM roles
//! the task needs and its log group. The only output is the load balancer's
//! DNS name. Synthesis is pure; deploying the template is left to the
//! provisioning toolkit.

pub mod assembly;
pub mod compute;
mod error;
pub mod iam;
pub mod load_balancer;
pub mod logs;
pub mod network;
pub mod security;
pub mod settings;
pub mod template;
pub mod validate;

use std::collections::BTreeMap;

pub use error::StackError;
pub use settings::{HealthCheckSettings, StackSettings};
pub use template::{Output, Resource, Template};

use compute::ComputeInputs;
use template::get_att;

pub const DEFAULT_STACK_NAME: &str = "CdkInfrastructureStack";
pub const DEFAULT_DESCRIPTION: &str = "Infrastructure as Code using AWS CDK";
pub const LOAD_BALANCER_DNS_OUTPUT: &str = "LoadBalancerDNS";

/// Deployment target, taken from the toolkit's ambient credentials
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    pub account: Option<String>,
    pub region: Option<String>,
}

impl Environment {
    /// Read `CDK_DEFAULT_ACCOUNT` and `CDK_DEFAULT_REGION`
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            account: var("CDK_DEFAULT_ACCOUNT"),
            region: var("CDK_DEFAULT_REGION"),
        }
    }

    /// `aws://<account>/<region>`, with the toolkit's placeholders for
    /// unresolved parts
    pub fn target(&self) -> String {
        format!(
            "aws://{}/{}",
            self.account.as_deref().unwrap_or("unknown-account"),
            self.region.as_deref().unwrap_or("unknown-region")
        )
    }
}

#[derive(Debug, Clone)]
pub struct StackProps {
    pub stack_name: String,
    pub env: Environment,
    pub description: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub settings: StackSettings,
}

impl StackProps {
    /// The stock stack for `env`: default name, description and tags
    pub fn demo(env: Environment) -> Self {
        Self {
            stack_name: DEFAULT_STACK_NAME.to_string(),
            env,
            description: Some(DEFAULT_DESCRIPTION.to_string()),
            tags: default_tags(),
            settings: StackSettings::default(),
        }
    }
}

/// Tags applied to every provisioned resource
pub fn default_tags() -> BTreeMap<String, String> {
    [
        ("Project", "CDK-Infrastructure"),
        ("Environment", "Demo"),
        ("ManagedBy", "CDK"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Build the desired-state template for `props`
pub fn synthesize(props: &StackProps) -> Result<Template, StackError> {
    let settings = &props.settings;
    settings.validate()?;
    if !valid_stack_name(&props.stack_name) {
        return Err(StackError::InvalidSettings(format!(
            "stack name '{}' must start with a letter and contain only letters, digits and '-'",
            props.stack_name
        )));
    }

    let mut template = Template::new(props.description.clone());

    let network = network::declare(&mut template, &props.stack_name, settings)?;
    let security = security::declare(&mut template, &network, settings);
    let log_group = logs::declare(&mut template, settings);
    let roles = iam::declare(&mut template, &log_group);
    let load_balancer = load_balancer::declare(&mut template, &network, &security, settings);
    compute::declare(
        &mut template,
        &props.stack_name,
        &ComputeInputs {
            network: &network,
            security: &security,
            roles: &roles,
            log_group: &log_group,
            load_balancer: &load_balancer,
        },
        settings,
    );

    template.add_output(
        LOAD_BALANCER_DNS_OUTPUT,
        Output::new(get_att(&load_balancer.load_balancer, "DNSName"))
            .description("Public DNS of the load balancer"),
    );
    template.apply_tags(&props.tags);

    validate::check(&template)?;
    Ok(template)
}

/// CloudFormation stack names: a letter, then letters, digits or hyphens
fn valid_stack_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
        && name.len() <= 128
}

//! CloudFormation template model
//!
//! Maps are ordered so that the same declaration always serializes to the
//! same bytes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const FORMAT_VERSION: &str = "2010-09-09";

/// Pseudo parameters resolved by CloudFormation at deploy time
pub mod pseudo {
    pub const REGION: &str = "AWS::Region";
    pub const PARTITION: &str = "AWS::Partition";
}

/// Resource types that accept a `Tags` list of `{Key, Value}`
const TAGGABLE_TYPES: &[&str] = &[
    "AWS::EC2::VPC",
    "AWS::EC2::Subnet",
    "AWS::EC2::RouteTable",
    "AWS::EC2::InternetGateway",
    "AWS::EC2::SecurityGroup",
    "AWS::ECS::Cluster",
    "AWS::ECS::TaskDefinition",
    "AWS::ECS::Service",
    "AWS::IAM::Role",
    "AWS::Logs::LogGroup",
    "AWS::ElasticLoadBalancingV2::LoadBalancer",
    "AWS::ElasticLoadBalancingV2::TargetGroup",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub resources: BTreeMap<String, Resource>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, Output>,
}

/// What happens to a resource's physical counterpart when it leaves the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemovalPolicy {
    Retain,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    #[serde(rename = "Type")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<RemovalPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<RemovalPolicy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Template {
    pub fn new(description: Option<String>) -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            description,
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    /// Add a resource under `logical_id` and return the id for wiring
    pub fn add(&mut self, logical_id: impl Into<String>, resource: Resource) -> String {
        let id = logical_id.into();
        self.resources.insert(id.clone(), resource);
        id
    }

    pub fn add_output(&mut self, name: impl Into<String>, output: Output) {
        self.outputs.insert(name.into(), output);
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    /// Logical ids of every resource of `resource_type`, in id order
    pub fn ids_of_type<'a>(&'a self, resource_type: &'a str) -> impl Iterator<Item = &'a str> {
        self.resources
            .iter()
            .filter(move |(_, r)| r.resource_type == resource_type)
            .map(|(id, _)| id.as_str())
    }

    /// Apply `tags` to every taggable resource. Tags a resource already
    /// carries under the same key are overwritten.
    pub fn apply_tags(&mut self, tags: &BTreeMap<String, String>) {
        if tags.is_empty() {
            return;
        }
        for resource in self.resources.values_mut() {
            if TAGGABLE_TYPES.contains(&resource.resource_type.as_str()) {
                resource.merge_tags(tags);
            }
        }
    }
}

impl Resource {
    pub fn new(resource_type: &str) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            properties: Map::new(),
            depends_on: Vec::new(),
            deletion_policy: None,
            update_replace_policy: None,
        }
    }

    #[must_use]
    pub fn property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn depends_on(mut self, logical_id: &str) -> Self {
        if !self.depends_on.iter().any(|d| d == logical_id) {
            self.depends_on.push(logical_id.to_string());
            self.depends_on.sort();
        }
        self
    }

    /// Keep the physical resource when it is removed or replaced
    #[must_use]
    pub fn retain(mut self) -> Self {
        self.deletion_policy = Some(RemovalPolicy::Retain);
        self.update_replace_policy = Some(RemovalPolicy::Retain);
        self
    }

    fn merge_tags(&mut self, tags: &BTreeMap<String, String>) {
        let mut merged: BTreeMap<String, Value> = self
            .properties
            .get("Tags")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|tag| {
                let key = tag.get("Key")?.as_str()?.to_string();
                Some((key, tag.get("Value")?.clone()))
            })
            .collect();
        for (key, value) in tags {
            merged.insert(key.clone(), Value::String(value.clone()));
        }
        let list: Vec<Value> = merged
            .into_iter()
            .map(|(key, value)| json!({ "Key": key, "Value": value }))
            .collect();
        self.properties.insert("Tags".to_string(), Value::Array(list));
    }
}

impl Output {
    pub const fn new(value: Value) -> Self {
        Self {
            value,
            description: None,
        }
    }

    #[must_use]
    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

/// `{"Ref": id}`
pub fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// `{"Fn::GetAtt": [id, attribute]}`
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `{"Fn::Join": [separator, parts]}`
pub fn join(separator: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [separator, parts] })
}

/// The `index`-th availability zone of the deployment region
pub fn select_az(index: usize) -> Value {
    json!({ "Fn::Select": [index, { "Fn::GetAZs": "" }] })
}

/// ARN of an AWS managed IAM policy, partition-aware
pub fn managed_policy_arn(name: &str) -> Value {
    join(
        "",
        vec![
            Value::from("arn:"),
            reference(pseudo::PARTITION),
            Value::from(format!(":iam::aws:policy/{name}")),
        ],
    )
}

/// A single `{Key, Value}` tag entry
pub fn tag(key: &str, value: &str) -> Value {
    json!({ "Key": key, "Value": value })
}

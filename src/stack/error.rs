use thiserror::Error;

#[derive(Error, Debug)]
pub enum StackError {
    #[error("Resource {from} references unknown resource {target}")]
    UnknownReference { from: String, target: String },

    #[error("Resource {from} depends on unknown resource {target}")]
    UnknownDependency { from: String, target: String },

    #[error("NAT gateway {0} declared; compute must run in public subnets")]
    NatGateway(String),

    #[error("Stack declares no outputs")]
    NoOutputs,

    #[error("Invalid CIDR block {cidr}: {reason}")]
    InvalidCidr { cidr: String, reason: String },

    #[error("Invalid stack settings: {0}")]
    InvalidSettings(String),

    #[error("Settings file {path} could not be parsed: {source}")]
    SettingsParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization failed: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

//! Tunable shape of the stack, read from an optional `stack.toml`.
//!
//! Every default reproduces the deployed configuration, so an absent file
//! yields the stock stack.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::StackError;

/// Log retention values CloudWatch Logs accepts
const RETENTION_DAYS: &[u32] = &[
    1, 3, 5, 7, 14, 30, 60, 90, 120, 150, 180, 365, 400, 545, 731, 1096, 1827, 2192, 2557, 2922,
    3288, 3653,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StackSettings {
    /// One public subnet is created per availability zone
    pub max_azs: usize,
    pub vpc_cidr: String,
    pub subnet_prefix: u8,
    pub container_image: String,
    pub container_port: u16,
    pub listener_port: u16,
    pub desired_count: u32,
    /// Fargate CPU units
    pub cpu: u32,
    pub memory_mib: u32,
    pub log_group_name: String,
    pub log_stream_prefix: String,
    pub log_retention_days: u32,
    pub health_check: HealthCheckSettings,
}

/// Target group health check policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthCheckSettings {
    pub path: String,
    pub interval_secs: u32,
    pub timeout_secs: u32,
    pub healthy_threshold: u32,
    pub unhealthy_threshold: u32,
    pub deregistration_delay_secs: u32,
}

impl Default for StackSettings {
    fn default() -> Self {
        Self {
            max_azs: 2,
            vpc_cidr: "10.0.0.0/16".to_string(),
            subnet_prefix: 24,
            // The stack deploys an off-the-shelf web server, not the demo service
            container_image: "nginx:latest".to_string(),
            container_port: 80,
            listener_port: 80,
            desired_count: 1,
            cpu: 256,
            memory_mib: 512,
            log_group_name: "/ecs/cdk-demo-app".to_string(),
            log_stream_prefix: "cdk-demo-app".to_string(),
            log_retention_days: 7,
            health_check: HealthCheckSettings::default(),
        }
    }
}

impl Default for HealthCheckSettings {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            interval_secs: 60,
            timeout_secs: 30,
            healthy_threshold: 2,
            unhealthy_threshold: 5,
            deregistration_delay_secs: 60,
        }
    }
}

impl StackSettings {
    /// Read settings from `path`; a missing file means defaults.
    pub fn load(path: &Path) -> Result<Self, StackError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(StackError::Io(e)),
        };
        let settings: Self =
            toml::from_str(&contents).map_err(|source| StackError::SettingsParse {
                path: path.display().to_string(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), StackError> {
        let invalid = |msg: String| Err(StackError::InvalidSettings(msg));

        if !(1..=6).contains(&self.max_azs) {
            return invalid(format!("max_azs must be between 1 and 6, got {}", self.max_azs));
        }
        if self.container_port == 0 || self.listener_port == 0 {
            return invalid("ports must be non-zero".to_string());
        }
        if self.container_image.trim().is_empty() {
            return invalid("container_image must not be empty".to_string());
        }
        if !fargate_size_supported(self.cpu, self.memory_mib) {
            return invalid(format!(
                "Fargate does not offer {} CPU units with {} MiB",
                self.cpu, self.memory_mib
            ));
        }
        if !RETENTION_DAYS.contains(&self.log_retention_days) {
            return invalid(format!(
                "log_retention_days {} is not a CloudWatch Logs retention value",
                self.log_retention_days
            ));
        }
        self.health_check.validate()
    }
}

impl HealthCheckSettings {
    fn validate(&self) -> Result<(), StackError> {
        let invalid = |msg: String| Err(StackError::InvalidSettings(msg));

        if !self.path.starts_with('/') {
            return invalid(format!("health check path must start with '/': {}", self.path));
        }
        if !(5..=300).contains(&self.interval_secs) {
            return invalid(format!("health check interval {}s out of range 5-300", self.interval_secs));
        }
        if !(2..=120).contains(&self.timeout_secs) || self.timeout_secs >= self.interval_secs {
            return invalid(format!(
                "health check timeout {}s must be 2-120 and below the interval",
                self.timeout_secs
            ));
        }
        for threshold in [self.healthy_threshold, self.unhealthy_threshold] {
            if !(2..=10).contains(&threshold) {
                return invalid(format!("health check threshold {threshold} out of range 2-10"));
            }
        }
        if self.deregistration_delay_secs > 3600 {
            return invalid(format!(
                "deregistration delay {}s exceeds 3600",
                self.deregistration_delay_secs
            ));
        }
        Ok(())
    }
}

/// CPU/memory pairs a Fargate task may request
fn fargate_size_supported(cpu: u32, memory_mib: u32) -> bool {
    match cpu {
        256 => matches!(memory_mib, 512 | 1024 | 2048),
        512 => (1024..=4096).contains(&memory_mib) && memory_mib % 1024 == 0,
        1024 => (2048..=8192).contains(&memory_mib) && memory_mib % 1024 == 0,
        2048 => (4096..=16384).contains(&memory_mib) && memory_mib % 1024 == 0,
        4096 => (8192..=30720).contains(&memory_mib) && memory_mib % 1024 == 0,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = StackSettings::default();
        settings.validate().unwrap();
        assert_eq!(settings.max_azs, 2);
        assert_eq!(settings.container_image, "nginx:latest");
        assert_eq!(settings.health_check.interval_secs, 60);
        assert_eq!(settings.health_check.timeout_secs, 30);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = StackSettings::load(&dir.path().join("stack.toml")).unwrap();
        assert_eq!(settings, StackSettings::default());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.toml");
        std::fs::write(
            &path,
            "max_azs = 3\ncontainer_port = 3000\n\n[health_check]\npath = \"/health\"\n",
        )
        .unwrap();

        let settings = StackSettings::load(&path).unwrap();
        assert_eq!(settings.max_azs, 3);
        assert_eq!(settings.container_port, 3000);
        assert_eq!(settings.health_check.path, "/health");
        assert_eq!(settings.health_check.unhealthy_threshold, 5);
        assert_eq!(settings.cpu, 256);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.toml");
        std::fs::write(&path, "nat_gateways = 1\n").unwrap();

        match StackSettings::load(&path) {
            Err(StackError::SettingsParse { .. }) => {}
            other => panic!("Expected `SettingsParse` error, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_values() {
        let mut settings = StackSettings {
            memory_mib: 4096,
            ..StackSettings::default()
        };
        assert!(settings.validate().is_err());

        settings = StackSettings {
            max_azs: 0,
            ..StackSettings::default()
        };
        assert!(settings.validate().is_err());

        settings = StackSettings::default();
        settings.health_check.timeout_secs = 60;
        assert!(settings.validate().is_err());

        settings = StackSettings {
            log_retention_days: 10,
            ..StackSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}

//! Cloud assembly output: the synthesized template plus a manifest the
//! provisioning toolkit reads to find it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::StackError;
use super::template::Template;
use super::Environment;

pub const MANIFEST_FILE: &str = "manifest.json";
const MANIFEST_VERSION: &str = "36.0.0";
const STACK_ARTIFACT_TYPE: &str = "aws:cloudformation:stack";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemplateFormat {
    #[default]
    Json,
    Yaml,
}

impl TemplateFormat {
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub artifacts: BTreeMap<String, Artifact>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(rename = "type")]
    pub kind: String,
    pub environment: String,
    pub properties: ArtifactProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactProperties {
    pub template_file: String,
}

/// Serialize the template in `format`
pub fn render(template: &Template, format: TemplateFormat) -> Result<String, StackError> {
    match format {
        TemplateFormat::Json => {
            let mut out = serde_json::to_string_pretty(template)?;
            out.push('\n');
            Ok(out)
        }
        TemplateFormat::Yaml => Ok(serde_yaml::to_string(template)?),
    }
}

/// Write `<dir>/<stack>.template.<ext>` and `<dir>/manifest.json`.
/// Returns the template path.
pub fn write(
    dir: &Path,
    stack_name: &str,
    env: &Environment,
    template: &Template,
    format: TemplateFormat,
) -> Result<PathBuf, StackError> {
    fs::create_dir_all(dir)?;

    let template_file = format!("{stack_name}.template.{}", format.extension());
    let template_path = dir.join(&template_file);
    fs::write(&template_path, render(template, format)?)?;

    let manifest = Manifest {
        version: MANIFEST_VERSION.to_string(),
        artifacts: BTreeMap::from([(
            stack_name.to_string(),
            Artifact {
                kind: STACK_ARTIFACT_TYPE.to_string(),
                environment: env.target(),
                properties: ArtifactProperties { template_file },
            },
        )]),
    };
    let mut contents = serde_json::to_string_pretty(&manifest)?;
    contents.push('\n');
    fs::write(dir.join(MANIFEST_FILE), contents)?;

    Ok(template_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::{synthesize, StackProps};

    fn env() -> Environment {
        Environment {
            account: Some("123456789012".to_string()),
            region: Some("us-east-1".to_string()),
        }
    }

    #[test]
    fn test_write_json_assembly() {
        let dir = tempfile::tempdir().unwrap();
        let props = StackProps::demo(env());
        let template = synthesize(&props).unwrap();

        let path = write(dir.path(), &props.stack_name, &props.env, &template, TemplateFormat::Json)
            .unwrap();
        assert_eq!(
            path.file_name().unwrap(),
            "CdkInfrastructureStack.template.json"
        );

        let written: Template =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, template);

        let manifest: Manifest =
            serde_json::from_str(&fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap())
                .unwrap();
        let artifact = &manifest.artifacts["CdkInfrastructureStack"];
        assert_eq!(artifact.kind, STACK_ARTIFACT_TYPE);
        assert_eq!(artifact.environment, "aws://123456789012/us-east-1");
        assert_eq!(
            artifact.properties.template_file,
            "CdkInfrastructureStack.template.json"
        );
    }

    #[test]
    fn test_yaml_matches_json() {
        let template = synthesize(&StackProps::demo(env())).unwrap();
        let yaml = render(&template, TemplateFormat::Yaml).unwrap();
        let parsed: Template = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, template);
    }

    #[test]
    fn test_rewrite_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let props = StackProps::demo(env());
        let template = synthesize(&props).unwrap();

        let path = write(dir.path(), &props.stack_name, &props.env, &template, TemplateFormat::Json)
            .unwrap();
        let first = fs::read(&path).unwrap();
        let again = synthesize(&props).unwrap();
        write(dir.path(), &props.stack_name, &props.env, &again, TemplateFormat::Json).unwrap();
        assert_eq!(fs::read(&path).unwrap(), first);
    }
}

//! Checks run on a synthesized template before it is emitted

use serde_json::Value;

use super::error::StackError;
use super::template::Template;

const NAT_GATEWAY_TYPE: &str = "AWS::EC2::NatGateway";

/// Reject dangling references, dangling dependencies, NAT gateways and a
/// template without outputs.
pub fn check(template: &Template) -> Result<(), StackError> {
    if let Some(nat) = template.ids_of_type(NAT_GATEWAY_TYPE).next() {
        return Err(StackError::NatGateway(nat.to_string()));
    }

    for (id, resource) in &template.resources {
        for target in &resource.depends_on {
            if !template.resources.contains_key(target) {
                return Err(StackError::UnknownDependency {
                    from: id.clone(),
                    target: target.clone(),
                });
            }
        }
        for value in resource.properties.values() {
            check_references(template, id, value)?;
        }
    }

    if template.outputs.is_empty() {
        return Err(StackError::NoOutputs);
    }
    for (name, output) in &template.outputs {
        check_references(template, &format!("Outputs.{name}"), &output.value)?;
    }
    Ok(())
}

/// Walk `value` and verify every `Ref` / `Fn::GetAtt` target exists
fn check_references(template: &Template, from: &str, value: &Value) -> Result<(), StackError> {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(target)) = map.get("Ref") {
                ensure_exists(template, from, target)?;
            }
            if let Some(target) = map
                .get("Fn::GetAtt")
                .and_then(|att| att.get(0))
                .and_then(Value::as_str)
            {
                ensure_exists(template, from, target)?;
            }
            map.values()
                .try_for_each(|v| check_references(template, from, v))
        }
        Value::Array(items) => items
            .iter()
            .try_for_each(|v| check_references(template, from, v)),
        _ => Ok(()),
    }
}

fn ensure_exists(template: &Template, from: &str, target: &str) -> Result<(), StackError> {
    // Pseudo parameters such as AWS::Region are not resources
    if target.starts_with("AWS::") || template.resources.contains_key(target) {
        Ok(())
    } else {
        Err(StackError::UnknownReference {
            from: from.to_string(),
            target: target.to_string(),
        })
    }
}

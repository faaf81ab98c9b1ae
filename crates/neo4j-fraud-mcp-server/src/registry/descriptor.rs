//! The persisted form of a tool: a YAML descriptor with operational fields
//! plus optional semantic enrichment for agents.

use serde::Deserialize;
use serde_json::Value;

const VALID_PARAMETER_TYPES: &[&str] =
    &["string", "integer", "number", "boolean", "array", "object"];

/// A tool loaded from the YAML catalog. `category` is derived from the file
/// path, never from the YAML itself.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool identifier (e.g. generate-scene-action)
    #[serde(default)]
    pub name: String,

    /// Operational description of the tool
    #[serde(default)]
    pub description: String,

    /// Semantic guidance for agents: WHEN to use this tool
    #[serde(default)]
    pub intent: Option<String>,

    /// The patterns this tool helps detect
    #[serde(default)]
    pub expected_patterns: Vec<PatternConfig>,

    /// Canonical query implementation offered as guidance to the LLM
    #[serde(default)]
    pub reference_cypher: Option<String>,

    /// Hints about common labels and relationships to look for
    #[serde(default)]
    pub reference_schema: Option<ReferenceSchemaConfig>,

    /// Typed input parameters
    #[serde(default)]
    pub parameters: Vec<ParameterConfig>,

    /// Optional execution block; present only for query-backed tools
    #[serde(default)]
    pub execution: Option<ExecutionConfig>,

    #[serde(skip)]
    pub category: String,
}

/// An expected detection pattern.
#[derive(Debug, Clone, Deserialize)]
pub struct PatternConfig {
    /// The node type being analyzed (e.g. Customer, Account)
    #[serde(default)]
    pub entity: String,

    /// The PII or attributes that may be shared
    #[serde(default)]
    pub shared_elements: Vec<String>,

    /// What makes this pattern suspicious
    #[serde(default)]
    pub anomaly: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceSchemaConfig {
    #[serde(default)]
    pub labels: Vec<String>,

    #[serde(default)]
    pub relationships: Vec<String>,
}

/// A typed input parameter.
#[derive(Debug, Clone, Deserialize)]
pub struct ParameterConfig {
    #[serde(default)]
    pub name: String,

    /// JSON Schema type: string, integer, number, boolean, array, object
    #[serde(default, rename = "type")]
    pub param_type: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub default: Option<Value>,

    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Query execution mode: read or write
    pub mode: String,
}

/// Parses and validates one YAML descriptor; `path` supplies the category
/// and error context.
pub fn parse_tool_descriptor(data: &str, path: &str) -> Result<ToolDescriptor, String> {
    let mut descriptor: ToolDescriptor =
        serde_yaml::from_str(data).map_err(|e| format!("failed to parse YAML in {}: {}", path, e))?;

    descriptor.category = derive_category_from_path(path);

    if descriptor.name.is_empty() {
        return Err(format!("tool name is required in config file: {}", path));
    }
    if descriptor.description.is_empty() {
        return Err(format!("tool description is required in config file: {}", path));
    }

    validate_parameters(&descriptor.parameters)
        .map_err(|e| format!("invalid parameters in {}: {}", path, e))?;

    if let Some(execution) = &descriptor.execution {
        if execution.mode != "read" && execution.mode != "write" {
            return Err(format!(
                "invalid execution mode '{}' in config file: {}",
                execution.mode, path
            ));
        }
    }

    Ok(descriptor)
}

fn validate_parameters(params: &[ParameterConfig]) -> Result<(), String> {
    let mut names = Vec::new();

    for (i, param) in params.iter().enumerate() {
        if param.name.is_empty() {
            return Err(format!("parameter[{}] name is required", i));
        }
        if names.contains(&param.name.as_str()) {
            return Err(format!("duplicate parameter name '{}'", param.name));
        }
        names.push(param.name.as_str());

        if let Some(param_type) = &param.param_type {
            if !VALID_PARAMETER_TYPES.contains(&param_type.as_str()) {
                return Err(format!(
                    "parameter '{}' has invalid type '{}'",
                    param.name, param_type
                ));
            }
        }
    }

    Ok(())
}

/// Extracts the category from the file path: the first segment after
/// `config/`, otherwise the first segment after `tools/`, otherwise the
/// leading directory, defaulting to `general`.
///
/// `tools/config/fraud/detect-synthetic-identity.yaml` derives `fraud`.
pub fn derive_category_from_path(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    let parts: Vec<&str> = normalized.split('/').collect();

    for (i, part) in parts.iter().enumerate() {
        if *part == "config" && i + 1 < parts.len() {
            return parts[i + 1].to_string();
        }
    }

    if parts.len() >= 2 {
        if parts[0] == "tools" && parts.len() >= 3 {
            return parts[1].to_string();
        }
        return parts[0].to_string();
    }

    "general".to_string()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("tools/config/fraud/detect-synthetic-identity.yaml", "fraud")]
    #[case("config/bloom/generate-scene-action.yaml", "bloom")]
    #[case("tools/sar/get-sar-report-guidance.yaml", "sar")]
    #[case("graph-data/explore.yaml", "graph-data")]
    #[case("standalone.yaml", "general")]
    fn category_derivation(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(derive_category_from_path(path), expected);
    }

    #[test]
    fn minimal_descriptor_parses() {
        let yaml = "name: my-tool\ndescription: does something\n";
        let descriptor = parse_tool_descriptor(yaml, "config/fraud/my-tool.yaml").unwrap();

        assert_eq!(descriptor.name, "my-tool");
        assert_eq!(descriptor.category, "fraud");
        assert!(descriptor.parameters.is_empty());
        assert!(descriptor.execution.is_none());
    }

    #[test]
    fn missing_name_is_rejected() {
        let err = parse_tool_descriptor("description: x\n", "config/fraud/a.yaml").unwrap_err();
        assert!(err.contains("name is required"));
    }

    #[test]
    fn missing_description_is_rejected() {
        let err = parse_tool_descriptor("name: x\n", "config/fraud/a.yaml").unwrap_err();
        assert!(err.contains("description is required"));
    }

    #[rstest]
    #[case("- name: a\n  type: integer\n- name: b\n", true)]
    #[case("- type: integer\n", false)] // nameless
    #[case("- name: a\n- name: a\n", false)] // duplicate
    #[case("- name: a\n  type: not_a_type\n", false)]
    fn parameter_validation(#[case] params_yaml: &str, #[case] ok: bool) {
        let yaml = format!(
            "name: t\ndescription: d\nparameters:\n{}",
            params_yaml
                .lines()
                .map(|l| format!("  {}", l))
                .collect::<Vec<_>>()
                .join("\n")
        );
        let result = parse_tool_descriptor(&yaml, "config/fraud/t.yaml");
        assert_eq!(result.is_ok(), ok, "unexpected result: {:?}", result.err());
    }

    #[test]
    fn invalid_execution_mode_is_rejected() {
        let yaml = "name: t\ndescription: d\nexecution:\n  mode: maybe\n";
        let err = parse_tool_descriptor(yaml, "config/fraud/t.yaml").unwrap_err();
        assert!(err.contains("invalid execution mode"));
    }

    #[test]
    fn semantic_fields_round_trip() {
        let yaml = r#"
name: detect-thing
description: finds things
intent: use for things
expected_patterns:
  - entity: Customer
    shared_elements: [Email, Phone]
    anomaly: things shared
reference_cypher: MATCH (n) RETURN n
reference_schema:
  labels: [Customer]
  relationships: [HAS_EMAIL]
parameters:
  - name: limit
    type: integer
    default: 20
"#;
        let descriptor = parse_tool_descriptor(yaml, "config/fraud/detect-thing.yaml").unwrap();

        assert_eq!(descriptor.intent.as_deref(), Some("use for things"));
        assert_eq!(descriptor.expected_patterns.len(), 1);
        assert_eq!(descriptor.expected_patterns[0].shared_elements, ["Email", "Phone"]);
        assert_eq!(descriptor.reference_cypher.as_deref(), Some("MATCH (n) RETURN n"));
        assert_eq!(
            descriptor.reference_schema.as_ref().unwrap().labels,
            ["Customer"]
        );
        assert_eq!(descriptor.parameters[0].default, Some(serde_json::json!(20)));
    }
}

//! The YAML tool registry: loads descriptors at startup and synthesizes MCP
//! tools from them. Most catalog tools are guidance tools whose handler
//! returns an enriched description; a descriptor with an `execution` block
//! becomes a query-backed tool instead.

mod descriptor;
mod embedded;
mod walker;

use std::fmt::Write as _;
use std::path::PathBuf;

use rmcp::model::{JsonObject, Tool};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use descriptor::{ParameterConfig, PatternConfig, ReferenceSchemaConfig, ToolDescriptor};

use crate::cypher;
use crate::errors::ToolError;
use crate::schema_from_type;
use crate::tools::{ToolDependencies, parse_arguments, read_only_annotations};

/// Manages loading and registration of catalog tools.
pub struct ToolRegistry {
    config_dir: PathBuf,
    descriptors: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            descriptors: Vec::new(),
        }
    }

    /// Loads all descriptors from the embedded catalog (or the fallback
    /// directory), replacing any previously loaded table.
    pub fn load_tools(&mut self) {
        self.descriptors = walker::walk_config_directory(&self.config_dir);
        info!(
            count = self.descriptors.len(),
            config_dir = %self.config_dir.display(),
            "loaded catalog tools"
        );
    }

    pub fn tool_count(&self) -> usize {
        self.descriptors.len()
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn tools_by_category(&self, category: &str) -> Vec<&ToolDescriptor> {
        self.descriptors
            .iter()
            .filter(|d| d.category == category)
            .collect()
    }

    /// Converts the loaded descriptors into dispatchable tools.
    pub fn server_tools(&self, deps: &ToolDependencies) -> Vec<CatalogTool> {
        self.descriptors
            .iter()
            .map(|descriptor| CatalogTool::new(descriptor.clone(), deps.clone()))
            .collect()
    }
}

/// Input for query-backed catalog tools.
#[derive(JsonSchema, Deserialize)]
pub struct QueryInput {
    /// The Cypher query to execute
    query: String,

    /// Parameters to pass to the Cypher query
    #[serde(default)]
    params: Option<Map<String, Value>>,
}

/// A tool synthesized from a YAML descriptor.
#[derive(Clone)]
pub struct CatalogTool {
    pub tool: Tool,
    descriptor: ToolDescriptor,
    enriched_description: String,
    deps: ToolDependencies,
}

impl CatalogTool {
    fn new(descriptor: ToolDescriptor, deps: ToolDependencies) -> Self {
        let enriched_description = build_enriched_description(&descriptor);

        let input_schema = if descriptor.execution.is_some() {
            schema_from_type!(QueryInput)
        } else {
            parameter_schema(&descriptor.parameters)
        };

        let mut tool = Tool::new(
            descriptor.name.clone(),
            enriched_description.clone(),
            input_schema,
        );
        // Catalog tools are read-only in the current model: guidance tools
        // execute nothing, and query-backed ones are gated by the classifier.
        tool.annotations = Some(read_only_annotations(&descriptor.name));

        Self {
            tool,
            descriptor,
            enriched_description,
            deps,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn category(&self) -> &str {
        &self.descriptor.category
    }

    pub async fn execute(
        &self,
        ct: &CancellationToken,
        arguments: Option<&JsonObject>,
    ) -> Result<String, ToolError> {
        self.deps.emit_tool_event(&self.descriptor.name)?;

        let Some(execution) = &self.descriptor.execution else {
            info!(
                tool = %self.descriptor.name,
                category = %self.descriptor.category,
                "guidance tool called"
            );
            return Ok(self.enriched_description.clone());
        };

        let input: QueryInput = parse_arguments(arguments)?;
        if input.query.trim().is_empty() {
            return Err(ToolError::Validation(
                "query parameter is required".to_string(),
            ));
        }

        if execution.mode == "read" && cypher::is_write_query(&input.query) {
            let keyword = cypher::detect_write_keyword(&input.query).unwrap_or_default();
            return Err(ToolError::Validation(format!(
                "write operation detected in read-only tool: {}",
                keyword.trim_end()
            )));
        }

        let database = self.deps.database()?;
        info!(
            tool = %self.descriptor.name,
            category = %self.descriptor.category,
            mode = %execution.mode,
            has_params = input.params.is_some(),
            "executing catalog tool query"
        );

        let records = if execution.mode == "read" {
            database
                .execute_read(ct, &input.query, input.params.as_ref())
                .await?
        } else {
            database
                .execute_write(ct, &input.query, input.params.as_ref())
                .await?
        };
        database.records_to_json(&records)
    }
}

/// Renders the descriptor's semantic fields as markdown sections appended to
/// the base description.
fn build_enriched_description(descriptor: &ToolDescriptor) -> String {
    let mut text = descriptor.description.trim_end().to_string();

    if let Some(intent) = &descriptor.intent {
        let _ = write!(text, "\n\n## Intent\n\n{}", intent.trim_end());
    }

    if !descriptor.expected_patterns.is_empty() {
        text.push_str("\n\n## Expected Patterns\n");
        for pattern in &descriptor.expected_patterns {
            let _ = write!(text, "\n- **{}**", pattern.entity);
            if !pattern.shared_elements.is_empty() {
                let _ = write!(text, " (shared: {})", pattern.shared_elements.join(", "));
            }
            if !pattern.anomaly.is_empty() {
                let _ = write!(text, ": {}", pattern.anomaly);
            }
        }
    }

    if let Some(reference_cypher) = &descriptor.reference_cypher {
        let _ = write!(
            text,
            "\n\n## Reference Cypher\n\n```cypher\n{}\n```",
            reference_cypher.trim_end()
        );
    }

    if let Some(reference_schema) = &descriptor.reference_schema {
        text.push_str("\n\n## Reference Schema\n");
        if !reference_schema.labels.is_empty() {
            let _ = write!(text, "\n- Labels: {}", reference_schema.labels.join(", "));
        }
        if !reference_schema.relationships.is_empty() {
            let _ = write!(
                text,
                "\n- Relationships: {}",
                reference_schema.relationships.join(", ")
            );
        }
    }

    if !descriptor.parameters.is_empty() {
        text.push_str("\n\n## Parameters\n");
        for param in &descriptor.parameters {
            let _ = write!(text, "\n- `{}`", param.name);
            let mut qualifiers = Vec::new();
            if let Some(param_type) = &param.param_type {
                qualifiers.push(param_type.clone());
            }
            if let Some(default) = &param.default {
                qualifiers.push(format!("default: {}", default));
            }
            if param.required {
                qualifiers.push("required".to_string());
            }
            if !qualifiers.is_empty() {
                let _ = write!(text, " ({})", qualifiers.join(", "));
            }
            if let Some(description) = &param.description {
                let _ = write!(text, ": {}", description);
            }
        }
    }

    text
}

/// Builds a JSON-Schema object from the descriptor's parameter list.
fn parameter_schema(parameters: &[ParameterConfig]) -> JsonObject {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for param in parameters {
        let mut property = Map::new();
        if let Some(param_type) = &param.param_type {
            property.insert("type".to_string(), json!(param_type));
        }
        if let Some(description) = &param.description {
            property.insert("description".to_string(), json!(description));
        }
        if let Some(default) = &param.default {
            property.insert("default".to_string(), default.clone());
        }
        properties.insert(param.name.clone(), Value::Object(property));

        if param.required {
            required.push(json!(param.name));
        }
    }

    let mut schema = Map::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".to_string(), Value::Array(required));
    }
    schema
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded_registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new("tools/config");
        registry.load_tools();
        registry
    }

    #[test]
    fn registry_loads_the_embedded_catalog() {
        let registry = loaded_registry();
        assert!(registry.tool_count() >= 7);
    }

    #[test]
    fn reloading_replaces_the_table() {
        let mut registry = ToolRegistry::new("tools/config");
        registry.load_tools();
        let first_count = registry.tool_count();
        registry.load_tools();
        assert_eq!(registry.tool_count(), first_count);
    }

    #[test]
    fn bloom_tools_are_guidance_tools_with_read_only_annotations() {
        let registry = loaded_registry();
        let tools = registry.server_tools(&ToolDependencies::default());

        for name in ["generate-scene-action", "generate-search-phrase"] {
            let tool = tools.iter().find(|t| t.name() == name).unwrap();
            assert_eq!(tool.category(), "bloom");
            let annotations = tool.tool.annotations.as_ref().unwrap();
            assert_eq!(annotations.read_only_hint, Some(true));
            assert_eq!(annotations.idempotent_hint, Some(true));
            assert_eq!(annotations.destructive_hint, Some(false));
            assert_eq!(annotations.open_world_hint, Some(true));
        }
    }

    #[tokio::test]
    async fn guidance_tool_returns_enriched_description_without_a_database() {
        let registry = loaded_registry();
        let telemetry = std::sync::Arc::new(crate::telemetry::TelemetryService::new(
            url::Url::parse("http://localhost:9/events").unwrap(),
            false,
        ));
        let deps = ToolDependencies {
            database: None,
            telemetry: Some(telemetry),
        };
        let tools = registry.server_tools(&deps);
        let sar = tools
            .iter()
            .find(|t| t.name() == "get-sar-report-guidance")
            .unwrap();

        let text = sar
            .execute(&CancellationToken::new(), None)
            .await
            .unwrap();

        assert!(text.contains("Suspicious Activity Reports"));
        assert!(text.contains("## Intent"));
        assert!(text.contains("## Expected Patterns"));
        assert!(text.contains("## Reference Cypher"));
        assert!(text.contains("```cypher"));
        assert!(text.contains("## Parameters"));
    }

    #[tokio::test]
    async fn guidance_tool_without_telemetry_is_a_dependency_error() {
        let registry = loaded_registry();
        let tools = registry.server_tools(&ToolDependencies::default());
        let tool = tools.first().unwrap();

        let err = tool
            .execute(&CancellationToken::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Dependency(_)));
    }

    #[test]
    fn enriched_description_sections_render_in_order() {
        let descriptor = descriptor::parse_tool_descriptor(
            r#"
name: sample
description: base text
intent: when to use
expected_patterns:
  - entity: Customer
    shared_elements: [Email]
    anomaly: shared inbox
reference_cypher: MATCH (n) RETURN n
reference_schema:
  labels: [Customer]
  relationships: [HAS_EMAIL]
parameters:
  - name: limit
    type: integer
    default: 20
    description: result cap
"#,
            "config/fraud/sample.yaml",
        )
        .unwrap();

        let text = build_enriched_description(&descriptor);

        let base = text.find("base text").unwrap();
        let intent = text.find("## Intent").unwrap();
        let patterns = text.find("## Expected Patterns").unwrap();
        let cypher_section = text.find("## Reference Cypher").unwrap();
        let schema_section = text.find("## Reference Schema").unwrap();
        let params = text.find("## Parameters").unwrap();

        assert!(base < intent && intent < patterns && patterns < cypher_section);
        assert!(cypher_section < schema_section && schema_section < params);
        assert!(text.contains("- **Customer** (shared: Email): shared inbox"));
        assert!(text.contains("- `limit` (integer, default: 20): result cap"));
    }

    #[test]
    fn parameter_schema_marks_required_fields() {
        let registry = loaded_registry();
        let tools = registry.server_tools(&ToolDependencies::default());
        let scene_action = tools
            .iter()
            .find(|t| t.name() == "generate-scene-action")
            .unwrap();

        let schema = serde_json::to_value(scene_action.tool.input_schema.as_ref()).unwrap();
        assert_eq!(schema["type"], json!("object"));
        assert_eq!(schema["required"], json!(["selection_description"]));
        assert_eq!(
            schema["properties"]["expansion_goal"]["type"],
            json!("string")
        );
    }
}

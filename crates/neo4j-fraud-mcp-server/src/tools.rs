//! Hard-coded MCP tools. Each tool is a struct carrying its MCP definition
//! and an `execute` method; the server routes invocations by tool name.

use std::sync::Arc;

use rmcp::model::ToolAnnotations;

use crate::database::Neo4jService;
use crate::errors::ToolError;
use crate::telemetry::TelemetryService;

pub mod enrich_schema;
pub mod entity_profile;
pub mod gds;
pub mod get_schema;
pub mod identity_overlap;
pub mod read_cypher;
pub mod reference_models;
pub mod write_cypher;

/// Dependencies handed to every tool. Optional fields model subsystems that
/// may not be configured; tools treat an absent required subsystem as a
/// dependency error at invocation time.
#[derive(Clone, Default)]
pub struct ToolDependencies {
    pub database: Option<Arc<Neo4jService>>,
    pub telemetry: Option<Arc<TelemetryService>>,
}

impl ToolDependencies {
    pub fn database(&self) -> Result<&Neo4jService, ToolError> {
        self.database
            .as_deref()
            .ok_or_else(|| ToolError::Dependency("Database service".to_string()))
    }

    pub fn telemetry(&self) -> Result<&TelemetryService, ToolError> {
        self.telemetry
            .as_deref()
            .ok_or_else(|| ToolError::Dependency("Telemetry service".to_string()))
    }

    /// Checks telemetry presence and emits the per-invocation event.
    /// Presence is a precondition; delivery is best-effort.
    pub fn emit_tool_event(&self, tool_name: &str) -> Result<(), ToolError> {
        self.telemetry()?.emit_tool_event(tool_name);
        Ok(())
    }
}

/// Deserializes raw MCP arguments into a tool's input type. Missing
/// arguments are treated as an empty object so optional-only inputs parse.
pub(crate) fn parse_arguments<T: serde::de::DeserializeOwned>(
    arguments: Option<&rmcp::model::JsonObject>,
) -> Result<T, ToolError> {
    let value = arguments
        .cloned()
        .map(serde_json::Value::Object)
        .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));
    serde_json::from_value(value).map_err(|e| ToolError::Validation(format!("Invalid input: {}", e)))
}

pub(crate) fn read_only_annotations(title: &str) -> ToolAnnotations {
    ToolAnnotations {
        title: Some(title.to_string()),
        read_only_hint: Some(true),
        destructive_hint: Some(false),
        idempotent_hint: Some(true),
        open_world_hint: Some(true),
    }
}

pub(crate) fn write_annotations(title: &str) -> ToolAnnotations {
    ToolAnnotations {
        title: Some(title.to_string()),
        read_only_hint: Some(false),
        destructive_hint: Some(true),
        idempotent_hint: Some(false),
        open_world_hint: Some(true),
    }
}

use rmcp::model::{JsonObject, Tool};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::errors::ToolError;
use crate::schema_from_type;
use crate::tools::{ToolDependencies, parse_arguments, write_annotations};

pub const WRITE_CYPHER_TOOL_NAME: &str = "write-cypher";

#[derive(Clone)]
pub struct WriteCypher {
    pub tool: Tool,
    deps: ToolDependencies,
}

/// Input for the write-cypher tool.
#[derive(JsonSchema, Deserialize)]
pub struct Input {
    /// The Cypher statement to execute
    query: String,

    /// Parameters to pass to the Cypher statement
    #[serde(default)]
    params: Option<Map<String, Value>>,
}

impl WriteCypher {
    pub fn new(deps: ToolDependencies) -> Self {
        let mut tool = Tool::new(
            WRITE_CYPHER_TOOL_NAME,
            "write-cypher executes Cypher statements that modify the database: CREATE, MERGE, \
             DELETE, SET, REMOVE, plus schema and admin commands. Use read-cypher for read-only \
             queries. This tool is unavailable in read-only deployments.",
            schema_from_type!(Input),
        );
        tool.annotations = Some(write_annotations("Write Cypher"));

        Self { tool, deps }
    }

    pub async fn execute(
        &self,
        ct: &CancellationToken,
        arguments: Option<&JsonObject>,
    ) -> Result<String, ToolError> {
        self.deps.emit_tool_event(WRITE_CYPHER_TOOL_NAME)?;

        let input: Input = parse_arguments(arguments)?;
        if input.query.trim().is_empty() {
            return Err(ToolError::Validation(
                "query parameter is required".to_string(),
            ));
        }

        let database = self.deps.database()?;
        info!(has_params = input.params.is_some(), "executing write query");

        let records = database
            .execute_write(ct, &input.query, input.params.as_ref())
            .await?;
        database.records_to_json(&records)
    }
}

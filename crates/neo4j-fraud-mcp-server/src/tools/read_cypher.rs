use rmcp::model::{JsonObject, Tool};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::cypher;
use crate::errors::ToolError;
use crate::schema_from_type;
use crate::tools::{ToolDependencies, parse_arguments, read_only_annotations};

pub const READ_CYPHER_TOOL_NAME: &str = "read-cypher";

#[derive(Clone)]
pub struct ReadCypher {
    pub tool: Tool,
    deps: ToolDependencies,
}

/// Input for the read-cypher tool.
#[derive(JsonSchema, Deserialize)]
pub struct Input {
    /// The Cypher query to execute
    query: String,

    /// Parameters to pass to the Cypher query
    #[serde(default)]
    params: Option<Map<String, Value>>,
}

impl ReadCypher {
    pub fn new(deps: ToolDependencies) -> Self {
        let mut tool = Tool::new(
            READ_CYPHER_TOOL_NAME,
            "read-cypher can run only read-only Cypher statements. For write operations \
             (CREATE, MERGE, DELETE, SET, etc...), schema/admin commands, or PROFILE queries, \
             use write-cypher instead.",
            schema_from_type!(Input),
        );
        tool.annotations = Some(read_only_annotations("Read Cypher"));

        Self { tool, deps }
    }

    pub async fn execute(
        &self,
        ct: &CancellationToken,
        arguments: Option<&JsonObject>,
    ) -> Result<String, ToolError> {
        self.deps.emit_tool_event(READ_CYPHER_TOOL_NAME)?;

        let input: Input = parse_arguments(arguments)?;
        if input.query.trim().is_empty() {
            return Err(ToolError::Validation(
                "query parameter is required".to_string(),
            ));
        }

        // Reject anything not provably read-only before a session is opened.
        if cypher::is_write_query(&input.query) {
            let keyword = cypher::detect_write_keyword(&input.query).unwrap_or_default();
            error!(keyword, "write operation rejected by read-cypher");
            return Err(ToolError::Validation(format!(
                "write operation detected in read-only tool: {}",
                keyword.trim_end()
            )));
        }

        let database = self.deps.database()?;
        info!(has_params = input.params.is_some(), "executing read query");

        let records = database
            .execute_read(ct, &input.query, input.params.as_ref())
            .await?;
        database.records_to_json(&records)
    }
}

use rmcp::model::{JsonObject, Tool};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::errors::ToolError;
use crate::tools::{ToolDependencies, read_only_annotations};

pub const LIST_GDS_PROCEDURES_TOOL_NAME: &str = "list-gds-procedures";

/// Enumerates the installed Graph Data Science procedures.
const GDS_PROCEDURES_QUERY: &str = "\
SHOW PROCEDURES YIELD name, description
WHERE name STARTS WITH 'gds.'
RETURN name, description";

#[derive(Clone)]
pub struct ListGdsProcedures {
    pub tool: Tool,
    deps: ToolDependencies,
}

impl ListGdsProcedures {
    pub fn new(deps: ToolDependencies) -> Self {
        let mut tool = Tool::new(
            LIST_GDS_PROCEDURES_TOOL_NAME,
            "Lists the Graph Data Science (GDS) procedures installed on the Neo4j server, with \
             their descriptions. Use this to discover available graph algorithms (community \
             detection, centrality, similarity, path finding) before running them with \
             read-cypher or write-cypher. Only available when the GDS plugin is installed.",
            JsonObject::new(),
        );
        tool.annotations = Some(read_only_annotations("List GDS Procedures"));

        Self { tool, deps }
    }

    pub async fn execute(&self, ct: &CancellationToken) -> Result<String, ToolError> {
        self.deps.emit_tool_event(LIST_GDS_PROCEDURES_TOOL_NAME)?;
        let database = self.deps.database()?;

        info!("listing installed GDS procedures");

        let records = database
            .execute_read(ct, GDS_PROCEDURES_QUERY, None)
            .await?;
        database.records_to_json(&records)
    }
}

//! Tool registry assembly and MCP dispatch. The tool table is built once at
//! startup, filtered for the deployment (read-only mode, GDS availability),
//! checked for name uniqueness, and then frozen; per-call dispatch is a
//! lookup into the frozen table.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use bon::bon;
use futures::FutureExt as _;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, ErrorCode, Implementation, InitializeRequestParam,
    InitializeResult, JsonObject, ListToolsResult, PaginatedRequestParam, ServerCapabilities,
    ServerInfo, Tool, ToolsCapability,
};
use rmcp::service::RequestContext;
use rmcp::{RoleServer, ServerHandler, ServiceExt as _, transport::stdio};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::database::Neo4jService;
use crate::errors::{McpError, ServerError, ToolError};
use crate::registry::{CatalogTool, ToolRegistry};
use crate::telemetry::TelemetryService;
use crate::tools::ToolDependencies;
use crate::tools::enrich_schema::EnrichSchema;
use crate::tools::entity_profile::GetEntityProfile;
use crate::tools::gds::ListGdsProcedures;
use crate::tools::get_schema::GetSchema;
use crate::tools::identity_overlap::DetectIdentityOverlap;
use crate::tools::read_cypher::ReadCypher;
use crate::tools::reference_models::GetReferenceModels;
use crate::tools::write_cypher::WriteCypher;

const GDS_CATEGORY: &str = "gds";

/// A Neo4j fraud MCP server.
pub struct Server {
    database: Option<Arc<Neo4jService>>,
    telemetry: Option<Arc<TelemetryService>>,
    read_only: bool,
    gds_available: bool,
    schema_sample_size: i64,
    tool_config_dir: PathBuf,
}

#[bon]
impl Server {
    #[builder]
    pub fn new(
        #[builder(required)] database: Option<Arc<Neo4jService>>,
        #[builder(required)] telemetry: Option<Arc<TelemetryService>>,
        #[builder(default)] read_only: bool,
        #[builder(default)] gds_available: bool,
        #[builder(default = 100)] schema_sample_size: i64,
        #[builder(default = PathBuf::from("tools/config"))] tool_config_dir: PathBuf,
    ) -> Self {
        Self {
            database,
            telemetry,
            read_only,
            gds_available,
            schema_sample_size,
            tool_config_dir,
        }
    }

    /// Builds the filtered, frozen tool table.
    pub fn handler(&self) -> Result<McpToolServer, ServerError> {
        let deps = ToolDependencies {
            database: self.database.clone(),
            telemetry: self.telemetry.clone(),
        };

        let mut definitions = vec![
            ToolDefinition {
                category: "schema".to_string(),
                readonly: true,
                handler: ToolHandler::GetSchema(GetSchema::new(
                    deps.clone(),
                    self.schema_sample_size,
                )),
            },
            ToolDefinition {
                category: "cypher".to_string(),
                readonly: true,
                handler: ToolHandler::ReadCypher(ReadCypher::new(deps.clone())),
            },
            ToolDefinition {
                category: "cypher".to_string(),
                readonly: false,
                handler: ToolHandler::WriteCypher(WriteCypher::new(deps.clone())),
            },
            ToolDefinition {
                category: GDS_CATEGORY.to_string(),
                readonly: true,
                handler: ToolHandler::ListGdsProcedures(ListGdsProcedures::new(deps.clone())),
            },
            ToolDefinition {
                category: "models".to_string(),
                readonly: true,
                handler: ToolHandler::ReferenceModels(GetReferenceModels::new(deps.clone())),
            },
            ToolDefinition {
                category: "data".to_string(),
                readonly: true,
                handler: ToolHandler::EntityProfile(GetEntityProfile::new(deps.clone())),
            },
            ToolDefinition {
                category: "fraud".to_string(),
                readonly: true,
                handler: ToolHandler::IdentityOverlap(DetectIdentityOverlap::new(deps.clone())),
            },
            ToolDefinition {
                category: "schema".to_string(),
                readonly: true,
                handler: ToolHandler::EnrichSchema(Box::new(EnrichSchema::new(
                    deps.clone(),
                    self.schema_sample_size,
                ))),
            },
        ];

        let mut registry = ToolRegistry::new(self.tool_config_dir.clone());
        registry.load_tools();
        for catalog_tool in registry.server_tools(&deps) {
            definitions.push(ToolDefinition {
                category: catalog_tool.category().to_string(),
                readonly: true,
                handler: ToolHandler::Catalog(Box::new(catalog_tool)),
            });
        }

        // Deployment filters: a read-only deployment drops every tool whose
        // readOnly annotation is false; absent GDS drops the GDS category.
        if self.read_only {
            definitions.retain(|definition| definition.readonly);
        }
        if !self.gds_available {
            definitions.retain(|definition| definition.category != GDS_CATEGORY);
        }

        for (i, definition) in definitions.iter().enumerate() {
            let name = definition.handler.tool().name.as_ref();
            if definitions[..i]
                .iter()
                .any(|other| other.handler.tool().name.as_ref() == name)
            {
                return Err(ServerError::DuplicateToolName(name.to_string()));
            }
        }

        info!(
            tools = definitions.len(),
            read_only = self.read_only,
            gds_available = self.gds_available,
            "tool registry assembled"
        );

        Ok(McpToolServer {
            definitions: Arc::new(definitions),
        })
    }

    /// Assembles the registry and serves MCP over stdio until the client
    /// disconnects.
    pub async fn start(self) -> Result<(), ServerError> {
        let handler = self.handler()?;

        info!("starting MCP server in stdio mode");
        let service = handler
            .serve(stdio())
            .await
            .map_err(|e| ServerError::McpInitializeError(e.to_string()))?;
        service
            .waiting()
            .await
            .map_err(|e| ServerError::McpInitializeError(e.to_string()))?;

        Ok(())
    }
}

struct ToolDefinition {
    category: String,
    readonly: bool,
    handler: ToolHandler,
}

/// Every tool handler behind one homogeneous call signature.
enum ToolHandler {
    GetSchema(GetSchema),
    ReadCypher(ReadCypher),
    WriteCypher(WriteCypher),
    ListGdsProcedures(ListGdsProcedures),
    ReferenceModels(GetReferenceModels),
    EntityProfile(GetEntityProfile),
    IdentityOverlap(DetectIdentityOverlap),
    EnrichSchema(Box<EnrichSchema>),
    Catalog(Box<CatalogTool>),
}

impl ToolHandler {
    fn tool(&self) -> &Tool {
        match self {
            ToolHandler::GetSchema(t) => &t.tool,
            ToolHandler::ReadCypher(t) => &t.tool,
            ToolHandler::WriteCypher(t) => &t.tool,
            ToolHandler::ListGdsProcedures(t) => &t.tool,
            ToolHandler::ReferenceModels(t) => &t.tool,
            ToolHandler::EntityProfile(t) => &t.tool,
            ToolHandler::IdentityOverlap(t) => &t.tool,
            ToolHandler::EnrichSchema(t) => &t.tool,
            ToolHandler::Catalog(t) => &t.tool,
        }
    }

    async fn execute(
        &self,
        ct: &CancellationToken,
        arguments: Option<&JsonObject>,
    ) -> Result<String, ToolError> {
        match self {
            ToolHandler::GetSchema(t) => t.execute(ct).await,
            ToolHandler::ReadCypher(t) => t.execute(ct, arguments).await,
            ToolHandler::WriteCypher(t) => t.execute(ct, arguments).await,
            ToolHandler::ListGdsProcedures(t) => t.execute(ct).await,
            ToolHandler::ReferenceModels(t) => t.execute(ct).await,
            ToolHandler::EntityProfile(t) => t.execute(ct, arguments).await,
            ToolHandler::IdentityOverlap(t) => t.execute(ct, arguments).await,
            ToolHandler::EnrichSchema(t) => t.execute(ct, arguments).await,
            ToolHandler::Catalog(t) => t.execute(ct, arguments).await,
        }
    }
}

/// The frozen tool table handed to the MCP transport. Cheap to clone; safe
/// for concurrent readers without locks.
#[derive(Clone)]
pub struct McpToolServer {
    definitions: Arc<Vec<ToolDefinition>>,
}

impl McpToolServer {
    pub fn tool_names(&self) -> Vec<String> {
        self.definitions
            .iter()
            .map(|definition| definition.handler.tool().name.to_string())
            .collect()
    }

    async fn call_tool_impl(
        &self,
        request: CallToolRequestParam,
        ct: CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        let tool_name = request.name.as_ref();
        let Some(definition) = self
            .definitions
            .iter()
            .find(|definition| definition.handler.tool().name.as_ref() == tool_name)
        else {
            return Err(McpError::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("Tool {tool_name} not found"),
                None,
            ));
        };

        // A panicking handler must not take the transport down with it.
        let execution = AssertUnwindSafe(definition.handler.execute(&ct, request.arguments.as_ref()))
            .catch_unwind()
            .await;

        let result = match execution {
            Ok(result) => result,
            Err(_) => {
                error!(tool = tool_name, "tool handler panicked");
                return Ok(CallToolResult::error(vec![Content::text(
                    "Internal error: the tool handler failed unexpectedly",
                )]));
            }
        };

        match result {
            Ok(text) => Ok(CallToolResult::success(vec![Content::text(text)])),
            Err(e) => {
                error!(tool = tool_name, error = %e, "tool invocation failed");
                Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
            }
        }
    }
}

impl ServerHandler for McpToolServer {
    async fn initialize(
        &self,
        _request: InitializeRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<InitializeResult, McpError> {
        Ok(self.get_info())
    }

    #[tracing::instrument(skip_all, fields(tool_name = request.name.as_ref()))]
    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.call_tool_impl(request, context.ct).await
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            next_cursor: None,
            tools: self
                .definitions
                .iter()
                .map(|definition| definition.handler.tool().clone())
                .collect(),
        })
    }

    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "Neo4j Fraud MCP Server".to_string(),
                title: Some("Neo4j Fraud MCP Server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: None,
                }),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

use std::fmt;

use url::ParseError;

/// An error in server initialization
#[derive(Debug)]
pub enum ServerError {
    /// The configuration file could not be read
    ReadConfig(std::io::Error),
    /// The configuration file could not be parsed
    ParseConfig(serde_yaml::Error),
    /// The Neo4j driver could not be configured or connected
    Driver(neo4rs::Error),
    /// Two tools in the final registry share a name
    DuplicateToolName(String),
    /// The MCP transport failed to initialize
    McpInitializeError(String),
    UrlParseError(ParseError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::ReadConfig(e) => write!(f, "Could not read configuration file: {}", e),
            ServerError::ParseConfig(e) => write!(f, "Invalid configuration: {}", e),
            ServerError::Driver(e) => write!(f, "Neo4j driver error: {}", e),
            ServerError::DuplicateToolName(name) => {
                write!(f, "Duplicate tool name in registry: {}", name)
            }
            ServerError::McpInitializeError(msg) => {
                write!(f, "Failed to initialize MCP server: {}", msg)
            }
            ServerError::UrlParseError(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::ReadConfig(e) => Some(e),
            ServerError::ParseConfig(e) => Some(e),
            ServerError::Driver(e) => Some(e),
            ServerError::UrlParseError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        ServerError::ReadConfig(e)
    }
}

impl From<serde_yaml::Error> for ServerError {
    fn from(e: serde_yaml::Error) -> Self {
        ServerError::ParseConfig(e)
    }
}

impl From<neo4rs::Error> for ServerError {
    fn from(e: neo4rs::Error) -> Self {
        ServerError::Driver(e)
    }
}

impl From<ParseError> for ServerError {
    fn from(e: ParseError) -> Self {
        ServerError::UrlParseError(e)
    }
}

/// A per-invocation tool error. Every variant becomes an error result on the
/// tool call; the transport keeps serving.
#[derive(Debug)]
pub enum ToolError {
    /// The inputs failed the tool's contract
    Validation(String),
    /// A required subsystem is not initialized
    Dependency(String),
    /// The Cypher driver returned an error
    Query(neo4rs::Error),
    /// Schema extraction failed while the database is non-empty
    Schema(String),
    /// All external documents failed to fetch
    Fetch(String),
    /// The request-scoped context terminated the operation
    Cancelled,
    /// Record-to-JSON conversion failed
    Marshal(String),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::Validation(msg) => write!(f, "{}", msg),
            ToolError::Dependency(what) => write!(f, "{} is not initialized", what),
            ToolError::Query(e) => write!(f, "{}", e),
            ToolError::Schema(msg) => write!(f, "{}", msg),
            ToolError::Fetch(msg) => write!(f, "{}", msg),
            ToolError::Cancelled => write!(f, "The operation was cancelled"),
            ToolError::Marshal(msg) => write!(f, "Failed to convert query results: {}", msg),
        }
    }
}

impl std::error::Error for ToolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ToolError::Query(e) => Some(e),
            _ => None,
        }
    }
}

impl From<neo4rs::Error> for ToolError {
    fn from(e: neo4rs::Error) -> Self {
        ToolError::Query(e)
    }
}

/// An MCP tool error
pub type McpError = rmcp::model::ErrorData;

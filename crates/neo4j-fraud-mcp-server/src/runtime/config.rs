use std::env;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::Deserialize;
use url::Url;

use crate::errors::ServerError;
use crate::runtime::logging::Logging;

/// Configuration for the MCP server, read from an optional YAML file with
/// environment-variable overrides for the connection settings.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Bolt URI of the Neo4j server
    pub uri: String,

    /// Neo4j username
    pub username: String,

    /// Neo4j password
    pub password: Option<String>,

    /// The database selected for every session
    pub database: String,

    /// Expose only read-only tools
    pub read_only: bool,

    /// Sample size passed to schema extraction
    pub schema_sample_size: i64,

    /// Fallback directory of YAML tool descriptors, used when the embedded
    /// catalog is empty
    pub tool_config_dir: PathBuf,

    /// Logging options
    pub logging: Logging,

    /// Usage telemetry options
    pub telemetry: TelemetryConfig,

    /// Graph Data Science options
    pub gds: GdsConfig,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Emit usage events
    pub enabled: bool,

    /// Endpoint receiving usage events
    #[schemars(with = "String")]
    pub endpoint: Url,
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct GdsConfig {
    /// Force GDS tool availability instead of detecting it at startup
    pub available: Option<bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            uri: defaults::uri(),
            username: defaults::username(),
            password: None,
            database: defaults::database(),
            read_only: false,
            schema_sample_size: defaults::schema_sample_size(),
            tool_config_dir: defaults::tool_config_dir(),
            logging: Logging::default(),
            telemetry: TelemetryConfig::default(),
            gds: GdsConfig::default(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: defaults::telemetry_endpoint(),
        }
    }
}

impl Default for GdsConfig {
    fn default() -> Self {
        Self { available: None }
    }
}

impl Config {
    /// Reads the config file when given, then applies `NEO4J_*` environment
    /// overrides on top.
    pub fn load(path: Option<&Path>) -> Result<Self, ServerError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                serde_yaml::from_str(&raw)?
            }
            None => Self::default(),
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(uri) = env::var("NEO4J_URI") {
            self.uri = uri;
        }
        if let Ok(username) = env::var("NEO4J_USERNAME") {
            self.username = username;
        }
        if let Ok(password) = env::var("NEO4J_PASSWORD") {
            self.password = Some(password);
        }
        if let Ok(database) = env::var("NEO4J_DATABASE") {
            self.database = database;
        }
        if let Ok(read_only) = env::var("NEO4J_READ_ONLY") {
            self.read_only = matches!(read_only.as_str(), "1" | "true" | "yes");
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use url::Url;

    pub(super) fn uri() -> String {
        "neo4j://localhost:7687".to_string()
    }

    pub(super) fn username() -> String {
        "neo4j".to_string()
    }

    pub(super) fn database() -> String {
        "neo4j".to_string()
    }

    pub(super) fn schema_sample_size() -> i64 {
        100
    }

    pub(super) fn tool_config_dir() -> PathBuf {
        PathBuf::from("tools/config")
    }

    pub(super) fn telemetry_endpoint() -> Url {
        Url::parse("https://telemetry.neo4j.io/mcp/events")
            .expect("default telemetry endpoint is a valid URL")
    }
}

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use neo4j_fraud_mcp_server::database::Neo4jService;
use neo4j_fraud_mcp_server::runtime::Config;
use neo4j_fraud_mcp_server::server::Server;
use neo4j_fraud_mcp_server::telemetry::TelemetryService;

/// Clap styling
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Debug, clap::Parser)]
#[command(
    styles = STYLES,
    version,
    about = "Neo4j Fraud MCP Server - explore a fraud detection graph from an AI agent",
)]
struct Args {
    /// Path to a YAML configuration file
    #[clap(long, short = 'c')]
    config: Option<PathBuf>,

    /// Expose only read-only tools, regardless of the config file
    #[clap(long)]
    read_only: bool,
}

/// Counts installed GDS procedures to decide whether the GDS tool category
/// should be registered.
const GDS_DETECTION_QUERY: &str =
    "SHOW PROCEDURES YIELD name WHERE name STARTS WITH 'gds.' RETURN count(*) as procedures";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("could not load configuration")?;
    if args.read_only {
        config.read_only = true;
    }

    config.logging.init();

    let password = config
        .password
        .clone()
        .context("Neo4j password is required (config `password` or NEO4J_PASSWORD)")?;

    let database = Arc::new(
        Neo4jService::connect(&config.uri, &config.username, &password, &config.database)
            .await
            .context("could not connect to Neo4j")?,
    );
    info!(uri = %config.uri, database = %config.database, "connected to Neo4j");

    let gds_available = match config.gds.available {
        Some(available) => available,
        None => detect_gds(&database).await,
    };

    let telemetry = Arc::new(TelemetryService::new(
        config.telemetry.endpoint.clone(),
        config.telemetry.enabled,
    ));
    let startup_event = telemetry.new_startup_event(env!("CARGO_PKG_VERSION"), "stdio");
    telemetry.emit_event(startup_event);

    let server = Server::builder()
        .database(Some(database))
        .telemetry(Some(telemetry))
        .read_only(config.read_only)
        .gds_available(gds_available)
        .schema_sample_size(config.schema_sample_size)
        .tool_config_dir(config.tool_config_dir.clone())
        .build();

    server.start().await?;
    Ok(())
}

async fn detect_gds(database: &Neo4jService) -> bool {
    let ct = CancellationToken::new();
    match database.execute_read(&ct, GDS_DETECTION_QUERY, None).await {
        Ok(rows) => {
            let procedures = rows
                .first()
                .and_then(|row| row.get::<i64>("procedures").ok())
                .unwrap_or(0);
            info!(procedures, "detected GDS procedures");
            procedures > 0
        }
        Err(e) => {
            warn!(error = %e, "GDS detection failed, disabling GDS tools");
            false
        }
    }
}

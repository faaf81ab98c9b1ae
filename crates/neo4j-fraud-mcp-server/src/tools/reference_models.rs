//! Fetches canonical Neo4j reference data-model documents from a small
//! allow-list of URLs, bounded in time and size.

use std::time::Duration;

use rmcp::model::{JsonObject, Tool};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use crate::errors::ToolError;
use crate::tools::{ToolDependencies, read_only_annotations};

pub const REFERENCE_MODELS_TOOL_NAME: &str = "get-data-models";

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Combined payload cap, chosen to keep tool responses well under client
/// timeouts.
const MAX_REFERENCE_MODEL_CHARS: usize = 15_000;

const TRUNCATION_SENTINEL: &str =
    "\n\n...[Reference models truncated for size - full models available at neo4j.com/developer]...";

pub const DEFAULT_REFERENCE_MODEL_URLS: &[&str] = &[
    "https://neo4j.com/developer/industry-use-cases/_attachments/transaction-base-model.txt",
    "https://neo4j.com/developer/industry-use-cases/_attachments/fraud-event-sequence-model.txt",
];

#[derive(Clone)]
pub struct GetReferenceModels {
    pub tool: Tool,
    deps: ToolDependencies,
    urls: Vec<Url>,
}

impl GetReferenceModels {
    pub fn new(deps: ToolDependencies) -> Self {
        let urls = DEFAULT_REFERENCE_MODEL_URLS
            .iter()
            .filter_map(|url| Url::parse(url).ok())
            .collect();
        Self::with_urls(deps, urls)
    }

    pub fn with_urls(deps: ToolDependencies, urls: Vec<Url>) -> Self {
        let mut tool = Tool::new(
            REFERENCE_MODELS_TOOL_NAME,
            "Fetches the canonical Neo4j reference data models for financial services: the \
             transaction base model and the fraud event sequence model. Compare these against \
             the get-schema output to understand how your database aligns with Neo4j best \
             practices, and to identify missing recommended node labels, relationships, or \
             properties.",
            JsonObject::new(),
        );
        tool.annotations = Some(read_only_annotations("Get Reference Data Models"));

        Self { tool, deps, urls }
    }

    pub async fn execute(&self, ct: &CancellationToken) -> Result<String, ToolError> {
        self.deps.emit_tool_event(REFERENCE_MODELS_TOOL_NAME)?;

        info!("fetching Neo4j reference data models");

        let fetch_all = async {
            let client = reqwest::Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .unwrap_or_default();

            let mut reference_models = Vec::new();
            for url in &self.urls {
                match fetch_reference_model(&client, url).await {
                    Ok(content) => reference_models.push(format!(
                        "=== Reference Model from {} ===\n{}",
                        url, content
                    )),
                    Err(e) => {
                        warn!(url = %url, error = %e, "failed to fetch reference model");
                    }
                }
            }
            reference_models
        };

        let reference_models = tokio::select! {
            _ = ct.cancelled() => return Err(ToolError::Cancelled),
            models = fetch_all => models,
        };

        if reference_models.is_empty() {
            warn!("no reference models could be loaded");
            return Err(ToolError::Fetch(
                "Failed to fetch reference models from Neo4j".to_string(),
            ));
        }

        let combined = reference_models.join("\n\n");
        let truncated = truncate_reference_model(&combined, MAX_REFERENCE_MODEL_CHARS);

        info!(size = truncated.len(), "returning reference models");
        Ok(truncated)
    }
}

pub(crate) async fn fetch_reference_model(
    client: &reqwest::Client,
    url: &Url,
) -> Result<String, String> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| format!("failed to fetch URL: {}", e))?;

    if !response.status().is_success() {
        return Err(format!("unexpected status code: {}", response.status()));
    }

    response
        .text()
        .await
        .map_err(|e| format!("failed to read response body: {}", e))
}

/// Truncates at the character budget, preferring the last newline within the
/// final 500 characters so a line is never cut mid-way, then appends the
/// ellipsis sentinel.
fn truncate_reference_model(reference_model: &str, max_chars: usize) -> String {
    if reference_model.len() <= max_chars {
        return reference_model.to_string();
    }

    let mut end = max_chars;
    while !reference_model.is_char_boundary(end) {
        end -= 1;
    }
    let mut truncated = &reference_model[..end];

    if let Some(last_newline) = truncated.rfind('\n') {
        if last_newline > max_chars.saturating_sub(500) {
            truncated = &truncated[..last_newline];
        }
    }

    format!("{}{}", truncated, TRUNCATION_SENTINEL)
}

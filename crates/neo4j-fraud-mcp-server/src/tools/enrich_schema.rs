//! Schema enrichment: pairs the raw database schema with the Neo4j reference
//! data models and returns a structured prompt the LLM client uses to enrich
//! the schema with business context. The matching itself happens client-side.

use std::time::Duration;

use rmcp::model::{JsonObject, Tool};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use crate::errors::ToolError;
use crate::schema_from_type;
use crate::tools::get_schema::GetSchema;
use crate::tools::reference_models::{DEFAULT_REFERENCE_MODEL_URLS, fetch_reference_model};
use crate::tools::{ToolDependencies, parse_arguments, read_only_annotations};

pub const ENRICH_SCHEMA_TOOL_NAME: &str = "enrich-schema";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct EnrichSchema {
    pub tool: Tool,
    deps: ToolDependencies,
    get_schema: GetSchema,
}

/// Input for the enrich-schema tool.
#[derive(JsonSchema, Deserialize, Default)]
pub struct Input {
    /// Comma-separated list of URLs to Neo4j reference data model files
    #[serde(default)]
    reference_model_urls: Option<String>,

    /// Path to a local reference data model documentation file
    #[serde(default)]
    reference_model_path: Option<String>,
}

/// The structured payload handed back to the LLM client.
#[derive(Serialize)]
struct EnrichmentRequest {
    raw_schema: String,
    reference_model: String,
    prompt: String,
    instructions: String,
}

impl EnrichSchema {
    pub fn new(deps: ToolDependencies, sample_size: i64) -> Self {
        let mut tool = Tool::new(
            ENRICH_SCHEMA_TOOL_NAME,
            "Provides enrichment context and an LLM prompt for intelligent schema analysis.\n\n\
             PREREQUISITE: get-schema describes the raw structure; this tool pairs it with \
             Neo4j reference data models for enrichment.\n\n\
             WORKFLOW:\n\
             1. This tool retrieves the raw schema and fetches Neo4j reference data models\n\
             2. It returns a structured prompt for LLM-powered enrichment\n\
             3. Use the prompt and reference models to match and enrich the raw schema\n\n\
             The enrichment adds property descriptions and business meanings, relationship \
             semantics, alignment with Neo4j best practices, suggestions for missing \
             recommended properties, and fuzzy matching for property and node names \
             (e.g. 'cust_id' to 'customerId').\n\n\
             RETURNS: JSON with raw_schema, reference_model, prompt, and instructions.",
            schema_from_type!(Input),
        );
        tool.annotations = Some(read_only_annotations("Enrich Neo4j Schema with Context"));

        Self {
            get_schema: GetSchema::new(deps.clone(), sample_size),
            tool,
            deps,
        }
    }

    pub async fn execute(
        &self,
        ct: &CancellationToken,
        arguments: Option<&JsonObject>,
    ) -> Result<String, ToolError> {
        self.deps.emit_tool_event(ENRICH_SCHEMA_TOOL_NAME)?;

        info!("enriching schema with contextual information");

        let raw_schema = self.get_schema.execute(ct).await?;

        let input: Input = parse_arguments(arguments).unwrap_or_default();
        let reference_model = load_reference_models(ct, &input).await?;

        let prompt = build_enrichment_prompt(&raw_schema, &reference_model);
        let response = EnrichmentRequest {
            raw_schema,
            reference_model,
            prompt,
            instructions: ENRICHMENT_INSTRUCTIONS.to_string(),
        };

        serde_json::to_string_pretty(&response).map_err(|e| ToolError::Marshal(e.to_string()))
    }
}

async fn load_reference_models(ct: &CancellationToken, input: &Input) -> Result<String, ToolError> {
    let mut urls: Vec<Url> = input
        .reference_model_urls
        .as_deref()
        .map(parse_url_list)
        .unwrap_or_default();

    let local_path = input.reference_model_path.as_deref().filter(|p| !p.is_empty());
    if urls.is_empty() && local_path.is_none() {
        urls = DEFAULT_REFERENCE_MODEL_URLS
            .iter()
            .filter_map(|url| Url::parse(url).ok())
            .collect();
    }

    let fetch_all = async {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_default();

        let mut models = Vec::new();
        for url in &urls {
            match fetch_reference_model(&client, url).await {
                Ok(content) => {
                    models.push(format!("=== Reference Model from {} ===\n{}", url, content));
                }
                Err(e) => warn!(url = %url, error = e, "failed to fetch reference model"),
            }
        }
        models
    };

    let mut models = tokio::select! {
        _ = ct.cancelled() => return Err(ToolError::Cancelled),
        models = fetch_all => models,
    };

    if let Some(path) = local_path {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                models.push(format!("=== Local Reference Model from {} ===\n{}", path, content));
            }
            Err(e) => warn!(path, error = %e, "failed to load reference model from file"),
        }
    }

    if models.is_empty() {
        warn!("no reference models could be loaded, proceeding without them");
        return Ok("No reference models available".to_string());
    }

    Ok(models.join("\n\n"))
}

fn parse_url_list(urls: &str) -> Vec<Url> {
    urls.split(',')
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .filter_map(|url| match Url::parse(url) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(url, error = %e, "ignoring invalid reference model URL");
                None
            }
        })
        .collect()
}

fn build_enrichment_prompt(raw_schema: &str, reference_model: &str) -> String {
    format!(
        "You are a Neo4j data modeling expert specializing in graph database schemas and fraud \
         detection patterns.\n\n\
         TASK:\n\
         Analyze the raw database schema and enrich it with contextual information by matching \
         it against Neo4j reference data models and best practices.\n\n\
         RAW DATABASE SCHEMA:\n{}\n\n\
         REFERENCE DATA MODEL:\n{}\n\n\
         INSTRUCTIONS:\n\
         1. Parse the raw schema to understand the current structure\n\
         2. Study the reference model for recommended patterns and property descriptions\n\
         3. Match schema elements, handling fuzzy names (e.g. 'cust_id' matches 'customerId') \
         and scoring each match from 0.0 to 1.0\n\
         4. For each matched node and relationship, add business descriptions, property \
         meanings, and fraud detection context where relevant\n\
         5. Identify missing recommended properties, relationships, constraints, and indexes\n\
         6. Note deviations from the reference patterns\n\n\
         OUTPUT FORMAT:\n\
         Return a JSON object with the enriched schema and a summary of findings.",
        raw_schema, reference_model
    )
}

const ENRICHMENT_INSTRUCTIONS: &str = "\
This tool provides the raw database schema and reference data model for LLM-powered enrichment.

The LLM should:
1. Parse the raw schema to understand current database structure
2. Study the reference model to understand best practices and recommended patterns
3. Intelligently match nodes, relationships, and properties (handling fuzzy matches and synonyms)
4. Enrich each schema element with business descriptions, relationship semantics, confidence \
scores, suggestions for missing recommended fields, and deviations from best practices
5. Return a structured JSON with the enriched schema and a summary";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_list_parsing_trims_and_skips_empties() {
        let urls = parse_url_list("https://a.example/x.txt , ,https://b.example/y.txt,");
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0].as_str(), "https://a.example/x.txt");
        assert_eq!(urls[1].as_str(), "https://b.example/y.txt");
    }

    #[test]
    fn invalid_urls_are_ignored() {
        let urls = parse_url_list("not a url,https://ok.example/model.txt");
        assert_eq!(urls.len(), 1);
    }

    #[test]
    fn prompt_embeds_schema_and_reference_model() {
        let prompt = build_enrichment_prompt("SCHEMA-TEXT", "MODEL-TEXT");
        assert!(prompt.contains("RAW DATABASE SCHEMA:\nSCHEMA-TEXT"));
        assert!(prompt.contains("REFERENCE DATA MODEL:\nMODEL-TEXT"));
    }

    #[tokio::test]
    async fn local_file_contributes_a_reference_model() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"local model content").unwrap();

        let input = Input {
            reference_model_urls: None,
            reference_model_path: Some(file.path().to_string_lossy().into_owned()),
        };

        let combined = load_reference_models(&CancellationToken::new(), &input)
            .await
            .unwrap();
        assert!(combined.contains("=== Local Reference Model from"));
        assert!(combined.contains("local model content"));
    }
}

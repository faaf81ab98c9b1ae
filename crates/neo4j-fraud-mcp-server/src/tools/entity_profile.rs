//! Schema-aware entity profile retrieval: synthesizes one Cypher query from
//! caller-supplied attribute mappings and fetches an entity plus its
//! categorized attribute collections in a single round trip.

use std::fmt::Write as _;

use rmcp::model::{JsonObject, Tool};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::ToolError;
use crate::query_builder::{
    AttributeMapping, EntityConfig, OptionalMatchBuilder, build_property_map,
    group_mappings_by_category,
};
use crate::schema_from_type;
use crate::tools::{ToolDependencies, parse_arguments, read_only_annotations};

pub const ENTITY_PROFILE_TOOL_NAME: &str = "get-entity-profile";

#[derive(Clone)]
pub struct GetEntityProfile {
    pub tool: Tool,
    deps: ToolDependencies,
}

/// Input for the get-entity-profile tool.
#[derive(JsonSchema, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Input {
    /// Entity ID to retrieve the profile for
    entity_id: String,

    /// Configuration for the entity node (node label, ID property, base
    /// properties)
    entity_config: EntityConfig,

    /// Attribute mappings discovered from the schema. Use get-schema to
    /// discover these first.
    #[serde(default)]
    attribute_mappings: Vec<AttributeMapping>,
}

impl GetEntityProfile {
    pub fn new(deps: ToolDependencies) -> Self {
        let mut tool = Tool::new(
            ENTITY_PROFILE_TOOL_NAME,
            "Retrieves a comprehensive entity profile from the graph database.\n\n\
             **SCHEMA-AWARE DESIGN:**\n\
             This tool dynamically adapts to your database schema. It does NOT make assumptions \
             about relationship names, node labels, or property names.\n\n\
             **REQUIRED WORKFLOW:**\n\
             1. Call get-schema to discover your database structure\n\
             2. Analyze the entity node to identify attribute relationships \
             (e.g. HAS_EMAIL, HAS_PHONE, HAS_SSN, HAS_ADDRESS)\n\
             3. For each attribute, construct an attributeMapping with relationshipType, \
             targetLabel, identifierProperty, attributeCategory, and optional includeProperties\n\
             4. Pass the discovered mappings to this tool's attributeMappings parameter\n\n\
             **OUTPUT STRUCTURE:**\n\
             Returns a structured profile organized by attribute categories: base_details from \
             the entity node, then one section per attributeCategory (e.g. contact_information, \
             identity_documents, account_information).\n\n\
             **IMPORTANT NOTES:**\n\
             - Uses OPTIONAL MATCH, so missing relationships return empty arrays, not errors\n\
             - Works for ANY node label: Customer, Person, Account, Business\n\
             - Suitable for SAR subject details, KYC/CDD checks, and general investigation",
            schema_from_type!(Input),
        );
        tool.annotations = Some(read_only_annotations("Get Entity Profile"));

        Self { tool, deps }
    }

    pub async fn execute(
        &self,
        ct: &CancellationToken,
        arguments: Option<&JsonObject>,
    ) -> Result<String, ToolError> {
        self.deps.emit_tool_event(ENTITY_PROFILE_TOOL_NAME)?;

        let input: Input = parse_arguments(arguments)?;

        if input.entity_id.is_empty() {
            return Err(ToolError::Validation(
                "entityId parameter is required".to_string(),
            ));
        }
        input.entity_config.validate().map_err(ToolError::Validation)?;
        if input.attribute_mappings.is_empty() {
            return Err(ToolError::Validation(
                "attributeMappings parameter is required and cannot be empty. \
                 Use get-schema to discover available attributes first."
                    .to_string(),
            ));
        }

        let database = self.deps.database()?;

        info!(
            entity_id = %input.entity_id,
            entity_label = %input.entity_config.node_label,
            attribute_mappings = input.attribute_mappings.len(),
            "retrieving entity profile"
        );

        let query = build_profile_query(&input.entity_config, &input.attribute_mappings);
        debug!(query = %query, "executing entity profile query");

        let params = match json!({ "entityId": input.entity_id }) {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let records = database.execute_read(ct, &query, Some(&params)).await?;
        database.records_to_json(&records)
    }
}

/// Synthesizes the profile query. All aggregation happens in the WITH stage;
/// the RETURN stage only composes pre-aggregated aliases, so collect(...) is
/// never mixed with bare node-property access.
pub(crate) fn build_profile_query(
    entity_config: &EntityConfig,
    mappings: &[AttributeMapping],
) -> String {
    let mut query = String::new();

    let _ = writeln!(
        query,
        "MATCH (e:{} {{{}: $entityId}})",
        entity_config.node_label, entity_config.id_property
    );

    let categorized = group_mappings_by_category(mappings);

    // One OPTIONAL MATCH per mapping, grouped by category so collection
    // aliases line up with their clauses.
    let mut match_builder = OptionalMatchBuilder::new();
    let mut vars_by_category: Vec<(String, Vec<String>)> = Vec::new();
    for (category, category_mappings) in &categorized {
        let vars = category_mappings
            .iter()
            .map(|mapping| match_builder.add_attribute_match("e", mapping))
            .collect();
        vars_by_category.push((category.clone(), vars));
    }

    if match_builder.clause_count() > 0 {
        query.push_str(&match_builder.build());
        query.push('\n');
    }

    // Aggregate every collection in WITH so RETURN sees only plain aliases.
    query.push_str("WITH e");

    let mut aliases_by_category: Vec<(String, Vec<(String, String)>)> = Vec::new();
    for ((category, category_mappings), (_, vars)) in categorized.iter().zip(&vars_by_category) {
        let mut aliases = Vec::new();
        for (mapping, var_name) in category_mappings.iter().zip(vars) {
            let prop_map = build_property_map(var_name, mapping);
            let collection_key = format!("{}s", mapping.target_label.to_lowercase());
            let alias = format!("{}_{}", category.replace('-', "_"), collection_key);

            let _ = write!(query, ",\n     collect(DISTINCT {}) as {}", prop_map, alias);
            aliases.push((collection_key, alias));
        }
        aliases_by_category.push((category.clone(), aliases));
    }
    query.push('\n');

    query.push_str("RETURN {\n");
    query.push_str("  base_details: ");
    if entity_config.base_properties.is_empty() {
        query.push_str("properties(e)");
    } else {
        query.push_str("{\n");
        for (i, prop) in entity_config.base_properties.iter().enumerate() {
            if i > 0 {
                query.push_str(",\n");
            }
            let _ = write!(query, "    {}: e.{}", prop, prop);
        }
        query.push_str("\n  }");
    }

    for (category, aliases) in &aliases_by_category {
        query.push_str(",\n");
        let _ = write!(query, "  {}: {{\n", category);
        for (i, (collection_key, alias)) in aliases.iter().enumerate() {
            if i > 0 {
                query.push_str(",\n");
            }
            let _ = write!(query, "    {}: {}", collection_key, alias);
        }
        query.push_str("\n  }");
    }

    query.push_str("\n} as entityProfile");

    query
}

//! Schema-aware identity overlap detection: finds entities sharing multiple
//! identity attribute nodes, either around a specific entity (investigation)
//! or across the whole graph (discovery).

use std::fmt::Write as _;

use rmcp::model::{JsonObject, Tool};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::ToolError;
use crate::query_builder::EntityConfig;
use crate::schema_from_type;
use crate::tools::{ToolDependencies, parse_arguments, read_only_annotations};

pub const IDENTITY_OVERLAP_TOOL_NAME: &str = "detect-identity-overlap";

const DEFAULT_MIN_SHARED_ATTRIBUTES: i64 = 2;
const DEFAULT_LIMIT: i64 = 20;

/// One identity-bearing relationship discovered from the schema: how the
/// entity connects to an identifier node and which property identifies it.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PiiRelationship {
    /// The relationship type connecting the entity to the identifier
    /// (e.g. HAS_EMAIL)
    pub relationship_type: String,

    /// The node label of the identifier entity (e.g. Email)
    pub target_label: String,

    /// The property containing the identifier value (e.g. address for Email)
    pub identifier_property: String,
}

#[derive(Clone)]
pub struct DetectIdentityOverlap {
    pub tool: Tool,
    deps: ToolDependencies,
}

/// Input for the detect-identity-overlap tool.
#[derive(JsonSchema, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Input {
    /// Optional entity ID to investigate. When provided, finds entities
    /// sharing identifiers with this specific entity; when omitted,
    /// discovers all clusters of entities sharing identifiers.
    #[serde(default)]
    entity_id: Option<String>,

    /// Configuration for the entity node (node label, ID property, display
    /// properties)
    entity_config: EntityConfig,

    /// Identity relationship configurations discovered from the schema.
    /// Use get-schema to discover these first.
    #[serde(default)]
    pii_relationships: Vec<PiiRelationship>,

    /// Minimum number of shared identity attributes to flag as suspicious
    #[serde(default)]
    min_shared_attributes: Option<i64>,

    /// Maximum number of results to return
    #[serde(default)]
    limit: Option<i64>,
}

impl DetectIdentityOverlap {
    pub fn new(deps: ToolDependencies) -> Self {
        let mut tool = Tool::new(
            IDENTITY_OVERLAP_TOOL_NAME,
            "Detects potential synthetic identity fraud by identifying entities that share \
             multiple identity attributes (PII). Operates in two modes:\n\n\
             **MODE 1 - Discovery Mode (entityId omitted):**\n\
             Discovers all clusters of entities sharing PII across the database. Use this to \
             find fraud patterns proactively.\n\n\
             **MODE 2 - Investigation Mode (entityId provided):**\n\
             Finds entities sharing PII with a specific target entity. Use this for targeted \
             fraud investigation.\n\n\
             **REQUIRED WORKFLOW - Schema Discovery:**\n\
             1. Call get-schema to retrieve the database schema\n\
             2. Analyze the entity node to find its PII relationships \
             (e.g. HAS_EMAIL, HAS_PHONE, HAS_SSN, HAS_PASSPORT)\n\
             3. For each PII relationship, identify relationshipType, targetLabel, and \
             identifierProperty\n\
             4. Pass the discovered relationships to this tool's piiRelationships parameter\n\n\
             **Fraud indicators this reveals:**\n\
             - CRITICAL: Multiple entities sharing 3+ identity attributes \
             (likely organized fraud ring)\n\
             - HIGH RISK: Multiple entities sharing 2+ identity attributes \
             (synthetic identity pattern)\n\
             - MEDIUM RISK: Shared single identity attribute \
             (may be legitimate family/business)\n\n\
             **Returns:** entities sharing identity attributes, which attributes are shared \
             (with type and value), and the shared-attribute count per connection.",
            schema_from_type!(Input),
        );
        tool.annotations = Some(read_only_annotations("Detect Identity Overlap"));

        Self { tool, deps }
    }

    pub async fn execute(
        &self,
        ct: &CancellationToken,
        arguments: Option<&JsonObject>,
    ) -> Result<String, ToolError> {
        self.deps.emit_tool_event(IDENTITY_OVERLAP_TOOL_NAME)?;

        let input: Input = parse_arguments(arguments)?;

        input.entity_config.validate().map_err(ToolError::Validation)?;
        if input.pii_relationships.is_empty() {
            return Err(ToolError::Validation(
                "piiRelationships parameter is required and cannot be empty. \
                 Use get-schema to discover available PII relationships first."
                    .to_string(),
            ));
        }

        let min_shared = match input.min_shared_attributes {
            Some(value) if value > 0 => value,
            _ => DEFAULT_MIN_SHARED_ATTRIBUTES,
        };
        let limit = match input.limit {
            Some(value) if value > 0 => value,
            _ => DEFAULT_LIMIT,
        };

        let entity_id = input.entity_id.as_deref().filter(|id| !id.is_empty());
        let mode = if entity_id.is_some() {
            "investigation"
        } else {
            "discovery"
        };

        info!(
            mode,
            entity_label = %input.entity_config.node_label,
            pii_relationships = input.pii_relationships.len(),
            min_shared_attributes = min_shared,
            limit,
            "detecting identity overlap"
        );

        let database = self.deps.database()?;

        let (query, params) = match entity_id {
            Some(entity_id) => {
                let query =
                    build_investigation_query(&input.entity_config, &input.pii_relationships);
                let params = json!({
                    "entityId": entity_id,
                    "minSharedAttributes": min_shared,
                    "limit": limit,
                });
                (query, params)
            }
            None => {
                let query = build_discovery_query(&input.entity_config, &input.pii_relationships);
                let params = json!({
                    "minSharedAttributes": min_shared,
                    "limit": limit,
                });
                (query, params)
            }
        };

        debug!(query = %query, "executing identity overlap query");

        let params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let records = database.execute_read(ct, &query, Some(&params)).await?;
        database.records_to_json(&records)
    }
}

/// Relationship alternation (`HAS_EMAIL|HAS_PHONE|...`) and the CASE ladder
/// extracting the identifier value per target label, in caller order with an
/// 'Unknown' fallthrough.
fn build_query_components(pii_relationships: &[PiiRelationship]) -> (String, String) {
    let rel_pattern = pii_relationships
        .iter()
        .map(|pii| pii.relationship_type.as_str())
        .collect::<Vec<_>>()
        .join("|");

    let case_statement = pii_relationships
        .iter()
        .map(|pii| {
            format!(
                "WHEN identifier:{} THEN identifier.{}",
                pii.target_label, pii.identifier_property
            )
        })
        .collect::<Vec<_>>()
        .join("\n             ");

    (rel_pattern, case_statement)
}

/// Display-property selection follows the profile tool's base-properties
/// convention: an explicit list projects each property, an empty list falls
/// back to properties(). Every alias carries the prefix: discovery mode
/// projects the same property list for both endpoints, and Neo4j rejects
/// duplicate result column names.
fn display_projection(entity_config: &EntityConfig, var: &str, prefix: &str) -> String {
    if entity_config.display_properties.is_empty() {
        return format!("properties({}) as {}Properties", var, prefix);
    }

    entity_config
        .display_properties
        .iter()
        .map(|prop| format!("{}.{} as {}{}", var, prop, prefix, capitalize(prop)))
        .collect::<Vec<_>>()
        .join(",\n       ")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub(crate) fn build_investigation_query(
    entity_config: &EntityConfig,
    pii_relationships: &[PiiRelationship],
) -> String {
    let (rel_pattern, case_statement) = build_query_components(pii_relationships);
    let label = &entity_config.node_label;
    let id_prop = &entity_config.id_property;

    let mut query = String::new();
    let _ = writeln!(query, "MATCH (target:{} {{{}: $entityId}})", label, id_prop);
    let _ = writeln!(query, "MATCH (target)-[r:{}]->(identifier)", rel_pattern);
    let _ = writeln!(
        query,
        "MATCH (identifier)<-[r2:{}]-(other:{})",
        rel_pattern, label
    );
    let _ = writeln!(query, "WHERE target.{} <> other.{}", id_prop, id_prop);
    query.push_str("WITH other,\n");
    query.push_str("     collect(DISTINCT {\n");
    query.push_str("         type: type(r2),\n");
    query.push_str("         identifier: CASE\n");
    let _ = writeln!(query, "             {}", case_statement);
    query.push_str("             ELSE 'Unknown'\n");
    query.push_str("         END\n");
    query.push_str("     }) as sharedAttributes\n");
    query.push_str("WHERE size(sharedAttributes) >= $minSharedAttributes\n");
    let _ = writeln!(query, "RETURN other.{} as {},", id_prop, id_prop);
    let _ = writeln!(
        query,
        "       {},",
        display_projection(entity_config, "other", "entity")
    );
    query.push_str("       sharedAttributes,\n");
    query.push_str("       size(sharedAttributes) as sharedAttributeCount\n");
    query.push_str("ORDER BY sharedAttributeCount DESC\n");
    query.push_str("LIMIT $limit");

    query
}

pub(crate) fn build_discovery_query(
    entity_config: &EntityConfig,
    pii_relationships: &[PiiRelationship],
) -> String {
    let (rel_pattern, case_statement) = build_query_components(pii_relationships);
    let label = &entity_config.node_label;
    let id_prop = &entity_config.id_property;

    let mut query = String::new();
    let _ = writeln!(
        query,
        "MATCH (e1:{})-[r1:{}]->(identifier)<-[r2:{}]-(e2:{})",
        label, rel_pattern, rel_pattern, label
    );
    query.push_str("WHERE id(e1) < id(e2)\n");
    query.push_str("WITH e1, e2,\n");
    query.push_str("     collect(DISTINCT {\n");
    query.push_str("         type: type(r1),\n");
    query.push_str("         identifier: CASE\n");
    let _ = writeln!(query, "             {}", case_statement);
    query.push_str("             ELSE 'Unknown'\n");
    query.push_str("         END\n");
    query.push_str("     }) as sharedAttributes\n");
    query.push_str("WHERE size(sharedAttributes) >= $minSharedAttributes\n");
    query.push_str("WITH e1, e2, sharedAttributes, size(sharedAttributes) as sharedAttributeCount\n");
    query.push_str("ORDER BY sharedAttributeCount DESC\n");
    query.push_str("LIMIT $limit\n");
    let _ = writeln!(query, "RETURN e1.{} as entity1Id,", id_prop);
    let _ = writeln!(
        query,
        "       {},",
        display_projection(entity_config, "e1", "entity1")
    );
    let _ = writeln!(query, "       e2.{} as entity2Id,", id_prop);
    let _ = writeln!(
        query,
        "       {},",
        display_projection(entity_config, "e2", "entity2")
    );
    query.push_str("       sharedAttributes,\n");
    query.push_str("       sharedAttributeCount");

    query
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity_config(display_properties: &[&str]) -> EntityConfig {
        EntityConfig {
            node_label: "Customer".to_string(),
            id_property: "customerId".to_string(),
            base_properties: Vec::new(),
            display_properties: display_properties.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn three_pii() -> Vec<PiiRelationship> {
        vec![
            PiiRelationship {
                relationship_type: "HAS_EMAIL".to_string(),
                target_label: "Email".to_string(),
                identifier_property: "address".to_string(),
            },
            PiiRelationship {
                relationship_type: "HAS_PHONE".to_string(),
                target_label: "Phone".to_string(),
                identifier_property: "number".to_string(),
            },
            PiiRelationship {
                relationship_type: "HAS_PASSPORT".to_string(),
                target_label: "Passport".to_string(),
                identifier_property: "passportNumber".to_string(),
            },
        ]
    }

    #[test]
    fn investigation_query_shape() {
        let query =
            build_investigation_query(&entity_config(&["firstName", "lastName"]), &three_pii());

        assert!(query.contains("MATCH (target:Customer {customerId: $entityId})"));
        assert!(query.contains("-[r:HAS_EMAIL|HAS_PHONE|HAS_PASSPORT]->"));
        assert!(query.contains("<-[r2:HAS_EMAIL|HAS_PHONE|HAS_PASSPORT]-(other:Customer)"));
        assert!(query.contains("WHERE target.customerId <> other.customerId"));
        assert!(query.contains("size(sharedAttributes) >= $minSharedAttributes"));
        assert!(query.contains("other.firstName as entityFirstName"));
        assert!(query.contains("other.lastName as entityLastName"));
        assert!(query.contains("ORDER BY sharedAttributeCount DESC"));
        assert!(query.ends_with("LIMIT $limit"));
    }

    #[test]
    fn case_ladder_follows_caller_order_with_unknown_fallthrough() {
        let query = build_investigation_query(&entity_config(&[]), &three_pii());

        let email = query.find("WHEN identifier:Email THEN identifier.address").unwrap();
        let phone = query.find("WHEN identifier:Phone THEN identifier.number").unwrap();
        let passport = query
            .find("WHEN identifier:Passport THEN identifier.passportNumber")
            .unwrap();
        let unknown = query.find("ELSE 'Unknown'").unwrap();

        assert!(email < phone && phone < passport && passport < unknown);
    }

    #[test]
    fn discovery_query_shape() {
        let query = build_discovery_query(&entity_config(&["firstName"]), &three_pii());

        assert!(query.contains(
            "MATCH (e1:Customer)-[r1:HAS_EMAIL|HAS_PHONE|HAS_PASSPORT]->(identifier)\
             <-[r2:HAS_EMAIL|HAS_PHONE|HAS_PASSPORT]-(e2:Customer)"
        ));
        assert!(query.contains("WHERE id(e1) < id(e2)"));
        assert!(query.contains("e1.customerId as entity1Id"));
        assert!(query.contains("e2.customerId as entity2Id"));
        // Both endpoints project the same property list; the prefixes keep
        // the result columns distinct.
        assert!(query.contains("e1.firstName as entity1FirstName"));
        assert!(query.contains("e2.firstName as entity2FirstName"));
    }

    /// Collects every `<expr> as <alias>` result column from the final
    /// RETURN clause.
    fn return_aliases(query: &str) -> Vec<&str> {
        let return_clause = query.rsplit("RETURN ").next().unwrap();
        return_clause
            .split(|c| c == ',' || c == '\n')
            .filter_map(|column| {
                let column = column.trim();
                column.split(" as ").nth(1).map(str::trim)
            })
            .collect()
    }

    #[test]
    fn discovery_result_columns_are_distinct() {
        // Neo4j rejects duplicate result column names outright, so a repeated
        // alias would make every discovery query with display properties fail.
        let query = build_discovery_query(
            &entity_config(&["firstName", "lastName", "dateOfBirth"]),
            &three_pii(),
        );

        let aliases = return_aliases(&query);
        assert!(aliases.len() >= 8, "unexpected aliases: {aliases:?}");

        let mut deduped = aliases.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), aliases.len(), "duplicate aliases: {aliases:?}");
    }

    #[test]
    fn empty_display_properties_fall_back_to_properties_function() {
        let investigation = build_investigation_query(&entity_config(&[]), &three_pii());
        assert!(investigation.contains("properties(other) as entityProperties"));

        let discovery = build_discovery_query(&entity_config(&[]), &three_pii());
        assert!(discovery.contains("properties(e1) as entity1Properties"));
        assert!(discovery.contains("properties(e2) as entity2Properties"));
    }

    #[test]
    fn aggregation_stays_out_of_the_return_clause() {
        for query in [
            build_investigation_query(&entity_config(&["firstName"]), &three_pii()),
            build_discovery_query(&entity_config(&["firstName"]), &three_pii()),
        ] {
            let return_clause = query.split("RETURN ").nth(1).unwrap();
            assert!(!return_clause.contains("collect("));
        }
    }
}

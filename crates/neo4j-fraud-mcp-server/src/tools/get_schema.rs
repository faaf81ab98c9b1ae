//! Live schema extraction: fuses the outputs of the built-in Neo4j schema
//! procedures into a node/relationship/property model and renders a markdown
//! view an LLM can reason over.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use neo4rs::{Node, Relation, Row};
use rmcp::model::{JsonObject, Tool};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::ToolError;
use crate::tools::{ToolDependencies, read_only_annotations};

pub const GET_SCHEMA_TOOL_NAME: &str = "get-schema";

/// Retrieves the graph structure (virtual nodes and relationships).
const SCHEMA_VISUALIZATION_QUERY: &str = "CALL db.schema.visualization()";

/// Retrieves node properties with their types.
const NODE_PROPERTIES_QUERY: &str = "\
CALL db.schema.nodeTypeProperties()
YIELD nodeLabels, propertyName, propertyTypes
RETURN nodeLabels, propertyName, propertyTypes";

/// Retrieves relationship properties with their types.
const REL_PROPERTIES_QUERY: &str = "\
CALL db.schema.relTypeProperties()
YIELD relType, propertyName, propertyTypes
RETURN relType, propertyName, propertyTypes";

const NODE_COUNT_QUERY: &str = "MATCH (n) RETURN count(n) as nodeCount";

/// Business-context preamble prepended to the schema markdown. A product
/// choice, not an architectural one, which is why it lives in one constant.
pub const FRAUD_DATABASE_CONTEXT: &str = r#"# Neo4j Fraud Detection Database Schema

This is a graph database for detecting and preventing financial crime. Graph databases excel at:
- **Pattern Detection**: Finding suspicious patterns across connected entities
- **Relationship Analysis**: Traversing networks to identify hidden connections
- **Identity Resolution**: Linking data points across multiple sources
- **Behavioral Analytics**: Detecting anomalies in transaction and activity patterns

**Example use cases** this type of database commonly supports include (but are not limited to):
- Detecting synthetic identities through shared PII analysis
- Identifying fraud rings and collusion networks
- Analyzing transaction flows for money laundering patterns
- Cross-referencing customer data for identity verification

The schema below shows the current structure of your Neo4j database.

---

"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaItem {
    pub key: String,
    pub value: SchemaDetail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDetail {
    pub item_type: SchemaItemType,
    pub properties: BTreeMap<String, String>,
    pub relationships: BTreeMap<String, SchemaRelationship>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaItemType {
    Node,
    Relationship,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRelationship {
    pub direction: RelationshipDirection,
    pub labels: Vec<String>,
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipDirection {
    In,
    Out,
}

/// A virtual node from `db.schema.visualization`: the label is stored as the
/// node element's `name` property.
#[derive(Debug, Clone)]
pub(crate) struct VisualizationNode {
    pub id: i64,
    pub label: String,
}

#[derive(Debug, Clone)]
pub(crate) struct VisualizationRelationship {
    pub rel_type: String,
    pub start_id: i64,
    pub end_id: i64,
}

#[derive(Clone)]
pub struct GetSchema {
    pub tool: Tool,
    deps: ToolDependencies,
    sample_size: i64,
}

impl GetSchema {
    pub fn new(deps: ToolDependencies, sample_size: i64) -> Self {
        let mut tool = Tool::new(
            GET_SCHEMA_TOOL_NAME,
            "Retrieve the database schema from Neo4j with fraud detection context.\n\n\
             Returns the structure of your Neo4j database including:\n\
             - Node labels and their properties with data types\n\
             - Relationship types and their directions\n\
             - Fraud detection context explaining the purpose of this database\n\n\
             This tool provides complete schema information with business context in one call.\n\n\
             If the database contains no data, no schema information is returned.",
            JsonObject::new(),
        );
        tool.annotations = Some(read_only_annotations("Get Neo4j Schema"));

        Self {
            tool,
            deps,
            sample_size,
        }
    }

    pub async fn execute(&self, ct: &CancellationToken) -> Result<String, ToolError> {
        self.deps.emit_tool_event(GET_SCHEMA_TOOL_NAME)?;
        let database = self.deps.database()?;

        info!(
            database = database.database_name(),
            sample_size = self.sample_size,
            "retrieving schema from the database"
        );

        let visualization_rows = database
            .execute_read(ct, SCHEMA_VISUALIZATION_QUERY, None)
            .await?;
        debug!(
            records = visualization_rows.len(),
            "schema visualization query completed"
        );

        if visualization_rows.is_empty() {
            // Verify before declaring the database empty: an empty
            // visualization on a populated database is an introspection fault.
            warn!("schema visualization returned no records, verifying database contents");
            let count_rows = database.execute_read(ct, NODE_COUNT_QUERY, None).await?;
            let node_count = count_rows
                .first()
                .and_then(|row| row.get::<i64>("nodeCount").ok())
                .unwrap_or(0);

            if node_count > 0 {
                return Err(ToolError::Schema(format!(
                    "Internal error: database '{}' contains {} nodes but schema visualization \
                     failed. This may indicate a schema introspection issue.",
                    database.database_name(),
                    node_count
                )));
            }

            info!(
                database = database.database_name(),
                "database is empty, no schema to return"
            );
            return Ok(format!(
                "The get-schema tool executed successfully; however, since the Neo4j database \
                 '{}' contains no data, no schema information was returned.",
                database.database_name()
            ));
        }

        let node_prop_rows = database.execute_read(ct, NODE_PROPERTIES_QUERY, None).await?;
        let rel_prop_rows = database.execute_read(ct, REL_PROPERTIES_QUERY, None).await?;

        let (nodes, relationships) = extract_visualization(&visualization_rows)?;
        let node_props = extract_property_map(&node_prop_rows, PropertyKeySource::NodeLabels)?;
        let rel_props = extract_property_map(&rel_prop_rows, PropertyKeySource::RelType)?;

        let items = fuse_schema(&nodes, &relationships, &node_props, &rel_props);
        let markdown = format_schema_as_markdown(&items);

        let enriched = format!("{}{}", FRAUD_DATABASE_CONTEXT, markdown);
        info!(schema_size = enriched.len(), "returning schema with fraud detection context");
        Ok(enriched)
    }
}

fn extract_visualization(
    rows: &[Row],
) -> Result<(Vec<VisualizationNode>, Vec<VisualizationRelationship>), ToolError> {
    let row = rows
        .first()
        .ok_or_else(|| ToolError::Schema("no visualization records returned".to_string()))?;

    let node_elements: Vec<Node> = row
        .get("nodes")
        .map_err(|e| ToolError::Schema(format!("missing 'nodes' in visualization record: {}", e)))?;
    let relationship_elements: Vec<Relation> = row.get("relationships").map_err(|e| {
        ToolError::Schema(format!(
            "missing 'relationships' in visualization record: {}",
            e
        ))
    })?;

    let mut nodes = Vec::with_capacity(node_elements.len());
    for element in &node_elements {
        match element.get::<String>("name") {
            Ok(label) => nodes.push(VisualizationNode {
                id: element.id(),
                label,
            }),
            Err(_) => warn!(id = element.id(), "skipping schema node without a name"),
        }
    }

    let mut relationships = Vec::with_capacity(relationship_elements.len());
    for element in &relationship_elements {
        match element.get::<String>("name") {
            Ok(rel_type) => relationships.push(VisualizationRelationship {
                rel_type,
                start_id: element.start_node_id(),
                end_id: element.end_node_id(),
            }),
            Err(_) => warn!("skipping schema relationship without a name"),
        }
    }

    Ok((nodes, relationships))
}

enum PropertyKeySource {
    NodeLabels,
    RelType,
}

/// Indexes property rows by label (`nodeLabels[0]`) or relationship type,
/// mapping property name to the first reported type.
fn extract_property_map(
    rows: &[Row],
    source: PropertyKeySource,
) -> Result<BTreeMap<String, BTreeMap<String, String>>, ToolError> {
    let mut map: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();

    for row in rows {
        let key = match source {
            PropertyKeySource::NodeLabels => row
                .get::<Vec<String>>("nodeLabels")
                .ok()
                .and_then(|labels| labels.into_iter().next()),
            PropertyKeySource::RelType => row
                .get::<String>("relType")
                .ok()
                .map(|t| t.trim_matches([':', '`']).to_string()),
        };

        let Some(key) = key else { continue };
        let Ok(Some(prop_name)) = row.get::<Option<String>>("propertyName") else {
            continue;
        };
        let prop_type = row
            .get::<Option<Vec<String>>>("propertyTypes")
            .ok()
            .flatten()
            .and_then(|types| types.into_iter().next())
            .unwrap_or_else(|| "Any".to_string());

        map.entry(key).or_default().insert(prop_name, prop_type);
    }

    Ok(map)
}

/// Fuses visualization elements and property maps into the schema model.
/// Every visualization node becomes a node item; every relationship element
/// contributes an outgoing edge on its start label and an incoming edge on
/// its end label; each relationship type appears once as its own item.
pub(crate) fn fuse_schema(
    nodes: &[VisualizationNode],
    relationships: &[VisualizationRelationship],
    node_props: &BTreeMap<String, BTreeMap<String, String>>,
    rel_props: &BTreeMap<String, BTreeMap<String, String>>,
) -> Vec<SchemaItem> {
    let id_to_label: BTreeMap<i64, &str> = nodes
        .iter()
        .map(|node| (node.id, node.label.as_str()))
        .collect();

    let mut node_rels: BTreeMap<&str, BTreeMap<String, SchemaRelationship>> = BTreeMap::new();
    for rel in relationships {
        let (Some(&start_label), Some(&end_label)) = (
            id_to_label.get(&rel.start_id),
            id_to_label.get(&rel.end_id),
        ) else {
            continue;
        };

        let properties = rel_props.get(&rel.rel_type).cloned().unwrap_or_default();
        node_rels.entry(start_label).or_default().insert(
            rel.rel_type.clone(),
            SchemaRelationship {
                direction: RelationshipDirection::Out,
                labels: vec![end_label.to_string()],
                properties: properties.clone(),
            },
        );
        node_rels.entry(end_label).or_default().insert(
            rel.rel_type.clone(),
            SchemaRelationship {
                direction: RelationshipDirection::In,
                labels: vec![start_label.to_string()],
                properties,
            },
        );
    }

    let mut items = Vec::new();

    let mut labels: Vec<&str> = nodes.iter().map(|node| node.label.as_str()).collect();
    labels.sort_unstable();
    labels.dedup();
    for label in labels {
        items.push(SchemaItem {
            key: label.to_string(),
            value: SchemaDetail {
                item_type: SchemaItemType::Node,
                properties: node_props.get(label).cloned().unwrap_or_default(),
                relationships: node_rels.remove(label).unwrap_or_default(),
            },
        });
    }

    let mut rel_types: Vec<&str> = relationships
        .iter()
        .map(|rel| rel.rel_type.as_str())
        .collect();
    rel_types.sort_unstable();
    rel_types.dedup();
    for rel_type in rel_types {
        items.push(SchemaItem {
            key: rel_type.to_string(),
            value: SchemaDetail {
                item_type: SchemaItemType::Relationship,
                properties: rel_props.get(rel_type).cloned().unwrap_or_default(),
                relationships: BTreeMap::new(),
            },
        });
    }

    items
}

/// Renders the schema in the Neo4j documentation markdown format, with
/// relationship patterns written as literal Cypher paths.
pub(crate) fn format_schema_as_markdown(items: &[SchemaItem]) -> String {
    let mut md = String::new();

    md.push_str("# Database Schema\n\n");
    md.push_str("This schema represents the current state of your Neo4j database.\n\n");

    let nodes: Vec<&SchemaItem> = items
        .iter()
        .filter(|item| item.value.item_type == SchemaItemType::Node)
        .collect();
    let relationships: Vec<&SchemaItem> = items
        .iter()
        .filter(|item| item.value.item_type == SchemaItemType::Relationship)
        .collect();

    if !nodes.is_empty() {
        md.push_str("## 1. Node Labels and Properties\n\n");

        for node in nodes {
            let _ = writeln!(md, "### {}\n", node.key);

            if !node.value.properties.is_empty() {
                md.push_str("*Properties:*\n\n");
                for (prop_name, prop_type) in &node.value.properties {
                    let _ = writeln!(md, "  - `{}` ({})", prop_name, prop_type);
                }
                md.push('\n');
            }

            if !node.value.relationships.is_empty() {
                md.push_str("*Relationships:*\n\n");
                for (rel_name, rel) in &node.value.relationships {
                    let targets = rel.labels.join(", ");
                    let pattern = match rel.direction {
                        RelationshipDirection::Out => {
                            format!("(:{})-[:{}]->(:{})", node.key, rel_name, targets)
                        }
                        RelationshipDirection::In => {
                            format!("(:{})<-[:{}]-(:{})", node.key, rel_name, targets)
                        }
                    };
                    let _ = writeln!(md, "  - `{}`", pattern);
                }
                md.push('\n');
            }
        }
    }

    if !relationships.is_empty() {
        md.push_str("## 2. Relationship Types\n\n");

        for rel in relationships {
            let _ = writeln!(md, "### :{}\n", rel.key);

            if !rel.value.properties.is_empty() {
                md.push_str("*Properties:*\n\n");
                for (prop_name, prop_type) in &rel.value.properties {
                    let _ = writeln!(md, "  - `{}` ({})", prop_name, prop_type);
                }
                md.push('\n');
            }
        }
    }

    md
}

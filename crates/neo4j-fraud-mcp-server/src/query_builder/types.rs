use schemars::JsonSchema;
use serde::Deserialize;

/// Instructions for retrieving one attribute from the graph. Schema-agnostic:
/// callers discover relationship and label names via `get-schema` and pass
/// them here.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttributeMapping {
    /// The relationship type name from the schema (e.g. HAS_EMAIL, OWNS)
    pub relationship_type: String,

    /// The node label of the connected entity (e.g. Email, Account)
    pub target_label: String,

    /// The primary property containing the key identifier (e.g. address for
    /// Email). Empty when all properties should be returned.
    #[serde(default)]
    pub identifier_property: String,

    /// Logical grouping for organizing output (e.g. contact_information,
    /// identity_documents). Empty maps to other_attributes.
    #[serde(default)]
    pub attribute_category: String,

    /// Which properties to retrieve from the target node. Empty means all
    /// properties.
    #[serde(default)]
    pub include_properties: Vec<String>,
}

/// A graph traversal path for finding related nodes across one or more hops.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PathSpecification {
    /// The relationship type to traverse (e.g. TRANSACTION, KNOWS)
    pub relationship_type: String,

    /// Relationship direction: out, in, or both
    #[serde(default)]
    pub direction: Direction,

    /// The expected node label at the end of the path
    pub target_label: String,

    /// Minimum number of hops. 0 means no minimum.
    #[serde(default)]
    pub min_hops: u32,

    /// Maximum number of hops. 0 means unlimited.
    #[serde(default)]
    pub max_hops: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Out,
    In,
    Both,
}

/// Caller-supplied description of the entity node a schema-aware tool
/// operates on. The Core never infers label or identifier.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntityConfig {
    /// Node label of the entity (e.g. Customer, Person, Account)
    pub node_label: String,

    /// Property name holding the unique identifier (e.g. customerId)
    pub id_property: String,

    /// Entity properties to include in base details. Empty returns all
    /// properties via properties().
    #[serde(default)]
    pub base_properties: Vec<String>,

    /// Entity properties echoed on each overlap result row. Empty returns
    /// all properties via properties().
    #[serde(default)]
    pub display_properties: Vec<String>,
}

impl EntityConfig {
    /// Checks that label and identifier are both present; the message points
    /// the caller at schema discovery.
    pub fn validate(&self) -> Result<(), String> {
        if self.node_label.is_empty() {
            return Err("entityConfig.nodeLabel is required. Specify the entity node label \
                 (e.g. 'Customer', 'Person', 'Account'). Use get-schema to discover node labels."
                .to_string());
        }
        if self.id_property.is_empty() {
            return Err("entityConfig.idProperty is required. Specify the property name containing \
                 the unique identifier (e.g. 'customerId', 'personId'). Use get-schema to discover \
                 properties."
                .to_string());
        }
        Ok(())
    }
}

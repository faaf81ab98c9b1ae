//! Thin façade over the Neo4j driver: session-per-call query execution with
//! cancellation, and canonical record-to-JSON marshalling.

use neo4rs::{ConfigBuilder, Graph, Keys, Node, Path, Relation, Row, query};
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::{ServerError, ToolError};

/// Largest integer magnitude that survives a round trip through an IEEE-754
/// double. Anything bigger is emitted as a string.
const MAX_SAFE_INTEGER: i64 = 1 << 53;

/// Shared handle to the Neo4j driver pool. The service itself may be called
/// concurrently; every call drains its own result stream.
pub struct Neo4jService {
    graph: Graph,
    database: String,
}

impl std::fmt::Debug for Neo4jService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neo4jService")
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

impl Neo4jService {
    pub async fn connect(
        uri: &str,
        username: &str,
        password: &str,
        database: &str,
    ) -> Result<Self, ServerError> {
        let config = ConfigBuilder::default()
            .uri(uri)
            .user(username)
            .password(password)
            .db(database)
            .build()?;
        let graph = Graph::connect(config).await?;

        Ok(Self {
            graph,
            database: database.to_string(),
        })
    }

    pub fn database_name(&self) -> &str {
        &self.database
    }

    /// Runs a read query and drains all records into memory. Cancelling the
    /// token abandons the in-flight query and returns `ToolError::Cancelled`.
    pub async fn execute_read(
        &self,
        ct: &CancellationToken,
        cypher: &str,
        params: Option<&Map<String, Value>>,
    ) -> Result<Vec<Row>, ToolError> {
        self.execute(ct, cypher, params).await
    }

    /// Identical contract to [`execute_read`](Self::execute_read) with write
    /// intent. Callers gate access through the Cypher classifier and the
    /// registry's read-only filter.
    pub async fn execute_write(
        &self,
        ct: &CancellationToken,
        cypher: &str,
        params: Option<&Map<String, Value>>,
    ) -> Result<Vec<Row>, ToolError> {
        self.execute(ct, cypher, params).await
    }

    async fn execute(
        &self,
        ct: &CancellationToken,
        cypher: &str,
        params: Option<&Map<String, Value>>,
    ) -> Result<Vec<Row>, ToolError> {
        let mut q = query(cypher);
        if let Some(params) = params {
            for (key, value) in params {
                q = q.param(key.as_str(), json_to_bolt(value)?);
            }
        }

        debug!(query = cypher, "executing Cypher query");

        let run = async {
            let mut stream = self.graph.execute(q).await?;
            let mut rows = Vec::new();
            while let Some(row) = stream.next().await? {
                rows.push(row);
            }
            Ok::<_, neo4rs::Error>(rows)
        };

        tokio::select! {
            _ = ct.cancelled() => Err(ToolError::Cancelled),
            rows = run => rows.map_err(ToolError::from),
        }
    }

    /// Serializes records as a JSON array of column-name → value maps,
    /// preserving graph-native shapes (see [`records_to_json`]).
    pub fn records_to_json(&self, rows: &[Row]) -> Result<String, ToolError> {
        records_to_json(rows)
    }
}

/// Converts driver records to their canonical JSON form. Nodes become
/// `{labels, properties}`, relationships `{type, startNodeId, endNodeId,
/// properties}`, paths `{nodes, relationships}`; scalar driver types map to
/// their JSON analog, with integers beyond double precision as strings.
pub fn records_to_json(rows: &[Row]) -> Result<String, ToolError> {
    let records = rows.iter().map(row_to_json).collect::<Result<Vec<_>, _>>()?;
    serde_json::to_string_pretty(&Value::Array(records))
        .map_err(|e| ToolError::Marshal(e.to_string()))
}

fn row_to_json(row: &Row) -> Result<Value, ToolError> {
    let Keys(columns) = row
        .to::<Keys<Vec<String>>>()
        .map_err(|e| ToolError::Marshal(e.to_string()))?;

    let mut record = Map::with_capacity(columns.len());
    for column in columns {
        let value = column_to_json(row, &column)?;
        record.insert(column, value);
    }
    Ok(Value::Object(record))
}

fn column_to_json(row: &Row, column: &str) -> Result<Value, ToolError> {
    // Graph-typed columns first: a node would otherwise flatten to its bare
    // property map and lose its labels.
    if let Ok(path) = row.get::<Path>(column) {
        return path_to_json(&path);
    }
    if let Ok(node) = row.get::<Node>(column) {
        return node_to_json(&node);
    }
    if let Ok(relation) = row.get::<Relation>(column) {
        return relation_to_json(&relation);
    }

    let value = row
        .get::<Value>(column)
        .map_err(|e| ToolError::Marshal(format!("column '{}': {}", column, e)))?;
    Ok(canonicalize_numbers(value))
}

fn node_to_json(node: &Node) -> Result<Value, ToolError> {
    let labels: Vec<String> = node.labels().into_iter().map(String::from).collect();
    let properties = node
        .to::<Map<String, Value>>()
        .map_err(|e| ToolError::Marshal(e.to_string()))?;

    Ok(json!({
        "labels": labels,
        "properties": canonicalize_numbers(Value::Object(properties)),
    }))
}

fn relation_to_json(relation: &Relation) -> Result<Value, ToolError> {
    let properties = relation
        .to::<Map<String, Value>>()
        .map_err(|e| ToolError::Marshal(e.to_string()))?;

    // Bolt relationships carry node ids, not labels; labels are available
    // only when the surrounding path supplies the nodes.
    Ok(json!({
        "type": relation.typ(),
        "startNodeId": relation.start_node_id(),
        "endNodeId": relation.end_node_id(),
        "properties": canonicalize_numbers(Value::Object(properties)),
    }))
}

fn path_to_json(path: &Path) -> Result<Value, ToolError> {
    let nodes = path
        .nodes()
        .iter()
        .map(node_to_json)
        .collect::<Result<Vec<_>, _>>()?;

    let relationships = path
        .rels()
        .iter()
        .map(|rel| {
            let properties = rel
                .to::<Map<String, Value>>()
                .map_err(|e| ToolError::Marshal(e.to_string()))?;
            Ok(json!({
                "type": rel.typ(),
                "properties": canonicalize_numbers(Value::Object(properties)),
            }))
        })
        .collect::<Result<Vec<_>, ToolError>>()?;

    Ok(json!({
        "nodes": nodes,
        "relationships": relationships,
    }))
}

/// Rewrites integers that do not round-trip through a double as strings, so
/// JavaScript-side consumers never silently lose precision.
fn canonicalize_numbers(value: Value) -> Value {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if i.unsigned_abs() > MAX_SAFE_INTEGER as u64 {
                    return Value::String(i.to_string());
                }
            } else if let Some(u) = n.as_u64() {
                if u > MAX_SAFE_INTEGER as u64 {
                    return Value::String(u.to_string());
                }
            }
            Value::Number(n)
        }
        Value::Array(items) => {
            Value::Array(items.into_iter().map(canonicalize_numbers).collect())
        }
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, canonicalize_numbers(v)))
                .collect(),
        ),
        other => other,
    }
}

fn json_to_bolt(value: &Value) -> Result<neo4rs::BoltType, ToolError> {
    use neo4rs::{BoltList, BoltMap, BoltType};

    Ok(match value {
        Value::Null => BoltType::Null(Default::default()),
        Value::Bool(b) => (*b).into(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.into()
            } else if let Some(f) = n.as_f64() {
                f.into()
            } else {
                return Err(ToolError::Marshal(format!(
                    "unsupported numeric parameter: {}",
                    n
                )));
            }
        }
        Value::String(s) => s.as_str().into(),
        Value::Array(items) => {
            let list = BoltList {
                value: items
                    .iter()
                    .map(json_to_bolt)
                    .collect::<Result<Vec<_>, _>>()?,
            };
            BoltType::List(list)
        }
        Value::Object(map) => {
            let mut bolt = BoltMap::default();
            for (key, val) in map {
                bolt.put(key.as_str().into(), json_to_bolt(val)?);
            }
            BoltType::Map(bolt)
        }
    })
}

#[cfg(test)]
mod tests {
    use neo4rs::BoltType;
    use serde_json::json;

    use super::*;

    #[test]
    fn scalar_params_convert_to_bolt() {
        assert!(matches!(
            json_to_bolt(&json!("CUS123")).unwrap(),
            BoltType::String(_)
        ));
        assert!(matches!(
            json_to_bolt(&json!(20)).unwrap(),
            BoltType::Integer(_)
        ));
        assert!(matches!(
            json_to_bolt(&json!(1.5)).unwrap(),
            BoltType::Float(_)
        ));
        assert!(matches!(
            json_to_bolt(&json!(true)).unwrap(),
            BoltType::Boolean(_)
        ));
        assert!(matches!(
            json_to_bolt(&json!(null)).unwrap(),
            BoltType::Null(_)
        ));
    }

    #[test]
    fn container_params_convert_recursively() {
        assert!(matches!(
            json_to_bolt(&json!([1, 2, 3])).unwrap(),
            BoltType::List(_)
        ));
        assert!(matches!(
            json_to_bolt(&json!({"minSharedAttributes": 2})).unwrap(),
            BoltType::Map(_)
        ));
    }

    #[test]
    fn safe_integers_stay_numbers() {
        let value = canonicalize_numbers(json!({"count": 42, "balance": 1024.5}));
        assert_eq!(value, json!({"count": 42, "balance": 1024.5}));
    }

    #[test]
    fn oversized_integers_become_strings() {
        let big = 9_007_199_254_740_993_i64; // 2^53 + 1
        let value = canonicalize_numbers(json!({"id": big}));
        assert_eq!(value, json!({"id": "9007199254740993"}));
    }

    #[test]
    fn canonicalization_recurses_into_collections() {
        let big = i64::MAX;
        let value = canonicalize_numbers(json!({"ids": [1, big], "nested": {"id": big}}));
        assert_eq!(
            value,
            json!({"ids": [1, big.to_string()], "nested": {"id": big.to_string()}})
        );
    }
}

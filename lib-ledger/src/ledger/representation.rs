//! Value representations over the canonical record form.
//!
//! All representations read and write the same canonical JSON tree; each
//! converter is stateless and lossless in both directions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{LedgerError, LedgerResult};

/// The view format a contract declares it expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Representation {
    /// Nested JSON, identical to the canonical form.
    #[default]
    Tree,
    /// Legacy flat map: dotted-path keys, leaf values as JSON text.
    KeyValue,
    /// Node-table JSON: `{"root": id, "nodes": {id: object}}` with object
    /// values replaced by `{"$ref": id}` links.
    ObjectGraph,
    /// The canonical JSON text as a single string.
    Plain,
}

impl Representation {
    /// Translate a canonical tree into this representation.
    pub fn from_canonical(&self, canonical: &Value) -> Value {
        match self {
            Representation::Tree => canonical.clone(),
            Representation::KeyValue => flatten(canonical),
            Representation::ObjectGraph => to_object_graph(canonical),
            Representation::Plain => Value::String(canonical.to_string()),
        }
    }

    /// Translate a value in this representation back into the canonical
    /// tree.
    pub fn to_canonical(&self, value: Value) -> LedgerResult<Value> {
        match self {
            Representation::Tree => Ok(value),
            Representation::KeyValue => unflatten(&value),
            Representation::ObjectGraph => from_object_graph(&value),
            Representation::Plain => match value {
                Value::String(text) => serde_json::from_str(&text)
                    .map_err(|e| LedgerError::MalformedArgument(e.to_string())),
                other => Err(LedgerError::MalformedArgument(format!(
                    "plain representation expects a string, got {other}"
                ))),
            },
        }
    }
}

// =============================================================================
// KeyValue (legacy flat map)
// =============================================================================

fn flatten(value: &Value) -> Value {
    let mut out = BTreeMap::new();
    flatten_into("", value, &mut out);
    Value::Object(out.into_iter().map(|(k, v)| (k, Value::String(v))).collect())
}

fn flatten_into(prefix: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (k, v) in map {
                let path = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                flatten_into(&path, v, out);
            }
        }
        leaf => {
            // Leaves keep their JSON text so numbers, strings and booleans
            // survive the round trip unambiguously.
            out.insert(prefix.to_string(), leaf.to_string());
        }
    }
}

fn unflatten(value: &Value) -> LedgerResult<Value> {
    let map = value.as_object().ok_or_else(|| {
        LedgerError::MalformedArgument("key/value representation expects an object".to_string())
    })?;
    let mut root = Map::new();
    for (path, leaf) in map {
        let text = leaf.as_str().ok_or_else(|| {
            LedgerError::MalformedArgument(format!("key/value leaf for {path} must be a string"))
        })?;
        let parsed: Value = serde_json::from_str(text)
            .map_err(|e| LedgerError::MalformedArgument(format!("leaf {path}: {e}")))?;
        insert_path(&mut root, path, parsed)?;
    }
    Ok(Value::Object(root))
}

fn insert_path(root: &mut Map<String, Value>, path: &str, leaf: Value) -> LedgerResult<()> {
    let mut current = root;
    let mut parts = path.split('.').peekable();
    while let Some(part) = parts.next() {
        if parts.peek().is_none() {
            current.insert(part.to_string(), leaf);
            return Ok(());
        }
        let slot = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        current = slot.as_object_mut().ok_or_else(|| {
            LedgerError::MalformedArgument(format!("path {path} collides with a leaf"))
        })?;
    }
    Ok(())
}

// =============================================================================
// ObjectGraph (node table)
// =============================================================================

fn to_object_graph(value: &Value) -> Value {
    let mut nodes = Map::new();
    let mut counter = 0usize;
    let root = graph_encode(value, &mut nodes, &mut counter);
    let mut out = Map::new();
    out.insert("root".to_string(), root);
    out.insert("nodes".to_string(), Value::Object(nodes));
    Value::Object(out)
}

fn graph_encode(value: &Value, nodes: &mut Map<String, Value>, counter: &mut usize) -> Value {
    match value {
        Value::Object(map) => {
            let id = format!("n{counter}");
            *counter += 1;
            // Reserve the slot before descending so node ids follow
            // depth-first discovery order deterministically.
            nodes.insert(id.clone(), Value::Null);
            let mut encoded = Map::new();
            for (k, v) in map {
                encoded.insert(k.clone(), graph_encode(v, nodes, counter));
            }
            nodes.insert(id.clone(), Value::Object(encoded));
            let mut link = Map::new();
            link.insert("$ref".to_string(), Value::String(id));
            Value::Object(link)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| graph_encode(v, nodes, counter))
                .collect(),
        ),
        scalar => scalar.clone(),
    }
}

fn from_object_graph(value: &Value) -> LedgerResult<Value> {
    let map = value.as_object().ok_or_else(malformed_graph)?;
    let nodes = map
        .get("nodes")
        .and_then(Value::as_object)
        .ok_or_else(malformed_graph)?;
    let root = map.get("root").ok_or_else(malformed_graph)?;
    graph_decode(root, nodes, 0)
}

fn graph_decode(
    value: &Value,
    nodes: &Map<String, Value>,
    depth: usize,
) -> LedgerResult<Value> {
    // A ref cycle cannot be produced by the encoder; reject instead of
    // recursing forever on hand-crafted input.
    if depth > 128 {
        return Err(LedgerError::MalformedArgument(
            "object graph nesting too deep".to_string(),
        ));
    }
    match value {
        Value::Object(map) if map.len() == 1 && map.contains_key("$ref") => {
            let id = map["$ref"].as_str().ok_or_else(malformed_graph)?;
            let node = nodes
                .get(id)
                .and_then(Value::as_object)
                .ok_or_else(malformed_graph)?;
            let mut decoded = Map::new();
            for (k, v) in node {
                decoded.insert(k.clone(), graph_decode(v, nodes, depth + 1)?);
            }
            Ok(Value::Object(decoded))
        }
        Value::Array(items) => Ok(Value::Array(
            items
                .iter()
                .map(|v| graph_decode(v, nodes, depth + 1))
                .collect::<LedgerResult<_>>()?,
        )),
        Value::Object(_) => Err(malformed_graph()),
        scalar => Ok(scalar.clone()),
    }
}

fn malformed_graph() -> LedgerError {
    LedgerError::MalformedArgument("malformed object graph".to_string())
}

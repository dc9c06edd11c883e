//! Local reference resolution and schema-set extraction over one JSON document.
use indexmap::IndexSet;
use serde_json::Value;

use super::Schema;
use crate::error::{Error, ReferenceError, Result};

/// Containers whose entries are named definitions.
const DEFINITION_KEYS: [&str; 3] = ["definitions", "defs", "$defs"];

/// A parsed schema document with its ordering side-channel already imputed.
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    root: Value,
}

impl SchemaDocument {
    pub fn new(mut root: Value) -> Self {
        impute_property_order(&mut root);
        Self { root }
    }

    pub fn from_str(source: &str) -> Result<Self> {
        let de = &mut serde_json::Deserializer::from_str(source);
        let root = serde_path_to_error::deserialize::<_, Value>(de).map_err(|err| Error::Parse {
            path: err.path().to_string(),
            message: err.into_inner().to_string(),
        })?;
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Follow a `#/<root>/<path…>` reference.
    pub fn resolve(&self, reference: &str) -> Result<Schema> {
        let node = self.lookup(reference)?;
        Schema::from_value(node.clone())
    }

    fn lookup(&self, reference: &str) -> Result<&Value, ReferenceError> {
        if reference.is_empty() {
            return Err(ReferenceError::Empty);
        }
        let mut parts = reference.split('/');
        if parts.next() != Some("#") {
            return Err(ReferenceError::NotLocal(reference.to_string()));
        }
        let segments = parts.map(unescape_pointer_segment).collect::<Vec<_>>();
        if segments.first().is_none_or(|s| s.is_empty()) {
            return Err(ReferenceError::MissingRoot(reference.to_string()));
        }
        let mut node = &self.root;
        for segment in &segments {
            let next = match node {
                Value::Object(map) => map.get(segment.as_str()),
                Value::Array(xs) => segment.parse::<usize>().ok().and_then(|i| xs.get(i)),
                _ => None,
            };
            node = next.ok_or_else(|| ReferenceError::NotFound(reference.to_string()))?;
        }
        Ok(node)
    }

    /// Every definition (keyed by its reference path) in source order, then any
    /// other local reference target reachable from them, then the root schema.
    pub fn schemas(&self, root_name: Option<&str>) -> Result<Vec<(String, Schema)>> {
        let mut keys = IndexSet::new();
        if let Value::Object(map) = &self.root {
            for container in DEFINITION_KEYS {
                if let Some(Value::Object(defs)) = map.get(container) {
                    for name in defs.keys() {
                        keys.insert(format!("#/{container}/{}", escape_pointer_segment(name)));
                    }
                }
            }
        }

        let mut pending = Vec::new();
        collect_references(&self.root, &mut pending);
        while let Some(reference) = pending.pop() {
            if reference == "#" || keys.contains(&reference) {
                continue;
            }
            let node = self.lookup(&reference)?;
            collect_references(node, &mut pending);
            keys.insert(reference);
        }

        let mut out = Vec::with_capacity(keys.len() + 1);
        for key in keys {
            let schema = self.resolve(&key)?;
            out.push((key, schema));
        }
        if let Some(name) = root_name {
            out.push((name.to_string(), Schema::from_value(self.root.clone())?));
        }
        tracing::debug!(count = out.len(), "collected schemas");
        Ok(out)
    }
}

/// Parse source text into the ordered `(name, Schema)` list the assembler consumes.
pub fn parse(source: &str, root_name: Option<&str>) -> Result<Vec<(String, Schema)>> {
    SchemaDocument::from_str(source)?.schemas(root_name)
}

// ------------------------------- Helpers --------------------------------- //

fn unescape_pointer_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

fn escape_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Push every `$ref` string in the tree, in reverse discovery order (stack use).
fn collect_references(node: &Value, out: &mut Vec<String>) {
    let mut found = Vec::new();
    walk_references(node, &mut found);
    out.extend(found.into_iter().rev());
}

fn walk_references(node: &Value, found: &mut Vec<String>) {
    match node {
        Value::Object(map) => {
            if let Some(Value::String(r)) = map.get("$ref") {
                found.push(r.clone());
            }
            for (key, child) in map {
                if key != "$ref" {
                    walk_references(child, found);
                }
            }
        }
        Value::Array(xs) => xs.iter().for_each(|x| walk_references(x, found)),
        _ => {}
    }
}

/// Record source key order as `propertyOrder` wherever a schema declares
/// `properties` without an explicit order. Only sub-schema positions are
/// visited, so a property literally named `properties` is left alone.
fn impute_property_order(node: &mut Value) {
    let Value::Object(map) = node else { return };
    if !map.contains_key("propertyOrder") {
        let order = match map.get("properties") {
            Some(Value::Object(props)) => Some(props.keys().cloned().map(Value::String).collect()),
            _ => None,
        };
        if let Some(order) = order {
            map.insert("propertyOrder".to_string(), Value::Array(order));
        }
    }
    for key in ["properties", "definitions", "defs", "$defs"] {
        if let Some(Value::Object(children)) = map.get_mut(key) {
            children.values_mut().for_each(impute_property_order);
        }
    }
    for key in ["items", "additionalProperties", "not", "allOf", "anyOf", "oneOf"] {
        match map.get_mut(key) {
            Some(Value::Array(xs)) => xs.iter_mut().for_each(impute_property_order),
            Some(child @ Value::Object(_)) => impute_property_order(child),
            _ => {}
        }
    }
}

// ------------------------------- Tests ------------------------------------ //

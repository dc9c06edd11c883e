//! Schema model: the practical JSON-Schema subset the reifier understands.
//!
//! Built once from a JSON tree and never mutated afterwards. Unknown keywords
//! are ignored; `$ref` is treated as exclusive of shape-constraining keys.
pub mod document;

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde::Deserialize;

pub use document::{SchemaDocument, parse};

// ------------------------------- Model ----------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Array,
    Boolean,
    Integer,
    Null,
    Number,
    Object,
    String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SchemaType {
    Single(Primitive),
    Multiple(Vec<Primitive>),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Items {
    Tuple(Vec<Schema>),
    Single(Box<Schema>),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Bool(bool),
    Schema(Box<Schema>),
}

/// One literal of an `enum` clause.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnumLiteral {
    Null,
    Bool(bool),
    Integer(i64),
    Number(OrderedFloat<f64>),
    String(String),
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(rename = "$ref")]
    pub reference: Option<String>,
    #[serde(rename = "type")]
    pub ty: Option<SchemaType>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "enum")]
    pub enumeration: Option<Vec<EnumLiteral>>,
    pub properties: Option<IndexMap<String, Schema>>,
    pub items: Option<Items>,
    pub required: Option<Vec<String>>,
    pub additional_properties: Option<AdditionalProperties>,
    pub all_of: Option<Vec<Schema>>,
    pub any_of: Option<Vec<Schema>>,
    pub one_of: Option<Vec<Schema>>,
    pub not: Option<Box<Schema>>,
    pub definitions: Option<IndexMap<String, Schema>>,
    #[serde(alias = "$defs")]
    pub defs: Option<IndexMap<String, Schema>>,
    /// Non-standard ordering hint; imputed from source key order by the parser.
    pub property_order: Option<Vec<String>>,
}

// ------------------------------- Queries --------------------------------- //

impl Schema {
    /// Deserialize a single node, reporting the JSON path of the first failure.
    pub fn from_value(value: serde_json::Value) -> crate::error::Result<Self> {
        serde_path_to_error::deserialize(value).map_err(|err| crate::error::Error::Parse {
            path: err.path().to_string(),
            message: err.into_inner().to_string(),
        })
    }

    /// The single primitive named by `type`, if `type` is not a list.
    pub fn primitive(&self) -> Option<Primitive> {
        match &self.ty {
            Some(SchemaType::Single(p)) => Some(*p),
            _ => None,
        }
    }

    pub fn is_required(&self, key: &str) -> bool {
        self.required.iter().flatten().any(|k| k == key)
    }

    /// Untyped or object-typed: candidates for boxing in wide records.
    pub fn is_object_shaped(&self) -> bool {
        match &self.ty {
            None => true,
            Some(SchemaType::Single(Primitive::Object)) => true,
            _ => false,
        }
    }

    /// Whether any keyword restricts the accepted value set.
    pub fn has_constraints(&self) -> bool {
        self.reference.is_some()
            || self.ty.is_some()
            || self.enumeration.is_some()
            || self.properties.is_some()
            || self.items.is_some()
            || self.required.is_some()
            || self.additional_properties.is_some()
            || self.all_of.is_some()
            || self.any_of.is_some()
            || self.one_of.is_some()
            || self.not.is_some()
    }

    /// Human-facing documentation lines from `title` and `description`.
    pub fn comments(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(title) = self.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            lines.push(title.to_string());
        }
        if let Some(desc) = self.description.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.extend(desc.lines().map(|l| l.trim_end().to_string()));
        }
        lines
    }
}

impl EnumLiteral {
    /// Text form used as a string-enum raw value.
    pub fn as_raw_string(&self) -> Option<String> {
        match self {
            EnumLiteral::String(s) => Some(s.clone()),
            EnumLiteral::Integer(i) => Some(i.to_string()),
            EnumLiteral::Number(n) => Some(n.0.to_string()),
            _ => None,
        }
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_core_vocabulary() {
        let schema = Schema::from_value(json!({
            "type": ["string", "null"],
            "items": [{"type": "string"}],
            "additionalProperties": false,
            "enum": ["a", 1, 2.5, null, true],
            "$ref": "#/definitions/Foo",
            "$defs": {"X": {"type": "integer"}}
        }))
        .unwrap();
        assert_eq!(schema.ty, Some(SchemaType::Multiple(vec![Primitive::String, Primitive::Null])));
        assert!(matches!(schema.items, Some(Items::Tuple(ref xs)) if xs.len() == 1));
        assert_eq!(schema.additional_properties, Some(AdditionalProperties::Bool(false)));
        assert_eq!(
            schema.enumeration.unwrap(),
            vec![
                EnumLiteral::String("a".into()),
                EnumLiteral::Integer(1),
                EnumLiteral::Number(OrderedFloat(2.5)),
                EnumLiteral::Null,
                EnumLiteral::Bool(true),
            ]
        );
        assert_eq!(schema.reference.as_deref(), Some("#/definitions/Foo"));
        assert!(schema.defs.unwrap().contains_key("X"));
    }

    #[test]
    fn single_items_is_not_mistaken_for_tuple() {
        let schema = Schema::from_value(json!({"type": "array", "items": {"type": "string"}})).unwrap();
        assert!(matches!(schema.items, Some(Items::Single(_))));
    }

    #[test]
    fn parse_error_reports_path() {
        let err = Schema::from_value(json!({"properties": {"a": {"type": "strung"}}})).unwrap_err();
        match err {
            crate::error::Error::Parse { path, .. } => assert!(path.contains("properties"), "{path}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn constraint_detection() {
        assert!(!Schema::from_value(json!({"title": "x", "description": "y"})).unwrap().has_constraints());
        assert!(Schema::from_value(json!({"required": ["a"]})).unwrap().has_constraints());
    }

    #[test]
    fn comments_join_title_and_description() {
        let schema = Schema::from_value(json!({"title": "Point", "description": "A point.\nIn 2D."})).unwrap();
        assert_eq!(schema.comments(), vec!["Point", "", "A point.", "In 2D."]);
    }
}

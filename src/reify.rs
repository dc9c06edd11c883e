//! Reifier: turns one schema node into a named Code IR declaration.
//!
//! Dispatch is an ordered, first-match-wins classification of the node:
//!
//! 1. `enum` → string enumeration
//! 2. `type` list → alias to a union of primitives
//! 3. scalar `type` → alias to the primitive (or an encapsulating wrapper)
//! 4. `array` → alias to a sequence of the item type
//! 5. `properties` → record
//! 6. `allOf` → merge record
//! 7. `anyOf` → any record
//! 8. `oneOf` → discriminated union
//! 9. `$ref` → alias to the referenced name
//! 10. `not` → alias to an inverse-validator marker
//! 11. no constraining keys → opaque JSON
//! 12. object with an `additionalProperties` schema → string-keyed map
//! 13. object with `additionalProperties: true` → map of opaque JSON
//! 14. anything else → opaque JSON
pub mod naming;
mod record;
mod union;

use std::collections::HashSet;

use crate::code::keywords::unescape;
use crate::code::{
    Access, Assignment, Capability, CodeType, EnumCase, Initializer, NamedType, Param, Property,
    Record, RecordMode, Role, SimpleEnum, SumKind, TypeAlias,
};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::schema::{AdditionalProperties, EnumLiteral, Items, Primitive, Schema, SchemaType};

// ------------------------------- Dispatch -------------------------------- //

#[derive(Debug)]
enum Shape<'s> {
    Enumeration(&'s [EnumLiteral]),
    PrimitiveUnion(&'s [Primitive]),
    Scalar(Primitive),
    Array(Option<&'s Items>),
    Object,
    AllOf(&'s [Schema]),
    AnyOf(&'s [Schema]),
    OneOf(&'s [Schema]),
    Reference(&'s str),
    Not(&'s Schema),
    Opaque,
    Map(&'s Schema),
    OpenMap,
    Fallback,
}

impl Shape<'_> {
    fn rule(&self) -> u8 {
        match self {
            Shape::Enumeration(_) => 1,
            Shape::PrimitiveUnion(_) => 2,
            Shape::Scalar(_) => 3,
            Shape::Array(_) => 4,
            Shape::Object => 5,
            Shape::AllOf(_) => 6,
            Shape::AnyOf(_) => 7,
            Shape::OneOf(_) => 8,
            Shape::Reference(_) => 9,
            Shape::Not(_) => 10,
            Shape::Opaque => 11,
            Shape::Map(_) => 12,
            Shape::OpenMap => 13,
            Shape::Fallback => 14,
        }
    }
}

fn classify(schema: &Schema) -> Shape<'_> {
    if let Some(values) = &schema.enumeration {
        return Shape::Enumeration(values);
    }
    match &schema.ty {
        Some(SchemaType::Multiple(types)) => return Shape::PrimitiveUnion(types),
        Some(SchemaType::Single(Primitive::Array)) => return Shape::Array(schema.items.as_ref()),
        Some(SchemaType::Single(Primitive::Object)) | None => {}
        Some(SchemaType::Single(p)) => return Shape::Scalar(*p),
    }
    if schema.properties.as_ref().is_some_and(|p| !p.is_empty()) {
        return Shape::Object;
    }
    if let Some(members) = &schema.all_of {
        return Shape::AllOf(members);
    }
    if let Some(members) = &schema.any_of {
        return Shape::AnyOf(members);
    }
    if let Some(members) = &schema.one_of {
        return Shape::OneOf(members);
    }
    if let Some(reference) = &schema.reference {
        return Shape::Reference(reference);
    }
    if let Some(inverse) = &schema.not {
        return Shape::Not(inverse);
    }
    if !schema.has_constraints() {
        return Shape::Opaque;
    }
    // Maps need an explicit `type: object`.
    if !matches!(schema.ty, Some(SchemaType::Single(Primitive::Object))) {
        return Shape::Fallback;
    }
    match &schema.additional_properties {
        Some(AdditionalProperties::Schema(value)) => Shape::Map(value),
        Some(AdditionalProperties::Bool(true)) => Shape::OpenMap,
        _ => Shape::Fallback,
    }
}

/// The runtime type standing for a primitive schema `type`.
pub fn primitive_type(p: Primitive) -> CodeType {
    match p {
        Primitive::String => CodeType::string(),
        Primitive::Integer => CodeType::int(),
        Primitive::Number => CodeType::double(),
        Primitive::Boolean => CodeType::bool(),
        Primitive::Null => CodeType::explicit_null(),
        Primitive::Array => CodeType::array(CodeType::bric()),
        Primitive::Object => CodeType::bric(),
    }
}

fn dedup_primitives(types: &[Primitive]) -> Vec<Primitive> {
    let mut out = Vec::with_capacity(types.len());
    for t in types {
        if !out.contains(t) {
            out.push(*t);
        }
    }
    out
}

// ------------------------------- Reifier --------------------------------- //

/// Reify a schema node under `id`, nested beneath the `parents` name chain.
pub fn reify(schema: &Schema, id: &str, parents: &[String], config: &Config) -> Result<NamedType> {
    Reifier::new(config).reify(schema, id, parents)
}

#[derive(Debug, Clone)]
pub struct Reifier<'a> {
    config: &'a Config,
    /// Type name a whole-document `#` reference resolves to.
    root_name: Option<String>,
}

/// Nested declarations collected while synthesizing one container.
#[derive(Debug, Default)]
pub(crate) struct Scope {
    pub nested: Vec<NamedType>,
    taken: HashSet<String>,
}

impl Scope {
    pub fn reserving(names: &[&str]) -> Self {
        Self {
            nested: Vec::new(),
            taken: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    /// Take ownership of a nested declaration, suffixing its name on collision,
    /// and return a reference to it.
    pub fn adopt(&mut self, mut ty: NamedType) -> CodeType {
        let base = ty.name().to_string();
        let name = naming::unique(base.clone(), &mut self.taken);
        if name != base {
            ty.set_name(name);
        }
        let reference = ty.reference();
        self.nested.push(ty);
        reference
    }
}

fn alias(name: String, access: Access, target: CodeType, peers: Vec<NamedType>) -> NamedType {
    NamedType::Alias(TypeAlias {
        name,
        access,
        target,
        peers,
        comments: Vec::new(),
    })
}

fn child_parents(parents: &[String], name: &str) -> Vec<String> {
    let mut inner = parents.to_vec();
    inner.push(unescape(name).to_string());
    inner
}

impl<'a> Reifier<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config, root_name: None }
    }

    pub fn with_root(mut self, name: impl Into<String>) -> Self {
        self.root_name = Some(name.into());
        self
    }

    pub fn config(&self) -> &Config {
        self.config
    }

    pub fn reify(&self, schema: &Schema, id: &str, parents: &[String]) -> Result<NamedType> {
        let name = self.type_name(parents, id, true);
        let access = self.config.access_for(parents);
        let shape = classify(schema);
        tracing::debug!(name = %name, rule = shape.rule(), depth = parents.len(), "reify");

        let mut ty = match shape {
            Shape::Enumeration(values) => self.simple_enum(name, access, values, parents)?,
            Shape::PrimitiveUnion(types) => {
                let members = dedup_primitives(types).into_iter().map(primitive_type).collect();
                self.primitive_union(name, access, members)
            }
            Shape::Scalar(p) => match self.config.encapsulate.get(unescape(&name)) {
                Some(raw) => self.wrapper(name, access, primitive_type(*raw)),
                None => alias(name, access, primitive_type(p), Vec::new()),
            },
            Shape::Array(items) => self.sequence(name, access, items, parents)?,
            Shape::Object => self.standard_record(schema, id, name, access, parents)?,
            Shape::AllOf(members) => self.all_of(schema, name, access, parents, members)?,
            Shape::AnyOf(members) => self.any_of(schema, name, access, parents, members)?,
            Shape::OneOf(members) => self.one_of(name, access, parents, members)?,
            Shape::Reference(reference) => {
                let target = self.reference_name(reference);
                let name = if target == name { format!("{}Type", unescape(&name)) } else { name };
                alias(name, access, CodeType::external(target), Vec::new())
            }
            Shape::Not(inverse) => {
                let not_id = format!("Not{}", unescape(&name));
                let (target, peers) = self.embed(inverse, &not_id, parents)?;
                alias(name, access, CodeType::not(target), peers)
            }
            Shape::Opaque | Shape::Fallback => alias(name, access, CodeType::bric(), Vec::new()),
            Shape::Map(value) => {
                let value_id = format!("{}Value", unescape(&name));
                let (target, peers) = self.embed(value, &value_id, parents)?;
                alias(name, access, CodeType::dictionary(target), peers)
            }
            Shape::OpenMap => alias(name, access, CodeType::dictionary(CodeType::bric()), Vec::new()),
        };

        let comments = schema.comments();
        if !comments.is_empty() && ty.comments_mut().is_empty() {
            *ty.comments_mut() = comments;
        }
        Ok(ty)
    }

    /// Reify a sub-schema that sits beside its user. A pure alias is inlined;
    /// anything else is returned as a peer declaration.
    fn embed(&self, schema: &Schema, id: &str, parents: &[String]) -> Result<(CodeType, Vec<NamedType>)> {
        if let Some(reference) = &schema.reference {
            return Ok((CodeType::external(self.reference_name(reference)), Vec::new()));
        }
        let ty = self.reify(schema, id, parents)?;
        match ty.as_pure_alias() {
            Some(target) => Ok((target.clone(), Vec::new())),
            None => Ok((ty.reference(), vec![ty])),
        }
    }

    // ---- Rule 1 ---- //

    fn simple_enum(&self, name: String, access: Access, values: &[EnumLiteral], parents: &[String]) -> Result<NamedType> {
        let inner = child_parents(parents, &name);
        let mut taken = HashSet::new();
        let mut seen = HashSet::new();
        let mut cases = Vec::with_capacity(values.len());
        for value in values {
            let raw = value.as_raw_string().ok_or_else(|| {
                Error::unsupported(format!("enumeration `{name}` has a non-string literal {value:?}"))
            })?;
            if !seen.insert(raw.clone()) {
                continue;
            }
            let case_name = naming::unique(self.enum_case_name(&inner, &raw), &mut taken);
            cases.push(EnumCase { name: case_name, value: raw });
        }
        let default_value = match cases.as_slice() {
            [only] => Some(format!(".{}", only.name)),
            _ => None,
        };
        Ok(NamedType::Enum(SimpleEnum {
            name,
            access,
            raw: CodeType::string(),
            cases,
            conforms: self.config.capabilities(),
            default_value,
            comments: Vec::new(),
        }))
    }

    // ---- Rule 2 ---- //

    fn primitive_union(&self, name: String, access: Access, mut members: Vec<CodeType>) -> NamedType {
        if members.len() == 1 {
            let only = members.remove(0);
            return alias(name, access, only, Vec::new());
        }
        alias(name, access, CodeType::sum(SumKind::OneOf, members), Vec::new())
    }

    // ---- Rule 3 ---- //

    /// Single-value record around a primitive, used for encapsulated names.
    pub(crate) fn wrapper(&self, name: String, access: Access, raw: CodeType) -> NamedType {
        let mut conforms = self.config.capabilities();
        conforms.insert(Capability::RawRepresentable);
        NamedType::Record(Record {
            name,
            access,
            mode: RecordMode::Wrapper,
            properties: vec![Property {
                name: "rawValue".to_string(),
                role: Role::Member,
                ty: raw.clone(),
                required: true,
                indirect: false,
                access,
                comments: Vec::new(),
            }],
            initializer: Initializer {
                params: vec![Param {
                    name: "rawValue".to_string(),
                    anonymous: false,
                    ty: raw,
                    default_value: None,
                }],
                assignments: vec![Assignment::Direct {
                    property: "rawValue".to_string(),
                    param: "rawValue".to_string(),
                }],
            },
            nested: Vec::new(),
            conforms,
            comments: Vec::new(),
        })
    }

    // ---- Rule 4 ---- //

    fn sequence(&self, name: String, access: Access, items: Option<&Items>, parents: &[String]) -> Result<NamedType> {
        match items {
            None => Ok(alias(name, access, CodeType::array(CodeType::bric()), Vec::new())),
            Some(Items::Tuple(_)) => Err(Error::unsupported(format!(
                "`{name}` declares tuple-form items"
            ))),
            Some(Items::Single(item)) => {
                let item_id = format!("{}Item", unescape(&name));
                let (target, peers) = self.embed(item, &item_id, parents)?;
                Ok(alias(name, access, CodeType::array(target), peers))
            }
        }
    }

    // ---- Rules 6 & 7 ---- //

    fn all_of(&self, schema: &Schema, name: String, access: Access, parents: &[String], members: &[Schema]) -> Result<NamedType> {
        let effective = members.iter().filter(|m| m.has_constraints()).collect::<Vec<_>>();
        match effective.as_slice() {
            [] => Ok(alias(name, access, CodeType::bric(), Vec::new())),
            [only] => self.direct(only, name, access, parents),
            _ => self.member_record(schema, name, access, parents, RecordMode::Merge, &effective),
        }
    }

    fn any_of(&self, schema: &Schema, name: String, access: Access, parents: &[String], members: &[Schema]) -> Result<NamedType> {
        if self.config.any_of_as_one_of {
            return self.one_of(name, access, parents, members);
        }
        let effective = members.iter().filter(|m| m.has_constraints()).collect::<Vec<_>>();
        if effective.len() < 2 {
            return self.all_of(schema, name, access, parents, members);
        }
        self.member_record(schema, name, access, parents, RecordMode::Any, &effective)
    }

    /// A lone composition member stands for the whole node.
    fn direct(&self, member: &Schema, name: String, access: Access, parents: &[String]) -> Result<NamedType> {
        if let Some(reference) = &member.reference {
            let target = self.reference_name(reference);
            let name = if target == name { format!("{}Type", unescape(&name)) } else { name };
            return Ok(alias(name, access, CodeType::external(target), Vec::new()));
        }
        let mut ty = self.reify(member, unescape(&name), parents)?;
        if ty.name() != name {
            ty.set_name(name);
        }
        Ok(ty)
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::emit::render;
    use serde_json::{Value, json};

    fn schema(value: Value) -> Schema {
        let doc = crate::schema::SchemaDocument::new(value);
        Schema::from_value(doc.root().clone()).unwrap()
    }

    fn emit(value: Value, id: &str) -> String {
        let config = Config::default();
        render(&reify(&schema(value), id, &[], &config).unwrap())
    }

    #[test]
    fn enum_wins_over_type() {
        let text = emit(json!({"type": "string", "enum": ["a", "b-c", ">="]}), "Mode");
        assert!(text.starts_with("public enum Mode : String, Equatable, Hashable, Codable {\n"), "{text}");
        assert!(text.contains("    case a\n"));
        assert!(text.contains("    case bC = \"b-c\"\n"));
        assert!(text.contains("    case u62u61 = \">=\"\n"));
    }

    #[test]
    fn singleton_enum_has_default() {
        let ty = reify(&schema(json!({"enum": ["only"]})), "One", &[], &Config::default()).unwrap();
        match ty {
            NamedType::Enum(e) => assert_eq!(e.default_value.as_deref(), Some(".only")),
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn numeric_enum_literals_are_stringified_but_bools_fail() {
        let text = emit(json!({"enum": [1, "two"]}), "Num");
        assert!(text.contains("case u49 = \"1\""), "{text}");
        let err = reify(&schema(json!({"enum": [true]})), "B", &[], &Config::default()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedShape(_)));
    }

    #[test]
    fn primitive_type_lists() {
        assert_eq!(
            emit(json!({"type": ["string", "integer", "string"]}), "Id"),
            "public typealias Id = OneOf2<String, Int>\n"
        );
        assert_eq!(emit(json!({"type": ["number"]}), "N"), "public typealias N = Double\n");
    }

    #[test]
    fn scalar_alias_and_encapsulation() {
        assert_eq!(emit(json!({"type": "boolean"}), "Flag"), "public typealias Flag = Bool\n");
        let mut config = Config::default();
        config.encapsulate.insert("Email".into(), Primitive::String);
        let ty = reify(&schema(json!({"type": "string"})), "Email", &[], &config).unwrap();
        let text = render(&ty);
        assert!(text.starts_with("public struct Email : RawRepresentable, Equatable, Hashable, Codable {"), "{text}");
        assert!(text.contains("    public init(rawValue: String) {\n        self.rawValue = rawValue\n    }"));
        assert!(text.contains("self.rawValue = try String(from: decoder)"));
    }

    #[test]
    fn arrays() {
        assert_eq!(emit(json!({"type": "array"}), "Anything"), "public typealias Anything = [Bric]\n");
        assert_eq!(
            emit(json!({"type": "array", "items": {"$ref": "#/definitions/Foo"}}), "Foos"),
            "public typealias Foos = [Foo]\n"
        );
        assert_eq!(emit(json!({"type": "array", "items": {"type": "string"}}), "Tags"), "public typealias Tags = [String]\n");
        let text = emit(json!({"type": "array", "items": {"enum": ["x", "y"]}}), "Marks");
        assert!(text.starts_with("public typealias Marks = [MarksItem]\n\npublic enum MarksItem"), "{text}");
    }

    #[test]
    fn tuple_items_are_unsupported() {
        let err = reify(
            &schema(json!({"type": "array", "items": [{"type": "string"}, {"type": "integer"}]})),
            "Pair",
            &[],
            &Config::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedShape(_)));
    }

    #[test]
    fn reference_alias_and_self_collision() {
        assert_eq!(emit(json!({"$ref": "#/definitions/Other"}), "Mine"), "public typealias Mine = Other\n");
        assert_eq!(
            emit(json!({"$ref": "#/definitions/Same"}), "#/defs/Same"),
            "public typealias SameType = Same\n"
        );
    }

    #[test]
    fn not_wraps_inverse() {
        assert_eq!(emit(json!({"not": {"type": "string"}}), "NoText"), "public typealias NoText = NotBrac<String>\n");
        let text = emit(json!({"not": {"enum": ["a"]}}), "NotA");
        assert!(text.starts_with("public typealias NotA = NotBrac<NotNotA>\n\npublic enum NotNotA"), "{text}");
    }

    #[test]
    fn opaque_maps_and_fallback() {
        assert_eq!(emit(json!({"description": "anything"}), "Blob"), "/// anything\npublic typealias Blob = Bric\n");
        assert_eq!(
            emit(json!({"type": "object", "additionalProperties": {"type": "integer"}}), "Counts"),
            "public typealias Counts = Dictionary<String, Int>\n"
        );
        assert_eq!(
            emit(json!({"type": "object", "additionalProperties": true}), "Bag"),
            "public typealias Bag = Dictionary<String, Bric>\n"
        );
        assert_eq!(emit(json!({"type": "object"}), "Obj"), "public typealias Obj = Bric\n");
        assert_eq!(
            emit(json!({"additionalProperties": {"type": "integer"}}), "Untyped"),
            "public typealias Untyped = Bric\n"
        );
    }

    #[test]
    fn single_member_compositions_are_direct() {
        assert_eq!(emit(json!({"allOf": [{"$ref": "#/definitions/Base"}]}), "Derived"), "public typealias Derived = Base\n");
        assert_eq!(
            emit(json!({"anyOf": [{"$ref": "#/definitions/Base"}, {}]}), "Derived"),
            "public typealias Derived = Base\n"
        );
        let text = emit(json!({"allOf": [{"properties": {"a": {"type": "string"}}}]}), "Solo");
        assert!(text.starts_with("public struct Solo : "), "{text}");
    }

    #[test]
    fn reification_is_idempotent() {
        let value = json!({
            "type": "object",
            "properties": {
                "kind": {"enum": ["a", "b"]},
                "shape": {"oneOf": [{"type": "string"}, {"properties": {"r": {"type": "number"}}}]},
                "tags": {"type": "array", "items": {"type": "string"}}
            }
        });
        assert_eq!(emit(value.clone(), "Thing"), emit(value, "Thing"));
    }
}

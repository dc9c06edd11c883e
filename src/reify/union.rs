//! `oneOf` unions and the collapse of small sums onto generic `OneOfN` types.
use std::collections::HashSet;

use super::naming::{anonymous_type_id, unique};
use super::{Reifier, Scope, Shape, alias, child_parents, classify, primitive_type};
use crate::code::keywords::unescape;
use crate::code::{Access, Case, CodeType, NamedType, SumKind, Union};
use crate::config::SUM_TYPE_MAX_ARITY;
use crate::error::Result;
use crate::schema::{Primitive, Schema};

impl Reifier<'_> {
    pub(super) fn one_of(&self, name: String, access: Access, parents: &[String], members: &[Schema]) -> Result<NamedType> {
        let inner = child_parents(parents, &name);
        let member_access = self.config.access_for(&inner);
        let self_name = unescape(&name).to_string();
        let mut scope = Scope::default();
        let mut taken = HashSet::new();
        let mut cases = Vec::with_capacity(members.len());

        for (ordinal, member) in members.iter().enumerate() {
            let payload = self.union_payload(member, ordinal, &inner, &mut scope)?;
            let case = match payload {
                None => Case {
                    name: unique(self.union_case_name(&inner, "Null"), &mut taken),
                    payload: None,
                },
                Some(ty) => {
                    let case_name = unique(self.union_case_name(&inner, &ty.identifier()), &mut taken);
                    let ty = if ty.direct_references().contains(&self_name) {
                        tracing::trace!(union = %self_name, case = %case_name, "boxing recursive case");
                        CodeType::indirect(ty)
                    } else {
                        ty
                    };
                    Case { name: case_name, payload: Some(ty) }
                }
            };
            cases.push(case);
        }

        let sum_members = cases
            .iter()
            .map(|c| c.payload.clone().unwrap_or_else(CodeType::explicit_null))
            .collect::<Vec<_>>();

        match cases.len() {
            0 => return Ok(alias(name, access, CodeType::bric(), scope.nested)),
            1 => {
                let only = match cases.remove(0).payload {
                    Some(CodeType::External(ext)) if ext.name == "Indirect" && ext.generics.len() == 1 => {
                        ext.generics.into_iter().next().unwrap_or_else(CodeType::bric)
                    }
                    Some(ty) => ty,
                    None => CodeType::explicit_null(),
                };
                return Ok(alias(name, access, only, scope.nested));
            }
            n if self.config.collapse_one_of && n <= SUM_TYPE_MAX_ARITY => {
                let suffix = &self.config.one_of_suffix;
                return Ok(self.collapse(name, access, &inner, SumKind::OneOf, sum_members, scope.nested, suffix));
            }
            _ => {}
        }

        if self.config.collapse_one_of {
            // Too wide for a generic sum: keep a real union inside a namespace.
            let namespace_name = format!("{self_name}{}", self.config.namespace_suffix);
            let choice = &self.config.one_of_suffix;
            tracing::debug!(union = %self_name, cases = cases.len(), "oneOf exceeds generic arity");
            let mut contents = vec![NamedType::Union(Union {
                name: choice.clone(),
                access: member_access,
                cases,
                nested: Vec::new(),
                conforms: self.config.capabilities(),
                comments: Vec::new(),
            })];
            contents.extend(scope.nested);
            let namespace = NamedType::Union(Union::namespace(namespace_name.clone(), access, contents));
            let target = CodeType::external(format!("{namespace_name}.{choice}"));
            return Ok(alias(name, access, target, vec![namespace]));
        }

        Ok(NamedType::Union(Union {
            name,
            access,
            cases,
            nested: scope.nested,
            conforms: self.config.capabilities(),
            comments: Vec::new(),
        }))
    }

    /// Payload type of one `oneOf` member; `None` for a bare null.
    fn union_payload(&self, member: &Schema, ordinal: usize, inner: &[String], scope: &mut Scope) -> Result<Option<CodeType>> {
        if let Some(reference) = &member.reference {
            return Ok(Some(CodeType::external(self.reference_name(reference))));
        }
        if let Shape::Scalar(p) = classify(member) {
            if p == Primitive::Null {
                return Ok(None);
            }
            let id = anonymous_type_id(member, ordinal);
            if !self.config.encapsulate.contains_key(unescape(&self.type_name(inner, &id, true))) {
                return Ok(Some(primitive_type(p)));
            }
        }
        let ty = self.reify(member, &anonymous_type_id(member, ordinal), inner)?;
        match ty.as_pure_alias() {
            Some(target) => Ok(Some(target.clone())),
            None => Ok(Some(scope.adopt(ty))),
        }
    }

    /// Express a composition as an alias to the generic N-ary sum of its
    /// members. Nested declarations other than plain enumerations move into
    /// a `<Name>Types` namespace beside the alias.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn collapse(
        &self,
        name: String,
        access: Access,
        inner: &[String],
        kind: SumKind,
        members: Vec<CodeType>,
        nested: Vec<NamedType>,
        suffix: &str,
    ) -> NamedType {
        let sum = CodeType::sum(kind, members);
        if nested.iter().all(NamedType::is_simple_enum) {
            return alias(name, access, sum, nested);
        }
        let namespace_name = format!("{}{}", unescape(&name), self.config.namespace_suffix);
        let mut contents = vec![alias(suffix.to_string(), self.config.access_for(inner), sum, Vec::new())];
        contents.extend(nested);
        let namespace = NamedType::Union(Union::namespace(namespace_name.clone(), access, contents));
        let target = CodeType::external(format!("{namespace_name}.{suffix}"));
        alias(name, access, target, vec![namespace])
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use crate::code::NamedType;
    use crate::code::emit::render;
    use crate::config::Config;
    use crate::reify::reify;
    use crate::schema::{Schema, SchemaDocument};
    use serde_json::{Value, json};

    fn schema(value: Value) -> Schema {
        Schema::from_value(SchemaDocument::new(value).root().clone()).unwrap()
    }

    fn emit_with(value: Value, id: &str, config: &Config) -> String {
        render(&reify(&schema(value), id, &[], config).unwrap())
    }

    fn emit(value: Value, id: &str) -> String {
        emit_with(value, id, &Config::default())
    }

    fn plain() -> Config {
        Config { collapse_one_of: false, ..Config::default() }
    }

    #[test]
    fn scalar_members_collapse_to_generic_sum() {
        assert_eq!(
            emit(json!({"oneOf": [{"type": "string"}, {"type": "integer"}]}), "X"),
            "public typealias X = OneOf2<String, Int>\n"
        );
        assert_eq!(
            emit(json!({"oneOf": [{"type": "string"}, {"type": "null"}]}), "MaybeText"),
            "public typealias MaybeText = OneOf2<String, ExplicitNull>\n"
        );
    }

    #[test]
    fn degenerate_member_counts() {
        assert_eq!(emit(json!({"oneOf": []}), "Nothing"), "public typealias Nothing = Bric\n");
        assert_eq!(
            emit(json!({"oneOf": [{"$ref": "#/definitions/A"}]}), "Single"),
            "public typealias Single = A\n"
        );
    }

    #[test]
    fn enum_members_become_peers() {
        let text = emit(json!({"oneOf": [{"enum": ["a", "b"]}, {"type": "integer"}]}), "X");
        assert!(text.starts_with("public typealias X = OneOf2<Type1, Int>\n\npublic enum Type1 : String, "), "{text}");
    }

    #[test]
    fn record_members_move_into_namespace() {
        let text = emit(
            json!({"oneOf": [{"properties": {"r": {"type": "number"}}}, {"type": "string"}]}),
            "Shape",
        );
        let expected = "\
public typealias Shape = ShapeTypes.Choice

public enum ShapeTypes {
    public typealias Choice = OneOf2<RType, String>

    public struct RType : Equatable, Hashable, Codable {
";
        assert!(text.starts_with(expected), "{text}");
    }

    #[test]
    fn ten_members_still_collapse_flat() {
        let mut members = (0..9).map(|i| json!({"$ref": format!("#/definitions/T{i}")})).collect::<Vec<_>>();
        members.push(json!({"type": "string"}));
        assert_eq!(
            emit(json!({"oneOf": members}), "Ten"),
            "public typealias Ten = OneOf10<T0, T1, T2, T3, T4, T5, T6, T7, T8, String>\n"
        );
    }

    #[test]
    fn wide_unions_keep_cases_in_namespace() {
        let members = (0..11).map(|i| json!({"$ref": format!("#/definitions/T{i}")})).collect::<Vec<_>>();
        let text = emit(json!({"oneOf": members}), "Big");
        assert!(text.starts_with("public typealias Big = BigTypes.Choice\n\npublic enum BigTypes {\n"), "{text}");
        assert!(text.contains("    public enum Choice : Equatable, Hashable, Codable {\n        case t0Case(T0)\n"));
        assert!(text.contains("        case t10Case(T10)\n"));
    }

    #[test]
    fn plain_union_cases_follow_member_order() {
        let ty = reify(
            &schema(json!({"oneOf": [{"type": "integer"}, {"type": "null"}, {"type": "string"}, {"type": "string"}]})),
            "Value",
            &[],
            &plain(),
        )
        .unwrap();
        let NamedType::Union(u) = ty else { panic!("expected a union") };
        let names = u.cases.iter().map(|c| c.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["intCase", "nullCase", "stringCase", "stringCase1"]);
        assert!(u.cases[1].payload.is_none());
    }

    #[test]
    fn recursive_cases_are_boxed() {
        let text = emit_with(
            json!({
                "oneOf": [
                    {"type": "string"},
                    {"properties": {"next": {"$ref": "#/definitions/Node"}}, "required": ["next"]}
                ]
            }),
            "Node",
            &plain(),
        );
        assert!(text.contains("    case stringCase(String)\n    case nextTypeCase(Indirect<NextType>)\n"), "{text}");
        assert!(text.contains("    public struct NextType : "));
    }
}

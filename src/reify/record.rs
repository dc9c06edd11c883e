//! Record synthesis for `properties`, `allOf` and `anyOf` nodes.
use std::collections::HashSet;

use indexmap::IndexSet;

use super::naming::{anonymous_type_id, codepoint_name, sanitize, unique};
use super::{Reifier, Scope, child_parents, dedup_primitives, primitive_type};
use crate::code::keywords::{argument_name, unescape};
use crate::code::{
    Access, Assignment, Capabilities, Capability, CodeType, EnumCase, Initializer, NamedType,
    Param, Property, Record, RecordMode, Role, SimpleEnum, SumKind, TypeAlias,
};
use crate::config::SUM_TYPE_MAX_ARITY;
use crate::error::{Error, Result};
use crate::schema::{AdditionalProperties, Items, Primitive, Schema, SchemaType};

const KEYS_NAME: &str = "CodingKeys";
const ADDITIONAL_NAME: &str = "additionalProperties";

/// One property candidate: its JSON key (none for composition members) and schema.
type Member<'s> = (Option<String>, &'s Schema);

impl Reifier<'_> {
    pub(super) fn standard_record(
        &self,
        schema: &Schema,
        id: &str,
        name: String,
        access: Access,
        parents: &[String],
    ) -> Result<NamedType> {
        let Some(props) = schema.properties.as_ref() else {
            return Err(Error::illegal_state(format!("record `{name}` has no properties")));
        };
        let members = self
            .ordered_keys(schema, parents, id)
            .into_iter()
            .filter_map(|key| props.get(&key).map(|s| (Some(key), s)))
            .collect::<Vec<_>>();
        self.record(schema, name, access, parents, RecordMode::Standard, members)
    }

    pub(super) fn member_record(
        &self,
        schema: &Schema,
        name: String,
        access: Access,
        parents: &[String],
        mode: RecordMode,
        members: &[&Schema],
    ) -> Result<NamedType> {
        let members = members.iter().map(|m| (None, *m)).collect();
        self.record(schema, name, access, parents, mode, members)
    }

    /// Explicit hint, then schema order, then `required`, then alphabetical.
    fn ordered_keys(&self, schema: &Schema, parents: &[String], id: &str) -> Vec<String> {
        let Some(props) = schema.properties.as_ref() else { return Vec::new() };
        let hint = self.config.ordering_for(parents, id);
        let mut order = IndexSet::new();
        let sources = [hint.as_deref(), schema.property_order.as_deref(), schema.required.as_deref()];
        for key in sources.into_iter().flatten().flatten() {
            if props.contains_key(key) {
                order.insert(key.clone());
            }
        }
        let mut rest = props.keys().filter(|k| !order.contains(*k)).cloned().collect::<Vec<_>>();
        rest.sort();
        order.extend(rest);
        order.into_iter().collect()
    }

    fn record(
        &self,
        schema: &Schema,
        name: String,
        access: Access,
        parents: &[String],
        mode: RecordMode,
        members: Vec<Member<'_>>,
    ) -> Result<NamedType> {
        let inner = child_parents(parents, &name);
        let member_access = self.config.access_for(&inner);
        let mut scope = Scope::reserving(&[KEYS_NAME]);
        let mut taken = HashSet::new();
        let mut properties = Vec::with_capacity(members.len());
        let mut anonymous = 0usize;

        let is_required = |key: &Option<String>| match mode {
            RecordMode::Standard => key.as_deref().is_some_and(|k| schema.is_required(k)),
            RecordMode::Any => false,
            RecordMode::Merge | RecordMode::Wrapper => true,
        };
        let boxable = members
            .iter()
            .filter(|(key, member)| mode == RecordMode::Standard && !is_required(key) && member.is_object_shaped())
            .count();
        let boxing = boxable >= self.config.indirect_threshold;

        for (ordinal, (key, member)) in members.iter().enumerate() {
            let (prop_name, type_id) = match key {
                Some(key) => {
                    let id = match member.title.as_deref().filter(|t| !t.trim().is_empty()) {
                        Some(title) => title.to_string(),
                        None => {
                            let base = sanitize(key, true);
                            let base = if base.is_empty() { codepoint_name(key, true) } else { base };
                            format!("{base}{}", self.config.type_suffix)
                        }
                    };
                    (self.property_name(&inner, key), id)
                }
                None => {
                    let prop_name = format!("p{anonymous}");
                    anonymous += 1;
                    (prop_name, anonymous_type_id(member, ordinal))
                }
            };
            let prop_name = unique(prop_name, &mut taken);
            let ty = self.property_type(member, &type_id, &inner, &mut scope)?;
            let required = is_required(key);
            let indirect = boxing && !required && member.is_object_shaped();
            properties.push(Property {
                name: prop_name,
                role: key.clone().map_or(Role::Member, Role::Keyed),
                ty: if required { ty } else { CodeType::optional(ty) },
                required,
                indirect,
                access: member_access,
                comments: member.description.iter().flat_map(|d| d.lines().map(str::to_string)).collect(),
            });
        }

        if mode == RecordMode::Standard {
            let additional = match &schema.additional_properties {
                Some(AdditionalProperties::Bool(true)) => Some(CodeType::bric()),
                Some(AdditionalProperties::Schema(value)) => {
                    Some(self.property_type(value, "AdditionalPropertiesValue", &inner, &mut scope)?)
                }
                _ => None,
            };
            if let Some(value) = additional {
                properties.push(Property {
                    name: unique(ADDITIONAL_NAME.to_string(), &mut taken),
                    role: Role::Additional,
                    ty: CodeType::dictionary(value),
                    required: true,
                    indirect: false,
                    access: member_access,
                    comments: Vec::new(),
                });
            }
        }

        let collapse = match mode {
            RecordMode::Merge => self.config.collapse_all_of.then_some((SumKind::AllOf, &self.config.all_of_suffix)),
            RecordMode::Any => self.config.collapse_any_of.then_some((SumKind::AnyOf, &self.config.any_of_suffix)),
            _ => None,
        };
        if let Some((kind, suffix)) = collapse {
            if (2..=SUM_TYPE_MAX_ARITY).contains(&properties.len()) {
                let members = properties
                    .iter()
                    .map(|p| p.ty.optional_payload().unwrap_or(&p.ty).clone())
                    .collect();
                return Ok(self.collapse(name, access, &inner, kind, members, scope.nested, suffix));
            }
        }

        let initializer = initializer(mode, &properties, &scope.nested);
        let mut nested = scope.nested;
        if mode == RecordMode::Standard {
            nested.insert(0, keys_enum(&properties, member_access));
        }
        Ok(NamedType::Record(Record {
            name,
            access,
            mode,
            properties,
            initializer,
            nested,
            conforms: self.config.capabilities(),
            comments: Vec::new(),
        }))
    }

    /// Resolve the declared type of one property, adopting any nested declaration.
    fn property_type(&self, member: &Schema, type_id: &str, inner: &[String], scope: &mut Scope) -> Result<CodeType> {
        if let Some(reference) = &member.reference {
            return Ok(CodeType::external(self.reference_name(reference)));
        }
        let candidate = self.type_name(inner, type_id, true);
        if self.config.encapsulate.contains_key(unescape(&candidate)) {
            return Ok(CodeType::external(unescape(&candidate)));
        }
        if member.enumeration.is_none() {
            match &member.ty {
                Some(SchemaType::Single(Primitive::Array)) => {
                    return self.sequence_property(member, &candidate, inner, scope);
                }
                Some(SchemaType::Single(Primitive::Object)) => {}
                Some(SchemaType::Single(p)) => return Ok(primitive_type(*p)),
                Some(SchemaType::Multiple(types)) => {
                    let mut members = dedup_primitives(types).into_iter().map(primitive_type).collect::<Vec<_>>();
                    if members.len() == 1 {
                        return Ok(members.remove(0));
                    }
                    let alias = NamedType::Alias(TypeAlias {
                        name: format!("{}{}", unescape(&candidate), self.config.one_of_suffix),
                        access: self.config.access_for(inner),
                        target: CodeType::sum(SumKind::OneOf, members),
                        peers: Vec::new(),
                        comments: Vec::new(),
                    });
                    return Ok(scope.adopt(alias));
                }
                None => {}
            }
        }
        let ty = self.reify(member, type_id, inner)?;
        Ok(scope.adopt(ty))
    }

    /// Arrays inside records: identical item schemas are folded before recursing.
    fn sequence_property(&self, member: &Schema, type_name: &str, inner: &[String], scope: &mut Scope) -> Result<CodeType> {
        let mut items: Vec<&Schema> = Vec::new();
        match &member.items {
            None => {}
            Some(Items::Single(item)) => items.push(item),
            Some(Items::Tuple(xs)) => {
                for x in xs {
                    if !items.contains(&x) {
                        items.push(x);
                    }
                }
            }
        }
        match items.as_slice() {
            [] => Ok(CodeType::array(CodeType::bric())),
            [item] => {
                if let Some(reference) = &item.reference {
                    return Ok(CodeType::array(CodeType::external(self.reference_name(reference))));
                }
                let ty = self.reify(item, &format!("{}Item", unescape(type_name)), inner)?;
                match ty.as_pure_alias() {
                    Some(target) => Ok(CodeType::array(target.clone())),
                    None => Ok(CodeType::array(scope.adopt(ty))),
                }
            }
            many => Err(Error::unsupported(format!(
                "array property `{}` declares {} distinct item schemas",
                unescape(type_name),
                many.len()
            ))),
        }
    }
}

/// The `CodingKeys` enumeration: declared keys plus the additional-properties pseudo-key.
fn keys_enum(properties: &[Property], access: Access) -> NamedType {
    let cases = properties
        .iter()
        .filter_map(|p| match &p.role {
            Role::Keyed(key) => Some(EnumCase { name: p.name.clone(), value: key.clone() }),
            Role::Additional => Some(EnumCase { name: p.name.clone(), value: String::new() }),
            Role::Member => None,
        })
        .collect();
    NamedType::Enum(SimpleEnum {
        name: KEYS_NAME.to_string(),
        access,
        raw: CodeType::string(),
        cases,
        conforms: Capabilities::from([Capability::CodingKey]),
        default_value: None,
        comments: Vec::new(),
    })
}

/// Memberwise constructor. Merge-mode members that are nested standard
/// records are flattened into their own arguments when the names allow it.
fn initializer(mode: RecordMode, properties: &[Property], nested: &[NamedType]) -> Initializer {
    let mut init = Initializer::default();
    let mut used = HashSet::new();
    for prop in properties {
        let direct = Assignment::Direct { property: prop.name.clone(), param: prop.name.clone() };
        match mode {
            RecordMode::Standard | RecordMode::Wrapper => {
                used.insert(unescape(&prop.name).to_string());
                init.params.push(Param {
                    name: argument_name(&prop.name),
                    anonymous: false,
                    ty: prop.ty.clone(),
                    default_value: prop.ty.default_value().map(str::to_string),
                });
                init.assignments.push(direct);
            }
            RecordMode::Merge => {
                if let Some(sub) = flattenable(&prop.ty, nested) {
                    let names = sub.initializer.params.iter().map(|p| unescape(&p.name).to_string()).collect::<Vec<_>>();
                    if names.iter().all(|n| !used.contains(n)) {
                        used.extend(names);
                        init.params.extend(sub.initializer.params.iter().cloned());
                        init.assignments.push(Assignment::Construct {
                            property: prop.name.clone(),
                            ty: prop.ty.clone(),
                            args: sub.properties.iter().map(|p| p.name.clone()).collect(),
                        });
                        continue;
                    }
                }
                used.insert(prop.name.clone());
                init.params.push(Param {
                    name: prop.name.clone(),
                    anonymous: true,
                    ty: prop.ty.clone(),
                    default_value: None,
                });
                init.assignments.push(direct);
            }
            RecordMode::Any => {
                init.params.push(Param {
                    name: prop.name.clone(),
                    anonymous: true,
                    ty: prop.ty.clone(),
                    default_value: Some("nil".to_string()),
                });
                init.assignments.push(direct);
            }
        }
    }
    init
}

fn flattenable<'n>(ty: &CodeType, nested: &'n [NamedType]) -> Option<&'n Record> {
    let CodeType::Named(r) = ty else { return None };
    nested.iter().find_map(|n| match n {
        NamedType::Record(rec) if rec.name == r.name && rec.mode == RecordMode::Standard => Some(rec),
        _ => None,
    })
}

// ------------------------------- Tests ------------------------------------ //

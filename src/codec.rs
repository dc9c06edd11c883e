//! Reference codec: decodes JSON through an assembled [`Module`] with the same
//! semantics as the generated `init(from:)` / `encode(to:)` bodies.
//!
//! Type names resolve lexically: the declaring type's own nested types first,
//! then each enclosing owner outward, then the module's top level. Alias peers
//! live in the alias's enclosing scope. `Outer.Inner` navigates downward.
use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

use crate::code::keywords::unescape;
use crate::code::{CodeType, Module, NamedType, Record, RecordMode, Role, SimpleEnum, Union};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("`{ty}` is missing required key `{key}`")]
    MissingKey { ty: String, key: String },
    #[error("{value} is not a case of `{ty}`")]
    UnknownEnumLiteral { ty: String, value: String },
    #[error("no type named `{0}` is in scope")]
    UnresolvedType(String),
    #[error("no case of `{ty}` matched ({} attempts)", .errors.len())]
    NoCaseMatched { ty: String, errors: Vec<DecodeError> },
    #[error("no member of `{0}` matched")]
    NoMemberMatched(String),
    #[error("value is accepted by `{0}`, which it must not be")]
    NotRejected(String),
}

/// A decoded value, shaped after the declaration that decoded it.
#[derive(Debug, Clone, PartialEq)]
pub enum Instance {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    /// Opaque JSON.
    Opaque(Value),
    Array(Vec<Instance>),
    Map(IndexMap<String, Instance>),
    /// An empty optional.
    Absent,
    Record { name: String, mode: RecordMode, fields: Vec<Field> },
    Case { union: String, case: String, payload: Option<Box<Instance>> },
    Enum { name: String, case: String, value: String },
    /// The member of a `OneOfN` that matched first.
    Choice { index: usize, value: Box<Instance> },
    /// Every member of an `AllOfN`.
    All(Vec<Instance>),
    /// Each member of an `AnyOfN`, [`Instance::Absent`] where it did not match.
    Any(Vec<Instance>),
    /// A value the inverse type rejected.
    Not(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub role: Role,
    pub value: Instance,
}

impl Instance {
    pub fn field(&self, name: &str) -> Option<&Instance> {
        match self {
            Instance::Record { fields, .. } => fields.iter().find(|f| f.name == name).map(|f| &f.value),
            _ => None,
        }
    }
}

/// Decode `value` as the module type `type_name` (qualified names allowed).
pub fn decode(module: &Module, type_name: &str, value: &Value) -> Result<Instance, DecodeError> {
    Decoder { module }.decode(&CodeType::external(type_name), &[], value)
}

// ———————————————————————————————————————————————————————————————————————————
// DECODING
// ———————————————————————————————————————————————————————————————————————————

type Scope<'m> = Vec<&'m NamedType>;

struct Decoder<'m> {
    module: &'m Module,
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn mismatch(expected: impl Into<String>, value: &Value) -> DecodeError {
    DecodeError::TypeMismatch { expected: expected.into(), found: kind(value).to_string() }
}

/// Search sibling declarations, looking through alias peers.
fn visible<'m>(siblings: &'m [NamedType], name: &str) -> Option<&'m NamedType> {
    for ty in siblings {
        if unescape(ty.name()) == name {
            return Some(ty);
        }
        if let NamedType::Alias(alias) = ty {
            if let Some(found) = visible(&alias.peers, name) {
                return Some(found);
            }
        }
    }
    None
}

fn sum_arity(name: &str) -> Option<(&'static str, usize)> {
    ["OneOf", "AllOf", "AnyOf"].into_iter().find_map(|prefix| {
        name.strip_prefix(prefix)
            .and_then(|n| n.parse::<usize>().ok())
            .map(|n| (prefix, n))
    })
}

impl<'m> Decoder<'m> {
    fn resolve(&self, name: &str, scope: &[&'m NamedType]) -> Option<(&'m NamedType, Scope<'m>)> {
        let mut segments = name.split('.').map(unescape);
        let first = segments.next()?;
        let (mut ty, mut path) = self.lexical(first, scope)?;
        for segment in segments {
            ty = visible(ty.children(), segment)?;
            path.push(ty);
        }
        Some((ty, path))
    }

    fn lexical(&self, name: &str, scope: &[&'m NamedType]) -> Option<(&'m NamedType, Scope<'m>)> {
        for depth in (0..scope.len()).rev() {
            if let Some(found) = visible(scope[depth].children(), name) {
                let mut path = scope[..=depth].to_vec();
                path.push(found);
                return Some((found, path));
            }
        }
        visible(&self.module.types, name).map(|found| (found, vec![found]))
    }

    fn decode(&self, ty: &CodeType, scope: &[&'m NamedType], value: &Value) -> Result<Instance, DecodeError> {
        let ext = match ty {
            CodeType::Named(r) => return self.named(&r.name, scope, value),
            CodeType::External(ext) => ext,
        };
        let generic = move |i: usize| ext.generics.get(i).ok_or_else(|| DecodeError::UnresolvedType(ty.identifier()));
        match (ext.name.as_str(), value) {
            ("String", Value::String(s)) => Ok(Instance::String(s.clone())),
            ("String", v) => Err(mismatch("a string", v)),
            ("Int", Value::Number(n)) => integer(n).map(Instance::Int).ok_or_else(|| mismatch("an integer", value)),
            ("Int", v) => Err(mismatch("an integer", v)),
            ("Double", Value::Number(n)) => n.as_f64().map(Instance::Double).ok_or_else(|| mismatch("a number", value)),
            ("Double", v) => Err(mismatch("a number", v)),
            ("Bool", Value::Bool(b)) => Ok(Instance::Bool(*b)),
            ("Bool", v) => Err(mismatch("a boolean", v)),
            ("ExplicitNull", Value::Null) => Ok(Instance::Null),
            ("ExplicitNull", v) => Err(mismatch("null", v)),
            ("Bric", v) => Ok(Instance::Opaque(v.clone())),
            ("Optional", Value::Null) => Ok(Instance::Absent),
            ("Optional", v) | ("Indirect", v) => self.decode(generic(0)?, scope, v),
            ("Array", Value::Array(xs)) => {
                let item = generic(0)?;
                xs.iter().map(|x| self.decode(item, scope, x)).collect::<Result<_, _>>().map(Instance::Array)
            }
            ("Array", v) => Err(mismatch("an array", v)),
            ("Dictionary", Value::Object(map)) => {
                let item = generic(1)?;
                let mut out = IndexMap::with_capacity(map.len());
                for (key, x) in map {
                    out.insert(key.clone(), self.decode(item, scope, x)?);
                }
                Ok(Instance::Map(out))
            }
            ("Dictionary", v) => Err(mismatch("an object", v)),
            ("NotBrac", v) => match self.decode(generic(0)?, scope, v) {
                Ok(_) => Err(DecodeError::NotRejected(generic(0)?.identifier())),
                Err(_) => Ok(Instance::Not(v.clone())),
            },
            (name, v) => match sum_arity(name) {
                Some((prefix, n)) if n == ext.generics.len() => self.sum(prefix, ty, &ext.generics, scope, v),
                _ => self.named(name, scope, v),
            },
        }
    }

    fn sum(
        &self,
        prefix: &str,
        ty: &CodeType,
        members: &[CodeType],
        scope: &[&'m NamedType],
        value: &Value,
    ) -> Result<Instance, DecodeError> {
        match prefix {
            "OneOf" => {
                let mut errors = Vec::new();
                for (index, member) in members.iter().enumerate() {
                    match self.decode(member, scope, value) {
                        Ok(x) => return Ok(Instance::Choice { index, value: Box::new(x) }),
                        Err(err) => errors.push(err),
                    }
                }
                Err(DecodeError::NoCaseMatched { ty: ty.identifier(), errors })
            }
            "AllOf" => members
                .iter()
                .map(|m| self.decode(m, scope, value))
                .collect::<Result<_, _>>()
                .map(Instance::All),
            _ => {
                let found = members
                    .iter()
                    .map(|m| self.decode(m, scope, value).unwrap_or(Instance::Absent))
                    .collect::<Vec<_>>();
                if found.iter().all(|x| *x == Instance::Absent) {
                    return Err(DecodeError::NoMemberMatched(ty.identifier()));
                }
                Ok(Instance::Any(found))
            }
        }
    }

    fn named(&self, name: &str, scope: &[&'m NamedType], value: &Value) -> Result<Instance, DecodeError> {
        let (ty, path) = self.resolve(name, scope).ok_or_else(|| DecodeError::UnresolvedType(name.to_string()))?;
        match ty {
            NamedType::Alias(alias) => self.decode(&alias.target, &path, value),
            NamedType::Record(record) => self.record(record, &path, value),
            NamedType::Union(union) => self.union(union, &path, value),
            NamedType::Enum(e) => enumeration(e, value),
            NamedType::Protocol(p) => Err(mismatch(format!("a concrete type, not protocol `{}`", p.name), value)),
        }
    }

    fn record(&self, record: &Record, scope: &[&'m NamedType], value: &Value) -> Result<Instance, DecodeError> {
        let mut fields = Vec::with_capacity(record.properties.len());
        match record.mode {
            RecordMode::Standard => {
                let Value::Object(map) = value else {
                    return Err(mismatch(format!("an object for `{}`", record.name), value));
                };
                for prop in &record.properties {
                    let decoded = match &prop.role {
                        Role::Keyed(key) => match map.get(key) {
                            None | Some(Value::Null) if !prop.required => Instance::Absent,
                            None => {
                                return Err(DecodeError::MissingKey { ty: record.name.clone(), key: key.clone() });
                            }
                            Some(x) => {
                                let ty = prop.ty.optional_payload().unwrap_or(&prop.ty);
                                self.decode(ty, scope, x)?
                            }
                        },
                        Role::Additional => {
                            let rest = map
                                .iter()
                                .filter(|(k, _)| !record.properties.iter().any(|p| p.key() == Some(k.as_str())))
                                .map(|(k, x)| (k.clone(), x.clone()))
                                .collect::<Map<_, _>>();
                            self.decode(&prop.ty, scope, &Value::Object(rest))?
                        }
                        Role::Member => self.decode(&prop.ty, scope, value)?,
                    };
                    fields.push(Field { name: prop.name.clone(), role: prop.role.clone(), value: decoded });
                }
            }
            RecordMode::Merge | RecordMode::Wrapper => {
                for prop in &record.properties {
                    let decoded = self.decode(&prop.ty, scope, value)?;
                    fields.push(Field { name: prop.name.clone(), role: prop.role.clone(), value: decoded });
                }
            }
            RecordMode::Any => {
                for prop in &record.properties {
                    let ty = prop.ty.optional_payload().unwrap_or(&prop.ty);
                    let decoded = self.decode(ty, scope, value).unwrap_or(Instance::Absent);
                    fields.push(Field { name: prop.name.clone(), role: prop.role.clone(), value: decoded });
                }
                if fields.iter().all(|f| f.value == Instance::Absent) {
                    return Err(DecodeError::NoMemberMatched(record.name.clone()));
                }
            }
        }
        Ok(Instance::Record { name: record.name.clone(), mode: record.mode, fields })
    }

    fn union(&self, union: &Union, scope: &[&'m NamedType], value: &Value) -> Result<Instance, DecodeError> {
        if union.is_namespace() {
            return Err(mismatch(format!("a concrete type, not namespace `{}`", union.name), value));
        }
        let mut errors = Vec::new();
        for case in &union.cases {
            let attempt = match &case.payload {
                Some(ty) => self.decode(ty, scope, value).map(|x| Some(Box::new(x))),
                None if value.is_null() => Ok(None),
                None => Err(mismatch("null", value)),
            };
            match attempt {
                Ok(payload) => {
                    return Ok(Instance::Case { union: union.name.clone(), case: case.name.clone(), payload });
                }
                Err(err) => errors.push(err),
            }
        }
        Err(DecodeError::NoCaseMatched { ty: union.name.clone(), errors })
    }
}

fn integer(n: &Number) -> Option<i64> {
    n.as_i64().or_else(|| {
        let f = n.as_f64()?;
        (f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64).then_some(f as i64)
    })
}

fn enumeration(e: &SimpleEnum, value: &Value) -> Result<Instance, DecodeError> {
    let Value::String(raw) = value else {
        return Err(mismatch(format!("a string for `{}`", e.name), value));
    };
    e.cases
        .iter()
        .find(|c| &c.value == raw)
        .map(|c| Instance::Enum { name: e.name.clone(), case: c.name.clone(), value: raw.clone() })
        .ok_or_else(|| DecodeError::UnknownEnumLiteral { ty: e.name.clone(), value: format!("{raw:?}") })
}

// ———————————————————————————————————————————————————————————————————————————
// ENCODING
// ———————————————————————————————————————————————————————————————————————————

/// Encode an instance back to JSON. Empty optional record fields are omitted.
pub fn encode(instance: &Instance) -> Value {
    match instance {
        Instance::Null | Instance::Absent => Value::Null,
        Instance::Bool(b) => Value::Bool(*b),
        Instance::Int(n) => Value::from(*n),
        Instance::Double(x) => Number::from_f64(*x).map_or(Value::Null, Value::Number),
        Instance::String(s) => Value::String(s.clone()),
        Instance::Opaque(v) | Instance::Not(v) => v.clone(),
        Instance::Array(xs) => Value::Array(xs.iter().map(encode).collect()),
        Instance::Map(map) => Value::Object(map.iter().map(|(k, x)| (k.clone(), encode(x))).collect()),
        Instance::Record { mode, fields, .. } => match mode {
            RecordMode::Standard => {
                let mut out = Map::new();
                for field in fields {
                    match (&field.role, &field.value) {
                        (_, Instance::Absent) => {}
                        (Role::Keyed(key), x) => {
                            out.insert(key.clone(), encode(x));
                        }
                        (Role::Additional, Instance::Map(extra)) => {
                            for (key, x) in extra {
                                out.entry(key.clone()).or_insert_with(|| encode(x));
                            }
                        }
                        (_, x) => return merge([Value::Object(out), encode(x)]),
                    }
                }
                Value::Object(out)
            }
            _ => merge(fields.iter().filter(|f| f.value != Instance::Absent).map(|f| encode(&f.value))),
        },
        Instance::Case { payload, .. } => payload.as_deref().map_or(Value::Null, encode),
        Instance::Enum { value, .. } => Value::String(value.clone()),
        Instance::Choice { value, .. } => encode(value),
        Instance::All(xs) => merge(xs.iter().map(encode)),
        Instance::Any(xs) => merge(xs.iter().filter(|x| **x != Instance::Absent).map(encode)),
    }
}

/// Members encoded into one container: objects merge key by key, any other
/// value replaces what came before.
fn merge(values: impl IntoIterator<Item = Value>) -> Value {
    let mut merged = Value::Null;
    for value in values {
        merged = match (merged, value) {
            (Value::Object(mut acc), Value::Object(more)) => {
                acc.extend(more);
                Value::Object(acc)
            }
            (_, value) => value,
        };
    }
    merged
}

// ------------------------------- Tests ------------------------------------ //

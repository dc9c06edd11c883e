//! Code IR: a language-neutral model of the entities the reifier produces.
//!
//! Every entity exposes an `identifier` (how others refer to it), its
//! `direct_references` (names its value representation embeds, used only for
//! cycle detection) and an emitted text form (see [`emit`]).
pub mod emit;
pub mod keywords;

use std::collections::BTreeSet;

// ———————————————————————————————————————————————————————————————————————————
// ATTRIBUTES
// ———————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    #[default]
    Public,
    Private,
    Internal,
    /// No modifier.
    Default,
}

impl Access {
    pub fn keyword(self) -> &'static str {
        match self {
            Access::Public => "public",
            Access::Private => "private",
            Access::Internal => "internal",
            Access::Default => "",
        }
    }
}

/// Capability tags a named type declares; emission joins the tag names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    RawRepresentable,
    Equatable,
    Hashable,
    Codable,
    CodingKey,
}

impl Capability {
    pub fn name(self) -> &'static str {
        match self {
            Capability::RawRepresentable => "RawRepresentable",
            Capability::Equatable => "Equatable",
            Capability::Hashable => "Hashable",
            Capability::Codable => "Codable",
            Capability::CodingKey => "CodingKey",
        }
    }
}

pub type Capabilities = BTreeSet<Capability>;

// ———————————————————————————————————————————————————————————————————————————
// TYPE REFERENCES
// ———————————————————————————————————————————————————————————————————————————

/// A referenceable type: either a runtime/library type or a generated one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeType {
    External(ExternalType),
    Named(NamedRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shorthand {
    Sequence,
    Optional,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalType {
    pub name: String,
    pub generics: Vec<CodeType>,
    pub shorthand: Option<Shorthand>,
    /// Whether the generic arguments are stored inline (not behind a pointer).
    pub embeds: bool,
    pub default_value: Option<String>,
}

/// A reference to a generated [`NamedType`], carrying what cycle checks need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedRef {
    pub name: String,
    pub direct_references: Vec<String>,
    pub default_value: Option<String>,
}

/// Which generic N-ary sum type a collapse targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SumKind {
    OneOf,
    AllOf,
    AnyOf,
}

impl SumKind {
    pub fn generic_name(self, arity: usize) -> String {
        match self {
            SumKind::OneOf => format!("OneOf{arity}"),
            SumKind::AllOf => format!("AllOf{arity}"),
            SumKind::AnyOf => format!("AnyOf{arity}"),
        }
    }
}

impl CodeType {
    pub fn external(name: impl Into<String>) -> Self {
        CodeType::External(ExternalType {
            name: name.into(),
            generics: Vec::new(),
            shorthand: None,
            embeds: false,
            default_value: None,
        })
    }

    fn generic(name: &str, generics: Vec<CodeType>) -> ExternalType {
        ExternalType {
            name: name.to_string(),
            generics,
            shorthand: None,
            embeds: false,
            default_value: None,
        }
    }

    pub fn string() -> Self {
        Self::external("String")
    }
    pub fn int() -> Self {
        Self::external("Int")
    }
    pub fn double() -> Self {
        Self::external("Double")
    }
    pub fn bool() -> Self {
        Self::external("Bool")
    }
    pub fn explicit_null() -> Self {
        Self::external("ExplicitNull")
    }
    /// Opaque JSON value.
    pub fn bric() -> Self {
        Self::external("Bric")
    }

    pub fn array(item: CodeType) -> Self {
        let mut ty = Self::generic("Array", vec![item]);
        ty.shorthand = Some(Shorthand::Sequence);
        ty.default_value = Some("[]".to_string());
        CodeType::External(ty)
    }

    pub fn optional(wrapped: CodeType) -> Self {
        let mut ty = Self::generic("Optional", vec![wrapped]);
        ty.shorthand = Some(Shorthand::Optional);
        ty.embeds = true;
        ty.default_value = Some("nil".to_string());
        CodeType::External(ty)
    }

    pub fn dictionary(value: CodeType) -> Self {
        let mut ty = Self::generic("Dictionary", vec![Self::string(), value]);
        ty.default_value = Some("[:]".to_string());
        CodeType::External(ty)
    }

    pub fn indirect(wrapped: CodeType) -> Self {
        CodeType::External(Self::generic("Indirect", vec![wrapped]))
    }

    pub fn not(inverse: CodeType) -> Self {
        let mut ty = Self::generic("NotBrac", vec![inverse]);
        ty.embeds = true;
        CodeType::External(ty)
    }

    pub fn sum(kind: SumKind, members: Vec<CodeType>) -> Self {
        let name = kind.generic_name(members.len());
        CodeType::External(Self::generic(&name, members))
    }

    /// The text other entities use to refer to this type.
    pub fn identifier(&self) -> String {
        match self {
            CodeType::Named(r) => r.name.clone(),
            CodeType::External(ext) => match (ext.shorthand, ext.generics.as_slice()) {
                (_, []) => ext.name.clone(),
                (Some(Shorthand::Sequence), [item]) => format!("[{}]", item.identifier()),
                (Some(Shorthand::Optional), [wrapped]) => format!("{}?", wrapped.identifier()),
                (_, generics) => {
                    let args = generics.iter().map(CodeType::identifier).collect::<Vec<_>>();
                    format!("{}<{}>", ext.name, args.join(", "))
                }
            },
        }
    }

    pub fn direct_references(&self) -> Vec<String> {
        match self {
            CodeType::Named(r) => r.direct_references.clone(),
            CodeType::External(ext) => {
                let mut refs = vec![ext.name.clone()];
                if ext.embeds {
                    refs.extend(ext.generics.iter().flat_map(CodeType::direct_references));
                }
                refs
            }
        }
    }

    pub fn default_value(&self) -> Option<&str> {
        match self {
            CodeType::Named(r) => r.default_value.as_deref(),
            CodeType::External(ext) => ext.default_value.as_deref(),
        }
    }

    pub fn is_optional(&self) -> bool {
        self.optional_payload().is_some()
    }

    pub fn optional_payload(&self) -> Option<&CodeType> {
        match self {
            CodeType::External(ext) if ext.name == "Optional" => ext.generics.first(),
            _ => None,
        }
    }

    /// Visit every type reference (including generic arguments) mutably.
    pub fn visit_mut(&mut self, f: &mut dyn FnMut(&mut CodeType)) {
        if let CodeType::External(ext) = self {
            ext.generics.iter_mut().for_each(|g| g.visit_mut(f));
        }
        f(self);
    }
}

// ———————————————————————————————————————————————————————————————————————————
// MEMBERS
// ———————————————————————————————————————————————————————————————————————————

/// How a property participates in the serialized form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Stored under a JSON object key.
    Keyed(String),
    /// A whole-value member of a merge/any record, or a wrapper's raw value.
    Member,
    /// Remaining keys not claimed by any keyed property.
    Additional,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Declaration name, already escaped.
    pub name: String,
    pub role: Role,
    /// Externally visible type (`Optional` wrapped when not required).
    pub ty: CodeType,
    pub required: bool,
    /// Stored in a private boxed slot behind a computed accessor.
    pub indirect: bool,
    pub access: Access,
    pub comments: Vec<String>,
}

impl Property {
    /// Name of the private backing slot for indirect properties.
    pub fn slot_name(&self) -> String {
        format!("_{}", keywords::unescape(&self.name))
    }

    pub fn key(&self) -> Option<&str> {
        match &self.role {
            Role::Keyed(key) => Some(key),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Argument-position name.
    pub name: String,
    pub anonymous: bool,
    pub ty: CodeType,
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    /// `self.property = param`
    Direct { property: String, param: String },
    /// `self.property = T(label: param, …)`; a flattened sub-record constructor.
    Construct { property: String, ty: CodeType, args: Vec<String> },
}

/// The memberwise constructor of a record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Initializer {
    pub params: Vec<Param>,
    pub assignments: Vec<Assignment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    pub name: String,
    /// `None` for payload-less cases, which serialize as null.
    pub payload: Option<CodeType>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumCase {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolMember {
    pub name: String,
    pub ty: CodeType,
}

// ———————————————————————————————————————————————————————————————————————————
// NAMED TYPES
// ———————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeAlias {
    pub name: String,
    pub access: Access,
    pub target: CodeType,
    /// Sibling declarations emitted alongside the alias.
    pub peers: Vec<NamedType>,
    pub comments: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordMode {
    /// Keyed properties.
    Standard,
    /// allOf: every member decodes from the whole value.
    Merge,
    /// anyOf: members are optional, at least one must decode.
    Any,
    /// Single-value wrapper around a primitive.
    Wrapper,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    pub access: Access,
    pub mode: RecordMode,
    pub properties: Vec<Property>,
    pub initializer: Initializer,
    pub nested: Vec<NamedType>,
    pub conforms: Capabilities,
    pub comments: Vec<String>,
}

/// Discriminated union. With no cases it is a plain namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Union {
    pub name: String,
    pub access: Access,
    pub cases: Vec<Case>,
    pub nested: Vec<NamedType>,
    pub conforms: Capabilities,
    pub comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleEnum {
    pub name: String,
    pub access: Access,
    pub raw: CodeType,
    pub cases: Vec<EnumCase>,
    pub conforms: Capabilities,
    /// Set for singleton enums (e.g. `.value`).
    pub default_value: Option<String>,
    pub comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Protocol {
    pub name: String,
    pub access: Access,
    pub conforms: Capabilities,
    pub members: Vec<ProtocolMember>,
    pub comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamedType {
    Alias(TypeAlias),
    Record(Record),
    Union(Union),
    Enum(SimpleEnum),
    Protocol(Protocol),
}

impl Union {
    pub fn namespace(name: String, access: Access, nested: Vec<NamedType>) -> Self {
        Union {
            name,
            access,
            cases: Vec::new(),
            nested,
            conforms: Capabilities::new(),
            comments: Vec::new(),
        }
    }

    pub fn is_namespace(&self) -> bool {
        self.cases.is_empty()
    }
}

impl NamedType {
    pub fn name(&self) -> &str {
        match self {
            NamedType::Alias(t) => &t.name,
            NamedType::Record(t) => &t.name,
            NamedType::Union(t) => &t.name,
            NamedType::Enum(t) => &t.name,
            NamedType::Protocol(t) => &t.name,
        }
    }

    pub fn set_name(&mut self, name: String) {
        match self {
            NamedType::Alias(t) => t.name = name,
            NamedType::Record(t) => t.name = name,
            NamedType::Union(t) => t.name = name,
            NamedType::Enum(t) => t.name = name,
            NamedType::Protocol(t) => t.name = name,
        }
    }

    pub fn comments_mut(&mut self) -> &mut Vec<String> {
        match self {
            NamedType::Alias(t) => &mut t.comments,
            NamedType::Record(t) => &mut t.comments,
            NamedType::Union(t) => &mut t.comments,
            NamedType::Enum(t) => &mut t.comments,
            NamedType::Protocol(t) => &mut t.comments,
        }
    }

    /// Sibling emission group: protocols, aliases, enums, everything else.
    pub fn rank(&self) -> u8 {
        match self {
            NamedType::Protocol(_) => 0,
            NamedType::Alias(_) => 1,
            NamedType::Enum(_) | NamedType::Union(_) => 2,
            NamedType::Record(_) => 3,
        }
    }

    /// Alias with no peers: safe to inline its target.
    pub fn as_pure_alias(&self) -> Option<&CodeType> {
        match self {
            NamedType::Alias(a) if a.peers.is_empty() => Some(&a.target),
            _ => None,
        }
    }

    pub fn is_simple_enum(&self) -> bool {
        matches!(self, NamedType::Enum(_))
    }

    /// Types owned by this one: nested types, or an alias's peers.
    pub fn children(&self) -> &[NamedType] {
        match self {
            NamedType::Alias(t) => &t.peers,
            NamedType::Record(t) => &t.nested,
            NamedType::Union(t) => &t.nested,
            NamedType::Enum(_) | NamedType::Protocol(_) => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<NamedType>> {
        match self {
            NamedType::Alias(t) => Some(&mut t.peers),
            NamedType::Record(t) => Some(&mut t.nested),
            NamedType::Union(t) => Some(&mut t.nested),
            NamedType::Enum(_) | NamedType::Protocol(_) => None,
        }
    }

    pub fn direct_references(&self) -> Vec<String> {
        match self {
            NamedType::Alias(t) => t.target.direct_references(),
            NamedType::Record(t) => {
                let mut refs = vec![t.name.clone()];
                for p in t.properties.iter().filter(|p| !p.indirect) {
                    refs.extend(p.ty.direct_references());
                }
                refs
            }
            NamedType::Union(t) => {
                let mut refs = vec![t.name.clone()];
                for c in &t.cases {
                    refs.extend(c.payload.iter().flat_map(CodeType::direct_references));
                }
                refs
            }
            NamedType::Enum(t) => vec![t.name.clone()],
            NamedType::Protocol(_) => Vec::new(),
        }
    }

    /// A type reference pointing at this declaration.
    pub fn reference(&self) -> CodeType {
        let default_value = match self {
            NamedType::Enum(e) => e.default_value.clone(),
            NamedType::Alias(a) => a.target.default_value().map(str::to_string),
            _ => None,
        };
        CodeType::Named(NamedRef {
            name: self.name().to_string(),
            direct_references: self.direct_references(),
            default_value,
        })
    }

    /// Visit every type reference this declaration makes (not its children's).
    pub fn visit_own_types_mut(&mut self, f: &mut dyn FnMut(&mut CodeType)) {
        match self {
            NamedType::Alias(t) => t.target.visit_mut(f),
            NamedType::Record(t) => {
                t.properties.iter_mut().for_each(|p| p.ty.visit_mut(f));
                for param in &mut t.initializer.params {
                    param.ty.visit_mut(f);
                }
                for assignment in &mut t.initializer.assignments {
                    if let Assignment::Construct { ty, .. } = assignment {
                        ty.visit_mut(f);
                    }
                }
            }
            NamedType::Union(t) => {
                for c in &mut t.cases {
                    if let Some(p) = c.payload.as_mut() {
                        p.visit_mut(f);
                    }
                }
            }
            NamedType::Enum(t) => t.raw.visit_mut(f),
            NamedType::Protocol(t) => t.members.iter_mut().for_each(|m| m.ty.visit_mut(f)),
        }
    }

    /// Depth-first pre-order walk over this type and everything it owns.
    pub fn walk<'a>(&'a self, out: &mut Vec<&'a NamedType>) {
        out.push(self);
        for child in self.children() {
            child.walk(out);
        }
    }
}

// ———————————————————————————————————————————————————————————————————————————
// MODULE
// ———————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Module {
    pub imports: Vec<String>,
    pub types: Vec<NamedType>,
    /// Name of the root type, when one was assembled.
    pub root: Option<String>,
}

impl Module {
    /// Every declaration in the module, depth-first.
    pub fn deep_types(&self) -> Vec<&NamedType> {
        let mut out = Vec::new();
        for ty in &self.types {
            ty.walk(&mut out);
        }
        out
    }

    pub fn get(&self, name: &str) -> Option<&NamedType> {
        self.types.iter().find(|t| t.name() == name)
    }
}

// ------------------------------- Tests ------------------------------------ //

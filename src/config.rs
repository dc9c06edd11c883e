//! Configuration knobs and caller-supplied hooks.
//!
//! Hooks must be pure: the reifier calls them repeatedly and memoizes nothing.
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::code::{Access, Capabilities, Capability};
use crate::schema::Primitive;

/// Largest arity of the generic `OneOfN` / `AllOfN` / `AnyOfN` runtime types.
pub const SUM_TYPE_MAX_ARITY: usize = 10;

pub type Accessor = Arc<dyn Fn(&[String]) -> Access + Send + Sync>;
pub type Renamer = Arc<dyn Fn(&[String], &str) -> Option<String> + Send + Sync>;
pub type PropertyOrdering = Arc<dyn Fn(&[String], &str) -> Option<Vec<String>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumCase {
    #[default]
    Lower,
    Upper,
}

#[derive(Clone)]
pub struct Config {
    /// Access level for a declaration, given its parent chain.
    pub access: Accessor,
    /// Overrides the generated name for `(parents, id)`.
    pub renamer: Renamer,
    /// Explicit property order for the record `(parents, id)`.
    pub property_order: PropertyOrdering,
    /// Top-level type names dropped from the assembled module.
    pub excludes: BTreeSet<String>,
    /// Names generated as single-value wrapper types instead of plain aliases.
    pub encapsulate: IndexMap<String, Primitive>,
    pub collapse_one_of: bool,
    pub collapse_all_of: bool,
    pub collapse_any_of: bool,
    pub any_of_as_one_of: bool,
    /// Optional object-shaped siblings needed before properties are boxed.
    pub indirect_threshold: usize,
    pub enum_case: EnumCase,
    pub trim_prefixes: Vec<String>,
    pub type_suffix: String,
    pub case_suffix: String,
    pub one_of_suffix: String,
    pub all_of_suffix: String,
    pub any_of_suffix: String,
    pub namespace_suffix: String,
    pub equatable: bool,
    pub hashable: bool,
    pub codable: bool,
    pub imports: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            access: Arc::new(|_: &[String]| Access::Public),
            renamer: Arc::new(|_: &[String], _: &str| None::<String>),
            property_order: Arc::new(|_: &[String], _: &str| None::<Vec<String>>),
            excludes: BTreeSet::new(),
            encapsulate: IndexMap::new(),
            collapse_one_of: true,
            collapse_all_of: true,
            collapse_any_of: true,
            any_of_as_one_of: false,
            indirect_threshold: 99,
            enum_case: EnumCase::Lower,
            trim_prefixes: vec!["#/definitions/".into(), "#/defs/".into(), "#/$defs/".into()],
            type_suffix: String::new(),
            case_suffix: "Case".into(),
            one_of_suffix: "Choice".into(),
            all_of_suffix: "Sum".into(),
            any_of_suffix: "Some".into(),
            namespace_suffix: "Types".into(),
            equatable: true,
            hashable: true,
            codable: true,
            imports: vec!["BricBrac".into()],
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("excludes", &self.excludes)
            .field("encapsulate", &self.encapsulate)
            .field("collapse_one_of", &self.collapse_one_of)
            .field("collapse_all_of", &self.collapse_all_of)
            .field("collapse_any_of", &self.collapse_any_of)
            .field("any_of_as_one_of", &self.any_of_as_one_of)
            .field("indirect_threshold", &self.indirect_threshold)
            .field("enum_case", &self.enum_case)
            .field("trim_prefixes", &self.trim_prefixes)
            .field("imports", &self.imports)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn access_for(&self, parents: &[String]) -> Access {
        (self.access)(parents)
    }

    pub fn rename(&self, parents: &[String], id: &str) -> Option<String> {
        (self.renamer)(parents, id)
    }

    pub fn ordering_for(&self, parents: &[String], id: &str) -> Option<Vec<String>> {
        (self.property_order)(parents, id)
    }

    /// Install a renamer from a lookup table. Keys are either a bare id or a
    /// dotted path (`Parent.Child.id`); the dotted form wins.
    pub fn with_renames(mut self, table: IndexMap<String, String>) -> Self {
        if table.is_empty() {
            return self;
        }
        self.renamer = Arc::new(move |parents: &[String], id: &str| {
            let mut qualified = parents.join(".");
            if !qualified.is_empty() {
                qualified.push('.');
            }
            qualified.push_str(id);
            table.get(&qualified).or_else(|| table.get(id)).cloned()
        });
        self
    }

    /// Capability tags carried by generated records, unions and enums.
    pub fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::new();
        if self.equatable {
            caps.insert(Capability::Equatable);
        }
        if self.hashable {
            caps.insert(Capability::Hashable);
        }
        if self.codable {
            caps.insert(Capability::Codable);
        }
        caps
    }
}

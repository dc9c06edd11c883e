//! Identifier synthesis: sanitizing, keyword escaping and collision suffixes.
use std::collections::HashSet;

use super::Reifier;
use crate::code::keywords::{escape, is_keyword, unescape};
use crate::config::EnumCase;
use crate::schema::Schema;

/// Anonymous types named after their properties use at most this many names.
const MAX_PROPERTY_NAMES_IN_TYPE_NAME: usize = 5;

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_identifier_body(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Drop characters that cannot appear in an identifier, capitalizing the
/// character that follows each dropped run.
pub fn sanitize(name: &str, capitalize: bool) -> String {
    let mut out = String::with_capacity(name.len());
    let mut cap_next = capitalize;
    for c in name.chars() {
        let valid = if out.is_empty() { is_identifier_start(c) } else { is_identifier_body(c) };
        if !valid {
            cap_next = if out.is_empty() { capitalize } else { true };
        } else if cap_next {
            out.extend(c.to_uppercase());
            cap_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Deterministic fallback for names with no identifier characters: `>=` → `U62U61`,
/// and `""` → `empty`.
pub fn codepoint_name(name: &str, upper: bool) -> String {
    if name.is_empty() {
        return if upper { "Empty" } else { "empty" }.to_string();
    }
    let prefix = if upper { 'U' } else { 'u' };
    name.chars().map(|c| format!("{prefix}{}", c as u32)).collect()
}

/// First of `base`, `base1`, `base2`, … not in `taken`; records the result.
pub fn unique(base: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(base.clone()) {
        return base;
    }
    let plain = unescape(&base).to_string();
    let mut n = 1usize;
    loop {
        let candidate = format!("{plain}{n}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Id for an anonymous sub-schema: its title, else its property names, else its position.
pub fn anonymous_type_id(schema: &Schema, ordinal: usize) -> String {
    if let Some(title) = schema.title.as_deref().filter(|t| !t.trim().is_empty()) {
        return title.to_string();
    }
    if let Some(props) = schema.properties.as_ref() {
        if (1..=MAX_PROPERTY_NAMES_IN_TYPE_NAME).contains(&props.len()) {
            let joined = props.keys().map(|k| sanitize(k, true)).collect::<String>();
            if !joined.is_empty() {
                return format!("{joined}Type");
            }
        }
    }
    format!("Type{}", ordinal + 1)
}

fn escape_keyword(name: String) -> String {
    if is_keyword(&name) { escape(&name) } else { name }
}

impl Reifier<'_> {
    pub(crate) fn upper_cases(&self) -> bool {
        self.config.enum_case == EnumCase::Upper
    }

    /// Name of a declaration. Reference paths lose their definition prefix.
    pub fn type_name(&self, parents: &[String], id: &str, capitalize: bool) -> String {
        if let Some(name) = self.config.rename(parents, id) {
            return name;
        }
        if id == "#" {
            if let Some(root) = &self.root_name {
                return root.clone();
            }
        }
        let trimmed = self
            .config
            .trim_prefixes
            .iter()
            .find_map(|p| id.strip_prefix(p.as_str()))
            .unwrap_or(id);
        let name = sanitize(trimmed, capitalize);
        if name.is_empty() {
            return codepoint_name(trimmed, capitalize);
        }
        escape_keyword(name)
    }

    /// Name of the type a `$ref` points at; independent of where it is used.
    pub fn reference_name(&self, reference: &str) -> String {
        self.type_name(&[], reference, true)
    }

    /// Declaration name of a property.
    pub fn property_name(&self, parents: &[String], id: &str) -> String {
        if let Some(name) = self.config.rename(parents, id) {
            return name;
        }
        if id == "init" {
            return "initx".to_string();
        }
        let name = sanitize(id, false);
        if name.is_empty() {
            return codepoint_name(id, false);
        }
        escape_keyword(name)
    }

    /// Case name of a string enumeration literal.
    pub fn enum_case_name(&self, parents: &[String], value: &str) -> String {
        let upper = self.upper_cases();
        if let Some(name) = self.config.rename(parents, value) {
            return name;
        }
        let name = sanitize(value, upper);
        if name.is_empty() {
            return codepoint_name(value, upper);
        }
        escape_keyword(name)
    }

    /// Case name of a union member, derived from its payload's reference name.
    pub fn union_case_name(&self, parents: &[String], identifier: &str) -> String {
        let upper = self.upper_cases();
        let base = match self.config.rename(parents, identifier) {
            Some(name) => name,
            None => {
                let name = sanitize(identifier, upper);
                if name.is_empty() { codepoint_name(identifier, upper) } else { name }
            }
        };
        let mut name = format!("{}{}", unescape(&base), self.config.case_suffix);
        let mut chars = name.chars();
        let first = chars.next();
        let second = chars.next();
        if !upper && name.chars().count() > 2 && second.is_some_and(|c| !c.is_uppercase()) {
            if let Some(first) = first {
                name = first.to_lowercase().chain(name.chars().skip(1)).collect();
            }
        }
        escape_keyword(name)
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;

    #[test]
    fn sanitize_drops_and_capitalizes() {
        assert_eq!(sanitize("foo-bar baz", false), "fooBarBaz");
        assert_eq!(sanitize("foo-bar", true), "FooBar");
        assert_eq!(sanitize("1st_place", false), "st_place");
        assert_eq!(sanitize("$schema", true), "Schema");
        assert_eq!(sanitize(">=", true), "");
    }

    #[test]
    fn codepoint_fallback() {
        assert_eq!(codepoint_name(">=", true), "U62U61");
        assert_eq!(codepoint_name(">=", false), "u62u61");
        assert_eq!(codepoint_name("", true), "Empty");
        assert_eq!(codepoint_name("", false), "empty");
    }

    #[test]
    fn unique_suffixes_deterministically() {
        let mut taken = HashSet::new();
        assert_eq!(unique("a".into(), &mut taken), "a");
        assert_eq!(unique("a".into(), &mut taken), "a1");
        assert_eq!(unique("a".into(), &mut taken), "a2");
        assert_eq!(unique("`Type`".into(), &mut taken), "`Type`");
        assert_eq!(unique("`Type`".into(), &mut taken), "Type1");
    }

    #[test]
    fn type_names() {
        let config = Config::default();
        let r = Reifier::new(&config);
        assert_eq!(r.type_name(&[], "#/definitions/line-item", true), "LineItem");
        assert_eq!(r.type_name(&[], "#/defs/Shape", true), "Shape");
        assert_eq!(r.type_name(&[], ">=", true), "U62U61");
        assert_eq!(r.type_name(&[], "protocol", false), "`protocol`");
        let rooted = Reifier::new(&config).with_root("Document");
        assert_eq!(rooted.reference_name("#"), "Document");
    }

    #[test]
    fn property_names() {
        let config = Config::default();
        let r = Reifier::new(&config);
        assert_eq!(r.property_name(&[], "class"), "`class`");
        assert_eq!(r.property_name(&[], "init"), "initx");
        assert_eq!(r.property_name(&[], "first-name"), "firstName");
        assert_eq!(r.property_name(&[], ">="), "u62u61");
        assert_eq!(r.property_name(&[], ""), "empty");
        assert_eq!(r.enum_case_name(&[], ""), "empty");
        assert_eq!(r.type_name(&[], "", true), "Empty");
    }

    #[test]
    fn union_case_names_fold_case() {
        let config = Config::default();
        let r = Reifier::new(&config);
        assert_eq!(r.union_case_name(&[], "String"), "stringCase");
        assert_eq!(r.union_case_name(&[], "[String]"), "stringCase");
        assert_eq!(r.union_case_name(&[], "RGB"), "RGBCase");
        assert_eq!(r.union_case_name(&[], "OneOf2<String, Int>"), "oneOf2StringIntCase");
        let upper = Config { enum_case: EnumCase::Upper, ..Config::default() };
        assert_eq!(Reifier::new(&upper).union_case_name(&[], "String"), "StringCase");
    }

    #[test]
    fn anonymous_ids() {
        let titled = Schema::from_value(json!({"title": "Circle", "properties": {"r": {}}})).unwrap();
        assert_eq!(anonymous_type_id(&titled, 0), "Circle");
        let named = Schema::from_value(json!({"properties": {"x": {}, "y-pos": {}}})).unwrap();
        assert_eq!(anonymous_type_id(&named, 0), "XYPosType");
        let bare = Schema::from_value(json!({"type": "object"})).unwrap();
        assert_eq!(anonymous_type_id(&bare, 2), "Type3");
    }
}

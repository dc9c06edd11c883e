//! Promotion pass: hoists structurally identical nested enumerations to one
//! shared top-level declaration.
//!
//! Two enumerations are identical when they emit identical text. Promotion is
//! a single pass; enumerations are leaves, so no fixed point is needed.
use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use crate::code::emit::render;
use crate::code::{CodeType, NamedType};
use crate::reify::naming::unique;

const KEYS_NAME: &str = "CodingKeys";

struct Group {
    first: NamedType,
    occurrences: usize,
    top_level: bool,
}

fn promotable(ty: &NamedType) -> bool {
    ty.is_simple_enum() && ty.name() != KEYS_NAME
}

fn collect_nested(ty: &NamedType, groups: &mut IndexMap<String, Group>) {
    for child in ty.children() {
        if promotable(child) {
            let text = render(child);
            groups
                .entry(text)
                .or_insert_with(|| Group { first: child.clone(), occurrences: 0, top_level: false })
                .occurrences += 1;
        }
        collect_nested(child, groups);
    }
}

/// Hoist duplicated nested enumerations in `types`, renaming on collision.
pub fn promote(types: &mut Vec<NamedType>) {
    let mut groups: IndexMap<String, Group> = IndexMap::new();
    for ty in types.iter() {
        collect_nested(ty, &mut groups);
    }
    for ty in types.iter().filter(|t| promotable(t)) {
        if let Some(group) = groups.get_mut(&render(ty)) {
            group.occurrences += 1;
            group.top_level = true;
        }
    }
    groups.retain(|_, g| g.occurrences > 1);
    if groups.is_empty() {
        return;
    }

    // Final names: a group keeps its name unless an unrelated top-level type
    // or an earlier group holds it.
    let mut taken = types
        .iter()
        .filter(|t| !(promotable(t) && groups.contains_key(&render(*t))))
        .map(|t| t.name().to_string())
        .collect::<HashSet<_>>();
    let mut targets: HashMap<String, String> = HashMap::with_capacity(groups.len());
    for (text, group) in &groups {
        let name = if group.top_level {
            group.first.name().to_string()
        } else {
            unique(group.first.name().to_string(), &mut taken)
        };
        taken.insert(name.clone());
        targets.insert(text.clone(), name);
    }

    for ty in types.iter_mut() {
        strip(ty, &targets);
    }

    for (text, group) in groups {
        let name = &targets[&text];
        tracing::debug!(name = %name, occurrences = group.occurrences, "promoted enumeration");
        if group.top_level {
            continue;
        }
        let mut promoted = group.first;
        if promoted.name() != name {
            promoted.set_name(name.clone());
        }
        types.push(promoted);
    }
}

/// Delete promoted copies below `owner` and point its references at the
/// promoted names.
fn strip(owner: &mut NamedType, targets: &HashMap<String, String>) {
    let mut renames = Vec::new();
    if let Some(children) = owner.children_mut() {
        children.retain(|child| {
            if !promotable(child) {
                return true;
            }
            match targets.get(&render(child)) {
                Some(target) => {
                    if target != child.name() {
                        renames.push((child.name().to_string(), target.clone()));
                    }
                    false
                }
                None => true,
            }
        });
        for child in children.iter_mut() {
            strip(child, targets);
        }
    }
    for (from, to) in renames {
        rewrite(owner, &from, &mut |t| rename_reference(t, &from, &to));
    }
}

/// Rename the declaration `from` nested directly below `owner` and repoint
/// the declared-type references that resolve to it. `$ref` targets keep
/// their names.
pub(crate) fn rename_nested(owner: &mut NamedType, from: &str, to: &str) {
    if let Some(children) = owner.children_mut() {
        for child in children.iter_mut().filter(|c| c.name() == from) {
            child.set_name(to.to_string());
        }
    }
    rewrite(owner, from, &mut |t| {
        if let CodeType::Named(r) = t {
            if r.name == from {
                r.name = to.to_string();
            }
        }
    });
}

/// Apply `rename` to the types within `ty`'s subtree, stopping where a nested
/// declaration named `from` shadows it.
fn rewrite(ty: &mut NamedType, from: &str, rename: &mut dyn FnMut(&mut CodeType)) {
    if ty.children().iter().any(|c| c.name() == from) {
        return;
    }
    ty.visit_own_types_mut(rename);
    if let Some(children) = ty.children_mut() {
        for child in children.iter_mut() {
            rewrite(child, from, rename);
        }
    }
}

fn rename_reference(ty: &mut CodeType, from: &str, to: &str) {
    match ty {
        CodeType::Named(r) => {
            if r.name == from {
                r.name = to.to_string();
            }
            for name in r.direct_references.iter_mut().filter(|n| n.as_str() == from) {
                *name = to.to_string();
            }
        }
        CodeType::External(ext) => {
            if ext.name == from {
                ext.name = to.to_string();
            }
        }
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::reify::reify;
    use crate::schema::{Schema, SchemaDocument};
    use serde_json::{Value, json};

    fn reified(value: Value, id: &str) -> NamedType {
        let schema = Schema::from_value(SchemaDocument::new(value).root().clone()).unwrap();
        reify(&schema, id, &[], &Config::default()).unwrap()
    }

    fn with_kind(id: &str, cases: &[&str]) -> NamedType {
        reified(json!({"properties": {"kind": {"enum": cases}}}), id)
    }

    fn nested_names(ty: &NamedType) -> Vec<&str> {
        ty.children().iter().map(NamedType::name).collect()
    }

    #[test]
    fn duplicated_enums_share_one_definition() {
        let mut types = vec![with_kind("A", &["a", "b", "c"]), with_kind("B", &["a", "b", "c"])];
        promote(&mut types);
        let names = types.iter().map(NamedType::name).collect::<Vec<_>>();
        assert_eq!(names, vec!["A", "B", "Kind"]);
        for owner in &types[..2] {
            assert_eq!(nested_names(owner), vec!["CodingKeys"]);
            assert!(render(owner).contains("public var kind: Kind?"));
        }
    }

    #[test]
    fn singletons_and_keys_stay_nested() {
        let mut types = vec![with_kind("A", &["a", "b"]), with_kind("B", &["x", "y"])];
        let before = types.clone();
        promote(&mut types);
        assert_eq!(types, before);
    }

    #[test]
    fn existing_top_level_copy_is_reused() {
        let top = reified(json!({"enum": ["a", "b"]}), "Kind");
        let mut types = vec![top, with_kind("A", &["a", "b"])];
        promote(&mut types);
        assert_eq!(types.len(), 2);
        assert_eq!(nested_names(&types[1]), vec!["CodingKeys"]);
    }

    #[test]
    fn collisions_are_renamed_and_references_follow() {
        let unrelated = reified(json!({"properties": {"x": {"type": "string"}}}), "Kind");
        let mut types = vec![unrelated, with_kind("A", &["a", "b"]), with_kind("B", &["a", "b"])];
        promote(&mut types);
        assert_eq!(types.last().map(NamedType::name), Some("Kind1"));
        let text = render(&types[1]);
        assert!(text.contains("public var kind: Kind1?"), "{text}");
        assert!(text.contains("try values.decodeIfPresent(Kind1.self, forKey: .kind)"), "{text}");
    }

    #[test]
    fn distinct_groups_with_one_name_get_distinct_names() {
        let mut types = vec![
            with_kind("A", &["a"]),
            with_kind("B", &["a"]),
            with_kind("C", &["z"]),
            with_kind("D", &["z"]),
        ];
        promote(&mut types);
        let names = types.iter().map(NamedType::name).collect::<Vec<_>>();
        assert_eq!(names, vec!["A", "B", "C", "D", "Kind", "Kind1"]);
        assert!(render(&types[3]).contains("public var kind: Kind1?"));
    }
}

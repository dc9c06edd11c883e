//! Module assembly: reify a named schema set, promote shared enumerations,
//! apply exclusions and hang everything off an optional root type.
use std::collections::HashSet;

use crate::code::emit::render;
use crate::code::keywords::unescape;
use crate::code::{Module, NamedType};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::promote::{promote, rename_nested};
use crate::reify::naming::unique;
use crate::reify::{Reifier, primitive_type};
use crate::schema::{Schema, parse};

const KEYS_NAME: &str = "CodingKeys";

/// Build a [`Module`] from `(id, schema)` pairs. The pair whose id equals
/// `root` is reified last and becomes the module's root type.
pub fn assemble(schemas: &[(String, Schema)], root: Option<&str>, config: &Config) -> Result<Module> {
    let mut reifier = Reifier::new(config);
    let root_name = root.map(|id| reifier.type_name(&[], id, true));
    if let Some(name) = &root_name {
        reifier = reifier.with_root(name.clone());
    }

    let mut types = Vec::with_capacity(schemas.len());
    for (id, schema) in schemas {
        if Some(id.as_str()) == root {
            continue;
        }
        types.push(reifier.reify(schema, id, &[])?);
    }

    promote(&mut types);
    inject_wrappers(&reifier, &mut types);

    let present = types.iter().map(|t| unescape(t.name()).to_string()).collect::<HashSet<_>>();
    for name in config.excludes.iter().filter(|n| !present.contains(*n)) {
        tracing::warn!(name = %name, "excluded type does not exist");
    }
    types.retain(|t| !config.excludes.contains(unescape(t.name())));

    let types = match (root, root_name.as_deref()) {
        (Some(id), Some(name)) => match schemas.iter().find(|(key, _)| key == id) {
            Some((_, schema)) => {
                match reifier.reify(schema, id, &[])? {
                    mut top @ NamedType::Record(_) => {
                        make_room(&mut top, &types)?;
                        if let Some(nested) = top.children_mut() {
                            nested.extend(types);
                        }
                        vec![top]
                    }
                    top => {
                        let mut all = vec![top];
                        all.extend(types);
                        all
                    }
                }
            }
            None => {
                tracing::warn!(root = %name, "root schema not found; assembling without a root");
                types
            }
        },
        _ => types,
    };
    check_unique(&types)?;

    let root = root_name.filter(|name| types.iter().any(|t| t.name() == name));
    tracing::info!(types = types.len(), root = ?root, "assembled module");
    Ok(Module {
        imports: config.imports.clone(),
        types,
        root,
    })
}

/// Parse a schema document and render the assembled module as source text.
pub fn generate(source: &str, root: Option<&str>, config: &Config) -> Result<String> {
    let schemas = parse(source, root)?;
    let module = assemble(&schemas, root, config)?;
    Ok(render(&module))
}

/// Encapsulated names that no schema produced still get their wrapper type.
fn inject_wrappers(reifier: &Reifier<'_>, types: &mut Vec<NamedType>) {
    let mut deep = Vec::new();
    for ty in types.iter() {
        ty.walk(&mut deep);
    }
    let existing = deep.iter().map(|t| unescape(t.name()).to_string()).collect::<HashSet<_>>();
    let config = reifier.config();
    let missing = config
        .encapsulate
        .iter()
        .filter(|(name, _)| !existing.contains(name.as_str()))
        .map(|(name, raw)| reifier.wrapper(name.clone(), config.access_for(&[]), primitive_type(*raw)))
        .collect::<Vec<_>>();
    types.extend(missing);
}

/// Rename the root's own nested types that share a name with a definition
/// about to be nested beside them.
fn make_room(root: &mut NamedType, incoming: &[NamedType]) -> Result<()> {
    let clashes = incoming
        .iter()
        .map(NamedType::name)
        .filter(|name| root.children().iter().any(|c| c.name() == *name))
        .map(str::to_string)
        .collect::<Vec<_>>();
    let mut taken = root
        .children()
        .iter()
        .chain(incoming)
        .map(|t| t.name().to_string())
        .collect::<HashSet<_>>();
    for from in clashes {
        if from == KEYS_NAME {
            return Err(Error::illegal_state(format!("`{KEYS_NAME}` cannot nest under root `{}`", root.name())));
        }
        let to = unique(from.clone(), &mut taken);
        tracing::debug!(root = %root.name(), from = %from, to = %to, "renamed root-owned type");
        rename_nested(root, &from, &to);
    }
    Ok(())
}

fn check_unique(types: &[NamedType]) -> Result<()> {
    let mut seen = HashSet::with_capacity(types.len());
    for ty in types {
        if !seen.insert(ty.name()) {
            return Err(Error::illegal_state(format!("duplicate top-level type `{}`", ty.name())));
        }
    }
    Ok(())
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Primitive;
    use serde_json::{Value, json};

    fn module(value: Value, root: Option<&str>, config: &Config) -> Result<Module> {
        let schemas = parse(&value.to_string(), root)?;
        assemble(&schemas, root, config)
    }

    fn names(module: &Module) -> Vec<&str> {
        module.types.iter().map(NamedType::name).collect()
    }

    #[test]
    fn shared_enums_are_promoted_across_definitions() {
        let m = module(
            json!({
                "definitions": {
                    "A": {"properties": {"kind": {"enum": ["a", "b", "c"]}}},
                    "B": {"properties": {"kind": {"enum": ["a", "b", "c"]}}}
                }
            }),
            None,
            &Config::default(),
        )
        .unwrap();
        assert_eq!(names(&m), vec!["A", "B", "Kind"]);
        let text = render(&m);
        assert_eq!(text.matches("public enum Kind :").count(), 1, "{text}");
    }

    #[test]
    fn record_root_nests_definitions() {
        let m = module(
            json!({
                "type": "object",
                "properties": {"items": {"type": "array", "items": {"$ref": "#/definitions/Item"}}},
                "definitions": {
                    "Item": {"properties": {"parent": {"$ref": "#"}}}
                }
            }),
            Some("Doc"),
            &Config::default(),
        )
        .unwrap();
        assert_eq!(names(&m), vec!["Doc"]);
        assert_eq!(m.root.as_deref(), Some("Doc"));
        let text = render(&m);
        assert!(text.starts_with("import BricBrac\n\npublic struct Doc : "), "{text}");
        assert!(text.contains("    public struct Item : "));
        assert!(text.contains("        public var parent: Doc?\n"));
    }

    #[test]
    fn root_owned_types_make_room_for_definitions() {
        let m = module(
            json!({
                "type": "object",
                "properties": {
                    "item": {"properties": {"label": {"type": "string"}}},
                    "primary": {"$ref": "#/definitions/Item"}
                },
                "definitions": {
                    "Item": {"properties": {"id": {"type": "integer"}}}
                }
            }),
            Some("Doc"),
            &Config::default(),
        )
        .unwrap();
        let root = &m.types[0];
        let nested = root.children().iter().map(NamedType::name).collect::<Vec<_>>();
        assert_eq!(nested, vec!["CodingKeys", "Item1", "Item"]);
        let text = render(&m);
        assert!(text.contains("    public var item: Item1?\n"), "{text}");
        assert!(text.contains("    public var primary: Item?\n"), "{text}");
        assert!(text.contains("    public struct Item1 : "), "{text}");
    }

    #[test]
    fn non_record_root_is_a_sibling() {
        let m = module(
            json!({
                "type": "array",
                "items": {"$ref": "#/definitions/Item"},
                "definitions": {"Item": {"type": "string"}}
            }),
            Some("Doc"),
            &Config::default(),
        )
        .unwrap();
        assert_eq!(names(&m), vec!["Doc", "Item"]);
    }

    #[test]
    fn excludes_and_wrappers() {
        let mut config = Config::default();
        config.excludes.insert("Skipped".into());
        config.excludes.insert("Missing".into());
        config.encapsulate.insert("Email".into(), Primitive::String);
        let m = module(
            json!({
                "definitions": {
                    "Skipped": {"type": "string"},
                    "Contact": {"properties": {"email": {"type": "string"}}}
                }
            }),
            None,
            &config,
        )
        .unwrap();
        assert_eq!(names(&m), vec!["Contact", "Email"]);
        let text = render(&m);
        assert!(text.contains("public var email: Email?"), "{text}");
        assert!(text.contains("public struct Email : RawRepresentable, "));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = module(
            json!({"definitions": {"a-b": {"type": "string"}}, "defs": {"AB": {"type": "integer"}}}),
            None,
            &Config::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::IllegalState(_)), "{err}");
    }

    #[test]
    fn one_failing_schema_aborts_assembly() {
        let err = module(
            json!({"definitions": {
                "Fine": {"type": "string"},
                "Pair": {"type": "array", "items": [{"type": "string"}]}
            }}),
            None,
            &Config::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedShape(_)));
    }

    #[test]
    fn empty_names_fall_back_to_a_word() {
        let source = json!({
            "definitions": {
                "E": {"enum": ["", "a"]},
                "R": {"properties": {"": {"type": "string"}}}
            }
        })
        .to_string();
        let text = generate(&source, None, &Config::default()).unwrap();
        assert!(text.contains("    case empty = \"\"\n    case a\n"), "{text}");
        assert!(text.contains("    public var empty: String?\n"), "{text}");
        assert!(text.contains("public init(empty: String? = nil)"), "{text}");
        assert!(text.contains("try values.encodeIfPresent(empty, forKey: .empty)"), "{text}");
        assert!(!text.contains("forKey: .)"), "{text}");
    }

    #[test]
    fn generated_text_is_stable() {
        let source = json!({
            "definitions": {
                "Shape": {"oneOf": [{"type": "string"}, {"properties": {"r": {"type": "number"}}}]}
            }
        })
        .to_string();
        let config = Config::default();
        assert_eq!(generate(&source, None, &config).unwrap(), generate(&source, None, &config).unwrap());
    }
}

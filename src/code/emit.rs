//! Deterministic text rendering of the Code IR.
//!
//! Indentation increases after a line ending in `{` and decreases before a line
//! that is exactly `}`. Siblings are ordered protocols, aliases, enums, then the
//! rest, alphabetically within each group, separated by blank lines.
use super::keywords::unescape;
use super::{
    Access, Assignment, Capabilities, Initializer, Module, NamedType, Property,
    Protocol, Record, RecordMode, Role, SimpleEnum, TypeAlias, Union,
};

const INDENT: &str = "    ";

// ———————————————————————————————————————————————————————————————————————————
// EMITTER
// ———————————————————————————————————————————————————————————————————————————

#[derive(Debug, Default)]
pub struct Emitter {
    lines: Vec<String>,
    level: usize,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit one line from tokens; empty tokens are dropped, the rest joined by spaces.
    pub fn line(&mut self, tokens: &[&str]) {
        let text = tokens.iter().filter(|t| !t.is_empty()).copied().collect::<Vec<_>>().join(" ");
        if text == "}" {
            self.level = self.level.saturating_sub(1);
        }
        self.lines.push(format!("{}{}", INDENT.repeat(self.level), text));
        if text.ends_with('{') {
            self.level += 1;
        }
    }

    pub fn text(&mut self, line: impl AsRef<str>) {
        self.line(&[line.as_ref()]);
    }

    pub fn blank(&mut self) {
        self.lines.push(String::new());
    }

    pub fn doc(&mut self, comments: &[String]) {
        for comment in comments {
            if comment.is_empty() {
                self.text("///");
            } else {
                self.text(format!("/// {comment}"));
            }
        }
    }

    pub fn finish(self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

pub trait Emit {
    fn emit(&self, out: &mut Emitter);
}

/// Render a single entity to text.
pub fn render<T: Emit + ?Sized>(item: &T) -> String {
    let mut out = Emitter::new();
    item.emit(&mut out);
    out.finish()
}

/// Siblings in emission order.
pub fn sorted(types: &[NamedType]) -> Vec<&NamedType> {
    let mut xs = types.iter().collect::<Vec<_>>();
    xs.sort_by(|a, b| a.rank().cmp(&b.rank()).then_with(|| a.name().cmp(b.name())));
    xs
}

fn emit_children(out: &mut Emitter, children: &[NamedType], mut preceded: bool) {
    for child in sorted(children) {
        if preceded {
            out.blank();
        }
        child.emit(out);
        preceded = true;
    }
}

fn header(out: &mut Emitter, access: Access, keyword: &str, name: &str, adoptions: &[String]) {
    let adoptions = adoptions.join(", ");
    let colon = if adoptions.is_empty() { "" } else { ":" };
    out.line(&[access.keyword(), keyword, name, colon, &adoptions, "{"]);
}

fn capability_names(conforms: &Capabilities) -> Vec<String> {
    conforms.iter().map(|c| c.name().to_string()).collect()
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

// ———————————————————————————————————————————————————————————————————————————
// DECLARATIONS
// ———————————————————————————————————————————————————————————————————————————

impl Emit for NamedType {
    fn emit(&self, out: &mut Emitter) {
        match self {
            NamedType::Alias(t) => t.emit(out),
            NamedType::Record(t) => t.emit(out),
            NamedType::Union(t) => t.emit(out),
            NamedType::Enum(t) => t.emit(out),
            NamedType::Protocol(t) => t.emit(out),
        }
    }
}

impl Emit for Module {
    fn emit(&self, out: &mut Emitter) {
        let mut imports = self.imports.clone();
        imports.sort();
        imports.dedup();
        for import in &imports {
            out.text(format!("import {import}"));
        }
        emit_children(out, &self.types, !imports.is_empty());
    }
}

impl Emit for TypeAlias {
    fn emit(&self, out: &mut Emitter) {
        out.doc(&self.comments);
        let target = self.target.identifier();
        out.line(&[self.access.keyword(), "typealias", &self.name, "=", &target]);
        emit_children(out, &self.peers, true);
    }
}

impl Emit for SimpleEnum {
    fn emit(&self, out: &mut Emitter) {
        out.doc(&self.comments);
        let mut adoptions = vec![self.raw.identifier()];
        adoptions.extend(capability_names(&self.conforms));
        header(out, self.access, "enum", &self.name, &adoptions);
        for case in &self.cases {
            if unescape(&case.name) == case.value {
                out.line(&["case", &case.name]);
            } else {
                out.line(&["case", &case.name, "=", &quote(&case.value)]);
            }
        }
        out.text("}");
    }
}

impl Emit for Protocol {
    fn emit(&self, out: &mut Emitter) {
        out.doc(&self.comments);
        header(out, self.access, "protocol", &self.name, &capability_names(&self.conforms));
        for member in &self.members {
            out.text(format!("var {}: {} {{ get set }}", member.name, member.ty.identifier()));
        }
        out.text("}");
    }
}

impl Emit for Union {
    fn emit(&self, out: &mut Emitter) {
        out.doc(&self.comments);
        header(out, self.access, "enum", &self.name, &capability_names(&self.conforms));
        if self.is_namespace() {
            emit_children(out, &self.nested, false);
            out.text("}");
            return;
        }
        let access = self.access.keyword();
        for case in &self.cases {
            match &case.payload {
                Some(p) => out.text(format!("case {}({})", case.name, p.identifier())),
                None => out.line(&["case", &case.name]),
            }
        }

        let mut seen = Vec::new();
        for case in &self.cases {
            let Some(payload) = &case.payload else { continue };
            let ident = payload.identifier();
            if seen.contains(&ident) {
                continue;
            }
            out.blank();
            out.line(&[access, "init(_ arg:", &format!("{ident})"), "{"]);
            out.text(format!("self = .{}(arg)", case.name));
            out.text("}");
            seen.push(ident);
        }

        out.blank();
        out.line(&[access, "init(from decoder: Decoder) throws {"]);
        out.text("var errors: [Error] = []");
        for case in &self.cases {
            match &case.payload {
                Some(p) => out.text(format!(
                    "do {{ self = try .{}({}(from: decoder)); return }} catch {{ errors.append(error) }}",
                    case.name,
                    p.identifier()
                )),
                None => out.text(format!(
                    "do {{ _ = try ExplicitNull(from: decoder); self = .{}; return }} catch {{ errors.append(error) }}",
                    case.name
                )),
            }
        }
        out.text("throw OneOfDecodingError(errors: errors)");
        out.text("}");

        out.blank();
        out.line(&[access, "func encode(to encoder: Encoder) throws {"]);
        out.text("switch self {");
        for case in &self.cases {
            match &case.payload {
                Some(_) => out.text(format!("case .{}(let x): try x.encode(to: encoder)", case.name)),
                None => out.text(format!("case .{}: try ExplicitNull().encode(to: encoder)", case.name)),
            }
        }
        out.text("}");
        out.text("}");

        emit_children(out, &self.nested, true);
        out.text("}");
    }
}

// ———————————————————————————————————————————————————————————————————————————
// RECORDS
// ———————————————————————————————————————————————————————————————————————————

impl Emit for Record {
    fn emit(&self, out: &mut Emitter) {
        out.doc(&self.comments);
        header(out, self.access, "struct", &self.name, &capability_names(&self.conforms));
        for prop in &self.properties {
            emit_property(out, prop);
        }
        if !self.properties.is_empty() {
            out.blank();
        }
        emit_initializer(out, self.access, &self.initializer);
        out.blank();
        emit_decoder(out, self);
        out.blank();
        emit_encoder(out, self);
        emit_children(out, &self.nested, true);
        out.text("}");
    }
}

fn emit_property(out: &mut Emitter, prop: &Property) {
    out.doc(&prop.comments);
    let ty = prop.ty.identifier();
    if !prop.indirect {
        out.line(&[prop.access.keyword(), "var", &format!("{}:", prop.name), &ty]);
        return;
    }
    let slot = prop.slot_name();
    let payload = prop.ty.optional_payload().unwrap_or(&prop.ty).identifier();
    out.line(&["private var", &format!("{slot}:"), &format!("Indirect<{payload}>?")]);
    out.line(&[prop.access.keyword(), "var", &format!("{}:", prop.name), &ty, "{"]);
    out.text(format!("get {{ return {slot}?.value }}"));
    out.text(format!("set {{ {slot} = Indirect(fromOptional: newValue) }}"));
    out.text("}");
}

fn emit_initializer(out: &mut Emitter, access: Access, init: &Initializer) {
    let params = init
        .params
        .iter()
        .map(|p| {
            let label = if p.anonymous { "_ " } else { "" };
            match &p.default_value {
                Some(v) => format!("{label}{}: {} = {v}", p.name, p.ty.identifier()),
                None => format!("{label}{}: {}", p.name, p.ty.identifier()),
            }
        })
        .collect::<Vec<_>>();
    out.line(&[access.keyword(), &format!("init({})", params.join(", ")), "{"]);
    for assignment in &init.assignments {
        match assignment {
            Assignment::Direct { property, param } => out.text(format!("self.{property} = {param}")),
            Assignment::Construct { property, ty, args } => {
                let args = args
                    .iter()
                    .map(|a| format!("{}: {a}", unescape(a)))
                    .collect::<Vec<_>>();
                out.text(format!("self.{property} = {}({})", ty.identifier(), args.join(", ")));
            }
        }
    }
    out.text("}");
}

fn decode_type(prop: &Property) -> String {
    prop.ty.optional_payload().unwrap_or(&prop.ty).identifier()
}

fn emit_decoder(out: &mut Emitter, record: &Record) {
    out.line(&[record.access.keyword(), "init(from decoder: Decoder) throws {"]);
    match record.mode {
        RecordMode::Standard => {
            if record.properties.iter().any(|p| matches!(p.role, Role::Keyed(_))) {
                out.text("let values = try decoder.container(keyedBy: CodingKeys.self)");
            }
            for prop in &record.properties {
                let ty = decode_type(prop);
                match &prop.role {
                    Role::Keyed(_) if prop.required => out.text(format!(
                        "self.{} = try values.decode({ty}.self, forKey: .{})",
                        prop.name, prop.name
                    )),
                    Role::Keyed(_) => out.text(format!(
                        "self.{} = try values.decodeIfPresent({ty}.self, forKey: .{})",
                        prop.name, prop.name
                    )),
                    Role::Additional => out.text(format!(
                        "self.{} = try decoder.decodeAdditionalProperties(excluding: CodingKeys.self)",
                        prop.name
                    )),
                    Role::Member => out.text(format!("self.{} = try {ty}(from: decoder)", prop.name)),
                }
            }
        }
        RecordMode::Merge | RecordMode::Wrapper => {
            for prop in &record.properties {
                out.text(format!("self.{} = try {}(from: decoder)", prop.name, decode_type(prop)));
            }
        }
        RecordMode::Any => {
            for prop in &record.properties {
                out.text(format!("self.{} = try? {}(from: decoder)", prop.name, decode_type(prop)));
            }
            if !record.properties.is_empty() {
                let none = record
                    .properties
                    .iter()
                    .map(|p| format!("{} == nil", p.name))
                    .collect::<Vec<_>>()
                    .join(" && ");
                out.text(format!("if {none} {{"));
                out.text("throw AnyOfDecodingError(type: Self.self)");
                out.text("}");
            }
        }
    }
    out.text("}");
}

fn emit_encoder(out: &mut Emitter, record: &Record) {
    out.line(&[record.access.keyword(), "func encode(to encoder: Encoder) throws {"]);
    match record.mode {
        RecordMode::Standard => {
            if record.properties.iter().any(|p| matches!(p.role, Role::Keyed(_))) {
                out.text("var values = encoder.container(keyedBy: CodingKeys.self)");
            }
            for prop in &record.properties {
                match &prop.role {
                    Role::Keyed(_) if prop.required => {
                        out.text(format!("try values.encode({}, forKey: .{})", prop.name, prop.name))
                    }
                    Role::Keyed(_) => out.text(format!(
                        "try values.encodeIfPresent({}, forKey: .{})",
                        prop.name, prop.name
                    )),
                    Role::Additional => {
                        out.text(format!("try encoder.encodeAdditionalProperties({})", prop.name))
                    }
                    Role::Member => out.text(format!("try {}.encode(to: encoder)", prop.name)),
                }
            }
        }
        RecordMode::Merge | RecordMode::Wrapper => {
            for prop in &record.properties {
                out.text(format!("try {}.encode(to: encoder)", prop.name));
            }
        }
        RecordMode::Any => {
            for prop in &record.properties {
                out.text(format!("try {}?.encode(to: encoder)", prop.name));
            }
        }
    }
    out.text("}");
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Capability, Case, CodeType, EnumCase, ProtocolMember};

    fn alias(name: &str, target: CodeType) -> NamedType {
        NamedType::Alias(TypeAlias {
            name: name.into(),
            access: Access::Public,
            target,
            peers: vec![],
            comments: vec![],
        })
    }

    #[test]
    fn brace_driven_indentation() {
        let mut out = Emitter::new();
        out.text("struct A {");
        out.text("get { return x }");
        out.text("enum B {");
        out.text("case b");
        out.text("}");
        out.text("}");
        assert_eq!(out.finish(), "struct A {\n    get { return x }\n    enum B {\n        case b\n    }\n}\n");
    }

    #[test]
    fn empty_tokens_are_dropped() {
        let mut out = Emitter::new();
        out.line(&["", "typealias", "A", "=", "B"]);
        assert_eq!(out.finish(), "typealias A = B\n");
    }

    #[test]
    fn sibling_order_groups_then_names() {
        let types = vec![
            NamedType::Record(Record {
                name: "Alpha".into(),
                access: Access::Public,
                mode: RecordMode::Standard,
                properties: vec![],
                initializer: Initializer::default(),
                nested: vec![],
                conforms: Capabilities::new(),
                comments: vec![],
            }),
            NamedType::Enum(SimpleEnum {
                name: "Beta".into(),
                access: Access::Public,
                raw: CodeType::string(),
                cases: vec![EnumCase { name: "x".into(), value: "x".into() }],
                conforms: Capabilities::new(),
                default_value: None,
                comments: vec![],
            }),
            alias("Zed", CodeType::string()),
            alias("Ace", CodeType::int()),
            NamedType::Protocol(Protocol {
                name: "Zproto".into(),
                access: Access::Public,
                conforms: Capabilities::new(),
                members: vec![ProtocolMember { name: "id".into(), ty: CodeType::string() }],
                comments: vec![],
            }),
        ];
        let names = sorted(&types).into_iter().map(NamedType::name).collect::<Vec<_>>();
        assert_eq!(names, vec!["Zproto", "Ace", "Zed", "Beta", "Alpha"]);
    }

    #[test]
    fn simple_enum_quotes_differing_raw_values() {
        let e = SimpleEnum {
            name: "Op".into(),
            access: Access::Public,
            raw: CodeType::string(),
            cases: vec![
                EnumCase { name: "eq".into(), value: "eq".into() },
                EnumCase { name: "u62u61".into(), value: ">=".into() },
                EnumCase { name: "`default`".into(), value: "default".into() },
            ],
            conforms: [Capability::Equatable, Capability::Codable].into_iter().collect(),
            default_value: None,
            comments: vec!["Operators.".into()],
        };
        assert_eq!(
            render(&e),
            "/// Operators.\npublic enum Op : String, Equatable, Codable {\n    case eq\n    case u62u61 = \">=\"\n    case `default`\n}\n"
        );
    }

    #[test]
    fn union_emits_dispatching_codec() {
        let u = Union {
            name: "Value".into(),
            access: Access::Public,
            cases: vec![
                Case { name: "stringCase".into(), payload: Some(CodeType::string()) },
                Case { name: "nullCase".into(), payload: None },
            ],
            nested: vec![],
            conforms: [Capability::Codable].into_iter().collect(),
            comments: vec![],
        };
        let text = render(&u);
        assert!(text.contains("    case stringCase(String)\n    case nullCase\n"));
        assert!(text.contains("    public init(_ arg: String) {\n        self = .stringCase(arg)\n    }\n"));
        assert!(text.contains("do { self = try .stringCase(String(from: decoder)); return } catch { errors.append(error) }"));
        assert!(text.contains("        throw OneOfDecodingError(errors: errors)\n"));
        assert!(text.contains("        switch self {\n            case .stringCase(let x): try x.encode(to: encoder)\n"));
        assert!(text.contains("case .nullCase: try ExplicitNull().encode(to: encoder)"));
    }

    #[test]
    fn namespace_has_no_leading_blank() {
        let ns = Union::namespace("FooTypes".into(), Access::Public, vec![alias("Choice", CodeType::int())]);
        assert_eq!(render(&ns), "public enum FooTypes {\n    public typealias Choice = Int\n}\n");
    }

    #[test]
    fn module_imports_precede_types() {
        let module = Module {
            imports: vec!["Foundation".into(), "BricBrac".into(), "Foundation".into()],
            types: vec![alias("A", CodeType::string())],
            root: None,
        };
        assert_eq!(render(&module), "import BricBrac\nimport Foundation\n\npublic typealias A = String\n");
    }
}

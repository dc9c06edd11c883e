//! Minimal CLI: schema files → (swift | check)
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indexmap::IndexMap;
use rayon::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::assemble::{assemble, generate};
use crate::code::Access;
use crate::codec;
use crate::config::{Config, EnumCase};
use crate::schema::{Primitive, parse};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// compile JSON Schema documents into typed declarations, or check JSON
/// instances against the generated types
#[derive(Parser, Debug)]
#[command(name = "json-reify", version)]
pub struct CommandLineInterface {
    /// more logging on stderr (-v debug, -vv trace); `RUST_LOG` also applies
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// generate Swift-style declarations, one module per schema file
    Swift(SwiftOut),
    /// decode JSON instance documents as a generated type and report failures
    Check(CheckOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more schema files. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// type name for each document's root schema (omit to emit definitions only)
    #[arg(long)]
    root: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
struct GeneratorSettings {
    /// access level of every declaration
    #[arg(long, value_enum, default_value_t = AccessLevel::Public)]
    access: AccessLevel,

    /// rename an id or a dotted `Parent.id` path (`from=to`)
    #[arg(long, value_name = "FROM=TO")]
    rename: Vec<String>,

    /// drop a top-level type from the output
    #[arg(long, value_name = "NAME")]
    exclude: Vec<String>,

    /// generate a single-value wrapper for a name (`Name=string|integer|number|boolean`)
    #[arg(long, value_name = "NAME=TYPE")]
    encapsulate: Vec<String>,

    /// optional object-shaped siblings needed before properties are boxed
    #[arg(long)]
    indirect_threshold: Option<usize>,

    #[arg(long)]
    no_collapse_one_of: bool,

    #[arg(long)]
    no_collapse_all_of: bool,

    #[arg(long)]
    no_collapse_any_of: bool,

    /// treat `anyOf` exactly like `oneOf`
    #[arg(long)]
    any_of_as_one_of: bool,

    /// capitalize enumeration and union case names
    #[arg(long)]
    upper_case_enums: bool,

    /// modules imported by the generated source (replaces the default)
    #[arg(long = "import", value_name = "MODULE")]
    imports: Vec<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
enum AccessLevel {
    #[default]
    Public,
    Internal,
    Private,
    /// no modifier
    None,
}

#[derive(clap::Parser, Debug)]
struct SwiftOut {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    generator: GeneratorSettings,

    /// directory receiving one `<stem>.swift` per input (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct CheckOut {
    /// schema document the instances are checked against
    #[arg(long, short)]
    schema: PathBuf,

    /// type to decode each instance as (qualified names allowed, e.g. `Outer.Inner`)
    #[arg(long = "type", short = 't')]
    type_name: String,

    /// type name for the schema's root
    #[arg(long)]
    root: Option<String>,

    #[command(flatten)]
    generator: GeneratorSettings,

    /// One or more JSON instance files. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    instance: Vec<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl GeneratorSettings {
    fn config(&self) -> Result<Config> {
        let access = match self.access {
            AccessLevel::Public => Access::Public,
            AccessLevel::Internal => Access::Internal,
            AccessLevel::Private => Access::Private,
            AccessLevel::None => Access::Default,
        };
        let mut config = Config {
            access: std::sync::Arc::new(move |_: &[String]| access),
            collapse_one_of: !self.no_collapse_one_of,
            collapse_all_of: !self.no_collapse_all_of,
            collapse_any_of: !self.no_collapse_any_of,
            any_of_as_one_of: self.any_of_as_one_of,
            enum_case: if self.upper_case_enums { EnumCase::Upper } else { EnumCase::Lower },
            excludes: self.exclude.iter().cloned().collect(),
            ..Config::default()
        };
        if let Some(threshold) = self.indirect_threshold {
            config.indirect_threshold = threshold;
        }
        if !self.imports.is_empty() {
            config.imports = self.imports.clone();
        }
        for entry in &self.encapsulate {
            let (name, raw) = split_pair(entry, "--encapsulate")?;
            let raw = match raw {
                "string" => Primitive::String,
                "integer" => Primitive::Integer,
                "number" => Primitive::Number,
                "boolean" => Primitive::Boolean,
                other => bail!("--encapsulate {name}: `{other}` is not a scalar type"),
            };
            config.encapsulate.insert(name.to_string(), raw);
        }
        let mut renames = IndexMap::new();
        for entry in &self.rename {
            let (from, to) = split_pair(entry, "--rename")?;
            renames.insert(from.to_string(), to.to_string());
        }
        Ok(config.with_renames(renames))
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    /// Install the stderr subscriber; generated code on stdout stays clean.
    pub fn init_tracing(&self) {
        let fallback = match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        };
        let filter = match std::env::var("RUST_LOG") {
            Ok(spec) if self.verbose == 0 && !spec.trim().is_empty() => EnvFilter::new(spec),
            _ => EnvFilter::new(fallback),
        };
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }

    /// Returns whether every input succeeded.
    pub fn run(&self) -> Result<bool> {
        match &self.cmd {
            Command::Swift(target) => target.run(),
            Command::Check(target) => target.run(),
        }
    }
}

impl SwiftOut {
    fn run(&self) -> Result<bool> {
        let config = self.generator.config()?;
        let source_paths = resolve_file_path_patterns(&self.input_settings.input)?;
        let root = self.input_settings.root.as_deref();

        // Independent modules: build them in parallel, report in input order.
        let outputs = source_paths
            .par_iter()
            .map(|path| generate_file(path, root, &config))
            .collect::<Vec<_>>();

        let mut failed = false;
        for (path, output) in source_paths.iter().zip(outputs) {
            match output {
                Ok(text) => match self.out.as_ref() {
                    Some(dir) => {
                        let target = output_path(dir, path);
                        std::fs::create_dir_all(dir)
                            .with_context(|| format!("creating {}", dir.display()))?;
                        std::fs::write(&target, &text)
                            .with_context(|| format!("writing {}", target.display()))?;
                        tracing::info!(input = %path.display(), output = %target.display(), "wrote module");
                    }
                    None => print!("{text}"),
                },
                Err(error) => {
                    failed = true;
                    eprintln!("{} {}: {error:#}", "error:".red().bold(), path.display());
                }
            }
        }
        Ok(!failed)
    }
}

impl CheckOut {
    fn run(&self) -> Result<bool> {
        let config = self.generator.config()?;
        let source = std::fs::read_to_string(&self.schema)
            .with_context(|| format!("reading {}", self.schema.display()))?;
        let root = self.root.as_deref();
        let schemas = parse(&source, root).with_context(|| format!("parsing {}", self.schema.display()))?;
        let module = assemble(&schemas, root, &config)
            .with_context(|| format!("assembling {}", self.schema.display()))?;

        let instance_paths = resolve_file_path_patterns(&self.instance)?;
        let mut failures = 0usize;
        for path in &instance_paths {
            let outcome = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))
                .and_then(|text| {
                    serde_json::from_str::<serde_json::Value>(&text)
                        .with_context(|| format!("parsing {}", path.display()))
                })
                .and_then(|value| codec::decode(&module, &self.type_name, &value).map_err(anyhow::Error::from));
            match outcome {
                Ok(_) => println!("{} {}", "ok".green().bold(), path.display()),
                Err(error) => {
                    failures += 1;
                    println!("{} {}: {error:#}", "fail".red().bold(), path.display());
                }
            }
        }
        tracing::info!(checked = instance_paths.len(), failures, "check finished");
        Ok(failures == 0)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn generate_file(path: &Path, root: Option<&str>, config: &Config) -> Result<String> {
    let source = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(generate(&source, root, config)?)
}

fn output_path(dir: &Path, input: &Path) -> PathBuf {
    let stem = input.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_else(|| "Module".to_string());
    dir.join(format!("{stem}.swift"))
}

fn split_pair<'a>(entry: &'a str, flag: &str) -> Result<(&'a str, &'a str)> {
    match entry.split_once('=') {
        Some((a, b)) if !a.is_empty() && !b.is_empty() => Ok((a, b)),
        _ => bail!("{flag} expects `KEY=VALUE`, got `{entry}`"),
    }
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_patterns_expand_and_literals_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.json", "b.json", "c.txt"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }
        let pattern = format!("{}/*.json", dir.path().display());
        let literal = dir.path().join("missing.json").display().to_string();
        let paths = resolve_file_path_patterns([pattern.as_str(), literal.as_str()]).unwrap();
        let names = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["a.json", "b.json", "missing.json"]);
    }

    #[test]
    fn empty_globs_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/*.schema", dir.path().display());
        assert!(resolve_file_path_patterns([pattern]).is_err());
    }

    #[test]
    fn flags_map_onto_config() {
        let cli = CommandLineInterface::try_parse_from([
            "json-reify",
            "swift",
            "-i",
            "schema.json",
            "--access",
            "internal",
            "--rename",
            "Person.name=fullName",
            "--encapsulate",
            "Email=string",
            "--no-collapse-one-of",
            "--indirect-threshold",
            "3",
            "--import",
            "Foundation",
        ])
        .unwrap();
        let Command::Swift(target) = &cli.cmd else { panic!("expected swift") };
        let config = target.generator.config().unwrap();
        assert_eq!(config.access_for(&[]), Access::Internal);
        assert_eq!(config.rename(&["Person".into()], "name").as_deref(), Some("fullName"));
        assert_eq!(config.encapsulate.get("Email"), Some(&Primitive::String));
        assert!(!config.collapse_one_of);
        assert!(config.collapse_all_of);
        assert_eq!(config.indirect_threshold, 3);
        assert_eq!(config.imports, vec!["Foundation".to_string()]);
    }

    #[test]
    fn malformed_pairs_are_rejected() {
        let settings = GeneratorSettings { encapsulate: vec!["Email".into()], ..GeneratorSettings::default() };
        assert!(settings.config().is_err());
        let settings = GeneratorSettings { encapsulate: vec!["Email=object".into()], ..GeneratorSettings::default() };
        assert!(settings.config().is_err());
    }

    #[test]
    fn swift_writes_one_file_per_input() {
        let dir = tempfile::tempdir().unwrap();
        let schema = dir.path().join("person.json");
        std::fs::write(
            &schema,
            r#"{"type": "object", "properties": {"name": {"type": "string"}}, "required": ["name"]}"#,
        )
        .unwrap();
        let out = dir.path().join("out");
        let cli = CommandLineInterface::try_parse_from([
            "json-reify",
            "swift",
            "-i",
            schema.to_str().unwrap(),
            "--root",
            "Person",
            "--out",
            out.to_str().unwrap(),
        ])
        .unwrap();
        assert!(cli.run().unwrap());
        let text = std::fs::read_to_string(out.join("person.swift")).unwrap();
        assert!(text.starts_with("import BricBrac\n\npublic struct Person : "), "{text}");
    }

    #[test]
    fn check_reports_failing_instances() {
        let dir = tempfile::tempdir().unwrap();
        let schema = dir.path().join("schema.json");
        std::fs::write(&schema, r#"{"definitions": {"Mode": {"enum": ["fast", "slow"]}}}"#).unwrap();
        std::fs::write(dir.path().join("good.json"), r#""fast""#).unwrap();
        std::fs::write(dir.path().join("bad.json"), r#""medium""#).unwrap();
        let run = |instance: &str| {
            CommandLineInterface::try_parse_from([
                "json-reify",
                "check",
                "--schema",
                schema.to_str().unwrap(),
                "--type",
                "Mode",
                "-i",
                dir.path().join(instance).to_str().unwrap(),
            ])
            .unwrap()
            .run()
            .unwrap()
        };
        assert!(run("good.json"));
        assert!(!run("bad.json"));
    }
}

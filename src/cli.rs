//! Developer CLI: inspect declaration files and check documents against them.
use std::path::PathBuf;

use anyhow::{Context as _, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;
use typed_surql::{Database, Declaration, TypeError};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// work with typed table/edge declarations
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,

    /// debug logging (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// print the schema graph (`to`/`from` adjacency) of the declarations
    Graph(GraphOut),
    /// parse JSON documents against a declared table and report mismatches
    Validate(ValidateOut),
}

#[derive(Args, Debug, Clone)]
struct SchemaSettings {
    /// declaration files (JSON arrays of tables and edges); literal paths or quoted globs
    #[arg(long, short, num_args = 1.., required = true)]
    schema: Vec<String>,
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items)
    #[arg(long)]
    json_pointer: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct GraphOut {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct ValidateOut {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    #[command(flatten)]
    input_settings: InputSettings,

    /// table whose row shape the documents must have
    #[arg(long, short)]
    table: String,

    /// check against the creation shape (generated keys optional) instead of the stored row
    #[arg(long, default_value_t = false)]
    as_input: bool,

    /// an array document is one value, not a list of rows
    #[arg(long, default_value_t = false)]
    no_split: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl SchemaSettings {
    fn load(&self) -> anyhow::Result<Database> {
        let mut declarations: Vec<Declaration> = Vec::new();
        for path in resolve_file_path_patterns(&self.schema)? {
            let source = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read declaration file {}", path.display()))?;
            let mut decls: Vec<Declaration> = typed_surql::path_de::from_str_with_path(&source)
                .with_context(|| format!("invalid declaration file {}", path.display()))?;
            tracing::debug!(path = %path.display(), count = decls.len(), "loaded declarations");
            declarations.append(&mut decls);
        }
        Ok(Database::new(declarations))
    }
}

impl InputSettings {
    fn load_process(&self, mut apply: impl FnMut(&str, Value)) -> anyhow::Result<()> {
        for source_path in resolve_file_path_patterns(&self.input)? {
            let source_path_str = source_path.to_string_lossy().to_string();
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read source file {source_path_str}"))?;
            let documents = split_documents(&source, self.ndjson, self.json_pointer.as_deref())
                .with_context(|| format!("failed to parse JSON source file {source_path_str}"))?;
            for document in documents {
                apply(&source_path_str, document);
            }
        }
        Ok(())
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Graph(target) => {
                let db = target.schema_settings.load()?;
                let graph_src = serde_json::to_string_pretty(db.graph())?;
                write_or_print(target.out.as_ref(), &graph_src)
            }
            Command::Validate(target) => {
                let db = target.schema_settings.load()?;
                let decl = db
                    .declaration(&target.table)
                    .with_context(|| format!("table `{}` is not declared", target.table))?;
                let ty = if target.as_input { decl.input_type() } else { decl.record_type() };

                let mut checked = 0usize;
                let mut failures: Vec<(String, usize, TypeError)> = Vec::new();
                target.input_settings.load_process(|source, document| {
                    let rows = match document {
                        Value::Array(rows) if !target.no_split => rows,
                        other => vec![other],
                    };
                    for row in rows {
                        if let Err(error) = ty.parse(&row) {
                            failures.push((source.to_string(), checked, error));
                        }
                        checked += 1;
                    }
                })?;

                for (source, index, error) in &failures {
                    eprintln!("{} {source} #{index}: {error}", "✗".red().bold());
                }
                if failures.is_empty() {
                    eprintln!("{} {checked} document(s) match `{}`", "✓".green().bold(), target.table);
                    Ok(())
                } else {
                    bail!("{} of {checked} document(s) do not match `{}`", failures.len(), target.table)
                }
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn write_or_print(out: Option<&PathBuf>, contents: &str) -> anyhow::Result<()> {
    match out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out, contents)
                .with_context(|| format!("failed to write {}", out.display()))
        }
        None => {
            println!("{contents}");
            Ok(())
        }
    }
}

/// Parse a source into documents, optionally one per line, optionally narrowed
/// by a JSON Pointer. Documents the pointer does not reach are skipped.
fn split_documents(source: &str, ndjson: bool, pointer: Option<&str>) -> anyhow::Result<Vec<Value>> {
    let documents: Vec<Value> = if ndjson {
        source
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line).with_context(|| format!("line {}", i + 1))
            })
            .collect::<anyhow::Result<_>>()?
    } else {
        vec![serde_json::from_str(source)?]
    };
    Ok(match pointer {
        None => documents,
        Some(pointer) => documents
            .into_iter()
            .filter_map(|mut doc| doc.pointer_mut(pointer).map(Value::take))
            .collect(),
    })
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
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

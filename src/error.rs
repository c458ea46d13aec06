//! Error kinds.
//!
//! - [`TypeError`]: a value does not match its descriptor (raised by `parse`).
//! - [`UsageError`]: a builder was misused; always raised at the call site.
//! - [`Error`]: everything a builder or `execute` can surface.
use std::fmt;

use serde_json::Value;

use crate::types::Tag;

/// What a descriptor expected to find.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expected {
    One(String),
    /// Alternatives, rendered as `A, B or C`.
    AnyOf(Vec<String>),
    /// Positional element shapes, rendered as `[A, B, C]`.
    Tuple(Vec<String>),
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::One(s) => f.write_str(s),
            Expected::AnyOf(xs) => match xs.split_last() {
                None => f.write_str("never"),
                Some((last, [])) => f.write_str(last),
                Some((last, init)) => write!(f, "{} or {last}", init.join(", ")),
            },
            Expected::Tuple(xs) => write!(f, "[{}]", xs.join(", ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{tag} mismatch at `{}`: expected {expected}, found {}", display_path(.path), display_found(.value))]
pub struct TypeError {
    pub tag: Tag,
    pub expected: Expected,
    /// `None` when the value was absent.
    pub value: Option<Value>,
    pub path: String,
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { "." } else { path }
}

fn display_found(value: &Option<Value>) -> String {
    match value {
        None => "NONE".to_string(),
        Some(v) => v.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    #[error("cannot use `{clause}` because `{existing}` is already set on this statement")]
    Conflict { clause: &'static str, existing: &'static str },
    #[error("table `{0}` is not declared")]
    UnknownTable(String),
    #[error("`{0}` is not an edge table")]
    NotAnEdge(String),
    #[error("edge `{edge}` does not accept `{table}` on its `{side}` side")]
    EndpointMismatch { edge: String, side: &'static str, table: String },
    #[error("`{side}` endpoint of a relation must be a record or an expression, found table `{table}`")]
    InvalidEndpoint { side: &'static str, table: String },
    #[error("`values()` called before `fields()`")]
    ValuesBeforeFields,
    #[error("insert row {row} has {got} values but {expected} fields were declared")]
    InsertArity { expected: usize, got: usize, row: usize },
    #[error("no method `{method}` on {tag}")]
    UnknownMethod { method: String, tag: Tag },
    #[error("`{method}` takes {expected} arguments, got {got}")]
    MethodArity { method: String, expected: String, got: usize },
}

/// Failure to decode a value into a Rust type, annotated with the JSON path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("at JSON path {path} → {message}")]
pub struct DecodeError {
    pub path: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Usage(#[from] UsageError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
    #[error("transport returned {got} statement results, expected {expected}")]
    Results { expected: usize, got: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

//! Clause slots shared by the statement builders.
//!
//! Payload clauses are mutually exclusive: switching from one mode to another
//! is a [`UsageError::Conflict`] raised at the call site. Repeating the same
//! mode merges. Filters, ordering and the rest are additive.
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::display::{DisplayContext, idiom};
use crate::error::{Error, TypeError, UsageError};
use crate::expr::{Expr, Operand};
use crate::types::{Key, Type};

// ————————————————————————————————————————————————————————————————————————————
// FILTER
// ————————————————————————————————————————————————————————————————————————————

/// `WHERE`; repeated conditions are joined with `AND`.
#[derive(Debug, Clone, Default)]
pub struct Filter(Option<Expr>);

impl Filter {
    pub fn push(&mut self, cond: Expr) {
        self.0 = Some(match self.0.take() {
            Some(prev) => prev.and(cond),
            None => cond,
        });
    }

    pub fn render(&self, d: &mut DisplayContext, out: &mut String) {
        if let Some(cond) = &self.0 {
            out.push_str(" WHERE ");
            out.push_str(&cond.render(d));
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// PAYLOAD
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
}

impl AssignOp {
    pub fn token(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Assignment {
    pub field: String,
    pub op: AssignOp,
    pub value: Expr,
}

impl Assignment {
    pub(crate) fn render(&self, d: &mut DisplayContext) -> String {
        format!("{} {} {}", idiom(&self.field), self.op.token(), self.value.render(d))
    }
}

/// One JSON Patch operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOp {
    pub op: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

impl PatchOp {
    fn with_value(op: &str, path: impl Into<String>, value: Option<Value>) -> Self {
        Self { op: op.to_string(), path: path.into(), value, from: None }
    }

    pub fn add(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::with_value("add", path, Some(value.into()))
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self::with_value("remove", path, None)
    }

    pub fn replace(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::with_value("replace", path, Some(value.into()))
    }

    pub fn change(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::with_value("change", path, Some(value.into()))
    }

    pub fn copy(from: impl Into<String>, path: impl Into<String>) -> Self {
        Self { from: Some(from.into()), ..Self::with_value("copy", path, None) }
    }

    pub fn move_to(from: impl Into<String>, path: impl Into<String>) -> Self {
        Self { from: Some(from.into()), ..Self::with_value("move", path, None) }
    }

    pub fn test(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::with_value("test", path, Some(value.into()))
    }
}

#[derive(Debug, Clone)]
pub enum Payload {
    Set(Vec<Assignment>),
    /// Whole document.
    Content(Value),
    /// Partial document merged into the existing one.
    Merge(Value),
    Patch(Vec<PatchOp>),
    /// Whole document, keeping the record id.
    Replace(Value),
}

impl Payload {
    pub fn clause(&self) -> &'static str {
        match self {
            Payload::Set(_) => "set()",
            Payload::Content(_) => "content()",
            Payload::Merge(_) => "merge()",
            Payload::Patch(_) => "patch()",
            Payload::Replace(_) => "replace()",
        }
    }

    /// Fold `next` into `self` when both use the same mode.
    fn absorb(&mut self, next: Payload) -> Result<(), UsageError> {
        match (self, next) {
            (Payload::Set(xs), Payload::Set(ys)) => xs.extend(ys),
            (Payload::Patch(xs), Payload::Patch(ys)) => xs.extend(ys),
            (Payload::Content(a), Payload::Content(b))
            | (Payload::Merge(a), Payload::Merge(b))
            | (Payload::Replace(a), Payload::Replace(b)) => merge_documents(a, b),
            (existing, next) => {
                return Err(UsageError::Conflict {
                    clause: next.clause(),
                    existing: existing.clause(),
                });
            }
        }
        Ok(())
    }

    fn render(&self, d: &mut DisplayContext) -> String {
        match self {
            Payload::Set(xs) => {
                let parts = xs.iter().map(|a| a.render(d)).collect::<Vec<_>>();
                format!("SET {}", parts.join(", "))
            }
            Payload::Content(v) => format!("CONTENT {}", d.bind(v.clone())),
            Payload::Merge(v) => format!("MERGE {}", d.bind(v.clone())),
            Payload::Patch(ops) => {
                let ops = serde_json::to_value(ops).unwrap_or(Value::Null);
                format!("PATCH {}", d.bind(ops))
            }
            Payload::Replace(v) => format!("REPLACE {}", d.bind(v.clone())),
        }
    }
}

/// Later keys win; non-objects are replaced outright.
fn merge_documents(base: &mut Value, next: Value) {
    match (base, next) {
        (Value::Object(a), Value::Object(b)) => a.extend(b),
        (base, next) => *base = next,
    }
}

/// At most one payload mode per statement.
#[derive(Debug, Clone, Default)]
pub struct PayloadSlot(Option<Payload>);

impl PayloadSlot {
    pub fn push(&mut self, next: Payload) -> Result<(), UsageError> {
        match &mut self.0 {
            Some(existing) => existing.absorb(next),
            None => {
                self.0 = Some(next);
                Ok(())
            }
        }
    }

    pub fn get(&self) -> Option<&Payload> {
        self.0.as_ref()
    }

    /// Reject `clause` if another payload mode is already active.
    fn admit(&self, clause: &'static str) -> Result<(), UsageError> {
        match &self.0 {
            Some(existing) if existing.clause() != clause => {
                Err(UsageError::Conflict { clause, existing: existing.clause() })
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn assign(
        &mut self,
        row: &Type,
        record: &Expr,
        field: &str,
        op: AssignOp,
        value: Operand,
    ) -> Result<(), Error> {
        self.admit("set()")?;
        if let (AssignOp::Assign, Operand::Value(v)) = (op, &value) {
            check_assignment(row, field, v)?;
        }
        let value = value.into_expr(record.context());
        self.push(Payload::Set(vec![Assignment { field: field.to_string(), op, value }]))?;
        Ok(())
    }

    /// Full document; undeclared keys are dropped.
    pub(crate) fn content(&mut self, input: &Type, doc: Value) -> Result<(), Error> {
        self.admit("content()")?;
        let doc = input.parse(&doc)?;
        self.push(Payload::Content(doc))?;
        Ok(())
    }

    pub(crate) fn merge(&mut self, input: &Type, doc: Value) -> Result<(), Error> {
        self.admit("merge()")?;
        check_partial(input, &doc)?;
        self.push(Payload::Merge(doc))?;
        Ok(())
    }

    pub(crate) fn patch(&mut self, ops: Vec<PatchOp>) -> Result<(), Error> {
        self.push(Payload::Patch(ops))?;
        Ok(())
    }

    pub(crate) fn replace(&mut self, input: &Type, doc: Value) -> Result<(), Error> {
        self.admit("replace()")?;
        let doc = input.parse(&doc)?;
        self.push(Payload::Replace(doc))?;
        Ok(())
    }

    pub fn render(&self, d: &mut DisplayContext, out: &mut String) {
        if let Some(payload) = &self.0 {
            out.push(' ');
            out.push_str(&payload.render(d));
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// PAYLOAD CHECKS
// ————————————————————————————————————————————————————————————————————————————

/// Descriptor at a dotted field path; [`Type::None`] when undeclared.
pub(crate) fn field_type(row: &Type, path: &str) -> Type {
    path.split('.')
        .fold(row.clone(), |ty, part| ty.get(&Key::Field(part.to_string())).ty)
}

fn at_field(path: &str) -> impl FnOnce(TypeError) -> TypeError + '_ {
    move |mut err| {
        err.path = format!(".{path}{}", err.path);
        err
    }
}

/// Check a raw `field = value` against the declared field, if any.
pub(crate) fn check_assignment(row: &Type, path: &str, value: &Value) -> Result<(), TypeError> {
    match field_type(row, path) {
        Type::None => Ok(()),
        ty => ty.parse(value).map(drop).map_err(at_field(path)),
    }
}

/// Check a partial document: declared keys must match, the rest is left to the server.
/// Objects merge deeply, so a nested object is itself partial.
pub(crate) fn check_partial(row: &Type, value: &Value) -> Result<(), TypeError> {
    let map = match value {
        Value::Object(map) => map,
        other => return Type::Object(IndexMap::new()).parse(other).map(drop),
    };
    for (name, v) in map {
        let declared = row.get(&Key::Field(name.clone())).ty.present();
        match declared {
            Type::Object(_) if v.is_object() => check_partial(&declared, v).map_err(at_field(name))?,
            _ => check_assignment(row, name, v)?,
        }
    }
    Ok(())
}

// ————————————————————————————————————————————————————————————————————————————
// RETURN
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone)]
pub enum Return {
    None,
    Before,
    After,
    Diff,
    /// `RETURN VALUE <expr>`
    Value(Expr),
}

impl Return {
    pub(crate) fn render(&self, d: &mut DisplayContext, out: &mut String) {
        out.push_str(" RETURN ");
        match self {
            Return::None => out.push_str("NONE"),
            Return::Before => out.push_str("BEFORE"),
            Return::After => out.push_str("AFTER"),
            Return::Diff => out.push_str("DIFF"),
            Return::Value(e) => {
                out.push_str("VALUE ");
                out.push_str(&e.render(d));
            }
        }
    }

    /// Result descriptor for rows of shape `row`.
    pub(crate) fn output(&self, row: &Type, only: bool) -> Type {
        let item = match self {
            Return::None => {
                return if only {
                    Type::union([Type::Null, Type::None])
                } else {
                    Type::array(Type::Never)
                };
            }
            Return::Before => Type::union([row.clone(), Type::Null]),
            Return::After => row.clone(),
            Return::Diff => Type::array(Type::object([
                ("op", Type::String),
                ("path", Type::String),
                ("from", Type::option(Type::String)),
            ])),
            Return::Value(e) => e.ty().clone(),
        };
        if only { item } else { Type::array(item) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown return mode `{0}` (expected none, before, after or diff)")]
pub struct UnknownReturnMode(pub String);

impl FromStr for Return {
    type Err = UnknownReturnMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Return::None),
            "before" => Ok(Return::Before),
            "after" => Ok(Return::After),
            "diff" => Ok(Return::Diff),
            _ => Err(UnknownReturnMode(s.to_string())),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// MUTATION TRAILER
// ————————————————————————————————————————————————————————————————————————————

/// `RETURN`, `TIMEOUT` and `PARALLEL`, in that order.
#[derive(Debug, Clone, Default)]
pub struct Trailer {
    pub ret: Option<Return>,
    pub timeout: Option<Duration>,
    pub parallel: bool,
}

impl Trailer {
    pub fn render(&self, d: &mut DisplayContext, out: &mut String) {
        if let Some(ret) = &self.ret {
            ret.render(d, out);
        }
        render_timeout(self.timeout, self.parallel, out);
    }

    pub fn output(&self, default: Return, row: &Type, only: bool) -> Type {
        self.ret.as_ref().unwrap_or(&default).output(row, only)
    }

    /// Patch operations carry values of any shape, so `RETURN DIFF` results
    /// are passed through unparsed.
    pub fn checks_output(&self) -> bool {
        !matches!(self.ret, Some(Return::Diff))
    }
}

pub(crate) fn render_timeout(timeout: Option<Duration>, parallel: bool, out: &mut String) {
    if let Some(t) = timeout {
        out.push_str(" TIMEOUT ");
        out.push_str(&format_duration(t));
    }
    if parallel {
        out.push_str(" PARALLEL");
    }
}

const DURATION_UNITS: &[(&str, u128)] = &[
    ("h", 3_600_000_000_000),
    ("m", 60_000_000_000),
    ("s", 1_000_000_000),
    ("ms", 1_000_000),
    ("us", 1_000),
    ("ns", 1),
];

/// Largest whole unit: `2m`, `5s`, `250ms`, `500us`.
pub fn format_duration(t: Duration) -> String {
    let ns = t.as_nanos();
    if ns == 0 {
        return "0ms".to_string();
    }
    DURATION_UNITS
        .iter()
        .find(|(_, per)| ns % per == 0)
        .map(|(unit, per)| format!("{}{unit}", ns / per))
        .unwrap_or_else(|| format!("{ns}ns"))
}

// ————————————————————————————————————————————————————————————————————————————
// ORDERING & GROUPING
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        })
    }
}

#[derive(Debug, Clone)]
pub struct Order {
    pub by: Expr,
    pub direction: Direction,
    pub collate: bool,
    pub numeric: bool,
}

impl Order {
    pub(crate) fn render(&self, d: &mut DisplayContext) -> String {
        let mut out = self.by.render(d);
        if self.collate {
            out.push_str(" COLLATE");
        }
        if self.numeric {
            out.push_str(" NUMERIC");
        }
        out.push(' ');
        out.push_str(&self.direction.to_string());
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Group {
    All,
    By(Vec<String>),
}

impl Group {
    pub(crate) fn render(&self, out: &mut String) {
        match self {
            Group::All => out.push_str(" GROUP ALL"),
            Group::By(fields) => {
                out.push_str(" GROUP BY ");
                out.push_str(&fields.iter().map(|f| idiom(f)).collect::<Vec<_>>().join(", "));
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// BUILDER METHODS
// ————————————————————————————————————————————————————————————————————————————

/// Payload methods for builders with `payload: PayloadSlot`, `input: Type`
/// and `record: Expr` fields.
macro_rules! payload_methods {
    (set) => {
        /// `SET field = value`; repeated calls add assignments.
        pub fn set(
            mut self,
            field: &str,
            value: impl Into<$crate::expr::Operand>,
        ) -> $crate::error::Result<Self> {
            let op = $crate::query::AssignOp::Assign;
            self.payload.assign(&self.input, &self.record, field, op, value.into())?;
            Ok(self)
        }

        /// `SET field = <expr>`, computed from the record.
        pub fn set_with(
            mut self,
            field: &str,
            f: impl FnOnce(&$crate::expr::Expr) -> $crate::expr::Expr,
        ) -> $crate::error::Result<Self> {
            let value = f(&self.record).into();
            let op = $crate::query::AssignOp::Assign;
            self.payload.assign(&self.input, &self.record, field, op, value)?;
            Ok(self)
        }

        /// `SET field += value`
        pub fn add(
            mut self,
            field: &str,
            value: impl Into<$crate::expr::Operand>,
        ) -> $crate::error::Result<Self> {
            let op = $crate::query::AssignOp::Add;
            self.payload.assign(&self.input, &self.record, field, op, value.into())?;
            Ok(self)
        }

        /// `SET field -= value`
        pub fn sub(
            mut self,
            field: &str,
            value: impl Into<$crate::expr::Operand>,
        ) -> $crate::error::Result<Self> {
            let op = $crate::query::AssignOp::Sub;
            self.payload.assign(&self.input, &self.record, field, op, value.into())?;
            Ok(self)
        }
    };
    (content) => {
        /// `CONTENT <doc>`; the document is parsed against the table's input shape.
        pub fn content(mut self, doc: impl Into<serde_json::Value>) -> $crate::error::Result<Self> {
            self.payload.content(&self.input, doc.into())?;
            Ok(self)
        }
    };
    (merge) => {
        /// `MERGE <doc>`
        pub fn merge(mut self, doc: impl Into<serde_json::Value>) -> $crate::error::Result<Self> {
            self.payload.merge(&self.input, doc.into())?;
            Ok(self)
        }
    };
    (patch) => {
        /// `PATCH <ops>`
        pub fn patch(
            mut self,
            ops: impl IntoIterator<Item = $crate::query::PatchOp>,
        ) -> $crate::error::Result<Self> {
            self.payload.patch(ops.into_iter().collect())?;
            Ok(self)
        }
    };
    (replace) => {
        /// `REPLACE <doc>`
        pub fn replace(mut self, doc: impl Into<serde_json::Value>) -> $crate::error::Result<Self> {
            self.payload.replace(&self.input, doc.into())?;
            Ok(self)
        }
    };
}

/// `RETURN`, `TIMEOUT` and `PARALLEL` methods for builders with
/// `trailer: Trailer`, `record: Expr` and `ctx: Context` fields.
macro_rules! trailer_methods {
    () => {
        /// The affected record, as seen from this statement.
        pub fn record(&self) -> &$crate::expr::Expr {
            &self.record
        }

        pub fn return_mode(mut self, mode: $crate::query::Return) -> Self {
            self.trailer.ret = Some(mode);
            self
        }

        /// `RETURN VALUE <expr>`, built from the record.
        pub fn returning<S: Into<$crate::expr::Shape>>(
            mut self,
            f: impl FnOnce(&$crate::expr::Expr) -> S,
        ) -> Self {
            let shape: $crate::expr::Shape = f(&self.record).into();
            let value = shape.lower(&self.ctx);
            self.trailer.ret = Some($crate::query::Return::Value(value));
            self
        }

        pub fn timeout(mut self, t: std::time::Duration) -> Self {
            self.trailer.timeout = Some(t);
            self
        }

        pub fn parallel(mut self) -> Self {
            self.trailer.parallel = true;
            self
        }
    };
    (only) => {
        pub fn only(mut self) -> Self {
            self.only = true;
            self
        }

        $crate::query::clauses::trailer_methods!();
    };
}

pub(crate) use {payload_methods, trailer_methods};

//! What a statement operates on: a table, one record, or an expression.
use serde_json::Value;

use crate::display::{DisplayContext, ident};
use crate::error::UsageError;
use crate::expr::Expr;
use crate::schema::Database;
use crate::types::scalar::RecordRef;
use crate::types::{ArrayShape, Type};

#[derive(Debug, Clone)]
pub enum Target {
    Table(String),
    Record(RecordRef),
    /// A record-typed expression or sub-query.
    Expr(Expr),
}

impl Target {
    pub fn table(name: impl Into<String>) -> Self {
        Target::Table(name.into())
    }

    pub fn record(table: impl Into<String>, id: impl Into<Value>) -> Self {
        Target::Record(RecordRef::new(table, id))
    }

    /// The declared table this target reads rows from, if known.
    pub fn table_name(&self) -> Option<&str> {
        match self {
            Target::Table(t) => Some(t),
            Target::Record(r) => Some(&r.table),
            Target::Expr(e) => e.ty().record_table(),
        }
    }

    pub fn is_record(&self) -> bool {
        matches!(self, Target::Record(_))
    }

    /// Shape of one row addressed by this target. Named tables must be declared.
    pub(crate) fn row_type(&self, db: &Database) -> Result<Type, UsageError> {
        match self {
            Target::Table(t) => Ok(db.require(t)?.record_type()),
            Target::Record(r) => Ok(db.require(&r.table)?.record_type()),
            Target::Expr(e) => Ok(match e.ty().record_table() {
                Some(t) => db.require(t)?.record_type(),
                None => match db.resolve(&e.ty().present()) {
                    Type::Array(ArrayShape::List(item)) => db.resolve(&item),
                    other => other,
                },
            }),
        }
    }

    /// Shape accepted as write data. Undeclared expression targets accept any object.
    pub(crate) fn input_type(&self, db: &Database) -> Result<Type, UsageError> {
        match self.table_name() {
            Some(t) => Ok(db.require(t)?.input_type()),
            None => Ok(match self.row_type(db)? {
                row @ Type::Object(_) => row,
                _ => Type::Object(Default::default()),
            }),
        }
    }

    pub(crate) fn render(&self, d: &mut DisplayContext) -> String {
        match self {
            Target::Table(t) => ident(t).into_owned(),
            Target::Record(r) => {
                let table = d.bind(Value::String(r.table.clone()));
                let id = d.bind(r.id.clone());
                format!("type::thing({table}, {id})")
            }
            Target::Expr(e) => e.node().render_operand(d),
        }
    }
}

/// `"user"` is a table, `"user:tobie"` a record.
impl From<&str> for Target {
    fn from(s: &str) -> Self {
        match RecordRef::parse(s) {
            Some(r) => Target::Record(r),
            None => Target::Table(s.to_string()),
        }
    }
}

impl From<String> for Target {
    fn from(s: String) -> Self {
        Target::from(s.as_str())
    }
}

impl From<RecordRef> for Target {
    fn from(r: RecordRef) -> Self {
        Target::Record(r)
    }
}

impl From<Expr> for Target {
    fn from(e: Expr) -> Self {
        Target::Expr(e)
    }
}

impl From<&Expr> for Target {
    fn from(e: &Expr) -> Self {
        Target::Expr(e.clone())
    }
}

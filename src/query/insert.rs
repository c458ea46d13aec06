use serde_json::Value;

use super::clauses::{AssignOp, Assignment, Return, Trailer, check_assignment, trailer_methods};
use super::Statement;
use crate::display::{DisplayContext, ident, idiom};
use crate::error::{Result, UsageError};
use crate::expr::{Expr, Operand};
use crate::node::{Context, Node};
use crate::schema::Database;
use crate::types::Type;

#[derive(Debug, Clone, Default)]
enum Data {
    #[default]
    Empty,
    /// `(a, b) VALUES (..), (..)`
    Rows { fields: Vec<String>, rows: Vec<Vec<Value>> },
    /// One document or a list of them.
    Content(Vec<Value>),
}

/// `INSERT [RELATION] [IGNORE] INTO <table> <data> [ON DUPLICATE KEY UPDATE]
/// [RETURN] [TIMEOUT] [PARALLEL]`
#[derive(Debug, Clone)]
pub struct Insert {
    ctx: Context,
    table: String,
    relation: bool,
    record: Expr,
    input: Type,
    ignore: bool,
    data: Data,
    on_duplicate: Vec<Assignment>,
    trailer: Trailer,
}

impl Database {
    pub fn insert(&self, table: &str) -> Result<Insert, UsageError> {
        let decl = self.require(table)?;
        Ok(Insert::new(self, table, decl.record_type(), decl.input_type(), false))
    }

    /// `INSERT RELATION INTO <edge>`; documents carry their own `in` and `out`.
    pub fn insert_relation(&self, edge: &str) -> Result<Insert, UsageError> {
        self.require_edge(edge)?;
        let decl = self.require(edge)?;
        Ok(Insert::new(self, edge, decl.record_type(), decl.input_type(), true))
    }
}

impl Insert {
    fn new(db: &Database, table: &str, row: Type, input: Type, relation: bool) -> Self {
        let ctx = Context::new(db.clone());
        let record = Expr::from(Node::record(ctx.clone(), row));
        Self {
            ctx,
            table: table.to_string(),
            relation,
            record,
            input,
            ignore: false,
            data: Data::Empty,
            on_duplicate: Vec::new(),
            trailer: Trailer::default(),
        }
    }

    trailer_methods!();

    /// Skip rows whose id already exists instead of failing.
    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }

    /// Declare the columns for subsequent [`Self::values`] rows.
    pub fn fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Result<Self> {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        match &mut self.data {
            Data::Content(_) => {
                return Err(UsageError::Conflict { clause: "fields()", existing: "content()" }.into());
            }
            Data::Rows { rows, .. } if !rows.is_empty() => {
                return Err(UsageError::Conflict { clause: "fields()", existing: "values()" }.into());
            }
            data => *data = Data::Rows { fields, rows: Vec::new() },
        }
        Ok(self)
    }

    /// One row; its arity must match [`Self::fields`].
    pub fn values<V: Into<Value>>(mut self, row: impl IntoIterator<Item = V>) -> Result<Self> {
        let Data::Rows { fields, rows } = &mut self.data else {
            return Err(UsageError::ValuesBeforeFields.into());
        };
        let row: Vec<Value> = row.into_iter().map(Into::into).collect();
        if row.len() != fields.len() {
            return Err(UsageError::InsertArity {
                expected: fields.len(),
                got: row.len(),
                row: rows.len(),
            }
            .into());
        }
        for (field, value) in fields.iter().zip(&row) {
            check_assignment(&self.input, field, value)?;
        }
        rows.push(row);
        Ok(self)
    }

    /// A document, or an array of documents; each is parsed against the table.
    pub fn content(mut self, doc: impl Into<Value>) -> Result<Self> {
        if let Data::Rows { .. } = self.data {
            return Err(UsageError::Conflict { clause: "content()", existing: "fields()" }.into());
        }
        let docs = match doc.into() {
            Value::Array(docs) => docs,
            doc => vec![doc],
        };
        let parsed = docs
            .iter()
            .map(|doc| self.input.parse(doc))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        match &mut self.data {
            Data::Content(existing) => existing.extend(parsed),
            data => *data = Data::Content(parsed),
        }
        Ok(self)
    }

    /// `ON DUPLICATE KEY UPDATE field = value`
    pub fn on_duplicate(mut self, field: &str, value: impl Into<Operand>) -> Result<Self> {
        let value = value.into();
        if let Operand::Value(v) = &value {
            check_assignment(&self.input, field, v)?;
        }
        let value = value.into_expr(&self.ctx);
        self.on_duplicate.push(Assignment { field: field.to_string(), op: AssignOp::Assign, value });
        Ok(self)
    }

    /// `ON DUPLICATE KEY UPDATE field <op> <expr>`; the callback gets the
    /// existing record and the rejected input (`$input`).
    pub fn on_duplicate_with(
        mut self,
        field: &str,
        op: AssignOp,
        f: impl FnOnce(&Expr, &Expr) -> Expr,
    ) -> Self {
        let input = Expr::from(Node::new(self.ctx.clone(), self.input.clone(), |_| {
            "$input".to_string()
        }));
        let value = f(&self.record, &input);
        self.on_duplicate.push(Assignment { field: field.to_string(), op, value });
        self
    }

    fn render_data(&self, d: &mut DisplayContext) -> String {
        match &self.data {
            Data::Empty => d.bind(Value::Array(Vec::new())),
            Data::Rows { fields, rows } => {
                let fields = fields.iter().map(|f| idiom(f)).collect::<Vec<_>>().join(", ");
                let rows = rows
                    .iter()
                    .map(|row| {
                        let vals = row.iter().map(|v| d.bind(v.clone())).collect::<Vec<_>>();
                        format!("({})", vals.join(", "))
                    })
                    .collect::<Vec<_>>();
                format!("({fields}) VALUES {}", rows.join(", "))
            }
            Data::Content(docs) => match docs.as_slice() {
                [one] => d.bind(one.clone()),
                many => d.bind(Value::Array(many.to_vec())),
            },
        }
    }
}

impl Statement for Insert {
    fn context(&self) -> &Context {
        &self.ctx
    }

    fn kind(&self) -> &'static str {
        "INSERT"
    }

    fn render_statement(&self, d: &mut DisplayContext) -> String {
        let mut out = String::from("INSERT ");
        if self.relation {
            out.push_str("RELATION ");
        }
        if self.ignore {
            out.push_str("IGNORE ");
        }
        out.push_str("INTO ");
        out.push_str(&ident(&self.table));
        out.push(' ');
        out.push_str(&self.render_data(d));
        if !self.on_duplicate.is_empty() {
            let parts = self
                .on_duplicate
                .iter()
                .map(|a| a.render(d))
                .collect::<Vec<_>>();
            out.push_str(" ON DUPLICATE KEY UPDATE ");
            out.push_str(&parts.join(", "));
        }
        self.trailer.render(d, &mut out);
        out
    }

    fn output(&self) -> Type {
        self.trailer.output(Return::After, self.record.ty(), false)
    }

    fn checks_output(&self) -> bool {
        self.trailer.checks_output()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::Error;
    use crate::query::tests::db;

    #[test]
    fn fields_and_values() {
        let q = db()
            .insert("user")
            .unwrap()
            .fields(["name", "age"])
            .unwrap()
            .values([json!("Ada"), json!(36)])
            .unwrap()
            .values([json!("Grace"), json!(45)])
            .unwrap()
            .compile();
        assert_eq!(q.text, "INSERT INTO user (name, age) VALUES ($_v0, $_v1), ($_v2, $_v3)");
        assert_eq!(q.vars.len(), 4);
    }

    #[test]
    fn values_before_fields_is_rejected() {
        let err = db().insert("user").unwrap().values([json!("Ada")]).unwrap_err();
        assert!(matches!(err, Error::Usage(UsageError::ValuesBeforeFields)));
    }

    #[test]
    fn row_arity_must_match() {
        let err = db()
            .insert("user")
            .unwrap()
            .fields(["name", "age"])
            .unwrap()
            .values([json!("Ada"), json!(1)])
            .unwrap()
            .values([json!("Grace")])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Usage(UsageError::InsertArity { expected: 2, got: 1, row: 1 })
        ));
    }

    #[test]
    fn row_values_are_type_checked() {
        let err = db()
            .insert("user")
            .unwrap()
            .fields(["age"])
            .unwrap()
            .values([json!("old")])
            .unwrap_err();
        assert!(matches!(err, Error::Type(ref e) if e.path == ".age"));
    }

    #[test]
    fn content_mode_excludes_fields() {
        let doc = json!({"name": "Ada", "age": 1, "tags": []});
        let err = db().insert("user").unwrap().content(doc.clone()).unwrap().fields(["name"]).unwrap_err();
        assert!(matches!(
            err,
            Error::Usage(UsageError::Conflict { clause: "fields()", existing: "content()" })
        ));

        let q = db()
            .insert("user")
            .unwrap()
            .ignore()
            .content(json!([doc.clone(), doc]))
            .unwrap()
            .return_mode(Return::None)
            .compile();
        assert_eq!(q.text, "INSERT IGNORE INTO user $_v0 RETURN NONE");
        assert_eq!(q.vars["_v0"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn on_duplicate_key_update() {
        let q = db()
            .insert("user")
            .unwrap()
            .content(json!({"id": "user:ada", "name": "Ada", "age": 1, "tags": []}))
            .unwrap()
            .on_duplicate_with("age", AssignOp::Add, |r, _| r.lift(1))
            .on_duplicate("name", "Ada L.")
            .unwrap()
            .compile();
        assert_eq!(q.text, "INSERT INTO user $_v0 ON DUPLICATE KEY UPDATE age += $_v1, name = $_v2");
    }

    #[test]
    fn duplicate_updates_can_read_the_input() {
        let q = db()
            .insert("user")
            .unwrap()
            .content(json!({"name": "Ada", "age": 1, "tags": []}))
            .unwrap()
            .on_duplicate_with("tags", AssignOp::Assign, |r, input| {
                r.get("tags").call("union", [input.get("tags").into()]).unwrap()
            })
            .compile();
        assert_eq!(
            q.text,
            "INSERT INTO user $_v0 ON DUPLICATE KEY UPDATE tags = array::union(tags, $input.tags)"
        );
    }

    #[test]
    fn relations_require_an_edge() {
        let err = db().insert_relation("user").unwrap_err();
        assert_eq!(err, UsageError::NotAnEdge("user".into()));

        let q = db()
            .insert_relation("authored")
            .unwrap()
            .content(json!({"in": "user:ada", "out": "post:1"}))
            .unwrap()
            .compile();
        assert_eq!(q.text, "INSERT RELATION INTO authored $_v0");

        let err = db()
            .insert_relation("authored")
            .unwrap()
            .content(json!({"in": "post:1", "out": "post:1"}))
            .unwrap_err();
        assert!(matches!(err, Error::Type(ref e) if e.path == ".in"));
    }
}

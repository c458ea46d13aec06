use std::time::Duration;

use indexmap::IndexMap;
use serde_json::Value;

use super::clauses::{Direction, Filter, Group, Order, render_timeout};
use super::{Statement, Target};
use crate::display::{DisplayContext, idiom};
use crate::error::UsageError;
use crate::expr::{Expr, Shape};
use crate::node::{Context, Node};
use crate::schema::Database;
use crate::types::Type;

#[derive(Debug, Clone)]
enum Projection {
    All,
    Fields(Vec<String>),
    Value(Expr),
}

/// `SELECT <projection> FROM [ONLY] <target> [WHERE] [SPLIT] [GROUP] [ORDER]
/// [LIMIT] [START] [FETCH] [TIMEOUT] [PARALLEL]`
#[derive(Debug, Clone)]
pub struct Select {
    ctx: Context,
    target: Target,
    record: Expr,
    projection: Projection,
    only: bool,
    filter: Filter,
    split: Vec<String>,
    group: Option<Group>,
    order: Vec<Order>,
    limit: Option<usize>,
    start: Option<usize>,
    fetch: Vec<String>,
    timeout: Option<Duration>,
    parallel: bool,
}

impl Database {
    pub fn select(&self, target: impl Into<Target>) -> Result<Select, UsageError> {
        let target = target.into();
        let row = target.row_type(self)?;
        let ctx = Context::new(self.clone());
        let record = Expr::from(Node::record(ctx.clone(), row));
        Ok(Select {
            ctx,
            target,
            record,
            projection: Projection::All,
            only: false,
            filter: Filter::default(),
            split: Vec::new(),
            group: None,
            order: Vec::new(),
            limit: None,
            start: None,
            fetch: Vec::new(),
            timeout: None,
            parallel: false,
        })
    }
}

impl Select {
    /// The row being selected, as seen from this statement.
    pub fn record(&self) -> &Expr {
        &self.record
    }

    pub fn only(mut self) -> Self {
        self.only = true;
        self
    }

    pub fn filter(mut self, f: impl FnOnce(&Expr) -> Expr) -> Self {
        let cond = f(&self.record);
        self.filter.push(cond);
        self
    }

    /// Select named fields: `SELECT a, b.c FROM ..`.
    pub fn fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.projection = Projection::Fields(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Select one synthesized value per row: `SELECT VALUE <expr> FROM ..`.
    /// Objects and arrays of expressions are lowered to a single literal.
    pub fn project<S: Into<Shape>>(mut self, f: impl FnOnce(&Expr) -> S) -> Self {
        let shape: Shape = f(&self.record).into();
        self.projection = Projection::Value(shape.lower(&self.ctx));
        self
    }

    pub fn split<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.split.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn group_by<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        let fields = fields.into_iter().map(Into::into);
        match &mut self.group {
            Some(Group::By(existing)) => existing.extend(fields),
            _ => self.group = Some(Group::By(fields.collect())),
        }
        self
    }

    pub fn group_all(mut self) -> Self {
        self.group = Some(Group::All);
        self
    }

    pub fn order_by(mut self, f: impl FnOnce(&Expr) -> Expr, direction: Direction) -> Self {
        let by = f(&self.record);
        self.order.push(Order { by, direction, collate: false, numeric: false });
        self
    }

    /// Order by a field path, with optional `COLLATE` and `NUMERIC` modifiers.
    pub fn order_by_field(
        mut self,
        field: &str,
        direction: Direction,
        collate: bool,
        numeric: bool,
    ) -> Self {
        let path = idiom(field);
        let ty = super::clauses::field_type(self.record.ty(), field);
        let by = Expr::from(Node::new(self.ctx.clone(), ty, move |_| path.clone()));
        self.order.push(Order { by, direction, collate, numeric });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn start(mut self, n: usize) -> Self {
        self.start = Some(n);
        self
    }

    /// Replace record links at these fields by the linked rows.
    pub fn fetch<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.fetch.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, t: Duration) -> Self {
        self.timeout = Some(t);
        self
    }

    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    fn row_type(&self) -> Type {
        let row = self.record.ty();
        let row = match self.projection {
            Projection::All => row.clone(),
            Projection::Fields(ref fields) => {
                let mut out = IndexMap::new();
                for f in fields {
                    let parts = f.split('.').collect::<Vec<_>>();
                    insert_path(&mut out, &parts, super::clauses::field_type(row, f));
                }
                Type::Object(out)
            }
            Projection::Value(ref e) => return e.ty().clone(),
        };
        self.fetched(row)
    }

    fn fetched(&self, row: Type) -> Type {
        let Type::Object(mut fields) = row else { return row };
        let db = self.ctx.db();
        for name in &self.fetch {
            if let Some(ty) = fields.get_mut(name) {
                *ty = db.resolve(ty);
            }
        }
        Type::Object(fields)
    }
}

/// `a.b.c` selects come back nested as `{ a: { b: { c } } }`.
fn insert_path(fields: &mut IndexMap<String, Type>, parts: &[&str], ty: Type) {
    match parts {
        [] => {}
        [last] => {
            fields.insert(last.to_string(), ty);
        }
        [head, rest @ ..] => {
            let entry = fields
                .entry(head.to_string())
                .or_insert_with(|| Type::Object(IndexMap::new()));
            if let Type::Object(inner) = entry {
                insert_path(inner, rest, ty);
            }
        }
    }
}

impl Statement for Select {
    fn context(&self) -> &Context {
        &self.ctx
    }

    fn kind(&self) -> &'static str {
        "SELECT"
    }

    fn render_statement(&self, d: &mut DisplayContext) -> String {
        let mut out = String::from("SELECT ");
        match &self.projection {
            Projection::All => out.push('*'),
            Projection::Fields(fields) => {
                out.push_str(&fields.iter().map(|f| idiom(f)).collect::<Vec<_>>().join(", "))
            }
            Projection::Value(e) => {
                out.push_str("VALUE ");
                out.push_str(&e.render(d));
            }
        }
        out.push_str(" FROM ");
        if self.only {
            out.push_str("ONLY ");
        }
        out.push_str(&self.target.render(d));
        self.filter.render(d, &mut out);
        if !self.split.is_empty() {
            out.push_str(" SPLIT ");
            out.push_str(&self.split.iter().map(|f| idiom(f)).collect::<Vec<_>>().join(", "));
        }
        if let Some(group) = &self.group {
            group.render(&mut out);
        }
        if !self.order.is_empty() {
            let parts = self.order.iter().map(|o| o.render(d)).collect::<Vec<_>>();
            out.push_str(" ORDER BY ");
            out.push_str(&parts.join(", "));
        }
        if let Some(n) = self.limit {
            out.push_str(" LIMIT ");
            out.push_str(&d.bind(Value::from(n)));
        }
        if let Some(n) = self.start {
            out.push_str(" START ");
            out.push_str(&d.bind(Value::from(n)));
        }
        if !self.fetch.is_empty() {
            out.push_str(" FETCH ");
            out.push_str(&self.fetch.iter().map(|f| idiom(f)).collect::<Vec<_>>().join(", "));
        }
        render_timeout(self.timeout, self.parallel, &mut out);
        out
    }

    fn output(&self) -> Type {
        let row = self.row_type();
        if self.only { Type::union([row, Type::Null]) } else { Type::array(row) }
    }
}

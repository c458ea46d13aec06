use super::clauses::{Filter, Return, Trailer, trailer_methods};
use super::{Statement, Target};
use crate::display::DisplayContext;
use crate::error::UsageError;
use crate::expr::Expr;
use crate::node::{Context, Node};
use crate::schema::Database;
use crate::types::Type;

/// `DELETE [ONLY] <target> [WHERE] [RETURN] [TIMEOUT] [PARALLEL]`
#[derive(Debug, Clone)]
pub struct Delete {
    ctx: Context,
    target: Target,
    record: Expr,
    only: bool,
    filter: Filter,
    trailer: Trailer,
}

impl Database {
    pub fn delete(&self, target: impl Into<Target>) -> Result<Delete, UsageError> {
        let target = target.into();
        let row = target.row_type(self)?;
        let ctx = Context::new(self.clone());
        let record = Expr::from(Node::record(ctx.clone(), row));
        Ok(Delete {
            ctx,
            target,
            record,
            only: false,
            filter: Filter::default(),
            trailer: Trailer::default(),
        })
    }
}

impl Delete {
    trailer_methods!(only);

    pub fn filter(mut self, f: impl FnOnce(&Expr) -> Expr) -> Self {
        let cond = f(&self.record);
        self.filter.push(cond);
        self
    }
}

impl Statement for Delete {
    fn context(&self) -> &Context {
        &self.ctx
    }

    fn kind(&self) -> &'static str {
        "DELETE"
    }

    fn render_statement(&self, d: &mut DisplayContext) -> String {
        let mut out = String::from("DELETE ");
        if self.only {
            out.push_str("ONLY ");
        }
        out.push_str(&self.target.render(d));
        self.filter.render(d, &mut out);
        self.trailer.render(d, &mut out);
        out
    }

    // Nothing comes back unless asked for.
    fn output(&self) -> Type {
        self.trailer.output(Return::None, self.record.ty(), self.only)
    }

    fn checks_output(&self) -> bool {
        self.trailer.checks_output()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::query::tests::db;

    #[test]
    fn delete_with_filter_and_return() {
        let s = db()
            .delete("user")
            .unwrap()
            .filter(|u| u.get("age").lt(13).or(u.get("tags").contains("banned")))
            .return_mode(Return::Before);
        assert_eq!(
            s.compile().text,
            "DELETE user WHERE (age < $_v0) OR (tags CONTAINS $_v1) RETURN BEFORE"
        );
        assert!(s.output().validate(&json!([{"id": "user:a", "name": "A", "age": 3, "tags": []}])));
    }

    #[test]
    fn delete_returns_nothing_by_default() {
        let s = db().delete("user:ada").unwrap();
        assert_eq!(s.compile().text, "DELETE type::thing($_v0, $_v1)");
        assert!(s.output().validate(&json!([])));
        assert!(!s.output().validate(&json!([{}])));
    }

    #[test]
    fn delete_through_an_expression_target() {
        let db = db();
        let sub = db.select("user").unwrap().filter(|u| u.get("age").gt(99)).into_expr();
        let q = db.delete(sub).unwrap().compile();
        assert_eq!(q.text, "DELETE (SELECT * FROM user WHERE age > $_v0)");
    }
}

use super::clauses::{PayloadSlot, Return, Trailer, payload_methods, trailer_methods};
use super::{Statement, Target};
use crate::display::{DisplayContext, ident};
use crate::error::UsageError;
use crate::expr::Expr;
use crate::node::{Context, Node};
use crate::schema::Database;
use crate::types::Type;

/// `RELATE [ONLY] <from>-><edge>-><to> [SET | CONTENT] [RETURN] [TIMEOUT] [PARALLEL]`
#[derive(Debug, Clone)]
pub struct Relate {
    ctx: Context,
    edge: String,
    from: Target,
    to: Target,
    record: Expr,
    input: Type,
    only: bool,
    payload: PayloadSlot,
    trailer: Trailer,
}

impl Database {
    /// Fails at once when `edge` is not a declared edge table, or when a
    /// record endpoint's table is not among the edge's declared ends.
    pub fn relate(
        &self,
        edge: &str,
        from: impl Into<Target>,
        to: impl Into<Target>,
    ) -> Result<Relate, UsageError> {
        let decl = self.require_edge(edge)?;
        let from = from.into();
        let to = to.into();
        check_endpoint(edge, "in", &from, &decl.from)?;
        check_endpoint(edge, "out", &to, &decl.to)?;

        let decl = self.require(edge)?;
        let ctx = Context::new(self.clone());
        let record = Expr::from(Node::record(ctx.clone(), decl.record_type()));
        Ok(Relate {
            ctx,
            edge: edge.to_string(),
            from,
            to,
            record,
            input: decl.input_type(),
            only: false,
            payload: PayloadSlot::default(),
            trailer: Trailer::default(),
        })
    }
}

fn check_endpoint(
    edge: &str,
    side: &'static str,
    target: &Target,
    allowed: &[String],
) -> Result<(), UsageError> {
    match target {
        Target::Table(table) => Err(UsageError::InvalidEndpoint { side, table: table.clone() }),
        Target::Record(r) if !allowed.contains(&r.table) => Err(UsageError::EndpointMismatch {
            edge: edge.to_string(),
            side,
            table: r.table.clone(),
        }),
        _ => Ok(()),
    }
}

impl Relate {
    payload_methods!(set);
    payload_methods!(content);
    trailer_methods!(only);
}

/// Record ids and compound expressions are parenthesized; sub-queries already are.
fn render_endpoint(target: &Target, d: &mut DisplayContext) -> String {
    match target {
        Target::Record(_) => format!("({})", target.render(d)),
        _ => target.render(d),
    }
}

impl Statement for Relate {
    fn context(&self) -> &Context {
        &self.ctx
    }

    fn kind(&self) -> &'static str {
        "RELATE"
    }

    fn render_statement(&self, d: &mut DisplayContext) -> String {
        let mut out = String::from("RELATE ");
        if self.only {
            out.push_str("ONLY ");
        }
        let from = render_endpoint(&self.from, d);
        let to = render_endpoint(&self.to, d);
        out.push_str(&format!("{from}->{}->{to}", ident(&self.edge)));
        self.payload.render(d, &mut out);
        self.trailer.render(d, &mut out);
        out
    }

    fn output(&self) -> Type {
        self.trailer.output(Return::After, self.record.ty(), self.only)
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
    use crate::schema::Declaration;

    #[test]
    fn relate_two_records() {
        let s = db()
            .relate("authored", "user:ada", "post:1")
            .unwrap()
            .set("at", "2024-05-01T12:00:00Z")
            .unwrap();
        let q = s.compile();
        assert_eq!(
            q.text,
            "RELATE (type::thing($_v0, $_v1))->authored->(type::thing($_v2, $_v3)) SET at = $_v4"
        );
        assert_eq!(q.vars["_v3"], json!(1));
        assert!(s.output().validate(&json!([
            {"id": "authored:x", "in": "user:ada", "out": "post:1"}
        ])));
    }

    #[test]
    fn relating_through_a_plain_table_fails_immediately() {
        let err = db().relate("user", "user:ada", "post:1").unwrap_err();
        assert_eq!(err, UsageError::NotAnEdge("user".into()));
        let err = db().relate("ghost", "user:ada", "post:1").unwrap_err();
        assert_eq!(err, UsageError::UnknownTable("ghost".into()));
    }

    #[test]
    fn endpoints_are_checked_against_the_edge() {
        let err = db().relate("authored", "post:1", "post:2").unwrap_err();
        assert_eq!(
            err,
            UsageError::EndpointMismatch { edge: "authored".into(), side: "in", table: "post".into() }
        );
        let err = db().relate("authored", "user:ada", "post").unwrap_err();
        assert_eq!(err, UsageError::InvalidEndpoint { side: "out", table: "post".into() });
    }

    #[test]
    fn expression_endpoints_render_in_place() {
        let db = db();
        let posts = db.select("post").unwrap().filter(|p| p.get("title").eq("x")).into_expr();
        let q = db
            .relate("authored", "user:ada", posts)
            .unwrap()
            .content(json!({"at": "2024-05-01T12:00:00Z"}))
            .unwrap()
            .return_mode(Return::None)
            .compile();
        assert_eq!(
            q.text,
            "RELATE (type::thing($_v0, $_v1))->authored->(SELECT * FROM post WHERE title = $_v2) CONTENT $_v3 RETURN NONE"
        );
    }

    #[test]
    fn payload_is_checked_against_edge_fields() {
        let err = db().relate("authored", "user:ada", "post:1").unwrap().set("at", "tuesday").unwrap_err();
        assert!(matches!(err, Error::Type(ref e) if e.path == ".at"));
    }

    #[test]
    fn multi_table_edges_accept_any_declared_end() {
        let db = Database::new([
            Declaration::table("user", [("name", Type::String)]),
            Declaration::table("team", [("name", Type::String)]),
            Declaration::table("project", [("name", Type::String)]),
            Declaration::edge("owns", ["user", "team"], ["project"], [("since", Type::Date)]),
        ]);
        assert!(db.relate("owns", "team:core", "project:x").is_ok());
        assert!(db.relate("owns", "project:y", "project:x").is_err());
    }
}

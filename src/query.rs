//! Statement builders, compilation and execution.
//!
//! A builder accumulates clause state, then renders once per compilation. All
//! raw values end up in the [`Variables`] of the resulting [`Compiled`]; the
//! text only ever carries `$_v<N>` placeholders, identifiers and keywords.
pub mod clauses;
pub mod create;
pub mod delete;
pub mod insert;
pub mod relate;
pub mod select;
pub mod target;
pub mod update;
pub mod upsert;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::display::{DisplayContext, Variables};
use crate::error::{Error, Result, TypeError};
use crate::expr::Expr;
use crate::node::{Context, Node};
use crate::types::Type;

pub use clauses::{AssignOp, Direction, Group, PatchOp, Return};
pub use create::Create;
pub use delete::Delete;
pub use insert::Insert;
pub use relate::Relate;
pub use select::Select;
pub use target::Target;
pub use update::Update;
pub use upsert::Upsert;

// ————————————————————————————————————————————————————————————————————————————
// COMPILATION
// ————————————————————————————————————————————————————————————————————————————

/// Query text plus the values its placeholders refer to.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub text: String,
    pub vars: Variables,
}

pub trait Statement: Send + Sync {
    fn context(&self) -> &Context;

    /// Leading keyword, for logs.
    fn kind(&self) -> &'static str;

    /// Render the bare statement. Called with this statement's scope current.
    fn render_statement(&self, d: &mut DisplayContext) -> String;

    /// Descriptor of the statement's result, used to parse transport output.
    fn output(&self) -> Type;

    /// Whether results are parsed against [`Statement::output`] on execute.
    fn checks_output(&self) -> bool {
        true
    }

    fn render(&self, d: &mut DisplayContext) -> String {
        d.scoped(self.context().scope(), |d| self.render_statement(d))
    }

    fn compile(&self) -> Compiled {
        let mut d = DisplayContext::new();
        let text = self.render(&mut d);
        let vars = d.into_variables();
        tracing::debug!(kind = self.kind(), len = text.len(), vars = vars.len(), "compiled statement");
        Compiled { text, vars }
    }

    /// Use the statement as a parenthesized sub-query.
    fn into_expr(self) -> Expr
    where
        Self: Sized + 'static,
    {
        let ctx = self.context().clone();
        let ty = self.output();
        Expr::from(Node::new(ctx, ty, move |d| format!("({})", self.render(d))))
    }
}

/// Compile several statements into one transaction block sharing one
/// variable map.
pub fn compile_batch(statements: &[&dyn Statement]) -> Compiled {
    let mut d = DisplayContext::new();
    let mut text = String::from("BEGIN TRANSACTION;\n");
    for stmt in statements {
        text.push_str(&stmt.render(&mut d));
        text.push_str(";\n");
    }
    text.push_str("COMMIT TRANSACTION;");
    let vars = d.into_variables();
    tracing::debug!(statements = statements.len(), len = text.len(), vars = vars.len(), "compiled batch");
    Compiled { text, vars }
}

// ————————————————————————————————————————————————————————————————————————————
// EXECUTION
// ————————————————————————————————————————————————————————————————————————————

/// The one capability needed from a database connection: run text with
/// variables and return one result per statement.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn query(&self, text: &str, vars: &Variables) -> anyhow::Result<Vec<Value>>;
}

/// Runs statements over a [`Transport`] and parses what comes back.
#[derive(Debug, Clone)]
pub struct Session<T> {
    transport: T,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Execute one statement; the result is parsed against its output descriptor.
    pub async fn execute(&self, stmt: &dyn Statement) -> Result<Value> {
        let compiled = stmt.compile();
        let mut results = self.run(&compiled, 1).await?;
        let value = results.pop().unwrap_or(Value::Null);
        Ok(parse_result(stmt, value)?)
    }

    /// Execute and decode the parsed result into `D`.
    pub async fn execute_as<D: DeserializeOwned>(&self, stmt: &dyn Statement) -> Result<D> {
        let value = self.execute(stmt).await?;
        Ok(crate::path_de::from_value_with_path(value)?)
    }

    /// Execute statements as one transaction; results are parsed per statement.
    pub async fn execute_batch(&self, statements: &[&dyn Statement]) -> Result<Vec<Value>> {
        let compiled = compile_batch(statements);
        let results = self.run(&compiled, statements.len()).await?;
        statements
            .iter()
            .zip(results)
            .map(|(stmt, value)| parse_result(*stmt, value).map_err(Error::from))
            .collect()
    }

    async fn run(&self, compiled: &Compiled, expected: usize) -> Result<Vec<Value>> {
        tracing::debug!(text = %compiled.text, vars = compiled.vars.len(), "executing");
        let results = self.transport.query(&compiled.text, &compiled.vars).await?;
        if results.len() != expected {
            tracing::warn!(expected, got = results.len(), "unexpected number of statement results");
            return Err(Error::Results { expected, got: results.len() });
        }
        Ok(results)
    }
}

fn parse_result(stmt: &dyn Statement, value: Value) -> std::result::Result<Value, TypeError> {
    if stmt.checks_output() {
        stmt.output().parse(&value)
    } else {
        Ok(value)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::schema::{Database, Declaration};

    pub(crate) fn db() -> Database {
        Database::new([
            Declaration::table(
                "user",
                [
                    ("name", Type::String),
                    ("age", Type::Number),
                    ("email", Type::option(Type::String)),
                    ("tags", Type::array(Type::String)),
                ],
            ),
            Declaration::table(
                "post",
                [("title", Type::String), ("author", Type::record("user"))],
            ),
            Declaration::edge("authored", ["user"], ["post"], [("at", Type::option(Type::Date))]),
        ])
    }

    /// Records what it was asked and answers with canned results.
    pub(crate) struct Recording {
        pub seen: Mutex<Vec<Compiled>>,
        pub answer: Vec<Value>,
    }

    impl Recording {
        pub fn new(answer: Vec<Value>) -> Self {
            Self { seen: Mutex::new(Vec::new()), answer }
        }
    }

    #[async_trait]
    impl Transport for Recording {
        async fn query(&self, text: &str, vars: &Variables) -> anyhow::Result<Vec<Value>> {
            self.seen
                .lock()
                .unwrap()
                .push(Compiled { text: text.to_string(), vars: vars.clone() });
            Ok(self.answer.clone())
        }
    }

    #[test]
    fn batch_wraps_statements_in_one_transaction() {
        let db = db();
        let a = db.select("user").unwrap().filter(|u| u.get("age").gt(18));
        let b = db.create("post").unwrap().set("title", "hello").unwrap();
        let c = db.delete("user:ghost").unwrap();
        let q = compile_batch(&[&a, &b, &c]);

        assert!(q.text.starts_with("BEGIN TRANSACTION;"));
        assert!(q.text.ends_with("COMMIT TRANSACTION;"));
        let inner: Vec<&str> = q.text.lines().skip(1).take(3).collect();
        assert_eq!(
            inner,
            [
                "SELECT * FROM user WHERE age > $_v0;",
                "CREATE post SET title = $_v1;",
                "DELETE type::thing($_v2, $_v3);",
            ]
        );
        assert!(!q.text.contains("(("));
        assert_eq!(
            q.vars.values().cloned().collect::<Vec<_>>(),
            [json!(18), json!("hello"), json!("user"), json!("ghost")]
        );
    }

    #[test]
    fn sub_queries_refer_to_the_outer_record_as_parent() {
        let db = db();
        let users = db.select("user").unwrap();
        let outer = users.record().clone();
        let posts = db
            .select("post")
            .unwrap()
            .filter(|p| p.get("author").eq(outer.id()))
            .into_expr();
        let q = users
            .project(|u| {
                crate::expr::Shape::object([("name", u.get("name").into()), ("posts", posts.into())])
            })
            .compile();
        assert_eq!(
            q.text,
            r#"SELECT VALUE { "name": name, "posts": (SELECT * FROM post WHERE author = $parent.id) } FROM user"#
        );
        assert!(q.vars.is_empty());
    }

    #[tokio::test]
    async fn execute_parses_rows_against_the_output() {
        let transport = Recording::new(vec![json!([
            {"id": "user:a", "name": "Ada", "age": 36, "tags": [], "extra": 1}
        ])]);
        let session = Session::new(transport);
        let db = db();
        let stmt = db.select("user").unwrap().filter(|u| u.get("name").eq("Ada"));
        let rows = session.execute(&stmt).await.unwrap();
        assert_eq!(rows, json!([{"id": "user:a", "name": "Ada", "age": 36, "tags": []}]));

        let seen = session.transport().seen.lock().unwrap();
        assert_eq!(seen[0].text, "SELECT * FROM user WHERE name = $_v0");
        assert_eq!(seen[0].vars["_v0"], json!("Ada"));
    }

    #[tokio::test]
    async fn execute_surfaces_type_errors_from_rows() {
        let session = Session::new(Recording::new(vec![json!([{"id": "user:a", "name": 3}])]));
        let stmt = db().select("user").unwrap();
        let err = session.execute(&stmt).await.unwrap_err();
        match err {
            Error::Type(e) => assert_eq!(e.path, "[0].name"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn execute_as_decodes_rows() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Name {
            name: String,
        }
        let session = Session::new(Recording::new(vec![json!(["Ada", "Grace"])]));
        let stmt = db().select("user").unwrap().project(|u| u.get("name"));
        let names: Vec<String> = session.execute_as(&stmt).await.unwrap();
        assert_eq!(names, ["Ada", "Grace"]);

        let session = Session::new(Recording::new(vec![json!([
            {"id": "user:a", "name": "Ada", "age": 1, "tags": []}
        ])]));
        let rows: Vec<Name> = session.execute_as(&db().select("user").unwrap()).await.unwrap();
        assert_eq!(rows, [Name { name: "Ada".into() }]);
    }

    #[tokio::test]
    async fn mismatched_result_counts_are_rejected() {
        let session = Session::new(Recording::new(vec![json!([]), json!([])]));
        let stmt = db().delete("user").unwrap();
        let err = session.execute(&stmt).await.unwrap_err();
        assert!(matches!(err, Error::Results { expected: 1, got: 2 }));
    }

    #[tokio::test]
    async fn batches_parse_each_result() {
        let session = Session::new(Recording::new(vec![json!([]), json!([{"id": "post:1", "title": "t", "author": "user:a"}])]));
        let db = db();
        let a = db.delete("user").unwrap();
        let b = db.create("post").unwrap();
        let results = session.execute_batch(&[&a, &b]).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1][0]["title"], json!("t"));
    }
}

//! Table and edge declarations, and the [`Database`] registry builders are created from.
pub mod graph;

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, UsageError};
use crate::types::{ArrayShape, Type};

pub use graph::SchemaGraph;

// ————————————————————————————————————————————————————————————————————————————
// DECLARATIONS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Declaration {
    Table(TableDecl),
    Edge(EdgeDecl),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDecl {
    pub name: String,
    #[serde(default)]
    pub fields: IndexMap<String, Type>,
}

/// `from -[name]-> to`. Several source or target tables are allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDecl {
    pub name: String,
    pub from: Vec<String>,
    pub to: Vec<String>,
    #[serde(default)]
    pub fields: IndexMap<String, Type>,
}

impl Declaration {
    pub fn table<K: Into<String>>(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = (K, Type)>,
    ) -> Self {
        Declaration::Table(TableDecl {
            name: name.into(),
            fields: fields.into_iter().map(|(k, t)| (k.into(), t)).collect(),
        })
    }

    pub fn edge<K: Into<String>>(
        name: impl Into<String>,
        from: impl IntoIterator<Item = impl Into<String>>,
        to: impl IntoIterator<Item = impl Into<String>>,
        fields: impl IntoIterator<Item = (K, Type)>,
    ) -> Self {
        Declaration::Edge(EdgeDecl {
            name: name.into(),
            from: from.into_iter().map(Into::into).collect(),
            to: to.into_iter().map(Into::into).collect(),
            fields: fields.into_iter().map(|(k, t)| (k.into(), t)).collect(),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Declaration::Table(t) => &t.name,
            Declaration::Edge(e) => &e.name,
        }
    }

    pub fn fields(&self) -> &IndexMap<String, Type> {
        match self {
            Declaration::Table(t) => &t.fields,
            Declaration::Edge(e) => &e.fields,
        }
    }

    pub fn as_edge(&self) -> Option<&EdgeDecl> {
        match self {
            Declaration::Edge(e) => Some(e),
            Declaration::Table(_) => None,
        }
    }

    /// Shape of a stored row: `id` (and `in`/`out` for edges) followed by the declared fields.
    pub fn record_type(&self) -> Type {
        self.row_type(false)
    }

    /// Shape accepted as creation data: like [`Self::record_type`] with the
    /// generated keys optional.
    pub fn input_type(&self) -> Type {
        self.row_type(true)
    }

    fn row_type(&self, input: bool) -> Type {
        let key = |t: Type| if input { t.optional() } else { t };
        let mut fields = IndexMap::new();
        fields.insert("id".to_string(), key(Type::record(self.name())));
        if let Declaration::Edge(edge) = self {
            fields.insert("in".to_string(), key(Type::union(edge.from.iter().map(Type::record))));
            fields.insert("out".to_string(), key(Type::union(edge.to.iter().map(Type::record))));
        }
        for (name, ty) in self.fields() {
            fields.insert(name.clone(), ty.clone());
        }
        Type::Object(fields)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// REGISTRY
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug)]
struct Schema {
    tables: IndexMap<String, Declaration>,
    graph: SchemaGraph,
}

/// The owning registry: declarations plus their schema graph. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Database {
    schema: Arc<Schema>,
}

impl Database {
    pub fn new(declarations: impl IntoIterator<Item = Declaration>) -> Self {
        let mut tables = IndexMap::new();
        for decl in declarations {
            if let Some(previous) = tables.insert(decl.name().to_string(), decl) {
                tracing::warn!(table = previous.name(), "duplicate declaration replaces the earlier one");
            }
        }
        let graph = SchemaGraph::build(tables.values());
        tracing::debug!(tables = tables.len(), "schema registered");
        Self { schema: Arc::new(Schema { tables, graph }) }
    }

    /// Load a JSON array of declarations.
    pub fn from_json_str(src: &str) -> Result<Self, DecodeError> {
        let declarations: Vec<Declaration> = crate::path_de::from_str_with_path(src)?;
        Ok(Self::new(declarations))
    }

    pub fn declaration(&self, table: &str) -> Option<&Declaration> {
        self.schema.tables.get(table)
    }

    pub fn declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.schema.tables.values()
    }

    pub fn graph(&self) -> &SchemaGraph {
        &self.schema.graph
    }

    pub(crate) fn require(&self, table: &str) -> Result<&Declaration, UsageError> {
        self.declaration(table)
            .ok_or_else(|| UsageError::UnknownTable(table.to_string()))
    }

    pub(crate) fn require_edge(&self, table: &str) -> Result<&EdgeDecl, UsageError> {
        self.require(table)?
            .as_edge()
            .ok_or_else(|| UsageError::NotAnEdge(table.to_string()))
    }

    /// Replace a top-level link to a declared table by that table's row shape,
    /// looking through options, unions and homogeneous arrays.
    pub fn resolve(&self, ty: &Type) -> Type {
        match ty {
            Type::Record(Some(table)) => self
                .declaration(table)
                .map(Declaration::record_type)
                .unwrap_or_else(|| ty.clone()),
            Type::Option(inner) => Type::option(self.resolve(inner)),
            Type::Array(ArrayShape::List(item)) => Type::array(self.resolve(item)),
            Type::Union(alts) => Type::union(alts.iter().map(|t| self.resolve(t))),
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn edge_rows_carry_in_and_out() {
        let edge = Declaration::edge("authored", ["user"], ["post"], [("at", Type::Date)]);
        let row = edge.record_type();
        assert!(row.validate(&json!({
            "id": "authored:1", "in": "user:a", "out": "post:b", "at": "2024-01-01T00:00:00Z"
        })));
        assert!(!row.validate(&json!({
            "id": "authored:1", "in": "post:b", "out": "post:b", "at": "2024-01-01T00:00:00Z"
        })));
        assert!(edge.input_type().validate(&json!({"at": "2024-01-01T00:00:00Z"})));
    }

    #[test]
    fn loads_declarations_from_json() {
        let db = Database::from_json_str(
            r#"[
                {"type": "table", "name": "user", "fields": {"name": {"kind": "string"}}},
                {"type": "table", "name": "post"},
                {"type": "edge", "name": "authored", "from": ["user"], "to": ["post"]}
            ]"#,
        )
        .unwrap();
        assert_eq!(db.declarations().count(), 3);
        assert!(db.require_edge("authored").is_ok());
        assert_eq!(db.require_edge("user").unwrap_err(), UsageError::NotAnEdge("user".into()));
        assert_eq!(db.graph().to("user"), ["authored"]);
    }

    #[test]
    fn malformed_declarations_report_their_path() {
        let err = Database::from_json_str(
            r#"[{"type": "table", "name": "user", "fields": {"age": {"kind": "integer"}}}]"#,
        )
        .unwrap_err();
        assert!(err.path.starts_with("[0]"), "{err}");
    }

    #[test]
    fn resolve_follows_record_links() {
        let db = Database::new([Declaration::table("user", [("name", Type::String)])]);
        let resolved = db.resolve(&Type::option(Type::record("user")));
        assert_eq!(
            resolved,
            Type::option(Type::object([("id", Type::record("user")), ("name", Type::String)]))
        );
        assert_eq!(db.resolve(&Type::record("ghost")), Type::record("ghost"));
    }

    #[test]
    fn resolve_maps_over_lists_of_links() {
        let db = Database::new([Declaration::table("user", [("name", Type::String)])]);
        let user = Type::object([("id", Type::record("user")), ("name", Type::String)]);
        assert_eq!(db.resolve(&Type::array(Type::record("user"))), Type::array(user));
        let pair = Type::tuple([Type::record("user")]);
        assert_eq!(db.resolve(&pair), pair);
    }

    #[test]
    fn redeclared_edges_leave_no_stale_adjacency() {
        let db = Database::new([
            Declaration::table("user", [("name", Type::String)]),
            Declaration::table("post", [("title", Type::String)]),
            Declaration::table("comment", [("text", Type::String)]),
            Declaration::edge("authored", ["user"], ["post"], [("at", Type::Date)]),
            Declaration::edge("authored", ["user"], ["comment"], [("at", Type::Date)]),
        ]);
        assert_eq!(db.graph().to("authored"), ["comment"]);
        assert!(db.graph().from("post").is_empty());
        assert_eq!(db.graph().from("comment"), ["authored"]);
        assert_eq!(db.graph().to("user"), ["authored"]);
    }
}

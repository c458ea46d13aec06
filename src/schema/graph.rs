//! Static adjacency over node and edge tables.
//!
//! For every edge `S -[V]-> T`: `to[S] ∋ V`, `to[V] ∋ T`, `from[T] ∋ V`, `from[V] ∋ S`.
//! Built once from the declaration list and never mutated.
use indexmap::IndexMap;
use serde::Serialize;

use super::Declaration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaGraph {
    to: IndexMap<String, Vec<String>>,
    from: IndexMap<String, Vec<String>>,
}

impl SchemaGraph {
    pub fn build<'a>(declarations: impl IntoIterator<Item = &'a Declaration>) -> Self {
        let declarations: Vec<&Declaration> = declarations.into_iter().collect();
        let mut graph = Self::default();

        // every name mentioned anywhere gets (possibly empty) adjacency lists
        for decl in &declarations {
            graph.touch(decl.name());
            if let Declaration::Edge(edge) = decl {
                for name in edge.from.iter().chain(&edge.to) {
                    graph.touch(name);
                }
            }
        }

        for decl in &declarations {
            let Declaration::Edge(edge) = decl else { continue };
            for source in &edge.from {
                push_unique(&mut graph.to, source, &edge.name);
                push_unique(&mut graph.from, &edge.name, source);
            }
            for target in &edge.to {
                push_unique(&mut graph.to, &edge.name, target);
                push_unique(&mut graph.from, target, &edge.name);
            }
        }
        graph
    }

    fn touch(&mut self, name: &str) {
        self.to.entry(name.to_string()).or_default();
        self.from.entry(name.to_string()).or_default();
    }

    /// Tables reachable in one outgoing hop.
    pub fn to(&self, table: &str) -> &[String] {
        self.to.get(table).map(Vec::as_slice).unwrap_or_default()
    }

    /// Tables reachable in one incoming hop.
    pub fn from(&self, table: &str) -> &[String] {
        self.from.get(table).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, table: &str) -> bool {
        self.to.contains_key(table)
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.to.keys().map(String::as_str)
    }

    /// Edge tables that lead from `source` to `target` in two hops.
    pub fn edges_between(&self, source: &str, target: &str) -> Vec<&str> {
        self.to(source)
            .iter()
            .filter(|edge| self.to(edge).iter().any(|t| t == target))
            .map(String::as_str)
            .collect()
    }
}

fn push_unique(map: &mut IndexMap<String, Vec<String>>, key: &str, value: &str) {
    let list = map.entry(key.to_string()).or_default();
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

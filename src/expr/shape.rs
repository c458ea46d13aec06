//! Projection shapes: nested objects and arrays of expressions, lowered to a
//! single composite expression before rendering.
use indexmap::IndexMap;
use serde_json::Value;

use crate::display::key;
use crate::expr::{Expr, Operand};
use crate::node::{Context, Node};
use crate::types::Type;

#[derive(Debug, Clone)]
pub enum Shape {
    Expr(Expr),
    /// A raw value; bound like any other operand.
    Value(Value),
    Object(IndexMap<String, Shape>),
    Array(Vec<Shape>),
}

impl Shape {
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Shape)>) -> Self {
        Shape::Object(entries.into_iter().map(|(k, s)| (k.into(), s)).collect())
    }

    pub fn array(items: impl IntoIterator<Item = Shape>) -> Self {
        Shape::Array(items.into_iter().collect())
    }

    /// True for a bare expression (as opposed to a literal built from several).
    pub fn is_single(&self) -> bool {
        matches!(self, Shape::Expr(_) | Shape::Value(_))
    }

    /// Lower every leaf to a node and combine them into one expression.
    /// Objects render as `{ "k": v, .. }`, arrays as `[a, b, ..]`.
    pub fn lower(self, ctx: &Context) -> Expr {
        match self {
            Shape::Expr(e) => e,
            Shape::Value(v) => Operand::Value(v).into_expr(ctx),
            Shape::Object(entries) => {
                let entries: Vec<(String, Node)> = entries
                    .into_iter()
                    .map(|(k, s)| (k, s.lower(ctx).into_node()))
                    .collect();
                let ty = Type::object(entries.iter().map(|(k, n)| (k.clone(), n.ty().clone())));
                Expr::from(Node::new(ctx.clone(), ty, move |d| {
                    if entries.is_empty() {
                        return "{}".to_string();
                    }
                    let fields = entries
                        .iter()
                        .map(|(k, n)| format!("{}: {}", key(k), n.render(d)))
                        .collect::<Vec<_>>();
                    format!("{{ {} }}", fields.join(", "))
                }))
            }
            Shape::Array(items) => {
                let items: Vec<Node> = items.into_iter().map(|s| s.lower(ctx).into_node()).collect();
                let ty = Type::tuple(items.iter().map(|n| n.ty().clone()));
                Expr::from(Node::new(ctx.clone(), ty, move |d| {
                    let parts = items.iter().map(|n| n.render(d)).collect::<Vec<_>>();
                    format!("[{}]", parts.join(", "))
                }))
            }
        }
    }
}

impl From<Expr> for Shape {
    fn from(e: Expr) -> Self {
        Shape::Expr(e)
    }
}

impl From<&Expr> for Shape {
    fn from(e: &Expr) -> Self {
        Shape::Expr(e.clone())
    }
}

impl From<Value> for Shape {
    fn from(v: Value) -> Self {
        Shape::Value(v)
    }
}

impl<T: Into<Shape>> From<Vec<T>> for Shape {
    fn from(items: Vec<T>) -> Self {
        Shape::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Shape>, const N: usize> From<[T; N]> for Shape {
    fn from(items: [T; N]) -> Self {
        Shape::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<String>, T: Into<Shape>> From<IndexMap<K, T>> for Shape {
    fn from(entries: IndexMap<K, T>) -> Self {
        Shape::Object(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

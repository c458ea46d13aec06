//! Expression nodes: a descriptor, a lazy renderer and the context they belong to.
//!
//! Nodes are immutable. Combinators build new nodes whose renderer calls the
//! operands' renderers; nothing is rendered until a statement is compiled.
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::display::{DisplayContext, ScopeId};
use crate::schema::Database;
use crate::types::Type;

pub type Render = Arc<dyn Fn(&mut DisplayContext) -> String + Send + Sync>;

/// The registry a node was created against and the scope of its builder.
#[derive(Debug, Clone)]
pub struct Context {
    db: Database,
    scope: ScopeId,
}

impl Context {
    /// A context with a freshly minted scope.
    pub fn new(db: Database) -> Self {
        Self { db, scope: ScopeId::next() }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }
}

#[derive(Clone)]
pub struct Node {
    ctx: Context,
    ty: Type,
    render: Render,
    /// Renders as a single term; compound nodes get parenthesized when nested.
    atomic: bool,
}

impl Node {
    pub fn new(
        ctx: Context,
        ty: Type,
        render: impl Fn(&mut DisplayContext) -> String + Send + Sync + 'static,
    ) -> Self {
        Self { ctx, ty, render: Arc::new(render), atomic: true }
    }

    /// An operator application; nested uses are parenthesized.
    pub fn compound(
        ctx: Context,
        ty: Type,
        render: impl Fn(&mut DisplayContext) -> String + Send + Sync + 'static,
    ) -> Self {
        Self { atomic: false, ..Self::new(ctx, ty, render) }
    }

    /// Lift a raw value: it renders as a fresh placeholder bound to `value`.
    pub fn bound(ctx: Context, value: Value) -> Self {
        let ty = Type::of_value(&value);
        Self::new(ctx, ty, move |d| d.bind(value.clone()))
    }

    /// The record of the context's own builder: `$this` inside it, `$parent` below it.
    pub fn record(ctx: Context, ty: Type) -> Self {
        let scope = ctx.scope();
        Self::new(ctx, ty, move |d| d.record(scope).to_string())
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn is_atomic(&self) -> bool {
        self.atomic
    }

    pub fn render(&self, d: &mut DisplayContext) -> String {
        (self.render)(d)
    }

    /// Render for use as an operand of another operator.
    pub fn render_operand(&self, d: &mut DisplayContext) -> String {
        let text = self.render(d);
        if self.atomic { text } else { format!("({text})") }
    }

    /// Same rendering, different descriptor.
    pub fn with_type(&self, ty: Type) -> Self {
        Self { ty, ..self.clone() }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("scope", &self.ctx.scope)
            .field("ty", &self.ty)
            .field("atomic", &self.atomic)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> Context {
        Context::new(Database::new([]))
    }

    #[test]
    fn bound_nodes_register_on_every_render() {
        let n = Node::bound(ctx(), json!(18));
        assert_eq!(n.ty(), &Type::Number);

        let mut d = DisplayContext::new();
        assert_eq!(n.render(&mut d), "$_v0");
        assert_eq!(n.render(&mut d), "$_v1");
        assert_eq!(d.variables().len(), 2);

        let mut fresh = DisplayContext::new();
        assert_eq!(n.render(&mut fresh), "$_v0");
    }

    #[test]
    fn record_nodes_follow_the_display_scope() {
        let outer = ctx();
        let n = Node::record(outer.clone(), Type::any_record());
        let inner = Context::new(outer.db().clone());
        let mut d = DisplayContext::new();
        d.scoped(outer.scope(), |d| {
            assert_eq!(n.render(d), "$this");
            d.scoped(inner.scope(), |d| assert_eq!(n.render(d), "$parent"));
        });
    }

    #[test]
    fn compound_operands_are_parenthesized() {
        let n = Node::compound(ctx(), Type::Bool, |_| "a = b".to_string());
        let mut d = DisplayContext::new();
        assert_eq!(n.render(&mut d), "a = b");
        assert_eq!(n.render_operand(&mut d), "(a = b)");
    }
}

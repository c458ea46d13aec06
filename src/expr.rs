//! The user-facing expression façade.
//!
//! [`Expr`] wraps a [`Node`] and is what builder callbacks receive. Field access
//! ([`Expr::get`]) projects through the descriptor, following record links into
//! the linked table's shape, and returns another `Expr`, so accesses chain.
//! Methods resolve through the [`ops`] registry by descriptor family.
//!
//! ```ignore
//! let full = r.get("name").get("first").call("join", [" ".into(), r.get("name").get("last").into()])?;
//! let adult = r.get("age").gt(18).and(r.get("age").lt(65));
//! ```
pub mod ops;
pub mod shape;

use serde_json::Value;

use crate::display::{DisplayContext, join_path};
use crate::error::UsageError;
use crate::node::{Context, Node};
use crate::query::Compiled;
use crate::schema::Database;
use crate::types::{Key, Type};

pub use ops::{Arity, Family, Operation, Syntax};
pub use shape::Shape;

#[derive(Debug, Clone)]
pub struct Expr {
    node: Node,
}

/// A method argument: an expression, or a raw value that will be bound.
#[derive(Debug, Clone)]
pub enum Operand {
    Expr(Expr),
    Value(Value),
}

impl Expr {
    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn into_node(self) -> Node {
        self.node
    }

    pub fn ty(&self) -> &Type {
        self.node.ty()
    }

    pub fn context(&self) -> &Context {
        self.node.context()
    }

    pub fn db(&self) -> &Database {
        self.context().db()
    }

    /// Lift a raw value into this expression's context.
    pub fn lift(&self, value: impl Into<Operand>) -> Expr {
        value.into().into_expr(self.context())
    }

    /// Project into a field or element.
    pub fn get(&self, key: impl Into<Key>) -> Expr {
        let key = key.into();
        let projection = self.db().resolve(self.ty()).get(&key);
        let base = self.node.clone();
        let segment = projection.segment;
        Expr::from(Node::new(self.context().clone(), projection.ty, move |d| {
            join_path(&base.render_operand(d), &segment)
        }))
    }

    pub fn id(&self) -> Expr {
        self.get("id")
    }

    /// Element `i`; optional unless the array is a tuple.
    pub fn at(&self, i: usize) -> Expr {
        self.get(Key::Index(i))
    }

    /// Methods callable on this expression.
    pub fn methods(&self) -> Vec<&'static str> {
        ops::names(self.ty())
    }

    /// Call a method by name.
    pub fn call(
        &self,
        method: &str,
        args: impl IntoIterator<Item = Operand>,
    ) -> Result<Expr, UsageError> {
        let op = ops::lookup(self.ty(), method).ok_or_else(|| UsageError::UnknownMethod {
            method: method.to_string(),
            tag: self.ty().present().tag(),
        })?;
        let args: Vec<Operand> = args.into_iter().collect();
        if !op.arity.accepts(args.len()) {
            return Err(UsageError::MethodArity {
                method: method.to_string(),
                expected: op.arity.to_string(),
                got: args.len(),
            });
        }
        Ok(self.apply(op, args))
    }

    fn apply(&self, op: &'static Operation, args: Vec<Operand>) -> Expr {
        let args = args.into_iter().map(|a| a.into_expr(self.context()).node).collect();
        Expr::from(ops::apply(op, &self.node, args))
    }

    pub fn eq(&self, other: impl Into<Operand>) -> Expr {
        self.apply(&ops::EQ, vec![other.into()])
    }

    pub fn ne(&self, other: impl Into<Operand>) -> Expr {
        self.apply(&ops::NE, vec![other.into()])
    }

    /// `==`: equal value and type.
    pub fn exact(&self, other: impl Into<Operand>) -> Expr {
        self.apply(&ops::EXACT, vec![other.into()])
    }

    pub fn gt(&self, other: impl Into<Operand>) -> Expr {
        self.apply(&ops::GT, vec![other.into()])
    }

    pub fn gte(&self, other: impl Into<Operand>) -> Expr {
        self.apply(&ops::GTE, vec![other.into()])
    }

    pub fn lt(&self, other: impl Into<Operand>) -> Expr {
        self.apply(&ops::LT, vec![other.into()])
    }

    pub fn lte(&self, other: impl Into<Operand>) -> Expr {
        self.apply(&ops::LTE, vec![other.into()])
    }

    pub fn and(&self, other: impl Into<Operand>) -> Expr {
        self.apply(&ops::AND, vec![other.into()])
    }

    pub fn or(&self, other: impl Into<Operand>) -> Expr {
        self.apply(&ops::OR, vec![other.into()])
    }

    pub fn not(&self) -> Expr {
        self.apply(&ops::NOT, Vec::new())
    }

    pub fn truthy(&self) -> Expr {
        self.apply(&ops::TRUTHY, Vec::new())
    }

    /// Infix `CONTAINS`, regardless of the receiver's family.
    pub fn contains(&self, other: impl Into<Operand>) -> Expr {
        self.apply(&ops::CONTAINS, vec![other.into()])
    }

    pub fn contains_any(&self, other: impl Into<Operand>) -> Expr {
        self.apply(&ops::CONTAINS_ANY, vec![other.into()])
    }

    pub fn contains_all(&self, other: impl Into<Operand>) -> Expr {
        self.apply(&ops::CONTAINS_ALL, vec![other.into()])
    }

    pub fn inside(&self, other: impl Into<Operand>) -> Expr {
        self.apply(&ops::INSIDE, vec![other.into()])
    }

    pub fn not_inside(&self, other: impl Into<Operand>) -> Expr {
        self.apply(&ops::NOT_INSIDE, vec![other.into()])
    }

    pub fn add(&self, other: impl Into<Operand>) -> Expr {
        self.apply(&ops::ADD, vec![other.into()])
    }

    pub fn sub(&self, other: impl Into<Operand>) -> Expr {
        self.apply(&ops::SUB, vec![other.into()])
    }

    pub fn mul(&self, other: impl Into<Operand>) -> Expr {
        self.apply(&ops::MUL, vec![other.into()])
    }

    pub fn div(&self, other: impl Into<Operand>) -> Expr {
        self.apply(&ops::DIV, vec![other.into()])
    }

    /// Same rendering under a narrower (or wider) descriptor.
    pub fn cast(&self, ty: Type) -> Expr {
        Expr::from(self.node.with_type(ty))
    }

    pub fn render(&self, d: &mut DisplayContext) -> String {
        self.node.render(d)
    }

    /// Render on its own, inside this expression's scope, with fresh variables.
    pub fn to_query(&self) -> Compiled {
        let mut d = DisplayContext::new();
        let text = d.scoped(self.context().scope(), |d| self.render(d));
        Compiled { text, vars: d.into_variables() }
    }
}

impl From<Node> for Expr {
    fn from(node: Node) -> Self {
        Self { node }
    }
}

impl Operand {
    /// Pass expressions through; bind everything else.
    pub fn into_expr(self, ctx: &Context) -> Expr {
        match self {
            Operand::Expr(e) => e,
            Operand::Value(v) => Expr::from(Node::bound(ctx.clone(), v)),
        }
    }
}

impl From<Expr> for Operand {
    fn from(e: Expr) -> Self {
        Operand::Expr(e)
    }
}

impl From<&Expr> for Operand {
    fn from(e: &Expr) -> Self {
        Operand::Expr(e.clone())
    }
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

macro_rules! operand_from_value {
    ($($t:ty),* $(,)?) => {
        $(impl From<$t> for Operand {
            fn from(v: $t) -> Self {
                Operand::Value(Value::from(v))
            }
        })*
    };
}

operand_from_value!(&str, String, bool, i32, i64, u32, u64, usize, f64);

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schema::Declaration;

    fn person() -> Expr {
        let db = Database::new([
            Declaration::table(
                "user",
                [
                    ("name", Type::object([("first", Type::String), ("last", Type::String)])),
                    ("age", Type::Number),
                    ("email", Type::option(Type::String)),
                    ("tags", Type::array(Type::String)),
                    ("born", Type::Date),
                    ("best_friend", Type::option(Type::record("user"))),
                    ("friends", Type::array(Type::record("user"))),
                ],
            ),
        ]);
        let ty = db.require("user").unwrap().record_type();
        Expr::from(Node::record(Context::new(db), ty))
    }

    #[test]
    fn range_filter_binds_both_bounds() {
        let a = person().get("age");
        let q = a.gt(18).and(a.lt(65)).to_query();
        assert_eq!(q.text, "(age > $_v0) AND (age < $_v1)");
        assert_eq!(q.vars.get("_v0"), Some(&json!(18)));
        assert_eq!(q.vars.get("_v1"), Some(&json!(65)));
    }

    #[test]
    fn rendering_is_referentially_transparent() {
        let e = person().get("age").gte(21);
        let first = e.to_query();
        let second = e.to_query();
        assert_eq!(first.text, second.text);
        assert_eq!(first.vars, second.vars);

        let mut d = DisplayContext::new();
        let scope = e.context().scope();
        let (a, b) = d.scoped(scope, |d| (e.render(d), e.render(d)));
        assert_eq!(a, "age >= $_v0");
        assert_eq!(b, "age >= $_v1");
        assert_eq!(d.variables().len(), 2);
    }

    #[test]
    fn chained_field_access_and_methods() {
        let r = person();
        let last = r.get("name").get("last");
        let full = r
            .get("name")
            .get("first")
            .call("join", [" ".into(), last.into()])
            .unwrap();
        assert_eq!(full.ty(), &Type::String);
        assert_eq!(full.to_query().text, "string::join($_v0, name.first, name.last)");
    }

    #[test]
    fn methods_follow_the_descriptor() {
        let r = person();
        let year = r.get("born").call("year", []).unwrap();
        assert_eq!(year.ty(), &Type::Number);
        assert_eq!(year.to_query().text, "time::year(born)");

        let first_tag = r.get("tags").call("first", []).unwrap();
        assert_eq!(first_tag.ty(), &Type::union([Type::String, Type::None]));

        let err = r.get("age").call("lowercase", []).unwrap_err();
        assert_eq!(err, UsageError::UnknownMethod { method: "lowercase".into(), tag: crate::types::Tag::Number });

        let err = r.get("email").call("replace", ["a".into()]).unwrap_err();
        assert!(matches!(err, UsageError::MethodArity { got: 1, .. }));
    }

    #[test]
    fn record_links_are_followed() {
        let r = person();
        let friend_name = r.get("best_friend").get("name").get("first");
        assert_eq!(friend_name.ty(), &Type::option(Type::String));
        assert_eq!(friend_name.to_query().text, "best_friend.name.first");
    }

    #[test]
    fn links_are_followed_through_lists() {
        let r = person();
        let names = r.get("friends").get("name").get("first");
        assert_eq!(names.ty(), &Type::array(Type::String));
        assert_eq!(names.to_query().text, "friends.name.first");
        let first = r.get("friends").get(Key::Present(0)).get("age");
        assert_eq!(first.ty(), &Type::Number);
        assert_eq!(first.to_query().text, "friends[0].age");
    }

    #[test]
    fn unknown_fields_are_none_and_indexes_optional() {
        let r = person();
        assert_eq!(r.get("nope").ty(), &Type::None);
        let tag = r.get("tags").at(2);
        assert_eq!(tag.ty(), &Type::union([Type::String, Type::None]));
        assert_eq!(tag.to_query().text, "tags[2]");
        assert_eq!(r.get("tags").get(Key::Present(0)).ty(), &Type::String);
    }

    #[test]
    fn prefix_operators_wrap_compound_operands() {
        let r = person();
        let q = r.get("age").gt(3).not().to_query();
        assert_eq!(q.text, "!(age > $_v0)");
        assert_eq!(r.get("email").truthy().to_query().text, "!!email");
    }

    #[test]
    fn the_record_itself_renders_as_this() {
        let r = person();
        assert_eq!(r.to_query().text, "$this");
        assert_eq!(r.at(0).to_query().text, "$this[0]");
    }

    #[test]
    fn lifted_values_keep_their_shape() {
        let r = person();
        let tags = r.lift(json!(["a", "b"]));
        assert_eq!(tags.ty(), &Type::array(Type::String));
        let q = r.get("tags").contains_any(tags).to_query();
        assert_eq!(q.text, "tags CONTAINSANY $_v0");
        assert_eq!(q.vars["_v0"], json!(["a", "b"]));
    }
}

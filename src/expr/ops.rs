//! Operation registry.
//!
//! Every method the façade exposes is an [`Operation`]: a name, how it renders,
//! how many arguments it takes and what it returns. Lookup goes to the table of
//! the receiver's [`Family`] first, then to the universal operators.
use std::fmt;

use crate::node::Node;
use crate::types::{ArrayShape, Literal, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    String,
    Number,
    Array,
    Date,
    Record,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    /// `self OP arg`
    Infix(&'static str),
    /// `OPself`
    Prefix(&'static str),
    /// `path(self, args..)`
    Call(&'static str),
    /// `path(args[0], self, args[1..])`, for functions taking a separator first.
    CallSeparated(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Between(usize, usize),
}

impl Arity {
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exact(k) => n == k,
            Arity::AtLeast(k) => n >= k,
            Arity::Between(lo, hi) => (lo..=hi).contains(&n),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(k) => write!(f, "{k}"),
            Arity::AtLeast(k) => write!(f, "at least {k}"),
            Arity::Between(lo, hi) => write!(f, "{lo} to {hi}"),
        }
    }
}

pub struct Operation {
    pub name: &'static str,
    pub syntax: Syntax,
    pub arity: Arity,
    /// Result descriptor, computed from the receiver's descriptor.
    pub output: fn(&Type) -> Type,
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("syntax", &self.syntax)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

const fn op(name: &'static str, syntax: Syntax, arity: Arity, output: fn(&Type) -> Type) -> Operation {
    Operation { name, syntax, arity, output }
}

// ————————————————————————————————————————————————————————————————————————————
// RESULT DESCRIPTORS
// ————————————————————————————————————————————————————————————————————————————

fn boolean(_: &Type) -> Type {
    Type::Bool
}

fn number(_: &Type) -> Type {
    Type::Number
}

fn string(_: &Type) -> Type {
    Type::String
}

fn date(_: &Type) -> Type {
    Type::Date
}

fn strings(_: &Type) -> Type {
    Type::array(Type::String)
}

fn same(t: &Type) -> Type {
    t.present()
}

fn element(t: &Type) -> Type {
    match t.present() {
        Type::Array(ArrayShape::List(item)) => *item,
        Type::Array(ArrayShape::Tuple(items)) => Type::union(items),
        _ => Type::None,
    }
}

fn element_or_none(t: &Type) -> Type {
    Type::union([element(t), Type::None])
}

fn list_of_elements(t: &Type) -> Type {
    Type::array(element(t))
}

fn flattened(t: &Type) -> Type {
    Type::array(element(&element(t)).present())
}

fn record_key(_: &Type) -> Type {
    Type::union([Type::String, Type::Number])
}

// ————————————————————————————————————————————————————————————————————————————
// TABLES
// ————————————————————————————————————————————————————————————————————————————

pub static EQ: Operation = op("eq", Syntax::Infix("="), Arity::Exact(1), boolean);
pub static NE: Operation = op("ne", Syntax::Infix("!="), Arity::Exact(1), boolean);
pub static EXACT: Operation = op("exact", Syntax::Infix("=="), Arity::Exact(1), boolean);
pub static GT: Operation = op("gt", Syntax::Infix(">"), Arity::Exact(1), boolean);
pub static GTE: Operation = op("gte", Syntax::Infix(">="), Arity::Exact(1), boolean);
pub static LT: Operation = op("lt", Syntax::Infix("<"), Arity::Exact(1), boolean);
pub static LTE: Operation = op("lte", Syntax::Infix("<="), Arity::Exact(1), boolean);
pub static AND: Operation = op("and", Syntax::Infix("AND"), Arity::Exact(1), boolean);
pub static OR: Operation = op("or", Syntax::Infix("OR"), Arity::Exact(1), boolean);
pub static NOT: Operation = op("not", Syntax::Prefix("!"), Arity::Exact(0), boolean);
pub static TRUTHY: Operation = op("truthy", Syntax::Prefix("!!"), Arity::Exact(0), boolean);
pub static CONTAINS: Operation = op("contains", Syntax::Infix("CONTAINS"), Arity::Exact(1), boolean);
pub static CONTAINS_ANY: Operation =
    op("contains_any", Syntax::Infix("CONTAINSANY"), Arity::Exact(1), boolean);
pub static CONTAINS_ALL: Operation =
    op("contains_all", Syntax::Infix("CONTAINSALL"), Arity::Exact(1), boolean);
pub static INSIDE: Operation = op("inside", Syntax::Infix("INSIDE"), Arity::Exact(1), boolean);
pub static NOT_INSIDE: Operation = op("not_inside", Syntax::Infix("NOT INSIDE"), Arity::Exact(1), boolean);
pub static ADD: Operation = op("add", Syntax::Infix("+"), Arity::Exact(1), same);
pub static SUB: Operation = op("sub", Syntax::Infix("-"), Arity::Exact(1), number);
pub static MUL: Operation = op("mul", Syntax::Infix("*"), Arity::Exact(1), number);
pub static DIV: Operation = op("div", Syntax::Infix("/"), Arity::Exact(1), number);

static UNIVERSAL: &[&Operation] = &[
    &EQ, &NE, &EXACT, &GT, &GTE, &LT, &LTE, &AND, &OR, &NOT, &TRUTHY, &CONTAINS, &CONTAINS_ANY,
    &CONTAINS_ALL, &INSIDE, &NOT_INSIDE, &ADD, &SUB, &MUL, &DIV,
];

static STRING: &[Operation] = &[
    op("len", Syntax::Call("string::len"), Arity::Exact(0), number),
    op("lowercase", Syntax::Call("string::lowercase"), Arity::Exact(0), string),
    op("uppercase", Syntax::Call("string::uppercase"), Arity::Exact(0), string),
    op("trim", Syntax::Call("string::trim"), Arity::Exact(0), string),
    op("reverse", Syntax::Call("string::reverse"), Arity::Exact(0), string),
    op("starts_with", Syntax::Call("string::starts_with"), Arity::Exact(1), boolean),
    op("ends_with", Syntax::Call("string::ends_with"), Arity::Exact(1), boolean),
    op("contains", Syntax::Call("string::contains"), Arity::Exact(1), boolean),
    op("join", Syntax::CallSeparated("string::join"), Arity::AtLeast(1), string),
    op("concat", Syntax::Call("string::concat"), Arity::AtLeast(1), string),
    op("slice", Syntax::Call("string::slice"), Arity::Between(1, 2), string),
    op("split", Syntax::Call("string::split"), Arity::Exact(1), strings),
    op("words", Syntax::Call("string::words"), Arity::Exact(0), strings),
    op("replace", Syntax::Call("string::replace"), Arity::Exact(2), string),
    op("repeat", Syntax::Call("string::repeat"), Arity::Exact(1), string),
    op("is_email", Syntax::Call("string::is::email"), Arity::Exact(0), boolean),
];

static NUMBER: &[Operation] = &[
    op("abs", Syntax::Call("math::abs"), Arity::Exact(0), number),
    op("ceil", Syntax::Call("math::ceil"), Arity::Exact(0), number),
    op("floor", Syntax::Call("math::floor"), Arity::Exact(0), number),
    op("round", Syntax::Call("math::round"), Arity::Exact(0), number),
    op("sqrt", Syntax::Call("math::sqrt"), Arity::Exact(0), number),
    op("fixed", Syntax::Call("math::fixed"), Arity::Exact(1), number),
    op("pow", Syntax::Infix("**"), Arity::Exact(1), number),
];

static ARRAY: &[Operation] = &[
    op("len", Syntax::Call("array::len"), Arity::Exact(0), number),
    op("first", Syntax::Call("array::first"), Arity::Exact(0), element_or_none),
    op("last", Syntax::Call("array::last"), Arity::Exact(0), element_or_none),
    op("at", Syntax::Call("array::at"), Arity::Exact(1), element_or_none),
    op("min", Syntax::Call("array::min"), Arity::Exact(0), element_or_none),
    op("max", Syntax::Call("array::max"), Arity::Exact(0), element_or_none),
    op("distinct", Syntax::Call("array::distinct"), Arity::Exact(0), list_of_elements),
    op("reverse", Syntax::Call("array::reverse"), Arity::Exact(0), list_of_elements),
    op("sort", Syntax::Call("array::sort"), Arity::Between(0, 1), list_of_elements),
    op("flatten", Syntax::Call("array::flatten"), Arity::Exact(0), flattened),
    op("append", Syntax::Call("array::append"), Arity::Exact(1), list_of_elements),
    op("concat", Syntax::Call("array::concat"), Arity::AtLeast(1), list_of_elements),
    op("union", Syntax::Call("array::union"), Arity::Exact(1), list_of_elements),
    op("join", Syntax::Call("array::join"), Arity::Exact(1), string),
];

static DATE: &[Operation] = &[
    op("year", Syntax::Call("time::year"), Arity::Exact(0), number),
    op("month", Syntax::Call("time::month"), Arity::Exact(0), number),
    op("day", Syntax::Call("time::day"), Arity::Exact(0), number),
    op("hour", Syntax::Call("time::hour"), Arity::Exact(0), number),
    op("minute", Syntax::Call("time::minute"), Arity::Exact(0), number),
    op("second", Syntax::Call("time::second"), Arity::Exact(0), number),
    op("unix", Syntax::Call("time::unix"), Arity::Exact(0), number),
    op("format", Syntax::Call("time::format"), Arity::Exact(1), string),
    op("floor", Syntax::Call("time::floor"), Arity::Exact(1), date),
    op("round", Syntax::Call("time::round"), Arity::Exact(1), date),
];

static RECORD: &[Operation] = &[
    op("table", Syntax::Call("record::tb"), Arity::Exact(0), string),
    op("key", Syntax::Call("record::id"), Arity::Exact(0), record_key),
    op("exists", Syntax::Call("record::exists"), Arity::Exact(0), boolean),
];

fn table(family: Family) -> &'static [Operation] {
    match family {
        Family::String => STRING,
        Family::Number => NUMBER,
        Family::Array => ARRAY,
        Family::Date => DATE,
        Family::Record => RECORD,
    }
}

/// The family whose table applies to values of `ty`, ignoring optionality.
pub fn family(ty: &Type) -> Option<Family> {
    match ty.present() {
        Type::String | Type::Literal(Literal::String(_)) => Some(Family::String),
        Type::Number | Type::Literal(Literal::Number(_)) => Some(Family::Number),
        Type::Array(_) => Some(Family::Array),
        Type::Date => Some(Family::Date),
        Type::Record(_) => Some(Family::Record),
        Type::Union(alts) => {
            let mut families = alts.iter().filter(|t| !matches!(t, Type::Null)).map(family);
            let first = families.next()??;
            families.all(|f| f == Some(first)).then_some(first)
        }
        _ => None,
    }
}

pub fn lookup(ty: &Type, name: &str) -> Option<&'static Operation> {
    family(ty)
        .and_then(|f| table(f).iter().find(|o| o.name == name))
        .or_else(|| UNIVERSAL.iter().copied().find(|o| o.name == name))
}

/// Method names available on `ty`, family methods first.
pub fn names(ty: &Type) -> Vec<&'static str> {
    let mut out: Vec<&'static str> = family(ty)
        .map(|f| table(f).iter().map(|o| o.name).collect())
        .unwrap_or_default();
    for o in UNIVERSAL {
        if !out.contains(&o.name) {
            out.push(o.name);
        }
    }
    out
}

/// Build the node for `receiver.op(args)`. Arity is the caller's responsibility.
pub(crate) fn apply(op: &'static Operation, receiver: &Node, args: Vec<Node>) -> Node {
    let ty = (op.output)(receiver.ty());
    let ctx = receiver.context().clone();
    let recv = receiver.clone();
    match op.syntax {
        Syntax::Infix(token) => Node::compound(ctx, ty, move |d| {
            let lhs = recv.render_operand(d);
            let rhs = args.iter().map(|a| a.render_operand(d)).collect::<Vec<_>>();
            format!("{lhs} {token} {}", rhs.join(&format!(" {token} ")))
        }),
        Syntax::Prefix(token) => {
            Node::new(ctx, ty, move |d| format!("{token}{}", recv.render_operand(d)))
        }
        Syntax::Call(path) => Node::new(ctx, ty, move |d| {
            let mut parts = vec![recv.render(d)];
            parts.extend(args.iter().map(|a| a.render(d)));
            format!("{path}({})", parts.join(", "))
        }),
        Syntax::CallSeparated(path) => Node::new(ctx, ty, move |d| {
            let mut parts = Vec::with_capacity(args.len() + 1);
            let mut rest = args.iter();
            if let Some(separator) = rest.next() {
                parts.push(separator.render(d));
            }
            parts.push(recv.render(d));
            parts.extend(rest.map(|a| a.render(d)));
            format!("{path}({})", parts.join(", "))
        }),
    }
}

//! Type descriptors.
//!
//! A [`Type`] is an immutable description of a value shape. It is used three ways:
//! - `validate` / `parse` check runtime values (user payloads and transport rows),
//! - `get` projects into object fields and array elements without touching a value,
//! - the expression façade picks its method table from the descriptor's [`Tag`].
//!
//! Values are `serde_json::Value`s. A missing object field is the absent value
//! (`NONE`), which is distinct from JSON `null`.
pub mod parse;
pub mod scalar;

use std::fmt;

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::display::ident;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "of", rename_all = "snake_case")]
pub enum Type {
    String,
    Number,
    Bool,
    Null,
    /// The absent value.
    None,
    Never,
    /// RFC 3339 datetime string.
    Date,
    Uuid,
    Literal(Literal),
    Option(Box<Type>),
    /// Record reference, optionally restricted to one table.
    Record(Option<String>),
    /// Named fields in declaration order.
    Object(IndexMap<String, Type>),
    Array(ArrayShape),
    Union(Vec<Type>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Number(OrderedFloat<f64>),
    String(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArrayShape {
    /// Fixed arity, one descriptor per position.
    Tuple(Vec<Type>),
    /// Homogeneous, any length.
    List(Box<Type>),
}

/// Descriptor variant without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    String,
    Number,
    Bool,
    Null,
    None,
    Never,
    Date,
    Uuid,
    Literal,
    Option,
    Record,
    Object,
    Array,
    Union,
}

/// A projection key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Field(String),
    /// Array index that may be out of range.
    Index(usize),
    /// Array index the caller asserts is in range; a homogeneous array yields
    /// its element type instead of `element | NONE`.
    Present(usize),
}

/// Result of [`Type::get`]: the child descriptor and the rendered path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub ty: Type,
    pub segment: String,
}

// ————————————————————————————————————————————————————————————————————————————
// CONSTRUCTORS
// ————————————————————————————————————————————————————————————————————————————

impl Type {
    pub fn option(inner: Type) -> Self {
        Type::Option(Box::new(inner))
    }

    pub fn array(item: Type) -> Self {
        Type::Array(ArrayShape::List(Box::new(item)))
    }

    pub fn tuple(items: impl IntoIterator<Item = Type>) -> Self {
        Type::Array(ArrayShape::Tuple(items.into_iter().collect()))
    }

    pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, Type)>) -> Self {
        Type::Object(fields.into_iter().map(|(k, t)| (k.into(), t)).collect())
    }

    pub fn record(table: impl Into<String>) -> Self {
        Type::Record(Some(table.into()))
    }

    pub fn any_record() -> Self {
        Type::Record(None)
    }

    pub fn literal(value: impl Into<Literal>) -> Self {
        Type::Literal(value.into())
    }

    /// Flattens nested unions and drops duplicate alternatives.
    /// An empty union is `Never`; a single alternative is returned as is.
    pub fn union(alternatives: impl IntoIterator<Item = Type>) -> Self {
        let mut out: Vec<Type> = Vec::new();
        for alt in alternatives {
            let parts = match alt {
                Type::Union(xs) => xs,
                Type::Never => continue,
                other => vec![other],
            };
            for p in parts {
                if !out.contains(&p) {
                    out.push(p);
                }
            }
        }
        match out.len() {
            0 => Type::Never,
            1 => out.remove(0),
            _ => Type::Union(out),
        }
    }

    /// Widen to also accept the absent value.
    pub fn optional(self) -> Self {
        if self.accepts_absent() {
            self
        } else {
            Type::option(self)
        }
    }

    /// Descriptor of a lifted raw value.
    pub fn of_value(value: &Value) -> Self {
        match value {
            Value::Null => Type::Null,
            Value::Bool(_) => Type::Bool,
            Value::Number(_) => Type::Number,
            Value::String(_) => Type::String,
            Value::Array(xs) => Type::array(Type::union(xs.iter().map(Type::of_value))),
            Value::Object(m) => Type::object(m.iter().map(|(k, v)| (k.clone(), Type::of_value(v)))),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INSPECTION
// ————————————————————————————————————————————————————————————————————————————

impl Type {
    pub fn tag(&self) -> Tag {
        match self {
            Type::String => Tag::String,
            Type::Number => Tag::Number,
            Type::Bool => Tag::Bool,
            Type::Null => Tag::Null,
            Type::None => Tag::None,
            Type::Never => Tag::Never,
            Type::Date => Tag::Date,
            Type::Uuid => Tag::Uuid,
            Type::Literal(_) => Tag::Literal,
            Type::Option(_) => Tag::Option,
            Type::Record(_) => Tag::Record,
            Type::Object(_) => Tag::Object,
            Type::Array(_) => Tag::Array,
            Type::Union(_) => Tag::Union,
        }
    }

    pub fn accepts_absent(&self) -> bool {
        match self {
            Type::None | Type::Option(_) => true,
            Type::Union(alts) => alts.iter().any(Type::accepts_absent),
            _ => false,
        }
    }

    /// Strip `Option` and `None` alternatives.
    pub fn present(&self) -> Type {
        match self {
            Type::Option(inner) => inner.present(),
            Type::Union(alts) => Type::union(
                alts.iter().filter(|t| !matches!(t, Type::None)).map(Type::present),
            ),
            other => other.clone(),
        }
    }

    /// The table a record-typed descriptor points at, looking through
    /// options, lists and single-table unions.
    pub fn record_table(&self) -> Option<&str> {
        match self {
            Type::Record(Some(t)) => Some(t),
            Type::Option(inner) => inner.record_table(),
            Type::Array(ArrayShape::List(item)) => item.record_table(),
            Type::Union(alts) => {
                let mut tables = alts
                    .iter()
                    .filter(|t| !matches!(t, Type::None | Type::Null))
                    .map(Type::record_table);
                let first = tables.next()??;
                tables.all(|t| t == Some(first)).then_some(first)
            }
            _ => None,
        }
    }

    /// Human readable shape, used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Type::String => "string".into(),
            Type::Number => "number".into(),
            Type::Bool => "bool".into(),
            Type::Null => "null".into(),
            Type::None => "none".into(),
            Type::Never => "never".into(),
            Type::Date => "datetime".into(),
            Type::Uuid => "uuid".into(),
            Type::Literal(l) => l.to_string(),
            Type::Option(inner) => format!("option<{}>", inner.describe()),
            Type::Record(None) => "record".into(),
            Type::Record(Some(t)) => format!("record<{t}>"),
            Type::Object(fields) => {
                let inner = fields
                    .iter()
                    .map(|(k, t)| format!("{k}: {}", t.describe()))
                    .collect::<Vec<_>>();
                format!("{{ {} }}", inner.join(", "))
            }
            Type::Array(ArrayShape::List(item)) => format!("array<{}>", item.describe()),
            Type::Array(ArrayShape::Tuple(items)) => {
                format!("[{}]", items.iter().map(Type::describe).collect::<Vec<_>>().join(", "))
            }
            Type::Union(alts) => alts.iter().map(Type::describe).collect::<Vec<_>>().join(" | "),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// VALIDATION & PROJECTION
// ————————————————————————————————————————————————————————————————————————————

impl Type {
    /// Structural check of a present value. Never fails, never allocates errors.
    pub fn validate(&self, value: &Value) -> bool {
        self.check(Some(value))
    }

    /// Structural check of a possibly absent value (e.g. an object field).
    pub fn check(&self, value: Option<&Value>) -> bool {
        let v = match (self, value) {
            (Type::None, v) => return v.is_none(),
            (Type::Option(_), None) => return true,
            (Type::Option(inner), v) => return inner.check(v),
            (Type::Union(alts), v) => return alts.iter().any(|t| t.check(v)),
            (_, None) => return false,
            (_, Some(v)) => v,
        };
        match self {
            Type::String => v.is_string(),
            Type::Number => v.is_number(),
            Type::Bool => v.is_boolean(),
            Type::Null => v.is_null(),
            Type::Never => false,
            Type::Date => v.as_str().is_some_and(scalar::is_datetime),
            Type::Uuid => v.as_str().is_some_and(scalar::is_uuid),
            Type::Literal(l) => l.matches(v),
            Type::Record(table) => scalar::RecordRef::from_value(v)
                .is_some_and(|r| table.as_ref().is_none_or(|t| r.table == *t)),
            Type::Object(fields) => v
                .as_object()
                .is_some_and(|m| fields.iter().all(|(k, t)| t.check(m.get(k)))),
            Type::Array(ArrayShape::List(item)) => {
                v.as_array().is_some_and(|xs| xs.iter().all(|x| item.validate(x)))
            }
            Type::Array(ArrayShape::Tuple(items)) => v.as_array().is_some_and(|xs| {
                xs.len() == items.len() && items.iter().zip(xs).all(|(t, x)| t.validate(x))
            }),
            Type::None | Type::Option(_) | Type::Union(_) => false,
        }
    }

    /// Project into a field or element. Unknown keys yield [`Type::None`].
    pub fn get(&self, key: &Key) -> Projection {
        Projection { ty: self.child(key), segment: key.segment() }
    }

    fn child(&self, key: &Key) -> Type {
        match (self, key) {
            (Type::Object(fields), Key::Field(name)) => {
                fields.get(name).cloned().unwrap_or(Type::None)
            }
            (Type::Array(ArrayShape::Tuple(items)), Key::Index(i) | Key::Present(i)) => {
                items.get(*i).cloned().unwrap_or(Type::None)
            }
            (Type::Array(ArrayShape::List(item)), Key::Index(_)) => {
                Type::union([(**item).clone(), Type::None])
            }
            (Type::Array(ArrayShape::List(item)), Key::Present(_)) => (**item).clone(),
            (Type::Array(ArrayShape::List(item)), Key::Field(_)) => Type::array(item.child(key)),
            (Type::Option(inner), key) => inner.child(key).optional(),
            (Type::Union(alts), key) => Type::union(alts.iter().map(|t| t.child(key))),
            _ => Type::None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// SUPPORTING TYPES
// ————————————————————————————————————————————————————————————————————————————

impl Literal {
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Literal::Bool(a), Value::Bool(b)) => a == b,
            (Literal::Number(a), Value::Number(b)) => b.as_f64().is_some_and(|b| a.0 == b),
            (Literal::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Number(n) => Value::from(n.0),
            Literal::String(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::String(s)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

impl From<f64> for Literal {
    fn from(n: f64) -> Self {
        Literal::Number(OrderedFloat(n))
    }
}

impl From<i64> for Literal {
    fn from(n: i64) -> Self {
        Literal::Number(OrderedFloat(n as f64))
    }
}

impl Tag {
    pub fn name(self) -> &'static str {
        match self {
            Tag::String => "string",
            Tag::Number => "number",
            Tag::Bool => "bool",
            Tag::Null => "null",
            Tag::None => "none",
            Tag::Never => "never",
            Tag::Date => "datetime",
            Tag::Uuid => "uuid",
            Tag::Literal => "literal",
            Tag::Option => "option",
            Tag::Record => "record",
            Tag::Object => "object",
            Tag::Array => "array",
            Tag::Union => "union",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Key {
    /// Rendered path segment: `.field` or `[n]`.
    pub fn segment(&self) -> String {
        match self {
            Key::Field(name) => format!(".{}", ident(name)),
            Key::Index(i) | Key::Present(i) => format!("[{i}]"),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segment())
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Field(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Field(name)
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Index(i)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn person() -> Type {
        Type::object([
            ("name", Type::object([("first", Type::String), ("last", Type::String)])),
            ("age", Type::Number),
            ("nickname", Type::option(Type::String)),
            ("tags", Type::array(Type::String)),
            ("location", Type::tuple([Type::Number, Type::Number])),
        ])
    }

    #[test_case(Type::String, json!("x"), true)]
    #[test_case(Type::String, json!(1), false)]
    #[test_case(Type::Number, json!(1.5), true)]
    #[test_case(Type::Bool, json!(false), true)]
    #[test_case(Type::Null, json!(null), true)]
    #[test_case(Type::None, json!(null), false)]
    #[test_case(Type::Never, json!(null), false)]
    #[test_case(Type::Date, json!("2024-02-29T10:00:00Z"), true)]
    #[test_case(Type::Date, json!("yesterday"), false)]
    #[test_case(Type::Uuid, json!("67e55044-10b1-426f-9247-bb680e5fe0c8"), true)]
    #[test_case(Type::Uuid, json!("67e55044"), false)]
    #[test_case(Type::literal("on"), json!("on"), true)]
    #[test_case(Type::literal("on"), json!("off"), false)]
    #[test_case(Type::literal(3i64), json!(3), true)]
    #[test_case(Type::option(Type::String), json!("x"), true)]
    #[test_case(Type::option(Type::String), json!(null), false)]
    #[test_case(Type::any_record(), json!("post:abc"), true)]
    #[test_case(Type::record("user"), json!("user:tobie"), true)]
    #[test_case(Type::record("user"), json!("post:abc"), false)]
    #[test_case(Type::record("user"), json!({"tb": "user", "id": 7}), true)]
    #[test_case(Type::union([Type::String, Type::Number]), json!(2), true)]
    #[test_case(Type::union([Type::String, Type::Number]), json!(true), false)]
    fn validates_scalars(ty: Type, value: Value, expected: bool) {
        assert_eq!(ty.validate(&value), expected);
    }

    #[test]
    fn object_validation_ignores_order_and_extra_keys() {
        let ok = json!({
            "tags": [], "age": 3, "name": {"last": "B", "first": "A"},
            "location": [1, 2], "extra": true
        });
        assert!(person().validate(&ok));

        let missing_age = json!({"name": {"first": "A", "last": "B"}, "tags": [], "location": [1, 2]});
        assert!(!person().validate(&missing_age));
    }

    #[test]
    fn option_accepts_absent_field() {
        let t = Type::object([("nickname", Type::option(Type::String))]);
        assert!(t.validate(&json!({})));
        assert!(t.validate(&json!({"nickname": "x"})));
        assert!(!t.validate(&json!({"nickname": 1})));
    }

    #[test_case(json!([1, 2]), true)]
    #[test_case(json!([1]), false)]
    #[test_case(json!([1, 2, 3]), false)]
    #[test_case(json!([1, "2"]), false)]
    fn tuples_enforce_exact_arity(value: Value, expected: bool) {
        let t = Type::tuple([Type::Number, Type::Number]);
        assert_eq!(t.validate(&value), expected);
    }

    #[test]
    fn get_projects_declared_fields_and_unknown_keys_to_none() {
        let p = person();
        let name = p.get(&"name".into());
        assert_eq!(name.segment, ".name");
        assert_eq!(name.ty, Type::object([("first", Type::String), ("last", Type::String)]));
        assert_eq!(p.get(&"age".into()).ty, Type::Number);
        assert_eq!(p.get(&"nope".into()).ty, Type::None);
        assert_eq!(Type::String.get(&"x".into()).ty, Type::None);
    }

    #[test]
    fn get_on_arrays() {
        let list = Type::array(Type::String);
        assert_eq!(list.get(&Key::Index(4)).ty, Type::union([Type::String, Type::None]));
        assert_eq!(list.get(&Key::Present(0)).ty, Type::String);
        assert_eq!(list.get(&Key::Index(4)).segment, "[4]");

        let tuple = Type::tuple([Type::String, Type::Number]);
        assert_eq!(tuple.get(&Key::Index(1)).ty, Type::Number);
        assert_eq!(tuple.get(&Key::Index(2)).ty, Type::None);
    }

    #[test]
    fn fields_project_through_lists() {
        let list = Type::array(Type::object([("name", Type::String)]));
        assert_eq!(list.get(&"name".into()).ty, Type::array(Type::String));
        assert_eq!(list.get(&"name".into()).segment, ".name");
        assert_eq!(Type::tuple([Type::String]).get(&"name".into()).ty, Type::None);
    }

    #[test]
    fn get_through_option_stays_optional() {
        let t = Type::option(Type::object([("a", Type::Number)]));
        assert_eq!(t.get(&"a".into()).ty, Type::option(Type::Number));
    }

    #[test]
    fn odd_field_names_are_escaped_in_segments() {
        assert_eq!(Key::from("first-name").segment(), ".`first-name`");
    }

    #[test]
    fn union_flattens_and_dedups() {
        let u = Type::union([
            Type::String,
            Type::union([Type::Number, Type::String]),
            Type::Never,
        ]);
        assert_eq!(u, Type::Union(vec![Type::String, Type::Number]));
        assert_eq!(Type::union([Type::Bool]), Type::Bool);
        assert_eq!(Type::union(Vec::new()), Type::Never);
    }

    #[test]
    fn record_table_looks_through_wrappers() {
        assert_eq!(Type::option(Type::record("user")).record_table(), Some("user"));
        assert_eq!(Type::array(Type::record("post")).record_table(), Some("post"));
        assert_eq!(Type::union([Type::record("a"), Type::record("b")]).record_table(), None);
        assert_eq!(Type::any_record().record_table(), None);
    }

    #[test]
    fn descriptors_deserialize_from_tagged_json() {
        let t: Type = serde_json::from_value(json!({
            "kind": "object",
            "of": {
                "name": {"kind": "string"},
                "author": {"kind": "record", "of": "user"},
                "tags": {"kind": "array", "of": {"kind": "string"}},
                "pos": {"kind": "array", "of": [{"kind": "number"}, {"kind": "number"}]},
                "state": {"kind": "union", "of": [
                    {"kind": "literal", "of": "draft"},
                    {"kind": "literal", "of": "published"}
                ]},
                "note": {"kind": "option", "of": {"kind": "string"}}
            }
        }))
        .unwrap();
        assert_eq!(
            t,
            Type::object([
                ("name", Type::String),
                ("author", Type::record("user")),
                ("tags", Type::array(Type::String)),
                ("pos", Type::tuple([Type::Number, Type::Number])),
                ("state", Type::union([Type::literal("draft"), Type::literal("published")])),
                ("note", Type::option(Type::String)),
            ])
        );
    }
}

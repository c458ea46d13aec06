//! Value parsing against a descriptor.
//!
//! `parse` accepts exactly what `validate` accepts, but on failure it
//! descends to the most specific failing sub-value and reports its path.
//! Object fields are emitted in declaration order; undeclared keys are dropped.
use serde_json::{Map, Value};

use super::{ArrayShape, Type};
use crate::error::{Expected, TypeError};

impl Type {
    pub fn parse(&self, value: &Value) -> Result<Value, TypeError> {
        let mut path = String::new();
        self.parse_value(value, &mut path)
    }

    /// Parse a possibly absent value; `Ok(None)` means "absent and allowed".
    pub fn parse_slot(&self, value: Option<&Value>) -> Result<Option<Value>, TypeError> {
        let mut path = String::new();
        self.parse_at(value, &mut path)
    }

    pub fn expected(&self) -> Expected {
        match self {
            Type::Union(alts) => Expected::AnyOf(alts.iter().map(Type::describe).collect()),
            Type::Array(ArrayShape::Tuple(items)) => {
                Expected::Tuple(items.iter().map(Type::describe).collect())
            }
            other => Expected::One(other.describe()),
        }
    }

    fn mismatch(&self, value: Option<&Value>, path: &str) -> TypeError {
        TypeError {
            tag: self.tag(),
            expected: self.expected(),
            value: value.cloned(),
            path: path.to_string(),
        }
    }

    fn parse_at(&self, value: Option<&Value>, path: &mut String) -> Result<Option<Value>, TypeError> {
        match value {
            None if self.accepts_absent() => Ok(None),
            None => Err(self.mismatch(None, path)),
            Some(v) => self.parse_value(v, path).map(Some),
        }
    }

    fn parse_value(&self, value: &Value, path: &mut String) -> Result<Value, TypeError> {
        match self {
            Type::Option(inner) => inner.parse_value(value, path),
            Type::Union(alts) => {
                // First alternative that parses wins; the error is reported at the union.
                for alt in alts {
                    let mut scratch = path.clone();
                    if let Ok(v) = alt.parse_value(value, &mut scratch) {
                        return Ok(v);
                    }
                }
                Err(self.mismatch(Some(value), path))
            }
            Type::Object(fields) => {
                let Some(map) = value.as_object() else {
                    return Err(self.mismatch(Some(value), path));
                };
                let mut out = Map::new();
                for (name, ty) in fields {
                    let mark = path.len();
                    path.push('.');
                    path.push_str(name);
                    let parsed = ty.parse_at(map.get(name), path)?;
                    path.truncate(mark);
                    if let Some(v) = parsed {
                        out.insert(name.clone(), v);
                    }
                }
                Ok(Value::Object(out))
            }
            Type::Array(shape) => {
                let Some(xs) = value.as_array() else {
                    return Err(self.mismatch(Some(value), path));
                };
                if let ArrayShape::Tuple(items) = shape {
                    if items.len() != xs.len() {
                        return Err(self.mismatch(Some(value), path));
                    }
                }
                let mut out = Vec::with_capacity(xs.len());
                for (i, x) in xs.iter().enumerate() {
                    let ty = match shape {
                        ArrayShape::List(item) => item.as_ref(),
                        ArrayShape::Tuple(items) => &items[i],
                    };
                    let mark = path.len();
                    path.push_str(&format!("[{i}]"));
                    let parsed = ty.parse_value(x, path)?;
                    path.truncate(mark);
                    out.push(parsed);
                }
                Ok(Value::Array(out))
            }
            scalar => {
                if scalar.validate(value) {
                    Ok(value.clone())
                } else {
                    Err(self.mismatch(Some(value), path))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;
    use crate::types::Tag;

    fn post() -> Type {
        Type::object([
            ("title", Type::String),
            ("author", Type::record("user")),
            ("tags", Type::array(Type::String)),
            ("draft", Type::option(Type::Bool)),
        ])
    }

    #[test]
    fn parse_reports_the_deepest_failing_value() {
        let err = post()
            .parse(&json!({"title": "a", "author": "user:1", "tags": ["x", 2]}))
            .unwrap_err();
        assert_eq!(err.path, ".tags[1]");
        assert_eq!(err.tag, Tag::String);
        assert_eq!(err.value, Some(json!(2)));
    }

    #[test]
    fn parse_reports_missing_fields_as_absent() {
        let err = post().parse(&json!({"author": "user:1", "tags": []})).unwrap_err();
        assert_eq!(err.path, ".title");
        assert_eq!(err.value, None);
    }

    #[test]
    fn parse_drops_undeclared_keys_and_keeps_declaration_order() {
        let out = post()
            .parse(&json!({"tags": [], "extra": 1, "author": "user:1", "title": "t"}))
            .unwrap();
        let keys: Vec<_> = out.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["title", "author", "tags"]);
    }

    #[test]
    fn tuple_length_mismatch_fails_at_the_array() {
        let t = Type::tuple([Type::Number, Type::String]);
        let err = t.parse(&json!([1])).unwrap_err();
        assert_eq!(err.path, "");
        assert_eq!(err.expected, Expected::Tuple(vec!["number".into(), "string".into()]));
    }

    #[test]
    fn union_errors_list_alternatives() {
        let t = Type::union([Type::String, Type::Number, Type::Bool]);
        let err = t.parse(&json!(null)).unwrap_err();
        assert_eq!(err.expected.to_string(), "string, number or bool");
    }

    #[test]
    fn parse_slot_allows_absent_for_optional() {
        assert_eq!(Type::option(Type::String).parse_slot(None).unwrap(), None);
        assert!(Type::String.parse_slot(None).is_err());
    }

    #[test_case(Type::String, json!("a"))]
    #[test_case(Type::String, json!(1))]
    #[test_case(Type::tuple([Type::Number]), json!([1, 2]))]
    #[test_case(Type::array(Type::option(Type::Number)), json!([1, null]))]
    #[test_case(Type::union([Type::Null, Type::record("user")]), json!("user:x"))]
    #[test_case(Type::object([("a", Type::Date)]), json!({"a": "2020-01-01T00:00:00+02:00"}))]
    #[test_case(Type::object([("a", Type::Date)]), json!({"a": "2020-01-01"}))]
    #[test_case(Type::option(Type::Never), json!(1))]
    fn validate_agrees_with_parse(ty: Type, value: Value) {
        assert_eq!(ty.validate(&value), ty.parse(&value).is_ok());
    }
}

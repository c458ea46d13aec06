use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static RECORD_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*):(.+)$").expect("record id pattern is valid")
});

/// A record reference: `table:id` as a string, or `{ "tb": .., "id": .. }`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordRef {
    pub table: String,
    pub id: Value,
}

impl RecordRef {
    pub fn new(table: impl Into<String>, id: impl Into<Value>) -> Self {
        Self { table: table.into(), id: id.into() }
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Self::parse(s),
            Value::Object(m) => {
                let table = m.get("tb")?.as_str()?;
                let id = m.get("id")?;
                Some(Self::new(table, id.clone()))
            }
            _ => None,
        }
    }

    /// `table:id`; an all-digit id is numeric (`user:1` is not `user:⟨1⟩`).
    pub fn parse(s: &str) -> Option<Self> {
        let caps = RECORD_ID.captures(s)?;
        let id = &caps[2];
        let id = match id.parse::<u64>() {
            Ok(n) if id.bytes().all(|b| b.is_ascii_digit()) => Value::from(n),
            _ => Value::String(id.to_string()),
        };
        Some(Self::new(&caps[1], id))
    }
}

pub fn is_datetime(s: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(s).is_ok()
}

pub fn is_uuid(s: &str) -> bool {
    // Hyphenated form only; bare 32-hex strings are treated as plain strings.
    s.len() == 36 && uuid::Uuid::parse_str(s).is_ok()
}

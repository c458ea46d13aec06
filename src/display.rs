//! Display context: the per-compilation variable store and scope marker.
//!
//! Every raw value that reaches the query text goes through [`DisplayContext::bind`]
//! and comes out as a `$_v<N>` placeholder. Names (tables, fields) are never
//! bound; they go through [`ident`] instead.
use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Bound variables, in binding order. Keys carry no `$`.
pub type Variables = IndexMap<String, Value>;

/// Identifies one builder's record; see [`DisplayContext::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ScopeId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Default)]
pub struct DisplayContext {
    vars: Variables,
    counter: usize,
    scope: Option<ScopeId>,
    parent: Option<ScopeId>,
}

impl DisplayContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a value and return its placeholder.
    pub fn bind(&mut self, value: Value) -> String {
        let name = format!("_v{}", self.counter);
        self.counter += 1;
        tracing::trace!(%name, %value, "bind");
        self.vars.insert(name.clone(), value);
        format!("${name}")
    }

    pub fn scope(&self) -> Option<ScopeId> {
        self.scope
    }

    pub fn parent_scope(&self) -> Option<ScopeId> {
        self.parent
    }

    /// Run `f` with `scope` as the current scope; the previous current scope
    /// becomes the parent. Variables stay shared.
    pub fn scoped<R>(&mut self, scope: ScopeId, f: impl FnOnce(&mut Self) -> R) -> R {
        let saved = (self.scope, self.parent);
        self.parent = self.scope;
        self.scope = Some(scope);
        let out = f(self);
        (self.scope, self.parent) = saved;
        out
    }

    /// How the record owned by `scope` is referred to from here.
    pub fn record(&self, scope: ScopeId) -> &'static str {
        if self.scope == Some(scope) { THIS } else { PARENT }
    }

    pub fn variables(&self) -> &Variables {
        &self.vars
    }

    pub fn into_variables(self) -> Variables {
        self.vars
    }
}

pub const THIS: &str = "$this";
pub const PARENT: &str = "$parent";

static BARE_IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

/// Table or field name as it appears in query text.
pub fn ident(name: &str) -> Cow<'_, str> {
    if BARE_IDENT.is_match(name) {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`")))
    }
}

/// Dotted field path (`a.b.c`), each part escaped on its own.
pub fn idiom(path: &str) -> String {
    path.split('.').map(ident).collect::<Vec<_>>().join(".")
}

/// Object-literal key.
pub fn key(name: &str) -> String {
    serde_json::Value::from(name).to_string()
}

/// Append a path segment; own-scope field paths drop the `$this.` prefix.
pub fn join_path(base: &str, segment: &str) -> String {
    match segment.strip_prefix('.') {
        Some(field) if base == THIS => field.to_string(),
        _ => format!("{base}{segment}"),
    }
}

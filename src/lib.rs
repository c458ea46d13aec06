//! Type-checked construction of SurrealQL statements.
//!
//! Tables and edges are declared up front as a [`Database`]. Statement
//! builders hang off it; every field access, operator and payload is checked
//! against the declarations while the statement is being built, and the
//! compiled text only ever carries `$_v<N>` placeholders for raw values.
pub mod display;
pub mod error;
pub mod expr;
pub mod node;
pub mod path_de;
pub mod query;
pub mod schema;
pub mod types;

pub use display::Variables;
pub use error::{DecodeError, Error, Result, TypeError, UsageError};
pub use expr::{Expr, Operand, Shape};
pub use query::{Compiled, Return, Session, Statement, Target, Transport, compile_batch};
pub use schema::{Database, Declaration, SchemaGraph};
pub use types::{Key, Type};

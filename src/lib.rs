//! # runtara-polystore
//!
//! A portable data model and condition-tree compiler for heterogeneous stores.
//!
//! Entities, values and queries are described once. A `Compiler` parameterized
//! by a backend dialect lowers them into that backend's native statement:
//! parameterized SQL, CQL with bound terms, MongoDB-style filter documents,
//! Elasticsearch bool queries or AQL with named bind variables.
//!
//! ## Features
//!
//! - **One Condition Tree**: `EQUALS`, `GT`, `GTE`, `LT`, `LTE`, `IN`, `LIKE`, `BETWEEN` under `AND`/`OR`/`NOT`
//! - **Parameter Safety**: Values are always bound, never spliced into statement text
//! - **Identifier Escaping**: Each backend quotes names by its own rules
//! - **Fail-Fast Capabilities**: Constructs a backend cannot express are rejected before lowering
//! - **Point Lookups**: ID predicates become key fetches on backends that support them
//! - **Cursor Pagination**: Continuation tokens with a caller-owned `Pager`
//!
//! ## Quick Start
//!
//! ```rust
//! use runtara_polystore::cql::{CqlDialect, CqlValue};
//! use runtara_polystore::{Compiler, Condition, Query};
//!
//! let query = Query::builder("person")
//!     .condition(Condition::and(vec![
//!         Condition::eq("name", "Cassandra"),
//!         Condition::lte("age", 10),
//!     ]))
//!     .build()
//!     .unwrap();
//!
//! let statement = Compiler::new(CqlDialect::new("demo")).compile(&query).unwrap();
//!
//! assert_eq!(statement.filter.as_deref(), Some("name = ? AND age <= ?"));
//! assert_eq!(
//!     statement.parameter_values(),
//!     vec![&CqlValue::Text("Cassandra".into()), &CqlValue::BigInt(10)]
//! );
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use runtara_polystore::CompilerConfig;
//!
//! let config = CompilerConfig::builder()
//!     .id_field("id")             // Element carrying entity identity (default: "_id")
//!     .point_lookup(true)         // Divert ID predicates to key fetches (default)
//!     .max_result_window(5_000)   // Row cap for unbounded search queries
//!     .build();
//! ```
//!
//! ## Execution
//!
//! Drivers live behind [`ExecutionAdapter`]. The crate ships one adapter,
//! [`sql::PgExecutor`], for PostgreSQL over `sqlx`.

pub mod aql;
pub mod compiler;
pub mod condition;
pub mod config;
pub mod cql;
pub mod document;
pub mod entity;
pub mod error;
pub mod executor;
pub mod json;
pub mod pagination;
pub mod query;
pub mod schema;
pub mod search;
pub mod sql;
pub mod value;

// Re-export main types for convenience
pub use compiler::{
    Binder, Capabilities, Compiler, Connective, Dialect, Lowered, NativeStatement, Negation,
    Operand, Paging, ParamStyle, Parameter, Predicate, Scope,
};
pub use condition::{Condition, ConditionKind, Operator};
pub use config::{CompilerConfig, CompilerConfigBuilder};
pub use entity::{Element, Entity};
pub use error::{QueryError, Result};
pub use executor::{ExecutionAdapter, Page};
pub use pagination::{PageState, Pager};
pub use query::{CursorToken, Direction, Query, QueryBuilder, Sort};
pub use schema::{
    FieldType, SchemaCache, SchemaLookup, StaticSchema, UserType, declared_field, resolve_field,
    resolve_user_type,
};
pub use value::{UserValue, Value};

// Re-export dialects
pub use aql::AqlDialect;
pub use cql::CqlDialect;
pub use document::DocumentDialect;
pub use search::SearchDialect;
pub use sql::{PgExecutor, SqlDialect};

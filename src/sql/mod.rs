//! PostgreSQL backend
//!
//! SQL lowering, identifier sanitization and the reference execution adapter.

pub mod dialect;
pub mod executor;
pub mod sanitize;

pub use dialect::SqlDialect;
pub use executor::PgExecutor;
pub use sanitize::{POSTGRES_RESERVED_WORDS, identifier, qualified, quote_identifier};

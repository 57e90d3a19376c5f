//! Cassandra-style (CQL) backend

pub mod dialect;
pub mod value;

pub use dialect::{CQL_RESERVED_WORDS, CqlDialect, identifier};
pub use value::{CqlValue, from_cql, to_cql};

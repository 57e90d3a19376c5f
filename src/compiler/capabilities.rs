//! Operator-support matrix
//!
//! Each dialect declares a static `Capabilities` value. The whole condition
//! tree is checked against it before any lowering happens, so an unsupported
//! construct never yields a partially compiled statement.

use crate::condition::{Condition, Operator};
use crate::error::{QueryError, Result};

/// Which conditions a backend can negate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Negation {
    Unsupported,
    /// NOT may only wrap a single predicate
    Predicates,
    Any,
}

/// How a backend continues a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paging {
    /// Native LIMIT/OFFSET; cursors are rejected
    Offset,
    /// Opaque backend paging state; `skip` is rejected
    Cursor,
}

/// Static description of what a dialect can lower
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub operators: &'static [Operator],
    pub and: bool,
    pub or: bool,
    pub negation: Negation,
    /// ID predicates may be diverted into key lookups
    pub point_lookup: bool,
    pub paging: Paging,
}

impl Capabilities {
    pub fn supports(&self, operator: Operator) -> bool {
        self.operators.contains(&operator)
    }

    /// Fail with `UnsupportedOperation` on the first unsupported node, pre-order
    pub fn check(&self, backend: &'static str, condition: &Condition) -> Result<()> {
        match condition {
            Condition::Predicate { operator, .. } => {
                if !self.supports(*operator) {
                    return Err(QueryError::unsupported(backend, operator.kind().as_str()));
                }
                Ok(())
            }
            Condition::And(children) => {
                if !self.and {
                    return Err(QueryError::unsupported(backend, "AND"));
                }
                children.iter().try_for_each(|c| self.check(backend, c))
            }
            Condition::Or(children) => {
                if !self.or {
                    return Err(QueryError::unsupported(backend, "OR"));
                }
                children.iter().try_for_each(|c| self.check(backend, c))
            }
            Condition::Not(inner) => {
                match self.negation {
                    Negation::Unsupported => return Err(QueryError::unsupported(backend, "NOT")),
                    Negation::Predicates if !matches!(**inner, Condition::Predicate { .. }) => {
                        return Err(QueryError::unsupported(
                            backend,
                            format!("NOT({})", inner.kind()),
                        ));
                    }
                    _ => {}
                }
                self.check(backend, inner)
            }
        }
    }
}

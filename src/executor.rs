//! Execution adapter boundary
//!
//! Drivers, pools and wire protocols live behind this trait. The compiler
//! hands an adapter a finished `NativeStatement`; the adapter returns one page
//! of entities and, for cursor-paged backends, the token to continue from.

use std::future::Future;

use crate::compiler::{Dialect, NativeStatement};
use crate::entity::Entity;
use crate::error::Result;
use crate::query::CursorToken;

/// One page of results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub entities: Vec<Entity>,
    /// Paging state for the next page; `None` once the backend is exhausted
    pub continuation: Option<CursorToken>,
}

impl Page {
    pub fn new(entities: Vec<Entity>, continuation: Option<CursorToken>) -> Self {
        Self {
            entities,
            continuation,
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Runs compiled statements of dialect `D` against a live store
pub trait ExecutionAdapter<D: Dialect>: Send + Sync {
    fn execute(
        &self,
        statement: &NativeStatement<D::Fragment, D::Native>,
    ) -> impl Future<Output = Result<Page>> + Send;
}

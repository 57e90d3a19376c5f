//! Cursor pagination driver
//!
//! A `Pager` owns the paging state of one logical read. Each step re-issues
//! the original query with the latest continuation token until the backend
//! stops returning one.

use tracing::trace;

use crate::compiler::{Compiler, Dialect};
use crate::error::Result;
use crate::executor::{ExecutionAdapter, Page};
use crate::query::{CursorToken, Query};

/// Where a paginated read stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageState {
    NotStarted,
    HasMore(CursorToken),
    Exhausted,
}

/// Caller-owned driver for a paginated read
#[derive(Debug, Clone)]
pub struct Pager {
    query: Query,
    state: PageState,
    pages: usize,
}

impl Pager {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            state: PageState::NotStarted,
            pages: 0,
        }
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == PageState::Exhausted
    }

    /// Pages fetched so far
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Query for the next page, or `None` once exhausted
    pub fn next_query(&self) -> Option<Query> {
        match &self.state {
            PageState::NotStarted => Some(self.query.clone()),
            PageState::HasMore(token) => Some(self.query.with_cursor(Some(token.clone()))),
            PageState::Exhausted => None,
        }
    }

    /// Record the continuation returned with the last page
    ///
    /// A page may be empty and still carry a token; the read continues.
    pub fn advance(&mut self, continuation: Option<CursorToken>) {
        self.pages += 1;
        self.state = match continuation {
            Some(token) => PageState::HasMore(token),
            None => PageState::Exhausted,
        };
    }

    pub fn mark_exhausted(&mut self) {
        self.state = PageState::Exhausted;
    }

    /// Compile, execute and advance; `None` once exhausted
    pub async fn next_page<D, A>(
        &mut self,
        compiler: &Compiler<D>,
        adapter: &A,
    ) -> Result<Option<Page>>
    where
        D: Dialect,
        A: ExecutionAdapter<D>,
    {
        let Some(query) = self.next_query() else {
            return Ok(None);
        };

        let statement = compiler.compile(&query)?;
        let page = adapter.execute(&statement).await?;
        trace!(
            entity = query.entity(),
            page = self.pages + 1,
            rows = page.len(),
            more = page.continuation.is_some(),
            "fetched page"
        );

        self.advance(page.continuation.clone());
        Ok(Some(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> Query {
        Query::builder("person").limit(2).build().unwrap()
    }

    #[test]
    fn test_state_transitions() {
        let mut pager = Pager::new(query());
        assert_eq!(pager.state(), &PageState::NotStarted);
        assert!(pager.next_query().unwrap().cursor().is_none());

        let token = CursorToken::new(vec![1]);
        pager.advance(Some(token.clone()));
        assert_eq!(pager.state(), &PageState::HasMore(token.clone()));
        assert_eq!(pager.next_query().unwrap().cursor(), Some(&token));

        pager.advance(None);
        assert!(pager.is_exhausted());
        assert!(pager.next_query().is_none());
        assert_eq!(pager.pages(), 2);
    }

    #[test]
    fn test_mark_exhausted_stops_early() {
        let mut pager = Pager::new(query());
        pager.advance(Some(CursorToken::new(vec![7])));
        pager.mark_exhausted();
        assert!(pager.next_query().is_none());
    }

    #[test]
    fn test_next_query_keeps_original_shape() {
        let mut pager = Pager::new(query());
        pager.advance(Some(CursorToken::new(vec![3])));
        let next = pager.next_query().unwrap();
        assert_eq!(next.limit(), 2);
        assert_eq!(next.entity(), "person");
    }
}

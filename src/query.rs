//! Portable query model
//!
//! A `Query` is built once and never mutated. Continuing a paginated read is
//! done by re-issuing a copy with the backend's cursor token attached.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::error::{QueryError, Result};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

/// One entry of an ORDER BY list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub direction: Direction,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }

    pub fn is_ascending(&self) -> bool {
        self.direction == Direction::Asc
    }
}

/// Opaque continuation token issued by a cursor-paginated backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CursorToken(Vec<u8>);

impl CursorToken {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// URL-safe text form, suitable for handing back to HTTP clients
    pub fn to_text(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.0)
    }

    /// Parse the text form produced by [`CursorToken::to_text`]
    pub fn from_text(token: &str) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(QueryError::invalid("cursor token is empty"));
        }
        URL_SAFE_NO_PAD
            .decode(token)
            .map(Self)
            .map_err(|e| QueryError::invalid(format!("malformed cursor token: {}", e)))
    }
}

/// Immutable query value object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    entity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    condition: Option<Condition>,
    #[serde(default)]
    projection: Vec<String>,
    #[serde(default)]
    sorts: Vec<Sort>,
    #[serde(default)]
    limit: u64,
    #[serde(default)]
    skip: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<CursorToken>,
}

impl Query {
    /// Start building a query against `entity`
    pub fn builder(entity: impl Into<String>) -> QueryBuilder {
        QueryBuilder::new(entity)
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    /// Projected field names; empty means all fields
    pub fn projection(&self) -> &[String] {
        &self.projection
    }

    pub fn sorts(&self) -> &[Sort] {
        &self.sorts
    }

    /// Maximum rows to return; 0 means unbounded
    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn skip(&self) -> u64 {
        self.skip
    }

    pub fn cursor(&self) -> Option<&CursorToken> {
        self.cursor.as_ref()
    }

    /// Re-issue this query continuing from `cursor`
    pub fn with_cursor(&self, cursor: Option<CursorToken>) -> Self {
        Self {
            cursor,
            ..self.clone()
        }
    }
}

/// Builder for Query
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            query: Query {
                entity: entity.into(),
                condition: None,
                projection: Vec::new(),
                sorts: Vec::new(),
                limit: 0,
                skip: 0,
                cursor: None,
            },
        }
    }

    /// Set the root condition
    pub fn condition(mut self, condition: Condition) -> Self {
        self.query.condition = Some(condition);
        self
    }

    /// Add projected fields; duplicates are ignored
    pub fn select<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        for field in fields {
            let field = field.into();
            if !self.query.projection.contains(&field) {
                self.query.projection.push(field);
            }
        }
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.query.sorts.push(sort);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.query.limit = limit;
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.query.skip = skip;
        self
    }

    pub fn cursor(mut self, cursor: CursorToken) -> Self {
        self.query.cursor = Some(cursor);
        self
    }

    /// Build the query, rejecting an empty entity name
    pub fn build(self) -> Result<Query> {
        if self.query.entity.is_empty() {
            return Err(QueryError::invalid("entity name cannot be empty"));
        }
        Ok(self.query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_builder() {
        let query = Query::builder("Person")
            .condition(Condition::eq("name", "Ada"))
            .select(["name", "age", "name"])
            .sort(Sort::desc("age"))
            .limit(10)
            .skip(5)
            .build()
            .unwrap();

        assert_eq!(query.entity(), "Person");
        assert!(query.condition().is_some());
        assert_eq!(query.projection(), &["name".to_string(), "age".to_string()]);
        assert_eq!(query.sorts().len(), 1);
        assert!(!query.sorts()[0].is_ascending());
        assert_eq!(query.limit(), 10);
        assert_eq!(query.skip(), 5);
        assert!(query.cursor().is_none());
    }

    #[test]
    fn test_defaults_are_unbounded() {
        let query = Query::builder("Person").build().unwrap();
        assert_eq!(query.limit(), 0);
        assert_eq!(query.skip(), 0);
        assert!(query.projection().is_empty());
    }

    #[test]
    fn test_empty_entity_rejected() {
        let err = Query::builder("").build().unwrap_err();
        assert!(matches!(err, QueryError::InvalidQuery(_)));
    }

    #[test]
    fn test_with_cursor_leaves_original_untouched() {
        let query = Query::builder("Person").limit(2).build().unwrap();
        let next = query.with_cursor(Some(CursorToken::new(vec![1, 2, 3])));

        assert!(query.cursor().is_none());
        assert_eq!(next.cursor().unwrap().as_bytes(), &[1, 2, 3]);
        assert_eq!(next.limit(), 2);
    }

    #[test]
    fn test_cursor_token_text_round_trip() {
        let token = CursorToken::new(vec![0, 255, 16, 42]);
        let text = token.to_text();

        assert!(!text.contains('='));
        assert_eq!(CursorToken::from_text(&text).unwrap(), token);
    }

    #[test]
    fn test_cursor_token_rejects_garbage() {
        assert!(CursorToken::from_text("").is_err());
        assert!(CursorToken::from_text("not base64!").is_err());
    }
}

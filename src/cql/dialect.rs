//! CQL lowering
//!
//! Cassandra-style stores accept conjunctions of restrictions only: no `OR`,
//! no `NOT`, no `LIKE`, and ordering only by clustering columns. Results are
//! paged by the driver, so `limit` becomes the fetch size and a cursor
//! carries the paging state forward.

use std::fmt;
use std::sync::Arc;

use crate::compiler::{
    Binder, Capabilities, Connective, Dialect, Lowered, NativeStatement, Negation, Operand,
    Paging, ParamStyle, Predicate, Scope,
};
use crate::condition::Operator;
use crate::config::CompilerConfig;
use crate::cql::value::{CqlValue, to_cql};
use crate::error::{QueryError, Result};
use crate::query::Query;
use crate::schema::{SchemaCache, SchemaLookup};
use crate::sql::sanitize::{is_lower_snake, quote_identifier};
use crate::value::Value;

static CQL_CAPABILITIES: Capabilities = Capabilities {
    operators: &[
        Operator::Equals,
        Operator::GreaterThan,
        Operator::GreaterEquals,
        Operator::LesserThan,
        Operator::LesserEquals,
        Operator::In,
        Operator::Between,
    ],
    and: true,
    or: false,
    negation: Negation::Unsupported,
    point_lookup: false,
    paging: Paging::Cursor,
};

/// CQL reserved keywords that must be quoted
pub const CQL_RESERVED_WORDS: &[&str] = &[
    "ADD",
    "ALLOW",
    "ALTER",
    "AND",
    "APPLY",
    "ASC",
    "AUTHORIZE",
    "BATCH",
    "BEGIN",
    "BY",
    "COLUMNFAMILY",
    "CREATE",
    "DELETE",
    "DESC",
    "DESCRIBE",
    "DROP",
    "ENTRIES",
    "EXECUTE",
    "FROM",
    "FULL",
    "GRANT",
    "IF",
    "IN",
    "INDEX",
    "INFINITY",
    "INSERT",
    "INTO",
    "KEYSPACE",
    "LIMIT",
    "MODIFY",
    "NAN",
    "NORECURSIVE",
    "NOT",
    "NULL",
    "OF",
    "ON",
    "OR",
    "ORDER",
    "PRIMARY",
    "RENAME",
    "REPLACE",
    "REVOKE",
    "SCHEMA",
    "SELECT",
    "SET",
    "TABLE",
    "TO",
    "TOKEN",
    "TRUNCATE",
    "UNLOGGED",
    "UPDATE",
    "USE",
    "USING",
    "VIEW",
    "WHERE",
    "WITH",
];

/// Render a CQL identifier
///
/// Unquoted CQL identifiers are case-insensitive, so anything that is not
/// plain lowercase is double-quoted to keep its case.
pub fn identifier(name: &str) -> String {
    if is_lower_snake(name) && !CQL_RESERVED_WORDS.contains(&name.to_uppercase().as_str()) {
        name.to_string()
    } else {
        quote_identifier(name)
    }
}

/// CQL dialect for one keyspace
#[derive(Clone)]
pub struct CqlDialect {
    keyspace: String,
    clustering_columns: Vec<String>,
    allow_filtering: bool,
    schema: Option<Arc<dyn SchemaLookup>>,
}

impl fmt::Debug for CqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CqlDialect")
            .field("keyspace", &self.keyspace)
            .field("clustering_columns", &self.clustering_columns)
            .field("allow_filtering", &self.allow_filtering)
            .field("schema", &self.schema.is_some())
            .finish()
    }
}

impl CqlDialect {
    pub fn new(keyspace: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            clustering_columns: Vec::new(),
            allow_filtering: false,
            schema: None,
        }
    }

    /// Columns that may appear in ORDER BY
    pub fn clustering_columns<S: Into<String>>(
        mut self,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        self.clustering_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Append `ALLOW FILTERING` to filtered statements
    pub fn allow_filtering(mut self, allow: bool) -> Self {
        self.allow_filtering = allow;
        self
    }

    /// Schema metadata used to convert user-defined values
    ///
    /// Lookups are memoized per `(entity, type)` for the life of the dialect.
    pub fn with_schema(mut self, schema: Arc<dyn SchemaLookup>) -> Self {
        self.schema = Some(Arc::new(SchemaCache::new(schema)));
        self
    }

    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }
}

fn comparison(operator: Operator) -> &'static str {
    match operator {
        Operator::Equals => "=",
        Operator::GreaterThan => ">",
        Operator::GreaterEquals => ">=",
        Operator::LesserThan => "<",
        Operator::LesserEquals => "<=",
        Operator::In | Operator::Like | Operator::Between => "",
    }
}

impl Dialect for CqlDialect {
    type Fragment = String;
    type Native = CqlValue;

    fn name(&self) -> &'static str {
        "cql"
    }

    fn capabilities(&self) -> &'static Capabilities {
        &CQL_CAPABILITIES
    }

    fn param_style(&self) -> ParamStyle {
        ParamStyle::Question
    }

    fn field(&self, name: &str, _config: &CompilerConfig) -> String {
        identifier(name)
    }

    fn to_native(&self, value: &Value, scope: Scope<'_>) -> Result<CqlValue> {
        to_cql(value, scope, self.schema.as_deref())
    }

    fn lower_predicate(
        &self,
        predicate: Predicate<CqlValue>,
        binder: &mut Binder<CqlValue>,
    ) -> Result<String> {
        let Predicate {
            operator,
            name,
            path,
            operand,
        } = predicate;

        match (operator, operand) {
            (_, Operand::Single(CqlValue::Null)) => Err(QueryError::invalid(format!(
                "{} on '{}' cannot compare with null",
                operator.kind(),
                name
            ))),
            (Operator::In, Operand::Many(values)) => {
                let placeholders = values
                    .into_iter()
                    .map(|v| binder.bind(&name, v))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("{} IN ({})", path, placeholders.join(", ")))
            }
            (Operator::Between, Operand::Range(lower, upper)) => {
                let lower = binder.bind(&name, lower)?;
                let upper = binder.bind(&name, upper)?;
                Ok(format!("{} >= {} AND {} <= {}", path, lower, path, upper))
            }
            (operator, Operand::Single(value)) if operator != Operator::Like => {
                let placeholder = binder.bind(&name, value)?;
                Ok(format!("{} {} {}", path, comparison(operator), placeholder))
            }
            (operator, _) => Err(QueryError::invalid(format!(
                "malformed {} predicate on '{}'",
                operator.kind(),
                name
            ))),
        }
    }

    fn join(&self, connective: Connective, parts: Vec<String>) -> Result<String> {
        match connective {
            Connective::And => Ok(parts.join(" AND ")),
            Connective::Or => Err(QueryError::unsupported(self.name(), "OR")),
        }
    }

    fn negate(&self, _inner: String) -> Result<String> {
        Err(QueryError::unsupported(self.name(), "NOT"))
    }

    fn assemble(
        &self,
        query: &Query,
        lowered: Lowered<String, CqlValue>,
        config: &CompilerConfig,
    ) -> Result<NativeStatement<String, CqlValue>> {
        let table = format!("{}.{}", identifier(&self.keyspace), identifier(query.entity()));

        let columns = if query.projection().is_empty() {
            "*".to_string()
        } else {
            query
                .projection()
                .iter()
                .map(|f| self.field(f, config))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut cql = format!("SELECT {} FROM {}", columns, table);
        if let Some(filter) = &lowered.filter {
            cql.push_str(" WHERE ");
            cql.push_str(filter);
        }

        if !query.sorts().is_empty() {
            let mut order = Vec::with_capacity(query.sorts().len());
            for sort in query.sorts() {
                if !self.clustering_columns.contains(&sort.field) {
                    return Err(QueryError::invalid(format!(
                        "cannot sort by '{}': not a clustering column of '{}'",
                        sort.field,
                        query.entity()
                    )));
                }
                let direction = if sort.is_ascending() { "ASC" } else { "DESC" };
                order.push(format!("{} {}", self.field(&sort.field, config), direction));
            }
            cql.push_str(" ORDER BY ");
            cql.push_str(&order.join(", "));
        }

        if self.allow_filtering && lowered.filter.is_some() {
            cql.push_str(" ALLOW FILTERING");
        }

        let mut statement = lowered.finish(query, table, cql);
        statement.fetch_size = (query.limit() > 0).then_some(query.limit());
        statement.paging_state = query.cursor().cloned();
        Ok(statement)
    }
}

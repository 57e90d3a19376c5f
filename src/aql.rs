//! Graph/document backend (ArangoDB AQL)
//!
//! Statements use named bind variables (`@name`). When the tree starts with
//! a key predicate the loop iterates `DOCUMENT(...)` over the keys instead of
//! scanning the collection.

use serde_json::Value as JsonValue;

use crate::compiler::{
    Binder, Capabilities, Connective, Dialect, Lowered, NativeStatement, Negation, Operand,
    Paging, ParamStyle, Parameter, Predicate, Scope,
};
use crate::condition::Operator;
use crate::config::CompilerConfig;
use crate::error::{QueryError, Result};
use crate::json::to_plain_json;
use crate::query::Query;
use crate::value::Value;

static AQL_CAPABILITIES: Capabilities = Capabilities {
    operators: Operator::ALL,
    and: true,
    or: true,
    negation: Negation::Any,
    point_lookup: true,
    paging: Paging::Offset,
};

/// Loop variable bound to each document
const DOC: &str = "d";

/// Bind variable holding diverted keys
pub const KEYS_PARAMETER: &str = "keys";

/// `LIMIT offset, count` needs a count even when unbounded
const UNBOUNDED_COUNT: u64 = 9_007_199_254_740_991;

/// AQL keywords that must be quoted as attribute names
pub const AQL_RESERVED_WORDS: &[&str] = &[
    "AGGREGATE",
    "ALL",
    "AND",
    "ANY",
    "ASC",
    "COLLECT",
    "DESC",
    "DISTINCT",
    "FALSE",
    "FILTER",
    "FOR",
    "GRAPH",
    "IN",
    "INBOUND",
    "INSERT",
    "INTO",
    "K_PATHS",
    "K_SHORTEST_PATHS",
    "LET",
    "LIKE",
    "LIMIT",
    "NONE",
    "NOT",
    "NULL",
    "OR",
    "OUTBOUND",
    "REMOVE",
    "REPLACE",
    "RETURN",
    "SEARCH",
    "SHORTEST_PATH",
    "SORT",
    "TRUE",
    "UPDATE",
    "UPSERT",
    "WINDOW",
    "WITH",
];

fn is_plain_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Render an attribute or collection name
///
/// Keywords, names with a leading underscore and anything outside
/// `[A-Za-z][A-Za-z0-9_]*` are backtick-quoted.
pub fn identifier(name: &str) -> String {
    if is_plain_name(name) && !AQL_RESERVED_WORDS.contains(&name.to_uppercase().as_str()) {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

/// AQL dialect
#[derive(Debug, Clone, Default)]
pub struct AqlDialect;

impl AqlDialect {
    pub fn new() -> Self {
        Self
    }
}

fn comparison(operator: Operator) -> &'static str {
    match operator {
        Operator::Equals => "==",
        Operator::GreaterThan => ">",
        Operator::GreaterEquals => ">=",
        Operator::LesserThan => "<",
        Operator::LesserEquals => "<=",
        Operator::Like => "LIKE",
        Operator::In | Operator::Between => "",
    }
}

fn json_string(text: &str) -> String {
    JsonValue::String(text.to_string()).to_string()
}

impl Dialect for AqlDialect {
    type Fragment = String;
    type Native = JsonValue;

    fn name(&self) -> &'static str {
        "aql"
    }

    fn capabilities(&self) -> &'static Capabilities {
        &AQL_CAPABILITIES
    }

    fn param_style(&self) -> ParamStyle {
        ParamStyle::Named('@')
    }

    fn field(&self, name: &str, config: &CompilerConfig) -> String {
        if config.is_id_field(name) {
            format!("{}._key", DOC)
        } else {
            format!("{}.{}", DOC, identifier(name))
        }
    }

    fn to_native(&self, value: &Value, scope: Scope<'_>) -> Result<JsonValue> {
        to_plain_json(value, scope)
    }

    fn lower_predicate(
        &self,
        predicate: Predicate<JsonValue>,
        binder: &mut Binder<JsonValue>,
    ) -> Result<String> {
        let Predicate {
            operator,
            name,
            path,
            operand,
        } = predicate;

        match (operator, operand) {
            (Operator::In, Operand::Many(values)) => {
                let placeholders = values
                    .into_iter()
                    .map(|v| binder.bind(&name, v))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("{} IN [{}]", path, placeholders.join(", ")))
            }
            (Operator::Between, Operand::Range(lower, upper)) => {
                let lower = binder.bind(&name, lower)?;
                let upper = binder.bind(&name, upper)?;
                Ok(format!("({} >= {} AND {} <= {})", path, lower, path, upper))
            }
            (operator, Operand::Single(value))
                if !matches!(operator, Operator::In | Operator::Between) =>
            {
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
        let separator = match connective {
            Connective::And => " AND ",
            Connective::Or => " OR ",
        };
        Ok(parts
            .iter()
            .map(|p| format!("({})", p))
            .collect::<Vec<_>>()
            .join(separator))
    }

    fn negate(&self, inner: String) -> Result<String> {
        Ok(format!("NOT ({})", inner))
    }

    fn assemble(
        &self,
        query: &Query,
        mut lowered: Lowered<String, JsonValue>,
        config: &CompilerConfig,
    ) -> Result<NativeStatement<String, JsonValue>> {
        let collection = query.entity();

        let mut aql = if lowered.key_lookup.is_empty() {
            format!("FOR {} IN {}", DOC, identifier(collection))
        } else {
            if lowered
                .parameters
                .iter()
                .any(|p| p.name.as_deref() == Some(KEYS_PARAMETER))
            {
                return Err(QueryError::ParameterBindingConflict(
                    KEYS_PARAMETER.to_string(),
                ));
            }
            lowered.parameters.push(Parameter {
                name: Some(KEYS_PARAMETER.to_string()),
                value: JsonValue::Array(lowered.key_lookup.clone()),
            });
            format!(
                "FOR {} IN DOCUMENT({}, @{})",
                DOC,
                json_string(collection),
                KEYS_PARAMETER
            )
        };

        if let Some(filter) = &lowered.filter {
            aql.push_str(" FILTER ");
            aql.push_str(filter);
        }
        if !query.sorts().is_empty() {
            let order = query
                .sorts()
                .iter()
                .map(|s| {
                    let direction = if s.is_ascending() { "ASC" } else { "DESC" };
                    format!("{} {}", self.field(&s.field, config), direction)
                })
                .collect::<Vec<_>>();
            aql.push_str(" SORT ");
            aql.push_str(&order.join(", "));
        }
        match (query.skip(), query.limit()) {
            (0, 0) => {}
            (0, limit) => aql.push_str(&format!(" LIMIT {}", limit)),
            (skip, 0) => aql.push_str(&format!(" LIMIT {}, {}", skip, UNBOUNDED_COUNT)),
            (skip, limit) => aql.push_str(&format!(" LIMIT {}, {}", skip, limit)),
        }

        if query.projection().is_empty() {
            aql.push_str(&format!(" RETURN {}", DOC));
        } else {
            let attributes = query
                .projection()
                .iter()
                .map(|f| {
                    let attribute = if config.is_id_field(f) { "_key" } else { f.as_str() };
                    json_string(attribute)
                })
                .collect::<Vec<_>>();
            aql.push_str(&format!(" RETURN KEEP({}, {})", DOC, attributes.join(", ")));
        }

        Ok(lowered.finish(query, collection, aql))
    }
}

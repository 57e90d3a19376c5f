//! Document-store lowering
//!
//! Builds a MongoDB-style `find` command. Filters are JSON documents with the
//! values embedded in place, so every bound value is also recorded as an
//! inline parameter for inspection.

use serde_json::{Map, Value as JsonValue, json};

use crate::compiler::{
    Binder, Capabilities, Connective, Dialect, Lowered, NativeStatement, Negation, Operand,
    Paging, ParamStyle, Predicate, Scope,
};
use crate::condition::Operator;
use crate::config::CompilerConfig;
use crate::document::codec::to_document;
use crate::error::{QueryError, Result};
use crate::query::Query;
use crate::value::Value;

static DOCUMENT_CAPABILITIES: Capabilities = Capabilities {
    operators: Operator::ALL,
    and: true,
    or: true,
    negation: Negation::Predicates,
    point_lookup: false,
    paging: Paging::Offset,
};

/// Field name of the primary key in every collection
pub const DOCUMENT_ID: &str = "_id";

/// Render a document field path
///
/// Names starting with `$` would read as operators and are rejected.
pub fn identifier(name: &str) -> Result<String> {
    if name.starts_with('$') {
        return Err(QueryError::invalid(format!(
            "document field '{}' may not start with '$'",
            name
        )));
    }
    Ok(name.to_string())
}

/// Translate a `%`/`_` pattern into an anchored regular expression
pub fn like_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 2);
    regex.push('^');
    for c in pattern.chars() {
        match c {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            other => regex.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    regex.push('$');
    regex
}

/// Document dialect
#[derive(Debug, Clone, Default)]
pub struct DocumentDialect;

impl DocumentDialect {
    pub fn new() -> Self {
        Self
    }
}

fn comparison(operator: Operator) -> &'static str {
    match operator {
        Operator::Equals => "$eq",
        Operator::GreaterThan => "$gt",
        Operator::GreaterEquals => "$gte",
        Operator::LesserThan => "$lt",
        Operator::LesserEquals => "$lte",
        Operator::In => "$in",
        Operator::Like => "$regex",
        Operator::Between => "",
    }
}

fn on_field(path: String, ops: JsonValue) -> JsonValue {
    let mut filter = Map::with_capacity(1);
    filter.insert(path, ops);
    JsonValue::Object(filter)
}

impl Dialect for DocumentDialect {
    type Fragment = JsonValue;
    type Native = JsonValue;

    fn name(&self) -> &'static str {
        "document"
    }

    fn capabilities(&self) -> &'static Capabilities {
        &DOCUMENT_CAPABILITIES
    }

    fn param_style(&self) -> ParamStyle {
        ParamStyle::Inline
    }

    fn field(&self, name: &str, config: &CompilerConfig) -> String {
        if config.is_id_field(name) {
            DOCUMENT_ID.to_string()
        } else {
            name.to_string()
        }
    }

    fn to_native(&self, value: &Value, scope: Scope<'_>) -> Result<JsonValue> {
        to_document(value, scope)
    }

    fn lower_predicate(
        &self,
        predicate: Predicate<JsonValue>,
        binder: &mut Binder<JsonValue>,
    ) -> Result<JsonValue> {
        let Predicate {
            operator,
            name,
            path,
            operand,
        } = predicate;
        identifier(&name)?;

        let ops = match (operator, operand) {
            (Operator::In, Operand::Many(values)) => {
                for value in &values {
                    binder.bind(&name, value.clone())?;
                }
                json!({ "$in": values })
            }
            (Operator::Between, Operand::Range(lower, upper)) => {
                binder.bind(&name, lower.clone())?;
                binder.bind(&name, upper.clone())?;
                json!({ "$gte": lower, "$lte": upper })
            }
            (Operator::Like, Operand::Single(JsonValue::String(pattern))) => {
                let regex = JsonValue::String(like_to_regex(&pattern));
                binder.bind(&name, regex.clone())?;
                json!({ "$regex": regex })
            }
            (operator, Operand::Single(value))
                if !matches!(operator, Operator::In | Operator::Between | Operator::Like) =>
            {
                binder.bind(&name, value.clone())?;
                on_field(comparison(operator).to_string(), value)
            }
            (operator, _) => {
                return Err(QueryError::invalid(format!(
                    "malformed {} predicate on '{}'",
                    operator.kind(),
                    name
                )));
            }
        };
        Ok(on_field(path, ops))
    }

    fn join(&self, connective: Connective, parts: Vec<JsonValue>) -> Result<JsonValue> {
        let key = match connective {
            Connective::And => "$and",
            Connective::Or => "$or",
        };
        Ok(on_field(key.to_string(), JsonValue::Array(parts)))
    }

    /// `{f: {ops}}` becomes `{f: {"$not": {ops}}}`
    fn negate(&self, inner: JsonValue) -> Result<JsonValue> {
        let JsonValue::Object(mut filter) = inner else {
            return Err(QueryError::unsupported(self.name(), "NOT"));
        };
        let field = match filter.keys().next() {
            Some(key) if filter.len() == 1 && !key.starts_with('$') => key.clone(),
            _ => return Err(QueryError::unsupported(self.name(), "NOT")),
        };
        let ops = filter.remove(&field).unwrap_or(JsonValue::Null);
        Ok(on_field(field, json!({ "$not": ops })))
    }

    fn assemble(
        &self,
        query: &Query,
        lowered: Lowered<JsonValue, JsonValue>,
        config: &CompilerConfig,
    ) -> Result<NativeStatement<JsonValue, JsonValue>> {
        let collection = query.entity().to_string();
        for name in query
            .projection()
            .iter()
            .chain(query.sorts().iter().map(|s| &s.field))
        {
            identifier(name)?;
        }

        let mut command = Map::new();
        command.insert("find".to_string(), JsonValue::String(collection.clone()));
        command.insert(
            "filter".to_string(),
            lowered.filter.clone().unwrap_or_else(|| json!({})),
        );

        if !query.projection().is_empty() {
            let projection = query
                .projection()
                .iter()
                .map(|f| (self.field(f, config), json!(1)))
                .collect::<Map<_, _>>();
            command.insert("projection".to_string(), JsonValue::Object(projection));
        }
        if !query.sorts().is_empty() {
            let sort = query
                .sorts()
                .iter()
                .map(|s| {
                    let direction = if s.is_ascending() { 1 } else { -1 };
                    (self.field(&s.field, config), json!(direction))
                })
                .collect::<Map<_, _>>();
            command.insert("sort".to_string(), JsonValue::Object(sort));
        }
        if query.skip() > 0 {
            command.insert("skip".to_string(), json!(query.skip()));
        }
        if query.limit() > 0 {
            command.insert("limit".to_string(), json!(query.limit()));
        }

        Ok(lowered.finish(query, collection, JsonValue::Object(command)))
    }
}

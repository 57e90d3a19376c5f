//! Search-engine backend (Elasticsearch query DSL)
//!
//! Every entity type shares one index and is told apart by a discriminator
//! field, so the lowered filter is always combined with a term on it. ID
//! predicates at the top of the tree become an `ids` query.

use serde_json::{Map, Value as JsonValue, json};

use crate::compiler::{
    Binder, Capabilities, Connective, Dialect, Lowered, NativeStatement, Negation, Operand,
    Paging, ParamStyle, Predicate, Scope,
};
use crate::condition::Operator;
use crate::config::CompilerConfig;
use crate::error::{QueryError, Result};
use crate::json::to_plain_json;
use crate::query::Query;
use crate::value::Value;

static SEARCH_CAPABILITIES: Capabilities = Capabilities {
    operators: Operator::ALL,
    and: true,
    or: true,
    negation: Negation::Any,
    point_lookup: true,
    paging: Paging::Offset,
};

/// Default name of the entity discriminator field
pub const DEFAULT_DISCRIMINATOR: &str = "@entity";

/// Metadata field holding the document id
pub const SEARCH_ID: &str = "_id";

/// Field names are used verbatim; dotted names address object sub-fields
pub fn identifier(name: &str) -> String {
    name.to_string()
}

/// Translate a `%`/`_` pattern into wildcard syntax
pub fn like_to_wildcard(pattern: &str) -> String {
    let mut wildcard = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            '%' => wildcard.push('*'),
            '_' => wildcard.push('?'),
            '*' | '?' | '\\' => {
                wildcard.push('\\');
                wildcard.push(c);
            }
            other => wildcard.push(other),
        }
    }
    wildcard
}

/// Search dialect for one index
#[derive(Debug, Clone)]
pub struct SearchDialect {
    index: String,
    discriminator: String,
}

impl SearchDialect {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            discriminator: DEFAULT_DISCRIMINATOR.to_string(),
        }
    }

    /// Field carrying the entity name (default: "@entity")
    pub fn discriminator(mut self, field: impl Into<String>) -> Self {
        self.discriminator = field.into();
        self
    }

    pub fn index(&self) -> &str {
        &self.index
    }
}

fn range_key(operator: Operator) -> Option<&'static str> {
    match operator {
        Operator::GreaterThan => Some("gt"),
        Operator::GreaterEquals => Some("gte"),
        Operator::LesserThan => Some("lt"),
        Operator::LesserEquals => Some("lte"),
        _ => None,
    }
}

fn malformed(operator: Operator, name: &str) -> QueryError {
    QueryError::invalid(format!(
        "malformed {} predicate on '{}'",
        operator.kind(),
        name
    ))
}

fn leaf(kind: &str, path: String, body: JsonValue) -> JsonValue {
    let mut field = Map::with_capacity(1);
    field.insert(path, body);
    let mut query = Map::with_capacity(1);
    query.insert(kind.to_string(), JsonValue::Object(field));
    JsonValue::Object(query)
}

impl Dialect for SearchDialect {
    type Fragment = JsonValue;
    type Native = JsonValue;

    fn name(&self) -> &'static str {
        "search"
    }

    fn capabilities(&self) -> &'static Capabilities {
        &SEARCH_CAPABILITIES
    }

    fn param_style(&self) -> ParamStyle {
        ParamStyle::Inline
    }

    fn field(&self, name: &str, config: &CompilerConfig) -> String {
        if config.is_id_field(name) {
            SEARCH_ID.to_string()
        } else {
            identifier(name)
        }
    }

    fn to_native(&self, value: &Value, scope: Scope<'_>) -> Result<JsonValue> {
        to_plain_json(value, scope)
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

        match (operator, operand) {
            (_, Operand::Single(JsonValue::Null)) => Err(QueryError::invalid(format!(
                "{} on '{}' cannot match null",
                operator.kind(),
                name
            ))),
            (Operator::Equals, Operand::Single(value)) => {
                binder.bind(&name, value.clone())?;
                Ok(leaf("term", path, value))
            }
            (Operator::In, Operand::Many(values)) => {
                for value in &values {
                    binder.bind(&name, value.clone())?;
                }
                Ok(leaf("terms", path, JsonValue::Array(values)))
            }
            (Operator::Like, Operand::Single(JsonValue::String(pattern))) => {
                let wildcard = JsonValue::String(like_to_wildcard(&pattern));
                binder.bind(&name, wildcard.clone())?;
                Ok(leaf("wildcard", path, json!({ "value": wildcard })))
            }
            (Operator::Between, Operand::Range(lower, upper)) => {
                binder.bind(&name, lower.clone())?;
                binder.bind(&name, upper.clone())?;
                Ok(leaf("range", path, json!({ "gte": lower, "lte": upper })))
            }
            (operator, Operand::Single(value)) => {
                let Some(key) = range_key(operator) else {
                    return Err(malformed(operator, &name));
                };
                binder.bind(&name, value.clone())?;
                let mut bound = Map::with_capacity(1);
                bound.insert(key.to_string(), value);
                Ok(leaf("range", path, JsonValue::Object(bound)))
            }
            (operator, _) => Err(malformed(operator, &name)),
        }
    }

    fn join(&self, connective: Connective, parts: Vec<JsonValue>) -> Result<JsonValue> {
        Ok(match connective {
            Connective::And => json!({ "bool": { "must": parts } }),
            Connective::Or => json!({ "bool": { "should": parts, "minimum_should_match": 1 } }),
        })
    }

    fn negate(&self, inner: JsonValue) -> Result<JsonValue> {
        Ok(json!({ "bool": { "must_not": [inner] } }))
    }

    fn assemble(
        &self,
        query: &Query,
        lowered: Lowered<JsonValue, JsonValue>,
        config: &CompilerConfig,
    ) -> Result<NativeStatement<JsonValue, JsonValue>> {
        let window = config.max_result_window;
        let size = if query.limit() > 0 {
            query.limit()
        } else {
            window.saturating_sub(query.skip())
        };
        if query.skip().saturating_add(size) > window {
            return Err(QueryError::invalid(format!(
                "skip {} + size {} exceeds the result window of {}",
                query.skip(),
                size,
                window
            )));
        }

        let mut filters = vec![leaf(
            "term",
            self.discriminator.clone(),
            JsonValue::String(query.entity().to_string()),
        )];
        if !lowered.key_lookup.is_empty() {
            filters.push(json!({ "ids": { "values": lowered.key_lookup.clone() } }));
        }
        if let Some(filter) = &lowered.filter {
            filters.push(filter.clone());
        }

        let mut body = Map::new();
        body.insert(
            "query".to_string(),
            json!({ "bool": { "filter": filters } }),
        );
        if !query.projection().is_empty() {
            let fields = query
                .projection()
                .iter()
                .map(|f| JsonValue::String(self.field(f, config)))
                .collect();
            body.insert("_source".to_string(), JsonValue::Array(fields));
        }
        if !query.sorts().is_empty() {
            let sort = query
                .sorts()
                .iter()
                .map(|s| {
                    let order = if s.is_ascending() { "asc" } else { "desc" };
                    leaf_sort(self.field(&s.field, config), order)
                })
                .collect();
            body.insert("sort".to_string(), JsonValue::Array(sort));
        }
        if query.skip() > 0 {
            body.insert("from".to_string(), json!(query.skip()));
        }
        body.insert("size".to_string(), json!(size));

        Ok(lowered.finish(query, self.index.clone(), JsonValue::Object(body)))
    }
}

fn leaf_sort(path: String, order: &str) -> JsonValue {
    let mut sort = Map::with_capacity(1);
    sort.insert(path, json!({ "order": order }));
    JsonValue::Object(sort)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;
    use crate::condition::Condition;
    use crate::query::Sort;

    fn compile(query: &Query) -> Result<NativeStatement<JsonValue, JsonValue>> {
        Compiler::new(SearchDialect::new("catalog")).compile(query)
    }

    fn filter_of(condition: Condition) -> JsonValue {
        let query = Query::builder("Person").condition(condition).build().unwrap();
        compile(&query).unwrap().filter.unwrap()
    }

    #[test]
    fn test_leaf_queries() {
        assert_eq!(filter_of(Condition::eq("name", "Ada")), json!({"term": {"name": "Ada"}}));
        assert_eq!(filter_of(Condition::gt("age", 1)), json!({"range": {"age": {"gt": 1}}}));
        assert_eq!(filter_of(Condition::lte("age", 1)), json!({"range": {"age": {"lte": 1}}}));
        assert_eq!(
            filter_of(Condition::in_list("city", ["Assis", "Ourinhos"])),
            json!({"terms": {"city": ["Assis", "Ourinhos"]}})
        );
        assert_eq!(
            filter_of(Condition::between("age", 18, 30)),
            json!({"range": {"age": {"gte": 18, "lte": 30}}})
        );
        assert_eq!(
            filter_of(Condition::like("name", "Ad_%*")),
            json!({"wildcard": {"name": {"value": "Ad?*\\*"}}})
        );
    }

    #[test]
    fn test_bool_combinators() {
        let filter = filter_of(Condition::or(vec![
            Condition::eq("a", 1),
            Condition::not(Condition::and(vec![Condition::eq("b", 2), Condition::eq("c", 3)])),
        ]));
        assert_eq!(
            filter,
            json!({"bool": {
                "should": [
                    {"term": {"a": 1}},
                    {"bool": {"must_not": [
                        {"bool": {"must": [{"term": {"b": 2}}, {"term": {"c": 3}}]}}
                    ]}}
                ],
                "minimum_should_match": 1
            }})
        );
    }

    #[test]
    fn test_null_term_rejected() {
        let query = Query::builder("Person")
            .condition(Condition::eq("name", Value::Null))
            .build()
            .unwrap();
        assert!(matches!(compile(&query).unwrap_err(), QueryError::InvalidQuery(_)));
    }

    #[test]
    fn test_null_key_rejected() {
        for condition in [
            Condition::eq("_id", Value::Null),
            Condition::in_list("_id", [Value::from("p1"), Value::Null]),
            Condition::and(vec![
                Condition::eq("name", "Ada"),
                Condition::eq("_id", Value::Null),
            ]),
        ] {
            let query = Query::builder("Person").condition(condition).build().unwrap();
            let err = compile(&query).unwrap_err();
            assert!(
                matches!(&err, QueryError::InvalidQuery(m) if m.contains("key field '_id'")),
                "{:?}",
                err
            );
        }
    }

    #[test]
    fn test_body_includes_discriminator() {
        let query = Query::builder("Person")
            .select(["name"])
            .condition(Condition::eq("name", "Ada"))
            .sort(Sort::asc("name"))
            .limit(20)
            .skip(40)
            .build()
            .unwrap();
        let stmt = compile(&query).unwrap();

        assert_eq!(stmt.target, "catalog");
        assert_eq!(
            stmt.statement,
            json!({
                "query": {"bool": {"filter": [
                    {"term": {"@entity": "Person"}},
                    {"term": {"name": "Ada"}}
                ]}},
                "_source": ["name"],
                "sort": [{"name": {"order": "asc"}}],
                "from": 40,
                "size": 20
            })
        );
    }

    #[test]
    fn test_unbounded_uses_result_window() {
        let query = Query::builder("Person").build().unwrap();
        let stmt = compile(&query).unwrap();
        assert_eq!(stmt.statement["size"], json!(10_000));

        let config = CompilerConfig::builder().max_result_window(100).build();
        let deep = Query::builder("Person").limit(50).skip(60).build().unwrap();
        let err = Compiler::with_config(SearchDialect::new("catalog"), config)
            .compile(&deep)
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidQuery(_)));
    }

    #[test]
    fn test_root_id_becomes_ids_query() {
        let query = Query::builder("Person")
            .condition(Condition::in_list("_id", ["p1", "p2"]))
            .build()
            .unwrap();
        let stmt = compile(&query).unwrap();

        assert_eq!(stmt.key_lookup, vec![json!("p1"), json!("p2")]);
        assert!(stmt.filter.is_none());
        assert_eq!(
            stmt.statement["query"]["bool"]["filter"][1],
            json!({"ids": {"values": ["p1", "p2"]}})
        );
    }

    #[test]
    fn test_custom_discriminator() {
        let dialect = SearchDialect::new("catalog").discriminator("kind");
        let query = Query::builder("Person").build().unwrap();
        let stmt = Compiler::new(dialect).compile(&query).unwrap();
        assert_eq!(
            stmt.statement["query"]["bool"]["filter"][0],
            json!({"term": {"kind": "Person"}})
        );
    }
}

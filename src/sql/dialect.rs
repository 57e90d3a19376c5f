//! SQL lowering for PostgreSQL
//!
//! Produces a parameterized `SELECT` with `$n` placeholders. Values are bound
//! as crate `Value`s and converted by the executor at bind time.

use crate::compiler::{
    Binder, Capabilities, Connective, Dialect, Lowered, NativeStatement, Negation, Operand,
    Paging, ParamStyle, Predicate, Scope,
};
use crate::condition::Operator;
use crate::config::CompilerConfig;
use crate::error::{QueryError, Result};
use crate::query::Query;
use crate::sql::sanitize::{identifier, qualified};
use crate::value::Value;

static SQL_CAPABILITIES: Capabilities = Capabilities {
    operators: Operator::ALL,
    and: true,
    or: true,
    negation: Negation::Any,
    point_lookup: false,
    paging: Paging::Offset,
};

/// PostgreSQL dialect
#[derive(Debug, Clone, Default)]
pub struct SqlDialect {
    schema: Option<String>,
}

impl SqlDialect {
    pub fn new() -> Self {
        Self::default()
    }

    /// Qualify every table with `schema`
    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

fn comparison(operator: Operator) -> &'static str {
    match operator {
        Operator::Equals => "=",
        Operator::GreaterThan => ">",
        Operator::GreaterEquals => ">=",
        Operator::LesserThan => "<",
        Operator::LesserEquals => "<=",
        Operator::Like => "LIKE",
        Operator::In | Operator::Between => "",
    }
}

impl Dialect for SqlDialect {
    type Fragment = String;
    type Native = Value;

    fn name(&self) -> &'static str {
        "sql"
    }

    fn capabilities(&self) -> &'static Capabilities {
        &SQL_CAPABILITIES
    }

    fn param_style(&self) -> ParamStyle {
        ParamStyle::Dollar
    }

    fn field(&self, name: &str, _config: &CompilerConfig) -> String {
        identifier(name)
    }

    fn to_native(&self, value: &Value, scope: Scope<'_>) -> Result<Value> {
        match value {
            Value::Udt(udt) => Err(scope.error(format!(
                "user-defined value of type '{}' cannot be bound in SQL",
                udt.type_name
            ))),
            other => Ok(other.clone()),
        }
    }

    fn lower_predicate(
        &self,
        predicate: Predicate<Value>,
        binder: &mut Binder<Value>,
    ) -> Result<String> {
        let Predicate {
            operator,
            name,
            path,
            operand,
        } = predicate;

        match (operator, operand) {
            (Operator::Equals, Operand::Single(Value::Null)) => Ok(format!("{} IS NULL", path)),
            (_, Operand::Single(Value::Null)) => Err(QueryError::invalid(format!(
                "{} on '{}' cannot compare with NULL",
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
                Ok(format!("{} BETWEEN {} AND {}", path, lower, upper))
            }
            (operator, Operand::Single(value)) => {
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
        lowered: Lowered<String, Value>,
        config: &CompilerConfig,
    ) -> Result<NativeStatement<String, Value>> {
        let table = qualified(self.schema.as_deref(), query.entity());

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

        let mut sql = format!("SELECT {} FROM {}", columns, table);
        if let Some(filter) = &lowered.filter {
            sql.push_str(" WHERE ");
            sql.push_str(filter);
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
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }
        if query.limit() > 0 {
            sql.push_str(&format!(" LIMIT {}", query.limit()));
        }
        if query.skip() > 0 {
            sql.push_str(&format!(" OFFSET {}", query.skip()));
        }

        Ok(lowered.finish(query, table, sql))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;
    use crate::condition::Condition;
    use crate::query::{CursorToken, Sort};

    fn compile(query: &Query) -> Result<NativeStatement<String, Value>> {
        Compiler::new(SqlDialect::new()).compile(query)
    }

    fn query_with(condition: Condition) -> Query {
        Query::builder("person").condition(condition).build().unwrap()
    }

    // ==================== Predicates ====================

    #[test]
    fn test_eq_condition() {
        let stmt = compile(&query_with(Condition::eq("name", "test"))).unwrap();

        assert_eq!(stmt.statement, "SELECT * FROM person WHERE name = $1");
        assert_eq!(stmt.filter.as_deref(), Some("name = $1"));
        assert_eq!(stmt.parameter_values(), vec![&Value::from("test")]);
    }

    #[test]
    fn test_comparison_operators() {
        let cases = [
            (Condition::gt("age", 1), "age > $1"),
            (Condition::gte("age", 1), "age >= $1"),
            (Condition::lt("age", 1), "age < $1"),
            (Condition::lte("age", 1), "age <= $1"),
            (Condition::like("name", "Ad%"), "name LIKE $1"),
        ];
        for (condition, expected) in cases {
            let stmt = compile(&query_with(condition)).unwrap();
            assert_eq!(stmt.filter.as_deref(), Some(expected));
            assert_eq!(stmt.parameters.len(), 1);
        }
    }

    #[test]
    fn test_eq_null_is_null_without_binding() {
        let stmt = compile(&query_with(Condition::eq("deleted_at", Value::Null))).unwrap();
        assert_eq!(stmt.filter.as_deref(), Some("deleted_at IS NULL"));
        assert!(stmt.parameters.is_empty());
    }

    #[test]
    fn test_gt_null_rejected() {
        let err = compile(&query_with(Condition::gt("age", Value::Null))).unwrap_err();
        assert!(matches!(err, QueryError::InvalidQuery(_)));
    }

    #[test]
    fn test_in_expands_one_parameter_per_value() {
        let stmt = compile(&query_with(Condition::in_list("status", ["a", "b", "c"]))).unwrap();
        assert_eq!(stmt.filter.as_deref(), Some("status IN ($1, $2, $3)"));
        assert_eq!(stmt.parameters.len(), 3);
    }

    #[test]
    fn test_between_binds_two_inspectable_parameters() {
        let stmt = compile(&query_with(Condition::between("age", 18, 65))).unwrap();
        assert_eq!(stmt.filter.as_deref(), Some("age BETWEEN $1 AND $2"));
        assert_eq!(
            stmt.parameter_values(),
            vec![&Value::Int(18), &Value::Int(65)]
        );
    }

    // ==================== Combinators ====================

    #[test]
    fn test_nested_and_or_not() {
        let condition = Condition::and(vec![
            Condition::eq("type", "product"),
            Condition::or(vec![
                Condition::eq("status", "active"),
                Condition::not(Condition::eq("status", "pending")),
            ]),
        ]);
        let stmt = compile(&query_with(condition)).unwrap();

        assert_eq!(
            stmt.filter.as_deref(),
            Some("(type = $1) AND ((status = $2) OR (NOT (status = $3)))")
        );
        assert_eq!(stmt.parameters.len(), 3);
    }

    #[test]
    fn test_identifiers_are_quoted() {
        let stmt = compile(&query_with(Condition::eq("firstName", "Ada"))).unwrap();
        assert_eq!(stmt.filter.as_deref(), Some("\"firstName\" = $1"));

        let query = Query::builder("Person").build().unwrap();
        let stmt = compile(&query).unwrap();
        assert_eq!(stmt.statement, "SELECT * FROM \"Person\"");
    }

    // ==================== Assembly ====================

    #[test]
    fn test_projection_sort_and_paging() {
        let query = Query::builder("person")
            .select(["name", "age"])
            .condition(Condition::gte("age", 21))
            .sort(Sort::desc("age"))
            .sort(Sort::asc("name"))
            .limit(10)
            .skip(20)
            .build()
            .unwrap();
        let stmt = Compiler::new(SqlDialect::new().in_schema("app"))
            .compile(&query)
            .unwrap();

        assert_eq!(
            stmt.statement,
            "SELECT name, age FROM app.person WHERE age >= $1 ORDER BY age DESC, name ASC LIMIT 10 OFFSET 20"
        );
        assert_eq!(stmt.target, "app.person");
        assert!(!stmt.is_point_lookup());
    }

    #[test]
    fn test_cursor_rejected() {
        let query = Query::builder("person")
            .cursor(CursorToken::new(vec![1]))
            .build()
            .unwrap();
        let err = compile(&query).unwrap_err();
        assert_eq!(err.unsupported_operation(), Some("cursor"));
    }

    #[test]
    fn test_id_predicate_stays_in_filter() {
        let stmt = compile(&query_with(Condition::eq("_id", 7))).unwrap();
        assert_eq!(stmt.filter.as_deref(), Some("\"_id\" = $1"));
        assert!(stmt.key_lookup.is_empty());
    }
}

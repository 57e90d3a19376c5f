//! PostgreSQL execution adapter
//!
//! Runs statements produced by [`SqlDialect`] on a `sqlx` pool and converts
//! result rows into entities by column type.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{Column, PgPool, Postgres, Row, TypeInfo};
use tracing::warn;
use uuid::Uuid;

use crate::compiler::{NativeStatement, Scope};
use crate::entity::Entity;
use crate::error::{QueryError, Result};
use crate::executor::{ExecutionAdapter, Page};
use crate::json::{from_plain_json, to_plain_json};
use crate::sql::SqlDialect;
use crate::value::Value;

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// Executes SQL statements against PostgreSQL
#[derive(Debug, Clone)]
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    /// Connect a new pool
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| QueryError::Connection(format!("Database connection failed: {}", e)))?;
        Ok(Self { pool })
    }

    /// Share an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl ExecutionAdapter<SqlDialect> for PgExecutor {
    async fn execute(&self, statement: &NativeStatement<String, Value>) -> Result<Page> {
        let mut query = sqlx::query(&statement.statement);
        for (index, param) in statement.parameters.iter().enumerate() {
            let position = format!("${}", index + 1);
            let scope = Scope::new(&statement.entity, param.name.as_deref().unwrap_or(&position));
            query = bind_value(query, &param.value, scope)?;
        }

        let rows = query.fetch_all(&self.pool).await?;
        let entities = rows
            .iter()
            .map(|row| row_to_entity(&statement.entity, row))
            .collect::<Result<Vec<_>>>()?;

        Ok(Page::new(entities, None))
    }
}

fn bind_value<'q>(query: PgQuery<'q>, value: &Value, scope: Scope<'_>) -> Result<PgQuery<'q>> {
    Ok(match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Double(d) => query.bind(*d),
        Value::Decimal(d) => query.bind(*d),
        Value::Text(s) => query.bind(s.clone()),
        Value::Bytes(b) => query.bind(b.clone()),
        Value::Uuid(u) => query.bind(*u),
        Value::Timestamp(ts) => query.bind(*ts),
        Value::Date(d) => query.bind(*d),
        Value::List(_) | Value::Map(_) => query.bind(to_plain_json(value, scope)?),
        Value::Udt(udt) => {
            return Err(scope.error(format!(
                "user-defined value of type '{}' cannot be bound in SQL",
                udt.type_name
            )));
        }
    })
}

fn row_to_entity(entity: &str, row: &PgRow) -> Result<Entity> {
    let mut result = Entity::new(entity);
    for column in row.columns() {
        let value = extract_column_value(
            entity,
            row,
            column.ordinal(),
            column.name(),
            column.type_info().name(),
        )?;
        result.add_value(column.name(), value);
    }
    Ok(result)
}

fn extract_column_value(
    entity: &str,
    row: &PgRow,
    index: usize,
    name: &str,
    type_name: &str,
) -> Result<Value> {
    let value = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(index)?.map(Value::Bool),
        "INT2" => row
            .try_get::<Option<i16>, _>(index)?
            .map(|v| Value::Int(i64::from(v))),
        "INT4" => row
            .try_get::<Option<i32>, _>(index)?
            .map(|v| Value::Int(i64::from(v))),
        "INT8" => row.try_get::<Option<i64>, _>(index)?.map(Value::Int),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)?
            .map(|v| Value::Double(f64::from(v))),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index)?.map(Value::Double),
        "NUMERIC" => row.try_get::<Option<Decimal>, _>(index)?.map(Value::Decimal),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
            row.try_get::<Option<String>, _>(index)?.map(Value::Text)
        }
        "BYTEA" => row.try_get::<Option<Vec<u8>>, _>(index)?.map(Value::Bytes),
        "UUID" => row.try_get::<Option<Uuid>, _>(index)?.map(Value::Uuid),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(index)?
            .map(Value::Timestamp),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(index)?
            .map(|v| Value::Timestamp(v.and_utc())),
        "DATE" => row.try_get::<Option<NaiveDate>, _>(index)?.map(Value::Date),
        "JSON" | "JSONB" => row
            .try_get::<Option<serde_json::Value>, _>(index)?
            .map(from_plain_json),
        other => {
            warn!(entity, column = name, column_type = other, "unsupported column type");
            return Err(QueryError::conversion(
                entity,
                name,
                format!("unsupported PostgreSQL column type {}", other),
            ));
        }
    };
    Ok(value.unwrap_or(Value::Null))
}

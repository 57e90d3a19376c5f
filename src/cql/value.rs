//! CQL value model and conversion
//!
//! Crate values map onto driver-level CQL values. Integers are carried as
//! `bigint` unless schema metadata says a UDT sub-field is a 32-bit `int`.
//! User-defined values need that metadata for every sub-field.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::compiler::Scope;
use crate::entity::Element;
use crate::error::Result;
use crate::schema::{FieldType, SchemaLookup, declared_field, resolve_user_type};
use crate::value::{UserValue, Value};

/// Driver-level CQL value
#[derive(Debug, Clone, PartialEq)]
pub enum CqlValue {
    Null,
    Boolean(bool),
    Int(i32),
    BigInt(i64),
    Double(f64),
    Decimal(Decimal),
    Text(String),
    Blob(Vec<u8>),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    List(Vec<CqlValue>),
    Map(Vec<(String, CqlValue)>),
    Udt {
        type_name: String,
        fields: Vec<(String, CqlValue)>,
    },
}

/// Convert a crate value for binding
pub fn to_cql(
    value: &Value,
    scope: Scope<'_>,
    schema: Option<&dyn SchemaLookup>,
) -> Result<CqlValue> {
    Ok(match value {
        Value::Null => CqlValue::Null,
        Value::Bool(b) => CqlValue::Boolean(*b),
        Value::Int(i) => CqlValue::BigInt(*i),
        Value::Double(d) => CqlValue::Double(*d),
        Value::Decimal(d) => CqlValue::Decimal(*d),
        Value::Text(s) => CqlValue::Text(s.clone()),
        Value::Bytes(b) => CqlValue::Blob(b.clone()),
        Value::Uuid(u) => CqlValue::Uuid(*u),
        Value::Timestamp(ts) => CqlValue::Timestamp(*ts),
        Value::Date(d) => CqlValue::Date(*d),
        Value::List(items) => CqlValue::List(
            items
                .iter()
                .map(|item| to_cql(item, scope, schema))
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::Map(elements) => CqlValue::Map(
            elements
                .iter()
                .map(|e| -> Result<(String, CqlValue)> {
                    let converted = to_cql(e.value(), scope.nested(e.name()), schema)?;
                    Ok((e.name().to_string(), converted))
                })
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::Udt(udt) => {
            let schema = schema.ok_or_else(|| {
                scope.error(format!(
                    "no schema metadata available for user type '{}'",
                    udt.type_name
                ))
            })?;
            udt_to_cql(udt, scope, schema)?
        }
    })
}

fn udt_to_cql(udt: &UserValue, scope: Scope<'_>, schema: &dyn SchemaLookup) -> Result<CqlValue> {
    let user_type = resolve_user_type(schema, scope.entity, &udt.type_name, scope.field)?;
    let mut fields = Vec::with_capacity(udt.fields.len());
    for element in &udt.fields {
        let field_scope = scope.nested(element.name());
        let declared = declared_field(&user_type, scope.entity, element.name())?;
        fields.push((
            element.name().to_string(),
            typed_to_cql(element.value(), &declared, field_scope, schema)?,
        ));
    }
    Ok(CqlValue::Udt {
        type_name: udt.type_name.clone(),
        fields,
    })
}

/// Convert against a declared column type
fn typed_to_cql(
    value: &Value,
    declared: &FieldType,
    scope: Scope<'_>,
    schema: &dyn SchemaLookup,
) -> Result<CqlValue> {
    Ok(match (declared, value) {
        (_, Value::Null) => CqlValue::Null,
        (FieldType::Int, Value::Int(i)) => CqlValue::Int(
            i32::try_from(*i)
                .map_err(|_| scope.error(format!("value {} is out of range for int", i)))?,
        ),
        (FieldType::BigInt, Value::Int(i)) => CqlValue::BigInt(*i),
        (FieldType::Double, Value::Double(d)) => CqlValue::Double(*d),
        (FieldType::Decimal, Value::Decimal(d)) => CqlValue::Decimal(*d),
        (FieldType::Text, Value::Text(s)) => CqlValue::Text(s.clone()),
        (FieldType::Boolean, Value::Bool(b)) => CqlValue::Boolean(*b),
        (FieldType::Blob, Value::Bytes(b)) => CqlValue::Blob(b.clone()),
        (FieldType::Uuid, Value::Uuid(u)) => CqlValue::Uuid(*u),
        (FieldType::Timestamp, Value::Timestamp(ts)) => CqlValue::Timestamp(*ts),
        (FieldType::Date, Value::Date(d)) => CqlValue::Date(*d),
        (FieldType::List { element }, Value::List(items)) => CqlValue::List(
            items
                .iter()
                .map(|item| typed_to_cql(item, element, scope, schema))
                .collect::<Result<Vec<_>>>()?,
        ),
        (FieldType::Map { value: declared }, Value::Map(entries)) => CqlValue::Map(
            entries
                .iter()
                .map(|e| -> Result<(String, CqlValue)> {
                    let converted =
                        typed_to_cql(e.value(), declared, scope.nested(e.name()), schema)?;
                    Ok((e.name().to_string(), converted))
                })
                .collect::<Result<Vec<_>>>()?,
        ),
        (FieldType::Udt { name }, Value::Udt(udt)) => {
            if &udt.type_name != name {
                return Err(scope.error(format!(
                    "expected user type '{}', found '{}'",
                    name, udt.type_name
                )));
            }
            udt_to_cql(udt, scope, schema)?
        }
        (declared, value) => {
            return Err(scope.error(format!(
                "cannot store {} value in column of type {:?}",
                value.kind(),
                declared
            )));
        }
    })
}

/// Convert a driver value back into a crate value
pub fn from_cql(value: CqlValue) -> Value {
    match value {
        CqlValue::Null => Value::Null,
        CqlValue::Boolean(b) => Value::Bool(b),
        CqlValue::Int(i) => Value::Int(i64::from(i)),
        CqlValue::BigInt(i) => Value::Int(i),
        CqlValue::Double(d) => Value::Double(d),
        CqlValue::Decimal(d) => Value::Decimal(d),
        CqlValue::Text(s) => Value::Text(s),
        CqlValue::Blob(b) => Value::Bytes(b),
        CqlValue::Uuid(u) => Value::Uuid(u),
        CqlValue::Timestamp(ts) => Value::Timestamp(ts),
        CqlValue::Date(d) => Value::Date(d),
        CqlValue::List(items) => Value::List(items.into_iter().map(from_cql).collect()),
        CqlValue::Map(entries) => Value::Map(into_elements(entries)),
        CqlValue::Udt { type_name, fields } => {
            Value::Udt(UserValue::new(type_name, into_elements(fields)))
        }
    }
}

fn into_elements(entries: Vec<(String, CqlValue)>) -> Vec<Element> {
    entries
        .into_iter()
        .map(|(name, value)| Element::new(name, from_cql(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use crate::schema::{StaticSchema, UserType};
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn scope() -> Scope<'static> {
        Scope::new("Person", "address")
    }

    fn address_schema() -> StaticSchema {
        StaticSchema::new().with_type(
            "Person",
            UserType::new("address")
                .field("street", FieldType::Text)
                .field("zip", FieldType::Int)
                .field("tags", FieldType::list(FieldType::Text)),
        )
    }

    fn address(zip: i64) -> Value {
        Value::Udt(UserValue::new(
            "address",
            vec![
                Element::new("street", "Rua A"),
                Element::new("zip", zip),
                Element::new("tags", Value::List(vec![Value::from("home")])),
            ],
        ))
    }

    // ==================== User-defined types ====================

    #[test]
    fn test_udt_uses_declared_field_types() {
        let schema = address_schema();
        let cql = to_cql(&address(19800), scope(), Some(&schema)).unwrap();

        assert_eq!(
            cql,
            CqlValue::Udt {
                type_name: "address".to_string(),
                fields: vec![
                    ("street".to_string(), CqlValue::Text("Rua A".to_string())),
                    ("zip".to_string(), CqlValue::Int(19800)),
                    (
                        "tags".to_string(),
                        CqlValue::List(vec![CqlValue::Text("home".to_string())])
                    ),
                ],
            }
        );
        assert_eq!(from_cql(cql), address(19800));
    }

    #[test]
    fn test_udt_missing_field() {
        let schema = address_schema();
        let value = Value::Udt(UserValue::new(
            "address",
            vec![Element::new("country", "BR")],
        ));
        let err = to_cql(&value, scope(), Some(&schema)).unwrap_err();
        match err {
            QueryError::Conversion { field, message, .. } => {
                assert_eq!(field, "country");
                assert!(message.contains("missing field 'country'"));
            }
            other => panic!("Expected Conversion, got {:?}", other),
        }
    }

    #[test]
    fn test_udt_int_out_of_range() {
        let schema = address_schema();
        let err = to_cql(&address(i64::MAX), scope(), Some(&schema)).unwrap_err();
        assert!(err.to_string().contains("out of range for int"));
    }

    #[test]
    fn test_udt_without_schema() {
        let err = to_cql(&address(1), scope(), None).unwrap_err();
        assert!(err.to_string().contains("no schema metadata"));
    }

    #[test]
    fn test_udt_type_mismatch() {
        let schema = address_schema();
        let value = Value::Udt(UserValue::new("address", vec![Element::new("zip", "abc")]));
        let err = to_cql(&value, scope(), Some(&schema)).unwrap_err();
        assert!(err.to_string().contains("cannot store text value"));
    }

    // ==================== Round trip ====================

    #[test]
    fn test_scalar_round_trip() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let values = vec![
            Value::Null,
            Value::Bool(true),
            Value::Int(-5),
            Value::Double(1.5),
            Value::Decimal(Decimal::new(12345, 2)),
            Value::from("Cassandra"),
            Value::bytes(vec![0_u8, 1, 2]),
            Value::Uuid(Uuid::nil()),
            Value::Timestamp(ts),
            Value::Date(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()),
        ];
        for value in values {
            let cql = to_cql(&value, scope(), None).unwrap();
            assert_eq!(from_cql(cql), value);
        }
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            (-1.0e12..1.0e12_f64).prop_map(Value::Double),
            any::<i64>().prop_map(|n| Value::Decimal(Decimal::new(n, 4))),
            ".{0,12}".prop_map(Value::Text),
            proptest::collection::vec(any::<u8>(), 0..8).prop_map(Value::Bytes),
            any::<u128>().prop_map(|n| Value::Uuid(Uuid::from_u128(n))),
            (0_i64..4_000_000_000).prop_map(|s| {
                Value::Timestamp(DateTime::from_timestamp(s, 0).unwrap_or_default())
            }),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
                proptest::collection::vec(("[a-z]{1,6}", inner), 0..4).prop_map(|entries| {
                    Value::Map(
                        entries
                            .into_iter()
                            .map(|(k, v)| Element::new(k, v))
                            .collect(),
                    )
                }),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_cql_round_trip(value in arb_value()) {
            let cql = to_cql(&value, scope(), None).unwrap();
            prop_assert_eq!(from_cql(cql), value);
        }
    }
}

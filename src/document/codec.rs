//! Document value codec
//!
//! Values are stored as relaxed Extended JSON. Types JSON has no literal for
//! are wrapped in a single-key tag object (`$numberDecimal`, `$numberDouble`,
//! `$binary`, `$date`), which is why plain map keys may not start with `$`.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value as JsonValue, json};
use uuid::Uuid;

use crate::compiler::Scope;
use crate::entity::Element;
use crate::error::Result;
use crate::value::Value;

const SUBTYPE_GENERIC: &str = "00";
const SUBTYPE_UUID: &str = "04";

/// Encode a value as a document field
pub fn to_document(value: &Value, scope: Scope<'_>) -> Result<JsonValue> {
    Ok(match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Int(i) => JsonValue::Number(Number::from(*i)),
        Value::Double(d) => match Number::from_f64(*d) {
            Some(n) => JsonValue::Number(n),
            None => json!({ "$numberDouble": non_finite_text(*d) }),
        },
        Value::Decimal(d) => json!({ "$numberDecimal": d.to_string() }),
        Value::Text(s) => JsonValue::String(s.clone()),
        Value::Bytes(b) => binary(b, SUBTYPE_GENERIC),
        Value::Uuid(u) => binary(u.as_bytes(), SUBTYPE_UUID),
        Value::Timestamp(ts) => {
            json!({ "$date": ts.to_rfc3339_opts(SecondsFormat::AutoSi, true) })
        }
        Value::Date(d) => json!({ "$date": d.format("%Y-%m-%d").to_string() }),
        Value::List(items) => JsonValue::Array(
            items
                .iter()
                .map(|item| to_document(item, scope))
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::Map(elements) => {
            let mut object = Map::with_capacity(elements.len());
            for element in elements {
                let key = element.name();
                if key.starts_with('$') {
                    return Err(scope.error(format!(
                        "document key '{}' may not start with '$'",
                        key
                    )));
                }
                let encoded = to_document(element.value(), scope.nested(key))?;
                if object.insert(key.to_string(), encoded).is_some() {
                    return Err(scope.error(format!("duplicate document key '{}'", key)));
                }
            }
            JsonValue::Object(object)
        }
        Value::Udt(udt) => {
            return Err(scope.error(format!(
                "user-defined value of type '{}' cannot be stored in a document",
                udt.type_name
            )));
        }
    })
}

/// Decode a document field
pub fn from_document(json: &JsonValue, scope: Scope<'_>) -> Result<Value> {
    Ok(match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) if !n.is_f64() => Value::Int(i),
            _ => Value::Double(
                n.as_f64()
                    .ok_or_else(|| scope.error(format!("number {} is out of range", n)))?,
            ),
        },
        JsonValue::String(s) => Value::Text(s.clone()),
        JsonValue::Array(items) => Value::List(
            items
                .iter()
                .map(|item| from_document(item, scope))
                .collect::<Result<Vec<_>>>()?,
        ),
        JsonValue::Object(object) => match tag(object) {
            Some((name, body)) => from_tagged(name, body, scope)?,
            None => {
                let mut elements = Vec::with_capacity(object.len());
                for (key, value) in object {
                    if key.starts_with('$') {
                        return Err(scope.error(format!("unknown extended JSON tag '{}'", key)));
                    }
                    elements.push(Element::new(
                        key.clone(),
                        from_document(value, scope.nested(key))?,
                    ));
                }
                Value::Map(elements)
            }
        },
    })
}

fn binary(bytes: &[u8], sub_type: &str) -> JsonValue {
    json!({ "$binary": { "base64": STANDARD.encode(bytes), "subType": sub_type } })
}

fn non_finite_text(d: f64) -> &'static str {
    if d.is_nan() {
        "NaN"
    } else if d.is_sign_positive() {
        "Infinity"
    } else {
        "-Infinity"
    }
}

/// Single-key object whose key is a known tag
fn tag(object: &Map<String, JsonValue>) -> Option<(&str, &JsonValue)> {
    if object.len() != 1 {
        return None;
    }
    let (key, body) = object.iter().next()?;
    matches!(
        key.as_str(),
        "$numberDecimal" | "$numberDouble" | "$binary" | "$date"
    )
    .then_some((key.as_str(), body))
}

fn from_tagged(name: &str, body: &JsonValue, scope: Scope<'_>) -> Result<Value> {
    let text = |body: &JsonValue| {
        body.as_str()
            .map(str::to_string)
            .ok_or_else(|| scope.error(format!("{} expects a string", name)))
    };

    match name {
        "$numberDecimal" => text(body)?
            .parse::<Decimal>()
            .map(Value::Decimal)
            .map_err(|e| scope.error(format!("invalid decimal: {}", e))),
        "$numberDouble" => match text(body)?.as_str() {
            "NaN" => Ok(Value::Double(f64::NAN)),
            "Infinity" => Ok(Value::Double(f64::INFINITY)),
            "-Infinity" => Ok(Value::Double(f64::NEG_INFINITY)),
            other => other
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|e| scope.error(format!("invalid double: {}", e))),
        },
        "$date" => {
            let raw = text(body)?;
            if raw.len() == 10 {
                NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                    .map(Value::Date)
                    .map_err(|e| scope.error(format!("invalid date: {}", e)))
            } else {
                DateTime::parse_from_rfc3339(&raw)
                    .map(|ts| Value::Timestamp(ts.with_timezone(&Utc)))
                    .map_err(|e| scope.error(format!("invalid timestamp: {}", e)))
            }
        }
        _ => {
            let encoded = body.get("base64").and_then(JsonValue::as_str);
            let sub_type = body.get("subType").and_then(JsonValue::as_str);
            let (Some(encoded), Some(sub_type)) = (encoded, sub_type) else {
                return Err(scope.error("$binary requires base64 and subType"));
            };
            let bytes = STANDARD
                .decode(encoded)
                .map_err(|e| scope.error(format!("invalid base64: {}", e)))?;
            match sub_type {
                SUBTYPE_UUID => Uuid::from_slice(&bytes)
                    .map(Value::Uuid)
                    .map_err(|e| scope.error(format!("invalid uuid: {}", e))),
                SUBTYPE_GENERIC => Ok(Value::Bytes(bytes)),
                other => Err(scope.error(format!("unsupported binary subType '{}'", other))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use crate::value::UserValue;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn scope() -> Scope<'static> {
        Scope::new("Person", "field")
    }

    #[test]
    fn test_tagged_encodings() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(
            to_document(&Value::Decimal(Decimal::new(12345, 2)), scope()).unwrap(),
            json!({"$numberDecimal": "123.45"})
        );
        assert_eq!(
            to_document(&Value::bytes(vec![1_u8, 2, 3]), scope()).unwrap(),
            json!({"$binary": {"base64": "AQID", "subType": "00"}})
        );
        assert_eq!(
            to_document(&Value::Timestamp(ts), scope()).unwrap(),
            json!({"$date": "2024-05-01T12:30:00Z"})
        );
        assert_eq!(
            to_document(&Value::Date(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()), scope())
                .unwrap(),
            json!({"$date": "2024-05-01"})
        );
    }

    #[test]
    fn test_uuid_uses_subtype_04() {
        let id = Uuid::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef);
        let doc = to_document(&Value::Uuid(id), scope()).unwrap();
        assert_eq!(doc["$binary"]["subType"], json!("04"));
        assert_eq!(from_document(&doc, scope()).unwrap(), Value::Uuid(id));
    }

    #[test]
    fn test_udt_rejected() {
        let udt = Value::Udt(UserValue::new("address", vec![]));
        let err = to_document(&udt, scope()).unwrap_err();
        assert!(err.to_string().contains("cannot be stored in a document"));
    }

    #[test]
    fn test_dollar_keys_rejected() {
        let value = Value::map([("$where", 1)]);
        assert!(to_document(&value, scope()).is_err());
        assert!(from_document(&json!({"$where": 1}), scope()).is_err());
    }

    #[test]
    fn test_non_finite_doubles() {
        let doc = to_document(&Value::Double(f64::NEG_INFINITY), scope()).unwrap();
        assert_eq!(doc, json!({"$numberDouble": "-Infinity"}));
        assert_eq!(
            from_document(&doc, scope()).unwrap(),
            Value::Double(f64::NEG_INFINITY)
        );
    }

    #[test]
    fn test_integral_double_stays_double() {
        let doc = to_document(&Value::Double(2.0), scope()).unwrap();
        assert_eq!(from_document(&doc, scope()).unwrap(), Value::Double(2.0));
    }

    fn has_duplicate_keys(value: &Value) -> bool {
        match value {
            Value::List(items) => items.iter().any(has_duplicate_keys),
            Value::Map(elements) => {
                elements
                    .iter()
                    .enumerate()
                    .any(|(i, e)| elements[..i].iter().any(|prev| prev.name() == e.name()))
                    || elements.iter().any(|e| has_duplicate_keys(e.value()))
            }
            _ => false,
        }
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let value = Value::Map(vec![Element::new("a", 1), Element::new("a", 2)]);
        let err = to_document(&value, scope()).unwrap_err();
        assert!(matches!(err, QueryError::Conversion { .. }));
        assert!(err.to_string().contains("duplicate document key 'a'"));
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            (-1.0e12..1.0e12_f64).prop_map(Value::Double),
            any::<i64>().prop_map(|n| Value::Decimal(Decimal::new(n, 3))),
            ".{0,12}".prop_map(Value::Text),
            proptest::collection::vec(any::<u8>(), 0..8).prop_map(Value::Bytes),
            any::<u128>().prop_map(|n| Value::Uuid(Uuid::from_u128(n))),
            (0_i64..4_000_000_000, 0_u32..1_000_000_000).prop_map(|(s, n)| {
                Value::Timestamp(DateTime::from_timestamp(s, n).unwrap_or_default())
            }),
            (1_i32..3_000_000).prop_map(|d| {
                Value::Date(NaiveDate::from_num_days_from_ce_opt(d).unwrap_or_default())
            }),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
                proptest::collection::vec(("[a-c]{1,2}", inner), 0..4).prop_map(|entries| {
                    Value::Map(entries.into_iter().map(|(k, v)| Element::new(k, v)).collect())
                }),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_document_round_trip(value in arb_value()) {
            match to_document(&value, scope()) {
                Ok(doc) => {
                    prop_assert!(!has_duplicate_keys(&value));
                    prop_assert_eq!(from_document(&doc, scope()).unwrap(), value);
                }
                Err(err) => {
                    prop_assert!(has_duplicate_keys(&value));
                    prop_assert!(matches!(err, QueryError::Conversion { .. }), "{}", err);
                }
            }
        }
    }
}

//! Plain JSON rendering of values
//!
//! Used where a backend takes bare JSON terms (search terms, AQL bind
//! variables, PostgreSQL json columns). The mapping is lossy on the way back:
//! decimals, bytes, UUIDs and temporals all come back as text.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::{Map, Number, Value as JsonValue};

use crate::compiler::Scope;
use crate::entity::Element;
use crate::error::Result;
use crate::value::Value;

/// Render `value` as a plain JSON term
pub fn to_plain_json(value: &Value, scope: Scope<'_>) -> Result<JsonValue> {
    Ok(match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Int(i) => JsonValue::Number(Number::from(*i)),
        Value::Double(d) => Number::from_f64(*d)
            .map(JsonValue::Number)
            .ok_or_else(|| scope.error(format!("non-finite double {} has no JSON form", d)))?,
        Value::Decimal(d) => JsonValue::String(d.to_string()),
        Value::Text(s) => JsonValue::String(s.clone()),
        Value::Bytes(b) => JsonValue::String(STANDARD.encode(b)),
        Value::Uuid(u) => JsonValue::String(u.to_string()),
        Value::Timestamp(ts) => JsonValue::String(ts.to_rfc3339()),
        Value::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
        Value::List(items) => JsonValue::Array(
            items
                .iter()
                .map(|item| to_plain_json(item, scope))
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::Map(elements) => {
            let mut object = Map::with_capacity(elements.len());
            for element in elements {
                let key = element.name();
                let rendered = to_plain_json(element.value(), scope.nested(key))?;
                if object.insert(key.to_string(), rendered).is_some() {
                    return Err(scope.error(format!("duplicate map key '{}'", key)));
                }
            }
            JsonValue::Object(object)
        }
        Value::Udt(udt) => {
            return Err(scope.error(format!(
                "user-defined value of type '{}' has no plain JSON form",
                udt.type_name
            )));
        }
    })
}

/// Read a plain JSON document back into a value
pub fn from_plain_json(json: JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(s) => Value::Text(s),
        JsonValue::Array(items) => Value::List(items.into_iter().map(from_plain_json).collect()),
        JsonValue::Object(object) => Value::Map(
            object
                .into_iter()
                .map(|(k, v)| Element::new(k, from_plain_json(v)))
                .collect(),
        ),
    }
}

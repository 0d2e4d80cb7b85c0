use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::{Map, Number, Value};

use super::{Item, StorageError};

pub fn to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(values) => AttributeValue::L(values.iter().map(to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(to_attribute_map(map)),
    }
}

pub fn to_attribute_map(item: &Item) -> HashMap<String, AttributeValue> {
    item.iter()
        .map(|(k, v)| (k.clone(), to_attribute(v)))
        .collect()
}

pub fn from_attribute(name: &str, attr: &AttributeValue) -> Result<Value, StorageError> {
    let value = match attr {
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::N(n) => parse_number(name, n)?,
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::Ss(set) => Value::Array(set.iter().cloned().map(Value::String).collect()),
        AttributeValue::Ns(set) => Value::Array(
            set.iter()
                .map(|n| parse_number(name, n))
                .collect::<Result<_, _>>()?,
        ),
        AttributeValue::L(values) => Value::Array(
            values
                .iter()
                .map(|v| from_attribute(name, v))
                .collect::<Result<_, _>>()?,
        ),
        AttributeValue::M(map) => Value::Object(from_attribute_map(map)?),
        // Binary payloads live in object storage, never in the tables.
        _ => return Err(StorageError::Decode(name.to_string())),
    };
    Ok(value)
}

pub fn from_attribute_map(map: &HashMap<String, AttributeValue>) -> Result<Item, StorageError> {
    let mut item = Map::new();
    for (name, attr) in map {
        item.insert(name.clone(), from_attribute(name, attr)?);
    }
    Ok(item)
}

fn parse_number(name: &str, raw: &str) -> Result<Value, StorageError> {
    if let Ok(i) = raw.parse::<i64>() {
        return Ok(Value::from(i));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| StorageError::Decode(name.to_string()))
}

//! Cleans tool input schemas into the subset Gemini accepts for function
//! declarations.
//!
//! The cleaning follows the shape MCP servers actually emit: keywords are
//! removed at the schema root and from each entry of its `properties` map, and
//! a property's `items` schema is cleaned the same way when it is an object.
//! Object properties that carry their own nested `properties` (without going
//! through `items`) are left untouched.

use serde_json::{json, Map, Value};

/// Keys removed from a schema root.
pub const ROOT_KEYS_REMOVED: &[&str] = &["additionalProperties", "$schema"];

/// Keys removed from every entry of a `properties` map.
pub const PROPERTY_KEYS_REMOVED: &[&str] = &["default", "examples", "format"];

/// Schema used when a tool declares no input schema at all.
pub fn empty_object_schema() -> Value {
    json!({
        "type": "object",
        "properties": {}
    })
}

/// Returns the normalized copy of `schema`. Non-object values are returned
/// unchanged. Normalizing twice gives the same result as normalizing once.
pub fn normalize_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(obj) => Value::Object(normalize_object(obj)),
        other => other.clone(),
    }
}

fn normalize_object(schema: &Map<String, Value>) -> Map<String, Value> {
    let mut cleaned: Map<String, Value> = schema
        .iter()
        .filter(|(key, _)| !ROOT_KEYS_REMOVED.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    if let Some(Value::Object(properties)) = cleaned.get_mut("properties") {
        for property in properties.values_mut() {
            if let Value::Object(prop) = property {
                *prop = normalize_property(prop);
            }
        }
    }

    cleaned
}

fn normalize_property(property: &Map<String, Value>) -> Map<String, Value> {
    let mut cleaned: Map<String, Value> = property
        .iter()
        .filter(|(key, _)| !PROPERTY_KEYS_REMOVED.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    if let Some(Value::Object(items)) = cleaned.get_mut("items") {
        *items = normalize_object(items);
    }

    cleaned
}

//! Lenient field deserializers for relay payloads.
//!
//! The relay schema drifts between deployments, so every field is read
//! best-effort: a value of the wrong shape becomes `None` (or an empty
//! collection) instead of failing the surrounding record.

use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Canonical field name and the other names relay builds have used for it,
/// in order of preference
pub type Aliases = &'static [(&'static str, &'static [&'static str])];

/// Fold alternative field names into their canonical name.
///
/// The first non-null name wins, canonical first. Every other spelling is
/// removed, so an object carrying several names for one field still reads.
pub fn resolve_aliases(object: &mut Map<String, Value>, aliases: Aliases) {
    for (canonical, alternatives) in aliases {
        let mut chosen = object.remove(*canonical).filter(|value| !value.is_null());
        for alternative in alternatives.iter() {
            let value = object.remove(*alternative).filter(|value| !value.is_null());
            if chosen.is_none() {
                chosen = value;
            }
        }
        if let Some(value) = chosen {
            object.insert(canonical.to_string(), value);
        }
    }
}

/// [`resolve_aliases`] on the object stored under `key`, if there is one
pub fn resolve_nested_aliases(object: &mut Map<String, Value>, key: &str, aliases: Aliases) {
    if let Some(Value::Object(nested)) = object.get_mut(key) {
        resolve_aliases(nested, aliases);
    }
}

/// Finite number from a JSON number or numeric string
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|number| number.is_finite())
}

/// Non-empty string from a JSON string, or the textual form of a number/bool
pub fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
    .filter(|text| !text.is_empty())
}

pub fn f64_opt<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_f64))
}

pub fn string_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_string))
}

/// Any nested structure; shape mismatches yield `None`
pub fn nested_opt<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| serde_json::from_value(value).ok()))
}

/// Length of a JSON array, zero for anything else
pub fn array_len<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items.len(),
        _ => 0,
    })
}

use medivault_core::{CoreError, CoreResult};
use serde::Serialize;
use serde_json::Value;

/// A condition or allergy as extracted upstream: either a bare string or an object
/// carrying a `name` (or one of the field-specific aliases).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClinicalEntry {
    pub name: String,
    pub severity: Option<String>,
    pub reaction: Option<String>,
}

impl ClinicalEntry {
    /// Parse one entry. `field` names the entry in errors, e.g. `conditions[2]`.
    pub fn from_value(value: &Value, field: &str, aliases: &[&str]) -> CoreResult<Self> {
        match value {
            Value::String(s) => Self::named(s, field),
            Value::Object(map) => {
                let name = std::iter::once("name")
                    .chain(aliases.iter().copied())
                    .find_map(|key| map.get(key).and_then(Value::as_str))
                    .ok_or_else(|| {
                        CoreError::bundle(field, "object entry has no string `name`")
                    })?;
                let mut entry = Self::named(name, field)?;
                entry.severity = map.get("severity").and_then(Value::as_str).map(str::to_string);
                entry.reaction = map.get("reaction").and_then(Value::as_str).map(str::to_string);
                Ok(entry)
            }
            other => Err(CoreError::bundle(
                field,
                format!("expected a string or an object, found {}", json_kind(other)),
            )),
        }
    }

    /// Parse a whole list, naming each entry `{list}[{index}]`.
    pub fn parse_list(values: &[Value], list: &str, aliases: &[&str]) -> CoreResult<Vec<Self>> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Self::from_value(v, &format!("{}[{}]", list, i), aliases))
            .collect()
    }

    fn named(name: &str, field: &str) -> CoreResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::bundle(field, "entry name is blank"));
        }
        Ok(Self {
            name: name.to_string(),
            severity: None,
            reaction: None,
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

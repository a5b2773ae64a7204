//! Konfiguration and values file parsing (YAML or JSON by extension).

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::konfig::ValuesMap;
use crate::utils::io;

/// Parse a config file into a typed value, choosing the format from the
/// file extension. Only `.yaml` and `.json` are accepted.
pub fn read_config_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = io::read_file(path, "read config file")?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content).map_err(|e| {
            Error::internal_json(e.to_string(), Some(path.display().to_string()))
        }),
        Some("yaml") => serde_yml::from_str(&content).map_err(|e| {
            Error::konfig_invalid_value("file", format!("{}: {}", path.display(), e))
        }),
        _ => Err(Error::konfig_invalid_value(
            "file",
            format!(
                "Invalid filepath '{}' provided for values file; extension must be .yaml or .json",
                path.display()
            ),
        )),
    }
}

/// Read a values file, requiring a mapping at the top level.
pub fn read_values_file(path: &Path) -> Result<ValuesMap> {
    let value: serde_json::Value = read_config_file(path)?;
    match value {
        serde_json::Value::Object(map) => Ok(map),
        serde_json::Value::Null => Ok(ValuesMap::new()),
        other => Err(Error::konfig_invalid_value(
            "values",
            format!(
                "Values file '{}' must contain a mapping, got {}",
                path.display(),
                value_type_name(&other)
            ),
        )),
    }
}

/// Read a values file that may legitimately be absent. Missing or unreadable
/// files read as an empty mapping.
pub fn read_optional_values_file(path: &Path) -> ValuesMap {
    read_values_file(path).unwrap_or_default()
}

fn value_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

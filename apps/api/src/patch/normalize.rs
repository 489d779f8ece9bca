//! Shape coercion for suggested and original values.
//!
//! The generator is free to return `"React, Node.js"` for a field the profile
//! stores as `["React", "Node.js"]`. Fields are classified by the name of the
//! last path segment only, so `projects.3.technologies` and `technologies`
//! are treated alike.

use serde_json::Value;

use crate::patch::path::FieldPath;

/// Field-name suffixes that always hold an array of strings.
pub const ARRAY_FIELDS: &[&str] = &["technologies", "role", "skills", "proficiencies", "languages"];

/// True if the final segment of `field_path` equals or ends with an array field name.
pub fn is_array_field(field_path: &str) -> bool {
    let leaf = match FieldPath::parse(field_path) {
        Ok(path) => path.leaf_name(),
        // Unparseable paths are still classified by their trailing text.
        Err(_) => field_path.rsplit('.').next().unwrap_or_default().to_string(),
    };
    let leaf = leaf.to_ascii_lowercase();
    ARRAY_FIELDS.iter().any(|name| leaf.ends_with(name))
}

/// Converts `value` into the shape `field_path` expects. Never fails:
/// anything that cannot become a list for an array field becomes `[]`.
pub fn normalize(field_path: &str, value: &Value) -> Value {
    if !is_array_field(field_path) {
        return value.clone();
    }

    match value {
        Value::Array(_) => value.clone(),
        Value::String(s) => Value::Array(
            s.split(',')
                .map(str::trim)
                .filter(|piece| !piece.is_empty())
                .map(|piece| Value::String(piece.to_string()))
                .collect(),
        ),
        _ => Value::Array(Vec::new()),
    }
}

/// Same as [`normalize`] for optional values; absent is treated as `null`.
pub fn normalize_opt(field_path: &str, value: Option<&Value>) -> Value {
    normalize(field_path, value.unwrap_or(&Value::Null))
}

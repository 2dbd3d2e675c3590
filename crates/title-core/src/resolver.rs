use crate::vault::{basename, DocumentFile, Metadata};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Frontmatter property holding alternative names for a document.
pub const ALIASES_KEY: &str = "aliases";

/// What every surface shows for one document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DisplayRecord {
    pub path: String,
    pub display_name: String,
    pub aliases: Vec<String>,
    /// True when `display_name` came from frontmatter rather than the file name.
    pub is_custom_display: bool,
    pub last_modified: DateTime<Utc>,
}

impl DisplayRecord {
    pub fn basename(&self) -> &str {
        basename(&self.path)
    }
}

/// String form of a scalar frontmatter value. Arrays, maps and null are not scalars.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// The trimmed value of `property_key` when it is a scalar that trims non-empty.
pub fn custom_display_name(metadata: Option<&Metadata>, property_key: &str) -> Option<String> {
    let value = metadata?.get(property_key)?;
    let text = scalar_to_string(value)?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Aliases from a scalar or an array: trimmed, empties dropped, order and
/// duplicates kept. Non-scalar array elements are skipped.
pub fn normalize_aliases(value: Option<&Value>) -> Vec<String> {
    let items: Vec<&Value> = match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(scalar) => vec![scalar],
        None => Vec::new(),
    };
    items
        .into_iter()
        .filter_map(scalar_to_string)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Compute the display record of a document.
///
/// This is the only place display names are derived; caches and surfaces
/// call it rather than reading frontmatter themselves.
pub fn resolve(file: &DocumentFile, metadata: Option<&Metadata>, property_key: &str) -> DisplayRecord {
    let custom = custom_display_name(metadata, property_key);
    let aliases = normalize_aliases(metadata.and_then(|m| m.get(ALIASES_KEY)));
    DisplayRecord {
        path: file.path.clone(),
        is_custom_display: custom.is_some(),
        display_name: custom.unwrap_or_else(|| file.basename().to_string()),
        aliases,
        last_modified: file.last_modified,
    }
}

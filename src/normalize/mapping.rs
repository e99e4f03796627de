use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;

use super::KeyCollision;
use super::Normalized;
use super::fold_key;
use super::join_path;

/// Renames keys of the object found at `path`. Array elements share their
/// parent's path, so indices never show up in it.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub mappings: IndexMap<String, String>,
    /// Also apply the renames to every object below `path`
    #[serde(default)]
    pub subtree: bool,
}

impl FieldMapping {
    pub fn applies_to(&self, current_path: &str) -> bool {
        if self.path == current_path {
            return true;
        }

        self.subtree
            && (self.path.is_empty()
                || current_path
                    .strip_prefix(self.path.as_str())
                    .is_some_and(|rest| rest.starts_with('.')))
    }

    pub fn rename<'a>(&'a self, key: &'a str) -> &'a str {
        match self.mappings.get(key) {
            Some(new_key) if !new_key.is_empty() => new_key,
            _ => key,
        }
    }

    /// The mapping with its path and both sides of every rename folded the
    /// way response keys are folded when a suite ignores case.
    pub fn folded(&self) -> Self {
        Self {
            path: fold_key(&self.path),
            mappings: self
                .mappings
                .iter()
                .map(|(from, to)| (fold_key(from), fold_key(to)))
                .collect(),
            subtree: self.subtree,
        }
    }
}

/// Rewrites object keys of `value` using the first mapping that applies at
/// each address. Recursion continues under the renamed key, so nested
/// mappings are written against the renamed layout.
///
/// When a rename lands on a key that is already present, the later key in
/// document order wins.
pub fn apply_field_mappings(
    value: &Value,
    field_mappings: &[FieldMapping],
    current_path: &str,
) -> Value {
    map_fields(value, field_mappings, current_path).value
}

/// Same as [`apply_field_mappings`], but also reports every key that was
/// overwritten by a rename.
pub fn map_fields(
    value: &Value,
    field_mappings: &[FieldMapping],
    current_path: &str,
) -> Normalized {
    let mut collisions = Vec::new();
    let value = if field_mappings.is_empty() {
        value.clone()
    } else {
        map_value(value, field_mappings, current_path, &mut collisions)
    };

    Normalized { value, collisions }
}

fn map_value(
    value: &Value,
    field_mappings: &[FieldMapping],
    current_path: &str,
    collisions: &mut Vec<KeyCollision>,
) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| map_value(item, field_mappings, current_path, collisions))
                .collect(),
        ),
        Value::Object(map) => {
            let mapping = field_mappings
                .iter()
                .find(|mapping| mapping.applies_to(current_path));

            let mut mapped = Map::with_capacity(map.len());
            let mut sources: IndexMap<&str, Vec<String>> = IndexMap::new();

            for (key, child) in map {
                let new_key = mapping.map_or(key.as_str(), |mapping| mapping.rename(key));
                let next_path = join_path(current_path, new_key);

                mapped.insert(
                    new_key.to_string(),
                    map_value(child, field_mappings, &next_path, collisions),
                );
                sources.entry(new_key).or_default().push(key.clone());
            }

            collisions.extend(
                sources
                    .into_iter()
                    .filter(|(_, originals)| originals.len() > 1)
                    .map(|(normalized, originals)| KeyCollision {
                        path: join_path(current_path, normalized),
                        normalized: normalized.to_string(),
                        originals,
                    }),
            );

            Value::Object(mapped)
        }
        other => other.clone(),
    }
}

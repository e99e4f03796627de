use indexmap::IndexMap;
use serde_json::Map;
use serde_json::Value;

use super::join_path;

/// Two or more source keys that were folded or renamed into the same key.
/// Only the value of the last one survives in the normalized object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCollision {
    pub path: String,
    pub normalized: String,
    pub originals: Vec<String>,
}

#[derive(Debug)]
pub struct Normalized {
    pub value: Value,
    pub collisions: Vec<KeyCollision>,
}

/// Lowercases a key and strips every underscore: `User_Id` becomes `userid`.
pub fn fold_key(key: &str) -> String {
    key.to_lowercase().replace('_', "")
}

/// Folds every object key with [`fold_key`]. String values are lowercased too
/// when `convert_values` is set.
///
/// Keys are visited in document order, so when two keys fold to the same
/// name the later value overwrites the earlier one while keeping the earlier
/// key's position.
pub fn to_lower_case_keys(value: &Value, convert_values: bool) -> Value {
    normalize_keys(value, convert_values).value
}

/// Same as [`to_lower_case_keys`], but also reports every key collision.
pub fn normalize_keys(value: &Value, convert_values: bool) -> Normalized {
    let mut collisions = Vec::new();
    let value = fold_value(value, convert_values, "", &mut collisions);

    Normalized { value, collisions }
}

fn fold_value(
    value: &Value,
    convert_values: bool,
    path: &str,
    collisions: &mut Vec<KeyCollision>,
) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| fold_value(item, convert_values, path, collisions))
                .collect(),
        ),
        Value::Object(map) => {
            let mut folded = Map::with_capacity(map.len());
            let mut sources: IndexMap<String, Vec<String>> = IndexMap::new();

            for (key, child) in map {
                let new_key = fold_key(key);
                let child_path = join_path(path, &new_key);

                folded.insert(
                    new_key.clone(),
                    fold_value(child, convert_values, &child_path, collisions),
                );
                sources.entry(new_key).or_default().push(key.clone());
            }

            collisions.extend(
                sources
                    .into_iter()
                    .filter(|(_, originals)| originals.len() > 1)
                    .map(|(normalized, originals)| KeyCollision {
                        path: join_path(path, &normalized),
                        normalized,
                        originals,
                    }),
            );

            Value::Object(folded)
        }
        Value::String(s) if convert_values => Value::String(s.to_lowercase()),
        other => other.clone(),
    }
}

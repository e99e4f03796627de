use serde_json::Value;

/// Drops every object key named in `ignore_fields`, at any depth.
///
/// Keys are matched by name only, never by path.
pub fn remove_ignored_fields(value: &Value, ignore_fields: &[String], ignore_case: bool) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| remove_ignored_fields(item, ignore_fields, ignore_case))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !is_ignored(key, ignore_fields, ignore_case))
                .map(|(key, child)| {
                    (
                        key.clone(),
                        remove_ignored_fields(child, ignore_fields, ignore_case),
                    )
                })
                .collect(),
        ),
        other => other.clone(),
    }
}

fn is_ignored(key: &str, ignore_fields: &[String], ignore_case: bool) -> bool {
    ignore_fields.iter().any(|field| {
        if ignore_case {
            field.to_lowercase() == key.to_lowercase()
        } else {
            field == key
        }
    })
}

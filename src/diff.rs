use std::fmt;
use std::fmt::Display;

use serde::Serialize;
use serde_json::Value;

use crate::normalize::join_path;

/// One place where the two normalized bodies disagree. `None` means the key
/// is absent on that side, which is not the same as an explicit `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffEntry {
    pub path: String,
    #[serde(rename = "valueA", skip_serializing_if = "Option::is_none")]
    pub value_a: Option<Value>,
    #[serde(rename = "valueB", skip_serializing_if = "Option::is_none")]
    pub value_b: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Absent,
    Null,
    Bool,
    Number,
    String,
    /// Arrays and objects alike, arrays being keyed by index
    Container,
}

impl Kind {
    fn of(value: Option<&Value>) -> Self {
        match value {
            None => Kind::Absent,
            Some(Value::Null) => Kind::Null,
            Some(Value::Bool(_)) => Kind::Bool,
            Some(Value::Number(_)) => Kind::Number,
            Some(Value::String(_)) => Kind::String,
            Some(Value::Array(_) | Value::Object(_)) => Kind::Container,
        }
    }
}

/// Structural diff of two bodies.
///
/// Object keys are compared regardless of their order: A's keys are visited
/// first, then the keys only B has. Arrays take part as objects keyed by
/// their indices, so `[1]` and `{"0": 1}` are equal. Only mismatching leaves
/// are reported, depth first.
pub fn diff_objects(a: &Value, b: &Value) -> Vec<DiffEntry> {
    let mut diffs = Vec::new();
    diff_at(Some(a), Some(b), "", &mut diffs);
    diffs
}

fn diff_at(a: Option<&Value>, b: Option<&Value>, path: &str, diffs: &mut Vec<DiffEntry>) {
    if Kind::of(a) != Kind::of(b) {
        diffs.push(entry(path, a, b));
        return;
    }

    match (a, b) {
        (Some(a @ (Value::Array(_) | Value::Object(_))), Some(b)) => {
            for (key, value_a) in children(a) {
                diff_at(Some(value_a), child(b, &key), &join_path(path, &key), diffs);
            }
            for (key, value_b) in children(b) {
                if child(a, &key).is_none() {
                    diff_at(None, Some(value_b), &join_path(path, &key), diffs);
                }
            }
        }
        (Some(value_a), Some(value_b)) => {
            if !scalar_eq(value_a, value_b) {
                diffs.push(entry(path, a, b));
            }
        }
        _ => {}
    }
}

/// Keys of a container in order, indices for arrays.
fn children(value: &Value) -> Vec<(String, &Value)> {
    match value {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| (index.to_string(), item))
            .collect(),
        Value::Object(map) => map.iter().map(|(key, child)| (key.clone(), child)).collect(),
        _ => Vec::new(),
    }
}

fn child<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        // Only the canonical spelling addresses an element, `01` does not
        Value::Array(items) => key
            .parse::<usize>()
            .ok()
            .filter(|index| index.to_string() == key)
            .and_then(|index| items.get(index)),
        Value::Object(map) => map.get(key),
        _ => None,
    }
}

fn scalar_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        // 1 and 1.0 are the same number on the wire
        (Value::Number(x), Value::Number(y)) => {
            x == y || matches!((x.as_f64(), y.as_f64()), (Some(x), Some(y)) if x == y)
        }
        _ => a == b,
    }
}

fn entry(path: &str, a: Option<&Value>, b: Option<&Value>) -> DiffEntry {
    DiffEntry {
        path: path.to_string(),
        value_a: a.cloned(),
        value_b: b.cloned(),
    }
}

impl Display for DiffEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() {
            "<root>"
        } else {
            self.path.as_str()
        };

        writeln!(f, "{}", console::style(path).yellow().bold())?;
        writeln!(
            f,
            "  {} {}",
            console::style("A:").green(),
            console::style(render(self.value_a.as_ref())).green()
        )?;
        write!(
            f,
            "  {} {}",
            console::style("B:").red(),
            console::style(render(self.value_b.as_ref())).red()
        )
    }
}

fn render(value: Option<&Value>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "<absent>".into(),
    }
}

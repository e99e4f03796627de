use serde_json::Value;
use tracing::warn;

use crate::diff::DiffEntry;
use crate::diff::diff_objects;
use crate::normalize::KeyCollision;
use crate::normalize::map_fields;
use crate::normalize::normalize_keys;
use crate::normalize::remove_ignored_fields;
use crate::validator::SuitePlan;
use crate::validator::TestPlan;

pub struct Asserter;

/// Both bodies after normalization, and where they differ.
#[derive(Debug)]
pub struct Comparison {
    pub diffs: Vec<DiffEntry>,
    pub a: Value,
    pub b: Value,
}

impl Comparison {
    pub fn passed(&self) -> bool {
        self.diffs.is_empty()
    }
}

impl Asserter {
    /// Normalizes the two raw bodies of one case and diffs them.
    ///
    /// With `ignore_case` both sides get their keys folded first. Field
    /// mappings then rename A into B's layout, and ignored fields are removed
    /// from both. Keys that collapse into one are logged, never fatal.
    pub fn compare(suite: &SuitePlan, test: &TestPlan, a: Value, b: Value) -> Comparison {
        let (a, b) = if suite.ignore_case {
            (
                fold_side("A", &test.name, &a, suite.ignore_value_case),
                fold_side("B", &test.name, &b, suite.ignore_value_case),
            )
        } else {
            (a, b)
        };

        let mapped = map_fields(&a, &test.field_mappings, "");
        for collision in &mapped.collisions {
            warn_collision("A", &test.name, collision, "renamed keys collide");
        }
        let a = mapped.value;

        let a = remove_ignored_fields(&a, &test.ignore_fields, suite.ignore_case);
        let b = remove_ignored_fields(&b, &test.ignore_fields, suite.ignore_case);

        Comparison {
            diffs: diff_objects(&a, &b),
            a,
            b,
        }
    }
}

fn fold_side(side: &str, test_name: &str, value: &Value, convert_values: bool) -> Value {
    let normalized = normalize_keys(value, convert_values);

    for collision in &normalized.collisions {
        warn_collision(side, test_name, collision, "keys collapse into one after case folding");
    }

    normalized.value
}

fn warn_collision(side: &str, test_name: &str, collision: &KeyCollision, reason: &str) {
    warn!(
        test = test_name,
        side,
        path = %collision.path,
        key = %collision.normalized,
        originals = ?collision.originals,
        "{reason}, only the last value is compared"
    );
}

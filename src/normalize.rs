//! Response normalization applied before two bodies are diffed.
//!
//! The order matters: keys are folded first (when the suite ignores case),
//! then the A side is renamed into B's layout, and finally ignored fields are
//! dropped from both sides.
//!
//! None of the steps can fail. Keys that end up under the same name, by
//! folding or by renaming, keep the last value and are reported as
//! [`KeyCollision`]s.

mod case;
mod filter;
mod mapping;

pub use case::KeyCollision;
pub use case::Normalized;
pub use case::fold_key;
pub use case::normalize_keys;
pub use case::to_lower_case_keys;
pub use filter::remove_ignored_fields;
pub use mapping::FieldMapping;
pub use mapping::apply_field_mappings;
pub use mapping::map_fields;

/// Dot-joins a child key onto a traversal address.
pub(crate) fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

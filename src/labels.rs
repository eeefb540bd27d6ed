//! Label and annotation merging
//!
//! Generated resources start from operator-owned labels and annotations and
//! let users override them per resource kind through `customKubeOptions`.

use std::collections::BTreeMap;

/// Combine `base` with `overrides`; values from `overrides` win on key collision.
pub fn merge_labels_or_annotations(
    base: Option<&BTreeMap<String, String>>,
    overrides: Option<&BTreeMap<String, String>>,
) -> BTreeMap<String, String> {
    let mut merged = base.cloned().unwrap_or_default();
    if let Some(overrides) = overrides {
        merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    merged
}

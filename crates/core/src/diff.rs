//! Change detection between two object listings
//!
//! Compares a previous and a current snapshot of the same prefix. An object
//! present in both counts as updated only when its timestamp moved forward by
//! more than the tolerance, so clock skew and backends that rewrite
//! timestamps on every listing do not produce spurious updates.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use jiff::SignedDuration;

use crate::types::Object;

/// What changed between two snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectSliceDiff {
    /// Whether any of the lists is non-empty
    pub changed: bool,
    /// In the previous snapshot only
    pub removed: Vec<Object>,
    /// In the current snapshot only
    pub added: Vec<Object>,
    /// In both, with a newer timestamp beyond the tolerance (current version)
    pub updated: Vec<Object>,
}

/// Diff two snapshots
///
/// Each path appears in at most one of `removed`, `added` and `updated`.
/// When a snapshot lists the same path twice, the last entry wins.
pub fn diff(previous: &[Object], current: &[Object], tolerance: Duration) -> ObjectSliceDiff {
    let tolerance = SignedDuration::try_from(tolerance).unwrap_or(SignedDuration::MAX);

    let previous_by_path: HashMap<&str, &Object> =
        previous.iter().map(|o| (o.path.as_str(), o)).collect();
    let current_by_path: HashMap<&str, &Object> =
        current.iter().map(|o| (o.path.as_str(), o)).collect();

    let mut result = ObjectSliceDiff::default();

    let mut seen = HashSet::new();
    for object in previous {
        let path = object.path.as_str();
        if !seen.insert(path) {
            continue;
        }
        let prev = previous_by_path[path];
        match current_by_path.get(path) {
            Some(curr) => {
                if curr.last_modified.duration_since(prev.last_modified) > tolerance {
                    result.updated.push((*curr).clone());
                }
            }
            None => result.removed.push(prev.clone()),
        }
    }

    let mut seen = HashSet::new();
    for object in current {
        let path = object.path.as_str();
        if seen.insert(path) && !previous_by_path.contains_key(path) {
            result.added.push(current_by_path[path].clone());
        }
    }

    result.changed = result.removed.len() + result.added.len() + result.updated.len() > 0;
    result
}

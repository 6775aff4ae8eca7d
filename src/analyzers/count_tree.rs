//! Nested occurrence counters that can be folded together across files.

use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;

use crate::error::{AnalysisError, Result};

/// Key at one level of a [`CountTree`].
///
/// Integer and text keys never compare equal, so `"3"` and `3` stay separate
/// groups after a merge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum CountKey {
    Int(i64),
    Text(String),
}

impl From<i64> for CountKey {
    fn from(value: i64) -> Self {
        CountKey::Int(value)
    }
}

impl From<&str> for CountKey {
    fn from(value: &str) -> Self {
        CountKey::Text(value.to_string())
    }
}

impl From<String> for CountKey {
    fn from(value: String) -> Self {
        CountKey::Text(value)
    }
}

impl fmt::Display for CountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountKey::Int(v) => write!(f, "{v}"),
            CountKey::Text(v) => f.write_str(v),
        }
    }
}

/// A count, or a mapping from key to nested counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CountTree {
    Leaf(u64),
    Branch(BTreeMap<CountKey, CountTree>),
}

impl Default for CountTree {
    fn default() -> Self {
        CountTree::Branch(BTreeMap::new())
    }
}

impl CountTree {
    /// Creates an empty branch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `by` to the leaf at `path`, creating intermediate branches and a
    /// zero leaf as needed.
    pub fn increment(&mut self, path: &[CountKey], by: u64) -> Result<()> {
        let mut node = self;
        for (depth, key) in path.iter().enumerate() {
            let fresh = if depth + 1 == path.len() {
                CountTree::Leaf(0)
            } else {
                CountTree::new()
            };
            node = match node {
                CountTree::Branch(children) => children.entry(key.clone()).or_insert(fresh),
                CountTree::Leaf(_) => return Err(shape_mismatch(&path[..depth])),
            };
        }

        match node {
            CountTree::Leaf(count) => {
                *count += by;
                Ok(())
            }
            CountTree::Branch(_) => Err(shape_mismatch(path)),
        }
    }

    /// Folds `other` into `self`.
    ///
    /// Keys missing from `self` are moved over, shared branches merge
    /// recursively and shared leaves add up. Shapes are checked first, so on
    /// [`AnalysisError::ShapeMismatch`] `self` is left unchanged.
    pub fn merge(&mut self, other: CountTree) -> Result<&mut Self> {
        check_shapes(self, &other, &mut Vec::new())?;
        merge_into(self, other);
        Ok(self)
    }

    /// Owned variant of [`CountTree::merge`], convenient for folds.
    pub fn merged(mut self, other: CountTree) -> Result<Self> {
        self.merge(other)?;
        Ok(self)
    }

    /// Sum of every leaf.
    pub fn total(&self) -> u64 {
        match self {
            CountTree::Leaf(count) => *count,
            CountTree::Branch(children) => children.values().map(CountTree::total).sum(),
        }
    }

    pub fn get(&self, key: &CountKey) -> Option<&CountTree> {
        match self {
            CountTree::Leaf(_) => None,
            CountTree::Branch(children) => children.get(key),
        }
    }

    /// Walks `path` and returns the count stored there, if it is a leaf.
    pub fn count_at(&self, path: &[CountKey]) -> Option<u64> {
        let mut node = self;
        for key in path {
            node = node.get(key)?;
        }
        match node {
            CountTree::Leaf(count) => Some(*count),
            CountTree::Branch(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CountTree::Branch(children) if children.is_empty())
    }

    /// Flattens the tree depth-first into `(key path, count)` pairs in key order.
    pub fn leaves(&self) -> Vec<(Vec<CountKey>, u64)> {
        let mut out = Vec::new();
        collect_leaves(self, &mut Vec::new(), &mut out);
        out
    }
}

/// Fails where a leaf of one tree meets a branch of the other.
fn check_shapes(dst: &CountTree, src: &CountTree, path: &mut Vec<CountKey>) -> Result<()> {
    match (dst, src) {
        (CountTree::Leaf(_), CountTree::Leaf(_)) => Ok(()),
        (CountTree::Branch(children), CountTree::Branch(incoming)) => {
            for (key, value) in incoming {
                if let Some(existing) = children.get(key) {
                    path.push(key.clone());
                    check_shapes(existing, value, path)?;
                    path.pop();
                }
            }
            Ok(())
        }
        _ => Err(shape_mismatch(path)),
    }
}

// shapes already checked
fn merge_into(dst: &mut CountTree, src: CountTree) {
    match (dst, src) {
        (CountTree::Leaf(total), CountTree::Leaf(count)) => *total += count,
        (CountTree::Branch(children), CountTree::Branch(incoming)) => {
            for (key, value) in incoming {
                match children.entry(key) {
                    Entry::Vacant(slot) => {
                        slot.insert(value);
                    }
                    Entry::Occupied(mut slot) => merge_into(slot.get_mut(), value),
                }
            }
        }
        _ => {}
    }
}

fn collect_leaves(
    node: &CountTree,
    prefix: &mut Vec<CountKey>,
    out: &mut Vec<(Vec<CountKey>, u64)>,
) {
    match node {
        CountTree::Leaf(count) => out.push((prefix.clone(), *count)),
        CountTree::Branch(children) => {
            for (key, child) in children {
                prefix.push(key.clone());
                collect_leaves(child, prefix, out);
                prefix.pop();
            }
        }
    }
}

fn shape_mismatch(path: &[CountKey]) -> AnalysisError {
    let path = path
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("/");
    AnalysisError::ShapeMismatch { path }
}

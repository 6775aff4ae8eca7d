//! Joins object classes from the metadata table onto trajectory samples.

use std::collections::HashMap;

use crate::analyzers::types::{LocatedSample, TrackMeta, TrackSample};
use crate::error::{AnalysisError, Result};

/// Object id to class label, built from a fully loaded metadata table.
pub type ClassIndex = HashMap<i64, String>;

/// Builds the id lookup. A repeated id keeps the class of its last row.
pub fn class_index(meta: &[TrackMeta]) -> ClassIndex {
    meta.iter()
        .map(|row| (row.id, row.class.clone()))
        .collect()
}

/// Tags each sample with its object's class, preserving input order.
///
/// # Errors
///
/// Returns [`AnalysisError::UnknownObject`] for the first sample whose id is
/// not in `classes`.
pub fn classify_samples<I>(samples: I, classes: &ClassIndex) -> Result<Vec<LocatedSample>>
where
    I: IntoIterator<Item = TrackSample>,
{
    let samples = samples.into_iter();
    let mut located = Vec::with_capacity(samples.size_hint().0);

    for sample in samples {
        let class = classes
            .get(&sample.id)
            .ok_or(AnalysisError::UnknownObject { id: sample.id })?;
        located.push(LocatedSample {
            x: sample.x,
            y: sample.y,
            class: class.clone(),
        });
    }

    Ok(located)
}

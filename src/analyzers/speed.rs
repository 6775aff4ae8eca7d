//! Per-object mean speeds for the speed distribution plot.

use rayon::prelude::*;
use std::path::Path;
use tracing::debug;

use crate::analyzers::types::{SpeedRow, TrackMeta};
use crate::config::DatasetConfig;
use crate::error::Result;
use crate::loader::{meta_path, read_meta};

pub fn speed_rows(map: &str, meta: &[TrackMeta]) -> Vec<SpeedRow> {
    meta.iter()
        .map(|row| SpeedRow {
            map: map.to_string(),
            class: row.class.clone(),
            mean_speed: row.mean_x_velocity,
        })
        .collect()
}

/// Collects mean speeds of every object in every recording of the maps
/// matching `dataset`, ordered by map and then by recording as configured.
#[tracing::instrument(skip(config, data_dir), fields(data_dir = %data_dir.display()))]
pub fn speed_distribution(
    config: &DatasetConfig,
    dataset: &str,
    data_dir: &Path,
) -> Result<Vec<SpeedRow>> {
    let jobs: Vec<(&str, u32)> = config
        .select_maps(dataset)
        .flat_map(|(name, map)| map.trajectory_files.iter().map(move |id| (name, *id)))
        .collect();

    let per_file = jobs
        .par_iter()
        .map(|(map, file_id)| -> Result<Vec<SpeedRow>> {
            let meta = read_meta(&meta_path(data_dir, *file_id))?;
            Ok(speed_rows(map, &meta))
        })
        .collect::<Result<Vec<_>>>()?;

    let rows: Vec<SpeedRow> = per_file.into_iter().flatten().collect();
    debug!(rows = rows.len(), files = jobs.len(), "Speeds collected");
    Ok(rows)
}

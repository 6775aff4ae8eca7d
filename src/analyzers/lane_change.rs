//! Lane-change histograms per class, merged across recordings of a map.

use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::analyzers::count_tree::{CountKey, CountTree};
use crate::analyzers::types::{LaneChangeRow, TrackMeta};
use crate::config::DatasetConfig;
use crate::error::{AnalysisError, Result};
use crate::loader::{meta_path, read_meta};

/// Counts, for each class, how many objects made each number of lane changes.
///
/// The result is shaped `class -> numLaneChanges -> objects`.
pub fn count_lane_changes(meta: &[TrackMeta]) -> CountTree {
    let mut counts: BTreeMap<&str, BTreeMap<i64, u64>> = BTreeMap::new();
    for row in meta {
        *counts
            .entry(row.class.as_str())
            .or_default()
            .entry(row.num_lane_changes)
            .or_insert(0) += 1;
    }

    CountTree::Branch(
        counts
            .into_iter()
            .map(|(class, per_count)| {
                let leaves = per_count
                    .into_iter()
                    .map(|(n, count)| (CountKey::Int(n), CountTree::Leaf(count)))
                    .collect();
                (CountKey::from(class), CountTree::Branch(leaves))
            })
            .collect(),
    )
}

/// Assigns every recording of the maps matching `dataset` to its map.
///
/// Every matching map is present in the result, in declaration order, even
/// without recordings. A recording listed under several maps belongs to the
/// last one declared.
pub fn assign_files<'a>(
    config: &'a DatasetConfig,
    dataset: &'a str,
) -> (Vec<&'a str>, BTreeMap<u32, &'a str>) {
    let mut maps = Vec::new();
    let mut files = BTreeMap::new();
    for (name, map) in config.select_maps(dataset) {
        maps.push(name);
        for file_id in &map.trajectory_files {
            files.insert(*file_id, name);
        }
    }
    (maps, files)
}

/// Counts lane changes in every recording of the matching maps and merges the
/// per-recording trees by map, keeping the config's map order.
///
/// Recordings are read and counted in parallel; merging is order independent.
#[tracing::instrument(skip(config, data_dir), fields(data_dir = %data_dir.display()))]
pub fn lane_change_distribution(
    config: &DatasetConfig,
    dataset: &str,
    data_dir: &Path,
) -> Result<Vec<(String, CountTree)>> {
    let (maps, files) = assign_files(config, dataset);

    let per_file = files
        .par_iter()
        .map(|(file_id, map)| {
            let meta = read_meta(&meta_path(data_dir, *file_id))?;
            Ok::<_, AnalysisError>((*map, count_lane_changes(&meta)))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut by_map: Vec<(String, CountTree)> = maps
        .into_iter()
        .map(|name| (name.to_string(), CountTree::new()))
        .collect();

    for (map, tree) in per_file {
        if let Some((_, acc)) = by_map.iter_mut().find(|(name, _)| name == map) {
            acc.merge(tree)?;
        }
    }

    debug!(maps = by_map.len(), files = files.len(), "Lane changes counted");
    Ok(by_map)
}

/// Flattens per-map trees into plot rows, ordered by map, then class and count.
pub fn lane_change_rows(distribution: &[(String, CountTree)]) -> Vec<LaneChangeRow> {
    let mut rows = Vec::new();
    for (map, tree) in distribution {
        for (path, count) in tree.leaves() {
            let parsed = match path.as_slice() {
                [class, CountKey::Int(n)] => Some((class, *n)),
                [class, CountKey::Text(n)] => n.parse::<i64>().ok().map(|n| (class, n)),
                _ => None,
            };
            let Some((class, n)) = parsed else {
                warn!(map = %map, ?path, "Skipping lane-change entry with unexpected shape");
                continue;
            };
            rows.push(LaneChangeRow {
                map: map.clone(),
                class: class.to_string(),
                num_lane_changes: n,
                count,
            });
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(class: &str, lane_changes: i64) -> TrackMeta {
        TrackMeta {
            id: 0,
            class: class.to_string(),
            mean_x_velocity: 0.0,
            num_lane_changes: lane_changes,
        }
    }

    #[test]
    fn test_count_lane_changes() {
        let tree = count_lane_changes(&[meta("car", 0), meta("car", 0), meta("truck", 1)]);

        let mut expected = CountTree::new();
        expected
            .increment(&["car".into(), CountKey::Int(0)], 2)
            .unwrap();
        expected
            .increment(&["truck".into(), CountKey::Int(1)], 1)
            .unwrap();
        assert_eq!(tree, expected);
    }

    #[test]
    fn test_count_lane_changes_empty() {
        assert!(count_lane_changes(&[]).is_empty());
    }

    #[test]
    fn test_assign_files_last_map_wins() {
        let config = DatasetConfig::from_json(
            r#"{ "maps": {
                "highD_a": { "trajectory_files": [1, 2] },
                "highD_b": { "trajectory_files": [2, 3] },
                "highD_c": { "trajectory_files": [] },
                "inD_a": { "trajectory_files": [9] }
            } }"#,
        )
        .unwrap();

        let (maps, files) = assign_files(&config, "highD");

        assert_eq!(maps, vec!["highD_a", "highD_b", "highD_c"]);
        assert_eq!(files.get(&1), Some(&"highD_a"));
        assert_eq!(files.get(&2), Some(&"highD_b"));
        assert_eq!(files.get(&3), Some(&"highD_b"));
        assert!(!files.contains_key(&9));
    }

    #[test]
    fn test_assign_files_follows_declared_order() {
        let config = DatasetConfig::from_json(
            r#"{ "maps": {
                "highD_b": { "trajectory_files": [4] },
                "highD_a": { "trajectory_files": [4, 5] }
            } }"#,
        )
        .unwrap();

        let (maps, files) = assign_files(&config, "highD");

        assert_eq!(maps, vec!["highD_b", "highD_a"]);
        assert_eq!(files.get(&4), Some(&"highD_a"));
    }

    #[test]
    fn test_lane_change_rows() {
        let dist = vec![
            (
                "m1".to_string(),
                count_lane_changes(&[meta("Car", 1), meta("Car", 0), meta("Car", 1)]),
            ),
            ("m2".to_string(), CountTree::new()),
        ];

        let rows = lane_change_rows(&dist);

        assert_eq!(
            rows,
            vec![
                LaneChangeRow { map: "m1".into(), class: "Car".into(), num_lane_changes: 0, count: 1 },
                LaneChangeRow { map: "m1".into(), class: "Car".into(), num_lane_changes: 1, count: 2 },
            ]
        );
    }

    #[test]
    fn test_lane_change_rows_parses_text_counts() {
        let mut tree = CountTree::new();
        tree.increment(&["Car".into(), CountKey::Text("2".into())], 4)
            .unwrap();
        tree.increment(&["Car".into(), CountKey::Text("two".into())], 1)
            .unwrap();
        let dist = vec![("m".to_string(), tree)];

        let rows = lane_change_rows(&dist);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].num_lane_changes, 2);
        assert_eq!(rows[0].count, 4);
    }
}

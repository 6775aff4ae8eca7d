use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::analyzers::types::TrackMeta;
use crate::analyzers::utility::{mean, stddev};

#[derive(Debug, Default, Clone, Serialize)]
pub struct ClassSummary {
    pub class: String,
    pub objects: usize,
    pub share_pct: f64,

    // speed magnitude, from meanXVelocity
    pub mean_speed: f64,
    pub speed_stddev: f64,

    // lane changes
    pub with_lane_change: usize,
    pub lane_changes: i64,
}

#[derive(Debug, Default, Serialize)]
pub struct DatasetSummary {
    pub timestamp: DateTime<Utc>,
    pub file_id: Option<u32>,
    pub map: Option<String>,
    pub total_objects: usize,
    pub classes: Vec<ClassSummary>,
}

impl DatasetSummary {
    pub fn from_meta(meta: &[TrackMeta]) -> Self {
        let mut by_class: BTreeMap<&str, Vec<&TrackMeta>> = BTreeMap::new();
        for row in meta {
            by_class.entry(row.class.as_str()).or_default().push(row);
        }

        let total_objects = meta.len();
        let classes = by_class
            .into_iter()
            .map(|(class, rows)| {
                let speeds: Vec<f64> = rows.iter().map(|r| r.mean_x_velocity.abs()).collect();
                let avg = mean(&speeds);

                ClassSummary {
                    class: class.to_string(),
                    objects: rows.len(),
                    share_pct: Self::pct(rows.len(), total_objects),
                    mean_speed: avg,
                    speed_stddev: stddev(&speeds, avg),
                    with_lane_change: rows.iter().filter(|r| r.num_lane_changes > 0).count(),
                    lane_changes: rows.iter().map(|r| r.num_lane_changes).sum(),
                }
            })
            .collect();

        DatasetSummary {
            timestamp: Utc::now(),
            total_objects,
            classes,
            ..Default::default()
        }
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    /// Share of all objects that changed lane at least once.
    pub fn lane_change_pct(&self) -> f64 {
        let changed = self.classes.iter().map(|c| c.with_lane_change).sum();
        Self::pct(changed, self.total_objects)
    }

    pub fn class(&self, name: &str) -> Option<&ClassSummary> {
        self.classes.iter().find(|c| c.class == name)
    }

    /// Set the recording the summary was computed from
    pub fn with_source(mut self, file_id: u32, map: Option<&str>) -> Self {
        self.file_id = Some(file_id);
        self.map = map.map(str::to_string);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(class: &str, speed: f64, lane_changes: i64) -> TrackMeta {
        TrackMeta {
            id: 0,
            class: class.to_string(),
            mean_x_velocity: speed,
            num_lane_changes: lane_changes,
        }
    }

    #[test]
    fn test_pct_with_zero_total() {
        assert_eq!(DatasetSummary::pct(10, 0), 0.0);
    }

    #[test]
    fn test_pct_normal_values() {
        assert_eq!(DatasetSummary::pct(50, 100), 50.0);
        assert_eq!(DatasetSummary::pct(1, 4), 25.0);
    }

    #[test]
    fn test_from_meta_empty() {
        let summary = DatasetSummary::from_meta(&[]);

        assert_eq!(summary.total_objects, 0);
        assert!(summary.classes.is_empty());
        assert_eq!(summary.lane_change_pct(), 0.0);
    }

    #[test]
    fn test_from_meta_groups_by_class() {
        let summary = DatasetSummary::from_meta(&[
            meta("Car", 30.0, 0),
            meta("Car", -34.0, 2),
            meta("Truck", 22.0, 1),
            meta("Car", 32.0, 0),
        ]);

        assert_eq!(summary.total_objects, 4);
        let car = summary.class("Car").unwrap();
        assert_eq!(car.objects, 3);
        assert_eq!(car.share_pct, 75.0);
        assert_eq!(car.mean_speed, 32.0);
        assert_eq!(car.speed_stddev, 2.0);
        assert_eq!(car.with_lane_change, 1);
        assert_eq!(car.lane_changes, 2);

        let truck = summary.class("Truck").unwrap();
        assert_eq!(truck.objects, 1);
        assert_eq!(summary.lane_change_pct(), 50.0);
    }

    #[test]
    fn test_with_source() {
        let summary = DatasetSummary::from_meta(&[]).with_source(7, Some("highD_02"));
        assert_eq!(summary.file_id, Some(7));
        assert_eq!(summary.map.as_deref(), Some("highD_02"));
    }
}

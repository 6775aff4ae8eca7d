//! Record types read from the dataset files and the flat tables handed to plotting.

use serde::{Deserialize, Serialize};

/// One position sample from a `NN_tracks.csv` file.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TrackSample {
    #[serde(alias = "trackId")]
    pub id: i64,
    pub x: f64,
    pub y: f64,
}

/// One object summary row from a `NN_tracksMeta.csv` file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackMeta {
    #[serde(alias = "trackId")]
    pub id: i64,
    pub class: String,
    #[serde(rename = "meanXVelocity")]
    pub mean_x_velocity: f64,
    #[serde(rename = "numLaneChanges")]
    pub num_lane_changes: i64,
}

/// A position sample tagged with the class of the object it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocatedSample {
    pub x: f64,
    pub y: f64,
    pub class: String,
}

/// Mean speed of one object, grouped by map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedRow {
    pub map: String,
    pub class: String,
    #[serde(rename = "meanSpeed")]
    pub mean_speed: f64,
}

/// Number of objects of `class` on `map` that changed lane `num_lane_changes` times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaneChangeRow {
    pub map: String,
    pub class: String,
    #[serde(rename = "numLaneChanges")]
    pub num_lane_changes: i64,
    pub count: u64,
}

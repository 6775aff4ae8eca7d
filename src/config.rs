//! Dataset configuration: which recordings belong to which map, how map
//! images line up with track coordinates, and how plots are styled.
//!
//! Stored as a JSON object on disk:
//! ```json
//! {
//!   "class_order": ["Car", "Truck"],
//!   "style": { "dpi": 100 },
//!   "maps": {
//!     "highD_01": {
//!       "trajectory_files": [1, 2, 3],
//!       "transform": { "scale": [0.1, -0.1], "offset": [0.0, 0.0] }
//!     }
//!   }
//! }
//! ```

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;

use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Classes to plot and the order their colours are assigned in.
    /// Empty means every observed class, sorted.
    #[serde(default)]
    pub class_order: Vec<String>,

    #[serde(default)]
    pub style: PlotStyle,

    pub maps: MapTable,
}

/// Map entries in the order the config file declares them.
///
/// Facets are drawn in this order, and a recording listed under several maps
/// belongs to the last one declared. A name repeated in the file keeps its
/// first position and its last value.
#[derive(Debug, Clone, Default)]
pub struct MapTable {
    entries: Vec<(String, MapConfig)>,
}

impl MapTable {
    pub fn get(&self, name: &str) -> Option<&MapConfig> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, map)| map)
    }

    pub fn insert(&mut self, name: String, map: MapConfig) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = map,
            None => self.entries.push((name, map)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MapConfig)> {
        self.entries.iter().map(|(name, map)| (name.as_str(), map))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, MapConfig)> for MapTable {
    fn from_iter<I: IntoIterator<Item = (String, MapConfig)>>(iter: I) -> Self {
        let mut table = MapTable::default();
        for (name, map) in iter {
            table.insert(name, map);
        }
        table
    }
}

impl Serialize for MapTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut out = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, map) in &self.entries {
            out.serialize_entry(name, map)?;
        }
        out.end()
    }
}

impl<'de> Deserialize<'de> for MapTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(MapTableVisitor)
    }
}

struct MapTableVisitor;

impl<'de> Visitor<'de> for MapTableVisitor {
    type Value = MapTable;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object of map name to map config")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<MapTable, A::Error> {
        let mut table = MapTable::default();
        while let Some((name, map)) = access.next_entry::<String, MapConfig>()? {
            table.insert(name, map);
        }
        Ok(table)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    /// Recording ids; resolved to `{id:02}_tracks.csv` and `{id:02}_tracksMeta.csv`.
    pub trajectory_files: Vec<u32>,

    #[serde(default)]
    pub transform: MapTransform,
}

/// Affine mapping from map image pixels to track coordinates, per axis:
/// `x = px * scale[0] + offset[0]`, `y = py * scale[1] + offset[1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapTransform {
    #[serde(default = "default_scale")]
    pub scale: [f64; 2],
    #[serde(default)]
    pub offset: [f64; 2],
}

impl Default for MapTransform {
    fn default() -> Self {
        Self {
            scale: default_scale(),
            offset: [0.0, 0.0],
        }
    }
}

fn default_scale() -> [f64; 2] {
    [1.0, 1.0]
}

impl MapTransform {
    pub fn apply(&self, px: f64, py: f64) -> (f64, f64) {
        (
            px * self.scale[0] + self.offset[0],
            py * self.scale[1] + self.offset[1],
        )
    }

    /// Maps track coordinates back to image pixels.
    pub fn invert(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.offset[0]) / self.scale[0],
            (y - self.offset[1]) / self.scale[1],
        )
    }
}

/// Figure styling passed explicitly to every renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotStyle {
    #[serde(default = "default_dpi")]
    pub dpi: u32,

    /// Font family name understood by the plotting backend ("serif", "sans-serif", ...).
    #[serde(default = "default_font_family")]
    pub font_family: String,

    /// Font size in points.
    #[serde(default = "default_font_size")]
    pub font_size: f64,

    /// Width of the map overlay figure in inches.
    #[serde(default = "default_figure_width")]
    pub figure_width: f64,

    /// Height of one facet in inches.
    #[serde(default = "default_facet_height")]
    pub facet_height: f64,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            dpi: default_dpi(),
            font_family: default_font_family(),
            font_size: default_font_size(),
            figure_width: default_figure_width(),
            facet_height: default_facet_height(),
        }
    }
}

fn default_dpi() -> u32 {
    300
}

fn default_font_family() -> String {
    "serif".to_string()
}

fn default_font_size() -> f64 {
    10.0
}

fn default_figure_width() -> f64 {
    12.0
}

fn default_facet_height() -> f64 {
    3.0
}

impl PlotStyle {
    /// Converts inches to pixels at the configured resolution.
    pub fn px(&self, inches: f64) -> u32 {
        (inches * self.dpi as f64).round().max(1.0) as u32
    }

    /// Font size in pixels.
    pub fn font_px(&self) -> f64 {
        self.font_size * self.dpi as f64 / 72.0
    }
}

impl DatasetConfig {
    /// Loads the config from a JSON file at `path`.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| AnalysisError::io(path, e))?;
        let config = Self::from_json(&content)?;
        tracing::debug!(maps = config.maps.len(), "Dataset config loaded");
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: DatasetConfig =
            serde_json::from_str(content).map_err(|e| AnalysisError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.style.dpi == 0 {
            return Err(AnalysisError::Config("style.dpi must be positive".into()));
        }
        if !(self.style.font_size > 0.0) {
            return Err(AnalysisError::Config("style.font_size must be positive".into()));
        }
        for (name, map) in self.maps.iter() {
            if map.transform.scale.iter().any(|s| *s == 0.0 || !s.is_finite()) {
                return Err(AnalysisError::Config(format!(
                    "map '{name}' has a non-invertible transform scale"
                )));
            }
        }
        Ok(())
    }

    pub fn map(&self, name: &str) -> Result<&MapConfig> {
        self.maps
            .get(name)
            .ok_or_else(|| AnalysisError::UnknownMap(name.to_string()))
    }

    /// Maps whose name contains `dataset`, in declaration order.
    pub fn select_maps<'a>(
        &'a self,
        dataset: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a MapConfig)> + 'a {
        self.maps
            .iter()
            .filter(move |(name, _)| name.contains(dataset))
    }
}

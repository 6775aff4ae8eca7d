//! Chart rendering with plotters.
//!
//! Each entry point takes an aggregated table, a [`PlotStyle`] and an output
//! path, and writes a PNG. Nothing here touches process-wide state.

pub mod lane_change;
pub mod map;
pub mod speed;

use plotters::style::{Color, HSLColor, RGBColor};
use std::fmt::Display;
use std::path::Path;

use crate::config::PlotStyle;
use crate::error::{AnalysisError, Result};

pub use lane_change::plot_lane_change_distribution;
pub use map::plot_map_and_trajectories;
pub use speed::plot_speed_distribution;

const PALETTE_SATURATION: f64 = 0.65;
const PALETTE_LIGHTNESS: f64 = 0.55;

/// Classes to draw, in colour order.
///
/// With a configured order only those classes are drawn, in that order.
/// Otherwise every observed class is drawn, in the order first seen.
pub fn hue_order<'a>(
    configured: &[String],
    observed: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    if !configured.is_empty() {
        return configured.to_vec();
    }
    ordered_unique(observed)
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Class to colour assignment with evenly spaced hues.
#[derive(Debug, Clone)]
pub struct ClassPalette {
    entries: Vec<(String, RGBColor)>,
}

impl ClassPalette {
    pub fn new(classes: Vec<String>) -> Self {
        let n = classes.len().max(1) as f64;
        let entries = classes
            .into_iter()
            .enumerate()
            .map(|(i, class)| {
                let (r, g, b) =
                    HSLColor(i as f64 / n, PALETTE_SATURATION, PALETTE_LIGHTNESS).rgb();
                (class, RGBColor(r, g, b))
            })
            .collect();
        Self { entries }
    }

    pub fn color(&self, class: &str) -> Option<RGBColor> {
        self.entries
            .iter()
            .find(|(name, _)| name == class)
            .map(|(_, color)| *color)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, RGBColor)> {
        self.entries.iter().map(|(name, color)| (name.as_str(), *color))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Rows and columns for `n` facets wrapped every `col_wrap` columns.
pub fn facet_grid(n: usize, col_wrap: usize) -> (usize, usize) {
    if n == 0 {
        return (0, 0);
    }
    let cols = n.min(col_wrap.max(1));
    (n.div_ceil(cols), cols)
}

/// Distinct values in first-seen order.
pub(crate) fn ordered_unique<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = Vec::new();
    for v in values {
        if !seen.contains(&v) {
            seen.push(v);
        }
    }
    seen
}

pub(crate) fn font(style: &PlotStyle, scale: f64) -> (&str, f64) {
    (style.font_family.as_str(), style.font_px() * scale)
}

pub(crate) fn render_err(e: impl Display) -> AnalysisError {
    AnalysisError::Render(e.to_string())
}

pub(crate) fn prepare_output(output: &Path) -> Result<()> {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|e| AnalysisError::io(parent, e))
        }
        _ => Ok(()),
    }
}

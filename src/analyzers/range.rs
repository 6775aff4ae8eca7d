//! Axis limits for the map overlay.

use serde::Serialize;

use crate::analyzers::types::LocatedSample;

/// Space kept below the lowest sample, in metres.
const Y_PAD_BELOW: f64 = 3.0;
/// Space kept above the highest sample, in metres.
const Y_PAD_ABOVE: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlotRange {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl PlotRange {
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }
}

/// Integer-aligned bounding box around `samples`, with extra room on the y axis
/// so the legend and road edges stay visible. `None` when there are no samples.
pub fn plot_range(samples: &[LocatedSample]) -> Option<PlotRange> {
    let first = samples.first()?;
    let (mut x_lo, mut x_hi, mut y_lo, mut y_hi) = (first.x, first.x, first.y, first.y);

    for s in &samples[1..] {
        x_lo = x_lo.min(s.x);
        x_hi = x_hi.max(s.x);
        y_lo = y_lo.min(s.y);
        y_hi = y_hi.max(s.y);
    }

    Some(PlotRange {
        x_min: x_lo.floor(),
        x_max: x_hi.ceil(),
        y_min: y_lo.floor() - Y_PAD_BELOW,
        y_max: y_hi.ceil() + Y_PAD_ABOVE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f64, y: f64) -> LocatedSample {
        LocatedSample { x, y, class: "car".into() }
    }

    #[test]
    fn test_plot_range_floor_ceil_with_padding() {
        let range = plot_range(&[at(1.2, 5.9), at(9.7, 0.3), at(4.0, 2.0)]).unwrap();

        assert_eq!(
            range,
            PlotRange { x_min: 1.0, x_max: 10.0, y_min: -3.0, y_max: 10.0 }
        );
        assert_eq!(range.width(), 9.0);
        assert_eq!(range.height(), 13.0);
    }

    #[test]
    fn test_plot_range_negative_coordinates() {
        let range = plot_range(&[at(-2.5, -10.2), at(-0.5, -4.1)]).unwrap();

        assert_eq!(range.x_min, -3.0);
        assert_eq!(range.x_max, 0.0);
        assert_eq!(range.y_min, -14.0);
        assert_eq!(range.y_max, 0.0);
    }

    #[test]
    fn test_plot_range_empty() {
        assert_eq!(plot_range(&[]), None);
    }
}

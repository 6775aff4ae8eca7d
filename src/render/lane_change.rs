//! Lane-change count distributions, one facet per map.

use plotters::prelude::*;
use std::path::Path;
use tracing::info;

use crate::analyzers::types::LaneChangeRow;
use crate::config::PlotStyle;
use crate::error::{AnalysisError, Result};
use crate::render::{
    ClassPalette, facet_grid, font, hue_order, ordered_unique, prepare_output, render_err,
};

const COL_WRAP: usize = 3;

/// `(numLaneChanges, count)` points of one class on one map, sorted by x.
pub fn class_series(rows: &[LaneChangeRow], map: &str, class: &str) -> Vec<(f64, f64)> {
    let mut points: Vec<(f64, f64)> = rows
        .iter()
        .filter(|r| r.map == map && r.class == class)
        .map(|r| (r.num_lane_changes as f64, r.count as f64))
        .collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    points
}

/// Renders per-map line plots of how many objects made each number of lane changes.
#[tracing::instrument(skip(rows, class_order, style, output), fields(rows = rows.len(), output = %output.display()))]
pub fn plot_lane_change_distribution(
    rows: &[LaneChangeRow],
    class_order: &[String],
    style: &PlotStyle,
    output: &Path,
) -> Result<()> {
    let maps = ordered_unique(rows.iter().map(|r| r.map.as_str()));
    if maps.is_empty() {
        return Err(AnalysisError::Render("no lane-change rows to plot".into()));
    }
    let palette = ClassPalette::new(hue_order(
        class_order,
        rows.iter().map(|r| r.class.as_str()),
    ));

    // x axis is shared between facets
    let x_lo = rows.iter().map(|r| r.num_lane_changes).min().unwrap_or(0) as f64 - 0.5;
    let x_hi = rows.iter().map(|r| r.num_lane_changes).max().unwrap_or(0) as f64 + 0.5;

    let (grid_rows, grid_cols) = facet_grid(maps.len(), COL_WRAP);
    let facet_px = style.px(style.facet_height);

    prepare_output(output)?;
    let root = BitMapBackend::new(
        output,
        (facet_px * grid_cols as u32, facet_px * grid_rows as u32),
    )
    .into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;

    let font_px = style.font_px();
    let marker = (font_px / 4.0).round().max(2.0) as i32;
    let areas = root.split_evenly((grid_rows, grid_cols));
    for (i, (map, area)) in maps.iter().zip(areas.iter()).enumerate() {
        let y_hi = rows
            .iter()
            .filter(|r| r.map == *map)
            .map(|r| r.count)
            .max()
            .unwrap_or(1) as f64
            * 1.1;

        let mut chart = ChartBuilder::on(area)
            .caption(format!("map = {map}"), font(style, 1.0))
            .margin((font_px * 0.5).round() as u32)
            .x_label_area_size((font_px * 3.0).round() as u32)
            .y_label_area_size((font_px * 5.0).round() as u32)
            .build_cartesian_2d(x_lo..x_hi, 0.0..y_hi)
            .map_err(render_err)?;

        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc("numLaneChanges")
            .y_desc("count")
            .x_label_formatter(&|v| format!("{v:.0}"))
            .label_style(font(style, 0.8))
            .axis_desc_style(font(style, 0.9))
            .draw()
            .map_err(render_err)?;

        for (class, color) in palette.iter() {
            let points = class_series(rows, map, class);
            if points.is_empty() {
                continue;
            }
            chart
                .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))
                .map_err(render_err)?
                .label(class)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
            chart
                .draw_series(
                    points
                        .iter()
                        .map(|p| Circle::new(*p, marker, color.filled())),
                )
                .map_err(render_err)?;
        }

        if i == 0 {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperRight)
                .label_font(font(style, 0.8))
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()
                .map_err(render_err)?;
        }
    }

    root.present().map_err(render_err)?;
    info!(facets = maps.len(), "Lane-change distribution written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(map: &str, class: &str, n: i64, count: u64) -> LaneChangeRow {
        LaneChangeRow {
            map: map.into(),
            class: class.into(),
            num_lane_changes: n,
            count,
        }
    }

    #[test]
    fn test_class_series_filters_and_sorts() {
        let rows = vec![
            row("m", "Car", 2, 3),
            row("m", "Truck", 0, 9),
            row("m", "Car", 0, 40),
            row("other", "Car", 1, 5),
            row("m", "Car", 1, 12),
        ];

        assert_eq!(
            class_series(&rows, "m", "Car"),
            vec![(0.0, 40.0), (1.0, 12.0), (2.0, 3.0)]
        );
        assert!(class_series(&rows, "m", "Bus").is_empty());
    }

    #[test]
    fn test_plot_empty_rows_is_error() {
        let err = plot_lane_change_distribution(
            &[],
            &[],
            &PlotStyle::default(),
            Path::new("unused.png"),
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::Render(_)));
    }
}

//! Mean-speed density curves, one facet per map.

use plotters::prelude::*;
use std::path::Path;
use tracing::{debug, info};

use crate::analyzers::kde::{DEFAULT_CUT, DEFAULT_GRID_SIZE, Kde};
use crate::analyzers::types::SpeedRow;
use crate::analyzers::utility::min_max;
use crate::config::PlotStyle;
use crate::error::{AnalysisError, Result};
use crate::render::{
    ClassPalette, facet_grid, font, hue_order, ordered_unique, prepare_output, render_err,
};

const COL_WRAP: usize = 2;
const FACET_ASPECT: f64 = 1.5;
const FILL_ALPHA: f64 = 0.5;

/// Density curves for one facet.
#[derive(Debug, Clone)]
pub struct SpeedFacet {
    pub map: String,
    /// `(class, points)` in hue order; classes without enough data are absent.
    pub curves: Vec<(String, Vec<(f64, f64)>)>,
}

impl SpeedFacet {
    fn peak(&self) -> f64 {
        self.curves
            .iter()
            .flat_map(|(_, points)| points.iter().map(|p| p.1))
            .fold(0.0, f64::max)
    }
}

/// Builds one facet per map with a KDE per class.
///
/// Each class curve is normalised on its own and integrates to one.
pub fn speed_facets(rows: &[SpeedRow], classes: &[String]) -> Vec<SpeedFacet> {
    ordered_unique(rows.iter().map(|r| r.map.as_str()))
        .into_iter()
        .map(|map| {
            let in_map: Vec<&SpeedRow> = rows.iter().filter(|r| r.map == map).collect();
            let curves = classes
                .iter()
                .filter_map(|class| {
                    let speeds: Vec<f64> = in_map
                        .iter()
                        .filter(|r| &r.class == class)
                        .map(|r| r.mean_speed)
                        .collect();
                    let kde = Kde::fit(&speeds)?;
                    Some((class.clone(), kde.curve(DEFAULT_CUT, DEFAULT_GRID_SIZE)))
                })
                .collect();
            SpeedFacet {
                map: map.to_string(),
                curves,
            }
        })
        .collect()
}

/// Renders mean-speed distributions per map and class.
#[tracing::instrument(skip(rows, class_order, style, output), fields(rows = rows.len(), output = %output.display()))]
pub fn plot_speed_distribution(
    rows: &[SpeedRow],
    class_order: &[String],
    style: &PlotStyle,
    output: &Path,
) -> Result<()> {
    let classes = hue_order(class_order, rows.iter().map(|r| r.class.as_str()));
    let palette = ClassPalette::new(classes.clone());
    let facets = speed_facets(rows, &classes);
    if facets.is_empty() {
        return Err(AnalysisError::Render("no speed rows to plot".into()));
    }

    // x axis is shared between facets
    let (x_lo, x_hi) = min_max(
        facets
            .iter()
            .flat_map(|f| f.curves.iter())
            .flat_map(|(_, points)| points.iter().map(|p| p.0)),
    )
    .unwrap_or((0.0, 1.0));
    debug!(facets = facets.len(), x_lo, x_hi, "Speed facets prepared");

    let (grid_rows, grid_cols) = facet_grid(facets.len(), COL_WRAP);
    let facet_h = style.px(style.facet_height);
    let facet_w = style.px(style.facet_height * FACET_ASPECT);

    prepare_output(output)?;
    let root = BitMapBackend::new(
        output,
        (facet_w * grid_cols as u32, facet_h * grid_rows as u32),
    )
    .into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;

    let font_px = style.font_px();
    let areas = root.split_evenly((grid_rows, grid_cols));
    for (i, (facet, area)) in facets.iter().zip(areas.iter()).enumerate() {
        let y_hi = (facet.peak() * 1.05).max(f64::EPSILON);

        let mut chart = ChartBuilder::on(area)
            .caption(format!("map = {}", facet.map), font(style, 1.0))
            .margin((font_px * 0.5).round() as u32)
            .x_label_area_size((font_px * 3.0).round() as u32)
            .y_label_area_size((font_px * 5.0).round() as u32)
            .build_cartesian_2d(x_lo..x_hi, 0.0..y_hi)
            .map_err(render_err)?;

        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc("meanSpeed")
            .y_desc("Density")
            .label_style(font(style, 0.8))
            .axis_desc_style(font(style, 0.9))
            .draw()
            .map_err(render_err)?;

        for (class, points) in &facet.curves {
            let Some(color) = palette.color(class) else {
                continue;
            };
            chart
                .draw_series(
                    AreaSeries::new(points.iter().copied(), 0.0, color.mix(FILL_ALPHA))
                        .border_style(color),
                )
                .map_err(render_err)?
                .label(class.as_str())
                .legend(move |(x, y)| {
                    Rectangle::new([(x, y - 5), (x + 15, y + 5)], color.mix(FILL_ALPHA).filled())
                });
        }

        // a single legend for the figure
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
    info!(facets = facets.len(), "Speed distribution written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(map: &str, class: &str, speed: f64) -> SpeedRow {
        SpeedRow {
            map: map.into(),
            class: class.into(),
            mean_speed: speed,
        }
    }

    #[test]
    fn test_speed_facets_per_map_in_order() {
        let rows = vec![
            row("b", "Car", 30.0),
            row("b", "Car", 32.0),
            row("a", "Car", 28.0),
            row("a", "Car", 29.5),
        ];
        let facets = speed_facets(&rows, &["Car".to_string()]);

        let maps: Vec<&str> = facets.iter().map(|f| f.map.as_str()).collect();
        assert_eq!(maps, vec!["b", "a"]);
    }

    #[test]
    fn test_speed_facets_skip_degenerate_classes() {
        let rows = vec![
            row("m", "Car", 30.0),
            row("m", "Car", 34.0),
            row("m", "Car", 31.0),
            row("m", "Truck", 22.0),
        ];
        let facets = speed_facets(&rows, &["Car".to_string(), "Truck".to_string()]);

        assert_eq!(facets.len(), 1);
        assert_eq!(facets[0].curves.len(), 1);
        assert_eq!(facets[0].curves[0].0, "Car");
    }

    #[test]
    fn test_speed_facets_normalise_each_class() {
        let rows = vec![
            row("m", "Car", 30.0),
            row("m", "Car", 34.0),
            row("m", "Truck", 20.0),
            row("m", "Truck", 22.0),
            row("m", "Truck", 23.0),
            row("m", "Truck", 25.0),
            // not drawn, must not affect the drawn curves
            row("m", "Bus", 15.0),
            row("m", "Bus", 18.0),
        ];
        let facets = speed_facets(&rows, &["Car".to_string(), "Truck".to_string()]);

        let area = |points: &[(f64, f64)]| -> f64 {
            points
                .windows(2)
                .map(|w| (w[1].0 - w[0].0) * (w[0].1 + w[1].1) / 2.0)
                .sum()
        };
        let car = area(&facets[0].curves[0].1);
        let truck = area(&facets[0].curves[1].1);

        assert_eq!(facets[0].curves.len(), 2);
        assert!((car - 1.0).abs() < 0.01, "car area {car}");
        assert!((truck - 1.0).abs() < 0.01, "truck area {truck}");
    }

    #[test]
    fn test_plot_empty_rows_is_error() {
        let err = plot_speed_distribution(
            &[],
            &[],
            &PlotStyle::default(),
            Path::new("unused.png"),
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::Render(_)));
    }
}

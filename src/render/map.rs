//! Trajectory samples scattered over the map's background image.

use image::DynamicImage;
use image::imageops::FilterType;
use plotters::element::BitMapElement;
use plotters::prelude::*;
use std::path::Path;
use tracing::{debug, info};

use crate::analyzers::range::{PlotRange, plot_range};
use crate::analyzers::types::LocatedSample;
use crate::config::{DatasetConfig, MapTransform, PlotStyle};
use crate::error::{AnalysisError, Result};
use crate::loader::load_located_samples;
use crate::render::{ClassPalette, font, hue_order, prepare_output, render_err};

/// Narrowest axis span drawn, in metres.
const MIN_SPAN: f64 = 1.0;
/// Tallest plotting area allowed, relative to its width.
const MAX_ASPECT: f64 = 3.0;

/// Part of the map image that falls inside the plot range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageWindow {
    /// Pixel rectangle to crop: x, y, width, height.
    pub crop: (u32, u32, u32, u32),
    /// Data coordinates of the window's upper-left corner.
    pub top_left: (f64, f64),
    /// Data coordinates of the window's lower-right corner.
    pub bottom_right: (f64, f64),
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
}

/// Locates the visible part of a `width` x `height` image placed with
/// `transform`. `None` when the image lies entirely outside `range`.
pub fn image_window(
    width: u32,
    height: u32,
    transform: &MapTransform,
    range: &PlotRange,
) -> Option<ImageWindow> {
    let (ax, ay) = transform.apply(0.0, 0.0);
    let (bx, by) = transform.apply(width as f64, height as f64);

    let x0 = ax.min(bx).max(range.x_min);
    let x1 = ax.max(bx).min(range.x_max);
    let y0 = ay.min(by).max(range.y_min);
    let y1 = ay.max(by).min(range.y_max);
    if x0 >= x1 || y0 >= y1 {
        return None;
    }

    let (px_a, py_a) = transform.invert(x0, y0);
    let (px_b, py_b) = transform.invert(x1, y1);
    let left = px_a.min(px_b).floor().clamp(0.0, width as f64) as u32;
    let right = px_a.max(px_b).ceil().clamp(0.0, width as f64) as u32;
    let top = py_a.min(py_b).floor().clamp(0.0, height as f64) as u32;
    let bottom = py_a.max(py_b).ceil().clamp(0.0, height as f64) as u32;
    if right <= left || bottom <= top {
        return None;
    }

    Some(ImageWindow {
        crop: (left, top, right - left, bottom - top),
        top_left: (x0, y1),
        bottom_right: (x1, y0),
        // Row 0 is the top of the image; flip when it maps to the low end of y.
        flip_horizontal: transform.scale[0] < 0.0,
        flip_vertical: transform.scale[1] > 0.0,
    })
}

/// Widens any axis narrower than [`MIN_SPAN`] around its centre, so a
/// recording whose samples share one coordinate still gets a chart.
pub fn drawable_range(range: &PlotRange) -> PlotRange {
    let widen = |lo: f64, hi: f64| {
        if hi - lo < MIN_SPAN {
            let mid = (lo + hi) / 2.0;
            (mid - MIN_SPAN / 2.0, mid + MIN_SPAN / 2.0)
        } else {
            (lo, hi)
        }
    };
    let (x_min, x_max) = widen(range.x_min, range.x_max);
    let (y_min, y_max) = widen(range.y_min, range.y_max);
    PlotRange { x_min, x_max, y_min, y_max }
}

/// Pixel layout of the map figure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapLayout {
    pub width: u32,
    pub height: u32,
    pub margin: u32,
    pub x_label_area: u32,
    pub y_label_area: u32,
}

/// Sizes the figure so the plotting area keeps the range's aspect ratio,
/// capped at [`MAX_ASPECT`] times taller than wide.
pub fn map_layout(style: &PlotStyle, range: &PlotRange) -> MapLayout {
    let font_px = style.font_px();
    let margin = font_px.round() as u32;
    let x_label_area = (font_px * 3.0).round() as u32;
    let y_label_area = (font_px * 5.0).round() as u32;
    let caption_area = (font_px * 2.5).round() as u32;

    let width = style.px(style.figure_width);
    let plot_w = width.saturating_sub(y_label_area + 2 * margin).max(1) as f64;
    let plot_h = (plot_w * range.height() / range.width())
        .min(plot_w * MAX_ASPECT)
        .max(font_px * 4.0);
    let height = (plot_h.round() as u32)
        .saturating_add(x_label_area + caption_area + 2 * margin);

    MapLayout { width, height, margin, x_label_area, y_label_area }
}

fn load_image(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|e| match e {
        image::ImageError::IoError(io) => AnalysisError::io(path, io),
        other => AnalysisError::Image {
            path: path.to_path_buf(),
            source: other,
        },
    })
}

/// Renders the first recording of `map_name` over `{image_dir}/{map_name}.png`.
///
/// Returns the plot range that was used.
#[tracing::instrument(skip(config, data_dir, image_dir, output), fields(output = %output.display()))]
pub fn plot_map_and_trajectories(
    map_name: &str,
    config: &DatasetConfig,
    data_dir: &Path,
    image_dir: &Path,
    output: &Path,
    chunk_size: usize,
) -> Result<PlotRange> {
    let map = config.map(map_name)?;
    let file_id = *map.trajectory_files.first().ok_or_else(|| {
        AnalysisError::Config(format!("map '{map_name}' lists no trajectory files"))
    })?;

    let background = load_image(&image_dir.join(format!("{map_name}.png")))?;
    let samples = load_located_samples(data_dir, file_id, chunk_size)?;
    let range = plot_range(&samples)
        .ok_or_else(|| AnalysisError::Render(format!("recording {file_id:02} has no samples")))?;
    debug!(samples = samples.len(), ?range, "Map overlay prepared");

    let classes = hue_order(&config.class_order, samples.iter().map(|s| s.class.as_str()));
    let palette = ClassPalette::new(classes);

    prepare_output(output)?;
    draw_map(
        map_name,
        &background,
        &map.transform,
        &samples,
        &drawable_range(&range),
        &palette,
        &config.style,
        output,
    )?;

    info!(map = map_name, file_id, "Map overlay written");
    Ok(range)
}

#[allow(clippy::too_many_arguments)]
fn draw_map(
    title: &str,
    background: &DynamicImage,
    transform: &MapTransform,
    samples: &[LocatedSample],
    range: &PlotRange,
    palette: &ClassPalette,
    style: &PlotStyle,
    output: &Path,
) -> Result<()> {
    let font_px = style.font_px();
    let layout = map_layout(style, range);

    let root = BitMapBackend::new(output, (layout.width, layout.height)).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, font(style, 1.2))
        .margin(layout.margin)
        .x_label_area_size(layout.x_label_area)
        .y_label_area_size(layout.y_label_area)
        .build_cartesian_2d(range.x_min..range.x_max, range.y_min..range.y_max)
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("x [m]")
        .y_desc("y [m]")
        .label_style(font(style, 0.8))
        .axis_desc_style(font(style, 1.0))
        .draw()
        .map_err(render_err)?;

    if let Some(window) = image_window(background.width(), background.height(), transform, range) {
        let (x, y, w, h) = window.crop;
        let mut visible = background.crop_imm(x, y, w, h);
        if window.flip_horizontal {
            visible = visible.fliph();
        }
        if window.flip_vertical {
            visible = visible.flipv();
        }

        let upper_left = chart.backend_coord(&window.top_left);
        let lower_right = chart.backend_coord(&window.bottom_right);
        let target_w = (lower_right.0 - upper_left.0).max(1) as u32;
        let target_h = (lower_right.1 - upper_left.1).max(1) as u32;
        let visible = visible.resize_exact(target_w, target_h, FilterType::Triangle);

        let element: BitMapElement<_> = (window.top_left, visible).into();
        chart
            .draw_series(std::iter::once(element))
            .map_err(render_err)?;
    } else {
        debug!("Map image lies outside the plot range");
    }

    let marker = (font_px / 3.0).round().max(2.0) as i32;
    for (class, color) in palette.iter() {
        let points = samples
            .iter()
            .filter(|s| s.class == class)
            .map(|s| Circle::new((s.x, s.y), 1, color.filled()));
        chart
            .draw_series(points)
            .map_err(render_err)?
            .label(class)
            .legend(move |(x, y)| Circle::new((x, y), marker, color.filled()));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .label_font(font(style, 0.8))
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(render_err)?;

    root.present().map_err(render_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> PlotRange {
        PlotRange { x_min, x_max, y_min, y_max }
    }

    #[test]
    fn test_image_window_crops_to_range() {
        let t = MapTransform { scale: [0.1, -0.1], offset: [0.0, 0.0] };

        let window = image_window(100, 50, &t, &range(2.0, 12.0, -3.0, 4.0)).unwrap();

        assert_eq!(window.crop, (20, 0, 80, 30));
        assert_eq!(window.top_left, (2.0, 0.0));
        assert_eq!(window.bottom_right, (10.0, -3.0));
        assert!(!window.flip_horizontal);
        assert!(!window.flip_vertical);
    }

    #[test]
    fn test_image_window_flips_upward_y_axis() {
        let t = MapTransform { scale: [1.0, 1.0], offset: [0.0, 0.0] };

        let window = image_window(10, 10, &t, &range(-5.0, 20.0, -5.0, 20.0)).unwrap();

        assert_eq!(window.crop, (0, 0, 10, 10));
        assert_eq!(window.top_left, (0.0, 10.0));
        assert!(window.flip_vertical);
    }

    #[test]
    fn test_image_window_outside_range() {
        let t = MapTransform { scale: [1.0, -1.0], offset: [100.0, 0.0] };
        assert!(image_window(10, 10, &t, &range(0.0, 50.0, -20.0, 5.0)).is_none());
    }

    #[test]
    fn test_drawable_range_widens_collapsed_axis() {
        let widened = drawable_range(&range(5.0, 5.0, -1.0, 7.0));
        assert_eq!(widened, range(4.5, 5.5, -1.0, 7.0));

        let untouched = range(1.0, 10.0, -3.0, 10.0);
        assert_eq!(drawable_range(&untouched), untouched);
    }

    #[test]
    fn test_map_layout_caps_tall_ranges() {
        let style = PlotStyle { dpi: 100, ..Default::default() };
        let layout = map_layout(&style, &range(0.0, 1.0, 0.0, 50.0));
        let plot_w = layout.width - layout.y_label_area - 2 * layout.margin;

        assert_eq!(layout.width, 1200);
        assert!(layout.height <= plot_w * 4, "height {}", layout.height);
    }

    #[test]
    fn test_map_layout_wide_range_keeps_minimum_height() {
        let style = PlotStyle { dpi: 100, ..Default::default() };
        let layout = map_layout(&style, &range(0.0, 10_000.0, 0.0, 7.0));
        assert!(layout.height as f64 >= style.font_px() * 4.0);
    }

    #[test]
    fn test_plot_single_sample_at_whole_x() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("01_tracksMeta.csv"),
            "id,class,meanXVelocity,numLaneChanges\n1,Car,20.0,0\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("01_tracks.csv"), "id,x,y\n1,5.0,2.5\n").unwrap();
        image::RgbImage::new(20, 20)
            .save(dir.path().join("m.png"))
            .unwrap();
        let config = DatasetConfig::from_json(
            r#"{ "style": { "dpi": 50 }, "maps": { "m": { "trajectory_files": [1] } } }"#,
        )
        .unwrap();
        let output = dir.path().join("out/m.png");

        let drawn =
            plot_map_and_trajectories("m", &config, dir.path(), dir.path(), &output, 10).unwrap();

        assert_eq!(drawn, range(5.0, 5.0, -1.0, 7.0));
        let written = image::open(&output).unwrap();
        assert_eq!(written.width(), config.style.px(config.style.figure_width));
    }

    #[test]
    fn test_load_image_missing_is_not_found() {
        let err = load_image(Path::new("/no/such/map.png")).unwrap_err();
        assert!(matches!(err, AnalysisError::NotFound { .. }));
    }
}

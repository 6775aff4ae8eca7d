//! CLI entry point for trajviz.
//!
//! Provides subcommands for plotting trajectories over a map image, plotting
//! speed and lane-change distributions across a dataset, and summarizing a
//! single recording.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use trajviz::analyzers::lane_change::{lane_change_distribution, lane_change_rows};
use trajviz::analyzers::speed::speed_distribution;
use trajviz::{
    config::DatasetConfig,
    loader::{DEFAULT_CHUNK_SIZE, meta_path, read_meta},
    output::{print_json, print_pretty, write_table},
    render::{plot_lane_change_distribution, plot_map_and_trajectories, plot_speed_distribution},
    stats::DatasetSummary,
};

#[derive(Parser)]
#[command(name = "trajviz")]
#[command(about = "Exploratory plots for vehicle trajectory datasets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scatter one recording's trajectories over the map image
    PlotMap {
        /// Map name as listed in the config
        #[arg(value_name = "MAP")]
        map: String,

        /// Dataset config JSON
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,

        /// Directory containing NN_tracks.csv / NN_tracksMeta.csv
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// Directory containing <MAP>.png
        #[arg(short, long, default_value = "maps")]
        image_dir: PathBuf,

        /// PNG to write (defaults to plots/<MAP>.png)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Rows read per chunk from the tracks file
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },
    /// Plot mean-speed distributions for every map matching DATASET
    Speed {
        /// Substring selecting maps, e.g. "highD"
        #[arg(value_name = "DATASET")]
        dataset: String,

        /// Dataset config JSON
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,

        /// Directory containing NN_tracksMeta.csv files
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// PNG to write
        #[arg(short, long, default_value = "plots/speed_distribution.png")]
        output: PathBuf,

        /// Optional: also write the plotted table as CSV
        #[arg(long)]
        table: Option<PathBuf>,
    },
    /// Plot lane-change count distributions for every map matching DATASET
    LaneChanges {
        /// Substring selecting maps, e.g. "highD"
        #[arg(value_name = "DATASET")]
        dataset: String,

        /// Dataset config JSON
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,

        /// Directory containing NN_tracksMeta.csv files
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// PNG to write
        #[arg(short, long, default_value = "plots/lane_changes.png")]
        output: PathBuf,

        /// Optional: also write the plotted table as CSV
        #[arg(long)]
        table: Option<PathBuf>,
    },
    /// Summarize the objects of one recording
    Summary {
        /// Recording id (NN in NN_tracksMeta.csv)
        #[arg(value_name = "FILE_ID")]
        file_id: u32,

        /// Directory containing NN_tracksMeta.csv files
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// Optional: map name to attach to the summary
        #[arg(short, long)]
        map: Option<String>,

        /// Print JSON instead of a log summary
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/trajviz.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("trajviz.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::PlotMap {
            map,
            config,
            data_dir,
            image_dir,
            output,
            chunk_size,
        } => {
            let config = load_config(&config)?;
            let output = output.unwrap_or_else(|| PathBuf::from(format!("plots/{map}.png")));

            let range =
                plot_map_and_trajectories(&map, &config, &data_dir, &image_dir, &output, chunk_size)
                    .with_context(|| format!("plotting map '{map}'"))?;

            info!(
                output = %output.display(),
                x_min = range.x_min,
                x_max = range.x_max,
                y_min = range.y_min,
                y_max = range.y_max,
                "Map plot saved"
            );
        }
        Commands::Speed {
            dataset,
            config,
            data_dir,
            output,
            table,
        } => {
            let config = load_config(&config)?;
            let rows = speed_distribution(&config, &dataset, &data_dir)
                .with_context(|| format!("collecting speeds for '{dataset}'"))?;

            if let Some(table) = table {
                write_table(&table, &rows)?;
                info!(path = %table.display(), rows = rows.len(), "Speed table saved");
            }

            plot_speed_distribution(&rows, &config.class_order, &config.style, &output)
                .with_context(|| format!("plotting speeds for '{dataset}'"))?;
            info!(output = %output.display(), "Speed plot saved");
        }
        Commands::LaneChanges {
            dataset,
            config,
            data_dir,
            output,
            table,
        } => {
            let config = load_config(&config)?;
            let distribution = lane_change_distribution(&config, &dataset, &data_dir)
                .with_context(|| format!("counting lane changes for '{dataset}'"))?;
            let rows = lane_change_rows(&distribution);

            if let Some(table) = table {
                write_table(&table, &rows)?;
                info!(path = %table.display(), rows = rows.len(), "Lane-change table saved");
            }

            plot_lane_change_distribution(&rows, &config.class_order, &config.style, &output)
                .with_context(|| format!("plotting lane changes for '{dataset}'"))?;
            info!(output = %output.display(), "Lane-change plot saved");
        }
        Commands::Summary {
            file_id,
            data_dir,
            map,
            json,
        } => {
            let meta = read_meta(&meta_path(&data_dir, file_id))
                .with_context(|| format!("reading metadata for recording {file_id:02}"))?;
            let summary = DatasetSummary::from_meta(&meta).with_source(file_id, map.as_deref());

            if json {
                print_json(&summary)?;
            } else {
                print_pretty(&summary);
                for class in &summary.classes {
                    info!(
                        class = %class.class,
                        objects = class.objects,
                        share_pct = class.share_pct,
                        mean_speed = class.mean_speed,
                        speed_stddev = class.speed_stddev,
                        with_lane_change = class.with_lane_change,
                        "Class"
                    );
                }
                info!(
                    total = summary.total_objects,
                    classes = summary.classes.len(),
                    lane_change_pct = summary.lane_change_pct(),
                    "Recording summary"
                );
            }
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<DatasetConfig> {
    DatasetConfig::load(path).with_context(|| format!("loading config {}", path.display()))
}

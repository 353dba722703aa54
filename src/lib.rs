//! Dataset Analyzer: statistics for object detection datasets.
//!
//! Point it at a dataset directory in COCO, YOLO or Pascal VOC layout. It
//! detects the format, reads every annotation into one normalized model, and
//! computes overview, box, image and spatial statistics.
//!
//! # Modules
//!
//! - [`ir`]: Normalized dataset model, format detection and readers
//! - [`session`]: The active dataset, image queries and cached reports
//! - [`stats`]: Statistics engine and report types
//! - [`error`]: Error types for dataset-analyzer operations

pub mod error;
pub mod ir;
pub mod session;
pub mod stats;

use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::level_filters::LevelFilter;

pub use error::AnalyzerError;
pub use session::{ImagePage, ImageQuery, Session};
pub use stats::StatsOptions;

/// The dataset-analyzer CLI application.
#[derive(Parser)]
#[command(name = "dataset-analyzer")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Print the detected dataset format.
    Detect(DetectArgs),
    /// Load a dataset and print its summary.
    Info(InfoArgs),
    /// Compute dataset statistics.
    Stats(StatsArgs),
    /// List images, with optional filters.
    Images(ImagesArgs),
    /// Show a single image record.
    Image(ImageArgs),
}

#[derive(clap::Args)]
struct DetectArgs {
    /// Dataset directory.
    path: PathBuf,
}

#[derive(clap::Args)]
struct InfoArgs {
    /// Dataset directory.
    path: PathBuf,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
}

#[derive(clap::Args)]
struct StatsArgs {
    /// Dataset directory.
    path: PathBuf,

    /// Which report to print.
    #[arg(long, value_enum, default_value_t = ReportKind::All)]
    report: ReportKind,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Heatmap grid size (cells per side).
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u16).range(1..))]
    grid_size: u16,

    /// Number of images decoded for brightness statistics.
    #[arg(long, default_value_t = 100)]
    sample_size: usize,
}

#[derive(clap::Args)]
struct ImagesArgs {
    /// Dataset directory.
    path: PathBuf,

    /// Only images with at least one box of this class.
    #[arg(long = "class")]
    class_filter: Option<String>,

    /// Only images in this split.
    #[arg(long = "split")]
    split_filter: Option<String>,

    /// Minimum number of boxes (inclusive).
    #[arg(long)]
    min_boxes: Option<usize>,

    /// Maximum number of boxes (inclusive).
    #[arg(long)]
    max_boxes: Option<usize>,

    /// Page number, starting at 1.
    #[arg(long, default_value_t = 1)]
    page: usize,

    /// Images per page.
    #[arg(long, default_value_t = 50)]
    limit: usize,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
}

#[derive(clap::Args)]
struct ImageArgs {
    /// Dataset directory.
    path: PathBuf,

    /// Image id.
    id: String,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ReportKind {
    All,
    Overview,
    Boxes,
    Images,
    Spatial,
}

/// Run the dataset-analyzer CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), AnalyzerError> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Some(Commands::Detect(args)) => run_detect(args),
        Some(Commands::Info(args)) => run_info(args),
        Some(Commands::Stats(args)) => run_stats(args),
        Some(Commands::Images(args)) => run_images(args),
        Some(Commands::Image(args)) => run_image(args),
        None => {
            println!("dataset-analyzer {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Statistics for object detection datasets.");
            println!();
            println!("Run 'dataset-analyzer --help' for usage information.");
            Ok(())
        }
    }
}

/// Installs the stderr log subscriber. Default level is WARN.
fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => LevelFilter::ERROR,
        (false, 0) => LevelFilter::WARN,
        (false, 1) => LevelFilter::INFO,
        (false, _) => LevelFilter::DEBUG,
    };

    // A second install (e.g. from a test harness) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run_detect(args: DetectArgs) -> Result<(), AnalyzerError> {
    if !args.path.exists() {
        return Err(AnalyzerError::PathNotFound { path: args.path });
    }
    let format = ir::detect_format(&args.path)
        .ok_or_else(|| AnalyzerError::FormatUndetected { path: args.path })?;
    println!("{format}");
    Ok(())
}

fn run_info(args: InfoArgs) -> Result<(), AnalyzerError> {
    let info = load_session(&args.path, StatsOptions::default())?.info()?;
    match args.output {
        OutputFormat::Json => print_json(&info),
        OutputFormat::Text => {
            print!("{info}");
            Ok(())
        }
    }
}

fn run_stats(args: StatsArgs) -> Result<(), AnalyzerError> {
    let options = StatsOptions {
        grid_size: usize::from(args.grid_size),
        brightness_sample_size: args.sample_size,
        ..StatsOptions::default()
    };
    let session = load_session(&args.path, options)?;

    match (args.report, args.output) {
        (ReportKind::All, output) => emit(&session.report()?, output),
        (ReportKind::Overview, output) => emit(session.dataset_stats()?, output),
        (ReportKind::Boxes, output) => emit(session.box_stats()?, output),
        (ReportKind::Images, output) => emit(session.image_stats()?, output),
        (ReportKind::Spatial, output) => emit(session.spatial_stats()?, output),
    }
}

fn run_images(args: ImagesArgs) -> Result<(), AnalyzerError> {
    let session = load_session(&args.path, StatsOptions::default())?;
    let query = ImageQuery {
        page: args.page,
        limit: args.limit,
        class_filter: args.class_filter,
        split_filter: args.split_filter,
        min_boxes: args.min_boxes,
        max_boxes: args.max_boxes,
    };
    let page = session.list_images(&query)?;

    match args.output {
        OutputFormat::Json => print_json(&page),
        OutputFormat::Text => {
            println!(
                "{:<24} {:<10} {:>6} {:>11}  FILE",
                "ID", "SPLIT", "BOXES", "SIZE"
            );
            for image in &page.images {
                println!(
                    "{:<24} {:<10} {:>6} {:>11}  {}",
                    image.id.as_str(),
                    image.split.as_deref().unwrap_or("-"),
                    image.annotations.len(),
                    format!("{}x{}", image.width, image.height),
                    image.filename
                );
            }
            println!();
            println!(
                "Page {} of {} ({} matching image(s))",
                page.page, page.pages, page.total
            );
            Ok(())
        }
    }
}

fn run_image(args: ImageArgs) -> Result<(), AnalyzerError> {
    let session = load_session(&args.path, StatsOptions::default())?;
    let image = session
        .get_image(&args.id)
        .ok_or_else(|| AnalyzerError::ImageNotFound { id: args.id.clone() })?;

    match args.output {
        OutputFormat::Json => print_json(image),
        OutputFormat::Text => {
            println!("Id:        {}", image.id);
            println!("File:      {}", image.filename);
            println!("Path:      {}", image.filepath.display());
            println!("Size:      {}x{}", image.width, image.height);
            println!("Split:     {}", image.split.as_deref().unwrap_or("-"));
            println!("Boxes:     {}", image.annotations.len());
            for ann in &image.annotations {
                let confidence = ann
                    .confidence
                    .map(|c| format!("  conf {c:.2}"))
                    .unwrap_or_default();
                println!(
                    "  {:<16} x {:.4}  y {:.4}  w {:.4}  h {:.4}{}",
                    ann.class_name, ann.x, ann.y, ann.width, ann.height, confidence
                );
            }
            Ok(())
        }
    }
}

fn load_session(path: &Path, options: StatsOptions) -> Result<Session, AnalyzerError> {
    let mut session = Session::with_options(options);
    session.load(path)?;
    Ok(session)
}

fn emit<T: Serialize + std::fmt::Display>(
    value: &T,
    output: OutputFormat,
) -> Result<(), AnalyzerError> {
    match output {
        OutputFormat::Json => print_json(value),
        OutputFormat::Text => {
            print!("{value}");
            Ok(())
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AnalyzerError> {
    let json = serde_json::to_string_pretty(value).map_err(AnalyzerError::JsonOutput)?;
    println!("{json}");
    Ok(())
}

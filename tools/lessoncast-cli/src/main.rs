//! Lessoncast CLI: inspect layouts and exercise the compositor.
//!
//! Usage:
//!   lessoncast layout <TYPE>      Print the rectangles of a layout
//!   lessoncast validate <PATH>    Validate a layout JSON file
//!   lessoncast demo [OPTIONS]     Composite synthetic sources for a while
//!   lessoncast check              Check configuration and host capabilities

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lessoncast_model::config::StudioConfig;
use lessoncast_model::layout::{LayoutType, PipPosition};

mod commands;

#[derive(Parser)]
#[command(
    name = "lessoncast",
    about = "Screen + camera compositor for recorded lessons",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the source rectangles of a layout
    Layout {
        /// screen-only | camera-only | picture-in-picture | side-by-side | presentation
        layout: LayoutType,

        /// Canvas width
        #[arg(long, default_value = "1280")]
        width: u32,

        /// Canvas height
        #[arg(long, default_value = "720")]
        height: u32,

        /// Picture-in-picture corner
        #[arg(long, alias = "pip")]
        pip_position: Option<PipPosition>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Validate a layout JSON file
    Validate {
        /// Path to the layout file
        path: PathBuf,
    },

    /// Run the compositor against synthetic sources
    Demo {
        /// How long to run, in seconds
        #[arg(long, alias = "secs", default_value = "3.0")]
        seconds: f64,

        /// Output width (overrides the config file)
        #[arg(long)]
        width: Option<u32>,

        /// Output height (overrides the config file)
        #[arg(long)]
        height: Option<u32>,

        /// Target frame rate (overrides the config file)
        #[arg(long)]
        fps: Option<u32>,

        /// Host refresh rate driving the render loop
        #[arg(long, default_value = "60")]
        refresh_hz: u32,

        /// Layouts to cycle through, comma separated
        #[arg(long, alias = "layout", value_delimiter = ',', default_value = "screen-only,picture-in-picture,side-by-side,presentation")]
        layouts: Vec<LayoutType>,

        /// Print every event as a JSON line
        #[arg(long)]
        json_events: bool,
    },

    /// Check configuration and host capabilities
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let studio = StudioConfig::load();

    // Initialize logging
    let mut logging = studio.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    lessoncast_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Layout {
            layout,
            width,
            height,
            pip_position,
            json,
        } => commands::layout::run(layout, width, height, pip_position, json),
        Commands::Validate { path } => commands::validate::run(path),
        Commands::Demo {
            seconds,
            width,
            height,
            fps,
            refresh_hz,
            layouts,
            json_events,
        } => {
            let mut config = studio.compositor.clone();
            config.width = width.unwrap_or(config.width);
            config.height = height.unwrap_or(config.height);
            config.frame_rate = fps.unwrap_or(config.frame_rate);
            commands::demo::run(config, seconds, refresh_hz, layouts, json_events).await
        }
        Commands::Check => commands::check::run(&studio).await,
    }
}

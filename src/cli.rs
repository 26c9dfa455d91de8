use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "harmotrack")]
#[command(about = "Harmonic analysis of animal vocalisations from precomputed spectrograms")]
pub struct Cli {
    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Detect F0, track harmonics, find valleys and smooth contours
    Analyze {
        /// Spectral input JSON (freqs, times, magnitude, optional psd)
        input: PathBuf,

        /// Print the full analysis as JSON instead of a summary
        #[arg(long)]
        json: bool,

        /// Ridge estimator: max, peaks, centroid or parabolic
        #[arg(long)]
        method: Option<String>,

        /// Window half-width as a fraction of the expected frequency
        #[arg(long)]
        tolerance: Option<f64>,

        /// Contour smoother: raw, smooth, poly or spline
        #[arg(long)]
        contour: Option<String>,

        /// Smoothing strength shared by all contour methods
        #[arg(long)]
        smoothness: Option<f64>,

        /// Track against the PSD harmonic template instead of ridges
        #[arg(long)]
        template: bool,
    },

    /// Append the detected harmonics of a clip to the training file
    Collect {
        /// Spectral input JSON
        input: PathBuf,

        /// Source name stored with each sample (defaults to the file name)
        #[arg(long)]
        source: Option<String>,

        /// Training file to append to (defaults to the configured one)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Print the effective configuration as TOML
    Config,

    /// Show where config and data files are stored
    Paths,
}

mod cli;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use console::style;

use cli::{Cli, Command};
use harmotrack::analysis::pipeline::{self, HarmonicAnalysis, PipelineOptions, TrackingMode};
use harmotrack::config::{self, AppConfig};
use harmotrack::dsp::fundamental::{self, FundamentalConfig};
use harmotrack::paths;
use harmotrack::storage::input::load_input;
use harmotrack::storage::training::{self, TrainingStore};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };

    match cli.command {
        Command::Analyze {
            input,
            json,
            method,
            tolerance,
            contour,
            smoothness,
            template,
        } => {
            let mut options = PipelineOptions::from(&cfg);
            if let Some(method) = method {
                options.ridge.method = method.parse()?;
            }
            if tolerance.is_some() {
                options.ridge.tolerance = tolerance;
            }
            if let Some(contour) = contour {
                options.contour_method = contour.parse()?;
            }
            if let Some(smoothness) = smoothness {
                options.smoothness = smoothness;
            }
            if template {
                options.mode = TrackingMode::Template;
            }

            let data = load_input(&input)?;
            let analysis = pipeline::analyze(&data.spectrogram, &data.psd, &options, None);

            if json {
                let out = serde_json::to_string_pretty(&analysis)
                    .context("Failed to serialize analysis")?;
                println!("{out}");
            } else {
                print_summary(&input, &analysis);
            }
            Ok(())
        }

        Command::Collect {
            input,
            source,
            output,
        } => collect(&cfg, &input, source, output),

        Command::Config => {
            let out = toml::to_string_pretty(&cfg).context("Failed to serialize config")?;
            print!("{out}");
            Ok(())
        }

        Command::Paths => {
            let config_file = cli.config.unwrap_or_else(paths::config_file);
            println!("  Config:   {}", style(config_file.display()).cyan());
            println!("  Data:     {}", style(paths::data_dir().display()).cyan());
            println!(
                "  Training: {}",
                style(cfg.correction.training_file().display()).cyan()
            );
            Ok(())
        }
    }
}

/// Detect the harmonic series of a clip and append one training sample per
/// overtone to the training file.
fn collect(
    cfg: &AppConfig,
    input: &Path,
    source: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let data = load_input(input)?;
    let detection = FundamentalConfig::from(&cfg.detection);
    let estimate = fundamental::detect_fundamental(&data.psd, &detection);

    let Some(f0) = estimate.f0 else {
        println!("{}", style("No fundamental found, nothing collected").yellow());
        return Ok(());
    };

    let source = source.unwrap_or_else(|| {
        input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| input.display().to_string())
    });

    let samples = training::extract_training_samples(
        &data.spectrogram,
        &estimate.series.expected_harmonics(),
        f0,
        &source,
    );

    let mut store = TrainingStore::new();
    store.insert(&source, samples);

    let path = output.unwrap_or_else(|| cfg.correction.training_file());
    let total = store.append_to_file(&path)?;

    println!(
        "{} Added {} training samples ({} total) to {}",
        style("✓").green(),
        store.len(),
        total,
        style(path.display()).green()
    );
    Ok(())
}

fn print_summary(input: &Path, analysis: &HarmonicAnalysis) {
    println!("{}", style("=== Harmonic Analysis ===").bold());
    println!();
    println!("  Input:    {}", style(input.display()).cyan());

    let Some(f0) = analysis.f0 else {
        println!("  {}", style("No fundamental found").yellow());
        return;
    };

    println!("  F0:       {} Hz", style(format!("{f0:.1}")).green());
    let series: Vec<String> = analysis
        .harmonic_series
        .iter()
        .map(|f| format!("{f:.0}"))
        .collect();
    println!("  Series:   {} Hz", series.join(", "));
    println!(
        "  Tracking: {} ({}), contours: {}",
        analysis.mode, analysis.ridge_method, analysis.contour_method
    );
    println!();

    println!("{}", style("  Harmonics").bold());
    let n_frames = analysis.detections.len().max(1);
    for (number, track) in &analysis.tracks {
        let freqs = track.frequencies();
        let mean = freqs.iter().sum::<f64>() / freqs.len().max(1) as f64;
        println!(
            "    H{:<3} {:>8.1} Hz  {:>4}/{} frames",
            number,
            mean,
            track.len(),
            n_frames
        );
    }

    if !analysis.valleys.is_empty() {
        println!();
        println!("{}", style("  Valleys").bold());
        for (pair, valley) in &analysis.valleys {
            let depth = valley.samples.iter().map(|s| s.depth_db).sum::<f64>()
                / valley.samples.len().max(1) as f64;
            println!(
                "    {:<8} {:>4} frames  mean depth {:.1} dB",
                pair.to_string(),
                valley.samples.len(),
                depth
            );
        }
    }

    if analysis.corrections_applied > 0 {
        println!();
        println!("  Model corrections: {}", analysis.corrections_applied);
    }
}

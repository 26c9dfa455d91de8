use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dsp::contour::{self, Contour, ContourMethod};
use crate::dsp::correction::{self, CorrectorModel};
use crate::dsp::detections::{self, FrameDetections};
use crate::dsp::fundamental::{self, FundamentalConfig};
use crate::dsp::ridge::{self, RidgeConfig, RidgeMethod, RidgeTrack};
use crate::dsp::spectrum::{PowerSpectralDensity, Spectrogram};
use crate::dsp::template::{self, TemplateConfig};
use crate::dsp::valley::{self, HarmonicPair, ValleyConfig, ValleyTrack};

/// Which tracker turns the harmonic series into per-frame detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    /// Per-harmonic ridge tracking with a selectable estimator.
    #[default]
    Ridge,
    /// Strongest prominent peak near the template, then Savitzky-Golay.
    Template,
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingMode::Ridge => f.write_str("ridge"),
            TrackingMode::Template => f.write_str("template"),
        }
    }
}

impl FromStr for TrackingMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "ridge" => Ok(TrackingMode::Ridge),
            "template" => Ok(TrackingMode::Template),
            _ => anyhow::bail!("Unknown tracking mode: {s}. Use ridge or template."),
        }
    }
}

/// Everything the pipeline needs besides the data itself.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub fundamental: FundamentalConfig,
    pub mode: TrackingMode,
    pub ridge: RidgeConfig,
    pub template: TemplateConfig,
    pub valleys: ValleyConfig,
    pub contour_method: ContourMethod,
    pub smoothness: f64,
}

/// Result of one full analysis run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarmonicAnalysis {
    pub f0: Option<f64>,
    pub harmonic_series: Vec<f64>,
    pub mode: TrackingMode,
    /// Estimator used in ridge mode.
    pub ridge_method: RidgeMethod,
    pub contour_method: ContourMethod,
    pub tracks: BTreeMap<u32, RidgeTrack>,
    pub detections: Vec<FrameDetections>,
    pub corrections_applied: usize,
    pub valleys: BTreeMap<HarmonicPair, ValleyTrack>,
    pub contours: BTreeMap<u32, Contour>,
}

impl HarmonicAnalysis {
    pub fn detection_count(&self) -> usize {
        detections::detection_count(&self.detections)
    }
}

/// Run the full harmonic analysis of one clip:
///   1. Detect F0 and the harmonic series from the PSD
///   2. Track every harmonic through the spectrogram
///   3. Optionally refine the detections with a correction model
///   4. Find the valleys between neighbouring harmonics
///   5. Smooth each harmonic's track into a contour
///
/// A clip with no detectable fundamental produces an analysis with no
/// tracks; it is not an error.
pub fn analyze(
    spec: &Spectrogram,
    psd: &PowerSpectralDensity,
    options: &PipelineOptions,
    corrector: Option<&dyn CorrectorModel>,
) -> HarmonicAnalysis {
    let estimate = fundamental::detect_fundamental(psd, &options.fundamental);

    let mut analysis = HarmonicAnalysis {
        f0: estimate.f0,
        harmonic_series: estimate.series.frequencies().to_vec(),
        mode: options.mode,
        ridge_method: options.ridge.method,
        contour_method: options.contour_method,
        ..HarmonicAnalysis::default()
    };

    if estimate.f0.is_none() {
        log::warn!("No fundamental found, nothing to track");
        return analysis;
    }

    let mut frames = match options.mode {
        TrackingMode::Ridge => {
            let tracks = ridge::track_ridges(spec, &estimate.series.expected_harmonics(), &options.ridge);
            detections::frame_detections(spec, &tracks)
        }
        TrackingMode::Template => template::track_with_template(spec, &estimate.series, &options.template),
    };

    if let Some(model) = corrector {
        analysis.corrections_applied = correction::apply_corrections(spec, &mut frames, model);
    }

    let tracks = detections::ridge_tracks(&frames);
    analysis.valleys = valley::find_valleys(spec, &frames, &options.valleys);
    analysis.contours = contour::smooth_contours(&tracks, options.contour_method, options.smoothness);
    analysis.tracks = tracks;
    analysis.detections = frames;

    analysis
}

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::fundamental::ExpectedHarmonic;
use super::peaks;
use super::spectrum::Spectrogram;
use crate::util;

/// Per-frame frequency estimator used by the ridge tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RidgeMethod {
    /// Strongest bin in the search window.
    #[default]
    Max,
    /// Prominent local maximum closest to the expected frequency.
    Peaks,
    /// Energy-weighted mean frequency of the window.
    Centroid,
    /// Strongest bin refined by a three-point parabola in dB.
    Parabolic,
}

impl RidgeMethod {
    pub const ALL: [RidgeMethod; 4] = [
        RidgeMethod::Max,
        RidgeMethod::Peaks,
        RidgeMethod::Centroid,
        RidgeMethod::Parabolic,
    ];

    /// Search half-width as a fraction of the expected frequency, used
    /// when the caller does not provide one.
    pub fn default_tolerance(self) -> f64 {
        match self {
            RidgeMethod::Max | RidgeMethod::Parabolic | RidgeMethod::Peaks => 0.10,
            RidgeMethod::Centroid => 0.15,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RidgeMethod::Max => "max",
            RidgeMethod::Peaks => "peaks",
            RidgeMethod::Centroid => "centroid",
            RidgeMethod::Parabolic => "parabolic",
        }
    }
}

impl fmt::Display for RidgeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RidgeMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "max" => Ok(RidgeMethod::Max),
            "peaks" => Ok(RidgeMethod::Peaks),
            "centroid" => Ok(RidgeMethod::Centroid),
            "parabolic" => Ok(RidgeMethod::Parabolic),
            _ => anyhow::bail!(
                "Unknown ridge method: {s}. Use max, peaks, centroid or parabolic."
            ),
        }
    }
}

/// Ridge tracking parameters.
#[derive(Debug, Clone)]
pub struct RidgeConfig {
    pub method: RidgeMethod,

    /// Search half-width as a fraction of each harmonic's expected
    /// frequency. `None` uses the method's default.
    pub tolerance: Option<f64>,

    /// Minimum prominence (dB) for the `peaks` method.
    pub prominence_db: f64,
}

impl Default for RidgeConfig {
    fn default() -> Self {
        Self {
            method: RidgeMethod::Max,
            tolerance: None,
            prominence_db: 5.0,
        }
    }
}

impl RidgeConfig {
    pub fn effective_tolerance(&self) -> f64 {
        self.tolerance.unwrap_or_else(|| self.method.default_tolerance())
    }
}

/// One frequency estimate of a harmonic in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RidgeSample {
    /// Frame index in the source spectrogram.
    pub frame: usize,
    /// Frame time in seconds.
    pub time: f64,
    /// Estimated instantaneous frequency in Hz.
    pub frequency: f64,
    /// Log-magnitude (dB) of the bin nearest to the estimate.
    pub magnitude_db: f64,
    /// Bin nearest to the estimate.
    pub bin: usize,
}

/// The frame-by-frame path of one harmonic.
///
/// Samples are in frame order with at most one per frame; frames where the
/// estimator found nothing are simply missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidgeTrack {
    pub harmonic: u32,
    pub expected_frequency: f64,
    pub samples: Vec<RidgeSample>,
}

impl RidgeTrack {
    pub fn new(harmonic: u32, expected_frequency: f64) -> Self {
        Self {
            harmonic,
            expected_frequency,
            samples: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.time).collect()
    }

    pub fn frequencies(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.frequency).collect()
    }
}

/// Track every expected harmonic through every frame of the spectrogram.
///
/// For each (harmonic, frame) pair the search window is
/// `[expected - tol, expected + tol]` with `tol = expected * tolerance`.
/// The selected method turns the window into at most one frequency
/// estimate. Frames are independent: a failed frame never affects its
/// neighbours.
///
/// Harmonics that produced no samples at all are left out of the result.
pub fn track_ridges(
    spec: &Spectrogram,
    harmonics: &[ExpectedHarmonic],
    config: &RidgeConfig,
) -> BTreeMap<u32, RidgeTrack> {
    let tolerance = config.effective_tolerance();
    let mut ridges = BTreeMap::new();

    for harmonic in harmonics {
        let mut track = RidgeTrack::new(harmonic.number, harmonic.frequency);

        for frame in 0..spec.n_frames() {
            if let Some(sample) = estimate_frame(spec, frame, harmonic.frequency, tolerance, config) {
                track.samples.push(sample);
            }
        }

        log::debug!(
            "H{} ({:.1} Hz): {} of {} frames tracked with {}",
            harmonic.number,
            harmonic.frequency,
            track.len(),
            spec.n_frames(),
            config.method
        );

        if !track.is_empty() {
            ridges.insert(harmonic.number, track);
        }
    }

    log::info!(
        "Tracked {} of {} harmonics with the {} method",
        ridges.len(),
        harmonics.len(),
        config.method
    );

    ridges
}

/// Estimate one harmonic's frequency in one frame.
pub fn estimate_frame(
    spec: &Spectrogram,
    frame: usize,
    expected: f64,
    tolerance: f64,
    config: &RidgeConfig,
) -> Option<RidgeSample> {
    let tol = expected * tolerance;
    let window = spec.bins_between(expected - tol, expected + tol)?;

    let spectrum = spec.log_frame(frame);
    let freqs = &spec.freqs()[window.clone()];
    let values = &spectrum[window.clone()];

    let (bin, frequency) = match config.method {
        RidgeMethod::Max => {
            let local = util::argmax(values)?;
            (window.start + local, freqs[local])
        }
        RidgeMethod::Peaks => {
            let local = closest_peak(freqs, values, expected, config.prominence_db)?;
            (window.start + local, freqs[local])
        }
        RidgeMethod::Centroid => {
            let centroid = spectral_centroid(freqs, values)?;
            (spec.nearest_bin(centroid), centroid)
        }
        RidgeMethod::Parabolic => {
            let (local, freq) = parabolic_peak(freqs, values, spec.bin_width())?;
            (window.start + local, freq)
        }
    };

    Some(RidgeSample {
        frame,
        time: spec.times()[frame],
        frequency,
        magnitude_db: spectrum[bin],
        bin,
    })
}

/// Among the window's prominent peaks, the one nearest `expected`.
fn closest_peak(freqs: &[f64], values: &[f64], expected: f64, prominence_db: f64) -> Option<usize> {
    peaks::find_peaks(values, Some(prominence_db), 1)
        .into_iter()
        .min_by(|&a, &b| {
            (freqs[a] - expected)
                .abs()
                .total_cmp(&(freqs[b] - expected).abs())
        })
}

/// Energy-weighted mean frequency. dB values are converted to linear
/// amplitude first; returns None when the window carries no energy.
fn spectral_centroid(freqs: &[f64], values_db: &[f64]) -> Option<f64> {
    let mut total = 0.0;
    let mut weighted = 0.0;
    for (&f, &db) in freqs.iter().zip(values_db) {
        let energy = util::db_to_amplitude(db);
        total += energy;
        weighted += f * energy;
    }

    if total > 0.0 && total.is_finite() {
        Some(weighted / total)
    } else {
        None
    }
}

/// Parabolic interpolation around the window maximum.
///
/// With y1, y2, y3 the dB values at the maximum and its neighbours, the
/// vertex of the fitted parabola sits at
///   p = (y3 - y1) / (2 * (2*y2 - y1 - y3))
/// bins from the maximum. A maximum on the window edge has no neighbour on
/// one side, so its bin frequency is returned as-is.
fn parabolic_peak(freqs: &[f64], values: &[f64], bin_width: f64) -> Option<(usize, f64)> {
    let peak = util::argmax(values)?;

    if peak == 0 || peak + 1 >= values.len() {
        return Some((peak, freqs[peak]));
    }

    let (y1, y2, y3) = (values[peak - 1], values[peak], values[peak + 1]);
    let p = (y3 - y1) / (2.0 * (2.0 * y2 - y1 - y3));

    if p.is_finite() {
        Some((peak, freqs[peak] + p * bin_width))
    } else {
        Some((peak, freqs[peak]))
    }
}

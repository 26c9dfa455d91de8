use serde::{Deserialize, Serialize};

use super::peaks;
use super::spectrum::PowerSpectralDensity;

/// Only the lowest this-many PSD peaks are tried as fundamental candidates.
const MAX_CANDIDATES: usize = 10;

/// Minimum separation between PSD peaks, in Hz. Converted to bins and
/// never allowed below `MIN_PEAK_DISTANCE_BINS`.
const MIN_PEAK_DISTANCE_HZ: f64 = 50.0;
const MIN_PEAK_DISTANCE_BINS: usize = 5;

/// Parameters for fundamental / harmonic-series detection.
#[derive(Debug, Clone)]
pub struct FundamentalConfig {
    /// Lower edge of the search band in Hz.
    pub fmin_hz: f64,

    /// Upper edge of the search band in Hz. `None` means the Nyquist
    /// frequency (the last PSD bin).
    pub fmax_hz: Option<f64>,

    /// Minimum peak prominence in dB for a PSD peak to count.
    pub prominence_db: f64,

    /// Highest harmonic number searched for (the fundamental is number 1).
    pub max_harmonics: u32,

    /// Allowed deviation of a harmonic from `n * f0`, as a fraction of the
    /// candidate fundamental.
    pub tolerance: f64,
}

impl Default for FundamentalConfig {
    fn default() -> Self {
        Self {
            fmin_hz: 100.0,
            fmax_hz: None,
            prominence_db: 5.0,
            max_harmonics: 10,
            tolerance: 0.05,
        }
    }
}

/// A harmonic the tracker should follow: its number and where to look.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpectedHarmonic {
    pub number: u32,
    pub frequency: f64,
}

/// Expected frequencies of a harmonic series, lowest first.
///
/// Entry `i` is harmonic number `i + 1`. Every entry after the first is a
/// detected PSD peak, not an exact multiple of the fundamental.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarmonicSeries {
    frequencies: Vec<f64>,
}

impl HarmonicSeries {
    /// Build a series from frequencies. They are sorted so the series is
    /// always non-decreasing.
    pub fn new(mut frequencies: Vec<f64>) -> Self {
        frequencies.sort_by(f64::total_cmp);
        Self { frequencies }
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Number the series 1..=N for the tracker.
    pub fn expected_harmonics(&self) -> Vec<ExpectedHarmonic> {
        self.frequencies
            .iter()
            .enumerate()
            .map(|(i, &frequency)| ExpectedHarmonic {
                number: i as u32 + 1,
                frequency,
            })
            .collect()
    }
}

/// Outcome of fundamental detection. `f0` is None (and the series empty)
/// when the PSD has no qualifying peaks in the search band.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FundamentalEstimate {
    pub f0: Option<f64>,
    pub series: HarmonicSeries,
}

/// Find the fundamental frequency and its harmonic series in a PSD.
///
/// Every PSD peak in the band is a potential F0. Candidates are tried from
/// the lowest frequency upward; for each one we look for the peaks nearest
/// to 2·f0, 3·f0, ... and count how many fall within the tolerance. The
/// candidate explaining the most overtones wins, and on a tie the lowest
/// candidate is kept. This anchors the series on the true fundamental
/// rather than on a loud upper harmonic.
pub fn detect_fundamental(psd: &PowerSpectralDensity, config: &FundamentalConfig) -> FundamentalEstimate {
    let fmin = config.fmin_hz;
    let fmax = config.fmax_hz.unwrap_or_else(|| psd.nyquist());

    // Restrict the PSD to the search band
    let (band_freqs, band_db): (Vec<f64>, Vec<f64>) = psd
        .freqs()
        .iter()
        .zip(psd.db())
        .filter(|(&f, _)| f >= fmin && f <= fmax)
        .map(|(&f, &db)| (f, db))
        .unzip();

    let distance = peak_distance_bins(psd.bin_width());
    let peak_idx = peaks::find_peaks(&band_db, Some(config.prominence_db), distance);

    if peak_idx.is_empty() {
        log::debug!("No PSD peaks between {fmin:.1} and {fmax:.1} Hz");
        return FundamentalEstimate::default();
    }

    // Band frequencies are ascending, so the peak list already runs low to high.
    let peak_freqs: Vec<f64> = peak_idx.iter().map(|&i| band_freqs[i]).collect();
    log::debug!("Found {} PSD peaks in band", peak_freqs.len());

    let mut best_f0 = None;
    let mut best_series = Vec::new();
    let mut best_score = 0;

    for &candidate in peak_freqs.iter().take(MAX_CANDIDATES) {
        if candidate < fmin {
            continue;
        }

        let series = harmonic_series_for(candidate, &peak_freqs, fmax, config);
        log::debug!(
            "F0 candidate {candidate:.1} Hz explains {} harmonics",
            series.len()
        );

        // Strictly greater: ties keep the earlier (lower) candidate
        if series.len() > best_score {
            best_score = series.len();
            best_f0 = Some(candidate);
            best_series = series;
        }
    }

    if let Some(f0) = best_f0 {
        log::info!("Selected F0 {f0:.1} Hz with {} harmonics", best_series.len());
    }

    FundamentalEstimate {
        f0: best_f0,
        series: HarmonicSeries::new(best_series),
    }
}

/// Collect the candidate plus every peak lying within tolerance of one of
/// its integer multiples.
fn harmonic_series_for(
    candidate: f64,
    peak_freqs: &[f64],
    fmax: f64,
    config: &FundamentalConfig,
) -> Vec<f64> {
    let tolerance = candidate * config.tolerance;
    let mut series = vec![candidate];

    for n in 2..=config.max_harmonics {
        let expected = candidate * n as f64;
        if expected > fmax {
            break;
        }

        let closest = peak_freqs
            .iter()
            .copied()
            .min_by(|a, b| (a - expected).abs().total_cmp(&(b - expected).abs()));

        if let Some(freq) = closest {
            if (freq - expected).abs() < tolerance {
                series.push(freq);
            }
        }
    }

    series
}

/// max(5 bins, 50 Hz) expressed in bins.
fn peak_distance_bins(bin_width: f64) -> usize {
    if bin_width <= 0.0 {
        return MIN_PEAK_DISTANCE_BINS;
    }
    ((MIN_PEAK_DISTANCE_HZ / bin_width) as usize).max(MIN_PEAK_DISTANCE_BINS)
}

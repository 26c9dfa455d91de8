use std::collections::BTreeMap;

use super::detections::{FrameDetections, HarmonicDetection};
use super::fundamental::HarmonicSeries;
use super::peaks;
use super::savgol;
use super::spectrum::Spectrogram;

const SAVGOL_POLYORDER: usize = 2;

/// Parameters for tracking against the PSD-derived harmonic template.
#[derive(Debug, Clone)]
pub struct TemplateConfig {
    /// Harmonics below this (Hz) are skipped. `None` means 0.8 times the
    /// lowest series entry.
    pub fmin_hz: Option<f64>,

    /// Harmonics above this (Hz) are skipped. `None` means 1.2 times the
    /// highest series entry.
    pub fmax_hz: Option<f64>,

    /// Half-width of the search window as a fraction of the expected
    /// frequency.
    pub tolerance: f64,

    /// Minimum peak prominence as a fraction of the window's dB range.
    pub prominence_factor: f64,

    /// Savitzky-Golay window applied to each harmonic's frequency track.
    /// Values below 3 disable smoothing.
    pub smoothing_window: usize,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            fmin_hz: None,
            fmax_hz: None,
            tolerance: 0.08,
            prominence_factor: 0.05,
            smoothing_window: 7,
        }
    }
}

/// Track each harmonic of `series` frame by frame, picking the strongest
/// prominent peak near its template frequency.
///
/// The prominence threshold adapts to each window: it is
/// `prominence_factor` times the spread between the loudest and quietest
/// bin, and a perfectly flat window yields nothing. After tracking, each
/// harmonic's frequency sequence is run through a quadratic
/// Savitzky-Golay filter when it is long enough.
///
/// Returns one entry per spectrogram frame.
pub fn track_with_template(
    spec: &Spectrogram,
    series: &HarmonicSeries,
    config: &TemplateConfig,
) -> Vec<FrameDetections> {
    let freqs = series.frequencies();
    let (Some(&lowest), Some(&highest)) = (freqs.first(), freqs.last()) else {
        return spec
            .times()
            .iter()
            .enumerate()
            .map(|(frame, &time)| FrameDetections::new(frame, time))
            .collect();
    };
    let fmin = config.fmin_hz.unwrap_or(lowest * 0.8);
    let fmax = config.fmax_hz.unwrap_or(highest * 1.2);

    let mut frames: Vec<FrameDetections> = spec
        .times()
        .iter()
        .enumerate()
        .map(|(frame, &time)| {
            let mut entry = FrameDetections::new(frame, time);
            for harmonic in series.expected_harmonics() {
                if harmonic.frequency < fmin || harmonic.frequency > fmax {
                    continue;
                }
                if let Some(det) = strongest_peak(spec, frame, harmonic.number, harmonic.frequency, config) {
                    entry.harmonics.push(det);
                }
            }
            entry
        })
        .collect();

    smooth_tracks(&mut frames, config.smoothing_window);

    log::info!(
        "Template tracking: {} detections over {} frames",
        super::detections::detection_count(&frames),
        frames.len()
    );

    frames
}

fn strongest_peak(
    spec: &Spectrogram,
    frame: usize,
    harmonic: u32,
    expected: f64,
    config: &TemplateConfig,
) -> Option<HarmonicDetection> {
    let tol = expected * config.tolerance;
    let window = spec.bins_between(expected - tol, expected + tol)?;
    let spectrum = spec.log_frame(frame);
    let values = &spectrum[window.clone()];

    let hi = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let lo = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let range = hi - lo;
    if !(range > 0.0) {
        return None;
    }

    let best = peaks::find_peaks(values, Some(range * config.prominence_factor), 1)
        .into_iter()
        .reduce(|best, p| if values[p] > values[best] { p } else { best })?;

    let bin = window.start + best;
    Some(HarmonicDetection {
        harmonic,
        expected_frequency: expected,
        frequency: spec.freqs()[bin],
        magnitude_db: spectrum[bin],
        bin,
        model_corrected: false,
    })
}

/// Savitzky-Golay smoothing of every harmonic's frequency sequence, in
/// place. Bins and magnitudes keep their detected values.
fn smooth_tracks(frames: &mut [FrameDetections], window: usize) {
    if window < 3 {
        return;
    }

    // harmonic -> (frame index, position within that frame)
    let mut tracks: BTreeMap<u32, Vec<(usize, usize)>> = BTreeMap::new();
    for (f, frame) in frames.iter().enumerate() {
        for (h, det) in frame.harmonics.iter().enumerate() {
            tracks.entry(det.harmonic).or_default().push((f, h));
        }
    }

    for (harmonic, slots) in tracks {
        if slots.len() < window {
            continue;
        }
        let len = if window % 2 == 0 { window - 1 } else { window };
        if len < 3 {
            continue;
        }

        let raw: Vec<f64> = slots.iter().map(|&(f, h)| frames[f].harmonics[h].frequency).collect();
        let Some(smoothed) = savgol::savitzky_golay(&raw, len, SAVGOL_POLYORDER) else {
            log::warn!("H{harmonic}: Savitzky-Golay smoothing failed, keeping raw track");
            continue;
        };

        for (&(f, h), value) in slots.iter().zip(smoothed) {
            frames[f].harmonics[h].frequency = value;
        }
    }
}

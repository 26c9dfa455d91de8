use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::polyfit;
use super::ridge::RidgeTrack;
use super::spline;
use crate::util;

/// Post-processing applied to a ridge before it is reported as a contour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContourMethod {
    /// The ridge frequencies unchanged.
    #[default]
    Raw,
    /// Centered moving average.
    Smooth,
    /// Low-order polynomial fit over the whole ridge.
    Poly,
    /// Cubic smoothing spline.
    Spline,
}

impl ContourMethod {
    pub const ALL: [ContourMethod; 4] = [
        ContourMethod::Raw,
        ContourMethod::Smooth,
        ContourMethod::Poly,
        ContourMethod::Spline,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContourMethod::Raw => "raw",
            ContourMethod::Smooth => "smooth",
            ContourMethod::Poly => "poly",
            ContourMethod::Spline => "spline",
        }
    }
}

impl fmt::Display for ContourMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContourMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "raw" => Ok(ContourMethod::Raw),
            "smooth" => Ok(ContourMethod::Smooth),
            "poly" | "polyfit" => Ok(ContourMethod::Poly),
            "spline" => Ok(ContourMethod::Spline),
            _ => anyhow::bail!("Unknown contour method: {s}. Use raw, smooth, poly or spline."),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContourPoint {
    pub time: f64,
    pub frequency: f64,
}

/// A smoothed ridge: same timestamps as the source track, new frequencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contour {
    pub harmonic: u32,
    pub method: ContourMethod,
    pub points: Vec<ContourPoint>,
}

impl Contour {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn frequencies(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.frequency).collect()
    }
}

/// Smooth one ridge track into a contour.
///
/// `smoothness` is the single user control shared by all methods:
///   - smooth: moving-average window of max(1, round(smoothness)) samples
///   - poly:   order 1 below 5, order 2 below 10, order 3 otherwise
///   - spline: residual budget max(1, round(smoothness)) * var(freqs) * 0.1
///
/// Every method that cannot produce a result (too few samples, singular
/// fit) hands back the raw frequencies. The output always has exactly the
/// track's timestamps.
pub fn smooth_contour(track: &RidgeTrack, method: ContourMethod, smoothness: f64) -> Contour {
    let times = track.times();
    let freqs = track.frequencies();

    let freqs = match smooth_values(&times, &freqs, method, smoothness) {
        Smoothing::Applied(values) => values,
        Smoothing::Unchanged => freqs,
        Smoothing::Failed => {
            log::warn!("H{}: {method} smoothing failed, using raw ridge", track.harmonic);
            freqs
        }
    };

    Contour {
        harmonic: track.harmonic,
        method,
        points: times
            .into_iter()
            .zip(freqs)
            .map(|(time, frequency)| ContourPoint { time, frequency })
            .collect(),
    }
}

/// Smooth every track with the same method and control value.
pub fn smooth_contours(
    tracks: &BTreeMap<u32, RidgeTrack>,
    method: ContourMethod,
    smoothness: f64,
) -> BTreeMap<u32, Contour> {
    tracks
        .iter()
        .filter(|(_, track)| !track.is_empty())
        .map(|(&harmonic, track)| (harmonic, smooth_contour(track, method, smoothness)))
        .collect()
}

/// Outcome of one smoothing attempt.
#[derive(Debug, PartialEq)]
enum Smoothing {
    Applied(Vec<f64>),
    /// Nothing to do: raw method, window of 1, or fewer than 3 samples.
    Unchanged,
    /// The fit itself broke down.
    Failed,
}

fn smooth_values(
    times: &[f64],
    freqs: &[f64],
    method: ContourMethod,
    smoothness: f64,
) -> Smoothing {
    if freqs.len() < 3 {
        return Smoothing::Unchanged;
    }

    match method {
        ContourMethod::Raw => Smoothing::Unchanged,
        ContourMethod::Smooth => match moving_average(freqs, window_length(smoothness)) {
            Some(values) => Smoothing::Applied(values),
            None => Smoothing::Unchanged,
        },
        ContourMethod::Poly => match polynomial_contour(times, freqs, smoothness) {
            Some(values) => Smoothing::Applied(values),
            None => Smoothing::Failed,
        },
        ContourMethod::Spline => match spline_contour(times, freqs, smoothness) {
            Some(values) => Smoothing::Applied(values),
            None => Smoothing::Failed,
        },
    }
}

/// max(1, round(smoothness)) as a sample count. Saturates for huge values.
fn window_length(smoothness: f64) -> usize {
    smoothness.round().max(1.0) as usize
}

/// Centered moving average with edge replication.
///
/// The series behaves as if padded with `window / 2` copies of its first
/// value on the left and `window - 1 - window / 2` copies of its last value
/// on the right, so the output has the input's length. The padding is never
/// materialised: each window sum is the count of edge copies it covers plus
/// a prefix-sum slice of the real samples. Returns None when there is
/// nothing to smooth (window of 1, or fewer than 3 samples).
fn moving_average(values: &[f64], window: usize) -> Option<Vec<f64>> {
    let n = values.len();
    if window <= 1 || n < 3 {
        return None;
    }

    let first = values[0];
    let last = values[n - 1];

    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    for &v in values {
        prefix.push(prefix[prefix.len() - 1] + v);
    }

    // Window for output i covers padded indices [i - left, i - left + w - 1]
    // in sample coordinates; i128 keeps usize::MAX windows from overflowing.
    let w = window as i128;
    let left = w / 2;
    let last_index = n as i128 - 1;

    Some(
        (0..n as i128)
            .map(|i| {
                let start = i - left;
                let end = start + w - 1;

                let before = (-start).max(0);
                let after = (end - last_index).max(0);
                let lo = start.max(0) as usize;
                let hi = end.min(last_index) as usize;
                let inner = prefix[hi + 1] - prefix[lo];

                (before as f64 * first + inner + after as f64 * last) / w as f64
            })
            .collect(),
    )
}

/// Polynomial fit against mean-centred time.
fn polynomial_contour(times: &[f64], freqs: &[f64], smoothness: f64) -> Option<Vec<f64>> {
    let order = if smoothness < 5.0 {
        1
    } else if smoothness < 10.0 {
        2
    } else {
        3
    };
    // With n samples a degree n-1 polynomial already interpolates them
    let order = order.min(times.len() - 1);

    let t0 = util::mean(times);
    let centred: Vec<f64> = times.iter().map(|&t| t - t0).collect();

    let poly = polyfit::fit(&centred, freqs, order)?;
    Some(centred.iter().map(|&t| poly.eval(t)).collect())
}

/// Smoothing spline against mean-centred time.
fn spline_contour(times: &[f64], freqs: &[f64], smoothness: f64) -> Option<Vec<f64>> {
    let t0 = util::mean(times);
    let centred: Vec<f64> = times.iter().map(|&t| t - t0).collect();
    let budget = window_length(smoothness) as f64 * util::variance(freqs) * 0.1;

    spline::smoothing_spline(&centred, freqs, budget)
}

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::detections::{FrameDetections, HarmonicDetection};
use super::spectrum::Spectrogram;
use crate::util;

/// Valley search parameters.
#[derive(Debug, Clone)]
pub struct ValleyConfig {
    /// Fraction of the harmonic gap excluded on each side of the search
    /// band, so the flanks of the harmonics are never reported as valleys.
    pub margin: f64,

    /// Pairs closer than this (Hz) are not searched.
    pub min_gap_hz: f64,
}

impl Default for ValleyConfig {
    fn default() -> Self {
        Self {
            margin: 0.25,
            min_gap_hz: 50.0,
        }
    }
}

/// Unordered pair of harmonic numbers, stored lowest first.
/// Displays (and serializes) as "H1-H2".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HarmonicPair {
    pub low: u32,
    pub high: u32,
}

impl HarmonicPair {
    pub fn new(a: u32, b: u32) -> Self {
        Self {
            low: a.min(b),
            high: a.max(b),
        }
    }
}

impl fmt::Display for HarmonicPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H{}-H{}", self.low, self.high)
    }
}

impl FromStr for HarmonicPair {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let parse = |part: &str| -> anyhow::Result<u32> {
            let digits = part
                .trim()
                .strip_prefix(['H', 'h'])
                .ok_or_else(|| anyhow::anyhow!("Invalid harmonic pair: {s}"))?;
            Ok(digits.parse()?)
        };

        let (a, b) = s
            .split_once('-')
            .ok_or_else(|| anyhow::anyhow!("Invalid harmonic pair: {s}"))?;
        Ok(Self::new(parse(a)?, parse(b)?))
    }
}

// JSON object keys have to be strings, so the pair goes over the wire in
// its display form.
impl Serialize for HarmonicPair {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HarmonicPair {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The spectral minimum between two harmonics in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValleySample {
    pub frame: usize,
    pub time: f64,
    pub frequency: f64,
    pub magnitude_db: f64,
    /// Mean of the two bounding harmonic magnitudes minus the valley
    /// magnitude. Larger means a better separated pair.
    pub depth_db: f64,
    pub bin: usize,
    /// Frequencies of the lower and upper bounding harmonics.
    pub between: (f64, f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValleyTrack {
    pub pair: HarmonicPair,
    pub samples: Vec<ValleySample>,
}

/// Find the valley between every pair of adjacent harmonics in every frame.
///
/// Within a frame the detected harmonics are sorted by frequency. For each
/// neighbouring pair at least `min_gap_hz` apart, `gap * margin` is trimmed
/// off both ends of the interval and the lowest log-magnitude bin in what
/// remains is the valley. Pairs whose trimmed band contains no bins are
/// skipped for that frame.
pub fn find_valleys(
    spec: &Spectrogram,
    detections: &[FrameDetections],
    config: &ValleyConfig,
) -> BTreeMap<HarmonicPair, ValleyTrack> {
    let mut valleys: BTreeMap<HarmonicPair, ValleyTrack> = BTreeMap::new();

    for frame in detections {
        if frame.harmonics.len() < 2 || frame.frame >= spec.n_frames() {
            continue;
        }

        let mut present: Vec<&HarmonicDetection> = frame.harmonics.iter().collect();
        present.sort_by(|a, b| a.frequency.total_cmp(&b.frequency));

        for pair in present.windows(2) {
            let (h1, h2) = (pair[0], pair[1]);
            let Some(sample) = valley_between(spec, frame, h1, h2, config) else {
                continue;
            };

            let key = HarmonicPair::new(h1.harmonic, h2.harmonic);
            valleys
                .entry(key)
                .or_insert_with(|| ValleyTrack {
                    pair: key,
                    samples: Vec::new(),
                })
                .samples
                .push(sample);
        }
    }

    log::info!("Found valleys for {} harmonic pairs", valleys.len());
    valleys
}

fn valley_between(
    spec: &Spectrogram,
    frame: &FrameDetections,
    h1: &HarmonicDetection,
    h2: &HarmonicDetection,
    config: &ValleyConfig,
) -> Option<ValleySample> {
    let gap = h2.frequency - h1.frequency;
    if gap < config.min_gap_hz {
        return None;
    }

    let margin = gap * config.margin;
    let band_lo = h1.frequency + margin;
    let band_hi = h2.frequency - margin;
    if band_lo >= band_hi {
        return None;
    }

    let start = util::search_sorted(spec.freqs(), band_lo);
    let end = util::search_sorted(spec.freqs(), band_hi);
    if start >= end {
        return None;
    }

    let spectrum = spec.log_frame(frame.frame);
    let local = util::argmin(&spectrum[start..end])?;
    let bin = start + local;
    let magnitude_db = spectrum[bin];

    Some(ValleySample {
        frame: frame.frame,
        time: frame.time,
        frequency: spec.freqs()[bin],
        magnitude_db,
        depth_db: (h1.magnitude_db + h2.magnitude_db) / 2.0 - magnitude_db,
        bin,
        between: (h1.frequency, h2.frequency),
    })
}

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::dsp::fundamental::ExpectedHarmonic;
use crate::dsp::spectrum::Spectrogram;

/// Bins of context kept below and above an annotated harmonic.
pub const CONTEXT_BINS: usize = 20;

/// One annotated harmonic with the spectral band around it, ready to train
/// a correction model on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    /// Log-magnitude band over every frame, frame-major.
    pub spectrogram: Vec<Vec<f64>>,
    pub freqs: Vec<f64>,
    pub target_freq: f64,
    pub harmonic_num: u32,
    pub f0: f64,
    /// Where the annotation came from, usually the audio file name.
    pub source: String,
}

/// Cut a training sample for every annotated harmonic line except the
/// fundamental.
///
/// The band spans bins `[k - 20, k + 20)` around the bin `k` nearest the
/// annotated frequency, clipped to the spectrogram, across all frames.
pub fn extract_training_samples(
    spec: &Spectrogram,
    lines: &[ExpectedHarmonic],
    f0: f64,
    source: &str,
) -> Vec<TrainingSample> {
    lines
        .iter()
        .filter(|line| line.number != 1)
        .map(|line| {
            let bin = spec.nearest_bin(line.frequency);
            let start = bin.saturating_sub(CONTEXT_BINS);
            let end = (bin + CONTEXT_BINS).min(spec.n_bins());

            TrainingSample {
                spectrogram: (0..spec.n_frames())
                    .map(|t| spec.log_frame(t)[start..end].to_vec())
                    .collect(),
                freqs: spec.freqs()[start..end].to_vec(),
                target_freq: line.frequency,
                harmonic_num: line.number,
                f0,
                source: source.to_string(),
            }
        })
        .collect()
}

/// In-memory collection of training samples, grouped by source.
///
/// Adding samples for a source replaces whatever that source had before,
/// so re-annotating a file does not duplicate its samples.
#[derive(Debug, Default)]
pub struct TrainingStore {
    by_source: BTreeMap<String, Vec<TrainingSample>>,
}

impl TrainingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: &str, samples: Vec<TrainingSample>) {
        self.by_source.insert(source.to_string(), samples);
    }

    pub fn get(&self, source: &str) -> Option<&[TrainingSample]> {
        self.by_source.get(source).map(Vec::as_slice)
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.by_source.keys().map(String::as_str)
    }

    /// Total number of samples across all sources.
    pub fn len(&self) -> usize {
        self.by_source.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append every held sample to a JSON training file, creating it if
    /// needed. Returns the number of samples in the file afterwards.
    pub fn append_to_file(&self, path: &Path) -> Result<usize> {
        let mut all = if path.exists() {
            load_samples(path)?
        } else {
            Vec::new()
        };
        all.extend(self.by_source.values().flatten().cloned());

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let json = serde_json::to_string(&all).context("Failed to serialize training samples")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write training file: {}", path.display()))?;

        log::info!("Added {} training samples ({} total)", self.len(), all.len());
        Ok(all.len())
    }
}

/// Read a JSON training file written by `append_to_file`.
pub fn load_samples(path: &Path) -> Result<Vec<TrainingSample>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read training file: {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse training file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn spec() -> Spectrogram {
        let freqs: Vec<f64> = (0..100).map(|i| i as f64 * 10.0).collect();
        let times = vec![0.0, 0.01, 0.02];
        let frames = (0..3)
            .map(|t| (0..100).map(|k| (t * 100 + k) as f64).collect())
            .collect();
        Spectrogram::from_log_magnitude(frames, freqs, times).unwrap()
    }

    fn lines() -> Vec<ExpectedHarmonic> {
        vec![
            ExpectedHarmonic { number: 1, frequency: 200.0 },
            ExpectedHarmonic { number: 2, frequency: 404.0 },
            ExpectedHarmonic { number: 3, frequency: 980.0 },
        ]
    }

    #[test]
    fn fundamental_is_skipped() {
        let samples = extract_training_samples(&spec(), &lines(), 200.0, "a.wav");
        let numbers: Vec<u32> = samples.iter().map(|s| s.harmonic_num).collect();
        assert_eq!(numbers, vec![2, 3]);
        assert!(samples.iter().all(|s| s.f0 == 200.0 && s.source == "a.wav"));
    }

    #[test]
    fn band_is_centred_on_nearest_bin() {
        let samples = extract_training_samples(&spec(), &lines(), 200.0, "a.wav");

        // 404 Hz -> bin 40, band 20..60
        let h2 = &samples[0];
        assert_eq!(h2.target_freq, 404.0);
        assert_eq!(h2.freqs.len(), 40);
        assert_eq!(h2.freqs[0], 200.0);
        assert_eq!(h2.spectrogram.len(), 3);
        assert_eq!(h2.spectrogram[2][0], 220.0);

        // 980 Hz -> bin 98, band 78..100
        let h3 = &samples[1];
        assert_eq!(h3.freqs.len(), 22);
        assert_eq!(h3.freqs[21], 990.0);
    }

    #[test]
    fn store_replaces_per_source() {
        let mut store = TrainingStore::new();
        let samples = extract_training_samples(&spec(), &lines(), 200.0, "a.wav");
        store.insert("a.wav", samples.clone());
        store.insert("a.wav", samples);
        store.insert("b.wav", Vec::new());

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("a.wav").map(<[_]>::len), Some(2));
        assert_eq!(store.sources().collect::<Vec<_>>(), vec!["a.wav", "b.wav"]);
        assert!(store.get("c.wav").is_none());
    }

    #[test]
    fn append_accumulates_in_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("training").join("harmonic_training.json");

        let mut store = TrainingStore::new();
        store.insert("a.wav", extract_training_samples(&spec(), &lines(), 200.0, "a.wav"));

        assert_eq!(store.append_to_file(&path).unwrap(), 2);
        assert_eq!(store.append_to_file(&path).unwrap(), 4);

        let loaded = load_samples(&path).unwrap();
        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded[3].harmonic_num, 3);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.json");
        std::fs::write(&path, "not json").unwrap();

        let store = TrainingStore::new();
        let err = store.append_to_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse training file"));
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ridge::{RidgeSample, RidgeTrack};
use super::spectrum::Spectrogram;

/// One harmonic found in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarmonicDetection {
    pub harmonic: u32,
    pub expected_frequency: f64,
    pub frequency: f64,
    pub magnitude_db: f64,
    pub bin: usize,
    /// Set when a correction model replaced `frequency`.
    #[serde(default)]
    pub model_corrected: bool,
}

/// All harmonics detected in a single frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDetections {
    pub frame: usize,
    pub time: f64,
    pub harmonics: Vec<HarmonicDetection>,
}

impl FrameDetections {
    pub fn new(frame: usize, time: f64) -> Self {
        Self {
            frame,
            time,
            harmonics: Vec::new(),
        }
    }
}

/// Regroup per-harmonic ridge tracks into one entry per spectrogram frame.
///
/// Every frame gets an entry, even when no harmonic was found in it, so the
/// result lines up index-for-index with the spectrogram's time axis.
/// Within a frame, harmonics appear in ascending harmonic number.
pub fn frame_detections(spec: &Spectrogram, tracks: &BTreeMap<u32, RidgeTrack>) -> Vec<FrameDetections> {
    let mut frames: Vec<FrameDetections> = spec
        .times()
        .iter()
        .enumerate()
        .map(|(frame, &time)| FrameDetections::new(frame, time))
        .collect();

    for track in tracks.values() {
        for sample in &track.samples {
            if let Some(entry) = frames.get_mut(sample.frame) {
                entry.harmonics.push(HarmonicDetection {
                    harmonic: track.harmonic,
                    expected_frequency: track.expected_frequency,
                    frequency: sample.frequency,
                    magnitude_db: sample.magnitude_db,
                    bin: sample.bin,
                    model_corrected: false,
                });
            }
        }
    }

    frames
}

/// Inverse of `frame_detections`: rebuild one ridge track per harmonic.
/// Corrected frequencies are carried over as they are.
pub fn ridge_tracks(detections: &[FrameDetections]) -> BTreeMap<u32, RidgeTrack> {
    let mut tracks: BTreeMap<u32, RidgeTrack> = BTreeMap::new();

    for frame in detections {
        for det in &frame.harmonics {
            tracks
                .entry(det.harmonic)
                .or_insert_with(|| RidgeTrack::new(det.harmonic, det.expected_frequency))
                .samples
                .push(RidgeSample {
                    frame: frame.frame,
                    time: frame.time,
                    frequency: det.frequency,
                    magnitude_db: det.magnitude_db,
                    bin: det.bin,
                });
        }
    }

    tracks
}

/// Total number of harmonic detections across all frames.
pub fn detection_count(detections: &[FrameDetections]) -> usize {
    detections.iter().map(|f| f.harmonics.len()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(n_frames: usize) -> Spectrogram {
        let freqs: Vec<f64> = (0..10).map(|i| i as f64 * 100.0).collect();
        let times: Vec<f64> = (0..n_frames).map(|t| t as f64 * 0.01).collect();
        Spectrogram::from_magnitude(vec![vec![1.0; 10]; n_frames], freqs, times).unwrap()
    }

    fn sample(frame: usize, frequency: f64) -> RidgeSample {
        RidgeSample {
            frame,
            time: frame as f64 * 0.01,
            frequency,
            magnitude_db: -3.0,
            bin: (frequency / 100.0).round() as usize,
        }
    }

    fn tracks() -> BTreeMap<u32, RidgeTrack> {
        let mut h1 = RidgeTrack::new(1, 200.0);
        h1.samples = vec![sample(0, 200.0), sample(1, 210.0), sample(3, 205.0)];
        let mut h2 = RidgeTrack::new(2, 400.0);
        h2.samples = vec![sample(1, 400.0), sample(2, 410.0)];
        BTreeMap::from([(1, h1), (2, h2)])
    }

    #[test]
    fn one_entry_per_frame() {
        let frames = frame_detections(&spec(5), &tracks());
        assert_eq!(frames.len(), 5);
        assert_eq!(frames[1].harmonics.len(), 2);
        assert_eq!(frames[2].harmonics.len(), 1);
        assert!(frames[4].harmonics.is_empty());
        assert_eq!(detection_count(&frames), 5);
    }

    #[test]
    fn harmonics_within_frame_are_ordered_by_number() {
        let frames = frame_detections(&spec(4), &tracks());
        let numbers: Vec<u32> = frames[1].harmonics.iter().map(|h| h.harmonic).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn converting_back_restores_tracks() {
        let original = tracks();
        let frames = frame_detections(&spec(4), &original);
        assert_eq!(ridge_tracks(&frames), original);
    }

    #[test]
    fn samples_beyond_spectrogram_are_ignored() {
        let frames = frame_detections(&spec(2), &tracks());
        assert_eq!(detection_count(&frames), 3);
    }
}

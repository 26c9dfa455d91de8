use super::detections::FrameDetections;
use super::spectrum::Spectrogram;

/// Frames of context taken on each side of a detection.
pub const CONTEXT_FRAMES: usize = 5;

/// Frequency bins of context taken on each side of a detection.
pub const CONTEXT_BINS: usize = 20;

/// Shifts at or below this many Hz are not applied.
pub const MIN_CORRECTION_HZ: f64 = 5.0;

/// A learned model that refines harmonic frequency estimates.
///
/// Implementations receive a log-magnitude patch around a detection
/// (frame-major: `patch[t][k]`), the frequency of each patch column, and
/// the current estimate. They return their own estimate in Hz; returning
/// `prior_freq` unchanged means "no correction".
pub trait CorrectorModel {
    fn is_trained(&self) -> bool;

    fn predict_correction(&self, patch: &[Vec<f64>], freqs: &[f64], prior_freq: f64) -> f64;
}

/// Run the model over every detection and overwrite the frequencies it
/// moves by more than 5 Hz. Returns the number of corrections applied.
///
/// An untrained model leaves the detections untouched.
pub fn apply_corrections(
    spec: &Spectrogram,
    detections: &mut [FrameDetections],
    model: &dyn CorrectorModel,
) -> usize {
    if !model.is_trained() {
        log::warn!("Correction model is not trained, skipping corrections");
        return 0;
    }

    let mut applied = 0;

    for frame in detections.iter_mut() {
        if frame.frame >= spec.n_frames() {
            continue;
        }

        for det in &mut frame.harmonics {
            let (patch, freqs) = context_patch(spec, frame.frame, det.bin);
            if freqs.is_empty() {
                continue;
            }

            let corrected = model.predict_correction(&patch, &freqs, det.frequency);
            if corrected.is_finite() && (corrected - det.frequency).abs() > MIN_CORRECTION_HZ {
                log::debug!(
                    "Frame {}: H{} {:.1} -> {:.1} Hz",
                    frame.frame,
                    det.harmonic,
                    det.frequency,
                    corrected
                );
                det.frequency = corrected;
                det.model_corrected = true;
                applied += 1;
            }
        }
    }

    log::info!("Applied {applied} learned corrections");
    applied
}

/// Log-magnitude values in frames `frame ± 5` and bins `bin ± 20`, clipped
/// to the spectrogram, along with the frequencies of the kept bins.
pub fn context_patch(spec: &Spectrogram, frame: usize, bin: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
    let t_start = frame.saturating_sub(CONTEXT_FRAMES);
    let t_end = (frame + CONTEXT_FRAMES + 1).min(spec.n_frames());
    let f_start = bin.saturating_sub(CONTEXT_BINS).min(spec.n_bins());
    let f_end = (bin + CONTEXT_BINS + 1).min(spec.n_bins());

    let patch = (t_start..t_end)
        .map(|t| spec.log_frame(t)[f_start..f_end].to_vec())
        .collect();
    let freqs = spec.freqs()[f_start..f_end].to_vec();

    (patch, freqs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::detections::HarmonicDetection;
    use std::cell::Cell;

    fn spec(n_frames: usize, n_bins: usize) -> Spectrogram {
        let freqs: Vec<f64> = (0..n_bins).map(|i| i as f64 * 10.0).collect();
        let times: Vec<f64> = (0..n_frames).map(|t| t as f64 * 0.01).collect();
        let frames = (0..n_frames)
            .map(|t| (0..n_bins).map(|k| (t * 1000 + k) as f64).collect())
            .collect();
        Spectrogram::from_log_magnitude(frames, freqs, times).unwrap()
    }

    fn detections(n_frames: usize) -> Vec<FrameDetections> {
        (0..n_frames)
            .map(|t| FrameDetections {
                frame: t,
                time: t as f64 * 0.01,
                harmonics: vec![
                    HarmonicDetection {
                        harmonic: 1,
                        expected_frequency: 300.0,
                        frequency: 300.0,
                        magnitude_db: -10.0,
                        bin: 30,
                        model_corrected: false,
                    },
                    HarmonicDetection {
                        harmonic: 2,
                        expected_frequency: 600.0,
                        frequency: 600.0,
                        magnitude_db: -12.0,
                        bin: 60,
                        model_corrected: false,
                    },
                ],
            })
            .collect()
    }

    struct Untrained;

    impl CorrectorModel for Untrained {
        fn is_trained(&self) -> bool {
            false
        }

        fn predict_correction(&self, _: &[Vec<f64>], _: &[f64], prior_freq: f64) -> f64 {
            prior_freq + 100.0
        }
    }

    /// Shifts every estimate by a fixed offset and counts its calls.
    struct Offset {
        hz: f64,
        calls: Cell<usize>,
    }

    impl Offset {
        fn new(hz: f64) -> Self {
            Self { hz, calls: Cell::new(0) }
        }
    }

    impl CorrectorModel for Offset {
        fn is_trained(&self) -> bool {
            true
        }

        fn predict_correction(&self, _: &[Vec<f64>], _: &[f64], prior_freq: f64) -> f64 {
            self.calls.set(self.calls.get() + 1);
            prior_freq + self.hz
        }
    }

    #[test]
    fn untrained_model_changes_nothing() {
        let spec = spec(8, 80);
        let mut dets = detections(8);
        let before = dets.clone();
        assert_eq!(apply_corrections(&spec, &mut dets, &Untrained), 0);
        assert_eq!(dets, before);
    }

    #[test]
    fn large_shift_corrects_every_detection() {
        let spec = spec(8, 80);
        let mut dets = detections(8);
        let model = Offset::new(10.0);

        assert_eq!(apply_corrections(&spec, &mut dets, &model), 16);
        assert_eq!(model.calls.get(), 16);
        for frame in &dets {
            assert_eq!(frame.harmonics[0].frequency, 310.0);
            assert_eq!(frame.harmonics[1].frequency, 610.0);
            assert!(frame.harmonics.iter().all(|h| h.model_corrected));
        }
    }

    #[test]
    fn small_shift_is_ignored() {
        let spec = spec(4, 80);
        let mut dets = detections(4);
        let before = dets.clone();
        assert_eq!(apply_corrections(&spec, &mut dets, &Offset::new(5.0)), 0);
        assert_eq!(dets, before);
    }

    #[test]
    fn patch_is_clipped_to_spectrogram() {
        let spec = spec(8, 80);

        // Interior: 11 frames would overflow 8, bins 10..=50 fit
        let (patch, freqs) = context_patch(&spec, 4, 30);
        assert_eq!(patch.len(), 8);
        assert_eq!(freqs.len(), 41);
        assert_eq!(freqs[0], 100.0);
        assert_eq!(patch[0][0], 10.0);

        // Corner: frames 0..=5, bins 0..=22
        let (patch, freqs) = context_patch(&spec, 0, 2);
        assert_eq!(patch.len(), 6);
        assert_eq!(freqs.len(), 23);
        assert_eq!(patch[5][22], 5022.0);

        // Top edge: bins 59..=79
        let (_, freqs) = context_patch(&spec, 7, 79);
        assert_eq!(freqs.len(), 21);
        assert_eq!(freqs[20], 790.0);
    }
}

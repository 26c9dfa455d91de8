use anyhow::{bail, Result};

use crate::util;

/// A ready-made spectrogram with its axes, held in dB.
///
/// Frames are stored frame-major: `log_magnitude[t][k]` is the level of
/// frequency bin `k` in time frame `t`. Linear input is converted once at
/// construction time (20 * log10, floored at 1e-10 so silent bins stay
/// finite) because every tracker works in dB.
///
/// The struct is immutable after construction; all analysis stages borrow it.
#[derive(Debug, Clone)]
pub struct Spectrogram {
    log_magnitude: Vec<Vec<f64>>,
    freqs: Vec<f64>,
    times: Vec<f64>,
}

impl Spectrogram {
    /// Build from linear magnitudes. Validates the matrix shape against
    /// both axes and requires strictly increasing axes.
    pub fn from_magnitude(magnitude: Vec<Vec<f64>>, freqs: Vec<f64>, times: Vec<f64>) -> Result<Self> {
        validate_shape(&magnitude, &freqs, &times)?;

        let log_magnitude = magnitude
            .iter()
            .map(|frame| frame.iter().map(|&m| util::amplitude_to_db(m)).collect())
            .collect();

        Ok(Self {
            log_magnitude,
            freqs,
            times,
        })
    }

    /// Build from a matrix that is already in dB.
    pub fn from_log_magnitude(
        log_magnitude: Vec<Vec<f64>>,
        freqs: Vec<f64>,
        times: Vec<f64>,
    ) -> Result<Self> {
        validate_shape(&log_magnitude, &freqs, &times)?;

        Ok(Self {
            log_magnitude,
            freqs,
            times,
        })
    }

    pub fn freqs(&self) -> &[f64] {
        &self.freqs
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn n_frames(&self) -> usize {
        self.times.len()
    }

    pub fn n_bins(&self) -> usize {
        self.freqs.len()
    }

    /// Log-magnitude (dB) spectrum of one frame.
    pub fn log_frame(&self, frame: usize) -> &[f64] {
        &self.log_magnitude[frame]
    }

    /// Spacing between the first two frequency bins, in Hz.
    /// Zero for a single-bin spectrogram.
    pub fn bin_width(&self) -> f64 {
        axis_step(&self.freqs)
    }

    /// Contiguous range of bins whose frequency lies in [lo, hi] (inclusive).
    /// Returns None when no bin falls inside.
    pub fn bins_between(&self, lo: f64, hi: f64) -> Option<std::ops::Range<usize>> {
        let start = self.freqs.partition_point(|&f| f < lo);
        let end = self.freqs.partition_point(|&f| f <= hi);
        (start < end).then_some(start..end)
    }

    /// Index of the bin whose frequency is closest to `freq`.
    pub fn nearest_bin(&self, freq: f64) -> usize {
        let idx = util::search_sorted(&self.freqs, freq);
        if idx == 0 {
            return 0;
        }
        if idx >= self.freqs.len() {
            return self.freqs.len() - 1;
        }
        if (self.freqs[idx] - freq).abs() < (freq - self.freqs[idx - 1]).abs() {
            idx
        } else {
            idx - 1
        }
    }

    /// Time-averaged log-magnitude spectrum, one value per bin.
    pub fn mean_log_spectrum(&self) -> Vec<f64> {
        let n = self.n_frames() as f64;
        let mut mean = vec![0.0; self.n_bins()];
        for frame in &self.log_magnitude {
            for (acc, &v) in mean.iter_mut().zip(frame) {
                *acc += v;
            }
        }
        mean.iter_mut().for_each(|v| *v /= n);
        mean
    }
}

/// Power spectral density of the whole clip: one dB value per frequency.
#[derive(Debug, Clone)]
pub struct PowerSpectralDensity {
    freqs: Vec<f64>,
    db: Vec<f64>,
}

impl PowerSpectralDensity {
    pub fn new(freqs: Vec<f64>, db: Vec<f64>) -> Result<Self> {
        if freqs.len() != db.len() {
            bail!(
                "PSD axes differ in length: {} frequencies vs {} dB values",
                freqs.len(),
                db.len()
            );
        }
        if freqs.len() < 2 {
            bail!("PSD needs at least 2 frequency points, got {}", freqs.len());
        }
        ensure_increasing(&freqs, "PSD frequency")?;
        Ok(Self { freqs, db })
    }

    /// Averaged spectrum of a spectrogram, used when no separate PSD was
    /// computed for the clip.
    pub fn from_spectrogram(spec: &Spectrogram) -> Result<Self> {
        Self::new(spec.freqs().to_vec(), spec.mean_log_spectrum())
    }

    pub fn freqs(&self) -> &[f64] {
        &self.freqs
    }

    pub fn db(&self) -> &[f64] {
        &self.db
    }

    pub fn bin_width(&self) -> f64 {
        axis_step(&self.freqs)
    }

    /// Highest frequency on the axis. For a one-sided spectrum this is the
    /// Nyquist frequency.
    pub fn nyquist(&self) -> f64 {
        self.freqs.last().copied().unwrap_or(0.0)
    }
}

fn axis_step(axis: &[f64]) -> f64 {
    if axis.len() < 2 {
        0.0
    } else {
        axis[1] - axis[0]
    }
}

fn validate_shape(matrix: &[Vec<f64>], freqs: &[f64], times: &[f64]) -> Result<()> {
    if freqs.is_empty() {
        bail!("Spectrogram has an empty frequency axis");
    }
    if times.is_empty() {
        bail!("Spectrogram has an empty time axis");
    }
    if matrix.len() != times.len() {
        bail!(
            "Spectrogram has {} frames but the time axis has {} entries",
            matrix.len(),
            times.len()
        );
    }
    if let Some((t, frame)) = matrix.iter().enumerate().find(|(_, f)| f.len() != freqs.len()) {
        bail!(
            "Frame {t} has {} bins but the frequency axis has {} entries",
            frame.len(),
            freqs.len()
        );
    }
    ensure_increasing(freqs, "frequency")?;
    ensure_increasing(times, "time")?;
    Ok(())
}

fn ensure_increasing(axis: &[f64], name: &str) -> Result<()> {
    if let Some(i) = axis.windows(2).position(|w| !(w[1] > w[0])) {
        bail!("The {name} axis must be strictly increasing (index {})", i + 1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(n: usize, step: f64) -> Vec<f64> {
        (0..n).map(|i| i as f64 * step).collect()
    }

    #[test]
    fn log_magnitude_is_floored() {
        let spec = Spectrogram::from_magnitude(
            vec![vec![0.0, 1.0, 0.1]],
            axis(3, 10.0),
            vec![0.0],
        )
        .unwrap();

        let frame = spec.log_frame(0);
        assert!((frame[0] - (-200.0)).abs() < 1e-9);
        assert!(frame[1].abs() < 1e-12);
        assert!((frame[2] - (-20.0)).abs() < 1e-9);
    }

    #[test]
    fn rejects_mismatched_frame_length() {
        let result = Spectrogram::from_magnitude(
            vec![vec![1.0, 1.0], vec![1.0]],
            axis(2, 10.0),
            axis(2, 0.01),
        );
        assert!(result.is_err());
    }

    #[test]
    fn rejects_non_increasing_times() {
        let result = Spectrogram::from_magnitude(
            vec![vec![1.0], vec![1.0]],
            vec![100.0],
            vec![0.5, 0.5],
        );
        let err = result.unwrap_err().to_string();
        assert!(err.contains("time axis"), "unexpected error: {err}");
    }

    #[test]
    fn bins_between_is_inclusive() {
        let spec =
            Spectrogram::from_magnitude(vec![vec![1.0; 11]], axis(11, 100.0), vec![0.0]).unwrap();

        assert_eq!(spec.bins_between(200.0, 400.0), Some(2..5));
        assert_eq!(spec.bins_between(150.0, 160.0), None);
        assert_eq!(spec.bins_between(-50.0, 0.0), Some(0..1));
    }

    #[test]
    fn nearest_bin_rounds_to_closest() {
        let spec =
            Spectrogram::from_magnitude(vec![vec![1.0; 5]], axis(5, 100.0), vec![0.0]).unwrap();
        assert_eq!(spec.nearest_bin(140.0), 1);
        assert_eq!(spec.nearest_bin(160.0), 2);
        assert_eq!(spec.nearest_bin(-10.0), 0);
        assert_eq!(spec.nearest_bin(1e6), 4);
    }

    #[test]
    fn bin_width_from_first_step() {
        let spec = Spectrogram::from_magnitude(
            vec![vec![1.0; 4]; 3],
            axis(4, 21.5),
            axis(3, 0.005),
        )
        .unwrap();
        assert!((spec.bin_width() - 21.5).abs() < 1e-12);
    }

    #[test]
    fn log_input_is_kept_verbatim() {
        // Levels far below the magnitude floor survive untouched
        let frame = vec![-350.0, -12.25, 0.0];
        let spec = Spectrogram::from_log_magnitude(vec![frame.clone()], axis(3, 10.0), vec![0.0])
            .unwrap();
        assert_eq!(spec.log_frame(0), frame.as_slice());
    }

    #[test]
    fn psd_nyquist_is_last_frequency() {
        let psd = PowerSpectralDensity::new(axis(5, 1000.0), vec![0.0; 5]).unwrap();
        assert_eq!(psd.nyquist(), 4000.0);
    }

    #[test]
    fn psd_rejects_length_mismatch() {
        assert!(PowerSpectralDensity::new(axis(5, 1.0), vec![0.0; 4]).is_err());
    }

    #[test]
    fn psd_from_spectrogram_averages_frames() {
        let spec = Spectrogram::from_log_magnitude(
            vec![vec![-10.0, -20.0], vec![-30.0, -40.0]],
            axis(2, 50.0),
            axis(2, 0.01),
        )
        .unwrap();
        let psd = PowerSpectralDensity::from_spectrogram(&spec).unwrap();
        assert_eq!(psd.db(), &[-20.0, -30.0]);
    }
}

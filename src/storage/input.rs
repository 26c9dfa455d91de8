use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::dsp::spectrum::{PowerSpectralDensity, Spectrogram};

/// On-disk spectral input, as produced by whatever computed the STFT.
///
/// `magnitude` is linear magnitude, one row per frame. The PSD is optional;
/// without it the time-averaged log spectrum stands in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectralInput {
    pub freqs: Vec<f64>,
    pub times: Vec<f64>,
    pub magnitude: Vec<Vec<f64>>,
    #[serde(default)]
    pub psd: Option<PsdInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PsdInput {
    pub freqs: Vec<f64>,
    pub db: Vec<f64>,
}

/// A validated spectrogram together with the PSD used for F0 detection.
#[derive(Debug, Clone)]
pub struct SpectralData {
    pub spectrogram: Spectrogram,
    pub psd: PowerSpectralDensity,
}

impl SpectralInput {
    /// Validate the raw arrays and build the analysis types.
    pub fn into_data(self) -> Result<SpectralData> {
        let spectrogram = Spectrogram::from_magnitude(self.magnitude, self.freqs, self.times)
            .context("Invalid spectrogram")?;

        let psd = match self.psd {
            Some(psd) => PowerSpectralDensity::new(psd.freqs, psd.db).context("Invalid PSD")?,
            None => {
                log::debug!("No PSD in input, using the mean log spectrum");
                PowerSpectralDensity::from_spectrogram(&spectrogram)?
            }
        };

        Ok(SpectralData { spectrogram, psd })
    }
}

/// Load and validate a JSON spectral input file.
pub fn load_input(path: &Path) -> Result<SpectralData> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;

    let input: SpectralInput = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse input file: {}", path.display()))?;

    input
        .into_data()
        .with_context(|| format!("Invalid spectral data in {}", path.display()))
}

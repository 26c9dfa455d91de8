use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::pipeline::{PipelineOptions, TrackingMode};
use crate::dsp::contour::ContourMethod;
use crate::dsp::fundamental::FundamentalConfig;
use crate::dsp::ridge::{RidgeConfig, RidgeMethod};
use crate::dsp::template::TemplateConfig;
use crate::dsp::valley::ValleyConfig;
use crate::paths;

/// Application configuration, loaded from <config_dir>/config.toml.
///
/// serde's `default` attribute means: if a field is missing from the TOML file,
/// use the value from the Default implementation instead of failing to parse.
/// Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub detection: DetectionConfig,
    pub tracking: TrackingConfig,
    pub template: TemplateTrackingConfig,
    pub valleys: ValleySearchConfig,
    pub contour: ContourConfig,
    pub correction: CorrectionConfig,
}

/// Fundamental and harmonic-series detection on the PSD.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub fmin_hz: f64,
    /// Upper search limit. Unset means Nyquist.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fmax_hz: Option<f64>,
    pub prominence_db: f64,
    pub max_harmonics: u32,
    /// Allowed deviation of a harmonic from n * F0, as a fraction of F0
    pub tolerance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub mode: TrackingMode,
    pub method: RidgeMethod,
    /// Window half-width as a fraction of the expected frequency. Unset
    /// means 0.10, or 0.15 for the centroid method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
    pub prominence_db: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateTrackingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fmin_hz: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fmax_hz: Option<f64>,
    pub tolerance: f64,
    pub prominence_factor: f64,
    pub smoothing_window: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValleySearchConfig {
    pub margin: f64,
    pub min_gap_hz: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourConfig {
    pub method: ContourMethod,
    pub smoothness: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Where collected training samples are appended. Unset means
    /// <data_dir>/harmonic_training.json.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub training_file: Option<PathBuf>,
}

// --- Default implementations ---
// These mirror the defaults of the DSP parameter structs.

impl Default for DetectionConfig {
    fn default() -> Self {
        let dsp = FundamentalConfig::default();
        Self {
            fmin_hz: dsp.fmin_hz,
            fmax_hz: dsp.fmax_hz,
            prominence_db: dsp.prominence_db,
            max_harmonics: dsp.max_harmonics,
            tolerance: dsp.tolerance,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        let dsp = RidgeConfig::default();
        Self {
            mode: TrackingMode::default(),
            method: dsp.method,
            tolerance: dsp.tolerance,
            prominence_db: dsp.prominence_db,
        }
    }
}

impl Default for TemplateTrackingConfig {
    fn default() -> Self {
        let dsp = TemplateConfig::default();
        Self {
            fmin_hz: dsp.fmin_hz,
            fmax_hz: dsp.fmax_hz,
            tolerance: dsp.tolerance,
            prominence_factor: dsp.prominence_factor,
            smoothing_window: dsp.smoothing_window,
        }
    }
}

impl Default for ValleySearchConfig {
    fn default() -> Self {
        let dsp = ValleyConfig::default();
        Self {
            margin: dsp.margin,
            min_gap_hz: dsp.min_gap_hz,
        }
    }
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self {
            method: ContourMethod::Raw,
            smoothness: 5.0,
        }
    }
}

impl CorrectionConfig {
    pub fn training_file(&self) -> PathBuf {
        self.training_file.clone().unwrap_or_else(paths::training_file)
    }
}

// --- Bridges to the DSP parameter structs ---

impl From<&DetectionConfig> for FundamentalConfig {
    fn from(cfg: &DetectionConfig) -> Self {
        FundamentalConfig {
            fmin_hz: cfg.fmin_hz,
            fmax_hz: cfg.fmax_hz,
            prominence_db: cfg.prominence_db,
            max_harmonics: cfg.max_harmonics,
            tolerance: cfg.tolerance,
        }
    }
}

impl From<&TrackingConfig> for RidgeConfig {
    fn from(cfg: &TrackingConfig) -> Self {
        RidgeConfig {
            method: cfg.method,
            tolerance: cfg.tolerance,
            prominence_db: cfg.prominence_db,
        }
    }
}

impl From<&TemplateTrackingConfig> for TemplateConfig {
    fn from(cfg: &TemplateTrackingConfig) -> Self {
        TemplateConfig {
            fmin_hz: cfg.fmin_hz,
            fmax_hz: cfg.fmax_hz,
            tolerance: cfg.tolerance,
            prominence_factor: cfg.prominence_factor,
            smoothing_window: cfg.smoothing_window,
        }
    }
}

impl From<&ValleySearchConfig> for ValleyConfig {
    fn from(cfg: &ValleySearchConfig) -> Self {
        ValleyConfig {
            margin: cfg.margin,
            min_gap_hz: cfg.min_gap_hz,
        }
    }
}

impl From<&AppConfig> for PipelineOptions {
    fn from(cfg: &AppConfig) -> Self {
        PipelineOptions {
            fundamental: (&cfg.detection).into(),
            mode: cfg.tracking.mode,
            ridge: (&cfg.tracking).into(),
            template: (&cfg.template).into(),
            valleys: (&cfg.valleys).into(),
            contour_method: cfg.contour.method,
            smoothness: cfg.contour.smoothness,
        }
    }
}

/// Load the application config from $XDG_CONFIG_HOME/harmotrack/config.toml.
/// If the file doesn't exist, returns defaults.
pub fn load_config() -> Result<AppConfig> {
    load_config_from(&paths::config_file())
}

/// Load the config from an explicit path. A missing file means defaults.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        log::debug!("No config at {}, using defaults", path.display());
        return Ok(AppConfig::default());
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.detection.fmin_hz, 100.0);
        assert_eq!(cfg.detection.max_harmonics, 10);
        assert_eq!(cfg.tracking.method, RidgeMethod::Max);
        assert_eq!(cfg.template.smoothing_window, 7);
        assert_eq!(cfg.valleys.margin, 0.25);
        assert_eq!(cfg.contour.method, ContourMethod::Raw);
    }

    #[test]
    fn parse_partial_toml() {
        // If the user only specifies some fields, the rest should use defaults
        let toml_str = r#"
[tracking]
method = "parabolic"
tolerance = 0.12

[contour]
method = "spline"
"#;
        let cfg: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.tracking.method, RidgeMethod::Parabolic);
        assert_eq!(cfg.tracking.tolerance, Some(0.12));
        assert_eq!(cfg.contour.method, ContourMethod::Spline);
        // Unspecified fields should be defaults
        assert_eq!(cfg.contour.smoothness, 5.0);
        assert_eq!(cfg.tracking.mode, TrackingMode::Ridge);
        assert_eq!(cfg.detection.prominence_db, 5.0);
    }

    #[test]
    fn unknown_method_is_rejected() {
        let toml_str = r#"
[tracking]
method = "wavelet"
"#;
        assert!(toml::from_str::<AppConfig>(toml_str).is_err());
    }

    #[test]
    fn pipeline_options_conversion() {
        let mut cfg = AppConfig::default();
        cfg.tracking.method = RidgeMethod::Centroid;
        cfg.tracking.mode = TrackingMode::Template;
        cfg.valleys.min_gap_hz = 80.0;

        let opts: PipelineOptions = (&cfg).into();
        assert_eq!(opts.ridge.method, RidgeMethod::Centroid);
        assert_eq!(opts.ridge.effective_tolerance(), 0.15);
        assert_eq!(opts.mode, TrackingMode::Template);
        assert_eq!(opts.valleys.min_gap_hz, 80.0);
        assert_eq!(opts.template.tolerance, 0.08);
        assert_eq!(opts.smoothness, 5.0);
    }

    #[test]
    fn roundtrip_toml() {
        let mut cfg = AppConfig::default();
        cfg.detection.fmax_hz = Some(8000.0);
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let loaded: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(loaded.detection.fmax_hz, Some(8000.0));
        assert_eq!(loaded.tracking.tolerance, None);
        assert_eq!(loaded.contour.smoothness, cfg.contour.smoothness);
    }

    #[test]
    fn load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[detection]\nfmin_hz = 250.0\n").unwrap();

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.detection.fmin_hz, 250.0);

        let missing = load_config_from(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(missing.detection.fmin_hz, 100.0);
    }

    #[test]
    fn malformed_file_reports_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[detection\n").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn training_file_override() {
        let cfg = CorrectionConfig {
            training_file: Some(PathBuf::from("/tmp/samples.json")),
        };
        assert_eq!(cfg.training_file(), PathBuf::from("/tmp/samples.json"));
        assert!(CorrectionConfig::default()
            .training_file()
            .ends_with("harmonic_training.json"));
    }
}

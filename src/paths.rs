use std::path::PathBuf;
use std::sync::OnceLock;

/// XDG-compliant directory layout for harmotrack.
///
/// On Linux this follows the XDG Base Directory Specification:
///   Config:  $XDG_CONFIG_HOME/harmotrack  (~/.config/harmotrack)
///   Data:    $XDG_DATA_HOME/harmotrack    (~/.local/share/harmotrack)
///
/// On macOS both live under ~/Library/Application Support/harmotrack.
///
/// The resolved base paths are cached in OnceLock cells.

static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();
static CONFIG_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Root data directory: $XDG_DATA_HOME/harmotrack
pub fn data_dir() -> &'static PathBuf {
    DATA_DIR.get_or_init(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("harmotrack")
    })
}

/// Root config directory: $XDG_CONFIG_HOME/harmotrack
pub fn config_dir() -> &'static PathBuf {
    CONFIG_DIR.get_or_init(|| {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("harmotrack")
    })
}

/// Config file path: <config_dir>/config.toml
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default training sample file: <data_dir>/harmonic_training.json
pub fn training_file() -> PathBuf {
    data_dir().join("harmonic_training.json")
}

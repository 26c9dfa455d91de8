//! Harmonic analysis of tonal animal vocalisations.
//!
//! Works on a precomputed magnitude spectrogram and power spectral density:
//! finds the fundamental and its harmonic series, follows each harmonic
//! through time, locates the spectral valleys between neighbouring
//! harmonics and smooths the resulting frequency contours.

pub mod analysis;
pub mod config;
pub mod dsp;
pub mod paths;
pub mod storage;
pub mod util;

//! EMD Spectral and Cycle Analysis Library
//!
//! This crate turns the intrinsic mode functions produced by an Empirical Mode
//! Decomposition into phase, frequency and amplitude descriptions, frequency
//! spectra and individual oscillatory cycles.
//!
//! # Features
//!
//! - **Instantaneous statistics**: IP / IF / IA via Hilbert, normalised-Hilbert
//!   or direct-quadrature transforms
//! - **Histogram binning**: linear or log-spaced frequency bins, from a range or
//!   from the data
//! - **Spectra**: Hilbert-Huang spectrum (1D/2D/3D) and second-layer Holospectrum
//! - **Cycles**: phase-reset cycle detection with quality checks, control points
//!   and per-cycle statistics
//! - **Phase binning**: phase-resolved waveform averages and cycle alignment
//!
//! # Example
//!
//! ```rust
//! use emd_signal::prelude::*;
//! use ndarray::Array2;
//! use std::f64::consts::PI;
//!
//! let sample_rate = 500.0;
//! let imf = Array2::from_shape_fn((2000, 1), |(t, _)| {
//!     (2.0 * PI * 12.0 * t as f64 / sample_rate).sin()
//! });
//!
//! let stats = frequency_transform(&imf, sample_rate, TransformMethod::NormalizedHilbert)?;
//! let bins = define_hist_bins(1.0, 50.0, 49, BinSpacing::Linear)?;
//! let hht = hilberthuang(&stats.frequency, &stats.amplitude, &bins, &HilbertHuangOptions::default())?;
//! let cycles = get_cycle_vector(&stats.phase, Some(imf.view()), &CycleConfig::default())?;
//!
//! assert_eq!(hht.frequencies().len(), 49);
//! assert!(count_cycles(&cycles)[0] > 40);
//! # Ok::<(), emd_signal::EmdError>(())
//! ```

pub mod analytic;
pub mod config;
pub mod cycles;
pub mod error;
pub mod frequency;
pub mod histogram;
pub mod logging;
pub mod phase_binning;
pub mod spectrum;

// Re-export main types for convenience
pub use analytic::{amplitude_normalise, analytic_signal, AnalyticTransform};
pub use config::{EmdConfig, EmdConfigBuilder, TransformConfig};
pub use cycles::{
    count_cycles, cycle_bounds, get_control_points, get_cycle_stat, get_cycle_vector,
    ControlPoints, CycleConfig, CycleConfigBuilder, CycleSpan, CycleStat,
};
pub use error::{EmdError, Result};
pub use frequency::{
    freq_from_phase, frequency_transform, frequency_transform_layered, phase_from_freq,
    wrap_phase, InstantaneousStats, LayeredInstantaneousStats, PhaseConvention, TransformMethod,
};
pub use histogram::{
    define_hist_bins, define_hist_bins_from_data, BinSpacing, HistBins, HistogramSpec,
};
pub use logging::LogConfig;
pub use phase_binning::{bin_by_phase, phase_align, PhaseBinConfig, PhaseBinned};
pub use spectrum::{
    hilberthuang, holospectrum, marginal_spectrum, HilbertHuangOptions, HilbertHuangSpectrum,
    HoloData, Holospectrum, HolospectrumOptions, SpectrumData, SpectrumMode,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cycles::{count_cycles, get_control_points, get_cycle_vector, CycleConfig};
    pub use crate::frequency::{frequency_transform, PhaseConvention, TransformMethod};
    pub use crate::histogram::{define_hist_bins, BinSpacing, HistBins};
    pub use crate::phase_binning::bin_by_phase;
    pub use crate::spectrum::{
        hilberthuang, holospectrum, HilbertHuangOptions, HolospectrumOptions, SpectrumMode,
    };
    pub use crate::{EmdError, Result};
}

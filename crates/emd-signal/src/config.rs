//! Analysis configuration.
//!
//! [`EmdConfig`] gathers every tunable of a spectral and cycle analysis run
//! (transform method, histogram axes, cycle thresholds and phase bins) in one
//! serialisable struct so a run can be stored to and restored from JSON.
//!
//! # Example
//!
//! ```rust
//! use emd_signal::config::EmdConfig;
//! use emd_signal::frequency::TransformMethod;
//!
//! let cfg = EmdConfig::builder()
//!     .sample_rate(512.0)
//!     .method(TransformMethod::Hilbert)
//!     .build();
//! cfg.validate().unwrap();
//! assert_eq!(cfg.phase_bins.nbins, 24);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EmdError, Result};
use crate::frequency::{PhaseConvention, TransformMethod};
use crate::histogram::{BinSpacing, HistogramSpec};

pub use crate::cycles::{CycleConfig, CycleConfigBuilder};
pub use crate::phase_binning::PhaseBinConfig;

// ---------------------------------------------------------------------------
// TransformConfig
// ---------------------------------------------------------------------------

/// How instantaneous phase, frequency and amplitude are computed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Frequency-transform method.
    #[serde(default)]
    pub method: TransformMethod,
    /// Sampling frequency of the input components.
    pub sample_rate: f64,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            method: TransformMethod::default(),
            sample_rate: 1000.0,
        }
    }
}

impl TransformConfig {
    /// # Errors
    ///
    /// [`EmdError::Configuration`] if `sample_rate` is not positive and finite.
    pub fn validate(&self) -> Result<()> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(EmdError::configuration(format!(
                "sample_rate must be positive and finite, got {}",
                self.sample_rate
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// EmdConfig
// ---------------------------------------------------------------------------

/// Complete configuration of a spectral and cycle analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmdConfig {
    /// IP / IF / IA computation.
    pub transform: TransformConfig,
    /// Cycle detection thresholds.
    #[serde(default)]
    pub cycles: CycleConfig,
    /// Phase-resolved averaging.
    #[serde(default)]
    pub phase_bins: PhaseBinConfig,
    /// Frequency axis of the Hilbert-Huang spectrum and carrier axis of the
    /// Holospectrum.
    pub carrier_hist: HistogramSpec,
    /// Amplitude-modulation axis of the Holospectrum.
    pub am_hist: HistogramSpec,
}

impl Default for EmdConfig {
    fn default() -> Self {
        Self {
            transform: TransformConfig::default(),
            cycles: CycleConfig::default(),
            phase_bins: PhaseBinConfig::default(),
            carrier_hist: HistogramSpec::new(1.0, 100.0, 64, BinSpacing::Log),
            am_hist: HistogramSpec::new(0.1, 20.0, 32, BinSpacing::Log),
        }
    }
}

impl EmdConfig {
    /// Create a new configuration builder
    pub fn builder() -> EmdConfigBuilder {
        EmdConfigBuilder::default()
    }

    /// Parse and validate a JSON document.
    ///
    /// # Errors
    ///
    /// [`EmdError::Json`] for malformed JSON, otherwise whatever
    /// [`EmdConfig::validate`] reports.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: EmdConfig = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load and validate a configuration from the JSON file at `path`.
    ///
    /// # Errors
    ///
    /// [`EmdError::Io`] if the file cannot be read, plus everything
    /// [`EmdConfig::from_json_str`] can return.
    pub fn from_json(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let cfg = Self::from_json_str(&contents)?;
        debug!(path = %path.display(), "loaded analysis configuration");
        Ok(cfg)
    }

    /// Write this configuration as pretty-printed JSON to `path`, creating
    /// parent directories if necessary.
    ///
    /// # Errors
    ///
    /// [`EmdError::Io`] or [`EmdError::Json`].
    pub fn to_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Validate every section, returning the first problem found.
    ///
    /// # Validated invariants
    ///
    /// - `sample_rate` is positive and finite.
    /// - `phase_step` is positive and finite.
    /// - at least one phase bin.
    /// - both histogram axes describe valid bins.
    pub fn validate(&self) -> Result<()> {
        self.transform.validate()?;
        self.cycles.validate()?;
        self.phase_bins.validate()?;
        self.carrier_hist
            .bins()
            .map_err(|e| EmdError::configuration(format!("carrier_hist: {e}")))?;
        self.am_hist
            .bins()
            .map_err(|e| EmdError::configuration(format!("am_hist: {e}")))?;
        Ok(())
    }
}

/// Builder for [`EmdConfig`]
#[derive(Debug, Default)]
pub struct EmdConfigBuilder {
    config: EmdConfig,
}

impl EmdConfigBuilder {
    /// Set the transform method
    pub fn method(mut self, method: TransformMethod) -> Self {
        self.config.transform.method = method;
        self
    }

    /// Set the sampling frequency
    pub fn sample_rate(mut self, sample_rate: f64) -> Self {
        self.config.transform.sample_rate = sample_rate;
        self
    }

    /// Set cycle detection settings
    pub fn cycles(mut self, cycles: CycleConfig) -> Self {
        self.config.cycles = cycles;
        self
    }

    /// Set the number of phase bins
    pub fn phase_bins(mut self, nbins: usize) -> Self {
        self.config.phase_bins.nbins = nbins;
        self
    }

    /// Set the phase convention used for binning
    pub fn phase_convention(mut self, convention: PhaseConvention) -> Self {
        self.config.phase_bins.convention = convention;
        self
    }

    /// Set the carrier / HHT frequency axis
    pub fn carrier_hist(mut self, spec: HistogramSpec) -> Self {
        self.config.carrier_hist = spec;
        self
    }

    /// Set the amplitude-modulation frequency axis
    pub fn am_hist(mut self, spec: HistogramSpec) -> Self {
        self.config.am_hist = spec;
        self
    }

    /// Build the configuration
    pub fn build(self) -> EmdConfig {
        self.config
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

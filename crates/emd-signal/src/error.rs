//! Error types for the EMD signal toolkit.
//!
//! Every fallible operation in the crate returns [`Result<T>`], whose error
//! side is the flat [`EmdError`] taxonomy below.
//!
//! ## Hierarchy
//!
//! ```text
//! EmdError
//! ├── Shape              (co-indexed arrays disagree in dimensionality or length)
//! ├── Domain             (numeric range outside what an operation accepts)
//! ├── UnsupportedMethod  (unknown frequency-transform tag)
//! ├── Configuration      (invalid thresholds / counts)
//! ├── Io                 (config file could not be read or written)
//! └── Json               (config file could not be (de)serialised)
//! ```
//!
//! Rejected cycles and missing control points are data, not errors: they are
//! reported through zeroed cycle labels and `None` control points.

use thiserror::Error;

/// Convenient `Result` alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EmdError>;

/// Unified error type for spectral and cycle analysis.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EmdError {
    /// Array dimensionality or length mismatch between co-indexed inputs.
    #[error("Shape mismatch in {context}: expected {expected}, got {actual:?}")]
    Shape {
        /// The operation or argument that failed the check.
        context: &'static str,
        /// Human-readable description of the expected shape.
        expected: String,
        /// The shape that was actually supplied.
        actual: Vec<usize>,
    },

    /// Numeric value outside the range an operation accepts.
    #[error("Domain error: {0}")]
    Domain(String),

    /// Unrecognised frequency-transform method tag.
    #[error("Unsupported frequency transform method '{0}' (expected one of: hilbert, nht, dq)")]
    UnsupportedMethod(String),

    /// Invalid threshold, count or other tunable.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Configuration file I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration (de)serialisation failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EmdError {
    /// Creates a shape error for `context`.
    #[must_use]
    pub fn shape(context: &'static str, expected: impl Into<String>, actual: &[usize]) -> Self {
        Self::Shape {
            context,
            expected: expected.into(),
            actual: actual.to_vec(),
        }
    }

    /// Creates a domain error.
    #[must_use]
    pub fn domain(message: impl Into<String>) -> Self {
        Self::Domain(message.into())
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Returns `true` for errors caused by the caller's array shapes.
    pub fn is_shape_error(&self) -> bool {
        matches!(self, Self::Shape { .. })
    }
}

/// Rejects non-finite or non-positive sample rates.
pub(crate) fn check_sample_rate(sample_rate: f64) -> Result<()> {
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return Err(EmdError::domain(format!(
            "sample_rate must be positive and finite, got {sample_rate}"
        )));
    }
    Ok(())
}

//! Histogram Bin Definitions
//!
//! Bin edges and centres for one spectral axis, either from an explicit
//! range or inferred from a data sample.
//!
//! Every interval is half-open, `[edges[i], edges[i + 1])`, except the last
//! which also includes its upper edge. Centres are arithmetic means of
//! adjacent edges for linear spacing and geometric means for log spacing.

use ndarray::{Array1, ArrayBase, Data, Dimension};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EmdError, Result};

/// Default relative widening applied by [`define_hist_bins_from_data`].
pub const DEFAULT_DATA_TOLERANCE: f64 = 1e-3;

/// Spacing of histogram edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinSpacing {
    /// Evenly spaced edges.
    #[default]
    Linear,
    /// Edges evenly spaced in `ln(x)`; requires a positive lower bound.
    Log,
}

/// Bin edges and centres for one axis.
#[derive(Debug, Clone, PartialEq)]
pub struct HistBins {
    /// Strictly increasing boundaries, `nbins + 1` long.
    pub edges: Array1<f64>,
    /// One centre per bin.
    pub centres: Array1<f64>,
    /// Spacing the edges were built with.
    pub spacing: BinSpacing,
}

impl HistBins {
    /// Build bins from explicit edges.
    ///
    /// # Errors
    ///
    /// [`EmdError::Configuration`] if fewer than two edges are given and
    /// [`EmdError::Domain`] if they are not finite and strictly increasing,
    /// or if log spacing is requested with a non-positive first edge.
    pub fn from_edges(edges: Array1<f64>, spacing: BinSpacing) -> Result<Self> {
        // Reversed or strided input is copied into standard layout for `locate`
        let edges = edges.as_standard_layout().into_owned();
        if edges.len() < 2 {
            return Err(EmdError::configuration(format!(
                "at least 2 bin edges are required, got {}",
                edges.len()
            )));
        }
        if edges.iter().any(|e| !e.is_finite()) {
            return Err(EmdError::domain("bin edges must be finite"));
        }
        if edges.windows(2).into_iter().any(|w| w[1] <= w[0]) {
            return Err(EmdError::domain("bin edges must be strictly increasing"));
        }
        if spacing == BinSpacing::Log && edges[0] <= 0.0 {
            return Err(EmdError::domain(format!(
                "log-spaced bins need a positive lower edge, got {}",
                edges[0]
            )));
        }

        let centres = edges
            .windows(2)
            .into_iter()
            .map(|w| match spacing {
                BinSpacing::Linear => (w[0] + w[1]) / 2.0,
                BinSpacing::Log => (w[0] * w[1]).sqrt(),
            })
            .collect::<Array1<f64>>();

        Ok(Self {
            edges,
            centres,
            spacing,
        })
    }

    /// Number of bins.
    pub fn nbins(&self) -> usize {
        self.centres.len()
    }

    /// Lowest covered value.
    pub fn low(&self) -> f64 {
        self.edges[0]
    }

    /// Highest covered value (inclusive).
    pub fn high(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    /// Index of the bin containing `value`, or `None` if it lies outside
    /// `[low, high]` or is NaN.
    pub fn locate(&self, value: f64) -> Option<usize> {
        match self.edges.as_slice() {
            Some(edges) => locate_in_edges(edges, value),
            None => locate_in_edges(&self.edges.to_vec(), value),
        }
    }
}

/// Binary search of `value` in strictly increasing `edges`.
///
/// Intervals are `[e_i, e_{i+1})` except the last, which is closed.
pub(crate) fn locate_in_edges(edges: &[f64], value: f64) -> Option<usize> {
    let n = edges.len();
    if n < 2 || value.is_nan() {
        return None;
    }
    let (low, high) = (edges[0], edges[n - 1]);
    if value < low || value > high {
        return None;
    }
    if value == high {
        return Some(n - 2);
    }
    // Number of edges <= value, minus one, is the bin index
    Some(edges.partition_point(|&e| e <= value) - 1)
}

/// Range, count and spacing of one histogram axis.
///
/// This is the serialisable form used in configuration files; convert it
/// with [`HistogramSpec::bins`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramSpec {
    /// Lower edge.
    pub low: f64,
    /// Upper edge.
    pub high: f64,
    /// Number of bins.
    pub nbins: usize,
    /// Edge spacing.
    #[serde(default)]
    pub spacing: BinSpacing,
}

impl HistogramSpec {
    /// Create a new axis description.
    pub fn new(low: f64, high: f64, nbins: usize, spacing: BinSpacing) -> Self {
        Self {
            low,
            high,
            nbins,
            spacing,
        }
    }

    /// Build the bins this axis describes.
    pub fn bins(&self) -> Result<HistBins> {
        define_hist_bins(self.low, self.high, self.nbins, self.spacing)
    }
}

/// Define `nbins` bins covering `[low, high]`.
///
/// # Errors
///
/// - [`EmdError::Configuration`] if `nbins == 0`.
/// - [`EmdError::Domain`] if the bounds are not finite, `high <= low`, or
///   log spacing is requested with `low <= 0`.
///
/// # Example
///
/// ```rust
/// use emd_signal::histogram::{define_hist_bins, BinSpacing};
///
/// let bins = define_hist_bins(0.0, 1.0, 5, BinSpacing::Linear).unwrap();
/// assert_eq!(bins.edges.len(), 6);
/// assert!((bins.centres[0] - 0.1).abs() < 1e-12);
/// ```
pub fn define_hist_bins(low: f64, high: f64, nbins: usize, spacing: BinSpacing) -> Result<HistBins> {
    if nbins == 0 {
        return Err(EmdError::configuration("nbins must be > 0"));
    }
    if !low.is_finite() || !high.is_finite() {
        return Err(EmdError::domain(format!(
            "histogram bounds must be finite, got [{low}, {high}]"
        )));
    }
    if high <= low {
        return Err(EmdError::domain(format!(
            "histogram upper bound {high} must exceed lower bound {low}"
        )));
    }

    let edges = match spacing {
        BinSpacing::Linear => Array1::linspace(low, high, nbins + 1),
        BinSpacing::Log => {
            if low <= 0.0 {
                return Err(EmdError::domain(format!(
                    "log-spaced bins need a positive lower bound, got {low}"
                )));
            }
            Array1::linspace(low.ln(), high.ln(), nbins + 1).mapv(f64::exp)
        }
    };

    debug!(low, high, nbins, ?spacing, "defined histogram bins");
    HistBins::from_edges(edges, spacing)
}

/// Define bins spanning the finite values of `data`.
///
/// The span is `[min - |min|·tol, max + |max|·tol]`, so the widening scales
/// with the data and, for `tol > 0` and non-zero extremes, the extreme values
/// fall strictly inside the outer bins. Positive data stays positive, which
/// keeps log spacing valid. With `nbins = None` the
/// square-root rule `floor(sqrt(n))` picks the bin count.
///
/// # Errors
///
/// - [`EmdError::Domain`] if `data` has no finite values, the widened span
///   is empty, or log spacing meets a non-positive lower bound.
/// - [`EmdError::Configuration`] for a negative or non-finite `tol`, or a
///   resolved bin count of zero.
pub fn define_hist_bins_from_data<S, D>(
    data: &ArrayBase<S, D>,
    nbins: Option<usize>,
    tol: f64,
    spacing: BinSpacing,
) -> Result<HistBins>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    if !tol.is_finite() || tol < 0.0 {
        return Err(EmdError::configuration(format!(
            "tol must be finite and non-negative, got {tol}"
        )));
    }

    let (min, max, count) = data
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY, 0usize), |(lo, hi, n), &v| {
            (lo.min(v), hi.max(v), n + 1)
        });
    if count == 0 {
        return Err(EmdError::domain("cannot infer histogram bins from data without finite values"));
    }

    let nbins = nbins.unwrap_or_else(|| (count as f64).sqrt().floor() as usize);
    define_hist_bins(min - min.abs() * tol, max + max.abs() * tol, nbins, spacing)
}

//! Phase-resolved averaging.
//!
//! [`bin_by_phase`] pools samples of one or more channels by the value of a
//! reference phase, giving the mean waveform shape over a cycle.
//! [`phase_align`] instead warps each detected cycle onto a common phase
//! grid so cycles can be compared one by one.

use std::f64::consts::TAU;

use ndarray::{s, Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::analytic::unwrap_1d;
use crate::cycles::cycle_bounds;
use crate::error::{EmdError, Result};
use crate::frequency::PhaseConvention;

/// Default number of phase bins.
pub const DEFAULT_PHASE_BINS: usize = 24;

/// Phase binning settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseBinConfig {
    /// Number of equal-width bins covering one cycle.
    pub nbins: usize,
    /// Range of the reference phase.
    #[serde(default)]
    pub convention: PhaseConvention,
}

impl Default for PhaseBinConfig {
    fn default() -> Self {
        Self {
            nbins: DEFAULT_PHASE_BINS,
            convention: PhaseConvention::default(),
        }
    }
}

impl PhaseBinConfig {
    /// # Errors
    ///
    /// [`EmdError::Configuration`] if `nbins` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.nbins == 0 {
            return Err(EmdError::configuration("phase bin count must be at least 1"));
        }
        Ok(())
    }
}

/// Per-bin statistics from [`bin_by_phase`].
///
/// `mean` and `variance` are `(bin × channel)`; bins that received no
/// samples hold NaN.
#[derive(Debug, Clone)]
pub struct PhaseBinned {
    pub mean: Array2<f64>,
    /// Population variance.
    pub variance: Array2<f64>,
    /// Samples per bin.
    pub counts: Array1<usize>,
    /// `nbins + 1` phase edges.
    pub edges: Array1<f64>,
    pub centres: Array1<f64>,
}

/// Average `signal` within equal-width bins of `reference_phase`.
///
/// `reference_phase` is 1-D (time), `signal` is `(time × channels)`. Bins
/// span the range of `convention`; phase values outside that range or NaN
/// are ignored.
///
/// # Errors
///
/// - [`EmdError::Shape`] if the time axes differ.
/// - [`EmdError::Configuration`] if `nbins` is zero.
pub fn bin_by_phase<S1, S2>(
    reference_phase: &ArrayBase<S1, Ix1>,
    signal: &ArrayBase<S2, Ix2>,
    nbins: usize,
    convention: PhaseConvention,
) -> Result<PhaseBinned>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
{
    PhaseBinConfig { nbins, convention }.validate()?;
    let (n_time, n_chan) = signal.dim();
    if reference_phase.len() != n_time {
        return Err(EmdError::shape(
            "bin_by_phase reference_phase",
            format!("length {n_time} to match signal"),
            reference_phase.shape(),
        ));
    }

    let (low, high) = convention.range();
    let width = (high - low) / nbins as f64;
    let edges = Array1::linspace(low, high, nbins + 1);
    let centres = Array1::from_shape_fn(nbins, |i| low + (i as f64 + 0.5) * width);
    debug!(n_time, n_chan, nbins, ?convention, "binning by phase");

    let mut sum = Array2::<f64>::zeros((nbins, n_chan));
    let mut sum_sq = Array2::<f64>::zeros((nbins, n_chan));
    let mut counts = Array1::<usize>::zeros(nbins);
    let mut skipped = 0usize;

    for (t, &p) in reference_phase.iter().enumerate() {
        if !(p >= low && p < high) {
            skipped += 1;
            continue;
        }
        // rounding can put p just below high into bin nbins
        let bin = (((p - low) / width) as usize).min(nbins - 1);
        counts[bin] += 1;
        for (ch, &x) in signal.row(t).iter().enumerate() {
            sum[[bin, ch]] += x;
            sum_sq[[bin, ch]] += x * x;
        }
    }
    if skipped > 0 {
        trace!(skipped, "phase samples outside the convention range ignored");
    }

    let mut mean = Array2::from_elem((nbins, n_chan), f64::NAN);
    let mut variance = Array2::from_elem((nbins, n_chan), f64::NAN);
    for (bin, &count) in counts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let n = count as f64;
        for ch in 0..n_chan {
            let m = sum[[bin, ch]] / n;
            mean[[bin, ch]] = m;
            variance[[bin, ch]] = (sum_sq[[bin, ch]] / n - m * m).max(0.0);
        }
    }

    Ok(PhaseBinned {
        mean,
        variance,
        counts,
        edges,
        centres,
    })
}

/// Piecewise-linear interpolation with end values held outside `xp`.
fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let n = xp.len();
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[n - 1] {
        return fp[n - 1];
    }
    let hi = xp.partition_point(|&v| v <= x).min(n - 1);
    let lo = hi - 1;
    let span = xp[hi] - xp[lo];
    if span <= 0.0 {
        return fp[lo];
    }
    fp[lo] + (fp[hi] - fp[lo]) * (x - xp[lo]) / span
}

/// Resample every cycle of `signal` onto `npoints` evenly spaced phases.
///
/// Within each cycle the phase is unwrapped, then `signal` is linearly
/// interpolated at `linspace(0, 2π, npoints)`. Grid points outside the
/// cycle's phase range take the nearest end value.
/// Column `i` of the `(npoints × ncycles)` result belongs to cycle label
/// `i + 1`; labels that never occur stay NaN.
///
/// # Errors
///
/// - [`EmdError::Shape`] if the three inputs differ in length.
/// - [`EmdError::Configuration`] if `npoints < 2`.
pub fn phase_align<S1, S2, S3>(
    phase: &ArrayBase<S1, Ix1>,
    signal: &ArrayBase<S2, Ix1>,
    cycles: &ArrayBase<S3, Ix1>,
    npoints: usize,
) -> Result<Array2<f64>>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    S3: Data<Elem = usize>,
{
    if npoints < 2 {
        return Err(EmdError::configuration(format!(
            "phase_align needs at least 2 grid points, got {npoints}"
        )));
    }
    let n = phase.len();
    if signal.len() != n {
        return Err(EmdError::shape(
            "phase_align signal",
            format!("length {n}"),
            signal.shape(),
        ));
    }
    if cycles.len() != n {
        return Err(EmdError::shape(
            "phase_align cycles",
            format!("length {n}"),
            cycles.shape(),
        ));
    }

    let ncycles = cycles.iter().copied().max().unwrap_or(0);
    let grid = Array1::linspace(0.0, TAU, npoints);
    let mut out = Array2::from_elem((npoints, ncycles), f64::NAN);
    debug!(n, ncycles, npoints, "aligning cycles to phase grid");

    for span in cycle_bounds(cycles) {
        let mut cycle_phase: Vec<f64> = phase.slice(s![span.start..span.end]).to_vec();
        unwrap_1d(&mut cycle_phase);
        let values = signal.slice(s![span.start..span.end]).to_vec();

        let mut column = out.index_axis_mut(Axis(1), span.label - 1);
        for (o, &g) in column.iter_mut().zip(grid.iter()) {
            *o = interp(g, &cycle_phase, &values);
        }
    }
    Ok(out)
}

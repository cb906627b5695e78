//! Cycle Segmentation
//!
//! Splits each component's wrapped instantaneous phase into individual
//! oscillatory cycles and optionally rejects cycles that are not clean,
//! complete oscillations.
//!
//! A cycle boundary is a phase reset: a step of more than `phase_step`
//! radians downwards between consecutive samples. With the `[0, 2π)`
//! convention that reset sits at the ascending zero-crossing, so every
//! complete cycle runs ascending zero → peak → descending zero → trough.
//!
//! Labels are integers per sample: `0` for "no usable cycle", `1..` for
//! successive cycles. Samples before the first boundary are always `0`;
//! the segment from the last boundary to the end of the trace is a cycle
//! like any other and goes through the same quality checks.

use std::f64::consts::PI;

use ndarray::{s, Array1, Array2, ArrayBase, ArrayView1, ArrayView2, Axis, Data, Ix1, Ix2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{EmdError, Result};

/// Default phase-reset threshold.
pub const DEFAULT_PHASE_STEP: f64 = 1.5 * PI;

/// Cycle detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleConfig {
    /// Downward phase step (radians) that marks a cycle boundary.
    pub phase_step: f64,
    /// Zero out cycles that fail the quality checks.
    pub return_good: bool,
    /// Per-sample usability mask (`true` = usable). Cycles touching a
    /// `false` sample are rejected.
    #[serde(skip)]
    pub mask: Option<Array1<bool>>,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            phase_step: DEFAULT_PHASE_STEP,
            return_good: true,
            mask: None,
        }
    }
}

impl CycleConfig {
    /// Create a new configuration builder
    pub fn builder() -> CycleConfigBuilder {
        CycleConfigBuilder::default()
    }

    /// Check the thresholds.
    ///
    /// # Errors
    ///
    /// [`EmdError::Configuration`] if `phase_step` is not positive and finite.
    pub fn validate(&self) -> Result<()> {
        if !self.phase_step.is_finite() || self.phase_step <= 0.0 {
            return Err(EmdError::configuration(format!(
                "phase_step must be positive and finite, got {}",
                self.phase_step
            )));
        }
        Ok(())
    }
}

/// Builder for [`CycleConfig`]
#[derive(Debug, Clone, Default)]
pub struct CycleConfigBuilder {
    config: CycleConfig,
}

impl CycleConfigBuilder {
    /// Set the boundary threshold
    pub fn phase_step(mut self, phase_step: f64) -> Self {
        self.config.phase_step = phase_step;
        self
    }

    /// Enable/disable quality checks
    pub fn return_good(mut self, return_good: bool) -> Self {
        self.config.return_good = return_good;
        self
    }

    /// Set the usability mask
    pub fn mask(mut self, mask: Array1<bool>) -> Self {
        self.config.mask = Some(mask);
        self
    }

    /// Build the configuration
    pub fn build(self) -> CycleConfig {
        self.config
    }
}

/// Positions of the five control points of one cycle, as sample offsets
/// from the cycle's first sample.
///
/// The ascending zero-crossings bracket the cycle and are always known;
/// the interior points are `None` when not uniquely identifiable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlPoints {
    /// Cycle label.
    pub label: usize,
    /// Ascending zero-crossing at the start (always `0`).
    pub asc_start: usize,
    /// Unique strict local maximum.
    pub peak: Option<usize>,
    /// Unique strict positive-to-negative sign change.
    pub desc: Option<usize>,
    /// Unique strict local minimum.
    pub trough: Option<usize>,
    /// Ascending zero-crossing at the end (last sample of the cycle).
    pub asc_end: usize,
}

impl ControlPoints {
    /// True when every interior control point was found.
    pub fn is_complete(&self) -> bool {
        self.peak.is_some() && self.desc.is_some() && self.trough.is_some()
    }

    /// Row form `[asc_start, peak, desc, trough, asc_end]` with NaN for
    /// missing points.
    pub fn to_row(&self) -> [f64; 5] {
        let f = |p: Option<usize>| p.map_or(f64::NAN, |v| v as f64);
        [
            self.asc_start as f64,
            f(self.peak),
            f(self.desc),
            f(self.trough),
            self.asc_end as f64,
        ]
    }
}

/// A contiguous run of samples sharing one non-zero cycle label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSpan {
    pub label: usize,
    /// First sample (inclusive).
    pub start: usize,
    /// One past the last sample.
    pub end: usize,
}

impl CycleSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Per-cycle summary statistic for [`get_cycle_stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleStat {
    Mean,
    Max,
    Min,
    Sum,
    /// Number of samples in the cycle.
    Len,
}

impl CycleStat {
    fn apply(&self, values: ArrayView1<f64>) -> f64 {
        match self {
            Self::Mean => values.mean().unwrap_or(f64::NAN),
            Self::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Self::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Sum => values.sum(),
            Self::Len => values.len() as f64,
        }
    }
}

/// Contiguous runs of non-zero labels, in time order.
pub fn cycle_bounds<S>(cycles: &ArrayBase<S, Ix1>) -> Vec<CycleSpan>
where
    S: Data<Elem = usize>,
{
    let mut spans = Vec::new();
    let mut current: Option<CycleSpan> = None;
    for (t, &label) in cycles.iter().enumerate() {
        match current {
            Some(ref mut span) if span.label == label => span.end = t + 1,
            _ => {
                if let Some(span) = current.take() {
                    spans.push(span);
                }
                if label != 0 {
                    current = Some(CycleSpan {
                        label,
                        start: t,
                        end: t + 1,
                    });
                }
            }
        }
    }
    spans.extend(current);
    spans
}

/// Number of cycles per component (the highest label in each column).
pub fn count_cycles<S>(cycles: &ArrayBase<S, Ix2>) -> Vec<usize>
where
    S: Data<Elem = usize>,
{
    cycles
        .axis_iter(Axis(1))
        .map(|col| col.iter().copied().max().unwrap_or(0))
        .collect()
}

/// Summarise `values` within each cycle.
///
/// Returns one value per label `1..=max`; entry `i` belongs to label
/// `i + 1`. Labels that never occur are NaN.
///
/// # Errors
///
/// [`EmdError::Shape`] if the lengths differ.
pub fn get_cycle_stat<S1, S2>(
    cycles: &ArrayBase<S1, Ix1>,
    values: &ArrayBase<S2, Ix1>,
    stat: CycleStat,
) -> Result<Array1<f64>>
where
    S1: Data<Elem = usize>,
    S2: Data<Elem = f64>,
{
    if cycles.len() != values.len() {
        return Err(EmdError::shape(
            "get_cycle_stat values",
            format!("length {}", cycles.len()),
            values.shape(),
        ));
    }
    let ncycles = cycles.iter().copied().max().unwrap_or(0);
    let mut out = Array1::from_elem(ncycles, f64::NAN);
    for span in cycle_bounds(cycles) {
        out[span.label - 1] = stat.apply(values.slice(s![span.start..span.end]));
    }
    Ok(out)
}

/// The single index satisfying `pred`, if exactly one does.
fn unique_index(range: std::ops::Range<usize>, pred: impl Fn(usize) -> bool) -> Option<usize> {
    let mut found = None;
    for i in range {
        if pred(i) {
            if found.is_some() {
                return None;
            }
            found = Some(i);
        }
    }
    found
}

fn control_points_for(label: usize, x: ArrayView1<f64>) -> ControlPoints {
    let n = x.len();
    let interior = 1..n.saturating_sub(1);
    let peak = unique_index(interior.clone(), |i| x[i - 1] < x[i] && x[i] > x[i + 1]);
    let trough = unique_index(interior, |i| x[i - 1] > x[i] && x[i] < x[i + 1]);
    let desc = unique_index(0..n.saturating_sub(1), |i| x[i] > 0.0 && x[i + 1] < 0.0);

    let present: Vec<usize> = [peak, desc, trough].into_iter().flatten().collect();
    let ordered = present.windows(2).all(|w| w[0] < w[1]);

    let mut cp = ControlPoints {
        label,
        asc_start: 0,
        peak,
        desc,
        trough,
        asc_end: n.saturating_sub(1),
    };
    if !ordered {
        cp.peak = None;
        cp.desc = None;
        cp.trough = None;
    }
    cp
}

/// Locate peak, descending zero-crossing and trough within every cycle.
///
/// One row per cycle, in label order. Positions are offsets from the start
/// of the cycle. If the located points are not in peak → descending zero →
/// trough order, all three are reported missing.
///
/// # Errors
///
/// [`EmdError::Shape`] if the lengths differ.
pub fn get_control_points<S1, S2>(
    signal: &ArrayBase<S1, Ix1>,
    cycles: &ArrayBase<S2, Ix1>,
) -> Result<Vec<ControlPoints>>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = usize>,
{
    if signal.len() != cycles.len() {
        return Err(EmdError::shape(
            "get_control_points cycles",
            format!("length {}", signal.len()),
            cycles.shape(),
        ));
    }
    Ok(cycle_bounds(cycles)
        .into_iter()
        .map(|span| control_points_for(span.label, signal.slice(s![span.start..span.end])))
        .collect())
}

/// Indices where a new cycle begins.
fn phase_boundaries(phase: ArrayView1<f64>, phase_step: f64) -> Vec<usize> {
    (1..phase.len())
        .filter(|&t| phase[t] - phase[t - 1] < -phase_step)
        .collect()
}

fn is_good_cycle(
    phase: ArrayView1<f64>,
    signal: Option<ArrayView1<f64>>,
    mask: Option<ArrayView1<bool>>,
    phase_step: f64,
) -> bool {
    if phase.windows(2).into_iter().any(|w| w[1] <= w[0]) {
        return false;
    }
    let min = phase.iter().copied().fold(f64::INFINITY, f64::min);
    let max = phase.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(min < phase_step) || !(max > 2.0 * PI - phase_step) {
        return false;
    }
    if let Some(x) = signal {
        if !control_points_for(0, x).is_complete() {
            return false;
        }
    }
    if let Some(m) = mask {
        if m.iter().any(|&usable| !usable) {
            return false;
        }
    }
    true
}

/// Label one component's samples with cycle indices.
fn label_component(
    phase: ArrayView1<f64>,
    signal: Option<ArrayView1<f64>>,
    mask: Option<ArrayView1<bool>>,
    config: &CycleConfig,
) -> (Vec<usize>, usize, usize) {
    let boundaries = phase_boundaries(phase, config.phase_step);
    let mut labels = vec![0usize; phase.len()];
    let mut detected = 0;
    let mut kept = 0;

    let ends = boundaries.iter().skip(1).copied().chain(std::iter::once(phase.len()));
    for (start, end) in boundaries.iter().copied().zip(ends) {
        detected += 1;
        let good = !config.return_good
            || is_good_cycle(
                phase.slice(s![start..end]),
                signal.map(|x| x.slice_move(s![start..end])),
                mask.map(|m| m.slice_move(s![start..end])),
                config.phase_step,
            );
        if good {
            kept += 1;
            labels[start..end].iter_mut().for_each(|l| *l = kept);
        }
    }
    (labels, detected, kept)
}

/// Detect cycles in wrapped instantaneous phase.
///
/// `phase` is `(time × component)`, wrapped to `[0, 2π)`. `signal`, if
/// given, holds the matching raw components and enables the control-point
/// check. The result has the shape of `phase`, with `0` for samples outside
/// any retained cycle and `1..` numbering retained cycles per component.
/// Each boundary opens a cycle that runs to the next boundary or to the end
/// of the trace.
///
/// With `config.return_good` set, a cycle is kept only when its phase is
/// strictly increasing, starts below `phase_step`, ends above
/// `2π - phase_step`, has unique ordered control points (if `signal` is
/// given) and lies entirely inside the mask (if one is set).
///
/// # Errors
///
/// - [`EmdError::Configuration`] for fewer than two samples or an invalid
///   `phase_step`.
/// - [`EmdError::Shape`] if `signal` or the mask do not match `phase`.
pub fn get_cycle_vector<S>(
    phase: &ArrayBase<S, Ix2>,
    signal: Option<ArrayView2<'_, f64>>,
    config: &CycleConfig,
) -> Result<Array2<usize>>
where
    S: Data<Elem = f64>,
{
    config.validate()?;
    let (n_time, n_comp) = phase.dim();
    if n_time < 2 {
        return Err(EmdError::configuration(format!(
            "cycle detection needs at least 2 samples, got {n_time}"
        )));
    }
    if let Some(s) = &signal {
        if s.dim() != phase.dim() {
            return Err(EmdError::shape(
                "get_cycle_vector signal",
                format!("same shape as phase {:?}", phase.shape()),
                s.shape(),
            ));
        }
    }
    let mask = config.mask.as_ref().map(|m| m.view());
    if let Some(m) = &mask {
        if m.len() != n_time {
            return Err(EmdError::shape(
                "get_cycle_vector mask",
                format!("length {n_time}"),
                m.shape(),
            ));
        }
    }

    debug!(
        n_time,
        n_comp,
        phase_step = config.phase_step,
        return_good = config.return_good,
        masked = mask.is_some(),
        "detecting cycles"
    );

    let phase = phase.view();
    let columns: Vec<(Vec<usize>, usize, usize)> = (0..n_comp)
        .into_par_iter()
        .map(|c| {
            label_component(
                phase.column(c),
                signal.as_ref().map(|s| s.column(c)),
                mask,
                config,
            )
        })
        .collect();

    let mut out = Array2::zeros((n_time, n_comp));
    for (c, (labels, detected, kept)) in columns.into_iter().enumerate() {
        trace!(component = c, detected, kept, rejected = detected - kept, "cycles labelled");
        out.column_mut(c)
            .iter_mut()
            .zip(labels)
            .for_each(|(o, l)| *o = l);
    }
    Ok(out)
}

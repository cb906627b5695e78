//! Instantaneous Phase, Frequency and Amplitude
//!
//! Converts decomposed oscillatory components (IMFs) into instantaneous phase
//! (IP), frequency (IF) and amplitude (IA) using one of several
//! interchangeable phase-extraction strategies.
//!
//! # Conventions
//!
//! - Components are laid out as `(time × components)`.
//! - IP is wrapped into `[0, 2π)` with zero at the ascending zero-crossing of
//!   the component, so every cycle wraps from ~2π back to ~0 as the signal
//!   crosses zero going up.
//! - IF is derived from the *unwrapped* phase by a first difference scaled by
//!   `sample_rate / 2π`. The first sample has no predecessor and is
//!   back-filled from the second, keeping IF the same length as the input.
//!   IF is never clamped; negative values flag phase reversals.
//! - IA is the magnitude of the analytic signal of the raw component.

use ndarray::{Array, Array2, Array3, ArrayBase, ArrayView1, Axis, Data, Dimension, Ix2, Zip};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, trace};

use crate::analytic::{amplitude_normalise, quadrature_signal, unwrap_1d, AnalyticTransform};
use crate::error::{check_sample_rate, EmdError, Result};

/// Phase-extraction strategy used by [`frequency_transform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransformMethod {
    /// Hilbert transform of the raw component.
    #[serde(rename = "hilbert")]
    Hilbert,

    /// Hilbert transform of the amplitude-normalised component.
    ///
    /// Removing the envelope first improves phase fidelity for strongly
    /// amplitude-modulated components.
    #[serde(rename = "nht")]
    NormalizedHilbert,

    /// Direct quadrature of the amplitude-normalised component.
    #[serde(rename = "dq")]
    DirectQuadrature,
}

impl Default for TransformMethod {
    fn default() -> Self {
        Self::NormalizedHilbert
    }
}

impl TransformMethod {
    /// Short tag used in configuration files and logs.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Hilbert => "hilbert",
            Self::NormalizedHilbert => "nht",
            Self::DirectQuadrature => "dq",
        }
    }
}

impl fmt::Display for TransformMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for TransformMethod {
    type Err = EmdError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hilbert" => Ok(Self::Hilbert),
            "nht" | "normalized_hilbert" => Ok(Self::NormalizedHilbert),
            "dq" | "direct_quadrature" => Ok(Self::DirectQuadrature),
            _ => Err(EmdError::UnsupportedMethod(s.to_string())),
        }
    }
}

/// Range into which wrapped phase values are mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseConvention {
    /// `[0, 2π)`, the convention of [`frequency_transform`] output.
    #[default]
    ZeroToTwoPi,
    /// `[-π, π)`.
    MinusPiToPi,
}

impl PhaseConvention {
    /// Lower and upper bound of the phase range.
    pub fn range(&self) -> (f64, f64) {
        match self {
            Self::ZeroToTwoPi => (0.0, TAU),
            Self::MinusPiToPi => (-PI, PI),
        }
    }

    /// Wrap a single phase value into this convention's range.
    pub fn wrap(&self, phase: f64) -> f64 {
        let (low, _) = self.range();
        let mut wrapped = (phase - low).rem_euclid(TAU);
        // rem_euclid may round up to exactly TAU
        if wrapped >= TAU {
            wrapped -= TAU;
        }
        wrapped + low
    }
}

/// Instantaneous phase, frequency and amplitude of a set of components.
///
/// All three arrays share the `(time × components)` shape of the input.
#[derive(Debug, Clone)]
pub struct InstantaneousStats {
    /// Wrapped instantaneous phase in `[0, 2π)`.
    pub phase: Array2<f64>,
    /// Instantaneous frequency, in the units of the sample rate.
    pub frequency: Array2<f64>,
    /// Instantaneous amplitude.
    pub amplitude: Array2<f64>,
}

impl InstantaneousStats {
    /// `(time, components)` shape shared by all three arrays.
    pub fn dim(&self) -> (usize, usize) {
        self.phase.dim()
    }
}

/// Instantaneous statistics of a second-layer decomposition, shaped
/// `(time × component × second-layer component)`.
#[derive(Debug, Clone)]
pub struct LayeredInstantaneousStats {
    /// Wrapped instantaneous phase in `[0, 2π)`.
    pub phase: Array3<f64>,
    /// Instantaneous frequency.
    pub frequency: Array3<f64>,
    /// Instantaneous amplitude.
    pub amplitude: Array3<f64>,
}

/// Compute IP, IF and IA for every component.
///
/// `components` must be two-dimensional `(time × components)` with at least
/// two time samples.
///
/// # Errors
///
/// - [`EmdError::Shape`] if `components` is not 2-D or has fewer than two
///   time samples.
/// - [`EmdError::Domain`] if `sample_rate` is not positive and finite.
///
/// # Example
///
/// ```rust
/// use emd_signal::frequency::{frequency_transform, TransformMethod};
/// use ndarray::Array2;
/// use std::f64::consts::PI;
///
/// let sample_rate = 1000.0;
/// let imf = Array2::from_shape_fn((1000, 1), |(t, _)| {
///     (2.0 * PI * 10.0 * t as f64 / sample_rate).cos()
/// });
/// let stats = frequency_transform(&imf, sample_rate, TransformMethod::Hilbert).unwrap();
/// let mean_if = stats.frequency.mean().unwrap();
/// assert!((mean_if - 10.0).abs() < 1e-6);
/// ```
pub fn frequency_transform<S, D>(
    components: &ArrayBase<S, D>,
    sample_rate: f64,
    method: TransformMethod,
) -> Result<InstantaneousStats>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    check_sample_rate(sample_rate)?;
    let view = components.view().into_dimensionality::<Ix2>().map_err(|_| {
        EmdError::shape(
            "frequency_transform components",
            "2-D array (time × components)",
            components.shape(),
        )
    })?;
    let (n_time, n_comp) = view.dim();
    if n_time < 2 {
        return Err(EmdError::shape(
            "frequency_transform components",
            "at least 2 time samples",
            components.shape(),
        ));
    }

    debug!(n_time, n_comp, sample_rate, method = %method, "frequency transform");

    let transform = AnalyticTransform::new(n_time);
    let mut stats = InstantaneousStats {
        phase: Array2::zeros((n_time, n_comp)),
        frequency: Array2::zeros((n_time, n_comp)),
        amplitude: Array2::zeros((n_time, n_comp)),
    };

    for (c, column) in view.axis_iter(Axis(1)).enumerate() {
        let (ip, freq, amp) = transform_lane(&transform, column, sample_rate, method);
        stats.phase.column_mut(c).assign(&ArrayView1::from(&ip));
        stats.frequency.column_mut(c).assign(&ArrayView1::from(&freq));
        stats.amplitude.column_mut(c).assign(&ArrayView1::from(&amp));
        trace!(component = c, "component transformed");
    }

    Ok(stats)
}

/// Compute IP, IF and IA for a second-layer decomposition.
///
/// The input is shaped `(time × component × second-layer component)`, as
/// produced by decomposing the amplitude envelope of each first-layer
/// component. Every `(component, second-layer)` lane is transformed
/// independently along the time axis.
///
/// # Errors
///
/// Same conditions as [`frequency_transform`], with a 3-D shape requirement.
pub fn frequency_transform_layered<S>(
    components: &ArrayBase<S, ndarray::Ix3>,
    sample_rate: f64,
    method: TransformMethod,
) -> Result<LayeredInstantaneousStats>
where
    S: Data<Elem = f64>,
{
    check_sample_rate(sample_rate)?;
    let (n_time, n_comp, n_layer) = components.dim();
    if n_time < 2 {
        return Err(EmdError::shape(
            "frequency_transform_layered components",
            "at least 2 time samples",
            components.shape(),
        ));
    }

    debug!(n_time, n_comp, n_layer, sample_rate, method = %method, "layered frequency transform");

    let transform = AnalyticTransform::new(n_time);
    let shape = (n_time, n_comp, n_layer);
    let mut stats = LayeredInstantaneousStats {
        phase: Array3::zeros(shape),
        frequency: Array3::zeros(shape),
        amplitude: Array3::zeros(shape),
    };

    for c in 0..n_comp {
        for k in 0..n_layer {
            let lane = components.slice(ndarray::s![.., c, k]);
            let (ip, freq, amp) = transform_lane(&transform, lane, sample_rate, method);
            stats.phase.slice_mut(ndarray::s![.., c, k]).assign(&ArrayView1::from(&ip));
            stats.frequency.slice_mut(ndarray::s![.., c, k]).assign(&ArrayView1::from(&freq));
            stats.amplitude.slice_mut(ndarray::s![.., c, k]).assign(&ArrayView1::from(&amp));
        }
    }

    Ok(stats)
}

/// Transform one time series into `(wrapped IP, IF, IA)`.
fn transform_lane(
    transform: &AnalyticTransform,
    lane: ArrayView1<f64>,
    sample_rate: f64,
    method: TransformMethod,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let signal: Vec<f64> = lane.iter().copied().collect();
    let analytic = transform.analytic(&signal);
    let amplitude: Vec<f64> = analytic.iter().map(|z| z.norm()).collect();

    let mut phase: Vec<f64> = match method {
        TransformMethod::Hilbert => analytic.iter().map(|z| z.arg()).collect(),
        TransformMethod::NormalizedHilbert => {
            let carrier = amplitude_normalise(&signal, false);
            transform.analytic(&carrier).iter().map(|z| z.arg()).collect()
        }
        TransformMethod::DirectQuadrature => {
            let carrier = amplitude_normalise(&signal, true);
            quadrature_signal(&carrier).iter().map(|z| z.arg()).collect()
        }
    };

    unwrap_1d(&mut phase);
    let frequency = freq_from_unwrapped(&phase, sample_rate);
    let wrapped = phase
        .iter()
        .map(|&p| PhaseConvention::ZeroToTwoPi.wrap(p + FRAC_PI_2))
        .collect();

    (wrapped, frequency, amplitude)
}

/// First difference of an unwrapped phase series scaled to frequency, with
/// the first sample back-filled from the second.
fn freq_from_unwrapped(phase: &[f64], sample_rate: f64) -> Vec<f64> {
    let n = phase.len();
    let scale = sample_rate / TAU;
    let mut frequency = vec![0.0; n];
    for i in 1..n {
        frequency[i] = (phase[i] - phase[i - 1]) * scale;
    }
    if n >= 2 {
        frequency[0] = frequency[1];
    }
    frequency
}

/// Instantaneous frequency from instantaneous phase along the time axis
/// (axis 0).
///
/// The phase is unwrapped first, so wrapped and unwrapped inputs give the
/// same result. The first output sample duplicates the second: this is a
/// length-preserving boundary convention, not an estimate.
///
/// # Errors
///
/// - [`EmdError::Shape`] for 0-D input or fewer than two time samples.
/// - [`EmdError::Domain`] for a non-positive sample rate.
pub fn freq_from_phase<S, D>(phase: &ArrayBase<S, D>, sample_rate: f64) -> Result<Array<f64, D>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    check_sample_rate(sample_rate)?;
    if phase.ndim() == 0 || phase.len_of(Axis(0)) < 2 {
        return Err(EmdError::shape(
            "freq_from_phase phase",
            "at least 2 samples along the time axis",
            phase.shape(),
        ));
    }

    let mut out = Array::zeros(phase.raw_dim());
    Zip::from(out.lanes_mut(Axis(0)))
        .and(phase.lanes(Axis(0)))
        .for_each(|mut out_lane, in_lane| {
            let mut unwrapped: Vec<f64> = in_lane.iter().copied().collect();
            unwrap_1d(&mut unwrapped);
            let freq = freq_from_unwrapped(&unwrapped, sample_rate);
            for (o, f) in out_lane.iter_mut().zip(freq) {
                *o = f;
            }
        });
    Ok(out)
}

/// Instantaneous phase from instantaneous frequency along the time axis.
///
/// Computes `phase_start + cumsum(2π·f / sample_rate)`, the inverse of
/// [`freq_from_phase`] for slowly varying frequencies. The result is
/// unwrapped; pass it through [`wrap_phase`] for a wrapped trace.
///
/// # Errors
///
/// - [`EmdError::Shape`] for 0-D input.
/// - [`EmdError::Domain`] for a non-positive sample rate.
pub fn phase_from_freq<S, D>(
    frequency: &ArrayBase<S, D>,
    sample_rate: f64,
    phase_start: f64,
) -> Result<Array<f64, D>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    check_sample_rate(sample_rate)?;
    if frequency.ndim() == 0 {
        return Err(EmdError::shape(
            "phase_from_freq frequency",
            "at least 1 dimension",
            frequency.shape(),
        ));
    }

    let step = TAU / sample_rate;
    let mut out = Array::zeros(frequency.raw_dim());
    Zip::from(out.lanes_mut(Axis(0)))
        .and(frequency.lanes(Axis(0)))
        .for_each(|mut out_lane, in_lane| {
            let mut acc = phase_start;
            for (o, &f) in out_lane.iter_mut().zip(in_lane.iter()) {
                acc += f * step;
                *o = acc;
            }
        });
    Ok(out)
}

/// Default `phase_start` for [`phase_from_freq`].
pub const DEFAULT_PHASE_START: f64 = -PI;

/// Wrap every element of `phase` into the range of `convention`.
pub fn wrap_phase<S, D>(phase: &ArrayBase<S, D>, convention: PhaseConvention) -> Array<f64, D>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    phase.mapv(|p| convention.wrap(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array1, Array3};

    fn cosine_imf(n: usize, sample_rate: f64, freq: f64, amp: f64) -> Array2<f64> {
        Array2::from_shape_fn((n, 1), |(t, _)| {
            amp * (2.0 * PI * freq * t as f64 / sample_rate).cos()
        })
    }

    #[test]
    fn method_tags_parse() {
        assert_eq!("hilbert".parse::<TransformMethod>().unwrap(), TransformMethod::Hilbert);
        assert_eq!("NHT".parse::<TransformMethod>().unwrap(), TransformMethod::NormalizedHilbert);
        assert_eq!(" dq ".parse::<TransformMethod>().unwrap(), TransformMethod::DirectQuadrature);
        assert!(matches!(
            "wavelet".parse::<TransformMethod>(),
            Err(EmdError::UnsupportedMethod(_))
        ));
    }

    #[test]
    fn method_tag_roundtrips_through_display() {
        for m in [
            TransformMethod::Hilbert,
            TransformMethod::NormalizedHilbert,
            TransformMethod::DirectQuadrature,
        ] {
            assert_eq!(m.to_string().parse::<TransformMethod>().unwrap(), m);
        }
    }

    #[test]
    fn hilbert_pure_cosine_exact() {
        let sample_rate = 1000.0;
        let imf = cosine_imf(2000, sample_rate, 5.0, 2.0);
        let stats = frequency_transform(&imf, sample_rate, TransformMethod::Hilbert).unwrap();

        assert_eq!(stats.dim(), (2000, 1));
        for &f in stats.frequency.iter() {
            assert_abs_diff_eq!(f, 5.0, epsilon = 1e-6);
        }
        for &a in stats.amplitude.iter() {
            assert_abs_diff_eq!(a, 2.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn phase_zero_at_ascending_zero_crossing() {
        let sample_rate = 100.0;
        // sin starts at its ascending zero-crossing
        let imf = Array2::from_shape_fn((400, 1), |(t, _)| {
            (2.0 * PI * 2.0 * t as f64 / sample_rate).sin()
        });
        let stats = frequency_transform(&imf, sample_rate, TransformMethod::Hilbert).unwrap();
        let p0 = stats.phase[[0, 0]];
        assert!(p0 < 1e-6 || p0 > TAU - 1e-6, "phase at t=0 was {p0}");
        // Quarter cycle later the phase is at the peak, π/2
        assert_abs_diff_eq!(stats.phase[[12, 0]], 2.0 * PI * 2.0 * 12.0 / 100.0, epsilon = 1e-6);
    }

    #[test]
    fn phase_range_is_wrapped() {
        let imf = cosine_imf(1000, 500.0, 7.0, 1.0);
        for method in [
            TransformMethod::Hilbert,
            TransformMethod::NormalizedHilbert,
            TransformMethod::DirectQuadrature,
        ] {
            let stats = frequency_transform(&imf, 500.0, method).unwrap();
            assert!(stats.phase.iter().all(|&p| (0.0..TAU).contains(&p)), "{method}");
            assert!(stats.amplitude.iter().all(|&a| a >= 0.0), "{method}");
        }
    }

    #[test]
    fn rejects_non_2d_input() {
        let one_d = Array1::<f64>::zeros(100);
        assert!(matches!(
            frequency_transform(&one_d, 100.0, TransformMethod::Hilbert),
            Err(EmdError::Shape { .. })
        ));
        let three_d = Array3::<f64>::zeros((100, 2, 2));
        assert!(matches!(
            frequency_transform(&three_d, 100.0, TransformMethod::Hilbert),
            Err(EmdError::Shape { .. })
        ));
    }

    #[test]
    fn rejects_bad_sample_rate_and_short_input() {
        let imf = cosine_imf(100, 100.0, 3.0, 1.0);
        assert!(matches!(
            frequency_transform(&imf, 0.0, TransformMethod::Hilbert),
            Err(EmdError::Domain(_))
        ));
        let short = Array2::<f64>::zeros((1, 3));
        assert!(matches!(
            frequency_transform(&short, 100.0, TransformMethod::Hilbert),
            Err(EmdError::Shape { .. })
        ));
    }

    #[test]
    fn freq_from_phase_linear_ramps() {
        for (cycles, expected) in [(1.0, 1.0), (0.5, 0.5), (2.0, 2.0)] {
            let phase = Array1::linspace(0.0, TAU * cycles, 48);
            let freq = freq_from_phase(&phase, 47.0).unwrap();
            for &f in freq.iter() {
                assert_abs_diff_eq!(f, expected, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn freq_from_phase_backfills_first_sample() {
        let phase = Array1::from(vec![0.0, 0.1, 0.3, 0.6]);
        let freq = freq_from_phase(&phase, TAU).unwrap();
        assert_abs_diff_eq!(freq[0], freq[1], epsilon = 1e-12);
        assert_abs_diff_eq!(freq[1], 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(freq[3], 0.3, epsilon = 1e-12);
    }

    #[test]
    fn freq_from_phase_handles_wrapped_input() {
        let unwrapped = Array1::from_shape_fn(200, |i| i as f64 * 0.2);
        let wrapped = wrap_phase(&unwrapped, PhaseConvention::ZeroToTwoPi);
        let freq = freq_from_phase(&wrapped, 10.0).unwrap();
        for &f in freq.iter() {
            assert_abs_diff_eq!(f, 0.2 * 10.0 / TAU, epsilon = 1e-9);
        }
    }

    #[test]
    fn freq_from_phase_2d_columns_independent() {
        let phase = Array2::from_shape_fn((50, 2), |(t, c)| t as f64 * 0.1 * (c + 1) as f64);
        let freq = freq_from_phase(&phase, TAU).unwrap();
        assert_abs_diff_eq!(freq[[10, 0]], 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(freq[[10, 1]], 0.2, epsilon = 1e-12);
    }

    #[test]
    fn phase_from_freq_constant() {
        let freq = Array1::<f64>::ones(100);
        let phase = phase_from_freq(&freq, 100.0, DEFAULT_PHASE_START).unwrap();
        let max = phase.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert_abs_diff_eq!(max, PI, epsilon = 1e-9);
    }

    #[test]
    fn phase_freq_approximate_inverse() {
        let freq = Array1::from_elem(500, 12.5);
        let phase = phase_from_freq(&freq, 1000.0, 0.0).unwrap();
        let back = freq_from_phase(&phase, 1000.0).unwrap();
        for &f in back.iter() {
            assert_abs_diff_eq!(f, 12.5, epsilon = 1e-9);
        }
    }

    #[test]
    fn wrap_conventions() {
        assert_abs_diff_eq!(PhaseConvention::ZeroToTwoPi.wrap(-FRAC_PI_2), 1.5 * PI, epsilon = 1e-12);
        assert_abs_diff_eq!(PhaseConvention::ZeroToTwoPi.wrap(5.0 * PI), PI, epsilon = 1e-12);
        assert_abs_diff_eq!(PhaseConvention::MinusPiToPi.wrap(1.5 * PI), -FRAC_PI_2, epsilon = 1e-12);
        assert_abs_diff_eq!(PhaseConvention::MinusPiToPi.wrap(PI), -PI, epsilon = 1e-12);
    }

    #[test]
    fn layered_transform_shapes() {
        let sample_rate = 200.0;
        let imf2 = Array3::from_shape_fn((400, 2, 3), |(t, c, k)| {
            let f = 1.0 + c as f64 + 2.0 * k as f64;
            (2.0 * PI * f * t as f64 / sample_rate).cos()
        });
        let stats =
            frequency_transform_layered(&imf2, sample_rate, TransformMethod::Hilbert).unwrap();
        assert_eq!(stats.frequency.dim(), (400, 2, 3));
        assert_abs_diff_eq!(stats.frequency[[200, 1, 2]], 6.0, epsilon = 1e-6);
        assert_abs_diff_eq!(stats.amplitude[[100, 0, 0]], 1.0, epsilon = 1e-9);
    }
}

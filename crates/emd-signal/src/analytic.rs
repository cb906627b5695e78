//! Analytic Signal Primitives
//!
//! FFT-based analytic signal, phase unwrapping, envelope amplitude
//! normalisation and the direct-quadrature carrier used by the frequency
//! transforms in [`crate::frequency`].

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

/// Largest `|x|` accepted as already normalised.
const NORMALISE_THRESHOLD: f64 = 1e-10;

/// Maximum number of envelope-division passes during normalisation.
const NORMALISE_MAX_ITERS: usize = 3;

/// Reusable forward/inverse FFT pair for computing analytic signals of a
/// fixed length.
///
/// The analytic signal keeps the DC (and, for even lengths, Nyquist) bin,
/// doubles the positive frequencies and zeroes the negative ones before the
/// inverse transform, so `re(z) == x` and `im(z)` is the discrete Hilbert
/// transform of `x`.
#[derive(Clone)]
pub struct AnalyticTransform {
    len: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl fmt::Debug for AnalyticTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyticTransform").field("len", &self.len).finish()
    }
}

impl AnalyticTransform {
    /// Plan transforms for signals of `len` samples.
    pub fn new(len: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            len,
            forward: planner.plan_fft_forward(len),
            inverse: planner.plan_fft_inverse(len),
        }
    }

    /// Signal length this transform was planned for.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the planned length is zero.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Compute the analytic signal of `signal`.
    ///
    /// `signal.len()` must equal [`Self::len`].
    pub fn analytic(&self, signal: &[f64]) -> Vec<Complex64> {
        debug_assert_eq!(signal.len(), self.len, "signal length must match planned length");
        let n = self.len;
        if n == 0 {
            return Vec::new();
        }

        let mut buffer: Vec<Complex64> = signal.iter().map(|&x| Complex64::new(x, 0.0)).collect();
        self.forward.process(&mut buffer);

        // One-sided spectrum: double 1..ceil(n/2), zero everything above n/2
        let half = n / 2;
        let doubled_end = if n % 2 == 0 { half } else { half + 1 };
        for bin in buffer.iter_mut().take(doubled_end).skip(1) {
            *bin *= 2.0;
        }
        for bin in buffer.iter_mut().skip(half + 1) {
            *bin = Complex64::new(0.0, 0.0);
        }

        self.inverse.process(&mut buffer);
        let scale = 1.0 / n as f64;
        for z in &mut buffer {
            *z *= scale;
        }
        buffer
    }
}

/// Analytic signal of a single real series.
pub fn analytic_signal(signal: &[f64]) -> Vec<Complex64> {
    AnalyticTransform::new(signal.len()).analytic(signal)
}

/// In-place 1D phase unwrapping.
///
/// Steps larger than π are folded back into `(-π, π]` and the correction is
/// accumulated over the rest of the series. A step of exactly ±π keeps its
/// sign.
pub fn unwrap_1d(data: &mut [f64]) {
    if data.len() < 2 {
        return;
    }

    let two_pi = 2.0 * PI;
    let mut correction = 0.0;
    let mut prev_wrapped = data[0];

    for value in data.iter_mut().skip(1) {
        let current_wrapped = *value;
        let diff = current_wrapped - prev_wrapped;

        if diff.abs() >= PI {
            let mut folded = (diff + PI).rem_euclid(two_pi) - PI;
            if folded == -PI && diff > 0.0 {
                folded = PI;
            }
            correction += folded - diff;
        }

        *value = current_wrapped + correction;
        prev_wrapped = current_wrapped;
    }
}

/// Upper envelope of `|signal|`, linearly interpolated through its interior
/// local maxima and held flat beyond the first and last peak.
///
/// Endpoints are never anchors: a trace cut on a flank would drag the
/// envelope below the true peak just past the edge. In the held regions the
/// envelope is raised to `|x|` wherever the edge sample exceeds the nearest
/// peak. Signals without any interior maximum get a flat envelope at
/// `max |x|`.
pub fn abs_envelope(signal: &[f64]) -> Vec<f64> {
    let n = signal.len();
    let abs: Vec<f64> = signal.iter().map(|x| x.abs()).collect();
    if n < 3 {
        let peak = abs.iter().copied().fold(0.0, f64::max);
        return vec![peak; n];
    }

    let peaks: Vec<usize> = (1..n - 1)
        .filter(|&i| abs[i - 1] < abs[i] && abs[i] >= abs[i + 1])
        .collect();

    if peaks.is_empty() {
        let peak = abs.iter().copied().fold(0.0, f64::max);
        return vec![peak; n];
    }

    let mut envelope = vec![0.0; n];
    let first = peaks[0];
    let last = peaks[peaks.len() - 1];

    for (v, &a) in envelope.iter_mut().zip(abs.iter()).take(first + 1) {
        *v = abs[first].max(a);
    }
    for (v, &a) in envelope.iter_mut().zip(abs.iter()).skip(last) {
        *v = abs[last].max(a);
    }
    for pair in peaks.windows(2) {
        let (x0, x1) = (pair[0], pair[1]);
        let (y0, y1) = (abs[x0], abs[x1]);
        let span = (x1 - x0) as f64;
        for (offset, v) in envelope[x0..=x1].iter_mut().enumerate() {
            *v = y0 + (y1 - y0) * offset as f64 / span;
        }
    }

    envelope
}

/// Normalise a component to unit amplitude by repeatedly dividing it by its
/// `|x|` envelope.
///
/// Stops once every sample satisfies `|x| <= 1 + 1e-10` or after three
/// passes. With `clip`, the result is finally clamped to `[-1, 1]`, which the
/// direct-quadrature carrier needs.
pub fn amplitude_normalise(signal: &[f64], clip: bool) -> Vec<f64> {
    let mut normalised = signal.to_vec();

    for _ in 0..NORMALISE_MAX_ITERS {
        let envelope = abs_envelope(&normalised);
        for (x, &env) in normalised.iter_mut().zip(envelope.iter()) {
            if env > f64::EPSILON {
                *x /= env;
            }
        }
        let max_abs = normalised.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()));
        if max_abs <= 1.0 + NORMALISE_THRESHOLD {
            break;
        }
    }

    if clip {
        for x in &mut normalised {
            *x = x.clamp(-1.0, 1.0);
        }
    }
    normalised
}

/// Direct-quadrature complex carrier of an amplitude-normalised component.
///
/// The quadrature is `sqrt(1 - x²)`, negated wherever the carrier is rising
/// so that the angle advances through the cycle in the same sense as the
/// analytic signal. The final sample reuses the previous slope sign.
pub fn quadrature_signal(normalised: &[f64]) -> Vec<Complex64> {
    let n = normalised.len();
    let mut sign = vec![1.0; n];
    for i in 0..n.saturating_sub(1) {
        sign[i] = if normalised[i + 1] - normalised[i] > 0.0 { -1.0 } else { 1.0 };
    }
    if n >= 2 {
        sign[n - 1] = sign[n - 2];
    }

    normalised
        .iter()
        .zip(sign.iter())
        .map(|(&x, &s)| {
            let q = (1.0 - x * x).max(0.0).sqrt();
            Complex64::new(x, s * q)
        })
        .collect()
}

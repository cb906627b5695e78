//! Hilbert-Huang Spectrum and Holospectrum
//!
//! Bins per-sample instantaneous frequency, weighted by instantaneous
//! amplitude or power, into frequency histograms.
//!
//! - [`hilberthuang`] bins `(time × component)` IF/IA pairs into a 1D, 2D
//!   or 3D spectrum depending on which axes are summed.
//! - [`holospectrum`] bins second-layer samples jointly by carrier
//!   frequency (first-layer IF) and amplitude-modulation frequency
//!   (second-layer IF).
//!
//! Samples whose frequency falls outside the bin edges, or is NaN, are
//! dropped rather than clamped: choose edges that cover the expected
//! frequency range. Everything that lands inside the edges is conserved, so
//! the spectrum sums to the total weight of the in-range samples.
//!
//! Bin lookup runs in parallel across components with [`rayon`];
//! accumulation then proceeds in a fixed component order so results do not
//! depend on thread scheduling.

use ndarray::{
    s, Array1, Array2, Array3, ArrayBase, ArrayView2, ArrayView3, Axis, Data, Dimension, Ix1, Ix2,
    Ix3,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{EmdError, Result};
use crate::histogram::HistBins;

/// Weighting applied to instantaneous amplitude before accumulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpectrumMode {
    /// Accumulate `IA²`.
    #[default]
    Power,
    /// Accumulate `IA`.
    Amplitude,
}

impl SpectrumMode {
    /// Weight contributed by a sample with amplitude `amplitude`.
    #[inline]
    pub fn weight(&self, amplitude: f64) -> f64 {
        match self {
            Self::Power => amplitude * amplitude,
            Self::Amplitude => amplitude,
        }
    }
}

/// Options for [`hilberthuang`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HilbertHuangOptions {
    /// Amplitude or power weighting.
    pub mode: SpectrumMode,
    /// Collapse the time axis.
    pub sum_time: bool,
    /// Collapse the component axis.
    pub sum_imfs: bool,
}

impl Default for HilbertHuangOptions {
    fn default() -> Self {
        Self {
            mode: SpectrumMode::Power,
            sum_time: true,
            sum_imfs: true,
        }
    }
}

/// Options for [`holospectrum`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolospectrumOptions {
    /// Amplitude or power weighting of the second-layer amplitude.
    pub mode: SpectrumMode,
    /// Collapse the time axis.
    pub sum_time: bool,
}

impl Default for HolospectrumOptions {
    fn default() -> Self {
        Self {
            mode: SpectrumMode::Power,
            sum_time: true,
        }
    }
}

/// Hilbert-Huang spectrum values. The frequency axis is always first.
#[derive(Debug, Clone, PartialEq)]
pub enum SpectrumData {
    /// Summed over time and components: `(frequency)`.
    Frequency(Array1<f64>),
    /// Summed over time: `(frequency × component)`.
    FrequencyImf(Array2<f64>),
    /// Summed over components: `(frequency × time)`.
    FrequencyTime(Array2<f64>),
    /// Nothing summed: `(frequency × time × component)`.
    FrequencyTimeImf(Array3<f64>),
}

impl SpectrumData {
    /// Shape of the underlying array.
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Frequency(a) => a.shape(),
            Self::FrequencyImf(a) | Self::FrequencyTime(a) => a.shape(),
            Self::FrequencyTimeImf(a) => a.shape(),
        }
    }

    /// Sum over every cell.
    pub fn sum(&self) -> f64 {
        match self {
            Self::Frequency(a) => a.sum(),
            Self::FrequencyImf(a) | Self::FrequencyTime(a) => a.sum(),
            Self::FrequencyTimeImf(a) => a.sum(),
        }
    }

    /// 1D spectrum, if both time and components were summed.
    pub fn as_1d(&self) -> Option<&Array1<f64>> {
        match self {
            Self::Frequency(a) => Some(a),
            _ => None,
        }
    }

    /// 2D spectrum, if exactly one axis was summed.
    pub fn as_2d(&self) -> Option<&Array2<f64>> {
        match self {
            Self::FrequencyImf(a) | Self::FrequencyTime(a) => Some(a),
            _ => None,
        }
    }

    /// 3D spectrum, if nothing was summed.
    pub fn as_3d(&self) -> Option<&Array3<f64>> {
        match self {
            Self::FrequencyTimeImf(a) => Some(a),
            _ => None,
        }
    }

    /// Frequency marginal: every non-frequency axis summed away.
    pub fn marginal(&self) -> Array1<f64> {
        match self {
            Self::Frequency(a) => a.clone(),
            Self::FrequencyImf(a) | Self::FrequencyTime(a) => a.sum_axis(Axis(1)),
            Self::FrequencyTimeImf(a) => a.sum_axis(Axis(2)).sum_axis(Axis(1)),
        }
    }
}

/// Output of [`hilberthuang`].
#[derive(Debug, Clone)]
pub struct HilbertHuangSpectrum {
    /// Frequency bins of the first axis.
    pub bins: HistBins,
    /// Weighting used.
    pub mode: SpectrumMode,
    /// Spectrum values.
    pub data: SpectrumData,
    /// Samples dropped for falling outside the bin edges.
    pub dropped: usize,
}

impl HilbertHuangSpectrum {
    /// Bin centres of the frequency axis.
    pub fn frequencies(&self) -> &Array1<f64> {
        &self.bins.centres
    }
}

/// Frequency marginal of any spectrum variant.
pub fn marginal_spectrum(spectrum: &HilbertHuangSpectrum) -> Array1<f64> {
    spectrum.data.marginal()
}

/// Holospectrum values, carrier frequency first, AM frequency second.
#[derive(Debug, Clone, PartialEq)]
pub enum HoloData {
    /// Summed over time: `(carrier × am)`.
    CarrierAm(Array2<f64>),
    /// Time resolved: `(carrier × am × time)`.
    CarrierAmTime(Array3<f64>),
}

impl HoloData {
    /// Shape of the underlying array.
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::CarrierAm(a) => a.shape(),
            Self::CarrierAmTime(a) => a.shape(),
        }
    }

    /// Sum over every cell.
    pub fn sum(&self) -> f64 {
        match self {
            Self::CarrierAm(a) => a.sum(),
            Self::CarrierAmTime(a) => a.sum(),
        }
    }

    /// Time-summed view, computing it if the data is time resolved.
    pub fn time_summed(&self) -> Array2<f64> {
        match self {
            Self::CarrierAm(a) => a.clone(),
            Self::CarrierAmTime(a) => a.sum_axis(Axis(2)),
        }
    }
}

/// Output of [`holospectrum`].
#[derive(Debug, Clone)]
pub struct Holospectrum {
    /// Carrier-frequency bins (first axis).
    pub carrier_bins: HistBins,
    /// Amplitude-modulation frequency bins (second axis).
    pub am_bins: HistBins,
    /// Weighting used.
    pub mode: SpectrumMode,
    /// Holospectrum values.
    pub data: HoloData,
}

/// View a 1-D or 2-D array as `(time × component)`.
fn time_by_component<'a, S, D>(
    array: &'a ArrayBase<S, D>,
    context: &'static str,
) -> Result<ArrayView2<'a, f64>>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    match array.ndim() {
        1 => {
            let view = array.view().into_dimensionality::<Ix1>().map_err(|_| {
                EmdError::shape(context, "1-D or 2-D (time × components)", array.shape())
            })?;
            Ok(view.insert_axis(Axis(1)))
        }
        2 => array
            .view()
            .into_dimensionality::<Ix2>()
            .map_err(|_| EmdError::shape(context, "1-D or 2-D (time × components)", array.shape())),
        _ => Err(EmdError::shape(
            context,
            "1-D or 2-D (time × components)",
            array.shape(),
        )),
    }
}

/// Bin index of every sample in one component column.
fn locate_column(bins: &HistBins, frequency: &ArrayView2<f64>, component: usize) -> Vec<Option<usize>> {
    frequency.column(component).iter().map(|&f| bins.locate(f)).collect()
}

/// Feed every located sample to `add(bin, time, component, weight)` in
/// component order. Returns the number of unlocated samples.
fn for_each_hit<F>(
    located: &[Vec<Option<usize>>],
    amplitude: &ArrayView2<f64>,
    mode: SpectrumMode,
    mut add: F,
) -> usize
where
    F: FnMut(usize, usize, usize, f64),
{
    let mut dropped = 0;
    for (c, column) in located.iter().enumerate() {
        for (t, bin) in column.iter().enumerate() {
            match bin {
                Some(b) => add(*b, t, c, mode.weight(amplitude[[t, c]])),
                None => dropped += 1,
            }
        }
    }
    dropped
}

/// Compute the Hilbert-Huang spectrum.
///
/// `frequency` and `amplitude` are `(time × component)` arrays of identical
/// shape (1-D inputs are treated as a single component). Every sample is
/// placed in the frequency bin containing its IF and contributes its
/// weighted IA. The output layout depends on `options`:
///
/// | `sum_time` | `sum_imfs` | output                                   |
/// |-----------|-----------|-------------------------------------------|
/// | true      | true      | [`SpectrumData::Frequency`]               |
/// | true      | false     | [`SpectrumData::FrequencyImf`]            |
/// | false     | true      | [`SpectrumData::FrequencyTime`]           |
/// | false     | false     | [`SpectrumData::FrequencyTimeImf`]        |
///
/// # Errors
///
/// [`EmdError::Shape`] if either input is not 1-D/2-D or the shapes differ.
///
/// # Example
///
/// ```rust
/// use emd_signal::histogram::{define_hist_bins, BinSpacing};
/// use emd_signal::spectrum::{hilberthuang, HilbertHuangOptions, SpectrumMode};
/// use ndarray::Array2;
///
/// let freq = Array2::from_shape_fn((13, 1), |(t, _)| t as f64);
/// let amp = Array2::<f64>::ones((13, 1));
/// let bins = define_hist_bins(0.0, 13.0, 2, BinSpacing::Linear).unwrap();
/// let options = HilbertHuangOptions { mode: SpectrumMode::Amplitude, ..Default::default() };
///
/// let spec = hilberthuang(&freq, &amp, &bins, &options).unwrap();
/// assert_eq!(spec.data.as_1d().unwrap().to_vec(), vec![7.0, 6.0]);
/// ```
pub fn hilberthuang<S1, S2, D1, D2>(
    frequency: &ArrayBase<S1, D1>,
    amplitude: &ArrayBase<S2, D2>,
    bins: &HistBins,
    options: &HilbertHuangOptions,
) -> Result<HilbertHuangSpectrum>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D1: Dimension,
    D2: Dimension,
{
    let freq = time_by_component(frequency, "hilberthuang IF")?;
    let amp = time_by_component(amplitude, "hilberthuang IA")?;
    if freq.dim() != amp.dim() {
        return Err(EmdError::shape(
            "hilberthuang IA",
            format!("same shape as IF {:?}", freq.shape()),
            amp.shape(),
        ));
    }

    let (n_time, n_comp) = freq.dim();
    let n_freq = bins.nbins();
    debug!(
        n_time,
        n_comp,
        n_freq,
        mode = ?options.mode,
        sum_time = options.sum_time,
        sum_imfs = options.sum_imfs,
        "computing Hilbert-Huang spectrum"
    );

    let located: Vec<Vec<Option<usize>>> = (0..n_comp)
        .into_par_iter()
        .map(|c| locate_column(bins, &freq, c))
        .collect();

    let mode = options.mode;
    let (data, dropped) = match (options.sum_time, options.sum_imfs) {
        (true, true) => {
            let mut out = Array1::zeros(n_freq);
            let dropped = for_each_hit(&located, &amp, mode, |b, _, _, w| out[b] += w);
            (SpectrumData::Frequency(out), dropped)
        }
        (true, false) => {
            let mut out = Array2::zeros((n_freq, n_comp));
            let dropped = for_each_hit(&located, &amp, mode, |b, _, c, w| out[[b, c]] += w);
            (SpectrumData::FrequencyImf(out), dropped)
        }
        (false, true) => {
            let mut out = Array2::zeros((n_freq, n_time));
            let dropped = for_each_hit(&located, &amp, mode, |b, t, _, w| out[[b, t]] += w);
            (SpectrumData::FrequencyTime(out), dropped)
        }
        (false, false) => {
            let mut out = Array3::zeros((n_freq, n_time, n_comp));
            let dropped = for_each_hit(&located, &amp, mode, |b, t, c, w| out[[b, t, c]] += w);
            (SpectrumData::FrequencyTimeImf(out), dropped)
        }
    };

    if dropped > 0 {
        trace!(dropped, total = n_time * n_comp, "samples outside frequency edges dropped");
    }

    Ok(HilbertHuangSpectrum {
        bins: bins.clone(),
        mode,
        data,
        dropped,
    })
}

/// Compute the Holospectrum.
///
/// - `carrier_frequency`: first-layer IF, `(time × component)`.
/// - `am_frequency`, `am_amplitude`: second-layer IF and IA,
///   `(time × component × second-layer component)`.
///
/// Second-layer sample `(t, c, k)` is binned by carrier frequency
/// `carrier_frequency[(t, c)]` on the first axis and by its own IF on the
/// second axis, contributing the weighted `am_amplitude[(t, c, k)]`. The
/// `(time, component)` index is the only link between the layers.
///
/// # Errors
///
/// [`EmdError::Shape`] if the time or component axes of the layers
/// disagree, or if the second-layer arrays differ in shape.
pub fn holospectrum<S1, S2, S3>(
    carrier_frequency: &ArrayBase<S1, Ix2>,
    am_frequency: &ArrayBase<S2, Ix3>,
    am_amplitude: &ArrayBase<S3, Ix3>,
    carrier_bins: &HistBins,
    am_bins: &HistBins,
    options: &HolospectrumOptions,
) -> Result<Holospectrum>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    S3: Data<Elem = f64>,
{
    let (n_time, n_comp) = carrier_frequency.dim();
    let (t2, c2, n_layer) = am_frequency.dim();
    if (t2, c2) != (n_time, n_comp) {
        return Err(EmdError::shape(
            "holospectrum second-layer IF",
            format!("({n_time}, {n_comp}, _) to match first-layer IF"),
            am_frequency.shape(),
        ));
    }
    if am_amplitude.dim() != am_frequency.dim() {
        return Err(EmdError::shape(
            "holospectrum second-layer IA",
            format!("same shape as second-layer IF {:?}", am_frequency.shape()),
            am_amplitude.shape(),
        ));
    }

    let n_carrier = carrier_bins.nbins();
    let n_am = am_bins.nbins();
    debug!(
        n_time,
        n_comp,
        n_layer,
        n_carrier,
        n_am,
        mode = ?options.mode,
        sum_time = options.sum_time,
        "computing Holospectrum"
    );

    let carrier = carrier_frequency.view();
    let am_freq: ArrayView3<f64> = am_frequency.view();

    // (carrier bin per time, am bins per (time, layer)) for every component
    let located: Vec<(Vec<Option<usize>>, Vec<Vec<Option<usize>>>)> = (0..n_comp)
        .into_par_iter()
        .map(|c| {
            let carrier_idx = locate_column(carrier_bins, &carrier, c);
            let am_idx = (0..n_layer)
                .map(|k| {
                    am_freq
                        .slice(s![.., c, k])
                        .iter()
                        .map(|&f| am_bins.locate(f))
                        .collect()
                })
                .collect();
            (carrier_idx, am_idx)
        })
        .collect();

    let mode = options.mode;
    let data = if options.sum_time {
        let mut out = Array2::zeros((n_carrier, n_am));
        for (c, (carrier_idx, am_idx)) in located.iter().enumerate() {
            for (t, cb) in carrier_idx.iter().enumerate() {
                let Some(cb) = cb else { continue };
                for (k, layer) in am_idx.iter().enumerate() {
                    if let Some(ab) = layer[t] {
                        out[[*cb, ab]] += mode.weight(am_amplitude[[t, c, k]]);
                    }
                }
            }
        }
        HoloData::CarrierAm(out)
    } else {
        let mut out = Array3::zeros((n_carrier, n_am, n_time));
        for (c, (carrier_idx, am_idx)) in located.iter().enumerate() {
            for (t, cb) in carrier_idx.iter().enumerate() {
                let Some(cb) = cb else { continue };
                for (k, layer) in am_idx.iter().enumerate() {
                    if let Some(ab) = layer[t] {
                        out[[*cb, ab, t]] += mode.weight(am_amplitude[[t, c, k]]);
                    }
                }
            }
        }
        HoloData::CarrierAmTime(out)
    };

    Ok(Holospectrum {
        carrier_bins: carrier_bins.clone(),
        am_bins: am_bins.clone(),
        mode,
        data,
    })
}

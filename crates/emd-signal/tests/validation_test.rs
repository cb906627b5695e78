//! Validation tests to prove correctness of spectral and cycle analysis
//!
//! These tests compare our implementations against known mathematical results

use approx::{assert_abs_diff_eq, assert_relative_eq};
use ndarray::{s, Array1, Array2, Axis};
use std::f64::consts::{PI, TAU};
use emd_signal::{
    bin_by_phase, count_cycles, define_hist_bins, define_hist_bins_from_data, freq_from_phase,
    frequency_transform, frequency_transform_layered, get_control_points, get_cycle_stat,
    get_cycle_vector, hilberthuang, holospectrum, phase_align, phase_from_freq, BinSpacing,
    CycleConfig, CycleStat, EmdConfig, HilbertHuangOptions, HolospectrumOptions, PhaseConvention,
    SpectrumMode, TransformMethod,
};

const METHODS: [TransformMethod; 3] = [
    TransformMethod::Hilbert,
    TransformMethod::NormalizedHilbert,
    TransformMethod::DirectQuadrature,
];

/// `n` samples of `amp * sin(2π f t)`, one column
fn sine(n: usize, sample_rate: f64, freq: f64, amp: f64) -> Array2<f64> {
    Array2::from_shape_fn((n, 1), |(t, _)| {
        amp * (2.0 * PI * freq * t as f64 / sample_rate).sin()
    })
}

/// Deterministic values in `[0, 1)`
fn lcg(n: usize, seed: u64) -> Vec<f64> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 11) as f64 / (1u64 << 53) as f64
        })
        .collect()
}

/// Validate IF and IA of a pure sinusoid for every transform method
#[test]
fn validate_sinusoid_frequency_and_amplitude() {
    let sample_rate = 1000.0;
    let imf = sine(1000, sample_rate, 10.0, 2.0);

    for method in METHODS {
        let stats = frequency_transform(&imf, sample_rate, method).unwrap();
        let mean_if = stats.frequency.slice(s![100..900, 0]).mean().unwrap();
        let mean_ia = stats.amplitude.slice(s![100..900, 0]).mean().unwrap();

        println!("{method}: mean IF {mean_if:.4} Hz, mean IA {mean_ia:.4}");
        assert_abs_diff_eq!(mean_if, 10.0, epsilon = 0.1);
        assert_abs_diff_eq!(mean_ia, 2.0, epsilon = 0.05);
    }
}

/// Validate that IF and phase are approximate inverses
#[test]
fn validate_phase_frequency_round_trip() {
    let sample_rate = 256.0;
    let freq = Array2::from_elem((512, 2), 8.0);
    let phase = phase_from_freq(&freq, sample_rate, -PI).unwrap();
    let back = freq_from_phase(&phase, sample_rate).unwrap();
    for &f in back.iter() {
        assert_abs_diff_eq!(f, 8.0, epsilon = 1e-9);
    }
}

/// Validate amplitude and power conservation in the Hilbert-Huang spectrum
#[test]
fn validate_spectrum_conservation() {
    let n = 5000;
    let freq = Array2::from_shape_vec((n, 2), lcg(2 * n, 7).iter().map(|u| 1.0 + 48.0 * u).collect())
        .unwrap();
    let amp = Array2::from_shape_vec((n, 2), lcg(2 * n, 11).iter().map(|u| 0.5 + u).collect())
        .unwrap();
    let bins = define_hist_bins(0.0, 50.0, 25, BinSpacing::Linear).unwrap();

    for (mode, expected) in [
        (SpectrumMode::Amplitude, amp.sum()),
        (SpectrumMode::Power, amp.mapv(|a| a * a).sum()),
    ] {
        for (sum_time, sum_imfs) in [(true, true), (true, false), (false, true), (false, false)] {
            let options = HilbertHuangOptions {
                mode,
                sum_time,
                sum_imfs,
            };
            let spec = hilberthuang(&freq, &amp, &bins, &options).unwrap();
            assert_eq!(spec.dropped, 0);
            assert_relative_eq!(spec.data.sum(), expected, max_relative = 1e-12);
        }
    }
}

/// Validate exact bin membership for integer frequencies
#[test]
fn validate_spectrum_bin_counts() {
    let freq = Array1::linspace(0.0, 12.0, 13).insert_axis(Axis(1));
    let amp = Array2::<f64>::ones((13, 1));
    let bins = define_hist_bins(0.0, 13.0, 2, BinSpacing::Linear).unwrap();
    let options = HilbertHuangOptions {
        mode: SpectrumMode::Amplitude,
        sum_time: false,
        sum_imfs: true,
    };

    let spec = hilberthuang(&freq, &amp, &bins, &options).unwrap();
    let hht = spec.data.as_2d().unwrap();
    assert_eq!(hht.row(0).slice(s![..7]).sum(), 7.0);
    assert_eq!(hht.row(1).slice(s![7..]).sum(), 6.0);
    assert_eq!(hht.sum(), 13.0);
}

/// Validate bin definitions against closed-form edges and centres
#[test]
fn validate_bin_definitions() {
    let bins = define_hist_bins(0.0, 1.0, 5, BinSpacing::Linear).unwrap();
    for (edge, expected) in bins.edges.iter().zip([0.0, 0.2, 0.4, 0.6, 0.8, 1.0]) {
        assert_abs_diff_eq!(*edge, expected, epsilon = 1e-12);
    }
    for (centre, expected) in bins.centres.iter().zip([0.1, 0.3, 0.5, 0.7, 0.9]) {
        assert_abs_diff_eq!(*centre, expected, epsilon = 1e-12);
    }

    let data = Array1::linspace(0.0, 1.0, 16);
    let bins = define_hist_bins_from_data(&data, None, 0.0, BinSpacing::Linear).unwrap();
    for (edge, expected) in bins.edges.iter().zip([0.0, 0.25, 0.5, 0.75, 1.0]) {
        assert_abs_diff_eq!(*edge, expected, epsilon = 1e-12);
    }
    for (centre, expected) in bins.centres.iter().zip([0.125, 0.375, 0.625, 0.875]) {
        assert_abs_diff_eq!(*centre, expected, epsilon = 1e-12);
    }
}

/// Validate the Holospectrum of an amplitude-modulated carrier
#[test]
fn validate_holospectrum_of_am_signal() {
    let sample_rate = 1000.0;
    let n = 4000;
    // 40 Hz carrier with a 2 Hz envelope
    let imf = Array2::from_shape_fn((n, 1), |(t, _)| {
        let time = t as f64 / sample_rate;
        (2.0 + (2.0 * PI * 2.0 * time).sin()) * (2.0 * PI * 40.0 * time).sin()
    });
    let first = frequency_transform(&imf, sample_rate, TransformMethod::NormalizedHilbert).unwrap();

    // Treat the demeaned envelope as a single second-layer component
    let mean_ia = first.amplitude.mean().unwrap();
    let envelope = (&first.amplitude - mean_ia).insert_axis(Axis(2));
    let second =
        frequency_transform_layered(&envelope, sample_rate, TransformMethod::Hilbert).unwrap();

    let carrier_bins = define_hist_bins(30.0, 50.0, 10, BinSpacing::Linear).unwrap();
    let am_bins = define_hist_bins(1.0, 3.0, 4, BinSpacing::Linear).unwrap();
    let options = HolospectrumOptions {
        mode: SpectrumMode::Amplitude,
        sum_time: true,
    };
    let holo = holospectrum(
        &first.frequency,
        &second.frequency,
        &second.amplitude,
        &carrier_bins,
        &am_bins,
        &options,
    )
    .unwrap();
    assert_eq!(holo.data.shape(), &[10, 4]);

    let data = holo.data.time_summed();
    let ((ci, ai), _) = data
        .indexed_iter()
        .fold(((0, 0), f64::NEG_INFINITY), |best, (idx, &v)| if v > best.1 { (idx, v) } else { best });
    println!("Holospectrum peak at carrier {} Hz, AM {} Hz", carrier_bins.centres[ci], am_bins.centres[ai]);
    assert_abs_diff_eq!(carrier_bins.centres[ci], 40.0, epsilon = 1.5);
    assert_abs_diff_eq!(am_bins.centres[ai], 2.0, epsilon = 0.5);

    let resolved = holospectrum(
        &first.frequency,
        &second.frequency,
        &second.amplitude,
        &carrier_bins,
        &am_bins,
        &HolospectrumOptions {
            sum_time: false,
            ..options
        },
    )
    .unwrap();
    assert_eq!(resolved.data.shape(), &[10, 4, n]);
    assert_relative_eq!(resolved.data.sum(), holo.data.sum(), max_relative = 1e-9);
}

/// Validate cycle counts and control points on a clean oscillation
#[test]
fn validate_cycle_detection() {
    let sample_rate = 400.0;
    let imf = sine(2000, sample_rate, 10.0, 1.0);
    let stats = frequency_transform(&imf, sample_rate, TransformMethod::NormalizedHilbert).unwrap();

    let all = get_cycle_vector(
        &stats.phase,
        None,
        &CycleConfig::builder().return_good(false).build(),
    )
    .unwrap();
    let good = get_cycle_vector(&stats.phase, Some(imf.view()), &CycleConfig::default()).unwrap();
    let again = get_cycle_vector(&stats.phase, Some(imf.view()), &CycleConfig::default()).unwrap();

    // 50 periods; every reset opens a cycle, including the one ending the trace
    let n_all = count_cycles(&all)[0];
    let n_good = count_cycles(&good)[0];
    println!("cycles: {n_all} detected, {n_good} good");
    assert!((48..=51).contains(&n_all));
    assert_ne!(all[[1999, 0]], 0);
    assert!(n_good <= n_all);
    assert!(n_good >= n_all - 2);
    assert_eq!(good, again);

    let ctrl = get_control_points(&imf.column(0), &good.column(0)).unwrap();
    assert_eq!(ctrl.len(), n_good);
    assert!(ctrl.iter().all(|cp| cp.is_complete()));

    let lengths = get_cycle_stat(&good.column(0), &imf.column(0), CycleStat::Len).unwrap();
    for &len in lengths.iter() {
        assert_abs_diff_eq!(len, 40.0, epsilon = 1.0);
    }
}

/// Validate phase-resolved averaging recovers the waveform shape
#[test]
fn validate_phase_binned_waveform() {
    let sample_rate = 1000.0;
    let imf = sine(4000, sample_rate, 8.0, 3.0);
    let stats = frequency_transform(&imf, sample_rate, TransformMethod::Hilbert).unwrap();

    let binned = bin_by_phase(&stats.phase.column(0), &imf, 24, PhaseConvention::ZeroToTwoPi).unwrap();
    for (bin, &centre) in binned.centres.iter().enumerate() {
        assert_abs_diff_eq!(binned.mean[[bin, 0]], 3.0 * centre.sin(), epsilon = 0.1);
    }
    assert_eq!(binned.counts.sum(), 4000);

    let cycles = get_cycle_vector(&stats.phase, None, &CycleConfig::default()).unwrap();
    let aligned = phase_align(&stats.phase.column(0), &imf.column(0), &cycles.column(0), 33).unwrap();
    let grid = Array1::linspace(0.0, TAU, 33);
    for c in 0..aligned.ncols() {
        for i in 1..32 {
            assert_abs_diff_eq!(aligned[[i, c]], 3.0 * grid[i].sin(), epsilon = 0.05);
        }
    }
}

/// Validate a configuration file drives a complete analysis
#[test]
fn validate_config_driven_pipeline() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("analysis.json");
    EmdConfig::builder()
        .sample_rate(200.0)
        .method(TransformMethod::DirectQuadrature)
        .build()
        .to_json(&path)
        .unwrap();

    let cfg = EmdConfig::from_json(&path).unwrap();
    let imf = sine(800, cfg.transform.sample_rate, 5.0, 1.0);
    let stats = frequency_transform(&imf, cfg.transform.sample_rate, cfg.transform.method).unwrap();
    let bins = cfg.carrier_hist.bins().unwrap();
    let spec = hilberthuang(
        &stats.frequency,
        &stats.amplitude,
        &bins,
        &HilbertHuangOptions::default(),
    )
    .unwrap();
    let marginal = spec.data.marginal();
    let peak = marginal
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
        .0;
    let peak_freq = spec.frequencies()[peak];
    println!("marginal peak at {peak_freq:.2} Hz");
    assert!(peak_freq > 4.0 && peak_freq < 6.0);
}

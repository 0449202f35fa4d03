// SPDX-License-Identifier: AGPL-3.0-only

//! Integration tests: lattice engine end-to-end.
//!
//! These exercise the public API across module boundaries: configuration
//! into runtime, runtime into observables, observables into statistics.

use su3_lattice::config::{RuntimeSpec, StartMode, UpdateConfig, UpdateOptions};
use su3_lattice::error::LatticeError;
use su3_lattice::lattice::checkerboard::checkerboard_sweep_cpu;
use su3_lattice::lattice::gauge::{Axis, GaugeLattice, LatticeDims};
use su3_lattice::lattice::observables::{
    apply_gauge_transform, average_plaquette, creutz_jackknife, measure_polyakov_loop,
    measure_wilson_loop_grid, measure_wilson_rectangle, Plane, WilsonLoopTable,
};
use su3_lattice::lattice::rng::Mulberry32;
use su3_lattice::lattice::runtime::{initialize_qcd_runtime, run_ensemble, ScanSchedule};
use su3_lattice::lattice::stats::{bin_samples, jackknife, RunningEstimate};
use su3_lattice::lattice::su3::Su3;
use su3_lattice::lattice::update::{apply_ape_smear, initialize_gauge_field, run_wilson_cpu_update};
use su3_lattice::tolerances;

const XY: Plane = Plane::new(Axis::X, Axis::Y);

fn hot(dims: LatticeDims, seed: u32) -> GaugeLattice {
    let mut l = GaugeLattice::new(dims).expect("lattice");
    initialize_gauge_field(&mut l, StartMode::Hot, &mut Mulberry32::new(seed));
    l
}

fn assert_identity_observables(dims: LatticeDims) {
    let l = GaugeLattice::new(dims).expect("lattice");
    let table = measure_wilson_loop_grid(&l, 3, 2, &[]).expect("grid");
    for e in table.entries() {
        assert!(
            (e.value - 1.0).abs() < tolerances::IDENTITY_OBSERVABLE_ABS,
            "{dims:?} W({},{}) in {:?} = {}",
            e.extent_x,
            e.extent_y,
            e.plane,
            e.value
        );
    }
    for plane in Plane::all_active(&l) {
        let w = measure_wilson_rectangle(&l, 2, 3, plane).expect("rectangle");
        assert!(w.normalized.im.abs() < tolerances::IDENTITY_OBSERVABLE_ABS);
    }
    for &axis in l.axes() {
        let p = measure_polyakov_loop(&l, axis).expect("polyakov");
        assert!((p.average.re - 1.0).abs() < tolerances::IDENTITY_OBSERVABLE_ABS);
        assert!(p.average.im.abs() < tolerances::IDENTITY_OBSERVABLE_ABS);
        assert!((p.magnitude - 1.0).abs() < tolerances::IDENTITY_OBSERVABLE_ABS);
    }
}

#[test]
fn identity_lattice_observables_2d() {
    assert_identity_observables(LatticeDims::plane(5, 4));
}

#[test]
fn identity_lattice_observables_2_plus_1d() {
    assert_identity_observables(LatticeDims::plane(4, 4).with_temporal_extent(3));
}

#[test]
fn identity_lattice_observables_3_plus_1d() {
    assert_identity_observables(LatticeDims::plane(3, 3).with_depth(2).with_temporal_extent(4));
}

#[test]
fn wilson_loops_are_gauge_invariant() {
    let mut l = hot(LatticeDims::plane(4, 4).with_temporal_extent(4), 31);
    let before = measure_wilson_loop_grid(&l, 2, 2, &[]).expect("grid");

    let mut rng = Mulberry32::new(77);
    let g: Vec<Su3> = (0..l.volume())
        .map(|_| Su3::haar_random(1.0, &mut rng))
        .collect();
    apply_gauge_transform(&mut l, &g).expect("transform");
    let after = measure_wilson_loop_grid(&l, 2, 2, &[]).expect("grid");

    assert_eq!(before.len(), after.len());
    for e in before.entries() {
        let v = after.value(e.extent_x, e.extent_y, e.plane).expect("same keys");
        assert!(
            (v - e.value).abs() < tolerances::GAUGE_INVARIANCE_ABS,
            "W({},{}) {:?}: {} vs {}",
            e.extent_x,
            e.extent_y,
            e.plane,
            e.value,
            v
        );
    }
    let p_before = average_plaquette(&hot(LatticeDims::plane(4, 4).with_temporal_extent(4), 31));
    assert!((average_plaquette(&l) - p_before).abs() < tolerances::GAUGE_INVARIANCE_ABS);
}

fn scenario_spec() -> RuntimeSpec {
    RuntimeSpec {
        lattice: LatticeDims::plane(6, 6),
        update: UpdateOptions {
            beta_schedule: vec![1.65],
            sweeps_per_beta: Some(4.0),
            thermalization_sweeps: Some(4.0),
            over_relaxation_steps: Some(1.0),
            ..UpdateOptions::default()
        },
        start_mode: Some(StartMode::Hot),
        max_loop_extent: Some(2.0),
        ..RuntimeSpec::default()
    }
}

fn scenario_tables() -> Vec<WilsonLoopTable> {
    let seeds: Vec<u32> = (9000..9008).collect();
    run_ensemble(&scenario_spec(), &seeds)
        .expect("ensemble")
        .into_iter()
        .map(|r| r.wilson)
        .collect()
}

#[test]
fn thermalized_ensemble_shows_area_law() {
    let tables = scenario_tables();
    assert_eq!(tables.len(), 8);
    let mean = WilsonLoopTable::mean(&tables);
    let w11 = mean.value(1, 1, XY).expect("W11");
    let w12 = mean.value(1, 2, XY).expect("W12");
    let w22 = mean.value(2, 2, XY).expect("W22");
    assert!(w11 > w12, "W11 = {w11}, W12 = {w12}");
    assert!(w12 > w22, "W12 = {w12}, W22 = {w22}");
    assert!(w11 < 1.0 && w22 > -1.0);
}

#[test]
fn creutz_ratios_agree_within_errors() {
    let tables = scenario_tables();
    let chi1 = creutz_jackknife(&tables, 2, 1, 1, XY).expect("χ11");
    let chi2 = creutz_jackknife(&tables, 2, 2, 2, XY).expect("χ22");
    assert!(chi1.estimate.is_finite() && chi2.estimate.is_finite());
    let gap = (chi2.estimate - chi1.estimate).abs();
    let allowed =
        chi1.standard_error + chi2.standard_error + tolerances::CREUTZ_CONSISTENCY_SLACK;
    assert!(
        gap <= allowed,
        "χ11 = {chi1:?}, χ22 = {chi2:?}, gap {gap} > {allowed}"
    );
    // A zero or doubled χ22 would sit farther than `allowed` from χ11.
    assert!(
        allowed < chi1.estimate,
        "bound {allowed} does not resolve χ11 = {chi1:?}"
    );
}

#[test]
fn ensemble_is_reproducible() {
    let spec = scenario_spec();
    let a = run_ensemble(&spec, &[9000, 9001]).expect("ensemble");
    let b = run_ensemble(&spec, &[9000, 9001]).expect("ensemble");
    assert_eq!(a, b);
    assert_ne!(a[0].wilson, a[1].wilson);
}

fn scan_spec() -> RuntimeSpec {
    RuntimeSpec {
        lattice: LatticeDims::plane(4, 4).with_temporal_extent(4),
        update: UpdateOptions {
            beta_schedule: vec![2.0],
            sweeps_per_beta: Some(1.0),
            thermalization_sweeps: Some(1.0),
            scan_sweeps: Some(2.0),
            ..UpdateOptions::default()
        },
        base_seed: Some(5.0),
        start_mode: Some(StartMode::Hot),
        ..RuntimeSpec::default()
    }
}

#[test]
fn temperature_scan_leaves_lattice_untouched() {
    let mut rt = initialize_qcd_runtime(&scan_spec()).expect("runtime");
    rt.advance().expect("advance");
    let before: Vec<u64> = rt.lattice().as_slice().iter().map(|x| x.to_bits()).collect();

    let points = rt
        .run_temperature_scan(&ScanSchedule::Temperature(vec![0.25, 0.5, 1.0]), Axis::T)
        .expect("scan");
    assert_eq!(points.len(), 3);
    for (p, beta) in points.iter().zip([4.0, 2.0, 1.0]) {
        assert!((p.beta - beta).abs() < 1e-15);
        assert_eq!(p.extent, 4);
        assert_eq!(p.sample_count, 16);
        assert!((0.0..=1.0 + 1e-12).contains(&p.magnitude));
    }

    let after: Vec<u64> = rt.lattice().as_slice().iter().map(|x| x.to_bits()).collect();
    assert_eq!(before, after);
}

#[test]
fn empty_scan_leaves_lattice_untouched() {
    let mut rt = initialize_qcd_runtime(&scan_spec()).expect("runtime");
    let before = rt.lattice().clone();
    let points = rt
        .run_temperature_scan(&ScanSchedule::Beta(Vec::new()), Axis::T)
        .expect("scan");
    assert!(points.is_empty());
    assert_eq!(rt.lattice().as_slice(), before.as_slice());
}

#[test]
fn scan_on_inactive_axis_errors() {
    let mut spec = scan_spec();
    spec.lattice = LatticeDims::plane(4, 4);
    let mut rt = initialize_qcd_runtime(&spec).expect("runtime");
    let err = rt
        .run_temperature_scan(&ScanSchedule::Beta(vec![1.0]), Axis::T)
        .unwrap_err();
    assert!(matches!(err, LatticeError::InactiveAxis(Axis::T)));
}

#[test]
fn jackknife_rejects_single_sample() {
    let err = jackknife(&[0.5], |s: &[f64]| s[0]).unwrap_err();
    assert!(matches!(
        err,
        LatticeError::InsufficientSamples { required: 2, got: 1 }
    ));
}

#[test]
fn running_estimate_matches_two_pass() {
    let xs: Vec<f64> = (0..37).map(|i| ((i * 7919) % 101) as f64 / 13.0 - 2.0).collect();
    let mut est = RunningEstimate::new();
    for &x in &xs {
        est.push(x);
    }
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let snap = est.snapshot();
    assert_eq!(snap.count, xs.len());
    assert!((snap.mean - mean).abs() < tolerances::RUNNING_ESTIMATE_ABS);
    assert!((snap.standard_deviation - var.sqrt()).abs() < tolerances::RUNNING_ESTIMATE_ABS);
    assert!((snap.standard_error - (var / n).sqrt()).abs() < tolerances::RUNNING_ESTIMATE_ABS);
}

#[test]
fn binned_plaquettes_feed_jackknife() {
    let mut l = hot(LatticeDims::plane(4, 4), 3);
    let config = UpdateConfig {
        beta_schedule: vec![2.0; 6],
        sweeps_per_beta: 1,
        thermalization_sweeps: 2,
        seed: 11,
        ..UpdateConfig::default()
    };
    let summary = run_wilson_cpu_update(&mut l, &config).expect("update");
    let bins = bin_samples(&summary.plaquette_history, 2);
    assert_eq!(bins.len(), 3);
    let est = jackknife(&bins, |s: &[f64]| s.iter().sum::<f64>() / s.len() as f64)
        .expect("jackknife");
    let plain = summary.plaquette_history.iter().sum::<f64>() / 6.0;
    assert!((est.estimate - plain).abs() < 1e-12);
    assert!(est.standard_error >= 0.0);
}

#[test]
fn ape_smearing_keeps_identity_and_su3() {
    let mut cold = GaugeLattice::new(LatticeDims::plane(4, 4).with_temporal_extent(2)).expect("lattice");
    let reference = cold.clone();
    apply_ape_smear(&mut cold, 0.5, 3);
    for (a, b) in cold.as_slice().iter().zip(reference.as_slice()) {
        assert!((a - b).abs() < tolerances::IDENTITY_OBSERVABLE_ABS);
    }

    let mut l = hot(LatticeDims::plane(4, 4).with_temporal_extent(2), 19);
    let rough = average_plaquette(&l);
    apply_ape_smear(&mut l, 0.5, 2);
    assert!(average_plaquette(&l) > rough);
    for site in 0..l.volume() {
        for mu in 0..l.n_axes() {
            let u = l.link_at(site, mu);
            assert!(u.unitarity_defect() < tolerances::UNITARITY_DEFECT_MAX);
            assert!((u.det().re - 1.0).abs() < tolerances::DETERMINANT_ABS);
        }
    }
}

#[test]
fn cpu_checkerboard_is_deterministic() {
    let dims = LatticeDims::plane(4, 4).with_temporal_extent(4);
    let mut a = hot(dims, 8);
    let mut b = hot(dims, 8);
    for sweep in 0..2 {
        checkerboard_sweep_cpu(&mut a, 2.5, 404, sweep, 1);
        checkerboard_sweep_cpu(&mut b, 2.5, 404, sweep, 1);
    }
    assert_eq!(a, b);

    let mut c = hot(dims, 8);
    checkerboard_sweep_cpu(&mut c, 2.5, 405, 0, 1);
    assert_ne!(c.as_slice(), hot(dims, 8).as_slice());
}

#[test]
fn runtime_spec_json_drives_runtime() {
    let json = r#"{
        "lattice": {"width": 4, "height": 4, "temporalExtent": 2},
        "update": {"betaSchedule": [1.0, "bad", 2.0], "sweepsPerBeta": -3, "seed": 42},
        "baseSeed": 7,
        "startMode": "hot"
    }"#;
    // Non-numeric schedule entries are a parse error, not a fallback.
    assert!(matches!(
        RuntimeSpec::from_json_str(json),
        Err(LatticeError::Config(_))
    ));

    let json = r#"{
        "lattice": {"width": 4, "height": 4, "temporalExtent": 2},
        "update": {"betaSchedule": [1.0, 2.0], "sweepsPerBeta": -3, "seed": 42},
        "baseSeed": 7,
        "startMode": "hot"
    }"#;
    let spec = RuntimeSpec::from_json_str(json).expect("spec");
    assert_eq!(spec.base_seed(), 7);
    assert_eq!(spec.start_mode(), StartMode::Hot);
    let config = spec.update.resolve();
    assert_eq!(config.seed, 42);
    assert_eq!(config.sweeps_per_beta, UpdateConfig::default().sweeps_per_beta);

    let mut rt = initialize_qcd_runtime(&spec).expect("runtime");
    assert_eq!(rt.lattice().axes(), &[Axis::X, Axis::Y, Axis::T]);
    let summary = rt.advance().expect("advance");
    assert_eq!(summary.plaquette_history.len(), 2);
    assert!((summary.final_beta - 2.0).abs() < 1e-15);
}

#[test]
fn empty_schedule_is_rejected() {
    let mut l = GaugeLattice::new(LatticeDims::plane(3, 3)).expect("lattice");
    let err = run_wilson_cpu_update(&mut l, &UpdateConfig::default()).unwrap_err();
    assert!(matches!(err, LatticeError::EmptyBetaSchedule));
}

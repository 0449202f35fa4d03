// SPDX-License-Identifier: AGPL-3.0-only

//! Wilson loop validation.
//!
//! # Validation targets
//!
//! | Observable | Expected | Tolerance | Basis |
//! |-----------|----------|-----------|-------|
//! | W(I,J), P on identity links | 1 + 0i | 1e-12 | Definition |
//! | W(I,J) after random gauge rotation | unchanged | 1e-8 | Gauge invariance |
//! | Links after rotation | SU(3) | 1e-12 | Projection |
//! | W(1,1) > W(1,2) > W(2,2) | ordering | exact | Area law, strong coupling |
//! | \|χ(2,2) − χ(1,1)\| | ≤ σ₁ + σ₂ + ε | ε = 0.1 | Creutz ratio plateau |
//!
//! The ensemble scenario: 6×6, hot start, β = 1.65, 4 thermalization + 4
//! sweeps, one over-relaxation step, seeds 9000..9007, bins of two
//! configurations, jackknife over bins.

use su3_lattice::config::{RuntimeSpec, StartMode, UpdateOptions};
use su3_lattice::lattice::gauge::{Axis, GaugeLattice, LatticeDims};
use su3_lattice::lattice::observables::{
    apply_gauge_transform, creutz_jackknife, measure_polyakov_loop, measure_wilson_loop_grid,
    measure_wilson_rectangle, Plane, WilsonLoopTable,
};
use su3_lattice::lattice::rng::Mulberry32;
use su3_lattice::lattice::runtime::run_ensemble;
use su3_lattice::lattice::su3::Su3;
use su3_lattice::lattice::update::initialize_gauge_field;
use su3_lattice::tolerances;
use su3_lattice::validation::ValidationHarness;

const ENSEMBLE_SEEDS: std::ops::Range<u32> = 9000..9008;
const ENSEMBLE_BIN: usize = 2;

fn identity_checks(harness: &mut ValidationHarness, label: &str, dims: LatticeDims) {
    let lattice = match GaugeLattice::new(dims) {
        Ok(l) => l,
        Err(e) => {
            println!("  {label}: {e}");
            harness.check_bool(&format!("{label} lattice"), false);
            return;
        }
    };
    let mut worst_re = 0.0_f64;
    let mut worst_im = 0.0_f64;
    for plane in Plane::all_active(&lattice) {
        for i in 0..=2 {
            for j in 0..=2 {
                if let Ok(w) = measure_wilson_rectangle(&lattice, i, j, plane) {
                    worst_re = worst_re.max((w.value - 1.0).abs());
                    worst_im = worst_im.max(w.normalized.im.abs());
                }
            }
        }
    }
    println!("  {label}: max |W − 1| = {worst_re:.2e}, max |Im W| = {worst_im:.2e}");
    harness.check_abs(
        &format!("{label} W = 1"),
        worst_re,
        0.0,
        tolerances::IDENTITY_OBSERVABLE_ABS,
    );
    harness.check_abs(
        &format!("{label} Im W = 0"),
        worst_im,
        0.0,
        tolerances::IDENTITY_OBSERVABLE_ABS,
    );

    for &axis in lattice.axes() {
        let Ok(p) = measure_polyakov_loop(&lattice, axis) else {
            harness.check_bool(&format!("{label} P_{axis}"), false);
            continue;
        };
        harness.check_abs(
            &format!("{label} Re P_{axis}"),
            p.average.re,
            1.0,
            tolerances::IDENTITY_OBSERVABLE_ABS,
        );
        harness.check_abs(
            &format!("{label} |P_{axis}|"),
            p.magnitude,
            1.0,
            tolerances::IDENTITY_OBSERVABLE_ABS,
        );
    }
}

fn gauge_invariance_checks(harness: &mut ValidationHarness) {
    let dims = LatticeDims::plane(4, 4).with_temporal_extent(4);
    let Ok(mut lattice) = GaugeLattice::new(dims) else {
        harness.check_bool("gauge lattice", false);
        return;
    };
    initialize_gauge_field(&mut lattice, StartMode::Hot, &mut Mulberry32::new(2024));
    let before = measure_wilson_loop_grid(&lattice, 2, 2, &[]);

    let mut rng = Mulberry32::new(4202);
    let transforms: Vec<Su3> = (0..lattice.volume())
        .map(|_| Su3::haar_random(1.0, &mut rng))
        .collect();
    let rotated = apply_gauge_transform(&mut lattice, &transforms);
    let after = measure_wilson_loop_grid(&lattice, 2, 2, &[]);

    let (Ok(before), Ok(()), Ok(after)) = (before, rotated, after) else {
        harness.check_bool("gauge transform applied", false);
        return;
    };
    let max_diff = max_table_difference(&before, &after);
    println!("  max |ΔW| = {max_diff:.2e} over {} loops", before.len());
    harness.check_upper(
        "gauge invariance max |ΔW|",
        max_diff,
        tolerances::GAUGE_INVARIANCE_ABS,
    );

    let mut worst_unitarity = 0.0_f64;
    let mut worst_det = 0.0_f64;
    for site in 0..lattice.volume() {
        for mu in 0..lattice.n_axes() {
            let u = lattice.link_at(site, mu);
            worst_unitarity = worst_unitarity.max(u.unitarity_defect());
            let det = u.det();
            worst_det = worst_det.max((det.re - 1.0).abs().max(det.im.abs()));
        }
    }
    harness.check_upper(
        "rotated links unitary",
        worst_unitarity,
        tolerances::UNITARITY_DEFECT_MAX,
    );
    harness.check_upper(
        "rotated links det = 1",
        worst_det,
        tolerances::DETERMINANT_ABS,
    );
}

fn max_table_difference(a: &WilsonLoopTable, b: &WilsonLoopTable) -> f64 {
    a.entries()
        .map(|e| match b.value(e.extent_x, e.extent_y, e.plane) {
            Some(v) => (v - e.value).abs(),
            None => f64::INFINITY,
        })
        .fold(0.0, f64::max)
}

fn ensemble_spec() -> RuntimeSpec {
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

fn ensemble_checks(harness: &mut ValidationHarness) {
    let seeds: Vec<u32> = ENSEMBLE_SEEDS.collect();
    let replicas = match run_ensemble(&ensemble_spec(), &seeds) {
        Ok(r) => r,
        Err(e) => {
            println!("  ensemble failed: {e}");
            harness.check_bool("ensemble ran", false);
            return;
        }
    };
    let xy = Plane::new(Axis::X, Axis::Y);
    let tables: Vec<WilsonLoopTable> = replicas.iter().map(|r| r.wilson.clone()).collect();
    for r in &replicas {
        let w = |i, j| r.wilson.value(i, j, xy).unwrap_or(f64::NAN);
        println!(
            "  seed {}: W11 = {:.4}  W12 = {:.4}  W22 = {:.4}",
            r.seed,
            w(1, 1),
            w(1, 2),
            w(2, 2)
        );
    }

    let mean = WilsonLoopTable::mean(&tables);
    let w = |i, j| mean.value(i, j, xy).unwrap_or(f64::NAN);
    let (w11, w12, w22) = (w(1, 1), w(1, 2), w(2, 2));
    println!("  ⟨W11⟩ = {w11:.4}  ⟨W12⟩ = {w12:.4}  ⟨W22⟩ = {w22:.4}");
    harness.check_bool("area law W11 > W12", w11 > w12);
    harness.check_bool("area law W12 > W22", w12 > w22);

    let chi = (
        creutz_jackknife(&tables, ENSEMBLE_BIN, 1, 1, xy),
        creutz_jackknife(&tables, ENSEMBLE_BIN, 2, 2, xy),
    );
    let (Ok(chi1), Ok(chi2)) = chi else {
        harness.check_bool("Creutz jackknife", false);
        return;
    };
    println!(
        "  χ(1,1) = {:.4} ± {:.4}   χ(2,2) = {:.4} ± {:.4}",
        chi1.estimate, chi1.standard_error, chi2.estimate, chi2.standard_error
    );
    harness.check_upper(
        "Creutz |χ22 − χ11| − σ11 − σ22",
        (chi2.estimate - chi1.estimate).abs() - chi1.standard_error - chi2.standard_error,
        tolerances::CREUTZ_CONSISTENCY_SLACK,
    );
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  SU(3) Wilson loop validation                                ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let mut harness = ValidationHarness::new("validate_wilson_loops");

    println!("═══ Identity links ═══");
    identity_checks(&mut harness, "2D", LatticeDims::plane(4, 4));
    identity_checks(
        &mut harness,
        "2+1D",
        LatticeDims::plane(4, 4).with_temporal_extent(3),
    );
    identity_checks(
        &mut harness,
        "3+1D",
        LatticeDims::plane(3, 3).with_depth(3).with_temporal_extent(4),
    );
    println!();

    println!("═══ Gauge invariance (4×4×4, hot) ═══");
    gauge_invariance_checks(&mut harness);
    println!();

    println!("═══ Ensemble 6×6, β = 1.65, seeds 9000..9007 ═══");
    ensemble_checks(&mut harness);

    harness.finish();
}

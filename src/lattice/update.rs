// SPDX-License-Identifier: AGPL-3.0-only

//! Monte Carlo update engine.
//!
//! Per run: cold/hot start, thermalization sweeps at the first coupling, then
//! for each β in the schedule a block of production sweeps, optional APE
//! smearing and one plaquette measurement.
//!
//! The link update is a smooth heatbath approximation: blend the current
//! link, the projected staple and a Haar sample with `tanh`-scaled weights,
//! project, then reflect about the staple `or_steps` times.
//!
//! # References
//!
//! - Creutz, PRD 21, 2308 (1980): heatbath
//! - Adler, PRD 23, 2901 (1981): over-relaxation
//! - Albanese et al., PLB 192, 163 (1987): APE smearing

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::constants::{HEATBATH_COUPLING_DIVISOR, HEATBATH_NOISE_SCALE, HEATBATH_STAPLE_FLOOR};
use super::gauge::{Coord, GaugeLattice};
use super::observables::average_plaquette;
use super::rng::{Mulberry32, Mulberry32Stream, UniformSource};
use super::su3::{Su3, Su3Matrix};
use crate::config::{StartMode, UpdateConfig};
use crate::error::{LatticeError, LatticeResult};

/// Result of one [`run_wilson_cpu_update`] call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSummary {
    /// Average plaquette after each β point, in schedule order.
    pub plaquette_history: Vec<f64>,
    pub total_sweeps: usize,
    pub final_beta: f64,
}

/// Number of plaquettes a link belongs to: `2·(n_axes − 1)`.
#[must_use]
pub const fn staple_multiplicity(n_axes: usize) -> usize {
    2 * n_axes.saturating_sub(1)
}

/// Sum of the paths that complete `U_mu(x)` into a plaquette.
///
/// Forward `U_ν(x)·U_μ(x+ν)·U_ν(x+μ)†` plus backward
/// `U_ν(x−ν)†·U_μ(x−ν)·U_ν(x−ν+μ)` over every active ν ≠ μ.
pub fn compute_staple(lattice: &GaugeLattice, x: Coord, mu: usize) -> Su3Matrix {
    let x_mu = lattice.shift(x, mu, 1);
    let mut staple = Su3Matrix::ZERO;
    for nu in 0..lattice.n_axes() {
        if nu == mu {
            continue;
        }
        let x_nu = lattice.shift(x, nu, 1);
        let forward = lattice.link(x, nu).matrix()
            * lattice.link(x_nu, mu).matrix()
            * lattice.link(x_mu, nu).adjoint().matrix();

        let x_mnu = lattice.shift(x, nu, -1);
        let x_mnu_mu = lattice.shift(x_mnu, mu, 1);
        let backward = lattice.link(x_mnu, nu).adjoint().matrix()
            * lattice.link(x_mnu, mu).matrix()
            * lattice.link(x_mnu_mu, nu).matrix();

        staple = staple + forward + backward;
    }
    staple
}

/// One approximate heatbath step followed by over-relaxation.
///
/// `c = tanh(β‖S‖_F / multiplicity / 12)` moves weight from the current link
/// and the Haar noise onto the projected staple `Ŝ`:
///
/// `U' = P(½(1−c)·U + (½ + ½c)·Ŝ + ½(1−c)·H)`
///
/// then `or_steps` times `U' ← P(2Ŝ − U')`. A multiplicity of 0 counts as 1.
pub fn apply_heatbath_approximation<R: UniformSource + ?Sized>(
    current: Su3,
    staple: Su3Matrix,
    beta: f64,
    rng: &mut R,
    or_steps: usize,
    multiplicity: usize,
) -> Su3 {
    let mult = multiplicity.max(1) as f64;
    let direction = Su3::project(staple).matrix();
    let c = (beta * staple.frobenius_norm() / mult / HEATBATH_COUPLING_DIVISOR).tanh();
    let c = if c.is_finite() { c.clamp(-1.0, 1.0) } else { 0.0 };

    let w_staple = HEATBATH_STAPLE_FLOOR + (1.0 - HEATBATH_STAPLE_FLOOR) * c;
    let w_current = 1.0 - w_staple;
    let w_noise = HEATBATH_NOISE_SCALE * (1.0 - c);

    let noise = Su3::haar_random(1.0, rng).matrix();
    let mut link = Su3::project(
        current.matrix().scale(w_current) + direction.scale(w_staple) + noise.scale(w_noise),
    );
    for _ in 0..or_steps {
        link = Su3::project(direction.scale(2.0) - link.matrix());
    }
    link
}

/// Update `U_mu` at one site in place.
pub(crate) fn update_link<R: UniformSource + ?Sized>(
    lattice: &mut GaugeLattice,
    x: Coord,
    mu: usize,
    beta: f64,
    rng: &mut R,
    or_steps: usize,
) {
    let staple = compute_staple(lattice, x, mu);
    let multiplicity = staple_multiplicity(lattice.n_axes());
    let next = apply_heatbath_approximation(
        lattice.link(x, mu),
        staple,
        beta,
        rng,
        or_steps,
        multiplicity,
    );
    lattice.set_link(x, mu, next);
}

/// Sequential Gauss–Seidel pass: sites in index order, axes in slot order.
pub fn perform_sweep<R: UniformSource + ?Sized>(
    lattice: &mut GaugeLattice,
    beta: f64,
    rng: &mut R,
    or_steps: usize,
) {
    for site in 0..lattice.volume() {
        let x = lattice.site_coords(site);
        for mu in 0..lattice.n_axes() {
            update_link(lattice, x, mu, beta, rng, or_steps);
        }
    }
}

/// Cold start (identity) or hot start (independent Haar links).
pub fn initialize_gauge_field<R: UniformSource + ?Sized>(
    lattice: &mut GaugeLattice,
    mode: StartMode,
    rng: &mut R,
) {
    match mode {
        StartMode::Cold => lattice.fill_identity(),
        StartMode::Hot => {
            for site in 0..lattice.volume() {
                for mu in 0..lattice.n_axes() {
                    lattice.set_link_at(site, mu, Su3::haar_random(1.0, rng));
                }
            }
        }
    }
}

/// APE smearing: `U ← P((1−α)·U + α·S/mult)`, `iterations` times.
///
/// Each iteration reads a frozen snapshot and writes a fresh arena, so the
/// result does not depend on visiting order.
pub fn apply_ape_smear(lattice: &mut GaugeLattice, alpha: f64, iterations: usize) {
    let multiplicity = staple_multiplicity(lattice.n_axes()).max(1) as f64;
    for _ in 0..iterations {
        let mut next = lattice.clone();
        for site in 0..lattice.volume() {
            let x = lattice.site_coords(site);
            for mu in 0..lattice.n_axes() {
                let staple = compute_staple(lattice, x, mu);
                let blended = lattice.link(x, mu).matrix().scale(1.0 - alpha)
                    + staple.scale(alpha / multiplicity);
                next.set_link_at(site, mu, Su3::project(blended));
            }
        }
        std::mem::swap(lattice, &mut next);
    }
}

/// Full update run: initialize from `config.seed`, thermalize, then walk the
/// β schedule.
///
/// Stream 0 of the run seed initializes the field, stream 1 drives sweeps.
///
/// # Errors
///
/// [`LatticeError::EmptyBetaSchedule`] if the schedule has no entries.
pub fn run_wilson_cpu_update(
    lattice: &mut GaugeLattice,
    config: &UpdateConfig,
) -> LatticeResult<UpdateSummary> {
    if config.beta_schedule.is_empty() {
        return Err(LatticeError::EmptyBetaSchedule);
    }
    let mut streams = Mulberry32Stream::new(config.seed);
    let mut init_rng = streams.split();
    let mut sweep_rng = streams.split();

    info!(
        "update run: {} sites × {} axes, {} β points, {:?} start, seed {}",
        lattice.volume(),
        lattice.n_axes(),
        config.beta_schedule.len(),
        config.start_mode,
        config.seed
    );
    initialize_gauge_field(lattice, config.start_mode, &mut init_rng);
    run_beta_schedule(lattice, config, &mut sweep_rng, true)
}

/// Thermalize (optionally) and walk the schedule on the existing field.
pub(crate) fn run_beta_schedule(
    lattice: &mut GaugeLattice,
    config: &UpdateConfig,
    rng: &mut Mulberry32,
    thermalize: bool,
) -> LatticeResult<UpdateSummary> {
    let Some(&first_beta) = config.beta_schedule.first() else {
        return Err(LatticeError::EmptyBetaSchedule);
    };
    let or_steps = config.over_relaxation_steps;
    let mut total_sweeps = 0;

    if thermalize {
        for _ in 0..config.thermalization_sweeps {
            perform_sweep(lattice, first_beta, rng, or_steps);
        }
        total_sweeps += config.thermalization_sweeps;
    }

    let mut plaquette_history = Vec::with_capacity(config.beta_schedule.len());
    let mut final_beta = first_beta;
    for &beta in &config.beta_schedule {
        for _ in 0..config.sweeps_per_beta {
            perform_sweep(lattice, beta, rng, or_steps);
        }
        total_sweeps += config.sweeps_per_beta;
        if let Some(ape) = config.ape {
            apply_ape_smear(lattice, ape.alpha, ape.iterations);
        }
        let plaquette = average_plaquette(lattice);
        debug!("β = {beta:.4}: plaquette {plaquette:.6}");
        plaquette_history.push(plaquette);
        final_beta = beta;
    }

    info!(
        "update run done: {total_sweeps} sweeps, final β = {final_beta:.4}, plaquette {:.6}",
        plaquette_history.last().copied().unwrap_or(1.0)
    );
    Ok(UpdateSummary {
        plaquette_history,
        total_sweeps,
        final_beta,
    })
}

// SPDX-License-Identifier: AGPL-3.0-only

//! Checkerboard (axis, parity) sub-sweeps on the CPU.
//!
//! A sub-sweep updates `U_μ(x)` for every site of one parity. Each site draws
//! from its own mulberry32 seeded by
//! `site_seed(seed, 2·slot + parity, site, sweep_index)`, so the result does
//! not depend on visiting order whenever the extents transverse to μ are
//! even. This is the reference the WGSL kernel in
//! [`super::gpu_checkerboard`] reproduces.

use super::gauge::GaugeLattice;
use super::rng::{site_seed, Mulberry32};
use super::update::update_link;

/// One (axis slot, parity) sub-sweep request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SubSweep {
    pub axis_slot: usize,
    pub parity: usize,
    pub beta: f64,
    pub seed: u32,
    pub sweep_index: u32,
    pub over_relaxation: usize,
}

impl SubSweep {
    /// RNG scope tag `2·slot + parity`.
    #[must_use]
    pub fn scope(&self) -> u32 {
        (2 * self.axis_slot + (self.parity & 1)) as u32
    }

    /// Seed for one site.
    #[must_use]
    pub fn site_seed(&self, site: usize) -> u32 {
        site_seed(self.seed, self.scope(), site as u32, self.sweep_index)
    }
}

/// Update every `U_slot(x)` with `parity(x) == desc.parity`.
pub fn checkerboard_sub_sweep(lattice: &mut GaugeLattice, desc: &SubSweep) {
    for site in 0..lattice.volume() {
        let x = lattice.site_coords(site);
        if GaugeLattice::parity(x) != desc.parity & 1 {
            continue;
        }
        let mut rng = Mulberry32::new(desc.site_seed(site));
        update_link(
            lattice,
            x,
            desc.axis_slot,
            desc.beta,
            &mut rng,
            desc.over_relaxation,
        );
    }
}

/// All sub-sweeps of one full sweep, in (slot, parity) order.
#[must_use]
pub fn sub_sweeps(
    n_axes: usize,
    beta: f64,
    seed: u32,
    sweep_index: u32,
    over_relaxation: usize,
) -> Vec<SubSweep> {
    (0..n_axes)
        .flat_map(|axis_slot| {
            (0..2).map(move |parity| SubSweep {
                axis_slot,
                parity,
                beta,
                seed,
                sweep_index,
                over_relaxation,
            })
        })
        .collect()
}

/// Full checkerboard sweep on the CPU.
pub fn checkerboard_sweep_cpu(
    lattice: &mut GaugeLattice,
    beta: f64,
    seed: u32,
    sweep_index: u32,
    over_relaxation: usize,
) {
    for desc in sub_sweeps(lattice.n_axes(), beta, seed, sweep_index, over_relaxation) {
        checkerboard_sub_sweep(lattice, &desc);
    }
}

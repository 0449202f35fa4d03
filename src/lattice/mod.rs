// SPDX-License-Identifier: AGPL-3.0-only

//! Lattice gauge theory: SU(3) links on periodic 2D/3D/4D grids.
//!
//! | Layer | Content |
//! |-------|---------|
//! | State | SU(3) link variables, one per (site, active axis) |
//! | Local field | Plaquette staples |
//! | Update | Approximate heatbath + over-relaxation (Gauss–Seidel sweep) |
//! | Parallel update | Checkerboard (axis, parity) sub-sweeps, CPU or GPU |
//! | Observables | Plaquette, Wilson loops, Creutz ratios, Polyakov loops |
//! | Statistics | Binning, jackknife, running estimates |
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `complex_f64` | Complex f64 arithmetic with WGSL twin |
//! | `su3` | SU(3) 3×3 complex matrices and the projected `Su3` newtype |
//! | `rng` | mulberry32 generator, splittable streams, per-site seed hash |
//! | `constants` | Numerical guards and heatbath weights |
//! | `gauge` | `GaugeLattice`: flat link buffer + periodic addressing |
//! | `update` | Staples, heatbath, over-relaxation, sweeps, APE smearing |
//! | `observables` | Plaquette, Wilson loops, Creutz ratio, Polyakov loop |
//! | `stats` | Binning, jackknife, Welford running estimate |
//! | `checkerboard` | CPU reference of one (axis, parity) sub-sweep |
//! | `gpu_checkerboard` | wgpu compute kernel for the same sub-sweep |
//! | `runtime` | Runtime handle, temperature scans, replica ensembles |
//!
//! # References
//!
//! - Creutz, "Quarks, Gluons and Lattices" (1983)
//! - Gattringer & Lang, "Quantum Chromodynamics on the Lattice" (2010)
//! - Albanese et al. (APE), PLB 192, 163 (1987)

/// Checkerboard (axis, parity) sub-sweep on the CPU.
pub mod checkerboard;
/// Complex f64 arithmetic (re, im) with WGSL shader template.
pub mod complex_f64;
/// Numerical guards and heatbath blend constants.
pub mod constants;
/// Periodic link storage.
pub mod gauge;
/// wgpu compute kernel for checkerboard sub-sweeps.
pub mod gpu_checkerboard;
/// Gauge-invariant observables.
pub mod observables;
/// Deterministic random number generation.
pub mod rng;
/// Runtime orchestration: temperature scans and replica ensembles.
pub mod runtime;
/// Binning, jackknife and running estimates.
pub mod stats;
/// SU(3) 3x3 complex matrix operations.
pub mod su3;
/// Monte Carlo update engine.
pub mod update;

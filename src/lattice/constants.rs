// SPDX-License-Identifier: AGPL-3.0-only

//! Centralized constants for the lattice modules.
//!
//! Collects the link buffer layout, numerical guards, heatbath blend weights
//! and RNG scope tags used across `su3.rs`, `gauge.rs`, `update.rs`,
//! `checkerboard.rs` and the WGSL parity kernel.

/// Number of colors (SU(3)).
pub const N_COLORS: usize = 3;

/// Largest number of lattice axes (x, y, z, t).
pub const MAX_AXES: usize = 4;

/// Reals per complex entry (re, im).
pub const COMPLEX_STRIDE: usize = 2;

/// Reals per matrix row (3 complex entries).
pub const ROW_STRIDE: usize = N_COLORS * COMPLEX_STRIDE;

/// Reals per link matrix (3 rows).
pub const LINK_STRIDE: usize = N_COLORS * ROW_STRIDE;

/// Row norm below which projection abandons the row.
///
/// Such a row carries no usable direction; the projection substitutes the
/// identity basis vector least aligned with the rows already fixed.
pub const PROJECTION_NORM_GUARD: f64 = 1e-12;

/// Lower clamp for the Box–Muller `ln` argument.
pub const BOX_MULLER_FLOOR: f64 = 1e-300;

/// Minimum staple weight in the heatbath blend (reached at β = 0).
pub const HEATBATH_STAPLE_FLOOR: f64 = 0.5;

/// Haar noise weight per unit of `(1 − c)` in the heatbath blend.
pub const HEATBATH_NOISE_SCALE: f64 = 0.5;

/// Divisor inside the coupling `c = tanh(β‖S‖ / mult / 12)`.
pub const HEATBATH_COUPLING_DIVISOR: f64 = 12.0;

/// RNG scope tag for disposable temperature-scan sweeps.
///
/// Checkerboard sub-sweeps use `2·slot + parity` (0..8), so any value past
/// that range keeps scan streams disjoint from sweep streams.
pub const SCAN_SCOPE: u32 = 0x5CA7;

/// Golden-ratio increment used to decorrelate split seeds.
pub const GOLDEN_GAMMA_32: u32 = 0x9E37_79B9;

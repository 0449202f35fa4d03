// SPDX-License-Identifier: AGPL-3.0-only

//! Named numerical tolerances for checks and tests.
//!
//! Monte Carlo quantities carry statistical noise; algebraic identities carry
//! only rounding. Keep the two families apart.

/// Identity lattice observables (plaquette, loops, Polyakov) vs 1.
pub const IDENTITY_OBSERVABLE_ABS: f64 = 1e-12;

/// Wilson loops before vs after a random gauge transformation.
///
/// Each link passes through two extra SU(3) products and one projection.
pub const GAUGE_INVARIANCE_ABS: f64 = 1e-8;

/// ‖U U† − I‖_F for a projected link.
pub const UNITARITY_DEFECT_MAX: f64 = 1e-12;

/// |det U − 1| for a projected link.
pub const DETERMINANT_ABS: f64 = 1e-12;

/// Slack ε in the Creutz consistency check `|χ₂ − χ₁| ≤ σ₁ + σ₂ + ε`.
///
/// On a 6×6 lattice at β = 1.65, 8-seed ensembles give χ(1,1) ≈ 0.11 with
/// |χ(2,2) − χ(1,1)| up to about 0.026. The slack stays well below χ(1,1),
/// so a vanishing or doubled χ(2,2) fails.
pub const CREUTZ_CONSISTENCY_SLACK: f64 = 0.04;

/// CPU vs GPU sub-sweep, per real (f32 transcendentals on the GPU).
pub const GPU_CPU_LINK_ABS: f64 = 1e-4;

/// Running estimate vs two-pass mean/variance.
pub const RUNNING_ESTIMATE_ABS: f64 = 1e-12;

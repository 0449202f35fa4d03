// SPDX-License-Identifier: AGPL-3.0-only

//! SU(3) lattice gauge Monte Carlo engine.
//!
//! A discretized SU(3) gauge field on periodic 2D/3D/4D lattices, updated by
//! an approximate heatbath with over-relaxation, measured through
//! gauge-invariant observables, and analysed with binning and jackknife
//! resampling. Rendering layers consume the scalar outputs only.
//!
//! ## Modules
//!   - `lattice`: SU(3) algebra, link storage, update engine, observables,
//!     statistics, runtime orchestration, checkerboard kernels
//!   - `gpu`: wgpu f64 device, buffers and dispatch for the parity kernel
//!   - `config`: serde run configuration with lenient numeric recovery
//!   - `error`: typed failures ([`error::LatticeError`])
//!   - `tolerances`: named numerical tolerances for checks and tests
//!   - `validation`: pass/fail harness used by the validation binary
//!
//! ## Binaries
//!   - `lattice_scan`: run a JSON-specified update + temperature scan
//!   - `validate_wilson_loops`: identity, gauge invariance, area law, Creutz

pub mod config;
pub mod error;
pub mod gpu;
pub mod lattice;
pub mod tolerances;
pub mod validation;

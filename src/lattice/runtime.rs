// SPDX-License-Identifier: AGPL-3.0-only

//! Runtime orchestration.
//!
//! [`QcdRuntime`] owns one lattice, its resolved update configuration and a
//! running accumulator of observables. Temperature scans work on private
//! clones, so a scan never changes the runtime field. [`run_ensemble`] runs
//! independent replicas in parallel with rayon; each replica's sweeps stay
//! sequential.

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::checkerboard::{checkerboard_sub_sweep, sub_sweeps};
use super::constants::SCAN_SCOPE;
use super::gauge::{Axis, GaugeLattice};
use super::gpu_checkerboard::{GpuCheckerboard, KernelGeometry};
use super::observables::{
    average_plaquette, measure_polyakov_loop, measure_wilson_loop_grid, WilsonLoopTable,
};
use super::rng::{site_seed, Mulberry32, Mulberry32Stream};
use super::stats::{EstimateSnapshot, RunningEstimate};
use super::update::{
    initialize_gauge_field, perform_sweep, run_beta_schedule, run_wilson_cpu_update,
    UpdateSummary,
};
use crate::config::{RuntimeSpec, ScanOptions, StartMode, UpdateConfig};
use crate::error::{LatticeError, LatticeResult};

/// Couplings for a temperature scan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScanSchedule {
    Beta(Vec<f64>),
    /// Converted with β = 1/T.
    Temperature(Vec<f64>),
}

impl ScanSchedule {
    /// Explicit betas win over temperatures.
    #[must_use]
    pub fn from_options(options: &ScanOptions) -> Self {
        if options.betas.is_empty() {
            Self::Temperature(options.temperatures.clone())
        } else {
            Self::Beta(options.betas.clone())
        }
    }

    /// Usable couplings; invalid entries are skipped with a warning.
    #[must_use]
    pub fn betas(&self) -> Vec<f64> {
        match self {
            Self::Beta(betas) => betas
                .iter()
                .copied()
                .filter(|b| {
                    let ok = b.is_finite();
                    if !ok {
                        warn!("scan: skipping non-finite β {b}");
                    }
                    ok
                })
                .collect(),
            Self::Temperature(temps) => temps
                .iter()
                .copied()
                .filter_map(|t| {
                    if t.is_finite() && t > 0.0 {
                        Some(1.0 / t)
                    } else {
                        warn!("scan: skipping temperature {t}");
                        None
                    }
                })
                .collect(),
        }
    }
}

/// One point of a temperature scan.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanPoint {
    pub beta: f64,
    pub axis: Axis,
    pub extent: usize,
    pub magnitude: f64,
    pub sample_count: usize,
}

/// Running observables of one runtime.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservableAccumulator {
    pub plaquette: RunningEstimate,
    pub polyakov_magnitude: RunningEstimate,
    pub scans: usize,
}

/// Serializable view of an [`ObservableAccumulator`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccumulatorSnapshot {
    pub plaquette: EstimateSnapshot,
    pub polyakov_magnitude: EstimateSnapshot,
    pub scans: usize,
}

impl ObservableAccumulator {
    #[must_use]
    pub fn snapshot(&self) -> AccumulatorSnapshot {
        AccumulatorSnapshot {
            plaquette: self.plaquette.snapshot(),
            polyakov_magnitude: self.polyakov_magnitude.snapshot(),
            scans: self.scans,
        }
    }
}

/// How many sub-sweeps of a checkerboard sweep ran where.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepBackendReport {
    pub gpu_sub_sweeps: usize,
    pub cpu_sub_sweeps: usize,
}

/// Lattice + configuration + accumulator.
#[derive(Clone, Debug)]
pub struct QcdRuntime {
    lattice: GaugeLattice,
    config: UpdateConfig,
    base_seed: u32,
    start_mode: StartMode,
    accumulator: ObservableAccumulator,
    sweep_rng: Mulberry32,
    thermalized: bool,
    scan_index: u32,
    checkerboard_index: u32,
}

/// Build the lattice and seed it per `start_mode` from `base_seed`.
///
/// # Errors
///
/// [`LatticeError::InvalidExtent`] for a zero extent.
pub fn initialize_qcd_runtime(spec: &RuntimeSpec) -> LatticeResult<QcdRuntime> {
    let mut lattice = GaugeLattice::new(spec.lattice)?;
    let config = spec.update.resolve();
    let base_seed = spec.base_seed();
    let start_mode = spec.start_mode();

    let mut init_rng = Mulberry32Stream::new(base_seed).split();
    initialize_gauge_field(&mut lattice, start_mode, &mut init_rng);

    // Same stream assignment as run_wilson_cpu_update: 0 init, 1 sweeps.
    let mut streams = Mulberry32Stream::new(config.seed);
    let _init_stream = streams.split();
    let sweep_rng = streams.split();

    info!(
        "runtime: {:?} lattice, axes {:?}, {start_mode:?} start, base seed {base_seed}",
        lattice.extents(),
        lattice.axes()
    );
    Ok(QcdRuntime {
        lattice,
        config,
        base_seed,
        start_mode,
        accumulator: ObservableAccumulator::default(),
        sweep_rng,
        thermalized: false,
        scan_index: 0,
        checkerboard_index: 0,
    })
}

impl QcdRuntime {
    #[must_use]
    pub const fn lattice(&self) -> &GaugeLattice {
        &self.lattice
    }

    #[must_use]
    pub const fn config(&self) -> &UpdateConfig {
        &self.config
    }

    #[must_use]
    pub const fn base_seed(&self) -> u32 {
        self.base_seed
    }

    #[must_use]
    pub const fn start_mode(&self) -> StartMode {
        self.start_mode
    }

    #[must_use]
    pub const fn accumulator(&self) -> &ObservableAccumulator {
        &self.accumulator
    }

    /// Run the β schedule on the current field without re-initializing.
    ///
    /// Thermalization sweeps run on the first call only.
    ///
    /// # Errors
    ///
    /// [`LatticeError::EmptyBetaSchedule`] if the schedule is empty.
    pub fn advance(&mut self) -> LatticeResult<UpdateSummary> {
        let summary = run_beta_schedule(
            &mut self.lattice,
            &self.config,
            &mut self.sweep_rng,
            !self.thermalized,
        )?;
        self.thermalized = true;
        self.accumulator
            .plaquette
            .extend(summary.plaquette_history.iter().copied());
        if let Ok(p) = measure_polyakov_loop(&self.lattice, Axis::T) {
            self.accumulator.polyakov_magnitude.push(p.magnitude);
        }
        Ok(summary)
    }

    /// Polyakov loop magnitude at each scheduled coupling.
    ///
    /// Each point sweeps a private clone `scan_sweeps` times with seeds from
    /// `site_seed(base_seed, SCAN_SCOPE, point, scan_index)`. The runtime
    /// lattice is never written. An empty schedule returns no points.
    ///
    /// # Errors
    ///
    /// [`LatticeError::InactiveAxis`] if `axis` has no link slot.
    pub fn run_temperature_scan(
        &mut self,
        schedule: &ScanSchedule,
        axis: Axis,
    ) -> LatticeResult<Vec<ScanPoint>> {
        let betas = schedule.betas();
        if betas.is_empty() {
            return Ok(Vec::new());
        }
        if self.lattice.slot(axis).is_none() {
            return Err(LatticeError::InactiveAxis(axis));
        }

        let base = &self.lattice;
        let scan_index = self.scan_index;
        let sweeps = self.config.scan_sweeps;
        let or_steps = self.config.over_relaxation_steps;
        let base_seed = self.base_seed;
        let points = betas
            .par_iter()
            .enumerate()
            .map(|(point, &beta)| {
                let mut field = base.clone();
                let mut rng = Mulberry32::new(site_seed(
                    base_seed,
                    SCAN_SCOPE,
                    point as u32,
                    scan_index,
                ));
                for _ in 0..sweeps {
                    perform_sweep(&mut field, beta, &mut rng, or_steps);
                }
                let p = measure_polyakov_loop(&field, axis)?;
                debug!("scan β = {beta:.4}: |P| = {:.6}", p.magnitude);
                Ok(ScanPoint {
                    beta,
                    axis,
                    extent: field.extent(axis),
                    magnitude: p.magnitude,
                    sample_count: p.sample_count,
                })
            })
            .collect::<LatticeResult<Vec<_>>>()?;

        self.scan_index = self.scan_index.wrapping_add(1);
        self.accumulator.scans += 1;
        Ok(points)
    }

    /// One full sweep as (slot, parity) sub-sweeps, each offered to the GPU
    /// kernel first and run on the CPU when it declines.
    pub async fn checkerboard_sweep(
        &mut self,
        gpu: Option<&GpuCheckerboard>,
        beta: f64,
    ) -> SweepBackendReport {
        let mut report = SweepBackendReport::default();
        let geometry = KernelGeometry::from_lattice(&self.lattice);
        let subs = sub_sweeps(
            self.lattice.n_axes(),
            beta,
            self.config.seed,
            self.checkerboard_index,
            self.config.over_relaxation_steps,
        );
        for desc in subs {
            let on_gpu = match (gpu, geometry.as_ref()) {
                (Some(kernel), Some(geometry)) => {
                    kernel
                        .sub_sweep(self.lattice.as_mut_slice(), geometry, &desc)
                        .await
                }
                _ => false,
            };
            if on_gpu {
                report.gpu_sub_sweeps += 1;
            } else {
                checkerboard_sub_sweep(&mut self.lattice, &desc);
                report.cpu_sub_sweeps += 1;
            }
        }
        self.checkerboard_index = self.checkerboard_index.wrapping_add(1);
        self.accumulator
            .plaquette
            .push(average_plaquette(&self.lattice));
        report
    }
}

/// One replica of an ensemble.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaResult {
    pub seed: u32,
    pub summary: UpdateSummary,
    pub wilson: WilsonLoopTable,
}

/// Independent replicas, one per seed, in parallel.
///
/// Each replica runs [`run_wilson_cpu_update`] with its own seed and measures
/// the Wilson grid up to `spec.max_loop_extent()` in every active plane.
/// Results are returned in seed order.
///
/// # Errors
///
/// The first replica error (empty schedule, zero extent).
pub fn run_ensemble(spec: &RuntimeSpec, seeds: &[u32]) -> LatticeResult<Vec<ReplicaResult>> {
    let base = spec.update.resolve();
    let max_extent = spec.max_loop_extent();
    info!("ensemble: {} replicas", seeds.len());
    seeds
        .par_iter()
        .map(|&seed| {
            let mut lattice = GaugeLattice::new(spec.lattice)?;
            let config = UpdateConfig {
                seed,
                start_mode: spec.start_mode.unwrap_or(base.start_mode),
                ..base.clone()
            };
            let summary = run_wilson_cpu_update(&mut lattice, &config)?;
            let wilson = measure_wilson_loop_grid(&lattice, max_extent, max_extent, &[])?;
            Ok(ReplicaResult {
                seed,
                summary,
                wilson,
            })
        })
        .collect()
}

// SPDX-License-Identifier: AGPL-3.0-only

//! Run configuration.
//!
//! JSON inputs (camelCase) deserialize into lenient `*Options` structs whose
//! numeric fields are plain numbers; [`UpdateOptions::resolve`] turns them
//! into a typed [`UpdateConfig`]. Missing, non-finite or out-of-range values
//! fall back to the defaults below and are reported at `debug` level.
//!
//! | Field | Default |
//! |-------|---------|
//! | `sweepsPerBeta` | 8 |
//! | `thermalizationSweeps` | 16 |
//! | `overRelaxationSteps` | 1 |
//! | `seed` | 1337 |
//! | `startMode` | `cold` |
//! | `apeSmearing.alpha` | 0.5 |
//! | `apeSmearing.iterations` | 1 |
//! | `scanSweeps` | 2 |
//!
//! ## Environment
//!
//! | Variable | Values |
//! |----------|--------|
//! | `LATTICE_GPU_ADAPTER` | `auto`, adapter index, or name substring |
//! | `LATTICE_WGPU_BACKEND` | `vulkan`, `metal`, `dx12` (default: all) |

use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::LatticeResult;
use crate::lattice::gauge::{Axis, LatticeDims};

/// Adapter selector variable.
pub const GPU_ADAPTER_ENV: &str = "LATTICE_GPU_ADAPTER";
/// Backend restriction variable.
pub const WGPU_BACKEND_ENV: &str = "LATTICE_WGPU_BACKEND";

pub const DEFAULT_SWEEPS_PER_BETA: usize = 8;
pub const DEFAULT_THERMALIZATION_SWEEPS: usize = 16;
pub const DEFAULT_OVER_RELAXATION_STEPS: usize = 1;
pub const DEFAULT_SEED: u32 = 1337;
pub const DEFAULT_APE_ALPHA: f64 = 0.5;
pub const DEFAULT_APE_ITERATIONS: usize = 1;
pub const DEFAULT_SCAN_SWEEPS: usize = 2;
pub const DEFAULT_MAX_LOOP_EXTENT: usize = 2;

/// Initial field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartMode {
    /// All links identity.
    #[default]
    Cold,
    /// Independent Haar-random links.
    Hot,
}

/// Resolved APE smearing parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApeSmearing {
    pub alpha: f64,
    pub iterations: usize,
}

/// Typed, validated input to one update run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConfig {
    pub beta_schedule: Vec<f64>,
    pub sweeps_per_beta: usize,
    pub thermalization_sweeps: usize,
    pub over_relaxation_steps: usize,
    pub start_mode: StartMode,
    pub seed: u32,
    pub ape: Option<ApeSmearing>,
    pub scan_sweeps: usize,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            beta_schedule: Vec::new(),
            sweeps_per_beta: DEFAULT_SWEEPS_PER_BETA,
            thermalization_sweeps: DEFAULT_THERMALIZATION_SWEEPS,
            over_relaxation_steps: DEFAULT_OVER_RELAXATION_STEPS,
            start_mode: StartMode::Cold,
            seed: DEFAULT_SEED,
            ape: None,
            scan_sweeps: DEFAULT_SCAN_SWEEPS,
        }
    }
}

/// Raw APE options as supplied by callers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApeOptions {
    pub alpha: Option<f64>,
    pub iterations: Option<f64>,
}

/// Raw update options as supplied by callers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateOptions {
    pub beta_schedule: Vec<f64>,
    pub sweeps_per_beta: Option<f64>,
    pub thermalization_sweeps: Option<f64>,
    pub over_relaxation_steps: Option<f64>,
    pub start_mode: Option<StartMode>,
    pub seed: Option<f64>,
    pub ape_smearing: Option<ApeOptions>,
    pub scan_sweeps: Option<f64>,
}

impl UpdateOptions {
    /// Validate and fill defaults.
    ///
    /// Non-finite β values are dropped. The schedule may end up empty; the
    /// update driver rejects that case.
    #[must_use]
    pub fn resolve(&self) -> UpdateConfig {
        let beta_schedule: Vec<f64> = self
            .beta_schedule
            .iter()
            .copied()
            .filter(|b| b.is_finite())
            .collect();
        if beta_schedule.len() != self.beta_schedule.len() {
            debug!(
                "betaSchedule: dropped {} non-finite entries",
                self.beta_schedule.len() - beta_schedule.len()
            );
        }

        let ape = self.ape_smearing.map(|ape| ApeSmearing {
            alpha: resolve_unit("apeSmearing.alpha", ape.alpha, DEFAULT_APE_ALPHA),
            iterations: resolve_count(
                "apeSmearing.iterations",
                ape.iterations,
                DEFAULT_APE_ITERATIONS,
            ),
        });

        UpdateConfig {
            beta_schedule,
            sweeps_per_beta: resolve_count(
                "sweepsPerBeta",
                self.sweeps_per_beta,
                DEFAULT_SWEEPS_PER_BETA,
            ),
            thermalization_sweeps: resolve_count(
                "thermalizationSweeps",
                self.thermalization_sweeps,
                DEFAULT_THERMALIZATION_SWEEPS,
            ),
            over_relaxation_steps: resolve_count(
                "overRelaxationSteps",
                self.over_relaxation_steps,
                DEFAULT_OVER_RELAXATION_STEPS,
            ),
            start_mode: self.start_mode.unwrap_or_default(),
            seed: resolve_seed("seed", self.seed, DEFAULT_SEED),
            ape,
            scan_sweeps: resolve_count("scanSweeps", self.scan_sweeps, DEFAULT_SCAN_SWEEPS),
        }
    }
}

/// Non-negative integer count; fractional values truncate.
fn resolve_count(name: &str, raw: Option<f64>, default: usize) -> usize {
    match raw {
        None => default,
        Some(v) if v.is_finite() && v >= 0.0 && v <= u32::MAX as f64 => v.trunc() as usize,
        Some(v) => {
            debug!("{name}: {v} out of range, using {default}");
            default
        }
    }
}

/// Value in `(0, 1]`.
fn resolve_unit(name: &str, raw: Option<f64>, default: f64) -> f64 {
    match raw {
        None => default,
        Some(v) if v > 0.0 && v <= 1.0 => v,
        Some(v) => {
            debug!("{name}: {v} outside (0, 1], using {default}");
            default
        }
    }
}

/// Any finite number, reduced modulo 2³².
fn resolve_seed(name: &str, raw: Option<f64>, default: u32) -> u32 {
    match raw {
        None => default,
        Some(v) if v.is_finite() => v.trunc().rem_euclid(4_294_967_296.0) as u32,
        Some(v) => {
            debug!("{name}: {v} is not finite, using {default}");
            default
        }
    }
}

/// Temperature-scan request carried by a runtime spec.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanOptions {
    /// Explicit couplings. Takes precedence over `temperatures`.
    pub betas: Vec<f64>,
    /// Temperatures, converted with β = 1/T.
    pub temperatures: Vec<f64>,
    /// Polyakov axis, `t` unless given.
    pub axis: Option<Axis>,
}

/// Everything needed to build a runtime.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeSpec {
    pub lattice: LatticeDims,
    pub update: UpdateOptions,
    pub base_seed: Option<f64>,
    pub start_mode: Option<StartMode>,
    pub scan: Option<ScanOptions>,
    /// Largest Wilson loop side measured by the binaries.
    pub max_loop_extent: Option<f64>,
}

impl RuntimeSpec {
    /// Parse a JSON spec.
    ///
    /// # Errors
    ///
    /// [`crate::error::LatticeError::Config`] on malformed JSON.
    pub fn from_json_str(json: &str) -> LatticeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON spec file.
    ///
    /// # Errors
    ///
    /// [`crate::error::LatticeError::Io`] if the file cannot be read,
    /// [`crate::error::LatticeError::Config`] on malformed JSON.
    pub fn from_path(path: impl AsRef<Path>) -> LatticeResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Seed for field initialization and disposable scan sweeps.
    #[must_use]
    pub fn base_seed(&self) -> u32 {
        resolve_seed("baseSeed", self.base_seed, DEFAULT_SEED)
    }

    #[must_use]
    pub fn start_mode(&self) -> StartMode {
        self.start_mode.unwrap_or_default()
    }

    #[must_use]
    pub fn max_loop_extent(&self) -> usize {
        match resolve_count("maxLoopExtent", self.max_loop_extent, DEFAULT_MAX_LOOP_EXTENT) {
            0 => {
                debug!("maxLoopExtent: 0 out of range, using {DEFAULT_MAX_LOOP_EXTENT}");
                DEFAULT_MAX_LOOP_EXTENT
            }
            n => n,
        }
    }
}

/// Adapter selection read from [`GPU_ADAPTER_ENV`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdapterSelector {
    /// Discrete `SHADER_F64` adapter first, then any `SHADER_F64` adapter.
    Auto,
    /// Enumeration index; falls back to a name match on the digits.
    Index(usize),
    /// Case-insensitive name substring.
    Name(String),
}

impl AdapterSelector {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let selector = raw.trim().to_lowercase();
        if selector.is_empty() || selector == "auto" {
            Self::Auto
        } else if let Ok(idx) = selector.parse::<usize>() {
            Self::Index(idx)
        } else {
            Self::Name(selector)
        }
    }

    #[must_use]
    pub fn from_env() -> Self {
        Self::parse(&std::env::var(GPU_ADAPTER_ENV).unwrap_or_default())
    }
}

/// Backend set read from [`WGPU_BACKEND_ENV`].
#[must_use]
pub fn wgpu_backends_from_env() -> wgpu::Backends {
    parse_backends(std::env::var(WGPU_BACKEND_ENV).ok().as_deref())
}

fn parse_backends(raw: Option<&str>) -> wgpu::Backends {
    match raw.map(str::trim) {
        Some("vulkan") => wgpu::Backends::VULKAN,
        Some("metal") => wgpu::Backends::METAL,
        Some("dx12") => wgpu::Backends::DX12,
        _ => wgpu::Backends::all(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_options_resolve_to_defaults() {
        let cfg = UpdateOptions::default().resolve();
        assert_eq!(
            cfg,
            UpdateConfig {
                beta_schedule: vec![],
                ..UpdateConfig::default()
            }
        );
        assert_eq!(cfg.sweeps_per_beta, 8);
        assert_eq!(cfg.thermalization_sweeps, 16);
        assert_eq!(cfg.seed, 1337);
        assert!(cfg.ape.is_none());
    }

    #[test]
    fn json_fields_parsed_camel_case() {
        let opts: UpdateOptions = serde_json::from_str(
            r#"{"betaSchedule":[1.0,2.5],"sweepsPerBeta":4,"overRelaxationSteps":3,
                "startMode":"hot","seed":9000,"apeSmearing":{"alpha":0.3}}"#,
        )
        .unwrap();
        let cfg = opts.resolve();
        assert_eq!(cfg.beta_schedule, vec![1.0, 2.5]);
        assert_eq!(cfg.sweeps_per_beta, 4);
        assert_eq!(cfg.over_relaxation_steps, 3);
        assert_eq!(cfg.start_mode, StartMode::Hot);
        assert_eq!(cfg.seed, 9000);
        assert_eq!(
            cfg.ape,
            Some(ApeSmearing {
                alpha: 0.3,
                iterations: 1
            })
        );
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let opts = UpdateOptions {
            beta_schedule: vec![1.0, f64::NAN, f64::INFINITY, 2.0],
            sweeps_per_beta: Some(-1.0),
            thermalization_sweeps: Some(-3.0),
            over_relaxation_steps: Some(f64::NAN),
            seed: Some(f64::INFINITY),
            ape_smearing: Some(ApeOptions {
                alpha: Some(1.5),
                iterations: Some(2.7),
            }),
            scan_sweeps: Some(5.9),
            ..UpdateOptions::default()
        };
        let cfg = opts.resolve();
        assert_eq!(cfg.beta_schedule, vec![1.0, 2.0]);
        assert_eq!(cfg.sweeps_per_beta, DEFAULT_SWEEPS_PER_BETA);
        assert_eq!(cfg.thermalization_sweeps, DEFAULT_THERMALIZATION_SWEEPS);
        assert_eq!(cfg.over_relaxation_steps, DEFAULT_OVER_RELAXATION_STEPS);
        assert_eq!(cfg.seed, DEFAULT_SEED);
        let ape = cfg.ape.unwrap();
        assert!((ape.alpha - DEFAULT_APE_ALPHA).abs() < f64::EPSILON);
        assert_eq!(ape.iterations, 2);
        assert_eq!(cfg.scan_sweeps, 5);
    }

    #[test]
    fn zero_sweeps_per_beta_is_kept() {
        let cfg = UpdateOptions {
            beta_schedule: vec![1.0],
            sweeps_per_beta: Some(0.0),
            ..UpdateOptions::default()
        }
        .resolve();
        assert_eq!(cfg.sweeps_per_beta, 0);
    }

    #[test]
    fn ape_alpha_must_be_positive() {
        let resolve = |alpha: f64| {
            UpdateOptions {
                ape_smearing: Some(ApeOptions {
                    alpha: Some(alpha),
                    iterations: None,
                }),
                ..UpdateOptions::default()
            }
            .resolve()
            .ape
            .unwrap()
            .alpha
        };
        assert!((resolve(0.0) - DEFAULT_APE_ALPHA).abs() < f64::EPSILON);
        assert!((resolve(-0.2) - DEFAULT_APE_ALPHA).abs() < f64::EPSILON);
        assert!((resolve(1.0) - 1.0).abs() < f64::EPSILON);
        assert!((resolve(0.25) - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn negative_seed_wraps() {
        assert_eq!(resolve_seed("seed", Some(-1.0), 0), u32::MAX);
        assert_eq!(resolve_seed("seed", Some(4_294_967_297.0), 0), 1);
    }

    #[test]
    fn runtime_spec_from_json() {
        let spec = RuntimeSpec::from_json_str(
            r#"{"lattice":{"width":6,"height":6,"temporalExtent":4},
                "update":{"betaSchedule":[1.65]},
                "baseSeed":42,"startMode":"hot",
                "scan":{"temperatures":[0.5,1.0]}}"#,
        )
        .unwrap();
        assert_eq!(spec.lattice.temporal_extent, Some(4));
        assert_eq!(spec.base_seed(), 42);
        assert_eq!(spec.start_mode(), StartMode::Hot);
        assert_eq!(spec.max_loop_extent(), DEFAULT_MAX_LOOP_EXTENT);
        assert_eq!(spec.scan.unwrap().temperatures, vec![0.5, 1.0]);
    }

    #[test]
    fn runtime_spec_bad_json_is_config_error() {
        let err = RuntimeSpec::from_json_str("{\"lattice\": 3}").unwrap_err();
        assert!(matches!(err, crate::error::LatticeError::Config(_)));
    }

    #[test]
    fn runtime_spec_missing_file_is_io_error() {
        let err = RuntimeSpec::from_path("/nonexistent/lattice-spec.json").unwrap_err();
        assert!(matches!(err, crate::error::LatticeError::Io(_)));
    }

    #[test]
    fn adapter_selector_parsing() {
        assert_eq!(AdapterSelector::parse(""), AdapterSelector::Auto);
        assert_eq!(AdapterSelector::parse(" AUTO "), AdapterSelector::Auto);
        assert_eq!(AdapterSelector::parse("1"), AdapterSelector::Index(1));
        assert_eq!(
            AdapterSelector::parse("Titan"),
            AdapterSelector::Name("titan".into())
        );
    }

    #[test]
    fn backend_parsing() {
        assert_eq!(parse_backends(Some("vulkan")), wgpu::Backends::VULKAN);
        assert_eq!(parse_backends(Some("metal")), wgpu::Backends::METAL);
        assert_eq!(parse_backends(None), wgpu::Backends::all());
        assert_eq!(parse_backends(Some("opengl")), wgpu::Backends::all());
    }
}

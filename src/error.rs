// SPDX-License-Identifier: AGPL-3.0-only

//! Typed errors for lattice simulation, statistics and GPU operations.
//!
//! Callers pattern-match on failure modes (empty schedule, too few samples,
//! no adapter) instead of parsing strings. GPU variants never escape the
//! public sweep entry points; those convert them into a "declined" signal.

use thiserror::Error;

use crate::lattice::gauge::Axis;

/// Errors arising from lattice construction, simulation, statistics or GPU setup.
#[derive(Debug, Error)]
pub enum LatticeError {
    /// The update driver was given no coupling values.
    #[error("beta schedule must contain at least one coupling value")]
    EmptyBetaSchedule,

    /// A resampling method was given fewer samples than it needs.
    #[error("jackknife requires at least {required} samples, got {got}")]
    InsufficientSamples { required: usize, got: usize },

    /// A lattice extent was zero.
    #[error("lattice extent along {axis} must be a positive integer, got {extent}")]
    InvalidExtent { axis: Axis, extent: usize },

    /// An externally supplied link buffer has the wrong length.
    #[error("link buffer length mismatch: expected {expected} reals, got {got}")]
    BufferLength { expected: usize, got: usize },

    /// A gauge transformation did not supply one matrix per site.
    #[error("gauge transform needs {expected} site matrices, got {got}")]
    TransformCount { expected: usize, got: usize },

    /// An observable was requested along an axis the lattice does not have.
    #[error("axis {0} is not active on this lattice")]
    InactiveAxis(Axis),

    /// No compatible GPU adapter was found by wgpu.
    #[error("No GPU adapter found")]
    NoAdapter,

    /// GPU device creation failed (wraps the underlying wgpu error message).
    #[error("Failed to create GPU device: {0}")]
    DeviceCreation(String),

    /// GPU lacks the `SHADER_F64` feature required for f64 compute.
    #[error("GPU does not support SHADER_F64: cannot run f64 link updates")]
    NoShaderF64,

    /// Shader compilation, dispatch or readback failed.
    #[error("GPU compute failed: {0}")]
    GpuCompute(String),

    /// A JSON configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// A configuration file could not be read.
    #[error("configuration I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate.
pub type LatticeResult<T> = Result<T, LatticeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_empty_schedule() {
        let err = LatticeError::EmptyBetaSchedule;
        assert!(err.to_string().contains("at least one coupling"));
    }

    #[test]
    fn display_insufficient_samples_names_minimum() {
        let err = LatticeError::InsufficientSamples {
            required: 2,
            got: 1,
        };
        assert_eq!(
            err.to_string(),
            "jackknife requires at least 2 samples, got 1"
        );
    }

    #[test]
    fn display_inactive_axis() {
        let err = LatticeError::InactiveAxis(Axis::T);
        assert_eq!(err.to_string(), "axis t is not active on this lattice");
    }

    #[test]
    fn display_no_shader_f64() {
        let err = LatticeError::NoShaderF64;
        assert!(err.to_string().contains("SHADER_F64"));
    }

    #[test]
    fn config_error_converts_from_serde() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: LatticeError = parse.unwrap_err().into();
        assert!(matches!(err, LatticeError::Config(_)));
    }

    #[test]
    fn error_trait_works() {
        let err = LatticeError::NoAdapter;
        let dyn_err: &dyn std::error::Error = &err;
        assert_eq!(dyn_err.to_string(), "No GPU adapter found");
    }
}

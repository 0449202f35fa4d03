// SPDX-License-Identifier: AGPL-3.0-only

//! Binning, jackknife resampling and running estimates.
//!
//! Monte Carlo samples are autocorrelated; binning into blocks longer than the
//! autocorrelation time and then jackknifing the block means gives honest
//! error bars for non-linear estimators such as Creutz ratios.

use serde::{Deserialize, Serialize};

use crate::error::{LatticeError, LatticeResult};

/// Reduce contiguous, non-overlapping blocks of `bin_size` samples.
///
/// A trailing partial block is dropped. `bin_size` 0 counts as 1.
pub fn bin_samples_with<T, U>(
    samples: &[T],
    bin_size: usize,
    reduce: impl Fn(&[T]) -> U,
) -> Vec<U> {
    samples.chunks_exact(bin_size.max(1)).map(reduce).collect()
}

/// Block means of scalar samples (see [`bin_samples_with`]).
#[must_use]
pub fn bin_samples(samples: &[f64], bin_size: usize) -> Vec<f64> {
    bin_samples_with(samples, bin_size, mean)
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Jackknife result.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JackknifeEstimate {
    /// Bias-corrected estimate `n·θ̂ − (n−1)·θ̄`.
    pub estimate: f64,
    pub standard_error: f64,
    /// `(n−1)·(θ̄ − θ̂)`.
    pub bias: f64,
}

/// Leave-one-out jackknife of an arbitrary estimator.
///
/// # Errors
///
/// [`LatticeError::InsufficientSamples`] with fewer than two samples.
pub fn jackknife<T: Clone>(
    samples: &[T],
    estimator: impl Fn(&[T]) -> f64,
) -> LatticeResult<JackknifeEstimate> {
    let n = samples.len();
    if n < 2 {
        return Err(LatticeError::InsufficientSamples {
            required: 2,
            got: n,
        });
    }
    let full = estimator(samples);
    let mut subset = Vec::with_capacity(n - 1);
    let leave_one_out: Vec<f64> = (0..n)
        .map(|i| {
            subset.clear();
            subset.extend_from_slice(&samples[..i]);
            subset.extend_from_slice(&samples[i + 1..]);
            estimator(&subset)
        })
        .collect();

    let nf = n as f64;
    let loo_mean = mean(&leave_one_out);
    let spread: f64 = leave_one_out.iter().map(|t| (t - loo_mean).powi(2)).sum();
    let bias = (nf - 1.0) * (loo_mean - full);
    Ok(JackknifeEstimate {
        estimate: full - bias,
        standard_error: ((nf - 1.0) / nf * spread).sqrt(),
        bias,
    })
}

/// Welford accumulator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningEstimate {
    count: usize,
    mean: f64,
    m2: f64,
}

/// Point-in-time view of a [`RunningEstimate`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateSnapshot {
    pub count: usize,
    pub mean: f64,
    /// Sample (n−1) standard deviation, 0 below two samples.
    pub standard_deviation: f64,
    /// `standard_deviation / √n`, 0 below two samples.
    pub standard_error: f64,
}

impl RunningEstimate {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
        }
    }

    pub fn push(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn snapshot(&self) -> EstimateSnapshot {
        let (standard_deviation, standard_error) = if self.count < 2 {
            (0.0, 0.0)
        } else {
            let n = self.count as f64;
            let sd = (self.m2 / (n - 1.0)).sqrt();
            (sd, sd / n.sqrt())
        };
        EstimateSnapshot {
            count: self.count,
            mean: self.mean,
            standard_deviation,
            standard_error,
        }
    }
}

impl Extend<f64> for RunningEstimate {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for x in iter {
            self.push(x);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bins_drop_partial_block() {
        let b = bin_samples(&[1.0, 3.0, 5.0, 7.0, 100.0], 2);
        assert_eq!(b, vec![2.0, 6.0]);
    }

    #[test]
    fn bin_size_zero_is_identity() {
        let xs = [1.0, 2.0, 3.0];
        assert_eq!(bin_samples(&xs, 0), xs.to_vec());
        assert!(bin_samples(&xs, 4).is_empty());
    }

    #[test]
    fn jackknife_of_mean_matches_standard_error() {
        let xs = [1.0, 2.0, 4.0, 7.0, 11.0];
        let jk = jackknife(&xs, mean).unwrap();
        let m = mean(&xs);
        let var = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / 4.0;
        assert!((jk.estimate - m).abs() < 1e-12);
        assert!(jk.bias.abs() < 1e-12);
        assert!((jk.standard_error - (var / 5.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn jackknife_removes_linear_bias_of_variance() {
        // Biased (1/n) variance; jackknife returns the unbiased (1/(n−1)) one.
        let xs = [2.0, 4.0, 4.0, 5.0, 9.0, 12.0];
        let biased = |s: &[f64]| {
            let m = mean(s);
            s.iter().map(|x| (x - m).powi(2)).sum::<f64>() / s.len() as f64
        };
        let m = mean(&xs);
        let unbiased = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / 5.0;
        let jk = jackknife(&xs, biased).unwrap();
        assert!((jk.estimate - unbiased).abs() < 1e-10);
        assert!(jk.bias < 0.0);
    }

    #[test]
    fn jackknife_single_sample_errors() {
        let err = jackknife(&[1.0], mean).unwrap_err();
        assert!(matches!(
            err,
            LatticeError::InsufficientSamples {
                required: 2,
                got: 1
            }
        ));
        assert!(jackknife::<f64>(&[], mean).is_err());
    }

    #[test]
    fn jackknife_generic_samples() {
        let pairs = [(1.0, 2.0), (2.0, 2.0), (3.0, 4.0)];
        let ratio = |s: &[(f64, f64)]| {
            s.iter().map(|p| p.0).sum::<f64>() / s.iter().map(|p| p.1).sum::<f64>()
        };
        let jk = jackknife(&pairs, ratio).unwrap();
        assert!(jk.estimate.is_finite() && jk.standard_error > 0.0);
    }

    #[test]
    fn running_estimate_matches_direct() {
        let xs = [0.3, 0.9, 0.1, 0.75, 0.5, 0.42];
        let mut r = RunningEstimate::new();
        r.extend(xs);
        let s = r.snapshot();
        let m = mean(&xs);
        let sd = (xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / 5.0).sqrt();
        assert_eq!(s.count, 6);
        assert!((s.mean - m).abs() < 1e-14);
        assert!((s.standard_deviation - sd).abs() < 1e-14);
        assert!((s.standard_error - sd / 6.0_f64.sqrt()).abs() < 1e-14);
    }

    #[test]
    fn running_estimate_single_sample_has_no_spread() {
        let mut r = RunningEstimate::new();
        r.push(4.0);
        let s = r.snapshot();
        assert!((s.mean - 4.0).abs() < f64::EPSILON);
        assert!(s.standard_deviation.abs() < f64::EPSILON);
        assert!(s.standard_error.abs() < f64::EPSILON);
    }
}

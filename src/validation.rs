// SPDX-License-Identifier: AGPL-3.0-only

//! Pass/fail harness for the validation binaries.
//!
//! A binary records named checks against documented tolerances, prints a
//! human summary plus one JSON line, and exits 0 only if every check passed.

use std::fmt;
use std::process;

use serde::{Deserialize, Serialize};

/// How a check compares `observed` with `expected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckMode {
    /// |observed − expected| ≤ tolerance
    Absolute,
    /// |observed − expected| ≤ tolerance·|expected|
    Relative,
    /// observed ≤ threshold
    Upper,
    /// observed ≥ threshold
    Lower,
    Boolean,
}

impl fmt::Display for CheckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Absolute => "abs",
            Self::Relative => "rel",
            Self::Upper => "<=",
            Self::Lower => ">=",
            Self::Boolean => "bool",
        };
        f.write_str(s)
    }
}

/// One recorded check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub label: String,
    pub passed: bool,
    pub observed: f64,
    pub expected: f64,
    pub tolerance: f64,
    pub mode: CheckMode,
}

/// Machine-readable result of a validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub name: String,
    pub passed: usize,
    pub total: usize,
    pub failed_labels: Vec<String>,
    pub checks: Vec<Check>,
}

/// Collects checks for one binary.
#[derive(Debug, Default)]
#[must_use]
pub struct ValidationHarness {
    pub name: String,
    pub checks: Vec<Check>,
}

impl ValidationHarness {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            checks: Vec::new(),
        }
    }

    fn record(
        &mut self,
        label: &str,
        passed: bool,
        observed: f64,
        expected: f64,
        tolerance: f64,
        mode: CheckMode,
    ) -> bool {
        self.checks.push(Check {
            label: label.to_string(),
            passed,
            observed,
            expected,
            tolerance,
            mode,
        });
        passed
    }

    /// Non-finite observations always fail.
    pub fn check_abs(&mut self, label: &str, observed: f64, expected: f64, tolerance: f64) -> bool {
        let passed = observed.is_finite() && (observed - expected).abs() <= tolerance;
        self.record(label, passed, observed, expected, tolerance, CheckMode::Absolute)
    }

    /// Falls back to an absolute comparison when `expected` is zero.
    pub fn check_rel(&mut self, label: &str, observed: f64, expected: f64, tolerance: f64) -> bool {
        let diff = (observed - expected).abs();
        let scale = if expected.abs() > f64::EPSILON {
            expected.abs()
        } else {
            1.0
        };
        let passed = observed.is_finite() && diff <= tolerance * scale;
        self.record(label, passed, observed, expected, tolerance, CheckMode::Relative)
    }

    pub fn check_upper(&mut self, label: &str, observed: f64, threshold: f64) -> bool {
        let passed = observed <= threshold;
        self.record(label, passed, observed, threshold, 0.0, CheckMode::Upper)
    }

    pub fn check_lower(&mut self, label: &str, observed: f64, threshold: f64) -> bool {
        let passed = observed >= threshold;
        self.record(label, passed, observed, threshold, 0.0, CheckMode::Lower)
    }

    pub fn check_bool(&mut self, label: &str, passed: bool) -> bool {
        let observed = f64::from(u8::from(passed));
        self.record(label, passed, observed, 1.0, 0.0, CheckMode::Boolean)
    }

    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    #[must_use]
    pub const fn total_count(&self) -> usize {
        self.checks.len()
    }

    /// Vacuously true with no checks.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    #[must_use]
    pub fn summary(&self) -> ValidationSummary {
        ValidationSummary {
            name: self.name.clone(),
            passed: self.passed_count(),
            total: self.total_count(),
            failed_labels: self
                .checks
                .iter()
                .filter(|c| !c.passed)
                .map(|c| c.label.clone())
                .collect(),
            checks: self.checks.clone(),
        }
    }

    /// Human-readable report, one line per check.
    #[must_use]
    pub fn report(&self) -> String {
        use std::fmt::Write;
        let mut s = String::new();
        let _ = writeln!(
            s,
            "═══ {}: {}/{} checks passed ═══",
            self.name,
            self.passed_count(),
            self.total_count()
        );
        for c in &self.checks {
            let icon = if c.passed { "✓" } else { "✗" };
            let _ = writeln!(
                s,
                "  {icon} {}: observed={:.6e} expected={:.6e} tol={:.2e} ({})",
                c.label, c.observed, c.expected, c.tolerance, c.mode
            );
        }
        s
    }

    /// Print the report and JSON summary, then exit 0 or 1.
    pub fn finish(&self) -> ! {
        println!();
        print!("{}", self.report());
        match serde_json::to_string(&self.summary()) {
            Ok(json) => println!("{json}"),
            Err(e) => log::error!("validation summary serialization failed: {e}"),
        }
        if self.all_passed() {
            println!("ALL CHECKS PASSED");
            process::exit(0);
        }
        println!("FAILED CHECKS: {}", self.summary().failed_labels.join(", "));
        process::exit(1);
    }
}

// SPDX-License-Identifier: AGPL-3.0-only

//! Complex f64 arithmetic for SU(3) link variables.
//!
//! The Rust type is the reference; [`WGSL_COMPLEX64`] is its shader twin and
//! is prepended to the checkerboard kernel so both sides multiply links with
//! the same operation order.

use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// Complex number with f64 real and imaginary parts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Complex64 {
    pub re: f64,
    pub im: f64,
}

impl Complex64 {
    pub const ZERO: Self = Self { re: 0.0, im: 0.0 };
    pub const ONE: Self = Self { re: 1.0, im: 0.0 };
    pub const I: Self = Self { re: 0.0, im: 1.0 };

    #[inline]
    pub const fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    #[inline]
    #[must_use]
    pub fn conj(self) -> Self {
        Self {
            re: self.re,
            im: -self.im,
        }
    }

    #[inline]
    #[must_use]
    pub fn abs_sq(self) -> f64 {
        self.re.mul_add(self.re, self.im * self.im)
    }

    #[inline]
    #[must_use]
    pub fn abs(self) -> f64 {
        self.re.hypot(self.im)
    }

    #[inline]
    #[must_use]
    pub fn scale(self, s: f64) -> Self {
        Self {
            re: self.re * s,
            im: self.im * s,
        }
    }

    /// Both parts finite (no NaN, no ±∞).
    #[inline]
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.re.is_finite() && self.im.is_finite()
    }
}

impl Add for Complex64 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl AddAssign for Complex64 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.re += rhs.re;
        self.im += rhs.im;
    }
}

impl Sub for Complex64 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.re - rhs.re, self.im - rhs.im)
    }
}

impl SubAssign for Complex64 {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        self.re -= rhs.re;
        self.im -= rhs.im;
    }
}

impl Mul for Complex64 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.re * rhs.re - self.im * rhs.im,
            self.re * rhs.im + self.im * rhs.re,
        )
    }
}

impl Neg for Complex64 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.re, -self.im)
    }
}

impl fmt::Display for Complex64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.im >= 0.0 {
            write!(f, "{:.6}+{:.6}i", self.re, self.im)
        } else {
            write!(f, "{:.6}{:.6}i", self.re, self.im)
        }
    }
}

/// WGSL shader source for Complex64 operations.
///
/// Matches the Rust-side implementation (same product ordering). Prepend to
/// any WGSL kernel that handles link matrices.
pub const WGSL_COMPLEX64: &str = r"
struct Complex64 {
    re: f64,
    im: f64,
}

fn c64_new(re: f64, im: f64) -> Complex64 {
    return Complex64(re, im);
}

fn c64_zero() -> Complex64 {
    return Complex64(f64(0.0), f64(0.0));
}

fn c64_add(a: Complex64, b: Complex64) -> Complex64 {
    return Complex64(a.re + b.re, a.im + b.im);
}

fn c64_sub(a: Complex64, b: Complex64) -> Complex64 {
    return Complex64(a.re - b.re, a.im - b.im);
}

fn c64_mul(a: Complex64, b: Complex64) -> Complex64 {
    return Complex64(a.re * b.re - a.im * b.im, a.re * b.im + a.im * b.re);
}

fn c64_conj(a: Complex64) -> Complex64 {
    return Complex64(a.re, -a.im);
}

fn c64_scale(a: Complex64, s: f64) -> Complex64 {
    return Complex64(a.re * s, a.im * s);
}

fn c64_abs_sq(a: Complex64) -> f64 {
    return a.re * a.re + a.im * a.im;
}
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_matches_hand_expansion() {
        let a = Complex64::new(1.0, 2.0);
        let b = Complex64::new(3.0, 4.0);
        let c = a * b;
        assert!((c.re - (-5.0)).abs() < 1e-15);
        assert!((c.im - 10.0).abs() < 1e-15);
    }

    #[test]
    fn conj_product_is_modulus_squared() {
        let a = Complex64::new(3.0, -4.0);
        let p = a * a.conj();
        assert!((p.re - 25.0).abs() < 1e-14);
        assert!(p.im.abs() < 1e-14);
        assert!((a.abs() - 5.0).abs() < 1e-15);
    }

    #[test]
    fn assign_ops_accumulate() {
        let mut acc = Complex64::ZERO;
        acc += Complex64::new(1.5, -0.5);
        acc += Complex64::I;
        acc -= Complex64::ONE;
        assert!((acc.re - 0.5).abs() < 1e-15);
        assert!((acc.im - 0.5).abs() < 1e-15);
        assert_eq!(-acc, Complex64::new(-0.5, -0.5));
    }

    #[test]
    fn non_finite_detected() {
        assert!(Complex64::new(1.0, 0.0).is_finite());
        assert!(!Complex64::new(f64::NAN, 0.0).is_finite());
        assert!(!Complex64::new(0.0, f64::INFINITY).is_finite());
    }

    #[test]
    fn wgsl_twin_declares_ops_used_by_kernel() {
        for f in ["c64_mul", "c64_conj", "c64_add", "c64_scale", "c64_abs_sq"] {
            assert!(WGSL_COMPLEX64.contains(f), "missing {f}");
        }
    }
}

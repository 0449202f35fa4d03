// SPDX-License-Identifier: AGPL-3.0-only

//! SU(3) matrix operations for lattice gauge theory.
//!
//! Two types:
//!
//! - [`Su3Matrix`]: any 3×3 complex matrix. Staple sums, blends and loop
//!   products live here.
//! - [`Su3`]: a matrix on the SU(3) manifold (unitary, det = 1). Built only by
//!   [`Su3::IDENTITY`], [`Su3::project`] and [`Su3::haar_random`], and the only
//!   type the lattice accepts as a link, so nothing unprojected is ever stored.
//!
//! Storage: row-major, 9 Complex64 values (18 f64).
//!
//! # References
//!
//! - Gattringer & Lang, "QCD on the Lattice" (2010), Ch. 2
//! - Mezzadri, "How to generate random matrices from the classical compact
//!   groups", Notices AMS 54 (2007)

use std::f64::consts::TAU;
use std::ops::{Add, Deref, Mul, Sub};

use serde::{Deserialize, Serialize};

use super::complex_f64::Complex64;
use super::constants::{
    BOX_MULLER_FLOOR, COMPLEX_STRIDE, LINK_STRIDE, N_COLORS, PROJECTION_NORM_GUARD, ROW_STRIDE,
};
use super::rng::UniformSource;

/// 3×3 complex matrix.
///
/// Row-major storage: `m[row][col]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[must_use]
pub struct Su3Matrix {
    /// Matrix elements m[row][col].
    pub m: [[Complex64; 3]; 3],
}

impl Mul for Su3Matrix {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        let mut r = Self::ZERO;
        for i in 0..3 {
            for j in 0..3 {
                let mut s = Complex64::ZERO;
                for k in 0..3 {
                    s += self.m[i][k] * rhs.m[k][j];
                }
                r.m[i][j] = s;
            }
        }
        r
    }
}

impl Add for Su3Matrix {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        let mut r = self;
        for (row, rhs_row) in r.m.iter_mut().zip(rhs.m.iter()) {
            for (a, b) in row.iter_mut().zip(rhs_row.iter()) {
                *a += *b;
            }
        }
        r
    }
}

impl Sub for Su3Matrix {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        let mut r = self;
        for (row, rhs_row) in r.m.iter_mut().zip(rhs.m.iter()) {
            for (a, b) in row.iter_mut().zip(rhs_row.iter()) {
                *a -= *b;
            }
        }
        r
    }
}

impl Su3Matrix {
    /// 3×3 identity matrix.
    pub const IDENTITY: Self = Self {
        m: [
            [Complex64::ONE, Complex64::ZERO, Complex64::ZERO],
            [Complex64::ZERO, Complex64::ONE, Complex64::ZERO],
            [Complex64::ZERO, Complex64::ZERO, Complex64::ONE],
        ],
    };

    /// Zero matrix (all elements 0).
    pub const ZERO: Self = Self {
        m: [[Complex64::ZERO; 3]; 3],
    };

    /// Conjugate transpose (adjoint / dagger).
    pub fn adjoint(self) -> Self {
        let mut r = Self::ZERO;
        for i in 0..3 {
            for j in 0..3 {
                r.m[i][j] = self.m[j][i].conj();
            }
        }
        r
    }

    /// Trace: Tr(U) = sum\_i `U_ii`
    pub fn trace(self) -> Complex64 {
        self.m[0][0] + self.m[1][1] + self.m[2][2]
    }

    /// Real part of trace.
    #[must_use]
    pub fn re_trace(self) -> f64 {
        self.m[0][0].re + self.m[1][1].re + self.m[2][2].re
    }

    /// Determinant of a 3×3 complex matrix.
    pub fn det(self) -> Complex64 {
        let m = &self.m;
        let a = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1]);
        let b = m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0]);
        let c = m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
        a - b + c
    }

    /// Scale by a real number.
    pub fn scale(self, s: f64) -> Self {
        let mut r = self;
        for row in &mut r.m {
            for z in row.iter_mut() {
                *z = z.scale(s);
            }
        }
        r
    }

    /// Frobenius norm squared: sum |`m_ij`|²
    #[must_use]
    pub fn norm_sq(self) -> f64 {
        self.m.iter().flatten().map(|z| z.abs_sq()).sum()
    }

    /// Frobenius norm √Σ|`m_ij`|².
    #[must_use]
    pub fn frobenius_norm(self) -> f64 {
        self.norm_sq().sqrt()
    }

    /// ‖U U† − I‖_F, zero for a unitary matrix.
    #[must_use]
    pub fn unitarity_defect(self) -> f64 {
        (self * self.adjoint() - Self::IDENTITY).frobenius_norm()
    }

    /// All 18 components finite.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.m.iter().flatten().all(|z| z.is_finite())
    }

    /// Read one link from an 18-real slice (row-major, interleaved re/im).
    pub fn from_reals(reals: &[f64]) -> Self {
        let mut r = Self::ZERO;
        for (i, row) in r.m.iter_mut().enumerate() {
            for (j, z) in row.iter_mut().enumerate() {
                let k = i * ROW_STRIDE + j * COMPLEX_STRIDE;
                *z = Complex64::new(reals[k], reals[k + 1]);
            }
        }
        r
    }

    /// Write into an 18-real slice in the layout [`Self::from_reals`] reads.
    pub fn write_reals(self, out: &mut [f64]) {
        debug_assert!(out.len() >= LINK_STRIDE);
        for (i, row) in self.m.iter().enumerate() {
            for (j, z) in row.iter().enumerate() {
                let k = i * ROW_STRIDE + j * COMPLEX_STRIDE;
                out[k] = z.re;
                out[k + 1] = z.im;
            }
        }
    }

    /// Nearest-by-rows SU(3) element, see [`Su3::project`].
    pub fn project(self) -> Su3 {
        Su3::project(self)
    }
}

/// Matrix known to lie on SU(3).
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[repr(transparent)]
#[must_use]
pub struct Su3(Su3Matrix);

impl Deref for Su3 {
    type Target = Su3Matrix;
    fn deref(&self) -> &Su3Matrix {
        &self.0
    }
}

impl From<Su3> for Su3Matrix {
    fn from(u: Su3) -> Self {
        u.0
    }
}

impl Su3 {
    pub const IDENTITY: Self = Self(Su3Matrix::IDENTITY);

    /// Underlying matrix.
    pub const fn matrix(self) -> Su3Matrix {
        self.0
    }

    /// Inverse, which for SU(3) is the adjoint.
    pub fn adjoint(self) -> Self {
        Self(self.0.adjoint())
    }

    /// Wrap a matrix read back from a buffer that only ever receives
    /// projected links.
    pub(crate) const fn from_trusted(m: Su3Matrix) -> Self {
        Self(m)
    }

    /// Project an arbitrary matrix onto SU(3).
    ///
    /// Gram–Schmidt on rows 0 and 1, then row 2 = conj(row0 × row1), which
    /// fixes det = 1. A row whose norm falls below [`PROJECTION_NORM_GUARD`]
    /// is replaced by the identity basis vector least aligned with row 0.
    /// Non-finite input maps to the identity. Idempotent on SU(3) up to
    /// rounding.
    pub fn project(a: Su3Matrix) -> Self {
        if !a.is_finite() {
            return Self::IDENTITY;
        }
        let mut r0 = a.m[0];
        let n0 = row_norm(&r0);
        if n0 < PROJECTION_NORM_GUARD {
            r0 = basis_row(0);
        } else {
            scale_row(&mut r0, 1.0 / n0);
        }

        let mut r1 = orthogonalize(a.m[1], &r0);
        let mut n1 = row_norm(&r1);
        if n1 < PROJECTION_NORM_GUARD {
            r1 = orthogonalize(basis_row(least_aligned(&r0)), &r0);
            n1 = row_norm(&r1);
        }
        scale_row(&mut r1, 1.0 / n1);

        let r2 = [
            (r0[1] * r1[2] - r0[2] * r1[1]).conj(),
            (r0[2] * r1[0] - r0[0] * r1[2]).conj(),
            (r0[0] * r1[1] - r0[1] * r1[0]).conj(),
        ];
        Self(Su3Matrix { m: [r0, r1, r2] })
    }

    /// Haar-distributed SU(3) element, blended toward identity for `t < 1`.
    ///
    /// Nine complex Gaussians (Box–Muller) projected by Gram–Schmidt give a
    /// Haar sample; for `t < 1` the result is `project((1−t)·I + t·H)`.
    /// `t` is clamped to `[0, 1]`; non-finite `t` counts as 1.
    pub fn haar_random<R: UniformSource + ?Sized>(temperature: f64, rng: &mut R) -> Self {
        let t = if temperature.is_finite() {
            temperature.clamp(0.0, 1.0)
        } else {
            1.0
        };
        let mut g = Su3Matrix::ZERO;
        for z in g.m.iter_mut().flatten() {
            *z = gaussian_pair(rng);
        }
        let h = Self::project(g);
        if t >= 1.0 {
            return h;
        }
        Self::project(Su3Matrix::IDENTITY.scale(1.0 - t) + h.0.scale(t))
    }
}

/// Box–Muller: one uniform pair → one complex N(0,1) per component.
fn gaussian_pair<R: UniformSource + ?Sized>(rng: &mut R) -> Complex64 {
    let u1 = rng.next_f64().max(BOX_MULLER_FLOOR);
    let u2 = rng.next_f64();
    let r = (-2.0 * u1.ln()).sqrt();
    let (s, c) = (TAU * u2).sin_cos();
    Complex64::new(r * c, r * s)
}

type Row = [Complex64; N_COLORS];

fn row_norm(r: &Row) -> f64 {
    r.iter().map(|z| z.abs_sq()).sum::<f64>().sqrt()
}

fn scale_row(r: &mut Row, s: f64) {
    for z in r.iter_mut() {
        *z = z.scale(s);
    }
}

/// `v − ⟨u, v⟩ u` for unit `u`.
fn orthogonalize(mut v: Row, u: &Row) -> Row {
    let dot = u
        .iter()
        .zip(v.iter())
        .fold(Complex64::ZERO, |acc, (a, b)| acc + a.conj() * *b);
    for (vj, uj) in v.iter_mut().zip(u.iter()) {
        *vj -= *uj * dot;
    }
    v
}

fn basis_row(k: usize) -> Row {
    let mut r = [Complex64::ZERO; N_COLORS];
    r[k] = Complex64::ONE;
    r
}

fn least_aligned(r: &Row) -> usize {
    let mut best = 0;
    for k in 1..N_COLORS {
        if r[k].abs_sq() < r[best].abs_sq() {
            best = k;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::rng::Mulberry32;

    fn assert_su3(u: Su3, tol: f64) {
        assert!(u.unitarity_defect() < tol, "defect {}", u.unitarity_defect());
        let d = u.det();
        assert!((d.re - 1.0).abs() < tol && d.im.abs() < tol, "det = {d}");
    }

    #[test]
    fn identity_properties() {
        let i = Su3Matrix::IDENTITY;
        assert!((i.det().re - 1.0).abs() < 1e-14);
        assert!(i.det().im.abs() < 1e-14);
        assert!((i.re_trace() - 3.0).abs() < 1e-14);
        assert!((i.frobenius_norm() - 3.0_f64.sqrt()).abs() < 1e-15);
    }

    #[test]
    fn haar_samples_are_special_unitary() {
        let mut rng = Mulberry32::new(11);
        for _ in 0..64 {
            assert_su3(Su3::haar_random(1.0, &mut rng), 1e-12);
        }
    }

    #[test]
    fn haar_trace_averages_to_zero() {
        let mut rng = Mulberry32::new(5);
        let n = 4000;
        let mut sum = Complex64::ZERO;
        for _ in 0..n {
            sum += Su3::haar_random(1.0, &mut rng).trace();
        }
        let mean = sum.scale(1.0 / f64::from(n));
        assert!(mean.abs() < 0.06, "mean trace {mean}");
    }

    #[test]
    fn zero_temperature_is_identity() {
        let mut rng = Mulberry32::new(3);
        let u = Su3::haar_random(0.0, &mut rng);
        assert!((u.matrix() - Su3Matrix::IDENTITY).frobenius_norm() < 1e-14);
    }

    #[test]
    fn small_temperature_stays_near_identity() {
        let mut rng = Mulberry32::new(8);
        let u = Su3::haar_random(0.05, &mut rng);
        assert_su3(u, 1e-12);
        assert!(u.re_trace() > 2.5);
        let v = Su3::haar_random(f64::NAN, &mut rng);
        assert_su3(v, 1e-12);
    }

    #[test]
    fn project_is_idempotent() {
        let mut rng = Mulberry32::new(21);
        let u = Su3::haar_random(1.0, &mut rng);
        let again = Su3::project(u.matrix());
        assert!((again.matrix() - u.matrix()).frobenius_norm() < 1e-14);
    }

    #[test]
    fn project_fixes_drift() {
        let mut rng = Mulberry32::new(999);
        let mut m = Su3::haar_random(0.5, &mut rng).matrix();
        m.m[0][0].re += 0.1;
        m.m[1][2].im -= 0.05;
        assert!(m.unitarity_defect() > 1e-3);
        assert_su3(m.project(), 1e-12);
    }

    #[test]
    fn project_degenerate_inputs() {
        assert_eq!(Su3::project(Su3Matrix::ZERO), Su3::IDENTITY);

        let mut parallel = Su3Matrix::ZERO;
        parallel.m[0] = [Complex64::ONE, Complex64::ONE, Complex64::ZERO];
        parallel.m[1] = parallel.m[0];
        assert_su3(Su3::project(parallel), 1e-12);

        let mut bad = Su3Matrix::IDENTITY;
        bad.m[2][1].re = f64::NAN;
        assert_eq!(Su3::project(bad), Su3::IDENTITY);
    }

    #[test]
    fn reals_layout_roundtrip_matches_indices() {
        let mut buf = [0.0; LINK_STRIDE];
        let mut m = Su3Matrix::ZERO;
        m.m[1][2] = Complex64::new(4.0, -5.0);
        m.write_reals(&mut buf);
        assert!((buf[ROW_STRIDE + 2 * COMPLEX_STRIDE] - 4.0).abs() < f64::EPSILON);
        assert!((buf[ROW_STRIDE + 2 * COMPLEX_STRIDE + 1] + 5.0).abs() < f64::EPSILON);
        assert_eq!(Su3Matrix::from_reals(&buf), m);
    }

    #[test]
    fn product_of_su3_is_su3() {
        let mut rng = Mulberry32::new(77);
        let a = Su3::haar_random(1.0, &mut rng);
        let b = Su3::haar_random(1.0, &mut rng);
        let p = a.matrix() * b.matrix() * b.adjoint().matrix();
        assert!((p - a.matrix()).frobenius_norm() < 1e-13);
    }
}

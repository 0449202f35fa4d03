// SPDX-License-Identifier: AGPL-3.0-only

//! Gauge-invariant observables.
//!
//! | Observable | Definition |
//! |------------|------------|
//! | Plaquette | ⟨Re Tr `U_μ(x) U_ν(x+μ) U_μ†(x+ν) U_ν†(x)` / 3⟩ |
//! | Wilson loop W(I,J) | ⟨Re Tr (I×J rectangle) / 3⟩ |
//! | Creutz ratio χ(I,J) | −ln(W(I,J)·W(I−1,J−1) / (W(I,J−1)·W(I−1,J))) |
//! | Polyakov loop | ⟨Tr ∏ links around the periodic axis / 3⟩ |
//!
//! The Wilson grid builds per-site line products once per plane and reuses
//! them for every rectangle size.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::complex_f64::Complex64;
use super::constants::N_COLORS;
use super::gauge::{Axis, Coord, GaugeLattice};
use super::stats::{bin_samples_with, jackknife, JackknifeEstimate};
use super::su3::{Su3, Su3Matrix};
use crate::error::{LatticeError, LatticeResult};

const INV_COLORS: f64 = 1.0 / N_COLORS as f64;

/// Plaquette `P_μν(x) = U_μ(x) U_ν(x+μ) U_μ†(x+ν) U_ν†(x)`.
pub fn plaquette(lattice: &GaugeLattice, x: Coord, mu: usize, nu: usize) -> Su3Matrix {
    let x_mu = lattice.shift(x, mu, 1);
    let x_nu = lattice.shift(x, nu, 1);
    lattice.link(x, mu).matrix()
        * lattice.link(x_mu, nu).matrix()
        * lattice.link(x_nu, mu).adjoint().matrix()
        * lattice.link(x, nu).adjoint().matrix()
}

/// Average plaquette ⟨Re Tr P / 3⟩ over sites and unordered axis pairs.
///
/// A lattice with fewer than two active axes has no plaquettes; it reports
/// the ordered value 1.0.
#[must_use]
pub fn average_plaquette(lattice: &GaugeLattice) -> f64 {
    let n = lattice.n_axes();
    let mut sum = 0.0;
    let mut count = 0usize;
    for x in lattice.sites() {
        for mu in 0..n {
            for nu in (mu + 1)..n {
                sum += plaquette(lattice, x, mu, nu).re_trace() * INV_COLORS;
                count += 1;
            }
        }
    }
    if count == 0 {
        1.0
    } else {
        sum / count as f64
    }
}

/// Ordered pair of axes spanning a Wilson loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Plane {
    pub first: Axis,
    pub second: Axis,
}

impl Plane {
    #[must_use]
    pub const fn new(first: Axis, second: Axis) -> Self {
        Self { first, second }
    }

    /// Every unordered pair of active axes, in slot order.
    #[must_use]
    pub fn all_active(lattice: &GaugeLattice) -> Vec<Self> {
        let axes = lattice.axes();
        let mut planes = Vec::new();
        for (i, &a) in axes.iter().enumerate() {
            for &b in &axes[i + 1..] {
                planes.push(Self::new(a, b));
            }
        }
        planes
    }

    fn slots(self, lattice: &GaugeLattice) -> LatticeResult<(usize, usize)> {
        let mu = lattice
            .slot(self.first)
            .ok_or(LatticeError::InactiveAxis(self.first))?;
        let nu = lattice
            .slot(self.second)
            .ok_or(LatticeError::InactiveAxis(self.second))?;
        Ok((mu, nu))
    }
}

/// One rectangle measurement.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WilsonMeasurement {
    /// Re of `normalized`.
    pub value: f64,
    /// Site-averaged Tr / 3.
    pub normalized: Complex64,
}

/// Measure the `ex × ey` rectangle: `ex` steps along `plane.first`, `ey`
/// along `plane.second`, then back.
///
/// # Errors
///
/// [`LatticeError::InactiveAxis`] if the plane uses an inactive axis.
pub fn measure_wilson_rectangle(
    lattice: &GaugeLattice,
    ex: usize,
    ey: usize,
    plane: Plane,
) -> LatticeResult<WilsonMeasurement> {
    let (mu, nu) = plane.slots(lattice)?;
    let mut sum = Complex64::ZERO;
    for x in lattice.sites() {
        let mut y = x;
        let mut p = Su3Matrix::IDENTITY;
        for _ in 0..ex {
            p = p * lattice.link(y, mu).matrix();
            y = lattice.shift(y, mu, 1);
        }
        for _ in 0..ey {
            p = p * lattice.link(y, nu).matrix();
            y = lattice.shift(y, nu, 1);
        }
        for _ in 0..ex {
            y = lattice.shift(y, mu, -1);
            p = p * lattice.link(y, mu).adjoint().matrix();
        }
        for _ in 0..ey {
            y = lattice.shift(y, nu, -1);
            p = p * lattice.link(y, nu).adjoint().matrix();
        }
        sum += p.trace();
    }
    let normalized = sum.scale(INV_COLORS / lattice.volume() as f64);
    Ok(WilsonMeasurement {
        value: normalized.re,
        normalized,
    })
}

/// Serialized form of one table entry.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WilsonLoopEntry {
    pub extent_x: usize,
    pub extent_y: usize,
    pub plane: Plane,
    pub value: f64,
}

/// `(extent_x, extent_y, plane) → W`, zero extents included (W = 1).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<WilsonLoopEntry>", into = "Vec<WilsonLoopEntry>")]
pub struct WilsonLoopTable {
    values: BTreeMap<(usize, usize, Plane), f64>,
}

impl WilsonLoopTable {
    #[must_use]
    pub fn value(&self, extent_x: usize, extent_y: usize, plane: Plane) -> Option<f64> {
        self.values.get(&(extent_x, extent_y, plane)).copied()
    }

    pub fn insert(&mut self, extent_x: usize, extent_y: usize, plane: Plane, value: f64) {
        self.values.insert((extent_x, extent_y, plane), value);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = WilsonLoopEntry> + '_ {
        self.values
            .iter()
            .map(|(&(extent_x, extent_y, plane), &value)| WilsonLoopEntry {
                extent_x,
                extent_y,
                plane,
                value,
            })
    }

    /// Entrywise mean over the keys every table shares.
    #[must_use]
    pub fn mean(tables: &[Self]) -> Self {
        let Some((first, rest)) = tables.split_first() else {
            return Self::default();
        };
        let n = tables.len() as f64;
        let values = first
            .values
            .iter()
            .filter_map(|(key, &v0)| {
                rest.iter()
                    .try_fold(v0, |acc, t| t.values.get(key).map(|v| acc + v))
                    .map(|sum| (*key, sum / n))
            })
            .collect();
        Self { values }
    }
}

impl From<Vec<WilsonLoopEntry>> for WilsonLoopTable {
    fn from(entries: Vec<WilsonLoopEntry>) -> Self {
        let mut table = Self::default();
        for e in entries {
            table.insert(e.extent_x, e.extent_y, e.plane, e.value);
        }
        table
    }
}

impl From<WilsonLoopTable> for Vec<WilsonLoopEntry> {
    fn from(table: WilsonLoopTable) -> Self {
        table.entries().collect()
    }
}

/// `lines[k][site]`: product of `k` consecutive links along `mu` from `site`.
fn line_products(lattice: &GaugeLattice, mu: usize, max_len: usize) -> Vec<Vec<Su3Matrix>> {
    let volume = lattice.volume();
    let mut lines = Vec::with_capacity(max_len + 1);
    lines.push(vec![Su3Matrix::IDENTITY; volume]);
    for k in 1..=max_len {
        let prev = &lines[k - 1];
        let next: Vec<Su3Matrix> = (0..volume)
            .map(|site| {
                let x = lattice.site_coords(site);
                let end = lattice.site_index(lattice.shift(x, mu, (k - 1) as isize));
                prev[site] * lattice.link_at(end, mu).matrix()
            })
            .collect();
        lines.push(next);
    }
    lines
}

/// All rectangles `0..=max_x × 0..=max_y` in each plane.
///
/// An empty `planes` slice means every active pair.
///
/// # Errors
///
/// [`LatticeError::InactiveAxis`] if a requested plane uses an inactive axis.
pub fn measure_wilson_loop_grid(
    lattice: &GaugeLattice,
    max_x: usize,
    max_y: usize,
    planes: &[Plane],
) -> LatticeResult<WilsonLoopTable> {
    let planes = if planes.is_empty() {
        Plane::all_active(lattice)
    } else {
        planes.to_vec()
    };
    let volume = lattice.volume();
    let mut table = WilsonLoopTable::default();

    for plane in planes {
        let (mu, nu) = plane.slots(lattice)?;
        let lines_mu = line_products(lattice, mu, max_x);
        let lines_nu = line_products(lattice, nu, max_y);
        for i in 0..=max_x {
            for j in 0..=max_y {
                if i == 0 || j == 0 {
                    table.insert(i, j, plane, 1.0);
                    continue;
                }
                let mut sum = 0.0;
                for site in 0..volume {
                    let x = lattice.site_coords(site);
                    let x_i = lattice.site_index(lattice.shift(x, mu, i as isize));
                    let x_j = lattice.site_index(lattice.shift(x, nu, j as isize));
                    let loop_matrix = lines_mu[i][site]
                        * lines_nu[j][x_i]
                        * lines_mu[i][x_j].adjoint()
                        * lines_nu[j][site].adjoint();
                    sum += loop_matrix.re_trace();
                }
                table.insert(i, j, plane, sum * INV_COLORS / volume as f64);
            }
        }
    }
    Ok(table)
}

/// Creutz ratio χ(I, J) from a measured table.
///
/// `None` when `I` or `J` is 0, a constituent loop is missing, or the loop
/// ratio is not a positive finite number.
#[must_use]
pub fn creutz_ratio(table: &WilsonLoopTable, i: usize, j: usize, plane: Plane) -> Option<f64> {
    if i == 0 || j == 0 {
        return None;
    }
    let w_ij = table.value(i, j, plane)?;
    let w_mm = table.value(i - 1, j - 1, plane)?;
    let w_im = table.value(i, j - 1, plane)?;
    let w_mj = table.value(i - 1, j, plane)?;
    let ratio = (w_ij * w_mm) / (w_im * w_mj);
    (ratio.is_finite() && ratio > 0.0).then(|| -ratio.ln())
}

/// Jackknifed χ(I, J) over per-configuration tables.
///
/// Tables are averaged in bins of `bin_size` (partial bin dropped); each
/// jackknife subset evaluates χ on the mean of its bins. A subset whose
/// ratio is undefined yields NaN, which propagates into the estimate.
///
/// # Errors
///
/// [`LatticeError::InsufficientSamples`] with fewer than two full bins.
pub fn creutz_jackknife(
    tables: &[WilsonLoopTable],
    bin_size: usize,
    i: usize,
    j: usize,
    plane: Plane,
) -> LatticeResult<JackknifeEstimate> {
    let bins = bin_samples_with(tables, bin_size, WilsonLoopTable::mean);
    jackknife(&bins, |subset| {
        creutz_ratio(&WilsonLoopTable::mean(subset), i, j, plane).unwrap_or(f64::NAN)
    })
}

/// Polyakov loop along one axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolyakovMeasurement {
    pub average: Complex64,
    /// |average|.
    pub magnitude: f64,
    /// Number of transverse sites averaged (volume / extent).
    pub sample_count: usize,
}

/// Trace of the product of links once around `axis`, averaged over every
/// transverse site.
///
/// # Errors
///
/// [`LatticeError::InactiveAxis`] if `axis` has no link slot.
pub fn measure_polyakov_loop(
    lattice: &GaugeLattice,
    axis: Axis,
) -> LatticeResult<PolyakovMeasurement> {
    let mu = lattice.slot(axis).ok_or(LatticeError::InactiveAxis(axis))?;
    let extent = lattice.extent(axis);
    let mut sum = Complex64::ZERO;
    let mut sample_count = 0usize;
    for start in lattice.sites().filter(|x| x[axis.dim()] == 0) {
        let mut y = start;
        let mut p = Su3Matrix::IDENTITY;
        for _ in 0..extent {
            p = p * lattice.link(y, mu).matrix();
            y = lattice.shift(y, mu, 1);
        }
        sum += p.trace().scale(INV_COLORS);
        sample_count += 1;
    }
    let average = sum.scale(1.0 / sample_count.max(1) as f64);
    Ok(PolyakovMeasurement {
        average,
        magnitude: average.abs(),
        sample_count,
    })
}

/// Gauge rotation `U_μ(x) → g(x) U_μ(x) g(x+μ)†`, one `g` per site.
///
/// # Errors
///
/// [`LatticeError::TransformCount`] unless there is exactly one transform
/// per site.
pub fn apply_gauge_transform(lattice: &mut GaugeLattice, transforms: &[Su3]) -> LatticeResult<()> {
    if transforms.len() != lattice.volume() {
        return Err(LatticeError::TransformCount {
            expected: lattice.volume(),
            got: transforms.len(),
        });
    }
    for site in 0..lattice.volume() {
        let x = lattice.site_coords(site);
        for mu in 0..lattice.n_axes() {
            let x_mu = lattice.site_index(lattice.shift(x, mu, 1));
            let rotated = transforms[site].matrix()
                * lattice.link_at(site, mu).matrix()
                * transforms[x_mu].adjoint().matrix();
            lattice.set_link_at(site, mu, Su3::project(rotated));
        }
    }
    Ok(())
}

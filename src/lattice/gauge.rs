// SPDX-License-Identifier: AGPL-3.0-only

//! Periodic link storage.
//!
//! One contiguous `Vec<f64>` holds 18 reals per (site, active axis slot):
//!
//! | stride | reals |
//! |--------|-------|
//! | complex | 2 |
//! | row | 6 |
//! | link | 18 |
//! | site | 18 · `n_axes` |
//!
//! Site index `x + W·(y + H·(z + D·t))`. Axes without an extent are inactive:
//! their coordinate is always 0 and they own no link slot. The GPU kernel
//! reads this exact layout through [`GaugeLattice::layout`].

use std::fmt;

use serde::{Deserialize, Serialize};

use super::constants::{COMPLEX_STRIDE, LINK_STRIDE, MAX_AXES, ROW_STRIDE};
use super::su3::{Su3, Su3Matrix};
use crate::error::{LatticeError, LatticeResult};

/// Lattice coordinate, indexed by [`Axis::dim`]. Inactive axes stay 0.
pub type Coord = [usize; MAX_AXES];

/// Spacetime axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
    T,
}

impl Axis {
    pub const ALL: [Self; MAX_AXES] = [Self::X, Self::Y, Self::Z, Self::T];

    /// Position in [`Coord`].
    #[must_use]
    pub const fn dim(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
            Self::T => 3,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Z => "z",
            Self::T => "t",
        };
        f.write_str(name)
    }
}

/// Lattice extents. Omitted `depth` / `temporal_extent` leave Z / T inactive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatticeDims {
    pub width: usize,
    pub height: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal_extent: Option<usize>,
}

impl LatticeDims {
    #[must_use]
    pub const fn plane(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            depth: None,
            temporal_extent: None,
        }
    }

    #[must_use]
    pub const fn with_depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }

    #[must_use]
    pub const fn with_temporal_extent(mut self, extent: usize) -> Self {
        self.temporal_extent = Some(extent);
        self
    }
}

impl Default for LatticeDims {
    fn default() -> Self {
        Self::plane(8, 8)
    }
}

/// Strides of the flat link buffer, in reals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkLayout {
    pub site_stride: usize,
    pub link_stride: usize,
    pub row_stride: usize,
    pub complex_stride: usize,
}

/// SU(3) gauge configuration on a periodic lattice.
#[derive(Clone, Debug, PartialEq)]
pub struct GaugeLattice {
    dims: LatticeDims,
    extents: Coord,
    axes: Vec<Axis>,
    volume: usize,
    links: Vec<f64>,
}

impl GaugeLattice {
    /// Cold lattice: every link is the identity.
    ///
    /// # Errors
    ///
    /// [`LatticeError::InvalidExtent`] if any given extent is zero.
    pub fn new(dims: LatticeDims) -> LatticeResult<Self> {
        let (extents, axes) = resolve_dims(dims)?;
        let volume = extents.iter().product::<usize>();
        let mut lattice = Self {
            dims,
            extents,
            links: vec![0.0; volume * axes.len() * LINK_STRIDE],
            axes,
            volume,
        };
        lattice.fill_identity();
        Ok(lattice)
    }

    /// Adopt a caller-supplied buffer without copying.
    ///
    /// Every link is projected onto SU(3) in place, so zeroed or drifted
    /// input still yields valid links.
    ///
    /// # Errors
    ///
    /// [`LatticeError::InvalidExtent`] for a zero extent,
    /// [`LatticeError::BufferLength`] if the buffer does not match the dims.
    pub fn from_buffer(dims: LatticeDims, mut links: Vec<f64>) -> LatticeResult<Self> {
        let (extents, axes) = resolve_dims(dims)?;
        let volume = extents.iter().product::<usize>();
        let expected = volume * axes.len() * LINK_STRIDE;
        if links.len() != expected {
            return Err(LatticeError::BufferLength {
                expected,
                got: links.len(),
            });
        }
        for link in links.chunks_exact_mut(LINK_STRIDE) {
            Su3::project(Su3Matrix::from_reals(link))
                .matrix()
                .write_reals(link);
        }
        Ok(Self {
            dims,
            extents,
            axes,
            volume,
            links,
        })
    }

    #[must_use]
    pub const fn dims(&self) -> LatticeDims {
        self.dims
    }

    /// Active axes in slot order.
    #[must_use]
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    #[must_use]
    pub fn n_axes(&self) -> usize {
        self.axes.len()
    }

    /// Slot of an active axis.
    #[must_use]
    pub fn slot(&self, axis: Axis) -> Option<usize> {
        self.axes.iter().position(|&a| a == axis)
    }

    /// Extent along an axis (1 for inactive axes).
    #[must_use]
    pub const fn extent(&self, axis: Axis) -> usize {
        self.extents[axis.dim()]
    }

    #[must_use]
    pub const fn extents(&self) -> Coord {
        self.extents
    }

    #[must_use]
    pub const fn volume(&self) -> usize {
        self.volume
    }

    #[must_use]
    pub fn layout(&self) -> LinkLayout {
        LinkLayout {
            site_stride: LINK_STRIDE * self.axes.len(),
            link_stride: LINK_STRIDE,
            row_stride: ROW_STRIDE,
            complex_stride: COMPLEX_STRIDE,
        }
    }

    /// Linear site index `x + W·(y + H·(z + D·t))`.
    #[must_use]
    pub fn site_index(&self, coord: Coord) -> usize {
        let mut index = 0;
        for d in (0..MAX_AXES).rev() {
            index = index * self.extents[d] + coord[d] % self.extents[d];
        }
        index
    }

    /// Inverse of [`Self::site_index`].
    #[must_use]
    pub fn site_coords(&self, mut index: usize) -> Coord {
        let mut coord = [0; MAX_AXES];
        for (c, &e) in coord.iter_mut().zip(self.extents.iter()) {
            *c = index % e;
            index /= e;
        }
        coord
    }

    /// Checkerboard colour: coordinate sum mod 2.
    #[must_use]
    pub fn parity(coord: Coord) -> usize {
        coord.iter().sum::<usize>() % 2
    }

    /// Move `k` steps along slot `mu`, wrapping periodically.
    #[must_use]
    pub fn shift(&self, mut coord: Coord, mu: usize, k: isize) -> Coord {
        let d = self.axes[mu].dim();
        let extent = self.extents[d];
        let step = k.unsigned_abs() % extent;
        coord[d] = if k >= 0 {
            (coord[d] + step) % extent
        } else {
            (coord[d] + extent - step) % extent
        };
        coord
    }

    /// All coordinates in site-index order.
    pub fn sites(&self) -> impl Iterator<Item = Coord> + '_ {
        (0..self.volume).map(|i| self.site_coords(i))
    }

    #[inline]
    fn offset(&self, site: usize, mu: usize) -> usize {
        (site * self.axes.len() + mu) * LINK_STRIDE
    }

    /// Link `U_mu(x)`.
    pub fn link(&self, coord: Coord, mu: usize) -> Su3 {
        self.link_at(self.site_index(coord), mu)
    }

    /// Link by linear site index.
    pub fn link_at(&self, site: usize, mu: usize) -> Su3 {
        let o = self.offset(site, mu);
        Su3::from_trusted(Su3Matrix::from_reals(&self.links[o..o + LINK_STRIDE]))
    }

    pub fn set_link(&mut self, coord: Coord, mu: usize, u: Su3) {
        let site = self.site_index(coord);
        self.set_link_at(site, mu, u);
    }

    pub fn set_link_at(&mut self, site: usize, mu: usize, u: Su3) {
        let o = self.offset(site, mu);
        u.matrix().write_reals(&mut self.links[o..o + LINK_STRIDE]);
    }

    /// Reset every link to the identity.
    pub fn fill_identity(&mut self) {
        for link in self.links.chunks_exact_mut(LINK_STRIDE) {
            Su3Matrix::IDENTITY.write_reals(link);
        }
    }

    /// Raw link buffer.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.links
    }

    /// Mutable raw buffer for kernels that write projected links only.
    pub(crate) fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.links
    }

    /// Hand the buffer back to the caller.
    #[must_use]
    pub fn into_buffer(self) -> Vec<f64> {
        self.links
    }
}

fn resolve_dims(dims: LatticeDims) -> LatticeResult<(Coord, Vec<Axis>)> {
    let given = [
        Some(dims.width),
        Some(dims.height),
        dims.depth,
        dims.temporal_extent,
    ];
    let mut extents = [1; MAX_AXES];
    let mut axes = Vec::with_capacity(MAX_AXES);
    for (axis, extent) in Axis::ALL.into_iter().zip(given) {
        if let Some(extent) = extent {
            if extent == 0 {
                return Err(LatticeError::InvalidExtent { axis, extent });
            }
            extents[axis.dim()] = extent;
            axes.push(axis);
        }
    }
    Ok((extents, axes))
}

// SPDX-License-Identifier: AGPL-3.0-only

//! Deterministic random numbers for the update engine.
//!
//! - [`Mulberry32`]: the 32-bit mulberry32 generator, uniform `u32 / 2³²`.
//! - [`Mulberry32Stream`]: splits a run seed into independent child
//!   generators (stream 0 initializes, stream 1 drives sweeps).
//! - [`site_seed`]: stateless hash of `(global, scope, site, sweep)`. The WGSL
//!   kernel carries the same function, so CPU and GPU sub-sweeps seed each
//!   site identically.
//!
//! No global generator exists; every consumer takes `&mut impl UniformSource`.

use super::constants::GOLDEN_GAMMA_32;

/// Anything that yields uniform draws in `[0, 1)`.
pub trait UniformSource {
    fn next_f64(&mut self) -> f64;
}

impl<F: FnMut() -> f64> UniformSource for F {
    #[inline]
    fn next_f64(&mut self) -> f64 {
        self()
    }
}

/// mulberry32 generator state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    const INCREMENT: u32 = 0x6D2B_79F5;

    #[must_use]
    pub const fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Next raw 32-bit output.
    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(Self::INCREMENT);
        let s = self.state;
        let mut t = (s ^ (s >> 15)).wrapping_mul(1 | s);
        t = t.wrapping_add((t ^ (t >> 7)).wrapping_mul(61 | t)) ^ t;
        t ^ (t >> 14)
    }
}

impl UniformSource for Mulberry32 {
    #[inline]
    fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / 4_294_967_296.0
    }
}

/// Parent generator that hands out decorrelated children.
#[derive(Clone, Debug)]
pub struct Mulberry32Stream {
    parent: Mulberry32,
    spawned: u32,
}

impl Mulberry32Stream {
    #[must_use]
    pub const fn new(seed: u32) -> Self {
        Self {
            parent: Mulberry32::new(seed),
            spawned: 0,
        }
    }

    /// Next child generator. Children are seeded from parent draws passed
    /// through the finalizer, so adjacent children share no state prefix.
    pub fn split(&mut self) -> Mulberry32 {
        let draw = self.parent.next_u32();
        let child_seed = mix32(draw ^ self.spawned.wrapping_mul(GOLDEN_GAMMA_32));
        self.spawned = self.spawned.wrapping_add(1);
        Mulberry32::new(child_seed)
    }

    /// Number of children handed out so far.
    #[must_use]
    pub const fn spawned(&self) -> u32 {
        self.spawned
    }
}

/// murmur3 32-bit finalizer.
#[inline]
#[must_use]
pub const fn mix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85EB_CA6B);
    h ^= h >> 13;
    h = h.wrapping_mul(0xC2B2_AE35);
    h ^= h >> 16;
    h
}

/// Per-site seed for parallel sub-sweeps and disposable scan sweeps.
///
/// Must stay bit-identical to `site_seed` in `shaders/lattice_preamble.wgsl`.
#[inline]
#[must_use]
pub const fn site_seed(global: u32, scope: u32, site: u32, sweep: u32) -> u32 {
    let mut h = mix32(global.wrapping_add(GOLDEN_GAMMA_32));
    h = mix32(h ^ scope);
    h = mix32(h ^ site.wrapping_mul(0x27D4_EB2F));
    mix32(h ^ sweep.wrapping_mul(0x1656_67B1))
}

// SPDX-License-Identifier: AGPL-3.0-only

//! wgpu compute kernel for checkerboard sub-sweeps.
//!
//! One sub-sweep is one submission:
//!
//! ```text
//! upload links ─► seed fill pass ─► update pass ─► copy to staging
//!                                                   │
//!                                   map, copy out ◄─┘
//! ```
//!
//! The kernel mirrors [`super::checkerboard::checkerboard_sub_sweep`]: same
//! layout, same per-site seeds, same blend weights. Transcendentals run in
//! f32, so CPU and GPU agree to rounding rather than bit-for-bit.
//!
//! Every failure path (no adapter, shader rejected, mapping error, odd
//! extents, buffer mismatch) logs a warning and declines; callers then run
//! the CPU reference.

use log::{debug, warn};

use super::checkerboard::SubSweep;
use super::complex_f64::WGSL_COMPLEX64;
use super::constants::{
    COMPLEX_STRIDE, HEATBATH_COUPLING_DIVISOR, HEATBATH_NOISE_SCALE, HEATBATH_STAPLE_FLOOR,
    LINK_STRIDE, MAX_AXES, PROJECTION_NORM_GUARD, ROW_STRIDE,
};
use super::gauge::{GaugeLattice, LinkLayout};
use crate::gpu::GpuF64;

/// Threads per workgroup in both kernels.
pub const WORKGROUP_SIZE: u32 = 64;

/// Box–Muller floor on the GPU (f32 `log`).
const GPU_BOX_MULLER_FLOOR: f64 = 1e-30;

const WGSL_LATTICE_PREAMBLE: &str = include_str!("shaders/lattice_preamble.wgsl");
const WGSL_SEED_FILL: &str = include_str!("shaders/seed_fill.wgsl");
const WGSL_CHECKERBOARD_UPDATE: &str = include_str!("shaders/checkerboard_update.wgsl");

/// Constants shared with `constants.rs`, emitted as WGSL.
fn kernel_constants() -> String {
    format!(
        "const HB_STAPLE_FLOOR: f32 = {HEATBATH_STAPLE_FLOOR:?};\n\
         const HB_NOISE_SCALE: f32 = {HEATBATH_NOISE_SCALE:?};\n\
         const HB_COUPLING_DIVISOR: f32 = {HEATBATH_COUPLING_DIVISOR:?};\n\
         const PROJ_GUARD: f32 = {PROJECTION_NORM_GUARD:?};\n\
         const BM_FLOOR: f32 = {GPU_BOX_MULLER_FLOOR:?};\n"
    )
}

fn assemble(body: &str) -> String {
    [WGSL_COMPLEX64, &kernel_constants(), WGSL_LATTICE_PREAMBLE, body].concat()
}

/// Full WGSL source of the seed-fill kernel.
#[must_use]
pub fn seed_fill_source() -> String {
    assemble(WGSL_SEED_FILL)
}

/// Full WGSL source of the update kernel.
#[must_use]
pub fn update_source() -> String {
    assemble(WGSL_CHECKERBOARD_UPDATE)
}

/// Shape of the link buffer as the kernel sees it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KernelGeometry {
    /// Extents indexed by coordinate dimension (1 for inactive axes).
    pub extents: [u32; MAX_AXES],
    /// Coordinate dimension of each active slot.
    pub slot_dims: [u32; MAX_AXES],
    pub n_axes: u32,
    pub volume: u32,
    pub layout: LinkLayout,
}

impl KernelGeometry {
    /// Geometry of a lattice; `None` if it does not fit in u32 indexing.
    #[must_use]
    pub fn from_lattice(lattice: &GaugeLattice) -> Option<Self> {
        let mut extents = [1u32; MAX_AXES];
        for (dst, &e) in extents.iter_mut().zip(lattice.extents().iter()) {
            *dst = u32::try_from(e).ok()?;
        }
        let mut slot_dims = [0u32; MAX_AXES];
        for (dst, axis) in slot_dims.iter_mut().zip(lattice.axes()) {
            *dst = axis.dim() as u32;
        }
        u32::try_from(lattice.as_slice().len()).ok()?;
        Some(Self {
            extents,
            slot_dims,
            n_axes: u32::try_from(lattice.n_axes()).ok()?,
            volume: u32::try_from(lattice.volume()).ok()?,
            layout: lattice.layout(),
        })
    }

    /// Reals the buffer must hold.
    #[must_use]
    pub fn expected_len(&self) -> usize {
        self.volume as usize * self.layout.site_stride
    }

    /// Every active extent even, so one parity never neighbours itself across
    /// the periodic wrap.
    #[must_use]
    pub fn parity_independent(&self) -> bool {
        self.slot_dims[..self.n_axes as usize]
            .iter()
            .all(|&d| self.extents[d as usize] % 2 == 0)
    }

    fn decline_reason(&self, links_len: usize, desc: &SubSweep) -> Option<String> {
        let l = self.layout;
        if l.link_stride != LINK_STRIDE
            || l.row_stride != ROW_STRIDE
            || l.complex_stride != COMPLEX_STRIDE
            || l.site_stride != LINK_STRIDE * self.n_axes as usize
        {
            return Some(format!("unsupported layout {l:?}"));
        }
        if links_len != self.expected_len() {
            return Some(format!(
                "buffer holds {links_len} reals, geometry needs {}",
                self.expected_len()
            ));
        }
        if !self.parity_independent() {
            return Some(format!("odd extent in {:?}", self.extents));
        }
        if desc.axis_slot >= self.n_axes as usize {
            return Some(format!("slot {} out of range", desc.axis_slot));
        }
        None
    }
}

/// Uniform block, layout-identical to `Params` in the WGSL preamble.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct KernelParams {
    extents: [u32; 4],
    slot_dims: [u32; 4],
    n_axes: u32,
    site_stride: u32,
    link_stride: u32,
    row_stride: u32,
    complex_stride: u32,
    axis_slot: u32,
    parity: u32,
    sweep_index: u32,
    seed: u32,
    scope: u32,
    over_relaxation: u32,
    volume: u32,
    beta: f64,
    _pad: [u32; 2],
}

impl KernelParams {
    fn new(geometry: &KernelGeometry, desc: &SubSweep) -> Self {
        let l = geometry.layout;
        Self {
            extents: geometry.extents,
            slot_dims: geometry.slot_dims,
            n_axes: geometry.n_axes,
            site_stride: l.site_stride as u32,
            link_stride: l.link_stride as u32,
            row_stride: l.row_stride as u32,
            complex_stride: l.complex_stride as u32,
            axis_slot: desc.axis_slot as u32,
            parity: (desc.parity & 1) as u32,
            sweep_index: desc.sweep_index,
            seed: desc.seed,
            scope: desc.scope(),
            over_relaxation: u32::try_from(desc.over_relaxation).unwrap_or(u32::MAX),
            volume: geometry.volume,
            beta: desc.beta,
            _pad: [0; 2],
        }
    }
}

/// Compiled checkerboard pipelines on an f64-capable device.
pub struct GpuCheckerboard {
    gpu: GpuF64,
    seed_fill: wgpu::ComputePipeline,
    update: wgpu::ComputePipeline,
}

impl GpuCheckerboard {
    /// Open a device and compile both kernels; `None` (with a warning) if
    /// either step fails.
    pub async fn acquire() -> Option<Self> {
        match GpuF64::new().await {
            Ok(gpu) => Self::with_device(gpu).await,
            Err(e) => {
                warn!("GPU checkerboard unavailable: {e}");
                None
            }
        }
    }

    /// Compile the kernels on an existing device.
    pub async fn with_device(gpu: GpuF64) -> Option<Self> {
        gpu.device().push_error_scope(wgpu::ErrorFilter::Validation);
        let seed_fill = gpu.create_pipeline(&seed_fill_source(), "lattice_seed_fill");
        let update = gpu.create_pipeline(&update_source(), "lattice_checkerboard_update");
        if let Some(err) = gpu.device().pop_error_scope().await {
            warn!("GPU checkerboard shader rejected: {err}");
            return None;
        }
        debug!("GPU checkerboard pipelines ready on {}", gpu.adapter_name);
        Some(Self {
            gpu,
            seed_fill,
            update,
        })
    }

    #[must_use]
    pub fn adapter_name(&self) -> &str {
        &self.gpu.adapter_name
    }

    /// Run one sub-sweep on `links` in place.
    ///
    /// Returns `false` without touching `links` when the kernel declines or
    /// fails.
    pub async fn sub_sweep(
        &self,
        links: &mut [f64],
        geometry: &KernelGeometry,
        desc: &SubSweep,
    ) -> bool {
        if let Some(reason) = geometry.decline_reason(links.len(), desc) {
            debug!("GPU sub-sweep declined: {reason}");
            return false;
        }
        match self.dispatch(links, geometry, desc).await {
            Ok(updated) => {
                links.copy_from_slice(&updated);
                true
            }
            Err(reason) => {
                warn!("GPU sub-sweep failed, falling back to CPU: {reason}");
                false
            }
        }
    }

    async fn dispatch(
        &self,
        links: &[f64],
        geometry: &KernelGeometry,
        desc: &SubSweep,
    ) -> Result<Vec<f64>, String> {
        let gpu = &self.gpu;
        let params = KernelParams::new(geometry, desc);
        let byte_len = std::mem::size_of_val(links);

        gpu.device().push_error_scope(wgpu::ErrorFilter::Validation);
        let params_buf = gpu.create_uniform_buffer(&params, "lattice_params");
        let links_buf = gpu.create_f64_buffer(links, "lattice_links");
        let seeds_buf = gpu.create_u32_scratch_buffer(geometry.volume as usize, "lattice_seeds");
        let staging = gpu.create_staging_buffer(byte_len, "lattice_staging");

        let fill_bg = gpu.create_bind_group(&self.seed_fill, &[&params_buf, &seeds_buf], "seed_fill");
        let update_bg = gpu.create_bind_group(
            &self.update,
            &[&params_buf, &links_buf, &seeds_buf],
            "checkerboard_update",
        );

        let workgroups = geometry.volume.div_ceil(WORKGROUP_SIZE);
        let mut encoder = gpu.begin_encoder("checkerboard_sub_sweep");
        GpuF64::encode_pass(&mut encoder, &self.seed_fill, &fill_bg, workgroups);
        GpuF64::encode_pass(&mut encoder, &self.update, &update_bg, workgroups);
        encoder.copy_buffer_to_buffer(&links_buf, 0, &staging, 0, byte_len as u64);
        gpu.submit_encoder(encoder);

        if let Some(err) = gpu.device().pop_error_scope().await {
            return Err(err.to_string());
        }
        let updated = gpu
            .read_staging_f64(&staging)
            .await
            .map_err(|e| e.to_string())?;
        if updated.len() == links.len() {
            Ok(updated)
        } else {
            Err(format!(
                "readback returned {} reals, expected {}",
                updated.len(),
                links.len()
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StartMode;
    use crate::lattice::checkerboard::checkerboard_sub_sweep;
    use crate::lattice::gauge::LatticeDims;
    use crate::lattice::rng::Mulberry32;
    use crate::lattice::update::initialize_gauge_field;

    fn desc(slot: usize) -> SubSweep {
        SubSweep {
            axis_slot: slot,
            parity: 1,
            beta: 2.0,
            seed: 5,
            sweep_index: 3,
            over_relaxation: 1,
        }
    }

    #[test]
    fn params_match_wgsl_layout() {
        assert_eq!(std::mem::size_of::<KernelParams>(), 96);
        assert_eq!(std::mem::offset_of!(KernelParams, beta), 80);
    }

    #[test]
    fn sources_contain_shared_pieces() {
        let src = update_source();
        assert!(src.contains("fn c64_mul"));
        assert!(src.contains("fn site_seed"));
        assert!(src.contains("const HB_STAPLE_FLOOR: f32 = 0.5;"));
        assert!(src.contains("const PROJ_GUARD: f32 = 1e-12;"));
        assert!(seed_fill_source().contains("seeds[site] = site_seed"));
    }

    #[test]
    fn geometry_from_lattice() {
        let l = GaugeLattice::new(LatticeDims::plane(4, 6).with_temporal_extent(2)).unwrap();
        let g = KernelGeometry::from_lattice(&l).unwrap();
        assert_eq!(g.extents, [4, 6, 1, 2]);
        assert_eq!(g.slot_dims[..3], [0, 1, 3]);
        assert_eq!(g.expected_len(), l.as_slice().len());
        assert!(g.parity_independent());
        assert_eq!(g.decline_reason(l.as_slice().len(), &desc(2)), None);
    }

    #[test]
    fn odd_extent_and_bad_length_decline() {
        let l = GaugeLattice::new(LatticeDims::plane(5, 4)).unwrap();
        let g = KernelGeometry::from_lattice(&l).unwrap();
        assert!(!g.parity_independent());
        assert!(g.decline_reason(l.as_slice().len(), &desc(0)).is_some());

        let l = GaugeLattice::new(LatticeDims::plane(4, 4)).unwrap();
        let g = KernelGeometry::from_lattice(&l).unwrap();
        assert!(g.decline_reason(10, &desc(0)).is_some());
        assert!(g.decline_reason(l.as_slice().len(), &desc(2)).is_some());
    }

    #[test]
    #[ignore = "requires GPU"]
    fn gpu_matches_cpu_reference() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let Some(kernel) = rt.block_on(GpuCheckerboard::acquire()) else {
            return;
        };
        let mut cpu = GaugeLattice::new(LatticeDims::plane(4, 4).with_temporal_extent(4)).unwrap();
        initialize_gauge_field(&mut cpu, StartMode::Hot, &mut Mulberry32::new(2));
        let mut gpu_links = cpu.as_slice().to_vec();
        let g = KernelGeometry::from_lattice(&cpu).unwrap();
        for slot in 0..3 {
            let d = desc(slot);
            checkerboard_sub_sweep(&mut cpu, &d);
            assert!(rt.block_on(kernel.sub_sweep(&mut gpu_links, &g, &d)));
        }
        let max_diff = cpu
            .as_slice()
            .iter()
            .zip(&gpu_links)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        assert!(
            max_diff < crate::tolerances::GPU_CPU_LINK_ABS,
            "max |cpu − gpu| = {max_diff:.3e}"
        );
    }
}

// SPDX-License-Identifier: AGPL-3.0-only

//! GPU buffer creation, upload and readback for f64 link data.

use wgpu::util::DeviceExt;

use super::GpuF64;
use crate::error::LatticeError;

impl GpuF64 {
    /// Storage buffer initialised from f64 data, readable and writable by
    /// shaders and copyable to staging.
    #[must_use]
    pub fn create_f64_buffer(&self, data: &[f64], label: &str) -> wgpu::Buffer {
        self.device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(data),
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
            })
    }

    /// Zeroed u32 storage buffer for per-thread scratch (e.g. seeds).
    #[must_use]
    pub fn create_u32_scratch_buffer(&self, count: usize, label: &str) -> wgpu::Buffer {
        self.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: (count.max(1) * 4) as u64,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        })
    }

    /// Create a staging buffer for reading results back to CPU
    #[must_use]
    pub fn create_staging_buffer(&self, size: usize, label: &str) -> wgpu::Buffer {
        self.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: size as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Create a uniform buffer from a `Pod` value.
    #[must_use]
    pub fn create_uniform_buffer<T: bytemuck::Pod>(&self, value: &T, label: &str) -> wgpu::Buffer {
        self.device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::bytes_of(value),
                usage: wgpu::BufferUsages::UNIFORM,
            })
    }

    /// Map a staging buffer that a submitted encoder copied into, read it as
    /// f64 and unmap.
    ///
    /// # Errors
    ///
    /// [`LatticeError::GpuCompute`] if mapping fails or the callback is
    /// dropped.
    pub async fn read_staging_f64(&self, staging: &wgpu::Buffer) -> Result<Vec<f64>, LatticeError> {
        let slice = staging.slice(..);
        let (sender, receiver) = tokio::sync::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device().poll(wgpu::Maintain::Wait);
        receiver
            .await
            .map_err(|_| LatticeError::GpuCompute("map callback dropped".into()))?
            .map_err(|e| LatticeError::GpuCompute(format!("buffer mapping: {e}")))?;

        let data = slice.get_mapped_range();
        let result = mapped_bytes_to_f64(&data);
        drop(data);
        staging.unmap();
        Ok(result)
    }
}

/// Convert mapped GPU buffer bytes to f64 values.
///
/// Mapped buffers are normally page-aligned so `try_cast_slice` succeeds;
/// misaligned input goes through byte-wise conversion.
#[must_use]
pub fn mapped_bytes_to_f64(data: &[u8]) -> Vec<f64> {
    bytemuck::try_cast_slice(data).map_or_else(
        |_| {
            data.chunks_exact(8)
                .map(|chunk| {
                    let mut b = [0u8; 8];
                    b.copy_from_slice(chunk);
                    f64::from_le_bytes(b)
                })
                .collect()
        },
        <[f64]>::to_vec,
    )
}

// SPDX-License-Identifier: AGPL-3.0-only

//! GPU FP64 compute for lattice link updates.
//!
//! Creates a wgpu device with `SHADER_F64` enabled and provides the buffer,
//! pipeline and dispatch helpers the checkerboard kernel is built from.
//!
//! ## Adapter selection
//!
//! | `LATTICE_GPU_ADAPTER` | Behavior |
//! |-------|----------|
//! | *(unset)* / `auto` | First discrete `SHADER_F64` adapter, else any `SHADER_F64` adapter |
//! | `0`, `1`, … | Adapter by enumeration index |
//! | substring | Case-insensitive name match (e.g. `"titan"`, `"4070"`) |
//!
//! ## Module structure
//!
//! - `adapter`: adapter discovery and selection
//! - `buffers`: f64/u32 buffer creation, upload, readback
//! - `dispatch`: command encoding and dispatch

mod adapter;
mod buffers;
mod dispatch;

pub use adapter::AdapterInfo;
pub use buffers::mapped_bytes_to_f64;
pub use dispatch::split_workgroups;

use std::sync::Arc;

use log::info;

use crate::error::LatticeError;

/// wgpu device and queue with `SHADER_F64`.
#[must_use]
pub struct GpuF64 {
    pub adapter_name: String,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
}

impl GpuF64 {
    /// Access the underlying wgpu Device.
    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Access the underlying wgpu Queue.
    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Create a GPU device requesting `SHADER_F64`.
    ///
    /// # Errors
    ///
    /// [`LatticeError::NoAdapter`] / [`LatticeError::NoShaderF64`] if no
    /// usable adapter exists, [`LatticeError::DeviceCreation`] if the device
    /// request fails.
    pub async fn new() -> Result<Self, LatticeError> {
        let selected = adapter::select_adapter()?;
        let adapter_info = selected.get_info();
        if !selected.features().contains(wgpu::Features::SHADER_F64) {
            return Err(LatticeError::NoShaderF64);
        }

        let required_limits = wgpu::Limits {
            max_storage_buffer_binding_size: 512 * 1024 * 1024,
            max_buffer_size: 1024 * 1024 * 1024,
            ..wgpu::Limits::default()
        };

        let (device, queue) = selected
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("lattice device"),
                    required_features: wgpu::Features::SHADER_F64,
                    required_limits,
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(|e| LatticeError::DeviceCreation(e.to_string()))?;

        info!(
            "GPU device: {} ({:?})",
            adapter_info.name, adapter_info.backend
        );
        Ok(Self {
            adapter_name: adapter_info.name,
            device: Arc::new(device),
            queue: Arc::new(queue),
        })
    }

    /// Enumerate all available GPU adapters.
    #[must_use]
    pub fn enumerate_adapters() -> Vec<AdapterInfo> {
        adapter::enumerate_adapters()
    }

    /// Compile a WGSL compute shader with entry point `main`.
    #[must_use]
    pub fn create_pipeline(&self, wgsl: &str, label: &str) -> wgpu::ComputePipeline {
        let shader_module = self
            .device()
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(wgsl.into()),
            });

        self.device()
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: None,
                module: &shader_module,
                entry_point: "main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            })
    }
}

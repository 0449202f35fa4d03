// SPDX-License-Identifier: AGPL-3.0-only

//! GPU adapter discovery and selection.
//!
//! Adapters are queried at runtime; nothing about the hardware is assumed.
//! Selection runs on plain [`AdapterInfo`] records so the policy is testable
//! without a GPU.

use log::debug;

use crate::config::{wgpu_backends_from_env, AdapterSelector};
use crate::error::LatticeError;

/// One discovered adapter.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    /// Position in enumeration order, stable within one process.
    pub index: usize,
    pub name: String,
    /// Driver name (e.g. `"NVIDIA"`, `"radv"`).
    pub driver: String,
    /// `SHADER_F64` supported.
    pub has_f64: bool,
    pub device_type: wgpu::DeviceType,
}

impl AdapterInfo {
    fn query(index: usize, adapter: &wgpu::Adapter) -> Self {
        let info = adapter.get_info();
        Self {
            index,
            name: info.name,
            driver: info.driver,
            has_f64: adapter.features().contains(wgpu::Features::SHADER_F64),
            device_type: info.device_type,
        }
    }
}

impl std::fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.device_type {
            wgpu::DeviceType::DiscreteGpu => "discrete",
            wgpu::DeviceType::IntegratedGpu => "integrated",
            wgpu::DeviceType::VirtualGpu => "virtual",
            wgpu::DeviceType::Cpu => "cpu",
            wgpu::DeviceType::Other => "other",
        };
        let precision = if self.has_f64 { "f64" } else { "f32" };
        write!(
            f,
            "[{}] {} ({}, {kind}, {precision})",
            self.index, self.name, self.driver
        )
    }
}

/// wgpu instance limited to the backends named in the environment.
pub fn create_instance() -> wgpu::Instance {
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu_backends_from_env(),
        ..Default::default()
    })
}

#[must_use]
pub fn enumerate_adapters() -> Vec<AdapterInfo> {
    create_instance()
        .enumerate_adapters(wgpu::Backends::all())
        .iter()
        .enumerate()
        .map(|(i, a)| AdapterInfo::query(i, a))
        .collect()
}

/// Index of the adapter `selector` picks out of `infos`.
///
/// `Auto` wants `SHADER_F64`, preferring a discrete GPU. `Index` past the end
/// is retried as a name match on its digits.
///
/// # Errors
///
/// [`LatticeError::NoAdapter`] for an empty list,
/// [`LatticeError::NoShaderF64`] when `Auto` finds no f64 adapter,
/// [`LatticeError::DeviceCreation`] when an explicit selector matches nothing.
pub fn pick_adapter(infos: &[AdapterInfo], selector: &AdapterSelector) -> Result<usize, LatticeError> {
    if infos.is_empty() {
        return Err(LatticeError::NoAdapter);
    }
    let by_name = |needle: &str| {
        infos
            .iter()
            .position(|a| a.name.to_lowercase().contains(needle))
            .ok_or_else(|| LatticeError::DeviceCreation(format!("no adapter matching '{needle}'")))
    };
    match selector {
        AdapterSelector::Auto => {
            let f64_capable = || infos.iter().filter(|a| a.has_f64);
            f64_capable()
                .find(|a| a.device_type == wgpu::DeviceType::DiscreteGpu)
                .or_else(|| f64_capable().next())
                .map(|a| a.index)
                .ok_or(LatticeError::NoShaderF64)
        }
        AdapterSelector::Index(idx) if *idx < infos.len() => Ok(*idx),
        AdapterSelector::Index(idx) => by_name(&idx.to_string()),
        AdapterSelector::Name(name) => by_name(name),
    }
}

/// Adapter chosen by [`AdapterSelector::from_env`].
///
/// # Errors
///
/// See [`pick_adapter`].
pub fn select_adapter() -> Result<wgpu::Adapter, LatticeError> {
    let adapters = create_instance().enumerate_adapters(wgpu::Backends::all());
    let infos: Vec<AdapterInfo> = adapters
        .iter()
        .enumerate()
        .map(|(i, a)| AdapterInfo::query(i, a))
        .collect();
    let chosen = pick_adapter(&infos, &AdapterSelector::from_env())?;
    debug!("selected adapter {}", infos[chosen]);
    adapters
        .into_iter()
        .nth(chosen)
        .ok_or(LatticeError::NoAdapter)
}

// SPDX-License-Identifier: AGPL-3.0-only

//! Command encoding for multi-pass, single-submission dispatches.
//!
//! ```text
//! begin_encoder ─► encode_pass × N ─► copy to staging ─► submit_encoder
//! ```

use super::GpuF64;

/// wgpu's per-dimension workgroup limit.
const MAX_WORKGROUPS_PER_DIM: u32 = 65_535;

/// Fold a 1D workgroup count into `(x, y, 1)` with both factors in range.
///
/// Kernels recover the flat thread index as
/// `gid.x + gid.y · num_workgroups.x · WORKGROUP_SIZE` and bounds-check it.
#[must_use]
pub fn split_workgroups(total: u32) -> (u32, u32, u32) {
    if total <= MAX_WORKGROUPS_PER_DIM {
        return (total, 1, 1);
    }
    let rows = total.div_ceil(MAX_WORKGROUPS_PER_DIM);
    (total.div_ceil(rows), rows, 1)
}

impl GpuF64 {
    /// Bind `buffers[i]` at `@binding(i)` of group 0.
    #[must_use]
    pub fn create_bind_group(
        &self,
        pipeline: &wgpu::ComputePipeline,
        buffers: &[&wgpu::Buffer],
        label: &str,
    ) -> wgpu::BindGroup {
        let entries: Vec<wgpu::BindGroupEntry> = buffers
            .iter()
            .enumerate()
            .map(|(i, buf)| wgpu::BindGroupEntry {
                binding: i as u32,
                resource: buf.as_entire_binding(),
            })
            .collect();
        self.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &pipeline.get_bind_group_layout(0),
            entries: &entries,
        })
    }

    #[must_use]
    pub fn begin_encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    pub fn submit_encoder(&self, encoder: wgpu::CommandEncoder) {
        self.queue().submit([encoder.finish()]);
    }

    /// Record one compute pass over `workgroups` groups.
    pub fn encode_pass(
        encoder: &mut wgpu::CommandEncoder,
        pipeline: &wgpu::ComputePipeline,
        bind_group: &wgpu::BindGroup,
        workgroups: u32,
    ) {
        let (x, y, z) = split_workgroups(workgroups);
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: None,
            timestamp_writes: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(x, y, z);
    }
}

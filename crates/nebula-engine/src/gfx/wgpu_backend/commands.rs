use crate::device::Drawable;
use crate::gfx::{
    AccelerationStructureDesc, CommandBuffer, ComputeDispatch, MeshDraw, RenderPassDesc, Size3,
};

use super::resources::{
    STRUCTURE_HEADER_SIZE, WgpuAccelerationStructure, WgpuBuffer, WgpuTexture,
};
use super::WgpuBackend;

/// Vertices the `mesh` function emits per mesh threadgroup (two triangles).
pub(crate) const MESH_VERTICES_PER_THREADGROUP: u32 = 6;

/// Instance count standing in for `groups` mesh threadgroups, or `None`
/// when it does not fit the instance range.
fn mesh_instances(groups: Size3) -> Option<u32> {
    u32::try_from(groups.volume()).ok()
}

/// One wgpu command encoder plus the drawables to present after submission.
pub struct WgpuCommands {
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    pub(crate) encoder: wgpu::CommandEncoder,
    pub(crate) presents: Vec<Drawable>,
}

impl WgpuCommands {
    fn texture_group(
        &self,
        label: &'static str,
        layout: &wgpu::BindGroupLayout,
        textures: &[(u32, &WgpuTexture)],
    ) -> wgpu::BindGroup {
        let entries: Vec<wgpu::BindGroupEntry<'_>> = textures
            .iter()
            .map(|(slot, texture)| wgpu::BindGroupEntry {
                binding: *slot,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            })
            .collect();

        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &entries,
        })
    }
}

impl CommandBuffer<WgpuBackend> for WgpuCommands {
    fn build_acceleration_structure(
        &mut self,
        structure: &WgpuAccelerationStructure,
        desc: &AccelerationStructureDesc<'_, WgpuBackend>,
        scratch: &WgpuBuffer,
    ) {
        let count = desc.bounding_box_count as u64;
        let box_bytes = desc.bounding_box_stride * count;
        let primitive_bytes = desc.primitive_data_stride * count;

        let header: [u32; 4] = [
            desc.bounding_box_count,
            (desc.bounding_box_stride / 4) as u32,
            (desc.primitive_data_stride / 4) as u32,
            desc.intersection_function_table_offset,
        ];

        // Queue writes land before this buffer's commands on submission.
        self.queue
            .write_buffer(&scratch.buffer, 0, bytemuck::cast_slice(&header));

        self.encoder.copy_buffer_to_buffer(
            &scratch.buffer,
            0,
            &structure.buffer,
            0,
            STRUCTURE_HEADER_SIZE,
        );
        self.encoder.copy_buffer_to_buffer(
            &desc.bounding_boxes.buffer,
            0,
            &structure.buffer,
            STRUCTURE_HEADER_SIZE,
            box_bytes,
        );
        self.encoder.copy_buffer_to_buffer(
            &desc.primitive_data.buffer,
            0,
            &structure.buffer,
            STRUCTURE_HEADER_SIZE + box_bytes,
            primitive_bytes,
        );
    }

    fn dispatch(&mut self, dispatch: &ComputeDispatch<'_, WgpuBackend>) {
        let pipeline = dispatch.pipeline;
        let threads = dispatch.threads_per_threadgroup;
        debug_assert_eq!(
            [threads.width, threads.height, threads.depth],
            pipeline.workgroup_size,
            "threads per group are fixed when `{}` is created",
            pipeline.label
        );

        let textures = self.texture_group(
            "nebula compute textures",
            &pipeline.pipeline.get_bind_group_layout(0),
            dispatch.textures,
        );

        let (structure_slot, structure) = dispatch.acceleration_structure;
        let (table_slot, table) = dispatch.intersection_functions;
        let buffers = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("nebula compute buffers"),
            layout: &pipeline.pipeline.get_bind_group_layout(1),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: structure_slot,
                    resource: structure.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: table_slot,
                    resource: table.buffer.as_entire_binding(),
                },
            ],
        });

        let groups = dispatch.threadgroups;
        let mut cpass = self.encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(pipeline.label),
            timestamp_writes: None,
        });
        cpass.set_pipeline(&pipeline.pipeline);
        cpass.set_bind_group(0, &textures, &[]);
        cpass.set_bind_group(1, &buffers, &[]);
        cpass.dispatch_workgroups(groups.width, groups.height, groups.depth);
    }

    fn draw_mesh(&mut self, drawable: &Drawable, pass: &RenderPassDesc, draw: &MeshDraw<'_, WgpuBackend>) {
        let textures = self.texture_group(
            "nebula fragment textures",
            &draw.pipeline.pipeline.get_bind_group_layout(0),
            draw.fragment_textures,
        );

        let load = match pass.clear_color {
            Some(color) => wgpu::LoadOp::Clear(color),
            None => wgpu::LoadOp::Load,
        };

        let mut rpass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(pass.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &drawable.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        rpass.set_pipeline(&draw.pipeline.pipeline);
        rpass.set_bind_group(0, &textures, &[]);

        // One instance per mesh threadgroup; the instance index plays the
        // threadgroup id. Threads per group only matter to a real mesh stage.
        match mesh_instances(draw.object_threadgroups) {
            Some(mesh_groups) => rpass.draw(0..MESH_VERTICES_PER_THREADGROUP, 0..mesh_groups),
            None => log::error!(
                "mesh draw of {:?} threadgroups exceeds the instance range; skipped",
                draw.object_threadgroups
            ),
        }
    }

    fn present(&mut self, drawable: Drawable) {
        self.presents.push(drawable);
    }
}

//! wgpu implementation of the backend seam.
//!
//! wgpu exposes neither custom-intersection ray tracing nor a portable mesh
//! stage, so both are expressed with core features:
//! - an acceleration structure is a storage buffer: header, bounding boxes and
//!   primitive data, packed on the GPU at build time through the scratch buffer
//! - an intersection function table is a storage buffer of function ids, an id
//!   being the function's position in the kernel's linked list
//! - the `mesh` function runs as a vertex stage emitting one quad per mesh
//!   threadgroup
//!
//! Texture slots map to bind group 0 and buffer slots to bind group 1, with
//! the slot as binding index.

mod commands;
mod library;
mod resources;

use wgpu::util::DeviceExt;

use crate::device::Drawable;
use crate::gfx::{
    AccelerationStructureDesc, AccelerationStructureSizes, Backend, ComputePipelineDesc,
    MeshPipelineDesc, SetupError, TextureDesc,
};

pub use commands::WgpuCommands;
pub use library::{find_function, reflect, FunctionKind, WgpuFunction, WgpuLibrary};

use library::check_kernel;
pub use resources::{
    WgpuAccelerationStructure, WgpuBuffer, WgpuComputePipeline, WgpuFunctionTable,
    WgpuRenderPipeline, WgpuTexture,
};

use resources::STRUCTURE_HEADER_SIZE;

/// Device + queue handles. Cloning shares the same device.
#[derive(Clone)]
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self { device, queue }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    fn check_size(&self, label: &str, size: u64) -> Result<(), SetupError> {
        if size > self.device.limits().max_buffer_size {
            return Err(SetupError::Allocation {
                label: label.to_string(),
                size,
            });
        }
        Ok(())
    }
}

impl Backend for WgpuBackend {
    type Library = WgpuLibrary;
    type Function = WgpuFunction;
    type Texture = WgpuTexture;
    type Buffer = WgpuBuffer;
    type ComputePipeline = WgpuComputePipeline;
    type RenderPipeline = WgpuRenderPipeline;
    type AccelerationStructure = WgpuAccelerationStructure;
    type IntersectionFunctionTable = WgpuFunctionTable;
    type Drawable = Drawable;
    type Commands = WgpuCommands;

    fn function(&self, library: &WgpuLibrary, name: &str) -> Result<WgpuFunction, SetupError> {
        library.function(name)
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<WgpuTexture, SetupError> {
        let allowed = desc
            .format
            .guaranteed_format_features(self.device.features())
            .allowed_usages;
        if !allowed.contains(desc.usage) {
            return Err(SetupError::UnsupportedUsage {
                label: desc.label.to_string(),
                format: desc.format,
                usage: desc.usage,
            });
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: desc.usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(WgpuTexture { view })
    }

    fn create_buffer_init(&self, label: &'static str, contents: &[u8]) -> Result<WgpuBuffer, SetupError> {
        self.check_size(label, contents.len() as u64)?;
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        });
        Ok(WgpuBuffer { buffer })
    }

    fn create_buffer(&self, label: &'static str, size: u64) -> Result<WgpuBuffer, SetupError> {
        self.check_size(label, size)?;
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Ok(WgpuBuffer { buffer })
    }

    fn create_compute_pipeline(
        &self,
        desc: &ComputePipelineDesc<'_, Self>,
    ) -> Result<WgpuComputePipeline, SetupError> {
        let kernel = desc.kernel;
        let workgroup_size =
            check_kernel(desc.label, &kernel.name, kernel.kind, desc.threads_per_threadgroup)?;

        // Static linking: the callee must be a plain function of the kernel's module.
        for linked in desc.linked_functions {
            if linked.kind != FunctionKind::Plain || linked.module_index != kernel.module_index {
                return Err(SetupError::PipelineCompilation {
                    pipeline: desc.label.to_string(),
                    message: format!(
                        "`{}` is not a plain function in the module of `{}`",
                        linked.name, kernel.name
                    ),
                });
            }
        }

        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(desc.label),
                layout: None,
                module: &kernel.module,
                entry_point: Some(kernel.name.as_str()),
                compilation_options: Default::default(),
                cache: None,
            });

        Ok(WgpuComputePipeline {
            pipeline,
            label: desc.label,
            linked: desc.linked_functions.iter().map(|f| f.name.clone()).collect(),
            workgroup_size,
        })
    }

    fn create_mesh_pipeline(
        &self,
        desc: &MeshPipelineDesc<'_, Self>,
    ) -> Result<WgpuRenderPipeline, SetupError> {
        if desc.mesh.kind != FunctionKind::Vertex {
            return Err(SetupError::WrongStage {
                function: desc.mesh.name.clone(),
                expected: "mesh",
            });
        }
        if desc.fragment.kind != FunctionKind::Fragment {
            return Err(SetupError::WrongStage {
                function: desc.fragment.name.clone(),
                expected: "fragment",
            });
        }

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(desc.label),
            layout: None,

            vertex: wgpu::VertexState {
                module: &desc.mesh.module,
                entry_point: Some(desc.mesh.name.as_str()),
                compilation_options: Default::default(),
                buffers: &[],
            },

            fragment: Some(wgpu::FragmentState {
                module: &desc.fragment.module,
                entry_point: Some(desc.fragment.name.as_str()),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: desc.color_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        Ok(WgpuRenderPipeline { pipeline })
    }

    fn acceleration_structure_sizes(
        &self,
        desc: &AccelerationStructureDesc<'_, Self>,
    ) -> AccelerationStructureSizes {
        let count = desc.bounding_box_count as u64;
        AccelerationStructureSizes {
            structure_size: STRUCTURE_HEADER_SIZE
                + count * (desc.bounding_box_stride + desc.primitive_data_stride),
            scratch_size: STRUCTURE_HEADER_SIZE,
        }
    }

    fn create_acceleration_structure(&self, size: u64) -> Result<WgpuAccelerationStructure, SetupError> {
        let label = "nebula acceleration structure";
        self.check_size(label, size)?;
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Ok(WgpuAccelerationStructure { buffer })
    }

    fn create_intersection_function_table(
        &self,
        pipeline: &WgpuComputePipeline,
        functions: &[&WgpuFunction],
    ) -> Result<WgpuFunctionTable, SetupError> {
        let ids = functions
            .iter()
            .map(|f| {
                pipeline
                    .linked
                    .iter()
                    .position(|name| *name == f.name)
                    .map(|id| id as u32)
                    .ok_or_else(|| SetupError::NotLinked {
                        function: f.name.clone(),
                        pipeline: pipeline.label.to_string(),
                    })
            })
            .collect::<Result<Vec<u32>, _>>()?;

        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("nebula intersection function table"),
            contents: bytemuck::cast_slice(&ids),
            usage: wgpu::BufferUsages::STORAGE,
        });
        Ok(WgpuFunctionTable { buffer })
    }

    fn command_buffer(&self, label: &'static str) -> WgpuCommands {
        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });

        WgpuCommands {
            device: self.device.clone(),
            queue: self.queue.clone(),
            encoder,
            presents: Vec::new(),
        }
    }

    fn commit(&self, commands: WgpuCommands) {
        let WgpuCommands { encoder, presents, .. } = commands;
        self.queue.submit(std::iter::once(encoder.finish()));
        for drawable in presents {
            drawable.present();
        }
    }
}

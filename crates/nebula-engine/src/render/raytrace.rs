use crate::gfx::{
    AccelerationStructureDesc, AccelerationStructureSizes, Backend, CommandBuffer,
    ComputeDispatch, ComputePipelineDesc, SetupError, Size3, TextureDesc,
};

use super::geometry::{Aabb, Sphere};
use super::{FrameOutcome, INTERSECTION_FUNCTION, KERNEL_FUNCTION, RebuildPolicy};

pub const TRACE_WIDTH: u32 = 8;
pub const TRACE_HEIGHT: u32 = 8;
pub const TRACE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const OUTPUT_TEXTURE_SLOT: u32 = 0;
const STRUCTURE_SLOT: u32 = 0;
const FUNCTION_TABLE_SLOT: u32 = 1;

/// Threads per threadgroup; must match the kernel's workgroup size.
const THREADS: Size3 = Size3::new(8, 8, 1);

/// Traces the unit sphere into an 8×8 texture.
///
/// Every GPU object is created in [`RayTraceStage::new`]; a frame only
/// allocates the build's scratch buffer.
pub struct RayTraceStage<B: Backend> {
    texture: B::Texture,
    pipeline: B::ComputePipeline,
    bounding_boxes: B::Buffer,
    primitives: B::Buffer,
    structure: B::AccelerationStructure,
    function_table: B::IntersectionFunctionTable,
    sizes: AccelerationStructureSizes,
    policy: RebuildPolicy,
    built: bool,
}

impl<B: Backend> RayTraceStage<B> {
    pub fn new(backend: &B, library: &B::Library, policy: RebuildPolicy) -> Result<Self, SetupError> {
        let texture = backend.create_texture(&TextureDesc {
            label: "nebula traced texture",
            width: TRACE_WIDTH,
            height: TRACE_HEIGHT,
            format: TRACE_FORMAT,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
        })?;

        let kernel = backend.function(library, KERNEL_FUNCTION)?;
        let intersection = backend.function(library, INTERSECTION_FUNCTION)?;
        let pipeline = backend.create_compute_pipeline(&ComputePipelineDesc {
            label: "nebula ray trace",
            kernel: &kernel,
            linked_functions: &[&intersection],
            threads_per_threadgroup: THREADS,
        })?;

        let sphere = Sphere::UNIT;
        let bounds = sphere.bounds();
        let bounding_boxes =
            backend.create_buffer_init("nebula bounding boxes", bytemuck::bytes_of(&bounds))?;
        let primitives = backend.create_buffer_init("nebula spheres", bytemuck::bytes_of(&sphere))?;

        let sizes = backend.acceleration_structure_sizes(&structure_desc::<B>(&bounding_boxes, &primitives));
        let structure = backend.create_acceleration_structure(sizes.structure_size)?;

        let function_table = backend.create_intersection_function_table(&pipeline, &[&intersection])?;

        log::info!(
            "ray trace stage: {TRACE_WIDTH}x{TRACE_HEIGHT} {TRACE_FORMAT:?}, structure {} B, scratch {} B, {policy:?}",
            sizes.structure_size,
            sizes.scratch_size
        );

        Ok(Self {
            texture,
            pipeline,
            bounding_boxes,
            primitives,
            structure,
            function_table,
            sizes,
            policy,
            built: false,
        })
    }

    /// Texture the kernel writes; size, format and usage never change.
    pub fn texture(&self) -> &B::Texture {
        &self.texture
    }

    pub fn sizes(&self) -> AccelerationStructureSizes {
        self.sizes
    }

    pub fn policy(&self) -> RebuildPolicy {
        self.policy
    }

    /// Encodes the structure build (per policy) and the trace dispatch into
    /// one command buffer and commits it.
    pub fn draw(&mut self, backend: &B) -> FrameOutcome {
        let rebuild = match self.policy {
            RebuildPolicy::EveryFrame => true,
            RebuildPolicy::BuildOnce => !self.built,
        };

        let scratch = if rebuild {
            match backend.create_buffer("nebula structure scratch", self.sizes.scratch_size) {
                Ok(scratch) => Some(scratch),
                Err(err) => {
                    log::warn!("skipping frame: {err}");
                    return FrameOutcome::Skipped;
                }
            }
        } else {
            None
        };

        let mut commands = backend.command_buffer("nebula ray trace");

        if let Some(scratch) = &scratch {
            let desc = structure_desc::<B>(&self.bounding_boxes, &self.primitives);
            commands.build_acceleration_structure(&self.structure, &desc, scratch);
        }

        commands.dispatch(&ComputeDispatch {
            pipeline: &self.pipeline,
            textures: &[(OUTPUT_TEXTURE_SLOT, &self.texture)],
            acceleration_structure: (STRUCTURE_SLOT, &self.structure),
            intersection_functions: (FUNCTION_TABLE_SLOT, &self.function_table),
            threadgroups: threadgroups(),
            threads_per_threadgroup: THREADS,
        });

        backend.commit(commands);
        self.built = true;

        log::trace!("ray trace committed (rebuild: {rebuild})");
        FrameOutcome::Submitted
    }
}

/// Threadgroups covering the texture exactly once.
fn threadgroups() -> Size3 {
    Size3::new(
        TRACE_WIDTH.div_ceil(THREADS.width),
        TRACE_HEIGHT.div_ceil(THREADS.height),
        1,
    )
}

fn structure_desc<'a, B: Backend>(
    bounding_boxes: &'a B::Buffer,
    primitives: &'a B::Buffer,
) -> AccelerationStructureDesc<'a, B> {
    let primitive_size = std::mem::size_of::<Sphere>() as u64;
    AccelerationStructureDesc {
        bounding_boxes,
        bounding_box_stride: std::mem::size_of::<Aabb>() as u64,
        bounding_box_count: 1,
        primitive_data: primitives,
        primitive_data_stride: primitive_size,
        primitive_data_element_size: primitive_size,
        intersection_function_table_offset: 0,
    }
}

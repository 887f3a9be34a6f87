use super::Backend;

/// Three-dimensional work size (threadgroup counts or threads per group).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Size3 {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Size3 {
    pub const ONE: Self = Self::new(1, 1, 1);

    #[inline]
    pub const fn new(width: u32, height: u32, depth: u32) -> Self {
        Self { width, height, depth }
    }

    /// Number of elements covered.
    #[inline]
    pub const fn volume(self) -> u64 {
        self.width as u64 * self.height as u64 * self.depth as u64
    }
}

/// Two-dimensional texture request.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TextureDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub usage: wgpu::TextureUsages,
}

/// Compute pipeline built from a kernel plus functions linked into it.
///
/// Linked functions become callable from the kernel and are the only
/// functions an intersection table for this pipeline may reference. Every
/// dispatch on the pipeline uses `threads_per_threadgroup`.
pub struct ComputePipelineDesc<'a, B: Backend + ?Sized> {
    pub label: &'static str,
    pub kernel: &'a B::Function,
    pub linked_functions: &'a [&'a B::Function],
    pub threads_per_threadgroup: Size3,
}

/// Mesh/fragment raster pipeline writing one color attachment.
pub struct MeshPipelineDesc<'a, B: Backend + ?Sized> {
    pub label: &'static str,
    pub mesh: &'a B::Function,
    pub fragment: &'a B::Function,
    pub color_format: wgpu::TextureFormat,
}

/// Single bounding-box geometry acceleration structure.
pub struct AccelerationStructureDesc<'a, B: Backend + ?Sized> {
    pub bounding_boxes: &'a B::Buffer,
    pub bounding_box_stride: u64,
    pub bounding_box_count: u32,

    pub primitive_data: &'a B::Buffer,
    pub primitive_data_stride: u64,
    pub primitive_data_element_size: u64,

    /// Index of this geometry's entry in the intersection function table.
    pub intersection_function_table_offset: u32,
}

/// Storage requirements reported by the backend for a structure descriptor.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AccelerationStructureSizes {
    pub structure_size: u64,
    pub scratch_size: u64,
}

/// One compute dispatch with its argument bindings.
///
/// Texture slots and buffer slots are separate argument tables.
pub struct ComputeDispatch<'a, B: Backend + ?Sized> {
    pub pipeline: &'a B::ComputePipeline,
    pub textures: &'a [(u32, &'a B::Texture)],
    pub acceleration_structure: (u32, &'a B::AccelerationStructure),
    pub intersection_functions: (u32, &'a B::IntersectionFunctionTable),
    pub threadgroups: Size3,
    pub threads_per_threadgroup: Size3,
}

/// Render pass over a drawable.
///
/// `clear_color: None` loads the previous contents.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RenderPassDesc {
    pub label: &'static str,
    pub clear_color: Option<wgpu::Color>,
}

/// Mesh-pipeline draw. No vertex data is bound; the mesh function emits the
/// geometry itself.
pub struct MeshDraw<'a, B: Backend + ?Sized> {
    pub pipeline: &'a B::RenderPipeline,
    pub fragment_textures: &'a [(u32, &'a B::Texture)],
    pub object_threadgroups: Size3,
    pub threads_per_object_threadgroup: Size3,
    pub threads_per_mesh_threadgroup: Size3,
}

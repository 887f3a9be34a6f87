/// Leading words of a packed acceleration structure:
/// `[box_count, box_stride_words, primitive_stride_words, table_offset]`.
pub(crate) const STRUCTURE_HEADER_SIZE: u64 = 16;

/// The full view every binding of a texture uses; it keeps the texture alive.
pub struct WgpuTexture {
    pub(crate) view: wgpu::TextureView,
}

pub struct WgpuBuffer {
    pub(crate) buffer: wgpu::Buffer,
}

pub struct WgpuComputePipeline {
    pub(crate) pipeline: wgpu::ComputePipeline,
    pub(crate) label: &'static str,
    /// Functions statically linked into the kernel's module, in table-id order.
    pub(crate) linked: Vec<String>,
    pub(crate) workgroup_size: [u32; 3],
}

pub struct WgpuRenderPipeline {
    pub(crate) pipeline: wgpu::RenderPipeline,
}

/// Bounding boxes and primitive data packed behind a header, read by the
/// kernel as a flat `array<u32>`.
pub struct WgpuAccelerationStructure {
    pub(crate) buffer: wgpu::Buffer,
}

/// Function ids, one `u32` per geometry.
pub struct WgpuFunctionTable {
    pub(crate) buffer: wgpu::Buffer,
}

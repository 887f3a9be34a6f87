use super::{
    AccelerationStructureDesc, AccelerationStructureSizes, ComputeDispatch, ComputePipelineDesc,
    MeshDraw, MeshPipelineDesc, RenderPassDesc, SetupError, TextureDesc,
};

/// A GPU device plus the queue its command buffers are committed to.
///
/// Resource creation returns [`SetupError`] instead of panicking so stages
/// can fail during construction. Command buffers committed through one
/// backend execute in commit order.
pub trait Backend {
    type Library;
    type Function;
    type Texture;
    type Buffer;
    type ComputePipeline;
    type RenderPipeline;
    type AccelerationStructure;
    type IntersectionFunctionTable;
    type Drawable;
    type Commands: CommandBuffer<Self>;

    /// Looks up a function by name.
    fn function(&self, library: &Self::Library, name: &str) -> Result<Self::Function, SetupError>;

    fn create_texture(&self, desc: &TextureDesc) -> Result<Self::Texture, SetupError>;

    /// Creates an immutable buffer holding `contents`.
    fn create_buffer_init(
        &self,
        label: &'static str,
        contents: &[u8],
    ) -> Result<Self::Buffer, SetupError>;

    /// Creates an uninitialized buffer of `size` bytes.
    fn create_buffer(&self, label: &'static str, size: u64) -> Result<Self::Buffer, SetupError>;

    fn create_compute_pipeline(
        &self,
        desc: &ComputePipelineDesc<'_, Self>,
    ) -> Result<Self::ComputePipeline, SetupError>;

    fn create_mesh_pipeline(
        &self,
        desc: &MeshPipelineDesc<'_, Self>,
    ) -> Result<Self::RenderPipeline, SetupError>;

    fn acceleration_structure_sizes(
        &self,
        desc: &AccelerationStructureDesc<'_, Self>,
    ) -> AccelerationStructureSizes;

    /// Allocates backing storage for a structure; building happens on a
    /// command buffer.
    fn create_acceleration_structure(
        &self,
        size: u64,
    ) -> Result<Self::AccelerationStructure, SetupError>;

    /// Creates a table whose entry `i` calls `functions[i]`.
    ///
    /// Function handles are resolved against `pipeline`; every function must
    /// have been linked into it.
    fn create_intersection_function_table(
        &self,
        pipeline: &Self::ComputePipeline,
        functions: &[&Self::Function],
    ) -> Result<Self::IntersectionFunctionTable, SetupError>;

    fn command_buffer(&self, label: &'static str) -> Self::Commands;

    /// Submits a command buffer without waiting for completion.
    fn commit(&self, commands: Self::Commands);
}

/// Commands recorded into one command buffer, executed in encoding order.
pub trait CommandBuffer<B: Backend + ?Sized> {
    fn build_acceleration_structure(
        &mut self,
        structure: &B::AccelerationStructure,
        desc: &AccelerationStructureDesc<'_, B>,
        scratch: &B::Buffer,
    );

    fn dispatch(&mut self, dispatch: &ComputeDispatch<'_, B>);

    /// Encodes a render pass over `drawable` containing one mesh draw.
    fn draw_mesh(&mut self, drawable: &B::Drawable, pass: &RenderPassDesc, draw: &MeshDraw<'_, B>);

    /// Schedules `drawable` for presentation once this buffer completes.
    fn present(&mut self, drawable: B::Drawable);
}

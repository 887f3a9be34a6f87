//! Headless backend that records resources and commands.
//!
//! Nothing is executed. Every created object gets a [`ResourceId`], every
//! committed command buffer is appended to one command log, and the log can be
//! inspected afterwards. Stages behave exactly as they do on a real device.

use std::cell::{Cell, RefCell};

use super::{
    AccelerationStructureDesc, AccelerationStructureSizes, Backend, CommandBuffer,
    ComputeDispatch, ComputePipelineDesc, MeshDraw, MeshPipelineDesc, RenderPassDesc, SetupError,
    Size3, TextureDesc,
};

pub type ResourceId = u32;

/// A resource creation, in creation order.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Texture(TextureDesc),
    Buffer {
        label: &'static str,
        size: u64,
    },
    ComputePipeline {
        label: &'static str,
        kernel: String,
        linked: Vec<String>,
        threads_per_threadgroup: Size3,
    },
    MeshPipeline {
        label: &'static str,
        mesh: String,
        fragment: String,
        color_format: wgpu::TextureFormat,
    },
    AccelerationStructure {
        size: u64,
    },
    IntersectionFunctionTable {
        pipeline: ResourceId,
        functions: Vec<String>,
    },
    Drawable {
        width: u32,
        height: u32,
    },
}

/// A recorded command. Buffer contents are snapshotted at encode time.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BuildAccelerationStructure {
        structure: ResourceId,
        scratch: ResourceId,
        bounding_boxes: Vec<u8>,
        bounding_box_count: u32,
        primitive_data: Vec<u8>,
        primitive_data_stride: u64,
        intersection_function_table_offset: u32,
    },
    Dispatch {
        pipeline: ResourceId,
        textures: Vec<(u32, ResourceId)>,
        acceleration_structure: (u32, ResourceId),
        intersection_functions: (u32, ResourceId),
        threadgroups: Size3,
        threads_per_threadgroup: Size3,
    },
    RenderPass {
        drawable: ResourceId,
        pass: RenderPassDesc,
        pipeline: ResourceId,
        fragment_textures: Vec<(u32, ResourceId)>,
        object_threadgroups: Size3,
        threads_per_object_threadgroup: Size3,
        threads_per_mesh_threadgroup: Size3,
    },
    Present {
        drawable: ResourceId,
    },
    Commit {
        label: &'static str,
    },
}

/// Named functions available to the recording backend.
#[derive(Debug, Clone, Default)]
pub struct RecordingLibrary {
    functions: Vec<String>,
}

impl RecordingLibrary {
    pub fn new(functions: &[&str]) -> Self {
        Self {
            functions: functions.iter().map(|f| f.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedFunction {
    name: String,
}

#[derive(Debug)]
pub struct RecordedTexture {
    id: ResourceId,
    desc: TextureDesc,
}

impl RecordedTexture {
    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }
}

#[derive(Debug)]
pub struct RecordedBuffer {
    id: ResourceId,
    contents: Vec<u8>,
}

#[derive(Debug)]
pub struct RecordedComputePipeline {
    id: ResourceId,
    label: &'static str,
    linked: Vec<String>,
}

#[derive(Debug)]
pub struct RecordedRenderPipeline {
    id: ResourceId,
}

#[derive(Debug)]
pub struct RecordedAccelerationStructure {
    id: ResourceId,
}

#[derive(Debug)]
pub struct RecordedFunctionTable {
    id: ResourceId,
}

#[derive(Debug)]
pub struct RecordedDrawable {
    id: ResourceId,
}

impl RecordedDrawable {
    pub fn id(&self) -> ResourceId {
        self.id
    }
}

/// Commands of one open command buffer.
#[derive(Debug)]
pub struct RecordedCommands {
    label: &'static str,
    commands: Vec<Command>,
}

/// Recording [`Backend`].
#[derive(Debug)]
pub struct RecordingBackend {
    next_id: Cell<ResourceId>,
    resources: RefCell<Vec<(ResourceId, Resource)>>,
    commands: RefCell<Vec<Command>>,
    storage_textures: bool,
    /// Uninitialized buffers that may still be allocated; `None` is unlimited.
    buffer_budget: Cell<Option<usize>>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(1),
            resources: RefCell::new(Vec::new()),
            commands: RefCell::new(Vec::new()),
            storage_textures: true,
            buffer_budget: Cell::new(None),
        }
    }

    /// A device that rejects textures requesting storage usage.
    pub fn without_storage_textures() -> Self {
        Self {
            storage_textures: false,
            ..Self::new()
        }
    }

    /// Lets the next `count` uninitialized buffer allocations succeed and
    /// fails every one after that, as an exhausted device would.
    pub fn fail_buffer_allocations_after(&self, count: usize) {
        self.buffer_budget.set(Some(count));
    }

    /// Lifts the limit set by [`fail_buffer_allocations_after`](Self::fail_buffer_allocations_after).
    pub fn restore_buffer_allocations(&self) {
        self.buffer_budget.set(None);
    }

    /// Hands out the next presentable surface of the given size.
    pub fn next_drawable(&self, width: u32, height: u32) -> RecordedDrawable {
        RecordedDrawable {
            id: self.register(Resource::Drawable { width, height }),
        }
    }

    /// All created resources in creation order.
    pub fn resources(&self) -> Vec<(ResourceId, Resource)> {
        self.resources.borrow().clone()
    }

    /// Committed commands in commit order.
    pub fn commands(&self) -> Vec<Command> {
        self.commands.borrow().clone()
    }

    /// Drains the command log.
    pub fn take_commands(&self) -> Vec<Command> {
        std::mem::take(&mut *self.commands.borrow_mut())
    }

    fn register(&self, resource: Resource) -> ResourceId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.resources.borrow_mut().push((id, resource));
        id
    }
}

impl Backend for RecordingBackend {
    type Library = RecordingLibrary;
    type Function = RecordedFunction;
    type Texture = RecordedTexture;
    type Buffer = RecordedBuffer;
    type ComputePipeline = RecordedComputePipeline;
    type RenderPipeline = RecordedRenderPipeline;
    type AccelerationStructure = RecordedAccelerationStructure;
    type IntersectionFunctionTable = RecordedFunctionTable;
    type Drawable = RecordedDrawable;
    type Commands = RecordedCommands;

    fn function(&self, library: &RecordingLibrary, name: &str) -> Result<RecordedFunction, SetupError> {
        if library.functions.iter().any(|f| f == name) {
            Ok(RecordedFunction {
                name: name.to_string(),
            })
        } else {
            Err(SetupError::MissingFunction(name.to_string()))
        }
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<RecordedTexture, SetupError> {
        if !self.storage_textures && desc.usage.contains(wgpu::TextureUsages::STORAGE_BINDING) {
            return Err(SetupError::UnsupportedUsage {
                label: desc.label.to_string(),
                format: desc.format,
                usage: desc.usage,
            });
        }

        Ok(RecordedTexture {
            id: self.register(Resource::Texture(desc.clone())),
            desc: desc.clone(),
        })
    }

    fn create_buffer_init(
        &self,
        label: &'static str,
        contents: &[u8],
    ) -> Result<RecordedBuffer, SetupError> {
        let size = contents.len() as u64;
        Ok(RecordedBuffer {
            id: self.register(Resource::Buffer { label, size }),
            contents: contents.to_vec(),
        })
    }

    fn create_buffer(&self, label: &'static str, size: u64) -> Result<RecordedBuffer, SetupError> {
        let exhausted = || SetupError::Allocation {
            label: label.to_string(),
            size,
        };
        if let Some(left) = self.buffer_budget.get() {
            let left = left.checked_sub(1).ok_or_else(exhausted)?;
            self.buffer_budget.set(Some(left));
        }

        let len = usize::try_from(size).map_err(|_| exhausted())?;
        Ok(RecordedBuffer {
            id: self.register(Resource::Buffer { label, size }),
            contents: vec![0; len],
        })
    }

    fn create_compute_pipeline(
        &self,
        desc: &ComputePipelineDesc<'_, Self>,
    ) -> Result<RecordedComputePipeline, SetupError> {
        let linked: Vec<String> = desc.linked_functions.iter().map(|f| f.name.clone()).collect();
        let id = self.register(Resource::ComputePipeline {
            label: desc.label,
            kernel: desc.kernel.name.clone(),
            linked: linked.clone(),
            threads_per_threadgroup: desc.threads_per_threadgroup,
        });
        Ok(RecordedComputePipeline {
            id,
            label: desc.label,
            linked,
        })
    }

    fn create_mesh_pipeline(
        &self,
        desc: &MeshPipelineDesc<'_, Self>,
    ) -> Result<RecordedRenderPipeline, SetupError> {
        Ok(RecordedRenderPipeline {
            id: self.register(Resource::MeshPipeline {
                label: desc.label,
                mesh: desc.mesh.name.clone(),
                fragment: desc.fragment.name.clone(),
                color_format: desc.color_format,
            }),
        })
    }

    fn acceleration_structure_sizes(
        &self,
        desc: &AccelerationStructureDesc<'_, Self>,
    ) -> AccelerationStructureSizes {
        let count = desc.bounding_box_count as u64;
        let structure_size = count * (desc.bounding_box_stride + desc.primitive_data_stride);
        AccelerationStructureSizes {
            structure_size,
            scratch_size: structure_size,
        }
    }

    fn create_acceleration_structure(
        &self,
        size: u64,
    ) -> Result<RecordedAccelerationStructure, SetupError> {
        Ok(RecordedAccelerationStructure {
            id: self.register(Resource::AccelerationStructure { size }),
        })
    }

    fn create_intersection_function_table(
        &self,
        pipeline: &RecordedComputePipeline,
        functions: &[&RecordedFunction],
    ) -> Result<RecordedFunctionTable, SetupError> {
        if let Some(missing) = functions.iter().find(|f| !pipeline.linked.contains(&f.name)) {
            return Err(SetupError::NotLinked {
                function: missing.name.clone(),
                pipeline: pipeline.label.to_string(),
            });
        }

        Ok(RecordedFunctionTable {
            id: self.register(Resource::IntersectionFunctionTable {
                pipeline: pipeline.id,
                functions: functions.iter().map(|f| f.name.clone()).collect(),
            }),
        })
    }

    fn command_buffer(&self, label: &'static str) -> RecordedCommands {
        RecordedCommands {
            label,
            commands: Vec::new(),
        }
    }

    fn commit(&self, commands: RecordedCommands) {
        let mut log = self.commands.borrow_mut();
        log.extend(commands.commands);
        log.push(Command::Commit {
            label: commands.label,
        });
    }
}

impl CommandBuffer<RecordingBackend> for RecordedCommands {
    fn build_acceleration_structure(
        &mut self,
        structure: &RecordedAccelerationStructure,
        desc: &AccelerationStructureDesc<'_, RecordingBackend>,
        scratch: &RecordedBuffer,
    ) {
        self.commands.push(Command::BuildAccelerationStructure {
            structure: structure.id,
            scratch: scratch.id,
            bounding_boxes: desc.bounding_boxes.contents.clone(),
            bounding_box_count: desc.bounding_box_count,
            primitive_data: desc.primitive_data.contents.clone(),
            primitive_data_stride: desc.primitive_data_stride,
            intersection_function_table_offset: desc.intersection_function_table_offset,
        });
    }

    fn dispatch(&mut self, dispatch: &ComputeDispatch<'_, RecordingBackend>) {
        let (as_slot, structure) = dispatch.acceleration_structure;
        let (table_slot, table) = dispatch.intersection_functions;
        self.commands.push(Command::Dispatch {
            pipeline: dispatch.pipeline.id,
            textures: dispatch.textures.iter().map(|(slot, t)| (*slot, t.id)).collect(),
            acceleration_structure: (as_slot, structure.id),
            intersection_functions: (table_slot, table.id),
            threadgroups: dispatch.threadgroups,
            threads_per_threadgroup: dispatch.threads_per_threadgroup,
        });
    }

    fn draw_mesh(
        &mut self,
        drawable: &RecordedDrawable,
        pass: &RenderPassDesc,
        draw: &MeshDraw<'_, RecordingBackend>,
    ) {
        self.commands.push(Command::RenderPass {
            drawable: drawable.id,
            pass: *pass,
            pipeline: draw.pipeline.id,
            fragment_textures: draw.fragment_textures.iter().map(|(slot, t)| (*slot, t.id)).collect(),
            object_threadgroups: draw.object_threadgroups,
            threads_per_object_threadgroup: draw.threads_per_object_threadgroup,
            threads_per_mesh_threadgroup: draw.threads_per_mesh_threadgroup,
        });
    }

    fn present(&mut self, drawable: RecordedDrawable) {
        self.commands.push(Command::Present { drawable: drawable.id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kernel_pipeline(backend: &RecordingBackend, linked: &[&str]) -> RecordedComputePipeline {
        let names: Vec<&str> = std::iter::once("kern").chain(linked.iter().copied()).collect();
        let library = RecordingLibrary::new(&names);
        let kernel = backend.function(&library, "kern").unwrap();
        let linked: Vec<RecordedFunction> = linked
            .iter()
            .map(|name| backend.function(&library, name).unwrap())
            .collect();
        let linked_refs: Vec<&RecordedFunction> = linked.iter().collect();
        backend
            .create_compute_pipeline(&ComputePipelineDesc {
                label: "test kernel",
                kernel: &kernel,
                linked_functions: &linked_refs,
                threads_per_threadgroup: Size3::new(8, 8, 1),
            })
            .unwrap()
    }

    #[test]
    fn missing_function_is_reported_by_name() {
        let backend = RecordingBackend::new();
        let library = RecordingLibrary::new(&["mesh"]);
        let err = backend.function(&library, "frag").unwrap_err();
        assert_eq!(err, SetupError::MissingFunction("frag".into()));
    }

    #[test]
    fn intersection_table_requires_linked_function() {
        let backend = RecordingBackend::new();
        let pipeline = kernel_pipeline(&backend, &[]);
        let stray = RecordedFunction { name: "inte".into() };

        let err = backend
            .create_intersection_function_table(&pipeline, &[&stray])
            .unwrap_err();
        assert!(matches!(err, SetupError::NotLinked { ref function, .. } if function == "inte"));
    }

    #[test]
    fn intersection_table_accepts_linked_function() {
        let backend = RecordingBackend::new();
        let pipeline = kernel_pipeline(&backend, &["inte"]);
        let inte = RecordedFunction { name: "inte".into() };

        assert!(backend.create_intersection_function_table(&pipeline, &[&inte]).is_ok());
    }

    #[test]
    fn storage_textures_can_be_rejected() {
        let backend = RecordingBackend::without_storage_textures();
        let desc = TextureDesc {
            label: "t",
            width: 8,
            height: 8,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::STORAGE_BINDING,
        };
        assert!(matches!(
            backend.create_texture(&desc),
            Err(SetupError::UnsupportedUsage { .. })
        ));
    }

    #[test]
    fn buffer_allocations_fail_once_the_budget_is_spent() {
        let backend = RecordingBackend::new();
        backend.fail_buffer_allocations_after(1);

        assert!(backend.create_buffer("first", 16).is_ok());
        assert_eq!(
            backend.create_buffer("second", 16).unwrap_err(),
            SetupError::Allocation {
                label: "second".into(),
                size: 16
            }
        );
        assert!(backend.create_buffer_init("contents", &[0; 4]).is_ok());

        backend.restore_buffer_allocations();
        assert!(backend.create_buffer("third", 16).is_ok());
    }

    #[test]
    fn commit_appends_commands_then_marker() {
        let backend = RecordingBackend::new();
        let drawable = backend.next_drawable(64, 64);
        let id = drawable.id();

        let mut commands = backend.command_buffer("frame");
        commands.present(drawable);
        backend.commit(commands);

        assert_eq!(
            backend.take_commands(),
            vec![Command::Present { drawable: id }, Command::Commit { label: "frame" }]
        );
        assert!(backend.commands().is_empty());
    }
}

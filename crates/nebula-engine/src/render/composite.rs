use crate::gfx::{Backend, CommandBuffer, MeshDraw, MeshPipelineDesc, SetupError, Size3, TextureDesc};

use super::{
    FRAGMENT_FUNCTION, FrameOutcome, FrameTarget, MESH_FUNCTION, RayTraceStage, StageConfig,
    TRACE_FORMAT, TRACE_HEIGHT, TRACE_WIDTH,
};

const SOURCE_TEXTURE_SLOT: u32 = 0;

enum Source<B: Backend> {
    Traced(RayTraceStage<B>),
    /// Sampled as-is when ray tracing is off.
    Static(B::Texture),
}

/// Draws the traced texture over a full-screen quad and presents it.
pub struct CompositeStage<B: Backend> {
    pipeline: B::RenderPipeline,
    source: Source<B>,
}

impl<B: Backend> CompositeStage<B> {
    pub fn new(
        backend: &B,
        color_format: wgpu::TextureFormat,
        library: &B::Library,
        config: &StageConfig,
    ) -> Result<Self, SetupError> {
        let mesh = backend.function(library, MESH_FUNCTION)?;
        let fragment = backend.function(library, FRAGMENT_FUNCTION)?;
        let pipeline = backend.create_mesh_pipeline(&MeshPipelineDesc {
            label: "nebula composite",
            mesh: &mesh,
            fragment: &fragment,
            color_format,
        })?;

        let source = if config.ray_tracing {
            Source::Traced(RayTraceStage::new(backend, library, config.rebuild)?)
        } else {
            log::info!("ray tracing disabled; compositing a static texture");
            Source::Static(backend.create_texture(&TextureDesc {
                label: "nebula static texture",
                width: TRACE_WIDTH,
                height: TRACE_HEIGHT,
                format: TRACE_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
            })?)
        };

        log::info!("composite stage targeting {color_format:?}");
        Ok(Self { pipeline, source })
    }

    pub fn ray_trace(&self) -> Option<&RayTraceStage<B>> {
        match &self.source {
            Source::Traced(stage) => Some(stage),
            Source::Static(_) => None,
        }
    }

    /// Texture bound at fragment slot 0.
    pub fn source_texture(&self) -> &B::Texture {
        match &self.source {
            Source::Traced(stage) => stage.texture(),
            Source::Static(texture) => texture,
        }
    }

    /// Traces (when enabled), then composites into `target` and presents it.
    ///
    /// The trace buffer is committed before the composite buffer, so the
    /// pass always samples this frame's texture.
    pub fn draw(&mut self, backend: &B, target: FrameTarget<B>) -> FrameOutcome {
        if let Source::Traced(stage) = &mut self.source {
            if stage.draw(backend) == FrameOutcome::Skipped {
                return FrameOutcome::Skipped;
            }
        }

        let FrameTarget { drawable, pass } = target;
        let mut commands = backend.command_buffer("nebula composite");

        commands.draw_mesh(
            &drawable,
            &pass,
            &MeshDraw {
                pipeline: &self.pipeline,
                fragment_textures: &[(SOURCE_TEXTURE_SLOT, self.source_texture())],
                object_threadgroups: Size3::ONE,
                threads_per_object_threadgroup: Size3::ONE,
                threads_per_mesh_threadgroup: Size3::ONE,
            },
        );
        commands.present(drawable);
        backend.commit(commands);

        FrameOutcome::Submitted
    }

    /// Surface size changes need no stage work; the texture stays 8×8.
    pub fn resize(&mut self, width: u32, height: u32) {
        log::trace!("composite stage ignores resize to {width}x{height}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::RenderPassDesc;
    use crate::gfx::record::{Command, RecordingBackend, RecordingLibrary, Resource};
    use crate::render::RebuildPolicy;

    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Bgra8Unorm;

    fn full_library() -> RecordingLibrary {
        RecordingLibrary::new(&["mesh", "frag", "kern", "inte"])
    }

    fn stage(backend: &RecordingBackend, config: &StageConfig) -> CompositeStage<RecordingBackend> {
        CompositeStage::new(backend, FORMAT, &full_library(), config).unwrap()
    }

    fn frame(backend: &RecordingBackend, stage: &mut CompositeStage<RecordingBackend>) -> FrameOutcome {
        let drawable = backend.next_drawable(64, 64);
        stage.draw(backend, FrameTarget::new(drawable, StageConfig::default().render_pass()))
    }

    fn position(commands: &[Command], pred: impl Fn(&Command) -> bool) -> usize {
        commands.iter().position(pred).expect("command recorded")
    }

    fn shape(commands: &[Command]) -> Vec<std::mem::Discriminant<Command>> {
        commands.iter().map(std::mem::discriminant).collect()
    }

    #[test]
    fn end_to_end_frame_on_a_64x64_surface() {
        let backend = RecordingBackend::new();
        let mut stage = stage(&backend, &StageConfig::default());
        let pass = RenderPassDesc {
            label: "host pass",
            clear_color: Some(wgpu::Color::BLACK),
        };

        let drawable = backend.next_drawable(64, 64);
        let drawable_id = drawable.id();
        let texture_id = stage.source_texture().id();
        assert_eq!(stage.draw(&backend, FrameTarget::new(drawable, pass)), FrameOutcome::Submitted);

        let commands = backend.take_commands();
        assert_eq!(commands.len(), 6, "{commands:#?}");

        assert!(matches!(commands[0], Command::BuildAccelerationStructure { .. }));
        assert!(matches!(
            commands[1],
            Command::Dispatch {
                threadgroups: Size3::ONE,
                threads_per_threadgroup: Size3 { width: 8, height: 8, depth: 1 },
                ..
            }
        ));
        assert_eq!(commands[2], Command::Commit { label: "nebula ray trace" });

        match &commands[3] {
            Command::RenderPass {
                drawable,
                pass: recorded,
                fragment_textures,
                object_threadgroups,
                threads_per_object_threadgroup,
                threads_per_mesh_threadgroup,
                ..
            } => {
                assert_eq!(*drawable, drawable_id);
                assert_eq!(*recorded, pass);
                assert_eq!(fragment_textures, &[(0, texture_id)]);
                assert_eq!(*object_threadgroups, Size3::ONE);
                assert_eq!(*threads_per_object_threadgroup, Size3::ONE);
                assert_eq!(*threads_per_mesh_threadgroup, Size3::ONE);
            }
            other => panic!("expected render pass, got {other:?}"),
        }
        assert_eq!(commands[4], Command::Present { drawable: drawable_id });
        assert_eq!(commands[5], Command::Commit { label: "nebula composite" });
    }

    #[test]
    fn dispatch_precedes_render_pass_in_every_frame() {
        let backend = RecordingBackend::new();
        let mut stage = stage(&backend, &StageConfig::default());

        for _ in 0..4 {
            frame(&backend, &mut stage);
            let commands = backend.take_commands();
            let dispatch = position(&commands, |c| matches!(c, Command::Dispatch { .. }));
            let trace_commit = position(&commands, |c| {
                matches!(c, Command::Commit { label: "nebula ray trace" })
            });
            let pass = position(&commands, |c| matches!(c, Command::RenderPass { .. }));
            assert!(dispatch < trace_commit && trace_commit < pass);
        }
    }

    #[test]
    fn repeated_frames_produce_the_same_command_shape() {
        let backend = RecordingBackend::new();
        let mut stage = stage(&backend, &StageConfig::default());

        frame(&backend, &mut stage);
        let first = shape(&backend.take_commands());
        for _ in 0..5 {
            frame(&backend, &mut stage);
            assert_eq!(shape(&backend.take_commands()), first);
        }
    }

    #[test]
    fn texture_never_changes_across_frames() {
        let backend = RecordingBackend::new();
        let mut stage = stage(&backend, &StageConfig::default());
        let before = stage.source_texture().desc().clone();
        let id = stage.source_texture().id();

        for _ in 0..3 {
            frame(&backend, &mut stage);
        }
        stage.resize(1920, 1080);

        assert_eq!(stage.source_texture().desc(), &before);
        assert_eq!(stage.source_texture().id(), id);
        let textures = backend
            .resources()
            .into_iter()
            .filter(|(_, r)| matches!(r, Resource::Texture(_)))
            .count();
        assert_eq!(textures, 1);
    }

    #[test]
    fn each_missing_function_fails_construction() {
        for missing in ["mesh", "frag", "kern", "inte"] {
            let backend = RecordingBackend::new();
            let names: Vec<&str> = ["mesh", "frag", "kern", "inte"]
                .into_iter()
                .filter(|name| *name != missing)
                .collect();
            let library = RecordingLibrary::new(&names);

            let err = CompositeStage::new(&backend, FORMAT, &library, &StageConfig::default()).err();
            assert_eq!(err, Some(SetupError::MissingFunction(missing.into())));
            assert!(backend.commands().is_empty());
        }
    }

    #[test]
    fn pipeline_binds_mesh_and_fragment_with_the_target_format() {
        let backend = RecordingBackend::new();
        let _stage = stage(&backend, &StageConfig::default());

        let mesh_pipeline = backend.resources().into_iter().find_map(|(_, r)| match r {
            Resource::MeshPipeline {
                mesh,
                fragment,
                color_format,
                ..
            } => Some((mesh, fragment, color_format)),
            _ => None,
        });
        assert_eq!(mesh_pipeline, Some(("mesh".to_string(), "frag".to_string(), FORMAT)));
    }

    #[test]
    fn without_ray_tracing_only_the_composite_buffer_is_committed() {
        let backend = RecordingBackend::new();
        let config = StageConfig {
            ray_tracing: false,
            ..StageConfig::default()
        };
        let library = RecordingLibrary::new(&["mesh", "frag"]);
        let mut stage = CompositeStage::new(&backend, FORMAT, &library, &config).unwrap();

        assert!(stage.ray_trace().is_none());
        assert_eq!(frame(&backend, &mut stage), FrameOutcome::Submitted);

        let commands = backend.take_commands();
        assert!(commands.iter().all(|c| !matches!(
            c,
            Command::Dispatch { .. } | Command::BuildAccelerationStructure { .. }
        )));
        assert_eq!(commands.len(), 3);
        assert_eq!(commands[2], Command::Commit { label: "nebula composite" });

        let static_texture = stage.source_texture().desc();
        assert!(!static_texture.usage.contains(wgpu::TextureUsages::STORAGE_BINDING));
    }

    #[test]
    fn without_ray_tracing_storage_support_is_not_needed() {
        let backend = RecordingBackend::without_storage_textures();
        let config = StageConfig {
            ray_tracing: false,
            ..StageConfig::default()
        };

        assert!(CompositeStage::new(&backend, FORMAT, &full_library(), &config).is_ok());
        assert!(matches!(
            CompositeStage::new(&backend, FORMAT, &full_library(), &StageConfig::default()).err(),
            Some(SetupError::UnsupportedUsage { .. })
        ));
    }

    #[test]
    fn build_once_policy_flows_through_config() {
        let backend = RecordingBackend::new();
        let config = StageConfig {
            rebuild: RebuildPolicy::BuildOnce,
            ..StageConfig::default()
        };
        let mut stage = stage(&backend, &config);

        frame(&backend, &mut stage);
        frame(&backend, &mut stage);

        let builds = backend
            .take_commands()
            .iter()
            .filter(|c| matches!(c, Command::BuildAccelerationStructure { .. }))
            .count();
        assert_eq!(builds, 1);
        assert_eq!(stage.ray_trace().map(|s| s.policy()), Some(RebuildPolicy::BuildOnce));
    }

    #[test]
    fn failed_scratch_allocation_skips_composite_and_present() {
        let backend = RecordingBackend::new();
        let mut stage = stage(&backend, &StageConfig::default());

        backend.fail_buffer_allocations_after(0);
        assert_eq!(frame(&backend, &mut stage), FrameOutcome::Skipped);

        let commands = backend.take_commands();
        assert!(commands.iter().all(|c| !matches!(
            c,
            Command::RenderPass { .. }
                | Command::Present { .. }
                | Command::Commit { label: "nebula composite" }
        )));
        assert!(commands.is_empty());

        backend.restore_buffer_allocations();
        assert_eq!(frame(&backend, &mut stage), FrameOutcome::Submitted);
        assert_eq!(shape(&backend.take_commands()).len(), 6);
    }

    #[test]
    fn default_pass_clears_to_the_demo_green() {
        let pass = StageConfig::default().render_pass();
        let color = pass.clear_color.unwrap();
        assert_eq!((color.r, color.a), (0.0, 1.0));
        assert!((color.g - 104.0 / 255.0).abs() < 1e-9);
        assert!((color.b - 55.0 / 255.0).abs() < 1e-9);
    }
}

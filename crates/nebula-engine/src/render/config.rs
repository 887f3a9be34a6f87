use crate::gfx::RenderPassDesc;

/// When the acceleration structure is (re)built.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum RebuildPolicy {
    /// Encode a build on every frame from the same static inputs.
    #[default]
    EveryFrame,
    /// Encode a build on the first frame only. The geometry never changes,
    /// so later frames trace the same structure.
    BuildOnce,
}

/// Stage configuration.
#[derive(Debug, Clone)]
pub struct StageConfig {
    /// Trace the sphere into the composited texture. When disabled the quad
    /// samples a static, zero-initialized texture and no compute work is
    /// encoded.
    pub ray_tracing: bool,

    pub rebuild: RebuildPolicy,

    /// Clear color of the composite pass.
    pub clear_color: wgpu::Color,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            ray_tracing: true,
            rebuild: RebuildPolicy::EveryFrame,
            clear_color: wgpu::Color {
                r: 0.0,
                g: 104.0 / 255.0,
                b: 55.0 / 255.0,
                a: 1.0,
            },
        }
    }
}

impl StageConfig {
    /// Render pass descriptor handed to the composite stage each frame.
    pub fn render_pass(&self) -> RenderPassDesc {
        RenderPassDesc {
            label: "nebula composite pass",
            clear_color: Some(self.clear_color),
        }
    }
}

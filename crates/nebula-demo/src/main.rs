mod cli;

use anyhow::{Context, Result};

use nebula_engine::core::{App, AppControl, FrameCtx};
use nebula_engine::device::{Gpu, GpuInit};
use nebula_engine::gfx::wgpu_backend::{WgpuBackend, WgpuLibrary};
use nebula_engine::logging::{init_logging, LoggingConfig};
use nebula_engine::render::{shaders, CompositeStage, FrameTarget, StageConfig};
use nebula_engine::window::{Runtime, RuntimeConfig};

struct NebulaApp {
    composite: CompositeStage<WgpuBackend>,
    config: StageConfig,
}

impl NebulaApp {
    fn new(gpu: &Gpu<'_>, config: StageConfig) -> Result<Self> {
        let library = WgpuLibrary::new(gpu.device(), &shaders::sources())
            .context("failed to compile shader library")?;
        let composite = CompositeStage::new(gpu.backend(), gpu.surface_format(), &library, &config)
            .context("failed to set up render stages")?;
        Ok(Self { composite, config })
    }
}

impl App for NebulaApp {
    fn on_resize(&mut self, size: winit::dpi::PhysicalSize<u32>) {
        self.composite.resize(size.width, size.height);
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        let pass = self.config.render_pass();
        let composite = &mut self.composite;
        ctx.present_with(|backend, drawable| composite.draw(backend, FrameTarget::new(drawable, pass)))
    }
}

fn main() -> Result<()> {
    let cli = cli::parse();
    init_logging(LoggingConfig::default());

    let config = cli.stage_config();
    log::info!("starting nebula: {config:?}");

    Runtime::run(
        RuntimeConfig {
            title: "Nebula".to_string(),
            ..RuntimeConfig::default()
        },
        GpuInit::default(),
        move |gpu| NebulaApp::new(gpu, config),
    )
}

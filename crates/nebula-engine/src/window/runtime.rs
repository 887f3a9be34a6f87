use anyhow::{Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::core::{App, AppControl, FrameCtx};
use crate::device::{Gpu, GpuInit};

/// Window configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "nebula".to_string(),
            initial_size: LogicalSize::new(800.0, 600.0),
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens one window, creates its [`Gpu`], builds the app with `factory`
    /// and drives it once per display refresh until the window closes.
    ///
    /// Errors from window/GPU creation or from `factory` end the loop and are
    /// returned.
    pub fn run<A, F>(config: RuntimeConfig, gpu_init: GpuInit, factory: F) -> Result<()>
    where
        A: App + 'static,
        F: FnOnce(&Gpu<'_>) -> Result<A> + 'static,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = RuntimeState::new(config, gpu_init, factory);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[self_referencing]
struct WindowEntry {
    window: Window,

    #[borrows(window)]
    #[covariant]
    gpu: Gpu<'this>,
}

struct RuntimeState<A, F> {
    config: RuntimeConfig,
    gpu_init: GpuInit,
    factory: Option<F>,

    app: Option<A>,
    entry: Option<WindowEntry>,

    frame_index: u64,
    failure: Option<anyhow::Error>,
    exit_requested: bool,
}

impl<A, F> RuntimeState<A, F>
where
    A: App + 'static,
    F: FnOnce(&Gpu<'_>) -> Result<A>,
{
    fn new(config: RuntimeConfig, gpu_init: GpuInit, factory: F) -> Self {
        Self {
            config,
            gpu_init,
            factory: Some(factory),
            app: None,
            entry: None,
            frame_index: 0,
            failure: None,
            exit_requested: false,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.failure = Some(err);
        self.exit_requested = true;
        event_loop.exit();
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let gpu_init = self.gpu_init.clone();
        let entry = WindowEntryTryBuilder {
            window,
            gpu_builder: |w| pollster::block_on(Gpu::new(w, gpu_init)),
        }
        .try_build()
        .context("GPU initialization failed")?;

        let factory = self.factory.take().context("application already built")?;
        let app = factory(entry.borrow_gpu()).context("failed to build application")?;

        entry.with_window(|w| w.request_redraw());
        self.entry = Some(entry);
        self.app = Some(app);
        Ok(())
    }

    /// Drives one frame; returns the app's directive.
    fn redraw(&mut self) -> AppControl {
        let (Some(app), Some(entry)) = (self.app.as_mut(), self.entry.as_mut()) else {
            return AppControl::Continue;
        };

        self.frame_index += 1;
        let frame_index = self.frame_index;

        entry.with_mut(|fields| {
            let mut ctx = FrameCtx {
                window: fields.window,
                gpu: fields.gpu,
                frame_index,
            };
            app.on_frame(&mut ctx)
        })
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        if let Some(entry) = self.entry.as_mut() {
            entry.with_gpu_mut(|gpu| gpu.resize(size));
            entry.with_window(|w| w.request_redraw());
        }
        if let Some(app) = self.app.as_mut() {
            app.on_resize(size);
        }
    }
}

impl<A, F> ApplicationHandler for RuntimeState<A, F>
where
    A: App + 'static,
    F: FnOnce(&Gpu<'_>) -> Result<A>,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() || self.exit_requested {
            return;
        }

        if let Err(err) = self.start(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        // Continuous redraw; FIFO presentation paces it to the display.
        event_loop.set_control_flow(ControlFlow::Wait);
        if let Some(entry) = &self.entry {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                log::info!("window closed after {} frames", self.frame_index);
                // Stages hold device objects; drop them before the surface.
                self.app = None;
                self.entry = None;
                self.exit_requested = true;
            }

            WindowEvent::Resized(new_size) => self.resize(new_size),

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(size) = self.entry.as_ref().map(|e| e.with_window(|w| w.inner_size())) {
                    self.resize(size);
                }
            }

            WindowEvent::RedrawRequested => {
                if self.redraw() == AppControl::Exit {
                    self.exit_requested = true;
                }
            }

            _ => {}
        }

        if self.exit_requested {
            event_loop.exit();
        }
    }
}

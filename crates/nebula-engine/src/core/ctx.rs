use winit::window::Window;

use crate::device::{Drawable, Gpu, SurfaceErrorAction};
use crate::gfx::wgpu_backend::WgpuBackend;
use crate::render::FrameOutcome;

use super::app::AppControl;

/// Per-frame context passed to [`App::on_frame`](super::App::on_frame).
///
/// Lifetimes:
/// - `'a` is the duration of the callback invocation
/// - `'w` is the window-borrow lifetime carried by `Gpu<'w>`
pub struct FrameCtx<'a, 'w> {
    pub window: &'a Window,
    pub gpu: &'a mut Gpu<'w>,
    /// Frames requested so far, this one included.
    pub frame_index: u64,
}

impl<'a, 'w> FrameCtx<'a, 'w> {
    /// Acquires this frame's drawable and hands it, with the backend, to
    /// `draw`, which is expected to present it.
    ///
    /// A surface error skips the frame; out-of-memory exits.
    pub fn present_with<F>(&mut self, draw: F) -> AppControl
    where
        F: FnOnce(&WgpuBackend, Drawable) -> FrameOutcome,
    {
        let drawable = match self.gpu.begin_frame() {
            Ok(drawable) => drawable,
            Err(err) => {
                log::debug!("frame {} skipped: {err}", self.frame_index);
                return match self.gpu.handle_surface_error(err) {
                    SurfaceErrorAction::Fatal => {
                        log::error!("surface out of memory; exiting");
                        AppControl::Exit
                    }
                    SurfaceErrorAction::Reconfigured | SurfaceErrorAction::SkipFrame => {
                        AppControl::Continue
                    }
                };
            }
        };

        self.window.pre_present_notify();
        if draw(self.gpu.backend(), drawable) == FrameOutcome::Skipped {
            log::debug!("frame {} dropped by the renderer", self.frame_index);
        }

        AppControl::Continue
    }
}

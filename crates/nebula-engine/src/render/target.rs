use crate::gfx::{Backend, RenderPassDesc};

/// Where one frame is drawn: the rented drawable plus the pass describing
/// how to open it.
///
/// The drawable is consumed by the draw; it never outlives the frame.
pub struct FrameTarget<B: Backend> {
    pub drawable: B::Drawable,
    pub pass: RenderPassDesc,
}

impl<B: Backend> FrameTarget<B> {
    #[inline]
    pub fn new(drawable: B::Drawable, pass: RenderPassDesc) -> Self {
        Self { drawable, pass }
    }
}

/// The surface texture of one frame plus a view to render into.
///
/// Short-lived: holding it blocks acquisition of the next frame. Presenting
/// consumes it; dropping it unpresented discards the frame.
pub struct Drawable {
    surface_texture: wgpu::SurfaceTexture,
    pub(crate) view: wgpu::TextureView,
}

impl Drawable {
    pub(crate) fn new(surface_texture: wgpu::SurfaceTexture) -> Self {
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            surface_texture,
            view,
        }
    }

    /// Schedules the texture for display. Call after the work drawing into
    /// it has been submitted.
    pub fn present(self) {
        let Self {
            surface_texture,
            view,
        } = self;
        drop(view);
        surface_texture.present();
    }
}

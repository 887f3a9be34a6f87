//! GPU device + surface management.
//!
//! [`Gpu`] creates the wgpu instance, adapter, device and queue, configures
//! the window surface, and hands out one [`Drawable`] per frame. Resource
//! creation goes through the [`WgpuBackend`](crate::gfx::wgpu_backend::WgpuBackend)
//! it owns.

mod context;
mod error;
mod frame;
mod init;
mod surface;

pub use context::Gpu;
pub use error::SurfaceErrorAction;
pub use frame::Drawable;
pub use init::GpuInit;

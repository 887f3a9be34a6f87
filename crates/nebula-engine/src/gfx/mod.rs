//! GPU backend seam.
//!
//! Stages are written against [`Backend`] and [`CommandBuffer`] instead of a
//! concrete API. Two implementations live here:
//! - [`wgpu_backend`]: the on-screen backend driven by the runtime
//! - [`record`]: a headless backend that records every resource and command

mod backend;
mod error;
mod types;

pub mod record;
pub mod wgpu_backend;

pub use backend::{Backend, CommandBuffer};
pub use error::SetupError;
pub use types::{
    AccelerationStructureDesc, AccelerationStructureSizes, ComputeDispatch, ComputePipelineDesc,
    MeshDraw, MeshPipelineDesc, RenderPassDesc, Size3, TextureDesc,
};

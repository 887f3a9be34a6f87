//! Frame rendering.
//!
//! [`RayTraceStage`] traces the scene into a small texture, [`CompositeStage`]
//! draws that texture over a full-screen quad and presents. Both are generic
//! over [`crate::gfx::Backend`] and own every GPU object they create.
//!
//! Shader functions are looked up by name at construction; a missing name is
//! a construction error, never a draw-time one.

mod composite;
mod config;
mod raytrace;
mod target;

pub mod geometry;
pub mod shaders;

pub use composite::CompositeStage;
pub use config::{RebuildPolicy, StageConfig};
pub use raytrace::{RayTraceStage, TRACE_FORMAT, TRACE_HEIGHT, TRACE_WIDTH};
pub use target::FrameTarget;

pub const MESH_FUNCTION: &str = "mesh";
pub const FRAGMENT_FUNCTION: &str = "frag";
pub const KERNEL_FUNCTION: &str = "kern";
pub const INTERSECTION_FUNCTION: &str = "inte";

/// Result of one `draw` call.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameOutcome {
    /// Work was committed.
    Submitted,
    /// Nothing was committed; the frame is dropped.
    Skipped,
}

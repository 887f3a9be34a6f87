//! Nebula engine crate.
//!
//! A ray-traced sphere composited onto a full-screen quad. `render` holds the
//! two stages, `gfx` the backend seam they are written against (wgpu and a
//! recording backend), and `device`/`window`/`core` the host runtime that
//! drives them once per display refresh.

pub mod core;
pub mod device;
pub mod window;

pub mod coords;
pub mod gfx;
pub mod logging;
pub mod render;

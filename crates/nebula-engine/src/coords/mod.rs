//! Scene-space math shared by the CPU geometry and GPU records.
//!
//! Scene space: +X right, +Y up, camera looking down +Z.

mod vec3;

pub use vec3::Vec3;

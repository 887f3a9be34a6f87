//! Bundled WGSL sources.
//!
//! `raytrace` provides `kern` and `inte`; `composite` provides `mesh` and
//! `frag`. Each pair shares a module so bindings never collide across
//! pipelines.

pub const RAYTRACE_WGSL: &str = include_str!("shaders/raytrace.wgsl");
pub const COMPOSITE_WGSL: &str = include_str!("shaders/composite.wgsl");

/// `(label, source)` pairs in library order.
pub fn sources() -> [(&'static str, &'static str); 2] {
    [("nebula raytrace", RAYTRACE_WGSL), ("nebula composite", COMPOSITE_WGSL)]
}

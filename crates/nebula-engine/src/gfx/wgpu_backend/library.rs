use crate::gfx::{SetupError, Size3};

/// How a named function can be used.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FunctionKind {
    Vertex,
    Fragment,
    Compute { workgroup_size: [u32; 3] },
    /// An entry point of a stage this backend does not drive.
    OtherEntryPoint,
    /// A plain function, callable only from an entry point of the same module.
    Plain,
}

/// A function handle: its name, kind, and the module it was found in.
#[derive(Debug, Clone)]
pub struct WgpuFunction {
    pub(crate) name: String,
    pub(crate) kind: FunctionKind,
    pub(crate) module_index: usize,
    pub(crate) module: wgpu::ShaderModule,
}

struct LibraryModule {
    label: String,
    module: wgpu::ShaderModule,
    reflection: naga::Module,
}

/// Set of compiled WGSL modules searched by function name.
pub struct WgpuLibrary {
    modules: Vec<LibraryModule>,
}

impl WgpuLibrary {
    /// Validates and compiles each `(label, wgsl)` source.
    pub fn new(device: &wgpu::Device, sources: &[(&str, &str)]) -> Result<Self, SetupError> {
        let mut modules = Vec::with_capacity(sources.len());

        for &(label, wgsl) in sources {
            let reflection = reflect(label, wgsl)?;
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(wgsl.into()),
            });

            log::debug!(
                "shader module `{label}`: {} entry points, {} functions",
                reflection.entry_points.len(),
                reflection.functions.len()
            );

            modules.push(LibraryModule {
                label: label.to_string(),
                module,
                reflection,
            });
        }

        Ok(Self { modules })
    }

    pub(crate) fn function(&self, name: &str) -> Result<WgpuFunction, SetupError> {
        self.modules
            .iter()
            .enumerate()
            .find_map(|(index, m)| {
                find_function(&m.reflection, name).map(|kind| {
                    log::trace!("resolved `{name}` in module `{}` as {kind:?}", m.label);
                    WgpuFunction {
                        name: name.to_string(),
                        kind,
                        module_index: index,
                        module: m.module.clone(),
                    }
                })
            })
            .ok_or_else(|| SetupError::MissingFunction(name.to_string()))
    }
}

/// Parses and validates a WGSL source without touching a device.
pub fn reflect(label: &str, wgsl: &str) -> Result<naga::Module, SetupError> {
    let module = naga::front::wgsl::parse_str(wgsl).map_err(|err| SetupError::LibraryCompilation {
        library: label.to_string(),
        message: err.emit_to_string(wgsl),
    })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|err| SetupError::LibraryCompilation {
        library: label.to_string(),
        message: err.to_string(),
    })?;

    Ok(module)
}

/// Checks that `name` is a compute entry point whose declared workgroup size
/// is `threads`, and returns that size.
pub(crate) fn check_kernel(
    pipeline: &str,
    name: &str,
    kind: FunctionKind,
    threads: Size3,
) -> Result<[u32; 3], SetupError> {
    let FunctionKind::Compute { workgroup_size } = kind else {
        return Err(SetupError::WrongStage {
            function: name.to_string(),
            expected: "compute",
        });
    };

    if workgroup_size != [threads.width, threads.height, threads.depth] {
        return Err(SetupError::PipelineCompilation {
            pipeline: pipeline.to_string(),
            message: format!(
                "`{name}` declares workgroup size {workgroup_size:?}, dispatches use {threads:?}"
            ),
        });
    }

    Ok(workgroup_size)
}

/// Finds `name` among the entry points, then among plain functions.
pub fn find_function(module: &naga::Module, name: &str) -> Option<FunctionKind> {
    if let Some(ep) = module.entry_points.iter().find(|ep| ep.name == name) {
        let kind = match ep.stage {
            naga::ShaderStage::Vertex => FunctionKind::Vertex,
            naga::ShaderStage::Fragment => FunctionKind::Fragment,
            naga::ShaderStage::Compute => FunctionKind::Compute {
                workgroup_size: ep.workgroup_size,
            },
            #[allow(unreachable_patterns)]
            _ => FunctionKind::OtherEntryPoint,
        };
        return Some(kind);
    }

    module
        .functions
        .iter()
        .any(|(_, f)| f.name.as_deref() == Some(name))
        .then_some(FunctionKind::Plain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::shaders;

    #[test]
    fn bundled_raytrace_source_exposes_kernel_and_intersection() {
        let module = reflect("raytrace", shaders::RAYTRACE_WGSL).unwrap();

        assert_eq!(
            find_function(&module, "kern"),
            Some(FunctionKind::Compute {
                workgroup_size: [8, 8, 1]
            })
        );
        assert_eq!(find_function(&module, "inte"), Some(FunctionKind::Plain));
    }

    #[test]
    fn bundled_composite_source_exposes_mesh_and_fragment() {
        let module = reflect("composite", shaders::COMPOSITE_WGSL).unwrap();

        assert_eq!(find_function(&module, "mesh"), Some(FunctionKind::Vertex));
        assert_eq!(find_function(&module, "frag"), Some(FunctionKind::Fragment));
    }

    #[test]
    fn unknown_name_is_not_found() {
        let module = reflect("composite", shaders::COMPOSITE_WGSL).unwrap();
        assert_eq!(find_function(&module, "kern"), None);
    }

    #[test]
    fn bundled_kernel_matches_the_trace_threadgroup() {
        let module = reflect("raytrace", shaders::RAYTRACE_WGSL).unwrap();
        let kind = find_function(&module, "kern").unwrap();

        assert_eq!(check_kernel("trace", "kern", kind, Size3::new(8, 8, 1)), Ok([8, 8, 1]));
    }

    #[test]
    fn workgroup_size_mismatch_fails_pipeline_creation() {
        let wgsl = "@compute @workgroup_size(4, 4, 1) fn small() {}";
        let module = reflect("small", wgsl).unwrap();
        let kind = find_function(&module, "small").unwrap();

        let err = check_kernel("trace", "small", kind, Size3::new(8, 8, 1)).unwrap_err();
        assert!(matches!(err, SetupError::PipelineCompilation { ref pipeline, .. } if pipeline == "trace"));
    }

    #[test]
    fn non_compute_kernel_is_the_wrong_stage() {
        let module = reflect("composite", shaders::COMPOSITE_WGSL).unwrap();
        let kind = find_function(&module, "frag").unwrap();

        let err = check_kernel("trace", "frag", kind, Size3::new(8, 8, 1)).unwrap_err();
        assert_eq!(
            err,
            SetupError::WrongStage {
                function: "frag".into(),
                expected: "compute"
            }
        );
    }

    #[test]
    fn parse_error_names_the_library() {
        let err = reflect("broken", "fn oops( {").unwrap_err();
        assert!(matches!(err, SetupError::LibraryCompilation { ref library, .. } if library == "broken"));
    }
}

use thiserror::Error;

/// Failure while creating GPU objects.
///
/// Every variant is unrecoverable for the stage being built. Callers decide
/// whether that aborts the process.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum SetupError {
    #[error("shader library `{library}` failed to compile: {message}")]
    LibraryCompilation { library: String, message: String },

    #[error("function `{0}` not found in shader library")]
    MissingFunction(String),

    #[error("function `{function}` cannot be used as a {expected} function")]
    WrongStage {
        function: String,
        expected: &'static str,
    },

    #[error("function `{function}` is not linked into pipeline `{pipeline}`")]
    NotLinked { function: String, pipeline: String },

    #[error("pipeline `{pipeline}` failed to compile: {message}")]
    PipelineCompilation { pipeline: String, message: String },

    #[error("texture `{label}` cannot be created as {format:?} with usage {usage:?}")]
    UnsupportedUsage {
        label: String,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    },

    #[error("failed to allocate `{label}` ({size} bytes)")]
    Allocation { label: String, size: u64 },
}

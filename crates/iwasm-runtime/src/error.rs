//! Error types for the runtime crate.

use thiserror::Error;

/// Runtime error type.
///
/// These are faults of the native runtime itself. A module that runs to
/// completion and reports its own failure is not a `RuntimeError`; that
/// verdict travels as the inner `Err(String)` of the instance calls.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Failed to build the wasmtime engine
    #[error("engine creation failed: {0}")]
    Engine(String),

    /// Module bytes are not a well-formed module
    #[error("compile: {0}")]
    Compile(String),

    /// WASI context or linker setup failed
    #[error("WASI setup failed: {0}")]
    Wasi(String),

    /// Linking or running the start section failed
    #[error("instantiation: {0}")]
    Instantiation(String),

    /// A required guest export is missing or has the wrong signature
    #[error("export: {0}")]
    Export(String),

    /// The guest trapped (including fuel exhaustion)
    #[error("trap in {function}: {message}")]
    Trap {
        /// Guest function that was executing
        function: &'static str,
        /// Rendered trap with its cause chain
        message: String,
    },

    /// Guest pointer/length pair fell outside linear memory
    #[error("memory access: {0}")]
    MemoryAccess(#[from] wasmtime::MemoryAccessError),

    /// Guest pointer/length pair checked before copying
    #[error("guest range {offset}+{len} is outside linear memory")]
    OutOfBounds {
        /// Guest address
        offset: usize,
        /// Requested length
        len: usize,
    },

    /// Host data does not fit the 32-bit guest address space
    #[error("buffer of {0} bytes exceeds the guest address space")]
    BufferTooLarge(usize),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl RuntimeError {
    /// Wrap a wasmtime call failure raised by `function`.
    pub(crate) fn trap(function: &'static str) -> impl FnOnce(wasmtime::Error) -> Self {
        move |e| RuntimeError::Trap {
            function,
            message: format!("{e:#}"),
        }
    }
}

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

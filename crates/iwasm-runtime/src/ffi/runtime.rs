//! Runtime and instance creation across the C ABI.

use super::buffer::{Buffer, Slice};
use super::guarded;
use crate::wasm::{Instance, Runtime, RuntimeConfig};

/// Outcome of [`runtime_create`]: exactly one of `runtime` and `error` is set.
#[repr(C)]
#[derive(Debug)]
pub struct RuntimeResult {
    /// The runtime, on success
    pub runtime: Option<Box<Runtime>>,
    /// UTF-8 failure message, on error
    pub error: Option<Box<Buffer>>,
}

impl RuntimeResult {
    fn new(outcome: Result<Runtime, String>) -> Box<Self> {
        Box::new(match outcome {
            Ok(runtime) => RuntimeResult {
                runtime: Some(Box::new(runtime)),
                error: None,
            },
            Err(message) => {
                tracing::warn!("runtime creation failed: {message}");
                RuntimeResult {
                    runtime: None,
                    error: Some(Box::new(message.into())),
                }
            }
        })
    }
}

/// Outcome of [`runtime_create_instance`]: exactly one of `instance` and
/// `error` is set.
#[repr(C)]
#[derive(Debug)]
pub struct InstanceResult {
    /// The instance, on success
    pub instance: Option<Box<Instance>>,
    /// UTF-8 failure message, on error
    pub error: Option<Box<Buffer>>,
}

impl InstanceResult {
    fn new(outcome: Result<Instance, String>) -> Box<Self> {
        Box::new(match outcome {
            Ok(instance) => InstanceResult {
                instance: Some(Box::new(instance)),
                error: None,
            },
            Err(message) => {
                tracing::warn!("instance creation failed: {message}");
                InstanceResult {
                    instance: None,
                    error: Some(Box::new(message.into())),
                }
            }
        })
    }
}

/// Create a runtime with the default configuration.
#[no_mangle]
pub extern "C" fn runtime_create() -> Box<RuntimeResult> {
    RuntimeResult::new(guarded("runtime_create", || {
        Runtime::new(RuntimeConfig::default()).map_err(|e| e.to_string())
    }))
}

/// Create a runtime from a JSON-encoded `RuntimeConfig`.
///
/// Fields missing from the JSON keep their defaults; an empty slice means
/// the default configuration.
///
/// # Safety
///
/// `config` must satisfy [`Slice::as_bytes`].
#[no_mangle]
pub unsafe extern "C" fn runtime_create_with_config(config: Slice) -> Box<RuntimeResult> {
    let config = config.as_bytes();
    RuntimeResult::new(guarded("runtime_create_with_config", || {
        let config = if config.is_empty() {
            RuntimeConfig::default()
        } else {
            RuntimeConfig::from_json(config).map_err(|e| e.to_string())?
        };
        Runtime::new(config).map_err(|e| e.to_string())
    }))
}

/// Release a runtime envelope and whatever it holds. Null is a no-op.
///
/// Every instance created from the runtime must already be destroyed.
#[no_mangle]
pub extern "C" fn runtime_result_destroy(result: Option<Box<RuntimeResult>>) {
    drop(result);
}

/// Compile and instantiate `wasm_bytes` on `runtime`.
///
/// # Safety
///
/// `wasm_bytes` must satisfy [`Slice::as_bytes`].
#[no_mangle]
pub unsafe extern "C" fn runtime_create_instance(
    runtime: Option<&Runtime>,
    wasm_bytes: Slice,
) -> Box<InstanceResult> {
    let wasm_bytes = wasm_bytes.as_bytes();
    InstanceResult::new(guarded("runtime_create_instance", || {
        let runtime = runtime.ok_or("runtime is null")?;
        runtime.create_instance(wasm_bytes).map_err(|e| e.to_string())
    }))
}

/// Release an instance envelope and whatever it holds. Null is a no-op.
#[no_mangle]
pub extern "C" fn instance_result_destroy(result: Option<Box<InstanceResult>>) {
    drop(result);
}

//! Owned handles over the runtime and instance envelopes.

use std::marker::PhantomData;
use std::mem::ManuallyDrop;

use super::envelope::{AggregateEnvelope, PrepareDataEnvelope};
use super::error::ApiError;
use super::transfer::{to_owned_snapshot, to_slice, TransientBatch};
use crate::ffi::{self, Buffer, InstanceResult, RuntimeResult};
use crate::wasm::RuntimeConfig;

/// Message of a populated error arm.
pub(super) fn error_message(error: Option<&Buffer>) -> Option<String> {
    error.map(|buffer| String::from_utf8_lossy(&to_owned_snapshot(buffer)).into_owned())
}

/// One execution environment.
///
/// Creation never fails outright: a failed creation yields a handle in the
/// error state, which only reports its error and releases itself on drop.
/// Not `Send`/`Sync`; instances borrow it so it cannot be dropped first.
#[derive(Debug)]
pub struct RuntimeHandle {
    result: ManuallyDrop<Box<RuntimeResult>>,
    _not_send: PhantomData<*const ()>,
}

impl RuntimeHandle {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::from_result(ffi::runtime_create())
    }

    /// Create a runtime with `config`.
    pub fn with_config(config: &RuntimeConfig) -> Result<Self, ApiError> {
        let json = serde_json::to_vec(config)?;
        Ok(Self::from_config_json(&json))
    }

    /// Create a runtime from a JSON-encoded `RuntimeConfig`.
    ///
    /// The boundary parses the JSON; a bad document yields a handle in the
    /// error state.
    pub fn from_config_json(json: &[u8]) -> Self {
        // SAFETY: `json` outlives the call.
        Self::from_result(unsafe { ffi::runtime_create_with_config(to_slice(json)) })
    }

    fn from_result(result: Box<RuntimeResult>) -> Self {
        Self {
            result: ManuallyDrop::new(result),
            _not_send: PhantomData,
        }
    }

    /// The creation failure, if any.
    pub fn err(&self) -> Option<ApiError> {
        error_message(self.result.error.as_deref()).map(ApiError::Boundary)
    }

    /// `Ok` when the runtime is usable.
    pub fn check(&self) -> Result<(), ApiError> {
        self.err().map_or(Ok(()), Err)
    }

    fn precondition(&self, operation: &'static str) -> Result<&crate::wasm::Runtime, ApiError> {
        match (&self.result.runtime, error_message(self.result.error.as_deref())) {
            (Some(runtime), None) => Ok(&**runtime),
            (_, cause) => Err(ApiError::Precondition {
                operation,
                cause: cause.unwrap_or_else(|| "runtime missing".to_string()),
            }),
        }
    }

    /// Load `wasm_bytes` as a new instance.
    ///
    /// `Err` means this runtime is itself in the error state and nothing
    /// crossed the boundary. A module that fails to load yields an
    /// instance handle in the error state.
    pub fn create_instance(&self, wasm_bytes: &[u8]) -> Result<InstanceHandle<'_>, ApiError> {
        let runtime = self.precondition("create_instance")?;
        // SAFETY: `wasm_bytes` outlives the call.
        let result = unsafe { ffi::runtime_create_instance(Some(runtime), to_slice(wasm_bytes)) };
        Ok(InstanceHandle {
            result: ManuallyDrop::new(result),
            _runtime: PhantomData,
        })
    }
}

impl Default for RuntimeHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RuntimeHandle {
    fn drop(&mut self) {
        // SAFETY: taken exactly once, here.
        let result = unsafe { ManuallyDrop::take(&mut self.result) };
        ffi::runtime_result_destroy(Some(result));
    }
}

/// One loaded module, bound to the runtime it was created from.
#[derive(Debug)]
pub struct InstanceHandle<'rt> {
    result: ManuallyDrop<Box<InstanceResult>>,
    _runtime: PhantomData<&'rt RuntimeHandle>,
}

impl InstanceHandle<'_> {
    /// The load failure, if any.
    pub fn err(&self) -> Option<ApiError> {
        error_message(self.result.error.as_deref()).map(ApiError::Boundary)
    }

    /// `Ok` when the instance is usable.
    pub fn check(&self) -> Result<(), ApiError> {
        self.err().map_or(Ok(()), Err)
    }

    fn precondition(&self, operation: &'static str) -> Result<&crate::wasm::Instance, ApiError> {
        match (&self.result.instance, error_message(self.result.error.as_deref())) {
            (Some(instance), None) => Ok(&**instance),
            (_, cause) => Err(ApiError::Precondition {
                operation,
                cause: cause.unwrap_or_else(|| "instance missing".to_string()),
            }),
        }
    }

    /// Run the first stage.
    ///
    /// `Err` is a refused call on a failed instance; the module's own
    /// verdict is inside the envelope.
    pub fn prepare_data(&self, config: &[u8], request: &[u8]) -> Result<PrepareDataEnvelope, ApiError> {
        let instance = self.precondition("prepare_data")?;
        // SAFETY: both views borrow arguments that outlive the call.
        let result = unsafe {
            ffi::instance_prepare_data(Some(instance), to_slice(config), to_slice(request))
        };
        Ok(PrepareDataEnvelope::new(result))
    }

    /// Run the second stage over a batch of prepared payloads.
    pub fn aggregate(
        &self,
        config: &[u8],
        data: &[&[u8]],
        request: &[u8],
    ) -> Result<AggregateEnvelope, ApiError> {
        let instance = self.precondition("aggregate")?;
        let batch = TransientBatch::new(data);
        // SAFETY: `batch` and both views outlive the call.
        let result = unsafe {
            ffi::instance_aggregate(
                Some(instance),
                to_slice(config),
                batch.as_slice_array(),
                to_slice(request),
            )
        };
        Ok(AggregateEnvelope::new(result))
    }
}

impl Drop for InstanceHandle<'_> {
    fn drop(&mut self) {
        // SAFETY: taken exactly once, here.
        let result = unsafe { ManuallyDrop::take(&mut self.result) };
        ffi::instance_result_destroy(Some(result));
    }
}

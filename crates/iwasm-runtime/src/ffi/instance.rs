//! The two processor stages across the C ABI.

use super::buffer::{Buffer, Slice, SliceArray};
use super::guarded;
use crate::wasm::{Aggregation, Instance, ModuleResult};

/// Outcome of [`instance_prepare_data`].
///
/// When `is_error` is set only `error` is populated, otherwise only `data`.
#[repr(C)]
#[derive(Debug)]
pub struct PrepareDataResult {
    /// Tag selecting the populated arm
    pub is_error: bool,
    /// UTF-8 failure message from the module or the runtime
    pub error: Option<Box<Buffer>>,
    /// Prepared payload
    pub data: Option<Box<Buffer>>,
}

impl PrepareDataResult {
    fn new(outcome: Result<Vec<u8>, String>) -> Box<Self> {
        Box::new(match outcome {
            Ok(data) => PrepareDataResult {
                is_error: false,
                error: None,
                data: Some(Box::new(data.into())),
            },
            Err(message) => PrepareDataResult {
                is_error: true,
                error: Some(Box::new(message.into())),
                data: None,
            },
        })
    }
}

/// Outcome of [`instance_aggregate`].
///
/// When `is_error` is set only `error` is populated, otherwise `data` and
/// `digest`.
#[repr(C)]
#[derive(Debug)]
pub struct AggregateResult {
    /// Tag selecting the populated arm
    pub is_error: bool,
    /// UTF-8 failure message from the module or the runtime
    pub error: Option<Box<Buffer>>,
    /// Aggregated payload
    pub data: Option<Box<Buffer>>,
    /// Module-defined digest of `data`
    pub digest: Option<Box<Buffer>>,
}

impl AggregateResult {
    fn new(outcome: Result<Aggregation, String>) -> Box<Self> {
        Box::new(match outcome {
            Ok(Aggregation { data, digest }) => AggregateResult {
                is_error: false,
                error: None,
                data: Some(Box::new(data.into())),
                digest: Some(Box::new(digest.into())),
            },
            Err(message) => AggregateResult {
                is_error: true,
                error: Some(Box::new(message.into())),
                data: None,
                digest: None,
            },
        })
    }
}

/// Collapse a runtime fault and a module verdict into one message.
fn flatten<T>(outcome: crate::Result<ModuleResult<T>>) -> Result<T, String> {
    match outcome {
        Ok(verdict) => verdict,
        Err(e) => {
            tracing::warn!("runtime error: {e}");
            Err(format!("runtime error: {e}"))
        }
    }
}

/// Run the module's `prepare_data` stage.
///
/// # Safety
///
/// `config` and `request` must satisfy [`Slice::as_bytes`].
#[no_mangle]
pub unsafe extern "C" fn instance_prepare_data(
    instance: Option<&Instance>,
    config: Slice,
    request: Slice,
) -> Box<PrepareDataResult> {
    let config = config.as_bytes();
    let request = request.as_bytes();
    PrepareDataResult::new(guarded("instance_prepare_data", || {
        let instance = instance.ok_or("instance is null")?;
        flatten(instance.prepare_data(config, request))
    }))
}

/// Release a prepare-data envelope and its populated arm. Null is a no-op.
#[no_mangle]
pub extern "C" fn prepare_data_result_destroy(result: Option<Box<PrepareDataResult>>) {
    drop(result);
}

/// Run the module's `aggregate` stage over a batch of prepared payloads.
///
/// # Safety
///
/// `config` and `request` must satisfy [`Slice::as_bytes`] and `data` must
/// satisfy [`SliceArray::to_vec`].
#[no_mangle]
pub unsafe extern "C" fn instance_aggregate(
    instance: Option<&Instance>,
    config: Slice,
    data: SliceArray,
    request: Slice,
) -> Box<AggregateResult> {
    let config = config.as_bytes();
    let data = data.to_vec();
    let request = request.as_bytes();
    AggregateResult::new(guarded("instance_aggregate", || {
        let instance = instance.ok_or("instance is null")?;
        flatten(instance.aggregate(config, &data, request))
    }))
}

/// Release an aggregate envelope and its populated arm. Null is a no-op.
#[no_mangle]
pub extern "C" fn aggregate_result_destroy(result: Option<Box<AggregateResult>>) {
    drop(result);
}

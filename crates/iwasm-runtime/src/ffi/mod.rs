//! C ABI of the boundary.
//!
//! Every fallible operation returns a heap-allocated `*Result` envelope that
//! the caller must hand back to the matching `*_destroy` function exactly
//! once. Envelopes carry a failure message or a payload, never both.
//! Destroy functions accept null as a no-op. Messages are opaque UTF-8
//! text without error codes. Declarations for C callers live in
//! `include/iwasm.h`.
//!
//! | Operation | Envelope | Destroy |
//! |-----------|----------|---------|
//! | `runtime_create` | `RuntimeResult` | `runtime_result_destroy` |
//! | `runtime_create_instance` | `InstanceResult` | `instance_result_destroy` |
//! | `instance_prepare_data` | `PrepareDataResult` | `prepare_data_result_destroy` |
//! | `instance_aggregate` | `AggregateResult` | `aggregate_result_destroy` |

// Runtime and Instance cross the boundary as opaque pointers.
#![allow(improper_ctypes_definitions)]

use std::panic::{self, AssertUnwindSafe};

mod buffer;
mod instance;
mod runtime;

pub use buffer::{buffer_destroy, buffer_slice, slice_to_buffer, Buffer, Slice, SliceArray};
pub use instance::{
    aggregate_result_destroy, instance_aggregate, instance_prepare_data,
    prepare_data_result_destroy, AggregateResult, PrepareDataResult,
};
pub use runtime::{
    instance_result_destroy, runtime_create, runtime_create_instance, runtime_create_with_config,
    runtime_result_destroy, InstanceResult, RuntimeResult,
};

#[cfg(test)]
pub(crate) use buffer::live;

/// Run `f`, turning a panic into an error message so it never unwinds
/// into foreign code.
fn guarded<T>(operation: &'static str, f: impl FnOnce() -> Result<T, String>) -> Result<T, String> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(operation, "panic at the boundary: {message}");
            Err(format!("{operation} panicked: {message}"))
        }
    }
}

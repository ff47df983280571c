//! Safe host-side wrapper over the C ABI.
//!
//! Every envelope the boundary returns is held by an owning type whose
//! `Drop` calls the matching destroy function, so each one is released
//! exactly once on every path. Handles in the error state refuse further
//! operations locally with [`ApiError::Precondition`].
//!
//! ```rust,ignore
//! use iwasm_runtime::api::RuntimeHandle;
//!
//! let runtime = RuntimeHandle::new();
//! runtime.check()?;
//! let instance = runtime.create_instance(&wasm_bytes)?;
//! instance.check()?;
//!
//! let data = instance.prepare_data(b"IntelliX", url.as_bytes())?.into_data()?;
//! let aggregation = instance.aggregate(b"IntelliX", &[&data], b"first")?.into_data()?;
//! println!("{:?}", aggregation.as_f64_le());
//! ```

mod envelope;
mod error;
mod handle;
pub mod transfer;

pub use envelope::{AggregateEnvelope, Aggregation, PrepareDataEnvelope};
pub use error::ApiError;
pub use handle::{InstanceHandle, RuntimeHandle};

#[cfg(test)]
mod tests;

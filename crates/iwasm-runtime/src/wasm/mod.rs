//! Native side of the boundary: the processor runtime.
//!
//! A [`Runtime`] owns a wasmtime engine. Each [`Instance`] compiled from it
//! owns a store, a WASI preview1 context and the host imports of
//! [`host_functions`], and exposes the two processor entry points.
//!
//! ## Security Model
//!
//! - **Memory isolation**: Each module runs in its own linear memory space
//! - **Capability-based**: Stdio, env and filesystem only when granted
//! - **Network through the host**: `iwasm_host.http_get`, gated by config
//! - **Metering**: Optional fuel budget per boundary call
//!
//! ## Usage
//!
//! ```rust,ignore
//! use iwasm_runtime::wasm::{Runtime, RuntimeConfig};
//!
//! let runtime = Runtime::new(RuntimeConfig::default())?;
//! let instance = runtime.create_instance(&wasm_bytes)?;
//!
//! let data = instance.prepare_data(b"IntelliX", url.as_bytes())??;
//! let aggregation = instance.aggregate(b"IntelliX", &[&data], b"first")??;
//! ```

mod config;
mod guest;
pub mod host_functions;
mod instance;
mod memory;
mod network;
mod runtime;

pub use config::{HostCapabilities, RuntimeConfig};
pub use instance::{Aggregation, Instance, ModuleResult};
pub use network::NetworkAccess;
pub use runtime::{HostState, Runtime};

#[cfg(test)]
mod tests;

//! # iwasm runtime
//!
//! Host boundary for sandboxed WebAssembly processor modules.
//!
//! A processor module exposes two stages: `prepare_data(config, request)`
//! fetches or builds a payload, and `aggregate(config, data[], request)`
//! reduces a batch of payloads to a result plus a digest. This crate runs
//! such modules and exposes them across a C ABI whose every allocation is
//! released exactly once.
//!
//! ## Layers
//!
//! | Module | Role |
//! |--------|------|
//! | [`wasm`] | wasmtime engine, per-instance store, guest buffer ABI, host imports |
//! | [`ffi`] | `extern "C"` operations and their result envelopes |
//! | [`api`] | Owning Rust handles over [`ffi`]; drop releases every envelope |
//! | [`pipeline`] | Runtime, instance, prepare, aggregate in one call |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use iwasm_runtime::{Pipeline, PipelineRequest, RuntimeConfig};
//!
//! let request = PipelineRequest::new(std::fs::read("processor.wasm")?)
//!     .config("IntelliX")
//!     .source("https://api.coingecko.com/api/v3/coins/bitcoin/history?date=24-11-2024")
//!     .request("first");
//!
//! let output = Pipeline::new(RuntimeConfig::networked()).run(&request)?;
//! println!("{:?}", output.aggregation.as_f64_le());
//! ```
//!
//! ## Concurrency
//!
//! Calls block the calling thread until the module returns. Calls into one
//! instance are serialised by a lock around its store; the safe handles are
//! neither `Send` nor `Sync`.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod api;
pub mod error;
pub mod ffi;
pub mod pipeline;
pub mod wasm;

// Re-export main types
pub use api::{AggregateEnvelope, Aggregation, ApiError, InstanceHandle, PrepareDataEnvelope, RuntimeHandle};
pub use error::{Result, RuntimeError};
pub use pipeline::{Pipeline, PipelineError, PipelineOutput, PipelineRequest, PipelineStage};
pub use wasm::{HostCapabilities, RuntimeConfig};

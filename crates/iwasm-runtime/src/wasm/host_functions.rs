//! Host functions imported by processor modules.
//!
//! Modules do their own I/O from inside the sandbox, but the only way out is
//! through these imports, which the host gates with [`HostCapabilities`].
//!
//! ## Import Module
//!
//! ```wat
//! (import "iwasm_host" "http_get" (func $http_get (param i32 i32) (result i32)))
//! (import "iwasm_host" "take_response" (func $take_response (param i32) (result i32)))
//! ```
//!
//! ## Response Convention
//!
//! `http_get(url_ptr, url_len)` parks the response in the host state and
//! returns its length, or `-(len + 1)` when the parked bytes are an error
//! message. The module then allocates `len` bytes and calls
//! `take_response(dst_ptr)` to copy them in; it returns the copied length, or
//! `-1` when nothing is parked.
//!
//! [`HostCapabilities`]: super::config::HostCapabilities

use wasmtime::{Caller, Linker, Memory};

use super::memory;
use super::runtime::HostState;
use crate::error::{Result, RuntimeError};

/// Import module name for all host functions.
pub const HOST_MODULE: &str = "iwasm_host";

/// Host functions exposed to processor modules.
pub struct HostFunctions;

impl HostFunctions {
    /// Register all host functions with the wasmtime linker.
    pub fn register(linker: &mut Linker<HostState>) -> Result<()> {
        Self::register_http_get(linker)?;
        Self::register_take_response(linker)?;
        Ok(())
    }

    fn register_http_get(linker: &mut Linker<HostState>) -> Result<()> {
        linker
            .func_wrap(
                HOST_MODULE,
                "http_get",
                |mut caller: Caller<'_, HostState>,
                 url_ptr: i32,
                 url_len: i32|
                 -> wasmtime::Result<i32> {
                    let memory = get_memory(&mut caller)?;
                    let url = memory::read(
                        &memory,
                        &caller,
                        memory::guest_usize(url_ptr),
                        memory::guest_usize(url_len),
                    )?;

                    let outcome = match String::from_utf8(url) {
                        Ok(url) => {
                            tracing::debug!(%url, "module requested http_get");
                            caller.data().network().get(&url)
                        }
                        Err(_) => Err("http_get: url is not valid UTF-8".to_string()),
                    };
                    if let Err(message) = &outcome {
                        tracing::warn!(%message, "http_get failed");
                    }

                    Ok(caller.data_mut().park_response(outcome))
                },
            )
            .map_err(|e| RuntimeError::Wasi(format!("failed to register http_get: {e}")))?;
        Ok(())
    }

    fn register_take_response(linker: &mut Linker<HostState>) -> Result<()> {
        linker
            .func_wrap(
                HOST_MODULE,
                "take_response",
                |mut caller: Caller<'_, HostState>, dst_ptr: i32| -> wasmtime::Result<i32> {
                    let Some(bytes) = caller.data_mut().take_response() else {
                        return Ok(-1);
                    };
                    let memory = get_memory(&mut caller)?;
                    memory::write(&memory, &mut caller, memory::guest_usize(dst_ptr), &bytes)?;
                    Ok(memory::guest_len(bytes.len())?)
                },
            )
            .map_err(|e| RuntimeError::Wasi(format!("failed to register take_response: {e}")))?;
        Ok(())
    }
}

/// Get the memory export from the caller.
fn get_memory(caller: &mut Caller<'_, HostState>) -> Result<Memory> {
    caller
        .get_export("memory")
        .and_then(|e| e.into_memory())
        .ok_or_else(|| RuntimeError::Export("no memory export found".to_string()))
}

//! Host-side view of the guest buffer ABI.
//!
//! A guest buffer is an opaque i32 handle created by `buffer_create`; its
//! bytes live in linear memory at `buffer_get_mut_ptr(handle)` for
//! `buffer_len(handle)` bytes. Whoever owns a handle must eventually pass it
//! to `buffer_destroy`, or hand it to a guest call that consumes it.

use wasmtime::{Instance as WasmInstance, Memory, Store, TypedFunc};

use super::memory;
use super::runtime::HostState;
use crate::error::{Result, RuntimeError};

/// Typed processor exports, resolved once per instance.
pub(crate) struct GuestExports {
    pub buffer_create: TypedFunc<i32, i32>,
    pub buffer_get_mut_ptr: TypedFunc<i32, i32>,
    pub buffer_len: TypedFunc<i32, i32>,
    pub buffer_destroy: TypedFunc<i32, ()>,
    pub buffer_array_create: TypedFunc<i32, i32>,
    pub buffer_array_set_buffer: TypedFunc<(i32, i32, i32), ()>,
    /// Optional: lets the host release an array that never reached `aggregate`.
    pub buffer_array_destroy: Option<TypedFunc<i32, ()>>,
    pub prepare_data: TypedFunc<(i32, i32), i32>,
    pub prepare_data_result_is_error: TypedFunc<i32, i32>,
    pub prepare_data_result_get_data: TypedFunc<i32, i32>,
    pub prepare_data_result_destroy: TypedFunc<i32, ()>,
    pub aggregate: TypedFunc<(i32, i32, i32), i32>,
    pub aggregate_result_is_error: TypedFunc<i32, i32>,
    pub aggregate_result_get_data: TypedFunc<i32, i32>,
    pub aggregate_result_get_digest: TypedFunc<i32, i32>,
    pub aggregate_result_destroy: TypedFunc<i32, ()>,
}

impl GuestExports {
    pub fn resolve(instance: &WasmInstance, store: &mut Store<HostState>) -> Result<Self> {
        fn get<P, R>(
            instance: &WasmInstance,
            store: &mut Store<HostState>,
            name: &str,
        ) -> Result<TypedFunc<P, R>>
        where
            P: wasmtime::WasmParams,
            R: wasmtime::WasmResults,
        {
            instance
                .get_typed_func::<P, R>(&mut *store, name)
                .map_err(|e| RuntimeError::Export(format!("function '{}' not found: {}", name, e)))
        }

        Ok(Self {
            buffer_create: get(instance, store, "buffer_create")?,
            buffer_get_mut_ptr: get(instance, store, "buffer_get_mut_ptr")?,
            buffer_len: get(instance, store, "buffer_len")?,
            buffer_destroy: get(instance, store, "buffer_destroy")?,
            buffer_array_create: get(instance, store, "buffer_array_create")?,
            buffer_array_set_buffer: get(instance, store, "buffer_array_set_buffer")?,
            buffer_array_destroy: get(instance, store, "buffer_array_destroy").ok(),
            prepare_data: get(instance, store, "prepare_data")?,
            prepare_data_result_is_error: get(instance, store, "prepare_data_result_is_error")?,
            prepare_data_result_get_data: get(instance, store, "prepare_data_result_get_data")?,
            prepare_data_result_destroy: get(instance, store, "prepare_data_result_destroy")?,
            aggregate: get(instance, store, "aggregate")?,
            aggregate_result_is_error: get(instance, store, "aggregate_result_is_error")?,
            aggregate_result_get_data: get(instance, store, "aggregate_result_get_data")?,
            aggregate_result_get_digest: get(instance, store, "aggregate_result_get_digest")?,
            aggregate_result_destroy: get(instance, store, "aggregate_result_destroy")?,
        })
    }
}

/// Fuel granted to cleanup calls, whatever the per-call limit.
const CLEANUP_FUEL: u64 = 100_000;

/// Which entry point produced a guest result object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResultKind {
    PrepareData,
    Aggregate,
}

impl ResultKind {
    fn destroy_name(self) -> &'static str {
        match self {
            ResultKind::PrepareData => "prepare_data_result_destroy",
            ResultKind::Aggregate => "aggregate_result_destroy",
        }
    }
}

/// A guest buffer the host currently owns.
#[derive(Debug)]
pub(crate) struct GuestBuffer {
    handle: i32,
    ptr: usize,
    len: usize,
}

/// One top-level call into the guest.
///
/// Holds the locked store for the whole call and tracks every guest buffer
/// array and result object the host owns. Whatever is still owned when the
/// call ends is destroyed on drop, on success and error paths alike.
/// Cleanup runs on its own fuel, so a call that ran dry still releases
/// everything it holds.
pub(crate) struct GuestCall<'a> {
    store: &'a mut Store<HostState>,
    memory: Memory,
    exports: &'a GuestExports,
    fuel_limit: Option<u64>,
    owned_buffers: Vec<i32>,
    owned_arrays: Vec<i32>,
    owned_results: Vec<(i32, ResultKind)>,
}

impl<'a> GuestCall<'a> {
    pub fn begin(
        store: &'a mut Store<HostState>,
        memory: Memory,
        exports: &'a GuestExports,
        fuel_limit: Option<u64>,
    ) -> Result<Self> {
        if let Some(fuel) = fuel_limit {
            store
                .set_fuel(fuel)
                .map_err(|e| RuntimeError::Config(format!("refuel failed: {e}")))?;
        }
        Ok(Self {
            store,
            memory,
            exports,
            fuel_limit,
            owned_buffers: Vec::new(),
            owned_arrays: Vec::new(),
            owned_results: Vec::new(),
        })
    }

    pub fn store(&mut self) -> &mut Store<HostState> {
        &mut *self.store
    }

    /// Allocate a guest buffer and fill it with `data`.
    pub fn buffer_with_data(&mut self, data: &[u8]) -> Result<GuestBuffer> {
        let len = memory::guest_len(data.len())?;
        let handle = self
            .exports
            .buffer_create
            .call(&mut *self.store, len)
            .map_err(RuntimeError::trap("buffer_create"))?;
        let buffer = self.adopt(handle)?;
        memory::write(&self.memory, &mut *self.store, buffer.ptr, data)?;
        Ok(buffer)
    }

    /// Take ownership of a buffer handle returned by the guest.
    pub fn adopt(&mut self, handle: i32) -> Result<GuestBuffer> {
        self.owned_buffers.push(handle);
        let ptr = self
            .exports
            .buffer_get_mut_ptr
            .call(&mut *self.store, handle)
            .map_err(RuntimeError::trap("buffer_get_mut_ptr"))?;
        let len = self
            .exports
            .buffer_len
            .call(&mut *self.store, handle)
            .map_err(RuntimeError::trap("buffer_len"))?;
        Ok(GuestBuffer {
            handle,
            ptr: memory::guest_usize(ptr),
            len: memory::guest_usize(len),
        })
    }

    /// Copy a buffer's bytes out of guest memory.
    pub fn read(&mut self, buffer: &GuestBuffer) -> Result<Vec<u8>> {
        memory::read(&self.memory, &*self.store, buffer.ptr, buffer.len)
    }

    /// Give up ownership; the guest call receiving the handle consumes it.
    pub fn hand_over(&mut self, buffer: GuestBuffer) -> i32 {
        self.owned_buffers.retain(|&h| h != buffer.handle);
        buffer.handle
    }

    pub fn create_array(&mut self, len: usize) -> Result<i32> {
        let len = memory::guest_len(len)?;
        let array = self
            .exports
            .buffer_array_create
            .call(&mut *self.store, len)
            .map_err(RuntimeError::trap("buffer_array_create"))?;
        self.owned_arrays.push(array);
        Ok(array)
    }

    /// Move `buffer` into `array`; the array owns it from then on.
    pub fn set_array_item(&mut self, array: i32, index: usize, buffer: GuestBuffer) -> Result<()> {
        let index = memory::guest_len(index)?;
        let handle = buffer.handle;
        self.exports
            .buffer_array_set_buffer
            .call(&mut *self.store, (array, index, handle))
            .map_err(RuntimeError::trap("buffer_array_set_buffer"))?;
        self.hand_over(buffer);
        Ok(())
    }

    pub fn hand_over_array(&mut self, array: i32) -> i32 {
        self.owned_arrays.retain(|&a| a != array);
        array
    }

    /// Take ownership of a result object returned by an entry point.
    pub fn adopt_result(&mut self, handle: i32, kind: ResultKind) {
        self.owned_results.push((handle, kind));
    }

    /// Destroy a result object now and report a failing destructor.
    pub fn release_result(&mut self, handle: i32) -> Result<()> {
        let Some(index) = self.owned_results.iter().position(|&(h, _)| h == handle) else {
            return Ok(());
        };
        let (handle, kind) = self.owned_results.swap_remove(index);
        self.refuel_for_cleanup();
        self.destroy_result(handle, kind)
            .map_err(RuntimeError::trap(kind.destroy_name()))
    }

    fn destroy_result(&mut self, handle: i32, kind: ResultKind) -> wasmtime::Result<()> {
        let destroy = match kind {
            ResultKind::PrepareData => &self.exports.prepare_data_result_destroy,
            ResultKind::Aggregate => &self.exports.aggregate_result_destroy,
        };
        destroy.call(&mut *self.store, handle)
    }

    fn refuel_for_cleanup(&mut self) {
        if let Some(fuel) = self.fuel_limit {
            if let Err(e) = self.store.set_fuel(fuel.max(CLEANUP_FUEL)) {
                tracing::warn!("refuel before cleanup failed: {e:#}");
            }
        }
    }
}

impl Drop for GuestCall<'_> {
    fn drop(&mut self) {
        if self.owned_buffers.is_empty() && self.owned_arrays.is_empty() && self.owned_results.is_empty() {
            return;
        }
        self.refuel_for_cleanup();
        for (handle, kind) in std::mem::take(&mut self.owned_results) {
            if let Err(e) = self.destroy_result(handle, kind) {
                tracing::warn!(handle, "{} failed: {e:#}", kind.destroy_name());
            }
        }
        for handle in std::mem::take(&mut self.owned_buffers) {
            if let Err(e) = self.exports.buffer_destroy.call(&mut *self.store, handle) {
                tracing::warn!(handle, "buffer_destroy failed: {e:#}");
            }
        }
        let arrays = std::mem::take(&mut self.owned_arrays);
        match self.exports.buffer_array_destroy {
            Some(ref destroy) => {
                for array in arrays {
                    if let Err(e) = destroy.call(&mut *self.store, array) {
                        tracing::warn!(array, "buffer_array_destroy failed: {e:#}");
                    }
                }
            }
            None if !arrays.is_empty() => {
                tracing::warn!(count = arrays.len(), "module has no buffer_array_destroy, leaking arrays")
            }
            None => {}
        }
    }
}

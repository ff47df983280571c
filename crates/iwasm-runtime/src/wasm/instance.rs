//! An `Instance` is one loaded processor module with its store and memory.

use std::time::Instant;

use parking_lot::Mutex;
use wasmtime::{Instance as WasmInstance, Memory, Store};

use super::guest::{GuestCall, GuestExports, ResultKind};
use super::runtime::HostState;
use crate::error::{Result, RuntimeError};

/// Output of a successful `aggregate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    /// Module-defined result payload
    pub data: Vec<u8>,
    /// Module-defined digest of `data`
    pub digest: Vec<u8>,
}

/// Verdict of a module entry point: its payload or its own error message.
pub type ModuleResult<T> = std::result::Result<T, String>;

/// An instantiated processor module ready for execution.
///
/// Every call locks the store for its full duration, so calls into one
/// instance are serialised even when the instance is shared.
pub struct Instance {
    store: Mutex<Store<HostState>>,
    instance: WasmInstance,
    memory: Memory,
    exports: GuestExports,
    fuel_limit: Option<u64>,
}

impl Instance {
    pub(crate) fn attach(
        mut store: Store<HostState>,
        instance: WasmInstance,
        fuel_limit: Option<u64>,
    ) -> Result<Self> {
        let memory = instance
            .get_memory(&mut store, "memory")
            .ok_or_else(|| RuntimeError::Export("no memory export found".to_string()))?;
        let exports = GuestExports::resolve(&instance, &mut store)?;

        Ok(Self {
            store: Mutex::new(store),
            instance,
            memory,
            exports,
            fuel_limit,
        })
    }

    /// Run the module's `prepare_data(config, request)` entry point.
    ///
    /// The outer error is a runtime fault; the inner one is the module's own
    /// failure message, after which the instance stays usable.
    pub fn prepare_data(&self, config: &[u8], request: &[u8]) -> Result<ModuleResult<Vec<u8>>> {
        let start = Instant::now();
        let mut store = self.store.lock();
        let mut call = GuestCall::begin(&mut store, self.memory, &self.exports, self.fuel_limit)?;

        let config = call.buffer_with_data(config)?;
        let request = call.buffer_with_data(request)?;
        let args = (call.hand_over(config), call.hand_over(request));

        let result = self
            .exports
            .prepare_data
            .call(call.store(), args)
            .map_err(RuntimeError::trap("prepare_data"))?;
        call.adopt_result(result, ResultKind::PrepareData);

        let converted = self.convert_prepare_data_result(&mut call, result)?;
        call.release_result(result)?;

        tracing::debug!(
            elapsed_us = start.elapsed().as_micros() as u64,
            is_error = converted.is_err(),
            "prepare_data finished"
        );
        Ok(converted)
    }

    fn convert_prepare_data_result(
        &self,
        call: &mut GuestCall<'_>,
        result: i32,
    ) -> Result<ModuleResult<Vec<u8>>> {
        let is_error = self
            .exports
            .prepare_data_result_is_error
            .call(call.store(), result)
            .map_err(RuntimeError::trap("prepare_data_result_is_error"))?
            != 0;

        let data = self
            .exports
            .prepare_data_result_get_data
            .call(call.store(), result)
            .map_err(RuntimeError::trap("prepare_data_result_get_data"))?;
        let data = call.adopt(data)?;
        let data = call.read(&data)?;

        Ok(if is_error {
            Err(String::from_utf8_lossy(&data).into_owned())
        } else {
            Ok(data)
        })
    }

    /// Run the module's `aggregate(config, data[], request)` entry point.
    pub fn aggregate(
        &self,
        config: &[u8],
        data: &[&[u8]],
        request: &[u8],
    ) -> Result<ModuleResult<Aggregation>> {
        let start = Instant::now();
        let mut store = self.store.lock();
        let mut call = GuestCall::begin(&mut store, self.memory, &self.exports, self.fuel_limit)?;

        let config = call.buffer_with_data(config)?;
        let array = call.create_array(data.len())?;
        for (index, datum) in data.iter().enumerate() {
            let buffer = call.buffer_with_data(datum)?;
            call.set_array_item(array, index, buffer)?;
        }
        let request = call.buffer_with_data(request)?;
        let args = (
            call.hand_over(config),
            call.hand_over_array(array),
            call.hand_over(request),
        );

        let result = self
            .exports
            .aggregate
            .call(call.store(), args)
            .map_err(RuntimeError::trap("aggregate"))?;
        call.adopt_result(result, ResultKind::Aggregate);

        let converted = self.convert_aggregate_result(&mut call, result)?;
        call.release_result(result)?;

        tracing::debug!(
            elapsed_us = start.elapsed().as_micros() as u64,
            batch = data.len(),
            is_error = converted.is_err(),
            "aggregate finished"
        );
        Ok(converted)
    }

    fn convert_aggregate_result(
        &self,
        call: &mut GuestCall<'_>,
        result: i32,
    ) -> Result<ModuleResult<Aggregation>> {
        let is_error = self
            .exports
            .aggregate_result_is_error
            .call(call.store(), result)
            .map_err(RuntimeError::trap("aggregate_result_is_error"))?
            != 0;

        let data = self
            .exports
            .aggregate_result_get_data
            .call(call.store(), result)
            .map_err(RuntimeError::trap("aggregate_result_get_data"))?;
        let data = call.adopt(data)?;
        let data = call.read(&data)?;

        if is_error {
            return Ok(Err(String::from_utf8_lossy(&data).into_owned()));
        }

        // The digest arm exists only on success
        let digest = self
            .exports
            .aggregate_result_get_digest
            .call(call.store(), result)
            .map_err(RuntimeError::trap("aggregate_result_get_digest"))?;
        let digest = call.adopt(digest)?;
        let digest = call.read(&digest)?;

        Ok(Ok(Aggregation { data, digest }))
    }

    /// Call an exported function that takes no arguments and returns an i32.
    pub fn call_i32(&self, name: &str) -> Result<i32> {
        let mut store = self.store.lock();
        if let Some(fuel) = self.fuel_limit {
            store
                .set_fuel(fuel)
                .map_err(|e| RuntimeError::Config(format!("refuel failed: {e}")))?;
        }
        let func = self
            .instance
            .get_typed_func::<(), i32>(&mut *store, name)
            .map_err(|e| RuntimeError::Export(format!("function '{}' not found: {}", name, e)))?;
        func.call(&mut *store, ())
            .map_err(|e| RuntimeError::Trap {
                function: "call_i32",
                message: format!("{name}: {e:#}"),
            })
    }

    /// Get list of exported function names.
    pub fn exported_functions(&self) -> Vec<String> {
        let mut store = self.store.lock();
        // Collect names first to avoid borrow issues
        let names: Vec<_> = self
            .instance
            .exports(&mut *store)
            .map(|e| e.name().to_string())
            .collect();
        names
            .into_iter()
            .filter(|name| self.instance.get_func(&mut *store, name).is_some())
            .collect()
    }

    /// Get remaining fuel (if fuel metering enabled).
    pub fn remaining_fuel(&self) -> Option<u64> {
        self.fuel_limit?;
        self.store.lock().get_fuel().ok()
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("fuel_limit", &self.fuel_limit)
            .finish_non_exhaustive()
    }
}

//! Processor runtime implementation using wasmtime.
//!
//! Uses wasmtime-wasi preview1 for compatibility with modules built for
//! `wasm32-wasip1`.

use super::config::{HostCapabilities, RuntimeConfig};
use super::host_functions::HostFunctions;
use super::instance::Instance;
use super::network::NetworkAccess;
use crate::error::{Result, RuntimeError};

use wasmtime::*;

/// Host state for the instance store.
pub struct HostState {
    preview1: wasmtime_wasi::preview1::WasiP1Ctx,
    limits: StoreLimits,
    network: NetworkAccess,
    pending_response: Option<Vec<u8>>,
}

impl HostState {
    /// Get the preview1 context.
    fn preview1(&mut self) -> &mut wasmtime_wasi::preview1::WasiP1Ctx {
        &mut self.preview1
    }

    pub(crate) fn network(&self) -> &NetworkAccess {
        &self.network
    }

    /// Park a host-call outcome for `take_response` and encode its length.
    pub(crate) fn park_response(&mut self, outcome: std::result::Result<Vec<u8>, String>) -> i32 {
        let (bytes, is_error) = match outcome {
            Ok(body) => match i32::try_from(body.len()) {
                Ok(_) => (body, false),
                Err(_) => (b"response does not fit guest memory".to_vec(), true),
            },
            Err(message) => (message.into_bytes(), true),
        };
        // Error messages are short; the body case was checked above.
        let len = bytes.len() as i32;
        self.pending_response = Some(bytes);
        if is_error {
            -len - 1
        } else {
            len
        }
    }

    pub(crate) fn take_response(&mut self) -> Option<Vec<u8>> {
        self.pending_response.take()
    }
}

/// An initialised execution environment.
///
/// Owns the compilation engine; every [`Instance`] created from it gets its
/// own store, linker and host state.
pub struct Runtime {
    engine: Engine,
    config: RuntimeConfig,
}

impl Runtime {
    /// Create a new runtime with the given configuration.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        let mut engine_config = Config::new();

        // Configure optimization
        engine_config.cranelift_opt_level(match config.optimization_level {
            0 => OptLevel::None,
            1 | 2 => OptLevel::Speed,
            _ => OptLevel::SpeedAndSize,
        });

        engine_config.wasm_simd(config.enable_simd);

        // Enable fuel metering if configured
        if config.fuel_limit.is_some() {
            engine_config.consume_fuel(true);
        }

        // Configure caching if path provided
        if let Some(ref cache_path) = config.cache_path {
            if let Err(e) = engine_config.cache_config_load(cache_path) {
                tracing::warn!("Failed to load cache config: {}", e);
            }
        }

        let engine = Engine::new(&engine_config)
            .map_err(|e| RuntimeError::Engine(format!("{e:#}")))?;

        tracing::debug!(
            fuel_limit = ?config.fuel_limit,
            max_memory = config.max_memory,
            network = config.capabilities.network,
            "runtime created"
        );

        Ok(Self { engine, config })
    }

    /// Compile `wasm_bytes` and instantiate it with a fresh store.
    ///
    /// Fails if the bytes are not a well-formed module, if an import cannot
    /// be satisfied, or if a required processor export is missing.
    pub fn create_instance(&self, wasm_bytes: &[u8]) -> Result<Instance> {
        let module = Module::new(&self.engine, wasm_bytes)
            .map_err(|e| RuntimeError::Compile(format!("{e:#}")))?;

        let host_state = self.build_host_state(&self.config.capabilities)?;
        let mut store = Store::new(&self.engine, host_state);

        // Configure resource limits via the stored limiter
        store.limiter(|state| &mut state.limits);

        if let Some(fuel) = self.config.fuel_limit {
            store
                .set_fuel(fuel)
                .map_err(|e| RuntimeError::Config(format!("fuel setup failed: {e}")))?;
        }

        // Create linker and add WASI preview1 functions
        let mut linker: Linker<HostState> = Linker::new(&self.engine);
        wasmtime_wasi::preview1::add_to_linker_sync(&mut linker, |state| state.preview1())
            .map_err(|e| RuntimeError::Wasi(format!("WASI link failed: {e}")))?;

        HostFunctions::register(&mut linker)?;

        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|e| RuntimeError::Instantiation(format!("{e:#}")))?;

        // Reactor modules run their constructors here
        if let Ok(initialize) = instance.get_typed_func::<(), ()>(&mut store, "_initialize") {
            initialize
                .call(&mut store, ())
                .map_err(RuntimeError::trap("_initialize"))?;
        }

        let instance = Instance::attach(store, instance, self.config.fuel_limit)?;
        tracing::debug!(module_len = wasm_bytes.len(), "instance created");
        Ok(instance)
    }

    /// Build host state from capabilities.
    fn build_host_state(&self, caps: &HostCapabilities) -> Result<HostState> {
        let mut builder = wasmtime_wasi::WasiCtxBuilder::new();

        if caps.stdout {
            builder.inherit_stdout();
        }
        if caps.stderr {
            builder.inherit_stderr();
        }

        for (key, value) in &caps.env_vars {
            builder.env(key, value);
        }

        builder.args(&caps.args);

        for dir in &caps.preopened_dirs_ro {
            builder
                .preopened_dir(
                    dir,
                    dir.to_string_lossy(),
                    wasmtime_wasi::DirPerms::READ,
                    wasmtime_wasi::FilePerms::READ,
                )
                .map_err(|e| RuntimeError::Wasi(format!("failed to open dir {:?}: {}", dir, e)))?;
        }

        let preview1 = builder.build_p1();

        let limits = StoreLimitsBuilder::new()
            .memory_size(self.config.max_memory)
            .build();

        Ok(HostState {
            preview1,
            limits,
            network: NetworkAccess::new(caps),
            pending_response: None,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

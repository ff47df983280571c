//! Configuration for the processor runtime.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Host capabilities granted to every instance created by a runtime.
///
/// Stdio, environment and filesystem start disabled. Network access is the
/// one capability processors need for `prepare_data`, so the default grants
/// it; use [`HostCapabilities::none`] for fully offline modules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostCapabilities {
    /// Allow access to stdout
    pub stdout: bool,

    /// Allow access to stderr
    pub stderr: bool,

    /// Directories to pre-open for filesystem access (read-only)
    pub preopened_dirs_ro: Vec<PathBuf>,

    /// Environment variables to expose
    pub env_vars: Vec<(String, String)>,

    /// Command-line arguments to pass
    pub args: Vec<String>,

    /// Allow the `iwasm_host.http_get` import to reach the network
    pub network: bool,

    /// Per-request HTTP timeout in milliseconds (0 = no timeout)
    pub http_timeout_ms: u64,

    /// Largest response body handed to a module
    pub max_response_bytes: u64,
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self::networked()
    }
}

impl HostCapabilities {
    /// Create capabilities with nothing allowed (maximum isolation)
    pub fn none() -> Self {
        Self {
            stdout: false,
            stderr: false,
            preopened_dirs_ro: Vec::new(),
            env_vars: Vec::new(),
            args: Vec::new(),
            network: false,
            http_timeout_ms: 30_000,
            max_response_bytes: 16 * 1024 * 1024, // 16 MB
        }
    }

    /// Create capabilities for data-fetching processors
    ///
    /// Allows: network, stderr for module diagnostics
    pub fn networked() -> Self {
        Self {
            network: true,
            stderr: true,
            ..Self::none()
        }
    }

    /// Builder: enable stdout
    pub fn stdout(mut self, allow: bool) -> Self {
        self.stdout = allow;
        self
    }

    /// Builder: enable stderr
    pub fn stderr(mut self, allow: bool) -> Self {
        self.stderr = allow;
        self
    }

    /// Builder: add read-only directory
    pub fn preopened_dir_ro(mut self, path: impl Into<PathBuf>) -> Self {
        self.preopened_dirs_ro.push(path.into());
        self
    }

    /// Builder: add environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Builder: add command-line argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Builder: enable network access
    pub fn network(mut self, allow: bool) -> Self {
        self.network = allow;
        self
    }

    /// Builder: set HTTP timeout
    pub fn http_timeout_ms(mut self, ms: u64) -> Self {
        self.http_timeout_ms = ms;
        self
    }
}

/// Configuration for the processor runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Host capability configuration
    pub capabilities: HostCapabilities,

    /// Maximum linear memory per instance in bytes (default = 256MB)
    pub max_memory: usize,

    /// Fuel granted to each boundary call (None = unmetered)
    pub fuel_limit: Option<u64>,

    /// Cranelift optimization level (0-3)
    pub optimization_level: u8,

    /// Enable SIMD support
    pub enable_simd: bool,

    /// Cache compiled modules to disk using this wasmtime cache config
    pub cache_path: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            capabilities: HostCapabilities::networked(),
            max_memory: 256 * 1024 * 1024, // 256 MB
            fuel_limit: None,
            optimization_level: 2,
            enable_simd: true,
            cache_path: None,
        }
    }
}

impl RuntimeConfig {
    /// Create a minimal config for maximum isolation
    pub fn minimal() -> Self {
        Self {
            capabilities: HostCapabilities::none(),
            max_memory: 64 * 1024 * 1024,     // 64 MB
            fuel_limit: Some(1_000_000_000), // 1B fuel units
            ..Default::default()
        }
    }

    /// Create a config whose modules may reach the network (the default)
    pub fn networked() -> Self {
        Self::default()
    }

    /// Create config for development/debugging
    pub fn development() -> Self {
        Self {
            capabilities: HostCapabilities::networked().stdout(true),
            optimization_level: 0, // Faster compilation
            ..Default::default()
        }
    }

    /// Parse a JSON-encoded config; missing fields take their defaults.
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// Builder: set capabilities
    pub fn capabilities(mut self, caps: HostCapabilities) -> Self {
        self.capabilities = caps;
        self
    }

    /// Builder: set max memory
    pub fn max_memory(mut self, bytes: usize) -> Self {
        self.max_memory = bytes;
        self
    }

    /// Builder: set fuel limit
    pub fn fuel_limit(mut self, fuel: u64) -> Self {
        self.fuel_limit = Some(fuel);
        self
    }

    /// Builder: enable SIMD
    pub fn simd(mut self, enable: bool) -> Self {
        self.enable_simd = enable;
        self
    }

    /// Builder: set optimization level
    pub fn optimize(mut self, level: u8) -> Self {
        self.optimization_level = level.min(3);
        self
    }

    /// Builder: set cache path
    pub fn cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }
}

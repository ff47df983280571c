//! Tests for the processor runtime.

use super::*;
use crate::error::RuntimeError;

const FIXTURE: &str = include_str!("../../tests/fixtures/processor.wat");

fn fixture() -> Vec<u8> {
    wat::parse_str(FIXTURE).expect("fixture should assemble")
}

fn fnv1a(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0x811c_9dc5u32, |hash, &b| (hash ^ b as u32).wrapping_mul(16_777_619))
}

fn offline_instance() -> Instance {
    let runtime = Runtime::new(RuntimeConfig::minimal()).expect("failed to create runtime");
    runtime.create_instance(&fixture()).expect("failed to instantiate")
}

#[test]
fn test_runtime_config_default() {
    let config = RuntimeConfig::default();
    assert_eq!(config.max_memory, 256 * 1024 * 1024);
    assert!(config.capabilities.network);
    assert!(config.fuel_limit.is_none());
    assert!(config.enable_simd);
}

#[test]
fn test_runtime_config_minimal() {
    let config = RuntimeConfig::minimal();
    assert_eq!(config.max_memory, 64 * 1024 * 1024);
    assert!(config.fuel_limit.is_some());
    assert!(!config.capabilities.network);
}

#[test]
fn test_host_capabilities_none() {
    let caps = HostCapabilities::none();
    assert!(!caps.stdout);
    assert!(!caps.stderr);
    assert!(!caps.network);
    assert!(caps.preopened_dirs_ro.is_empty());
    assert!(caps.env_vars.is_empty());
}

#[test]
fn test_host_capabilities_builder() {
    let caps = HostCapabilities::none()
        .stdout(true)
        .network(true)
        .http_timeout_ms(500)
        .env("DEBUG", "1")
        .arg("--verbose");

    assert!(caps.stdout);
    assert!(caps.network);
    assert_eq!(caps.http_timeout_ms, 500);
    assert_eq!(caps.env_vars.len(), 1);
    assert_eq!(caps.args.len(), 1);
}

#[test]
fn test_runtime_config_builder_chain() {
    let config = RuntimeConfig::default()
        .max_memory(128 * 1024 * 1024)
        .fuel_limit(500_000_000)
        .simd(false)
        .optimize(7);

    assert_eq!(config.max_memory, 128 * 1024 * 1024);
    assert_eq!(config.fuel_limit, Some(500_000_000));
    assert!(!config.enable_simd);
    assert_eq!(config.optimization_level, 3);
}

#[test]
fn test_runtime_config_from_partial_json() {
    let config = RuntimeConfig::from_json(br#"{"fuel_limit": 1000, "capabilities": {"network": false}}"#)
        .expect("partial config should parse");
    assert_eq!(config.fuel_limit, Some(1000));
    assert!(!config.capabilities.network);
    assert_eq!(config.max_memory, 256 * 1024 * 1024);

    assert!(RuntimeConfig::from_json(b"{not json").is_err());
}

#[test]
fn test_runtime_creation() {
    let runtime = Runtime::new(RuntimeConfig::default());
    assert!(runtime.is_ok());
}

#[test]
fn test_corrupt_module_is_compile_error() {
    let runtime = Runtime::new(RuntimeConfig::minimal()).unwrap();
    let err = runtime.create_instance(b"\0asm\x01\0\0\0garbage").unwrap_err();
    assert!(matches!(err, RuntimeError::Compile(_)), "got {err:?}");
}

#[test]
fn test_module_without_processor_exports() {
    let runtime = Runtime::new(RuntimeConfig::minimal()).unwrap();
    let wasm = wat::parse_str(r#"(module (memory (export "memory") 1))"#).unwrap();
    let err = runtime.create_instance(&wasm).unwrap_err();
    match err {
        RuntimeError::Export(message) => assert!(message.contains("buffer_create")),
        other => panic!("expected export error, got {other:?}"),
    }
}

#[test]
fn test_exported_functions() {
    let instance = offline_instance();
    let exports = instance.exported_functions();
    assert!(exports.iter().any(|e| e == "prepare_data"));
    assert!(exports.iter().any(|e| e == "aggregate"));
    assert!(!exports.iter().any(|e| e == "memory"));
}

#[test]
fn test_aggregate_first() {
    let instance = offline_instance();
    let data = 42.5f64.to_le_bytes();

    let aggregation = instance
        .aggregate(b"IntelliX", &[&data], b"first")
        .expect("runtime fault")
        .expect("module error");

    assert_eq!(aggregation.data, data.to_vec());
    assert_eq!(aggregation.digest, fnv1a(&data).to_le_bytes().to_vec());
    assert_eq!(instance.call_i32("live_objects").unwrap(), 0);
}

#[test]
fn test_aggregate_module_errors_keep_instance_usable() {
    let instance = offline_instance();
    let data = 1.0f64.to_le_bytes();

    let empty = instance.aggregate(b"IntelliX", &[], b"first").unwrap();
    assert_eq!(empty, Err("no data".to_string()));

    let unsupported = instance.aggregate(b"IntelliX", &[&data], b"median").unwrap();
    assert_eq!(unsupported, Err("unsupported request".to_string()));

    let short = instance.aggregate(b"IntelliX", &[b"abc"], b"first").unwrap();
    assert_eq!(short, Err("data too short".to_string()));

    let ok = instance.aggregate(b"IntelliX", &[&data], b"first").unwrap();
    assert!(ok.is_ok());
    assert_eq!(instance.call_i32("live_objects").unwrap(), 0);
}

#[test]
fn test_zero_length_arguments() {
    let instance = offline_instance();

    let result = instance.prepare_data(b"", b"").unwrap();
    assert_eq!(result, Err("missing config".to_string()));

    let result = instance.aggregate(b"", &[b""], b"").unwrap();
    assert_eq!(result, Err("missing config".to_string()));

    assert_eq!(instance.call_i32("live_objects").unwrap(), 0);
}

#[test]
fn test_prepare_data_without_network_capability() {
    let instance = offline_instance();

    let result = instance
        .prepare_data(b"IntelliX", b"http://127.0.0.1:9/price")
        .expect("runtime fault");
    let message = result.unwrap_err();
    assert!(message.contains("network access denied"), "got {message}");
    assert_eq!(instance.call_i32("live_objects").unwrap(), 0);
}

#[test]
fn test_trap_is_runtime_error_and_instance_survives() {
    let instance = offline_instance();

    let err = instance.prepare_data(b"IntelliX", b"trap").unwrap_err();
    assert!(
        matches!(err, RuntimeError::Trap { function: "prepare_data", .. }),
        "got {err:?}"
    );

    let data = 7.0f64.to_le_bytes();
    let ok = instance.aggregate(b"IntelliX", &[&data], b"first").unwrap();
    assert!(ok.is_ok());
}

#[test]
fn test_fuel_exhaustion_is_runtime_error() {
    let runtime = Runtime::new(RuntimeConfig::minimal().fuel_limit(5)).unwrap();
    let instance = runtime.create_instance(&fixture()).unwrap();

    let err = instance.prepare_data(b"IntelliX", b"anything").unwrap_err();
    assert!(matches!(err, RuntimeError::Trap { .. }), "got {err:?}");
    assert!(instance.remaining_fuel().is_some());
}

#[test]
fn test_missing_function_call() {
    let instance = offline_instance();
    let err = instance.call_i32("does_not_exist").unwrap_err();
    assert!(matches!(err, RuntimeError::Export(_)));
}

/// Guest functions that allocate before a fuel check can stop them; a trap
/// inside one may strand an object the host never saw.
const ALLOCATES_MID_CALL: &[&str] = &[
    "prepare_data",
    "aggregate",
    "prepare_data_result_get_data",
    "aggregate_result_get_data",
    "aggregate_result_get_digest",
];

/// Run `call` under every fuel limit from a few units up to the first limit
/// that completes, checking that no trap leaves host-owned guest objects live.
fn sweep_fuel(call: impl Fn(&Instance) -> crate::error::Result<()>) -> usize {
    let wasm = fixture();
    let mut traps = 0;
    for fuel in 8..20_000u64 {
        let runtime = Runtime::new(RuntimeConfig::minimal().fuel_limit(fuel)).unwrap();
        let instance = runtime.create_instance(&wasm).unwrap();
        match call(&instance) {
            Ok(()) => {
                assert_eq!(instance.call_i32("live_objects").unwrap(), 0, "fuel {fuel}");
                return traps;
            }
            Err(RuntimeError::Trap { function, .. }) => {
                traps += 1;
                if !ALLOCATES_MID_CALL.contains(&function) {
                    let live = instance.call_i32("live_objects").unwrap();
                    assert_eq!(live, 0, "fuel {fuel}, trap in {function}");
                }
            }
            Err(other) => panic!("fuel {fuel}: unexpected {other:?}"),
        }
    }
    panic!("call never completed within the fuel sweep");
}

#[test]
fn test_fuel_exhaustion_releases_prepare_data_result() {
    let traps = sweep_fuel(|instance| {
        instance
            .prepare_data(b"IntelliX", b"http://127.0.0.1:9/price")
            .map(|_| ())
    });
    assert!(traps > 0);
}

#[test]
fn test_fuel_exhaustion_releases_aggregate_result() {
    let data = 3.5f64.to_le_bytes();
    let traps = sweep_fuel(|instance| {
        instance
            .aggregate(b"IntelliX", &[&data, &data], b"first")
            .map(|_| ())
    });
    assert!(traps > 0);
}

#[test]
fn test_destroy_runs_after_conversion_drains_fuel() {
    // Enough fuel to reach conversion, too little to finish it
    let wasm = fixture();
    let mut saw_conversion_trap = false;
    for fuel in 8..20_000u64 {
        let runtime = Runtime::new(RuntimeConfig::minimal().fuel_limit(fuel)).unwrap();
        let instance = runtime.create_instance(&wasm).unwrap();
        match instance.prepare_data(b"IntelliX", b"http://127.0.0.1:9/price") {
            Ok(_) => break,
            Err(RuntimeError::Trap { function, .. }) if function == "prepare_data_result_is_error" => {
                saw_conversion_trap = true;
                assert_eq!(instance.call_i32("live_objects").unwrap(), 0);
                break;
            }
            Err(_) => {}
        }
    }
    assert!(saw_conversion_trap);
}

#[test]
fn test_transport_error_names_url_once() {
    let url = "http://127.0.0.1:1/unreachable";
    let network = NetworkAccess::new(&HostCapabilities::none().network(true).http_timeout_ms(2_000));
    let message = network.get(url).unwrap_err();
    assert!(message.starts_with(&format!("GET {url}: ")), "got {message}");
    assert_eq!(message.matches(url).count(), 1, "got {message}");
}

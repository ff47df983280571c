//! Integration tests with the reference processor module.
//!
//! Build it first:
//! `cargo build --release --target wasm32-wasip1 --manifest-path crates/iwasm-processor/Cargo.toml`.
//! Set `IWASM_PROCESSOR_WASM` to load a module from elsewhere. Without the
//! artifact these tests report a skip and pass.

mod common;

use std::path::PathBuf;

use common::serve;
use iwasm_runtime::{Pipeline, PipelineRequest, PipelineStage, RuntimeHandle};

const CONFIG: &[u8] = b"IntelliX";

const WASM_PATH: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../iwasm-processor/target/wasm32-wasip1/release/iwasm_processor.wasm"
);

fn processor_module() -> Option<Vec<u8>> {
    let path = std::env::var_os("IWASM_PROCESSOR_WASM")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(WASM_PATH));
    match std::fs::read(&path) {
        Ok(bytes) => Some(bytes),
        Err(_) => {
            eprintln!("skipping: {} not built", path.display());
            None
        }
    }
}

fn market_document(usd: f64) -> Vec<u8> {
    format!(r#"{{"id":"bitcoin","market_data":{{"current_price":{{"usd":{usd},"eur":1.0}}}}}}"#).into_bytes()
}

#[test]
fn test_processor_exports_guest_abi() {
    let Some(wasm) = processor_module() else { return };
    let runtime = RuntimeHandle::new();
    let instance = runtime.create_instance(&wasm).unwrap();
    instance.check().expect("processor should load");
}

#[test]
fn test_processor_fetches_and_aggregates_price() {
    let Some(wasm) = processor_module() else { return };
    let document = market_document(97_432.5);
    let url = serve(200, document.clone());

    let runtime = RuntimeHandle::new();
    let instance = runtime.create_instance(&wasm).unwrap();

    let data = instance
        .prepare_data(CONFIG, url.as_bytes())
        .unwrap()
        .into_data()
        .expect("prepare_data should succeed");
    assert_eq!(data, document);

    let aggregation = instance
        .aggregate(CONFIG, &[&data], b"first")
        .unwrap()
        .into_data()
        .expect("aggregate should succeed");
    assert_eq!(aggregation.as_f64_le(), Some(97_432.5));
    assert_eq!(aggregation.digest.len(), 32);
}

#[test]
fn test_processor_mean_over_pipeline() {
    let Some(wasm) = processor_module() else { return };
    let first = serve(200, market_document(100.0));
    let second = serve(200, market_document(300.0));

    let request = PipelineRequest::new(wasm)
        .config("IntelliX")
        .source(first)
        .source(second)
        .request("mean");

    let output = Pipeline::default().run(&request).expect("pipeline should succeed");
    assert_eq!(output.aggregation.as_f64_le(), Some(200.0));
    assert_eq!(output.aggregation.digest.len(), 32);
}

#[test]
fn test_processor_module_errors() {
    let Some(wasm) = processor_module() else { return };
    let runtime = RuntimeHandle::new();
    let instance = runtime.create_instance(&wasm).unwrap();

    let empty = instance.aggregate(CONFIG, &[], b"first").unwrap();
    assert_eq!(empty.err().unwrap().to_string(), "no data");
    drop(empty);

    let unconfigured = instance.prepare_data(b"", b"").unwrap();
    assert_eq!(unconfigured.err().unwrap().to_string(), r#"invalid config: """#);
    drop(unconfigured);

    let not_found = serve(404, b"gone".to_vec());
    let failed = instance.prepare_data(CONFIG, not_found.as_bytes()).unwrap();
    assert!(failed.err().unwrap().to_string().contains("404"));
}

#[test]
fn test_processor_rejects_wrong_config_in_pipeline() {
    let Some(wasm) = processor_module() else { return };
    let url = serve(200, market_document(1.0));

    let request = PipelineRequest::new(wasm).config("other").source(url).request("first");
    let err = Pipeline::default().run(&request).unwrap_err();
    assert_eq!(err.stage, PipelineStage::PrepareData { index: 0 });
    assert!(err.to_string().contains("invalid config"));
}

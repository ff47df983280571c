use super::transfer::{to_owned_snapshot, to_slice, TransientBatch};
use super::*;
use crate::ffi::{self, live};
use crate::wasm::RuntimeConfig;

const FIXTURE: &str = include_str!("../../tests/fixtures/processor.wat");

fn fixture() -> Vec<u8> {
    wat::parse_str(FIXTURE).unwrap()
}

fn offline() -> RuntimeHandle {
    let runtime = RuntimeHandle::with_config(&RuntimeConfig::minimal()).unwrap();
    runtime.check().expect("runtime should be usable");
    runtime
}

#[test]
fn test_to_slice_of_empty_input_is_null() {
    let empty: Vec<u8> = Vec::new();
    let slice = to_slice(&empty);
    assert!(slice.ptr.is_null());
    assert_eq!(slice.len, 0);

    let bytes = b"abc";
    let slice = to_slice(bytes);
    assert_eq!(slice.ptr, bytes.as_ptr());
    assert_eq!(slice.len, 3);
}

#[test]
fn test_snapshot_does_not_alias() {
    let buffer = unsafe { ffi::slice_to_buffer(to_slice(b"price")) };
    let copy = to_owned_snapshot(&buffer);
    assert_eq!(copy, b"price");
    assert_ne!(copy.as_ptr(), buffer.ptr as *const u8);
    ffi::buffer_destroy(Some(buffer));
    assert_eq!(copy, b"price");
}

#[test]
fn test_transient_batch_frees_every_buffer() {
    let before = live::count();
    {
        let batch = TransientBatch::new(&[b"one", b"", b"three"]);
        assert_eq!(batch.len(), 3);
        assert_eq!(live::count(), before + 3);

        let array = batch.as_slice_array();
        let views = unsafe { array.to_vec() };
        assert_eq!(views, vec![&b"one"[..], &b""[..], &b"three"[..]]);
    }
    assert_eq!(live::count(), before);

    let empty = TransientBatch::new(&[]);
    assert!(empty.is_empty());
    assert!(empty.as_slice_array().ptr.is_null());
}

#[test]
fn test_batch_released_after_failed_aggregate() {
    let runtime = offline();
    let wasm = fixture();
    let instance = runtime.create_instance(&wasm).unwrap();
    let before = live::count();

    let envelope = instance
        .aggregate(b"IntelliX", &[b"short", b"another"], b"first")
        .unwrap();
    // Only the envelope's message buffer is still alive
    assert_eq!(live::count(), before + 1);
    assert_eq!(envelope.err().unwrap().to_string(), "data too short");
    drop(envelope);
    assert_eq!(live::count(), before);
}

#[test]
fn test_envelope_arms_are_exclusive() {
    let runtime = offline();
    let wasm = fixture();
    let instance = runtime.create_instance(&wasm).unwrap();

    let failed = instance.aggregate(b"IntelliX", &[], b"first").unwrap();
    assert!(failed.err().is_some());
    assert!(matches!(failed.data(), Err(ApiError::Boundary(m)) if m == "no data"));

    let price = 3.5f64.to_le_bytes();
    let ok = instance.aggregate(b"IntelliX", &[&price], b"first").unwrap();
    assert!(ok.err().is_none());
    let aggregation = ok.data().unwrap();
    assert_eq!(aggregation.as_f64_le(), Some(3.5));
    assert!(!aggregation.digest.is_empty());
}

#[test]
fn test_failed_runtime_rejects_calls_locally() {
    let before = live::count();
    let config = RuntimeConfig::minimal().optimize(0);
    let runtime = RuntimeHandle::with_config(&config).unwrap();
    runtime.check().unwrap();

    let broken = RuntimeHandle::from_config_json(b"[]");
    assert!(broken.err().is_some());
    let refused = broken.create_instance(&fixture()).unwrap_err();
    assert!(refused.is_precondition());
    drop(broken);
    assert_eq!(live::count(), before);
}

#[test]
fn test_failed_instance_rejects_calls_locally() {
    let runtime = offline();
    let before = live::count();

    let instance = runtime.create_instance(b"\0asm\x01\0\0\0corrupt").unwrap();
    let message = instance.err().expect("corrupt module must fail").to_string();
    assert!(message.starts_with("compile"), "got {message}");

    // The error buffer is the only allocation; refused calls add none
    assert_eq!(live::count(), before + 1);
    let refused = instance.prepare_data(b"IntelliX", b"http://example.com").unwrap_err();
    match refused {
        ApiError::Precondition { operation, cause } => {
            assert_eq!(operation, "prepare_data");
            assert!(cause.starts_with("compile"));
        }
        other => panic!("expected precondition, got {other:?}"),
    }
    assert!(instance.aggregate(b"IntelliX", &[b"x"], b"first").unwrap_err().is_precondition());
    assert_eq!(live::count(), before + 1);

    drop(instance);
    assert_eq!(live::count(), before);
}

#[test]
fn test_zero_length_arguments_do_not_crash() {
    let runtime = offline();
    let wasm = fixture();
    let instance = runtime.create_instance(&wasm).unwrap();

    let prepared = instance.prepare_data(b"", b"").unwrap();
    assert_eq!(prepared.err().unwrap().to_string(), "missing config");

    let aggregated = instance.aggregate(b"", &[b""], b"").unwrap();
    assert_eq!(aggregated.err().unwrap().to_string(), "missing config");

    let empty = runtime.create_instance(b"").unwrap();
    assert!(empty.err().is_some());
}

#[test]
fn test_every_envelope_released() {
    let before = live::count();
    {
        let runtime = offline();
        let wasm = fixture();
        let instance = runtime.create_instance(&wasm).unwrap();

        for _ in 0..3 {
            let denied = instance.prepare_data(b"IntelliX", b"http://127.0.0.1:9/").unwrap();
            assert!(denied.err().unwrap().to_string().contains("network access denied"));
        }
        let trapped = instance.prepare_data(b"IntelliX", b"trap").unwrap();
        assert!(trapped.err().unwrap().to_string().starts_with("runtime error:"));

        let price = 1.0f64.to_le_bytes();
        let aggregation = instance
            .aggregate(b"IntelliX", &[&price, &price], b"first")
            .unwrap()
            .into_data()
            .unwrap();
        assert_eq!(aggregation.result, price.to_vec());
    }
    assert_eq!(live::count(), before);
}

#[test]
fn test_as_f64_le_requires_eight_bytes() {
    let aggregation = Aggregation {
        result: vec![0; 4],
        digest: vec![1],
    };
    assert_eq!(aggregation.as_f64_le(), None);

    let aggregation = Aggregation {
        result: 64_250.5f64.to_le_bytes().to_vec(),
        digest: vec![1],
    };
    assert_eq!(aggregation.as_f64_le(), Some(64_250.5));
}

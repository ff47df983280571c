//! Reference processor module for the iwasm runtime.
//!
//! Exports the guest buffer ABI the host drives:
//! - `buffer_*` / `buffer_array_*` to move bytes into linear memory
//! - `prepare_data` / `aggregate`, which consume their argument buffers
//! - `*_result_*` accessors; `get_data` and `get_digest` return fresh
//!   buffers owned by the caller
//!
//! Build with `cargo build --release --target wasm32-wasip1`.

mod host;
pub mod processor;

// =============================================================================
// Buffers
// =============================================================================

/// Guest-owned byte buffer.
pub struct Buffer {
    data: Vec<u8>,
}

impl Buffer {
    fn into_raw(data: Vec<u8>) -> *mut Buffer {
        Box::into_raw(Box::new(Buffer { data }))
    }
}

/// Allocate a zeroed buffer of `len` bytes.
#[no_mangle]
pub extern "C" fn buffer_create(len: usize) -> *mut Buffer {
    Buffer::into_raw(vec![0; len])
}

/// Address of the buffer's bytes.
///
/// # Safety
///
/// `buffer` must come from `buffer_create` and not be destroyed.
#[no_mangle]
pub unsafe extern "C" fn buffer_get_mut_ptr(buffer: *mut Buffer) -> *mut u8 {
    (*buffer).data.as_mut_ptr()
}

/// # Safety
///
/// `buffer` must come from `buffer_create` and not be destroyed.
#[no_mangle]
pub unsafe extern "C" fn buffer_len(buffer: *const Buffer) -> usize {
    (*buffer).data.len()
}

/// # Safety
///
/// `buffer` must be null or owned by the caller.
#[no_mangle]
pub unsafe extern "C" fn buffer_destroy(buffer: *mut Buffer) {
    if !buffer.is_null() {
        drop(Box::from_raw(buffer));
    }
}

/// Fixed-length array of buffers; owns the buffers placed into it.
pub struct BufferArray {
    items: Vec<Option<Box<Buffer>>>,
}

/// Allocate an array of `len` empty slots.
#[no_mangle]
pub extern "C" fn buffer_array_create(len: usize) -> *mut BufferArray {
    let items = (0..len).map(|_| None).collect();
    Box::into_raw(Box::new(BufferArray { items }))
}

/// Move `buffer` into slot `index`. Out-of-range indices trap.
///
/// # Safety
///
/// `array` must be live; `buffer` must be owned by the caller.
#[no_mangle]
pub unsafe extern "C" fn buffer_array_set_buffer(array: *mut BufferArray, index: usize, buffer: *mut Buffer) {
    let array = &mut *array;
    if index >= array.items.len() {
        std::process::abort();
    }
    array.items[index] = Some(Box::from_raw(buffer));
}

/// # Safety
///
/// `array` must be null or owned by the caller.
#[no_mangle]
pub unsafe extern "C" fn buffer_array_destroy(array: *mut BufferArray) {
    if !array.is_null() {
        drop(Box::from_raw(array));
    }
}

unsafe fn take_buffer(buffer: *mut Buffer) -> Vec<u8> {
    Box::from_raw(buffer).data
}

// =============================================================================
// prepare_data
// =============================================================================

/// Outcome of `prepare_data`.
pub struct PrepareDataResult {
    outcome: Result<Vec<u8>, String>,
}

/// Fetch the URL in `request`. Consumes both buffers.
///
/// # Safety
///
/// Both arguments must be buffers owned by the caller.
#[no_mangle]
pub unsafe extern "C" fn prepare_data(config: *mut Buffer, request: *mut Buffer) -> *mut PrepareDataResult {
    let config = take_buffer(config);
    let request = take_buffer(request);
    let outcome = processor::prepare_data(&config, &request, host::fetch);
    Box::into_raw(Box::new(PrepareDataResult { outcome }))
}

/// # Safety
///
/// `result` must be live.
#[no_mangle]
pub unsafe extern "C" fn prepare_data_result_is_error(result: *const PrepareDataResult) -> i32 {
    (*result).outcome.is_err() as i32
}

/// Copy of the payload, or of the error message.
///
/// # Safety
///
/// `result` must be live.
#[no_mangle]
pub unsafe extern "C" fn prepare_data_result_get_data(result: *const PrepareDataResult) -> *mut Buffer {
    match &(*result).outcome {
        Ok(data) => Buffer::into_raw(data.clone()),
        Err(message) => Buffer::into_raw(message.clone().into_bytes()),
    }
}

/// # Safety
///
/// `result` must be owned by the caller.
#[no_mangle]
pub unsafe extern "C" fn prepare_data_result_destroy(result: *mut PrepareDataResult) {
    if !result.is_null() {
        drop(Box::from_raw(result));
    }
}

// =============================================================================
// aggregate
// =============================================================================

/// Outcome of `aggregate`: result bytes and their digest.
pub struct AggregateResult {
    outcome: Result<(Vec<u8>, Vec<u8>), String>,
}

/// Aggregate the prepared documents in `data`. Consumes all three arguments.
///
/// # Safety
///
/// All arguments must be owned by the caller; every slot of `data` must
/// be filled.
#[no_mangle]
pub unsafe extern "C" fn aggregate(
    config: *mut Buffer,
    data: *mut BufferArray,
    request: *mut Buffer,
) -> *mut AggregateResult {
    let config = take_buffer(config);
    let data = Box::from_raw(data);
    let request = take_buffer(request);

    let documents: Vec<&[u8]> = data
        .items
        .iter()
        .map(|item| item.as_ref().map_or(&[][..], |buffer| buffer.data.as_slice()))
        .collect();
    let outcome = processor::aggregate(&config, &documents, &request);
    Box::into_raw(Box::new(AggregateResult { outcome }))
}

/// # Safety
///
/// `result` must be live.
#[no_mangle]
pub unsafe extern "C" fn aggregate_result_is_error(result: *const AggregateResult) -> i32 {
    (*result).outcome.is_err() as i32
}

/// Copy of the result bytes, or of the error message.
///
/// # Safety
///
/// `result` must be live.
#[no_mangle]
pub unsafe extern "C" fn aggregate_result_get_data(result: *const AggregateResult) -> *mut Buffer {
    match &(*result).outcome {
        Ok((data, _)) => Buffer::into_raw(data.clone()),
        Err(message) => Buffer::into_raw(message.clone().into_bytes()),
    }
}

/// Copy of the digest; empty on error.
///
/// # Safety
///
/// `result` must be live.
#[no_mangle]
pub unsafe extern "C" fn aggregate_result_get_digest(result: *const AggregateResult) -> *mut Buffer {
    match &(*result).outcome {
        Ok((_, digest)) => Buffer::into_raw(digest.clone()),
        Err(_) => Buffer::into_raw(Vec::new()),
    }
}

/// # Safety
///
/// `result` must be owned by the caller.
#[no_mangle]
pub unsafe extern "C" fn aggregate_result_destroy(result: *mut AggregateResult) {
    if !result.is_null() {
        drop(Box::from_raw(result));
    }
}

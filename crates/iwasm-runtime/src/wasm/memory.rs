//! Bounds-checked access to guest linear memory.
//!
//! Guest pointers and lengths are i32 on the wire and reinterpreted as u32.

use wasmtime::{AsContext, AsContextMut, Memory};

use crate::error::{Result, RuntimeError};

/// Convert a guest i32 address or length to a host index.
pub(crate) fn guest_usize(value: i32) -> usize {
    value as u32 as usize
}

/// Convert a host length to a guest i32.
pub(crate) fn guest_len(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| RuntimeError::BufferTooLarge(len))
}

fn check_range(memory: &Memory, store: impl AsContext, offset: usize, len: usize) -> Result<()> {
    let in_bounds = offset
        .checked_add(len)
        .is_some_and(|end| end <= memory.data_size(store));
    if in_bounds {
        Ok(())
    } else {
        Err(RuntimeError::OutOfBounds { offset, len })
    }
}

/// Copy `len` bytes at `offset` out of guest memory.
pub(crate) fn read(memory: &Memory, store: impl AsContext, offset: usize, len: usize) -> Result<Vec<u8>> {
    let store = store.as_context();
    check_range(memory, &store, offset, len)?;
    let mut bytes = vec![0; len];
    memory.read(&store, offset, &mut bytes)?;
    Ok(bytes)
}

/// Copy `data` into guest memory at `offset`.
pub(crate) fn write(memory: &Memory, mut store: impl AsContextMut, offset: usize, data: &[u8]) -> Result<()> {
    check_range(memory, &store, offset, data.len())?;
    memory.write(&mut store, offset, data)?;
    Ok(())
}

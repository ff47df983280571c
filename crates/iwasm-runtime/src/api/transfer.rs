//! Moving bytes between host memory and boundary buffers.
//!
//! Host to boundary is a borrow: [`to_slice`] views the caller's bytes for
//! one call. Boundary to host is a copy: [`to_owned_snapshot`] never aliases
//! boundary memory. A batch for `aggregate` is marshalled through a
//! [`TransientBatch`], which owns its intermediate buffers.

use crate::ffi::{self, Buffer, Slice, SliceArray};

/// View `bytes` as a [`Slice`].
///
/// The empty sequence becomes the null empty slice instead of a pointer to
/// its first element. `bytes` must outlive every call the slice is passed to.
pub fn to_slice(bytes: &[u8]) -> Slice {
    if bytes.is_empty() {
        return Slice::empty();
    }
    Slice {
        ptr: bytes.as_ptr(),
        len: bytes.len(),
    }
}

/// Copy an owned boundary buffer into host memory.
pub fn to_owned_snapshot(buffer: &Buffer) -> Vec<u8> {
    let view = ffi::buffer_slice(Some(buffer));
    // SAFETY: the view borrows `buffer`, which is alive for this scope.
    unsafe { view.as_bytes() }.to_vec()
}

/// Owned copies of an `aggregate` batch plus the array of views over them.
///
/// Every buffer is released when the batch drops, whether or not the call
/// it was built for succeeded.
#[derive(Debug)]
pub struct TransientBatch {
    buffers: Vec<Box<Buffer>>,
    slices: Vec<Slice>,
}

impl TransientBatch {
    /// Copy each batch element into its own boundary buffer.
    pub fn new(batch: &[&[u8]]) -> Self {
        let buffers: Vec<Box<Buffer>> = batch
            .iter()
            // SAFETY: `to_slice` views a live borrow.
            .map(|bytes| unsafe { ffi::slice_to_buffer(to_slice(bytes)) })
            .collect();
        let slices = buffers
            .iter()
            .map(|buffer| ffi::buffer_slice(Some(&**buffer)))
            .collect();
        Self { buffers, slices }
    }

    /// The array to pass to `instance_aggregate`; valid while `self` lives.
    pub fn as_slice_array(&self) -> SliceArray {
        if self.slices.is_empty() {
            return SliceArray {
                ptr: std::ptr::null(),
                len: 0,
            };
        }
        SliceArray {
            ptr: self.slices.as_ptr(),
            len: self.slices.len(),
        }
    }

    /// Number of batch elements.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// True for an empty batch.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

impl Drop for TransientBatch {
    fn drop(&mut self) {
        self.slices.clear();
        for buffer in self.buffers.drain(..) {
            ffi::buffer_destroy(Some(buffer));
        }
    }
}

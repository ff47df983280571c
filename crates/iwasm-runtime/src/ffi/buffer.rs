//! Byte transfer types of the C ABI.
//!
//! `Slice` and `SliceArray` borrow caller memory for one call. `Buffer` owns
//! a heap allocation made by this library; it is freed by dropping the box
//! that holds it, which for foreign callers means `buffer_destroy` or the
//! destroy function of the envelope that owns it.

use std::ptr;

/// An owned byte region allocated by this library.
#[repr(C)]
#[derive(Debug)]
pub struct Buffer {
    /// Start of the allocation (dangling but non-null when `len == 0`)
    pub ptr: *mut u8,
    /// Number of bytes
    pub len: usize,
}

impl Buffer {
    /// Borrow the owned bytes.
    pub fn as_bytes(&self) -> &[u8] {
        if self.len == 0 {
            return &[];
        }
        // SAFETY: ptr/len come from a boxed slice this buffer still owns.
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(data: Vec<u8>) -> Self {
        let data = Box::into_raw(data.into_boxed_slice());
        live::created();
        Buffer {
            ptr: data.cast::<u8>(),
            len: data.len(),
        }
    }
}

impl From<String> for Buffer {
    fn from(message: String) -> Self {
        message.into_bytes().into()
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        // SAFETY: reassembles the boxed slice leaked in `From<Vec<u8>>`.
        drop(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(self.ptr, self.len)) });
        live::destroyed();
    }
}

/// A borrowed byte view, valid for the duration of one call.
///
/// `ptr` may be null when `len == 0`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Slice {
    /// First byte, or null for an empty view
    pub ptr: *const u8,
    /// Number of bytes
    pub len: usize,
}

impl Slice {
    /// The empty view.
    pub const fn empty() -> Self {
        Slice {
            ptr: ptr::null(),
            len: 0,
        }
    }

    /// Reinterpret the view as a byte slice.
    ///
    /// A zero-length view never touches `ptr`.
    ///
    /// # Safety
    ///
    /// When `len > 0`, `ptr` must point at `len` readable bytes that stay
    /// alive and unmodified for `'a`.
    pub unsafe fn as_bytes<'a>(self) -> &'a [u8] {
        if self.len == 0 {
            &[]
        } else {
            std::slice::from_raw_parts(self.ptr, self.len)
        }
    }
}

/// A borrowed run of [`Slice`] views.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SliceArray {
    /// First element, or null for an empty array
    pub ptr: *const Slice,
    /// Number of elements
    pub len: usize,
}

impl SliceArray {
    /// # Safety
    ///
    /// When `len > 0`, `ptr` must point at `len` initialised `Slice`s, each
    /// satisfying [`Slice::as_bytes`], all alive for `'a`.
    pub unsafe fn to_vec<'a>(self) -> Vec<&'a [u8]> {
        if self.len == 0 {
            return Vec::new();
        }
        std::slice::from_raw_parts(self.ptr, self.len)
            .iter()
            .map(|slice| slice.as_bytes())
            .collect()
    }
}

/// Copy a borrowed slice into a new owned buffer.
///
/// # Safety
///
/// `slice` must satisfy [`Slice::as_bytes`].
#[no_mangle]
pub unsafe extern "C" fn slice_to_buffer(slice: Slice) -> Box<Buffer> {
    Box::new(slice.as_bytes().to_vec().into())
}

/// Borrow an owned buffer as a slice. Null yields the empty slice.
#[no_mangle]
pub extern "C" fn buffer_slice(buffer: Option<&Buffer>) -> Slice {
    match buffer {
        Some(buffer) => Slice {
            ptr: buffer.ptr,
            len: buffer.len,
        },
        None => Slice::empty(),
    }
}

/// Free a buffer returned by [`slice_to_buffer`]. Null is a no-op.
#[no_mangle]
pub extern "C" fn buffer_destroy(buffer: Option<Box<Buffer>>) {
    drop(buffer);
}


#[cfg(not(test))]
mod live {
    #[inline(always)]
    pub fn created() {}

    #[inline(always)]
    pub fn destroyed() {}
}

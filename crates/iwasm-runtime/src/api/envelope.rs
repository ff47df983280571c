//! Owned result envelopes of the two processor stages.
//!
//! Accessors read the tag before either arm: `err` never looks at the
//! payload, `data` never looks at the message. Drop releases the envelope and
//! the one arm it holds.

use std::marker::PhantomData;
use std::mem::ManuallyDrop;

use super::error::ApiError;
use super::handle::error_message;
use super::transfer::to_owned_snapshot;
use crate::ffi::{self, AggregateResult, Buffer, PrepareDataResult};

fn tagged_error(is_error: bool, error: Option<&Buffer>) -> Option<ApiError> {
    if !is_error {
        return None;
    }
    let message = error_message(error).unwrap_or_else(|| "error tag without message".to_string());
    Some(ApiError::Boundary(message))
}

fn payload(buffer: Option<&Buffer>, arm: &str) -> Result<Vec<u8>, ApiError> {
    buffer
        .map(to_owned_snapshot)
        .ok_or_else(|| ApiError::Boundary(format!("success tag without {arm}")))
}

/// Output of `prepare_data`.
#[derive(Debug)]
pub struct PrepareDataEnvelope {
    result: ManuallyDrop<Box<PrepareDataResult>>,
    _not_send: PhantomData<*const ()>,
}

impl PrepareDataEnvelope {
    pub(super) fn new(result: Box<PrepareDataResult>) -> Self {
        Self {
            result: ManuallyDrop::new(result),
            _not_send: PhantomData,
        }
    }

    /// The module or runtime failure, if the tag says error.
    pub fn err(&self) -> Option<ApiError> {
        tagged_error(self.result.is_error, self.result.error.as_deref())
    }

    /// `Ok` when the envelope holds a payload.
    pub fn check(&self) -> Result<(), ApiError> {
        self.err().map_or(Ok(()), Err)
    }

    /// Copy the payload out after checking the tag.
    pub fn data(&self) -> Result<Vec<u8>, ApiError> {
        self.check()?;
        payload(self.result.data.as_deref(), "data")
    }

    /// Copy the payload out and release the envelope.
    pub fn into_data(self) -> Result<Vec<u8>, ApiError> {
        self.data()
    }
}

impl Drop for PrepareDataEnvelope {
    fn drop(&mut self) {
        // SAFETY: taken exactly once, here.
        let result = unsafe { ManuallyDrop::take(&mut self.result) };
        ffi::prepare_data_result_destroy(Some(result));
    }
}

/// Payload of a successful `aggregate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    /// Module-defined result bytes
    pub result: Vec<u8>,
    /// Module-defined digest of `result`
    pub digest: Vec<u8>,
}

impl Aggregation {
    /// Decode `result` as a little-endian `f64`, when it is exactly 8 bytes.
    pub fn as_f64_le(&self) -> Option<f64> {
        let bytes: [u8; 8] = self.result.as_slice().try_into().ok()?;
        Some(f64::from_le_bytes(bytes))
    }
}

/// Output of `aggregate`.
#[derive(Debug)]
pub struct AggregateEnvelope {
    result: ManuallyDrop<Box<AggregateResult>>,
    _not_send: PhantomData<*const ()>,
}

impl AggregateEnvelope {
    pub(super) fn new(result: Box<AggregateResult>) -> Self {
        Self {
            result: ManuallyDrop::new(result),
            _not_send: PhantomData,
        }
    }

    /// The module or runtime failure, if the tag says error.
    pub fn err(&self) -> Option<ApiError> {
        tagged_error(self.result.is_error, self.result.error.as_deref())
    }

    /// `Ok` when the envelope holds a payload.
    pub fn check(&self) -> Result<(), ApiError> {
        self.err().map_or(Ok(()), Err)
    }

    /// Copy result and digest out after checking the tag.
    pub fn data(&self) -> Result<Aggregation, ApiError> {
        self.check()?;
        Ok(Aggregation {
            result: payload(self.result.data.as_deref(), "data")?,
            digest: payload(self.result.digest.as_deref(), "digest")?,
        })
    }

    /// Copy the payload out and release the envelope.
    pub fn into_data(self) -> Result<Aggregation, ApiError> {
        self.data()
    }
}

impl Drop for AggregateEnvelope {
    fn drop(&mut self) {
        // SAFETY: taken exactly once, here.
        let result = unsafe { ManuallyDrop::take(&mut self.result) };
        ffi::aggregate_result_destroy(Some(result));
    }
}

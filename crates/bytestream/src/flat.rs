// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ptr::NonNull;
use std::slice;

use bytes::Bytes;
use tracing::debug;

use crate::control::{ControlBlock, ReleaseCallback};
use crate::ops::{self, OperationTable};
use crate::stream::ByteStream;
use crate::{Error, Result};

static FLAT_OPS: OperationTable = OperationTable {
    set_position: ops::window_set_position,
    reset: ops::window_reset,
    read: flat_read,
    remaining_size: ops::window_remaining_size,
    position: ops::window_position,
    release: ops::window_release,
    clone_at: ops::shared_clone_at,
    dispose: ops::shared_dispose,
};

/// The payload record of a flat stream: one contiguous region of immutable bytes,
/// together with whatever keeps that region alive.
enum FlatRegion {
    /// Bytes in static storage. Nothing to reclaim.
    Static(&'static [u8]),

    /// Heap bytes owned by the stream content.
    Owned(Box<[u8]>),

    /// Bytes shared with other owners through a `bytes` handle, which keeps the
    /// region alive for as long as this record exists.
    Shared(Bytes),

    /// Producer-managed bytes reachable only by pointer. The producer's callback,
    /// if any, reclaims them when the record drops.
    Raw {
        data: NonNull<u8>,
        len: usize,
        release: Option<ReleaseCallback>,
    },
}

impl FlatRegion {
    fn as_slice(&self) -> &[u8] {
        match self {
            Self::Static(data) => data,
            Self::Owned(data) => data,
            Self::Shared(data) => data.as_ref(),
            Self::Raw { data, len, .. } => {
                // SAFETY: The producer guaranteed (data, len) to be a readable region that
                // stays valid and unmodified until the release callback runs.
                unsafe { slice::from_raw_parts(data.as_ptr(), *len) }
            }
        }
    }
}

impl Drop for FlatRegion {
    fn drop(&mut self) {
        if let Self::Raw {
            data,
            release: Some(release),
            ..
        } = self
        {
            // SAFETY: The record drops exactly once, when the last instance goes away,
            // so this is the single hand-back of the region to its producer.
            unsafe { (*release)(data.cast()) };
        }
    }
}

impl ByteStream {
    /// Creates a stream over bytes in static storage.
    ///
    /// Nothing is copied and nothing is released when the last instance is dropped -
    /// the natural choice for content compiled into the program image.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalArgument`][crate::Error::IllegalArgument] if `data` is empty.
    pub fn from_static(data: &'static [u8]) -> Result<Self> {
        flat_stream(FlatRegion::Static(data))
    }

    /// Creates a stream that takes ownership of heap bytes.
    ///
    /// The allocation is freed when the last instance referencing the content is
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalArgument`][crate::Error::IllegalArgument] if `data` is empty.
    pub fn from_vec(data: Vec<u8>) -> Result<Self> {
        flat_stream(FlatRegion::Owned(data.into_boxed_slice()))
    }

    /// Creates a stream over the contents of a [`Bytes`] handle, without copying.
    ///
    /// The handle is retained for the lifetime of the content, so the region stays
    /// alive even if every other `Bytes` clone is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalArgument`][crate::Error::IllegalArgument] if `data` is empty.
    pub fn from_bytes(data: Bytes) -> Result<Self> {
        flat_stream(FlatRegion::Shared(data))
    }

    /// Creates a stream over a producer-managed byte region.
    ///
    /// This is the general factory for content that lives in storage this crate knows
    /// nothing about - a flash page, a memory-mapped peripheral, an allocation from a
    /// foreign allocator. When the last instance referencing the content is dropped,
    /// `release` (if provided) is called exactly once with `data` so the producer can
    /// reclaim the region; `None` means the region is never reclaimed.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalArgument`][crate::Error::IllegalArgument] if `len` is zero.
    ///
    /// # Safety
    ///
    /// `data` must point to `len` readable bytes that remain valid and unmodified until
    /// the release callback runs (or forever, if `release` is `None`), and the region
    /// must be safe to read from any thread.
    pub unsafe fn from_raw_parts(data: NonNull<u8>, len: usize, release: Option<ReleaseCallback>) -> Result<Self> {
        flat_stream(FlatRegion::Raw { data, len, release })
    }
}

fn flat_stream(region: FlatRegion) -> Result<ByteStream> {
    let length = region.as_slice().len();

    if length == 0 {
        return Err(Error::IllegalArgument);
    }

    let payload = NonNull::from(Box::leak(Box::new(region))).cast::<()>();
    let control = ControlBlock::allocate(&FLAT_OPS, payload, Some(release_flat_region));

    debug!(length, "created flat byte stream");

    Ok(ByteStream {
        control,
        offset_diff: 0,
        current_position: 0,
        first_valid_position: 0,
        length,
    })
}

/// # Safety
///
/// Must only be called with a payload pointer produced by [`flat_stream`], exactly once.
unsafe fn release_flat_region(payload: NonNull<()>) {
    // SAFETY: Allocated via Box in `flat_stream`; this is the single reclamation.
    drop(unsafe { Box::from_raw(payload.cast::<FlatRegion>().as_ptr()) });
}

fn flat_read(stream: &mut ByteStream, buffer: &mut [u8]) -> Result<usize> {
    debug_assert!(stream.is_of_type(&FLAT_OPS));

    if buffer.is_empty() {
        return Err(Error::IllegalArgument);
    }

    if stream.current_position == stream.length {
        return Err(Error::Eof);
    }

    // SAFETY: Instances dispatching through FLAT_OPS always carry a FlatRegion payload,
    // which their counted control-block reference keeps alive.
    let region = unsafe { stream.control_block().payload.cast::<FlatRegion>().as_ref() };

    let source = region.as_slice();
    let count = buffer.len().min(stream.length - stream.current_position);

    buffer[..count].copy_from_slice(&source[stream.current_position..stream.current_position + count]);
    stream.current_position += count;

    Ok(count)
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ptr::NonNull;

use parking_lot::Mutex;
use tracing::debug;

use crate::control::ControlBlock;
use crate::ops::{self, OperationTable};
use crate::stream::ByteStream;
use crate::{Error, Result};

pub(crate) static COMPOSITE_OPS: OperationTable = OperationTable {
    set_position: ops::window_set_position,
    reset: ops::window_reset,
    read: composite_read,
    remaining_size: ops::window_remaining_size,
    position: ops::window_position,
    release: ops::window_release,
    clone_at: ops::shared_clone_at,
    dispose: ops::shared_dispose,
};

/// The payload record of a composite stream: two child instances whose contents appear
/// back to back.
///
/// The children's logical positions form the composite's inner domain - the first child
/// spans `[0, boundary)` and the second `[boundary, length)`, with the boundary fixed at
/// construction. Composite instances cloned from one another share these children, so a
/// delegated read re-establishes the owning child's cursor from the outer instance's
/// cursor on every call; the lock makes that position-and-read pair transactional.
struct CompositeRegion {
    children: Mutex<Children>,
}

/// Declared first-then-second so the drop order matches the read order.
struct Children {
    first: ByteStream,
    second: ByteStream,
}

impl ByteStream {
    /// Chains another stream's content after this one, without copying either.
    ///
    /// Consumes this stream: its remaining content, from the read cursor onward, becomes
    /// the head of the returned stream. `other` is unaffected - the returned stream holds
    /// its own reference to `other`'s content, starting at `other`'s current cursor - and
    /// both inputs' contents are kept alive by the composition. The returned stream reads
    /// from logical position 0.
    ///
    /// The operation only links the two streams together; no byte is copied, regardless
    /// of content sizes, and either input may itself be a composition.
    ///
    /// A single read never produces bytes of both chained contents: a read that reaches
    /// the end of the head content returns what it got, and the next read continues in
    /// the tail content.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalArgument`][crate::Error::IllegalArgument] if the combined size
    /// does not fit the position domain. Both inputs are left unchanged (`self` is
    /// dropped, releasing its reference, as on any early return).
    ///
    /// # Examples
    ///
    /// ```
    /// use bytestream::ByteStream;
    ///
    /// # fn main() -> bytestream::Result<()> {
    /// let head = ByteStream::from_static(b"0123456789")?;
    /// let tail = ByteStream::from_static(b"ABCDEFGHIJKLMNOPQRSTUVWXYZ")?;
    ///
    /// let mut combined = head.concat(&tail)?;
    /// assert_eq!(combined.remaining_size()?, 36);
    ///
    /// let mut buffer = [0_u8; 12];
    /// assert_eq!(combined.read(&mut buffer)?, 10);
    /// assert_eq!(&buffer[..10], b"0123456789");
    /// # Ok(())
    /// # }
    /// ```
    pub fn concat(self, other: &ByteStream) -> Result<ByteStream> {
        // The head keeps its cursor but is re-anchored so that its current byte sits at
        // logical position 0, the start of the composite's inner domain.
        let first = rebase_at_zero(self);

        let boundary = first.logical_end();

        // One new reference on the tail content; the head's reference moved in with it.
        let second = other.clone_at(boundary)?;
        let length = second.logical_end();

        let region = CompositeRegion {
            children: Mutex::new(Children { first, second }),
        };

        let payload = NonNull::from(Box::leak(Box::new(region))).cast::<()>();
        let control = ControlBlock::allocate(&COMPOSITE_OPS, payload, Some(release_composite_region));

        debug!(boundary, length, "created composite byte stream");

        Ok(ByteStream {
            control,
            offset_diff: 0,
            current_position: 0,
            first_valid_position: 0,
            length,
        })
    }
}

/// Re-anchors a stream so its current logical position becomes 0, with an empty pending
/// segment - the same window a clone at offset 0 would get, minus the extra reference.
fn rebase_at_zero(mut stream: ByteStream) -> ByteStream {
    stream.offset_diff = 0_usize.wrapping_sub(stream.current_position);
    stream.first_valid_position = stream.current_position;
    stream
}

/// # Safety
///
/// Must only be called with a payload pointer produced by `concat`, exactly once.
unsafe fn release_composite_region(payload: NonNull<()>) {
    // SAFETY: Allocated via Box in `concat`; this is the single reclamation. Dropping
    // the record disposes the first child, then the second.
    drop(unsafe { Box::from_raw(payload.cast::<CompositeRegion>().as_ptr()) });
}

fn composite_read(stream: &mut ByteStream, buffer: &mut [u8]) -> Result<usize> {
    debug_assert!(stream.is_of_type(&COMPOSITE_OPS));

    if buffer.is_empty() {
        return Err(Error::IllegalArgument);
    }

    if stream.current_position == stream.length {
        return Err(Error::Eof);
    }

    // SAFETY: Instances dispatching through COMPOSITE_OPS always carry a CompositeRegion
    // payload, which their counted control-block reference keeps alive.
    let region = unsafe { stream.control_block().payload.cast::<CompositeRegion>().as_ref() };

    let mut children = region.children.lock();

    let target = stream.current_position;
    let boundary = children.first.logical_end();

    let child = if target < boundary {
        &mut children.first
    } else {
        &mut children.second
    };

    // A sibling instance may have moved the shared child's cursor since our last read,
    // so re-establish it before delegating. Both steps happen under the lock.
    child.set_position(target)?;
    let count = child.read(buffer)?;

    // Advance by source bytes consumed - the child's cursor delta - which for a
    // converting child may differ from the byte count produced in the buffer.
    let consumed = child.position()?.wrapping_sub(target);
    stream.current_position += consumed;

    Ok(count)
}

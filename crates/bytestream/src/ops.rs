// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::control::ControlBlock;
use crate::stream::ByteStream;
use crate::{Error, Result};

/// The operations a stream provider implements.
///
/// Each provider declares one `static` table; the address of that table is the provider's
/// identity, and every control block the provider creates points at it. Public stream
/// operations dispatch through the table of the instance's own control block.
///
/// # Implementation design
///
/// This is a "manual" dynamic dispatch mechanism rather than a trait object. A provider is
/// identified by comparing table addresses, which a trait object cannot offer, and the
/// table lets two providers share the position-window arithmetic below while overriding
/// only the operations that actually touch their payload. Instances stay plain structs
/// with no generic parameter leaking the provider type to consumers.
///
/// The entries are ordinary `fn` pointers. Each provider-specific entry internally relies
/// on the crate invariant that it is only ever installed in its own provider's table, so
/// the control block payload it casts is of the type that provider created.
pub(crate) struct OperationTable {
    pub(crate) set_position: fn(&mut ByteStream, usize) -> Result<()>,
    pub(crate) reset: fn(&mut ByteStream) -> Result<()>,
    pub(crate) read: fn(&mut ByteStream, &mut [u8]) -> Result<usize>,
    pub(crate) remaining_size: fn(&ByteStream) -> Result<usize>,
    pub(crate) position: fn(&ByteStream) -> Result<usize>,
    pub(crate) release: fn(&mut ByteStream, usize) -> Result<()>,
    pub(crate) clone_at: fn(&ByteStream, usize) -> Result<ByteStream>,
    pub(crate) dispose: fn(&mut ByteStream),
}

// The operations below implement the position-window model shared by providers whose
// window state lives entirely in the instance. All position arithmetic between the
// logical and inner domains is wrapping: `logical = inner + offset_diff` holds modulo
// the position domain, and the range checks against `first_valid_position` and `length`
// reject positions that fall outside the window.

/// Moves the read cursor to a logical position inside the pending or future segment.
pub(crate) fn window_set_position(stream: &mut ByteStream, position: usize) -> Result<()> {
    let inner = position.wrapping_sub(stream.offset_diff);

    if inner > stream.length || inner < stream.first_valid_position {
        return Err(Error::NoSuchElement);
    }

    stream.current_position = inner;
    Ok(())
}

/// Moves the read cursor back to the first byte that has not been released.
pub(crate) fn window_reset(stream: &mut ByteStream) -> Result<()> {
    if stream.first_valid_position == stream.length {
        // Everything was released; there is nothing left to re-read.
        return Err(Error::NoSuchElement);
    }

    stream.current_position = stream.first_valid_position;
    Ok(())
}

/// Number of bytes between the read cursor and the end of the stream.
pub(crate) fn window_remaining_size(stream: &ByteStream) -> Result<usize> {
    Ok(stream.length - stream.current_position)
}

/// The logical position of the read cursor.
pub(crate) fn window_position(stream: &ByteStream) -> Result<usize> {
    Ok(stream.current_position.wrapping_add(stream.offset_diff))
}

/// Acknowledges every byte up to and including the given logical position.
pub(crate) fn window_release(stream: &mut ByteStream, position: usize) -> Result<()> {
    // The released position itself is included, so the first valid position
    // becomes the byte after it.
    let first_valid = position.wrapping_sub(stream.offset_diff).wrapping_add(1);

    if first_valid > stream.current_position {
        // Bytes that were never read cannot be acknowledged.
        return Err(Error::IllegalArgument);
    }

    if first_valid <= stream.first_valid_position {
        return Err(Error::NoSuchElement);
    }

    stream.first_valid_position = first_valid;
    Ok(())
}

/// Creates a second instance over the same content, starting at the source's read cursor.
///
/// The clone's window opens at the source's current position: its pending segment is
/// empty and its first logical position is `offset`. The content gains one counted
/// reference.
pub(crate) fn shared_clone_at(stream: &ByteStream, offset: usize) -> Result<ByteStream> {
    let remaining = stream.length - stream.current_position;

    if offset.checked_add(remaining).is_none() {
        // The clone's logical positions would not fit the position domain.
        return Err(Error::IllegalArgument);
    }

    // SAFETY: `stream` holds a counted reference, so the block is live.
    unsafe { ControlBlock::acquire(stream.control) };

    Ok(ByteStream {
        control: stream.control,
        offset_diff: offset.wrapping_sub(stream.current_position),
        current_position: stream.current_position,
        first_valid_position: stream.current_position,
        length: stream.length,
    })
}

/// Drops the instance's counted reference on the shared content.
pub(crate) fn shared_dispose(stream: &mut ByteStream) {
    // SAFETY: Every instance owns exactly one counted reference and `dispose` runs once
    // per instance, from `Drop`.
    unsafe { ControlBlock::release(stream.control) };
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn reject_read(_stream: &mut ByteStream, _buffer: &mut [u8]) -> Result<usize> {
        Err(Error::System)
    }

    /// A table for tests that construct control blocks without ever dispatching.
    pub(crate) static NOOP_OPS: OperationTable = OperationTable {
        set_position: window_set_position,
        reset: window_reset,
        read: reject_read,
        remaining_size: window_remaining_size,
        position: window_position,
        release: window_release,
        clone_at: shared_clone_at,
        dispose: shared_dispose,
    };
}

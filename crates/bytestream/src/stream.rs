// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ptr::NonNull;
use std::{fmt, io, ptr};

use crate::composite;
use crate::control::ControlBlock;
use crate::ops::OperationTable;
use crate::read_adapter::ByteStreamReader;
use crate::Result;

/// One consumer's view over shared, immutable byte content.
///
/// A `ByteStream` couples a read cursor and a sliding acknowledgement window with a
/// counted reference to the content behind it. The content itself - whether a flat
/// in-memory region or a composition of other streams - is never copied or mutated;
/// reading copies bytes out into a caller-owned buffer.
///
/// # The position window
///
/// Every byte of the content has a fixed *logical position*. The window splits the
/// content into three segments:
///
/// * **released** - positions the consumer has acknowledged with [`release()`][Self::release].
///   They can no longer be read or sought.
/// * **pending** - positions already read but not yet acknowledged. The cursor can move
///   back into this segment with [`set_position()`][Self::set_position] or
///   [`reset()`][Self::reset] to read them again.
/// * **future** - positions not yet read. The next [`read()`][Self::read] draws from here.
///
/// Logical positions are per-instance: [`clone_at()`][Self::clone_at] chooses the logical
/// position of the first byte visible to the new instance, which is how a retransmitting
/// protocol can, for example, make stream positions coincide with sequence numbers.
///
/// # Sharing
///
/// Each instance belongs to a single owner. To hand content to another consumer or
/// thread, create a second instance with [`clone_at()`][Self::clone_at]; the instances
/// move their cursors independently while the content stays shared. Dropping an instance
/// gives up its reference; when the last one goes, the content's release callbacks run.
pub struct ByteStream {
    pub(crate) control: NonNull<ControlBlock>,

    /// Difference between the logical and inner position domains, as a wrapping offset:
    /// `logical = inner + offset_diff` modulo the position domain.
    pub(crate) offset_diff: usize,

    /// Inner position of the read cursor. Invariant:
    /// `first_valid_position <= current_position <= length`.
    pub(crate) current_position: usize,

    /// Inner position of the first byte not yet released.
    pub(crate) first_valid_position: usize,

    /// Inner position one past the last byte. Fixed at instance creation.
    pub(crate) length: usize,
}

impl ByteStream {
    /// Moves the read cursor to `position`.
    ///
    /// The position must lie inside the pending or future segment: at or after the first
    /// valid (unreleased) position, and no further than one past the last byte. Moving
    /// exactly one past the last byte is allowed; the next read then reports
    /// [`Eof`][crate::Error::Eof].
    ///
    /// # Errors
    ///
    /// Returns [`NoSuchElement`][crate::Error::NoSuchElement] if the position falls in
    /// the released segment or beyond the end; the cursor is left untouched.
    pub fn set_position(&mut self, position: usize) -> Result<()> {
        let op = self.ops().set_position;
        op(self, position)
    }

    /// Moves the read cursor back to the first byte that has not been released.
    ///
    /// After a release, this is the byte following the released prefix; before any
    /// release, the first byte of the stream.
    ///
    /// # Errors
    ///
    /// Returns [`NoSuchElement`][crate::Error::NoSuchElement] if every byte has been
    /// released and nothing remains to re-read.
    pub fn reset(&mut self) -> Result<()> {
        let op = self.ops().reset;
        op(self)
    }

    /// Copies the next bytes of the stream into `buffer`, advancing the cursor.
    ///
    /// Up to `buffer.len()` bytes are produced; the number actually produced is
    /// returned and is at least 1 on success. A provider that converts data while
    /// reading may consume a different number of source bytes than it produces -
    /// the cursor advances by source bytes consumed.
    ///
    /// # Errors
    ///
    /// * [`Eof`][crate::Error::Eof] - the cursor is at the end of the stream.
    /// * [`IllegalArgument`][crate::Error::IllegalArgument] - `buffer` is empty, or
    ///   smaller than the provider's minimum conversion granularity.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytestream::{ByteStream, Error};
    ///
    /// # fn main() -> bytestream::Result<()> {
    /// let mut stream = ByteStream::from_static(b"0123456789")?;
    /// let mut buffer = [0_u8; 4];
    ///
    /// assert_eq!(stream.read(&mut buffer)?, 4);
    /// assert_eq!(&buffer, b"0123");
    ///
    /// assert_eq!(stream.read(&mut buffer)?, 4);
    /// assert_eq!(stream.read(&mut buffer)?, 2);
    /// assert_eq!(stream.read(&mut buffer), Err(Error::Eof));
    /// # Ok(())
    /// # }
    /// ```
    pub fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let op = self.ops().read;
        op(self, buffer)
    }

    /// Number of bytes between the read cursor and the end of the stream.
    pub fn remaining_size(&self) -> Result<usize> {
        let op = self.ops().remaining_size;
        op(self)
    }

    /// The logical position of the read cursor.
    ///
    /// The position returned here is always accepted by
    /// [`set_position()`][Self::set_position] as long as no release happens in between.
    pub fn position(&self) -> Result<usize> {
        let op = self.ops().position;
        op(self)
    }

    /// Acknowledges every byte up to and including `position`.
    ///
    /// Acknowledged bytes can no longer be read or sought, which frees the provider to
    /// reclaim whatever resources maintained them. Providers over storage that cannot be
    /// reclaimed piecemeal (ROM, shared regions) shrink the window identically and simply
    /// free nothing.
    ///
    /// # Errors
    ///
    /// * [`IllegalArgument`][crate::Error::IllegalArgument] - `position` is at or past
    ///   the read cursor; bytes that were never read cannot be acknowledged.
    /// * [`NoSuchElement`][crate::Error::NoSuchElement] - `position` is already released.
    pub fn release(&mut self, position: usize) -> Result<()> {
        let op = self.ops().release;
        op(self, position)
    }

    /// Creates a second instance over the same content, without copying it.
    ///
    /// The new instance starts reading where this one's cursor currently stands, with an
    /// empty pending segment, and `offset` becomes the logical position of its first
    /// byte. The content gains one reference and is kept alive until both instances are
    /// dropped. Cursors of the two instances are fully independent.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalArgument`][crate::Error::IllegalArgument] if `offset` plus the
    /// remaining size does not fit the position domain. No instance is created.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytestream::ByteStream;
    ///
    /// # fn main() -> bytestream::Result<()> {
    /// let mut original = ByteStream::from_static(b"hello")?;
    ///
    /// let mut buffer = [0_u8; 2];
    /// original.read(&mut buffer)?;
    ///
    /// let clone = original.clone_at(100)?;
    /// assert_eq!(clone.position()?, 100);
    /// assert_eq!(clone.remaining_size()?, 3);
    ///
    /// // The original is unaffected.
    /// assert_eq!(original.position()?, 2);
    /// # Ok(())
    /// # }
    /// ```
    pub fn clone_at(&self, offset: usize) -> Result<ByteStream> {
        let op = self.ops().clone_at;
        op(self, offset)
    }

    /// Adapts the stream into a [`std::io::Read`], reporting end of stream as `Ok(0)`.
    #[must_use]
    pub fn as_read(&mut self) -> impl io::Read + '_ {
        ByteStreamReader::new(self)
    }

    /// Whether this instance presents a composition of other streams.
    #[must_use]
    pub fn is_composite(&self) -> bool {
        self.is_of_type(&composite::COMPOSITE_OPS)
    }

    /// Whether the instance dispatches through the given provider's operation table.
    pub(crate) fn is_of_type(&self, ops: &'static OperationTable) -> bool {
        ptr::eq(self.ops(), ops)
    }

    pub(crate) fn ops(&self) -> &'static OperationTable {
        self.control_block().ops
    }

    pub(crate) fn control_block(&self) -> &ControlBlock {
        // SAFETY: The instance holds a counted reference on the control block, which
        // therefore outlives the instance.
        unsafe { self.control.as_ref() }
    }

    /// The logical position one past the last byte of the stream.
    pub(crate) fn logical_end(&self) -> usize {
        self.length.wrapping_add(self.offset_diff)
    }
}

impl Drop for ByteStream {
    fn drop(&mut self) {
        let op = self.ops().dispose;
        op(self);
    }
}

// SAFETY: An instance may move to another thread: the cursor fields move with it, the
// payload bytes behind the control block are immutable, the reference count is atomic,
// and the composite provider's mutable child state is behind a lock.
unsafe impl Send for ByteStream {}

// SAFETY: Shared references only expose the read-only cursor accessors; all cursor
// mutation requires `&mut`, so exclusive use per instance is compiler-enforced. The
// shared state reachable through `control` is safe to access concurrently as above.
unsafe impl Sync for ByteStream {}

impl fmt::Debug for ByteStream {
    #[cfg_attr(test, mutants::skip)] // We have no API contract for this.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteStream")
            .field("position", &self.current_position.wrapping_add(self.offset_diff))
            .field("first_valid", &self.first_valid_position.wrapping_add(self.offset_diff))
            .field("remaining", &(self.length - self.current_position))
            .field("composite", &self.is_composite())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;
    use crate::Error;

    assert_impl_all!(ByteStream: Send, Sync);

    #[test]
    fn position_plus_remaining_is_constant_between_reads() {
        let mut stream = ByteStream::from_static(b"0123456789").unwrap();

        let total = stream.position().unwrap() + stream.remaining_size().unwrap();
        assert_eq!(total, 10);

        let mut buffer = [0_u8; 3];
        stream.read(&mut buffer).unwrap();

        assert_eq!(stream.position().unwrap() + stream.remaining_size().unwrap(), total);

        stream.set_position(7).unwrap();
        assert_eq!(stream.position().unwrap() + stream.remaining_size().unwrap(), total);
    }

    #[test]
    fn set_position_round_trips_with_position() {
        let mut stream = ByteStream::from_static(b"0123456789").unwrap();

        let mut buffer = [0_u8; 6];
        stream.read(&mut buffer).unwrap();

        let position = stream.position().unwrap();
        stream.set_position(position).unwrap();
        assert_eq!(stream.position().unwrap(), position);

        stream.set_position(2).unwrap();
        assert_eq!(stream.position().unwrap(), 2);
    }

    #[test]
    fn reset_returns_to_first_unreleased_byte() {
        let mut stream = ByteStream::from_static(b"0123456789").unwrap();

        let mut buffer = [0_u8; 6];
        stream.read(&mut buffer).unwrap();

        // No release yet: reset goes back to the start.
        stream.reset().unwrap();
        assert_eq!(stream.position().unwrap(), 0);

        stream.read(&mut buffer).unwrap();
        stream.release(3).unwrap();

        stream.reset().unwrap();
        assert_eq!(stream.position().unwrap(), 4);
    }

    #[test]
    fn reset_after_releasing_everything_fails() {
        let mut stream = ByteStream::from_static(b"01").unwrap();

        let mut buffer = [0_u8; 2];
        stream.read(&mut buffer).unwrap();
        stream.release(1).unwrap();

        assert_eq!(stream.reset(), Err(Error::NoSuchElement));
    }

    #[test]
    fn clone_at_offset_overflow_creates_no_instance() {
        let stream = ByteStream::from_static(b"0123456789").unwrap();

        assert_eq!(stream.clone_at(usize::MAX - 4).map(|_| ()), Err(Error::IllegalArgument));

        // The boundary case still fits: MAX - remaining is a valid offset.
        let clone = stream.clone_at(usize::MAX - 10).unwrap();
        assert_eq!(clone.position().unwrap(), usize::MAX - 10);
    }

    #[test]
    fn clone_positions_use_the_requested_offset_domain() {
        let mut stream = ByteStream::from_static(b"0123456789").unwrap();

        let mut buffer = [0_u8; 4];
        stream.read(&mut buffer).unwrap();

        let mut clone = stream.clone_at(1000).unwrap();

        assert_eq!(clone.position().unwrap(), 1000);
        assert_eq!(clone.remaining_size().unwrap(), 6);

        clone.read(&mut buffer).unwrap();
        assert_eq!(&buffer, b"4567");
        assert_eq!(clone.position().unwrap(), 1004);

        // Seeking below the clone's first logical position is rejected.
        assert_eq!(clone.set_position(999), Err(Error::NoSuchElement));
        clone.set_position(1000).unwrap();
    }

    #[test]
    fn debug_output_shows_window_state() {
        let stream = ByteStream::from_static(b"0123456789").unwrap();

        let rendered = format!("{stream:?}");

        assert!(rendered.contains("ByteStream"));
        assert!(rendered.contains("remaining: 10"));
    }
}

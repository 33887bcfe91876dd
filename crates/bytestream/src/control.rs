// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ptr::NonNull;
use std::sync::atomic::{self, AtomicUsize};

use tracing::trace;

use crate::ops::OperationTable;

/// Releases one resource owned by a control block.
///
/// A callback is invoked exactly once, when the reference count of the control block that
/// stores it drops to zero. The pointer it receives is the resource it is responsible for:
/// the payload pointer for the payload callback, the control block pointer for the control
/// block callback. `None` in place of a callback means "do not release" - used when the
/// resource lives in storage that is never reclaimed, such as ROM.
///
/// # Safety
///
/// The callback must only reclaim the resource it receives, and must tolerate being called
/// from whichever thread happens to drop the last stream instance.
pub type ReleaseCallback = unsafe fn(NonNull<()>);

/// The shared, reference-counted record behind every stream instance.
///
/// One control block is created per stream content by a provider factory. Every instance
/// referencing the content - the one returned by the factory plus any clones - holds one
/// counted reference. All fields other than the reference count are immutable after
/// construction; the payload bytes themselves are immutable for the whole lifetime of the
/// content, which is what makes lock-free concurrent reads through different instances
/// sound.
///
/// When the count reaches zero the two release callbacks run in order: payload first,
/// control block second.
pub(crate) struct ControlBlock {
    /// Identifies the provider and supplies its operations. Provider identity is the
    /// address of this table.
    pub(crate) ops: &'static OperationTable,

    /// Provider-private payload record. Only the provider that stamped `ops` knows the
    /// real type behind this pointer.
    pub(crate) payload: NonNull<()>,

    references: AtomicUsize,

    payload_release: Option<ReleaseCallback>,
    control_block_release: Option<ReleaseCallback>,
}

impl ControlBlock {
    /// Creates a heap-allocated control block holding the first reference.
    ///
    /// The block reclaims itself once the last reference is dropped.
    pub(crate) fn allocate(
        ops: &'static OperationTable,
        payload: NonNull<()>,
        payload_release: Option<ReleaseCallback>,
    ) -> NonNull<Self> {
        NonNull::from(Box::leak(Box::new(Self {
            ops,
            payload,
            references: AtomicUsize::new(1),
            payload_release,
            control_block_release: Some(release_boxed_control_block),
        })))
    }

    /// Adds one counted reference.
    ///
    /// # Safety
    ///
    /// `block` must point to a live control block and the caller must already hold one of
    /// its counted references.
    pub(crate) unsafe fn acquire(block: NonNull<Self>) {
        // SAFETY: Guaranteed live by the caller's own reference.
        let shared = unsafe { block.as_ref() };

        shared.references.fetch_add(1, atomic::Ordering::Relaxed);
    }

    /// Drops one counted reference, running the release callbacks if it was the last.
    ///
    /// # Safety
    ///
    /// `block` must point to a live control block and the caller must own the counted
    /// reference being dropped. The block must not be accessed through this reference
    /// afterwards.
    pub(crate) unsafe fn release(block: NonNull<Self>) {
        let payload;
        let payload_release;
        let control_block_release;

        {
            // SAFETY: Guaranteed live by the reference the caller is about to drop.
            let shared = unsafe { block.as_ref() };

            payload = shared.payload;
            payload_release = shared.payload_release;
            control_block_release = shared.control_block_release;

            if shared.references.fetch_sub(1, atomic::Ordering::Release) != 1 {
                return;
            }
        }

        // Pairs with the Release decrement above: every access to the payload made
        // through other instances happens-before the callbacks reclaim it.
        atomic::fence(atomic::Ordering::Acquire);

        trace!("last stream instance dropped, releasing shared content");

        if let Some(release) = payload_release {
            // SAFETY: The count reached zero, so this is the single release of the payload.
            unsafe { release(payload) };
        }

        if let Some(release) = control_block_release {
            // SAFETY: The count reached zero and nothing dereferences the block after this.
            unsafe { release(block.cast()) };
        }
    }

    #[cfg(test)]
    pub(crate) fn references(block: NonNull<Self>) -> usize {
        // SAFETY: Test-only accessor; callers hold a reference.
        unsafe { block.as_ref() }.references.load(atomic::Ordering::Relaxed)
    }
}

/// The standard control block release: returns the block to the heap.
///
/// # Safety
///
/// Must only be called with a pointer produced by [`ControlBlock::allocate`], exactly once.
unsafe fn release_boxed_control_block(block: NonNull<()>) {
    // SAFETY: Allocated via Box in `allocate`; this is the single reclamation.
    drop(unsafe { Box::from_raw(block.cast::<ControlBlock>().as_ptr()) });
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{self, AtomicUsize};

    use super::*;
    use crate::ops;

    static PAYLOAD_RELEASES: AtomicUsize = AtomicUsize::new(0);

    unsafe fn count_payload_release(_payload: NonNull<()>) {
        PAYLOAD_RELEASES.fetch_add(1, atomic::Ordering::SeqCst);
    }

    fn test_ops() -> &'static OperationTable {
        // Any table works here; these tests never dispatch through it.
        &ops::tests::NOOP_OPS
    }

    #[test]
    fn acquire_and_release_balance_to_one_payload_release() {
        let block = ControlBlock::allocate(test_ops(), NonNull::<()>::dangling(), Some(count_payload_release));

        assert_eq!(ControlBlock::references(block), 1);

        // SAFETY: We hold the initial reference.
        unsafe { ControlBlock::acquire(block) };
        // SAFETY: Same.
        unsafe { ControlBlock::acquire(block) };

        assert_eq!(ControlBlock::references(block), 3);

        let before = PAYLOAD_RELEASES.load(atomic::Ordering::SeqCst);

        // SAFETY: Dropping the references we took above plus the initial one.
        unsafe { ControlBlock::release(block) };
        // SAFETY: Same.
        unsafe { ControlBlock::release(block) };

        assert_eq!(PAYLOAD_RELEASES.load(atomic::Ordering::SeqCst), before);

        // SAFETY: The last reference; the block reclaims itself after this.
        unsafe { ControlBlock::release(block) };

        assert_eq!(PAYLOAD_RELEASES.load(atomic::Ordering::SeqCst), before + 1);
    }

    #[test]
    fn missing_payload_release_is_skipped() {
        let block = ControlBlock::allocate(test_ops(), NonNull::<()>::dangling(), None);

        // SAFETY: The single reference; must not panic on the absent callback.
        unsafe { ControlBlock::release(block) };
    }
}

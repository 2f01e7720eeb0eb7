use crate::tags::{Tag, TAG_WIDTH};
use crate::AllocError;
use core::fmt::{Debug, Formatter};
use core::marker::PhantomData;
use core::mem;

/// A handle to one allocation made by a [`TaggedArena`].
///
/// The handle is the offset of the first payload byte inside the arena and stands in for the raw
/// pointer a heap allocator would return.
/// Because it is an offset and not an address it stays meaningful when the owning arena is moved
/// or cloned.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BlockHandle(pub(crate) usize);

impl BlockHandle {
    /// The offset of the first payload byte inside the arena
    pub fn offset(&self) -> usize {
        self.0
    }
}

/// A fixed-capacity allocator that hands out blocks from an owned byte buffer and tracks them
/// with boundary tags.
///
/// The arena is `N` bytes large, owned by value and never resized.
/// At any point in time it is exactly partitioned into blocks, each bounded by an agreeing pair
/// of sentinel tags (see the [crate docs](crate) for the tag format).
/// Directly after construction the whole usable span is one free block:
///
/// ```text
///   [ N-8 │ ....................... free ....................... │ N-8 ]
/// ```
///
/// Blocks are handed out in units of `T`-sized elements, so the smallest block that can ever be
/// carved off is `size_of::<T>() + 2 * TAG_WIDTH` bytes large.
///
/// The allocator is single-threaded and performs no internal locking; the only discipline
/// required from the caller is the usual one of not releasing a handle twice and not using it
/// after release.
pub struct TaggedArena<T, const N: usize> {
    pub(crate) arena: [u8; N],
    _elem: PhantomData<T>,
}

impl<T, const N: usize> TaggedArena<T, N> {
    /// Create a new allocator whose arena consists of a single free block spanning the whole
    /// usable span.
    ///
    /// Returns [`AllocError::OutOfMemory`] if `N` cannot hold even one element together with its
    /// two boundary tags.
    pub fn new() -> Result<Self, AllocError> {
        assert!(
            N <= i32::MAX as usize,
            "arena capacity is too large for the sentinel width"
        );
        assert!(
            mem::size_of::<T>() > 0,
            "zero-sized element types have no storage to manage"
        );

        if N < mem::size_of::<T>() + 2 * TAG_WIDTH {
            return Err(AllocError::OutOfMemory);
        }

        let mut arena = [0u8; N];
        let usable = N - 2 * TAG_WIDTH;
        Tag::free(usable).write(&mut arena, 0);
        Tag::free(usable).write(&mut arena, N - TAG_WIDTH);

        let result = Self {
            arena,
            _elem: PhantomData,
        };
        debug_assert!(result.is_consistent());
        Ok(result)
    }

    /// Reserve contiguous storage for `count` elements of `T`.
    ///
    /// The search is first-fit: blocks are scanned in ascending offset order and the first free
    /// block whose payload is large enough is selected.
    /// The selected block is split so that only the requested bytes are handed out, unless the
    /// remainder would be too small to ever hold another element, in which case the caller
    /// receives the whole block (and with it a few extra bytes).
    ///
    /// Returns [`AllocError::AllocationFailure`] if `count` is zero, if the request can never fit
    /// the arena, or if no free block is currently large enough.
    /// The arena is left unmodified in all failure cases.
    pub fn allocate(&mut self, count: usize) -> Result<BlockHandle, AllocError> {
        if count == 0 {
            return Err(AllocError::AllocationFailure);
        }
        let requested = count
            .checked_mul(mem::size_of::<T>())
            .ok_or(AllocError::AllocationFailure)?;
        let gross = requested
            .checked_add(2 * TAG_WIDTH)
            .ok_or(AllocError::AllocationFailure)?;
        if gross > N {
            return Err(AllocError::AllocationFailure);
        }

        let (offset, tag) = self
            .blocks()
            .find(|(_, tag)| !tag.occupied && tag.len >= requested)
            .ok_or(AllocError::AllocationFailure)?;

        // carve the requested bytes from the front of the found block but only if the back
        // remainder can stand on its own as a minimum viable block
        let carved = if tag.len >= requested + mem::size_of::<T>() + 2 * TAG_WIDTH {
            let remainder = tag.len - requested - 2 * TAG_WIDTH;
            let remainder_at = offset + 2 * TAG_WIDTH + requested;
            Tag::free(remainder).write(&mut self.arena, remainder_at);
            Tag::free(remainder).write(&mut self.arena, remainder_at + TAG_WIDTH + remainder);
            requested
        } else {
            tag.len
        };
        Tag::used(carved).write(&mut self.arena, offset);
        Tag::used(carved).write(&mut self.arena, offset + TAG_WIDTH + carved);

        debug_assert!(self.is_consistent());
        log::trace!(
            "allocated {} payload bytes at offset {}",
            carved,
            offset + TAG_WIDTH
        );
        Ok(BlockHandle(offset + TAG_WIDTH))
    }

    /// Give a previously allocated block back to the free pool.
    ///
    /// The released block is merged with its immediate neighbors where those exist and are free,
    /// so free space never stays fragmented across adjacent blocks.
    /// Only the two neighbors are ever inspected which makes this operation O(1).
    ///
    /// Returns [`AllocError::InvalidPointer`] if `handle` does not address a block that is
    /// currently handed out, which covers double releases (the leading tag is already positive)
    /// as well as handles that do not line up with a block boundary (the tag pair disagrees).
    pub fn release(&mut self, handle: BlockHandle) -> Result<(), AllocError> {
        let payload_at = handle.offset();
        if payload_at < TAG_WIDTH || payload_at + TAG_WIDTH > N {
            return Err(AllocError::InvalidPointer);
        }

        let lead_at = payload_at - TAG_WIDTH;
        let lead = Tag::read(&self.arena, lead_at);
        if !lead.occupied {
            return Err(AllocError::InvalidPointer);
        }
        let trail_at = payload_at + lead.len;
        if trail_at + TAG_WIDTH > N || Tag::read(&self.arena, trail_at) != lead {
            return Err(AllocError::InvalidPointer);
        }

        let mut begin_at = lead_at;
        let mut len = lead.len;

        // absorb a free left neighbor by pulling the block boundary back to its start
        if lead_at > 0 {
            let left = Tag::read(&self.arena, lead_at - TAG_WIDTH);
            if !left.occupied {
                begin_at = lead_at - 2 * TAG_WIDTH - left.len;
                len += left.len + 2 * TAG_WIDTH;
            }
        }
        // absorb a free right neighbor by extending over it
        if trail_at + TAG_WIDTH < N {
            let right = Tag::read(&self.arena, trail_at + TAG_WIDTH);
            if !right.occupied {
                len += right.len + 2 * TAG_WIDTH;
            }
        }

        let merged = Tag::free(len);
        merged.write(&mut self.arena, begin_at);
        merged.write(&mut self.arena, begin_at + TAG_WIDTH + len);

        debug_assert!(self.is_consistent());
        log::trace!(
            "released block at offset {}, now {} free bytes at offset {}",
            payload_at,
            len,
            begin_at
        );
        Ok(())
    }

    /// Construct `value` in place inside the payload of `handle`.
    ///
    /// This is a thin wrapper around an unaligned raw write and performs no allocation
    /// bookkeeping of its own.
    /// Placing over an already placed value leaks the previous one.
    ///
    /// # Panics
    /// Panics if the payload of `handle` cannot hold a `T` inside the arena.
    pub fn place(&mut self, handle: BlockHandle, value: T) {
        let payload_at = handle.offset();
        assert!(
            payload_at >= TAG_WIDTH && payload_at + mem::size_of::<T>() + TAG_WIDTH <= N,
            "handle does not address a payload inside the arena"
        );
        debug_assert!(
            Tag::read(&self.arena, payload_at - TAG_WIDTH).occupied,
            "place was called with a handle to a free block"
        );

        // Safety: the target range lies inside the owned arena (asserted above) and the arena
        // makes no alignment guarantees, hence the unaligned write.
        unsafe {
            self.arena
                .as_mut_ptr()
                .add(payload_at)
                .cast::<T>()
                .write_unaligned(value);
        }
    }

    /// Destroy the value previously placed at `handle`.
    ///
    /// # Panics
    /// Panics if the payload of `handle` cannot hold a `T` inside the arena.
    ///
    /// # Safety
    /// A `T` must have been placed at `handle` and not yet unplaced.
    pub unsafe fn unplace(&mut self, handle: BlockHandle) {
        let payload_at = handle.offset();
        assert!(
            payload_at >= TAG_WIDTH && payload_at + mem::size_of::<T>() + TAG_WIDTH <= N,
            "handle does not address a payload inside the arena"
        );

        // move the value out of the arena so that its destructor runs
        drop(
            self.arena
                .as_ptr()
                .add(payload_at)
                .cast::<T>()
                .read_unaligned(),
        );
    }

    /// Read the raw sign-encoded sentinel value stored `offset` bytes into the arena.
    ///
    /// This is a diagnostic accessor into the tag stream that is not needed for normal allocator
    /// use but kept observable for inspection and tests.
    ///
    /// # Panics
    /// Panics if the arena cannot hold a whole tag at `offset`.
    pub fn peek(&self, offset: usize) -> i32 {
        i32::from_ne_bytes(self.arena[offset..offset + TAG_WIDTH].try_into().unwrap())
    }

    /// Iterate over all blocks in the arena in ascending offset order.
    pub(crate) fn blocks(&self) -> BlockIter<'_> {
        BlockIter {
            arena: &self.arena,
            offset: 0,
        }
    }

    /// Check that the tag stream still partitions the arena exactly: every block carries an
    /// agreeing lead/trail tag pair and walking the stream from offset 0 terminates exactly at
    /// the capacity with no gap or overlap.
    ///
    /// A violation indicates a defect in the engine itself, not a caller error, which is why this
    /// is only enforced through `debug_assert!` after every mutation.
    pub(crate) fn is_consistent(&self) -> bool {
        let mut offset = 0;
        while offset < N {
            if offset + TAG_WIDTH > N {
                return false;
            }
            let lead = Tag::read(&self.arena, offset);
            let trail_at = offset + TAG_WIDTH + lead.len;
            if trail_at + TAG_WIDTH > N || Tag::read(&self.arena, trail_at) != lead {
                return false;
            }
            offset = trail_at + TAG_WIDTH;
        }
        offset == N
    }
}

/// Cloning duplicates the entire arena, so two allocator instances never alias the same bytes.
///
/// The bound on `T: Copy` keeps the bitwise duplication of currently placed values sound.
impl<T: Copy, const N: usize> Clone for TaggedArena<T, N> {
    fn clone(&self) -> Self {
        Self {
            arena: self.arena,
            _elem: PhantomData,
        }
    }
}

impl<T, const N: usize> Debug for TaggedArena<T, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "TaggedArena {{ ")?;
        for (offset, lead) in self.blocks() {
            let trail = Tag::read(&self.arena, offset + TAG_WIDTH + lead.len);
            write!(
                f,
                "[<{} {}> ... <{}>]",
                lead.len,
                if lead.occupied { "Used" } else { "Free" },
                trail.len
            )?;
        }
        write!(f, " }}")
    }
}

pub(crate) struct BlockIter<'arena> {
    arena: &'arena [u8],
    offset: usize,
}

impl Iterator for BlockIter<'_> {
    type Item = (usize, Tag);

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset + TAG_WIDTH > self.arena.len() {
            return None;
        }

        let offset = self.offset;
        let tag = Tag::read(self.arena, offset);
        self.offset += tag.len + 2 * TAG_WIDTH;
        Some((offset, tag))
    }
}

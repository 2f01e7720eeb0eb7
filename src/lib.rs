//! A fixed-capacity memory allocator with boundary tag bookkeeping.
//!
//! The main type is the [`TaggedArena`] which owns a byte buffer of constant size `N` and carves
//! variable-length blocks out of it on demand, standing in for a general purpose heap allocator
//! without ever touching a system allocator.
//!
//! Every block is wrapped in a pair of sentinel tags, one directly before and one directly after
//! its payload.
//! A sentinel is a native-endian `i32` whose magnitude is the payload length of the block and
//! whose sign encodes occupancy (positive means free, negative means in use), so the whole arena
//! reads as one contiguous tag stream:
//!
//! ```text
//!   ┌──────────────────────── arena (N bytes) ────────────────────────┐
//!   │                                                                 │
//!   [ -4 │ payload  │ -4 ][ 12 │     free payload      │ 12 ]
//!    ^                ^
//!    │                └── trailing sentinel
//!    └── leading sentinel
//! ```
//!
//! Allocation searches first-fit in ascending offset order and splits the found block unless the
//! remainder would be too small to ever be handed out again.
//! Releasing a block merges it with free neighbors on either side so that free space never stays
//! fragmented across adjacent blocks.
//!
//! # Example
//!
//! ```rust
//! use tagged_arena::{AllocError, TaggedArena};
//!
//! // an arena of 64 bytes handing out `u32` sized elements
//! let mut arena = TaggedArena::<u32, 64>::new()?;
//!
//! let block = arena.allocate(2)?;
//! arena.place(block, 0x55u32);
//! unsafe { arena.unplace(block) };
//! arena.release(block)?;
//! # Ok::<(), AllocError>(())
//! ```
#![no_std]

mod allocator;
mod tags;


pub use allocator::{BlockHandle, TaggedArena};
pub use tags::TAG_WIDTH;

use thiserror_no_std::Error;

/// The error returned when an arena operation fails
#[derive(Debug, Error, Copy, Clone, Eq, PartialEq)]
pub enum AllocError {
    /// The backing capacity is too small to ever hold an allocation.
    #[error("the backing capacity cannot hold even one element with its two boundary tags")]
    OutOfMemory,

    /// The requested allocation cannot be satisfied by any free block.
    ///
    /// This is a terminal outcome for the call; the arena is left unmodified and no retry is
    /// performed internally.
    #[error("the allocator has no free block that can satisfy the requested allocation")]
    AllocationFailure,

    /// The given handle does not address a block that is currently handed out.
    ///
    /// This is returned for double releases as well as for handles that do not line up with a
    /// block boundary at all.
    #[error("the given handle does not address the payload of a live allocation")]
    InvalidPointer,
}

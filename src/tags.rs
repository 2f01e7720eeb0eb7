use core::mem;

/// How many bytes one boundary tag occupies inside the arena.
pub const TAG_WIDTH: usize = mem::size_of::<i32>();

/// Decoded view of one boundary tag.
///
/// On disk (i.e. inside the arena) a tag is a sign-encoded `i32`, but all sign juggling is
/// confined to [`encode`](Tag::encode) and [`decode`](Tag::decode) so that the engine itself only
/// ever deals with a payload length and an occupancy flag.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct Tag {
    /// Payload length in bytes of the block this tag bounds
    pub len: usize,
    /// Whether the block is currently handed out
    pub occupied: bool,
}

impl Tag {
    pub fn free(len: usize) -> Self {
        Self {
            len,
            occupied: false,
        }
    }

    pub fn used(len: usize) -> Self {
        Self {
            len,
            occupied: true,
        }
    }

    /// The raw sign-encoded sentinel value of this tag
    pub fn encode(&self) -> i32 {
        if self.occupied {
            -(self.len as i32)
        } else {
            self.len as i32
        }
    }

    pub fn decode(raw: i32) -> Self {
        Self {
            len: raw.unsigned_abs() as usize,
            occupied: raw < 0,
        }
    }

    /// Read the tag stored `offset` bytes into the arena.
    ///
    /// # Panics
    /// Panics if the arena cannot hold a whole tag at `offset`.
    pub fn read(arena: &[u8], offset: usize) -> Self {
        Self::decode(i32::from_ne_bytes(
            arena[offset..offset + TAG_WIDTH].try_into().unwrap(),
        ))
    }

    /// Write the tag `offset` bytes into the arena.
    ///
    /// # Panics
    /// Panics if the arena cannot hold a whole tag at `offset`.
    pub fn write(&self, arena: &mut [u8], offset: usize) {
        arena[offset..offset + TAG_WIDTH].copy_from_slice(&self.encode().to_ne_bytes());
    }
}

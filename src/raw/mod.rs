//! The raw LZ4 block format.
//!
//! Using this directly saves you the overhead of framing (~11 bytes) but you lose several features,
//! most notably the fallback mechanism for incompressible data: if the compressed version of a block
//! would be larger, the frame format stores the uncompressed version instead. This guarantees that the
//! compression ratio will never be negative.
//!
//! Nothing in here allocates behind your back: the match finder's [`HashTable`] is owned by the caller
//! and can be reused between calls. A table must not be shared by two compressions running at the
//! same time (it is `&mut` for a reason), so give each thread its own.

mod compress;
mod decompress;

pub use compress::*;
pub use decompress::*;

use byteorder::{ByteOrder, LE};
use std::fmt;

/// log2 of the number of slots in the match finder's hash table.
pub const HASH_LOG: u32 = 14;
/// Number of slots in the match finder's hash table.
pub const HASH_TABLE_SIZE: usize = 1 << HASH_LOG;

pub(crate) const MINMATCH: usize = 4;
/// The last five bytes of a block are always literals.
pub(crate) const LAST_LITERALS: usize = 5;
/// A match may not start within the last twelve bytes of a block.
pub(crate) const MFLIMIT: usize = 12;
/// Largest distance a match may reach back.
pub const MAX_DISTANCE: usize = 0xFFFF;

/// Hash a little-endian packed four byte sequence into one of `2^hash_log` buckets.
#[inline]
pub fn hash_sequence(sequence: u32, hash_log: u32) -> u32 {
    sequence.wrapping_mul(2654435761) >> (32 - hash_log)
}

#[inline]
pub(crate) fn read_sequence(input: &[u8], position: usize) -> u32 {
    LE::read_u32(&input[position..position + 4])
}

#[inline]
fn bucket(hash: u32) -> usize {
    (hash & (HASH_TABLE_SIZE as u32 - 1)) as usize
}

/// Match finder state: maps the hash of a four byte sequence to the most recent position it was seen at.
///
/// Each bucket keeps a single entry, older positions with the same hash are simply evicted.
/// Slots store `position + 1` so that zero means "empty".
#[derive(Clone, PartialEq, Eq)]
pub struct HashTable {
    slots: Box<[u32]>,
}

impl Default for HashTable {
    fn default() -> Self {
        HashTable { slots: vec![0; HASH_TABLE_SIZE].into_boxed_slice() }
    }
}

impl fmt::Debug for HashTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let occupied = self.slots.iter().filter(|&&s| s != 0).count();
        f.debug_struct("HashTable").field("occupied", &occupied).finish()
    }
}

impl HashTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every position.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = 0);
    }

    /// Position stored in the bucket for `hash`, if any.
    ///
    /// Only the low [`HASH_LOG`] bits of `hash` select the bucket.
    #[inline]
    pub fn get(&self, hash: u32) -> Option<usize> {
        match self.slots[bucket(hash)] {
            0 => None,
            v => Some(v as usize - 1),
        }
    }

    /// Store `position` in the bucket for `hash` and return whatever was there before.
    ///
    /// `position` must be below `u32::MAX`; the block compressor checks this for its whole input.
    #[inline]
    pub fn replace(&mut self, hash: u32, position: usize) -> Option<usize> {
        let previous = std::mem::replace(&mut self.slots[bucket(hash)], (position + 1) as u32);
        match previous {
            0 => None,
            v => Some(v as usize - 1),
        }
    }

    /// Record every four byte sequence starting in `start..end` (sequences running past the end
    /// of `input` are skipped).
    pub fn insert_range(&mut self, input: &[u8], start: usize, end: usize) {
        let end = std::cmp::min(end, input.len().saturating_sub(MINMATCH - 1));
        for position in start..end {
            let hash = hash_sequence(read_sequence(input, position), HASH_LOG);
            self.replace(hash, position);
        }
    }

    /// Rebase every stored position after `amount` bytes were dropped from the front of the buffer.
    ///
    /// Positions that would become negative are forgotten.
    pub fn shift(&mut self, amount: usize) {
        if amount == 0 {
            return;
        }
        for slot in self.slots.iter_mut() {
            *slot = if *slot as usize > amount { *slot - amount as u32 } else { 0 };
        }
    }

    #[cfg(test)]
    pub(crate) fn slots(&self) -> &[u32] {
        &self.slots
    }
}

//! xxHash32, the checksum used by every integrity field of the LZ4 frame format.
//!
//! All arithmetic is done on `u32` with wrapping semantics; a single non-wrapping step
//! would produce a hash that disagrees with every other implementation.
//! To hash a sub-range of a buffer simply pass the sub-slice, nothing is copied.

use byteorder::{ByteOrder, LE};
use std::hash::Hasher;

const PRIME32_1: u32 = 2654435761;
const PRIME32_2: u32 = 2246822519;
const PRIME32_3: u32 = 3266489917;
const PRIME32_4: u32 = 668265263;
const PRIME32_5: u32 = 374761393;

const STRIPE_LEN: usize = 16;

#[inline]
fn round(acc: u32, lane: u32) -> u32 {
    acc.wrapping_add(lane.wrapping_mul(PRIME32_2))
        .rotate_left(13)
        .wrapping_mul(PRIME32_1)
}

#[inline]
fn initial_lanes(seed: u32) -> [u32; 4] {
    [
        seed.wrapping_add(PRIME32_1).wrapping_add(PRIME32_2),
        seed.wrapping_add(PRIME32_2),
        seed,
        seed.wrapping_sub(PRIME32_1),
    ]
}

#[inline]
fn consume_stripe(lanes: &mut [u32; 4], stripe: &[u8]) {
    for (lane, word) in lanes.iter_mut().zip(stripe.chunks_exact(4)) {
        *lane = round(*lane, LE::read_u32(word));
    }
}

#[inline]
fn converge(lanes: &[u32; 4]) -> u32 {
    lanes[0]
        .rotate_left(1)
        .wrapping_add(lanes[1].rotate_left(7))
        .wrapping_add(lanes[2].rotate_left(12))
        .wrapping_add(lanes[3].rotate_left(18))
}

/// Mixes in the trailing (< 16) bytes and applies the final avalanche.
fn finalize(mut hash: u32, tail: &[u8]) -> u32 {
    let mut words = tail.chunks_exact(4);
    for word in &mut words {
        hash = hash
            .wrapping_add(LE::read_u32(word).wrapping_mul(PRIME32_3))
            .rotate_left(17)
            .wrapping_mul(PRIME32_4);
    }
    for &byte in words.remainder() {
        hash = hash
            .wrapping_add(u32::from(byte).wrapping_mul(PRIME32_5))
            .rotate_left(11)
            .wrapping_mul(PRIME32_1);
    }

    hash ^= hash >> 15;
    hash = hash.wrapping_mul(PRIME32_2);
    hash ^= hash >> 13;
    hash = hash.wrapping_mul(PRIME32_3);
    hash ^= hash >> 16;
    hash
}

/// Hash `input` in one call.
pub fn xxh32(input: &[u8], seed: u32) -> u32 {
    let mut stripes = input.chunks_exact(STRIPE_LEN);
    let mut hash = if input.len() >= STRIPE_LEN {
        let mut lanes = initial_lanes(seed);
        for stripe in &mut stripes {
            consume_stripe(&mut lanes, stripe);
        }
        converge(&lanes)
    } else {
        seed.wrapping_add(PRIME32_5)
    };

    // xxHash32 only mixes in the low 32 bits of the length
    hash = hash.wrapping_add(input.len() as u32);
    finalize(hash, stripes.remainder())
}

/// Incremental xxHash32.
///
/// Feeding the same bytes through any number of `update` calls yields the same digest as a
/// single call to [`xxh32`].
#[derive(Clone, Debug)]
pub struct XxHash32 {
    seed: u32,
    total_len: u64,
    lanes: [u32; 4],
    buffer: [u8; STRIPE_LEN],
    buffered: usize,
}

impl Default for XxHash32 {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl XxHash32 {
    pub fn with_seed(seed: u32) -> Self {
        XxHash32 {
            seed,
            total_len: 0,
            lanes: initial_lanes(seed),
            buffer: [0; STRIPE_LEN],
            buffered: 0,
        }
    }

    pub fn update(&mut self, mut input: &[u8]) {
        self.total_len += input.len() as u64;

        if self.buffered > 0 {
            let take = std::cmp::min(STRIPE_LEN - self.buffered, input.len());
            self.buffer[self.buffered..][..take].copy_from_slice(&input[..take]);
            self.buffered += take;
            input = &input[take..];

            if self.buffered < STRIPE_LEN {
                return;
            }
            let stripe = self.buffer;
            consume_stripe(&mut self.lanes, &stripe);
            self.buffered = 0;
        }

        let mut stripes = input.chunks_exact(STRIPE_LEN);
        for stripe in &mut stripes {
            consume_stripe(&mut self.lanes, stripe);
        }

        let rest = stripes.remainder();
        self.buffer[..rest.len()].copy_from_slice(rest);
        self.buffered = rest.len();
    }

    /// Returns the hash of everything fed so far. The hasher may keep being updated afterwards.
    pub fn digest(&self) -> u32 {
        let mut hash = if self.total_len >= STRIPE_LEN as u64 {
            converge(&self.lanes)
        } else {
            self.seed.wrapping_add(PRIME32_5)
        };
        hash = hash.wrapping_add(self.total_len as u32);
        finalize(hash, &self.buffer[..self.buffered])
    }
}

impl Hasher for XxHash32 {
    fn write(&mut self, bytes: &[u8]) {
        self.update(bytes);
    }

    fn finish(&self) -> u64 {
        u64::from(self.digest())
    }
}

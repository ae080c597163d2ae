//! Cross-check the built-in xxHash32 against the `twox-hash` crate.

use lz4_window::xxhash::{xxh32, XxHash32};
use rand::prelude::*;
use std::hash::Hasher;

fn reference(data: &[u8], seed: u32) -> u32 {
    let mut hasher = twox_hash::XxHash32::with_seed(seed);
    hasher.write(data);
    hasher.finish() as u32
}

#[test]
fn known_values() {
    assert_eq!(xxh32(b"test", 0), 1042293711);
    assert_eq!(xxh32(b"", 0), reference(b"", 0));
}

#[test]
fn every_length_up_to_a_few_stripes() {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut data = vec![0u8; 300];
    rng.fill(&mut data[..]);
    for len in 0..data.len() {
        for &seed in &[0, 1, 0x9E3779B1, u32::MAX] {
            assert_eq!(xxh32(&data[..len], seed), reference(&data[..len], seed), "len {} seed {}", len, seed);
        }
    }
}

#[test]
fn streaming_against_reference() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..200 {
        let mut data = vec![0u8; rng.gen_range(0..5_000)];
        rng.fill(&mut data[..]);
        let seed = rng.gen();

        let mut ours = XxHash32::with_seed(seed);
        let mut theirs = twox_hash::XxHash32::with_seed(seed);
        let mut rest = &data[..];
        while !rest.is_empty() {
            let (head, tail) = rest.split_at(rng.gen_range(1..=rest.len().min(40)));
            ours.update(head);
            theirs.write(head);
            rest = tail;
        }
        assert_eq!(ours.digest(), theirs.finish() as u32);
    }
}

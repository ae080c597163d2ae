#![allow(non_upper_case_globals)]

use bitflags::bitflags;
use byteorder::{ByteOrder, LE};
use fehler::{throw, throws};
use thiserror::Error;

use super::{DecompressionError, MAGIC};
use crate::xxhash::xxh32;

bitflags! {
    /// The FLG byte, minus the version bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flags: u8 {
        const IndependentBlocks = 0b00100000;
        const BlockChecksums    = 0b00010000;
        const ContentSize       = 0b00001000;
        const ContentChecksum   = 0b00000100;
        const DictionaryId      = 0b00000001;
    }
}

const VERSION: u8 = 1 << 6;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("block size id {0} is reserved")]
    UnimplementedBlocksize(u8),
    #[error("file version {0} not supported")]
    UnsupportedVersion(u8),
    #[error("reserved bits in flags set")]
    ReservedFlagBitsSet,
    #[error("reserved bits in bd set")]
    ReservedBdBitsSet,
}

impl Flags {
    #[throws(ParseError)]
    pub fn parse(i: u8) -> Self {
        let version = i >> 6;
        if version != 1 {
            throw!(ParseError::UnsupportedVersion(version));
        }
        if (i & 0b10) != 0 {
            throw!(ParseError::ReservedFlagBitsSet);
        }

        Flags::from_bits_truncate(i)
    }

    pub fn independent_blocks(&self) -> bool { self.contains(Flags::IndependentBlocks) }
    pub fn block_checksums(&self)    -> bool { self.contains(Flags::BlockChecksums) }
    pub fn content_size(&self)       -> bool { self.contains(Flags::ContentSize) }
    pub fn content_checksum(&self)   -> bool { self.contains(Flags::ContentChecksum) }
    pub fn dictionary_id(&self)      -> bool { self.contains(Flags::DictionaryId) }
}

/// The BD byte. Bits 4-6 select the maximum block size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockDescriptor(pub u8);
impl BlockDescriptor {
    /// Picks the smallest supported block size that holds `block_maxsize` bytes.
    /// Anything above 4 MiB gets 4 MiB.
    pub fn new(block_maxsize: usize) -> Self {
        let id = match block_maxsize {
            0..=0x1_0000 => 4,
            0x1_0001..=0x4_0000 => 5,
            0x4_0001..=0x10_0000 => 6,
            _ => 7,
        };
        BlockDescriptor(id << 4)
    }

    #[throws(ParseError)]
    pub fn parse(i: u8) -> Self {
        if (i & 0b10001111) != 0 {
            throw!(ParseError::ReservedBdBitsSet);
        }
        let bd = BlockDescriptor(i);
        bd.block_maxsize()?;
        bd
    }

    #[throws(ParseError)]
    pub fn block_maxsize(&self) -> usize {
        let size = (self.0 >> 4) & 0b111;
        if (4..8).contains(&size) {
            1 << (size * 2 + 8)
        } else {
            throw!(ParseError::UnimplementedBlocksize(size))
        }
    }
}

/// Number of descriptor bytes (FLG up to the last optional field, without the checksum) implied by `flg`.
pub fn descriptor_len(flg: u8) -> usize {
    let flags = Flags::from_bits_truncate(flg);
    let mut len = 2;
    if flags.content_size() {
        len += 8;
    }
    if flags.dictionary_id() {
        len += 4;
    }
    len
}

fn header_checksum(descriptor: &[u8]) -> u8 {
    (xxh32(descriptor, 0) >> 8) as u8
}

/// Everything a frame header says about the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameDescriptor {
    pub flags: Flags,
    pub block_maxsize: usize,
    pub content_size: Option<u64>,
    pub dictionary_id: Option<u32>,
}

impl FrameDescriptor {
    /// Appends magic number, descriptor and header checksum to `out`.
    ///
    /// The content size and dictionary id flags are derived from the corresponding fields.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        let mut flags = self.flags - (Flags::ContentSize | Flags::DictionaryId);
        if self.content_size.is_some() {
            flags |= Flags::ContentSize;
        }
        if self.dictionary_id.is_some() {
            flags |= Flags::DictionaryId;
        }

        out.extend_from_slice(&MAGIC.to_le_bytes());
        let descriptor_start = out.len();
        out.push(VERSION | flags.bits());
        out.push(BlockDescriptor::new(self.block_maxsize).0);
        if let Some(content_size) = self.content_size {
            out.extend_from_slice(&content_size.to_le_bytes());
        }
        if let Some(id) = self.dictionary_id {
            out.extend_from_slice(&id.to_le_bytes());
        }
        let checksum = header_checksum(&out[descriptor_start..]);
        out.push(checksum);
    }

    /// Parses the bytes following the magic number: descriptor plus header checksum,
    /// exactly `descriptor_len(bytes[0]) + 1` of them.
    #[throws(DecompressionError)]
    pub fn parse(bytes: &[u8]) -> Self {
        let flg = match bytes.first() {
            Some(&flg) => flg,
            None => throw!(DecompressionError::TruncatedInput),
        };
        let flags = Flags::parse(flg)?;
        let len = descriptor_len(flg);
        if bytes.len() < len + 1 {
            throw!(DecompressionError::TruncatedInput);
        }

        let bd = BlockDescriptor::parse(bytes[1])?;

        let mut field = &bytes[2..len];
        let content_size = if flags.content_size() {
            let i = LE::read_u64(field);
            field = &field[8..];
            Some(i)
        } else {
            None
        };
        let dictionary_id = if flags.dictionary_id() {
            Some(LE::read_u32(field))
        } else {
            None
        };

        // the checksum is verified unconditionally, a corrupt header is never trusted
        let header_checksum_desired = bytes[len];
        let header_checksum_actual = header_checksum(&bytes[..len]);
        if header_checksum_desired != header_checksum_actual {
            throw!(DecompressionError::HeaderChecksumFail);
        }

        FrameDescriptor {
            flags,
            block_maxsize: bd.block_maxsize()?,
            content_size,
            dictionary_id,
        }
    }

    pub fn independent_blocks(&self) -> bool { self.flags.independent_blocks() }
    pub fn block_checksums(&self)    -> bool { self.flags.block_checksums() }
    pub fn content_checksum(&self)   -> bool { self.flags.content_checksum() }
}

//! The compression algorithm.
//!
//! We make use of hash tables to find duplicates. This gives a reasonable compression ratio with a
//! high performance. It has fixed memory usage, which contrary to other approaches, makes it less
//! memory hungry.

use byteorder::{NativeEndian, WriteBytesExt, LE};
use fehler::{throw, throws};
use std::cmp;
use std::io::{self, ErrorKind, Write};
use std::mem;
use thiserror::Error;

use super::{hash_sequence, read_sequence, HashTable, HASH_LOG, LAST_LITERALS, MAX_DISTANCE, MFLIMIT, MINMATCH};

/// Errors when compressing a raw block.
#[derive(Error, Debug)]
pub enum CompressError {
    #[error("the output buffer is too small for the compressed block")]
    OutputBufferTooSmall,
    #[error("input of {0} bytes does not fit 32-bit match positions")]
    InputTooLarge(usize),
    #[error("block range starting at {start} with {len} bytes lies outside the {input_len} byte input")]
    InvalidRange { start: usize, len: usize, input_len: usize },
    #[error("error writing to the output you gave me")]
    WriteError(#[from] io::Error),
}

const SKIP_TRIGGER: usize = 6; // for each 64 failed probes, skip in bigger increments

/// Upper bound for the compressed size of a block of `len` bytes.
pub fn max_compressed_block_size(len: usize) -> usize {
    len + len / 255 + 16
}

/// Helper struct to allow more efficient code generation when using the Write trait on byte buffers.
///
/// The underlying problem is that the Write impl on [u8] (and everything similar, e.g. Cursor<[u8]>)
/// is specified to write as many bytes as possible before returning an error.
/// This is a problem because it forces e.g. a 32-bit write to compile to four 8-bit writes with a range
/// check every time, rather than a single 32-bit write with a range check.
///
/// This wrapper aims to resolve the problem by simply not writing anything in case we fail the bounds check,
/// as we throw away the entire buffer in that case anyway.
pub(crate) struct NoPartialWrites<'a>(pub(crate) &'a mut [u8]);
impl<'a> Write for NoPartialWrites<'a> {
    #[inline]
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.0.len() < data.len() {
            return Err(ErrorKind::WriteZero.into());
        }

        let amt = data.len();
        let (a, b) = mem::replace(&mut self.0, &mut []).split_at_mut(amt);
        a.copy_from_slice(data);
        self.0 = b;
        Ok(amt)
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn count_matching_bytes(a: &[u8], b: &[u8]) -> usize {
    const REGSIZE: usize = mem::size_of::<usize>();
    fn read_usize(b: &[u8]) -> usize {
        let mut buf = [0u8; REGSIZE];
        buf.copy_from_slice(&b[..REGSIZE]);
        usize::from_le_bytes(buf)
    }

    let mut matching_bytes = 0;
    // match in chunks of usize so we process a full register at a time instead of single bytes
    for (a, b) in a.chunks_exact(REGSIZE).zip(b.chunks_exact(REGSIZE)) {
        let xor = read_usize(a) ^ read_usize(b);
        if xor == 0 {
            matching_bytes += REGSIZE;
        } else {
            // bytes were read little-endian, so the first difference is in the lowest set bit
            matching_bytes += (xor.trailing_zeros() / 8) as usize;
            return matching_bytes;
        }
    }

    // we only get here if every full register matched, a few bytes may be left over
    let trailing_matches = a.iter().zip(b).skip(matching_bytes).take_while(|&(a, b)| a == b).count();
    matching_bytes + trailing_matches
}

fn write_lsic_head(token: &mut u8, shift: usize, value: usize) {
    let i = cmp::min(value, 0xF) as u8;
    *token |= i << shift;
}

#[throws(io::Error)]
fn write_lsic_tail<W: Write>(writer: &mut W, mut value: usize) {
    if value < 0xF {
        return;
    }

    value -= 0xF;

    while value >= 4 * 0xFF {
        writer.write_u32::<NativeEndian>(u32::MAX)?;
        value -= 4 * 0xFF;
    }
    while value >= 0xFF {
        writer.write_u8(0xFF)?;
        value -= 0xFF;
    }
    writer.write_u8(value as u8)?;
}

#[throws(io::Error)]
fn write_group<W: Write>(writer: &mut W, literal: &[u8], offset: u16, extra_bytes: usize) {
    let literal_len = literal.len();

    let mut token = 0;
    write_lsic_head(&mut token, 4, literal_len);
    write_lsic_head(&mut token, 0, extra_bytes);

    writer.write_u8(token)?;
    write_lsic_tail(writer, literal_len)?;
    writer.write_all(literal)?;
    writer.write_u16::<LE>(offset)?;
    write_lsic_tail(writer, extra_bytes)?;
}

#[throws(io::Error)]
fn write_last_literals<W: Write>(writer: &mut W, literal: &[u8]) {
    let mut token = 0;
    write_lsic_head(&mut token, 4, literal.len());
    writer.write_u8(token)?;
    write_lsic_tail(writer, literal.len())?;
    writer.write_all(literal)?;
}

#[throws(io::Error)]
fn compress_sequences<W: Write>(input: &[u8], start: usize, end: usize, table: &mut HashTable, mut writer: W) {
    let mut anchor = start;
    let mut cursor = start;

    if end - start > MFLIMIT {
        let last_match_start = end - MFLIMIT;
        let match_limit = end - LAST_LITERALS;
        let mut search_counter = 1 << SKIP_TRIGGER;

        while cursor <= last_match_start {
            let sequence = read_sequence(input, cursor);
            let candidate = table.replace(hash_sequence(sequence, HASH_LOG), cursor);

            // never trust the hash: the four bytes have to be verified
            let candidate = match candidate {
                Some(c) if c < cursor && cursor - c <= MAX_DISTANCE && read_sequence(input, c) == sequence => c,
                _ => {
                    // the longer we go without a hit, the faster we skip ahead
                    cursor += search_counter >> SKIP_TRIGGER;
                    search_counter += 1;
                    continue;
                }
            };
            search_counter = 1 << SKIP_TRIGGER;

            let extra_bytes = count_matching_bytes(
                &input[cursor + MINMATCH..match_limit],
                &input[candidate + MINMATCH..],
            );
            let offset = (cursor - candidate) as u16;
            write_group(&mut writer, &input[anchor..cursor], offset, extra_bytes)?;

            cursor += MINMATCH + extra_bytes;
            anchor = cursor;
        }
    }

    write_last_literals(&mut writer, &input[anchor..end])?;
}

#[throws(CompressError)]
fn check_bounds(input: &[u8], start: usize, len: usize) -> usize {
    let end = match start.checked_add(len) {
        Some(end) if end <= input.len() => end,
        _ => throw!(CompressError::InvalidRange { start, len, input_len: input.len() }),
    };
    if end >= u32::MAX as usize {
        throw!(CompressError::InputTooLarge(end));
    }
    end
}

/// Compress `input[start..end]` into `writer`.
///
/// Everything in `input` before `start` is history that matches may reference, provided `table`
/// knows about it (e.g. a dictionary or previous blocks). `table` positions are indices into `input`.
#[throws(CompressError)]
pub fn compress_into<W: Write>(input: &[u8], start: usize, end: usize, table: &mut HashTable, writer: W) {
    if end < start {
        throw!(CompressError::InvalidRange { start, len: 0, input_len: input.len() });
    }
    check_bounds(input, start, end - start)?;
    compress_sequences(input, start, end, table, writer)?;
}

/// Compress `src[src_start..src_start + src_len]` into `output` starting at `output_offset`.
///
/// Returns the number of bytes written. If the compressed block does not fit, this fails with
/// [`CompressError::OutputBufferTooSmall`]; [`max_compressed_block_size`] is always enough.
#[throws(CompressError)]
pub fn compress_block(
    src: &[u8],
    src_start: usize,
    src_len: usize,
    table: &mut HashTable,
    output: &mut [u8],
    output_offset: usize,
) -> usize {
    let end = check_bounds(src, src_start, src_len)?;

    let out = match output.get_mut(output_offset..) {
        Some(out) => out,
        None => throw!(CompressError::OutputBufferTooSmall),
    };
    let capacity = out.len();
    let mut cursor = NoPartialWrites(out);
    if compress_sequences(src, src_start, end, table, &mut cursor).is_err() {
        // NoPartialWrites only ever fails for lack of space
        throw!(CompressError::OutputBufferTooSmall);
    }
    capacity - cursor.0.len()
}

/// Compress a whole buffer into a fresh vector using a fresh table.
pub fn compress_raw(input: &[u8]) -> Vec<u8> {
    let mut table = HashTable::new();
    let mut output = Vec::with_capacity(max_compressed_block_size(input.len()));
    match compress_sequences(input, 0, input.len(), &mut table, &mut output) {
        Ok(()) => output,
        // writing to a Vec cannot fail
        Err(e) => unreachable!("{}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::decompress_raw;
    use std::str;

    /// Test that the compressed string decompresses to the original string.
    fn inverse(s: &str) {
        let compressed = compress_raw(s.as_bytes());
        let decompressed = decompress_raw(&compressed, &[], s.len()).unwrap();
        assert_eq!(str::from_utf8(&decompressed).unwrap(), s);
    }

    #[test]
    fn shakespear() {
        inverse("to live or not to live");
        inverse("Love is a wonderful terrible thing");
        inverse("There is nothing either good or bad, but thinking makes it so.");
        inverse("I burn, I pine, I perish.");
    }

    #[test]
    fn not_compressible() {
        inverse("as6yhol.;jrew5tyuikbfewedfyjltre22459ba");
        inverse("jhflkdjshaf9p8u89ybkvjsdbfkhvg4ut08yfrr");
    }

    #[test]
    fn short() {
        inverse("ahhd");
        inverse("ahd");
        inverse("x-29");
        inverse("x");
        inverse(".");
        inverse("ajsdh");
        inverse("");
    }

    #[test]
    fn nulls() {
        inverse("\0\0\0\0\0\0\0\0\0\0\0\0\0");
    }

    #[test]
    fn compression_works() {
        let s = "The Read trait allows for reading bytes from a source. Implementors of the Read trait are called 'readers'. Readers are defined by one required method, read().";
        inverse(s);
        assert!(compress_raw(s.as_bytes()).len() < s.len());
    }

    #[test]
    fn last_five_bytes_are_literals() {
        let input = vec![b'a'; 1000];
        let compressed = compress_raw(&input);
        // token 0x50 followed by five literal bytes
        assert_eq!(&compressed[compressed.len() - 6..], &[0x50, b'a', b'a', b'a', b'a', b'a']);
    }

    #[test]
    fn long_runs_use_length_extension() {
        let mut input = vec![7u8; 5000];
        input.extend((0..300u32).map(|i| (i * 13) as u8));
        let compressed = compress_raw(&input);
        assert!(compressed.len() < 400);
        assert_eq!(decompress_raw(&compressed, &[], input.len()).unwrap(), input);
    }

    #[test]
    fn big_compression() {
        let s: Vec<u8> = (0..3_000_000u32).map(|n| (n as u8).wrapping_mul(0xA).wrapping_add(33) ^ 0xA2).collect();
        assert_eq!(decompress_raw(&compress_raw(&s), &[], s.len()).unwrap(), s);
    }

    #[test]
    fn compress_block_respects_offsets() {
        let text = b"prefix garbage | hello hello hello hello hello hello hello!";
        let start = 17;
        let mut table = HashTable::new();
        let mut output = vec![0xEEu8; 8 + max_compressed_block_size(text.len())];
        let written = compress_block(text, start, text.len() - start, &mut table, &mut output, 8).unwrap();
        assert!(output[..8].iter().all(|&b| b == 0xEE));

        let decoded = decompress_raw(&output[8..8 + written], &[], text.len()).unwrap();
        assert_eq!(&decoded[..], &text[start..]);
    }

    #[test]
    fn compress_block_reports_small_output() {
        let input: Vec<u8> = (0..1000u32).map(|i| (i * 7919 % 251) as u8).collect();
        let mut table = HashTable::new();
        let mut output = vec![0u8; 100];
        match compress_block(&input, 0, input.len(), &mut table, &mut output, 0) {
            Err(CompressError::OutputBufferTooSmall) => {}
            other => panic!("unexpected result {:?}", other),
        }
        match compress_block(&input, 0, 10, &mut table, &mut output, 101) {
            Err(CompressError::OutputBufferTooSmall) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn out_of_range_source_is_an_error() {
        let mut table = HashTable::new();
        let mut output = vec![0u8; 64];
        match compress_block(b"abc", 2, 10, &mut table, &mut output, 0) {
            Err(CompressError::InvalidRange { start: 2, len: 10, input_len: 3 }) => {}
            other => panic!("unexpected result {:?}", other),
        }
        match compress_block(b"abc", usize::MAX, 2, &mut table, &mut output, 0) {
            Err(CompressError::InvalidRange { .. }) => {}
            other => panic!("unexpected result {:?}", other),
        }
        match compress_into(b"abc", 2, 1, &mut table, Vec::new()) {
            Err(CompressError::InvalidRange { .. }) => {}
            other => panic!("unexpected result {:?}", other),
        }
        assert!(compress_block(b"abc", 3, 0, &mut table, &mut output, 0).is_ok());
    }

    #[test]
    fn history_before_start_is_used() {
        let dict = b"the quick brown fox jumps over the lazy dog. ".repeat(4);
        let payload = b"the quick brown fox jumps over the lazy dog.";
        let mut buffer = dict.clone();
        buffer.extend_from_slice(payload);

        let mut warmed = HashTable::new();
        warmed.insert_range(&buffer, 0, dict.len());
        let mut with_history = Vec::new();
        compress_into(&buffer, dict.len(), buffer.len(), &mut warmed, &mut with_history).unwrap();

        let without_history = compress_raw(payload);
        assert!(with_history.len() < without_history.len());
        assert_eq!(decompress_raw(&with_history, &dict, payload.len()).unwrap(), &payload[..]);
    }
}

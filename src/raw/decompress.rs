//! LZ4 block decompression.

use byteorder::{ByteOrder, LE};
use std::cmp;
use thiserror::Error;

use super::MINMATCH;

/// Errors when decoding a raw block.
#[derive(Error, Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum DecodeError {
    /// The block decodes to more bytes than the output buffer can hold.
    #[error("the output buffer is too small for the decompressed data")]
    OutputBufferTooSmall,
    /// Expected more bytes, but found none.
    /// Either your input was truncated or you're trying to decompress garbage.
    #[error("unexpected end of input (truncated or malformed block)")]
    TruncatedInput,
    /// A match with offset zero, which no valid encoder produces.
    #[error("match offset of zero")]
    InvalidOffset,
    /// The offset for a deduplication reaches past the start of the dictionary.
    /// This may be caused by a missing or incomplete dictionary.
    #[error("match offset reaches outside the dictionary")]
    DictionaryOutOfBounds,
}
type Error = DecodeError;

/// This is how LZ4 encodes varints.
/// Just keep reading and adding while it's all F
fn read_lsic(initial: u8, input: &[u8], cursor: &mut usize) -> Result<usize, Error> {
    let mut value = initial as usize;
    if value == 0xF {
        loop {
            let more = *input.get(*cursor).ok_or(Error::TruncatedInput)?;
            *cursor += 1;
            value += more as usize;
            if more != 0xFF {
                break;
            }
        }
    }
    Ok(value)
}

/// Copy a match of `match_len` bytes starting `offset` bytes behind `position`.
///
/// Bytes before `output[0]` come from the tail of `dictionary`.
fn copy_match(output: &mut [u8], mut position: usize, offset: usize, mut match_len: usize, dictionary: &[u8]) -> Result<(), Error> {
    if offset > position {
        // need dictionary for this
        let dictionary_needed = offset - position;
        if dictionary_needed > dictionary.len() {
            return Err(Error::DictionaryOutOfBounds);
        }
        let from_dictionary = cmp::min(dictionary_needed, match_len);
        let start = dictionary.len() - dictionary_needed;
        output[position..][..from_dictionary].copy_from_slice(&dictionary[start..][..from_dictionary]);

        // the offset stays the same because our cursor moved forward by as much as we took
        position += from_dictionary;
        match_len -= from_dictionary;
        if match_len == 0 {
            return Ok(());
        }
    }

    let source = position - offset;
    match offset {
        // fastpath: memset if we repeat the same byte forever
        1 => {
            let byte = output[source];
            output[position..][..match_len].iter_mut().for_each(|b| *b = byte);
        }
        // fastpath: nonoverlapping
        o if match_len <= o => output.copy_within(source..source + match_len, position),
        _ => {
            // overlapping: every stride of `offset` bytes is itself non-overlapping and only reads
            // bytes that are already final, so copy stride by stride in forward order
            let mut copied = 0;
            while copied < match_len {
                let n = cmp::min(offset, match_len - copied);
                output.copy_within(source + copied..source + copied + n, position + copied);
                copied += n;
            }
        }
    }
    Ok(())
}

/// Decompress an LZ4-compressed block into `output`, starting at `output_offset`.
///
/// Returns the number of bytes written. Matches may reference anything already in `output`
/// (including whatever precedes `output_offset`) and, before `output[0]`, the tail of `dictionary`.
///
/// Note that LZ4 heavily relies on a lookback mechanism where bytes earlier in the output stream are referenced.
/// An LZ4 "dictionary" is passed separately because you obviously don't want it to appear in the output.
/// Pass `&input[offset..offset + len]` to decode a block embedded in a larger buffer.
pub fn decompress_block(input: &[u8], output: &mut [u8], output_offset: usize, dictionary: &[u8]) -> Result<usize, Error> {
    if output_offset > output.len() {
        return Err(Error::OutputBufferTooSmall);
    }

    let mut cursor = 0;
    let mut position = output_offset;
    while let Some(&token) = input.get(cursor) {
        cursor += 1;

        // read literals
        let literal_len = read_lsic(token >> 4, input, &mut cursor)?;
        let literal_end = cursor.checked_add(literal_len).ok_or(Error::TruncatedInput)?;
        if literal_end > input.len() {
            return Err(Error::TruncatedInput);
        }
        if literal_len > output.len() - position {
            return Err(Error::OutputBufferTooSmall);
        }
        output[position..][..literal_len].copy_from_slice(&input[cursor..literal_end]);
        position += literal_len;
        cursor = literal_end;

        // the last sequence has no match
        if cursor == input.len() {
            break;
        }

        // read duplicates
        let offset = match input.get(cursor..cursor + 2) {
            Some(bytes) => LE::read_u16(bytes) as usize,
            None => return Err(Error::TruncatedInput),
        };
        cursor += 2;
        if offset == 0 {
            return Err(Error::InvalidOffset);
        }

        let match_len = MINMATCH + read_lsic(token & 0xF, input, &mut cursor)?;
        if match_len > output.len() - position {
            return Err(Error::OutputBufferTooSmall);
        }
        copy_match(output, position, offset, match_len, dictionary)?;
        position += match_len;
    }

    Ok(position - output_offset)
}

/// Decompress a block into a fresh vector of at most `max_output` bytes.
pub fn decompress_raw(input: &[u8], dictionary: &[u8], max_output: usize) -> Result<Vec<u8>, Error> {
    let mut output = vec![0; max_output];
    let len = decompress_block(input, &mut output, 0, dictionary)?;
    output.truncate(len);
    Ok(output)
}

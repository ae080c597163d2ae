use lz4_window::framed::{CompressionSettings, DecompressionError, DecompressionSettings, FrameReader, FrameWriter};
use lz4_window::{create_compress_stream, create_decompress_stream, decompress, Dictionary};
use rand::prelude::*;
use std::io::{Read, Write};

fn text(len: usize) -> Vec<u8> {
    let sentence = b"Streams may be cut anywhere, even in the middle of a block header. ";
    let mut data: Vec<u8> = sentence.iter().cycle().take(len).cloned().collect();
    // sprinkle in noise so some blocks end up stored
    let mut rng = StdRng::seed_from_u64(len as u64);
    for byte in data.iter_mut().skip(len / 2).take(len / 8) {
        *byte = rng.gen();
    }
    data
}

fn encode(settings: &CompressionSettings<'_>, data: &[u8], chunks: &[usize]) -> Vec<u8> {
    let mut encoder = create_compress_stream(settings);
    let mut frame = Vec::new();
    let mut rest = data;
    for &len in chunks.iter().cycle() {
        if rest.is_empty() {
            break;
        }
        let (chunk, tail) = rest.split_at(len.min(rest.len()));
        frame.extend(encoder.add(chunk).unwrap());
        rest = tail;
    }
    frame.extend(encoder.finish().unwrap());
    frame
}

fn decode(settings: &DecompressionSettings<'_>, frame: &[u8], piece: usize) -> Result<Vec<u8>, DecompressionError> {
    let mut decoder = create_decompress_stream(settings);
    let mut output = Vec::new();
    for chunk in frame.chunks(piece) {
        output.extend(decoder.update(chunk)?);
    }
    decoder.finish()?;
    Ok(output)
}

#[test]
fn byte_at_a_time() {
    let data = text(150_000);
    let mut settings = CompressionSettings::default();
    settings.block_size(64 * 1024).content_checksum(true).block_checksums(true);

    let frame = encode(&settings, &data, &[1]);
    let mut verifying = DecompressionSettings::default();
    verifying.verify_checksum(true);
    assert_eq!(decode(&verifying, &frame, 1).unwrap(), data);
    assert_eq!(decompress(&frame).unwrap(), data);
}

#[test]
fn irregular_chunking_everywhere() {
    let data = text(500_000);
    for &independent in &[false, true] {
        let mut settings = CompressionSettings::default();
        settings.block_size(64 * 1024).independent_blocks(independent).content_checksum(true);

        let reference = settings.compress_to_vec(&data).unwrap();
        let one_shot = decompress(&reference).unwrap();
        let chunkings: [&[usize]; 4] = [&[1, 10, 100, 1000], &[65_535, 3], &[200_000], &[7, 65_536, 13]];
        for chunks in chunkings.iter() {
            let frame = encode(&settings, &data, chunks);
            for &piece in &[3, 4096, 65_537] {
                let streamed = decode(&DecompressionSettings::default(), &frame, piece).unwrap();
                assert_eq!(streamed, one_shot);
            }
            assert_eq!(decode(&DecompressionSettings::default(), &reference, 999).unwrap(), data);
        }
    }
}

#[test]
fn dictionary_in_both_directions() {
    let dict_bytes = text(90_000);
    let dict = Dictionary::new(&dict_bytes);
    let data = text(120_000);

    let mut settings = CompressionSettings::default();
    settings.dictionary(&dict).block_size(64 * 1024);
    let frame = encode(&settings, &data, &[4321]);

    let mut decompression = DecompressionSettings::default();
    decompression.dictionary(&dict_bytes);
    assert_eq!(decode(&decompression, &frame, 1000).unwrap(), data);
    assert_eq!(decompression.decompress(&frame).unwrap(), data);
}

#[test]
fn streamed_frames_match_one_shot_frames() {
    let dict_bytes = text(70_000);
    let dict = Dictionary::new(&dict_bytes);
    let data = text(300_000);
    for &independent in &[false, true] {
        for &with_dictionary in &[false, true] {
            let mut settings = CompressionSettings::default();
            settings.block_size(64 * 1024).independent_blocks(independent).content_size(false);
            if with_dictionary {
                settings.dictionary(&dict);
            }
            let one_shot = settings.compress_to_vec(&data).unwrap();
            let streamed = encode(&settings, &data, &[3333]);
            assert_eq!(streamed, one_shot, "independent: {}, dictionary: {}", independent, with_dictionary);
        }
    }
}

#[test]
fn concatenated_in_one_decoder() {
    let mut stream = Vec::new();
    let mut expected = Vec::new();
    for i in 0..5 {
        let data = text(10_000 * (i + 1));
        let mut settings = CompressionSettings::default();
        settings.content_checksum(i % 2 == 0).independent_blocks(i % 3 == 0);
        stream.extend(encode(&settings, &data, &[777]));
        expected.extend(data);
    }
    let mut verifying = DecompressionSettings::default();
    verifying.verify_checksum(true);
    assert_eq!(decode(&verifying, &stream, 5000).unwrap(), expected);
}

#[test]
fn error_surfaces_in_the_update_that_sees_it() {
    let data = text(100_000);
    let mut settings = CompressionSettings::default();
    settings.content_checksum(true);
    let mut frame = settings.compress_to_vec(&data).unwrap();
    let last = frame.len() - 1;
    frame[last] ^= 0xFF;

    let mut verifying = DecompressionSettings::default();
    verifying.verify_checksum(true);
    let mut decoder = create_decompress_stream(&verifying);
    assert!(decoder.update(&frame[..last]).is_ok());
    assert!(matches!(decoder.update(&frame[last..]), Err(DecompressionError::ContentChecksumFail)));
}

#[test]
fn io_adapters() {
    let data = text(300_000);
    let mut settings = CompressionSettings::default();
    settings.block_size(256 * 1024).content_checksum(true);

    let mut writer = FrameWriter::new(Vec::new(), &settings);
    for chunk in data.chunks(10_000) {
        writer.write_all(chunk).unwrap();
    }
    let frame = writer.finish().unwrap();
    assert_eq!(decompress(&frame).unwrap(), data);

    let mut verifying = DecompressionSettings::default();
    verifying.verify_checksum(true);
    let mut output = Vec::new();
    FrameReader::new(&frame[..], &verifying).read_to_end(&mut output).unwrap();
    assert_eq!(output, data);

    let mut compressed = Vec::new();
    settings.compress(&data[..], &mut compressed).unwrap();
    assert_eq!(decompress(&compressed).unwrap(), data);
}

//! Text and JSON helpers on top of the frame format.
//!
//! Strings are compressed as their UTF-8 bytes. Objects go through `serde_json`, so anything
//! that implements `Serialize` / `Deserialize` round-trips exactly as long as it has a JSON form.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::string::FromUtf8Error;
use thiserror::Error;

use crate::framed::{CompressionError, CompressionSettings, DecompressionError, DecompressionSettings};

#[derive(Error, Debug)]
pub enum ConvenienceError {
    #[error("value cannot be represented as JSON: {0}")]
    InvalidInputType(String),
    #[error("decompressed data is not valid UTF-8")]
    InvalidUtf8(#[from] FromUtf8Error),
    #[error("decompressed data is not the expected JSON")]
    Json(#[from] serde_json::Error),
    #[error("compression failed")]
    Compression(#[from] CompressionError),
    #[error("decompression failed")]
    Decompression(#[from] DecompressionError),
}

pub fn compress_string(text: &str, settings: &CompressionSettings<'_>) -> Result<Vec<u8>, ConvenienceError> {
    Ok(settings.compress_to_vec(text.as_bytes())?)
}

pub fn decompress_string(input: &[u8], settings: &DecompressionSettings<'_>) -> Result<String, ConvenienceError> {
    Ok(String::from_utf8(settings.decompress(input)?)?)
}

/// Serialize `value` to JSON and compress it.
///
/// Values `serde_json` refuses (maps with non-string keys, failing `Serialize` impls) are reported
/// as [`ConvenienceError::InvalidInputType`] instead of being written in some lossy form.
pub fn compress_object<T>(value: &T, settings: &CompressionSettings<'_>) -> Result<Vec<u8>, ConvenienceError>
where
    T: Serialize + ?Sized,
{
    let json = serde_json::to_vec(value).map_err(|e| ConvenienceError::InvalidInputType(e.to_string()))?;
    Ok(settings.compress_to_vec(&json)?)
}

pub fn decompress_object<T: DeserializeOwned>(input: &[u8], settings: &DecompressionSettings<'_>) -> Result<T, ConvenienceError> {
    let json = settings.decompress(input)?;
    Ok(serde_json::from_slice(&json)?)
}

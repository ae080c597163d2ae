//! Reusable compression dictionaries.

use std::fmt;

use crate::framed::WINDOW_SIZE;
use crate::raw::HashTable;
use crate::xxhash::xxh32;

/// A dictionary is essentially a constant slice of bytes shared by the compressing and decompressing party.
/// Using a dictionary can improve compression ratios for small inputs, because the compressor can reference
/// data from the dictionary.
///
/// Only the trailing 64 KiB of the bytes you give it are kept, since LZ4 cannot reference anything further back.
/// Building a `Dictionary` hashes that window once, so compressing many inputs with the same dictionary
/// does not pay that cost on every call.
#[derive(Clone)]
pub struct Dictionary {
    window: Vec<u8>,
    id: u32,
    table: HashTable,
}

impl fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dictionary")
            .field("id", &format_args!("{:08x}", self.id))
            .field("len", &self.window.len())
            .finish()
    }
}

impl Dictionary {
    /// The id is derived from the content (xxHash32 of the window).
    pub fn new(data: &[u8]) -> Self {
        let window = &data[data.len().saturating_sub(WINDOW_SIZE)..];
        Self::with_id(window, xxh32(window, 0))
    }

    /// Use an application-specific id instead of the content hash.
    pub fn with_id(data: &[u8], id: u32) -> Self {
        let window = data[data.len().saturating_sub(WINDOW_SIZE)..].to_vec();
        let mut table = HashTable::new();
        table.insert_range(&window, 0, window.len());
        Dictionary { window, id, table }
    }

    /// The (at most 64 KiB) history this dictionary provides.
    pub fn window(&self) -> &[u8] {
        &self.window
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Match finder state after hashing the window. Positions are indices into [`Dictionary::window`].
    pub fn table(&self) -> &HashTable {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

impl From<&[u8]> for Dictionary {
    fn from(data: &[u8]) -> Self {
        Dictionary::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_last_window() {
        let data: Vec<u8> = (0..100_000u32).map(|i| i as u8).collect();
        let dict = Dictionary::new(&data);
        assert_eq!(dict.len(), WINDOW_SIZE);
        assert_eq!(dict.window(), &data[data.len() - WINDOW_SIZE..]);
        assert_eq!(dict.id(), xxh32(dict.window(), 0));
    }

    #[test]
    fn same_content_same_id() {
        let a = Dictionary::new(b"some shared dictionary content");
        let b = Dictionary::new(b"some shared dictionary content");
        let c = Dictionary::new(b"other content");
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_eq!(a.table(), b.table());
    }

    #[test]
    fn custom_id() {
        let dict = Dictionary::with_id(b"abc", 42);
        assert_eq!(dict.id(), 42);
        assert_eq!(dict.len(), 3);
    }

    #[test]
    fn tiny_dictionaries_leave_table_empty() {
        assert_eq!(Dictionary::new(b"abc").table(), &HashTable::new());
        assert!(Dictionary::new(b"").is_empty());
    }
}

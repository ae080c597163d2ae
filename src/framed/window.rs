use super::WINDOW_SIZE;

/// The trailing (at most) 64 KiB of decompressed data, which is all that later blocks may reference.
#[derive(Clone, Debug, Default)]
pub struct HistoryWindow {
    bytes: Vec<u8>,
}

impl HistoryWindow {
    /// A window that starts out holding the tail of `dictionary`.
    pub fn seeded(dictionary: &[u8]) -> Self {
        let mut window = HistoryWindow { bytes: Vec::with_capacity(WINDOW_SIZE) };
        window.push(dictionary);
        window
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Append freshly produced bytes, forgetting as much from the front as needed to stay within 64 KiB.
    pub fn push(&mut self, output: &[u8]) {
        let outlen = output.len();
        if outlen < WINDOW_SIZE {
            let available_bytes = self.bytes.len() + outlen;
            if let Some(surplus_bytes) = available_bytes.checked_sub(WINDOW_SIZE) {
                // remove as many bytes from front as we are replacing
                self.bytes.drain(..surplus_bytes);
            }
            self.bytes.extend_from_slice(output);
        } else {
            self.bytes.clear();
            self.bytes.extend_from_slice(&output[outlen - WINDOW_SIZE..]);
        }

        debug_assert!(self.bytes.len() <= WINDOW_SIZE);
    }

    /// Start over from `dictionary`, e.g. at the beginning of a new frame.
    pub fn reset(&mut self, dictionary: &[u8]) {
        self.bytes.clear();
        self.push(dictionary);
    }
}

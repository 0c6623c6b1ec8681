//! Obfuscated WLD string table
//!
//! Strings are XORed against a repeating 8-byte key. Applying the key twice
//! restores the input, so the same routine encodes and decodes.

/// Repeating XOR key for WLD strings
pub const XOR_KEY: [u8; 8] = [0x95, 0x3A, 0xC5, 0x2A, 0x95, 0x7A, 0x95, 0x6A];

/// XOR `bytes` against [`XOR_KEY`], starting at key position 0
#[must_use]
pub fn xor_decode(bytes: &[u8]) -> Vec<u8> {
    bytes
        .iter()
        .zip(XOR_KEY.iter().cycle())
        .map(|(b, k)| b ^ k)
        .collect()
}

/// Decode an obfuscated string field into text (one char per byte)
#[must_use]
pub fn decode_string(bytes: &[u8]) -> String {
    latin1(&xor_decode(bytes))
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Decoded string table, addressed by byte offset
#[derive(Debug, Clone, Default)]
pub struct StringTable {
    bytes: Vec<u8>,
}

impl StringTable {
    /// Build from the raw (still obfuscated) table bytes
    #[must_use]
    pub fn from_encoded(encoded: &[u8]) -> Self {
        Self {
            bytes: xor_decode(encoded),
        }
    }

    /// Re-obfuscate the table
    #[must_use]
    pub fn to_encoded(&self) -> Vec<u8> {
        xor_decode(&self.bytes)
    }

    /// Decoded table bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// String starting at `offset`, up to the next NUL
    #[must_use]
    pub fn get(&self, offset: usize) -> Option<String> {
        let tail = self.bytes.get(offset..)?;
        let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
        Some(latin1(&tail[..end]))
    }

    /// Resolve a negated string offset as stored in fragment records.
    ///
    /// Positive or out-of-range offsets yield an empty name.
    #[must_use]
    pub fn name_at(&self, negated_offset: i32) -> String {
        if negated_offset > 0 {
            return String::new();
        }
        let offset = (-i64::from(negated_offset)) as usize;
        self.get(offset).unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

use std::fmt;

/// Raw fuzzer-controlled entropy for one trial.
///
/// Equality and hashing are defined by content alone, so two sequences with
/// the same bytes are interchangeable wherever they are used as map or set
/// keys.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ByteSequence {
    bytes: Vec<u8>,
}

impl ByteSequence {
    pub fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn get(&self, index: usize) -> Option<u8> {
        self.bytes.get(index).copied()
    }

    pub fn push(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    pub fn insert(&mut self, index: usize, byte: u8) {
        self.bytes.insert(index, byte);
    }

    pub fn remove(&mut self, index: usize) -> u8 {
        self.bytes.remove(index)
    }

    pub fn truncate(&mut self, len: usize) {
        self.bytes.truncate(len);
    }

    pub fn extend_from_slice(&mut self, other: &[u8]) {
        self.bytes.extend_from_slice(other);
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }
}

impl From<Vec<u8>> for ByteSequence {
    fn from(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl AsRef<[u8]> for ByteSequence {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for ByteSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Long sequences are abbreviated; full content is rarely useful in logs.
        write!(f, "ByteSequence(len={}, ", self.bytes.len())?;
        for byte in self.bytes.iter().take(16) {
            write!(f, "{byte:02x}")?;
        }
        if self.bytes.len() > 16 {
            write!(f, "..")?;
        }
        write!(f, ")")
    }
}

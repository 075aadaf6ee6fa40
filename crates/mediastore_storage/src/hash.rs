//! Content hashing.

use sha2::{Digest, Sha256};

/// Incremental SHA-256 over a byte stream, with a running byte count.
#[derive(Debug, Clone, Default)]
pub struct ContentHasher {
    hasher: Sha256,
    size: u64,
}

impl ContentHasher {
    /// Start an empty hash.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes.
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.size += data.len() as u64;
    }

    /// Bytes fed so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Finish, returning the lowercase hex digest and the byte count.
    pub fn finish(self) -> (String, u64) {
        (format!("{:x}", self.hasher.finalize()), self.size)
    }
}

/// Compute the SHA-256 of `data` as lowercase hex.
///
/// # Examples
///
/// ```
/// use mediastore_storage::compute_hash;
///
/// assert_eq!(
///     compute_hash(b""),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
pub fn compute_hash(data: &[u8]) -> String {
    let mut hasher = ContentHasher::new();
    hasher.update(data);
    hasher.finish().0
}

use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<HashError> for std::io::Error {
    fn from(error: HashError) -> Self {
        match error {
            HashError::Io(e) => e,
        }
    }
}

/// Computes the exact-match key for one archive page.
///
/// The remote catalog's file search is keyed by SHA-1, so that is the digest
/// used here. Output is lowercase hex with no salt, so identical bytes always
/// produce the identical key.
pub struct ContentHasher;

impl ContentHasher {
    pub fn new() -> Self {
        Self
    }

    /// Hash a byte stream while reading it, without buffering the whole entry
    pub fn hash_reader<R: Read + ?Sized>(&self, reader: &mut R) -> Result<String, HashError> {
        let mut hasher = Sha1::new();
        let mut buffer = [0; 65536];

        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(hex::encode(hasher.finalize()))
    }

    pub fn hash_bytes(&self, bytes: &[u8]) -> String {
        hex::encode(Sha1::digest(bytes))
    }

    /// Hash a standalone file on disk (used for already extracted pages)
    pub fn hash_file(&self, file_path: &Path) -> Result<String, HashError> {
        let file = File::open(file_path)?;
        let mut reader = BufReader::new(file);
        self.hash_reader(&mut reader)
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

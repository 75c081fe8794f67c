use image_hasher::{HashAlg, Hasher, HasherConfig};
use thiserror::Error;

/// Bit length of the perceptual hashes produced here (8x8).
pub const HASH_BITS: u32 = 64;

#[derive(Debug, Error)]
pub enum PerceptualError {
    #[error("No image data")]
    Empty,

    #[error("Image decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// DCT mean hash ("pHash") of decoded page bytes.
pub struct PerceptualHasher {
    hasher: Hasher,
}

impl PerceptualHasher {
    pub fn new() -> Self {
        let hasher = HasherConfig::new()
            .hash_size(8, 8)
            .hash_alg(HashAlg::Mean)
            .preproc_dct()
            .to_hasher();
        Self { hasher }
    }

    /// Decode an encoded image (jpeg/png/gif/webp) and return its hash as
    /// 16 lowercase hex characters.
    pub fn hash_bytes(&self, bytes: &[u8]) -> Result<String, PerceptualError> {
        if bytes.is_empty() {
            return Err(PerceptualError::Empty);
        }
        let img = image::load_from_memory(bytes)?;
        Ok(hex::encode(self.hasher.hash_image(&img).as_bytes()))
    }
}

impl Default for PerceptualHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hamming distance between two hex-encoded hashes. `None` when either side
/// is malformed or the lengths differ.
pub fn hamming_distance(a: &str, b: &str) -> Option<u32> {
    let a = hex::decode(a).ok()?;
    let b = hex::decode(b).ok()?;
    hamming_distance_bytes(&a, &b)
}

pub fn hamming_distance_bytes(a: &[u8], b: &[u8]) -> Option<u32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    Some(a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum())
}

/// Map a distance to [0, 1], 1.0 being identical.
pub fn similarity_score(distance: u32, max_bits: u32) -> f64 {
    if max_bits == 0 {
        return 0.0;
    }
    f64::from(max_bits.saturating_sub(distance)) / f64::from(max_bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;

    fn gradient_png(width: u32, height: u32, invert: bool) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, _y| {
            let v = ((x * 255) / width.max(1)) as u8;
            let v = if invert { 255 - v } else { v };
            Rgb([v, v, v])
        });
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_hash_is_sixteen_hex_chars_and_stable() {
        let hasher = PerceptualHasher::new();
        let png = gradient_png(64, 64, false);

        let first = hasher.hash_bytes(&png).unwrap();
        let second = hasher.hash_bytes(&png).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 16);
        assert_eq!(hamming_distance(&first, &second), Some(0));
    }

    #[test]
    fn test_resized_copy_stays_close() {
        let hasher = PerceptualHasher::new();
        let small = hasher.hash_bytes(&gradient_png(64, 64, false)).unwrap();
        let large = hasher.hash_bytes(&gradient_png(256, 256, false)).unwrap();
        let inverted = hasher.hash_bytes(&gradient_png(64, 64, true)).unwrap();

        let near = hamming_distance(&small, &large).unwrap();
        let far = hamming_distance(&small, &inverted).unwrap();
        assert!(near < far, "near={} far={}", near, far);
    }

    #[test]
    fn test_garbage_bytes_fail_to_decode() {
        let hasher = PerceptualHasher::new();
        assert!(matches!(
            hasher.hash_bytes(b"not an image"),
            Err(PerceptualError::Decode(_))
        ));
        assert!(matches!(hasher.hash_bytes(&[]), Err(PerceptualError::Empty)));
    }

    #[test]
    fn test_hamming_distance() {
        assert_eq!(hamming_distance("ff00", "ff00"), Some(0));
        assert_eq!(hamming_distance("ff00", "0f00"), Some(4));
        assert_eq!(hamming_distance("ffffffffffffffff", "0000000000000000"), Some(64));
        assert_eq!(hamming_distance("ff", "ff00"), None);
        assert_eq!(hamming_distance("zz", "ff"), None);
    }

    #[test]
    fn test_similarity_score() {
        assert_eq!(similarity_score(0, HASH_BITS), 1.0);
        assert!((similarity_score(3, HASH_BITS) - 0.953125).abs() < 1e-9);
        assert_eq!(similarity_score(80, HASH_BITS), 0.0);
    }
}

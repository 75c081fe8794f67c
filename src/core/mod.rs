// Matching and deduplication core:
// - Archive fingerprinting (content hash + perceptual hash of one target page)
// - Title parsing and textual similarity
// - Match validation against remote candidate metadata
// - Two-phase duplicate clustering

pub mod archive;
pub mod duplicate;
pub mod fingerprint;
pub mod hash;
pub mod perceptual;
pub mod similarity;
pub mod title;
pub mod validator;

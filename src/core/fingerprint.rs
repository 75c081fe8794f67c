use crate::core::archive::{ArchiveError, ArchiveFile, ArchiveTools, TargetSelector};
use crate::core::duplicate::PerceptualSource;
use crate::core::hash::ContentHasher;
use crate::core::perceptual::PerceptualHasher;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Entry the hashes were taken from.
    pub entry: String,
    pub content_hash: String,
    pub perceptual_hash: Option<String>,
}

/// Produces fingerprints for archive files.
///
/// Content hashing always works; perceptual hashing can be switched off, in
/// which case [`PerceptualSource::is_available`] reports `false` and the
/// deduplication run skips its visual phase.
pub struct Fingerprinter {
    tools: ArchiveTools,
    content: ContentHasher,
    perceptual: Option<PerceptualHasher>,
}

impl Fingerprinter {
    pub fn new(tools: ArchiveTools) -> Self {
        Self {
            tools,
            content: ContentHasher::new(),
            perceptual: Some(PerceptualHasher::new()),
        }
    }

    pub fn without_perceptual(tools: ArchiveTools) -> Self {
        Self {
            tools,
            content: ContentHasher::new(),
            perceptual: None,
        }
    }

    pub fn tools(&self) -> &ArchiveTools {
        &self.tools
    }

    /// Content hash of the selected page, hashed while streaming.
    pub fn fingerprint(&self, path: &Path, selector: TargetSelector) -> Result<String, ArchiveError> {
        let archive = ArchiveFile::open(path, &self.tools)?;
        let entry = archive.target(selector)?;
        log::debug!("Hashing {} from {}", entry, path.display());

        archive.read_entry_with(entry, &self.tools, |reader| {
            Ok(self.content.hash_reader(reader)?)
        })
    }

    /// Content hash plus perceptual hash of the same page, read once.
    pub fn fingerprint_with_perceptual(
        &self,
        path: &Path,
        selector: TargetSelector,
    ) -> Result<Fingerprint, ArchiveError> {
        let archive = ArchiveFile::open(path, &self.tools)?;
        let entry = archive.target(selector)?.to_string();
        let bytes = archive.read_entry(&entry, &self.tools)?;

        Ok(Fingerprint {
            content_hash: self.content.hash_bytes(&bytes),
            perceptual_hash: self.perceptual_from_bytes(path, &bytes),
            entry,
        })
    }

    /// Perceptual hash of the cover page, `None` when anything fails.
    pub fn perceptual_hash(&self, path: &Path) -> Option<String> {
        self.perceptual.as_ref()?;

        let bytes = ArchiveFile::open(path, &self.tools)
            .and_then(|archive| {
                let entry = archive.target(TargetSelector::First)?.to_string();
                archive.read_entry(&entry, &self.tools)
            });

        match bytes {
            Ok(bytes) => self.perceptual_from_bytes(path, &bytes),
            Err(e) => {
                log::warn!("Could not read cover of {} for pHash: {}", path.display(), e);
                None
            }
        }
    }

    fn perceptual_from_bytes(&self, path: &Path, bytes: &[u8]) -> Option<String> {
        let hasher = self.perceptual.as_ref()?;
        match hasher.hash_bytes(bytes) {
            Ok(hash) => Some(hash),
            Err(e) => {
                log::warn!("pHash failed for {}: {}", path.display(), e);
                None
            }
        }
    }
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new(ArchiveTools::default())
    }
}

impl PerceptualSource for Fingerprinter {
    fn is_available(&self) -> bool {
        self.perceptual.is_some()
    }

    fn perceptual_hash(&self, path: &str) -> Option<String> {
        Fingerprinter::perceptual_hash(self, Path::new(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::archive::FingerprintStatus;
    use image::{ImageBuffer, ImageFormat, Rgb};
    use std::fs::File;
    use std::io::{Cursor, Write};
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn png(shade: u8) -> Vec<u8> {
        let img = ImageBuffer::from_fn(32, 32, |x, y| {
            let intensity = ((x + y) as u8).wrapping_add(shade);
            Rgb([intensity, intensity, intensity])
        });
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn write_book(path: &Path, pages: usize) -> Vec<Vec<u8>> {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        let mut contents = Vec::new();
        for i in 1..=pages {
            let data = png(i as u8);
            writer
                .start_file(format!("page_{:02}.png", i), SimpleFileOptions::default())
                .unwrap();
            writer.write_all(&data).unwrap();
            contents.push(data);
        }
        writer.finish().unwrap();
        contents
    }

    #[test]
    fn test_cover_hash_matches_first_page() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("book.cbz");
        let pages = write_book(&path, 3);

        let fingerprinter = Fingerprinter::default();
        let hash = fingerprinter.fingerprint(&path, TargetSelector::First).unwrap();

        assert_eq!(hash, ContentHasher::new().hash_bytes(&pages[0]));
        // Stable across calls
        assert_eq!(hash, fingerprinter.fingerprint(&path, TargetSelector::First).unwrap());
    }

    #[test]
    fn test_second_page_mode() {
        let temp_dir = TempDir::new().unwrap();
        let short = temp_dir.path().join("short.zip");
        let long = temp_dir.path().join("long.zip");
        let short_pages = write_book(&short, 4);
        let long_pages = write_book(&long, 12);

        let fingerprinter = Fingerprinter::default();
        let hasher = ContentHasher::new();

        assert_eq!(
            fingerprinter.fingerprint(&short, TargetSelector::SECOND_PAGE).unwrap(),
            hasher.hash_bytes(&short_pages[3])
        );
        assert_eq!(
            fingerprinter.fingerprint(&long, TargetSelector::SECOND_PAGE).unwrap(),
            hasher.hash_bytes(&long_pages[9])
        );
    }

    #[test]
    fn test_fingerprint_with_perceptual() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("book.zip");
        write_book(&path, 2);

        let fingerprinter = Fingerprinter::default();
        let fp = fingerprinter
            .fingerprint_with_perceptual(&path, TargetSelector::First)
            .unwrap();

        assert_eq!(fp.entry, "page_01.png");
        assert_eq!(fp.content_hash.len(), 40);
        assert_eq!(fp.perceptual_hash.as_deref().map(str::len), Some(16));
        assert_eq!(fingerprinter.perceptual_hash(&path), fp.perceptual_hash);
    }

    #[test]
    fn test_undecodable_cover_degrades_to_none() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.zip");
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        writer.start_file("001.jpg", SimpleFileOptions::default()).unwrap();
        writer.write_all(b"truncated jpeg").unwrap();
        writer.finish().unwrap();

        let fingerprinter = Fingerprinter::default();
        assert!(fingerprinter.perceptual_hash(&path).is_none());

        // The content hash is unaffected
        assert!(fingerprinter.fingerprint(&path, TargetSelector::First).is_ok());
    }

    #[test]
    fn test_disabled_perceptual() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("book.zip");
        write_book(&path, 1);

        let fingerprinter = Fingerprinter::without_perceptual(ArchiveTools::default());
        assert!(!PerceptualSource::is_available(&fingerprinter));
        assert!(fingerprinter.perceptual_hash(&path).is_none());
    }

    #[test]
    fn test_missing_archive_status() {
        let fingerprinter = Fingerprinter::default();
        let err = fingerprinter
            .fingerprint(Path::new("/nonexistent/book.zip"), TargetSelector::First)
            .unwrap_err();
        assert_eq!(err.status(), FingerprintStatus::FileError);
    }
}

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;
use thiserror::Error;
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::ZipArchive;

/// Page formats considered when picking a target image.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Container suffixes picked up when walking a library.
pub const ARCHIVE_EXTENSIONS: [&str; 6] = ["zip", "cbz", "rar", "cbr", "7z", "cb7"];

/// Position used by [`TargetSelector::SECOND_PAGE`].
pub const SECOND_PAGE_POSITION: usize = 10;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("File not found: {path}")]
    NotFound { path: String },

    #[error("Unsupported container: {path}")]
    Unsupported { path: String },

    #[error("No images found in {path}")]
    Empty { path: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] ZipError),

    #[error("External tool unavailable: {tool}")]
    ToolUnavailable { tool: String },

    #[error("{tool} could not extract {entry}")]
    ToolFailed { tool: String, entry: String },

    #[error("Extracted entry not found on disk: {entry}")]
    ExtractedEntryMissing { entry: String },
}

/// Per-file outcome of a fingerprint attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FingerprintStatus {
    Ok,
    NoImages,
    Unsupported,
    FileError,
}

impl ArchiveError {
    pub fn status(&self) -> FingerprintStatus {
        match self {
            ArchiveError::Unsupported { .. } | ArchiveError::ToolUnavailable { .. } => {
                FingerprintStatus::Unsupported
            }
            ArchiveError::Empty { .. } => FingerprintStatus::NoImages,
            ArchiveError::NotFound { .. }
            | ArchiveError::Io(_)
            | ArchiveError::Zip(_)
            | ArchiveError::ToolFailed { .. }
            | ArchiveError::ExtractedEntryMissing { .. } => FingerprintStatus::FileError,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerKind {
    Zip,
    Rar,
    SevenZip,
}

impl ContainerKind {
    /// Identify a container from its leading magic bytes.
    pub fn from_magic(header: &[u8]) -> Option<Self> {
        if header.starts_with(b"PK\x03\x04") || header.starts_with(b"PK\x05\x06") {
            Some(ContainerKind::Zip)
        } else if header.starts_with(b"Rar!\x1a\x07") {
            Some(ContainerKind::Rar)
        } else if header.starts_with(b"7z\xbc\xaf\x27\x1c") {
            Some(ContainerKind::SevenZip)
        } else {
            None
        }
    }

    pub fn detect(path: &Path) -> Result<Option<Self>, io::Error> {
        let mut header = Vec::with_capacity(8);
        File::open(path)?.take(8).read_to_end(&mut header)?;
        Ok(Self::from_magic(&header))
    }

    /// Whether a single entry can be read as a stream straight out of the
    /// container. 7z is solid-compressed and always goes through extraction.
    pub fn supports_streaming(self) -> bool {
        match self {
            ContainerKind::Zip | ContainerKind::Rar => true,
            ContainerKind::SevenZip => false,
        }
    }
}

/// Which page of an archive gets fingerprinted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetSelector {
    /// The cover (first image).
    First,
    /// The image at the given 1-based position, or the last one if the
    /// archive is shorter.
    NthOrLast(usize),
}

impl TargetSelector {
    pub const SECOND_PAGE: TargetSelector = TargetSelector::NthOrLast(SECOND_PAGE_POSITION);

    pub fn select<'a>(&self, images: &'a [String]) -> Option<&'a str> {
        let picked = match *self {
            TargetSelector::First => images.first(),
            TargetSelector::NthOrLast(position) if position > 0 && images.len() >= position => {
                images.get(position - 1)
            }
            TargetSelector::NthOrLast(_) => images.last(),
        };
        picked.map(String::as_str)
    }
}

/// Locations of the external tools used for RAR and 7z containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveTools {
    pub unrar: PathBuf,
    pub sevenzip: PathBuf,
    /// Parent of the scratch directories used for extraction. `None` means
    /// the system temp directory.
    #[serde(default)]
    pub scratch_root: Option<PathBuf>,
}

impl Default for ArchiveTools {
    fn default() -> Self {
        Self {
            unrar: PathBuf::from("unrar"),
            sevenzip: PathBuf::from("7z"),
            scratch_root: None,
        }
    }
}

impl ArchiveTools {
    fn scratch_dir(&self) -> io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("comicsift-");
        match &self.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
    }
}

/// Reason an entry could not be streamed directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFailure {
    /// Compression method not built into the zip reader.
    UnsupportedMethod,
    /// Entry is password protected.
    Encrypted,
    /// The external tool refused to print the entry.
    ToolRejected,
}

enum Streamed<T> {
    Done(T),
    Unavailable(StreamFailure),
}

/// An opened container with its image listing in selection order.
#[derive(Debug, Clone)]
pub struct ArchiveFile {
    pub path: PathBuf,
    pub kind: ContainerKind,
    pub images: Vec<String>,
}

impl ArchiveFile {
    pub fn open(path: &Path, tools: &ArchiveTools) -> Result<Self, ArchiveError> {
        if !path.exists() {
            return Err(ArchiveError::NotFound {
                path: path.display().to_string(),
            });
        }

        let kind = ContainerKind::detect(path)?.ok_or_else(|| ArchiveError::Unsupported {
            path: path.display().to_string(),
        })?;

        let names = match kind {
            ContainerKind::Zip => list_zip(path)?,
            ContainerKind::Rar => list_rar(path, tools)?,
            ContainerKind::SevenZip => list_sevenzip(path, tools)?,
        };

        Ok(Self {
            path: path.to_path_buf(),
            kind,
            images: sort_images(names),
        })
    }

    /// Resolve the entry name a selector points to.
    pub fn target(&self, selector: TargetSelector) -> Result<&str, ArchiveError> {
        selector.select(&self.images).ok_or_else(|| ArchiveError::Empty {
            path: self.path.display().to_string(),
        })
    }

    /// Run `consume` over the bytes of one entry.
    ///
    /// Streams directly from the container when the kind supports it and
    /// only falls back to a scratch extraction when the stream reports a
    /// typed [`StreamFailure`]. The scratch directory is removed on every
    /// exit path.
    pub fn read_entry_with<T, F>(
        &self,
        entry: &str,
        tools: &ArchiveTools,
        mut consume: F,
    ) -> Result<T, ArchiveError>
    where
        F: FnMut(&mut dyn Read) -> io::Result<T>,
    {
        if self.kind.supports_streaming() {
            let streamed = if self.kind == ContainerKind::Zip {
                self.stream_zip(entry, &mut consume)?
            } else {
                self.stream_rar(entry, tools, &mut consume)?
            };
            match streamed {
                Streamed::Done(value) => return Ok(value),
                Streamed::Unavailable(reason) => {
                    log::debug!(
                        "Streaming {} from {} unavailable ({:?}), extracting instead",
                        entry,
                        self.path.display(),
                        reason
                    );
                }
            }
        }

        self.extract_with(entry, tools, &mut consume)
    }

    /// Read a whole entry into memory.
    pub fn read_entry(&self, entry: &str, tools: &ArchiveTools) -> Result<Vec<u8>, ArchiveError> {
        self.read_entry_with(entry, tools, |reader| {
            let mut bytes = Vec::new();
            reader.read_to_end(&mut bytes)?;
            Ok(bytes)
        })
    }

    fn stream_zip<T, F>(&self, entry: &str, consume: &mut F) -> Result<Streamed<T>, ArchiveError>
    where
        F: FnMut(&mut dyn Read) -> io::Result<T>,
    {
        let file = File::open(&self.path)?;
        let mut archive = ZipArchive::new(BufReader::new(file))?;
        let mut zipped = match archive.by_name(entry) {
            Ok(zipped) => zipped,
            Err(ZipError::UnsupportedArchive(_)) => {
                return Ok(Streamed::Unavailable(StreamFailure::UnsupportedMethod));
            }
            Err(ZipError::InvalidPassword) => {
                return Ok(Streamed::Unavailable(StreamFailure::Encrypted));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Streamed::Done(consume(&mut zipped)?))
    }

    fn stream_rar<T, F>(
        &self,
        entry: &str,
        tools: &ArchiveTools,
        consume: &mut F,
    ) -> Result<Streamed<T>, ArchiveError>
    where
        F: FnMut(&mut dyn Read) -> io::Result<T>,
    {
        let mut child = Command::new(&tools.unrar)
            .args(unrar_print_args(&self.path, entry))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| tool_error(&tools.unrar, e))?;

        let Some(mut stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(Streamed::Unavailable(StreamFailure::ToolRejected));
        };

        let consumed = consume(&mut stdout);
        drop(stdout);
        let status = child.wait()?;

        if !status.success() {
            return Ok(Streamed::Unavailable(StreamFailure::ToolRejected));
        }
        Ok(Streamed::Done(consumed?))
    }

    fn extract_with<T, F>(
        &self,
        entry: &str,
        tools: &ArchiveTools,
        consume: &mut F,
    ) -> Result<T, ArchiveError>
    where
        F: FnMut(&mut dyn Read) -> io::Result<T>,
    {
        let scratch = tools.scratch_dir()?;

        let status = Command::new(&tools.sevenzip)
            .args(sevenzip_extract_args(&self.path, scratch.path(), entry))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| tool_error(&tools.sevenzip, e))?;

        if !status.success() {
            return Err(ArchiveError::ToolFailed {
                tool: tools.sevenzip.display().to_string(),
                entry: entry.to_string(),
            });
        }

        let extracted = locate_extracted(scratch.path(), entry)?;
        let mut reader = BufReader::new(File::open(&extracted)?);
        Ok(consume(&mut reader)?)
    }
}

/// `unrar p` arguments. Switches end at `--`, so entry names starting with
/// `-` or `@` stay file names.
fn unrar_print_args(archive: &Path, entry: &str) -> Vec<OsString> {
    vec![
        OsString::from("p"),
        OsString::from("-inul"),
        OsString::from("-p-"),
        OsString::from("--"),
        archive.as_os_str().to_os_string(),
        OsString::from(entry),
    ]
}

fn sevenzip_extract_args(archive: &Path, output: &Path, entry: &str) -> Vec<OsString> {
    let mut output_flag = OsString::from("-o");
    output_flag.push(output);
    vec![
        OsString::from("x"),
        output_flag,
        OsString::from("-y"),
        OsString::from("-bso0"),
        OsString::from("-bsp0"),
        OsString::from("--"),
        archive.as_os_str().to_os_string(),
        OsString::from(entry),
    ]
}

pub fn is_image_entry(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Filter to images and sort case-insensitively. Selection is positional,
/// so the raw name breaks ties to keep the order total.
pub fn sort_images(names: Vec<String>) -> Vec<String> {
    let mut images: Vec<String> = names
        .into_iter()
        .filter(|name| !name.ends_with('/') && is_image_entry(name))
        .collect();
    images.sort_by(|a, b| {
        a.to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b))
    });
    images
}

fn list_zip(path: &Path) -> Result<Vec<String>, ArchiveError> {
    let file = File::open(path)?;
    let archive = ZipArchive::new(BufReader::new(file))?;
    Ok(archive.file_names().map(String::from).collect())
}

fn list_rar(path: &Path, tools: &ArchiveTools) -> Result<Vec<String>, ArchiveError> {
    let mut command = Command::new(&tools.unrar);
    command.arg("lb").arg("-p-").arg("--").arg(path);
    let listing = capture_stdout(command, &tools.unrar)?;
    Ok(listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

fn list_sevenzip(path: &Path, tools: &ArchiveTools) -> Result<Vec<String>, ArchiveError> {
    let mut command = Command::new(&tools.sevenzip);
    command.arg("l").arg("-slt").arg("-ba").arg("--").arg(path);
    let listing = capture_stdout(command, &tools.sevenzip)?;
    Ok(parse_technical_listing(&listing))
}

/// Parse `7z l -slt` output into file entry names, skipping folders.
pub fn parse_technical_listing(listing: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut current: Option<String> = None;
    let mut is_dir = false;

    for line in listing.lines() {
        let line = line.trim_end();
        if let Some(name) = line.strip_prefix("Path = ") {
            if let Some(previous) = current.take() {
                if !is_dir {
                    names.push(previous);
                }
            }
            current = Some(name.to_string());
            is_dir = false;
        } else if line == "Folder = +" {
            is_dir = true;
        } else if let Some(attributes) = line.strip_prefix("Attributes = ") {
            if attributes.starts_with('D') {
                is_dir = true;
            }
        }
    }

    if let Some(previous) = current {
        if !is_dir {
            names.push(previous);
        }
    }
    names
}

fn capture_stdout(mut command: Command, tool: &Path) -> Result<String, ArchiveError> {
    let output = command
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| tool_error(tool, e))?;

    if !output.status.success() {
        return Err(ArchiveError::ToolFailed {
            tool: tool.display().to_string(),
            entry: "<listing>".to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn tool_error(tool: &Path, error: io::Error) -> ArchiveError {
    if error.kind() == io::ErrorKind::NotFound {
        ArchiveError::ToolUnavailable {
            tool: tool.display().to_string(),
        }
    } else {
        ArchiveError::Io(error)
    }
}

fn locate_extracted(root: &Path, entry: &str) -> Result<PathBuf, ArchiveError> {
    let direct = root.join(entry);
    if direct.is_file() {
        return Ok(direct);
    }

    let wanted = Path::new(entry).file_name();
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_file() && Some(e.file_name()) == wanted)
        .map(|e| e.into_path())
        .ok_or_else(|| ArchiveError::ExtractedEntryMissing {
            entry: entry.to_string(),
        })
}

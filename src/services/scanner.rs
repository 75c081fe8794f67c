use crate::core::archive::{FingerprintStatus, TargetSelector};
use crate::core::fingerprint::Fingerprinter;
use crate::core::title::parse_title;
use crate::core::validator::{strip_archive_extension, MatchMode, NoTranslation, TagTranslate};
use crate::database::models::ScanStatus;
use crate::database::{DatabaseError, Storage};
use crate::services::remote::{CatalogClient, HashScope, RemoteError, SearchOutcome};
use crate::services::result_handler::ResultHandler;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use walkdir::WalkDir;

/// Longest single sleep while waiting between requests.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Remote service blocked the batch: {0}")]
    Blocked(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanMode {
    /// Hash the cover, search covers only.
    #[default]
    Cover,
    /// Hash the tenth page (or the last), search all pages.
    Second,
    /// Search by the parsed title, validate strictly.
    Title,
}

impl ScanMode {
    pub fn selector(self) -> TargetSelector {
        match self {
            ScanMode::Second => TargetSelector::SECOND_PAGE,
            ScanMode::Cover | ScanMode::Title => TargetSelector::First,
        }
    }

    pub fn scope(self) -> HashScope {
        match self {
            ScanMode::Second => HashScope::AllPages,
            ScanMode::Cover | ScanMode::Title => HashScope::CoversOnly,
        }
    }

    pub fn match_mode(self) -> MatchMode {
        match self {
            ScanMode::Title => MatchMode::Strict,
            ScanMode::Cover | ScanMode::Second => MatchMode::Fuzzy,
        }
    }
}

impl FromStr for ScanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cover" => Ok(ScanMode::Cover),
            "second" => Ok(ScanMode::Second),
            "title" => Ok(ScanMode::Title),
            other => Err(format!("unknown scan mode: {}", other)),
        }
    }
}

impl From<ScanMode> for String {
    fn from(mode: ScanMode) -> Self {
        match mode {
            ScanMode::Cover => "cover".to_string(),
            ScanMode::Second => "second".to_string(),
            ScanMode::Title => "title".to_string(),
        }
    }
}

/// Random wait between remote requests, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SleepRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl SleepRange {
    pub const NONE: SleepRange = SleepRange {
        min_secs: 0.0,
        max_secs: 0.0,
    };

    pub fn sample(&self) -> Duration {
        let min = self.min_secs.max(0.0);
        let secs = if self.max_secs > min {
            rand::thread_rng().gen_range(min..=self.max_secs)
        } else {
            min
        };
        Duration::from_secs_f64(secs)
    }
}

impl Default for SleepRange {
    fn default() -> Self {
        Self {
            min_secs: 4.0,
            max_secs: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanProgress {
    pub files_processed: usize,
    pub total_files: usize,
    pub current_file: String,
    pub status: ScanStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub total: usize,
    pub processed: usize,
    pub statuses: BTreeMap<ScanStatus, usize>,
}

impl ScanSummary {
    pub fn succeeded(&self) -> usize {
        self.statuses.get(&ScanStatus::Success).copied().unwrap_or(0)
    }
}

/// Processes archives one at a time against a catalog client.
pub struct BatchScanner<C, S, T = NoTranslation> {
    client: C,
    handler: ResultHandler<S, T>,
    fingerprinter: Fingerprinter,
    mode: ScanMode,
    delay: SleepRange,
    limit: Option<usize>,
    progress_sender: Option<Sender<ScanProgress>>,
    cancellation_token: Arc<AtomicBool>,
}

impl<C: CatalogClient, S: Storage, T: TagTranslate> BatchScanner<C, S, T> {
    pub fn new(client: C, handler: ResultHandler<S, T>, fingerprinter: Fingerprinter, mode: ScanMode) -> Self {
        Self {
            client,
            handler,
            fingerprinter,
            mode,
            delay: SleepRange::default(),
            limit: None,
            progress_sender: None,
            cancellation_token: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_delay(mut self, delay: SleepRange) -> Self {
        self.delay = delay;
        self
    }

    /// Process at most `limit` files per run. Zero means no limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    pub fn with_progress_sender(mut self, sender: Sender<ScanProgress>) -> Self {
        self.progress_sender = Some(sender);
        self
    }

    pub fn get_cancellation_token(&self) -> Arc<AtomicBool> {
        self.cancellation_token.clone()
    }

    pub fn cancel_scan(&self) {
        self.cancellation_token.store(true, Ordering::Relaxed);
    }

    pub fn handler(&self) -> &ResultHandler<S, T> {
        &self.handler
    }

    pub fn into_handler(self) -> ResultHandler<S, T> {
        self.handler
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation_token.load(Ordering::Relaxed)
    }

    /// Scan `tasks` in order. Stops early on cancellation or when the remote
    /// service blocks this client; every other failure is recorded against
    /// its file and the batch moves on.
    pub fn run(&mut self, tasks: &[PathBuf]) -> Result<ScanSummary, ScanError> {
        if self.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        let tasks = match self.limit {
            Some(limit) if tasks.len() > limit => {
                log::warn!("Scan limit in effect, processing the first {} of {}", limit, tasks.len());
                &tasks[..limit]
            }
            _ => tasks,
        };

        let mut summary = ScanSummary {
            total: tasks.len(),
            ..ScanSummary::default()
        };
        log::info!("Scanning {} archives in {:?} mode", tasks.len(), self.mode);

        for (idx, path) in tasks.iter().enumerate() {
            if self.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
            if !path.exists() {
                log::warn!("File disappeared, skipping: {}", path.display());
                continue;
            }

            log::debug!("[{}/{}] {}", idx + 1, tasks.len(), path.display());
            let status = self.scan_file(path)?;

            summary.processed += 1;
            *summary.statuses.entry(status).or_insert(0) += 1;
            self.send_progress(ScanProgress {
                files_processed: idx + 1,
                total_files: tasks.len(),
                current_file: path.to_string_lossy().to_string(),
                status,
            });

            if idx + 1 < tasks.len() && !self.pause() {
                return Err(ScanError::Cancelled);
            }
        }

        log::info!(
            "Batch finished: {}/{} matched",
            summary.succeeded(),
            summary.total
        );
        Ok(summary)
    }

    /// Fingerprint or title lookup, remote search, validation and storage
    /// for one file.
    pub fn scan_file(&mut self, path: &Path) -> Result<ScanStatus, ScanError> {
        let path_str = path.to_string_lossy().to_string();

        let search = match self.mode {
            ScanMode::Title => {
                let keyword = title_keyword(path);
                log::debug!("Keyword search: {}", keyword);
                self.client.search_by_keyword(&keyword)
            }
            ScanMode::Cover | ScanMode::Second => {
                match self.fingerprinter.fingerprint(path, self.mode.selector()) {
                    Ok(hash) => self.client.search_by_hash(&hash, self.mode.scope()),
                    Err(e) => {
                        log::warn!("Could not fingerprint {}: {}", path.display(), e);
                        let status = failure_status(e.status());
                        return Ok(self.handler.handle_failure(&path_str, status, None)?);
                    }
                }
            }
        };

        match search {
            Ok(SearchOutcome::Found(url)) => match self.client.fetch_metadata(&url) {
                Ok(metadata) => Ok(self.handler.handle_match(
                    &path_str,
                    &url,
                    metadata.as_ref(),
                    self.mode.match_mode(),
                )?),
                Err(e) => self.remote_failure(&path_str, e, Some(&url)),
            },
            Ok(SearchOutcome::NoMatch) => Ok(self.handler.handle_no_match(&path_str)?),
            Err(e) => self.remote_failure(&path_str, e, None),
        }
    }

    fn remote_failure(
        &mut self,
        path: &str,
        error: RemoteError,
        url: Option<&str>,
    ) -> Result<ScanStatus, ScanError> {
        match error {
            RemoteError::Blocked(reason) => {
                log::error!("Remote service blocked this client, stopping: {}", reason);
                Err(ScanError::Blocked(reason))
            }
            RemoteError::Transient(reason) => {
                log::warn!("Network failure for {}: {}", path, reason);
                Ok(self.handler.handle_failure(path, ScanStatus::NetworkFail, url)?)
            }
            RemoteError::Malformed(reason) => {
                log::warn!("Unusable metadata for {}: {}", path, reason);
                Ok(self.handler.handle_failure(path, ScanStatus::ValidationError, url)?)
            }
        }
    }

    /// Wait a random delay in short slices. Returns `false` if cancelled
    /// while waiting.
    fn pause(&self) -> bool {
        let deadline = Instant::now() + self.delay.sample();
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }

    fn send_progress(&self, progress: ScanProgress) {
        if let Some(sender) = &self.progress_sender {
            let _ = sender.send(progress);
        }
    }
}

fn failure_status(status: FingerprintStatus) -> ScanStatus {
    match status {
        FingerprintStatus::NoImages => ScanStatus::NoImages,
        FingerprintStatus::Unsupported => ScanStatus::Unsupported,
        FingerprintStatus::FileError => ScanStatus::FileError,
        FingerprintStatus::Ok => ScanStatus::Error,
    }
}

/// Search keyword for title mode: the parsed core title, or the whole stem
/// when the core is too short to search for.
pub fn title_keyword(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let stem = strip_archive_extension(&file_name);
    match parse_title(stem).core_title {
        Some(core) if core.chars().count() >= 2 => core,
        _ => stem.trim().to_string(),
    }
}

/// Archives under `root` with one of `extensions` that are not in
/// `processed`, sorted by path.
pub fn discover_archives(root: &Path, extensions: &[String], processed: &HashSet<String>) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
                .unwrap_or(false)
        })
        .filter(|path| !processed.contains(path.to_string_lossy().as_ref()))
        .collect();

    found.sort();
    found
}

/// Stored records whose status is in `statuses`, for a retry batch.
pub fn retry_targets<S: Storage + ?Sized>(store: &S, statuses: &[ScanStatus]) -> Result<Vec<PathBuf>, DatabaseError> {
    Ok(store
        .list_by_status(&|status| statuses.contains(&status))?
        .into_iter()
        .map(|record| PathBuf::from(record.path))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hash::ContentHasher;
    use crate::core::validator::{CandidateMatch, MatchValidator, DEFAULT_SIMILARITY_THRESHOLD};
    use crate::database::SqliteStore;
    use crate::services::remote::FixtureCatalog;
    use image::{ImageBuffer, ImageFormat, Rgb};
    use std::cell::Cell;
    use std::fs::{self, File};
    use std::io::{Cursor, Write};
    use std::sync::mpsc;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn png(shade: u8) -> Vec<u8> {
        let img = ImageBuffer::from_fn(16, 16, |x, y| {
            let v = ((x * 7 + y * 3) as u8).wrapping_add(shade);
            Rgb([v, v, v])
        });
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    /// Write a one-page book and return the content hash of its cover
    fn write_book(path: &Path, shade: u8) -> String {
        let cover = png(shade);
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        writer.start_file("001.png", SimpleFileOptions::default()).unwrap();
        writer.write_all(&cover).unwrap();
        writer.finish().unwrap();
        ContentHasher::new().hash_bytes(&cover)
    }

    fn meta(title: &str) -> CandidateMatch {
        CandidateMatch {
            primary_title: Some(title.to_string()),
            ..CandidateMatch::default()
        }
    }

    fn scanner<C: CatalogClient>(client: C, mode: ScanMode) -> BatchScanner<C, SqliteStore> {
        let handler = ResultHandler::new(
            SqliteStore::open_in_memory().unwrap(),
            MatchValidator::untranslated(DEFAULT_SIMILARITY_THRESHOLD),
        );
        BatchScanner::new(client, handler, Fingerprinter::default(), mode).with_delay(SleepRange::NONE)
    }

    fn status_of<C: CatalogClient>(scanner: &BatchScanner<C, SqliteStore>, path: &Path) -> Option<ScanStatus> {
        scanner
            .handler()
            .store()
            .get_by_path(&path.to_string_lossy())
            .unwrap()
            .map(|r| r.status)
    }

    /// Delegates to a fixture but reports a block from the n-th search on.
    struct BlockFrom<'a> {
        inner: &'a FixtureCatalog,
        searches: Cell<usize>,
        block_at: usize,
    }

    impl CatalogClient for BlockFrom<'_> {
        fn search_by_hash(&self, hash: &str, scope: HashScope) -> Result<SearchOutcome, RemoteError> {
            let n = self.searches.get() + 1;
            self.searches.set(n);
            if n >= self.block_at {
                return Err(RemoteError::Blocked("rate limited".to_string()));
            }
            self.inner.search_by_hash(hash, scope)
        }

        fn search_by_keyword(&self, keyword: &str) -> Result<SearchOutcome, RemoteError> {
            self.inner.search_by_keyword(keyword)
        }

        fn fetch_metadata(&self, url: &str) -> Result<Option<CandidateMatch>, RemoteError> {
            self.inner.fetch_metadata(url)
        }
    }

    #[test]
    fn test_cover_scan_records_each_outcome() {
        let temp_dir = TempDir::new().unwrap();
        let matched = temp_dir.path().join("[Circle] Core Title.zip");
        let mismatched = temp_dir.path().join("Zzz.zip");
        let unknown = temp_dir.path().join("Nothing Here.zip");
        let broken = temp_dir.path().join("broken.zip");

        let catalog = FixtureCatalog::default()
            .with_hash(&write_book(&matched, 1), "https://catalog.example/g/1/")
            .with_hash(&write_book(&mismatched, 2), "https://catalog.example/g/2/")
            .with_gallery("https://catalog.example/g/1/", meta("Core Title"))
            .with_gallery("https://catalog.example/g/2/", meta("Qwerty"));
        write_book(&unknown, 3);
        fs::write(&broken, b"plain text").unwrap();

        let mut scanner = scanner(catalog, ScanMode::Cover);
        let tasks = vec![matched.clone(), mismatched.clone(), unknown.clone(), broken.clone()];
        let summary = scanner.run(&tasks).unwrap();

        assert_eq!(summary.processed, 4);
        assert_eq!(summary.succeeded(), 1);
        assert_eq!(status_of(&scanner, &matched), Some(ScanStatus::Success));
        assert_eq!(status_of(&scanner, &mismatched), Some(ScanStatus::Mismatch));
        assert_eq!(status_of(&scanner, &unknown), Some(ScanStatus::NoMatch));
        assert_eq!(status_of(&scanner, &broken), Some(ScanStatus::Unsupported));
    }

    #[test]
    fn test_title_mode_uses_keyword_and_strict_check() {
        let temp_dir = TempDir::new().unwrap();
        let exact = temp_dir.path().join("Core Title.cbz");
        let loose = temp_dir.path().join("Core Title v2.cbz");
        write_book(&exact, 1);
        write_book(&loose, 2);

        let catalog = FixtureCatalog::default()
            .with_keyword("Core Title", "https://catalog.example/g/1/")
            .with_keyword("Core Title v2", "https://catalog.example/g/1/")
            .with_gallery("https://catalog.example/g/1/", meta("(C99) [Circle] Core Title [English]"));

        let mut scanner = scanner(catalog, ScanMode::Title);
        scanner.run(&[exact.clone(), loose.clone()]).unwrap();

        assert_eq!(status_of(&scanner, &exact), Some(ScanStatus::Success));
        // Fuzzy would accept this, strict does not
        assert_eq!(status_of(&scanner, &loose), Some(ScanStatus::Mismatch));
    }

    #[test]
    fn test_blocked_remote_halts_batch() {
        let temp_dir = TempDir::new().unwrap();
        let paths: Vec<PathBuf> = (0..3)
            .map(|i| {
                let path = temp_dir.path().join(format!("book_{}.zip", i));
                write_book(&path, i as u8);
                path
            })
            .collect();

        let fixture = FixtureCatalog::default();
        let client = BlockFrom {
            inner: &fixture,
            searches: Cell::new(0),
            block_at: 2,
        };
        let mut scanner = scanner(client, ScanMode::Cover);

        assert!(matches!(scanner.run(&paths), Err(ScanError::Blocked(_))));
        assert_eq!(status_of(&scanner, &paths[0]), Some(ScanStatus::NoMatch));
        assert_eq!(status_of(&scanner, &paths[1]), None);
        assert_eq!(status_of(&scanner, &paths[2]), None);
    }

    #[test]
    fn test_transient_failure_is_recorded_and_skipped() {
        struct Flaky;
        impl CatalogClient for Flaky {
            fn search_by_hash(&self, _: &str, _: HashScope) -> Result<SearchOutcome, RemoteError> {
                Err(RemoteError::Transient("timeout".to_string()))
            }
            fn search_by_keyword(&self, _: &str) -> Result<SearchOutcome, RemoteError> {
                Ok(SearchOutcome::Found("https://catalog.example/g/5/".to_string()))
            }
            fn fetch_metadata(&self, _: &str) -> Result<Option<CandidateMatch>, RemoteError> {
                Err(RemoteError::Malformed("missing title".to_string()))
            }
        }

        let temp_dir = TempDir::new().unwrap();
        let first = temp_dir.path().join("a.zip");
        let second = temp_dir.path().join("b.zip");
        write_book(&first, 1);
        write_book(&second, 2);

        let mut scanner = scanner(Flaky, ScanMode::Cover);
        let summary = scanner.run(&[first.clone(), second.clone()]).unwrap();
        assert_eq!(summary.statuses.get(&ScanStatus::NetworkFail), Some(&2));

        let mut scanner = self::scanner(Flaky, ScanMode::Title);
        scanner.run(std::slice::from_ref(&first)).unwrap();
        let record = scanner
            .handler()
            .store()
            .get_by_path(&first.to_string_lossy())
            .unwrap()
            .unwrap();
        assert_eq!(record.status, ScanStatus::ValidationError);
        assert_eq!(record.canonical_url.as_deref(), Some("https://catalog.example/g/5/"));
    }

    #[test]
    fn test_cancellation_before_start() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.zip");
        write_book(&path, 1);

        let mut scanner = scanner(FixtureCatalog::default(), ScanMode::Cover);
        scanner.cancel_scan();

        assert!(matches!(scanner.run(&[path.clone()]), Err(ScanError::Cancelled)));
        assert_eq!(status_of(&scanner, &path), None);
    }

    #[test]
    fn test_cancellation_interrupts_wait() {
        let temp_dir = TempDir::new().unwrap();
        let first = temp_dir.path().join("a.zip");
        let second = temp_dir.path().join("b.zip");
        write_book(&first, 1);
        write_book(&second, 2);

        let mut scanner = scanner(FixtureCatalog::default(), ScanMode::Cover).with_delay(SleepRange {
            min_secs: 30.0,
            max_secs: 30.0,
        });
        let token = scanner.get_cancellation_token();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            token.store(true, Ordering::Relaxed);
        });

        let started = Instant::now();
        let result = scanner.run(&[first.clone(), second.clone()]);
        canceller.join().unwrap();

        assert!(matches!(result, Err(ScanError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(status_of(&scanner, &first), Some(ScanStatus::NoMatch));
        assert_eq!(status_of(&scanner, &second), None);
    }

    #[test]
    fn test_progress_and_limit() {
        let temp_dir = TempDir::new().unwrap();
        let paths: Vec<PathBuf> = (0..3)
            .map(|i| {
                let path = temp_dir.path().join(format!("book_{}.zip", i));
                write_book(&path, i as u8);
                path
            })
            .collect();

        let (tx, rx) = mpsc::channel();
        let mut scanner = scanner(FixtureCatalog::default(), ScanMode::Second)
            .with_limit(2)
            .with_progress_sender(tx);
        let summary = scanner.run(&paths).unwrap();

        assert_eq!(summary.total, 2);
        let events: Vec<ScanProgress> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].files_processed, 2);
        assert_eq!(events[1].total_files, 2);
        assert_eq!(events[0].status, ScanStatus::NoMatch);
    }

    #[test]
    fn test_discover_archives() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("series");
        fs::create_dir_all(&nested).unwrap();
        for name in ["b.zip", "a.CBZ", "notes.txt", "series/c.rar", "series/d.7z"] {
            fs::write(temp_dir.path().join(name), b"x").unwrap();
        }

        let extensions: Vec<String> = ["zip", "cbz", "rar"].iter().map(|s| s.to_string()).collect();
        let mut processed = HashSet::new();
        processed.insert(temp_dir.path().join("b.zip").to_string_lossy().to_string());

        let found = discover_archives(temp_dir.path(), &extensions, &processed);
        assert_eq!(
            found,
            vec![temp_dir.path().join("a.CBZ"), nested.join("c.rar")]
        );
    }

    #[test]
    fn test_retry_targets() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.save("/lib/a.zip", ScanStatus::NetworkFail, None, None, None).unwrap();
        store.save("/lib/b.zip", ScanStatus::Success, None, None, None).unwrap();
        store.save("/lib/c.zip", ScanStatus::Error, None, None, None).unwrap();

        let targets = retry_targets(&store, &[ScanStatus::NetworkFail, ScanStatus::Error]).unwrap();
        assert_eq!(targets, vec![PathBuf::from("/lib/a.zip"), PathBuf::from("/lib/c.zip")]);
    }

    #[test]
    fn test_title_keyword_and_modes() {
        assert_eq!(title_keyword(Path::new("/lib/(C99) [Circle] Core Title [English].zip")), "Core Title");
        assert_eq!(title_keyword(Path::new("/lib/[Circle] X.zip")), "[Circle] X");
        assert_eq!("Second".parse::<ScanMode>(), Ok(ScanMode::Second));
        assert!("sideways".parse::<ScanMode>().is_err());
        assert_eq!(ScanMode::Second.selector(), TargetSelector::NthOrLast(10));
        assert_eq!(ScanMode::Title.match_mode(), MatchMode::Strict);
    }
}

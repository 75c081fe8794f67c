use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use comicsift::config::AppConfig;
use comicsift::core::duplicate::DeduplicationEngine;
use comicsift::core::fingerprint::Fingerprinter;
use comicsift::core::similarity::{hybrid_similarity, raw_similarity, token_similarity};
use comicsift::core::title::parse_title;
use comicsift::core::validator::{CandidateMatch, MatchMode, MatchValidator};
use comicsift::database::models::{ScanRecord, ScanStatus};
use comicsift::database::{SqliteStore, Storage};
use comicsift::services::scanner::{discover_archives, retry_targets};
use comicsift::services::{
    run_deduplication, BatchScanner, FixtureCatalog, ResultHandler, ScanError, ScanMode,
    ScanProgress, ScanSummary, SleepRange, TagTranslator,
};
use dialoguer::{Confirm, Select};
use indicatif::{ProgressBar, ProgressStyle};
use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "comicsift", version, about = "Match comic archives against a catalog and find duplicates")]
struct Cli {
    /// Config file (default: the user config directory)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Database file, overrides the config
    #[arg(long, global = true, value_name = "FILE")]
    database: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the content hash of an archive's target page
    Fingerprint {
        #[arg(value_name = "ARCHIVE")]
        path: PathBuf,
        /// Page selection: cover or second
        #[arg(short, long)]
        mode: Option<ScanMode>,
        /// Also print the perceptual hash
        #[arg(long)]
        perceptual: bool,
    },

    /// Break a release name into its parts
    Parse { title: String },

    /// Compare two strings with the title similarity measures
    Similarity { a: String, b: String },

    /// Check a file name against candidate metadata
    Validate {
        /// File name or path of the local archive
        name: String,
        /// JSON file holding the candidate metadata
        #[arg(long, value_name = "FILE")]
        metadata: PathBuf,
        /// Compare against full titles only
        #[arg(long)]
        strict: bool,
    },

    /// List archives under a directory that have no stored result yet
    Pending {
        #[arg(value_name = "DIR")]
        path: PathBuf,
    },

    /// Scan archives against a recorded catalog
    Scan {
        /// Directory to scan (not needed with --retry)
        #[arg(value_name = "DIR", required_unless_present = "retry")]
        path: Option<PathBuf>,
        /// Recorded catalog responses (JSON)
        #[arg(long, value_name = "FILE")]
        catalog: PathBuf,
        #[arg(short, long)]
        mode: Option<ScanMode>,
        /// Rescan records with a retryable failure instead of new files
        #[arg(long, conflicts_with = "path")]
        retry: bool,
        /// Stop after this many files (0: no limit)
        #[arg(long)]
        limit: Option<usize>,
        /// Do not wait between requests
        #[arg(long)]
        no_delay: bool,
    },

    /// Rebuild duplicate groups from confirmed matches
    Dedup {
        /// Skip the visual phase
        #[arg(long)]
        no_phash: bool,
    },

    /// Show the stored duplicate groups
    Groups,

    /// Count stored records per status
    Stats,

    /// Go through possible mismatches by hand
    Review,

    /// Remove records whose archive no longer exists
    Prune {
        /// Only show what would be removed
        #[arg(long)]
        dry_run: bool,
    },

    /// Restore the database from the backup taken before the last scan
    Rollback {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Print the effective configuration
    Config {
        /// Write the defaults to the config file if it does not exist
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    init_logging(cli.verbose, config.log_file.as_deref())?;

    match cli.command {
        Commands::Fingerprint {
            path,
            mode,
            perceptual,
        } => {
            let mode = mode.unwrap_or(config.default_mode);
            let fingerprinter = Fingerprinter::new(config.archive_tools());
            if perceptual {
                let fp = fingerprinter
                    .fingerprint_with_perceptual(&path, mode.selector())
                    .with_context(|| format!("Failed to fingerprint {}", path.display()))?;
                println!("▶ {}", fp.entry);
                println!("  sha1:  {}", fp.content_hash);
                println!("  phash: {}", fp.perceptual_hash.as_deref().unwrap_or("-"));
            } else {
                let hash = fingerprinter
                    .fingerprint(&path, mode.selector())
                    .with_context(|| format!("Failed to fingerprint {}", path.display()))?;
                println!("{}", hash);
            }
        }

        Commands::Parse { title } => {
            let parsed = parse_title(&title);
            let show = |label: &str, value: &Option<String>| {
                println!("  {:<12} {}", label, value.as_deref().unwrap_or("-"));
            };
            println!("▶ {}", title);
            show("event", &parsed.event);
            show("group", &parsed.group);
            show("artist", &parsed.artist);
            show("title", &parsed.core_title);
            show("parody", &parsed.parody);
            println!("  {:<12} {}", "tags", parsed.translation_tags.join(", "));
            println!("  {:<12} {}", "distribution", parsed.is_distribution);
        }

        Commands::Similarity { a, b } => {
            println!("  raw     {:.3}", raw_similarity(&a, &b));
            println!("  tokens  {:.3}", token_similarity(&a, &b));
            println!("  hybrid  {:.3}", hybrid_similarity(&a, &b));
        }

        Commands::Validate {
            name,
            metadata,
            strict,
        } => {
            let content = fs::read_to_string(&metadata)
                .with_context(|| format!("Failed to read {}", metadata.display()))?;
            let candidate: CandidateMatch = serde_json::from_str(&content)
                .with_context(|| format!("Invalid candidate metadata in {}", metadata.display()))?;
            let validator = MatchValidator::new(load_translator(&config)?, config.similarity_threshold);
            let mode = if strict { MatchMode::Strict } else { MatchMode::Fuzzy };

            let file_name = Path::new(&name)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| name.clone());
            let verdict = validator.evaluate(&file_name, Some(&candidate), mode);

            if let (true, Some(step)) = (verdict.is_match, verdict.matched_by) {
                println!("✅ Match ({:?})", step);
            } else if verdict.is_match {
                println!("✅ Match");
            } else {
                println!("⚠️  No match");
            }
            println!("  title: {}", verdict.best_title.as_deref().unwrap_or("-"));
            if !verdict.serialized_tags.is_empty() {
                println!("  tags:  {}", verdict.serialized_tags);
            }
        }

        Commands::Pending { path } => {
            let store = open_store(cli.database.as_deref(), &config)?;
            let processed = store.processed_paths()?;
            let pending = find_pending(&path, &config.archive_extensions, &processed)?;
            if pending.is_empty() {
                println!("Nothing left to scan.");
            } else {
                for file in &pending {
                    println!("▶ {}", file.display());
                }
                println!("{} archive(s) pending", pending.len());
            }
        }

        Commands::Scan {
            path,
            catalog,
            mode,
            retry,
            limit,
            no_delay,
        } => {
            let mut store = open_store(cli.database.as_deref(), &config)?;
            let tasks = if retry {
                let statuses: Vec<ScanStatus> = ScanStatus::ALL
                    .into_iter()
                    .filter(|s| s.is_retryable())
                    .collect();
                retry_targets(&store, &statuses)?
            } else {
                let Some(path) = path else {
                    bail!("A directory is required unless --retry is given");
                };
                let processed = store.processed_paths()?;
                find_pending(&path, &config.archive_extensions, &processed)?
            };

            if tasks.is_empty() {
                println!("Nothing to scan.");
                return Ok(());
            }
            if let Some(backup) = store.create_backup()? {
                println!("▶ Database backed up to {}", backup.display());
            }

            let client = FixtureCatalog::load(&catalog)
                .with_context(|| format!("Failed to load catalog {}", catalog.display()))?;
            let mode = mode.unwrap_or(config.default_mode);
            let summary = scan(&mut store, &config, client, mode, &tasks, limit, no_delay)?;

            println!(
                "✨ Processed {} of {} archive(s), {} matched",
                summary.processed,
                summary.total,
                summary.succeeded()
            );
            for (status, count) in &summary.statuses {
                println!("  {:<18} {}", status.as_str(), count);
            }
        }

        Commands::Dedup { no_phash } => {
            let mut store = open_store(cli.database.as_deref(), &config)?;
            let engine = DeduplicationEngine::new(config.dedup_settings());
            let fingerprinter = if no_phash {
                Fingerprinter::without_perceptual(config.archive_tools())
            } else {
                Fingerprinter::new(config.archive_tools())
            };

            let spinner = spinner("Clustering confirmed matches…")?;
            let start = Instant::now();
            let report = run_deduplication(&mut store, &engine, &fingerprinter)?;
            spinner.finish_with_message(format!("Done in {:.2?}", start.elapsed()));

            println!(
                "✨ {} group(s): {} by URL, {} by cover",
                report.groups.len(),
                report.exact_groups,
                report.visual_groups
            );
            if report.visual_skipped {
                println!("⚠️  Visual phase skipped, no perceptual hashes available");
            }
        }

        Commands::Groups => {
            let store = open_store(cli.database.as_deref(), &config)?;
            let groups = store.list_groups()?;
            if groups.is_empty() {
                println!("No duplicate groups stored.");
            }
            for group in &groups {
                println!("▶ {} ({})", group.group_id, String::from(group.kind));
                for member in &group.members {
                    let marker = if member.is_reference { "*" } else { " " };
                    println!("  {} {:.2} {}", marker, member.score, member.path);
                }
            }
        }

        Commands::Stats => {
            let store = open_store(cli.database.as_deref(), &config)?;
            let stats = store.statistics()?;
            let total: usize = stats.values().sum();
            for status in ScanStatus::ALL {
                let count = stats.get(&status).copied().unwrap_or(0);
                if count > 0 {
                    println!("  {:<18} {}", status.as_str(), count);
                }
            }
            println!("  {:<18} {}", "total", total);
        }

        Commands::Review => {
            let mut store = open_store(cli.database.as_deref(), &config)?;
            review(&mut store, &config)?;
        }

        Commands::Prune { dry_run } => {
            let mut store = open_store(cli.database.as_deref(), &config)?;
            let missing: Vec<ScanRecord> = store
                .list_by_status(&|_: ScanStatus| true)?
                .into_iter()
                .filter(|record| !Path::new(&record.path).exists())
                .collect();

            for record in &missing {
                if dry_run {
                    println!("[dry-run] Would remove {}", record.path);
                } else {
                    store.remove(&record.path)?;
                    println!("⚠️  Removed {}", record.path);
                }
            }
            println!("{} missing archive(s)", missing.len());
        }

        Commands::Rollback { yes } => {
            let store = open_store(cli.database.as_deref(), &config)?;
            let Some(backup) = store.backup_path().filter(|backup| backup.is_file()) else {
                bail!("No backup found for this database");
            };
            println!("▶ Backup: {}", backup.display());
            println!("⚠️  The current database will be overwritten by the backup.");

            let confirmed = yes
                || Confirm::new()
                    .with_prompt("Restore the backup?")
                    .default(false)
                    .interact()?;
            if !confirmed {
                println!("Cancelled.");
                return Ok(());
            }

            let store = store.restore_backup().context("Failed to restore backup")?;
            let total: usize = store.statistics()?.values().sum();
            println!("✅ Restored, {} record(s) in the database", total);
        }

        Commands::Config { init } => {
            let path = match cli.config.clone().or_else(AppConfig::default_path) {
                Some(path) => path,
                None => bail!("No config directory on this platform, pass --config"),
            };
            if init {
                if path.exists() {
                    println!("Config already exists at {}", path.display());
                } else {
                    config.save(&path)?;
                    println!("✅ Wrote {}", path.display());
                }
            }
            println!("# {}", path.display());
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<()> {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];

    if let Some(path) = log_file {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        loggers.push(WriteLogger::new(LevelFilter::Info.max(level), Config::default(), file));
    }

    CombinedLogger::init(loggers).context("Failed to initialize logging")?;
    Ok(())
}

fn open_store(override_path: Option<&Path>, config: &AppConfig) -> Result<SqliteStore> {
    let path = override_path.unwrap_or(&config.database_path);
    SqliteStore::open(path).with_context(|| format!("Failed to open database {}", path.display()))
}

fn load_translator(config: &AppConfig) -> Result<TagTranslator> {
    match &config.tag_database_path {
        Some(path) => TagTranslator::load(path)
            .with_context(|| format!("Failed to load tag database {}", path.display())),
        None => Ok(TagTranslator::empty()),
    }
}

fn spinner(message: &'static str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

fn find_pending(root: &Path, extensions: &[String], processed: &HashSet<String>) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        bail!("Not a directory: {}", root.display());
    }
    let spinner = spinner("Looking for archives…")?;
    let pending = discover_archives(root, extensions, processed);
    spinner.finish_and_clear();
    Ok(pending)
}

fn scan(
    store: &mut SqliteStore,
    config: &AppConfig,
    client: FixtureCatalog,
    mode: ScanMode,
    tasks: &[PathBuf],
    limit: Option<usize>,
    no_delay: bool,
) -> Result<ScanSummary> {
    let validator = MatchValidator::new(load_translator(config)?, config.similarity_threshold);
    let handler = ResultHandler::new(store, validator);
    let fingerprinter = Fingerprinter::new(config.archive_tools());
    let delay = if no_delay {
        SleepRange::NONE
    } else {
        config.sleep_range()
    };

    let (tx, rx) = mpsc::channel::<ScanProgress>();
    let mut scanner = BatchScanner::new(client, handler, fingerprinter, mode)
        .with_delay(delay)
        .with_limit(limit.unwrap_or(config.scan_limit))
        .with_progress_sender(tx);

    let bar = ProgressBar::new(tasks.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:30}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    let reporter = {
        let bar = bar.clone();
        thread::spawn(move || {
            for progress in rx {
                bar.set_length(progress.total_files as u64);
                bar.set_position(progress.files_processed as u64);
                let name = Path::new(&progress.current_file)
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or(progress.current_file);
                bar.set_message(format!("{} {}", progress.status, name));
            }
        })
    };

    let result = scanner.run(tasks);
    drop(scanner);
    let _ = reporter.join();
    bar.finish_and_clear();

    match result {
        Ok(summary) => Ok(summary),
        Err(ScanError::Blocked(reason)) => {
            bail!("Stopped: the catalog blocked this client ({}). Try again later.", reason)
        }
        Err(e) => Err(e.into()),
    }
}

fn review(store: &mut SqliteStore, config: &AppConfig) -> Result<()> {
    let pending = store.list_by_status(&|status| status == ScanStatus::Mismatch)?;
    if pending.is_empty() {
        println!("No records to review.");
        return Ok(());
    }

    let mut handler = ResultHandler::new(store, MatchValidator::untranslated(config.similarity_threshold));
    let choices = ["Confirm as match", "Mark as no match", "Skip", "Quit"];
    let mut reviewed = 0;

    for (idx, record) in pending.iter().enumerate() {
        println!();
        println!("▶ [{}/{}] {}", idx + 1, pending.len(), record.file_name);
        println!("  title: {}", record.title.as_deref().unwrap_or("-"));
        println!("  url:   {}", record.canonical_url.as_deref().unwrap_or("-"));
        if let Some(tags) = &record.tags {
            println!("  tags:  {}", tags);
        }

        let choice = Select::new()
            .with_prompt("Decision")
            .items(&choices)
            .default(2)
            .interact()?;

        match choice {
            0 => {
                handler.manual_override(
                    &record.path,
                    ScanStatus::Success,
                    record.canonical_url.as_deref(),
                    record.title.as_deref(),
                    record.tags.as_deref(),
                )?;
                reviewed += 1;
            }
            1 => {
                handler.manual_override(&record.path, ScanStatus::NoMatch, None, None, None)?;
                reviewed += 1;
            }
            2 => continue,
            _ => break,
        }
    }

    println!("✅ Reviewed {} record(s)", reviewed);
    Ok(())
}

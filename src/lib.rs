pub mod config;
pub mod core;
pub mod database;
pub mod services;

pub use crate::config::AppConfig;
pub use crate::core::archive::{ArchiveError, ContainerKind, FingerprintStatus, TargetSelector};
pub use crate::core::duplicate::{DeduplicationEngine, DuplicateGroup, DuplicateKind};
pub use crate::core::fingerprint::{Fingerprint, Fingerprinter};
pub use crate::core::title::{parse_title, ParsedTitle};
pub use crate::core::validator::{CandidateMatch, MatchMode, MatchValidator, MatchVerdict};
pub use crate::database::{DatabaseError, SqliteStore, Storage};

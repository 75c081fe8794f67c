// Batch-level services built on the core: persistence of outcomes, the
// scan loop, deduplication runs and the external collaborators they use.

pub mod dedup;
pub mod remote;
pub mod result_handler;
pub mod scanner;
pub mod translator;

pub use dedup::run_deduplication;
pub use remote::{CatalogClient, FixtureCatalog, HashScope, RemoteError, SearchOutcome};
pub use result_handler::ResultHandler;
pub use scanner::{BatchScanner, ScanError, ScanMode, ScanProgress, ScanSummary, SleepRange};
pub use translator::TagTranslator;

use crate::core::duplicate::{DedupRecord, DedupReport, DeduplicationEngine, PerceptualSource};
use crate::database::models::{ScanRecord, ScanStatus};
use crate::database::{DatabaseError, Storage};

impl From<ScanRecord> for DedupRecord {
    fn from(record: ScanRecord) -> Self {
        let tags = record.tag_list();
        Self {
            path: record.path,
            canonical_url: record.canonical_url,
            title: record.title,
            tags,
        }
    }
}

/// Rebuild the stored duplicate groups from every confirmed record.
///
/// The previous groups are replaced in one transaction, also when this
/// run finds none.
pub fn run_deduplication<S, P>(
    store: &mut S,
    engine: &DeduplicationEngine,
    source: &P,
) -> Result<DedupReport, DatabaseError>
where
    S: Storage + ?Sized,
    P: PerceptualSource + ?Sized,
{
    let records: Vec<DedupRecord> = store
        .list_by_status(&|status| status == ScanStatus::Success)?
        .into_iter()
        .map(DedupRecord::from)
        .collect();
    log::info!("Loaded {} confirmed records for deduplication", records.len());

    let report = if records.len() < 2 {
        DedupReport::default()
    } else {
        engine.run(&records, source)
    };

    store.replace_groups(&report.groups)?;
    Ok(report)
}

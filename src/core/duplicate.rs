// Duplicate detection over the confirmed part of a library.
// Phase 1 groups files that resolved to the same catalog entry.
// Phase 2 clusters the rest by cover pHash inside per-author buckets.

use crate::core::perceptual::{hamming_distance_bytes, similarity_score, HASH_BITS};
use crate::core::title::parse_title;
use crate::core::validator::strip_archive_extension;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use uuid::Uuid;

pub const DEFAULT_PHASH_THRESHOLD: u32 = 5;
pub const DEFAULT_FALLBACK_BUCKET_LIMIT: usize = 2000;

/// Anything that can produce a cover pHash for an archive path.
pub trait PerceptualSource {
    /// `false` when perceptual hashing is switched off or unsupported.
    fn is_available(&self) -> bool;
    fn perceptual_hash(&self, path: &str) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DuplicateKind {
    ExactUrl,
    Visual,
}

impl From<String> for DuplicateKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "exact_url" => DuplicateKind::ExactUrl,
            "visual" => DuplicateKind::Visual,
            _ => DuplicateKind::ExactUrl,
        }
    }
}

impl From<DuplicateKind> for String {
    fn from(kind: DuplicateKind) -> Self {
        match kind {
            DuplicateKind::ExactUrl => "exact_url".to_string(),
            DuplicateKind::Visual => "visual".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub path: String,
    pub score: f64,
    pub is_reference: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub group_id: String,
    pub kind: DuplicateKind,
    pub members: Vec<GroupMember>,
}

impl DuplicateGroup {
    pub fn reference(&self) -> Option<&GroupMember> {
        self.members.iter().find(|m| m.is_reference)
    }
}

/// One confirmed match, as loaded from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupRecord {
    pub path: String,
    pub canonical_url: Option<String>,
    pub title: Option<String>,
    pub tags: Vec<String>,
}

impl DedupRecord {
    fn file_name(&self) -> &str {
        Path::new(&self.path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DedupSettings {
    pub phash_threshold: u32,
    /// Above this size the catch-all bucket is split by first title token.
    pub fallback_bucket_limit: usize,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            phash_threshold: DEFAULT_PHASH_THRESHOLD,
            fallback_bucket_limit: DEFAULT_FALLBACK_BUCKET_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupReport {
    pub groups: Vec<DuplicateGroup>,
    pub exact_groups: usize,
    pub visual_groups: usize,
    /// Phase 2 did not run because no perceptual hashes were available.
    pub visual_skipped: bool,
}

/// pHash memo for a single run. Each path is hashed at most once, and a
/// failed hash is remembered as `None`.
pub struct PerceptualCache<'a, S: PerceptualSource + ?Sized> {
    source: &'a S,
    hashes: HashMap<String, Option<Vec<u8>>>,
}

impl<'a, S: PerceptualSource + ?Sized> PerceptualCache<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            hashes: HashMap::new(),
        }
    }

    pub fn get(&mut self, path: &str) -> Option<&[u8]> {
        let source = self.source;
        self.hashes
            .entry(path.to_string())
            .or_insert_with(|| {
                source
                    .perceptual_hash(path)
                    .and_then(|hex_hash| hex::decode(hex_hash).ok())
            })
            .as_deref()
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

/// Disjoint sets with union by rank and path compression.
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    pub fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return false;
        }
        match self.rank[root_a].cmp(&self.rank[root_b]) {
            std::cmp::Ordering::Less => self.parent[root_a] = root_b,
            std::cmp::Ordering::Greater => self.parent[root_b] = root_a,
            std::cmp::Ordering::Equal => {
                self.parent[root_b] = root_a;
                self.rank[root_a] += 1;
            }
        }
        true
    }

    /// Sets with at least two members, each listed in index order, ordered
    /// by their smallest index.
    pub fn clusters(&mut self) -> Vec<Vec<usize>> {
        let mut by_root: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for i in 0..self.parent.len() {
            let root = self.find(i);
            by_root.entry(root).or_default().push(i);
        }
        let mut clusters: Vec<Vec<usize>> = by_root
            .into_values()
            .filter(|members| members.len() > 1)
            .collect();
        clusters.sort_by_key(|members| members[0]);
        clusters
    }
}

pub struct DeduplicationEngine {
    settings: DedupSettings,
}

impl DeduplicationEngine {
    pub fn new(settings: DedupSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &DedupSettings {
        &self.settings
    }

    pub fn run<S: PerceptualSource + ?Sized>(&self, records: &[DedupRecord], source: &S) -> DedupReport {
        let mut report = DedupReport::default();

        let (exact, resolved) = exact_url_groups(records);
        report.exact_groups = exact.len();
        report.groups.extend(exact);
        log::info!("Phase 1: {} exact-url groups", report.exact_groups);

        if !source.is_available() {
            log::warn!("Perceptual hashing unavailable, skipping visual deduplication");
            report.visual_skipped = true;
            return report;
        }

        let candidates: Vec<&DedupRecord> = records
            .iter()
            .filter(|r| !resolved.contains(r.path.as_str()))
            .collect();

        let mut cache = PerceptualCache::new(source);
        for (key, bucket) in self.buckets(&candidates) {
            if bucket.len() < 2 {
                continue;
            }
            log::debug!("Comparing {} files in bucket {}", bucket.len(), key);
            let groups = self.cluster_bucket(&bucket, &mut cache);
            report.visual_groups += groups.len();
            report.groups.extend(groups);
        }

        log::info!(
            "Phase 2: {} visual groups, {} covers hashed",
            report.visual_groups,
            cache.len()
        );
        report
    }

    /// Visual groups inside one bucket. Members keep corpus order and the
    /// first one is the reference.
    fn cluster_bucket<S: PerceptualSource + ?Sized>(
        &self,
        bucket: &[&DedupRecord],
        cache: &mut PerceptualCache<'_, S>,
    ) -> Vec<DuplicateGroup> {
        let hashes: Vec<Option<Vec<u8>>> = bucket
            .iter()
            .map(|record| cache.get(&record.path).map(<[u8]>::to_vec))
            .collect();

        let threshold = self.settings.phash_threshold;
        let edges: Vec<(usize, usize)> = (0..hashes.len())
            .into_par_iter()
            .flat_map_iter(|i| {
                let hashes = &hashes;
                (i + 1..hashes.len()).filter_map(move |j| {
                    let a = hashes[i].as_deref()?;
                    let b = hashes[j].as_deref()?;
                    let distance = hamming_distance_bytes(a, b)?;
                    (distance <= threshold).then_some((i, j))
                })
            })
            .collect();

        let mut sets = UnionFind::new(bucket.len());
        for (i, j) in edges {
            sets.union(i, j);
        }

        sets.clusters()
            .into_iter()
            .map(|indices| {
                let reference = hashes[indices[0]].as_deref();
                let members = indices
                    .iter()
                    .enumerate()
                    .map(|(position, &idx)| {
                        let distance = reference
                            .zip(hashes[idx].as_deref())
                            .and_then(|(a, b)| hamming_distance_bytes(a, b))
                            .unwrap_or(HASH_BITS);
                        GroupMember {
                            path: bucket[idx].path.clone(),
                            score: similarity_score(distance, HASH_BITS),
                            is_reference: position == 0,
                        }
                    })
                    .collect();
                DuplicateGroup {
                    group_id: new_group_id("PHASH"),
                    kind: DuplicateKind::Visual,
                    members,
                }
            })
            .collect()
    }

    /// Author buckets in a stable order. The catch-all bucket is split by the
    /// first token of the core title once it grows past the limit.
    fn buckets<'r>(&self, candidates: &[&'r DedupRecord]) -> Vec<(String, Vec<&'r DedupRecord>)> {
        let mut buckets: BTreeMap<String, Vec<&'r DedupRecord>> = BTreeMap::new();
        let mut unattributed: Vec<&'r DedupRecord> = Vec::new();

        for &record in candidates {
            let parsed = parse_title(strip_archive_extension(record.file_name()));
            let key = if let Some(artist) = parsed.artist.as_deref() {
                format!("artist:{}", artist.to_lowercase())
            } else if let Some(group) = parsed.group.as_deref() {
                format!("group:{}", group.to_lowercase())
            } else {
                unattributed.push(record);
                continue;
            };
            buckets.entry(key).or_default().push(record);
        }

        if unattributed.len() > self.settings.fallback_bucket_limit {
            log::warn!(
                "{} files without artist or group, splitting by title",
                unattributed.len()
            );
            for record in unattributed {
                let parsed = parse_title(strip_archive_extension(record.file_name()));
                let token = parsed
                    .core_title
                    .as_deref()
                    .and_then(|core| core.split_whitespace().next())
                    .map(str::to_lowercase)
                    .unwrap_or_default();
                buckets.entry(format!("*:{}", token)).or_default().push(record);
            }
        } else if !unattributed.is_empty() {
            buckets.insert("*".to_string(), unattributed);
        }

        buckets.into_iter().collect()
    }
}

impl Default for DeduplicationEngine {
    fn default() -> Self {
        Self::new(DedupSettings::default())
    }
}

/// Phase 1 groups plus the set of paths they resolved.
fn exact_url_groups(records: &[DedupRecord]) -> (Vec<DuplicateGroup>, HashSet<&str>) {
    let mut by_url: BTreeMap<&str, Vec<&DedupRecord>> = BTreeMap::new();
    for record in records {
        if let Some(url) = record.canonical_url.as_deref().map(str::trim) {
            if !url.is_empty() {
                by_url.entry(url).or_default().push(record);
            }
        }
    }

    let mut resolved = HashSet::new();
    let groups = by_url
        .into_values()
        .filter(|members| members.len() > 1)
        .map(|members| {
            let members = members
                .into_iter()
                .enumerate()
                .map(|(position, record)| {
                    resolved.insert(record.path.as_str());
                    GroupMember {
                        path: record.path.clone(),
                        score: 1.0,
                        is_reference: position == 0,
                    }
                })
                .collect();
            DuplicateGroup {
                group_id: new_group_id("URL"),
                kind: DuplicateKind::ExactUrl,
                members,
            }
        })
        .collect();

    (groups, resolved)
}

/// Full 128-bit id; group ids are the storage primary key.
fn new_group_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

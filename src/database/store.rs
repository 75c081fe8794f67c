use super::models::{ScanRecord, ScanStatus};
use super::{DatabaseError, Storage};
use crate::core::duplicate::{DuplicateGroup, DuplicateKind, GroupMember};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

const RECORD_COLUMNS: &str =
    "path, file_name, canonical_url, title, tags, status, scanned_at";

/// SQLite-backed [`Storage`].
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        let store = Self {
            conn,
            path: Some(db_path.to_path_buf()),
        };
        store.initialize_schema()?;
        log::info!("Database ready at {}", db_path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
            path: None,
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), DatabaseError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS scan_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                path TEXT UNIQUE NOT NULL,
                file_name TEXT NOT NULL,
                canonical_url TEXT,
                title TEXT,
                tags TEXT,
                status TEXT NOT NULL,
                scanned_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_scan_results_url ON scan_results(canonical_url)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_scan_results_status ON scan_results(status)",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS duplicate_groups (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS group_members (
                group_id TEXT NOT NULL REFERENCES duplicate_groups(id) ON DELETE CASCADE,
                path TEXT NOT NULL,
                position INTEGER NOT NULL,
                score REAL NOT NULL,
                is_reference INTEGER NOT NULL,
                PRIMARY KEY (group_id, path)
            )",
            [],
        )?;

        Ok(())
    }

    /// Where [`SqliteStore::create_backup`] writes. `None` for in-memory
    /// stores.
    pub fn backup_path(&self) -> Option<PathBuf> {
        self.path.as_ref().map(|path| path.with_extension("db.bak"))
    }

    /// Copy the database file next to itself as `*.db.bak`. Returns `None`
    /// for in-memory stores.
    pub fn create_backup(&self) -> Result<Option<PathBuf>, DatabaseError> {
        let (Some(path), Some(backup)) = (&self.path, self.backup_path()) else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        fs::copy(path, &backup)?;
        log::info!("Backed up database to {}", backup.display());
        Ok(Some(backup))
    }

    /// Replace the database file with its backup and reopen it. The
    /// connection is closed before the copy.
    pub fn restore_backup(self) -> Result<Self, DatabaseError> {
        let (Some(path), Some(backup)) = (self.path.clone(), self.backup_path()) else {
            return Err(DatabaseError::NoBackup("in-memory database".to_string()));
        };
        if !backup.is_file() {
            return Err(DatabaseError::NoBackup(backup.display().to_string()));
        }

        self.conn.close().map_err(|(_, e)| e)?;
        fs::copy(&backup, &path)?;
        log::warn!("Restored {} from {}", path.display(), backup.display());
        Self::open(&path)
    }

    pub fn remove(&mut self, path: &str) -> Result<bool, DatabaseError> {
        let removed = self
            .conn
            .execute("DELETE FROM scan_results WHERE path = ?1", params![path])?;
        Ok(removed > 0)
    }
}

fn read_record(row: &Row<'_>) -> rusqlite::Result<ScanRecord> {
    let status: String = row.get(5)?;
    let scanned_at: String = row.get(6)?;
    let scanned_at = DateTime::parse_from_rfc3339(&scanned_at)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;

    Ok(ScanRecord {
        path: row.get(0)?,
        file_name: row.get(1)?,
        canonical_url: row.get(2)?,
        title: row.get(3)?,
        tags: row.get(4)?,
        status: ScanStatus::from(status),
        scanned_at,
    })
}

fn file_name_of(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

impl Storage for SqliteStore {
    fn get_by_path(&self, path: &str) -> Result<Option<ScanRecord>, DatabaseError> {
        let record = self
            .conn
            .query_row(
                &format!("SELECT {} FROM scan_results WHERE path = ?1", RECORD_COLUMNS),
                params![path],
                read_record,
            )
            .optional()?;
        Ok(record)
    }

    fn save(
        &mut self,
        path: &str,
        status: ScanStatus,
        url: Option<&str>,
        title: Option<&str>,
        tags: Option<&str>,
    ) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT INTO scan_results
                (path, file_name, canonical_url, title, tags, status, scanned_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(path) DO UPDATE SET
                file_name = excluded.file_name,
                canonical_url = excluded.canonical_url,
                title = excluded.title,
                tags = excluded.tags,
                status = excluded.status,
                scanned_at = excluded.scanned_at",
            params![
                path,
                file_name_of(path),
                url,
                title,
                tags,
                status.as_str(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn list_by_status(
        &self,
        predicate: &dyn Fn(ScanStatus) -> bool,
    ) -> Result<Vec<ScanRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM scan_results ORDER BY path",
            RECORD_COLUMNS
        ))?;
        let rows = stmt.query_map([], read_record)?;

        let mut records = Vec::new();
        for row in rows {
            let record = row?;
            if predicate(record.status) {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn replace_groups(&mut self, groups: &[DuplicateGroup]) -> Result<(), DatabaseError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM group_members", [])?;
        tx.execute("DELETE FROM duplicate_groups", [])?;

        {
            let created_at = Utc::now().to_rfc3339();
            let mut insert_group =
                tx.prepare("INSERT INTO duplicate_groups (id, kind, created_at) VALUES (?1, ?2, ?3)")?;
            let mut insert_member = tx.prepare(
                "INSERT INTO group_members (group_id, path, position, score, is_reference)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;

            for group in groups {
                insert_group.execute(params![
                    group.group_id,
                    String::from(group.kind),
                    created_at
                ])?;
                for (position, member) in group.members.iter().enumerate() {
                    insert_member.execute(params![
                        group.group_id,
                        member.path,
                        position as i64,
                        member.score,
                        member.is_reference,
                    ])?;
                }
            }
        }

        tx.commit()?;
        log::info!("Stored {} duplicate groups", groups.len());
        Ok(())
    }

    fn list_groups(&self) -> Result<Vec<DuplicateGroup>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT g.id, g.kind, m.path, m.score, m.is_reference
             FROM duplicate_groups g
             JOIN group_members m ON m.group_id = g.id
             ORDER BY g.rowid, m.position",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                GroupMember {
                    path: row.get(2)?,
                    score: row.get(3)?,
                    is_reference: row.get(4)?,
                },
            ))
        })?;

        let mut groups: Vec<DuplicateGroup> = Vec::new();
        for row in rows {
            let (group_id, kind, member) = row?;
            match groups.last_mut() {
                Some(group) if group.group_id == group_id => group.members.push(member),
                _ => groups.push(DuplicateGroup {
                    group_id,
                    kind: DuplicateKind::from(kind),
                    members: vec![member],
                }),
            }
        }
        Ok(groups)
    }

    fn statistics(&self) -> Result<BTreeMap<ScanStatus, usize>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM scan_results GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut stats = BTreeMap::new();
        for row in rows {
            let (status, count) = row?;
            *stats.entry(ScanStatus::from(status)).or_insert(0) += count as usize;
        }
        Ok(stats)
    }

    fn processed_paths(&self) -> Result<HashSet<String>, DatabaseError> {
        let mut stmt = self.conn.prepare("SELECT path FROM scan_results")?;
        let paths = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn group(id: &str, kind: DuplicateKind, paths: &[&str]) -> DuplicateGroup {
        DuplicateGroup {
            group_id: id.to_string(),
            kind,
            members: paths
                .iter()
                .enumerate()
                .map(|(i, path)| GroupMember {
                    path: path.to_string(),
                    score: if i == 0 { 1.0 } else { 0.953125 },
                    is_reference: i == 0,
                })
                .collect(),
        }
    }

    #[test]
    fn test_save_is_an_upsert() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .save("/lib/a.zip", ScanStatus::Mismatch, Some("u1"), Some("Title"), Some("artist:x"))
            .unwrap();
        store
            .save("/lib/a.zip", ScanStatus::Success, Some("u1"), Some("Title"), Some("artist:x"))
            .unwrap();

        let record = store.get_by_path("/lib/a.zip").unwrap().unwrap();
        assert_eq!(record.status, ScanStatus::Success);
        assert_eq!(record.file_name, "a.zip");
        assert_eq!(record.canonical_url.as_deref(), Some("u1"));
        assert_eq!(store.processed_paths().unwrap().len(), 1);
        assert!(store.get_by_path("/lib/missing.zip").unwrap().is_none());
    }

    #[test]
    fn test_list_by_status_and_statistics() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.save("/lib/b.zip", ScanStatus::Success, Some("u2"), None, None).unwrap();
        store.save("/lib/a.zip", ScanStatus::Success, Some("u1"), None, None).unwrap();
        store.save("/lib/c.zip", ScanStatus::NoMatch, None, None, None).unwrap();

        let successes = store.list_by_status(&|s| s == ScanStatus::Success).unwrap();
        let paths: Vec<&str> = successes.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/lib/a.zip", "/lib/b.zip"]);

        let stats = store.statistics().unwrap();
        assert_eq!(stats.get(&ScanStatus::Success), Some(&2));
        assert_eq!(stats.get(&ScanStatus::NoMatch), Some(&1));
        assert_eq!(stats.get(&ScanStatus::Mismatch), None);
    }

    #[test]
    fn test_unknown_stored_status_reads_as_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO scan_results (path, file_name, status, scanned_at)
                 VALUES ('/lib/old.zip', 'old.zip', 'SUCCESS', ?1)",
                params![Utc::now().to_rfc3339()],
            )
            .unwrap();

        let record = store.get_by_path("/lib/old.zip").unwrap().unwrap();
        assert_eq!(record.status, ScanStatus::Error);
    }

    #[test]
    fn test_replace_groups_drops_previous_run() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .replace_groups(&[
                group("URL-1", DuplicateKind::ExactUrl, &["/a", "/b"]),
                group("PHASH-1", DuplicateKind::Visual, &["/c", "/d", "/e"]),
            ])
            .unwrap();
        assert_eq!(store.list_groups().unwrap().len(), 2);

        let second = group("PHASH-2", DuplicateKind::Visual, &["/x", "/y"]);
        store.replace_groups(std::slice::from_ref(&second)).unwrap();
        assert_eq!(store.list_groups().unwrap(), vec![second]);

        store.replace_groups(&[]).unwrap();
        assert!(store.list_groups().unwrap().is_empty());
    }

    #[test]
    fn test_groups_keep_member_order() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let stored = group("PHASH-1", DuplicateKind::Visual, &["/z", "/a", "/m"]);
        store.replace_groups(std::slice::from_ref(&stored)).unwrap();

        let loaded = store.list_groups().unwrap();
        assert_eq!(loaded[0], stored);
        assert_eq!(loaded[0].reference().map(|m| m.path.as_str()), Some("/z"));
    }

    #[test]
    fn test_file_store_and_backup() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("data").join("scan.db");

        {
            let mut store = SqliteStore::open(&db_path).unwrap();
            store.save("/lib/a.zip", ScanStatus::Success, None, None, None).unwrap();
            let backup = store.create_backup().unwrap().unwrap();
            assert!(backup.ends_with("scan.db.bak"));
            assert!(backup.exists());
        }

        let store = SqliteStore::open(&db_path).unwrap();
        assert!(store.get_by_path("/lib/a.zip").unwrap().is_some());
        assert!(SqliteStore::open_in_memory().unwrap().create_backup().unwrap().is_none());
    }

    #[test]
    fn test_restore_backup_undoes_later_writes() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("scan.db");

        let mut store = SqliteStore::open(&db_path).unwrap();
        store
            .save("/lib/a.zip", ScanStatus::Success, Some("https://catalog.example/g/1/"), None, None)
            .unwrap();
        store.create_backup().unwrap().unwrap();

        store.save("/lib/a.zip", ScanStatus::NoMatch, None, None, None).unwrap();
        store.save("/lib/b.zip", ScanStatus::NetworkFail, None, None, None).unwrap();

        let store = store.restore_backup().unwrap();
        let record = store.get_by_path("/lib/a.zip").unwrap().unwrap();
        assert_eq!(record.status, ScanStatus::Success);
        assert_eq!(record.canonical_url.as_deref(), Some("https://catalog.example/g/1/"));
        assert!(store.get_by_path("/lib/b.zip").unwrap().is_none());
    }

    #[test]
    fn test_restore_without_backup_fails() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::open(&temp_dir.path().join("scan.db")).unwrap();
        assert!(matches!(store.restore_backup(), Err(DatabaseError::NoBackup(_))));

        let memory = SqliteStore::open_in_memory().unwrap();
        assert!(matches!(memory.restore_backup(), Err(DatabaseError::NoBackup(_))));
    }

    #[test]
    fn test_remove() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.save("/lib/a.zip", ScanStatus::NoMatch, None, None, None).unwrap();
        assert!(store.remove("/lib/a.zip").unwrap());
        assert!(!store.remove("/lib/a.zip").unwrap());
    }
}

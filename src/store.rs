// On-disk store: JSONL files as source of truth, SQLite as query cache

use crate::filter::Filter;
use crate::jsonl::{self, HasUpdatedAt};
use crate::models::{Issue, MaintenanceRecord, Snapshot, VehicleInfo, now_ms};
use crate::persist::Persistence;
use crate::record::{IndexValue, Record};
use eyre::{Context, Result, eyre};
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CURRENT_VERSION: u32 = 1;
const STORE_DIR: &str = ".maintlog";
const PROFILE_ID: &str = "vehicle";

/// Vehicle info and save stamp, kept as a single-row collection
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Profile {
    id: String,
    #[serde(default)]
    vehicle: VehicleInfo,
    #[serde(default)]
    last_saved: Option<i64>,
    #[serde(default)]
    updated_at: i64,
}

impl Record for Profile {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "profile"
    }
}

/// Persistent store with SQLite cache and JSONL source of truth
pub struct Store {
    base_path: PathBuf,
    db: Connection,
}

impl Store {
    /// Open or create a store at the given path
    ///
    /// The store will be created in a `.maintlog` subdirectory of the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().join(STORE_DIR);

        // Create directory if it doesn't exist
        fs::create_dir_all(&base_path).context("Failed to create store directory")?;

        // Open SQLite database
        let db_path = base_path.join("maintlog.db");
        let db = Connection::open(&db_path).context("Failed to open SQLite database")?;

        let mut store = Self {
            base_path: base_path.clone(),
            db,
        };

        store.create_schema()?;
        store.create_gitignore()?;
        store.write_version()?;

        // Sync if stale
        if store.is_stale()? {
            info!("Database is stale, syncing from JSONL files");
            store.sync()?;
        }

        Ok(store)
    }

    /// Get the base path of this store
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn create_schema(&self) -> Result<()> {
        debug!("Creating database schema");

        self.db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (collection, id)
            );

            CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection);
            CREATE INDEX IF NOT EXISTS idx_records_updated_at ON records(collection, updated_at);

            -- Indexed fields for filtering
            CREATE TABLE IF NOT EXISTS record_indexes (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                field_name TEXT NOT NULL,
                field_value_str TEXT,
                field_value_int INTEGER,
                field_value_bool INTEGER,
                PRIMARY KEY (collection, id, field_name),
                FOREIGN KEY (collection, id) REFERENCES records(collection, id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_record_indexes_field_str ON record_indexes(collection, field_name, field_value_str);
            CREATE INDEX IF NOT EXISTS idx_record_indexes_field_int ON record_indexes(collection, field_name, field_value_int);
            CREATE INDEX IF NOT EXISTS idx_record_indexes_field_bool ON record_indexes(collection, field_name, field_value_bool);

            -- Deleted ids; a tombstoned id is never written again
            CREATE TABLE IF NOT EXISTS tombstones (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                deleted_at INTEGER NOT NULL,
                PRIMARY KEY (collection, id)
            );

            -- Sync metadata for staleness detection
            CREATE TABLE IF NOT EXISTS sync_metadata (
                collection TEXT PRIMARY KEY,
                last_sync_time INTEGER NOT NULL,
                file_mtime INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(())
    }

    fn create_gitignore(&self) -> Result<()> {
        let gitignore_path = self.base_path.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(gitignore_path, "maintlog.db\nmaintlog.db-shm\nmaintlog.db-wal\n")?;
        }
        Ok(())
    }

    fn write_version(&self) -> Result<()> {
        let version_path = self.base_path.join(".version");
        if !version_path.exists() {
            fs::write(version_path, CURRENT_VERSION.to_string())?;
        }
        Ok(())
    }

    fn jsonl_path(&self, collection: &str) -> PathBuf {
        self.base_path.join(format!("{}.jsonl", collection))
    }

    fn file_mtime(path: &Path) -> Result<i64> {
        Ok(fs::metadata(path)?
            .modified()?
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0))
    }

    /// Check if database needs syncing from JSONL
    ///
    /// Returns true if any JSONL file has been modified since the last sync,
    /// or if there are JSONL files that have never been synced.
    pub fn is_stale(&self) -> Result<bool> {
        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().and_then(|s| s.to_str()) != Some("jsonl") {
                continue;
            }

            let collection = match path.file_stem().and_then(|s| s.to_str()) {
                Some(c) => c,
                None => continue,
            };

            let file_mtime = Self::file_mtime(&path)?;

            let stored_mtime: Option<i64> = self
                .db
                .query_row(
                    "SELECT file_mtime FROM sync_metadata WHERE collection = ?1",
                    [collection],
                    |row| row.get(0),
                )
                .optional()?;

            match stored_mtime {
                None => return Ok(true),                              // Never synced
                Some(mtime) if file_mtime > mtime => return Ok(true), // File modified
                _ => continue,
            }
        }

        Ok(false)
    }

    // ========================================================================
    // Record API
    // ========================================================================

    /// Write a record (new or a newer revision of an existing one)
    pub fn create<T: Record>(&mut self, record: T) -> Result<String> {
        let collection = T::collection_name();
        Self::validate_collection_name(collection)?;

        let id = record.id().to_string();
        Self::validate_id(&id)?;
        if self.is_tombstoned(collection, &id)? {
            return Err(eyre!("Record ID {} in {} was deleted and cannot be reused", id, collection));
        }

        // 1. Append to JSONL
        jsonl::append_jsonl(&self.jsonl_path(collection), &record)?;

        // 2. Insert into SQLite with transaction
        let tx = self.db.transaction()?;

        let data_json = serde_json::to_string(&record).context("Failed to serialize record")?;

        tx.execute(
            "INSERT OR REPLACE INTO records (collection, id, data_json, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![collection, &id, data_json, record.updated_at()],
        )?;

        // 3. Update indexes
        Self::update_indexes_tx(&tx, collection, &id, &record.indexed_fields())?;

        tx.commit()?;

        Ok(id)
    }

    /// Get a record by ID
    pub fn get<T: Record>(&self, id: &str) -> Result<Option<T>> {
        let collection = T::collection_name();

        let result = self
            .db
            .query_row(
                "SELECT data_json FROM records WHERE collection = ?1 AND id = ?2",
                rusqlite::params![collection, id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match result {
            Some(json) => {
                let record: T = serde_json::from_str(&json).context("Failed to deserialize record from database")?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Delete a record, leaving a tombstone in the JSONL file
    pub fn delete<T: Record>(&mut self, id: &str) -> Result<()> {
        let collection = T::collection_name();

        // The tombstone must outrank the stored revision when the file is replayed
        let stored_updated_at: Option<i64> = self
            .db
            .query_row(
                "SELECT updated_at FROM records WHERE collection = ?1 AND id = ?2",
                rusqlite::params![collection, id],
                |row| row.get(0),
            )
            .optional()?;
        let updated_at = now_ms().max(stored_updated_at.map_or(0, |ts| ts.saturating_add(1)));

        let tombstone = serde_json::json!({
            "id": id,
            "deleted": true,
            "updated_at": updated_at,
        });
        jsonl::append_jsonl(&self.jsonl_path(collection), &tombstone)?;

        self.db.execute(
            "INSERT OR REPLACE INTO tombstones (collection, id, deleted_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![collection, id, updated_at],
        )?;

        self.db.execute(
            "DELETE FROM record_indexes WHERE collection = ?1 AND id = ?2",
            rusqlite::params![collection, id],
        )?;
        self.db.execute(
            "DELETE FROM records WHERE collection = ?1 AND id = ?2",
            rusqlite::params![collection, id],
        )?;

        Ok(())
    }

    /// List records with optional filtering, most recently updated first
    pub fn list<T: Record>(&self, filters: &[Filter]) -> Result<Vec<T>> {
        let collection = T::collection_name();

        if filters.is_empty() {
            let mut stmt = self
                .db
                .prepare("SELECT data_json FROM records WHERE collection = ?1 ORDER BY updated_at DESC")?;

            let rows = stmt.query_map([collection], |row| row.get::<_, String>(0))?;

            let mut results = Vec::new();
            for row_result in rows {
                let data_json = row_result?;
                let record: T = serde_json::from_str(&data_json).context("Failed to deserialize record")?;
                results.push(record);
            }
            return Ok(results);
        }

        // With filters: query the record_indexes table
        let mut query = String::from(
            "SELECT DISTINCT r.data_json, r.updated_at
             FROM records r
             WHERE r.collection = ?1",
        );

        for (i, filter) in filters.iter().enumerate() {
            Self::validate_field_name(&filter.field)?;

            let alias = format!("idx{}", i);
            query.push_str(&format!(
                " AND EXISTS (
                    SELECT 1 FROM record_indexes {alias}
                    WHERE {alias}.collection = r.collection
                      AND {alias}.id = r.id
                      AND {alias}.field_name = ?{}",
                i + 2
            ));

            let column = match &filter.value {
                IndexValue::String(_) => "field_value_str",
                IndexValue::Int(_) => "field_value_int",
                IndexValue::Bool(_) => "field_value_bool",
            };
            query.push_str(&format!(
                " AND {alias}.{column} {} ?{}",
                filter.op.to_sql(),
                i + 2 + filters.len()
            ));

            query.push(')');
        }

        query.push_str(" ORDER BY r.updated_at DESC");

        let mut stmt = self.db.prepare(&query)?;

        // Bind parameters: collection, then field names, then values
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        params.push(Box::new(collection.to_string()));

        for filter in filters {
            params.push(Box::new(filter.field.clone()));
        }

        for filter in filters {
            match &filter.value {
                IndexValue::String(s) if filter.op == crate::filter::FilterOp::Contains => {
                    params.push(Box::new(format!("%{}%", s)))
                }
                IndexValue::String(s) => params.push(Box::new(s.clone())),
                IndexValue::Int(i) => params.push(Box::new(*i)),
                IndexValue::Bool(b) => params.push(Box::new(*b as i64)),
            }
        }

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt.query_map(params_refs.as_slice(), |row| row.get::<_, String>(0))?;

        let mut results = Vec::new();
        for row_result in rows {
            let data_json = row_result?;
            let record: T = serde_json::from_str(&data_json).context("Failed to deserialize record")?;
            results.push(record);
        }

        Ok(results)
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    fn is_tombstoned(&self, collection: &str, id: &str) -> Result<bool> {
        let found: Option<i64> = self
            .db
            .query_row(
                "SELECT 1 FROM tombstones WHERE collection = ?1 AND id = ?2",
                rusqlite::params![collection, id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Ids deleted from the given collections
    fn tombstoned_ids(&self, collections: &[&str]) -> Result<BTreeSet<String>> {
        let mut stmt = self.db.prepare("SELECT id FROM tombstones WHERE collection = ?1")?;
        let mut ids = BTreeSet::new();
        for collection in collections {
            let rows = stmt.query_map([*collection], |row| row.get::<_, String>(0))?;
            for row in rows {
                ids.insert(row?);
            }
        }
        Ok(ids)
    }

    fn stored_rows(&self, collection: &str) -> Result<HashMap<String, String>> {
        let mut stmt = self
            .db
            .prepare("SELECT id, data_json FROM records WHERE collection = ?1")?;

        let rows = stmt.query_map([collection], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut stored = HashMap::new();
        for row in rows {
            let (id, data_json) = row?;
            stored.insert(id, data_json);
        }
        Ok(stored)
    }

    /// Bring one collection in line with `records`
    ///
    /// Rows whose content changed are appended, rows that vanished get a
    /// tombstone, unchanged rows are left alone. Returns whether anything was
    /// written.
    fn reconcile<T: Record>(&mut self, records: &[T]) -> Result<bool> {
        let collection = T::collection_name();
        let stored = self.stored_rows(collection)?;
        let mut written = 0usize;

        for record in records {
            let current = serde_json::to_value(record)?;
            let unchanged = match stored.get(record.id()) {
                Some(json) => serde_json::from_str::<serde_json::Value>(json).ok().as_ref() == Some(&current),
                None => false,
            };
            if !unchanged {
                self.create(record.clone())?;
                written += 1;
            }
        }

        let keep: HashSet<&str> = records.iter().map(|r| r.id()).collect();
        for id in stored.keys().filter(|id| !keep.contains(id.as_str())) {
            self.delete::<T>(id)?;
            written += 1;
        }

        if written > 0 {
            debug!(collection, written, "reconcile: wrote changes");
            // Our own appends should not make the cache look stale
            self.record_sync_metadata(collection)?;
        }
        Ok(written > 0)
    }

    fn record_sync_metadata(&self, collection: &str) -> Result<()> {
        let path = self.jsonl_path(collection);
        if !path.exists() {
            return Ok(());
        }
        let file_mtime = Self::file_mtime(&path)?;
        self.db.execute(
            "INSERT OR REPLACE INTO sync_metadata (collection, last_sync_time, file_mtime)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![collection, now_ms(), file_mtime],
        )?;
        Ok(())
    }

    fn update_indexes_tx(
        tx: &rusqlite::Transaction,
        collection: &str,
        id: &str,
        fields: &HashMap<String, IndexValue>,
    ) -> Result<()> {
        debug!(collection, id, field_count = fields.len(), "update_indexes_tx: called");

        // Delete old indexes
        tx.execute(
            "DELETE FROM record_indexes WHERE collection = ?1 AND id = ?2",
            rusqlite::params![collection, id],
        )?;

        for (field_name, value) in fields {
            Self::validate_field_name(field_name)?;

            match value {
                IndexValue::String(s) => {
                    tx.execute(
                        "INSERT INTO record_indexes (collection, id, field_name, field_value_str, field_value_int, field_value_bool)
                         VALUES (?1, ?2, ?3, ?4, NULL, NULL)",
                        rusqlite::params![collection, id, field_name, s],
                    )?;
                }
                IndexValue::Int(i) => {
                    tx.execute(
                        "INSERT INTO record_indexes (collection, id, field_name, field_value_str, field_value_int, field_value_bool)
                         VALUES (?1, ?2, ?3, NULL, ?4, NULL)",
                        rusqlite::params![collection, id, field_name, i],
                    )?;
                }
                IndexValue::Bool(b) => {
                    tx.execute(
                        "INSERT INTO record_indexes (collection, id, field_name, field_value_str, field_value_int, field_value_bool)
                         VALUES (?1, ?2, ?3, NULL, NULL, ?4)",
                        rusqlite::params![collection, id, field_name, *b as i64],
                    )?;
                }
            }
        }

        Ok(())
    }

    fn validate_collection_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(eyre!("Collection name cannot be empty"));
        }
        if name.len() > 64 {
            return Err(eyre!("Collection name too long: {} (max 64 chars)", name));
        }
        if !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
            return Err(eyre!(
                "Invalid collection name: {} (must be alphanumeric with _/-)",
                name
            ));
        }
        Ok(())
    }

    fn validate_field_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(eyre!("Field name cannot be empty"));
        }
        if name.len() > 64 {
            return Err(eyre!("Field name too long: {} (max 64 chars)", name));
        }
        if !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(eyre!("Invalid field name: {} (must be alphanumeric with _)", name));
        }
        Ok(())
    }

    fn validate_id(id: &str) -> Result<()> {
        if id.trim().is_empty() {
            return Err(eyre!("Record ID cannot be empty or whitespace-only"));
        }
        if id.len() > 256 {
            return Err(eyre!("Record ID too long: {} chars (max 256)", id.len()));
        }
        Ok(())
    }

    // ========================================================================
    // Sync operations
    // ========================================================================

    /// Rebuild the SQLite cache from the JSONL files, indexes included
    pub fn sync(&mut self) -> Result<()> {
        info!("Syncing database from JSONL files");
        let started = now_ms();

        self.db.execute("DELETE FROM record_indexes", [])?;
        self.db.execute("DELETE FROM records", [])?;
        self.db.execute("DELETE FROM tombstones", [])?;

        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            let path = entry.path();

            if path.extension().and_then(|s| s.to_str()) != Some("jsonl") {
                continue;
            }

            let collection = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| eyre!("Invalid JSONL filename: {:?}", path))?
                .to_string();

            debug!("Syncing collection: {}", collection);

            let records: HashMap<String, serde_json::Value> = jsonl::read_jsonl_latest(&path)?;

            for (id, record) in records {
                if record.get("deleted").and_then(|v| v.as_bool()).unwrap_or(false) {
                    self.db.execute(
                        "INSERT OR REPLACE INTO tombstones (collection, id, deleted_at) VALUES (?1, ?2, ?3)",
                        rusqlite::params![&collection, &id, record.updated_at()],
                    )?;
                    continue;
                }

                let data_json = serde_json::to_string(&record)?;

                self.db.execute(
                    "INSERT OR REPLACE INTO records (collection, id, data_json, updated_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![&collection, &id, data_json, record.updated_at()],
                )?;
            }

            self.record_sync_metadata(&collection)?;
        }

        // Drop metadata for JSONL files that no longer exist
        self.db.execute(
            "DELETE FROM sync_metadata WHERE last_sync_time < ?1",
            rusqlite::params![started],
        )?;

        self.rebuild_indexes::<MaintenanceRecord>()?;
        self.rebuild_indexes::<Issue>()?;

        info!("Sync complete");
        Ok(())
    }

    /// Rebuild indexes for a specific record type
    ///
    /// Records in the collection that don't deserialize to `T` are skipped with
    /// a warning. Returns the number of records successfully indexed.
    pub fn rebuild_indexes<T: Record>(&mut self) -> Result<usize> {
        let collection = T::collection_name();

        // Use a block to ensure stmt is dropped before we start a transaction
        let records_data: Vec<(String, String)> = {
            let mut stmt = self
                .db
                .prepare("SELECT id, data_json FROM records WHERE collection = ?1")?;

            let rows = stmt.query_map([collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            rows.filter_map(|r| r.ok()).collect()
        };

        let tx = self.db.transaction()?;
        let mut count = 0;

        for (id, data_json) in records_data {
            let record: T = match serde_json::from_str(&data_json) {
                Ok(r) => r,
                Err(e) => {
                    warn!(
                        collection = collection,
                        id = &id,
                        error = ?e,
                        "Skipping record that doesn't match type"
                    );
                    continue;
                }
            };

            Self::update_indexes_tx(&tx, collection, &id, &record.indexed_fields())?;
            count += 1;
        }

        tx.commit()?;
        debug!(collection = collection, count = count, "Rebuilt indexes for collection");
        Ok(count)
    }
}

impl Persistence for Store {
    fn load(&mut self) -> Result<Option<Snapshot>> {
        let profile: Option<Profile> = self.get(PROFILE_ID)?;
        let mut maintenance: Vec<MaintenanceRecord> = self.list(&[])?;
        let mut issues: Vec<Issue> = self.list(&[])?;
        let retired_ids = self.tombstoned_ids(&[MaintenanceRecord::collection_name(), Issue::collection_name()])?;

        if profile.is_none() && maintenance.is_empty() && issues.is_empty() && retired_ids.is_empty() {
            return Ok(None);
        }

        // Newest first, by insertion
        maintenance.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        issues.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        let (vehicle, last_saved) = profile.map(|p| (p.vehicle, p.last_saved)).unwrap_or_default();

        info!(
            maintenance = maintenance.len(),
            issues = issues.len(),
            "Loaded snapshot from store"
        );

        Ok(Some(Snapshot {
            vehicle,
            maintenance,
            issues,
            last_saved,
            retired_ids,
        }))
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<()> {
        let profile = Profile {
            id: PROFILE_ID.to_string(),
            vehicle: snapshot.vehicle.clone(),
            last_saved: snapshot.last_saved,
            updated_at: snapshot.last_saved.unwrap_or_else(now_ms),
        };

        self.reconcile(&[profile]).context("Failed to save vehicle profile")?;
        self.reconcile(&snapshot.maintenance)
            .context("Failed to save maintenance records")?;
        self.reconcile(&snapshot.issues).context("Failed to save issues")?;

        debug!(base_path = ?self.base_path, "Saved snapshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterOp, IssueQuery, MaintenanceQuery, TypeFilter};
    use crate::models::{Priority, ServiceType};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn maintenance(id: &str, service_type: ServiceType, mileage: u64, created_at: i64) -> MaintenanceRecord {
        MaintenanceRecord {
            id: id.to_string(),
            date: date(2024, 1, 1),
            service_type,
            mileage,
            notes: String::new(),
            cost: 0.0,
            created_at,
        }
    }

    fn issue(id: &str, priority: Priority, resolved: bool, created_at: i64) -> Issue {
        Issue {
            id: id.to_string(),
            date: date(2024, 2, 1),
            description: format!("issue {}", id),
            priority,
            resolved,
            resolved_at: resolved.then_some(created_at + 10),
            last_modified: None,
            created_at,
            updated_at: created_at + 10,
        }
    }

    fn sample_snapshot() -> Snapshot {
        Snapshot {
            vehicle: VehicleInfo {
                vin: "118000042".to_string(),
                mileage: 12_900,
                ..VehicleInfo::default()
            },
            maintenance: vec![
                maintenance("m2", ServiceType::TuneUp, 12_000, 2000),
                maintenance("m1", ServiceType::OilChange, 10_000, 1000),
            ],
            issues: vec![
                issue("i2", Priority::Critical, false, 2000),
                issue("i1", Priority::Low, true, 1000),
            ],
            last_saved: Some(3000),
            ..Snapshot::default()
        }
    }

    #[test]
    fn test_store_open_creates_directory() {
        let temp = TempDir::new().unwrap();

        let store = Store::open(temp.path()).unwrap();
        let store_path = temp.path().join(".maintlog");
        assert_eq!(store.base_path(), store_path.as_path());
        assert!(store_path.join("maintlog.db").exists());
        assert!(store_path.join(".gitignore").exists());
        assert!(store_path.join(".version").exists());
    }

    #[test]
    fn test_create_and_get() {
        let temp = TempDir::new().unwrap();
        let mut store = Store::open(temp.path()).unwrap();

        let id = store.create(maintenance("m1", ServiceType::OilChange, 10_000, 1000)).unwrap();
        assert_eq!(id, "m1");

        assert!(temp.path().join(".maintlog/maintenance.jsonl").exists());

        let retrieved: MaintenanceRecord = store.get("m1").unwrap().unwrap();
        assert_eq!(retrieved.service_type, ServiceType::OilChange);
        assert_eq!(retrieved.mileage, 10_000);
    }

    #[test]
    fn test_get_nonexistent() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path()).unwrap();

        let result: Option<Issue> = store.get("nonexistent").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_delete_writes_tombstone() {
        let temp = TempDir::new().unwrap();
        let mut store = Store::open(temp.path()).unwrap();

        store.create(issue("i1", Priority::High, false, 1000)).unwrap();
        store.delete::<Issue>("i1").unwrap();

        let retrieved: Option<Issue> = store.get("i1").unwrap();
        assert!(retrieved.is_none());

        let content = fs::read_to_string(temp.path().join(".maintlog/issues.jsonl")).unwrap();
        assert!(content.contains("\"deleted\":true"));
    }

    #[test]
    fn test_list_with_filters() {
        let temp = TempDir::new().unwrap();
        let mut store = Store::open(temp.path()).unwrap();

        store.create(issue("i1", Priority::Low, false, 1000)).unwrap();
        store.create(issue("i2", Priority::High, false, 2000)).unwrap();
        store.create(issue("i3", Priority::Critical, true, 3000)).unwrap();

        let high: Vec<Issue> = store
            .list(&[Filter::eq("priority", IndexValue::String("high".to_string()))])
            .unwrap();
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].id, "i2");

        let open_and_urgent: Vec<Issue> = store
            .list(&[
                Filter::eq("resolved", IndexValue::Bool(false)),
                Filter::new("priority_rank", FilterOp::Gte, IndexValue::Int(Priority::High.rank())),
            ])
            .unwrap();
        assert_eq!(open_and_urgent.len(), 1);
        assert_eq!(open_and_urgent[0].id, "i2");

        let all: Vec<Issue> = store.list(&[]).unwrap();
        assert_eq!(all.len(), 3);
        // Most recently updated first
        assert_eq!(all[0].id, "i3");
    }

    #[test]
    fn test_list_contains_filter() {
        let temp = TempDir::new().unwrap();
        let mut store = Store::open(temp.path()).unwrap();

        store.create(maintenance("m1", ServiceType::BrakeInspection, 1000, 1)).unwrap();
        store.create(maintenance("m2", ServiceType::Brakes, 2000, 2)).unwrap();
        store.create(maintenance("m3", ServiceType::OilChange, 3000, 3)).unwrap();

        let brakes: Vec<MaintenanceRecord> = store
            .list(&[Filter::new(
                "service_type",
                FilterOp::Contains,
                IndexValue::String("brake".to_string()),
            )])
            .unwrap();
        assert_eq!(brakes.len(), 2);
    }

    #[test]
    fn test_list_with_maintenance_query() {
        let temp = TempDir::new().unwrap();
        let mut store = Store::open(temp.path()).unwrap();

        store.create(maintenance("m1", ServiceType::OilChange, 9_000, 1)).unwrap();
        store.create(maintenance("m2", ServiceType::OilChange, 12_000, 2)).unwrap();
        store.create(maintenance("m3", ServiceType::Brakes, 12_500, 3)).unwrap();
        store.create(maintenance("m4", ServiceType::BrakeInspection, 15_000, 4)).unwrap();

        let ids = |query: MaintenanceQuery| -> Vec<String> {
            store
                .list::<MaintenanceRecord>(&query.filters())
                .unwrap()
                .into_iter()
                .map(|m| m.id)
                .collect()
        };

        assert_eq!(ids(MaintenanceQuery::default()), vec!["m4", "m3", "m2", "m1"]);
        assert_eq!(
            ids(MaintenanceQuery {
                service_type: TypeFilter::Only(ServiceType::OilChange),
                ..MaintenanceQuery::default()
            }),
            vec!["m2", "m1"]
        );
        assert_eq!(
            ids(MaintenanceQuery {
                type_matching: Some("brake".to_string()),
                exclude_type: Some(ServiceType::BrakeInspection),
                ..MaintenanceQuery::default()
            }),
            vec!["m3"]
        );
        assert_eq!(
            ids(MaintenanceQuery {
                from_mileage: Some(12_000),
                before_mileage: Some(15_000),
                ..MaintenanceQuery::default()
            }),
            vec!["m3", "m2"]
        );
    }

    #[test]
    fn test_list_with_issue_query() {
        let temp = TempDir::new().unwrap();
        let mut store = Store::open(temp.path()).unwrap();

        store.create(issue("i1", Priority::Low, false, 1000)).unwrap();
        store.create(issue("i2", Priority::Medium, true, 2000)).unwrap();
        store.create(issue("i3", Priority::High, false, 3000)).unwrap();
        store.create(issue("i4", Priority::Critical, false, 4000)).unwrap();

        let query = IssueQuery {
            above: Some(Priority::Low),
            at_most: Some(Priority::High),
            ..IssueQuery::default()
        };
        let found: Vec<Issue> = store.list(&query.filters()).unwrap();
        let ids: Vec<&str> = found.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["i3", "i2"]);

        let query = IssueQuery {
            resolved: Some(false),
            at_least: Some(Priority::High),
            ..IssueQuery::default()
        };
        let found: Vec<Issue> = store.list(&query.filters()).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_save_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let original = sample_snapshot();

        {
            let mut store = Store::open(temp.path()).unwrap();
            assert!(store.load().unwrap().is_none());
            store.save(&original).unwrap();
        }

        let mut store = Store::open(temp.path()).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_save_round_trip_after_resync() {
        let temp = TempDir::new().unwrap();
        let original = sample_snapshot();

        let mut store = Store::open(temp.path()).unwrap();
        store.save(&original).unwrap();
        store.sync().unwrap();

        assert_eq!(store.load().unwrap().unwrap(), original);

        // Indexes come back after sync
        let open: Vec<Issue> = store.list(&[Filter::eq("resolved", IndexValue::Bool(false))]).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, "i2");
    }

    #[test]
    fn test_save_removes_vanished_rows() {
        let temp = TempDir::new().unwrap();
        let mut snapshot = sample_snapshot();

        let mut store = Store::open(temp.path()).unwrap();
        store.save(&snapshot).unwrap();

        snapshot.maintenance.retain(|m| m.id != "m1");
        snapshot.issues[0].resolved = true;
        snapshot.issues[0].resolved_at = Some(5000);
        snapshot.issues[0].updated_at = 5000;
        store.save(&snapshot).unwrap();
        store.sync().unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.maintenance.len(), 1);
        assert_eq!(loaded.maintenance[0].id, "m2");
        assert!(loaded.issues.iter().all(|i| i.resolved));
    }

    #[test]
    fn test_save_skips_unchanged_rows() {
        let temp = TempDir::new().unwrap();
        let snapshot = sample_snapshot();

        let mut store = Store::open(temp.path()).unwrap();
        store.save(&snapshot).unwrap();
        store.sync().unwrap();
        store.save(&snapshot).unwrap();

        let content = fs::read_to_string(temp.path().join(".maintlog/maintenance.jsonl")).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_deleted_id_cannot_be_reused() {
        let temp = TempDir::new().unwrap();
        let mut snapshot = sample_snapshot();
        let removed = snapshot.maintenance.pop().unwrap();

        let mut store = Store::open(temp.path()).unwrap();
        store.save(&sample_snapshot()).unwrap();
        store.save(&snapshot).unwrap();

        // Putting the row back would lose it to the tombstone on the next sync
        snapshot.maintenance.push(removed.clone());
        assert!(store.save(&snapshot).is_err());
        assert!(store.create(removed.clone()).is_err());

        store.sync().unwrap();
        assert!(store.create(removed).is_err());

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.maintenance.len(), 1);
        assert!(loaded.retired_ids.contains("m1"));
    }

    #[test]
    fn test_retired_ids_survive_reopen() {
        let temp = TempDir::new().unwrap();

        {
            let mut store = Store::open(temp.path()).unwrap();
            store.create(issue("i1", Priority::High, false, 1000)).unwrap();
            store.delete::<Issue>("i1").unwrap();
        }

        // A fresh cache is rebuilt from the JSONL files
        fs::remove_file(temp.path().join(".maintlog/maintlog.db")).unwrap();
        let mut store = Store::open(temp.path()).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert!(loaded.issues.is_empty());
        assert_eq!(loaded.retired_ids.into_iter().collect::<Vec<_>>(), vec!["i1".to_string()]);
        assert!(store.create(issue("i1", Priority::High, false, 2000)).is_err());
    }

    #[test]
    fn test_tombstone_stamp_saturates() {
        let temp = TempDir::new().unwrap();
        let mut store = Store::open(temp.path()).unwrap();

        let mut stuck = issue("i1", Priority::Low, false, 1000);
        stuck.updated_at = i64::MAX;
        store.create(stuck).unwrap();
        store.delete::<Issue>("i1").unwrap();
        store.sync().unwrap();

        assert!(store.get::<Issue>("i1").unwrap().is_none());
    }

    #[test]
    fn test_is_stale_after_external_edit() {
        let temp = TempDir::new().unwrap();
        let mut store = Store::open(temp.path()).unwrap();
        store.save(&sample_snapshot()).unwrap();
        assert!(!store.is_stale().unwrap());

        // A file the cache has never seen
        fs::write(temp.path().join(".maintlog/extra.jsonl"), "{\"id\":\"x\"}\n").unwrap();
        assert!(store.is_stale().unwrap());
    }

    #[test]
    fn test_validation_collection_name() {
        assert!(Store::validate_collection_name("maintenance").is_ok());
        assert!(Store::validate_collection_name("valid-name").is_ok());

        assert!(Store::validate_collection_name("invalid/name").is_err());
        assert!(Store::validate_collection_name("").is_err());
        assert!(Store::validate_collection_name(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_validation_field_name() {
        assert!(Store::validate_field_name("priority_rank").is_ok());

        assert!(Store::validate_field_name("invalid-field").is_err());
        assert!(Store::validate_field_name("").is_err());
        assert!(Store::validate_field_name(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_validation_id() {
        assert!(Store::validate_id("0190b2a4-aaaa").is_ok());
        assert!(Store::validate_id("   ").is_err());
        assert!(Store::validate_id(&"x".repeat(257)).is_err());
    }
}

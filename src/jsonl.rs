// JSONL file operations

use eyre::{Context, Result};
use fs2::FileExt;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::{info, warn};

/// Append a record to a JSONL file under an exclusive lock
pub fn append_jsonl<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context("Failed to open JSONL file for appending")?;

    file.lock_exclusive().context("Failed to acquire file lock")?;

    let json = serde_json::to_string(record)?;
    writeln!(file, "{}", json)?;
    file.sync_all()?; // Ensure data is flushed to disk

    // Lock is automatically released when file is dropped
    Ok(())
}

/// Read all records from a JSONL file, returning latest version per ID
///
/// For records with duplicate IDs, the one with the highest updated_at wins.
/// On equal timestamps the later line wins, since lines are appended in order.
pub fn read_jsonl_latest<T>(path: &Path) -> Result<HashMap<String, T>>
where
    T: DeserializeOwned + HasId + HasUpdatedAt,
{
    if !path.exists() {
        // File doesn't exist yet, return empty map
        return Ok(HashMap::new());
    }

    let file = File::open(path).context("Failed to open JSONL file")?;
    let reader = BufReader::new(file);
    let mut records: HashMap<String, T> = HashMap::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!(
                    file = ?path,
                    line = line_num + 1,
                    error = ?e,
                    "Failed to read line, skipping"
                );
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let record: T = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                warn!(
                    file = ?path,
                    line = line_num + 1,
                    error = ?e,
                    "Failed to parse JSON, skipping"
                );
                continue;
            }
        };

        let id = record.id();
        if id.is_empty() {
            warn!(file = ?path, line = line_num + 1, "Record without id, skipping");
            continue;
        }
        let updated_at = record.updated_at();

        match records.get(&id) {
            Some(existing) if updated_at < existing.updated_at() => {}
            _ => {
                records.insert(id, record);
            }
        }
    }

    info!(
        file = ?path,
        count = records.len(),
        "Loaded latest records from JSONL"
    );

    Ok(records)
}

/// Trait for types that have an ID field
pub trait HasId {
    fn id(&self) -> String;
}

/// Trait for types that have an updated_at timestamp
pub trait HasUpdatedAt {
    fn updated_at(&self) -> i64;
}

// Raw rows, used by sync where tombstones and records share a file
impl HasId for serde_json::Value {
    fn id(&self) -> String {
        self.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string()
    }
}

impl HasUpdatedAt for serde_json::Value {
    fn updated_at(&self) -> i64 {
        self.get("updated_at")
            .or_else(|| self.get("created_at"))
            .and_then(|v| v.as_i64())
            .unwrap_or(0)
    }
}

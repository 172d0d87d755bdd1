// Persistence boundary for the ledger

use crate::models::Snapshot;
use eyre::{Result, eyre};

/// Loads and saves the full ledger state
///
/// `load` is called once at startup; `save` after every mutation. A backend
/// never retries on its own; a failed save is returned to the caller.
pub trait Persistence {
    /// Returns `None` when nothing has been saved yet
    fn load(&mut self) -> Result<Option<Snapshot>>;

    fn save(&mut self, snapshot: &Snapshot) -> Result<()>;
}

/// In-memory backend for testing.
///
/// Keeps the last snapshot as serialized JSON so that loading goes through the
/// same serde path as a real backend.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    saved: Option<String>,
    save_count: usize,
    simulate_write_error: bool,
    simulate_read_error: bool,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from raw JSON, as if written by an earlier version
    pub fn with_json(json: &str) -> Self {
        Self {
            saved: Some(json.to_string()),
            ..Self::default()
        }
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&mut self, simulate: bool) {
        self.simulate_write_error = simulate;
    }

    pub fn set_simulate_read_error(&mut self, simulate: bool) {
        self.simulate_read_error = simulate;
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.save_count
    }

    pub fn saved_json(&self) -> Option<&str> {
        self.saved.as_deref()
    }
}

impl Persistence for MemoryPersistence {
    fn load(&mut self) -> Result<Option<Snapshot>> {
        if self.simulate_read_error {
            return Err(eyre!("Simulated read error"));
        }
        match &self.saved {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<()> {
        if self.simulate_write_error {
            return Err(eyre!("Simulated write error"));
        }
        self.saved = Some(serde_json::to_string(snapshot)?);
        self.save_count += 1;
        Ok(())
    }
}
